//! IdentityStore trait definition.
//!
//! Abstracts the canonical identity storage so the resolver can run against
//! the SQLite-backed store in production and the in-memory store in tests.

use async_trait::async_trait;
use thiserror::Error;

use super::models::{PlatformTag, UniversalTrackIdentity};

/// Errors surfaced by identity store implementations.
///
/// An expected miss is `Ok(None)`, never an error; these variants are for
/// genuine failures. The resolver degrades *read* failures to misses but
/// always propagates *write* failures, since silently dropping a creation or
/// merge would permanently lose the association.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("identity store unavailable: {0}")]
    Unavailable(String),
    #[error("identity store operation failed: {0}")]
    Operation(String),
}

/// Outcome of `IdentityStore::create`.
///
/// `create` is an atomic create-or-get: if another identity already owns one
/// of the new record's unique keys ((platform, platform id) or standard
/// code), the existing record is returned instead of a duplicate being
/// written. This is the store-side half of the concurrent-creation guard.
#[derive(Debug)]
pub enum CreateOutcome {
    Created,
    Existing(UniversalTrackIdentity),
}

/// A fuzzy-merge write: association and/or code to attach, plus the score
/// that triggered the merge. Applied as a single atomic operation.
#[derive(Debug, Clone, Copy)]
pub struct AssociationUpdate<'a> {
    pub platform: &'a PlatformTag,
    pub platform_id: Option<&'a str>,
    pub standard_code: Option<&'a str>,
    pub confidence: f64,
}

/// Durable keyed storage of canonical identities.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Look up the identity associated with a (platform, platform id) pair.
    async fn find_by_platform_id(
        &self,
        platform: &PlatformTag,
        platform_id: &str,
    ) -> Result<Option<UniversalTrackIdentity>, StoreError>;

    /// Look up the identity owning a standard recording code.
    async fn find_by_standard_code(
        &self,
        code: &str,
    ) -> Result<Option<UniversalTrackIdentity>, StoreError>;

    /// Fuzzy-tier candidate set: identities whose normalized artist equals
    /// `artist_key`, most recently updated first, at most `limit`.
    async fn find_candidates_by_normalized_artist(
        &self,
        artist_key: &str,
        limit: usize,
    ) -> Result<Vec<UniversalTrackIdentity>, StoreError>;

    /// Atomically create the identity, or return the existing record when a
    /// unique key collides. Never leaves a partial write.
    async fn create(
        &self,
        identity: &UniversalTrackIdentity,
    ) -> Result<CreateOutcome, StoreError>;

    /// Attach an association and/or standard code to an existing identity
    /// and record the fuzzy-merge confidence. Associations and codes are
    /// insert-if-absent; an already-claimed (platform, id) pair or code is
    /// left untouched so existing mappings are never overwritten.
    async fn add_association(
        &self,
        canonical_id: &str,
        update: AssociationUpdate<'_>,
    ) -> Result<(), StoreError>;
}
