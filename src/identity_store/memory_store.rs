//! In-memory identity store.
//!
//! Backs deterministic unit and integration tests; same contract as the
//! SQLite store, including the atomic create-or-get behavior.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::normalize::normalize;

use super::models::{PlatformAssociation, PlatformTag, Provenance, UniversalTrackIdentity};
use super::trait_def::{AssociationUpdate, CreateOutcome, IdentityStore, StoreError};

#[derive(Default)]
struct MemoryInner {
    identities: HashMap<String, UniversalTrackIdentity>,
    by_platform: HashMap<(String, String), String>,
    by_code: HashMap<String, String>,
    by_artist_key: HashMap<String, Vec<String>>,
}

/// Identity store backed by process-local hash maps.
#[derive(Default)]
pub struct InMemoryIdentityStore {
    inner: Mutex<MemoryInner>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored identities (for test assertions).
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn platform_key(platform: &PlatformTag, platform_id: &str) -> (String, String) {
    (platform.as_str().to_string(), platform_id.to_string())
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn find_by_platform_id(
        &self,
        platform: &PlatformTag,
        platform_id: &str,
    ) -> Result<Option<UniversalTrackIdentity>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .by_platform
            .get(&platform_key(platform, platform_id))
            .and_then(|id| inner.identities.get(id))
            .cloned())
    }

    async fn find_by_standard_code(
        &self,
        code: &str,
    ) -> Result<Option<UniversalTrackIdentity>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .by_code
            .get(code)
            .and_then(|id| inner.identities.get(id))
            .cloned())
    }

    async fn find_candidates_by_normalized_artist(
        &self,
        artist_key: &str,
        limit: usize,
    ) -> Result<Vec<UniversalTrackIdentity>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut candidates: Vec<UniversalTrackIdentity> = inner
            .by_artist_key
            .get(artist_key)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.identities.get(id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        candidates.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        candidates.truncate(limit);
        Ok(candidates)
    }

    async fn create(
        &self,
        identity: &UniversalTrackIdentity,
    ) -> Result<CreateOutcome, StoreError> {
        let mut inner = self.inner.lock().unwrap();

        // Unique-key collisions return the existing record instead of
        // creating a duplicate.
        for assoc in &identity.associations {
            if let Some(existing) = inner
                .by_platform
                .get(&platform_key(&assoc.platform, &assoc.platform_id))
                .and_then(|id| inner.identities.get(id))
            {
                return Ok(CreateOutcome::Existing(existing.clone()));
            }
        }
        if let Some(code) = identity.standard_code.as_deref() {
            if let Some(existing) = inner
                .by_code
                .get(code)
                .and_then(|id| inner.identities.get(id))
            {
                return Ok(CreateOutcome::Existing(existing.clone()));
            }
        }

        let canonical_id = identity.canonical_id.clone();
        for assoc in &identity.associations {
            inner.by_platform.insert(
                platform_key(&assoc.platform, &assoc.platform_id),
                canonical_id.clone(),
            );
        }
        if let Some(code) = identity.standard_code.as_deref() {
            inner.by_code.insert(code.to_string(), canonical_id.clone());
        }
        inner
            .by_artist_key
            .entry(normalize(&identity.artist))
            .or_default()
            .push(canonical_id.clone());
        inner.identities.insert(canonical_id, identity.clone());
        Ok(CreateOutcome::Created)
    }

    async fn add_association(
        &self,
        canonical_id: &str,
        update: AssociationUpdate<'_>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.identities.contains_key(canonical_id) {
            return Err(StoreError::Operation(format!(
                "unknown canonical id: {}",
                canonical_id
            )));
        }

        let mut attached = false;

        if let Some(platform_id) = update.platform_id {
            let key = platform_key(update.platform, platform_id);
            if !inner.by_platform.contains_key(&key) {
                inner.by_platform.insert(key, canonical_id.to_string());
                let identity = inner.identities.get_mut(canonical_id).unwrap();
                identity.associations.push(PlatformAssociation {
                    platform: update.platform.clone(),
                    platform_id: platform_id.to_string(),
                });
                attached = true;
            }
        }

        if let Some(code) = update.standard_code {
            let unclaimed = !inner.by_code.contains_key(code);
            let identity_has_none = inner
                .identities
                .get(canonical_id)
                .map(|i| i.standard_code.is_none())
                .unwrap_or(false);
            if unclaimed && identity_has_none {
                inner.by_code.insert(code.to_string(), canonical_id.to_string());
                inner.identities.get_mut(canonical_id).unwrap().standard_code =
                    Some(code.to_string());
                attached = true;
            }
        }

        // Merge metadata reflects writes that actually took effect; a
        // fully-redundant update leaves the record untouched.
        if attached {
            let identity = inner.identities.get_mut(canonical_id).unwrap();
            identity.confidence = update.confidence;
            identity.method = Provenance::FuzzyMerge;
            identity.updated_at = Utc::now();
        }
        Ok(())
    }
}
