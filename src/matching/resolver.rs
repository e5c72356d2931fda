//! Tiered track identity resolution.
//!
//! Resolution runs three tiers in order:
//! 1. strong identifier lookup (standard code, then platform id),
//! 2. fuzzy candidate matching against same-artist identities,
//! 3. creation of a new canonical identity.
//!
//! Store read failures degrade the tier to a miss so resolution can still
//! fall through to creation. Write failures are surfaced to the caller.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::identity_store::{
    AssociationUpdate, CreateOutcome, IdentityStore, PlatformDescriptor, Provenance, StoreError,
    UniversalTrackIdentity,
};
use crate::normalize::normalize;

use super::scorer::{
    score_against_identity, EXACT_MATCH_SCORE, FUZZY_ACCEPT_THRESHOLD, MIN_CONSIDER_THRESHOLD,
};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("descriptor title or artist is empty after normalization")]
    EmptyDescriptor,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Tunables for the resolver, overridable from the config file.
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// Max same-artist candidates fetched for fuzzy comparison.
    pub candidate_limit: usize,
    /// Descriptors resolved concurrently per batch chunk.
    pub batch_chunk_size: usize,
    /// Pause between batch chunks.
    pub batch_chunk_delay_ms: u64,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            candidate_limit: 10,
            batch_chunk_size: 8,
            batch_chunk_delay_ms: 50,
        }
    }
}

struct MatchCandidate {
    identity: UniversalTrackIdentity,
    score: f64,
}

pub struct TrackResolver {
    store: Arc<dyn IdentityStore>,
    settings: ResolverSettings,
    // Advisory per-track locks serializing the create path. Keyed on the
    // normalized title|artist pair so equivalent descriptors contend.
    creation_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl TrackResolver {
    pub fn new(store: Arc<dyn IdentityStore>, settings: ResolverSettings) -> Self {
        Self {
            store,
            settings,
            creation_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves a platform descriptor to its canonical identity, creating
    /// one if nothing in the store matches.
    pub async fn resolve(
        &self,
        descriptor: &PlatformDescriptor,
    ) -> Result<UniversalTrackIdentity, ResolveError> {
        let title_key = normalize(&descriptor.title);
        let artist_key = normalize(&descriptor.artist);
        if title_key.is_empty() || artist_key.is_empty() {
            return Err(ResolveError::EmptyDescriptor);
        }

        if let Some(identity) = self.strong_id_lookup(descriptor).await {
            debug!(
                canonical_id = %identity.canonical_id,
                platform = %descriptor.platform,
                "strong identifier hit"
            );
            return Ok(identity.with_resolution(Provenance::StrongId, EXACT_MATCH_SCORE));
        }

        if let Some(merged) = self.fuzzy_merge(descriptor, &artist_key).await? {
            return Ok(merged);
        }

        // Nothing matched. Take the per-track lock and re-run the lookup
        // tiers so two concurrent misses converge on one identity.
        let lock = self.creation_lock(&format!("{}|{}", title_key, artist_key));
        let _guard = lock.lock().await;

        if let Some(identity) = self.strong_id_lookup(descriptor).await {
            return Ok(identity.with_resolution(Provenance::StrongId, EXACT_MATCH_SCORE));
        }
        if let Some(merged) = self.fuzzy_merge(descriptor, &artist_key).await? {
            return Ok(merged);
        }

        let identity = UniversalTrackIdentity::from_descriptor(descriptor);
        match self.store.create(&identity).await? {
            CreateOutcome::Created => {
                info!(
                    canonical_id = %identity.canonical_id,
                    title = %descriptor.title,
                    artist = %descriptor.artist,
                    platform = %descriptor.platform,
                    "created new track identity"
                );
                Ok(identity)
            }
            // Lost a race with a writer outside this process. The unique
            // keys caught it, treat the winner as a strong hit.
            CreateOutcome::Existing(existing) => {
                Ok(existing.with_resolution(Provenance::StrongId, EXACT_MATCH_SCORE))
            }
        }
    }

    /// Resolves descriptors in order, a chunk at a time to bound store
    /// pressure. Output order matches input order.
    pub async fn resolve_batch(
        &self,
        descriptors: &[PlatformDescriptor],
    ) -> Vec<Result<UniversalTrackIdentity, ResolveError>> {
        let mut results = Vec::with_capacity(descriptors.len());
        let mut chunks = descriptors.chunks(self.settings.batch_chunk_size.max(1)).peekable();
        while let Some(chunk) = chunks.next() {
            let futures = chunk.iter().map(|d| self.resolve(d));
            results.extend(join_all(futures).await);
            if chunks.peek().is_some() && self.settings.batch_chunk_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.settings.batch_chunk_delay_ms))
                    .await;
            }
        }
        results
    }

    async fn strong_id_lookup(
        &self,
        descriptor: &PlatformDescriptor,
    ) -> Option<UniversalTrackIdentity> {
        if let Some(code) = descriptor.standard_code() {
            match self.store.find_by_standard_code(code).await {
                Ok(Some(identity)) => return Some(identity),
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "standard code lookup failed, treating as miss");
                }
            }
        }
        if let Some(platform_id) = descriptor.platform_id() {
            match self
                .store
                .find_by_platform_id(&descriptor.platform, platform_id)
                .await
            {
                Ok(Some(identity)) => return Some(identity),
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "platform id lookup failed, treating as miss");
                }
            }
        }
        None
    }

    async fn fuzzy_merge(
        &self,
        descriptor: &PlatformDescriptor,
        artist_key: &str,
    ) -> Result<Option<UniversalTrackIdentity>, ResolveError> {
        let candidates = match self
            .store
            .find_candidates_by_normalized_artist(artist_key, self.settings.candidate_limit)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, "candidate lookup failed, skipping fuzzy tier");
                Vec::new()
            }
        };

        let best = candidates
            .into_iter()
            .map(|identity| {
                let score = score_against_identity(descriptor, &identity);
                MatchCandidate { identity, score }
            })
            .filter(|c| c.score >= MIN_CONSIDER_THRESHOLD)
            .max_by(|a, b| a.score.total_cmp(&b.score));

        let Some(best) = best else {
            return Ok(None);
        };
        if best.score < FUZZY_ACCEPT_THRESHOLD {
            debug!(
                canonical_id = %best.identity.canonical_id,
                score = best.score,
                "best candidate below accept threshold"
            );
            return Ok(None);
        }

        self.store
            .add_association(
                &best.identity.canonical_id,
                AssociationUpdate {
                    platform: &descriptor.platform,
                    platform_id: descriptor.platform_id(),
                    standard_code: descriptor.standard_code(),
                    confidence: best.score,
                },
            )
            .await?;

        info!(
            canonical_id = %best.identity.canonical_id,
            platform = %descriptor.platform,
            score = best.score,
            "merged descriptor into existing identity"
        );

        let mut merged = best
            .identity
            .with_resolution(Provenance::FuzzyMerge, best.score);
        if let Some(platform_id) = descriptor.platform_id() {
            if !merged.has_association(&descriptor.platform, platform_id) {
                merged
                    .associations
                    .push(crate::identity_store::PlatformAssociation {
                        platform: descriptor.platform.clone(),
                        platform_id: platform_id.to_string(),
                    });
            }
        }
        if merged.standard_code.is_none() {
            merged.standard_code = descriptor.standard_code().map(str::to_string);
        }
        Ok(Some(merged))
    }

    fn creation_lock(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.creation_locks.lock().unwrap_or_else(|e| e.into_inner());
        // Drop entries nobody is holding before inserting a fresh one.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity_store::{InMemoryIdentityStore, PlatformTag};
    use async_trait::async_trait;

    fn descriptor(
        title: &str,
        artist: &str,
        platform: &str,
        platform_id: Option<&str>,
    ) -> PlatformDescriptor {
        PlatformDescriptor {
            title: title.to_string(),
            artist: artist.to_string(),
            album: None,
            duration_secs: Some(200.0),
            platform: PlatformTag::new(platform),
            platform_id: platform_id.map(str::to_string),
            standard_code: None,
        }
    }

    fn resolver(store: Arc<dyn IdentityStore>) -> TrackResolver {
        TrackResolver::new(
            store,
            ResolverSettings {
                batch_chunk_delay_ms: 0,
                ..ResolverSettings::default()
            },
        )
    }

    #[tokio::test]
    async fn test_empty_descriptor_rejected() {
        let store = Arc::new(InMemoryIdentityStore::new());
        let resolver = resolver(store);

        let blank_title = descriptor("   ", "Mitski", "spotify", None);
        assert!(matches!(
            resolver.resolve(&blank_title).await,
            Err(ResolveError::EmptyDescriptor)
        ));

        let blank_artist = descriptor("Washing Machine Heart", "", "spotify", None);
        assert!(matches!(
            resolver.resolve(&blank_artist).await,
            Err(ResolveError::EmptyDescriptor)
        ));
    }

    #[tokio::test]
    async fn test_unknown_track_creates_identity() {
        let store = Arc::new(InMemoryIdentityStore::new());
        let resolver = resolver(store.clone());

        let resolved = resolver
            .resolve(&descriptor("Nikes", "Frank Ocean", "spotify", Some("S1")))
            .await
            .unwrap();
        assert_eq!(resolved.method, Provenance::New);
        assert_eq!(resolved.confidence, 0.0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_repeat_resolve_hits_strong_identifier() {
        let store = Arc::new(InMemoryIdentityStore::new());
        let resolver = resolver(store.clone());
        let d = descriptor("Nikes", "Frank Ocean", "spotify", Some("S1"));

        let first = resolver.resolve(&d).await.unwrap();
        let second = resolver.resolve(&d).await.unwrap();
        assert_eq!(second.canonical_id, first.canonical_id);
        assert_eq!(second.method, Provenance::StrongId);
        assert_eq!(second.confidence, 1.0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_wire_cased_platform_tag_hits_strong_identifier() {
        let store = Arc::new(InMemoryIdentityStore::new());
        let resolver = resolver(store.clone());

        // Descriptor as it arrives over HTTP, platform tag not yet lowercase.
        let wire: PlatformDescriptor = serde_json::from_str(
            r#"{"title":"Nikes","artist":"Frank Ocean","platform":"Spotify","platform_id":"S1"}"#,
        )
        .unwrap();
        let first = resolver.resolve(&wire).await.unwrap();

        let second = resolver
            .resolve(&descriptor("Nikes", "Frank Ocean", "spotify", Some("S1")))
            .await
            .unwrap();
        assert_eq!(second.canonical_id, first.canonical_id);
        assert_eq!(second.method, Provenance::StrongId);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_standard_code_links_across_platforms() {
        let store = Arc::new(InMemoryIdentityStore::new());
        let resolver = resolver(store.clone());

        let mut spotify = descriptor("Anti-Hero", "Taylor Swift", "spotify", Some("S1"));
        spotify.standard_code = Some("USUG12209279".to_string());
        let first = resolver.resolve(&spotify).await.unwrap();

        let mut apple = descriptor("Anti-Hero", "Taylor Swift", "apple_music", Some("A1"));
        apple.standard_code = Some("USUG12209279".to_string());
        let second = resolver.resolve(&apple).await.unwrap();

        assert_eq!(second.canonical_id, first.canonical_id);
        assert_eq!(second.method, Provenance::StrongId);
    }

    #[tokio::test]
    async fn test_fuzzy_merge_near_variant() {
        let store = Arc::new(InMemoryIdentityStore::new());
        let resolver = resolver(store.clone());

        let first = resolver
            .resolve(&descriptor("Anti-Hero", "Taylor Swift", "spotify", Some("S1")))
            .await
            .unwrap();
        let merged = resolver
            .resolve(&descriptor("Anti Hero", "Taylor Swift", "apple_music", Some("A1")))
            .await
            .unwrap();

        assert_eq!(merged.canonical_id, first.canonical_id);
        assert_eq!(merged.method, Provenance::FuzzyMerge);
        assert!(merged.confidence >= FUZZY_ACCEPT_THRESHOLD);
        assert!(merged.has_association(&PlatformTag::new("apple_music"), "A1"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_duration_rounding_does_not_block_merge() {
        let store = Arc::new(InMemoryIdentityStore::new());
        let resolver = resolver(store.clone());

        let mut spotify = descriptor("SICKO MODE", "Travis Scott", "spotify", Some("S1"));
        spotify.duration_secs = Some(312.0);
        let first = resolver.resolve(&spotify).await.unwrap();

        let mut apple = descriptor("SICKO MODE", "Travis Scott", "apple_music", Some("A1"));
        apple.duration_secs = Some(312.8);
        let merged = resolver.resolve(&apple).await.unwrap();

        assert_eq!(merged.canonical_id, first.canonical_id);
        assert_eq!(merged.method, Provenance::FuzzyMerge);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_different_song_same_artist_stays_separate() {
        let store = Arc::new(InMemoryIdentityStore::new());
        let resolver = resolver(store.clone());

        let first = resolver
            .resolve(&descriptor("Kyoto", "Phoebe Bridgers", "spotify", Some("S1")))
            .await
            .unwrap();
        let second = resolver
            .resolve(&descriptor("Garden Song", "Phoebe Bridgers", "spotify", Some("S2")))
            .await
            .unwrap();

        assert_ne!(second.canonical_id, first.canonical_id);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_equivalent_descriptors_converge() {
        let store = Arc::new(InMemoryIdentityStore::new());
        let resolver = Arc::new(resolver(store.clone()));

        let mut handles = Vec::new();
        for i in 0..8 {
            let resolver = resolver.clone();
            handles.push(tokio::spawn(async move {
                let platform_id = format!("S{}", i);
                resolver
                    .resolve(&descriptor(
                        "Breathe Deeper",
                        "Tame Impala",
                        "spotify",
                        Some(platform_id.as_str()),
                    ))
                    .await
                    .unwrap()
            }));
        }

        let mut canonical_ids = Vec::new();
        for handle in handles {
            canonical_ids.push(handle.await.unwrap().canonical_id);
        }
        canonical_ids.dedup();
        assert_eq!(canonical_ids.len(), 1, "all resolves should share one identity");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let store = Arc::new(InMemoryIdentityStore::new());
        let resolver = resolver(store);

        let descriptors = vec![
            descriptor("Kyoto", "Phoebe Bridgers", "spotify", Some("S1")),
            descriptor("", "Phoebe Bridgers", "spotify", None),
            descriptor("Garden Song", "Phoebe Bridgers", "spotify", Some("S2")),
        ];
        let results = resolver.resolve_batch(&descriptors).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().title, "Kyoto");
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().title, "Garden Song");
    }

    // A store whose reads always fail but whose writes succeed, for
    // exercising read degradation.
    struct ReadFailingStore {
        inner: InMemoryIdentityStore,
    }

    #[async_trait]
    impl IdentityStore for ReadFailingStore {
        async fn find_by_platform_id(
            &self,
            _platform: &PlatformTag,
            _platform_id: &str,
        ) -> Result<Option<UniversalTrackIdentity>, StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }

        async fn find_by_standard_code(
            &self,
            _code: &str,
        ) -> Result<Option<UniversalTrackIdentity>, StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }

        async fn find_candidates_by_normalized_artist(
            &self,
            _artist_key: &str,
            _limit: usize,
        ) -> Result<Vec<UniversalTrackIdentity>, StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }

        async fn create(
            &self,
            identity: &UniversalTrackIdentity,
        ) -> Result<CreateOutcome, StoreError> {
            self.inner.create(identity).await
        }

        async fn add_association(
            &self,
            canonical_id: &str,
            update: AssociationUpdate<'_>,
        ) -> Result<(), StoreError> {
            self.inner.add_association(canonical_id, update).await
        }
    }

    #[tokio::test]
    async fn test_read_failures_degrade_to_creation() {
        let store = Arc::new(ReadFailingStore {
            inner: InMemoryIdentityStore::new(),
        });
        let resolver = resolver(store);

        let resolved = resolver
            .resolve(&descriptor("Nikes", "Frank Ocean", "spotify", Some("S1")))
            .await
            .unwrap();
        assert_eq!(resolved.method, Provenance::New);
    }
}
