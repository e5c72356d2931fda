//! Application service tying resolution and unified search together.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use crate::catalog::{CatalogSource, ItemKind, SearchResultItem};
use crate::dedup::{deduplicate, merge, MergePolicy};
use crate::identity_store::{PlatformDescriptor, UniversalTrackIdentity};
use crate::matching::{ResolveError, TrackResolver};

pub struct MatchingService {
    resolver: TrackResolver,
    sources: Vec<Arc<dyn CatalogSource>>,
    merge_policy: MergePolicy,
}

impl MatchingService {
    pub fn new(
        resolver: TrackResolver,
        sources: Vec<Arc<dyn CatalogSource>>,
        merge_policy: MergePolicy,
    ) -> Self {
        Self {
            resolver,
            sources,
            merge_policy,
        }
    }

    pub async fn resolve_track(
        &self,
        descriptor: &PlatformDescriptor,
    ) -> Result<UniversalTrackIdentity, ResolveError> {
        self.resolver.resolve(descriptor).await
    }

    pub async fn resolve_batch(
        &self,
        descriptors: &[PlatformDescriptor],
    ) -> Vec<Result<UniversalTrackIdentity, ResolveError>> {
        self.resolver.resolve_batch(descriptors).await
    }

    /// Fans the query out to every configured source, merges the lists
    /// under the configured policy and collapses near-duplicates. A source
    /// that fails contributes nothing instead of failing the search.
    pub async fn search_unified(
        &self,
        query: &str,
        kinds: &[ItemKind],
        limit: usize,
    ) -> Vec<SearchResultItem> {
        let searches = self
            .sources
            .iter()
            .map(|source| async move {
                match source.search(query, kinds, limit).await {
                    Ok(items) => items,
                    Err(e) => {
                        warn!(
                            platform = %source.platform(),
                            error = %e,
                            "catalog source failed, continuing without it"
                        );
                        Vec::new()
                    }
                }
            })
            .collect::<Vec<_>>();
        let lists = join_all(searches).await;

        let merged = merge(lists, self.merge_policy);
        let mut results = deduplicate(merged);
        results.truncate(limit);
        info!(query = %query, count = results.len(), "unified search complete");
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SourceError;
    use crate::identity_store::{InMemoryIdentityStore, PlatformTag};
    use crate::matching::ResolverSettings;
    use async_trait::async_trait;

    struct StubSource {
        platform: PlatformTag,
        items: Vec<SearchResultItem>,
        fail: bool,
    }

    #[async_trait]
    impl CatalogSource for StubSource {
        fn platform(&self) -> &PlatformTag {
            &self.platform
        }

        async fn search(
            &self,
            _query: &str,
            _kinds: &[ItemKind],
            _limit: usize,
        ) -> Result<Vec<SearchResultItem>, SourceError> {
            if self.fail {
                return Err(SourceError::Transport("connection refused".to_string()));
            }
            Ok(self.items.clone())
        }
    }

    fn song(title: &str, platform: &str, source_id: &str) -> SearchResultItem {
        SearchResultItem {
            kind: ItemKind::Song,
            title: title.to_string(),
            artist: "Frank Ocean".to_string(),
            album: None,
            artwork_url: None,
            platform: PlatformTag::new(platform),
            source_id: source_id.to_string(),
            popularity: None,
            genres: Vec::new(),
        }
    }

    fn service(sources: Vec<Arc<dyn CatalogSource>>) -> MatchingService {
        let store = Arc::new(InMemoryIdentityStore::new());
        MatchingService::new(
            TrackResolver::new(store, ResolverSettings::default()),
            sources,
            MergePolicy::PrimaryFirst,
        )
    }

    #[tokio::test]
    async fn test_search_merges_and_deduplicates() {
        let spotify = Arc::new(StubSource {
            platform: PlatformTag::new("spotify"),
            items: vec![song("Nikes", "spotify", "S1"), song("Ivy", "spotify", "S2")],
            fail: false,
        });
        let apple = Arc::new(StubSource {
            platform: PlatformTag::new("apple_music"),
            items: vec![song("NIKES", "apple_music", "A1")],
            fail: false,
        });

        let service = service(vec![spotify, apple]);
        let results = service.search_unified("nikes", &[], 20).await;
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_source_degrades_to_partial_results() {
        let healthy = Arc::new(StubSource {
            platform: PlatformTag::new("spotify"),
            items: vec![song("Nikes", "spotify", "S1")],
            fail: false,
        });
        let broken = Arc::new(StubSource {
            platform: PlatformTag::new("apple_music"),
            items: Vec::new(),
            fail: true,
        });

        let service = service(vec![healthy, broken]);
        let results = service.search_unified("nikes", &[], 20).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].platform.as_str(), "spotify");
    }

    #[tokio::test]
    async fn test_search_respects_limit() {
        let items = (0..10)
            .map(|i| song(&format!("Track {}", i), "spotify", &format!("S{}", i)))
            .collect();
        let source = Arc::new(StubSource {
            platform: PlatformTag::new("spotify"),
            items,
            fail: false,
        });

        let service = service(vec![source]);
        let results = service.search_unified("track", &[], 3).await;
        assert_eq!(results.len(), 3);
    }
}
