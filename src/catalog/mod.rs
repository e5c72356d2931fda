//! Catalog sources searched by the unified search endpoint.

mod models;
mod remote;

pub use models::{ItemKind, SearchResultItem};
pub use remote::HttpCatalogSource;

use async_trait::async_trait;
use thiserror::Error;

use crate::identity_store::PlatformTag;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("catalog source transport error: {0}")]
    Transport(String),
    #[error("catalog source returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// A searchable music catalog, usually a remote platform API.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    fn platform(&self) -> &PlatformTag;

    /// Searches the source. `kinds` narrows the result types; an empty
    /// slice means all kinds.
    async fn search(
        &self,
        query: &str,
        kinds: &[ItemKind],
        limit: usize,
    ) -> Result<Vec<SearchResultItem>, SourceError>;
}
