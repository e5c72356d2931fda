//! HTTP-backed catalog source.
//!
//! Talks to a platform search gateway exposing `GET {base}/search`. Rows
//! missing a title or artist are dropped rather than failing the whole
//! response.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::identity_store::PlatformTag;

use super::models::{ItemKind, SearchResultItem};
use super::{CatalogSource, SourceError};

pub struct HttpCatalogSource {
    platform: PlatformTag,
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchResponseItem>,
}

#[derive(Deserialize)]
struct SearchResponseItem {
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    album: Option<String>,
    #[serde(default)]
    artwork_url: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    popularity: Option<u32>,
    #[serde(default)]
    genres: Vec<String>,
}

impl HttpCatalogSource {
    pub fn new(
        platform: PlatformTag,
        base_url: String,
        timeout_secs: u64,
    ) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SourceError::Transport(e.to_string()))?;
        Ok(Self {
            platform,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn convert(&self, row: SearchResponseItem) -> Option<SearchResultItem> {
        let kind = ItemKind::parse(row.kind.as_deref()?)?;
        let title = row.title.filter(|t| !t.trim().is_empty())?;
        let artist = row.artist.filter(|a| !a.trim().is_empty())?;
        Some(SearchResultItem {
            kind,
            title,
            artist,
            album: row.album,
            artwork_url: row.artwork_url,
            platform: self.platform.clone(),
            source_id: row.id.unwrap_or_default(),
            popularity: row.popularity,
            genres: row.genres,
        })
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    fn platform(&self) -> &PlatformTag {
        &self.platform
    }

    async fn search(
        &self,
        query: &str,
        kinds: &[ItemKind],
        limit: usize,
    ) -> Result<Vec<SearchResultItem>, SourceError> {
        let url = format!("{}/search", self.base_url);
        let mut request = self
            .client
            .get(&url)
            .query(&[("q", query), ("limit", &limit.to_string())]);
        if !kinds.is_empty() {
            let kinds_param = kinds
                .iter()
                .map(|k| match k {
                    ItemKind::Song => "song",
                    ItemKind::Artist => "artist",
                    ItemKind::Album => "album",
                })
                .collect::<Vec<_>>()
                .join(",");
            request = request.query(&[("kinds", kinds_param.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(SourceError::InvalidResponse(format!(
                "search returned status {}",
                response.status()
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| SourceError::InvalidResponse(e.to_string()))?;

        let items: Vec<SearchResultItem> = body
            .items
            .into_iter()
            .filter_map(|row| self.convert(row))
            .take(limit)
            .collect();
        debug!(platform = %self.platform, count = items.len(), "catalog search returned");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> HttpCatalogSource {
        HttpCatalogSource::new(
            PlatformTag::new("spotify"),
            "http://localhost:9999/".to_string(),
            5,
        )
        .unwrap()
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        assert_eq!(source().base_url, "http://localhost:9999");
    }

    #[test]
    fn test_convert_drops_rows_missing_required_fields() {
        let s = source();
        let row = SearchResponseItem {
            kind: Some("song".to_string()),
            title: Some("  ".to_string()),
            artist: Some("Frank Ocean".to_string()),
            album: None,
            artwork_url: None,
            id: Some("S1".to_string()),
            popularity: None,
            genres: Vec::new(),
        };
        assert!(s.convert(row).is_none());

        let row = SearchResponseItem {
            kind: Some("playlist".to_string()),
            title: Some("Nikes".to_string()),
            artist: Some("Frank Ocean".to_string()),
            album: None,
            artwork_url: None,
            id: None,
            popularity: None,
            genres: Vec::new(),
        };
        assert!(s.convert(row).is_none());
    }

    #[test]
    fn test_convert_maps_fields() {
        let s = source();
        let row = SearchResponseItem {
            kind: Some("song".to_string()),
            title: Some("Nikes".to_string()),
            artist: Some("Frank Ocean".to_string()),
            album: Some("Blonde".to_string()),
            artwork_url: Some("https://img.example/1.jpg".to_string()),
            id: Some("S1".to_string()),
            popularity: Some(88),
            genres: vec!["r&b".to_string()],
        };
        let item = s.convert(row).unwrap();
        assert_eq!(item.kind, ItemKind::Song);
        assert_eq!(item.platform.as_str(), "spotify");
        assert_eq!(item.source_id, "S1");
        assert_eq!(item.popularity, Some(88));
    }
}
