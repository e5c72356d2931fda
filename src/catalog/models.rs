//! Search result types shared between catalog sources and deduplication.

use serde::{Deserialize, Serialize};

use crate::identity_store::PlatformTag;

/// Kind of catalog item a search result describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Song,
    Artist,
    Album,
}

impl ItemKind {
    /// Parses the wire form used in query strings. Unknown kinds are None.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "song" | "track" => Some(ItemKind::Song),
            "artist" => Some(ItemKind::Artist),
            "album" => Some(ItemKind::Album),
            _ => None,
        }
    }
}

/// One search result row as returned by a catalog source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub kind: ItemKind,
    pub title: String,
    pub artist: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artwork_url: Option<String>,
    pub platform: PlatformTag,
    /// Source-native identifier, may be empty for scraped results.
    #[serde(default)]
    pub source_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popularity: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,
}

impl SearchResultItem {
    /// Source id if present and non-blank.
    pub fn valid_source_id(&self) -> Option<&str> {
        let trimmed = self.source_id.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}
