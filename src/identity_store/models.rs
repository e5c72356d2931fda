//! Core models for canonical track identities.
//!
//! A `PlatformDescriptor` is what a catalog source reports about a track; a
//! `UniversalTrackIdentity` is the single canonical record the rest of the
//! application keys social data on, regardless of which source reported it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Confidence recorded on identities minted from a descriptor with no
/// existing match. 0.0 is a sentinel meaning "unknown", not "bad".
pub const NEW_IDENTITY_CONFIDENCE: f64 = 0.0;

// =============================================================================
// Platform tag
// =============================================================================

/// Opaque tag identifying a catalog source ("spotify", "apple_music", ...).
/// Always stored lowercase so tags compare and index consistently. The serde
/// conversions go through `new` so a mixed-case tag arriving over the wire
/// canonicalizes the same way as one constructed in code.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct PlatformTag(String);

impl PlatformTag {
    pub fn new(tag: impl AsRef<str>) -> Self {
        Self(tag.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for PlatformTag {
    fn from(tag: String) -> Self {
        Self::new(tag)
    }
}

impl From<PlatformTag> for String {
    fn from(tag: PlatformTag) -> Self {
        tag.0
    }
}

impl fmt::Display for PlatformTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Descriptor (resolver input)
// =============================================================================

/// A source-specific description of a track, constructed per lookup.
///
/// Optional string fields may arrive blank from upstream APIs; the accessor
/// methods treat whitespace-only values as absent so a malformed standard
/// code is ignored rather than treated as an error.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlatformDescriptor {
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub duration_secs: Option<f64>,
    pub platform: PlatformTag,
    #[serde(default)]
    pub platform_id: Option<String>,
    #[serde(default)]
    pub standard_code: Option<String>,
}

impl PlatformDescriptor {
    /// The source-specific id, if present and non-blank.
    pub fn platform_id(&self) -> Option<&str> {
        self.platform_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// The standard recording code, if present and non-blank.
    pub fn standard_code(&self) -> Option<&str> {
        self.standard_code
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

// =============================================================================
// Canonical identity
// =============================================================================

/// How a resolution arrived at its identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provenance {
    #[serde(rename = "strong-id")]
    StrongId,
    #[serde(rename = "fuzzy-merge")]
    FuzzyMerge,
    #[serde(rename = "new")]
    New,
}

impl Provenance {
    /// Convert from database string representation
    pub fn from_db_str(s: &str) -> Self {
        match s {
            "strong-id" => Provenance::StrongId,
            "fuzzy-merge" => Provenance::FuzzyMerge,
            _ => Provenance::New,
        }
    }

    /// Convert to database string representation
    pub fn to_db_str(&self) -> &'static str {
        match self {
            Provenance::StrongId => "strong-id",
            Provenance::FuzzyMerge => "fuzzy-merge",
            Provenance::New => "new",
        }
    }
}

/// One (platform, platform id) association on a canonical identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformAssociation {
    pub platform: PlatformTag,
    pub platform_id: String,
}

/// The canonical record for one track across all catalog sources.
///
/// The canonical id is immutable once assigned; associations only ever
/// accumulate. `confidence` and `method` describe the most recent resolution
/// that produced or updated the record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UniversalTrackIdentity {
    pub canonical_id: String,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration_secs: Option<f64>,
    pub associations: Vec<PlatformAssociation>,
    pub standard_code: Option<String>,
    pub confidence: f64,
    pub method: Provenance,
    pub updated_at: DateTime<Utc>,
}

impl UniversalTrackIdentity {
    /// Mint a brand-new identity from a descriptor (tier 3 creation).
    pub fn from_descriptor(descriptor: &PlatformDescriptor) -> Self {
        let associations = descriptor
            .platform_id()
            .map(|id| {
                vec![PlatformAssociation {
                    platform: descriptor.platform.clone(),
                    platform_id: id.to_string(),
                }]
            })
            .unwrap_or_default();

        Self {
            canonical_id: uuid::Uuid::new_v4().to_string(),
            title: descriptor.title.clone(),
            artist: descriptor.artist.clone(),
            album: descriptor.album.clone(),
            duration_secs: descriptor.duration_secs,
            associations,
            standard_code: descriptor.standard_code().map(str::to_string),
            confidence: NEW_IDENTITY_CONFIDENCE,
            method: Provenance::New,
            updated_at: Utc::now(),
        }
    }

    /// Whether this identity already carries the given (platform, id) pair.
    pub fn has_association(&self, platform: &PlatformTag, platform_id: &str) -> bool {
        self.associations
            .iter()
            .any(|a| &a.platform == platform && a.platform_id == platform_id)
    }

    /// A copy annotated with how the current resolution matched it. Used for
    /// the value returned to callers; the stored record is not rewritten on
    /// read-only (tier 1) hits.
    pub fn with_resolution(mut self, method: Provenance, confidence: f64) -> Self {
        self.method = method;
        self.confidence = confidence;
        self
    }
}
