//! Composite similarity scoring between track descriptors.

use strsim::normalized_levenshtein;

use crate::identity_store::{PlatformDescriptor, UniversalTrackIdentity};
use crate::normalize::normalize;

/// Score at or above which two descriptors are treated as the same recording.
pub const FUZZY_ACCEPT_THRESHOLD: f64 = 0.85;

/// Candidates scoring below this are dropped without further consideration.
pub const MIN_CONSIDER_THRESHOLD: f64 = 0.75;

/// Score reported for strong-identifier hits.
pub const EXACT_MATCH_SCORE: f64 = 1.0;

const TITLE_WEIGHT: f64 = 0.5;
const ARTIST_WEIGHT: f64 = 0.4;
const DURATION_WEIGHT: f64 = 0.1;

/// Duration deltas up to this many seconds get full credit. Platforms
/// round track lengths differently.
const DURATION_FULL_CREDIT_SECS: f64 = 3.0;

/// Credit decays linearly and reaches zero at this delta.
const DURATION_ZERO_CREDIT_SECS: f64 = 15.0;

fn text_similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    normalized_levenshtein(&a, &b)
}

fn duration_similarity(a: f64, b: f64) -> f64 {
    let delta = (a - b).abs();
    if delta <= DURATION_FULL_CREDIT_SECS {
        1.0
    } else if delta >= DURATION_ZERO_CREDIT_SECS {
        0.0
    } else {
        1.0 - (delta - DURATION_FULL_CREDIT_SECS)
            / (DURATION_ZERO_CREDIT_SECS - DURATION_FULL_CREDIT_SECS)
    }
}

fn composite(
    title_a: &str,
    artist_a: &str,
    duration_a: Option<f64>,
    title_b: &str,
    artist_b: &str,
    duration_b: Option<f64>,
) -> f64 {
    let title = text_similarity(title_a, title_b);
    let artist = text_similarity(artist_a, artist_b);

    match (duration_a, duration_b) {
        (Some(a), Some(b)) => {
            TITLE_WEIGHT * title
                + ARTIST_WEIGHT * artist
                + DURATION_WEIGHT * duration_similarity(a, b)
        }
        // Either side missing a duration: renormalize over the remaining
        // weights instead of penalizing the pair.
        _ => (TITLE_WEIGHT * title + ARTIST_WEIGHT * artist) / (TITLE_WEIGHT + ARTIST_WEIGHT),
    }
}

/// Composite similarity in `[0, 1]` between two platform descriptors.
pub fn score(a: &PlatformDescriptor, b: &PlatformDescriptor) -> f64 {
    composite(
        &a.title,
        &a.artist,
        a.duration_secs,
        &b.title,
        &b.artist,
        b.duration_secs,
    )
}

/// Composite similarity between a descriptor and a stored identity.
pub fn score_against_identity(
    descriptor: &PlatformDescriptor,
    identity: &UniversalTrackIdentity,
) -> f64 {
    composite(
        &descriptor.title,
        &descriptor.artist,
        descriptor.duration_secs,
        &identity.title,
        &identity.artist,
        identity.duration_secs,
    )
}
