//! Descriptor scoring and tiered identity resolution.

mod resolver;
mod scorer;

pub use resolver::{ResolveError, ResolverSettings, TrackResolver};
pub use scorer::{
    score, score_against_identity, EXACT_MATCH_SCORE, FUZZY_ACCEPT_THRESHOLD,
    MIN_CONSIDER_THRESHOLD,
};
