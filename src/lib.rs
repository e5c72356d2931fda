//! Songbridge Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod catalog;
pub mod config;
pub mod dedup;
pub mod identity_store;
pub mod matching;
pub mod normalize;
pub mod server;
pub mod service;

// Re-export commonly used types for convenience
pub use identity_store::{
    IdentityStore, PlatformDescriptor, PlatformTag, Provenance, UniversalTrackIdentity,
};
pub use matching::{ResolverSettings, TrackResolver};
pub use server::run_server;
pub use service::MatchingService;
