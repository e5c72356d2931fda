//! Canonical track identity storage.

mod memory_store;
mod models;
mod schema;
mod sqlite_store;
mod trait_def;

pub use memory_store::InMemoryIdentityStore;
pub use models::{
    PlatformAssociation, PlatformDescriptor, PlatformTag, Provenance, UniversalTrackIdentity,
    NEW_IDENTITY_CONFIDENCE,
};
pub use sqlite_store::SqliteIdentityStore;
pub use trait_def::{AssociationUpdate, CreateOutcome, IdentityStore, StoreError};
