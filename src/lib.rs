//! Metadata-driven lifecycle controllers for object storage.
//!
//! Objects opt into a lifecycle rule by carrying a metadata key. A controller
//! run lists every bucket, finds the objects tagged with its key, and either
//! deletes them (`ExpiresAt`) or makes them read-only (`ReadOnlyAfter`).
//! Storage is reached only through the capability traits in [`backend`].

pub mod backend;
#[cfg(feature = "cli")]
pub mod cli;
pub mod clock;
pub mod error;
pub mod lifecycle;

pub use backend::{connect, Identity, StorageBackend};
pub use error::{Error, Result, Severity};
pub use lifecycle::{ExpiresAt, LifecycleScanner, ReadOnlyAfter, ScanStats};
