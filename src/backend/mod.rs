//! Storage backend capabilities.
//!
//! The lifecycle controllers only talk to storage through the traits in this
//! module. Listings cross the boundary as typed string sequences; backends
//! that speak the packed-name wire format go through [`PackedAdapter`], which
//! decodes each page once before the core sees it.
//!
//! A handle is disconnected when it is dropped.

#[cfg(feature = "catalog")]
mod catalog;
mod memory;
pub mod names;
mod packed;

use std::collections::BTreeMap;

use url::Url;

use crate::{Error, Result};

#[cfg(feature = "catalog")]
pub use catalog::CatalogBackend;
pub use memory::MemoryBackend;
pub use names::{decode_names, NameStream, PackedNames};
pub use packed::{PackedAdapter, PackedListing, PackedPage};

/// Opaque principal forwarded to every backend call.
///
/// The controllers never look inside; only backends interpret it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Identity(u64);

impl Identity {
    pub fn new(token: u64) -> Self {
        Self(token)
    }

    pub fn token(&self) -> u64 {
        self.0
    }
}

/// Continuation offset for paginated listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cursor(u32);

impl Cursor {
    pub const START: Cursor = Cursor(0);

    pub fn new(offset: u32) -> Self {
        Self(offset)
    }

    pub fn offset(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStatus {
    /// This is the last page.
    Done,
    /// More pages remain; resume from the page's `next_cursor`.
    Continue,
}

/// How a backend's object listing must be driven.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PageMode {
    #[default]
    Paginated,
    /// The backend answers with everything in one call and ignores cursors.
    SingleShot,
}

/// One page of an object listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ListPage {
    pub names: Vec<String>,
    pub next_cursor: Cursor,
    pub status: ListStatus,
}

impl ListPage {
    pub fn done(names: Vec<String>) -> Self {
        Self {
            names,
            next_cursor: Cursor::START,
            status: ListStatus::Done,
        }
    }

    pub fn more(names: Vec<String>, next_cursor: Cursor) -> Self {
        Self {
            names,
            next_cursor,
            status: ListStatus::Continue,
        }
    }

    pub fn total(&self) -> usize {
        self.names.len()
    }
}

/// Timing facts and attributes of one object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectInfo {
    pub last_modification: f64,
    pub last_access: f64,
    pub read_only: bool,
}

/// Stored state of one object in the in-process and catalog backends.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "catalog", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjectRecord {
    pub last_modification: f64,
    #[cfg_attr(feature = "catalog", serde(default))]
    pub last_access: f64,
    #[cfg_attr(feature = "catalog", serde(default))]
    pub read_only: bool,
    #[cfg_attr(feature = "catalog", serde(default))]
    pub metadata: BTreeMap<String, Vec<u8>>,
}

impl ObjectRecord {
    pub fn new(last_modification: f64) -> Self {
        Self {
            last_modification,
            last_access: last_modification,
            ..Self::default()
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn info(&self) -> ObjectInfo {
        ObjectInfo {
            last_modification: self.last_modification,
            last_access: self.last_access,
            read_only: self.read_only,
        }
    }
}

/// Bucket and object enumeration.
pub trait Listing {
    fn list_buckets(&self, identity: &Identity) -> Result<Vec<String>>;

    /// Lists the objects of `bucket` that carry the metadata key `key`,
    /// starting at `cursor`.
    fn list_objects_with_metadata(
        &self,
        identity: &Identity,
        bucket: &str,
        key: &str,
        cursor: Cursor,
    ) -> Result<ListPage>;

    fn listing_mode(&self) -> PageMode {
        PageMode::Paginated
    }
}

/// Per-object reads and mutations.
pub trait ObjectStore {
    fn read_object_metadata(
        &self,
        identity: &Identity,
        bucket: &str,
        object: &str,
        key: &str,
    ) -> Result<Vec<u8>>;

    fn object_info(&self, identity: &Identity, bucket: &str, object: &str) -> Result<ObjectInfo>;

    fn delete_object(&self, identity: &Identity, bucket: &str, object: &str) -> Result<()>;

    /// Must succeed without change when the object is already read-only.
    fn set_object_read_only(&self, identity: &Identity, bucket: &str, object: &str)
        -> Result<()>;
}

/// Everything a lifecycle scan needs from storage.
pub trait StorageBackend: Listing + ObjectStore {}

impl<T: Listing + ObjectStore + ?Sized> StorageBackend for T {}

/// Opens a backend handle for a connection string.
///
/// Supported: `file:///path/to/catalog[?page_size=N]`.
pub fn connect(uri: &str) -> Result<Box<dyn StorageBackend>> {
    let url = Url::parse(uri).map_err(|err| Error::UnsupportedUri(format!("{uri}: {err}")))?;
    match url.scheme() {
        #[cfg(feature = "catalog")]
        "file" => Ok(Box::new(CatalogBackend::open_url(&url)?)),
        scheme => Err(Error::UnsupportedUri(format!(
            "{uri}: no backend for scheme '{scheme}'"
        ))),
    }
}

pub(crate) fn object_path(bucket: &str, object: &str) -> String {
    format!("{bucket}/{object}")
}
