//! Adapter for backends that list names in the packed wire format.

use crate::backend::names::PackedNames;
use crate::backend::{
    Cursor, Identity, ListPage, ListStatus, Listing, ObjectInfo, ObjectStore, PageMode,
};
use crate::Result;

/// A packed object-listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedPage {
    pub names: PackedNames,
    pub next_cursor: Cursor,
    pub status: ListStatus,
}

/// Listing calls of a backend that returns packed name buffers.
pub trait PackedListing {
    fn list_buckets_packed(&self, identity: &Identity) -> Result<PackedNames>;

    fn list_objects_packed(
        &self,
        identity: &Identity,
        bucket: &str,
        key: &str,
        cursor: Cursor,
    ) -> Result<PackedPage>;

    fn listing_mode(&self) -> PageMode {
        PageMode::Paginated
    }
}

/// Exposes a packed-listing backend through the typed [`Listing`] trait.
///
/// Every page is decoded exactly once, here. A page whose buffer holds fewer
/// names than it declares is reported as an error for that call.
#[derive(Debug)]
pub struct PackedAdapter<P> {
    inner: P,
}

impl<P> PackedAdapter<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn into_inner(self) -> P {
        self.inner
    }
}

impl<P: PackedListing> Listing for PackedAdapter<P> {
    fn list_buckets(&self, identity: &Identity) -> Result<Vec<String>> {
        self.inner.list_buckets_packed(identity)?.decode()
    }

    fn list_objects_with_metadata(
        &self,
        identity: &Identity,
        bucket: &str,
        key: &str,
        cursor: Cursor,
    ) -> Result<ListPage> {
        let page = self.inner.list_objects_packed(identity, bucket, key, cursor)?;
        Ok(ListPage {
            names: page.names.decode()?,
            next_cursor: page.next_cursor,
            status: page.status,
        })
    }

    fn listing_mode(&self) -> PageMode {
        self.inner.listing_mode()
    }
}

impl<P: ObjectStore> ObjectStore for PackedAdapter<P> {
    fn read_object_metadata(
        &self,
        identity: &Identity,
        bucket: &str,
        object: &str,
        key: &str,
    ) -> Result<Vec<u8>> {
        self.inner.read_object_metadata(identity, bucket, object, key)
    }

    fn object_info(&self, identity: &Identity, bucket: &str, object: &str) -> Result<ObjectInfo> {
        self.inner.object_info(identity, bucket, object)
    }

    fn delete_object(&self, identity: &Identity, bucket: &str, object: &str) -> Result<()> {
        self.inner.delete_object(identity, bucket, object)
    }

    fn set_object_read_only(
        &self,
        identity: &Identity,
        bucket: &str,
        object: &str,
    ) -> Result<()> {
        self.inner.set_object_read_only(identity, bucket, object)
    }
}
