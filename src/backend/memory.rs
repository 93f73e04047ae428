//! In-process backend.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::backend::{
    object_path, Cursor, Identity, ListPage, Listing, ObjectInfo, ObjectRecord, ObjectStore,
};
use crate::clock::{Clock, SystemClock};
use crate::{Error, Result};

const DEFAULT_PAGE_SIZE: usize = 1024;

type Buckets = BTreeMap<String, BTreeMap<String, ObjectRecord>>;

/// A backend holding buckets and objects in memory.
///
/// Listings are ordered by name. The object-listing cursor counts every
/// object walked, including the ones without the requested key, so a page
/// boundary never shifts when metadata changes on earlier objects.
#[derive(Debug)]
pub struct MemoryBackend {
    buckets: Mutex<Buckets>,
    page_size: usize,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(BTreeMap::new()),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Caps the number of names returned per listing page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn create_bucket(&self, bucket: &str) -> Result<()> {
        self.lock()?.entry(bucket.to_string()).or_default();
        Ok(())
    }

    /// Creates or replaces an object, creating its bucket if needed.
    pub fn put_object(&self, bucket: &str, object: &str, record: ObjectRecord) -> Result<()> {
        self.lock()?
            .entry(bucket.to_string())
            .or_default()
            .insert(object.to_string(), record);
        Ok(())
    }

    pub fn object(&self, bucket: &str, object: &str) -> Result<Option<ObjectRecord>> {
        Ok(self
            .lock()?
            .get(bucket)
            .and_then(|objects| objects.get(object))
            .cloned())
    }

    /// Fails only when the lock is poisoned.
    pub fn contains(&self, bucket: &str, object: &str) -> Result<bool> {
        Ok(self.object(bucket, object)?.is_some())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Buckets>> {
        self.buckets
            .lock()
            .map_err(|_| Error::Backend("memory backend lock poisoned".to_string()))
    }
}

fn record_mut<'a>(
    buckets: &'a mut Buckets,
    bucket: &str,
    object: &str,
) -> Result<&'a mut ObjectRecord> {
    buckets
        .get_mut(bucket)
        .ok_or_else(|| Error::NotFound(bucket.to_string()))?
        .get_mut(object)
        .ok_or_else(|| Error::NotFound(object_path(bucket, object)))
}

impl Listing for MemoryBackend {
    fn list_buckets(&self, _identity: &Identity) -> Result<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    fn list_objects_with_metadata(
        &self,
        _identity: &Identity,
        bucket: &str,
        key: &str,
        cursor: Cursor,
    ) -> Result<ListPage> {
        let buckets = self.lock()?;
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| Error::NotFound(bucket.to_string()))?;

        let start = cursor.offset() as usize;
        let mut names = Vec::new();
        for (walked, (name, record)) in objects.iter().enumerate().skip(start) {
            if !record.metadata.contains_key(key) {
                continue;
            }
            names.push(name.clone());
            if names.len() == self.page_size && walked + 1 < objects.len() {
                let next = u32::try_from(walked + 1)
                    .map_err(|_| Error::Backend("listing offset overflow".to_string()))?;
                return Ok(ListPage::more(names, Cursor::new(next)));
            }
        }
        Ok(ListPage::done(names))
    }
}

impl ObjectStore for MemoryBackend {
    fn read_object_metadata(
        &self,
        _identity: &Identity,
        bucket: &str,
        object: &str,
        key: &str,
    ) -> Result<Vec<u8>> {
        let mut buckets = self.lock()?;
        let record = record_mut(&mut buckets, bucket, object)?;
        let value = record
            .metadata
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("{}#{key}", object_path(bucket, object))))?;
        record.last_access = SystemClock.now();
        Ok(value)
    }

    fn object_info(&self, _identity: &Identity, bucket: &str, object: &str) -> Result<ObjectInfo> {
        let mut buckets = self.lock()?;
        Ok(record_mut(&mut buckets, bucket, object)?.info())
    }

    fn delete_object(&self, _identity: &Identity, bucket: &str, object: &str) -> Result<()> {
        let mut buckets = self.lock()?;
        if record_mut(&mut buckets, bucket, object)?.read_only {
            return Err(Error::ReadOnly(object_path(bucket, object)));
        }
        if let Some(objects) = buckets.get_mut(bucket) {
            objects.remove(object);
        }
        Ok(())
    }

    fn set_object_read_only(
        &self,
        _identity: &Identity,
        bucket: &str,
        object: &str,
    ) -> Result<()> {
        let mut buckets = self.lock()?;
        record_mut(&mut buckets, bucket, object)?.read_only = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ListStatus;

    fn tagged(key: &str) -> ObjectRecord {
        ObjectRecord::new(100.0).with_metadata(key, 1.0f64.to_ne_bytes().to_vec())
    }

    #[test]
    fn lists_only_tagged_objects() {
        let backend = MemoryBackend::new();
        backend.put_object("b", "a", tagged("ExpiresAt")).unwrap();
        backend.put_object("b", "c", tagged("ReadOnlyAfter")).unwrap();
        backend.put_object("b", "d", tagged("ExpiresAt")).unwrap();

        let page = backend
            .list_objects_with_metadata(&Identity::default(), "b", "ExpiresAt", Cursor::START)
            .unwrap();
        assert_eq!(page.names, vec!["a", "d"]);
        assert_eq!(page.status, ListStatus::Done);
    }

    #[test]
    fn paginates_by_walked_offset() {
        let backend = MemoryBackend::new().with_page_size(2);
        for name in ["o1", "o2", "o3", "o4", "o5"] {
            backend.put_object("b", name, tagged("k")).unwrap();
        }
        backend.put_object("b", "o0", ObjectRecord::new(1.0)).unwrap();
        let identity = Identity::default();

        let first = backend
            .list_objects_with_metadata(&identity, "b", "k", Cursor::START)
            .unwrap();
        assert_eq!(first.names, vec!["o1", "o2"]);
        assert_eq!(first.status, ListStatus::Continue);
        assert_eq!(first.next_cursor, Cursor::new(3));

        let second = backend
            .list_objects_with_metadata(&identity, "b", "k", first.next_cursor)
            .unwrap();
        assert_eq!(second.names, vec!["o3", "o4"]);

        let last = backend
            .list_objects_with_metadata(&identity, "b", "k", second.next_cursor)
            .unwrap();
        assert_eq!(last.names, vec!["o5"]);
        assert_eq!(last.status, ListStatus::Done);
    }

    #[test]
    fn read_only_blocks_delete_and_is_idempotent() {
        let backend = MemoryBackend::new();
        backend.put_object("b", "o", tagged("k")).unwrap();
        let identity = Identity::default();

        backend.set_object_read_only(&identity, "b", "o").unwrap();
        let once = backend.object("b", "o").unwrap();
        backend.set_object_read_only(&identity, "b", "o").unwrap();
        assert_eq!(backend.object("b", "o").unwrap(), once);

        let err = backend.delete_object(&identity, "b", "o").unwrap_err();
        assert!(matches!(err, Error::ReadOnly(_)));
        assert!(backend.contains("b", "o").unwrap());
    }

    #[test]
    fn missing_things_are_not_found() {
        let backend = MemoryBackend::new();
        backend.create_bucket("b").unwrap();
        let identity = Identity::default();

        assert!(matches!(
            backend.object_info(&identity, "b", "nope"),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            backend.list_objects_with_metadata(&identity, "missing", "k", Cursor::START),
            Err(Error::NotFound(_))
        ));
        backend.put_object("b", "o", ObjectRecord::new(1.0)).unwrap();
        assert!(matches!(
            backend.read_object_metadata(&identity, "b", "o", "k"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn poisoned_lock_is_not_reported_as_absent() {
        let backend = MemoryBackend::new();
        backend.put_object("b", "o", tagged("k")).unwrap();
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = backend.buckets.lock().unwrap();
            panic!("poison the lock");
        }));

        assert!(matches!(backend.contains("b", "o"), Err(Error::Backend(_))));
    }

    #[test]
    fn delete_removes_object() {
        let backend = MemoryBackend::new();
        backend.put_object("b", "o", tagged("k")).unwrap();
        backend
            .delete_object(&Identity::default(), "b", "o")
            .unwrap();
        assert!(!backend.contains("b", "o").unwrap());
        assert_eq!(
            backend.list_buckets(&Identity::default()).unwrap(),
            vec!["b"]
        );
    }
}
