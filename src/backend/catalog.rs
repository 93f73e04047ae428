//! File-backed object catalog.
//!
//! Layout under the catalog root:
//!
//! ```text
//! <root>/<bucket>/<object>.json
//! ```
//!
//! Each object file holds a JSON [`ObjectRecord`]. Only the lifecycle-relevant
//! part of an object lives here: timestamps, the read-only flag and metadata.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use url::Url;

use crate::backend::{
    object_path, Cursor, Identity, ListPage, Listing, ObjectInfo, ObjectRecord, ObjectStore,
};
use crate::clock::{Clock, SystemClock};
use crate::{Error, Result};

const RECORD_EXT: &str = "json";
const DEFAULT_PAGE_SIZE: usize = 1024;

#[derive(Debug, Clone)]
pub struct CatalogBackend {
    root: PathBuf,
    page_size: usize,
}

impl CatalogBackend {
    /// Opens an existing catalog directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::Connection(format!(
                "catalog root {} is not a directory",
                root.display()
            )));
        }
        Ok(Self {
            root,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Opens the catalog named by a `file://` URL.
    ///
    /// Recognises a `page_size` query parameter.
    pub fn open_url(url: &Url) -> Result<Self> {
        let root = url
            .to_file_path()
            .map_err(|_| Error::UnsupportedUri(format!("{url}: not a local path")))?;
        let mut backend = Self::open(root)?;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "page_size" => {
                    let page_size = value.parse::<usize>().map_err(|_| {
                        Error::Connection(format!("{url}: invalid page_size '{value}'"))
                    })?;
                    backend = backend.with_page_size(page_size);
                }
                other => log::warn!("ignoring unknown catalog parameter {other}"),
            }
        }
        Ok(backend)
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn create_bucket(&self, bucket: &str) -> Result<()> {
        validate_name(bucket)?;
        fs::create_dir_all(self.root.join(bucket))?;
        Ok(())
    }

    /// Creates or replaces an object record, creating its bucket if needed.
    pub fn put_object(&self, bucket: &str, object: &str, record: &ObjectRecord) -> Result<()> {
        self.create_bucket(bucket)?;
        validate_name(object)?;
        self.write_record(bucket, object, record)
    }

    pub fn object(&self, bucket: &str, object: &str) -> Result<Option<ObjectRecord>> {
        match self.read_record(bucket, object) {
            Ok(record) => Ok(Some(record)),
            Err(Error::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf> {
        validate_name(bucket)?;
        let dir = self.root.join(bucket);
        if !dir.is_dir() {
            return Err(Error::NotFound(bucket.to_string()));
        }
        Ok(dir)
    }

    fn record_path(&self, bucket: &str, object: &str) -> Result<PathBuf> {
        validate_name(object)?;
        Ok(self
            .bucket_dir(bucket)?
            .join(format!("{object}.{RECORD_EXT}")))
    }

    fn read_record(&self, bucket: &str, object: &str) -> Result<ObjectRecord> {
        let path = self.record_path(bucket, object)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(object_path(bucket, object)));
            }
            Err(err) => return Err(err.into()),
        };
        serde_json::from_slice(&bytes)
            .map_err(|err| Error::Corrupt(format!("{}: {err}", path.display())))
    }

    fn write_record(&self, bucket: &str, object: &str, record: &ObjectRecord) -> Result<()> {
        let path = self.record_path(bucket, object)?;
        let tmp = path.with_extension(format!("{RECORD_EXT}.tmp"));
        let bytes = serde_json::to_vec_pretty(record)
            .map_err(|err| Error::Corrupt(format!("{}: {err}", path.display())))?;
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Object names in a bucket, sorted.
    fn object_names(&self, bucket: &str) -> Result<Vec<String>> {
        let dir = self.bucket_dir(bucket)?;
        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXT) {
                continue;
            }
            match path.file_stem().and_then(|stem| stem.to_str()) {
                Some(stem) => names.push(stem.to_string()),
                None => log::warn!("skipping non-UTF8 object record {}", path.display()),
            }
        }
        names.sort_unstable();
        Ok(names)
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0'])
    {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(())
}

impl Listing for CatalogBackend {
    fn list_buckets(&self, _identity: &Identity) -> Result<Vec<String>> {
        let mut buckets = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            match entry.file_name().to_str() {
                Some(name) if validate_name(name).is_ok() => buckets.push(name.to_string()),
                Some(_) => {}
                None => log::warn!("skipping non-UTF8 bucket directory {}", entry.path().display()),
            }
        }
        buckets.sort_unstable();
        Ok(buckets)
    }

    fn list_objects_with_metadata(
        &self,
        _identity: &Identity,
        bucket: &str,
        key: &str,
        cursor: Cursor,
    ) -> Result<ListPage> {
        let objects = self.object_names(bucket)?;
        let start = cursor.offset() as usize;
        let mut names = Vec::new();

        for (walked, object) in objects.iter().enumerate().skip(start) {
            let record = match self.read_record(bucket, object) {
                Ok(record) => record,
                Err(err) => {
                    log::warn!("skipping unreadable object record {bucket}/{object}: {err}");
                    continue;
                }
            };
            if !record.metadata.contains_key(key) {
                continue;
            }
            names.push(object.clone());
            if names.len() == self.page_size && walked + 1 < objects.len() {
                let next = u32::try_from(walked + 1)
                    .map_err(|_| Error::Backend("listing offset overflow".to_string()))?;
                return Ok(ListPage::more(names, Cursor::new(next)));
            }
        }
        Ok(ListPage::done(names))
    }
}

impl ObjectStore for CatalogBackend {
    fn read_object_metadata(
        &self,
        _identity: &Identity,
        bucket: &str,
        object: &str,
        key: &str,
    ) -> Result<Vec<u8>> {
        let mut record = self.read_record(bucket, object)?;
        let value = record
            .metadata
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("{}#{key}", object_path(bucket, object))))?;
        record.last_access = SystemClock.now();
        if let Err(err) = self.write_record(bucket, object, &record) {
            log::debug!("failed to record last access on {bucket}/{object}: {err}");
        }
        Ok(value)
    }

    fn object_info(&self, _identity: &Identity, bucket: &str, object: &str) -> Result<ObjectInfo> {
        Ok(self.read_record(bucket, object)?.info())
    }

    fn delete_object(&self, _identity: &Identity, bucket: &str, object: &str) -> Result<()> {
        let record = self.read_record(bucket, object)?;
        if record.read_only {
            return Err(Error::ReadOnly(object_path(bucket, object)));
        }
        fs::remove_file(self.record_path(bucket, object)?)?;
        Ok(())
    }

    fn set_object_read_only(
        &self,
        _identity: &Identity,
        bucket: &str,
        object: &str,
    ) -> Result<()> {
        let mut record = self.read_record(bucket, object)?;
        if record.read_only {
            return Ok(());
        }
        record.read_only = true;
        self.write_record(bucket, object, &record)
    }
}
