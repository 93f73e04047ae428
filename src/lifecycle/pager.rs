//! Paginated object enumeration.

use crate::backend::{Cursor, Identity, ListStatus, Listing, PageMode};
use crate::Result;

/// Lazily walks a bucket's object listing, one page per `next()`.
///
/// Each item is the full batch of names from one page, so callers finish a
/// batch before the next page is requested. The walk ends after a `Done`
/// page, after the first page in [`PageMode::SingleShot`], or after the first
/// error. Termination relies on the backend eventually answering `Done`.
pub struct ObjectPages<'a, L: ?Sized> {
    backend: &'a L,
    identity: &'a Identity,
    bucket: &'a str,
    key: &'a str,
    mode: PageMode,
    cursor: Option<Cursor>,
}

impl<'a, L: Listing + ?Sized> ObjectPages<'a, L> {
    pub fn new(backend: &'a L, identity: &'a Identity, bucket: &'a str, key: &'a str) -> Self {
        Self {
            mode: backend.listing_mode(),
            backend,
            identity,
            bucket,
            key,
            cursor: Some(Cursor::START),
        }
    }

    /// Collects every remaining name, stopping at the first failed page.
    pub fn collect_names(self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for batch in self {
            names.extend(batch?);
        }
        Ok(names)
    }
}

impl<L: Listing + ?Sized> Iterator for ObjectPages<'_, L> {
    type Item = Result<Vec<String>>;

    fn next(&mut self) -> Option<Self::Item> {
        let cursor = self.cursor.take()?;
        let page = match self
            .backend
            .list_objects_with_metadata(self.identity, self.bucket, self.key, cursor)
        {
            Ok(page) => page,
            Err(err) => return Some(Err(err)),
        };

        match (page.status, self.mode) {
            (ListStatus::Continue, PageMode::Paginated) => {
                self.cursor = Some(page.next_cursor);
                Some(Ok(page.names))
            }
            (ListStatus::Done, _) if page.total() == 0 => None,
            _ => Some(Ok(page.names)),
        }
    }
}
