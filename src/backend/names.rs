//! Packed name listings.
//!
//! Some backends return listings as one buffer of concatenated,
//! NUL-terminated names plus a separate item count. Runs of extra NUL bytes
//! may appear between names; they are layout padding and carry no data.

use crate::{Error, Result};

/// A packed listing as it comes off the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackedNames {
    buf: Vec<u8>,
    count: u32,
}

impl PackedNames {
    pub fn new(buf: Vec<u8>, count: u32) -> Self {
        Self { buf, count }
    }

    /// Packs `names`, each followed by a single NUL.
    pub fn from_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut buf = Vec::new();
        let mut count = 0u32;
        for name in names {
            let name = name.as_ref();
            if name.is_empty() || name.as_bytes().contains(&0) {
                return Err(Error::InvalidName(format!("{name:?}")));
            }
            buf.extend_from_slice(name.as_bytes());
            buf.push(0);
            count += 1;
        }
        Ok(Self { buf, count })
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn iter(&self) -> NameStream<'_> {
        NameStream::new(&self.buf, self.count)
    }

    pub fn decode(&self) -> Result<Vec<String>> {
        decode_names(&self.buf, self.count)
    }
}

/// Lazy decoder over a packed listing.
///
/// Yields exactly `declared` names, or an error once the buffer cannot
/// supply the next one. After the first error the stream is finished.
#[derive(Debug, Clone)]
pub struct NameStream<'a> {
    buf: &'a [u8],
    pos: usize,
    declared: u32,
    decoded: u32,
    failed: bool,
}

impl<'a> NameStream<'a> {
    pub fn new(buf: &'a [u8], declared: u32) -> Self {
        Self {
            buf,
            pos: 0,
            declared,
            decoded: 0,
            failed: false,
        }
    }

    fn fail(&mut self, err: Error) -> Option<Result<String>> {
        self.failed = true;
        Some(Err(err))
    }
}

impl Iterator for NameStream<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.decoded >= self.declared {
            return None;
        }

        while self.buf.get(self.pos) == Some(&0) {
            self.pos += 1;
        }

        let rest = &self.buf[self.pos..];
        if rest.is_empty() {
            return self.fail(Error::ExhaustedBuffer {
                decoded: self.decoded,
                declared: self.declared,
            });
        }

        // The final name may run to the end of the buffer.
        let len = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        let name = match std::str::from_utf8(&rest[..len]) {
            Ok(name) => name.to_owned(),
            Err(_) => {
                let lossy = String::from_utf8_lossy(&rest[..len]).into_owned();
                return self.fail(Error::InvalidName(lossy));
            }
        };

        self.pos += len;
        self.decoded += 1;
        Some(Ok(name))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            return (0, Some(0));
        }
        let remaining = (self.declared - self.decoded) as usize;
        (0, Some(remaining))
    }
}

/// Decodes a whole packed listing, failing rather than returning a short list.
pub fn decode_names(buf: &[u8], declared: u32) -> Result<Vec<String>> {
    NameStream::new(buf, declared).collect()
}
