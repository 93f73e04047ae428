use thiserror::Error;

/// How the scan reacts to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The backend handle could not be acquired; the run aborts.
    Fatal,
    /// One bucket or object is skipped; the scan continues.
    Partial,
    /// The backend answered with a listing the client cannot decode. Handled
    /// like `Partial` for the affected page.
    Protocol,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("unsupported storage uri: {0}")]
    UnsupportedUri(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("object is read-only: {0}")]
    ReadOnly(String),
    #[error("name stream exhausted: decoded {decoded} of {declared} names")]
    ExhaustedBuffer { decoded: u32, declared: u32 },
    #[error("invalid name: {0}")]
    InvalidName(String),
    #[error("metadata value too short: {size} bytes")]
    MetadataTooShort { size: usize },
    #[error("corrupt data: {0}")]
    Corrupt(String),
}

impl Error {
    pub fn severity(&self) -> Severity {
        match self {
            Error::Connection(_) | Error::UnsupportedUri(_) => Severity::Fatal,
            Error::ExhaustedBuffer { .. } | Error::InvalidName(_) => Severity::Protocol,
            _ => Severity::Partial,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

pub type Result<T> = std::result::Result<T, Error>;
