//! Defines [`Error`], the crate-wide error type, and the crate's `Result` alias.
use std::fmt::{Debug, Display, Formatter};

/// Errors generated by this crate.
#[derive(Debug)]
pub enum Error {
    /// The request itself is malformed: unknown column, empty projection,
    /// an inverted or out-of-bounds row span, or a multi-column request to a
    /// single-column entry point.
    InvalidRequest(String),
    /// The file footer could not be read or describes an inconsistent file.
    CorruptMetadata(String),
    /// A page header, level stream or value stream violates the format.
    CorruptPage(String),
    /// The file uses a capability this crate does not implement, such as an
    /// unknown codec without a configured decompressor.
    UnsupportedFeature(String),
    /// Propagated from the underlying byte source.
    ByteSource(std::io::Error),
}

impl Error {
    pub(crate) fn missing_column(name: &str) -> Self {
        Error::InvalidRequest(format!("Column '{}' not found", name))
    }

    /// An error for data that is out of the format's bounds.
    pub(crate) fn oos<I: Into<String>>(message: I) -> Self {
        Error::CorruptPage(message.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::ByteSource(error)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidRequest(desc) => write!(f, "Invalid request: {}", desc),
            Error::CorruptMetadata(desc) => write!(f, "Corrupt metadata: {}", desc),
            Error::CorruptPage(desc) => write!(f, "Corrupt page: {}", desc),
            Error::UnsupportedFeature(desc) => write!(f, "Unsupported feature: {}", desc),
            Error::ByteSource(source) => write!(f, "Byte source error: {}", source),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ByteSource(source) => Some(source),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
