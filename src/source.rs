//! The asynchronous, byte-addressable source abstraction.
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::error::{Error, Result};

/// An asynchronous source of bytes.
///
/// `slice` is idempotent and safe to call concurrently; `end` is exclusive.
/// Implementations cover local files, in-memory buffers and range-request
/// style remote stores.
pub trait ByteSource: Send + Sync {
    /// The total number of bytes.
    fn byte_length(&self) -> u64;

    /// Reads `[start, end)`.
    fn slice(&self, start: u64, end: u64) -> BoxFuture<'_, Result<Vec<u8>>>;
}

impl<S: ByteSource + ?Sized> ByteSource for &S {
    fn byte_length(&self) -> u64 {
        (**self).byte_length()
    }

    fn slice(&self, start: u64, end: u64) -> BoxFuture<'_, Result<Vec<u8>>> {
        (**self).slice(start, end)
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Arc<S> {
    fn byte_length(&self) -> u64 {
        (**self).byte_length()
    }

    fn slice(&self, start: u64, end: u64) -> BoxFuture<'_, Result<Vec<u8>>> {
        (**self).slice(start, end)
    }
}

fn out_of_bounds(start: u64, end: u64, length: u64) -> Error {
    Error::ByteSource(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        format!(
            "slice [{}, {}) is out of bounds for a source of {} bytes",
            start, end, length
        ),
    ))
}

/// A source over an in-memory buffer.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Arc<Vec<u8>>,
}

impl MemorySource {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(data),
        }
    }
}

impl ByteSource for MemorySource {
    fn byte_length(&self) -> u64 {
        self.data.len() as u64
    }

    fn slice(&self, start: u64, end: u64) -> BoxFuture<'_, Result<Vec<u8>>> {
        Box::pin(async move {
            if start > end || end > self.data.len() as u64 {
                return Err(out_of_bounds(start, end, self.data.len() as u64));
            }
            Ok(self.data[start as usize..end as usize].to_vec())
        })
    }
}

/// A source over a local file, read with seek + exact reads.
#[derive(Debug)]
pub struct FileSource {
    file: Mutex<std::fs::File>,
    length: u64,
}

impl FileSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::try_new(std::fs::File::open(path)?)
    }

    pub fn try_new(file: std::fs::File) -> Result<Self> {
        let length = file.metadata()?.len();
        Ok(Self {
            file: Mutex::new(file),
            length,
        })
    }
}

impl ByteSource for FileSource {
    fn byte_length(&self) -> u64 {
        self.length
    }

    fn slice(&self, start: u64, end: u64) -> BoxFuture<'_, Result<Vec<u8>>> {
        Box::pin(async move {
            if start > end || end > self.length {
                return Err(out_of_bounds(start, end, self.length));
            }
            let mut buffer = vec![0u8; (end - start) as usize];
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(start))?;
            file.read_exact(&mut buffer)?;
            Ok(buffer)
        })
    }
}
