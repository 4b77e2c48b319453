//! Codec table turning compressed page bodies into plain bytes.
use std::collections::HashMap;

#[cfg(any(feature = "gzip", feature = "brotli"))]
use std::io::Read;

use parquet_format_safe::CompressionCodec;

use crate::error::{Error, Result};

/// The compression applied to the pages of a column chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {
    Uncompressed,
    Snappy,
    Gzip,
    Lzo,
    Brotli,
    Lz4,
    Zstd,
    Lz4Raw,
}

impl TryFrom<CompressionCodec> for Compression {
    type Error = Error;

    fn try_from(codec: CompressionCodec) -> Result<Self> {
        Ok(match codec {
            CompressionCodec::UNCOMPRESSED => Compression::Uncompressed,
            CompressionCodec::SNAPPY => Compression::Snappy,
            CompressionCodec::GZIP => Compression::Gzip,
            CompressionCodec::LZO => Compression::Lzo,
            CompressionCodec::BROTLI => Compression::Brotli,
            CompressionCodec::LZ4 => Compression::Lz4,
            CompressionCodec::ZSTD => Compression::Zstd,
            CompressionCodec::LZ4_RAW => Compression::Lz4Raw,
            other => {
                return Err(Error::UnsupportedFeature(format!(
                    "unknown compression codec {}",
                    other.0
                )))
            }
        })
    }
}

/// A caller-supplied decompressor. It reads the whole of `input` and must
/// fill `output` exactly.
pub type DecompressFn = Box<dyn Fn(&[u8], &mut [u8]) -> Result<()> + Send + Sync>;

/// Caller-supplied decompressors, consulted before the built-in codecs.
#[derive(Default)]
pub struct Decompressors {
    custom: HashMap<Compression, DecompressFn>,
}

impl Decompressors {
    pub fn with(mut self, codec: Compression, decompress: DecompressFn) -> Self {
        self.custom.insert(codec, decompress);
        self
    }
}

impl std::fmt::Debug for Decompressors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decompressors")
            .field("custom", &self.custom.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Decompresses `input` into exactly `uncompressed_size` bytes.
pub(crate) fn decompress(
    codec: Compression,
    input: &[u8],
    uncompressed_size: usize,
    decompressors: &Decompressors,
) -> Result<Vec<u8>> {
    if let Some(decompress) = decompressors.custom.get(&codec) {
        let mut output = vec![0u8; uncompressed_size];
        decompress(input, &mut output)?;
        return Ok(output);
    }
    match codec {
        Compression::Uncompressed => {
            if input.len() != uncompressed_size {
                return Err(size_mismatch(codec, input.len(), uncompressed_size));
            }
            Ok(input.to_vec())
        }
        #[cfg(feature = "snappy")]
        Compression::Snappy => {
            let mut output = vec![0u8; uncompressed_size];
            let read = snap::raw::Decoder::new()
                .decompress(input, &mut output)
                .map_err(|error| Error::CorruptPage(format!("snappy: {}", error)))?;
            if read != uncompressed_size {
                return Err(size_mismatch(codec, read, uncompressed_size));
            }
            Ok(output)
        }
        #[cfg(feature = "gzip")]
        Compression::Gzip => {
            let mut output = Vec::with_capacity(uncompressed_size);
            flate2::read::GzDecoder::new(input)
                .read_to_end(&mut output)
                .map_err(|error| Error::CorruptPage(format!("gzip: {}", error)))?;
            if output.len() != uncompressed_size {
                return Err(size_mismatch(codec, output.len(), uncompressed_size));
            }
            Ok(output)
        }
        #[cfg(feature = "brotli")]
        Compression::Brotli => {
            let mut output = Vec::with_capacity(uncompressed_size);
            brotli::Decompressor::new(input, 4096)
                .read_to_end(&mut output)
                .map_err(|error| Error::CorruptPage(format!("brotli: {}", error)))?;
            if output.len() != uncompressed_size {
                return Err(size_mismatch(codec, output.len(), uncompressed_size));
            }
            Ok(output)
        }
        #[cfg(feature = "zstd")]
        Compression::Zstd => {
            let mut output = vec![0u8; uncompressed_size];
            let read = zstd::bulk::decompress_to_buffer(input, &mut output)
                .map_err(|error| Error::CorruptPage(format!("zstd: {}", error)))?;
            if read != uncompressed_size {
                return Err(size_mismatch(codec, read, uncompressed_size));
            }
            Ok(output)
        }
        #[cfg(feature = "lz4")]
        Compression::Lz4Raw => {
            let mut output = vec![0u8; uncompressed_size];
            let read = lz4_flex::block::decompress_into(input, &mut output)
                .map_err(|error| Error::CorruptPage(format!("lz4: {}", error)))?;
            if read != uncompressed_size {
                return Err(size_mismatch(codec, read, uncompressed_size));
            }
            Ok(output)
        }
        // the hadoop-framed LZ4 and LZO codecs are only reachable through a
        // configured decompressor
        Compression::Lzo | Compression::Lz4 => Err(Error::UnsupportedFeature(format!(
            "no decompressor configured for {:?}",
            codec
        ))),
        #[allow(unreachable_patterns)]
        other => Err(Error::UnsupportedFeature(format!(
            "reading {:?}-compressed pages requires the matching cargo feature \
             or a configured decompressor",
            other
        ))),
    }
}

fn size_mismatch(codec: Compression, got: usize, expected: usize) -> Error {
    Error::CorruptPage(format!(
        "{:?} page decompressed to {} bytes, the header declares {}",
        codec, got, expected
    ))
}
