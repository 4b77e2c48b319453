//! Decoders for the value and level encodings of the format.
use parquet_format_safe::Encoding as FormatEncoding;

use crate::error::Error;

pub mod bitpacked;
pub mod byte_stream_split;
pub mod delta_bitpacked;
pub mod delta_byte_array;
pub mod delta_length_byte_array;
pub mod hybrid_rle;
pub(crate) mod uleb128;
pub(crate) mod zigzag_leb128;

/// A value or level encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Plain,
    PlainDictionary,
    Rle,
    /// Deprecated MSB-first level encoding kept for old files.
    BitPacked,
    DeltaBinaryPacked,
    DeltaLengthByteArray,
    DeltaByteArray,
    RleDictionary,
    ByteStreamSplit,
}

impl Encoding {
    /// Whether data pages with this encoding index into a dictionary page.
    pub fn is_dictionary(&self) -> bool {
        matches!(self, Encoding::PlainDictionary | Encoding::RleDictionary)
    }
}

impl TryFrom<FormatEncoding> for Encoding {
    type Error = Error;

    fn try_from(encoding: FormatEncoding) -> Result<Self, Error> {
        Ok(match encoding {
            FormatEncoding::PLAIN => Encoding::Plain,
            FormatEncoding::PLAIN_DICTIONARY => Encoding::PlainDictionary,
            FormatEncoding::RLE => Encoding::Rle,
            FormatEncoding::BIT_PACKED => Encoding::BitPacked,
            FormatEncoding::DELTA_BINARY_PACKED => Encoding::DeltaBinaryPacked,
            FormatEncoding::DELTA_LENGTH_BYTE_ARRAY => Encoding::DeltaLengthByteArray,
            FormatEncoding::DELTA_BYTE_ARRAY => Encoding::DeltaByteArray,
            FormatEncoding::RLE_DICTIONARY => Encoding::RleDictionary,
            FormatEncoding::BYTE_STREAM_SPLIT => Encoding::ByteStreamSplit,
            other => {
                return Err(Error::CorruptPage(format!(
                    "unknown encoding {}",
                    other.0
                )))
            }
        })
    }
}

/// Reads the four-byte little-endian length prefixing v1 level streams and
/// RLE-encoded boolean values.
pub(crate) fn get_length(values: &[u8]) -> Option<usize> {
    values
        .get(..4)
        .map(|bytes| u32::from_le_bytes(bytes.try_into().unwrap()) as usize)
}

/// The number of bits required to encode levels up to `max_level`.
pub(crate) fn get_bit_width(max_level: u32) -> usize {
    (32 - max_level.leading_zeros()) as usize
}
