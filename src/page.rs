//! Pages: the smallest unit of encoding and compression in a column chunk.
use parquet_format_safe::{DataPageHeader as DataPageHeaderV1, DataPageHeaderV2};

use crate::encoding::{self, bitpacked, Encoding};
use crate::error::{Error, Result};
use crate::schema::ColumnDescriptor;

/// The header of a data page, in either layout version.
///
/// V1 pages compress the whole body, level streams included, and prefix each
/// level stream with its length. V2 pages keep the level streams
/// uncompressed and sized by the header.
#[derive(Debug, Clone)]
pub enum DataPageHeader {
    V1(DataPageHeaderV1),
    V2(DataPageHeaderV2),
}

impl DataPageHeader {
    /// The number of level positions in the page, nulls included.
    pub fn num_values(&self) -> usize {
        match self {
            DataPageHeader::V1(header) => header.num_values as usize,
            DataPageHeader::V2(header) => header.num_values as usize,
        }
    }

    /// The encoding of the page's values.
    pub fn encoding(&self) -> Result<Encoding> {
        match self {
            DataPageHeader::V1(header) => Encoding::try_from(header.encoding),
            DataPageHeader::V2(header) => Encoding::try_from(header.encoding),
        }
    }
}

/// A data page whose body is still compressed.
#[derive(Debug)]
pub struct CompressedDataPage {
    pub header: DataPageHeader,
    pub buffer: Vec<u8>,
    pub uncompressed_size: usize,
}

/// A dictionary page whose body is still compressed.
#[derive(Debug)]
pub struct CompressedDictPage {
    pub buffer: Vec<u8>,
    pub num_values: usize,
    pub uncompressed_size: usize,
}

/// A page as yielded by the page reader.
#[derive(Debug)]
pub enum CompressedPage {
    Data(CompressedDataPage),
    Dict(CompressedDictPage),
}

/// A decompressed data page.
#[derive(Debug)]
pub struct DataPage {
    pub header: DataPageHeader,
    pub buffer: Vec<u8>,
}

impl DataPage {
    pub fn num_values(&self) -> usize {
        self.header.num_values()
    }
}

/// A decompressed dictionary page.
#[derive(Debug)]
pub struct DictPage {
    pub buffer: Vec<u8>,
    pub num_values: usize,
}

/// Splits a decompressed data page body into its (repetition levels,
/// definition levels, values) streams.
pub fn split_buffer<'a>(
    page: &'a DataPage,
    descriptor: &ColumnDescriptor,
) -> Result<(&'a [u8], &'a [u8], &'a [u8])> {
    match &page.header {
        DataPageHeader::V1(header) => {
            let num_values = header.num_values as usize;
            let (rep, buffer) = if descriptor.max_rep_level > 0 {
                take_v1_levels(
                    &page.buffer,
                    Encoding::try_from(header.repetition_level_encoding)?,
                    num_values,
                    encoding::get_bit_width(descriptor.max_rep_level),
                )?
            } else {
                (&[] as &[u8], page.buffer.as_slice())
            };
            let (def, values) = if descriptor.max_def_level > 0 {
                take_v1_levels(
                    buffer,
                    Encoding::try_from(header.definition_level_encoding)?,
                    num_values,
                    encoding::get_bit_width(descriptor.max_def_level),
                )?
            } else {
                (&[] as &[u8], buffer)
            };
            Ok((rep, def, values))
        }
        DataPageHeader::V2(header) => {
            let rep_length = usize::try_from(header.repetition_levels_byte_length)
                .map_err(|_| Error::oos("negative repetition level length"))?;
            let def_length = usize::try_from(header.definition_levels_byte_length)
                .map_err(|_| Error::oos("negative definition level length"))?;
            if rep_length + def_length > page.buffer.len() {
                return Err(Error::oos(
                    "v2 level streams extend beyond the page body",
                ));
            }
            Ok((
                &page.buffer[..rep_length],
                &page.buffer[rep_length..rep_length + def_length],
                &page.buffer[rep_length + def_length..],
            ))
        }
    }
}

/// Slices one v1 level stream off the front of `buffer`.
fn take_v1_levels<'a>(
    buffer: &'a [u8],
    encoding: Encoding,
    num_values: usize,
    num_bits: usize,
) -> Result<(&'a [u8], &'a [u8])> {
    match encoding {
        Encoding::Rle => {
            let length = encoding::get_length(buffer)
                .ok_or_else(|| Error::oos("v1 level stream misses its length prefix"))?;
            let end = 4 + length;
            if end > buffer.len() {
                return Err(Error::oos(
                    "the bytes declared in v1 levels exceed the page body",
                ));
            }
            Ok((&buffer[4..end], &buffer[end..]))
        }
        Encoding::BitPacked => {
            let length = bitpacked::LegacyDecoder::byte_length(num_bits, num_values);
            if length > buffer.len() {
                return Err(Error::oos(
                    "the bit-packed level stream exceeds the page body",
                ));
            }
            Ok(buffer.split_at(length))
        }
        other => Err(Error::oos(format!(
            "levels cannot be {:?}-encoded",
            other
        ))),
    }
}
