//! Decodes decompressed pages into level streams and values.
use crate::convert::{convert_values, Converters};
use crate::encoding::{
    byte_stream_split, delta_bitpacked, delta_byte_array, delta_length_byte_array, hybrid_rle,
    Encoding,
};
use crate::encoding::{bitpacked, get_bit_width, get_length};
use crate::error::{Error, Result};
use crate::page::{split_buffer, DataPage, DataPageHeader, DictPage};
use crate::schema::{ColumnDescriptor, PhysicalType};
use crate::value::Value;

mod plain;

/// Decode-time options, shared by every page of a read.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DecodeOptions<'a> {
    pub raw_dictionary: bool,
    pub utf8: bool,
    pub converters: &'a Converters,
}

/// A decoded data page: parallel level streams plus the materialized values.
///
/// Level streams are empty when the column's matching max level is zero.
/// `values` holds one entry per position where the definition level reaches
/// the column's maximum.
#[derive(Debug)]
pub struct DecodedPage {
    pub rep_levels: Vec<u32>,
    pub def_levels: Vec<u32>,
    pub values: Vec<Value>,
    /// Total number of level positions, nulls included.
    pub num_values: usize,
}

/// Decodes one level stream of a data page.
fn decode_levels(
    values: &[u8],
    encoding: Encoding,
    max_level: u32,
    num_values: usize,
) -> Result<Vec<u32>> {
    let num_bits = get_bit_width(max_level);
    let levels = match encoding {
        Encoding::Rle => hybrid_rle::decode(values, num_bits, num_values)?,
        Encoding::BitPacked => {
            let decoded: Vec<u32> =
                bitpacked::LegacyDecoder::new(values, num_bits, num_values).collect();
            if decoded.len() != num_values {
                return Err(Error::oos("the level stream ends before its values"));
            }
            decoded
        }
        other => {
            return Err(Error::oos(format!(
                "levels cannot be {:?}-encoded",
                other
            )))
        }
    };
    if levels.iter().any(|level| *level > max_level) {
        return Err(Error::oos("a level exceeds the column's maximum"));
    }
    Ok(levels)
}

fn level_encodings(header: &DataPageHeader) -> Result<(Encoding, Encoding)> {
    match header {
        DataPageHeader::V1(header) => Ok((
            Encoding::try_from(header.repetition_level_encoding)?,
            Encoding::try_from(header.definition_level_encoding)?,
        )),
        // v2 levels are always the length-less hybrid encoding
        DataPageHeader::V2(_) => Ok((Encoding::Rle, Encoding::Rle)),
    }
}

/// Decodes a data page into its three streams.
///
/// `dictionary` must hold the chunk's decoded dictionary when the page is
/// dictionary-encoded and `raw_dictionary` is off.
pub(crate) fn decode_data_page(
    page: &DataPage,
    dictionary: Option<&[Value]>,
    descriptor: &ColumnDescriptor,
    options: DecodeOptions<'_>,
) -> Result<DecodedPage> {
    let (rep_bytes, def_bytes, values_bytes) = split_buffer(page, descriptor)?;
    let num_values = page.num_values();
    let (rep_encoding, def_encoding) = level_encodings(&page.header)?;

    let rep_levels = if descriptor.max_rep_level > 0 {
        decode_levels(rep_bytes, rep_encoding, descriptor.max_rep_level, num_values)?
    } else {
        vec![]
    };
    let def_levels = if descriptor.max_def_level > 0 {
        decode_levels(def_bytes, def_encoding, descriptor.max_def_level, num_values)?
    } else {
        vec![]
    };

    let materialized = if descriptor.max_def_level == 0 {
        num_values
    } else {
        def_levels
            .iter()
            .filter(|level| **level == descriptor.max_def_level)
            .count()
    };

    let encoding = page.header.encoding()?;
    let physical_type = descriptor.primitive.physical_type;
    let mut values = match encoding {
        Encoding::Plain => plain::decode(values_bytes, materialized, physical_type)?,
        Encoding::PlainDictionary | Encoding::RleDictionary => {
            return decode_dictionary_indices(
                values_bytes,
                materialized,
                dictionary,
                options.raw_dictionary,
                rep_levels,
                def_levels,
                num_values,
            );
        }
        Encoding::Rle => {
            if physical_type != PhysicalType::Boolean {
                return Err(Error::oos(format!(
                    "RLE values require a BOOLEAN column, found {:?}",
                    physical_type
                )));
            }
            let length = get_length(values_bytes)
                .ok_or_else(|| Error::oos("RLE booleans miss their length prefix"))?;
            let stream = values_bytes
                .get(4..4 + length)
                .ok_or_else(|| Error::oos("RLE booleans exceed the page body"))?;
            hybrid_rle::decode(stream, 1, materialized)?
                .into_iter()
                .map(|bit| Value::Boolean(bit == 1))
                .collect()
        }
        Encoding::DeltaBinaryPacked => {
            let (decoded, _) = delta_bitpacked::decode(values_bytes)?;
            if decoded.len() != materialized {
                return Err(Error::oos(
                    "the delta stream holds a different count than the page",
                ));
            }
            match physical_type {
                PhysicalType::Int32 => {
                    decoded.into_iter().map(|value| Value::Int32(value as i32)).collect()
                }
                PhysicalType::Int64 => decoded.into_iter().map(Value::Int64).collect(),
                other => {
                    return Err(Error::oos(format!(
                        "DELTA_BINARY_PACKED requires an integer column, found {:?}",
                        other
                    )))
                }
            }
        }
        Encoding::DeltaLengthByteArray => {
            if physical_type != PhysicalType::ByteArray {
                return Err(Error::oos(
                    "DELTA_LENGTH_BYTE_ARRAY requires a BYTE_ARRAY column",
                ));
            }
            let (lengths, mut data) = delta_length_byte_array::decode(values_bytes)?;
            if lengths.len() != materialized {
                return Err(Error::oos(
                    "the delta length stream holds a different count than the page",
                ));
            }
            let mut decoded = Vec::with_capacity(lengths.len());
            for length in lengths {
                let length = usize::try_from(length)
                    .map_err(|_| Error::oos("negative byte array length"))?;
                if length > data.len() {
                    return Err(Error::oos("a byte array length exceeds the page body"));
                }
                let (value, remaining) = data.split_at(length);
                decoded.push(Value::Bytes(value.to_vec()));
                data = remaining;
            }
            decoded
        }
        Encoding::DeltaByteArray => {
            if !matches!(
                physical_type,
                PhysicalType::ByteArray | PhysicalType::FixedLenByteArray(_)
            ) {
                return Err(Error::oos(
                    "DELTA_BYTE_ARRAY requires a byte array column",
                ));
            }
            let decoded = delta_byte_array::decode(values_bytes)?;
            if decoded.len() != materialized {
                return Err(Error::oos(
                    "the delta byte array stream holds a different count than the page",
                ));
            }
            decoded.into_iter().map(Value::Bytes).collect()
        }
        Encoding::ByteStreamSplit => {
            let element_size = physical_type.byte_width().ok_or_else(|| {
                Error::oos(format!(
                    "BYTE_STREAM_SPLIT requires a fixed-width column, found {:?}",
                    physical_type
                ))
            })?;
            let contiguous = byte_stream_split::decode(values_bytes, element_size, materialized)?;
            plain::decode(&contiguous, materialized, physical_type)?
        }
        Encoding::BitPacked => {
            return Err(Error::oos("BIT_PACKED is a level encoding, not a value encoding"))
        }
    };

    convert_values(
        &mut values,
        &descriptor.primitive,
        options.utf8,
        options.converters,
    )?;
    Ok(DecodedPage {
        rep_levels,
        def_levels,
        values,
        num_values,
    })
}

/// Decodes the hybrid index stream of a dictionary-encoded page, either
/// resolving the indices through the dictionary or surfacing them raw.
fn decode_dictionary_indices(
    values_bytes: &[u8],
    materialized: usize,
    dictionary: Option<&[Value]>,
    raw_dictionary: bool,
    rep_levels: Vec<u32>,
    def_levels: Vec<u32>,
    num_values: usize,
) -> Result<DecodedPage> {
    // one byte of bit width, then the hybrid stream of indices
    let (&num_bits, stream) = values_bytes
        .split_first()
        .ok_or_else(|| Error::oos("a dictionary-encoded page misses its bit width"))?;
    if num_bits > 32 {
        return Err(Error::oos(format!(
            "dictionary indices declare a bit width of {}",
            num_bits
        )));
    }
    let indices = hybrid_rle::decode(stream, num_bits as usize, materialized)?;

    let values = if raw_dictionary {
        indices
            .into_iter()
            .map(|index| Value::Int64(index as i64))
            .collect()
    } else {
        let dictionary = dictionary.ok_or_else(|| {
            Error::oos("the page is dictionary-encoded but the chunk holds no dictionary page")
        })?;
        indices
            .into_iter()
            .map(|index| {
                dictionary.get(index as usize).cloned().ok_or_else(|| {
                    Error::oos(format!(
                        "dictionary index {} is out of bounds for {} entries",
                        index,
                        dictionary.len()
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?
    };
    Ok(DecodedPage {
        rep_levels,
        def_levels,
        values,
        num_values,
    })
}

/// Decodes a dictionary page into its values, conversions applied.
pub(crate) fn decode_dictionary_page(
    page: &DictPage,
    descriptor: &ColumnDescriptor,
    options: DecodeOptions<'_>,
) -> Result<Vec<Value>> {
    let mut values = plain::decode(
        &page.buffer,
        page.num_values,
        descriptor.primitive.physical_type,
    )?;
    convert_values(
        &mut values,
        &descriptor.primitive,
        options.utf8,
        options.converters,
    )?;
    Ok(values)
}
