//! PLAIN decoding of the physical types.
use crate::encoding::bitpacked;
use crate::error::{Error, Result};
use crate::schema::PhysicalType;
use crate::types::{int96_to_i64_ns, read_native, NativeType};
use crate::value::{TimeUnit, Value};

/// Iterator over the length-prefixed runs of a PLAIN BYTE_ARRAY body.
#[derive(Debug)]
pub(crate) struct BinaryIter<'a> {
    values: &'a [u8],
}

impl<'a> BinaryIter<'a> {
    pub fn new(values: &'a [u8]) -> Self {
        Self { values }
    }
}

impl<'a> Iterator for BinaryIter<'a> {
    type Item = Result<&'a [u8]>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.values.is_empty() {
            return None;
        }
        let length = match crate::encoding::get_length(self.values) {
            Some(length) => length,
            None => {
                return Some(Err(Error::oos(
                    "a byte array misses its length prefix",
                )))
            }
        };
        self.values = &self.values[4..];
        if length > self.values.len() {
            return Some(Err(Error::oos(
                "a byte array length exceeds the page body",
            )));
        }
        let (result, remaining) = self.values.split_at(length);
        self.values = remaining;
        Some(Ok(result))
    }
}

fn decode_native<T: NativeType + Into<Value>>(
    mut values: &[u8],
    num_values: usize,
) -> Result<Vec<Value>> {
    let mut decoded = Vec::with_capacity(num_values);
    for _ in 0..num_values {
        let value: T = read_native(&mut values)
            .ok_or_else(|| Error::oos("the page body holds fewer values than it declares"))?;
        decoded.push(value.into());
    }
    Ok(decoded)
}

/// Decodes `num_values` PLAIN-encoded values of `physical_type`.
pub(crate) fn decode(
    values: &[u8],
    num_values: usize,
    physical_type: PhysicalType,
) -> Result<Vec<Value>> {
    match physical_type {
        PhysicalType::Boolean => {
            let mut decoder = bitpacked::Decoder::new(values, 1, num_values);
            let mut decoded = Vec::with_capacity(num_values);
            for _ in 0..num_values {
                let bit = decoder
                    .next()
                    .ok_or_else(|| Error::oos("the boolean body ends before its values"))?;
                decoded.push(Value::Boolean(bit == 1));
            }
            Ok(decoded)
        }
        PhysicalType::Int32 => decode_native::<i32>(values, num_values),
        PhysicalType::Int64 => decode_native::<i64>(values, num_values),
        PhysicalType::Float => decode_native::<f32>(values, num_values),
        PhysicalType::Double => decode_native::<f64>(values, num_values),
        PhysicalType::Int96 => {
            let mut values = values;
            let mut decoded = Vec::with_capacity(num_values);
            for _ in 0..num_values {
                let value: [u32; 3] = read_native(&mut values)
                    .ok_or_else(|| Error::oos("the page body holds fewer values than it declares"))?;
                decoded.push(Value::Timestamp {
                    value: int96_to_i64_ns(value),
                    unit: TimeUnit::Nanosecond,
                });
            }
            Ok(decoded)
        }
        PhysicalType::ByteArray => {
            let mut decoded = Vec::with_capacity(num_values);
            for value in BinaryIter::new(values).take(num_values) {
                decoded.push(Value::Bytes(value?.to_vec()));
            }
            if decoded.len() != num_values {
                return Err(Error::oos(
                    "the page body holds fewer byte arrays than it declares",
                ));
            }
            Ok(decoded)
        }
        PhysicalType::FixedLenByteArray(size) => {
            if size == 0 || values.len() < num_values * size {
                return Err(Error::oos(
                    "the page body holds fewer fixed-length values than it declares",
                ));
            }
            Ok(values
                .chunks_exact(size)
                .take(num_values)
                .map(|chunk| Value::Bytes(chunk.to_vec()))
                .collect())
        }
    }
}
