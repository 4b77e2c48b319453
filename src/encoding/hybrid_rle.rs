//! The RLE/bit-packed hybrid stream used by level streams, boolean values
//! and dictionary indices.
use super::{bitpacked, uleb128};
use crate::error::{Error, Result};

/// One run of an hybrid stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HybridEncoded<'a> {
    /// A bit-packed run; each byte group holds 8 values.
    Bitpacked(&'a [u8]),
    /// The little-endian bytes of a single value, repeated.
    Rle(&'a [u8], usize),
}

/// Iterator over the runs of an hybrid stream.
#[derive(Debug)]
pub struct Decoder<'a> {
    values: &'a [u8],
    num_bits: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(values: &'a [u8], num_bits: usize) -> Self {
        Self { values, num_bits }
    }

    pub fn num_bits(&self) -> usize {
        self.num_bits
    }
}

impl<'a> Iterator for Decoder<'a> {
    type Item = Result<HybridEncoded<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_bits == 0 || self.values.is_empty() {
            return None;
        }
        let (header, consumed) = match uleb128::decode(self.values) {
            Ok(read) => read,
            Err(error) => return Some(Err(error)),
        };
        self.values = &self.values[consumed..];
        if header & 1 == 1 {
            // bit-packed run: the header counts groups of 8 values
            let groups = (header >> 1) as usize;
            let length = match groups.checked_mul(self.num_bits) {
                Some(length) if length <= self.values.len() => length,
                _ => {
                    return Some(Err(Error::oos(
                        "bit-packed run extends beyond the stream",
                    )))
                }
            };
            let (run, remaining) = self.values.split_at(length);
            self.values = remaining;
            Some(Ok(HybridEncoded::Bitpacked(run)))
        } else {
            let repetitions = (header >> 1) as usize;
            let length = (self.num_bits + 7) / 8;
            if length > self.values.len() {
                return Some(Err(Error::oos("rle run extends beyond the stream")));
            }
            let (run, remaining) = self.values.split_at(length);
            self.values = remaining;
            Some(Ok(HybridEncoded::Rle(run, repetitions)))
        }
    }
}

/// Decodes `length` values from an hybrid stream.
pub fn decode(values: &[u8], num_bits: usize, length: usize) -> Result<Vec<u32>> {
    if num_bits > 32 {
        return Err(Error::oos(format!(
            "hybrid stream declares a bit width of {}",
            num_bits
        )));
    }
    let mut decoded = Vec::with_capacity(length);
    if num_bits == 0 {
        decoded.resize(length, 0);
        return Ok(decoded);
    }
    let mut runs = Decoder::new(values, num_bits);
    while decoded.len() < length {
        let run = runs
            .next()
            .ok_or_else(|| Error::oos("hybrid stream ended before all values were decoded"))??;
        match run {
            HybridEncoded::Bitpacked(pack) => {
                let count = (pack.len() * 8 / num_bits).min(length - decoded.len());
                decoded.extend(
                    bitpacked::Decoder::new(pack, num_bits, count).map(|value| value as u32),
                );
            }
            HybridEncoded::Rle(value, repetitions) => {
                let mut bytes = [0u8; 4];
                bytes[..value.len()].copy_from_slice(value);
                let value = u32::from_le_bytes(bytes);
                let additional = repetitions.min(length - decoded.len());
                decoded.resize(decoded.len() + additional, value);
            }
        }
    }
    Ok(decoded)
}
