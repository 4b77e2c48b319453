//! DELTA_BYTE_ARRAY decoding.
use super::delta_bitpacked;
use crate::error::{Error, Result};

/// Decodes a DELTA_BYTE_ARRAY stream into materialized values, resolving
/// the prefix sharing with the previously decoded value.
pub fn decode(values: &[u8]) -> Result<Vec<Vec<u8>>> {
    let (prefix_lengths, consumed) = delta_bitpacked::decode(values)?;
    let (suffix_lengths, suffixes_consumed) = delta_bitpacked::decode(&values[consumed..])?;
    let mut data = &values[consumed + suffixes_consumed..];

    if prefix_lengths.len() != suffix_lengths.len() {
        return Err(Error::oos(format!(
            "delta byte array declares {} prefixes but {} suffixes",
            prefix_lengths.len(),
            suffix_lengths.len()
        )));
    }

    let mut decoded = Vec::with_capacity(prefix_lengths.len());
    let mut previous: Vec<u8> = vec![];
    for (prefix_length, suffix_length) in prefix_lengths.iter().zip(suffix_lengths.iter()) {
        if *prefix_length < 0 || *suffix_length < 0 {
            return Err(Error::oos("negative length in delta byte array"));
        }
        let prefix_length = *prefix_length as usize;
        let suffix_length = *suffix_length as usize;
        if prefix_length > previous.len() {
            return Err(Error::oos(
                "delta byte array prefix is longer than the previous value",
            ));
        }
        if suffix_length > data.len() {
            return Err(Error::oos("delta byte array suffix extends beyond the page"));
        }
        let mut value = Vec::with_capacity(prefix_length + suffix_length);
        value.extend_from_slice(&previous[..prefix_length]);
        value.extend_from_slice(&data[..suffix_length]);
        data = &data[suffix_length..];
        previous = value.clone();
        decoded.push(value);
    }
    Ok(decoded)
}
