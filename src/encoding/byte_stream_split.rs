//! BYTE_STREAM_SPLIT decoding.
use crate::error::{Error, Result};

/// Reassembles a BYTE_STREAM_SPLIT body into the contiguous little-endian
/// layout of `num_values` values of `element_size` bytes each.
///
/// The body holds `element_size` streams; byte `j` of value `i` is byte `i`
/// of stream `j`.
pub fn decode(values: &[u8], element_size: usize, num_values: usize) -> Result<Vec<u8>> {
    if element_size == 0 || values.len() % element_size != 0 {
        return Err(Error::oos(format!(
            "byte stream split body of {} bytes cannot hold {}-byte values",
            values.len(),
            element_size
        )));
    }
    let stride = values.len() / element_size;
    if stride < num_values {
        return Err(Error::oos(
            "byte stream split body holds fewer values than the page declares",
        ));
    }
    let mut decoded = vec![0u8; num_values * element_size];
    for element in 0..element_size {
        let stream = &values[element * stride..element * stride + num_values];
        for (index, byte) in stream.iter().enumerate() {
            decoded[index * element_size + element] = *byte;
        }
    }
    Ok(decoded)
}
