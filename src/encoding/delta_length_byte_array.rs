//! DELTA_LENGTH_BYTE_ARRAY decoding.
use super::delta_bitpacked;
use crate::error::Result;

/// Splits a DELTA_LENGTH_BYTE_ARRAY stream into its decoded lengths and the
/// concatenated value bytes that follow them.
pub fn decode(values: &[u8]) -> Result<(Vec<i64>, &[u8])> {
    let (lengths, consumed) = delta_bitpacked::decode(values)?;
    Ok((lengths, &values[consumed..]))
}
