use super::uleb128;
use crate::error::Result;

/// Decodes a zigzag LEB128-encoded integer, returning it together with the
/// number of bytes consumed.
pub fn decode(values: &[u8]) -> Result<(i64, usize)> {
    let (unsigned, consumed) = uleb128::decode(values)?;
    Ok((((unsigned >> 1) as i64) ^ -((unsigned & 1) as i64), consumed))
}

#[cfg(test)]
pub(crate) fn encode(value: i64, container: &mut Vec<u8>) {
    uleb128::encode(((value << 1) ^ (value >> 63)) as u64, container)
}
