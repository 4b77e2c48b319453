//! DELTA_BINARY_PACKED decoding.
use super::{bitpacked, uleb128, zigzag_leb128};
use crate::error::{Error, Result};

/// Decodes a DELTA_BINARY_PACKED stream, returning the values and the number
/// of bytes consumed.
///
/// The consumed length is significant: DELTA_BYTE_ARRAY carries two of these
/// streams back to back.
pub fn decode(values: &[u8]) -> Result<(Vec<i64>, usize)> {
    let mut consumed = 0;
    let (block_size, size) = uleb128::decode(values)?;
    consumed += size;
    let (num_miniblocks, size) = uleb128::decode(&values[consumed..])?;
    consumed += size;
    let (total_count, size) = uleb128::decode(&values[consumed..])?;
    consumed += size;
    let (first_value, size) = zigzag_leb128::decode(&values[consumed..])?;
    consumed += size;

    let block_size = block_size as usize;
    let num_miniblocks = num_miniblocks as usize;
    let total_count = total_count as usize;

    if block_size == 0 || block_size % 128 != 0 {
        return Err(Error::oos(format!(
            "delta header declares a block size of {}",
            block_size
        )));
    }
    if num_miniblocks == 0 || block_size % num_miniblocks != 0 {
        return Err(Error::oos(format!(
            "delta header declares {} miniblocks per block",
            num_miniblocks
        )));
    }
    let values_per_miniblock = block_size / num_miniblocks;
    if values_per_miniblock == 0 || values_per_miniblock % 32 != 0 {
        return Err(Error::oos(format!(
            "delta miniblocks hold {} values",
            values_per_miniblock
        )));
    }

    let mut decoded = Vec::with_capacity(total_count);
    if total_count == 0 {
        return Ok((decoded, consumed));
    }
    decoded.push(first_value);
    let mut last = first_value;

    while decoded.len() < total_count {
        let (min_delta, size) = zigzag_leb128::decode(&values[consumed..])?;
        consumed += size;
        let widths_end = consumed + num_miniblocks;
        let widths = values
            .get(consumed..widths_end)
            .ok_or_else(|| Error::oos("delta block ends before its miniblock widths"))?;
        consumed = widths_end;

        for &width in widths {
            if decoded.len() == total_count {
                // trailing miniblocks of the last block carry no data
                break;
            }
            let width = width as usize;
            if width > 64 {
                return Err(Error::oos(format!(
                    "delta miniblock declares a bit width of {}",
                    width
                )));
            }
            let miniblock_length = values_per_miniblock
                .checked_mul(width)
                .map(|bits| bits / 8)
                .ok_or_else(|| Error::oos("delta miniblock size overflows"))?;
            let miniblock_end = consumed + miniblock_length;
            let miniblock = values
                .get(consumed..miniblock_end)
                .ok_or_else(|| Error::oos("delta miniblock extends beyond the page"))?;
            consumed = miniblock_end;

            let take = (total_count - decoded.len()).min(values_per_miniblock);
            let mut deltas = bitpacked::Decoder::new(miniblock, width, take);
            for _ in 0..take {
                let delta = deltas
                    .next()
                    .ok_or_else(|| Error::oos("delta miniblock is truncated"))?;
                last = last.wrapping_add(min_delta).wrapping_add(delta as i64);
                decoded.push(last);
            }
        }
    }

    Ok((decoded, consumed))
}
