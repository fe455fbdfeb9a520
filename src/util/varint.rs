//! Variable-length integer encoding.
//!
//! LEB128-style 7-bit groups with a continuation bit. Used for the
//! delta-compressed position lists in the journal and the reverse index
//! positions blob.

use crate::error::{Result, TesseraError};

/// Append a varint-encoded u32 to `out`. Returns the number of bytes written.
pub fn encode_u32_into(out: &mut Vec<u8>, value: u32) -> usize {
    encode_u64_into(out, value as u64)
}

/// Append a varint-encoded u64 to `out`. Returns the number of bytes written.
pub fn encode_u64_into(out: &mut Vec<u8>, value: u64) -> usize {
    let start = out.len();
    let mut val = value;

    loop {
        let mut byte = (val & 0x7F) as u8;
        val >>= 7;

        if val != 0 {
            byte |= 0x80;
        }

        out.push(byte);

        if val == 0 {
            break;
        }
    }

    out.len() - start
}

/// Decode a u32 from the start of `bytes`, returning the value and the
/// number of bytes consumed.
pub fn decode_u32(bytes: &[u8]) -> Result<(u32, usize)> {
    let (value, read) = decode_u64(bytes)?;
    let value = u32::try_from(value).map_err(|_| TesseraError::other("VarInt overflow"))?;
    Ok((value, read))
}

/// Decode a u64 from the start of `bytes`, returning the value and the
/// number of bytes consumed.
pub fn decode_u64(bytes: &[u8]) -> Result<(u64, usize)> {
    let mut result = 0u64;
    let mut shift = 0;

    for (i, &byte) in bytes.iter().enumerate() {
        if shift >= 64 {
            return Err(TesseraError::other("VarInt overflow"));
        }

        result |= ((byte & 0x7F) as u64) << shift;

        if (byte & 0x80) == 0 {
            return Ok((result, i + 1));
        }

        shift += 7;
    }

    Err(TesseraError::other("Incomplete VarInt"))
}

/// Append a sorted, non-negative position list as `len, first, delta, delta, ...`.
pub fn encode_delta_list(out: &mut Vec<u8>, values: &[i32]) -> usize {
    let mut written = encode_u32_into(out, values.len() as u32);
    let mut previous = 0i32;
    for &value in values {
        debug_assert!(value >= previous, "delta list must be ascending");
        written += encode_u32_into(out, value.wrapping_sub(previous) as u32);
        previous = value;
    }
    written
}

/// Decode a list written by [`encode_delta_list`], returning the values and
/// the number of bytes consumed.
///
/// Every element takes at least one byte, so a length larger than the
/// remaining input is rejected before anything is allocated.
pub fn decode_delta_list(bytes: &[u8]) -> Result<(Vec<i32>, usize)> {
    let (len, mut pos) = decode_u32(bytes)?;
    let remaining = bytes.len() - pos;
    if len as usize > remaining {
        return Err(TesseraError::other(format!(
            "Delta list of {len} values overruns {remaining} remaining bytes"
        )));
    }
    let mut values = Vec::with_capacity(len as usize);
    let mut previous = 0i32;
    for _ in 0..len {
        let (delta, read) = decode_u32(&bytes[pos..])?;
        pos += read;
        previous = previous.wrapping_add(delta as i32);
        values.push(previous);
    }
    Ok((values, pos))
}
