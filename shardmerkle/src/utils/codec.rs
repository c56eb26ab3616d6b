//! Encoding and decoding utilities for binary data.
//!
//! This module provides little-endian helpers for the proof byte format:
//! fixed-width integers and length-prefixed byte strings.

use byteorder::{ByteOrder, LittleEndian};

/// Decodes an unsigned 64-bit integer from a little-endian byte slice.
///
/// # Panics
/// If the input slice is less than 8 bytes long
pub fn decode_le_u64(v: &[u8]) -> u64 {
    LittleEndian::read_u64(&v[0..8])
}

/// Decodes an unsigned 32-bit integer from a little-endian byte slice.
///
/// # Panics
/// If the input slice is less than 4 bytes long
pub fn decode_le_u32(v: &[u8]) -> u32 {
    LittleEndian::read_u32(&v[0..4])
}

/// Appends `n` to `out` as 8 little-endian bytes.
pub fn put_le_u64(out: &mut Vec<u8>, n: u64) {
    let mut buf = [0u8; 8];
    LittleEndian::write_u64(&mut buf, n);
    out.extend_from_slice(&buf);
}

/// Appends `n` to `out` as 4 little-endian bytes.
pub fn put_le_u32(out: &mut Vec<u8>, n: u32) {
    let mut buf = [0u8; 4];
    LittleEndian::write_u32(&mut buf, n);
    out.extend_from_slice(&buf);
}

/// Appends a `u32` length prefix followed by `bz`.
pub fn put_bytes(out: &mut Vec<u8>, bz: &[u8]) {
    put_le_u32(out, bz.len() as u32);
    out.extend_from_slice(bz);
}

/// Reads a length-prefixed byte string starting at `*offset`.
///
/// # Returns
/// The bytes, with `*offset` advanced past them, or `None` if `bz` is too short
pub fn read_bytes<'a>(bz: &'a [u8], offset: &mut usize) -> Option<&'a [u8]> {
    let start = *offset;
    if bz.len() < start.checked_add(4)? {
        return None;
    }
    let len = decode_le_u32(&bz[start..]) as usize;
    let end = start.checked_add(4)?.checked_add(len)?;
    if bz.len() < end {
        return None;
    }
    *offset = end;
    Some(&bz[start + 4..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_bytes() {
        let mut out = vec![];
        put_bytes(&mut out, b"abc");
        put_bytes(&mut out, b"");
        let mut offset = 0;
        assert_eq!(read_bytes(&out, &mut offset), Some(&b"abc"[..]));
        assert_eq!(read_bytes(&out, &mut offset), Some(&b""[..]));
        assert_eq!(offset, out.len());
        assert_eq!(read_bytes(&out, &mut offset), None);
    }

    #[test]
    fn test_read_bytes_truncated() {
        let mut out = vec![];
        put_bytes(&mut out, b"abcdef");
        out.truncate(7);
        let mut offset = 0;
        assert_eq!(read_bytes(&out, &mut offset), None);
        assert_eq!(offset, 0);
    }

    #[test]
    fn test_le_ints() {
        let mut out = vec![];
        put_le_u64(&mut out, 0x0102030405060708);
        put_le_u32(&mut out, 7);
        assert_eq!(out[0], 8);
        assert_eq!(decode_le_u64(&out), 0x0102030405060708);
        assert_eq!(decode_le_u32(&out[8..]), 7);
    }
}
