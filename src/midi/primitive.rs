//! Big-endian fixed-width integers and MIDI variable-length quantities.
//! Every read advances the slice past the bytes it consumed.

use crate::error::MidiError;

type ReadResult<T> = Result<T, MidiError>;

/// Splits `at` bytes off the front of `raw`, failing if fewer remain.
pub(crate) fn take<'a>(raw: &mut &'a [u8], at: usize) -> ReadResult<&'a [u8]> {
    if at > raw.len() {
        return Err(MidiError::TruncatedInput {
            needed: at,
            available: raw.len(),
        });
    }
    let (taken, rest) = raw.split_at(at);
    *raw = rest;
    Ok(taken)
}

fn read_be(raw: &mut &[u8], width: usize) -> ReadResult<u32> {
    let bytes = take(raw, width)?;
    Ok(bytes.iter().fold(0, |acc, byte| (acc << 8) | *byte as u32))
}

pub fn read_u8(raw: &mut &[u8]) -> ReadResult<u8> {
    Ok(take(raw, 1)?[0])
}

pub fn read_u16(raw: &mut &[u8]) -> ReadResult<u16> {
    Ok(read_be(raw, 2)? as u16)
}

pub fn read_u24(raw: &mut &[u8]) -> ReadResult<u32> {
    read_be(raw, 3)
}

pub fn read_u32(raw: &mut &[u8]) -> ReadResult<u32> {
    read_be(raw, 4)
}

/// Reads a variable-length quantity: 7 bits per byte, top bit set while more bytes follow.
///
/// At most 4 bytes are read. A fourth byte that still has its continuation bit set is used
/// as-is, which keeps the result within 28 bits.
pub fn read_varlen(raw: &mut &[u8]) -> ReadResult<u32> {
    let mut value: u32 = 0;
    for _ in 0..4 {
        let byte = read_u8(raw)?;
        value = (value << 7) | (byte & 0x7F) as u32;
        if byte & 0x80 == 0 {
            break;
        }
    }
    Ok(value)
}

pub fn decode_varlen(bytes: &[u8]) -> ReadResult<(u32, usize)> {
    let mut raw = bytes;
    let value = read_varlen(&mut raw)?;
    Ok((value, bytes.len() - raw.len()))
}

#[cfg(test)]
pub(crate) fn encode_varlen(value: u32) -> Vec<u8> {
    let mut out = vec![(value & 0x7F) as u8];
    let mut rest = value >> 7;
    while rest > 0 {
        out.push((rest & 0x7F) as u8 | 0x80);
        rest >>= 7;
    }
    out.reverse();
    out
}
