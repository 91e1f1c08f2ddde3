//! Modified UTF-8, the string encoding of classfile constant pools.
//!
//! The format encodes a sequence of UTF-16 code units: one to three bytes
//! per unit, NUL as the two-byte form `0xC0 0x80`, supplementary characters
//! as CESU-8 style surrogate pairs, never a four-byte sequence. Utf8
//! constants stay raw in the pool so untouched entries round-trip
//! bit-for-bit; decoding happens only at inspection points.

use crate::{RemapError, Result};

pub fn decode(bytes: &[u8]) -> Result<String> {
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut rest = bytes;

    while let [first, tail @ ..] = rest {
        let consumed = match first {
            0x00..=0x7F => {
                units.push(*first as u16);
                1
            }
            // The overlong NUL form falls out of the arithmetic here.
            0xC0..=0xDF => {
                let [second, ..] = tail else {
                    return Err(RemapError::InvalidModifiedUtf8);
                };
                units.push(((*first as u16 & 0x1F) << 6) | continuation(*second)?);
                2
            }
            0xE0..=0xEF => {
                let [second, third, ..] = tail else {
                    return Err(RemapError::InvalidModifiedUtf8);
                };
                units.push(
                    ((*first as u16 & 0x0F) << 12)
                        | (continuation(*second)? << 6)
                        | continuation(*third)?,
                );
                3
            }
            _ => return Err(RemapError::InvalidModifiedUtf8),
        };
        rest = &rest[consumed..];
    }

    // Identifiers may legally contain unpaired surrogates; decode lossily
    // rather than rejecting the classfile.
    Ok(String::from_utf16_lossy(&units))
}

fn continuation(byte: u8) -> Result<u16> {
    if byte & 0xC0 == 0x80 {
        Ok((byte & 0x3F) as u16)
    } else {
        Err(RemapError::InvalidModifiedUtf8)
    }
}

pub fn encode(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for unit in s.encode_utf16() {
        match unit {
            0 => out.extend_from_slice(&[0xC0, 0x80]),
            0x0001..=0x007F => out.push(unit as u8),
            0x0080..=0x07FF => {
                out.push(0xC0 | ((unit >> 6) as u8));
                out.push(0x80 | ((unit & 0x3F) as u8));
            }
            _ => {
                out.push(0xE0 | ((unit >> 12) as u8));
                out.push(0x80 | (((unit >> 6) & 0x3F) as u8));
                out.push(0x80 | ((unit & 0x3F) as u8));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_round_trips() {
        let s = "java/lang/Object";
        assert_eq!(decode(&encode(s)).unwrap(), s);
        assert_eq!(encode(s), s.as_bytes());
    }

    #[test]
    fn nul_uses_two_bytes() {
        assert_eq!(encode("\0"), vec![0xC0, 0x80]);
        assert_eq!(decode(&[0xC0, 0x80]).unwrap(), "\0");
    }

    #[test]
    fn bmp_round_trips() {
        let s = "héllo\u{4e16}\u{754c}";
        assert_eq!(decode(&encode(s)).unwrap(), s);
    }

    #[test]
    fn supplementary_round_trips_as_surrogates() {
        let s = "a\u{1F600}b";
        let bytes = encode(s);
        // Surrogate pair: two 3-byte units, never a 4-byte sequence.
        assert_eq!(bytes.len(), 1 + 6 + 1);
        assert_eq!(decode(&bytes).unwrap(), s);
    }

    #[test]
    fn rejects_four_byte_sequences() {
        assert!(decode(&[0xF0, 0x9F, 0x98, 0x80]).is_err());
    }

    #[test]
    fn rejects_truncated_sequences() {
        assert!(decode(&[0xC3]).is_err());
        assert!(decode(&[0xE4, 0xB8]).is_err());
        assert!(decode(&[0xC3, 0x28]).is_err());
    }
}
