//! Bit and byte helpers for binary structures read out of streams

use crate::{Error, Result};
use std::fmt::Write;

/// One flag bit inside a big-endian field of a byte buffer.
///
/// Bit 0 is the least significant bit of the field's last byte, so bit
/// numbers match the field's integer value regardless of its width.
///
/// # Example
///
/// ```rust
/// use spanio_core::FlagBit;
///
/// let mut data = [0x00u8, 0x80];
/// let flag = FlagBit::new(0, 2, 7).unwrap();
/// assert!(flag.get(&data).unwrap());
/// flag.set(&mut data, false).unwrap();
/// assert_eq!(data, [0x00, 0x00]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagBit {
    offset: usize,
    length: usize,
    bit: usize,
}

impl FlagBit {
    /// Describe bit `bit` of the `length`-byte field starting at `offset`
    pub fn new(offset: usize, length: usize, bit: usize) -> Result<Self> {
        if bit >= length.saturating_mul(8) {
            return Err(Error::out_of_bounds(format!(
                "Illegal bit address {} (valid range is 0 to {})",
                bit,
                length.saturating_mul(8).saturating_sub(1)
            )));
        }
        Ok(Self { offset, length, bit })
    }

    /// Index of the byte holding this bit and the mask within it
    fn locate(&self, buf_len: usize) -> Result<(usize, u8)> {
        let end = self.offset.checked_add(self.length).ok_or_else(|| {
            Error::out_of_bounds(format!(
                "Field at {} with length {} overflows",
                self.offset, self.length
            ))
        })?;
        if end > buf_len {
            return Err(Error::out_of_bounds(format!(
                "Field {}..{} exceeds buffer of {} bytes",
                self.offset, end, buf_len
            )));
        }
        let index = self.offset + (self.length - 1) - self.bit / 8;
        Ok((index, 1u8 << (self.bit % 8)))
    }

    /// Read the flag
    pub fn get(&self, data: &[u8]) -> Result<bool> {
        let (index, mask) = self.locate(data.len())?;
        Ok(data[index] & mask != 0)
    }

    /// Write the flag, leaving every other bit untouched
    pub fn set(&self, data: &mut [u8], value: bool) -> Result<()> {
        let (index, mask) = self.locate(data.len())?;
        if value {
            data[index] |= mask;
        } else {
            data[index] &= !mask;
        }
        Ok(())
    }
}

/// Reverse the byte order of `data` in place.
///
/// Integers have `swap_bytes`; this covers fields of arbitrary width.
pub fn byte_swap(data: &mut [u8]) {
    data.reverse();
}

/// A byte-swapped copy of `data`
pub fn byte_swapped(data: &[u8]) -> Vec<u8> {
    let mut swapped = data.to_vec();
    byte_swap(&mut swapped);
    swapped
}

/// Render bytes as a classic offset / hex / ASCII dump, 16 bytes per row
pub fn hex_dump(data: &[u8], base_offset: u64) -> String {
    let mut out = String::new();
    for (row, chunk) in data.chunks(16).enumerate() {
        let encoded = hex::encode(chunk);
        let mut grouped = String::with_capacity(48);
        for (i, pair) in encoded.as_bytes().chunks(2).enumerate() {
            if i > 0 {
                grouped.push(' ');
            }
            grouped.push_str(std::str::from_utf8(pair).unwrap_or("??"));
        }
        let ascii: String = chunk
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect();
        let _ = writeln!(
            out,
            "{:08x}  {:<47}  |{}|",
            base_offset + (row as u64) * 16,
            grouped,
            ascii
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_bit_toggle() {
        let mut data = [0x00u8, 0xFF, 0x00, 0xEE];
        assert_eq!(hex::encode(data), "00ff00ee");

        // Highest bit of the two-byte field at offset 1
        let flag = FlagBit::new(1, 2, 15).unwrap();
        assert!(flag.get(&data).unwrap());

        flag.set(&mut data, true).unwrap();
        assert_eq!(hex::encode(data), "00ff00ee");

        flag.set(&mut data, false).unwrap();
        assert_eq!(hex::encode(data), "007f00ee");

        flag.set(&mut data, true).unwrap();
        assert_eq!(hex::encode(data), "00ff00ee");
    }

    #[test]
    fn test_flag_bit_low_bits() {
        let mut data = [0u8; 4];
        let flag = FlagBit::new(0, 4, 0).unwrap();
        flag.set(&mut data, true).unwrap();
        assert_eq!(u32::from_be_bytes(data), 1);

        let flag = FlagBit::new(0, 4, 9).unwrap();
        flag.set(&mut data, true).unwrap();
        assert_eq!(u32::from_be_bytes(data), 0x201);
    }

    #[test]
    fn test_flag_bit_bounds() {
        assert!(FlagBit::new(0, 2, 16).is_err());
        assert!(FlagBit::new(0, 0, 0).is_err());

        let flag = FlagBit::new(3, 2, 0).unwrap();
        assert!(flag.get(&[0u8; 4]).is_err());

        let flag = FlagBit::new(usize::MAX, 1, 0).unwrap();
        assert!(matches!(flag.get(&[0u8; 4]), Err(Error::OutOfBounds(_))));
        assert!(flag.set(&mut [0u8; 4], true).is_err());
    }

    #[test]
    fn test_byte_swap() {
        let data: Vec<u8> = (0..32).collect();
        assert_eq!(
            hex::encode(byte_swapped(&data)),
            "1f1e1d1c1b1a191817161514131211100f0e0d0c0b0a09080706050403020100"
        );

        let mut field = 0xFEDC_BA98u32.to_be_bytes();
        byte_swap(&mut field);
        assert_eq!(hex::encode(field), "98badcfe");
        assert_eq!(u32::from_be_bytes(field), 0xFEDC_BA98u32.swap_bytes());
    }

    #[test]
    fn test_hex_dump() {
        let data: Vec<u8> = (0x41..0x41 + 18).collect();
        let dump = hex_dump(&data, 0x100);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("00000100  41 42 43"));
        assert!(lines[0].ends_with("|ABCDEFGHIJKLMNOP|"));
        assert!(lines[1].starts_with("00000110  51 52"));
        assert!(lines[1].ends_with("|QR|"));
    }
}
