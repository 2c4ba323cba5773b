//! Bit-level access to byte buffers.
//!
//! The AstroPix hit fields are arbitrary-width integers packed without any
//! respect for byte boundaries, so a buffer is treated here as a flat bit
//! sequence, most-significant bit first within each byte, concatenated across
//! bytes.

use crate::{Error, Result};

/// Extract the bits `[start, stop)` from `data` as an unsigned integer.
///
/// Bit 0 is the most significant bit of the first byte. The range may span
/// byte boundaries and need not be byte-aligned.
///
/// # Errors
/// [`Error::BitRange`] if the range extends past the end of the buffer, is
/// inverted, or is wider than 64 bits.
pub fn field(data: &[u8], start: usize, stop: usize) -> Result<u64> {
    let num_bits = data.len() * 8;
    if stop > num_bits || start > stop || stop - start > 64 {
        return Err(Error::BitRange {
            start,
            stop,
            num_bits,
        });
    }
    let mut value: u64 = 0;
    for i in start..stop {
        let bit = (data[i / 8] >> (7 - i % 8)) & 1;
        value = (value << 1) | u64::from(bit);
    }
    Ok(value)
}

/// Extract `N` consecutive fields from `data` according to an ordered
/// name -> bit-width table, starting at bit 0.
///
/// The field order in the table defines the bit offsets: field `i` starts at
/// the sum of the widths of fields `0..i`.
///
/// # Errors
/// [`Error::BitRange`] if the total width exceeds the buffer.
pub fn unpack_fields<const N: usize>(
    data: &[u8],
    fields: &[(&str, usize); N],
) -> Result<[u64; N]> {
    let mut values = [0u64; N];
    let mut pos = 0;
    for (value, (_, width)) in values.iter_mut().zip(fields) {
        *value = field(data, pos, pos + width)?;
        pos += width;
    }
    Ok(values)
}

/// Reverse the bit order within each byte of `data`, independently
/// (bit 7 <-> 0, 6 <-> 1, ...).
///
/// This undoes the serialization convention of the readout firmware; it is
/// not a byte-order reversal.
pub fn reverse_bit_order(data: &mut [u8]) {
    for byte in data.iter_mut() {
        *byte = byte.reverse_bits();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_slices_within_and_across_bytes() {
        let data = [0xbc, 0xff];
        // 0xbc 0xff is the bit sequence 1011110011111111
        assert_eq!(field(&data, 0, 4).unwrap(), 11);
        assert_eq!(field(&data, 4, 8).unwrap(), 12);
        assert_eq!(field(&data, 8, 12).unwrap(), 15);
        assert_eq!(field(&data, 12, 16).unwrap(), 15);
        // across the byte boundary
        assert_eq!(field(&data, 6, 10).unwrap(), 3);
        // degenerate cases
        assert_eq!(field(&data, 0, 0).unwrap(), 0);
        assert_eq!(field(&data, 0, 16).unwrap(), 0xbcff);
    }

    #[test]
    fn field_out_of_range_is_an_error() {
        let data = [0xbc, 0xff];
        assert!(matches!(
            field(&data, 0, 17),
            Err(Error::BitRange {
                start: 0,
                stop: 17,
                num_bits: 16
            })
        ));
        assert!(field(&data, 10, 9).is_err());
    }

    #[test]
    fn field_wider_than_64_bits_is_an_error() {
        let data = [0u8; 16];
        assert!(field(&data, 0, 65).is_err());
        assert!(field(&data, 0, 64).is_ok());
    }

    #[test]
    fn unpack_fields_walks_the_layout_in_order() {
        let data = [0xbc, 0xff];
        let fields = [("a", 4), ("b", 4), ("c", 6), ("d", 2)];
        let [a, b, c, d] = unpack_fields(&data, &fields).unwrap();
        assert_eq!((a, b, c, d), (11, 12, 0b111111, 3));
    }

    #[test]
    fn unpack_fields_too_wide_is_an_error() {
        let data = [0xbc];
        assert!(unpack_fields(&data, &[("a", 4), ("b", 5)]).is_err());
    }

    #[test]
    fn reverse_bit_order_is_per_byte() {
        let mut data = [0xe0, 0x80, 0x56, 0x01];
        reverse_bit_order(&mut data);
        assert_eq!(data, [0x07, 0x01, 0x6a, 0x80]);
        // applying it twice is the identity
        reverse_bit_order(&mut data);
        assert_eq!(data, [0xe0, 0x80, 0x56, 0x01]);
    }
}
