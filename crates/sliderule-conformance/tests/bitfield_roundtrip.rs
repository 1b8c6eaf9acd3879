//! Bit-field pack/unpack round-trip property (spec §4.2.5, §8's
//! "boundary behaviors"): any value that fits in `length` bits survives a
//! pack/unpack cycle at any byte-aligned-or-not bit offset.

use proptest::prelude::*;
use sliderule_membrane::{pack_bit_field, unpack_bit_field};

proptest! {
    #[test]
    fn value_survives_roundtrip(length in 1u32..=32, offset in 0u32..64, seed in any::<u64>()) {
        let value = if length == 64 { seed } else { seed & ((1u64 << length) - 1) };
        let total_bits = offset as u64 + length as u64;
        let mut buf = vec![0u8; ((total_bits + 7) / 8) as usize];

        pack_bit_field(&mut buf, offset, length, value).unwrap();
        let got = unpack_bit_field(&buf, offset, length).unwrap();
        prop_assert_eq!(got, value);
    }

    #[test]
    fn packing_never_clears_bits_outside_the_field(
        length in 1u32..=16,
        offset in 0u32..32,
        value in any::<u64>(),
    ) {
        let value = value & ((1u64 << length) - 1);
        let total_bits = offset as u64 + length as u64;
        let buf_len = ((total_bits + 7) / 8).max(4) as usize;
        let mut buf = vec![0xFFu8; buf_len];
        let before = buf.clone();

        pack_bit_field(&mut buf, offset, length, value).unwrap();

        for bit_pos in 0..(buf_len as u32 * 8) {
            if bit_pos >= offset && bit_pos < offset + length {
                continue;
            }
            let byte_idx = (bit_pos / 8) as usize;
            let mask = 1u8 << (7 - bit_pos % 8);
            prop_assert_eq!(buf[byte_idx] & mask, before[byte_idx] & mask);
        }
    }
}
