use super::{bool_byte, SevenZResult};

use bitvec::prelude::*;
use nom::bytes::complete::take;
use nom::error::context;

/// Reads `num_bits` flags packed MSB-first into whole bytes,
/// dropping any leftover bits of the last byte.
pub fn take_bitvec(input: &[u8], num_bits: usize) -> SevenZResult<BitVec> {
    let num_bytes = (num_bits + 7) / 8;
    let (input, raw) = context("take_bitvec bytes", take(num_bytes))(input)?;

    let mut bits: BitVec = BitVec::with_capacity(num_bits);
    for i in 0..num_bits {
        let byte = raw[i / 8];
        bits.push(((byte >> (7 - (i % 8))) & 1) == 1);
    }
    return Ok((input, bits));
}

/// Reads an "all defined" byte, followed by a packed bit vector only when
/// not all items are flagged. Used by the optional-value properties.
pub fn take_bitvec_or_all_set(input: &[u8], num_bits: usize) -> SevenZResult<BitVec> {
    let (input, all_defined) = context("take_bitvec_or_all_set all_defined", bool_byte)(input)?;
    if all_defined {
        return Ok((input, BitVec::repeat(true, num_bits)));
    }
    return take_bitvec(input, num_bits);
}
