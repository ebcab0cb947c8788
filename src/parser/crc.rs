//! This module exposes the CRC algorithm used by 7zip.

use crc::*;

/// CRC-32/ISO-HDLC, the zlib variant 7zip uses everywhere.
/// The table is built in a const context, so no runtime init ordering applies.
pub const CRC_32_7Z: Algorithm<u32> = Algorithm {
    width: 32,
    poly: 0x04c11db7,
    init: 0xffffffff,
    refin: true,
    refout: true,
    xorout: 0xffffffff,
    check: 0xcbf43926,
    residue: 0xdebb20e3,
};

pub const SEVENZ_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_7Z);

/// One-shot CRC over a buffer.
pub fn sevenz_crc(input: &[u8]) -> u32 {
    let mut digest = SEVENZ_CRC.digest();
    digest.update(input);
    return digest.finalize();
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn crc_known_vectors() {
        // Standard check value for CRC-32/ISO-HDLC.
        assert_eq!(sevenz_crc(b"123456789"), 0xcbf43926);
        // Seed and final XOR cancel out on empty input.
        assert_eq!(sevenz_crc(b""), 0);
        assert_eq!(sevenz_crc(b"hello world"), 0x0d4a1185);
    }

    #[test]
    fn crc_incremental_matches_oneshot() {
        let mut digest = SEVENZ_CRC.digest();
        digest.update(b"hello ");
        digest.update(b"world");
        assert_eq!(digest.finalize(), sevenz_crc(b"hello world"));
    }
}
