//! LZMA2 chunk framing over the LZMA decoder.
//!
//! An LZMA2 stream is a sequence of chunks, each either stored verbatim or
//! LZMA-coded with its own reset flags, terminated by a zero control byte.
//! The inner decoder state survives across chunks unless a chunk resets it.

use super::lzma::{LzmaDecoder, LzmaProps, RangeDecoder};
use super::{Codec, CodecError};

/// Translates the single LZMA2 dictionary-size property byte.
///
/// Sizes follow the 2^n / 3*2^n ladder; 40 means the full 4 GiB - 1.
pub(crate) fn dict_size_from_prop_byte(p: u8) -> Result<u32, CodecError> {
    if p > 40 {
        return Err(CodecError::InvalidProperties);
    }
    if p == 40 {
        return Ok(u32::MAX);
    }
    return Ok((2 | (p as u32 & 1)) << (p / 2 + 11));
}

fn read_u16_be(input: &[u8], pos: &mut usize) -> Result<usize, CodecError> {
    let hi = *input.get(*pos).ok_or(CodecError::Truncated)?;
    let lo = *input.get(*pos + 1).ok_or(CodecError::Truncated)?;
    *pos += 2;
    return Ok(((hi as usize) << 8) | lo as usize);
}

pub struct Lzma2 {
    dict_size: u32,
}

impl Lzma2 {
    /// The coder properties blob is a single dictionary-size byte.
    pub fn with_attrs(attrs: Option<&[u8]>) -> Result<Lzma2, CodecError> {
        return match attrs {
            Some([p]) => Ok(Lzma2 {
                dict_size: dict_size_from_prop_byte(*p)?,
            }),
            _ => Err(CodecError::InvalidProperties),
        };
    }
}

impl Codec for Lzma2 {
    fn decode(&self, input: &[u8], out: &mut [u8]) -> Result<(), CodecError> {
        let mut pos: usize = 0;
        let mut written: usize = 0;
        let mut dict_start: usize = 0;
        let mut decoder: Option<LzmaDecoder> = None;
        let mut first_chunk = true;

        loop {
            let control = *input.get(pos).ok_or(CodecError::Truncated)?;
            pos += 1;
            if control == 0x00 {
                break;
            }

            if control < 0x80 {
                // Stored chunk: 0x01 resets the dictionary, 0x02 keeps it.
                if control > 0x02 {
                    return Err(CodecError::Corrupt("invalid chunk control byte"));
                }
                let size = read_u16_be(input, &mut pos)? + 1;
                if control == 0x01 {
                    dict_start = written;
                } else if first_chunk {
                    return Err(CodecError::Corrupt("first chunk must reset dictionary"));
                }
                let chunk = input
                    .get(pos..pos + size)
                    .ok_or(CodecError::Truncated)?;
                if size > out.len() - written {
                    return Err(CodecError::Corrupt("chunk overruns declared output"));
                }
                out[written..written + size].copy_from_slice(chunk);
                pos += size;
                written += size;
                // Stored data invalidates the adaptive models.
                if let Some(dec) = decoder.as_mut() {
                    dec.reset_state();
                }
                first_chunk = false;
                continue;
            }

            let unpacked = (((control & 0x1F) as usize) << 16) + read_u16_be(input, &mut pos)? + 1;
            let packed = read_u16_be(input, &mut pos)? + 1;
            let reset = (control >> 5) & 0x3;
            match reset {
                0 => {
                    if decoder.is_none() {
                        return Err(CodecError::Corrupt("chunk continues missing state"));
                    }
                }
                1 => match decoder.as_mut() {
                    Some(dec) => dec.reset_state(),
                    None => {
                        return Err(CodecError::Corrupt("chunk resets missing state"));
                    }
                },
                _ => {
                    let props_byte = *input.get(pos).ok_or(CodecError::Truncated)?;
                    pos += 1;
                    let props = LzmaProps::from_props_byte(props_byte)?;
                    decoder = Some(LzmaDecoder::new(props, self.dict_size));
                    if reset == 3 {
                        dict_start = written;
                    } else if first_chunk {
                        return Err(CodecError::Corrupt("first chunk must reset dictionary"));
                    }
                }
            }

            if unpacked > out.len() - written {
                return Err(CodecError::Corrupt("chunk overruns declared output"));
            }
            let chunk = input
                .get(pos..pos + packed)
                .ok_or(CodecError::Truncated)?;
            let mut rc = RangeDecoder::new(chunk)?;
            match decoder.as_mut() {
                Some(dec) => {
                    dec.decode_into(&mut rc, out, dict_start, written, written + unpacked)?
                }
                None => return Err(CodecError::Corrupt("chunk continues missing state")),
            }
            // Every chunk's compressed payload must be spent exactly.
            if !rc.is_fully_consumed() {
                return Err(CodecError::Corrupt("chunk input not fully consumed"));
            }
            pos += packed;
            written += unpacked;
            first_chunk = false;
        }

        if written != out.len() {
            return Err(CodecError::Truncated);
        }
        return Ok(());
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dict_size_ladder() {
        assert_eq!(dict_size_from_prop_byte(0).unwrap(), 1 << 12);
        assert_eq!(dict_size_from_prop_byte(1).unwrap(), 3 << 11);
        assert_eq!(dict_size_from_prop_byte(2).unwrap(), 1 << 13);
        assert_eq!(dict_size_from_prop_byte(24).unwrap(), 1 << 24);
        assert_eq!(dict_size_from_prop_byte(40).unwrap(), u32::MAX);
        assert_eq!(
            dict_size_from_prop_byte(41),
            Err(CodecError::InvalidProperties)
        );
    }

    #[test]
    fn attrs_blob_must_be_one_byte() {
        assert!(Lzma2::with_attrs(None).is_err());
        assert!(Lzma2::with_attrs(Some(&[24, 0])).is_err());
        assert!(Lzma2::with_attrs(Some(&[24])).is_ok());
    }

    /// Builds a stored chunk: control, 16-bit size-1, payload.
    fn stored_chunk(control: u8, payload: &[u8]) -> Vec<u8> {
        let size = payload.len() - 1;
        let mut chunk = vec![control, (size >> 8) as u8, size as u8];
        chunk.extend_from_slice(payload);
        return chunk;
    }

    #[test]
    fn stored_chunks_decode() {
        let mut input = stored_chunk(0x01, b"hello ");
        input.extend_from_slice(&stored_chunk(0x02, b"world"));
        input.push(0x00);

        let codec = Lzma2::with_attrs(Some(&[0])).unwrap();
        let mut out = vec![0u8; 11];
        codec.decode(&input, &mut out).unwrap();
        assert_eq!(&out, b"hello world");
    }

    #[test]
    fn first_chunk_must_reset_dictionary() {
        let mut input = stored_chunk(0x02, b"hi");
        input.push(0x00);
        let codec = Lzma2::with_attrs(Some(&[0])).unwrap();
        let mut out = vec![0u8; 2];
        assert_eq!(
            codec.decode(&input, &mut out),
            Err(CodecError::Corrupt("first chunk must reset dictionary"))
        );
    }

    #[test]
    fn missing_terminator_is_truncation() {
        let input = stored_chunk(0x01, b"hi");
        let codec = Lzma2::with_attrs(Some(&[0])).unwrap();
        let mut out = vec![0u8; 2];
        assert_eq!(codec.decode(&input, &mut out), Err(CodecError::Truncated));
    }

    #[test]
    fn short_output_is_detected() {
        let mut input = stored_chunk(0x01, b"hi");
        input.push(0x00);
        let codec = Lzma2::with_attrs(Some(&[0])).unwrap();
        let mut out = vec![0u8; 5];
        assert_eq!(codec.decode(&input, &mut out), Err(CodecError::Truncated));
    }

    #[test]
    fn oversized_chunk_is_corrupt() {
        let mut input = stored_chunk(0x01, b"hello");
        input.push(0x00);
        let codec = Lzma2::with_attrs(Some(&[0])).unwrap();
        let mut out = vec![0u8; 3];
        assert_eq!(
            codec.decode(&input, &mut out),
            Err(CodecError::Corrupt("chunk overruns declared output"))
        );
    }

    #[test]
    fn invalid_control_byte_is_corrupt() {
        let codec = Lzma2::with_attrs(Some(&[0])).unwrap();
        let mut out = vec![0u8; 1];
        assert_eq!(
            codec.decode(&[0x03, 0, 0, 0xAA, 0x00], &mut out),
            Err(CodecError::Corrupt("invalid chunk control byte"))
        );
    }

    #[test]
    fn lzma_chunk_without_props_is_corrupt() {
        // Reset mode 0 with no prior chunk state.
        let codec = Lzma2::with_attrs(Some(&[0])).unwrap();
        let mut out = vec![0u8; 1];
        assert_eq!(
            codec.decode(&[0x80, 0, 0, 0, 0, 0x00], &mut out),
            Err(CodecError::Corrupt("chunk continues missing state"))
        );
    }
}
