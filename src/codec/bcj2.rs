//! BCJ2: the four-stream x86 branch converter.
//!
//! The encoder splits the input into a main stream with branch targets
//! removed, separate big-endian absolute-target streams for calls and jumps,
//! and a range-coded control stream saying which branch bytes had their
//! target extracted. Decoding merges the four back together.

use super::CodecError;

const NUM_MODEL_BITS: u32 = 11;
const BIT_MODEL_TOTAL: u32 = 1 << NUM_MODEL_BITS;
const NUM_MOVE_BITS: u32 = 5;
const TOP: u32 = 1 << 24;

/// Probability slots: one per preceding byte value for E8, one for E9,
/// one for the two-byte Jcc forms.
const NUM_PROBS: usize = 256 + 2;

/// The BCJ2 control stream's own range decoder. Unlike LZMA's it has no
/// mandatory zero lead byte; the code register is seeded from five bytes.
struct RangeDecoder<'a> {
    input: &'a [u8],
    pos: usize,
    range: u32,
    code: u32,
}

impl<'a> RangeDecoder<'a> {
    fn new(input: &'a [u8]) -> Result<RangeDecoder<'a>, CodecError> {
        if input.len() < 5 {
            return Err(CodecError::Truncated);
        }
        let mut code: u32 = 0;
        for &b in &input[..5] {
            code = (code << 8) | b as u32;
        }
        return Ok(RangeDecoder {
            input,
            pos: 5,
            range: u32::MAX,
            code,
        });
    }

    fn next_byte(&mut self) -> Result<u32, CodecError> {
        let b = *self.input.get(self.pos).ok_or(CodecError::Truncated)?;
        self.pos += 1;
        return Ok(b as u32);
    }

    fn decode_bit(&mut self, prob: &mut u16) -> Result<u32, CodecError> {
        let bound = (self.range >> NUM_MODEL_BITS) * (*prob as u32);
        let bit;
        if self.code < bound {
            *prob += ((BIT_MODEL_TOTAL - *prob as u32) >> NUM_MOVE_BITS) as u16;
            self.range = bound;
            bit = 0;
        } else {
            *prob -= *prob >> NUM_MOVE_BITS;
            self.code -= bound;
            self.range -= bound;
            bit = 1;
        }
        if self.range < TOP {
            self.range <<= 8;
            self.code = (self.code << 8) | self.next_byte()?;
        }
        return Ok(bit);
    }
}

/// A byte pair that ends in a branch opcode BCJ2 tracks: E8/E9 directly,
/// or the 0F 8x two-byte conditional jumps.
fn is_branch(prev: u8, b: u8) -> bool {
    return (b & 0xFE) == 0xE8 || (prev == 0x0F && (b & 0xF0) == 0x80);
}

fn take_be_u32(stream: &[u8], pos: &mut usize) -> Result<u32, CodecError> {
    let s = stream
        .get(*pos..*pos + 4)
        .ok_or(CodecError::Truncated)?;
    *pos += 4;
    return Ok(((s[0] as u32) << 24) | ((s[1] as u32) << 16) | ((s[2] as u32) << 8) | s[3] as u32);
}

/// Merges the four BCJ2 streams into `out`, filling it completely.
pub fn bcj2_decode(
    main: &[u8],
    call: &[u8],
    jump: &[u8],
    control: &[u8],
    out: &mut [u8],
) -> Result<(), CodecError> {
    let mut probs = [(BIT_MODEL_TOTAL >> 1) as u16; NUM_PROBS];
    let mut rc = RangeDecoder::new(control)?;

    let mut main_pos: usize = 0;
    let mut call_pos: usize = 0;
    let mut jump_pos: usize = 0;
    let mut out_pos: usize = 0;
    let mut prev: u8 = 0;

    while out_pos < out.len() {
        let b = *main.get(main_pos).ok_or(CodecError::Truncated)?;
        main_pos += 1;
        out[out_pos] = b;
        out_pos += 1;

        if !is_branch(prev, b) {
            prev = b;
            continue;
        }
        let prob_index = match b {
            0xE8 => prev as usize,
            0xE9 => 256,
            _ => 257,
        };
        if rc.decode_bit(&mut probs[prob_index])? == 0 {
            prev = b;
            continue;
        }

        // The 4-byte target was extracted; pull it back from the matching
        // stream and re-relativize it against the position after the field.
        let absolute = if b == 0xE8 {
            take_be_u32(call, &mut call_pos)?
        } else {
            take_be_u32(jump, &mut jump_pos)?
        };
        if out.len() - out_pos < 4 {
            return Err(CodecError::Corrupt("branch target overruns output"));
        }
        let relative = absolute.wrapping_sub(out_pos as u32 + 4);
        out[out_pos..out_pos + 4].copy_from_slice(&relative.to_le_bytes());
        out_pos += 4;
        prev = (relative >> 24) as u8;
    }
    return Ok(());
}
