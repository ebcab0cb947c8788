//! A from-scratch LZMA decoder.
//!
//! Decodes the classic (alone-style) LZMA stream found in 7z folders. The
//! caller-provided output buffer doubles as the dictionary, which works
//! because 7z folders always declare their unpacked size up front. The
//! decoder state is kept separate from the codec so the LZMA2 chunk driver
//! can carry it across chunks.

use super::{Codec, CodecError};

pub(crate) const PROB_INIT: u16 = 1 << (MODEL_TOTAL_BITS - 1);
const MODEL_TOTAL_BITS: u32 = 11;
const MOVE_BITS: u32 = 5;
const TOP: u32 = 1 << 24;

const NUM_STATES: usize = 12;
const NUM_LIT_STATES: usize = 7;
const NUM_POS_STATES_MAX: usize = 1 << 4;
const MATCH_MIN_LEN: u32 = 2;
const NUM_LEN_TO_POS_STATES: usize = 4;
const NUM_POS_SLOT_BITS: u32 = 6;
const NUM_ALIGN_BITS: u32 = 4;
const END_POS_MODEL_INDEX: u32 = 14;
/// Number of probability slots backing the low distance bit-trees.
const NUM_SPEC_POS: usize = (1 << (END_POS_MODEL_INDEX >> 1)) - END_POS_MODEL_INDEX as usize + 1;
const DICT_SIZE_MIN: u32 = 1 << 12;

/// Carryless binary range decoder over an in-memory stream.
pub(crate) struct RangeDecoder<'a> {
    input: &'a [u8],
    pos: usize,
    range: u32,
    code: u32,
}

impl<'a> RangeDecoder<'a> {
    /// The stream starts with one mandatory zero byte and the initial
    /// 32 bits of code, big-endian.
    pub fn new(input: &'a [u8]) -> Result<RangeDecoder<'a>, CodecError> {
        if input.len() < 5 {
            return Err(CodecError::Truncated);
        }
        if input[0] != 0 {
            return Err(CodecError::Corrupt("nonzero range coder init byte"));
        }
        let code = u32::from_be_bytes([input[1], input[2], input[3], input[4]]);
        return Ok(RangeDecoder {
            input,
            pos: 5,
            range: u32::MAX,
            code,
        });
    }

    pub fn is_fully_consumed(&self) -> bool {
        return self.pos == self.input.len();
    }

    fn next_byte(&mut self) -> Result<u32, CodecError> {
        let b = *self.input.get(self.pos).ok_or(CodecError::Truncated)?;
        self.pos += 1;
        return Ok(b as u32);
    }

    fn normalize(&mut self) -> Result<(), CodecError> {
        if self.range < TOP {
            self.range <<= 8;
            self.code = (self.code << 8) | self.next_byte()?;
        }
        return Ok(());
    }

    /// Decodes one bit against an adaptive probability.
    pub fn decode_bit(&mut self, prob: &mut u16) -> Result<u32, CodecError> {
        let bound = (self.range >> MODEL_TOTAL_BITS) * (*prob as u32);
        let bit;
        if self.code < bound {
            *prob += ((1 << MODEL_TOTAL_BITS) - *prob) >> MOVE_BITS;
            self.range = bound;
            bit = 0;
        } else {
            *prob -= *prob >> MOVE_BITS;
            self.code -= bound;
            self.range -= bound;
            bit = 1;
        }
        self.normalize()?;
        return Ok(bit);
    }

    /// Decodes `num_bits` equiprobable bits, most significant first.
    pub fn decode_direct_bits(&mut self, num_bits: u32) -> Result<u32, CodecError> {
        let mut result: u32 = 0;
        for _ in 0..num_bits {
            self.range >>= 1;
            self.code = self.code.wrapping_sub(self.range);
            // t is all-ones when the subtraction wrapped (bit 0), zero otherwise.
            let t = 0u32.wrapping_sub(self.code >> 31);
            self.code = self.code.wrapping_add(self.range & t);
            self.normalize()?;
            result = (result << 1).wrapping_add(t.wrapping_add(1));
        }
        return Ok(result);
    }

    fn decode_bit_tree(&mut self, probs: &mut [u16], num_bits: u32) -> Result<u32, CodecError> {
        let mut m: usize = 1;
        for _ in 0..num_bits {
            m = (m << 1) + self.decode_bit(&mut probs[m])? as usize;
        }
        return Ok((m - (1usize << num_bits)) as u32);
    }

    fn decode_bit_tree_reverse(
        &mut self,
        probs: &mut [u16],
        num_bits: u32,
    ) -> Result<u32, CodecError> {
        let mut m: usize = 1;
        let mut symbol: u32 = 0;
        for i in 0..num_bits {
            let bit = self.decode_bit(&mut probs[m])?;
            m = (m << 1) + bit as usize;
            symbol |= bit << i;
        }
        return Ok(symbol);
    }
}

/// The lc/lp/pb triple packed into the stream's properties byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LzmaProps {
    /// Number of literal context bits (high bits of the previous byte).
    pub lc: u32,
    /// Number of literal position bits.
    pub lp: u32,
    /// Number of position bits for the match/literal decision.
    pub pb: u32,
}

impl LzmaProps {
    pub fn from_props_byte(b: u8) -> Result<LzmaProps, CodecError> {
        if b >= 9 * 5 * 5 {
            return Err(CodecError::InvalidProperties);
        }
        let mut d = b as u32;
        let lc = d % 9;
        d /= 9;
        let lp = d % 5;
        let pb = d / 5;
        return Ok(LzmaProps { lc, lp, pb });
    }
}

/// Match length decoder: a choice tree over three ranges (2..=9, 10..=17,
/// 18..=273), the first two conditioned on the position state.
struct LenDecoder {
    choice: u16,
    choice2: u16,
    low: [[u16; 8]; NUM_POS_STATES_MAX],
    mid: [[u16; 8]; NUM_POS_STATES_MAX],
    high: [u16; 256],
}

impl LenDecoder {
    fn new() -> LenDecoder {
        return LenDecoder {
            choice: PROB_INIT,
            choice2: PROB_INIT,
            low: [[PROB_INIT; 8]; NUM_POS_STATES_MAX],
            mid: [[PROB_INIT; 8]; NUM_POS_STATES_MAX],
            high: [PROB_INIT; 256],
        };
    }

    fn decode(&mut self, rc: &mut RangeDecoder, pos_state: usize) -> Result<u32, CodecError> {
        if rc.decode_bit(&mut self.choice)? == 0 {
            return Ok(MATCH_MIN_LEN + rc.decode_bit_tree(&mut self.low[pos_state], 3)?);
        }
        if rc.decode_bit(&mut self.choice2)? == 0 {
            return Ok(MATCH_MIN_LEN + 8 + rc.decode_bit_tree(&mut self.mid[pos_state], 3)?);
        }
        return Ok(MATCH_MIN_LEN + 16 + rc.decode_bit_tree(&mut self.high, 8)?);
    }
}

/// Full adaptive decoder state. Survives across LZMA2 chunks.
pub(crate) struct LzmaDecoder {
    props: LzmaProps,
    dict_size: u32,
    state: usize,
    reps: [u32; 4],
    /// 0x300 probabilities per literal state, `1 << (lc + lp)` states.
    lit_probs: Vec<u16>,
    is_match: [[u16; NUM_POS_STATES_MAX]; NUM_STATES],
    is_rep: [u16; NUM_STATES],
    is_rep_g0: [u16; NUM_STATES],
    is_rep_g1: [u16; NUM_STATES],
    is_rep_g2: [u16; NUM_STATES],
    is_rep0_long: [[u16; NUM_POS_STATES_MAX]; NUM_STATES],
    pos_slot: [[u16; 1 << NUM_POS_SLOT_BITS]; NUM_LEN_TO_POS_STATES],
    spec_pos: [u16; NUM_SPEC_POS],
    align: [u16; 1 << NUM_ALIGN_BITS],
    len_dec: LenDecoder,
    rep_len_dec: LenDecoder,
}

impl LzmaDecoder {
    pub fn new(props: LzmaProps, dict_size: u32) -> LzmaDecoder {
        let mut dec = LzmaDecoder {
            props,
            dict_size: dict_size.max(DICT_SIZE_MIN),
            state: 0,
            reps: [0; 4],
            lit_probs: Vec::new(),
            is_match: [[PROB_INIT; NUM_POS_STATES_MAX]; NUM_STATES],
            is_rep: [PROB_INIT; NUM_STATES],
            is_rep_g0: [PROB_INIT; NUM_STATES],
            is_rep_g1: [PROB_INIT; NUM_STATES],
            is_rep_g2: [PROB_INIT; NUM_STATES],
            is_rep0_long: [[PROB_INIT; NUM_POS_STATES_MAX]; NUM_STATES],
            pos_slot: [[PROB_INIT; 1 << NUM_POS_SLOT_BITS]; NUM_LEN_TO_POS_STATES],
            spec_pos: [PROB_INIT; NUM_SPEC_POS],
            align: [PROB_INIT; 1 << NUM_ALIGN_BITS],
            len_dec: LenDecoder::new(),
            rep_len_dec: LenDecoder::new(),
        };
        dec.reset_state();
        return dec;
    }

    /// Resets all adaptive models and the match history, keeping the
    /// properties and dictionary size.
    pub fn reset_state(&mut self) {
        self.state = 0;
        self.reps = [0; 4];
        let num_lit_states = 1usize << (self.props.lc + self.props.lp);
        self.lit_probs = vec![PROB_INIT; 0x300 * num_lit_states];
        self.is_match = [[PROB_INIT; NUM_POS_STATES_MAX]; NUM_STATES];
        self.is_rep = [PROB_INIT; NUM_STATES];
        self.is_rep_g0 = [PROB_INIT; NUM_STATES];
        self.is_rep_g1 = [PROB_INIT; NUM_STATES];
        self.is_rep_g2 = [PROB_INIT; NUM_STATES];
        self.is_rep0_long = [[PROB_INIT; NUM_POS_STATES_MAX]; NUM_STATES];
        self.pos_slot = [[PROB_INIT; 1 << NUM_POS_SLOT_BITS]; NUM_LEN_TO_POS_STATES];
        self.spec_pos = [PROB_INIT; NUM_SPEC_POS];
        self.align = [PROB_INIT; 1 << NUM_ALIGN_BITS];
        self.len_dec = LenDecoder::new();
        self.rep_len_dec = LenDecoder::new();
    }

    /// Checks that a match distance stays inside the window.
    fn check_distance(&self, dist: u32, history: usize) -> Result<(), CodecError> {
        if (dist as u64) >= (history as u64) || dist >= self.dict_size {
            return Err(CodecError::Corrupt("match distance beyond dictionary"));
        }
        return Ok(());
    }

    /// Decodes `out[from..to]`, treating `out[dict_start..from]` as the
    /// already-produced dictionary window.
    pub fn decode_into(
        &mut self,
        rc: &mut RangeDecoder,
        out: &mut [u8],
        dict_start: usize,
        from: usize,
        to: usize,
    ) -> Result<(), CodecError> {
        let pb_mask = (1u32 << self.props.pb) - 1;
        let lp_mask = (1u32 << self.props.lp) - 1;
        let lc = self.props.lc;

        let mut pos = from;
        while pos < to {
            let dict_pos = (pos - dict_start) as u32;
            let pos_state = (dict_pos & pb_mask) as usize;

            if rc.decode_bit(&mut self.is_match[self.state][pos_state])? == 0 {
                // Literal.
                let prev_byte = if pos > dict_start { out[pos - 1] as u32 } else { 0 };
                let lit_state = (((dict_pos & lp_mask) << lc) + (prev_byte >> (8 - lc))) as usize;
                if self.state >= NUM_LIT_STATES {
                    // The matched-literal path reads the byte at the last
                    // match distance, which must lie inside the window.
                    self.check_distance(self.reps[0], pos - dict_start)?;
                }
                let probs = &mut self.lit_probs[0x300 * lit_state..0x300 * (lit_state + 1)];
                let mut symbol: usize = 1;
                if self.state < NUM_LIT_STATES {
                    while symbol < 0x100 {
                        symbol = (symbol << 1) | rc.decode_bit(&mut probs[symbol])? as usize;
                    }
                } else {
                    // Matched literal: condition each bit on the byte the
                    // last match would have produced, until they diverge.
                    let mut match_byte = out[pos - self.reps[0] as usize - 1] as u32;
                    loop {
                        let match_bit = ((match_byte >> 7) & 1) as usize;
                        match_byte <<= 1;
                        let bit = rc
                            .decode_bit(&mut probs[((1 + match_bit) << 8) + symbol])?
                            as usize;
                        symbol = (symbol << 1) | bit;
                        if match_bit != bit {
                            while symbol < 0x100 {
                                symbol =
                                    (symbol << 1) | rc.decode_bit(&mut probs[symbol])? as usize;
                            }
                            break;
                        }
                        if symbol >= 0x100 {
                            break;
                        }
                    }
                }
                out[pos] = symbol as u8;
                pos += 1;
                self.state = if self.state < 4 {
                    0
                } else if self.state < 10 {
                    self.state - 3
                } else {
                    self.state - 6
                };
                continue;
            }

            let len;
            if rc.decode_bit(&mut self.is_rep[self.state])? == 0 {
                // Simple match with a freshly coded distance.
                self.reps[3] = self.reps[2];
                self.reps[2] = self.reps[1];
                self.reps[1] = self.reps[0];
                len = self.len_dec.decode(rc, pos_state)?;

                let len_to_pos =
                    ((len - MATCH_MIN_LEN) as usize).min(NUM_LEN_TO_POS_STATES - 1);
                let slot =
                    rc.decode_bit_tree(&mut self.pos_slot[len_to_pos], NUM_POS_SLOT_BITS)?;
                let dist;
                if slot < 4 {
                    dist = slot;
                } else {
                    let num_direct = (slot >> 1) - 1;
                    let mut d = (2 | (slot & 1)) << num_direct;
                    if slot < END_POS_MODEL_INDEX {
                        let base = (d - slot) as usize;
                        d = d.wrapping_add(rc.decode_bit_tree_reverse(
                            &mut self.spec_pos[base..],
                            num_direct,
                        )?);
                    } else {
                        d = d.wrapping_add(
                            rc.decode_direct_bits(num_direct - NUM_ALIGN_BITS)?
                                << NUM_ALIGN_BITS,
                        );
                        d = d.wrapping_add(
                            rc.decode_bit_tree_reverse(&mut self.align, NUM_ALIGN_BITS)?,
                        );
                    }
                    dist = d;
                }
                if dist == u32::MAX {
                    // End marker before the declared output was produced.
                    return Err(CodecError::Corrupt("premature end marker"));
                }
                self.reps[0] = dist;
                self.state = if self.state < NUM_LIT_STATES { 7 } else { 10 };
            } else if rc.decode_bit(&mut self.is_rep_g0[self.state])? == 0 {
                if rc.decode_bit(&mut self.is_rep0_long[self.state][pos_state])? == 0 {
                    // Short rep: a single byte at the last distance.
                    self.check_distance(self.reps[0], pos - dict_start)?;
                    out[pos] = out[pos - self.reps[0] as usize - 1];
                    pos += 1;
                    self.state = if self.state < NUM_LIT_STATES { 9 } else { 11 };
                    continue;
                }
                len = self.rep_len_dec.decode(rc, pos_state)?;
                self.state = if self.state < NUM_LIT_STATES { 8 } else { 11 };
            } else {
                // Rep match reusing one of the three older distances.
                let dist;
                if rc.decode_bit(&mut self.is_rep_g1[self.state])? == 0 {
                    dist = self.reps[1];
                } else if rc.decode_bit(&mut self.is_rep_g2[self.state])? == 0 {
                    dist = self.reps[2];
                    self.reps[2] = self.reps[1];
                } else {
                    dist = self.reps[3];
                    self.reps[3] = self.reps[2];
                    self.reps[2] = self.reps[1];
                }
                self.reps[1] = self.reps[0];
                self.reps[0] = dist;
                len = self.rep_len_dec.decode(rc, pos_state)?;
                self.state = if self.state < NUM_LIT_STATES { 8 } else { 11 };
            }

            self.check_distance(self.reps[0], pos - dict_start)?;
            if (len as u64) > (to - pos) as u64 {
                return Err(CodecError::Corrupt("match overruns declared output"));
            }
            let dist = self.reps[0] as usize;
            for _ in 0..len {
                out[pos] = out[pos - dist - 1];
                pos += 1;
            }
        }
        return Ok(());
    }
}

/// Classic LZMA as a 7z folder coder. The 5-byte properties blob carries the
/// packed lc/lp/pb byte and the dictionary size.
pub struct Lzma {
    props: LzmaProps,
    dict_size: u32,
}

impl Lzma {
    pub fn with_attrs(attrs: Option<&[u8]>) -> Result<Lzma, CodecError> {
        let attrs = attrs.ok_or(CodecError::InvalidProperties)?;
        if attrs.len() != 5 {
            return Err(CodecError::InvalidProperties);
        }
        let props = LzmaProps::from_props_byte(attrs[0])?;
        let dict_size = u32::from_le_bytes([attrs[1], attrs[2], attrs[3], attrs[4]]);
        return Ok(Lzma { props, dict_size });
    }
}

impl Codec for Lzma {
    fn decode(&self, input: &[u8], out: &mut [u8]) -> Result<(), CodecError> {
        let mut rc = RangeDecoder::new(input)?;
        let mut dec = LzmaDecoder::new(self.props, self.dict_size);
        return dec.decode_into(&mut rc, out, 0, 0, out.len());
    }
}
