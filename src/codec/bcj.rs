//! Branch-converter (BCJ) filters for x86 and ARM code streams.
//!
//! These rewrite relative branch targets back from the absolute form the
//! encoder stored. Both run in place over an already-decoded buffer and
//! return how many bytes they processed.

/// Whether a candidate mask still allows a conversion at this position.
const MASK_TO_ALLOWED_STATUS: [bool; 8] = [true, true, true, false, true, false, false, false];
const MASK_TO_BIT_NUMBER: [u32; 8] = [0, 1, 2, 2, 3, 3, 3, 3];

/// The top displacement byte of a convertible x86 branch.
fn test_86_ms_byte(b: u8) -> bool {
    return b == 0x00 || b == 0xFF;
}

/// x86 call/jump (E8/E9) displacement conversion, decode direction.
///
/// `state` carries the candidate mask between consecutive blocks of the same
/// stream; seed it with 0. `ip` is the instruction pointer the block would
/// load at, always 0 for 7z folders.
pub fn x86_decode(data: &mut [u8], ip: u32, state: &mut u32) -> usize {
    let mut prev_mask = *state & 0x7;
    if data.len() < 5 {
        return 0;
    }
    let ip = ip.wrapping_add(5);
    let limit = data.len() - 4;
    let mut buffer_pos: usize = 0;
    // The previous candidate sits one byte before the buffer initially.
    let mut prev_pos: usize = usize::MAX;

    loop {
        let mut p = buffer_pos;
        while p < limit && (data[p] & 0xFE) != 0xE8 {
            p += 1;
        }
        buffer_pos = p;
        if buffer_pos >= limit {
            break;
        }

        let d = buffer_pos.wrapping_sub(prev_pos);
        if d > 3 {
            prev_mask = 0;
        } else {
            prev_mask = (prev_mask << (d - 1)) & 0x7;
            if prev_mask != 0 {
                let b = data[buffer_pos + 4 - MASK_TO_BIT_NUMBER[prev_mask as usize] as usize];
                if !MASK_TO_ALLOWED_STATUS[prev_mask as usize] || test_86_ms_byte(b) {
                    prev_pos = buffer_pos;
                    prev_mask = ((prev_mask << 1) & 0x7) | 1;
                    buffer_pos += 1;
                    continue;
                }
            }
        }
        prev_pos = buffer_pos;

        if test_86_ms_byte(data[buffer_pos + 4]) {
            let mut src = u32::from_le_bytes([
                data[buffer_pos + 1],
                data[buffer_pos + 2],
                data[buffer_pos + 3],
                data[buffer_pos + 4],
            ]);
            let dest;
            loop {
                let candidate = src.wrapping_sub(ip.wrapping_add(buffer_pos as u32));
                if prev_mask == 0 {
                    dest = candidate;
                    break;
                }
                let index = MASK_TO_BIT_NUMBER[prev_mask as usize] * 8;
                let b = (candidate >> (24 - index)) as u8;
                if !test_86_ms_byte(b) {
                    dest = candidate;
                    break;
                }
                src = candidate ^ ((1u32 << (32 - index)) - 1);
            }
            data[buffer_pos + 4] = if dest & 0x0100_0000 != 0 { 0xFF } else { 0x00 };
            data[buffer_pos + 3] = (dest >> 16) as u8;
            data[buffer_pos + 2] = (dest >> 8) as u8;
            data[buffer_pos + 1] = dest as u8;
            buffer_pos += 5;
        } else {
            prev_mask = ((prev_mask << 1) & 0x7) | 1;
            buffer_pos += 1;
        }
    }

    let d = buffer_pos.wrapping_sub(prev_pos);
    *state = if d > 3 { 0 } else { (prev_mask << (d - 1)) & 0x7 };
    return buffer_pos;
}

/// ARM BL displacement conversion, decode direction.
///
/// Words are 4-byte aligned; only BL opcodes (high byte 0xEB) are touched.
pub fn arm_decode(data: &mut [u8], ip: u32) -> usize {
    if data.len() < 4 {
        return 0;
    }
    let ip = ip.wrapping_add(8);
    let mut i: usize = 0;
    while i + 4 <= data.len() {
        if data[i + 3] == 0xEB {
            let src = (((data[i + 2] as u32) << 16)
                | ((data[i + 1] as u32) << 8)
                | data[i] as u32)
                << 2;
            let dest = src.wrapping_sub(ip.wrapping_add(i as u32)) >> 2;
            data[i + 2] = (dest >> 16) as u8;
            data[i + 1] = (dest >> 8) as u8;
            data[i] = dest as u8;
        }
        i += 4;
    }
    return i;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn x86_converts_absolute_call_target_back() {
        // call with stored absolute target 0x0A at offset 0; the decoded
        // displacement is 0x0A - (0 + 5 + 0) = 0x05.
        let mut data = [0xE8, 0x0A, 0x00, 0x00, 0x00, 0x90];
        let mut state = 0;
        let processed = x86_decode(&mut data, 0, &mut state);
        assert_eq!(processed, 5);
        assert_eq!(data, [0xE8, 0x05, 0x00, 0x00, 0x00, 0x90]);
    }

    #[test]
    fn x86_leaves_non_branch_displacements_alone() {
        // The displacement's top byte is neither 0x00 nor 0xFF, so the
        // heuristic rejects this as a converted branch.
        let mut data = [0xE8, 0x01, 0x02, 0x03, 0x04, 0x90];
        let mut state = 0;
        x86_decode(&mut data, 0, &mut state);
        assert_eq!(data, [0xE8, 0x01, 0x02, 0x03, 0x04, 0x90]);
    }

    #[test]
    fn x86_leaves_plain_data_alone() {
        let mut data = *b"no branches in here";
        let expected = data;
        let mut state = 0;
        x86_decode(&mut data, 0, &mut state);
        assert_eq!(data, expected);
    }

    #[test]
    fn x86_short_buffers_are_untouched() {
        let mut data = [0xE8, 0x00, 0x00, 0x00];
        let mut state = 0;
        assert_eq!(x86_decode(&mut data, 0, &mut state), 0);
        assert_eq!(data, [0xE8, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn arm_converts_bl_target_back() {
        // BL with stored absolute word target 0x04 << 2 = 0x10 at offset 0;
        // decoded displacement words: (0x10 - 8) >> 2 = 0x02.
        let mut data = [0x04, 0x00, 0x00, 0xEB];
        let processed = arm_decode(&mut data, 0);
        assert_eq!(processed, 4);
        assert_eq!(data, [0x02, 0x00, 0x00, 0xEB]);
    }

    #[test]
    fn arm_ignores_other_opcodes() {
        let mut data = [0x04, 0x00, 0x00, 0xEA, 0x01, 0x02, 0x03, 0x04];
        let expected = data;
        arm_decode(&mut data, 0);
        assert_eq!(data, expected);
    }

    #[test]
    fn arm_trailing_partial_word_is_skipped() {
        let mut data = [0x04, 0x00, 0x00, 0xEB, 0xFF, 0xFF];
        assert_eq!(arm_decode(&mut data, 0), 4);
        assert_eq!(&data[4..], &[0xFF, 0xFF]);
    }
}
