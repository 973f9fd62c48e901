// Run-length transform.
//
// Runs longer than RUN_THRESHOLD collapse to `value escape length`, where
// the escape is the least frequent byte of the block. Literal occurrences of
// the escape byte are written as `escape 0`. Length encoding is 1, 2 or 3
// bytes depending on magnitude.

use crate::error::{Error, Result};
use crate::slice::SliceArray;
use crate::transform::{BlockContext, DataType};

pub const MIN_BLOCK_LENGTH: usize = 16;

const RUN_THRESHOLD: usize = 3;
const RUN_LEN_ENCODE1: usize = 224;
const RUN_LEN_ENCODE2: usize = (255 - RUN_LEN_ENCODE1) << 8;
const MAX_RUN: usize = 0xFFFF + RUN_LEN_ENCODE2 + RUN_THRESHOLD - 1;
const MAX_RUN4: usize = MAX_RUN - 4;

/// Escaped run-length codec.
pub struct Rlt;

impl Default for Rlt {
    fn default() -> Self {
        Self
    }
}

impl Rlt {
    pub fn new() -> Self {
        Self
    }

    pub fn max_encoded_len(&self, src_len: usize) -> usize {
        src_len + 32
    }

    pub fn forward(
        &mut self,
        input: &mut SliceArray,
        output: &mut SliceArray,
        count: usize,
        ctx: &mut BlockContext,
    ) -> Result<bool> {
        if count == 0 {
            return Ok(true);
        }
        if count < MIN_BLOCK_LENGTH {
            return Ok(false);
        }
        if !input.is_valid() || !output.is_valid() {
            return Err(Error::InvalidParam("invalid block cursors".to_string()));
        }
        if count > input.remaining() || output.remaining() < self.max_encoded_len(count) {
            return Ok(false);
        }
        // Runs are rare in text-like data.
        if ctx.data_type == DataType::Utf8 {
            return Ok(false);
        }

        let in_base = input.index;
        let out_base = output.index;
        let src = &input.array[in_base..in_base + count];
        let dst = &mut output.array[out_base..];
        let dst_end = dst.len();

        // Pick the least frequent byte as the escape.
        let mut freqs = [0u32; 256];
        for &b in src {
            freqs[b as usize] += 1;
        }
        let mut min_idx = 0usize;
        if freqs[0] > 0 {
            for (i, &f) in freqs.iter().enumerate().skip(1) {
                if f < freqs[min_idx] {
                    min_idx = i;
                    if f == 0 {
                        break;
                    }
                }
            }
        }
        let escape = min_idx as u8;

        let src_end = count;
        let src_end4 = count - 4;
        let mut src_idx = 0usize;
        let mut dst_idx = 0usize;
        let mut res = true;

        let mut prev = src[src_idx];
        src_idx += 1;
        dst[dst_idx] = escape;
        dst[dst_idx + 1] = prev;
        dst_idx += 2;
        if prev == escape {
            dst[dst_idx] = 0;
            dst_idx += 1;
        }

        let mut run = 0usize;
        loop {
            if prev == src[src_idx] {
                src_idx += 1;
                run += 1;
                if src_idx < src_end && prev == src[src_idx] {
                    src_idx += 1;
                    run += 1;
                    if src_idx < src_end && prev == src[src_idx] {
                        src_idx += 1;
                        run += 1;
                        if src_idx < src_end && prev == src[src_idx] {
                            src_idx += 1;
                            run += 1;
                            if run < MAX_RUN4 && src_idx < src_end4 {
                                continue;
                            }
                        }
                    }
                }
            }

            if run > RUN_THRESHOLD {
                match emit_run_length(&mut dst[dst_idx..], run, escape, prev) {
                    Some(n) => dst_idx += n,
                    None => {
                        res = false;
                        break;
                    }
                }
            } else if prev != escape {
                if dst_idx + run >= dst_end {
                    res = false;
                    break;
                }
                while run > 0 {
                    dst[dst_idx] = prev;
                    dst_idx += 1;
                    run -= 1;
                }
            } else {
                // Escape literal.
                if dst_idx + 2 * run >= dst_end {
                    res = false;
                    break;
                }
                while run > 0 {
                    dst[dst_idx] = escape;
                    dst[dst_idx + 1] = 0;
                    dst_idx += 2;
                    run -= 1;
                }
            }

            prev = src[src_idx];
            src_idx += 1;
            run = 1;
            if src_idx >= src_end4 {
                break;
            }
        }

        if res {
            // Trailing run == 1 plus the last few bytes, escapes doubled.
            if prev != escape {
                if dst_idx + run < dst_end {
                    while run > 0 {
                        dst[dst_idx] = prev;
                        dst_idx += 1;
                        run -= 1;
                    }
                } else {
                    res = false;
                }
            } else if dst_idx + 2 * run < dst_end {
                while run > 0 {
                    dst[dst_idx] = escape;
                    dst[dst_idx + 1] = 0;
                    dst_idx += 2;
                    run -= 1;
                }
            } else {
                res = false;
            }

            while src_idx < src_end && dst_idx < dst_end {
                if src[src_idx] == escape {
                    if dst_idx + 2 >= dst_end {
                        res = false;
                        break;
                    }
                    dst[dst_idx] = escape;
                    dst[dst_idx + 1] = 0;
                    dst_idx += 2;
                    src_idx += 1;
                    continue;
                }
                dst[dst_idx] = src[src_idx];
                dst_idx += 1;
                src_idx += 1;
            }

            res &= src_idx == src_end;
        }

        input.index = in_base + src_idx;
        output.index = out_base + dst_idx;
        Ok(res && dst_idx < src_idx)
    }

    pub fn inverse(
        &mut self,
        input: &mut SliceArray,
        output: &mut SliceArray,
        count: usize,
    ) -> Result<bool> {
        if count == 0 {
            return Ok(true);
        }
        if !input.is_valid() || !output.is_valid() {
            return Err(Error::InvalidParam("invalid block cursors".to_string()));
        }
        if count < 2 || count > input.remaining() {
            return Ok(false);
        }

        let in_base = input.index;
        let out_base = output.index;
        let src = &input.array[in_base..in_base + count];
        let dst = &mut output.array[out_base..];
        let dst_end = dst.len();

        let mut src_idx = 0usize;
        let mut dst_idx = 0usize;
        let mut res = true;

        let escape = src[src_idx];
        src_idx += 1;

        if src[src_idx] == escape {
            src_idx += 1;
            // The data cannot start with a run but may start with an escape
            // literal.
            if src_idx < count && src[src_idx] != 0 {
                return Ok(false);
            }
            if dst_idx >= dst_end {
                return Ok(false);
            }
            dst[dst_idx] = escape;
            dst_idx += 1;
            src_idx += 1;
        }

        while src_idx < count {
            if src[src_idx] != escape {
                // Literal.
                if dst_idx >= dst_end {
                    res = false;
                    break;
                }
                dst[dst_idx] = src[src_idx];
                dst_idx += 1;
                src_idx += 1;
                continue;
            }

            src_idx += 1;
            if src_idx >= count {
                res = false;
                break;
            }

            let mut run = usize::from(src[src_idx]);
            src_idx += 1;

            if run == 0 {
                // Just an escaped literal.
                if dst_idx >= dst_end {
                    res = false;
                    break;
                }
                dst[dst_idx] = escape;
                dst_idx += 1;
                continue;
            }

            // Decode the run length.
            if run == 0xFF {
                if src_idx + 1 >= count {
                    res = false;
                    break;
                }
                run = (usize::from(src[src_idx]) << 8) | usize::from(src[src_idx + 1]);
                src_idx += 2;
                run += RUN_LEN_ENCODE2;
            } else if run >= RUN_LEN_ENCODE1 {
                if src_idx >= count {
                    res = false;
                    break;
                }
                run = ((run - RUN_LEN_ENCODE1) << 8) | usize::from(src[src_idx]);
                src_idx += 1;
                run += RUN_LEN_ENCODE1;
            }

            run += RUN_THRESHOLD - 1;

            if dst_idx + run >= dst_end || run > MAX_RUN || dst_idx == 0 {
                res = false;
                break;
            }

            let val = dst[dst_idx - 1];
            for _ in 0..run {
                dst[dst_idx] = val;
                dst_idx += 1;
            }
        }

        input.index = in_base + src_idx;
        output.index = out_base + dst_idx;
        Ok(res && src_idx == count)
    }
}

// Emit `value escape length`; None when the output region is too small.
fn emit_run_length(dst: &mut [u8], run: usize, escape: u8, val: u8) -> Option<usize> {
    let mut dst_idx = 1usize;
    if dst.is_empty() {
        return None;
    }
    dst[0] = val;

    if val == escape {
        if dst.len() < 2 {
            return None;
        }
        dst[1] = 0;
        dst_idx = 2;
    }

    if dst_idx >= dst.len() {
        return None;
    }
    dst[dst_idx] = escape;
    dst_idx += 1;
    let mut run = run - RUN_THRESHOLD;

    if run >= RUN_LEN_ENCODE1 {
        if run < RUN_LEN_ENCODE2 {
            if dst_idx + 2 > dst.len() {
                return None;
            }
            run -= RUN_LEN_ENCODE1;
            dst[dst_idx] = (RUN_LEN_ENCODE1 + (run >> 8)) as u8;
            dst_idx += 1;
        } else {
            if dst_idx + 3 > dst.len() {
                return None;
            }
            run -= RUN_LEN_ENCODE2;
            dst[dst_idx] = 0xFF;
            dst[dst_idx + 1] = (run >> 8) as u8;
            dst_idx += 2;
        }
    }

    if dst_idx >= dst.len() {
        return None;
    }
    dst[dst_idx] = run as u8;
    Some(dst_idx + 1)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
