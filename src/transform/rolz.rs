// Reduced-offset LZ codecs.
//
// At each position a two-byte context keys a bounded ring of prior
// positions; matches are emitted as a small ring index plus a length, never
// an absolute offset. Two variants share the match finder:
//
// - `RolzCodec1` (ROLZ): four byte streams per chunk (literals, tokens,
//   overflow lengths, match indexes), each range-coded independently.
// - `RolzCodec2` (ROLZX): one embedded binary range coder, 9-bit symbols
//   with a literal/match flag, match index as raw bits in a match context.
//
// Chunks are independent: the hash table resets at every chunk boundary.

use crate::bits::{InputBitStream, OutputBitStream};
use crate::entropy::range::{PSCALE, RangeDecoder, RangeEncoder};
use crate::error::{Error, Result};
use crate::slice::SliceArray;

pub const MIN_BLOCK_SIZE: usize = 16;
pub const MAX_BLOCK_SIZE: usize = 1 << 30;

const HASH_SIZE: usize = 1 << 16;
const CHUNK_SIZE: usize = 1 << 20;
const HASH: u32 = 200_002_979;
const HASH_MASK: u32 = !(CHUNK_SIZE as u32 - 1);

const LOG_POS_CHECKS1: u32 = 4;
const LOG_POS_CHECKS2: u32 = 5;

const MATCH_FLAG: usize = 0;
const LITERAL_FLAG: usize = 1;

#[inline]
fn get_key(p: &[u8]) -> usize {
    usize::from(u16::from_le_bytes([p[0], p[1]]))
}

#[inline]
fn rolz_hash(p: &[u8]) -> u32 {
    let v = u32::from_le_bytes([p[0], p[1], p[2], p[3]]);
    ((v & 0x00FF_FFFF).wrapping_mul(HASH)) & HASH_MASK
}

// Copy `len` bytes from an earlier position, one at a time so overlapping
// self-references replicate correctly.
#[inline]
fn emit_copy(buf: &mut [u8], mut dst_idx: usize, mut ref_idx: usize, len: usize) -> usize {
    for _ in 0..len {
        buf[dst_idx] = buf[ref_idx];
        dst_idx += 1;
        ref_idx += 1;
    }
    dst_idx
}

// Big-endian base-128 length with a continuation bit in every non-final byte.
fn emit_length(out: &mut Vec<u8>, length: usize) {
    if length >= 1 << 7 {
        if length >= 1 << 14 {
            if length >= 1 << 21 {
                out.push(0x80 | ((length >> 21) & 0x7F) as u8);
            }
            out.push(0x80 | ((length >> 14) & 0x7F) as u8);
        }
        out.push(0x80 | ((length >> 7) & 0x7F) as u8);
    }
    out.push((length & 0x7F) as u8);
}

fn read_length(buf: &[u8], idx: &mut usize) -> Option<usize> {
    let mut length = 0usize;
    for _ in 0..4 {
        let next = *buf.get(*idx)?;
        *idx += 1;
        length = (length << 7) | usize::from(next & 0x7F);
        if next & 0x80 == 0 {
            return Some(length);
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Match search state shared by both variants
// ---------------------------------------------------------------------------

struct MatchState {
    log_pos_checks: u32,
    pos_checks: i32,
    mask_checks: i32,
    matches: Vec<u32>,
    counters: Vec<i32>,
}

impl MatchState {
    fn new(log_pos_checks: u32) -> Self {
        Self {
            log_pos_checks,
            pos_checks: 1 << log_pos_checks,
            mask_checks: (1 << log_pos_checks) - 1,
            matches: vec![0; HASH_SIZE << log_pos_checks],
            counters: vec![0; HASH_SIZE],
        }
    }

    fn reset_counters(&mut self) {
        self.counters.fill(0);
    }

    fn reset_matches(&mut self) {
        self.matches.fill(0);
    }

    // Returns (ring index << 16) | (length - min_match), or -1.
    // Always registers the current position, match taken or not.
    fn find_match(
        &mut self,
        buf: &[u8],
        pos: usize,
        end: usize,
        min_match: usize,
        max_match: usize,
    ) -> i32 {
        let key = get_key(&buf[pos - 2..]);
        let counter = self.counters[key];
        let base = key << self.log_pos_checks;
        let hash = rolz_hash(&buf[pos..]);
        let max_match = max_match.min(end - pos);
        let mut best_len = 0usize;
        let mut best_idx = -1i32;

        for i in ((counter - self.pos_checks + 1)..=counter).rev() {
            let entry = self.matches[base + (i & self.mask_checks) as usize];

            // Cheap verification hash before touching the data.
            if entry & HASH_MASK != hash {
                continue;
            }

            let r = (entry & !HASH_MASK) as usize;
            if buf[r + best_len] != buf[pos + best_len] {
                continue;
            }

            let mut n = 0usize;
            while n + 4 < max_match && buf[r + n..r + n + 4] == buf[pos + n..pos + n + 4] {
                n += 4;
            }
            while n < max_match && buf[r + n] == buf[pos + n] {
                n += 1;
            }

            if n > best_len {
                best_idx = counter - i;
                best_len = n;
                if best_len == max_match {
                    break;
                }
            }
        }

        self.counters[key] = (counter + 1) & self.mask_checks;
        self.matches[base + self.counters[key] as usize] = hash | pos as u32;

        if best_len < min_match {
            -1
        } else {
            (best_idx << 16) | (best_len - min_match) as i32
        }
    }
}

fn check_block(input: &SliceArray, output: &SliceArray, count: usize) -> Result<()> {
    if !input.is_valid() || !output.is_valid() {
        return Err(Error::InvalidParam("invalid block cursors".to_string()));
    }
    if count > MAX_BLOCK_SIZE {
        return Err(Error::InvalidParam(format!(
            "the max ROLZ block size is {MAX_BLOCK_SIZE}, got {count}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// ROLZ (byte-oriented)
// ---------------------------------------------------------------------------

pub struct RolzCodec1 {
    state: MatchState,
}

impl RolzCodec1 {
    const MIN_MATCH: usize = 3;
    const MAX_MATCH: usize = 224;

    pub fn new() -> Self {
        Self::with_log_pos_checks(LOG_POS_CHECKS1).expect("default log_pos_checks")
    }

    pub fn with_log_pos_checks(log_pos_checks: u32) -> Result<Self> {
        if !(2..=8).contains(&log_pos_checks) {
            return Err(Error::InvalidParam(format!(
                "invalid logPosChecks: {log_pos_checks} (must be in [2..8])"
            )));
        }
        Ok(Self {
            state: MatchState::new(log_pos_checks),
        })
    }

    pub fn max_encoded_len(&self, src_len: usize) -> usize {
        src_len + src_len / 2 + 1024
    }

    pub fn forward(
        &mut self,
        input: &mut SliceArray,
        output: &mut SliceArray,
        count: usize,
    ) -> Result<bool> {
        if count == 0 {
            return Ok(true);
        }
        check_block(input, output, count)?;
        if count < MIN_BLOCK_SIZE || count > input.remaining() {
            return Ok(false);
        }
        if output.remaining() < self.max_encoded_len(count) {
            return Ok(false);
        }

        let in_base = input.index;
        let out_base = output.index;
        let src_end = count - 4;
        let lit_order = if count < (1 << 17) { 0u32 } else { 1 };

        let mut dst_idx = 5usize;
        {
            let dst = &mut output.array[out_base..];
            dst[..4].copy_from_slice(&(count as u32).to_be_bytes());
            dst[4] = lit_order as u8;
        }

        self.state.reset_counters();
        let mut lit_buf: Vec<u8> = Vec::new();
        let mut tk_buf: Vec<u8> = Vec::new();
        let mut len_buf: Vec<u8> = Vec::new();
        let mut midx_buf: Vec<u8> = Vec::new();

        let mut start_chunk = 0usize;
        let mut size_chunk = count.min(CHUNK_SIZE);
        let mut consumed = 0usize;
        let mut success = true;

        while start_chunk < src_end {
            self.state.reset_matches();
            let end_chunk = (start_chunk + size_chunk).min(src_end);
            size_chunk = end_chunk - start_chunk;

            lit_buf.clear();
            tk_buf.clear();
            len_buf.clear();
            midx_buf.clear();

            let src = &input.array[in_base..in_base + count];
            let buf = &src[start_chunk..];
            let mut src_idx = 0usize;

            lit_buf.push(buf[src_idx]);
            src_idx += 1;
            if start_chunk + 1 < src_end {
                lit_buf.push(buf[src_idx]);
                src_idx += 1;
            }
            let mut first_lit_idx = src_idx;

            while src_idx < size_chunk {
                let m = self.state.find_match(
                    buf,
                    src_idx,
                    size_chunk,
                    Self::MIN_MATCH,
                    Self::MAX_MATCH,
                );
                if m < 0 {
                    src_idx += 1;
                    continue;
                }

                // Token LLLLLMMM: 5-bit literal length, 3-bit match length.
                let lit_len = src_idx - first_lit_idx;
                let mode = if lit_len < 31 {
                    (lit_len << 3) as u8
                } else {
                    0xF8
                };
                let m_len = (m & 0xFFFF) as usize;

                if m_len >= 7 {
                    tk_buf.push(mode | 0x07);
                    emit_length(&mut len_buf, m_len - 7);
                } else {
                    tk_buf.push(mode | m_len as u8);
                }

                if lit_len > 0 {
                    if lit_len >= 31 {
                        emit_length(&mut len_buf, lit_len - 31);
                    }
                    lit_buf.extend_from_slice(&buf[first_lit_idx..src_idx]);
                }

                midx_buf.push((m >> 16) as u8);
                src_idx += m_len + Self::MIN_MATCH;
                first_lit_idx = src_idx;
            }

            // Tail literals of the chunk.
            let lit_len = src_idx - first_lit_idx;
            tk_buf.push(if lit_len < 31 {
                (lit_len << 3) as u8
            } else {
                0xF8
            });
            if lit_len >= 31 {
                emit_length(&mut len_buf, lit_len - 31);
            }
            lit_buf.extend_from_slice(&buf[first_lit_idx..src_idx]);
            consumed = start_chunk + src_idx;

            // Frame: four 32-bit lengths, then the four coded streams.
            let mut chunk_obs = OutputBitStream::new(Vec::new());
            chunk_obs.write_bits(lit_buf.len() as u64, 32)?;
            chunk_obs.write_bits(tk_buf.len() as u64, 32)?;
            chunk_obs.write_bits(len_buf.len() as u64, 32)?;
            chunk_obs.write_bits(midx_buf.len() as u64, 32)?;
            {
                let mut lit_enc = RangeEncoder::new(&mut chunk_obs, lit_order);
                lit_enc.encode(&lit_buf)?;
                lit_enc.dispose()?;
            }
            {
                let mut m_enc = RangeEncoder::new(&mut chunk_obs, 0);
                m_enc.encode(&tk_buf)?;
                m_enc.encode(&len_buf)?;
                m_enc.encode(&midx_buf)?;
                m_enc.dispose()?;
            }
            chunk_obs.close()?;
            let chunk_bytes = chunk_obs.into_inner();

            let dst = &mut output.array[out_base..];
            if dst_idx + chunk_bytes.len() > dst.len() {
                success = false;
                break;
            }
            dst[dst_idx..dst_idx + chunk_bytes.len()].copy_from_slice(&chunk_bytes);
            dst_idx += chunk_bytes.len();
            start_chunk = end_chunk;
        }

        if success {
            if dst_idx + 4 > output.array.len() - out_base {
                consumed = src_end;
                success = false;
            } else {
                // Last 4 bytes of the block travel verbatim.
                for i in 0..4 {
                    output.array[out_base + dst_idx + i] = input.array[in_base + src_end + i];
                }
                dst_idx += 4;
                consumed = count;
            }
        }

        input.index = in_base + consumed;
        output.index = out_base + dst_idx;
        Ok(success && consumed == count && dst_idx < count)
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
        check_block(input, output, count)?;
        if count < 9 || count > input.remaining() {
            return Ok(false);
        }

        let in_base = input.index;
        let out_base = output.index;

        let total = {
            let src = &input.array[in_base..];
            u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize
        };
        if total < MIN_BLOCK_SIZE || total > MAX_BLOCK_SIZE || total > output.remaining() {
            return Ok(false);
        }

        let dst_end = total - 4;
        let lit_order = u32::from(input.array[in_base + 4]);
        if lit_order > 1 {
            return Ok(false);
        }
        let mut src_idx = 5usize;

        self.state.reset_counters();
        let mut lit_buf: Vec<u8> = Vec::new();
        let mut tk_buf: Vec<u8> = Vec::new();
        let mut len_buf: Vec<u8> = Vec::new();
        let mut midx_buf: Vec<u8> = Vec::new();

        let mut start_chunk = 0usize;
        let mut size_chunk = dst_end.min(CHUNK_SIZE);
        let mut success = true;

        'chunks: while start_chunk < dst_end {
            self.state.reset_matches();
            let end_chunk = (start_chunk + size_chunk).min(dst_end);
            size_chunk = end_chunk - start_chunk;

            // Decode the four streams of this chunk.
            {
                let src = &input.array[in_base..in_base + count];
                let mut ibs = InputBitStream::new(&src[src_idx..]);
                let lit_len = ibs.read_bits(32)? as usize;
                let tk_len = ibs.read_bits(32)? as usize;
                let len_len = ibs.read_bits(32)? as usize;
                let midx_len = ibs.read_bits(32)? as usize;

                if lit_len > size_chunk + 2
                    || tk_len > size_chunk
                    || len_len > size_chunk
                    || midx_len > size_chunk
                {
                    success = false;
                    break 'chunks;
                }

                lit_buf.resize(lit_len, 0);
                tk_buf.resize(tk_len, 0);
                len_buf.resize(len_len, 0);
                midx_buf.resize(midx_len, 0);
                {
                    let mut lit_dec = RangeDecoder::new(&mut ibs, lit_order)?;
                    lit_dec.decode(&mut lit_buf)?;
                }
                {
                    let mut m_dec = RangeDecoder::new(&mut ibs, 0)?;
                    m_dec.decode(&mut tk_buf)?;
                    m_dec.decode(&mut len_buf)?;
                    m_dec.decode(&mut midx_buf)?;
                }
                src_idx += ibs.read().div_ceil(8) as usize;
            }

            // Rebuild the chunk.
            let chunk = &mut output.array[out_base + start_chunk..out_base + end_chunk];
            let mut dst_idx = 0usize;
            let mut lit_idx = 0usize;
            let mut tk_idx = 0usize;
            let mut len_idx = 0usize;
            let mut midx_idx = 0usize;

            if lit_buf.is_empty() {
                success = false;
                break 'chunks;
            }
            chunk[dst_idx] = lit_buf[lit_idx];
            dst_idx += 1;
            lit_idx += 1;
            if start_chunk + 1 < dst_end {
                if lit_idx >= lit_buf.len() {
                    success = false;
                    break 'chunks;
                }
                chunk[dst_idx] = lit_buf[lit_idx];
                dst_idx += 1;
                lit_idx += 1;
            }

            while dst_idx < size_chunk {
                let Some(&mode) = tk_buf.get(tk_idx) else {
                    success = false;
                    break 'chunks;
                };
                tk_idx += 1;

                let mut match_len = usize::from(mode & 0x07);
                if match_len == 7 {
                    match read_length(&len_buf, &mut len_idx) {
                        Some(extra) => match_len += extra,
                        None => {
                            success = false;
                            break 'chunks;
                        }
                    }
                }

                let lit_len = if mode < 0xF8 {
                    usize::from(mode >> 3)
                } else {
                    match read_length(&len_buf, &mut len_idx) {
                        Some(l) => l + 31,
                        None => {
                            success = false;
                            break 'chunks;
                        }
                    }
                };

                if dst_idx + lit_len > size_chunk || lit_idx + lit_len > lit_buf.len() {
                    success = false;
                    break 'chunks;
                }
                chunk[dst_idx..dst_idx + lit_len]
                    .copy_from_slice(&lit_buf[lit_idx..lit_idx + lit_len]);

                for n in 0..lit_len {
                    let key = get_key(&chunk[dst_idx + n - 2..]);
                    let st = &mut self.state;
                    st.counters[key] = (st.counters[key] + 1) & st.mask_checks;
                    st.matches[(key << st.log_pos_checks) + st.counters[key] as usize] =
                        (dst_idx + n) as u32;
                }

                lit_idx += lit_len;
                dst_idx += lit_len;

                if dst_idx >= size_chunk {
                    if dst_idx == size_chunk {
                        break;
                    }
                    success = false;
                    break 'chunks;
                }

                if start_chunk + dst_idx + match_len + Self::MIN_MATCH > dst_end
                    || dst_idx + match_len + Self::MIN_MATCH > size_chunk
                {
                    success = false;
                    break 'chunks;
                }

                let key = get_key(&chunk[dst_idx - 2..]);
                let Some(&midx) = midx_buf.get(midx_idx) else {
                    success = false;
                    break 'chunks;
                };
                midx_idx += 1;

                let st = &mut self.state;
                let slot = (st.counters[key] - i32::from(midx)) & st.mask_checks;
                let r = st.matches[(key << st.log_pos_checks) + slot as usize] as usize;
                st.counters[key] = (st.counters[key] + 1) & st.mask_checks;
                st.matches[(key << st.log_pos_checks) + st.counters[key] as usize] =
                    dst_idx as u32;

                if r >= dst_idx {
                    success = false;
                    break 'chunks;
                }
                dst_idx = emit_copy(chunk, dst_idx, r, match_len + Self::MIN_MATCH);
            }

            start_chunk = end_chunk;
        }

        let mut produced = start_chunk.min(dst_end);
        if success {
            if src_idx + 4 > count {
                success = false;
            } else {
                for i in 0..4 {
                    output.array[out_base + dst_end + i] = input.array[in_base + src_idx + i];
                }
                src_idx += 4;
                produced = total;
            }
        }

        input.index = in_base + src_idx;
        output.index = out_base + produced;
        Ok(success && src_idx == count)
    }
}

impl Default for RolzCodec1 {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Embedded binary range coder (ROLZX)
// ---------------------------------------------------------------------------

const TOP: u64 = 0x00FF_FFFF_FFFF_FFFF;
const RENORM: u64 = 1 << 48;

struct RolzEncoder<'a> {
    buf: &'a mut [u8],
    idx: usize,
    low: u64,
    high: u64,
    probs: [Vec<u16>; 2],
    log_sizes: [u32; 2],
    ctx: usize,
    c1: usize,
    p_idx: usize,
    overflow: bool,
}

impl<'a> RolzEncoder<'a> {
    fn new(lit_log_size: u32, m_log_size: u32, buf: &'a mut [u8], idx: usize) -> Self {
        let mut enc = Self {
            buf,
            idx,
            low: 0,
            high: TOP,
            probs: [
                vec![0u16; 256 << m_log_size],
                vec![0u16; 256 << lit_log_size],
            ],
            log_sizes: [m_log_size, lit_log_size],
            ctx: 0,
            c1: 1,
            p_idx: LITERAL_FLAG,
            overflow: false,
        };
        enc.reset();
        enc
    }

    fn reset(&mut self) {
        self.probs[MATCH_FLAG].fill(PSCALE >> 1);
        self.probs[LITERAL_FLAG].fill(PSCALE >> 1);
    }

    fn set_mode(&mut self, mode: usize) {
        self.p_idx = mode;
    }

    fn set_context(&mut self, ctx: u8) {
        self.ctx = usize::from(ctx) << self.log_sizes[self.p_idx];
    }

    fn put_byte(&mut self, b: u8) {
        if self.idx < self.buf.len() {
            self.buf[self.idx] = b;
        } else {
            self.overflow = true;
        }
        self.idx += 1;
    }

    fn encode_bit(&mut self, bit: usize) {
        let idx = self.ctx + self.c1;
        let p = u64::from(self.probs[self.p_idx][idx]);
        let split = ((self.high - self.low) >> 4) * (p >> 4) >> 8;

        if bit != 0 {
            self.high = self.low + split;
            let pr = &mut self.probs[self.p_idx][idx];
            *pr += (PSCALE - *pr) >> 5;
        } else {
            self.low += split + 1;
            let pr = &mut self.probs[self.p_idx][idx];
            *pr -= *pr >> 5;
        }

        while (self.low ^ self.high) < RENORM {
            self.put_byte((self.low >> 48) as u8);
            self.low = (self.low << 8) & TOP;
            self.high = ((self.high << 8) | 0xFF) & TOP;
        }
    }

    fn encode_bits(&mut self, val: usize, n: u32) {
        self.c1 = 1;
        for shift in (0..n).rev() {
            let bit = (val >> shift) & 1;
            self.encode_bit(bit);
            self.c1 = (self.c1 << 1) | bit;
        }
    }

    fn encode9(&mut self, val: usize) {
        self.encode_bits(val, 9);
    }

    fn dispose(&mut self) {
        let mut low = self.low;
        for _ in 0..8 {
            self.put_byte((low >> 56) as u8);
            low <<= 8;
        }
    }
}

struct RolzDecoder<'a> {
    buf: &'a [u8],
    idx: usize,
    low: u64,
    high: u64,
    current: u64,
    probs: [Vec<u16>; 2],
    log_sizes: [u32; 2],
    ctx: usize,
    c1: usize,
    p_idx: usize,
}

impl<'a> RolzDecoder<'a> {
    fn new(lit_log_size: u32, m_log_size: u32, buf: &'a [u8], idx: usize) -> Self {
        let mut dec = Self {
            buf,
            idx,
            low: 0,
            high: TOP,
            current: 0,
            probs: [
                vec![0u16; 256 << m_log_size],
                vec![0u16; 256 << lit_log_size],
            ],
            log_sizes: [m_log_size, lit_log_size],
            ctx: 0,
            c1: 1,
            p_idx: LITERAL_FLAG,
        };
        for _ in 0..8 {
            dec.current = (dec.current << 8) | u64::from(dec.next_byte());
        }
        dec.reset();
        dec
    }

    fn reset(&mut self) {
        self.probs[MATCH_FLAG].fill(PSCALE >> 1);
        self.probs[LITERAL_FLAG].fill(PSCALE >> 1);
    }

    fn set_mode(&mut self, mode: usize) {
        self.p_idx = mode;
    }

    fn set_context(&mut self, ctx: u8) {
        self.ctx = usize::from(ctx) << self.log_sizes[self.p_idx];
    }

    fn next_byte(&mut self) -> u8 {
        let b = self.buf.get(self.idx).copied().unwrap_or(0);
        self.idx += 1;
        b
    }

    fn decode_bit(&mut self) -> usize {
        let idx = self.ctx + self.c1;
        let p = u64::from(self.probs[self.p_idx][idx]);
        let mid = self.low + (((self.high - self.low) >> 4) * (p >> 4) >> 8);

        let bit = if mid >= self.current {
            self.high = mid;
            let pr = &mut self.probs[self.p_idx][idx];
            *pr += (PSCALE - *pr) >> 5;
            1
        } else {
            self.low = mid + 1;
            let pr = &mut self.probs[self.p_idx][idx];
            *pr -= *pr >> 5;
            0
        };

        while (self.low ^ self.high) < RENORM {
            self.low = (self.low << 8) & TOP;
            self.high = ((self.high << 8) | 0xFF) & TOP;
            self.current = ((self.current << 8) | u64::from(self.next_byte())) & TOP;
        }
        bit
    }

    fn decode_bits(&mut self, n: u32) -> usize {
        self.c1 = 1;
        for _ in 0..n {
            let bit = self.decode_bit();
            self.c1 = (self.c1 << 1) | bit;
        }
        self.c1 & ((1 << n) - 1)
    }

    fn decode9(&mut self) -> usize {
        self.decode_bits(9)
    }
}

// ---------------------------------------------------------------------------
// ROLZX (bit-oriented)
// ---------------------------------------------------------------------------

pub struct RolzCodec2 {
    state: MatchState,
}

impl RolzCodec2 {
    const MIN_MATCH: usize = 2;
    const MAX_MATCH: usize = 256;

    pub fn new() -> Self {
        Self::with_log_pos_checks(LOG_POS_CHECKS2).expect("default log_pos_checks")
    }

    pub fn with_log_pos_checks(log_pos_checks: u32) -> Result<Self> {
        if !(2..=8).contains(&log_pos_checks) {
            return Err(Error::InvalidParam(format!(
                "invalid logPosChecks: {log_pos_checks} (must be in [2..8])"
            )));
        }
        Ok(Self {
            state: MatchState::new(log_pos_checks),
        })
    }

    pub fn max_encoded_len(&self, src_len: usize) -> usize {
        src_len + src_len / 4 + 1024
    }

    pub fn forward(
        &mut self,
        input: &mut SliceArray,
        output: &mut SliceArray,
        count: usize,
    ) -> Result<bool> {
        if count == 0 {
            return Ok(true);
        }
        check_block(input, output, count)?;
        if count < MIN_BLOCK_SIZE || count > input.remaining() {
            return Ok(false);
        }
        if output.remaining() < self.max_encoded_len(count) {
            return Ok(false);
        }

        let in_base = input.index;
        let out_base = output.index;
        let src_end = count - 4;
        let src = &input.array[in_base..in_base + count];

        let out_len = output.array.len() - out_base;
        let dst = &mut output.array[out_base..];
        dst[..4].copy_from_slice(&(count as u32).to_be_bytes());
        let mut re = RolzEncoder::new(9, self.state.log_pos_checks, dst, 4);
        self.state.reset_counters();

        let mut start_chunk = 0usize;
        let mut size_chunk = count.min(CHUNK_SIZE);
        let mut last_base = 0usize;
        let mut src_idx = 0usize;

        while start_chunk < src_end {
            self.state.reset_matches();
            let end_chunk = (start_chunk + size_chunk).min(src_end);
            size_chunk = end_chunk - start_chunk;
            re.reset();
            last_base = start_chunk;
            let buf = &src[start_chunk..];
            src_idx = 0;

            re.set_mode(LITERAL_FLAG);
            re.set_context(0);
            re.encode9((LITERAL_FLAG << 8) | usize::from(buf[src_idx]));
            src_idx += 1;
            if start_chunk + 1 < src_end {
                re.encode9((LITERAL_FLAG << 8) | usize::from(buf[src_idx]));
                src_idx += 1;
            }

            while src_idx < size_chunk {
                re.set_context(buf[src_idx - 1]);
                let m = self.state.find_match(
                    buf,
                    src_idx,
                    size_chunk,
                    Self::MIN_MATCH,
                    Self::MAX_MATCH,
                );

                if m < 0 {
                    re.encode9((LITERAL_FLAG << 8) | usize::from(buf[src_idx]));
                    src_idx += 1;
                    continue;
                }

                let m_len = (m & 0xFFFF) as usize;
                re.encode9((MATCH_FLAG << 8) | m_len);
                let m_idx = (m >> 16) as usize;
                re.set_mode(MATCH_FLAG);
                re.set_context(buf[src_idx - 1]);
                re.encode_bits(m_idx, self.state.log_pos_checks);
                re.set_mode(LITERAL_FLAG);
                src_idx += m_len + Self::MIN_MATCH;
            }

            start_chunk = end_chunk;
        }

        // Last 4 literals through the same coder, no table updates.
        let buf = &src[last_base..];
        re.set_mode(LITERAL_FLAG);
        for _ in 0..4 {
            re.set_context(buf[src_idx - 1]);
            re.encode9((LITERAL_FLAG << 8) | usize::from(buf[src_idx]));
            src_idx += 1;
        }
        re.dispose();

        let dst_idx = re.idx;
        let overflow = re.overflow;
        let consumed = last_base + src_idx;
        input.index = in_base + consumed;
        output.index = out_base + dst_idx.min(out_len);
        Ok(!overflow && consumed == count && dst_idx < count)
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
        check_block(input, output, count)?;
        if count < 13 || count > input.remaining() {
            return Ok(false);
        }

        let in_base = input.index;
        let out_base = output.index;

        let total = {
            let src = &input.array[in_base..];
            u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize
        };
        if total < MIN_BLOCK_SIZE || total > MAX_BLOCK_SIZE || total > output.remaining() {
            return Ok(false);
        }
        let core_end = total - 4;

        let mut rd = {
            let src = &input.array[in_base..in_base + count];
            RolzDecoder::new(9, self.state.log_pos_checks, src, 4)
        };
        self.state.reset_counters();

        let mut start_chunk = 0usize;
        let mut size_chunk = total.min(CHUNK_SIZE);
        let mut last_base = 0usize;
        let mut dst_idx = 0usize;
        let mut success = true;

        'chunks: while start_chunk < core_end {
            self.state.reset_matches();
            let end_chunk = (start_chunk + size_chunk).min(core_end);
            size_chunk = end_chunk - start_chunk;
            rd.reset();
            last_base = start_chunk;
            let chunk = &mut output.array[out_base + start_chunk..out_base + end_chunk];
            dst_idx = 0;

            rd.set_mode(LITERAL_FLAG);
            rd.set_context(0);
            let val = rd.decode9();
            if val >> 8 == MATCH_FLAG {
                success = false;
                break 'chunks;
            }
            chunk[dst_idx] = val as u8;
            dst_idx += 1;

            if start_chunk + 1 < core_end {
                let val = rd.decode9();
                if val >> 8 == MATCH_FLAG {
                    success = false;
                    break 'chunks;
                }
                chunk[dst_idx] = val as u8;
                dst_idx += 1;
            }

            while dst_idx < size_chunk {
                let saved = dst_idx;
                let key = get_key(&chunk[dst_idx - 2..]);
                rd.set_mode(LITERAL_FLAG);
                rd.set_context(chunk[dst_idx - 1]);
                let val = rd.decode9();

                if val >> 8 == LITERAL_FLAG {
                    chunk[dst_idx] = val as u8;
                    dst_idx += 1;
                } else {
                    let m_len = val & 0xFF;
                    if dst_idx + m_len + Self::MIN_MATCH > size_chunk {
                        success = false;
                        break 'chunks;
                    }

                    rd.set_mode(MATCH_FLAG);
                    rd.set_context(chunk[dst_idx - 1]);
                    let m_idx = rd.decode_bits(self.state.log_pos_checks) as i32;
                    let st = &self.state;
                    let slot = (st.counters[key] - m_idx) & st.mask_checks;
                    let r = st.matches[(key << st.log_pos_checks) + slot as usize] as usize;
                    if r >= dst_idx {
                        success = false;
                        break 'chunks;
                    }
                    dst_idx = emit_copy(chunk, dst_idx, r, m_len + Self::MIN_MATCH);
                }

                let st = &mut self.state;
                st.counters[key] += 1;
                st.matches
                    [(key << st.log_pos_checks) + (st.counters[key] & st.mask_checks) as usize] =
                    saved as u32;
            }

            start_chunk = end_chunk;
        }

        let mut produced = last_base + dst_idx;
        if success {
            // Mirror of the encoder's trailing literals.
            rd.set_mode(LITERAL_FLAG);
            for i in 0..4 {
                let pos = out_base + core_end + i;
                let prev = output.array[pos - 1];
                rd.set_context(prev);
                let val = rd.decode9();
                if val >> 8 == MATCH_FLAG {
                    success = false;
                    break;
                }
                output.array[pos] = val as u8;
            }
            if success {
                produced = total;
            }
        }

        let src_idx = rd.idx;
        input.index = in_base + src_idx.min(count);
        output.index = out_base + produced;
        Ok(success && src_idx == count)
    }
}

impl Default for RolzCodec2 {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
