// Burrows-Wheeler Transform.
//
// Forward: suffix array (SA-IS), then the sentinel-style BWT column with one
// primary index recorded per chunk. Inverse: mergeTPSI for small blocks
// (packed pointer+value chain in a u32 buffer), biPSIv2 above the threshold
// (two-byte-context buckets, fast-bits lookup, per-chunk pointer walks).
//
// Primary indexes travel in the per-block record as 24-bit fields, which
// caps the block size this transform accepts; larger blocks are declined.

use crate::error::{Error, Result};
use crate::slice::SliceArray;
use crate::transform::sais;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Hard ceiling; the 24-bit primary-index fields cannot address past it.
pub const MAX_BLOCK_SIZE: usize = (1 << 24) - 16;

/// mergeTPSI below or at this size, biPSIv2 above.
const BLOCK_SIZE_THRESHOLD: usize = 4 * 1024 * 1024;

const NB_FASTBITS: u32 = 17;
const MASK_FASTBITS: usize = (1 << NB_FASTBITS) - 1;

/// Inverse chunk count for a block size. Deterministic on both sides.
pub fn get_bwt_chunks(count: usize) -> usize {
    if count < 4 * 1024 * 1024 {
        1
    } else if count < 8 * 1024 * 1024 {
        2
    } else if count < 12 * 1024 * 1024 {
        4
    } else {
        8
    }
}

/// BWT instance with lazily grown scratch buffers.
pub struct Bwt {
    buffer: Vec<u32>,
    primary_indexes: [u32; 8],
}

impl Default for Bwt {
    fn default() -> Self {
        Self::new()
    }
}

impl Bwt {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            primary_indexes: [0; 8],
        }
    }

    pub fn primary_index(&self, n: usize) -> u32 {
        self.primary_indexes[n]
    }

    pub fn set_primary_index(&mut self, n: usize, primary_index: u32) -> bool {
        if n >= 8 {
            return false;
        }
        self.primary_indexes[n] = primary_index;
        true
    }

    pub fn max_encoded_len(&self, src_len: usize) -> usize {
        src_len
    }

    // -----------------------------------------------------------------------
    // Forward
    // -----------------------------------------------------------------------

    pub fn forward(
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
        if count > MAX_BLOCK_SIZE {
            return Err(Error::InvalidParam(format!(
                "the max BWT block size is {MAX_BLOCK_SIZE}, got {count}"
            )));
        }
        if count > input.remaining() || count > output.remaining() {
            return Ok(false);
        }
        if count < 2 {
            output.array[output.index] = input.array[input.index];
            input.index += 1;
            output.index += 1;
            return Ok(true);
        }

        let src = &input.array[input.index..input.index + count];
        let sa = sais::suffix_array(src);
        let chunks = get_bwt_chunks(count);
        let ck = chunk_size(count, chunks);

        let dst = &mut output.array[output.index..output.index + count];
        dst[0] = src[count - 1];
        self.primary_indexes = [0; 8];

        let mut out = 1usize;
        for (q, &j) in sa.iter().enumerate() {
            let j = j as usize;
            if j % ck == 0 && j / ck < chunks {
                self.primary_indexes[j / ck] = q as u32 + 1;
            }
            if j == 0 {
                continue;
            }
            dst[out] = src[j - 1];
            out += 1;
        }

        input.index += count;
        output.index += count;
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Inverse
    // -----------------------------------------------------------------------

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
        if count > MAX_BLOCK_SIZE {
            return Err(Error::InvalidParam(format!(
                "the max BWT block size is {MAX_BLOCK_SIZE}, got {count}"
            )));
        }
        if count > input.remaining() || count > output.remaining() {
            return Ok(false);
        }
        if count < 2 {
            output.array[output.index] = input.array[input.index];
            input.index += 1;
            output.index += 1;
            return Ok(true);
        }

        if count <= BLOCK_SIZE_THRESHOLD {
            self.inverse_merge_tpsi(input, output, count)
        } else {
            self.inverse_bipsi_v2(input, output, count, get_bwt_chunks(count))
        }
    }

    // Small blocks: pack (previous position << 8 | value) into a u32 chain
    // and follow it from the primary index.
    fn inverse_merge_tpsi(
        &mut self,
        input: &mut SliceArray,
        output: &mut SliceArray,
        count: usize,
    ) -> Result<bool> {
        let p_idx = self.primary_indexes[0] as usize;
        if p_idx == 0 || p_idx > count {
            return Ok(false);
        }

        if self.buffer.len() < count {
            self.buffer.resize(count.max(64), 0);
        }
        let src = &input.array[input.index..input.index + count];

        let mut buckets = [0u32; 256];
        for &b in src {
            buckets[b as usize] += 1;
        }
        let mut sum = 0u32;
        for b in buckets.iter_mut() {
            let tmp = *b;
            *b = sum;
            sum += tmp;
        }

        for (i, &v) in src.iter().enumerate().take(p_idx) {
            let v = v as usize;
            self.buffer[buckets[v] as usize] = ((i as u32).wrapping_sub(1) << 8) | v as u32;
            buckets[v] += 1;
        }
        for (i, &v) in src.iter().enumerate().skip(p_idx) {
            let v = v as usize;
            self.buffer[buckets[v] as usize] = ((i as u32) << 8) | v as u32;
            buckets[v] += 1;
        }

        let dst = &mut output.array[output.index..output.index + count];
        let mut t = p_idx - 1;
        for d in dst.iter_mut() {
            if t >= count {
                return Ok(false);
            }
            let ptr = self.buffer[t];
            *d = ptr as u8;
            t = (ptr >> 8) as usize;
        }

        input.index += count;
        output.index += count;
        Ok(true)
    }

    // Large blocks: two-byte-context inverse, chunks walked independently.
    fn inverse_bipsi_v2(
        &mut self,
        input: &mut SliceArray,
        output: &mut SliceArray,
        count: usize,
        chunks: usize,
    ) -> Result<bool> {
        let p_idx = self.primary_indexes[0] as usize;
        if p_idx == 0 || p_idx > count {
            return Ok(false);
        }
        for k in 0..chunks {
            if self.primary_indexes[k] as usize > count {
                return Ok(false);
            }
        }

        if self.buffer.len() < count + 1 {
            self.buffer.resize((count + 1).max(64), 0);
        }
        let src = &input.array[input.index..input.index + count];

        // Byte histogram, then running start positions (base 1).
        let mut hist = [0u32; 256];
        for &b in src {
            hist[b as usize] += 1;
        }
        let mut freqs = [0usize; 256];
        let mut buckets = vec![0u32; 65536];
        {
            let mut sum = 1usize;
            for c in 0..256 {
                let f = sum;
                sum += hist[c] as usize;
                freqs[c] = f;

                if f != sum {
                    let ptr = &mut buckets[c << 8..(c << 8) + 256];
                    let hi = sum.min(p_idx);
                    for &b in &src[f..hi.max(f)] {
                        ptr[b as usize] += 1;
                    }
                    let lo = (f - 1).max(p_idx);
                    if lo < sum - 1 {
                        for &b in &src[lo..sum - 1] {
                            ptr[b as usize] += 1;
                        }
                    }
                }
            }
        }

        let lastc = src[0] as usize;
        let mut shift = 0u32;
        while (count >> shift) > MASK_FASTBITS {
            shift += 1;
        }

        // Cumulative pair starts (lexicographic by pair) + fast-bits lookup.
        let mut fast_bits = vec![0u16; MASK_FASTBITS + 1];
        {
            let mut v = 0usize;
            let mut sum = 1usize;
            for c in 0..256 {
                if c == lastc {
                    sum += 1;
                }
                for d in 0..256 {
                    let idx = (d << 8) | c;
                    let s = sum;
                    sum += buckets[idx] as usize;
                    buckets[idx] = s as u32;
                    if s == sum {
                        continue;
                    }
                    while v <= (sum - 1) >> shift {
                        fast_bits[v] = ((c << 8) | d) as u16;
                        v += 1;
                    }
                }
            }
        }

        // Fill the pointer chain.
        for slot in self.buffer[..=count].iter_mut() {
            *slot = 0;
        }
        let mut n = 0usize;
        while n < p_idx {
            let c = src[n] as usize;
            let p = freqs[c];
            if p < p_idx {
                let b = &mut buckets[(c << 8) | src[p] as usize];
                self.buffer[*b as usize] = n as u32;
                *b += 1;
            } else if p > p_idx {
                let b = &mut buckets[(c << 8) | src[p - 1] as usize];
                self.buffer[*b as usize] = n as u32;
                *b += 1;
            }
            freqs[c] += 1;
            n += 1;
        }
        while n < count {
            let c = src[n] as usize;
            let p = freqs[c];
            freqs[c] += 1;
            n += 1;
            if p < p_idx {
                let b = &mut buckets[(c << 8) | src[p] as usize];
                self.buffer[*b as usize] = n as u32;
                *b += 1;
            } else if p > p_idx {
                let b = &mut buckets[(c << 8) | src[p - 1] as usize];
                self.buffer[*b as usize] = n as u32;
                *b += 1;
            }
        }

        // Transpose so the walk indexes buckets by (first << 8) | second.
        for c in 0..256 {
            for d in 0..c {
                buckets.swap((d << 8) | c, (c << 8) | d);
            }
        }

        let ck = chunk_size(count, chunks);
        let dst = &mut output.array[output.index..output.index + count];
        let data = &self.buffer[..=count];
        let primaries = &self.primary_indexes;

        let ok = if ck.is_multiple_of(2) {
            // Even chunk size: walks write disjoint regions.
            #[cfg(feature = "parallel")]
            {
                dst.par_chunks_mut(ck)
                    .enumerate()
                    .map(|(c, chunk)| {
                        let start = c * ck;
                        let end = (start + ck).min(count - 1);
                        walk_chunk(
                            chunk,
                            start,
                            start,
                            end,
                            primaries[c] as usize,
                            data,
                            &buckets,
                            &fast_bits,
                            shift,
                        )
                    })
                    .all(|r| r)
            }
            #[cfg(not(feature = "parallel"))]
            {
                let mut all = true;
                for c in 0..chunks {
                    let start = c * ck;
                    let end = (start + ck).min(count - 1);
                    all &= walk_chunk(
                        dst,
                        0,
                        start,
                        end,
                        primaries[c] as usize,
                        data,
                        &buckets,
                        &fast_bits,
                        shift,
                    );
                }
                all
            }
        } else {
            // Odd chunk size: adjacent walks share a boundary byte, keep
            // them serial on the full output.
            let mut all = true;
            for c in 0..chunks {
                let start = c * ck;
                if start >= count {
                    break;
                }
                let end = (start + ck).min(count - 1);
                all &= walk_chunk(
                    dst,
                    0,
                    start,
                    end,
                    primaries[c] as usize,
                    data,
                    &buckets,
                    &fast_bits,
                    shift,
                );
            }
            all
        };

        if !ok {
            return Ok(false);
        }

        dst[count - 1] = lastc as u8;
        input.index += count;
        output.index += count;
        Ok(true)
    }
}

fn chunk_size(count: usize, chunks: usize) -> usize {
    let st = count / chunks;
    if chunks * st == count { st } else { st + 1 }
}

// Walk one chunk's pointer chain, emitting two bytes per step into
// `dst[(i - 1 - base)..]`. Returns false on a corrupt chain.
#[allow(clippy::too_many_arguments)]
fn walk_chunk(
    dst: &mut [u8],
    base: usize,
    start: usize,
    end: usize,
    mut p: usize,
    data: &[u32],
    buckets: &[u32],
    fast_bits: &[u16],
    shift: u32,
) -> bool {
    let mut i = start + 1;
    while i <= end {
        if p >= data.len() {
            return false;
        }
        let mut s = fast_bits[p >> shift] as usize;
        while s < 65536 && buckets[s] as usize <= p {
            s += 1;
        }
        if s == 65536 {
            return false;
        }
        dst[i - 1 - base] = (s >> 8) as u8;
        if i - base < dst.len() {
            dst[i - base] = s as u8;
        }
        p = data[p] as usize;
        i += 2;
    }
    true
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
