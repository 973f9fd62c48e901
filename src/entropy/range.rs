// Adaptive binary range coder over a shared bit-stream.
//
// 56-bit low/high registers, 16-bit probabilities adapted by 1/32 steps, one
// probability tree per byte context. Order 0 uses a single tree, order 1
// selects the tree with the previous byte. The encoder emits a settled top
// byte whenever low and high agree on it; `dispose` flushes the remaining
// register so the decoder can prime itself with 8 bytes.

use std::io::{Read, Write};

use crate::bits::{InputBitStream, OutputBitStream};
use crate::error::Result;

pub const PSCALE: u16 = 0xFFFF;
const TOP: u64 = 0x00FF_FFFF_FFFF_FFFF;
const RENORM: u64 = 1 << 48;

fn table_len(order: u32) -> usize {
    if order == 0 { 256 } else { 256 * 256 }
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

pub struct RangeEncoder<'a, W: Write> {
    obs: &'a mut OutputBitStream<W>,
    low: u64,
    high: u64,
    probs: Vec<u16>,
    order: u32,
    prev: u8,
}

impl<'a, W: Write> RangeEncoder<'a, W> {
    /// `order` is 0 or 1.
    pub fn new(obs: &'a mut OutputBitStream<W>, order: u32) -> Self {
        Self {
            obs,
            low: 0,
            high: TOP,
            probs: vec![PSCALE >> 1; table_len(order)],
            order,
            prev: 0,
        }
    }

    fn encode_bit(&mut self, bit: usize, idx: usize) -> Result<()> {
        let p = u64::from(self.probs[idx]);
        let split = ((self.high - self.low) >> 4) * (p >> 4) >> 8;

        if bit != 0 {
            self.high = self.low + split;
            self.probs[idx] += (PSCALE - self.probs[idx]) >> 5;
        } else {
            self.low += split + 1;
            self.probs[idx] -= self.probs[idx] >> 5;
        }

        while (self.low ^ self.high) < RENORM {
            self.obs.write_bits(self.low >> 48, 8)?;
            self.low = (self.low << 8) & TOP;
            self.high = ((self.high << 8) | 0xFF) & TOP;
        }
        Ok(())
    }

    /// Encode a run of bytes; may be called several times on one instance.
    pub fn encode(&mut self, data: &[u8]) -> Result<()> {
        for &b in data {
            let ctx = if self.order == 0 {
                0
            } else {
                (self.prev as usize) << 8
            };
            let mut c1 = 1usize;
            for shift in (0..8).rev() {
                let bit = (usize::from(b) >> shift) & 1;
                self.encode_bit(bit, ctx + c1)?;
                c1 = (c1 << 1) | bit;
            }
            self.prev = b;
        }
        Ok(())
    }

    /// Flush the working register (8 bytes). Must be the last call.
    pub fn dispose(&mut self) -> Result<()> {
        let mut low = self.low;
        for _ in 0..8 {
            self.obs.write_bits(low >> 56, 8)?;
            low <<= 8;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

pub struct RangeDecoder<'a, R: Read> {
    ibs: &'a mut InputBitStream<R>,
    low: u64,
    high: u64,
    current: u64,
    probs: Vec<u16>,
    order: u32,
    prev: u8,
}

impl<'a, R: Read> RangeDecoder<'a, R> {
    /// Primes the working register with 8 bytes from the stream.
    pub fn new(ibs: &'a mut InputBitStream<R>, order: u32) -> Result<Self> {
        let mut current = 0u64;
        for _ in 0..8 {
            current = (current << 8) | ibs.read_bits(8)?;
        }
        Ok(Self {
            ibs,
            low: 0,
            high: TOP,
            current,
            probs: vec![PSCALE >> 1; table_len(order)],
            order,
            prev: 0,
        })
    }

    fn decode_bit(&mut self, idx: usize) -> Result<usize> {
        let p = u64::from(self.probs[idx]);
        let mid = self.low + (((self.high - self.low) >> 4) * (p >> 4) >> 8);

        let bit = if mid >= self.current {
            self.high = mid;
            self.probs[idx] += (PSCALE - self.probs[idx]) >> 5;
            1
        } else {
            self.low = mid + 1;
            self.probs[idx] -= self.probs[idx] >> 5;
            0
        };

        while (self.low ^ self.high) < RENORM {
            self.low = (self.low << 8) & TOP;
            self.high = ((self.high << 8) | 0xFF) & TOP;
            self.current = ((self.current << 8) | self.ibs.read_bits(8)?) & TOP;
        }
        Ok(bit)
    }

    /// Decode exactly `out.len()` bytes.
    pub fn decode(&mut self, out: &mut [u8]) -> Result<()> {
        for slot in out.iter_mut() {
            let ctx = if self.order == 0 {
                0
            } else {
                (self.prev as usize) << 8
            };
            let mut c1 = 1usize;
            for _ in 0..8 {
                let bit = self.decode_bit(ctx + c1)?;
                c1 = (c1 << 1) | bit;
            }
            let b = (c1 & 0xFF) as u8;
            *slot = b;
            self.prev = b;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
