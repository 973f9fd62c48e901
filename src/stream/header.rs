// Stream header: a fixed 16-byte bit-packed prefix identifying the format,
// the entropy kind, the declared transform pipeline and the block size.

use std::io::{Read, Write};

use crate::bits::{InputBitStream, OutputBitStream};
use crate::entropy::EntropyKind;
use crate::error::{Error, Result};
use crate::transform::{MAX_TRANSFORMS, TransformKind};

/// Format magic, "KANZ".
pub const BITSTREAM_TYPE: u32 = 0x4B41_4E5A;
/// Format version carried in 5 bits.
pub const BITSTREAM_FORMAT_VERSION: u8 = 2;

pub const MIN_BITSTREAM_BLOCK_SIZE: usize = 1024;
pub const MAX_BITSTREAM_BLOCK_SIZE: usize = (1 << 30) - 16;

/// Decoded stream header.
#[derive(Debug, Clone)]
pub struct StreamHeader {
    pub checksum: bool,
    pub entropy: EntropyKind,
    pub transforms: Vec<TransformKind>,
    pub block_size: usize,
}

impl StreamHeader {
    /// Layout: magic 32, version 5, checksum 1, entropy 5, transforms 48
    /// (8 x 6-bit ids, 0 = NONE), block size 26 (16-byte units), reserved
    /// 11 bits to pad the header to exactly 16 bytes.
    pub fn encode<W: Write>(&self, obs: &mut OutputBitStream<W>) -> Result<()> {
        obs.write_bits(u64::from(BITSTREAM_TYPE), 32)?;
        obs.write_bits(u64::from(BITSTREAM_FORMAT_VERSION), 5)?;
        obs.write_bits(u64::from(self.checksum), 1)?;
        obs.write_bits(u64::from(self.entropy.id()), 5)?;

        for i in 0..MAX_TRANSFORMS {
            let id = self
                .transforms
                .get(i)
                .map_or(0, |k| k.id());
            obs.write_bits(u64::from(id), 6)?;
        }

        obs.write_bits((self.block_size / 16) as u64, 26)?;
        obs.write_bits(0, 11)?;
        Ok(())
    }

    pub fn decode<R: Read>(ibs: &mut InputBitStream<R>) -> Result<Self> {
        let magic = ibs.read_bits(32)? as u32;
        if magic != BITSTREAM_TYPE {
            return Err(Error::InvalidInput(format!(
                "invalid stream type: 0x{magic:08X}"
            )));
        }

        let version = ibs.read_bits(5)? as u8;
        if version != BITSTREAM_FORMAT_VERSION {
            return Err(Error::InvalidInput(format!(
                "unsupported stream version: {version}"
            )));
        }

        let checksum = ibs.read_bits(1)? != 0;

        let entropy_id = ibs.read_bits(5)? as u8;
        let entropy = EntropyKind::from_id(entropy_id)
            .ok_or_else(|| Error::InvalidInput(format!("invalid entropy kind: {entropy_id}")))?;

        let mut transforms = Vec::new();
        for _ in 0..MAX_TRANSFORMS {
            let id = ibs.read_bits(6)? as u8;
            let kind = TransformKind::from_id(id)
                .ok_or_else(|| Error::InvalidInput(format!("invalid transform id: {id}")))?;
            if kind != TransformKind::None {
                transforms.push(kind);
            }
        }

        let block_size = 16 * ibs.read_bits(26)? as usize;
        if !(MIN_BITSTREAM_BLOCK_SIZE..=MAX_BITSTREAM_BLOCK_SIZE).contains(&block_size) {
            return Err(Error::InvalidInput(format!(
                "invalid block size: {block_size}"
            )));
        }

        ibs.read_bits(11)?;

        Ok(Self {
            checksum,
            entropy,
            transforms,
            block_size,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
