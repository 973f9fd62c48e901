// Block-parallel compressed stream writer.
//
// Input is sliced into fixed-size blocks; batches of `jobs` blocks run
// transform + entropy in parallel and the resulting records are written
// strictly in block order, so the output bytes are identical for any job
// count. A record with a zero-width size field terminates the stream.

use std::io::Write;

use crate::bits::OutputBitStream;
use crate::entropy::{self, EntropyKind};
use crate::error::{Error, Result};
use crate::stream::header::{
    MAX_BITSTREAM_BLOCK_SIZE, MIN_BITSTREAM_BLOCK_SIZE, StreamHeader,
};
use crate::transform::{Sequence, TransformKind, bwt, get_bwt_chunks};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

pub const MAX_CONCURRENCY: usize = 64;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Configuration for the compressed stream writer.
#[derive(Debug, Clone)]
pub struct CompressOptions {
    /// Ordered transform pipeline (up to 8 stages).
    pub transforms: Vec<TransformKind>,
    /// Entropy codec applied after the pipeline.
    pub entropy: EntropyKind,
    /// Block size; rounded up to a 16-byte multiple.
    pub block_size: usize,
    /// Record a 32-bit checksum of every raw block.
    pub checksum: bool,
    /// Degree of block parallelism.
    pub jobs: usize,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            transforms: vec![TransformKind::Rolz],
            entropy: EntropyKind::None,
            block_size: 4 * 1024 * 1024,
            checksum: false,
            jobs: 1,
        }
    }
}

impl CompressOptions {
    // Normalised block size.
    fn rounded_block_size(&self) -> usize {
        (self.block_size + 15) & !15
    }

    fn validate(&self) -> Result<()> {
        let bs = self.rounded_block_size();
        if !(MIN_BITSTREAM_BLOCK_SIZE..=MAX_BITSTREAM_BLOCK_SIZE).contains(&bs) {
            return Err(Error::CreateCompressor(format!(
                "block size must be in [{MIN_BITSTREAM_BLOCK_SIZE}, {MAX_BITSTREAM_BLOCK_SIZE}], got {bs}"
            )));
        }
        if self.jobs == 0 || self.jobs > MAX_CONCURRENCY {
            return Err(Error::CreateCompressor(format!(
                "jobs must be in [1, {MAX_CONCURRENCY}], got {}",
                self.jobs
            )));
        }
        if !self.entropy.is_supported() {
            return Err(Error::CreateCompressor(format!(
                "entropy codec {} is not available in this build",
                self.entropy.name()
            )));
        }
        // Constructibility of every stage.
        Sequence::new(&self.transforms)?;
        // The 24-bit primary-index fields bound the BWT block size.
        if self.transforms.contains(&TransformKind::Bwt) && bs > bwt::MAX_BLOCK_SIZE {
            return Err(Error::CreateCompressor(format!(
                "BWT pipelines support blocks up to {}, got {bs}",
                bwt::MAX_BLOCK_SIZE
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Encoded block record
// ---------------------------------------------------------------------------

struct EncodedBlock {
    raw: bool,
    skip_mask: u8,
    primaries: Vec<u32>,
    checksum: Option<u32>,
    payload: Vec<u8>,
}

// Transform + entropy for one block; independent of every other block.
fn encode_block_task(
    transforms: &[TransformKind],
    entropy: EntropyKind,
    checksum: bool,
    block: &[u8],
) -> Result<EncodedBlock> {
    let mut seq = Sequence::new(transforms)?;
    let mut transformed = Vec::new();
    let skip_mask = seq.forward(block, &mut transformed)?;

    let crc = checksum.then(|| crc32fast::hash(block));

    let mut primaries = Vec::new();
    if let Some(stage) = seq.bwt_stage()
        && skip_mask & (1 << stage) == 0
    {
        let b = seq.bwt().expect("bwt stage present");
        let chunks = get_bwt_chunks(block.len());
        for i in 0..chunks {
            primaries.push(b.primary_index(i));
        }
    }

    // Payload: 32-bit pre-entropy length, then the coded bytes.
    let mut payload_obs = OutputBitStream::new(Vec::new());
    payload_obs.write_bits(transformed.len() as u64, 32)?;
    entropy::encode_block(entropy, &mut payload_obs, &transformed)?;
    payload_obs.close()?;
    let coded = payload_obs.into_inner();

    if coded.len() >= block.len() {
        // The whole stack expanded the block; store it verbatim.
        return Ok(EncodedBlock {
            raw: true,
            skip_mask: 0,
            primaries: Vec::new(),
            checksum: crc,
            payload: block.to_vec(),
        });
    }

    Ok(EncodedBlock {
        raw: false,
        skip_mask,
        primaries,
        checksum: crc,
        payload: coded,
    })
}

fn primary_count_code(count: usize) -> u8 {
    match count {
        0 => 0,
        1 => 1,
        2 => 2,
        4 => 3,
        _ => 4,
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Streaming block compressor over any byte sink.
pub struct CompressedOutputStream<W: Write> {
    obs: OutputBitStream<W>,
    transforms: Vec<TransformKind>,
    entropy: EntropyKind,
    block_size: usize,
    checksum: bool,
    jobs: usize,
    #[cfg(feature = "parallel")]
    pool: Option<rayon::ThreadPool>,
    pending: Vec<u8>,
    closed: bool,
    blocks_written: u64,
    bytes_in: u64,
}

impl<W: Write> CompressedOutputStream<W> {
    /// Validate the configuration and write the stream header.
    pub fn new(sink: W, opts: CompressOptions) -> Result<Self> {
        opts.validate()?;
        let block_size = opts.rounded_block_size();

        let mut obs = OutputBitStream::new(sink);
        StreamHeader {
            checksum: opts.checksum,
            entropy: opts.entropy,
            transforms: opts.transforms.clone(),
            block_size,
        }
        .encode(&mut obs)?;

        #[cfg(feature = "parallel")]
        let pool = if opts.jobs > 1 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(opts.jobs)
                    .build()
                    .map_err(|e| Error::Unknown(format!("thread pool: {e}")))?,
            )
        } else {
            None
        };

        Ok(Self {
            obs,
            transforms: opts.transforms,
            entropy: opts.entropy,
            block_size,
            checksum: opts.checksum,
            jobs: opts.jobs,
            #[cfg(feature = "parallel")]
            pool,
            pending: Vec::new(),
            closed: false,
            blocks_written: 0,
            bytes_in: 0,
        })
    }

    /// Buffer input; full batches of `jobs` blocks are compressed as they
    /// accumulate.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        if self.closed {
            return Err(Error::InvalidParam("stream already closed".to_string()));
        }
        self.bytes_in += data.len() as u64;
        self.pending.extend_from_slice(data);

        let batch_bytes = self.block_size * self.jobs;
        while self.pending.len() >= batch_bytes {
            let rest = self.pending.split_off(batch_bytes);
            let batch = std::mem::replace(&mut self.pending, rest);
            self.process_batch(&batch)?;
        }
        Ok(())
    }

    /// Flush remaining blocks, write the terminator and flush the sink.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let batch_bytes = self.block_size * self.jobs;
        while !self.pending.is_empty() {
            let take = self.pending.len().min(batch_bytes);
            let rest = self.pending.split_off(take);
            let batch = std::mem::replace(&mut self.pending, rest);
            self.process_batch(&batch)?;
        }

        // Terminator: zero-width size field.
        self.obs.write_bits(0, 3)?;
        self.obs.close()
    }

    /// Number of blocks emitted so far.
    pub fn blocks_written(&self) -> u64 {
        self.blocks_written
    }

    /// Total input bytes accepted.
    pub fn bytes_in(&self) -> u64 {
        self.bytes_in
    }

    /// Consume the stream and return the sink. Call `close` first.
    pub fn into_inner(self) -> W {
        self.obs.into_inner()
    }

    fn process_batch(&mut self, batch: &[u8]) -> Result<()> {
        let blocks: Vec<&[u8]> = batch.chunks(self.block_size).collect();
        let transforms = &self.transforms;
        let entropy = self.entropy;
        let checksum = self.checksum;

        #[cfg(feature = "parallel")]
        let encoded: Vec<Result<EncodedBlock>> = match &self.pool {
            Some(pool) if blocks.len() > 1 => pool.install(|| {
                blocks
                    .par_iter()
                    .map(|b| encode_block_task(transforms, entropy, checksum, b))
                    .collect()
            }),
            _ => blocks
                .iter()
                .map(|b| encode_block_task(transforms, entropy, checksum, b))
                .collect(),
        };

        #[cfg(not(feature = "parallel"))]
        let encoded: Vec<Result<EncodedBlock>> = blocks
            .iter()
            .map(|b| encode_block_task(transforms, entropy, checksum, b))
            .collect();

        for enc in encoded {
            let enc = enc?;
            self.write_record(&enc)?;
            self.blocks_written += 1;
        }
        Ok(())
    }

    fn write_record(&mut self, enc: &EncodedBlock) -> Result<()> {
        let len = enc.payload.len() as u64;
        let size_bits = size_field_bytes(len);
        self.obs.write_bits(u64::from(size_bits), 3)?;
        self.obs.write_bits(len, 8 * u32::from(size_bits))?;

        let mut mode = 0u8;
        let mut extra_mask = None;
        if enc.raw {
            mode |= 0x80;
        } else {
            mode |= primary_count_code(enc.primaries.len()) << 4;
            if self.transforms.len() <= 4 {
                mode |= enc.skip_mask & 0x0F;
            } else {
                mode |= 0x0F;
                extra_mask = Some(enc.skip_mask);
            }
        }
        self.obs.write_bits(u64::from(mode), 8)?;
        if let Some(mask) = extra_mask {
            self.obs.write_bits(u64::from(mask), 8)?;
        }

        if !enc.raw {
            for &p in &enc.primaries {
                self.obs.write_bits(u64::from(p), 24)?;
            }
        }
        if let Some(crc) = enc.checksum {
            self.obs.write_bits(u64::from(crc), 32)?;
        }
        self.obs.write_bytes(&enc.payload)
    }
}

// Bytes needed for the compressed-length field (1..=7).
fn size_field_bytes(len: u64) -> u8 {
    let mut n = 1u8;
    while len >= 1u64 << (8 * n) {
        n += 1;
    }
    n
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
