// Block-parallel compressed stream reader.
//
// Records are parsed serially off the bit-stream (their size fields chain),
// then payloads of a batch decode in parallel and the results are emitted in
// block order. Decompression is the writer's mirror: entropy decode, inverse
// transforms in reverse pipeline order honoring the skip mask, checksum
// verification.

use std::io::{Read, Write};

use crate::bits::InputBitStream;
use crate::entropy;
use crate::error::{Error, Result};
use crate::stream::header::StreamHeader;
use crate::stream::writer::MAX_CONCURRENCY;
use crate::transform::Sequence;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Configuration for the compressed stream reader.
#[derive(Debug, Clone)]
pub struct DecompressOptions {
    /// Degree of block parallelism.
    pub jobs: usize,
    /// First block to emit (0-based, inclusive).
    pub from_block: u64,
    /// Block to stop at (exclusive); `u64::MAX` means all.
    pub to_block: u64,
}

impl Default for DecompressOptions {
    fn default() -> Self {
        Self {
            jobs: 1,
            from_block: 0,
            to_block: u64::MAX,
        }
    }
}

// ---------------------------------------------------------------------------
// Parsed per-block record
// ---------------------------------------------------------------------------

struct BlockRecord {
    number: u64,
    raw: bool,
    skip_mask: u8,
    primaries: Vec<u32>,
    checksum: Option<u32>,
    payload: Vec<u8>,
}

// Decode one record; independent of every other block.
fn decode_block_task(header: &StreamHeader, rec: &BlockRecord) -> Result<Vec<u8>> {
    let out = if rec.raw {
        rec.payload.clone()
    } else {
        let mut ibs = InputBitStream::new(&rec.payload[..]);
        let transformed_len = ibs.read_bits(32)? as usize;

        let mut seq = Sequence::new(&header.transforms)?;
        if transformed_len > seq.max_encoded_len(header.block_size) {
            return Err(Error::InvalidInput(format!(
                "invalid pre-entropy length: {transformed_len}"
            )));
        }

        let mut transformed = vec![0u8; transformed_len];
        entropy::decode_block(header.entropy, &mut ibs, &mut transformed)?;

        if let Some(b) = seq.bwt_mut() {
            for (i, &p) in rec.primaries.iter().enumerate() {
                b.set_primary_index(i, p);
            }
        }

        let mut out = Vec::new();
        seq.inverse(&transformed, &mut out, rec.skip_mask, header.block_size)?;
        out
    };

    if out.len() > header.block_size {
        return Err(Error::CodecFailure(format!(
            "decoded block exceeds the declared block size: {}",
            out.len()
        )));
    }
    if let Some(expected) = rec.checksum {
        let actual = crc32fast::hash(&out);
        if actual != expected {
            return Err(Error::InvalidInput(format!(
                "block {} checksum mismatch (expected {expected:08X}, got {actual:08X})",
                rec.number
            )));
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Streaming block decompressor over any byte source.
pub struct CompressedInputStream<R: Read> {
    ibs: InputBitStream<R>,
    header: StreamHeader,
    opts: DecompressOptions,
    #[cfg(feature = "parallel")]
    pool: Option<rayon::ThreadPool>,
    blocks_read: u64,
    done: bool,
}

impl<R: Read> CompressedInputStream<R> {
    pub fn new(source: R) -> Result<Self> {
        Self::with_options(source, DecompressOptions::default())
    }

    /// Read and validate the stream header.
    pub fn with_options(source: R, opts: DecompressOptions) -> Result<Self> {
        if opts.jobs == 0 || opts.jobs > MAX_CONCURRENCY {
            return Err(Error::CreateDecompressor(format!(
                "jobs must be in [1, {MAX_CONCURRENCY}], got {}",
                opts.jobs
            )));
        }
        if opts.from_block > opts.to_block {
            return Err(Error::CreateDecompressor(format!(
                "invalid block range: [{}, {})",
                opts.from_block, opts.to_block
            )));
        }

        let mut ibs = InputBitStream::new(source);
        let header = StreamHeader::decode(&mut ibs)?;
        // Constructibility of the declared pipeline and entropy kind.
        Sequence::new(&header.transforms)
            .map_err(|e| Error::CreateDecompressor(e.to_string()))?;
        if !header.entropy.is_supported() {
            return Err(Error::CreateDecompressor(format!(
                "entropy codec {} is not available in this build",
                header.entropy.name()
            )));
        }

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
            ibs,
            header,
            opts,
            #[cfg(feature = "parallel")]
            pool,
            blocks_read: 0,
            done: false,
        })
    }

    pub fn header(&self) -> &StreamHeader {
        &self.header
    }

    /// Blocks decoded (or skipped) so far.
    pub fn blocks_read(&self) -> u64 {
        self.blocks_read
    }

    /// Decode the whole stream into `sink`; returns the bytes written.
    pub fn decompress_to<W: Write>(&mut self, sink: &mut W) -> Result<u64> {
        let mut total = 0u64;

        while !self.done {
            let batch = self.read_batch()?;
            if batch.is_empty() {
                break;
            }

            let header = &self.header;
            #[cfg(feature = "parallel")]
            let decoded: Vec<Result<Vec<u8>>> = match &self.pool {
                Some(pool) if batch.len() > 1 => pool.install(|| {
                    batch
                        .par_iter()
                        .map(|rec| decode_block_task(header, rec))
                        .collect()
                }),
                _ => batch.iter().map(|rec| decode_block_task(header, rec)).collect(),
            };

            #[cfg(not(feature = "parallel"))]
            let decoded: Vec<Result<Vec<u8>>> = batch
                .iter()
                .map(|rec| decode_block_task(header, rec))
                .collect();

            for out in decoded {
                let out = out?;
                sink.write_all(&out).map_err(Error::WriteFile)?;
                total += out.len() as u64;
            }
        }

        Ok(total)
    }

    // Parse up to `jobs` records worth decoding. Records outside the
    // [from, to) window are parsed and dropped without decoding.
    fn read_batch(&mut self) -> Result<Vec<BlockRecord>> {
        let mut batch = Vec::new();

        while batch.len() < self.opts.jobs {
            if self.blocks_read >= self.opts.to_block {
                self.done = true;
                break;
            }

            let size_bits = self.ibs.read_bits(3)? as u32;
            if size_bits == 0 {
                self.done = true;
                break;
            }
            let payload_len = self.ibs.read_bits(8 * size_bits)? as usize;
            // The writer stores blocks verbatim rather than letting them
            // expand, so a record can never exceed the block size.
            if payload_len == 0 || payload_len > self.header.block_size {
                return Err(Error::InvalidInput(format!(
                    "invalid compressed block length: {payload_len}"
                )));
            }

            let mode = self.ibs.read_bits(8)? as u8;
            let raw = mode & 0x80 != 0;
            let mut skip_mask = 0u8;
            let mut primary_count = 0usize;

            if !raw {
                let code = (mode >> 4) & 0x07;
                if code > 4 {
                    return Err(Error::InvalidInput(format!(
                        "invalid primary index count code: {code}"
                    )));
                }
                if code > 0 {
                    primary_count = 1 << (code - 1);
                }

                if self.header.transforms.len() <= 4 {
                    skip_mask = mode & 0x0F;
                    let valid = if self.header.transforms.is_empty() {
                        0
                    } else {
                        (1u8 << self.header.transforms.len()) - 1
                    };
                    if skip_mask & !valid != 0 {
                        return Err(Error::InvalidInput(format!(
                            "skip mask 0x{skip_mask:X} exceeds the declared pipeline"
                        )));
                    }
                } else {
                    if mode & 0x0F != 0x0F {
                        return Err(Error::InvalidInput(
                            "missing extended skip mask marker".to_string(),
                        ));
                    }
                    skip_mask = self.ibs.read_bits(8)? as u8;
                }
            }

            let mut primaries = Vec::with_capacity(primary_count);
            for _ in 0..primary_count {
                primaries.push(self.ibs.read_bits(24)? as u32);
            }

            let checksum = if self.header.checksum {
                Some(self.ibs.read_bits(32)? as u32)
            } else {
                None
            };

            let number = self.blocks_read;
            self.blocks_read += 1;

            if number < self.opts.from_block {
                // Outside the requested window: slice past the payload.
                let mut skip = vec![0u8; payload_len.min(1 << 16)];
                let mut remaining = payload_len;
                while remaining > 0 {
                    let n = remaining.min(skip.len());
                    self.ibs.read_bytes(&mut skip[..n])?;
                    remaining -= n;
                }
                continue;
            }

            let mut payload = vec![0u8; payload_len];
            self.ibs.read_bytes(&mut payload)?;

            batch.push(BlockRecord {
                number,
                raw,
                skip_mask,
                primaries,
                checksum,
                payload,
            });
        }

        Ok(batch)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::EntropyKind;
    use crate::stream::writer::{CompressOptions, CompressedOutputStream};
    use crate::transform::TransformKind;

    fn compress(data: &[u8], opts: CompressOptions) -> Vec<u8> {
        let mut stream = CompressedOutputStream::new(Vec::new(), opts).unwrap();
        stream.write(data).unwrap();
        stream.close().unwrap();
        stream.into_inner()
    }

    fn decompress(bytes: &[u8], opts: DecompressOptions) -> Result<Vec<u8>> {
        let mut stream = CompressedInputStream::with_options(bytes, opts)?;
        let mut out = Vec::new();
        stream.decompress_to(&mut out)?;
        Ok(out)
    }

    #[test]
    fn roundtrip_empty() {
        let bytes = compress(
            b"",
            CompressOptions {
                transforms: vec![],
                entropy: EntropyKind::None,
                block_size: 65536,
                checksum: false,
                jobs: 1,
            },
        );
        let out = decompress(&bytes, DecompressOptions::default()).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn roundtrip_multi_block_with_checksum() {
        let data: Vec<u8> = b"oxipack block stream "
            .iter()
            .copied()
            .cycle()
            .take(300_000)
            .collect();
        let bytes = compress(
            &data,
            CompressOptions {
                transforms: vec![TransformKind::Rolz],
                entropy: EntropyKind::None,
                block_size: 65536,
                checksum: true,
                jobs: 2,
            },
        );
        assert!(bytes.len() < data.len());
        let out = decompress(
            &bytes,
            DecompressOptions {
                jobs: 2,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn from_to_block_window() {
        // 4 blocks of 1024 bytes with distinct fill values.
        let mut data = Vec::new();
        for b in 0u8..4 {
            data.extend_from_slice(&vec![b + 1; 1024]);
        }
        let bytes = compress(
            &data,
            CompressOptions {
                transforms: vec![],
                entropy: EntropyKind::None,
                block_size: 1024,
                checksum: false,
                jobs: 1,
            },
        );

        let out = decompress(
            &bytes,
            DecompressOptions {
                jobs: 1,
                from_block: 1,
                to_block: 3,
            },
        )
        .unwrap();
        assert_eq!(out.len(), 2048);
        assert!(out[..1024].iter().all(|&b| b == 2));
        assert!(out[1024..].iter().all(|&b| b == 3));
    }

    #[test]
    fn corrupt_checksum_detected() {
        let data = vec![0x42u8; 8192];
        let mut bytes = compress(
            &data,
            CompressOptions {
                transforms: vec![],
                entropy: EntropyKind::None,
                block_size: 8192,
                checksum: true,
                jobs: 1,
            },
        );
        // Flip a payload byte near the end (past header + record header).
        let n = bytes.len();
        bytes[n - 10] ^= 0xFF;
        assert!(decompress(&bytes, DecompressOptions::default()).is_err());
    }

    #[test]
    fn truncated_stream_detected() {
        let data = vec![0x42u8; 8192];
        let bytes = compress(
            &data,
            CompressOptions {
                transforms: vec![],
                entropy: EntropyKind::None,
                block_size: 8192,
                checksum: false,
                jobs: 1,
            },
        );
        let truncated = &bytes[..bytes.len() / 2];
        assert!(decompress(truncated, DecompressOptions::default()).is_err());
    }

    #[test]
    fn garbage_header_rejected() {
        let bytes = vec![0xAAu8; 64];
        assert!(matches!(
            CompressedInputStream::new(&bytes[..]),
            Err(Error::InvalidInput(_))
        ));
    }
}
