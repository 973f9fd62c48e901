//! Oxipack: block-based lossless data compression in Rust.
//!
//! The crate provides:
//! - Reversible byte transforms (`transform`): BWT, ROLZ/ROLZX, RLT, ZRLT,
//!   MTFT, UTF and executable preprocessing
//! - Entropy codecs (`entropy`): Huffman, range, rANS
//! - Block-parallel compressed-stream framing (`stream`)
//! - File-oriented helpers (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```
//! use oxipack::stream::CompressOptions;
//!
//! let data = b"to be, or not to be, that is the question".repeat(100);
//!
//! let packed = oxipack::compress(&data, CompressOptions::default()).unwrap();
//! let restored = oxipack::decompress(&packed).unwrap();
//! assert_eq!(restored, data);
//! ```

pub mod bits;
pub mod entropy;
pub mod error;
pub mod io;
pub mod slice;
pub mod stream;
pub mod transform;

#[cfg(feature = "cli")]
pub mod cli;

pub use error::{Error, Result};

use stream::{CompressOptions, CompressedInputStream, CompressedOutputStream, DecompressOptions};

/// Compress a byte slice in one call.
pub fn compress(data: &[u8], opts: CompressOptions) -> Result<Vec<u8>> {
    let mut stream = CompressedOutputStream::new(Vec::new(), opts)?;
    stream.write(data)?;
    stream.close()?;
    Ok(stream.into_inner())
}

/// Decompress a byte slice in one call.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    decompress_with(data, DecompressOptions::default())
}

/// Decompress with explicit reader options (jobs, block window).
pub fn decompress_with(data: &[u8], opts: DecompressOptions) -> Result<Vec<u8>> {
    let mut stream = CompressedInputStream::with_options(data, opts)?;
    let mut out = Vec::new();
    stream.decompress_to(&mut out)?;
    Ok(out)
}
