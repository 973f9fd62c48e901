// Error kinds shared by the whole crate.
//
// Every public boundary surfaces one of these kinds plus a human-readable
// message. Soft transform declines are NOT errors — transforms return
// `Ok(false)` and the pipeline records a skip instead.

use std::fmt;
use std::io;

/// Crate-wide error type: a kind (stable, maps to CLI exit codes) plus a
/// free-form message.
#[derive(Debug)]
pub enum Error {
    /// Invalid argument to a public API (bad job count, bad level, ...).
    InvalidParam(String),
    /// Malformed compressed stream (bad magic, corrupt lengths, bad CRC).
    InvalidInput(String),
    /// Configuration cannot produce a compressor (unsupported transform or
    /// entropy kind, block size incompatible with the pipeline).
    CreateCompressor(String),
    /// Configuration cannot produce a decompressor.
    CreateDecompressor(String),
    /// Failure reading the underlying byte source.
    ReadFile(io::Error),
    /// Failure writing the underlying byte sink.
    WriteFile(io::Error),
    /// A codec failed unrecoverably (transform invariant broken, entropy
    /// decode produced inconsistent lengths).
    CodecFailure(String),
    /// Anything else.
    Unknown(String),
}

impl Error {
    /// Stable numeric code for this kind; the CLI exits with this value.
    pub fn code(&self) -> i32 {
        match self {
            Error::InvalidParam(_) => 1,
            Error::InvalidInput(_) => 2,
            Error::CreateCompressor(_) => 3,
            Error::CreateDecompressor(_) => 4,
            Error::ReadFile(_) => 5,
            Error::WriteFile(_) => 6,
            Error::CodecFailure(_) => 7,
            Error::Unknown(_) => 8,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidParam(m) => write!(f, "invalid parameter: {m}"),
            Error::InvalidInput(m) => write!(f, "invalid input: {m}"),
            Error::CreateCompressor(m) => write!(f, "cannot create compressor: {m}"),
            Error::CreateDecompressor(m) => write!(f, "cannot create decompressor: {m}"),
            Error::ReadFile(e) => write!(f, "read error: {e}"),
            Error::WriteFile(e) => write!(f, "write error: {e}"),
            Error::CodecFailure(m) => write!(f, "codec failure: {m}"),
            Error::Unknown(m) => write!(f, "error: {m}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ReadFile(e) | Error::WriteFile(e) => Some(e),
            _ => None,
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
