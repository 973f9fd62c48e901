// Entropy codecs behind the narrow block-pipeline interface: encode a byte
// array over a shared bit-stream, decode it back, flush on dispose. State
// never crosses a block boundary, so each block gets a fresh coder.

pub mod ans;
pub mod huffman;
pub mod range;

use std::io::{Read, Write};

use crate::bits::{InputBitStream, OutputBitStream};
use crate::error::{Error, Result};

/// Entropy kinds recognised in the stream header (5-bit ids).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntropyKind {
    None,
    Huffman,
    Ans0,
    Ans1,
    Range,
    Fpaq,
    Cm,
    Tpaq,
}

impl EntropyKind {
    pub fn id(self) -> u8 {
        match self {
            EntropyKind::None => 0,
            EntropyKind::Huffman => 1,
            EntropyKind::Ans0 => 2,
            EntropyKind::Ans1 => 3,
            EntropyKind::Range => 4,
            EntropyKind::Fpaq => 5,
            EntropyKind::Cm => 6,
            EntropyKind::Tpaq => 7,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Some(match id {
            0 => EntropyKind::None,
            1 => EntropyKind::Huffman,
            2 => EntropyKind::Ans0,
            3 => EntropyKind::Ans1,
            4 => EntropyKind::Range,
            5 => EntropyKind::Fpaq,
            6 => EntropyKind::Cm,
            7 => EntropyKind::Tpaq,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            EntropyKind::None => "NONE",
            EntropyKind::Huffman => "HUFFMAN",
            EntropyKind::Ans0 => "ANS0",
            EntropyKind::Ans1 => "ANS1",
            EntropyKind::Range => "RANGE",
            EntropyKind::Fpaq => "FPAQ",
            EntropyKind::Cm => "CM",
            EntropyKind::Tpaq => "TPAQ",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name.to_ascii_uppercase().as_str() {
            "NONE" => EntropyKind::None,
            "HUFFMAN" => EntropyKind::Huffman,
            "ANS" | "ANS0" => EntropyKind::Ans0,
            "ANS1" => EntropyKind::Ans1,
            "RANGE" => EntropyKind::Range,
            "FPAQ" => EntropyKind::Fpaq,
            "CM" => EntropyKind::Cm,
            "TPAQ" => EntropyKind::Tpaq,
            _ => return None,
        })
    }

    /// Kinds this build can actually construct.
    pub fn is_supported(self) -> bool {
        matches!(
            self,
            EntropyKind::None | EntropyKind::Huffman | EntropyKind::Ans0 | EntropyKind::Range
        )
    }
}

/// Entropy-code `data` onto the stream. One shot per block.
pub fn encode_block<W: Write>(
    kind: EntropyKind,
    obs: &mut OutputBitStream<W>,
    data: &[u8],
) -> Result<()> {
    match kind {
        EntropyKind::None => obs.write_bytes(data),
        EntropyKind::Huffman => huffman::encode(obs, data),
        EntropyKind::Ans0 => ans::encode(obs, data),
        EntropyKind::Range => {
            let mut enc = range::RangeEncoder::new(obs, 0);
            enc.encode(data)?;
            enc.dispose()
        }
        other => Err(Error::CreateCompressor(format!(
            "entropy codec {} is not available in this build",
            other.name()
        ))),
    }
}

/// Entropy-decode exactly `out.len()` bytes from the stream.
pub fn decode_block<R: Read>(
    kind: EntropyKind,
    ibs: &mut InputBitStream<R>,
    out: &mut [u8],
) -> Result<()> {
    match kind {
        EntropyKind::None => ibs.read_bytes(out),
        EntropyKind::Huffman => huffman::decode(ibs, out),
        EntropyKind::Ans0 => ans::decode(ibs, out),
        EntropyKind::Range => {
            let mut dec = range::RangeDecoder::new(ibs, 0)?;
            dec.decode(out)
        }
        other => Err(Error::CreateDecompressor(format!(
            "entropy codec {} is not available in this build",
            other.name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_roundtrip() {
        for id in 0..8u8 {
            let kind = EntropyKind::from_id(id).unwrap();
            assert_eq!(kind.id(), id);
            assert_eq!(EntropyKind::from_name(kind.name()), Some(kind));
        }
        assert!(EntropyKind::from_id(8).is_none());
        assert!(EntropyKind::from_name("nope").is_none());
    }

    #[test]
    fn ans_alias() {
        assert_eq!(EntropyKind::from_name("ans"), Some(EntropyKind::Ans0));
    }

    #[test]
    fn supported_kinds_roundtrip_through_interface() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(20);
        for kind in [
            EntropyKind::None,
            EntropyKind::Huffman,
            EntropyKind::Ans0,
            EntropyKind::Range,
        ] {
            let mut obs = OutputBitStream::new(Vec::new());
            encode_block(kind, &mut obs, &data).unwrap();
            obs.close().unwrap();
            let bytes = obs.into_inner();

            let mut ibs = InputBitStream::new(&bytes[..]);
            let mut out = vec![0u8; data.len()];
            decode_block(kind, &mut ibs, &mut out).unwrap();
            assert_eq!(out, data, "{}", kind.name());
        }
    }

    #[test]
    fn unsupported_kind_errors() {
        let mut obs = OutputBitStream::new(Vec::new());
        assert!(matches!(
            encode_block(EntropyKind::Tpaq, &mut obs, b"x"),
            Err(Error::CreateCompressor(_))
        ));
    }
}
