// Reversible byte transforms and the pipeline that sequences them.
//
// The factory resolves names such as "BWT+RLT+ZRLT" into an ordered
// `Sequence` of up to 8 stages. Per block, each stage may decline (it would
// expand the data); the pipeline records declines in a skip mask and keeps
// going with the stage's input.

pub mod bwt;
pub mod exe;
pub mod mtft;
pub mod rlt;
pub mod rolz;
pub mod sais;
pub mod utf;
pub mod zrlt;

use crate::error::{Error, Result};
use crate::slice::SliceArray;

pub use bwt::{Bwt, get_bwt_chunks};
pub use exe::ExeCodec;
pub use mtft::Mtft;
pub use rlt::Rlt;
pub use rolz::{RolzCodec1, RolzCodec2};
pub use utf::UtfCodec;
pub use zrlt::Zrlt;

/// Longest supported pipeline.
pub const MAX_TRANSFORMS: usize = 8;

/// Block-level hint shared by the stages of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataType {
    #[default]
    Undefined,
    Exe,
    Utf8,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BlockContext {
    pub data_type: DataType,
}

// ---------------------------------------------------------------------------
// Transform ids and names
// ---------------------------------------------------------------------------

/// Transform tokens recognised in the stream header (6-bit ids).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    None,
    Bwt,
    Bwts,
    Snappy,
    Lz,
    Lzx,
    Lzp,
    Rolz,
    Rolzx,
    Rlt,
    Zrlt,
    Mtft,
    Rank,
    Srt,
    Text,
    Utf,
    Exe,
    Fsd,
    Dict,
    Mm,
}

impl TransformKind {
    const ALL: [TransformKind; 20] = [
        TransformKind::None,
        TransformKind::Bwt,
        TransformKind::Bwts,
        TransformKind::Snappy,
        TransformKind::Lz,
        TransformKind::Lzx,
        TransformKind::Lzp,
        TransformKind::Rolz,
        TransformKind::Rolzx,
        TransformKind::Rlt,
        TransformKind::Zrlt,
        TransformKind::Mtft,
        TransformKind::Rank,
        TransformKind::Srt,
        TransformKind::Text,
        TransformKind::Utf,
        TransformKind::Exe,
        TransformKind::Fsd,
        TransformKind::Dict,
        TransformKind::Mm,
    ];

    pub fn id(self) -> u8 {
        Self::ALL.iter().position(|&k| k == self).unwrap() as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(usize::from(id)).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            TransformKind::None => "NONE",
            TransformKind::Bwt => "BWT",
            TransformKind::Bwts => "BWTS",
            TransformKind::Snappy => "SNAPPY",
            TransformKind::Lz => "LZ",
            TransformKind::Lzx => "LZX",
            TransformKind::Lzp => "LZP",
            TransformKind::Rolz => "ROLZ",
            TransformKind::Rolzx => "ROLZX",
            TransformKind::Rlt => "RLT",
            TransformKind::Zrlt => "ZRLT",
            TransformKind::Mtft => "MTFT",
            TransformKind::Rank => "RANK",
            TransformKind::Srt => "SRT",
            TransformKind::Text => "TEXT",
            TransformKind::Utf => "UTF",
            TransformKind::Exe => "EXE",
            TransformKind::Fsd => "FSD",
            TransformKind::Dict => "DICT",
            TransformKind::Mm => "MM",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.to_ascii_uppercase();
        Self::ALL.iter().copied().find(|k| k.name() == upper)
    }
}

/// Parse a combined token such as "BWT+RLT+ZRLT".
pub fn parse_pipeline(names: &str) -> Result<Vec<TransformKind>> {
    let mut kinds = Vec::new();
    for token in names.split('+') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let kind = TransformKind::from_name(token)
            .ok_or_else(|| Error::InvalidParam(format!("unknown transform: {token}")))?;
        if kind != TransformKind::None {
            kinds.push(kind);
        }
    }
    if kinds.len() > MAX_TRANSFORMS {
        return Err(Error::InvalidParam(format!(
            "too many transforms: {} (max {MAX_TRANSFORMS})",
            kinds.len()
        )));
    }
    Ok(kinds)
}

/// Render a pipeline back to its combined token.
pub fn pipeline_name(kinds: &[TransformKind]) -> String {
    if kinds.is_empty() {
        return "NONE".to_string();
    }
    kinds
        .iter()
        .map(|k| k.name())
        .collect::<Vec<_>>()
        .join("+")
}

// ---------------------------------------------------------------------------
// Concrete transform dispatch
// ---------------------------------------------------------------------------

/// A constructed transform stage. Closed set, dispatched by variant.
pub enum Transform {
    Bwt(Bwt),
    Rolz(RolzCodec1),
    Rolzx(RolzCodec2),
    Rlt(Rlt),
    Zrlt(Zrlt),
    Mtft(Mtft),
    Utf(UtfCodec),
    Exe(ExeCodec),
}

impl Transform {
    /// Factory: id to concrete stage. Tokens without an implementation in
    /// this build are rejected here, not at stream time.
    pub fn new(kind: TransformKind) -> Result<Self> {
        Ok(match kind {
            TransformKind::Bwt => Transform::Bwt(Bwt::new()),
            TransformKind::Rolz => Transform::Rolz(RolzCodec1::new()),
            TransformKind::Rolzx => Transform::Rolzx(RolzCodec2::new()),
            TransformKind::Rlt => Transform::Rlt(Rlt::new()),
            TransformKind::Zrlt => Transform::Zrlt(Zrlt::new()),
            TransformKind::Mtft => Transform::Mtft(Mtft::new()),
            TransformKind::Utf => Transform::Utf(UtfCodec::new()),
            TransformKind::Exe => Transform::Exe(ExeCodec::new()),
            other => {
                return Err(Error::CreateCompressor(format!(
                    "transform {} is not available in this build",
                    other.name()
                )));
            }
        })
    }

    pub fn max_encoded_len(&self, src_len: usize) -> usize {
        match self {
            Transform::Bwt(t) => t.max_encoded_len(src_len),
            Transform::Rolz(t) => t.max_encoded_len(src_len),
            Transform::Rolzx(t) => t.max_encoded_len(src_len),
            Transform::Rlt(t) => t.max_encoded_len(src_len),
            Transform::Zrlt(t) => t.max_encoded_len(src_len),
            Transform::Mtft(t) => t.max_encoded_len(src_len),
            Transform::Utf(t) => t.max_encoded_len(src_len),
            Transform::Exe(t) => t.max_encoded_len(src_len),
        }
    }

    pub fn forward(
        &mut self,
        input: &mut SliceArray,
        output: &mut SliceArray,
        count: usize,
        ctx: &mut BlockContext,
    ) -> Result<bool> {
        match self {
            Transform::Bwt(t) => t.forward(input, output, count),
            Transform::Rolz(t) => t.forward(input, output, count),
            Transform::Rolzx(t) => t.forward(input, output, count),
            Transform::Rlt(t) => t.forward(input, output, count, ctx),
            Transform::Zrlt(t) => t.forward(input, output, count),
            Transform::Mtft(t) => t.forward(input, output, count),
            Transform::Utf(t) => t.forward(input, output, count, ctx),
            Transform::Exe(t) => t.forward(input, output, count, ctx),
        }
    }

    pub fn inverse(
        &mut self,
        input: &mut SliceArray,
        output: &mut SliceArray,
        count: usize,
    ) -> Result<bool> {
        match self {
            Transform::Bwt(t) => t.inverse(input, output, count),
            Transform::Rolz(t) => t.inverse(input, output, count),
            Transform::Rolzx(t) => t.inverse(input, output, count),
            Transform::Rlt(t) => t.inverse(input, output, count),
            Transform::Zrlt(t) => t.inverse(input, output, count),
            Transform::Mtft(t) => t.inverse(input, output, count),
            Transform::Utf(t) => t.inverse(input, output, count),
            Transform::Exe(t) => t.inverse(input, output, count),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// An ordered pipeline of transforms with per-block skip tracking.
pub struct Sequence {
    kinds: Vec<TransformKind>,
    stages: Vec<Transform>,
    buf1: Vec<u8>,
    buf2: Vec<u8>,
}

impl Sequence {
    pub fn new(kinds: &[TransformKind]) -> Result<Self> {
        if kinds.len() > MAX_TRANSFORMS {
            return Err(Error::CreateCompressor(format!(
                "too many transforms: {} (max {MAX_TRANSFORMS})",
                kinds.len()
            )));
        }
        let stages = kinds
            .iter()
            .map(|&k| Transform::new(k))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            kinds: kinds.to_vec(),
            stages,
            buf1: Vec::new(),
            buf2: Vec::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn kinds(&self) -> &[TransformKind] {
        &self.kinds
    }

    /// Worst-case intermediate size for a block of `n` bytes.
    pub fn max_encoded_len(&self, n: usize) -> usize {
        let mut size = n;
        let mut worst = n;
        for t in &self.stages {
            size = t.max_encoded_len(size);
            worst = worst.max(size);
        }
        worst.max(64)
    }

    /// The BWT stage, when the pipeline declares one.
    pub fn bwt(&self) -> Option<&Bwt> {
        self.stages.iter().find_map(|t| match t {
            Transform::Bwt(b) => Some(b),
            _ => None,
        })
    }

    pub fn bwt_mut(&mut self) -> Option<&mut Bwt> {
        self.stages.iter_mut().find_map(|t| match t {
            Transform::Bwt(b) => Some(b),
            _ => None,
        })
    }

    /// Index of the BWT stage in the declared pipeline.
    pub fn bwt_stage(&self) -> Option<usize> {
        self.kinds.iter().position(|&k| k == TransformKind::Bwt)
    }

    /// Run the pipeline forward. Returns the skip mask (bit i set = stage i
    /// skipped); the transformed bytes land in `out`.
    pub fn forward(&mut self, data: &[u8], out: &mut Vec<u8>) -> Result<u8> {
        let worst = self.max_encoded_len(data.len());
        self.buf1.resize(worst, 0);
        self.buf2.resize(worst, 0);
        self.buf1[..data.len()].copy_from_slice(data);

        let mut ctx = BlockContext::default();
        let mut cur_len = data.len();
        let mut mask = 0u8;

        for i in 0..self.stages.len() {
            let applied = {
                let mut input = SliceArray::new(&mut self.buf1[..]);
                let mut output = SliceArray::new(&mut self.buf2[..]);
                let applied =
                    self.stages[i].forward(&mut input, &mut output, cur_len, &mut ctx)?;
                if applied {
                    Some(output.index)
                } else {
                    None
                }
            };

            match applied {
                Some(new_len) => {
                    std::mem::swap(&mut self.buf1, &mut self.buf2);
                    cur_len = new_len;
                }
                None => mask |= 1 << i,
            }
        }

        out.clear();
        out.extend_from_slice(&self.buf1[..cur_len]);
        Ok(mask)
    }

    /// Run the pipeline backwards, honoring the skip mask. `max_out` bounds
    /// the size of any intermediate result (the block size at compression
    /// time).
    pub fn inverse(
        &mut self,
        data: &[u8],
        out: &mut Vec<u8>,
        mask: u8,
        max_out: usize,
    ) -> Result<()> {
        let worst = self.max_encoded_len(max_out).max(data.len());
        self.buf1.resize(worst, 0);
        self.buf2.resize(worst, 0);
        self.buf1[..data.len()].copy_from_slice(data);

        let mut cur_len = data.len();

        for i in (0..self.stages.len()).rev() {
            if mask & (1 << i) != 0 {
                continue;
            }
            let new_len = {
                let mut input = SliceArray::new(&mut self.buf1[..cur_len]);
                let mut output = SliceArray::new(&mut self.buf2[..]);
                if !self.stages[i].inverse(&mut input, &mut output, cur_len)? {
                    return Err(Error::InvalidInput(format!(
                        "inverse {} transform failed",
                        self.kinds[i].name()
                    )));
                }
                output.index
            };
            std::mem::swap(&mut self.buf1, &mut self.buf2);
            cur_len = new_len;
        }

        out.clear();
        out.extend_from_slice(&self.buf1[..cur_len]);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_roundtrip() {
        for id in 0..20u8 {
            let kind = TransformKind::from_id(id).unwrap();
            assert_eq!(kind.id(), id);
            assert_eq!(TransformKind::from_name(kind.name()), Some(kind));
        }
        assert!(TransformKind::from_id(20).is_none());
    }

    #[test]
    fn parse_combined_tokens() {
        let kinds = parse_pipeline("BWT+RLT+ZRLT").unwrap();
        assert_eq!(
            kinds,
            vec![TransformKind::Bwt, TransformKind::Rlt, TransformKind::Zrlt]
        );
        assert_eq!(pipeline_name(&kinds), "BWT+RLT+ZRLT");

        assert!(parse_pipeline("NONE").unwrap().is_empty());
        assert_eq!(parse_pipeline("rolzx").unwrap(), vec![TransformKind::Rolzx]);
        assert!(parse_pipeline("BWT+WAT").is_err());
    }

    #[test]
    fn unimplemented_token_is_create_error() {
        assert!(matches!(
            Transform::new(TransformKind::Snappy),
            Err(Error::CreateCompressor(_))
        ));
        assert!(matches!(
            Sequence::new(&[TransformKind::Bwt, TransformKind::Dict]),
            Err(Error::CreateCompressor(_))
        ));
    }

    #[test]
    fn empty_pipeline_passthrough() {
        let mut seq = Sequence::new(&[]).unwrap();
        let data = b"hello world".to_vec();
        let mut out = Vec::new();
        let mask = seq.forward(&data, &mut out).unwrap();
        assert_eq!(mask, 0);
        assert_eq!(out, data);

        let mut back = Vec::new();
        seq.inverse(&out, &mut back, mask, data.len()).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn bwt_mtft_zrlt_roundtrip() {
        let data: Vec<u8> = b"abracadabra".iter().copied().cycle().take(20000).collect();
        let mut seq = Sequence::new(&[
            TransformKind::Bwt,
            TransformKind::Mtft,
            TransformKind::Zrlt,
        ])
        .unwrap();

        let mut transformed = Vec::new();
        let mask = seq.forward(&data, &mut transformed).unwrap();
        assert_eq!(mask, 0, "no stage should skip on redundant text");
        assert!(transformed.len() < data.len());

        // Carry the primary indexes over like the block record does.
        let primaries: Vec<u32> = (0..8).map(|i| seq.bwt().unwrap().primary_index(i)).collect();
        let mut seq2 = Sequence::new(&[
            TransformKind::Bwt,
            TransformKind::Mtft,
            TransformKind::Zrlt,
        ])
        .unwrap();
        for (i, &p) in primaries.iter().enumerate() {
            seq2.bwt_mut().unwrap().set_primary_index(i, p);
        }

        let mut back = Vec::new();
        seq2.inverse(&transformed, &mut back, mask, data.len()).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn declined_stage_sets_mask_bit() {
        // Random data: ZRLT declines (no zeros), MTFT applies.
        let mut state = 77u64;
        let data: Vec<u8> = (0..4096)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
                ((state >> 33) | 1) as u8
            })
            .collect();
        let mut seq = Sequence::new(&[TransformKind::Zrlt, TransformKind::Mtft]).unwrap();
        let mut transformed = Vec::new();
        let mask = seq.forward(&data, &mut transformed).unwrap();
        assert_eq!(mask, 0b01);

        let mut seq2 = Sequence::new(&[TransformKind::Zrlt, TransformKind::Mtft]).unwrap();
        let mut back = Vec::new();
        seq2.inverse(&transformed, &mut back, mask, data.len()).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn corrupt_inverse_is_invalid_input() {
        let data: Vec<u8> = b"abracadabra".iter().copied().cycle().take(5000).collect();
        let mut seq = Sequence::new(&[TransformKind::Bwt]).unwrap();
        let mut transformed = Vec::new();
        let mask = seq.forward(&data, &mut transformed).unwrap();
        assert_eq!(mask, 0);

        let mut seq2 = Sequence::new(&[TransformKind::Bwt]).unwrap();
        seq2.bwt_mut().unwrap().set_primary_index(0, data.len() as u32 + 1);
        let mut back = Vec::new();
        assert!(matches!(
            seq2.inverse(&transformed, &mut back, mask, data.len()),
            Err(Error::InvalidInput(_))
        ));
    }
}
