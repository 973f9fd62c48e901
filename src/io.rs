// File-level helpers for compression/decompression.
//
// `compress_file()` and `decompress_file()` wrap the streaming pipeline with
// buffered I/O and return simple statistics.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::stream::{
    CompressOptions, CompressedInputStream, CompressedOutputStream, DecompressOptions,
};

const BUF_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `compress_file()`.
#[derive(Debug, Clone)]
pub struct CompressStats {
    /// Input file size in bytes.
    pub input_size: u64,
    /// Compressed output size in bytes.
    pub output_size: u64,
    /// Number of blocks written.
    pub blocks: u64,
}

/// Statistics returned by `decompress_file()`.
#[derive(Debug, Clone)]
pub struct DecompressStats {
    /// Compressed input size in bytes.
    pub input_size: u64,
    /// Decompressed output size in bytes.
    pub output_size: u64,
    /// Number of blocks read.
    pub blocks: u64,
}

// ---------------------------------------------------------------------------
// compress_file
// ---------------------------------------------------------------------------

/// Compress `input_path` into `output_path`, streaming block by block.
pub fn compress_file(
    input_path: &Path,
    output_path: &Path,
    opts: CompressOptions,
) -> Result<CompressStats> {
    let input_file = File::open(input_path).map_err(Error::ReadFile)?;
    let input_size = input_file.metadata().map_err(Error::ReadFile)?.len();
    let mut reader = BufReader::with_capacity(BUF_SIZE, input_file);

    let output_file = File::create(output_path).map_err(Error::WriteFile)?;
    let writer = BufWriter::with_capacity(BUF_SIZE, output_file);

    let mut stream = CompressedOutputStream::new(writer, opts)?;
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = reader.read(&mut buf).map_err(Error::ReadFile)?;
        if n == 0 {
            break;
        }
        stream.write(&buf[..n])?;
    }
    stream.close()?;
    let blocks = stream.blocks_written();

    let mut writer = stream.into_inner();
    writer.flush().map_err(Error::WriteFile)?;
    let output_size = writer
        .into_inner()
        .map_err(|e| Error::WriteFile(e.into_error()))?
        .metadata()
        .map_err(Error::WriteFile)?
        .len();

    Ok(CompressStats {
        input_size,
        output_size,
        blocks,
    })
}

// ---------------------------------------------------------------------------
// decompress_file
// ---------------------------------------------------------------------------

/// Decompress `input_path` into `output_path`.
pub fn decompress_file(
    input_path: &Path,
    output_path: &Path,
    opts: DecompressOptions,
) -> Result<DecompressStats> {
    let input_file = File::open(input_path).map_err(Error::ReadFile)?;
    let input_size = input_file.metadata().map_err(Error::ReadFile)?.len();
    let reader = BufReader::with_capacity(BUF_SIZE, input_file);

    let output_file = File::create(output_path).map_err(Error::WriteFile)?;
    let mut writer = BufWriter::with_capacity(BUF_SIZE, output_file);

    let mut stream = CompressedInputStream::with_options(reader, opts)?;
    let output_size = stream.decompress_to(&mut writer)?;
    writer.flush().map_err(Error::WriteFile)?;

    Ok(DecompressStats {
        input_size,
        output_size,
        blocks: stream.blocks_read(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::EntropyKind;
    use crate::transform::TransformKind;

    fn temp_path(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join("oxipack_io_test");
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn file_roundtrip() {
        let data: Vec<u8> = b"compress me, compress me again. "
            .iter()
            .copied()
            .cycle()
            .take(200_000)
            .collect();

        let input = temp_path("input.bin");
        let packed = temp_path("packed.knz");
        let output = temp_path("output.bin");
        std::fs::write(&input, &data).unwrap();

        let c = compress_file(
            &input,
            &packed,
            CompressOptions {
                transforms: vec![TransformKind::Rolz],
                entropy: EntropyKind::None,
                block_size: 65536,
                checksum: true,
                jobs: 2,
            },
        )
        .unwrap();
        assert_eq!(c.input_size, data.len() as u64);
        assert!(c.output_size < c.input_size);
        assert_eq!(c.blocks, 4);

        let d = decompress_file(
            &packed,
            &output,
            DecompressOptions {
                jobs: 2,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(d.output_size, data.len() as u64);

        let back = std::fs::read(&output).unwrap();
        assert_eq!(back, data);

        for p in [&input, &packed, &output] {
            let _ = std::fs::remove_file(p);
        }
    }

    #[test]
    fn missing_input_is_read_error() {
        let missing = temp_path("does_not_exist.bin");
        let out = temp_path("unused.knz");
        assert!(matches!(
            compress_file(&missing, &out, CompressOptions::default()),
            Err(Error::ReadFile(_))
        ));
    }
}
