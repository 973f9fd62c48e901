// Command-line interface.
//
// Two subcommands, `compress` and `decompress`, with long-form options for
// block size, jobs, pipeline, entropy, level and checksums. Reads stdin and
// writes stdout when no files are given.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};
use log::debug;

use crate::entropy::EntropyKind;
use crate::error::Error;
use crate::stream::{
    CompressOptions, CompressedInputStream, CompressedOutputStream, DecompressOptions,
    MAX_CONCURRENCY,
};
use crate::transform::{TransformKind, parse_pipeline, pipeline_name};

const DEFAULT_LEVEL: u32 = 2;
const DEFAULT_BLOCK_SIZE: usize = 4 * 1024 * 1024;
const BUF_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Byte size parsing (supports K, M, G suffixes)
// ---------------------------------------------------------------------------

fn parse_byte_size(s: &str) -> std::result::Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".into());
    }
    let (num_part, multiplier) = match s.as_bytes().last() {
        Some(b'k' | b'K') => (&s[..s.len() - 1], 1024u64),
        Some(b'm' | b'M') => (&s[..s.len() - 1], 1024 * 1024),
        Some(b'g' | b'G') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1u64),
    };
    let num: u64 = num_part
        .trim()
        .parse()
        .map_err(|e| format!("invalid size '{s}': {e}"))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size overflow: '{s}'"))
}

// ---------------------------------------------------------------------------
// Level presets
// ---------------------------------------------------------------------------

/// Compression levels mapping to pipeline/entropy presets:
///
/// - 0: store
/// - 1: ZRLT+RLT with HUFFMAN
/// - 2: ROLZ
/// - 3: ROLZX
/// - 4: EXE+ROLZ
/// - 5: EXE+UTF+BWT+MTFT+ZRLT with RANGE
/// - 6-9: EXE+UTF+BWT+MTFT+ZRLT with ANS
pub fn config_for_level(level: u32) -> (Vec<TransformKind>, EntropyKind) {
    match level {
        0 => (vec![], EntropyKind::None),
        1 => (
            vec![TransformKind::Zrlt, TransformKind::Rlt],
            EntropyKind::Huffman,
        ),
        2 => (vec![TransformKind::Rolz], EntropyKind::None),
        3 => (vec![TransformKind::Rolzx], EntropyKind::None),
        4 => (
            vec![TransformKind::Exe, TransformKind::Rolz],
            EntropyKind::None,
        ),
        5 => (
            vec![
                TransformKind::Exe,
                TransformKind::Utf,
                TransformKind::Bwt,
                TransformKind::Mtft,
                TransformKind::Zrlt,
            ],
            EntropyKind::Range,
        ),
        _ => (
            vec![
                TransformKind::Exe,
                TransformKind::Utf,
                TransformKind::Bwt,
                TransformKind::Mtft,
                TransformKind::Zrlt,
            ],
            EntropyKind::Ans0,
        ),
    }
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Block-based lossless data compressor.
#[derive(Parser, Debug)]
#[command(
    name = "oxipack",
    version,
    about = "Block-based lossless data compressor",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Compress an input stream.
    Compress(CompressArgs),
    /// Decompress an input stream.
    Decompress(DecompressArgs),
}

#[derive(Args, Debug)]
struct CompressArgs {
    /// Input file (default: stdin).
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "input_pos")]
    input: Option<PathBuf>,

    /// Output file (default: stdout).
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "output_pos")]
    output: Option<PathBuf>,

    /// Compression level (0-9); overridden by --transform/--entropy.
    #[arg(long, short = 'l', value_parser = clap::value_parser!(u32).range(0..=9), default_value_t = DEFAULT_LEVEL)]
    level: u32,

    /// Transform pipeline, e.g. "BWT+MTFT+ZRLT".
    #[arg(long, short = 't')]
    transform: Option<String>,

    /// Entropy codec: NONE, HUFFMAN, ANS, RANGE.
    #[arg(long, short = 'e')]
    entropy: Option<String>,

    /// Block size (supports K/M/G suffix).
    #[arg(long = "block-size", short = 'b', value_parser = parse_byte_size, default_value_t = DEFAULT_BLOCK_SIZE as u64)]
    block_size: u64,

    /// Number of parallel jobs.
    #[arg(long, short = 'j', value_parser = clap::value_parser!(u64).range(1..=MAX_CONCURRENCY as u64), default_value_t = 1)]
    jobs: u64,

    /// Record a per-block checksum of the raw data.
    #[arg(long, short = 'x')]
    checksum: bool,

    /// Input file (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    input_pos: Option<PathBuf>,

    /// Output file (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    output_pos: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct DecompressArgs {
    /// Input file (default: stdin).
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "input_pos")]
    input: Option<PathBuf>,

    /// Output file (default: stdout).
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "output_pos")]
    output: Option<PathBuf>,

    /// Number of parallel jobs.
    #[arg(long, short = 'j', value_parser = clap::value_parser!(u64).range(1..=MAX_CONCURRENCY as u64), default_value_t = 1)]
    jobs: u64,

    /// First block to emit (0-based).
    #[arg(long = "from-block", default_value_t = 0)]
    from_block: u64,

    /// Block to stop at (exclusive).
    #[arg(long = "to-block")]
    to_block: Option<u64>,

    /// Input file (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    input_pos: Option<PathBuf>,

    /// Output file (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    output_pos: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Option resolution
// ---------------------------------------------------------------------------

fn build_compress_options(args: &CompressArgs) -> std::result::Result<CompressOptions, Error> {
    let (mut transforms, mut entropy) = config_for_level(args.level);

    if let Some(ref t) = args.transform {
        transforms = parse_pipeline(t)?;
    }
    if let Some(ref e) = args.entropy {
        entropy = EntropyKind::from_name(e)
            .ok_or_else(|| Error::InvalidParam(format!("unknown entropy codec: {e}")))?;
    }

    Ok(CompressOptions {
        transforms,
        entropy,
        block_size: args.block_size as usize,
        checksum: args.checksum,
        jobs: args.jobs as usize,
    })
}

fn open_input(path: &Option<PathBuf>) -> std::result::Result<Box<dyn Read>, i32> {
    match path {
        Some(p) => match File::open(p) {
            Ok(f) => Ok(Box::new(BufReader::with_capacity(BUF_SIZE, f))),
            Err(e) => {
                eprintln!("oxipack: input file: {}: {e}", p.display());
                Err(Error::ReadFile(e).code())
            }
        },
        None => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

fn open_output(path: &Option<PathBuf>, force: bool) -> std::result::Result<Box<dyn Write>, i32> {
    match path {
        Some(p) => {
            if p.exists() && !force {
                eprintln!(
                    "oxipack: output file exists, use -f to overwrite: {}",
                    p.display()
                );
                return Err(Error::InvalidParam("output exists".to_string()).code());
            }
            match File::create(p) {
                Ok(f) => Ok(Box::new(BufWriter::with_capacity(BUF_SIZE, f))),
                Err(e) => {
                    eprintln!("oxipack: output file: {}: {e}", p.display());
                    Err(Error::WriteFile(e).code())
                }
            }
        }
        None => Ok(Box::new(BufWriter::with_capacity(
            BUF_SIZE,
            io::stdout().lock(),
        ))),
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_compress(cli: &Cli, args: &CompressArgs) -> i32 {
    let opts = match build_compress_options(args) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("oxipack: {e}");
            return e.code();
        }
    };

    debug!(
        "compress: transform={} entropy={} block={} jobs={}",
        pipeline_name(&opts.transforms),
        opts.entropy.name(),
        opts.block_size,
        opts.jobs
    );

    let input = args.input.clone().or(args.input_pos.clone());
    let output = args.output.clone().or(args.output_pos.clone());

    let mut reader = match open_input(&input) {
        Ok(r) => r,
        Err(code) => return code,
    };
    let writer = match open_output(&output, cli.force) {
        Ok(w) => w,
        Err(code) => return code,
    };

    let mut stream = match CompressedOutputStream::new(writer, opts.clone()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("oxipack: {e}");
            return e.code();
        }
    };

    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if let Err(e) = stream.write(&buf[..n]) {
                    eprintln!("oxipack: {e}");
                    return e.code();
                }
            }
            Err(e) => {
                eprintln!("oxipack: read error: {e}");
                return Error::ReadFile(e).code();
            }
        }
    }

    if let Err(e) = stream.close() {
        eprintln!("oxipack: {e}");
        return e.code();
    }

    let blocks = stream.blocks_written();
    let bytes_in = stream.bytes_in();
    let mut writer = stream.into_inner();
    if let Err(e) = writer.flush() {
        eprintln!("oxipack: write flush error: {e}");
        return Error::WriteFile(e).code();
    }

    if cli.verbose > 0 && !cli.quiet {
        eprintln!("oxipack: compressed {bytes_in} bytes in {blocks} blocks");
    }
    if cli.json_output {
        let json = serde_json::json!({
            "command": "compress",
            "input_size": bytes_in,
            "blocks": blocks,
            "transform": pipeline_name(&opts.transforms),
            "entropy": opts.entropy.name(),
            "block_size": opts.block_size,
            "jobs": opts.jobs,
        });
        eprintln!("{}", serde_json::to_string_pretty(&json).unwrap());
    }

    0
}

fn cmd_decompress(cli: &Cli, args: &DecompressArgs) -> i32 {
    let opts = DecompressOptions {
        jobs: args.jobs as usize,
        from_block: args.from_block,
        to_block: args.to_block.unwrap_or(u64::MAX),
    };

    let input = args.input.clone().or(args.input_pos.clone());
    let output = args.output.clone().or(args.output_pos.clone());

    let reader = match open_input(&input) {
        Ok(r) => r,
        Err(code) => return code,
    };
    let mut writer = match open_output(&output, cli.force) {
        Ok(w) => w,
        Err(code) => return code,
    };

    let mut stream = match CompressedInputStream::with_options(reader, opts) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("oxipack: {e}");
            return e.code();
        }
    };

    debug!(
        "decompress: transform={} entropy={} block={}",
        pipeline_name(&stream.header().transforms),
        stream.header().entropy.name(),
        stream.header().block_size
    );

    let total = match stream.decompress_to(&mut writer) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("oxipack: {e}");
            return e.code();
        }
    };
    if let Err(e) = writer.flush() {
        eprintln!("oxipack: write flush error: {e}");
        return Error::WriteFile(e).code();
    }

    if cli.verbose > 0 && !cli.quiet {
        eprintln!(
            "oxipack: decompressed {total} bytes from {} blocks",
            stream.blocks_read()
        );
    }
    if cli.json_output {
        let json = serde_json::json!({
            "command": "decompress",
            "output_size": total,
            "blocks": stream.blocks_read(),
        });
        eprintln!("{}", serde_json::to_string_pretty(&json).unwrap());
    }

    0
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let cli = Cli::parse();
    let exit_code = match &cli.command {
        Cmd::Compress(args) => cmd_compress(&cli, args),
        Cmd::Decompress(args) => cmd_decompress(&cli, args),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let argv: Vec<String> = std::iter::once("oxipack".to_string())
            .chain(args.iter().map(|s| s.to_string()))
            .collect();
        Cli::try_parse_from(argv).expect("cli parse failed")
    }

    #[test]
    fn parse_byte_size_suffixes() {
        assert_eq!(parse_byte_size("1").unwrap(), 1);
        assert_eq!(parse_byte_size("2K").unwrap(), 2 * 1024);
        assert_eq!(parse_byte_size("3m").unwrap(), 3 * 1024 * 1024);
        assert_eq!(parse_byte_size("1G").unwrap(), 1024 * 1024 * 1024);
        assert!(parse_byte_size("").is_err());
        assert!(parse_byte_size("x").is_err());
    }

    #[test]
    fn compress_args_map() {
        let cli = parse(&[
            "compress",
            "--level",
            "5",
            "--block-size",
            "1M",
            "--jobs",
            "4",
            "--checksum",
            "in.bin",
            "out.knz",
        ]);
        let Cmd::Compress(args) = &cli.command else {
            panic!("expected compress");
        };
        let opts = build_compress_options(args).unwrap();
        assert_eq!(opts.block_size, 1024 * 1024);
        assert_eq!(opts.jobs, 4);
        assert!(opts.checksum);
        assert_eq!(opts.entropy, EntropyKind::Range);
        assert_eq!(args.input_pos, Some(PathBuf::from("in.bin")));
        assert_eq!(args.output_pos, Some(PathBuf::from("out.knz")));
    }

    #[test]
    fn explicit_pipeline_overrides_level() {
        let cli = parse(&[
            "compress",
            "--level",
            "0",
            "--transform",
            "BWT+MTFT+ZRLT",
            "--entropy",
            "huffman",
            "in",
            "out",
        ]);
        let Cmd::Compress(args) = &cli.command else {
            panic!("expected compress");
        };
        let opts = build_compress_options(args).unwrap();
        assert_eq!(
            opts.transforms,
            vec![TransformKind::Bwt, TransformKind::Mtft, TransformKind::Zrlt]
        );
        assert_eq!(opts.entropy, EntropyKind::Huffman);
    }

    #[test]
    fn unknown_entropy_is_invalid_param() {
        let cli = parse(&["compress", "--entropy", "bogus", "in", "out"]);
        let Cmd::Compress(args) = &cli.command else {
            panic!("expected compress");
        };
        assert!(matches!(
            build_compress_options(args),
            Err(Error::InvalidParam(_))
        ));
    }

    #[test]
    fn decompress_args_map() {
        let cli = parse(&[
            "--quiet",
            "decompress",
            "--jobs",
            "2",
            "--from-block",
            "3",
            "--to-block",
            "7",
            "in.knz",
            "out.bin",
        ]);
        assert!(cli.quiet);
        let Cmd::Decompress(args) = &cli.command else {
            panic!("expected decompress");
        };
        assert_eq!(args.jobs, 2);
        assert_eq!(args.from_block, 3);
        assert_eq!(args.to_block, Some(7));
    }

    #[test]
    fn all_levels_have_valid_presets() {
        for level in 0..=9 {
            let (transforms, entropy) = config_for_level(level);
            assert!(entropy.is_supported());
            // Every preset must be constructible.
            crate::transform::Sequence::new(&transforms).unwrap();
        }
    }
}
