// End-to-end scenarios for the full engine: header + block records +
// transforms + entropy, across configurations and job counts.

use oxipack::entropy::EntropyKind;
use oxipack::stream::{CompressOptions, DecompressOptions};
use oxipack::transform::TransformKind;

fn opts(
    transforms: &[TransformKind],
    entropy: EntropyKind,
    block_size: usize,
    checksum: bool,
    jobs: usize,
) -> CompressOptions {
    CompressOptions {
        transforms: transforms.to_vec(),
        entropy,
        block_size,
        checksum,
        jobs,
    }
}

fn roundtrip(data: &[u8], o: CompressOptions) -> Vec<u8> {
    let jobs = o.jobs;
    let packed = oxipack::compress(data, o).expect("compress failed");
    let restored = oxipack::decompress_with(
        &packed,
        DecompressOptions {
            jobs,
            ..Default::default()
        },
    )
    .expect("decompress failed");
    assert_eq!(restored, data, "roundtrip mismatch ({} bytes)", data.len());
    packed
}

fn mixed_data(len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    let mut state = 0xDEADBEEFu64;
    while out.len() < len {
        out.extend_from_slice(b"structured text segment with repetitions, ");
        out.extend_from_slice(&[0u8; 64]);
        for _ in 0..32 {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            out.push((state >> 33) as u8);
        }
    }
    out.truncate(len);
    out
}

// A code-like block: CALL-heavy x86 with zero padding so the detector
// accepts it.
fn synthetic_x86_block(len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    let target = 0x1000i32;
    while out.len() + 32 <= len {
        let rel = target - out.len() as i32;
        out.push(0xE8);
        out.extend_from_slice(&rel.to_le_bytes());
        out.extend_from_slice(&[0x48, 0x89, 0xC7, 0x90]);
        out.extend_from_slice(&[0x00, 0x00, 0x00]);
        out.extend_from_slice(&[0x41, 0x56, 0x53, 0x55, 0x31, 0xED, 0x49]);
    }
    while out.len() < len {
        out.push(0x90);
    }
    out
}

// ---------------------------------------------------------------------------
// Spec scenarios
// ---------------------------------------------------------------------------

#[test]
fn scenario_empty_input() {
    let packed = roundtrip(b"", opts(&[], EntropyKind::None, 65536, false, 1));
    // Header (16 bytes) + terminator.
    assert_eq!(packed.len(), 17);
}

#[test]
fn scenario_single_byte_store() {
    let packed = roundtrip(&[0x41], opts(&[], EntropyKind::None, 1024, false, 1));
    // Header + one tiny record + terminator: a handful of bytes.
    assert!(packed.len() <= 24, "got {}", packed.len());
}

#[test]
fn scenario_zeros_bwt_rlt_ans() {
    let data = vec![0u8; 1 << 20];
    let packed = roundtrip(
        &data,
        opts(
            &[TransformKind::Bwt, TransformKind::Rlt],
            EntropyKind::Ans0,
            4 * 1024 * 1024,
            false,
            1,
        ),
    );
    assert!(packed.len() < 1024, "got {}", packed.len());
}

#[test]
fn scenario_abracadabra_bwt() {
    let data: Vec<u8> = b"abracadabra".iter().copied().cycle().take(65536).collect();
    let packed = roundtrip(
        &data,
        opts(
            &[TransformKind::Bwt, TransformKind::Mtft, TransformKind::Zrlt],
            EntropyKind::Range,
            65536,
            true,
            1,
        ),
    );
    assert!(packed.len() < data.len() / 4, "got {}", packed.len());
}

#[test]
fn scenario_exe_improves_compression() {
    let data = synthetic_x86_block(1 << 20);

    let with_exe = roundtrip(
        &data,
        opts(
            &[TransformKind::Exe, TransformKind::Bwt],
            EntropyKind::Huffman,
            1 << 20,
            false,
            1,
        ),
    );
    let without_exe = roundtrip(
        &data,
        opts(
            &[TransformKind::Bwt],
            EntropyKind::Huffman,
            1 << 20,
            false,
            1,
        ),
    );
    assert!(
        with_exe.len() < without_exe.len(),
        "exe {} vs baseline {}",
        with_exe.len(),
        without_exe.len()
    );
}

#[test]
fn scenario_rolzx_random_block() {
    let mut state = 0x0BADF00Du64;
    let data: Vec<u8> = (0..2 << 20)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            (state >> 33) as u8
        })
        .collect();
    let packed = roundtrip(
        &data,
        opts(&[TransformKind::Rolzx], EntropyKind::None, 4 << 20, false, 1),
    );
    // Incompressible input: stored raw with only framing overhead, and the
    // length fields account for every payload byte.
    assert!(packed.len() >= data.len());
    assert!(packed.len() < data.len() + 64, "got {}", packed.len());
}

// ---------------------------------------------------------------------------
// Cross-configuration matrix
// ---------------------------------------------------------------------------

#[test]
fn matrix_pipelines_and_entropy() {
    let data = mixed_data(120_000);
    let pipelines: &[&[TransformKind]] = &[
        &[],
        &[TransformKind::Rolz],
        &[TransformKind::Rolzx],
        &[TransformKind::Rlt],
        &[TransformKind::Bwt, TransformKind::Mtft, TransformKind::Zrlt],
        &[
            TransformKind::Exe,
            TransformKind::Utf,
            TransformKind::Bwt,
            TransformKind::Mtft,
            TransformKind::Zrlt,
        ],
    ];
    let entropies = [
        EntropyKind::None,
        EntropyKind::Huffman,
        EntropyKind::Ans0,
        EntropyKind::Range,
    ];

    for pipeline in pipelines {
        for &entropy in &entropies {
            roundtrip(&data, opts(pipeline, entropy, 65536, true, 2));
        }
    }
}

#[test]
fn output_deterministic_across_jobs() {
    let data = mixed_data(400_000);
    let mut outputs = Vec::new();
    for jobs in [1usize, 2, 4] {
        let packed = oxipack::compress(
            &data,
            opts(
                &[TransformKind::Bwt, TransformKind::Mtft, TransformKind::Zrlt],
                EntropyKind::Huffman,
                65536,
                true,
                jobs,
            ),
        )
        .unwrap();
        outputs.push(packed);
    }
    assert_eq!(outputs[0], outputs[1]);
    assert_eq!(outputs[0], outputs[2]);
}

#[test]
fn block_sizes_and_partial_tail() {
    // Exercise block boundaries: exact multiple, off-by-one, single byte
    // over.
    let base = mixed_data(3 * 65536);
    for extra in [0usize, 1, 65535] {
        let data = &base[..2 * 65536 + extra];
        roundtrip(
            data,
            opts(&[TransformKind::Rolz], EntropyKind::Huffman, 65536, true, 2),
        );
    }
}

#[test]
fn skip_mask_reflects_declined_transforms() {
    // Random data declines ROLZ but the stream still roundtrips, storing
    // blocks raw or transform-skipped.
    let mut state = 5u64;
    let data: Vec<u8> = (0..100_000)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            (state >> 33) as u8
        })
        .collect();
    roundtrip(
        &data,
        opts(&[TransformKind::Rolz], EntropyKind::Huffman, 65536, true, 1),
    );
}

#[test]
fn unsupported_entropy_in_config_fails_creation() {
    let err = oxipack::compress(
        b"x",
        opts(&[], EntropyKind::Tpaq, 65536, false, 1),
    )
    .unwrap_err();
    assert!(matches!(err, oxipack::Error::CreateCompressor(_)));
}

#[test]
fn bwt_with_oversized_block_fails_creation() {
    let err = oxipack::compress(
        b"x",
        opts(&[TransformKind::Bwt], EntropyKind::None, 64 << 20, false, 1),
    )
    .unwrap_err();
    assert!(matches!(err, oxipack::Error::CreateCompressor(_)));
}

#[test]
fn utf_pipeline_on_text() {
    let text = "déjà vu — παράδειγμα 例文 🚀 ".repeat(4000);
    let data = text.as_bytes();
    let packed = roundtrip(
        data,
        opts(
            &[TransformKind::Utf, TransformKind::Bwt, TransformKind::Mtft, TransformKind::Zrlt],
            EntropyKind::Ans0,
            1 << 20,
            true,
            1,
        ),
    );
    assert!(packed.len() < data.len() / 2, "got {}", packed.len());
}
