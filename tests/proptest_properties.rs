use oxipack::entropy::EntropyKind;
use oxipack::stream::{CompressOptions, DecompressOptions};
use oxipack::transform::TransformKind;
use proptest::prelude::*;

fn pipeline_strategy() -> impl Strategy<Value = Vec<TransformKind>> {
    prop_oneof![
        Just(vec![]),
        Just(vec![TransformKind::Rolz]),
        Just(vec![TransformKind::Rolzx]),
        Just(vec![TransformKind::Rlt]),
        Just(vec![
            TransformKind::Bwt,
            TransformKind::Mtft,
            TransformKind::Zrlt
        ]),
    ]
}

fn entropy_strategy() -> impl Strategy<Value = EntropyKind> {
    prop_oneof![
        Just(EntropyKind::None),
        Just(EntropyKind::Huffman),
        Just(EntropyKind::Ans0),
        Just(EntropyKind::Range),
    ]
}

proptest! {
    #[test]
    fn prop_engine_roundtrip(
        data in proptest::collection::vec(any::<u8>(), 0..4096),
        transforms in pipeline_strategy(),
        entropy in entropy_strategy(),
        jobs in 1usize..=2
    ) {
        let packed = oxipack::compress(
            &data,
            CompressOptions {
                transforms,
                entropy,
                block_size: 1024,
                checksum: true,
                jobs,
            },
        )
        .unwrap();
        let restored = oxipack::decompress_with(
            &packed,
            DecompressOptions { jobs, ..Default::default() },
        )
        .unwrap();
        prop_assert_eq!(restored, data);
    }

    #[test]
    fn prop_compress_is_deterministic(
        data in proptest::collection::vec(any::<u8>(), 0..4096),
    ) {
        let o = || CompressOptions {
            transforms: vec![TransformKind::Rolz],
            entropy: EntropyKind::Huffman,
            block_size: 1024,
            checksum: true,
            jobs: 2,
        };
        let a = oxipack::compress(&data, o()).unwrap();
        let b = oxipack::compress(&data, o()).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_bwt_output_is_permutation(
        data in proptest::collection::vec(any::<u8>(), 2..2000),
    ) {
        use oxipack::slice::SliceArray;
        use oxipack::transform::Bwt;

        let mut bwt = Bwt::new();
        let mut src = data.clone();
        let mut dst = vec![0u8; data.len()];
        let mut input = SliceArray::new(&mut src);
        let mut output = SliceArray::new(&mut dst);
        prop_assert!(bwt.forward(&mut input, &mut output, data.len()).unwrap());

        let mut h1 = [0u32; 256];
        let mut h2 = [0u32; 256];
        for &b in &data {
            h1[b as usize] += 1;
        }
        for &b in &dst {
            h2[b as usize] += 1;
        }
        prop_assert_eq!(h1.as_slice(), h2.as_slice());
    }

    #[test]
    fn prop_repetitive_data_shrinks(
        seed in proptest::collection::vec(any::<u8>(), 16..64),
    ) {
        // Any short phrase repeated to 64 KiB compresses well.
        let data: Vec<u8> = seed.iter().copied().cycle().take(65536).collect();
        let packed = oxipack::compress(
            &data,
            CompressOptions {
                transforms: vec![TransformKind::Rolz],
                entropy: EntropyKind::None,
                block_size: 65536,
                checksum: false,
                jobs: 1,
            },
        )
        .unwrap();
        prop_assert!(packed.len() < data.len() / 2);
    }
}

#[test]
fn truncation_never_panics() {
    let data: Vec<u8> = b"payload for truncation testing "
        .iter()
        .copied()
        .cycle()
        .take(20_000)
        .collect();
    let packed = oxipack::compress(
        &data,
        CompressOptions {
            transforms: vec![TransformKind::Rolz],
            entropy: EntropyKind::Huffman,
            block_size: 4096,
            checksum: true,
            jobs: 1,
        },
    )
    .unwrap();

    // Every prefix either fails cleanly or returns data; it must not panic.
    for cut in (0..packed.len()).step_by(61) {
        let _ = oxipack::decompress(&packed[..cut]);
    }
}

#[test]
fn bitflips_never_panic() {
    let data: Vec<u8> = b"payload for corruption testing "
        .iter()
        .copied()
        .cycle()
        .take(20_000)
        .collect();
    let packed = oxipack::compress(
        &data,
        CompressOptions {
            transforms: vec![TransformKind::Bwt, TransformKind::Mtft, TransformKind::Zrlt],
            entropy: EntropyKind::Ans0,
            block_size: 4096,
            checksum: true,
            jobs: 1,
        },
    )
    .unwrap();

    for pos in (17..packed.len()).step_by(97) {
        let mut corrupted = packed.clone();
        corrupted[pos] ^= 0x40;
        let _ = oxipack::decompress(&corrupted);
    }
}
