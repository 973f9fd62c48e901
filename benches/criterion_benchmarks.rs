use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use oxipack::entropy::EntropyKind;
use oxipack::stream::CompressOptions;
use oxipack::transform::TransformKind;
use std::fs;
use std::path::Path;

fn gen_text(size: usize) -> Vec<u8> {
    let phrase = b"the quick brown fox jumps over the lazy dog. ";
    let mut out = Vec::with_capacity(size);
    let mut state = 0xC0FFEEu64;
    while out.len() < size {
        out.extend_from_slice(phrase);
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        if state & 15 == 0 {
            out.push((state >> 33) as u8);
        }
    }
    out.truncate(size);
    out
}

fn level_options(level: u32) -> CompressOptions {
    let (transforms, entropy) = match level {
        0 => (vec![], EntropyKind::None),
        2 => (vec![TransformKind::Rolz], EntropyKind::None),
        _ => (
            vec![TransformKind::Bwt, TransformKind::Mtft, TransformKind::Zrlt],
            EntropyKind::Ans0,
        ),
    };
    CompressOptions {
        transforms,
        entropy,
        block_size: 1 << 20,
        checksum: false,
        jobs: 1,
    }
}

fn write_ratio_snapshot() {
    let data = gen_text(2 * 1024 * 1024);
    let mut csv = String::from("level,packed_bytes,input_bytes,ratio\n");
    for level in [0u32, 2, 5] {
        let packed = oxipack::compress(&data, level_options(level)).unwrap();
        let ratio = packed.len() as f64 / data.len() as f64;
        csv.push_str(&format!("{level},{},{},{ratio}\n", packed.len(), data.len()));
    }
    let out_dir = Path::new("target/criterion/custom_reports");
    let _ = fs::create_dir_all(out_dir);
    let _ = fs::write(out_dir.join("ratio_snapshot.csv"), csv);
}

fn bench_compress(c: &mut Criterion) {
    write_ratio_snapshot();

    let data = gen_text(1 << 20);
    let mut group = c.benchmark_group("compress");
    group.throughput(Throughput::Bytes(data.len() as u64));

    for level in [0u32, 2, 5] {
        group.bench_with_input(BenchmarkId::new("level", level), &level, |b, &level| {
            b.iter(|| oxipack::compress(black_box(&data), level_options(level)).unwrap());
        });
    }
    group.finish();
}

fn bench_decompress(c: &mut Criterion) {
    let data = gen_text(1 << 20);
    let mut group = c.benchmark_group("decompress");
    group.throughput(Throughput::Bytes(data.len() as u64));

    for level in [2u32, 5] {
        let packed = oxipack::compress(&data, level_options(level)).unwrap();
        group.bench_with_input(BenchmarkId::new("level", level), &packed, |b, packed| {
            b.iter(|| oxipack::decompress(black_box(packed)).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compress, bench_decompress);
criterion_main!(benches);
