//! Bit-field pack/unpack throughput across field widths (spec §4.2.5).

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use sliderule_membrane::{pack_bit_field, unpack_bit_field};

fn bench_pack(c: &mut Criterion) {
    let widths: &[u32] = &[3, 9, 17, 33, 64];
    let mut group = c.benchmark_group("bitfield_pack");

    for &width in widths {
        let buf_len = ((width as usize + 7) / 8) + 1;
        let mask = if width == 64 { u64::MAX } else { (1u64 << width) - 1 };
        group.bench_with_input(BenchmarkId::new("width_bits", width), &width, |b, &w| {
            let mut buf = vec![0u8; buf_len];
            b.iter(|| {
                pack_bit_field(&mut buf, 0, w, black_box(0xDEAD_BEEF_u64 & mask)).unwrap();
            });
        });
    }
    group.finish();
}

fn bench_unpack(c: &mut Criterion) {
    let widths: &[u32] = &[3, 9, 17, 33, 64];
    let mut group = c.benchmark_group("bitfield_unpack");

    for &width in widths {
        let buf_len = ((width as usize + 7) / 8) + 1;
        let mut buf = vec![0xA5u8; buf_len];
        pack_bit_field(&mut buf, 0, width, 1).unwrap();

        group.bench_with_input(BenchmarkId::new("width_bits", width), &width, |b, &w| {
            b.iter(|| {
                black_box(unpack_bit_field(&buf, 0, w).unwrap());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_pack, bench_unpack);
criterion_main!(benches);
