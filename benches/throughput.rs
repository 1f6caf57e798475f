use bfifo::OwnedRingBuffer;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn bench_put_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("put_get_roundtrip");

    for size in [16usize, 256, 4096] {
        let src = vec![0x11u8; size];
        let mut dst = vec![0u8; size];
        let mut rb = OwnedRingBuffer::with_capacity(1 << 16).unwrap();
        // start mid-ring so copies regularly take the two-segment path
        rb.set_cursors(7, 7).unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let n = rb.put(black_box(&src));
                rb.get(black_box(&mut dst[..n]))
            })
        });
    }

    group.finish();
}

fn bench_spsc_transfer(c: &mut Criterion) {
    let (mut producer, mut consumer) = OwnedRingBuffer::with_capacity(1 << 16).unwrap().split();
    let src = [0x22u8; 64];
    let mut dst = [0u8; 64];

    c.bench_function("spsc_put_get_64b", |b| {
        b.iter(|| {
            producer.put(black_box(&src));
            consumer.get(black_box(&mut dst))
        })
    });
}

criterion_group!(benches, bench_put_get, bench_spsc_transfer);
criterion_main!(benches);
