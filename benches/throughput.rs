use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use emberlog::{Broker, Message};
use std::sync::Arc;

fn bench_produce(c: &mut Criterion) {
    let mut group = c.benchmark_group("produce");
    for size in [128usize, 1024usize, 4096usize] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let broker = Arc::new(Broker::new());
            broker.create_topic("bench", 4).unwrap();
            let payload = vec![7u8; size];
            let mut i = 0u64;

            b.iter(|| {
                i += 1;
                let msg = Message::new(payload.clone()).with_key(i.to_be_bytes().to_vec());
                let _ = broker.produce("bench", msg).unwrap();
            });
        });
    }
    group.finish();
}

fn bench_consume(c: &mut Criterion) {
    let mut group = c.benchmark_group("consume");

    let broker = Arc::new(Broker::new());
    broker.create_topic("bench", 1).unwrap();
    for i in 0..2000 {
        let payload = format!("event-{}", i).into_bytes();
        let _ = broker.produce("bench", Message::new(payload)).unwrap();
    }

    for records in [10usize, 100usize, 500usize] {
        group.throughput(Throughput::Elements(records as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(records),
            &records,
            |b, &records| {
                b.iter(|| {
                    let out = broker.consume("bench", 0, 0, records).unwrap();
                    assert_eq!(out.len(), records);
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_produce, bench_consume);
criterion_main!(benches);
