use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use quarry_memory::Document;
use quarry_retrieval::fuse;
use std::hint::black_box;

fn ranked_lists(retrievers: usize, list_len: usize) -> Vec<(f32, Vec<Document>)> {
    (0..retrievers)
        .map(|r| {
            // Lists overlap by half so that deduplication has work to do.
            let docs = (0..list_len)
                .map(|i| Document::new(format!("chunk {} of the corpus", i + r * list_len / 2)))
                .collect();
            (1.0, docs)
        })
        .collect()
}

fn rank_fusion(c: &mut Criterion) {
    let mut group = c.benchmark_group("fuse");

    for (retrievers, list_len) in [(2, 10), (3, 50), (4, 200), (8, 1_000)] {
        let input = ranked_lists(retrievers, list_len);
        group.throughput(Throughput::Elements((retrievers * list_len) as u64));
        group.bench_with_input(
            BenchmarkId::new(format!("{retrievers}x"), list_len),
            &input,
            |b, input| {
                b.iter(|| fuse(black_box(input.clone())));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, rank_fusion);
criterion_main!(benches);
