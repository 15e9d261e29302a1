use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use docsearch_index::{rank, EmbeddingIndex, HashEmbedder, PageEmbedding};

fn build_index(pages: usize, embedder: &HashEmbedder) -> EmbeddingIndex {
    EmbeddingIndex::from_entries((0..pages).map(|i| {
        let text = format!("page {} covers topic {} and section {}", i, i % 17, i % 5);
        PageEmbedding::new(format!("docs/page-{:05}.md", i), embedder.embed_text(&text))
    }))
    .expect("synthetic index is well formed")
}

fn bench_rank(c: &mut Criterion) {
    let embedder = HashEmbedder::default();
    let query = embedder.embed_text("topic 3 section 2");
    let mut group = c.benchmark_group("rank_top5");

    for pages in [100, 1_000, 10_000] {
        let index = build_index(pages, &embedder);
        group.bench_with_input(BenchmarkId::from_parameter(pages), &index, |b, index| {
            b.iter(|| rank(black_box(index), black_box(&query), 5).expect("dimensions match"))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_rank);
criterion_main!(benches);
