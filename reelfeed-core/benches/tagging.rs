use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use reelfeed_core::tagging::{TagExtractor, extract_hashtags};

const TITLE: &str = "周末火锅探店 带着狗去旅行";
const DESCRIPTION: &str = "今天的日常vlog，顺便聊聊AI和编程 #美食 #travel #周末 #Vlog2024";

fn bench_extract_tags(c: &mut Criterion) {
    let extractor = TagExtractor::new();
    c.bench_function("extract_tags_mixed_content", |b| {
        b.iter(|| extractor.extract_tags(black_box(TITLE), black_box(DESCRIPTION)));
    });
}

fn bench_hashtags(c: &mut Criterion) {
    c.bench_function("extract_hashtags", |b| {
        b.iter(|| extract_hashtags(black_box(DESCRIPTION)).count());
    });
}

criterion_group!(benches, bench_extract_tags, bench_hashtags);
criterion_main!(benches);
