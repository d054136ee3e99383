//! Benchmarks for fragment search.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use instaview::document::{FlattenOptions, Page, flatten};
use instaview::search::find_matches;

fn bench_search_fixture(c: &mut Criterion) {
    let page = Page::from_json(include_str!("../tests/fixtures/page.json")).unwrap();
    let flat = flatten(&page.blocks, FlattenOptions::default());
    c.bench_function("search_fixture", |b| {
        b.iter(|| find_matches(black_box(flat.fragments()), black_box("ridge")))
    });
}

fn bench_search_large(c: &mut Criterion) {
    let page = Page::from_json(include_str!("../tests/fixtures/page.json")).unwrap();
    let blocks: Vec<_> = page.blocks.iter().cycle().take(page.blocks.len() * 500).cloned().collect();
    let flat = flatten(&blocks, FlattenOptions::default());
    c.bench_function("search_large", |b| {
        b.iter(|| find_matches(black_box(flat.fragments()), black_box("notes")))
    });
}

criterion_group!(benches, bench_search_fixture, bench_search_large);
criterion_main!(benches);
