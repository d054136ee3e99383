//! Benchmarks for page flattening and visibility.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use instaview::document::{FlattenOptions, Page, Visibility, flatten};

fn bench_flatten_fixture(c: &mut Criterion) {
    let page = Page::from_json(include_str!("../tests/fixtures/page.json")).unwrap();
    c.bench_function("flatten_fixture", |b| {
        b.iter(|| flatten(black_box(&page.blocks), FlattenOptions::default()))
    });
}

fn bench_flatten_large(c: &mut Criterion) {
    let page = Page::from_json(include_str!("../tests/fixtures/page.json")).unwrap();
    let blocks: Vec<_> = page.blocks.iter().cycle().take(page.blocks.len() * 200).cloned().collect();
    c.bench_function("flatten_large", |b| {
        b.iter(|| flatten(black_box(&blocks), FlattenOptions::default()))
    });
}

fn bench_toggle(c: &mut Criterion) {
    let page = Page::from_json(include_str!("../tests/fixtures/page.json")).unwrap();
    let blocks: Vec<_> = page.blocks.iter().cycle().take(page.blocks.len() * 200).cloned().collect();
    let flat = flatten(&blocks, FlattenOptions::default());
    let details: Vec<usize> = flat.details_rows().map(|(id, _)| id).collect();
    c.bench_function("toggle_all_sections", |b| {
        b.iter(|| {
            let mut visibility = Visibility::new(&flat);
            for &id in &details {
                black_box(visibility.toggle(&flat, id));
            }
        })
    });
}

criterion_group!(benches, bench_flatten_fixture, bench_flatten_large, bench_toggle);
criterion_main!(benches);
