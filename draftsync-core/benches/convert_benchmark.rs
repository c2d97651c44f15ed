use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use draftsync_core::{convert_from_raw, convert_to_raw, BlockType, EditorState};

/// A document of `paragraphs` blocks with alternating styles.
fn build_document(paragraphs: usize) -> EditorState {
    let mut editor = EditorState::create_empty();
    for i in 0..paragraphs {
        if i % 2 == 0 {
            editor.toggle_inline_style("BOLD");
        }
        editor
            .insert_text("The quick brown fox jumps over the lazy dog.")
            .unwrap();
        if i % 5 == 0 {
            editor.toggle_block_type(BlockType::HeaderTwo);
        }
        editor.split_block().unwrap();
    }
    editor
}

fn bench_to_raw(c: &mut Criterion) {
    let mut group = c.benchmark_group("Raw Conversion");
    for size in [10usize, 100] {
        let editor = build_document(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(format!("to_raw_{size}_blocks"), |b| {
            b.iter(|| black_box(convert_to_raw(black_box(editor.current_content()))))
        });
    }
    group.finish();
}

fn bench_from_raw(c: &mut Criterion) {
    let mut group = c.benchmark_group("Raw Conversion");
    for size in [10usize, 100] {
        let raw = convert_to_raw(build_document(size).current_content());
        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(format!("from_raw_{size}_blocks"), |b| {
            b.iter(|| black_box(convert_from_raw(black_box(&raw)).unwrap()))
        });
    }
    group.finish();
}

fn bench_json_payload(c: &mut Criterion) {
    let raw = convert_to_raw(build_document(100).current_content());
    c.bench_function("raw_to_json_100_blocks", |b| {
        b.iter(|| black_box(serde_json::to_value(black_box(&raw)).unwrap()))
    });
}

criterion_group!(benches, bench_to_raw, bench_from_raw, bench_json_payload);
criterion_main!(benches);
