use criterion::{criterion_group, criterion_main, Criterion};
use multi_clipboards::clipboard::{formats, ClipboardFormat};
use multi_clipboards::history::ClipboardHistory;
use multi_clipboards::snapshot::ClipboardSnapshot;

fn sample_snapshot(i: usize) -> ClipboardSnapshot {
    ClipboardSnapshot::from_formats(vec![
        ClipboardFormat::unicode_text(&format!("clipboard entry {i} {}", "x".repeat(200))),
        ClipboardFormat::new(formats::HTML, format!("<p>entry {i}</p>").into_bytes()),
    ])
}

/// Steady state: every push evicts the oldest entry.
fn bench_history_push(c: &mut Criterion) {
    let snapshots: Vec<ClipboardSnapshot> = (0..64).map(sample_snapshot).collect();
    let mut history = ClipboardHistory::new(20);
    c.bench_function("history_push_evict", |b| {
        let mut i = 0;
        b.iter(|| {
            history.push(snapshots[i % snapshots.len()].clone());
            i += 1;
        })
    });
}

fn bench_preview(c: &mut Criterion) {
    let snapshot = sample_snapshot(1);
    c.bench_function("snapshot_preview", |b| b.iter(|| snapshot.preview()));
}

criterion_group!(benches, bench_history_push, bench_preview);
criterion_main!(benches);
