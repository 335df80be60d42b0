//! Criterion benchmarks for container header synthesis.
//!
//! Header synthesis runs once per saved clip, but the stsz table scales
//! with clip length — a one-hour clip is ~126k frames.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use trimtone::{Atom, StreamPlan, mp4_header, wav_header};

fn plan_with_frames(frames: usize) -> StreamPlan {
    let mut plan = StreamPlan::new(44_100, 2, 128_000);
    plan.push_frame(2);
    for index in 0..frames {
        plan.push_frame(200 + (index % 64) as u32);
    }
    plan
}

fn bench_mp4_header(c: &mut Criterion) {
    let short = plan_with_frames(1_300); // ~30 s clip
    let long = plan_with_frames(126_000); // ~1 h clip

    c.bench_function("mp4_header_30s", |b| {
        b.iter(|| mp4_header(black_box(&short)).unwrap())
    });
    c.bench_function("mp4_header_1h", |b| {
        b.iter(|| mp4_header(black_box(&long)).unwrap())
    });
}

fn bench_wav_header(c: &mut Criterion) {
    c.bench_function("wav_header", |b| {
        b.iter(|| wav_header(black_box(44_100), black_box(2), black_box(88_200)))
    });
}

fn bench_atom_serialization(c: &mut Criterion) {
    let mut root = Atom::container(*b"moov");
    for _ in 0..16 {
        let mut child = Atom::container(*b"trak");
        child.push_child(Atom::full_leaf(*b"tkhd", 0, 7, vec![0u8; 80]));
        child.push_child(Atom::leaf(*b"mdat", vec![0u8; 4096]));
        root.push_child(child);
    }

    c.bench_function("atom_tree_to_bytes", |b| {
        b.iter(|| black_box(&root).to_bytes())
    });
}

criterion_group!(
    benches,
    bench_mp4_header,
    bench_wav_header,
    bench_atom_serialization,
);
criterion_main!(benches);
