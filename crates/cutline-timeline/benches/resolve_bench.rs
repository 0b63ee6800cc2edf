//! Benchmarks for active-clip resolution.
//!
//! Run with: cargo bench -p cutline-timeline

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use cutline_core::FrameRate;
use cutline_timeline::{upcoming_assets, Clip, TimelineSnapshot, Track};

fn dense_timeline() -> TimelineSnapshot {
    let tracks: Vec<Track> = (0..8).map(|i| Track::new(format!("V{i}"), i)).collect();
    let clips: Vec<Clip> = tracks
        .iter()
        .flat_map(|track| {
            (0..250u64).map(move |n| {
                Clip::new(track.id, format!("asset-{}", n % 40).as_str(), n * 120, 120)
            })
        })
        .collect();
    TimelineSnapshot::new(FrameRate::FPS_30, tracks, clips)
}

fn bench_resolve_active(c: &mut Criterion) {
    let snapshot = dense_timeline();

    c.bench_function("resolve_active_8_tracks_2000_clips", |bencher| {
        bencher.iter(|| black_box(snapshot.active_at(black_box(15_061))).len());
    });
}

fn bench_upcoming(c: &mut Criterion) {
    let snapshot = dense_timeline();

    c.bench_function("upcoming_assets_2s_horizon", |bencher| {
        bencher.iter(|| upcoming_assets(&snapshot, black_box(15_061), black_box(60)));
    });
}

criterion_group!(benches, bench_resolve_active, bench_upcoming);
criterion_main!(benches);
