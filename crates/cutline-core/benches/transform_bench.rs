//! Benchmarks for cutline-core transform resolution.
//!
//! Run with: cargo bench -p cutline-core

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use cutline_core::{
    resolve_transform, transition_multiplier, ClipWindow, Easing, FrameRate, Keyframe,
    PartialTransform, RationalTime, Transition, TransformState,
};

fn bench_frame_conversion(c: &mut Criterion) {
    let rate = FrameRate::FPS_29_97;

    c.bench_function("frames_to_seconds_1hr", |bencher| {
        bencher.iter(|| black_box(rate).frames_to_seconds(black_box(107_892)));
    });

    c.bench_function("from_frames_86400", |bencher| {
        bencher.iter(|| RationalTime::from_frames(black_box(86_400), black_box(rate)));
    });
}

fn bench_keyframe_resolution(c: &mut Criterion) {
    let base = TransformState::IDENTITY;
    let keyframes: Vec<Keyframe> = (0..100)
        .map(|i| {
            let easing = if i % 2 == 0 {
                Easing::Linear
            } else {
                Easing::EaseInOut
            };
            let transform = PartialTransform {
                opacity: Some((i as f32 * 0.1).sin().abs()),
                rotation: Some(i as f32),
                ..Default::default()
            };
            Keyframe::with_easing(i * 10, transform, easing)
        })
        .collect();

    c.bench_function("resolve_transform_100kf", |bencher| {
        bencher.iter(|| resolve_transform(&base, &keyframes, black_box(505)));
    });

    c.bench_function("resolve_transform_static", |bencher| {
        bencher.iter(|| resolve_transform(&base, &[], black_box(505)));
    });
}

fn bench_transition_overlay(c: &mut Criterion) {
    let window = ClipWindow::new(100, 300);
    let fade = Transition::fade(15);

    c.bench_function("transition_multiplier_in_window", |bencher| {
        bencher.iter(|| transition_multiplier(&window, Some(&fade), Some(&fade), black_box(107)));
    });
}

criterion_group!(
    benches,
    bench_frame_conversion,
    bench_keyframe_resolution,
    bench_transition_overlay,
);
criterion_main!(benches);
