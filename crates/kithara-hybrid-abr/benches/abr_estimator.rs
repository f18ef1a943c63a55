#![forbid(unsafe_code)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use kithara_hybrid_abr::{
    AbortReason, AbrConfig, AbrLogger, BandwidthHistory, FragmentDownload, HybridAbrController,
    LowLatencySpeedTracker, PlaybackState, Profile, outlier_adjusted_mean,
};

fn profiles() -> Vec<Profile> {
    vec![
        Profile::new(256_000, 416, 234),
        Profile::new(512_000, 640, 360),
        Profile::new(1_024_000, 960, 540),
        Profile::new(2_048_000, 1280, 720),
        Profile::new(4_096_000, 1920, 1080),
        Profile::iframe(128_000, 640, 360),
        Profile::iframe(256_000, 1280, 720),
    ]
}

fn download(bytes: u64, download_time_ms: u64) -> FragmentDownload {
    FragmentDownload {
        bytes,
        download_time_ms,
        fragment_duration_ms: 4_000,
        abort_reason: AbortReason::None,
    }
}

fn bench_history_push_and_estimate(c: &mut Criterion) {
    let mut group = c.benchmark_group("abr_history_push_and_estimate");

    for cache_length in [3_usize, 10, 32] {
        group.bench_with_input(
            BenchmarkId::new("cache_length", cache_length),
            &cache_length,
            |b, &cache_length| {
                let cfg = AbrConfig::default().with_cache_length(cache_length);
                b.iter(|| {
                    let mut history = BandwidthHistory::new(&cfg);
                    for i in 0..64_u64 {
                        history.update_by_cache_length(1_000_000 + i * 10_000, false);
                    }
                    black_box(history.estimate())
                });
            },
        );
    }

    group.finish();
}

fn bench_outlier_mean(c: &mut Criterion) {
    let values: Vec<u64> = (0..32_u64).map(|i| 2_000_000 + (i * 7_919) % 500_000).collect();
    c.bench_function("abr_outlier_adjusted_mean_32", |b| {
        b.iter(|| black_box(outlier_adjusted_mean(values.clone(), 250_000)));
    });
}

fn bench_low_latency_tracker(c: &mut Criterion) {
    c.bench_function("abr_low_latency_progress_64", |b| {
        b.iter(|| {
            let mut tracker = LowLatencySpeedTracker::new();
            let mut last = None;
            for step in 0..64_i64 {
                let bytes = u64::try_from(step).unwrap_or(0) * 25_000;
                last = tracker.record_progress(step * 150, bytes).or(last);
            }
            black_box(last)
        });
    });
}

fn bench_controller_decide(c: &mut Criterion) {
    let mut group = c.benchmark_group("abr_controller_decide");

    for (label, bytes, duration_ms) in [
        ("up_switch_pressure", 2_000_000, 1_000_u64),
        ("stable_mid", 512_000, 1_000_u64),
        ("down_switch_pressure", 64_000, 1_000_u64),
    ] {
        group.bench_with_input(
            BenchmarkId::new("decide", label),
            &(bytes, duration_ms),
            |b, &(bytes, duration_ms)| {
                b.iter(|| {
                    let mut controller = HybridAbrController::new(AbrConfig::default())
                        .expect("valid config")
                        .with_logger(AbrLogger::disabled());
                    controller.set_profiles(profiles());
                    let mut current = 2;
                    for _ in 0..8 {
                        controller.record_fragment_download(download(bytes, duration_ms), current);
                        let state = PlaybackState::new(current)
                            .with_fetched_secs(30.0)
                            .with_buffer_secs(12.0);
                        current = controller.decide(&state).target_profile;
                    }
                    black_box(current)
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_history_push_and_estimate,
    bench_outlier_mean,
    bench_low_latency_tracker,
    bench_controller_decide
);
criterion_main!(benches);
