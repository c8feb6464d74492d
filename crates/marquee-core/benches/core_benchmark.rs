//! Benchmark tests for marquee-core operations
//!
//! Run with: cargo bench -p marquee-core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::{Duration, Instant};

use marquee_core::catalog::streams_from_json;
use marquee_core::presentation::{transition, Affordances, PresentationMachine};
use marquee_core::types::*;
use marquee_core::{format_clock, Catalog, ChromeOverlay};

// ============================================================================
// Helpers
// ============================================================================

fn generate_timeline(len: usize) -> Vec<(PlaybackEvent, PlayerStatus)> {
    let idle = PlayerStatus::default();
    let ad = PlayerStatus {
        ad_playing: true,
        ..idle
    };
    let cycle = [
        (PlaybackEvent::SourceChange, idle),
        (PlaybackEvent::Play, idle),
        (PlaybackEvent::Waiting, idle),
        (PlaybackEvent::ReadyStateChange { has_enough_data: true }, idle),
        (PlaybackEvent::Playing, idle),
        (PlaybackEvent::TimeUpdate { current_time: 4.0, is_seeking: false }, idle),
        (PlaybackEvent::AdBreakBegin, ad),
        (PlaybackEvent::Pause, ad),
        (PlaybackEvent::Play, ad),
        (PlaybackEvent::AdBreakEnd, idle),
        (PlaybackEvent::Playing, idle),
        (PlaybackEvent::Ended, idle),
    ];
    cycle.iter().cloned().cycle().take(len).collect()
}

fn generate_catalog(items: usize) -> String {
    let vods: Vec<String> = (0..items)
        .map(|i| {
            format!(
                r#"{{ "name": "Title {i}", "description": "Episode {i}",
                     "imageUrl": "https://img.example.com/{i}.jpg",
                     "videoSource": "https://cdn.example.com/vod/{i}/index.m3u8" }}"#
            )
        })
        .collect();
    format!(
        r#"{{ "config": {{ "live": {{ "channels": [] }}, "onDemand": {{ "vods": [{}] }} }} }}"#,
        vods.join(",")
    )
}

// ============================================================================
// Presentation Benchmarks
// ============================================================================

fn bench_transition(c: &mut Criterion) {
    let mut group = c.benchmark_group("Presentation Transition");
    let status = PlayerStatus::default();

    group.bench_function("play_from_initial", |b| {
        b.iter(|| {
            transition(
                black_box(PresentationState::Initial),
                black_box(&PlaybackEvent::Play),
                black_box(&status),
            )
        });
    });

    group.bench_function("time_update", |b| {
        let event = PlaybackEvent::TimeUpdate {
            current_time: 120.0,
            is_seeking: false,
        };
        b.iter(|| transition(black_box(PresentationState::Playing), black_box(&event), &status));
    });

    group.bench_function("affordances_all_states", |b| {
        b.iter(|| {
            for state in PresentationState::ALL {
                black_box(Affordances::for_state(black_box(state)));
            }
        });
    });

    group.finish();
}

fn bench_timeline_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("Timeline Replay");

    for &len in &[12, 120, 1200] {
        let timeline = generate_timeline(len);
        group.bench_with_input(
            BenchmarkId::new("machine_apply", format!("{}_events", len)),
            &timeline,
            |b, timeline| {
                b.iter(|| {
                    let mut machine = PresentationMachine::new();
                    for (event, status) in timeline {
                        black_box(machine.apply(event, status));
                    }
                    machine.state()
                });
            },
        );
    }

    group.finish();
}

// ============================================================================
// Chrome Benchmarks
// ============================================================================

fn bench_chrome(c: &mut Criterion) {
    let mut group = c.benchmark_group("Chrome Overlay");

    group.bench_function("format_clock", |b| {
        b.iter(|| format_clock(black_box(3725.4), black_box(true)));
    });

    group.bench_function("progress_label", |b| {
        let mut overlay = ChromeOverlay::new(&ChromeConfig::default());
        overlay.set_duration(5400.0);
        overlay.set_current_time(1234.0);
        b.iter(|| black_box(overlay.progress_label()));
    });

    group.bench_function("poll_countdown", |b| {
        let start = Instant::now();
        let mut overlay = ChromeOverlay::new(&ChromeConfig::default());
        b.iter(|| {
            overlay.set_state(PresentationState::Playing, start);
            black_box(overlay.poll(start + Duration::from_secs(6)))
        });
    });

    group.finish();
}

// ============================================================================
// Catalog Benchmarks
// ============================================================================

fn bench_catalog_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("Catalog Parsing");

    for &items in &[10, 100, 500] {
        let json = generate_catalog(items);
        group.bench_with_input(
            BenchmarkId::new("from_json", format!("{}_items", items)),
            &json,
            |b, json| {
                b.iter(|| Catalog::from_json(black_box(json)).map(|c| c.len()));
            },
        );
    }

    group.bench_function("stream_source_with_drm", |b| {
        let streams = streams_from_json(
            r#"[{ "title": "Apple FairPlay", "url": "https://fps.ezdrm.com/demo/video/ezdrm.m3u8",
                  "drm": { "type": "ezdrm",
                           "licenseUrl": "https://fps.ezdrm.com/api/licenses/09cc0377",
                           "certificateUrl": "https://fps.ezdrm.com/demo/video/eleisure.cer" } }]"#,
        )
        .unwrap();
        b.iter(|| black_box(&streams[0]).source());
    });

    group.finish();
}

criterion_group!(
    presentation_benches,
    bench_transition,
    bench_timeline_replay,
);

criterion_group!(
    chrome_benches,
    bench_chrome,
);

criterion_group!(
    catalog_benches,
    bench_catalog_parsing,
);

criterion_main!(
    presentation_benches,
    chrome_benches,
    catalog_benches,
);
