//! Benchmarks for title scoring and episode row location.
//!
//! A search scores every candidate post, so scoring cost scales with the
//! number of hits the index site returns.
//!
//! Run with: `cargo bench --bench matcher_bench`

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use esolve::locator::locate;
use esolve::matcher::{score, sequence_ratio, TitleQuery};

// ---------------------------------------------------------------------------
// Datasets
// ---------------------------------------------------------------------------

/// Post titles as the index site renders them.
const CANDIDATES: &[&str] = &[
    "Good Trouble",
    "Good Trouble &#8211; Stagione 5",
    "The Good Doctor",
    "Trouble in Paradise",
    "Good Omens",
    "Chief of War",
    "The War Begins",
    "Dune: Prophecy",
    "Grey&#8217;s Anatomy",
    "La casa di carta (Money Heist)",
];

fn post_body(rows: usize) -> String {
    let mut body = String::from("<p>Good Trouble (2019)</p>\n");
    for season in 1..=5 {
        body.push_str(&format!("<p>Stagione {season}<br />\n"));
        for episode in 1..=rows {
            body.push_str(&format!(
                "{season}&#215;{episode:02} Episodio – <a href=\"https://clicka.test/d/{season}{episode:02}\">DeltaBit</a> | <a href=\"https://clicka.test/m/{season}{episode:02}\">MixDrop</a><br />\n"
            ));
        }
        body.push_str("</p>\n");
    }
    body
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_score(c: &mut Criterion) {
    let mut group = c.benchmark_group("title_score");
    let multi = TitleQuery::new("Good Trouble", 2019);
    let single = TitleQuery::new("Dune", 2021);

    group.bench_function("multi_token", |b| {
        b.iter(|| {
            for title in CANDIDATES {
                black_box(score(black_box(&multi), black_box(title)));
            }
        });
    });

    group.bench_function("single_token", |b| {
        b.iter(|| {
            for title in CANDIDATES {
                black_box(score(black_box(&single), black_box(title)));
            }
        });
    });

    group.finish();
}

fn bench_sequence_ratio(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequence_ratio");

    group.bench_function("short", |b| {
        b.iter(|| black_box(sequence_ratio(black_box("good trouble"), black_box("good trouble stagione 5"))));
    });

    let long_a = "the lord of the rings the rings of power stagione 2 episodio finale";
    let long_b = "lord of the rings gli anelli del potere stagione 2 sub ita";
    group.bench_function("long", |b| {
        b.iter(|| black_box(sequence_ratio(black_box(long_a), black_box(long_b))));
    });

    group.finish();
}

fn bench_locate(c: &mut Criterion) {
    let mut group = c.benchmark_group("episode_locate");
    let body = post_body(20);

    group.bench_function("hit", |b| {
        b.iter(|| black_box(locate(black_box(&body), 4, "05")));
    });

    group.bench_function("miss", |b| {
        b.iter(|| black_box(locate(black_box(&body), 9, "05")));
    });

    group.finish();
}

criterion_group!(benches, bench_score, bench_sequence_ratio, bench_locate);
criterion_main!(benches);
