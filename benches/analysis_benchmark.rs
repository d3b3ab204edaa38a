/// Benchmarks for folding statistics payloads and building calendar grids.
use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use contrib_calendar::analysis::{rank_contributors, ActivityAggregator, CalendarGridBuilder};
use contrib_calendar::plotting::{render_calendar_svg, CalendarStyle, CalendarTheme};
use serde_json::{json, Value};

const WEEK_SECONDS: i64 = 7 * 86_400;
/// Sunday, 2023-06-18
const FIRST_WEEK: i64 = 1_687_046_400;

/// A contributors payload with `authors` authors, each active every week of the year.
fn contributors_payload(repo_index: usize, authors: usize) -> Value {
    let records: Vec<Value> = (0..authors)
        .map(|author| {
            let weeks: Vec<Value> = (0..52)
                .map(|week| {
                    json!({
                        "w": FIRST_WEEK + week as i64 * WEEK_SECONDS,
                        "c": (author + week + repo_index) % 13,
                    })
                })
                .collect();
            json!({
                "author": {"login": format!("user-{}", author)},
                "weeks": weeks,
            })
        })
        .collect();
    Value::Array(records)
}

fn bench_aggregation(c: &mut Criterion) {
    let payloads: Vec<(String, Value)> = (0..20)
        .map(|i| (format!("repo-{}", i), contributors_payload(i, 25)))
        .collect();

    c.bench_function("fold_20_repositories", |b| {
        b.iter(|| {
            let mut aggregator = ActivityAggregator::new();
            for (repo, payload) in &payloads {
                aggregator.fold_repository(repo, black_box(payload));
            }
            aggregator
        })
    });

    let mut aggregator = ActivityAggregator::new();
    for (repo, payload) in &payloads {
        aggregator.fold_repository(repo, payload);
    }
    c.bench_function("rank_contributors", |b| {
        b.iter(|| rank_contributors(black_box(aggregator.contributors())).len())
    });
}

fn bench_calendar(c: &mut Criterion) {
    let mut aggregator = ActivityAggregator::new();
    aggregator.fold_repository("repo", &contributors_payload(0, 25));
    let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
    let builder = CalendarGridBuilder::new(today);

    c.bench_function("build_calendar_grid", |b| {
        b.iter(|| builder.build(black_box(aggregator.global_activity())))
    });

    let grid = builder.build(aggregator.global_activity());
    let theme = CalendarTheme::default();
    let style = CalendarStyle::default();
    c.bench_function("render_calendar_svg", |b| {
        b.iter(|| render_calendar_svg(black_box(&grid), &theme, &style).map(|svg| svg.len()))
    });
}

criterion_group!(benches, bench_aggregation, bench_calendar);
criterion_main!(benches);
