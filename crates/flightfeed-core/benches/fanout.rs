//! Publish and catch-up throughput.
//!
//! Measures the cost of committing an incremental poll while N subscribers
//! are attached, and of serving catch-up from retained history.

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use flightfeed_core::{
    Feed, FeedConfig, Identifier, Opened, Record, Session, SessionRequest, TimeCutoff,
};
use tokio_util::sync::CancellationToken;

fn bench_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2018, 7, 1).unwrap()
}

fn seeded_feed(records: i64, buffer: usize) -> Feed {
    let feed = Feed::new(&FeedConfig::default().with_subscriber_buffer(buffer));
    let plan = feed.plan_poll(bench_day(), TimeCutoff::from_hm(23, 59));
    feed.apply_poll(plan, (1..=records).map(sample_record).collect());
    feed
}

fn sample_record(id: i64) -> Record {
    Record::new(id)
        .with_field("op_carrier", "AA")
        .with_field("origin", "JFK")
        .with_field("dest", "LAX")
        .with_field("crs_dep_time", 900 + id % 60)
}

fn attach(feed: &Feed, count: usize) -> Vec<Session> {
    (0..count)
        .filter_map(|_| {
            match feed.open_session(SessionRequest::Stream { since: None }, CancellationToken::new()) {
                Opened::Stream(session) => Some(session),
                Opened::Snapshot(_) => None,
            }
        })
        .collect()
}

fn bench_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("fanout/publish");

    for subscribers in [1usize, 64, 1024] {
        group.bench_with_input(
            BenchmarkId::from_parameter(subscribers),
            &subscribers,
            |b, &subscribers| {
                let feed = seeded_feed(1, 1024);
                let mut sessions = attach(&feed, subscribers);
                let mut next_id = 2;

                b.iter(|| {
                    let plan = feed.plan_poll(bench_day(), TimeCutoff::from_hm(23, 59));
                    let outcome = feed.apply_poll(plan, vec![sample_record(next_id)]);
                    next_id += 1;
                    for session in &mut sessions {
                        black_box(session.try_next());
                    }
                    black_box(outcome)
                });
            },
        );
    }

    group.finish();
}

fn bench_catch_up(c: &mut Criterion) {
    let mut group = c.benchmark_group("fanout/catch_up");
    let feed = seeded_feed(20_000, 16);

    for since in [1i64, 10_000, 19_990] {
        group.bench_with_input(BenchmarkId::from_parameter(since), &since, |b, &since| {
            b.iter(|| black_box(feed.catch_up(Some(Identifier::new(since)))));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_publish, bench_catch_up);
criterion_main!(benches);
