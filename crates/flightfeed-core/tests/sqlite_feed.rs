//! Feed driven by an on-disk SQLite database.

use std::sync::Arc;

use chrono::NaiveDate;
use rusqlite::Connection;
use tempfile::TempDir;

use flightfeed_core::{
    Error, Feed, FeedConfig, ManualClock, Poller, RecordSource, SourceQuery, SqliteSource,
    SqliteSourceConfig, TimeCutoff,
};

fn create_db(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("flights.db");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        r#"
        CREATE TABLE flights (
            id INTEGER PRIMARY KEY,
            fl_date TEXT NOT NULL,
            op_carrier TEXT,
            origin TEXT,
            dest TEXT,
            crs_dep_time INTEGER NOT NULL
        );
        INSERT INTO flights VALUES (1, '2018-03-09', 'AA', 'JFK', 'LAX', 545);
        INSERT INTO flights VALUES (2, '2018-03-09', 'DL', 'ATL', 'SEA', 700);
        INSERT INTO flights VALUES (3, '2018-03-09', 'UA', 'SFO', 'ORD', 1015);
        INSERT INTO flights VALUES (4, '2018-03-10', 'WN', 'DAL', 'HOU', 600);
        "#,
    )
    .unwrap();
    path
}

#[tokio::test]
async fn test_poll_replays_dataset_year() {
    let dir = TempDir::new().unwrap();
    let path = create_db(&dir);

    let source = Arc::new(SqliteSource::open(SqliteSourceConfig::new(&path)).unwrap());
    let clock = Arc::new(ManualClock::new(
        NaiveDate::from_ymd_opt(2025, 3, 9)
            .unwrap()
            .and_hms_opt(7, 0, 0)
            .unwrap(),
    ));
    let config = FeedConfig::default();
    let feed = Arc::new(Feed::new(&config));
    let poller = Poller::new(feed.clone(), source.clone(), clock.clone(), &config);

    let outcome = poller.poll().await.unwrap();
    assert_eq!(outcome.delivered, 2);

    let snapshot = feed.snapshot();
    assert_eq!(snapshot[0].get("origin").and_then(|v| v.as_str()), Some("JFK"));
    assert_eq!(snapshot[1].get("crs_dep_time").and_then(|v| v.as_i64()), Some(700));

    clock.advance(chrono::Duration::hours(4));
    let outcome = poller.poll().await.unwrap();
    assert_eq!(outcome.delivered, 1);
    assert_eq!(feed.snapshot().len(), 3);

    source.close();
    assert!(poller.poll().await.is_err());
    assert_eq!(feed.snapshot().len(), 3);
}

#[test]
fn test_open_is_read_only() {
    let dir = TempDir::new().unwrap();
    let path = create_db(&dir);
    let source = SqliteSource::open(SqliteSourceConfig::new(&path)).unwrap();

    let day = NaiveDate::from_ymd_opt(2030, 3, 10).unwrap();
    let rows = source
        .fetch(&SourceQuery::full(day, TimeCutoff::from_hm(23, 59)))
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(source.name(), "sqlite");
}

#[test]
fn test_missing_database_fails() {
    let dir = TempDir::new().unwrap();
    let result = SqliteSource::open(SqliteSourceConfig::new(dir.path().join("absent.db")));
    assert!(matches!(result, Err(Error::Sqlite(_))));
}
