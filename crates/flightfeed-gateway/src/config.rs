//! Gateway configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use flightfeed_core::source::{DEFAULT_DATASET_YEAR, DEFAULT_TABLE};
use flightfeed_core::{FeedConfig, SqliteSourceConfig};

/// Flightfeed gateway command line arguments.
#[derive(Debug, Parser)]
#[command(name = "flightfeed-gateway")]
#[command(about = "Live, resumable feed of scheduled departures over HTTP")]
pub struct Args {
    /// Address to listen on for HTTP requests.
    #[arg(short, long, env = "FLIGHTFEED_LISTEN", default_value = "127.0.0.1:7999")]
    pub listen: String,

    /// SQLite database holding the schedule. Opened read-only.
    #[arg(long, env = "FLIGHTFEED_DB", default_value = "flights.db")]
    pub db: PathBuf,

    /// Table holding scheduled records.
    #[arg(long, env = "FLIGHTFEED_TABLE", default_value = DEFAULT_TABLE)]
    pub table: String,

    /// Identifier column.
    #[arg(long, env = "FLIGHTFEED_ID_COLUMN", default_value = "id")]
    pub id_column: String,

    /// Date column (`YYYY-MM-DD` text).
    #[arg(long, env = "FLIGHTFEED_DATE_COLUMN", default_value = "fl_date")]
    pub date_column: String,

    /// Scheduled time column (`HHMM` integer).
    #[arg(long, env = "FLIGHTFEED_TIME_COLUMN", default_value = "crs_dep_time")]
    pub time_column: String,

    /// Year substituted for the current year when matching dates.
    #[arg(long, env = "FLIGHTFEED_DATASET_YEAR", default_value_t = DEFAULT_DATASET_YEAR)]
    pub dataset_year: i32,

    /// Match dates against the current year instead of the dataset year.
    #[arg(long, env = "FLIGHTFEED_CURRENT_YEAR", conflicts_with = "dataset_year")]
    pub current_year: bool,

    /// Interval (ms) between record source polls.
    #[arg(long, env = "FLIGHTFEED_POLL_INTERVAL_MS", default_value_t = 1_000)]
    pub poll_interval_ms: u64,

    /// Interval (s) between keep-alive markers. Zero disables them.
    #[arg(long, env = "FLIGHTFEED_KEEPALIVE_SECS", default_value_t = 30)]
    pub keepalive_secs: u64,

    /// Live events buffered per subscriber before it is dropped.
    #[arg(long, env = "FLIGHTFEED_SUBSCRIBER_BUFFER", default_value_t = 256)]
    pub subscriber_buffer: usize,

    /// Time (s) allowed for open connections to finish on shutdown.
    #[arg(long, env = "FLIGHTFEED_SHUTDOWN_GRACE_SECS", default_value_t = 5)]
    pub shutdown_grace_secs: u64,
}

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address to listen on for HTTP requests.
    pub listen_addr: String,
    /// SQLite database path.
    pub db_path: PathBuf,
    /// Table holding scheduled records.
    pub table: String,
    /// Identifier column.
    pub id_column: String,
    /// Date column.
    pub date_column: String,
    /// Scheduled time column.
    pub time_column: String,
    /// Year used for date matching, `None` for the current year.
    pub dataset_year: Option<i32>,
    /// Interval between polls.
    pub poll_interval: Duration,
    /// Interval between keep-alive markers.
    pub keepalive_interval: Option<Duration>,
    /// Per-subscriber live event buffer.
    pub subscriber_buffer: usize,
    /// Drain period for open connections on shutdown.
    pub shutdown_grace: Duration,
}

impl GatewayConfig {
    /// Feed engine settings.
    pub fn feed_config(&self) -> FeedConfig {
        let config = FeedConfig::new()
            .with_poll_interval(self.poll_interval)
            .with_subscriber_buffer(self.subscriber_buffer);
        match self.keepalive_interval {
            Some(interval) => config.with_keepalive_interval(interval),
            None => config.without_keepalive(),
        }
    }

    /// Record source settings.
    pub fn source_config(&self) -> SqliteSourceConfig {
        SqliteSourceConfig::new(&self.db_path)
            .with_table(&self.table)
            .with_id_column(&self.id_column)
            .with_date_column(&self.date_column)
            .with_time_column(&self.time_column)
            .with_dataset_year(self.dataset_year)
    }
}

impl From<&Args> for GatewayConfig {
    fn from(args: &Args) -> Self {
        Self {
            listen_addr: args.listen.clone(),
            db_path: args.db.clone(),
            table: args.table.clone(),
            id_column: args.id_column.clone(),
            date_column: args.date_column.clone(),
            time_column: args.time_column.clone(),
            dataset_year: (!args.current_year).then_some(args.dataset_year),
            poll_interval: Duration::from_millis(args.poll_interval_ms),
            keepalive_interval: (args.keepalive_secs > 0)
                .then(|| Duration::from_secs(args.keepalive_secs)),
            subscriber_buffer: args.subscriber_buffer,
            shutdown_grace: Duration::from_secs(args.shutdown_grace_secs),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:7999".to_string(),
            db_path: PathBuf::from("flights.db"),
            table: DEFAULT_TABLE.to_string(),
            id_column: "id".to_string(),
            date_column: "fl_date".to_string(),
            time_column: "crs_dep_time".to_string(),
            dataset_year: Some(DEFAULT_DATASET_YEAR),
            poll_interval: Duration::from_secs(1),
            keepalive_interval: Some(Duration::from_secs(30)),
            subscriber_buffer: 256,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults_match_default_config() {
        let args = Args::parse_from(["flightfeed-gateway"]);
        let from_args = GatewayConfig::from(&args);
        let default = GatewayConfig::default();

        assert_eq!(from_args.listen_addr, default.listen_addr);
        assert_eq!(from_args.db_path, default.db_path);
        assert_eq!(from_args.dataset_year, Some(2018));
        assert_eq!(from_args.poll_interval, default.poll_interval);
        assert_eq!(from_args.keepalive_interval, default.keepalive_interval);
        assert_eq!(from_args.feed_config(), FeedConfig::default());
    }

    #[test]
    fn test_overrides() {
        let args = Args::parse_from([
            "flightfeed-gateway",
            "--db",
            "/data/schedule.db",
            "--current-year",
            "--keepalive-secs",
            "0",
            "--poll-interval-ms",
            "250",
        ]);
        let config = GatewayConfig::from(&args);

        assert_eq!(config.dataset_year, None);
        assert_eq!(config.keepalive_interval, None);
        assert_eq!(config.feed_config().keepalive_interval, None);
        assert_eq!(config.poll_interval, Duration::from_millis(250));

        let source = config.source_config();
        assert_eq!(source.path, PathBuf::from("/data/schedule.db"));
        assert_eq!(source.dataset_year, None);
    }
}
