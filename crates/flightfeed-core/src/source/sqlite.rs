//! SQLite-backed record source.

use std::path::PathBuf;

use chrono::Datelike;
use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, ToSql};
use serde_json::{Map, Value};

use super::{RecordSource, SourceQuery};
use crate::clock::DayKey;
use crate::error::{Error, Result};
use crate::record::Record;

/// Default dataset table.
pub const DEFAULT_TABLE: &str = "flights";

/// Historical year the bundled flights dataset covers.
pub const DEFAULT_DATASET_YEAR: i32 = 2018;

/// SQLite source configuration.
#[derive(Debug, Clone)]
pub struct SqliteSourceConfig {
    /// Path to the database file. Opened read-only.
    pub path: PathBuf,
    /// Table holding the scheduled records.
    pub table: String,
    /// Identifier column (integer, ascending with arrival order).
    pub id_column: String,
    /// Date column, stored as `YYYY-MM-DD` text.
    pub date_column: String,
    /// Scheduled time column, stored as an `HHMM` integer.
    pub time_column: String,
    /// Year substituted for the current year when building the date key.
    ///
    /// Lets a historical dataset replay "today" on the same month and day.
    pub dataset_year: Option<i32>,
}

impl SqliteSourceConfig {
    /// Configuration for the flights dataset at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            table: DEFAULT_TABLE.to_string(),
            id_column: "id".to_string(),
            date_column: "fl_date".to_string(),
            time_column: "crs_dep_time".to_string(),
            dataset_year: Some(DEFAULT_DATASET_YEAR),
        }
    }

    /// Set the table name.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Set the identifier column.
    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = column.into();
        self
    }

    /// Set the date column.
    pub fn with_date_column(mut self, column: impl Into<String>) -> Self {
        self.date_column = column.into();
        self
    }

    /// Set the scheduled time column.
    pub fn with_time_column(mut self, column: impl Into<String>) -> Self {
        self.time_column = column.into();
        self
    }

    /// Set (or clear) the dataset year.
    pub fn with_dataset_year(mut self, year: Option<i32>) -> Self {
        self.dataset_year = year;
        self
    }

    fn validate(&self) -> Result<()> {
        for name in [
            &self.table,
            &self.id_column,
            &self.date_column,
            &self.time_column,
        ] {
            validate_sql_name(name)?;
        }
        Ok(())
    }

    /// Date literal for `day`, with the dataset year applied.
    pub fn date_literal(&self, day: DayKey) -> String {
        let year = self.dataset_year.unwrap_or_else(|| day.year());
        format!("{:04}-{:02}-{:02}", year, day.month(), day.day())
    }

    fn sql(&self, bounded: bool) -> String {
        let mut sql = format!(
            r#"SELECT * FROM "{table}" WHERE "{date}" = ?1 AND "{time}" <= ?2"#,
            table = self.table,
            date = self.date_column,
            time = self.time_column,
        );
        if bounded {
            sql.push_str(&format!(r#" AND "{}" > ?3"#, self.id_column));
        }
        sql.push_str(&format!(r#" ORDER BY "{}" ASC"#, self.id_column));
        sql
    }
}

/// Table and column names are interpolated into SQL and must be plain identifiers.
fn validate_sql_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::Config(format!("invalid SQL identifier `{name}`")))
    }
}

/// Record source reading scheduled rows from a SQLite table.
pub struct SqliteSource {
    conn: Mutex<Option<Connection>>,
    config: SqliteSourceConfig,
}

impl SqliteSource {
    /// Open the database read-only and check that the configured columns exist.
    pub fn open(config: SqliteSourceConfig) -> Result<Self> {
        config.validate()?;
        let conn = Connection::open_with_flags(
            &config.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Self::from_connection(conn, config)
    }

    /// Wrap an existing connection.
    pub fn from_connection(conn: Connection, config: SqliteSourceConfig) -> Result<Self> {
        config.validate()?;
        // Preparing both statements up front surfaces missing tables/columns at startup.
        conn.prepare_cached(&config.sql(false))?;
        conn.prepare_cached(&config.sql(true))?;

        tracing::info!(
            path = %config.path.display(),
            table = %config.table,
            dataset_year = ?config.dataset_year,
            "sqlite record source opened"
        );

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            config,
        })
    }

    /// Source configuration.
    pub fn config(&self) -> &SqliteSourceConfig {
        &self.config
    }
}

impl RecordSource for SqliteSource {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn fetch(&self, query: &SourceQuery) -> Result<Vec<Record>> {
        let guard = self.conn.lock();
        let conn = guard
            .as_ref()
            .ok_or_else(|| Error::Source("sqlite source is closed".to_string()))?;

        let date = self.config.date_literal(query.day);
        let cutoff = i64::from(query.cutoff.value());
        let after = query.after.map(|id| id.value());

        let mut args: Vec<&dyn ToSql> = vec![&date as &dyn ToSql, &cutoff];
        if let Some(after) = after.as_ref() {
            args.push(after);
        }

        let mut stmt = conn.prepare_cached(&self.config.sql(after.is_some()))?;
        let names: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut rows = stmt.query(args.as_slice())?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let mut fields = Map::with_capacity(names.len());
            for (idx, name) in names.iter().enumerate() {
                fields.insert(name.clone(), column_value(row.get_ref(idx)?));
            }
            records.push(Record::from_fields(fields, &self.config.id_column)?);
        }

        tracing::trace!(
            date = %date,
            cutoff,
            after = ?after,
            rows = records.len(),
            "sqlite fetch"
        );

        Ok(records)
    }

    fn close(&self) {
        if let Some(conn) = self.conn.lock().take() {
            if let Err((_, e)) = conn.close() {
                tracing::warn!(error = %e, "failed to close sqlite connection cleanly");
            } else {
                tracing::info!("sqlite record source closed");
            }
        }
    }
}

fn column_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(hex::encode(bytes)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TimeCutoff;
    use crate::record::Identifier;
    use chrono::NaiveDate;
    use serde_json::json;

    fn seeded() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE flights (
                id INTEGER PRIMARY KEY,
                fl_date TEXT NOT NULL,
                origin TEXT,
                crs_dep_time INTEGER NOT NULL,
                dep_delay REAL
            );
            INSERT INTO flights VALUES (1, '2018-07-04', 'JFK', 600, 1.5);
            INSERT INTO flights VALUES (2, '2018-07-04', 'LGA', 845, NULL);
            INSERT INTO flights VALUES (3, '2018-07-04', 'EWR', 1310, -4.0);
            INSERT INTO flights VALUES (4, '2018-07-05', 'JFK', 500, 0.0);
            "#,
        )
        .unwrap();
        conn
    }

    fn source() -> SqliteSource {
        SqliteSource::from_connection(seeded(), SqliteSourceConfig::new(":memory:")).unwrap()
    }

    fn july_4th() -> DayKey {
        NaiveDate::from_ymd_opt(2024, 7, 4).unwrap()
    }

    #[test]
    fn test_date_literal_uses_dataset_year() {
        let config = SqliteSourceConfig::new("x.db");
        assert_eq!(config.date_literal(july_4th()), "2018-07-04");

        let config = config.with_dataset_year(None);
        assert_eq!(config.date_literal(july_4th()), "2024-07-04");
    }

    #[test]
    fn test_rejects_unsafe_names() {
        assert!(validate_sql_name("crs_dep_time").is_ok());
        assert!(validate_sql_name("_x1").is_ok());
        assert!(validate_sql_name("1abc").is_err());
        assert!(validate_sql_name("id; DROP TABLE flights").is_err());
        assert!(validate_sql_name("").is_err());

        let config = SqliteSourceConfig::new(":memory:").with_table("flights\"");
        assert!(matches!(
            SqliteSource::from_connection(seeded(), config),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_missing_column_fails_at_open() {
        let config = SqliteSourceConfig::new(":memory:").with_time_column("sched_dep_time");
        assert!(matches!(
            SqliteSource::from_connection(seeded(), config),
            Err(Error::Sqlite(_))
        ));
    }

    #[test]
    fn test_fetch_full_and_incremental() {
        let source = source();

        let rows = source
            .fetch(&SourceQuery::full(july_4th(), TimeCutoff::from_hm(9, 0)))
            .unwrap();
        let ids: Vec<_> = rows.iter().map(Record::id).collect();
        assert_eq!(ids, vec![Identifier::new(1), Identifier::new(2)]);
        assert_eq!(rows[0].get("origin"), Some(&json!("JFK")));
        assert_eq!(rows[0].get("dep_delay"), Some(&json!(1.5)));
        assert_eq!(rows[1].get("dep_delay"), Some(&Value::Null));

        let rows = source
            .fetch(&SourceQuery::after(
                july_4th(),
                TimeCutoff::from_hm(14, 0),
                Identifier::new(2),
            ))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id(), Identifier::new(3));
    }

    #[test]
    fn test_fetch_after_close_fails() {
        let source = source();
        source.close();

        let result = source.fetch(&SourceQuery::full(july_4th(), TimeCutoff::from_hm(9, 0)));
        assert!(matches!(result, Err(Error::Source(_))));
    }
}
