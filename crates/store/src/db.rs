use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDateTime, Utc};
use duckdb::Connection;
use tracelens_core::error::{Result, TracelensError};
use tracelens_core::query::StatusResponse;

use crate::schema::SCHEMA_SQL;

/// DuckDB-backed store. Every method holds the connection lock for its
/// whole duration, so multi-statement writes are atomic to readers.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    db_path: String,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| TracelensError::Io(format!("failed to create db dir: {e}")))?;
        }

        let conn = Connection::open(path)
            .map_err(|e| TracelensError::Store(format!("failed to open duckdb: {e}")))?;
        conn.execute_batch("PRAGMA threads=4;")
            .map_err(|e| TracelensError::Store(format!("failed to set pragmas: {e}")))?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| TracelensError::Store(format!("failed to initialize schema: {e}")))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path.display().to_string(),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| TracelensError::Store(format!("failed to open in-memory db: {e}")))?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| TracelensError::Store(format!("failed to initialize schema: {e}")))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: ":memory:".to_string(),
        })
    }

    pub(crate) fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("store mutex poisoned")
    }

    pub fn status(&self) -> Result<StatusResponse> {
        let conn = self.conn();

        let projects_count = scalar_usize(&conn, "SELECT COUNT(*) FROM projects")?;
        let logs_count = scalar_usize(&conn, "SELECT COUNT(*) FROM logs")?;
        let components_count = scalar_usize(&conn, "SELECT COUNT(*) FROM components")?;
        let edges_count = scalar_usize(&conn, "SELECT COUNT(*) FROM dependency_edges")?;
        let snapshots_count = scalar_usize(&conn, "SELECT COUNT(*) FROM metrics_snapshots")?;

        let oldest_ts = scalar_ts(&conn, "SELECT MIN(ts) FROM logs")?;
        let newest_ts = scalar_ts(&conn, "SELECT MAX(ts) FROM logs")?;

        let db_size_bytes = if self.db_path == ":memory:" {
            0
        } else {
            fs::metadata(&self.db_path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StatusResponse {
            db_path: self.db_path.clone(),
            db_size_bytes,
            projects_count,
            logs_count,
            components_count,
            edges_count,
            snapshots_count,
            oldest_ts,
            newest_ts,
        })
    }
}

pub(crate) fn naive_to_utc(dt: NaiveDateTime) -> DateTime<Utc> {
    dt.and_utc()
}

/// Timestamp literal DuckDB casts to `TIMESTAMP` without timezone handling.
pub(crate) fn ts_param(dt: DateTime<Utc>) -> String {
    dt.naive_utc().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

fn scalar_usize(conn: &Connection, sql: &str) -> Result<usize> {
    conn.query_row(sql, [], |row| row.get::<_, i64>(0))
        .map(|v| v as usize)
        .map_err(|e| TracelensError::Store(format!("query failed: {e}")))
}

fn scalar_ts(conn: &Connection, sql: &str) -> Result<Option<DateTime<Utc>>> {
    conn.query_row(sql, [], |row| row.get::<_, Option<NaiveDateTime>>(0))
        .map(|opt| opt.map(naive_to_utc))
        .map_err(|e| TracelensError::Store(format!("query failed: {e}")))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn in_memory_store_initializes() {
        let store = Store::open_in_memory().unwrap();
        let status = store.status().unwrap();
        assert_eq!(status.logs_count, 0);
        assert_eq!(status.projects_count, 0);
        assert_eq!(status.snapshots_count, 0);
        assert!(status.oldest_ts.is_none());
    }

    #[test]
    fn ts_param_drops_offset() {
        let ts = Utc.with_ymd_and_hms(2026, 2, 1, 10, 0, 5).unwrap();
        assert_eq!(ts_param(ts), "2026-02-01 10:00:05.000000");
    }
}
