use chrono::{DateTime, NaiveDateTime, Utc};
use duckdb::{OptionalExt, params};
use tracelens_core::error::{Result, TracelensError};
use tracelens_core::model::metrics::{ComponentCounter, LoggerCounts, MetricsDelta, MetricsSnapshot};
use tracelens_core::query::LatestMetricsResponse;
use tracelens_core::repo::MetricsStore;

use crate::Store;
use crate::db::{naive_to_utc, ts_param};

impl MetricsStore for Store {
    fn latest(&self, project_id: &str) -> Result<Option<MetricsSnapshot>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT project_id, aggregated_at, total_logs, error_logs, warn_logs, info_logs,
                    sum_response_time, response_samples, avg_response_time
             FROM metrics_snapshots
             WHERE project_id = ?
             ORDER BY aggregated_at DESC, id DESC
             LIMIT 1",
            params![project_id],
            |row| {
                Ok(MetricsSnapshot {
                    project_id: row.get::<_, String>(0)?,
                    aggregated_at: naive_to_utc(row.get::<_, NaiveDateTime>(1)?),
                    total_logs: row.get::<_, i64>(2)?,
                    error_logs: row.get::<_, i64>(3)?,
                    warn_logs: row.get::<_, i64>(4)?,
                    info_logs: row.get::<_, i64>(5)?,
                    sum_response_time: row.get::<_, i64>(6)?,
                    response_samples: row.get::<_, i64>(7)?,
                    avg_response_time: row.get::<_, f64>(8)?,
                })
            },
        )
        .optional()
        .map_err(|e| TracelensError::Store(format!("query latest snapshot failed: {e}")))
    }

    fn window_delta(
        &self,
        project_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<MetricsDelta> {
        let from = ts_param(from);
        let to = ts_param(to);
        let conn = self.conn();

        let mut delta = conn
            .query_row(
                "SELECT COUNT(*),
                        CAST(COALESCE(SUM(CASE WHEN severity = 'ERROR' THEN 1 ELSE 0 END), 0) AS BIGINT),
                        CAST(COALESCE(SUM(CASE WHEN severity = 'WARN' THEN 1 ELSE 0 END), 0) AS BIGINT),
                        CAST(COALESCE(SUM(CASE WHEN severity = 'INFO' THEN 1 ELSE 0 END), 0) AS BIGINT),
                        CAST(COALESCE(SUM(duration_ms), 0) AS BIGINT),
                        COUNT(duration_ms)
                 FROM logs
                 WHERE project_id = ? AND ts >= ? AND ts < ?",
                params![project_id, from, to],
                |row| {
                    Ok(MetricsDelta {
                        total_logs: row.get::<_, i64>(0)?,
                        error_logs: row.get::<_, i64>(1)?,
                        warn_logs: row.get::<_, i64>(2)?,
                        info_logs: row.get::<_, i64>(3)?,
                        sum_response_time: row.get::<_, i64>(4)?,
                        response_samples: row.get::<_, i64>(5)?,
                        by_logger: Vec::new(),
                    })
                },
            )
            .map_err(|e| TracelensError::Store(format!("query window totals failed: {e}")))?;

        let mut stmt = conn
            .prepare(
                "SELECT logger,
                        COUNT(*),
                        CAST(COALESCE(SUM(CASE WHEN severity = 'ERROR' THEN 1 ELSE 0 END), 0) AS BIGINT)
                 FROM logs
                 WHERE project_id = ? AND ts >= ? AND ts < ?
                 GROUP BY logger
                 ORDER BY logger",
            )
            .map_err(|e| TracelensError::Store(format!("prepare window loggers failed: {e}")))?;
        let rows = stmt
            .query_map(params![project_id, from, to], |row| {
                Ok(LoggerCounts {
                    logger: row.get::<_, String>(0)?,
                    calls: row.get::<_, i64>(1)?,
                    errors: row.get::<_, i64>(2)?,
                })
            })
            .map_err(|e| TracelensError::Store(format!("query window loggers failed: {e}")))?;
        for row in rows {
            delta.by_logger.push(
                row.map_err(|e| TracelensError::Store(format!("map window logger failed: {e}")))?,
            );
        }

        Ok(delta)
    }

    fn commit_sweep(
        &self,
        snapshot: &MetricsSnapshot,
        counters: &[ComponentCounter],
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .map_err(|e| TracelensError::Store(format!("begin tx failed: {e}")))?;

        tx.execute(
            "INSERT INTO metrics_snapshots
             (id, project_id, aggregated_at, total_logs, error_logs, warn_logs, info_logs,
              sum_response_time, response_samples, avg_response_time)
             VALUES (nextval('snapshots_id_seq'), ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                snapshot.project_id,
                ts_param(snapshot.aggregated_at),
                snapshot.total_logs,
                snapshot.error_logs,
                snapshot.warn_logs,
                snapshot.info_logs,
                snapshot.sum_response_time,
                snapshot.response_samples,
                snapshot.avg_response_time,
            ],
        )
        .map_err(|e| TracelensError::Store(format!("insert snapshot failed: {e}")))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO component_metrics (project_id, component_id, call_count, error_count)
                     VALUES (?, ?, ?, ?)
                     ON CONFLICT (project_id, component_id) DO UPDATE SET
                       call_count = call_count + EXCLUDED.call_count,
                       error_count = error_count + EXCLUDED.error_count",
                )
                .map_err(|e| TracelensError::Store(format!("prepare counters failed: {e}")))?;
            for c in counters {
                stmt.execute(params![
                    c.project_id,
                    c.component_id.get(),
                    c.call_count,
                    c.error_count
                ])
                .map_err(|e| TracelensError::Store(format!("upsert counter failed: {e}")))?;
            }
        }

        tx.commit()
            .map_err(|e| TracelensError::Store(format!("commit sweep failed: {e}")))
    }
}

impl Store {
    pub fn latest_metrics(&self, project_id: &str) -> Result<LatestMetricsResponse> {
        Ok(LatestMetricsResponse {
            snapshot: self.latest(project_id)?,
            components: self.component_metrics(project_id)?,
        })
    }

    pub fn snapshot_count(&self, project_id: &str) -> Result<usize> {
        let conn = self.conn();
        conn.query_row(
            "SELECT COUNT(*) FROM metrics_snapshots WHERE project_id = ?",
            params![project_id],
            |row| row.get::<_, i64>(0),
        )
        .map(|v| v as usize)
        .map_err(|e| TracelensError::Store(format!("count snapshots failed: {e}")))
    }
}
