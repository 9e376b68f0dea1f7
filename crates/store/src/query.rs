use std::str::FromStr;

use chrono::NaiveDateTime;
use duckdb::{OptionalExt, params};
use tracelens_core::error::{Result, TracelensError};
use tracelens_core::ids::ComponentId;
use tracelens_core::model::component::{Component, Layer};
use tracelens_core::model::log::{LogRecord, Severity};
use tracelens_core::model::project::Project;
use tracelens_core::query::ComponentMetricsItem;
use tracelens_core::repo::{ComponentRegistry, LogStore, ProjectStore};

use crate::Store;
use crate::db::naive_to_utc;

impl LogStore for Store {
    fn find_by_trace_id(
        &self,
        project_id: &str,
        trace_id: &str,
        limit: usize,
    ) -> Result<Vec<LogRecord>> {
        let sql = format!(
            "SELECT ts, project_id, logger, trace_id, severity, message, duration_ms
             FROM logs
             WHERE project_id = ? AND trace_id = ?
             ORDER BY ts ASC, id ASC
             LIMIT {}",
            limit.min(i64::MAX as usize)
        );

        let conn = self.conn();
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| TracelensError::Store(format!("prepare trace logs failed: {e}")))?;

        let rows = stmt
            .query_map(params![project_id, trace_id], |row| {
                Ok((
                    naive_to_utc(row.get::<_, NaiveDateTime>(0)?),
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, Option<i64>>(6)?,
                ))
            })
            .map_err(|e| TracelensError::Store(format!("query trace logs failed: {e}")))?;

        let mut logs = Vec::new();
        for row in rows {
            let (ts, project_id, logger, trace_id, severity, message, duration_ms) =
                row.map_err(|e| TracelensError::Store(format!("map trace log failed: {e}")))?;
            logs.push(LogRecord {
                ts,
                project_id,
                logger,
                trace_id,
                severity: Severity::from_str(&severity)?,
                message,
                duration_ms,
            });
        }
        Ok(logs)
    }
}

impl ComponentRegistry for Store {
    fn find_by_logger(
        &self,
        project_id: &str,
        package_name: &str,
        class_name: &str,
    ) -> Result<Option<Component>> {
        self.find_component(
            "SELECT id, project_id, name, package_name, layer
             FROM components
             WHERE project_id = ? AND package_name = ? AND name = ?
             ORDER BY id ASC
             LIMIT 1",
            &[project_id, package_name, class_name],
        )
    }

    fn find_by_name(&self, project_id: &str, name: &str) -> Result<Option<Component>> {
        self.find_component(
            "SELECT id, project_id, name, package_name, layer
             FROM components
             WHERE project_id = ? AND name = ?
             ORDER BY id ASC
             LIMIT 1",
            &[project_id, name],
        )
    }
}

impl ProjectStore for Store {
    fn list_projects(&self) -> Result<Vec<Project>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT id, name, created_at FROM projects ORDER BY created_at ASC, id ASC")
            .map_err(|e| TracelensError::Store(format!("prepare projects failed: {e}")))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(Project {
                    id: row.get::<_, String>(0)?,
                    name: row.get::<_, String>(1)?,
                    created_at: naive_to_utc(row.get::<_, NaiveDateTime>(2)?),
                })
            })
            .map_err(|e| TracelensError::Store(format!("query projects failed: {e}")))?;

        let mut projects = Vec::new();
        for row in rows {
            projects
                .push(row.map_err(|e| TracelensError::Store(format!("map project failed: {e}")))?);
        }
        Ok(projects)
    }
}

impl Store {
    /// Running per-component call/error counters for a project, busiest first.
    pub fn component_metrics(&self, project_id: &str) -> Result<Vec<ComponentMetricsItem>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT m.component_id, COALESCE(c.name, '?'), m.call_count, m.error_count
                 FROM component_metrics m
                 LEFT JOIN components c ON c.id = m.component_id
                 WHERE m.project_id = ?
                 ORDER BY m.call_count DESC, m.component_id ASC",
            )
            .map_err(|e| TracelensError::Store(format!("prepare component metrics failed: {e}")))?;

        let rows = stmt
            .query_map(params![project_id], |row| {
                Ok(ComponentMetricsItem {
                    component_id: row.get::<_, i64>(0)?,
                    name: row.get::<_, String>(1)?,
                    call_count: row.get::<_, i64>(2)?,
                    error_count: row.get::<_, i64>(3)?,
                })
            })
            .map_err(|e| TracelensError::Store(format!("query component metrics failed: {e}")))?;

        let mut items = Vec::new();
        for row in rows {
            items.push(
                row.map_err(|e| TracelensError::Store(format!("map component metrics failed: {e}")))?,
            );
        }
        Ok(items)
    }

    fn find_component(&self, sql: &str, args: &[&str]) -> Result<Option<Component>> {
        let conn = self.conn();
        let row = conn
            .query_row(sql, duckdb::params_from_iter(args.iter()), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .optional()
            .map_err(|e| TracelensError::Store(format!("query component failed: {e}")))?;

        let Some((id, project_id, name, package_name, layer)) = row else {
            return Ok(None);
        };
        Ok(Some(Component {
            id: ComponentId(id),
            project_id,
            name,
            package_name,
            layer: Layer::from_str(&layer)?,
        }))
    }
}
