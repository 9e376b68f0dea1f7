use chrono::{DateTime, NaiveDateTime, Utc};
use duckdb::{OptionalExt, params};
use tracelens_core::error::{Result, TracelensError};
use tracelens_core::ids::ComponentId;
use tracelens_core::model::component::{Component, NewComponent};
use tracelens_core::model::log::LogRecord;
use tracelens_core::model::project::Project;

use crate::Store;
use crate::db::{naive_to_utc, ts_param};

impl Store {
    pub fn insert_logs(&self, logs: &[LogRecord]) -> Result<()> {
        if logs.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .map_err(|e| TracelensError::Store(format!("begin tx failed: {e}")))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO logs (id, project_id, ts, logger, trace_id, severity, message, duration_ms)
                     VALUES (nextval('logs_id_seq'), ?, ?, ?, ?, ?, ?, ?)",
                )
                .map_err(|e| TracelensError::Store(format!("prepare insert logs failed: {e}")))?;

            for log in logs {
                stmt.execute(params![
                    log.project_id,
                    ts_param(log.ts),
                    log.logger,
                    log.trace_id,
                    log.severity.as_str(),
                    log.message,
                    log.duration_ms,
                ])
                .map_err(|e| TracelensError::Store(format!("insert log failed: {e}")))?;
            }
        }

        tx.commit()
            .map_err(|e| TracelensError::Store(format!("commit logs failed: {e}")))
    }

    /// Registers a project. An existing project keeps its original
    /// `created_at`, which anchors its first aggregation window.
    pub fn upsert_project(&self, id: &str, name: &str, created_at: DateTime<Utc>) -> Result<Project> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR IGNORE INTO projects (id, name, created_at) VALUES (?, ?, ?)",
            params![id, name, ts_param(created_at)],
        )
        .map_err(|e| TracelensError::Store(format!("insert project failed: {e}")))?;

        conn.query_row(
            "SELECT id, name, created_at FROM projects WHERE id = ?",
            params![id],
            |row| {
                Ok(Project {
                    id: row.get::<_, String>(0)?,
                    name: row.get::<_, String>(1)?,
                    created_at: naive_to_utc(row.get::<_, NaiveDateTime>(2)?),
                })
            },
        )
        .map_err(|e| TracelensError::Store(format!("read project failed: {e}")))
    }

    /// Registers components, reusing the id of any component already known
    /// under the same `(project, package, name)`; the layer is updated.
    pub fn register_components(&self, components: &[NewComponent]) -> Result<Vec<Component>> {
        if components.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .map_err(|e| TracelensError::Store(format!("begin tx failed: {e}")))?;

        let mut out = Vec::with_capacity(components.len());
        for c in components {
            let existing = tx
                .query_row(
                    "SELECT id FROM components WHERE project_id = ? AND package_name = ? AND name = ?",
                    params![c.project_id, c.package_name, c.name],
                    |row| row.get::<_, i64>(0),
                )
                .optional()
                .map_err(|e| TracelensError::Store(format!("lookup component failed: {e}")))?;

            let id = match existing {
                Some(id) => {
                    tx.execute(
                        "UPDATE components SET layer = ? WHERE id = ?",
                        params![c.layer.as_str(), id],
                    )
                    .map_err(|e| TracelensError::Store(format!("update component failed: {e}")))?;
                    id
                }
                None => tx
                    .query_row(
                        "INSERT INTO components (id, project_id, name, package_name, layer)
                         VALUES (nextval('components_id_seq'), ?, ?, ?, ?)
                         RETURNING id",
                        params![c.project_id, c.name, c.package_name, c.layer.as_str()],
                        |row| row.get::<_, i64>(0),
                    )
                    .map_err(|e| TracelensError::Store(format!("insert component failed: {e}")))?,
            };

            out.push(Component {
                id: ComponentId(id),
                project_id: c.project_id.clone(),
                name: c.name.clone(),
                package_name: c.package_name.clone(),
                layer: c.layer,
            });
        }

        tx.commit()
            .map_err(|e| TracelensError::Store(format!("commit components failed: {e}")))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tracelens_core::model::component::Layer;

    use super::*;

    fn new_component(name: &str, layer: Layer) -> NewComponent {
        NewComponent {
            project_id: "p1".into(),
            name: name.into(),
            package_name: "com.acme.orders".into(),
            layer,
        }
    }

    #[test]
    fn project_keeps_first_created_at() {
        let store = Store::open_in_memory().unwrap();
        let first = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();

        store.upsert_project("p1", "orders", first).unwrap();
        let again = store.upsert_project("p1", "orders", later).unwrap();

        assert_eq!(again.created_at, first);
        assert_eq!(store.status().unwrap().projects_count, 1);
    }

    #[test]
    fn registering_twice_reuses_id() {
        let store = Store::open_in_memory().unwrap();
        let a = store
            .register_components(&[new_component("OrderService", Layer::Service)])
            .unwrap();
        let b = store
            .register_components(&[new_component("OrderService", Layer::Component)])
            .unwrap();

        assert_eq!(a[0].id, b[0].id);
        assert_eq!(b[0].layer, Layer::Component);
        assert_eq!(store.status().unwrap().components_count, 1);
    }
}
