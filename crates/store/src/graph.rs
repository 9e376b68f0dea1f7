use duckdb::{params, params_from_iter};
use tracelens_core::error::{Result, TracelensError};
use tracelens_core::ids::ComponentId;
use tracelens_core::model::component::{DependencyEdge, Edge};
use tracelens_core::repo::EdgeStore;

use crate::Store;

impl EdgeStore for Store {
    fn edges_within(&self, project_id: &str, ids: &[ComponentId]) -> Result<Vec<DependencyEdge>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT project_id, from_component_id, to_component_id
             FROM dependency_edges
             WHERE project_id = ?
               AND from_component_id IN ({placeholders})
               AND to_component_id IN ({placeholders})"
        );

        let mut args: Vec<duckdb::types::Value> = Vec::with_capacity(ids.len() * 2 + 1);
        args.push(duckdb::types::Value::Text(project_id.to_string()));
        for _ in 0..2 {
            args.extend(ids.iter().map(|id| duckdb::types::Value::BigInt(id.get())));
        }

        let conn = self.conn();
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| TracelensError::Store(format!("prepare edges failed: {e}")))?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), |row| {
                Ok(DependencyEdge {
                    project_id: row.get::<_, String>(0)?,
                    from: ComponentId(row.get::<_, i64>(1)?),
                    to: ComponentId(row.get::<_, i64>(2)?),
                })
            })
            .map_err(|e| TracelensError::Store(format!("query edges failed: {e}")))?;

        let mut edges = Vec::new();
        for row in rows {
            edges.push(row.map_err(|e| TracelensError::Store(format!("map edge failed: {e}")))?);
        }
        Ok(edges)
    }

    fn replace_graph(&self, project_id: &str, edges: &[Edge], databases: &[String]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .map_err(|e| TracelensError::Store(format!("begin tx failed: {e}")))?;

        let existing_edges: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM dependency_edges WHERE project_id = ?",
                params![project_id],
                |row| row.get(0),
            )
            .map_err(|e| TracelensError::Store(format!("count edges failed: {e}")))?;
        if existing_edges > 0 {
            tx.execute(
                "DELETE FROM dependency_edges WHERE project_id = ?",
                params![project_id],
            )
            .map_err(|e| TracelensError::Store(format!("delete edges failed: {e}")))?;
        }

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO dependency_edges (project_id, from_component_id, to_component_id)
                     VALUES (?, ?, ?)",
                )
                .map_err(|e| TracelensError::Store(format!("prepare insert edges failed: {e}")))?;
            for edge in edges {
                stmt.execute(params![project_id, edge.from.get(), edge.to.get()])
                    .map_err(|e| TracelensError::Store(format!("insert edge failed: {e}")))?;
            }
        }

        let existing_databases: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM project_databases WHERE project_id = ?",
                params![project_id],
                |row| row.get(0),
            )
            .map_err(|e| TracelensError::Store(format!("count databases failed: {e}")))?;
        if existing_databases > 0 {
            tx.execute(
                "DELETE FROM project_databases WHERE project_id = ?",
                params![project_id],
            )
            .map_err(|e| TracelensError::Store(format!("delete databases failed: {e}")))?;
        }

        {
            let mut stmt = tx
                .prepare("INSERT INTO project_databases (project_id, name) VALUES (?, ?)")
                .map_err(|e| {
                    TracelensError::Store(format!("prepare insert databases failed: {e}"))
                })?;
            for name in databases {
                stmt.execute(params![project_id, name])
                    .map_err(|e| TracelensError::Store(format!("insert database failed: {e}")))?;
            }
        }

        tx.commit()
            .map_err(|e| TracelensError::Store(format!("commit graph failed: {e}")))?;

        tracing::debug!(
            project_id,
            replaced_edges = existing_edges,
            edges = edges.len(),
            databases = databases.len(),
            "dependency graph replaced"
        );
        Ok(())
    }
}

impl Store {
    /// Every stored edge of a project, duplicates included.
    pub fn project_edges(&self, project_id: &str) -> Result<Vec<Edge>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT from_component_id, to_component_id
                 FROM dependency_edges
                 WHERE project_id = ?
                 ORDER BY from_component_id, to_component_id",
            )
            .map_err(|e| TracelensError::Store(format!("prepare project edges failed: {e}")))?;
        let rows = stmt
            .query_map(params![project_id], |row| {
                Ok(Edge {
                    from: ComponentId(row.get::<_, i64>(0)?),
                    to: ComponentId(row.get::<_, i64>(1)?),
                })
            })
            .map_err(|e| TracelensError::Store(format!("query project edges failed: {e}")))?;

        let mut edges = Vec::new();
        for row in rows {
            edges.push(row.map_err(|e| TracelensError::Store(format!("map edge failed: {e}")))?);
        }
        Ok(edges)
    }

    pub fn project_databases(&self, project_id: &str) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT name FROM project_databases WHERE project_id = ? ORDER BY name")
            .map_err(|e| TracelensError::Store(format!("prepare databases failed: {e}")))?;
        let rows = stmt
            .query_map(params![project_id], |row| row.get::<_, String>(0))
            .map_err(|e| TracelensError::Store(format!("query databases failed: {e}")))?;

        let mut names = Vec::new();
        for row in rows {
            names.push(row.map_err(|e| TracelensError::Store(format!("map database failed: {e}")))?);
        }
        Ok(names)
    }
}
