//! Store seams consumed by the analysis layer.
//!
//! The DuckDB store implements all of them; tests substitute in-memory
//! fakes. Every method is synchronous and scoped to a single project.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::ids::ComponentId;
use crate::model::component::{Component, DependencyEdge, Edge};
use crate::model::log::LogRecord;
use crate::model::metrics::{ComponentCounter, MetricsDelta, MetricsSnapshot};
use crate::model::project::Project;

pub trait LogStore: Send + Sync {
    /// Records of one trace, ascending by timestamp, at most `limit`.
    fn find_by_trace_id(
        &self,
        project_id: &str,
        trace_id: &str,
        limit: usize,
    ) -> Result<Vec<LogRecord>>;
}

pub trait ComponentRegistry: Send + Sync {
    fn find_by_logger(
        &self,
        project_id: &str,
        package_name: &str,
        class_name: &str,
    ) -> Result<Option<Component>>;

    fn find_by_name(&self, project_id: &str, name: &str) -> Result<Option<Component>>;
}

pub trait EdgeStore: Send + Sync {
    /// Stored edges whose endpoints are both in `ids`. May contain duplicates.
    fn edges_within(&self, project_id: &str, ids: &[ComponentId]) -> Result<Vec<DependencyEdge>>;

    /// Replaces the project's edges and database tags as one atomic unit.
    fn replace_graph(&self, project_id: &str, edges: &[Edge], databases: &[String]) -> Result<()>;
}

pub trait MetricsStore: Send + Sync {
    fn latest(&self, project_id: &str) -> Result<Option<MetricsSnapshot>>;

    /// Counts over `[from, to)`.
    fn window_delta(
        &self,
        project_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<MetricsDelta>;

    /// Persists `snapshot` and adds `counters` onto the running
    /// per-component totals in one transaction.
    fn commit_sweep(&self, snapshot: &MetricsSnapshot, counters: &[ComponentCounter])
    -> Result<()>;
}

pub trait ProjectStore: Send + Sync {
    fn list_projects(&self) -> Result<Vec<Project>>;
}
