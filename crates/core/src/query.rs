use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::component::NamedRelation;
use crate::model::metrics::MetricsSnapshot;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceFlowRequest {
    pub trace_id: String,
    pub project_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceLogsRequest {
    pub trace_id: String,
    pub project_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyBatchRequest {
    pub project_id: String,
    #[serde(default)]
    pub relations: Vec<NamedRelation>,
    #[serde(default)]
    pub databases: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct BatchReport {
    pub inserted: usize,
    pub skipped: usize,
    pub databases: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SweepReport {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Another sweep held the single-flight flag; nothing was done.
    AlreadyRunning,
    Completed(SweepReport),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestMetricsRequest {
    pub project_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentMetricsItem {
    pub component_id: i64,
    pub name: String,
    pub call_count: i64,
    pub error_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestMetricsResponse {
    pub snapshot: Option<MetricsSnapshot>,
    pub components: Vec<ComponentMetricsItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub db_path: String,
    pub db_size_bytes: u64,
    pub projects_count: usize,
    pub logs_count: usize,
    pub components_count: usize,
    pub edges_count: usize,
    pub snapshots_count: usize,
    pub oldest_ts: Option<DateTime<Utc>>,
    pub newest_ts: Option<DateTime<Utc>>,
}
