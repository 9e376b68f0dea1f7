use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::component::{ComponentRef, Edge};
use crate::model::log::{LogRecord, Severity};
use crate::time::millis_between;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TraceStatus {
    Success,
    Error,
}

impl TraceStatus {
    /// `Error` as soon as any record is at ERROR severity.
    pub fn of(logs: &[LogRecord]) -> Self {
        if logs.iter().any(|l| l.severity == Severity::Error) {
            Self::Error
        } else {
            Self::Success
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Error => "ERROR",
        }
    }
}

/// One contiguous run of trace logs attributed to the same component.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineEntry {
    pub sequence: usize,
    #[serde(flatten)]
    pub component: ComponentRef,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: i64,
    pub logs: Vec<LogRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DependencyGraph {
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceSummary {
    pub total_duration_ms: i64,
    pub status: TraceStatus,
}

impl TraceSummary {
    /// Span from the first to the last record; `logs` is ascending by time.
    pub fn of(logs: &[LogRecord]) -> Self {
        let total_duration_ms = match (logs.first(), logs.last()) {
            (Some(first), Some(last)) => millis_between(first.ts, last.ts),
            _ => 0,
        };
        Self {
            total_duration_ms,
            status: TraceStatus::of(logs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceFlowResult {
    pub trace_id: String,
    pub project_id: String,
    pub summary: TraceSummary,
    pub timeline: Vec<TimelineEntry>,
    pub components: Vec<ComponentRef>,
    pub dependency_graph: DependencyGraph,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceLogs {
    pub trace_id: String,
    pub project_id: String,
    pub first_log: DateTime<Utc>,
    pub last_log: DateTime<Utc>,
    pub duration_ms: i64,
    pub status: TraceStatus,
    pub logs: Vec<LogRecord>,
}
