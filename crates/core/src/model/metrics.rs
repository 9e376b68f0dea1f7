use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::ComponentId;

/// Running per-project totals as of `aggregated_at`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsSnapshot {
    pub project_id: String,
    pub aggregated_at: DateTime<Utc>,
    pub total_logs: i64,
    pub error_logs: i64,
    pub warn_logs: i64,
    pub info_logs: i64,
    pub sum_response_time: i64,
    pub response_samples: i64,
    pub avg_response_time: f64,
}

impl MetricsSnapshot {
    /// Adds `delta` onto `previous` (or onto zero) and stamps the result
    /// with the end of the window it covers.
    pub fn merge(
        project_id: &str,
        previous: Option<&MetricsSnapshot>,
        delta: &MetricsDelta,
        aggregated_at: DateTime<Utc>,
    ) -> Self {
        let base = previous.cloned().unwrap_or_else(|| Self::empty(project_id));
        let sum_response_time = base.sum_response_time + delta.sum_response_time;
        let response_samples = base.response_samples + delta.response_samples;
        let avg_response_time = if response_samples > 0 {
            sum_response_time as f64 / response_samples as f64
        } else {
            0.0
        };

        Self {
            project_id: project_id.to_string(),
            aggregated_at,
            total_logs: base.total_logs + delta.total_logs,
            error_logs: base.error_logs + delta.error_logs,
            warn_logs: base.warn_logs + delta.warn_logs,
            info_logs: base.info_logs + delta.info_logs,
            sum_response_time,
            response_samples,
            avg_response_time,
        }
    }

    fn empty(project_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            aggregated_at: DateTime::<Utc>::MIN_UTC,
            total_logs: 0,
            error_logs: 0,
            warn_logs: 0,
            info_logs: 0,
            sum_response_time: 0,
            response_samples: 0,
            avg_response_time: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggerCounts {
    pub logger: String,
    pub calls: i64,
    pub errors: i64,
}

/// Counts over one half-open aggregation window `[from, to)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct MetricsDelta {
    pub total_logs: i64,
    pub error_logs: i64,
    pub warn_logs: i64,
    pub info_logs: i64,
    pub sum_response_time: i64,
    pub response_samples: i64,
    pub by_logger: Vec<LoggerCounts>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComponentCounter {
    pub project_id: String,
    pub component_id: ComponentId,
    pub call_count: i64,
    pub error_count: i64,
}
