use serde::{Deserialize, Serialize};
use tracelens_core::model::flow::{TraceFlowResult, TraceLogs};
use tracelens_core::query::{
    BatchReport, DependencyBatchRequest, LatestMetricsRequest, LatestMetricsResponse,
    StatusResponse, SweepOutcome, TraceFlowRequest, TraceLogsRequest,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ApiRequest {
    TraceFlow(TraceFlowRequest),
    TraceLogs(TraceLogsRequest),
    DependencyBatch(DependencyBatchRequest),
    Aggregate,
    LatestMetrics(LatestMetricsRequest),
    Status,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ApiResponse {
    TraceFlow(TraceFlowResult),
    TraceLogs(TraceLogs),
    DependencyBatch(BatchReport),
    Aggregate(SweepOutcome),
    LatestMetrics(LatestMetricsResponse),
    Status(StatusResponse),
    Error(String),
}
