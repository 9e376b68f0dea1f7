use std::collections::{BTreeSet, HashSet};

use tracelens_core::error::{Result, TracelensError};
use tracelens_core::model::flow::{TraceFlowResult, TraceLogs, TraceSummary};
use tracelens_core::model::log::LogRecord;
use tracelens_core::repo::{ComponentRegistry, EdgeStore, LogStore};

use crate::graph::subgraph;
use crate::timeline::segment;

/// Read-only trace queries. Holds no per-request state, so one instance
/// serves any number of concurrent callers.
#[derive(Clone)]
pub struct TraceFlowService<S> {
    store: S,
    log_limit: usize,
}

impl<S> TraceFlowService<S>
where
    S: LogStore + ComponentRegistry + EdgeStore,
{
    pub fn new(store: S, log_limit: usize) -> Self {
        Self { store, log_limit }
    }

    pub fn get_trace_flow(&self, trace_id: &str, project_id: &str) -> Result<TraceFlowResult> {
        let logs = self.load(trace_id, project_id)?;
        assemble(trace_id, project_id, logs, &self.store)
    }

    /// The raw log list plus summary, without timeline or graph overlay.
    pub fn get_trace_logs(&self, trace_id: &str, project_id: &str) -> Result<TraceLogs> {
        let logs = self.load(trace_id, project_id)?;
        let (Some(first), Some(last)) = (logs.first(), logs.last()) else {
            return Err(not_found(trace_id, project_id));
        };
        let first_log = first.ts;
        let last_log = last.ts;
        let summary = TraceSummary::of(&logs);

        Ok(TraceLogs {
            trace_id: trace_id.to_string(),
            project_id: project_id.to_string(),
            first_log,
            last_log,
            duration_ms: summary.total_duration_ms,
            status: summary.status,
            logs,
        })
    }

    fn load(&self, trace_id: &str, project_id: &str) -> Result<Vec<LogRecord>> {
        let logs = self
            .store
            .find_by_trace_id(project_id, trace_id, self.log_limit)?;
        if logs.is_empty() {
            return Err(not_found(trace_id, project_id));
        }
        tracing::debug!(trace_id, project_id, logs = logs.len(), "trace logs loaded");
        Ok(logs)
    }
}

/// Builds the trace flow for an ascending log sequence.
pub fn assemble<S>(
    trace_id: &str,
    project_id: &str,
    logs: Vec<LogRecord>,
    store: &S,
) -> Result<TraceFlowResult>
where
    S: ComponentRegistry + EdgeStore + ?Sized,
{
    if logs.is_empty() {
        return Err(not_found(trace_id, project_id));
    }

    let timeline = segment(&logs, project_id, store);

    let mut seen = HashSet::new();
    let components = timeline
        .iter()
        .filter(|e| seen.insert(e.component.component_id))
        .map(|e| e.component.clone())
        .collect::<Vec<_>>();

    let component_ids = timeline
        .iter()
        .map(|e| e.component.component_id)
        .collect::<BTreeSet<_>>();
    let dependency_graph = subgraph(store, &component_ids, project_id);

    Ok(TraceFlowResult {
        trace_id: trace_id.to_string(),
        project_id: project_id.to_string(),
        summary: TraceSummary::of(&logs),
        timeline,
        components,
        dependency_graph,
    })
}

fn not_found(trace_id: &str, project_id: &str) -> TracelensError {
    TracelensError::LogNotFound {
        trace_id: trace_id.to_string(),
        project_id: project_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use tracelens_core::model::component::{Edge, Layer};
    use tracelens_core::model::flow::TraceStatus;
    use tracelens_store::Store;

    use super::*;

    fn seeded() -> Store {
        let store = Store::open_in_memory().unwrap();
        testkit::seed_checkout_flow(&store, "p1", "trace-1");
        store
    }

    #[test]
    fn missing_trace_is_log_not_found() {
        let service = TraceFlowService::new(seeded(), 1000);

        let err = service.get_trace_flow("nope", "p1").unwrap_err();
        assert!(matches!(err, TracelensError::LogNotFound { .. }));

        let err = service.get_trace_logs("trace-1", "other-project").unwrap_err();
        assert!(matches!(err, TracelensError::LogNotFound { .. }));
    }

    #[test]
    fn assemble_rejects_empty_logs() {
        let store = Store::open_in_memory().unwrap();
        let err = assemble("t", "p1", Vec::new(), &store).unwrap_err();
        assert!(matches!(err, TracelensError::LogNotFound { .. }));
    }

    #[test]
    fn trace_flow_composes_timeline_components_and_graph() {
        let service = TraceFlowService::new(seeded(), 1000);
        let flow = service.get_trace_flow("trace-1", "p1").unwrap();

        let names = flow
            .timeline
            .iter()
            .map(|e| e.component.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec!["CheckoutController", "CheckoutService", "PaymentClient", "CheckoutService"]
        );

        let component_names = flow.components.iter().map(|c| c.name.as_str()).collect::<Vec<_>>();
        assert_eq!(
            component_names,
            vec!["CheckoutController", "CheckoutService", "PaymentClient"]
        );
        assert!(flow.components.iter().all(|c| c.layer != Layer::Other));

        let ids = flow
            .components
            .iter()
            .map(|c| c.component_id)
            .collect::<BTreeSet<_>>();
        assert_eq!(flow.dependency_graph.edges.len(), 2);
        for Edge { from, to } in &flow.dependency_graph.edges {
            assert!(ids.contains(from) && ids.contains(to));
        }

        assert_eq!(flow.summary.status, TraceStatus::Error);
        assert_eq!(flow.summary.total_duration_ms, testkit::CHECKOUT_FLOW_DURATION_MS);
    }

    #[test]
    fn trace_logs_skip_the_overlay() {
        let service = TraceFlowService::new(seeded(), 1000);
        let logs = service.get_trace_logs("trace-1", "p1").unwrap();

        assert_eq!(logs.logs.len(), testkit::CHECKOUT_FLOW_LOGS);
        assert_eq!(logs.first_log, logs.logs[0].ts);
        assert_eq!(logs.last_log, logs.logs[logs.logs.len() - 1].ts);
        assert_eq!(logs.duration_ms, testkit::CHECKOUT_FLOW_DURATION_MS);
        assert_eq!(logs.status, TraceStatus::Error);
    }

    #[test]
    fn log_limit_bounds_the_page() {
        let service = TraceFlowService::new(seeded(), 2);
        let logs = service.get_trace_logs("trace-1", "p1").unwrap();
        assert_eq!(logs.logs.len(), 2);
    }
}
