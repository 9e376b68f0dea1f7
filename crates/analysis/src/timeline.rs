use tracelens_core::model::component::ComponentRef;
use tracelens_core::model::flow::TimelineEntry;
use tracelens_core::model::log::LogRecord;
use tracelens_core::repo::ComponentRegistry;
use tracelens_core::time::millis_between;

use crate::resolver::CachingResolver;

struct Run {
    component: ComponentRef,
    logs: Vec<LogRecord>,
}

impl Run {
    fn close(self, sequence: usize) -> TimelineEntry {
        // A run is only ever opened with its first log.
        let start_time = self.logs[0].ts;
        let end_time = self.logs[self.logs.len() - 1].ts;
        TimelineEntry {
            sequence,
            component: self.component,
            start_time,
            end_time,
            duration_ms: millis_between(start_time, end_time),
            logs: self.logs,
        }
    }
}

/// Run-length encodes an ascending log sequence by resolved component.
///
/// Logs that do not resolve, or resolve to the filter layer, are dropped
/// before segmentation: they neither open, extend nor split a run. Two runs
/// of the same component separated by a visible log of another component
/// stay separate entries.
pub fn segment<R>(logs: &[LogRecord], project_id: &str, registry: &R) -> Vec<TimelineEntry>
where
    R: ComponentRegistry + ?Sized,
{
    let mut resolver = CachingResolver::new(registry, project_id);
    let mut entries = Vec::new();
    let mut current: Option<Run> = None;

    for log in logs {
        let Some(component) = resolver.resolve(&log.logger).visible() else {
            continue;
        };

        match current.as_mut() {
            Some(run) if run.component.component_id == component.component_id => {
                run.logs.push(log.clone());
            }
            _ => {
                let next = Run {
                    component: component.clone(),
                    logs: vec![log.clone()],
                };
                if let Some(done) = current.replace(next) {
                    entries.push(done.close(entries.len() + 1));
                }
            }
        }
    }

    if let Some(done) = current {
        entries.push(done.close(entries.len() + 1));
    }

    tracing::trace!(
        project_id,
        logs = logs.len(),
        entries = entries.len(),
        "timeline segmented"
    );
    entries
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use tracelens_core::ids::ComponentId;
    use tracelens_core::model::component::{Layer, NewComponent};
    use tracelens_core::model::log::Severity;
    use tracelens_store::Store;

    use super::*;

    const A: &str = "com.acme.web.OrderController";
    const B: &str = "com.acme.orders.OrderService";
    const FILTER: &str = "com.acme.infra.RequestLoggingFilter";
    const UNKNOWN: &str = "org.springframework.web.Dispatcher";

    fn registry() -> Store {
        let store = Store::open_in_memory().unwrap();
        store
            .register_components(&[
                NewComponent {
                    project_id: "p1".into(),
                    name: "OrderController".into(),
                    package_name: "com.acme.web".into(),
                    layer: Layer::Controller,
                },
                NewComponent {
                    project_id: "p1".into(),
                    name: "OrderService".into(),
                    package_name: "com.acme.orders".into(),
                    layer: Layer::Service,
                },
                NewComponent {
                    project_id: "p1".into(),
                    name: "RequestLoggingFilter".into(),
                    package_name: "com.acme.infra".into(),
                    layer: Layer::Other,
                },
            ])
            .unwrap();
        store
    }

    fn log(logger: &str, minute: i64) -> LogRecord {
        LogRecord {
            ts: Utc.with_ymd_and_hms(2026, 2, 1, 10, 0, 0).unwrap() + Duration::minutes(minute),
            project_id: "p1".into(),
            logger: logger.into(),
            trace_id: "t1".into(),
            severity: Severity::Info,
            message: format!("{logger}@{minute}"),
            duration_ms: None,
        }
    }

    fn names(entries: &[TimelineEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.component.name.as_str()).collect()
    }

    #[test]
    fn returning_component_opens_a_new_entry() {
        let store = registry();
        let logs = vec![log(A, 0), log(A, 1), log(B, 2), log(A, 3)];

        let entries = segment(&logs, "p1", &store);

        assert_eq!(names(&entries), vec!["OrderController", "OrderService", "OrderController"]);
        assert_eq!(entries.iter().map(|e| e.sequence).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(entries[0].duration_ms, 60_000);
        assert_eq!(entries[0].start_time, logs[0].ts);
        assert_eq!(entries[0].end_time, logs[1].ts);
        assert_eq!(entries[1].duration_ms, 0);
        assert_eq!(entries[2].duration_ms, 0);
        assert_eq!(entries[2].logs, vec![logs[3].clone()]);
    }

    #[test]
    fn single_log_is_zero_duration_entry() {
        let store = registry();
        let entries = segment(&[log(B, 4)], "p1", &store);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].sequence, 1);
        assert_eq!(entries[0].duration_ms, 0);
        assert_eq!(entries[0].component.layer, Layer::Service);
    }

    #[test]
    fn filtered_and_unknown_logs_are_invisible() {
        let store = registry();
        let plain = vec![log(A, 0), log(A, 2)];
        let noisy = vec![log(FILTER, 0), log(A, 0), log(FILTER, 1), log(UNKNOWN, 1), log(A, 2), log(UNKNOWN, 3)];

        let plain_entries = segment(&plain, "p1", &store);
        let noisy_entries = segment(&noisy, "p1", &store);

        assert_eq!(noisy_entries.len(), plain_entries.len());
        assert_eq!(noisy_entries.len(), 1);
        assert_eq!(noisy_entries[0].logs, plain);
        assert_eq!(noisy_entries[0].duration_ms, 120_000);
        assert!(noisy_entries.iter().flat_map(|e| &e.logs).all(|l| l.logger == A));
    }

    #[test]
    fn entry_count_equals_number_of_visible_runs() {
        let store = registry();
        let logs = vec![
            log(A, 0),
            log(B, 1),
            log(B, 2),
            log(FILTER, 3),
            log(B, 4),
            log(A, 5),
            log(UNKNOWN, 6),
            log(A, 7),
            log(B, 8),
        ];

        let entries = segment(&logs, "p1", &store);

        assert_eq!(names(&entries), vec!["OrderController", "OrderService", "OrderController", "OrderService"]);
        for entry in &entries {
            let first = entry.logs.first().unwrap();
            let last = entry.logs.last().unwrap();
            assert_eq!(entry.duration_ms, (last.ts - first.ts).num_milliseconds());
        }
        let visible = entries.iter().map(|e| e.logs.len()).sum::<usize>();
        assert_eq!(visible, 7);
    }

    #[test]
    fn only_invisible_logs_yield_empty_timeline() {
        let store = registry();
        let entries = segment(&[log(FILTER, 0), log(UNKNOWN, 1)], "p1", &store);
        assert!(entries.is_empty());
        assert!(segment(&[], "p1", &store).is_empty());
    }

    #[test]
    fn entries_carry_component_identity() {
        let store = registry();
        let entries = segment(&[log(A, 0)], "p1", &store);
        assert_ne!(entries[0].component.component_id, ComponentId(0));
        assert_eq!(entries[0].component.layer, Layer::Controller);
    }
}
