//! Incremental per-project metrics aggregation.
//!
//! A sweep walks every project, computes the counts for the window since
//! that project's latest snapshot and appends a new snapshot holding the
//! running totals. At most one sweep runs at a time per process: the
//! `running` flag is taken with a compare-and-set and released by a guard,
//! so overlapping triggers return immediately without touching the store.
//!
//! Snapshots are read, merged and written per project without any lock of
//! their own. That is only sound because projects are processed one after
//! another inside the single-flight section.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeDelta, Utc};
use tracelens_core::error::Result;
use tracelens_core::ids::ComponentId;
use tracelens_core::model::metrics::{ComponentCounter, MetricsDelta, MetricsSnapshot};
use tracelens_core::model::project::Project;
use tracelens_core::query::{SweepOutcome, SweepReport};
use tracelens_core::repo::{ComponentRegistry, MetricsStore, ProjectStore};
use tracelens_core::time::window_shorter_than;

use crate::resolver::{CachingResolver, ComponentResolution};

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectOutcome {
    Aggregated(MetricsSnapshot),
    /// The window since the last snapshot is shorter than the minimum.
    TooRecent,
}

pub struct Aggregator<S> {
    store: S,
    min_window: Duration,
    ingest_lag: TimeDelta,
    running: AtomicBool,
}

struct SweepGuard<'a>(&'a AtomicBool);

impl<'a> SweepGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<S> Aggregator<S>
where
    S: ProjectStore + MetricsStore + ComponentRegistry,
{
    pub fn new(store: S, min_window: Duration) -> Self {
        Self {
            store,
            min_window,
            ingest_lag: TimeDelta::zero(),
            running: AtomicBool::new(false),
        }
    }

    /// Ends every window `lag` before the sweep time, so logs still sitting
    /// in the ingest write buffer land in the next window instead of a
    /// closed one.
    pub fn with_ingest_lag(mut self, lag: Duration) -> Self {
        self.ingest_lag = TimeDelta::from_std(lag).unwrap_or_else(|_| TimeDelta::zero());
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn sweep(&self) -> SweepOutcome {
        self.sweep_at(Utc::now())
    }

    /// Runs one sweep with `now` minus the ingest lag as the end of every
    /// project's window.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> SweepOutcome {
        let Some(_guard) = SweepGuard::acquire(&self.running) else {
            tracing::warn!("aggregation sweep already running, skipping");
            return SweepOutcome::AlreadyRunning;
        };

        let started = Instant::now();
        let until = now - self.ingest_lag;
        let projects = self.store.list_projects().unwrap_or_else(|e| {
            tracing::warn!(error = ?e, "failed to list projects for aggregation");
            Vec::new()
        });

        let mut report = SweepReport::default();
        for project in &projects {
            match self.aggregate_project(project, until) {
                Ok(ProjectOutcome::Aggregated(snapshot)) => {
                    report.succeeded += 1;
                    tracing::debug!(
                        project_id = %project.id,
                        total_logs = snapshot.total_logs,
                        error_logs = snapshot.error_logs,
                        "project metrics aggregated"
                    );
                }
                Ok(ProjectOutcome::TooRecent) => {
                    report.skipped += 1;
                    tracing::debug!(project_id = %project.id, "aggregation window too short");
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(project_id = %project.id, error = ?e, "project aggregation failed");
                }
            }
        }

        report.elapsed = started.elapsed();
        tracing::info!(
            projects = projects.len(),
            succeeded = report.succeeded,
            skipped = report.skipped,
            failed = report.failed,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "aggregation sweep finished"
        );
        SweepOutcome::Completed(report)
    }

    /// Aggregates `[latest snapshot or creation, until)` for one project.
    pub fn aggregate_project(&self, project: &Project, until: DateTime<Utc>) -> Result<ProjectOutcome> {
        let previous = self.store.latest(&project.id)?;
        let from = previous
            .as_ref()
            .map(|s| s.aggregated_at)
            .unwrap_or(project.created_at);

        if window_shorter_than(from, until, self.min_window) {
            return Ok(ProjectOutcome::TooRecent);
        }

        let delta = self.store.window_delta(&project.id, from, until)?;
        let counters = self.component_counters(&project.id, &delta);
        let snapshot = MetricsSnapshot::merge(&project.id, previous.as_ref(), &delta, until);
        self.store.commit_sweep(&snapshot, &counters)?;
        Ok(ProjectOutcome::Aggregated(snapshot))
    }

    fn component_counters(&self, project_id: &str, delta: &MetricsDelta) -> Vec<ComponentCounter> {
        let mut resolver = CachingResolver::new(&self.store, project_id);
        let mut totals: BTreeMap<ComponentId, (i64, i64)> = BTreeMap::new();
        for row in &delta.by_logger {
            if let ComponentResolution::Resolved(component) = resolver.resolve(&row.logger) {
                let entry = totals.entry(component.component_id).or_default();
                entry.0 += row.calls;
                entry.1 += row.errors;
            }
        }

        totals
            .into_iter()
            .map(|(component_id, (call_count, error_count))| ComponentCounter {
                project_id: project_id.to_string(),
                component_id,
                call_count,
                error_count,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};
    use std::thread;

    use chrono::{Duration as ChronoDuration, TimeZone};
    use tracelens_core::error::TracelensError;
    use tracelens_core::model::component::Component;
    use tracelens_core::model::log::Severity;
    use tracelens_store::Store;

    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 10, 0, 0).unwrap()
    }

    fn seeded() -> Store {
        let store = Store::open_in_memory().unwrap();
        testkit::seed_checkout_flow(&store, "p1", "trace-1");
        store
    }

    fn completed(outcome: SweepOutcome) -> SweepReport {
        match outcome {
            SweepOutcome::Completed(report) => report,
            SweepOutcome::AlreadyRunning => panic!("sweep unexpectedly skipped"),
        }
    }

    #[test]
    fn first_sweep_starts_at_project_creation() {
        let store = seeded();
        let aggregator = Aggregator::new(store.clone(), MINUTE);

        let report = completed(aggregator.sweep_at(t0() + ChronoDuration::minutes(10)));
        assert_eq!(report.succeeded, 1);

        let snap = store.latest("p1").unwrap().unwrap();
        assert_eq!(snap.total_logs, testkit::CHECKOUT_FLOW_LOGS as i64);
        assert_eq!(snap.error_logs, 2);
        assert_eq!(snap.warn_logs, 1);
        assert_eq!(snap.aggregated_at, t0() + ChronoDuration::minutes(10));
    }

    #[test]
    fn second_sweep_within_a_minute_is_skipped() {
        let store = seeded();
        let aggregator = Aggregator::new(store.clone(), MINUTE);
        let now = t0() + ChronoDuration::minutes(10);

        completed(aggregator.sweep_at(now));
        let report = completed(aggregator.sweep_at(now + ChronoDuration::seconds(30)));

        assert_eq!(report.succeeded, 0);
        assert_eq!(report.skipped, 1);
        assert_eq!(store.snapshot_count("p1").unwrap(), 1);
    }

    #[test]
    fn windows_are_contiguous_and_totals_additive() {
        let store = seeded();
        let aggregator = Aggregator::new(store.clone(), MINUTE);
        let first_at = t0() + ChronoDuration::minutes(10);
        completed(aggregator.sweep_at(first_at));

        // Exactly at the previous boundary: belongs to the second window.
        testkit::insert_log(&store, "p1", "com.shop.checkout.CheckoutService", first_at, Severity::Error, Some(40));
        let second_at = first_at + ChronoDuration::minutes(10);
        testkit::insert_log(&store, "p1", "com.shop.checkout.CheckoutService", second_at, Severity::Info, None);

        completed(aggregator.sweep_at(second_at));
        let snap = store.latest("p1").unwrap().unwrap();
        assert_eq!(snap.total_logs, testkit::CHECKOUT_FLOW_LOGS as i64 + 1);
        assert_eq!(snap.error_logs, 3);
        assert_eq!(snap.aggregated_at, second_at);

        completed(aggregator.sweep_at(second_at + ChronoDuration::minutes(10)));
        let snap = store.latest("p1").unwrap().unwrap();
        assert_eq!(snap.total_logs, testkit::CHECKOUT_FLOW_LOGS as i64 + 2);
        assert_eq!(store.snapshot_count("p1").unwrap(), 3);
    }

    #[test]
    fn component_counters_follow_resolved_loggers() {
        let store = seeded();
        let aggregator = Aggregator::new(store.clone(), MINUTE);
        completed(aggregator.sweep_at(t0() + ChronoDuration::minutes(10)));

        let items = store.component_metrics("p1").unwrap();
        let service = items.iter().find(|i| i.name == "CheckoutService").unwrap();
        assert_eq!(service.call_count, 3);
        assert_eq!(service.error_count, 1);
        // The unknown logger has no component to count against.
        assert_eq!(items.iter().map(|i| i.call_count).sum::<i64>(), testkit::CHECKOUT_FLOW_LOGS as i64 - 1);
    }

    #[test]
    fn buffered_logs_fall_into_the_next_window() {
        let store = seeded();
        let aggregator =
            Aggregator::new(store.clone(), MINUTE).with_ingest_lag(Duration::from_millis(200));
        let now = t0() + ChronoDuration::minutes(10);

        // Timestamped before the sweep but still in the write buffer.
        let late = now - ChronoDuration::milliseconds(100);
        completed(aggregator.sweep_at(now));
        testkit::insert_log(&store, "p1", "com.shop.checkout.CheckoutService", late, Severity::Info, None);

        let snap = store.latest("p1").unwrap().unwrap();
        assert_eq!(snap.aggregated_at, now - ChronoDuration::milliseconds(200));
        assert_eq!(snap.total_logs, testkit::CHECKOUT_FLOW_LOGS as i64);

        completed(aggregator.sweep_at(now + ChronoDuration::minutes(10)));
        let snap = store.latest("p1").unwrap().unwrap();
        assert_eq!(snap.total_logs, testkit::CHECKOUT_FLOW_LOGS as i64 + 1);
    }

    /// Store double whose project listing blocks until released and whose
    /// other calls are counted.
    struct GatedStore {
        entered: Mutex<Option<mpsc::Sender<()>>>,
        release: Mutex<Option<mpsc::Receiver<()>>>,
        deltas: AtomicUsize,
        fail_project: Option<&'static str>,
        panic_on_list: bool,
    }

    impl GatedStore {
        fn open() -> Self {
            Self {
                entered: Mutex::new(None),
                release: Mutex::new(None),
                deltas: AtomicUsize::new(0),
                fail_project: None,
                panic_on_list: false,
            }
        }
    }

    impl ProjectStore for GatedStore {
        fn list_projects(&self) -> Result<Vec<Project>> {
            if self.panic_on_list {
                panic!("project listing exploded");
            }
            if let Some(tx) = self.entered.lock().unwrap().take() {
                tx.send(()).unwrap();
            }
            if let Some(rx) = self.release.lock().unwrap().take() {
                rx.recv().unwrap();
            }
            Ok(["a", "b", "c"]
                .iter()
                .map(|id| Project {
                    id: id.to_string(),
                    name: id.to_string(),
                    created_at: t0(),
                })
                .collect())
        }
    }

    impl MetricsStore for GatedStore {
        fn latest(&self, _: &str) -> Result<Option<MetricsSnapshot>> {
            Ok(None)
        }

        fn window_delta(&self, project_id: &str, _: DateTime<Utc>, _: DateTime<Utc>) -> Result<MetricsDelta> {
            self.deltas.fetch_add(1, Ordering::SeqCst);
            if self.fail_project == Some(project_id) {
                return Err(TracelensError::Store("log store timeout".into()));
            }
            Ok(MetricsDelta::default())
        }

        fn commit_sweep(&self, _: &MetricsSnapshot, _: &[ComponentCounter]) -> Result<()> {
            Ok(())
        }
    }

    impl ComponentRegistry for GatedStore {
        fn find_by_logger(&self, _: &str, _: &str, _: &str) -> Result<Option<Component>> {
            Ok(None)
        }

        fn find_by_name(&self, _: &str, _: &str) -> Result<Option<Component>> {
            Ok(None)
        }
    }

    #[test]
    fn overlapping_sweep_does_no_work() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let store = GatedStore::open();
        *store.entered.lock().unwrap() = Some(entered_tx);
        *store.release.lock().unwrap() = Some(release_rx);
        let aggregator = Arc::new(Aggregator::new(store, MINUTE));

        let first = {
            let aggregator = Arc::clone(&aggregator);
            thread::spawn(move || aggregator.sweep_at(t0() + ChronoDuration::hours(1)))
        };
        entered_rx.recv().unwrap();
        assert!(aggregator.is_running());

        let second = aggregator.sweep_at(t0() + ChronoDuration::hours(1));
        assert_eq!(second, SweepOutcome::AlreadyRunning);
        assert_eq!(aggregator.store.deltas.load(Ordering::SeqCst), 0);

        release_tx.send(()).unwrap();
        let report = completed(first.join().unwrap());
        assert_eq!(report.succeeded, 3);
        assert!(!aggregator.is_running());
        assert_eq!(aggregator.store.deltas.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn one_failing_project_does_not_abort_the_sweep() {
        let mut store = GatedStore::open();
        store.fail_project = Some("b");
        let aggregator = Aggregator::new(store, MINUTE);

        let report = completed(aggregator.sweep_at(t0() + ChronoDuration::hours(1)));
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(aggregator.store.deltas.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn flag_is_released_when_a_sweep_panics() {
        let mut store = GatedStore::open();
        store.panic_on_list = true;
        let aggregator = Aggregator::new(store, MINUTE);

        let res = catch_unwind(AssertUnwindSafe(|| aggregator.sweep_at(t0())));
        assert!(res.is_err());
        assert!(!aggregator.is_running());
    }
}
