use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{Value, json};
use tracelens_core::model::component::{Edge, Layer, NamedRelation, NewComponent};
use tracelens_core::model::log::{LogRecord, Severity};
use tracelens_core::repo::EdgeStore;
use tracelens_store::Store;

/// Logs in the checkout trace, including the filter and unknown-logger lines.
pub const CHECKOUT_FLOW_LOGS: usize = 9;
pub const CHECKOUT_FLOW_DURATION_MS: i64 = 750;

pub const CONTROLLER: &str = "com.shop.web.CheckoutController";
pub const SERVICE: &str = "com.shop.checkout.CheckoutService";
pub const PAYMENT: &str = "com.shop.payment.PaymentClient";
pub const FILTER: &str = "com.shop.web.RequestLoggingFilter";
pub const AUDIT: &str = "com.shop.audit.AuditRepository";
pub const UNKNOWN: &str = "org.hibernate.SQL";

/// Project creation time and the first log of the checkout trace.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 1, 10, 0, 0).unwrap()
}

pub fn checkout_components(project_id: &str) -> Vec<NewComponent> {
    [
        (CONTROLLER, Layer::Controller),
        (SERVICE, Layer::Service),
        (PAYMENT, Layer::Infrastructure),
        (FILTER, Layer::Other),
        (AUDIT, Layer::Repository),
    ]
    .into_iter()
    .map(|(logger, layer)| {
        let (package_name, name) = logger.rsplit_once('.').unwrap();
        NewComponent {
            project_id: project_id.to_string(),
            name: name.to_string(),
            package_name: package_name.to_string(),
            layer,
        }
    })
    .collect()
}

pub fn checkout_relations() -> Vec<NamedRelation> {
    [
        ("CheckoutController", "CheckoutService"),
        ("CheckoutService", "PaymentClient"),
        ("CheckoutService", "AuditRepository"),
    ]
    .into_iter()
    .map(|(from, to)| NamedRelation {
        from_name: from.to_string(),
        to_name: to.to_string(),
    })
    .collect()
}

pub fn log(
    project_id: &str,
    trace_id: &str,
    logger: &str,
    ts: DateTime<Utc>,
    severity: Severity,
    message: &str,
) -> LogRecord {
    LogRecord {
        ts,
        project_id: project_id.to_string(),
        logger: logger.to_string(),
        trace_id: trace_id.to_string(),
        severity,
        message: message.to_string(),
        duration_ms: None,
    }
}

/// Controller, service, payment, service once the filter and unknown
/// logger lines are dropped from the timeline.
pub fn checkout_logs_at(project_id: &str, trace_id: &str, base: DateTime<Utc>) -> Vec<LogRecord> {
    let at = |ms: i64| base + Duration::milliseconds(ms);
    let mut logs = vec![
        log(project_id, trace_id, FILTER, at(0), Severity::Info, "POST /checkout"),
        log(project_id, trace_id, CONTROLLER, at(10), Severity::Info, "checkout requested cart=42"),
        log(project_id, trace_id, SERVICE, at(40), Severity::Info, "pricing cart"),
        log(project_id, trace_id, UNKNOWN, at(60), Severity::Info, "select * from cart_items"),
        log(project_id, trace_id, SERVICE, at(90), Severity::Info, "reserving stock"),
        log(project_id, trace_id, PAYMENT, at(150), Severity::Warn, "gateway slow, retrying"),
        log(project_id, trace_id, PAYMENT, at(700), Severity::Error, "payment declined"),
        log(project_id, trace_id, SERVICE, at(720), Severity::Error, "checkout failed"),
        log(project_id, trace_id, FILTER, at(750), Severity::Info, "POST /checkout 502"),
    ];
    logs[5].duration_ms = Some(500);
    logs
}

pub fn seed_checkout_flow(store: &Store, project_id: &str, trace_id: &str) {
    seed_checkout_flow_at(store, project_id, trace_id, base_time());
}

/// Seeds one project created at `base` with components, a dependency graph
/// and the checkout trace starting at `base`. The graph carries a duplicate
/// edge and an edge to a component the trace never touches.
pub fn seed_checkout_flow_at(store: &Store, project_id: &str, trace_id: &str, base: DateTime<Utc>) {
    store.upsert_project(project_id, "shop", base).unwrap();
    let components = store
        .register_components(&checkout_components(project_id))
        .unwrap();
    let id = |name: &str| {
        components
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.id)
            .unwrap()
    };

    let edges = [
        Edge { from: id("CheckoutController"), to: id("CheckoutService") },
        Edge { from: id("CheckoutController"), to: id("CheckoutService") },
        Edge { from: id("CheckoutService"), to: id("PaymentClient") },
        Edge { from: id("CheckoutService"), to: id("AuditRepository") },
    ];
    store
        .replace_graph(project_id, &edges, &["postgres".to_string()])
        .unwrap();

    store
        .insert_logs(&checkout_logs_at(project_id, trace_id, base))
        .unwrap();
}

pub fn insert_log(
    store: &Store,
    project_id: &str,
    logger: &str,
    ts: DateTime<Utc>,
    severity: Severity,
    duration_ms: Option<i64>,
) {
    let mut record = log(project_id, "trace-extra", logger, ts, severity, "extra");
    record.duration_ms = duration_ms;
    store.insert_logs(&[record]).unwrap();
}

pub fn project_payload(project_id: &str, created_at: DateTime<Utc>) -> Value {
    json!({
        "id": project_id,
        "name": "shop",
        "created_at": created_at,
    })
}

pub fn components_payload(project_id: &str) -> Value {
    json!({ "components": checkout_components(project_id) })
}

pub fn logs_payload(project_id: &str, trace_id: &str, base: DateTime<Utc>) -> Value {
    json!({ "logs": checkout_logs_at(project_id, trace_id, base) })
}

pub fn dependencies_payload() -> Value {
    json!({
        "relations": checkout_relations(),
        "databases": [" postgres ", "redis", "postgres", ""],
    })
}
