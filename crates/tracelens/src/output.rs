use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use owo_colors::OwoColorize;
use tracelens_core::ids::ComponentId;
use tracelens_core::model::flow::{TraceFlowResult, TraceLogs, TraceStatus};
use tracelens_core::model::log::{LogRecord, Severity};
use tracelens_core::query::{BatchReport, LatestMetricsResponse, StatusResponse, SweepOutcome};

pub fn print_flow_human(v: &TraceFlowResult) {
    println!(
        "TRACE {} project={} status={} duration={}ms steps={}",
        v.trace_id,
        v.project_id,
        status_label(v.summary.status),
        v.summary.total_duration_ms,
        v.timeline.len()
    );

    for entry in &v.timeline {
        println!(
            "{:>3}. {} [{}] {} +{}ms logs={}",
            entry.sequence,
            entry.component.name.cyan(),
            entry.component.layer,
            fmt_ts(entry.start_time),
            entry.duration_ms,
            entry.logs.len()
        );
        for log in &entry.logs {
            println!("       {} {} | {}", fmt_ts(log.ts), severity_label(log.severity), log.message);
        }
    }

    let names: HashMap<ComponentId, &str> = v
        .components
        .iter()
        .map(|c| (c.component_id, c.name.as_str()))
        .collect();
    println!("components={}", v.components.len());
    for edge in &v.dependency_graph.edges {
        println!(
            "  {} -> {}",
            names.get(&edge.from).copied().unwrap_or("?"),
            names.get(&edge.to).copied().unwrap_or("?")
        );
    }
}

pub fn print_trace_logs_human(v: &TraceLogs) {
    println!(
        "TRACE {} project={} status={} duration={}ms logs={}",
        v.trace_id,
        v.project_id,
        status_label(v.status),
        v.duration_ms,
        v.logs.len()
    );
    for log in &v.logs {
        print_log_line(log);
    }
}

pub fn print_batch_human(v: &BatchReport) {
    println!(
        "dependencies inserted={} skipped={} databases={}",
        v.inserted, v.skipped, v.databases
    );
}

pub fn print_sweep_human(v: &SweepOutcome) {
    match v {
        SweepOutcome::AlreadyRunning => println!("{}", "aggregation already running".yellow()),
        SweepOutcome::Completed(report) => println!(
            "aggregated succeeded={} skipped={} failed={} elapsed={}ms",
            report.succeeded,
            report.skipped,
            report.failed,
            report.elapsed.as_millis()
        ),
    }
}

pub fn print_metrics_human(v: &LatestMetricsResponse) {
    let Some(snap) = &v.snapshot else {
        println!("no snapshot yet");
        return;
    };

    println!("project={} aggregated_at={}", snap.project_id, fmt_ts(snap.aggregated_at));
    println!(
        "logs={} errors={} warns={} infos={}",
        snap.total_logs, snap.error_logs, snap.warn_logs, snap.info_logs
    );
    println!(
        "avg_response_time={:.1}ms samples={}",
        snap.avg_response_time, snap.response_samples
    );
    for item in &v.components {
        println!(
            "  {} calls={} errors={}",
            item.name, item.call_count, item.error_count
        );
    }
}

pub fn print_status_human(v: &StatusResponse) {
    println!("db_path={}", v.db_path);
    println!("db_size_bytes={}", v.db_size_bytes);
    println!(
        "projects={} logs={} components={} edges={} snapshots={}",
        v.projects_count, v.logs_count, v.components_count, v.edges_count, v.snapshots_count
    );
    if let Some(oldest) = v.oldest_ts {
        println!("oldest={}", fmt_ts(oldest));
    }
    if let Some(newest) = v.newest_ts {
        println!("newest={}", fmt_ts(newest));
    }
}

fn print_log_line(record: &LogRecord) {
    println!(
        "{} {} {} | {}",
        fmt_ts(record.ts),
        severity_label(record.severity),
        record.logger.cyan(),
        record.message
    );
}

fn severity_label(severity: Severity) -> String {
    match severity {
        Severity::Info => "INFO".green().to_string(),
        Severity::Warn => "WARN".yellow().to_string(),
        Severity::Error => "ERROR".red().to_string(),
    }
}

fn status_label(status: TraceStatus) -> String {
    match status {
        TraceStatus::Success => status.as_str().green().to_string(),
        TraceStatus::Error => status.as_str().red().to_string(),
    }
}

fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
