mod client;
mod output;
mod protocol;
mod query_server;
mod telemetry;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracelens_analysis::Aggregator;
use tracelens_analysis::scheduler::run_periodic;
use tracelens_core::config::Config;
use tracelens_core::ids::TraceId;
use tracelens_core::query::{
    DependencyBatchRequest, LatestMetricsRequest, TraceFlowRequest, TraceLogsRequest,
};
use tracelens_core::time::parse_duration_str;
use tracelens_ingest::pipeline::PipelineConfig;
use tracelens_store::Store;

use crate::client::QueryClient;
use crate::output::{
    print_batch_human, print_flow_human, print_metrics_human, print_status_human,
    print_sweep_human, print_trace_logs_human,
};
use crate::protocol::{ApiRequest, ApiResponse};
use crate::query_server::QueryState;
use crate::telemetry::{init_cli_tracing, init_run_tracing, shutdown_tracing};

#[derive(Parser, Debug)]
#[command(name = "tracelens")]
#[command(about = "Trace flow reconstruction and project metrics from structured logs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    uds: Option<PathBuf>,

    #[arg(long, global = true)]
    addr: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Run ingest, query and aggregation")]
    Run {
        #[arg(long)]
        db_path: Option<PathBuf>,
        #[arg(long)]
        ingest_http_addr: Option<String>,
        #[arg(long)]
        query_tcp_addr: Option<String>,
        #[arg(long)]
        query_uds_path: Option<PathBuf>,
        #[arg(long, help = "Sweep interval (e.g. 10m)")]
        aggregation_interval: Option<String>,
        #[arg(long, help = "Shortest window a sweep will aggregate (e.g. 1m)")]
        aggregation_min_window: Option<String>,
    },
    #[command(about = "Reconstruct the component flow of a trace")]
    Flow {
        trace_id: String,
        #[arg(long)]
        project: String,
    },
    #[command(about = "List the logs of a trace")]
    Logs {
        trace_id: String,
        #[arg(long)]
        project: String,
    },
    #[command(about = "Replace a project's dependency graph from a JSON batch file")]
    Deps {
        #[arg(long)]
        project: String,
        #[arg(long, help = "File with {\"relations\": [...], \"databases\": [...]}")]
        file: PathBuf,
    },
    #[command(about = "Run one aggregation sweep now")]
    Aggregate,
    #[command(about = "Show the latest metrics snapshot of a project")]
    Metrics {
        #[arg(long)]
        project: String,
    },
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let api_req = match cli.command {
        Commands::Run {
            db_path,
            ingest_http_addr,
            query_tcp_addr,
            query_uds_path,
            aggregation_interval,
            aggregation_min_window,
        } => {
            let mut cfg = Config::load().context("load config")?;
            if let Some(v) = db_path {
                cfg.db_path = v;
            }
            if let Some(v) = ingest_http_addr {
                cfg.ingest_http_addr = v;
            }
            if let Some(v) = query_tcp_addr {
                cfg.query_tcp_addr = v;
            }
            if let Some(v) = query_uds_path {
                cfg.uds_path = v;
            }
            if let Some(v) = aggregation_interval {
                cfg.aggregation_interval = parse_duration_str(&v)?;
            }
            if let Some(v) = aggregation_min_window {
                cfg.aggregation_min_window = parse_duration_str(&v)?;
            }
            cfg.validate()?;
            return run_server(cfg).await;
        }
        Commands::Flow { trace_id, project } => ApiRequest::TraceFlow(TraceFlowRequest {
            trace_id: TraceId::parse(&trace_id)?.as_str().to_string(),
            project_id: project,
        }),
        Commands::Logs { trace_id, project } => ApiRequest::TraceLogs(TraceLogsRequest {
            trace_id: TraceId::parse(&trace_id)?.as_str().to_string(),
            project_id: project,
        }),
        Commands::Deps { project, file } => {
            ApiRequest::DependencyBatch(read_batch_file(&project, &file)?)
        }
        Commands::Aggregate => ApiRequest::Aggregate,
        Commands::Metrics { project } => {
            ApiRequest::LatestMetrics(LatestMetricsRequest { project_id: project })
        }
        Commands::Status => ApiRequest::Status,
    };

    init_cli_tracing();
    let mut client = QueryClient::connect(cli.uds, cli.addr).await?;
    let response = client.request(api_req).await?;
    print_response(response, cli.json)
}

async fn run_server(cfg: Config) -> anyhow::Result<()> {
    let store = Store::open(&cfg.db_path)?;
    init_run_tracing();

    eprintln!("tracelens run");
    eprintln!("  db: {}", cfg.db_path.display());
    eprintln!("  ingest http: {}", cfg.ingest_http_addr);
    eprintln!("  query uds: {}", cfg.uds_path.display());
    eprintln!("  query tcp: {}", cfg.query_tcp_addr);
    eprintln!(
        "  aggregation: every {} (min window {})",
        humanize(cfg.aggregation_interval),
        humanize(cfg.aggregation_min_window)
    );

    let http_addr = cfg
        .ingest_http_addr
        .parse()
        .with_context(|| format!("invalid ingest address {}", cfg.ingest_http_addr))?;
    let tcp_addr = cfg
        .query_tcp_addr
        .parse()
        .with_context(|| format!("invalid query address {}", cfg.query_tcp_addr))?;

    let ingest_task = tokio::spawn(tracelens_ingest::server::run_ingest_server(
        store.clone(),
        http_addr,
        PipelineConfig {
            channel_capacity: 512,
            flush_interval: std::time::Duration::from_millis(cfg.write_flush_ms),
            batch_size: cfg.write_batch_size,
        },
    ));

    let aggregator = Arc::new(
        Aggregator::new(store.clone(), cfg.aggregation_min_window)
            .with_ingest_lag(std::time::Duration::from_millis(cfg.write_flush_ms)),
    );
    let query_task = tokio::spawn(query_server::run_query_server(
        QueryState::new(store, cfg.trace_log_limit, Arc::clone(&aggregator)),
        cfg.uds_path.clone(),
        tcp_addr,
    ));
    let aggregation_task = tokio::spawn(run_periodic(aggregator, cfg.aggregation_interval));

    tokio::select! {
        res = ingest_task => {
            res??;
        }
        res = query_task => {
            res??;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received ctrl-c, shutting down");
        }
    }

    aggregation_task.abort();
    shutdown_tracing();
    Ok(())
}

fn read_batch_file(project: &str, file: &Path) -> anyhow::Result<DependencyBatchRequest> {
    #[derive(serde::Deserialize)]
    struct BatchFile {
        #[serde(default)]
        relations: Vec<tracelens_core::model::component::NamedRelation>,
        #[serde(default)]
        databases: Vec<String>,
    }

    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("read batch file {}", file.display()))?;
    let parsed: BatchFile = serde_json::from_str(&raw)
        .with_context(|| format!("parse batch file {}", file.display()))?;
    Ok(DependencyBatchRequest {
        project_id: project.to_string(),
        relations: parsed.relations,
        databases: parsed.databases,
    })
}

fn humanize(d: std::time::Duration) -> String {
    humantime::format_duration(d).to_string()
}

fn print_response(response: ApiResponse, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        if let ApiResponse::Error(e) = response {
            anyhow::bail!(e);
        }
        return Ok(());
    }

    match response {
        ApiResponse::TraceFlow(v) => print_flow_human(&v),
        ApiResponse::TraceLogs(v) => print_trace_logs_human(&v),
        ApiResponse::DependencyBatch(v) => print_batch_human(&v),
        ApiResponse::Aggregate(v) => print_sweep_human(&v),
        ApiResponse::LatestMetrics(v) => print_metrics_human(&v),
        ApiResponse::Status(v) => print_status_human(&v),
        ApiResponse::Error(e) => anyhow::bail!(e),
    }
    Ok(())
}
