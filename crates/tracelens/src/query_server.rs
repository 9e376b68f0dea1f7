use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, UnixListener};
use tracelens_analysis::scheduler::sweep_now;
use tracelens_analysis::{Aggregator, DependencyLoader, TraceFlowService};
use tracelens_core::error::TracelensError;
use tracelens_store::Store;

use crate::protocol::{ApiRequest, ApiResponse};

#[derive(Clone)]
pub struct QueryState {
    store: Store,
    flows: TraceFlowService<Store>,
    loader: DependencyLoader<Store>,
    aggregator: Arc<Aggregator<Store>>,
}

impl QueryState {
    pub fn new(store: Store, trace_log_limit: usize, aggregator: Arc<Aggregator<Store>>) -> Self {
        Self {
            flows: TraceFlowService::new(store.clone(), trace_log_limit),
            loader: DependencyLoader::new(store.clone()),
            store,
            aggregator,
        }
    }
}

pub async fn run_query_server(
    state: QueryState,
    uds_path: PathBuf,
    tcp_addr: SocketAddr,
) -> anyhow::Result<()> {
    if let Some(parent) = uds_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .context("create uds parent dir")?;
    }

    if tokio::fs::metadata(&uds_path).await.is_ok() {
        let _ = tokio::fs::remove_file(&uds_path).await;
    }

    let uds_listener = UnixListener::bind(&uds_path).context("bind UDS query listener")?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = tokio::fs::metadata(&uds_path).await?.permissions();
        perms.set_mode(0o600);
        tokio::fs::set_permissions(&uds_path, perms).await?;
    }
    let tcp_listener = TcpListener::bind(tcp_addr)
        .await
        .context("bind TCP query listener")?;
    tracing::info!(uds = %uds_path.display(), tcp = %tcp_addr, "query server listening");

    let uds_task = tokio::spawn(run_uds_loop(uds_listener, state.clone()));
    let tcp_task = tokio::spawn(run_tcp_loop(tcp_listener, state));

    tokio::select! {
        res = uds_task => {
            res??;
        }
        res = tcp_task => {
            res??;
        }
    }

    Ok(())
}

async fn run_uds_loop(listener: UnixListener, state: QueryState) -> anyhow::Result<()> {
    loop {
        let (stream, _) = listener.accept().await?;
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_stream(BufReader::new(stream), state).await {
                tracing::warn!(error = ?err, "uds client request failed");
            }
        });
    }
}

async fn run_tcp_loop(listener: TcpListener, state: QueryState) -> anyhow::Result<()> {
    loop {
        let (stream, _) = listener.accept().await?;
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_stream(BufReader::new(stream), state).await {
                tracing::warn!(error = ?err, "tcp client request failed");
            }
        });
    }
}

async fn handle_stream<T>(mut stream: BufReader<T>, state: QueryState) -> anyhow::Result<()>
where
    T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let mut line = String::new();
    let n = stream.read_line(&mut line).await?;
    if n == 0 {
        return Ok(());
    }

    let response = match serde_json::from_str::<ApiRequest>(&line) {
        Ok(req) => handle_request(req, state).await,
        Err(e) => ApiResponse::Error(format!("invalid request: {e}")),
    };
    let payload = serde_json::to_vec(&response)?;
    stream.get_mut().write_all(&payload).await?;
    stream.get_mut().write_all(b"\n").await?;
    stream.get_mut().flush().await?;
    Ok(())
}

async fn handle_request(req: ApiRequest, state: QueryState) -> ApiResponse {
    let resp = match req {
        ApiRequest::TraceFlow(r) => {
            blocking(move || state.flows.get_trace_flow(&r.trace_id, &r.project_id))
                .await
                .map(ApiResponse::TraceFlow)
        }
        ApiRequest::TraceLogs(r) => {
            blocking(move || state.flows.get_trace_logs(&r.trace_id, &r.project_id))
                .await
                .map(ApiResponse::TraceLogs)
        }
        ApiRequest::DependencyBatch(r) => blocking(move || {
            state
                .loader
                .load_batch(&r.project_id, &r.relations, &r.databases)
        })
        .await
        .map(ApiResponse::DependencyBatch),
        ApiRequest::Aggregate => sweep_now(Arc::clone(&state.aggregator))
            .await
            .map(ApiResponse::Aggregate),
        ApiRequest::LatestMetrics(r) => blocking(move || state.store.latest_metrics(&r.project_id))
            .await
            .map(ApiResponse::LatestMetrics),
        ApiRequest::Status => blocking(move || state.store.status())
            .await
            .map(ApiResponse::Status),
    };

    resp.unwrap_or_else(|e| ApiResponse::Error(e.to_string()))
}

async fn blocking<T, F>(f: F) -> tracelens_core::Result<T>
where
    F: FnOnce() -> tracelens_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| TracelensError::Internal(format!("query task failed: {e}")))?
}
