use std::net::SocketAddr;

use tracelens_analysis::DependencyLoader;
use tracelens_core::error::{Result, TracelensError};
use tracelens_store::Store;

use crate::http::{self, HttpIngestState};
use crate::pipeline::{Pipeline, PipelineConfig};

pub async fn run_ingest_server(store: Store, http_addr: SocketAddr, cfg: PipelineConfig) -> Result<()> {
    let state = HttpIngestState {
        pipeline: Pipeline::new(store.clone(), cfg),
        loader: DependencyLoader::new(store.clone()),
        store,
    };
    let router = http::router(state);

    let listener = tokio::net::TcpListener::bind(http_addr)
        .await
        .map_err(|e| TracelensError::Ingest(format!("bind {http_addr} failed: {e}")))?;
    tracing::info!(addr = %http_addr, "http ingest listening");
    axum::serve(listener, router)
        .await
        .map_err(|e| TracelensError::Ingest(format!("HTTP server failed: {e}")))
}
