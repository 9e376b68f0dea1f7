use std::io::Read;

use axum::extract::{Path, State};
use axum::http::header::CONTENT_ENCODING;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracelens_analysis::DependencyLoader;
use tracelens_core::error::TracelensError;
use tracelens_core::ids::TraceId;
use tracelens_core::model::component::{NamedRelation, NewComponent};
use tracelens_core::model::log::LogRecord;
use tracelens_store::Store;
use tracing::Level;

use crate::pipeline::Pipeline;

#[derive(Clone)]
pub struct HttpIngestState {
    pub pipeline: Pipeline,
    pub store: Store,
    pub loader: DependencyLoader<Store>,
}

#[derive(Debug, Deserialize)]
pub struct LogBatch {
    pub logs: Vec<LogRecord>,
}

#[derive(Debug, Deserialize)]
pub struct NewProject {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ComponentBatch {
    pub components: Vec<NewComponent>,
}

#[derive(Debug, Deserialize)]
pub struct DependencyBatchBody {
    #[serde(default)]
    pub relations: Vec<NamedRelation>,
    #[serde(default)]
    pub databases: Vec<String>,
}

/// Error body returned by every ingest route.
pub struct IngestError(TracelensError);

impl From<TracelensError> for IngestError {
    fn from(err: TracelensError) -> Self {
        Self(err)
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            TracelensError::InvalidArgument(_) | TracelensError::Parse(_) => {
                StatusCode::BAD_REQUEST
            }
            TracelensError::LogNotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::warn!(error = %self.0, "ingest request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type IngestResult<T> = std::result::Result<T, IngestError>;

pub fn router(state: HttpIngestState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers(Any);
    Router::new()
        .route("/v1/logs", post(ingest_logs))
        .route("/v1/projects", post(register_project))
        .route("/v1/components", post(register_components))
        .route(
            "/v1/projects/{project_id}/dependencies",
            post(load_dependencies),
        )
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .on_request(tower_http::trace::DefaultOnRequest::new().level(Level::INFO))
                .on_response(tower_http::trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

async fn ingest_logs(
    State(state): State<HttpIngestState>,
    headers: HeaderMap,
    body: Bytes,
) -> IngestResult<(StatusCode, Json<serde_json::Value>)> {
    let batch: LogBatch = decode_json(&headers, body)?;
    for record in &batch.logs {
        validate_log(record)?;
    }

    let accepted = batch.logs.len();
    tracing::debug!(count = accepted, "http logs accepted");
    state.pipeline.submit_logs(batch.logs).await;
    Ok((StatusCode::ACCEPTED, Json(json!({ "accepted": accepted }))))
}

async fn register_project(
    State(state): State<HttpIngestState>,
    headers: HeaderMap,
    body: Bytes,
) -> IngestResult<impl IntoResponse> {
    let req: NewProject = decode_json(&headers, body)?;
    if req.name.trim().is_empty() {
        return Err(invalid("project name must not be empty"));
    }
    let id = match req.id {
        Some(id) if id.trim().is_empty() => return Err(invalid("project id must not be empty")),
        Some(id) => id,
        None => uuid::Uuid::new_v4().simple().to_string(),
    };
    let created_at = req.created_at.unwrap_or_else(Utc::now);

    let project = blocking(move || state.store.upsert_project(&id, &req.name, created_at)).await?;
    tracing::info!(project_id = %project.id, "project registered");
    Ok(Json(project))
}

async fn register_components(
    State(state): State<HttpIngestState>,
    headers: HeaderMap,
    body: Bytes,
) -> IngestResult<impl IntoResponse> {
    let batch: ComponentBatch = decode_json(&headers, body)?;
    for component in &batch.components {
        if component.project_id.trim().is_empty() || component.name.trim().is_empty() {
            return Err(invalid("component project_id and name must not be empty"));
        }
    }

    let components = blocking(move || state.store.register_components(&batch.components)).await?;
    tracing::info!(count = components.len(), "components registered");
    Ok(Json(components))
}

async fn load_dependencies(
    State(state): State<HttpIngestState>,
    Path(project_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> IngestResult<impl IntoResponse> {
    let req: DependencyBatchBody = decode_json(&headers, body)?;
    let report = blocking(move || {
        state
            .loader
            .load_batch(&project_id, &req.relations, &req.databases)
    })
    .await?;
    Ok(Json(report))
}

fn validate_log(record: &LogRecord) -> Result<(), TracelensError> {
    if record.project_id.trim().is_empty() {
        return Err(TracelensError::InvalidArgument(
            "log project_id must not be empty".to_string(),
        ));
    }
    if record.logger.trim().is_empty() {
        return Err(TracelensError::InvalidArgument(
            "log logger must not be empty".to_string(),
        ));
    }
    TraceId::parse(&record.trace_id).map(|_| ())
}

fn decode_json<T: DeserializeOwned>(headers: &HeaderMap, body: Bytes) -> IngestResult<T> {
    let body = decode_body(headers, body)?;
    serde_json::from_slice(&body)
        .map_err(|e| TracelensError::Parse(format!("invalid json body: {e}")).into())
}

fn decode_body(headers: &HeaderMap, body: Bytes) -> Result<Bytes, TracelensError> {
    let gzip = headers
        .get(CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("gzip"));
    if !gzip {
        return Ok(body);
    }

    let mut out = Vec::new();
    GzDecoder::new(body.as_ref())
        .read_to_end(&mut out)
        .map_err(|e| TracelensError::Parse(format!("invalid gzip body: {e}")))?;
    Ok(Bytes::from(out))
}

async fn blocking<T, F>(f: F) -> IngestResult<T>
where
    F: FnOnce() -> tracelens_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| TracelensError::Internal(format!("ingest task failed: {e}")))?
        .map_err(IngestError::from)
}

fn invalid(msg: &str) -> IngestError {
    TracelensError::InvalidArgument(msg.to_string()).into()
}
