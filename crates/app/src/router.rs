use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use paro_core::{BatchReport, EmployeeFilter, ResultRow};
use paro_storage::Database;
use paro_util::AppConfig;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::pipeline::Pipeline;
use crate::problem::ProblemResponse;
use crate::telemetry;

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    storage: Database,
    pipeline: Arc<Pipeline>,
    input_path: PathBuf,
    review_path: PathBuf,
    upload_max_bytes: usize,
    cors_enabled: bool,
}

impl AppState {
    pub fn new(
        metrics: PrometheusHandle,
        storage: Database,
        pipeline: Pipeline,
        config: &AppConfig,
    ) -> Self {
        Self {
            metrics,
            storage,
            pipeline: Arc::new(pipeline),
            input_path: config.input_path.clone(),
            review_path: config.review_path.clone(),
            upload_max_bytes: config.upload_max_bytes,
            cors_enabled: config.cors_enabled,
        }
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn storage(&self) -> &Database {
        &self.storage
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

pub fn app_router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.upload_max_bytes);
    let cors_enabled = state.cors_enabled;
    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/employees", get(list_employees))
        .route("/update", get(run_update))
        .route("/upload", post(upload).layer(upload_limit))
        .route("/review", get(download_review))
        .with_state(state);

    if cors_enabled {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = telemetry::render_metrics(state.metrics());
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}

async fn list_employees(
    State(state): State<AppState>,
    Query(filter): Query<EmployeeFilter>,
) -> Result<Json<Vec<ResultRow>>, ProblemResponse> {
    let rows = state.storage().employees().list_all().await.map_err(|err| {
        error!(stage = "http", error = %err, "failed to list employees");
        ProblemResponse::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "storage_error",
            "failed to load employees",
        )
    })?;
    Ok(Json(filter.apply(rows)))
}

/// The batch runs in its own task, so a client that disconnects mid-run does
/// not cancel it between rows.
async fn run_update(State(state): State<AppState>) -> Result<Json<BatchReport>, ProblemResponse> {
    let pipeline = Arc::clone(&state.pipeline);
    let report = tokio::spawn(async move { pipeline.run().await })
        .await
        .map_err(|err| {
            error!(stage = "http", error = %err, "batch task aborted");
            ProblemResponse::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "batch_failed",
                "batch task aborted",
            )
        })??;
    Ok(Json(report))
}

async fn upload(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let is_multipart = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));
    if !is_multipart {
        warn!(stage = "http", "upload rejected: not multipart/form-data");
        return message(
            StatusCode::BAD_REQUEST,
            "La solicitud debe ser multipart/form-data",
        );
    }

    match replace_file(&state.input_path, &body).await {
        Ok(()) => {
            info!(
                stage = "http",
                path = %state.input_path.display(),
                bytes = body.len(),
                "input spreadsheet replaced"
            );
            message(StatusCode::OK, "Archivo subido correctamente")
        }
        Err(err) => {
            error!(
                stage = "http",
                path = %state.input_path.display(),
                error = %err,
                "failed to store upload"
            );
            message(
                StatusCode::INTERNAL_SERVER_ERROR,
                "No se pudo guardar el archivo",
            )
        }
    }
}

async fn download_review(State(state): State<AppState>) -> Result<Response, ProblemResponse> {
    match tokio::fs::read(&state.review_path).await {
        Ok(contents) => Ok((
            [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
            contents,
        )
            .into_response()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Err(ProblemResponse::new(
            StatusCode::NOT_FOUND,
            "review_not_found",
            "no addresses have been flagged yet",
        )),
        Err(err) => {
            error!(stage = "http", error = %err, "failed to read review sheet");
            Err(ProblemResponse::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "review_unreadable",
                "failed to read review sheet",
            ))
        }
    }
}

fn message(status: StatusCode, text: &str) -> Response {
    (status, Json(json!({ "message": text }))).into_response()
}

/// Writes next to the target and renames, so a failed write keeps the old file.
async fn replace_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    if let Err(err) = tokio::fs::write(&tmp, contents).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(err);
    }
    tokio::fs::rename(&tmp, path).await
}
