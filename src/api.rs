use crate::errors::AppError;
use crate::models::{ClusterOverview, ErrorResponse, ReportResponse};
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::Instrument;

pub const SERVICE_NAME: &str = "franchise-risk-api";

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub stores: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub message: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

pub fn router(state: AppState, frontend_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/clusters", get(clusters))
        .route("/report/:store_id", get(store_report))
        .route("/api/franchise/:store_id", get(store_report))
        .layer(cors_layer(frontend_origins))
        .with_state(state)
}

fn cors_layer(frontend_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = frontend_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!(origin = %origin, error = %error, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET])
}

async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        message: "Franchise risk reporting API",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        stores: state.reports.tables().store_count(),
    })
}

async fn clusters(State(state): State<AppState>) -> Json<Vec<ClusterOverview>> {
    Json(state.reports.clusters())
}

async fn store_report(
    State(state): State<AppState>,
    Path(store_id): Path<String>,
) -> Result<Json<ReportResponse>, AppError> {
    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("report", request_id = %request_id, store_id = %store_id);
    async move {
        let response = state.reports.report(&store_id).await?;
        tracing::info!(
            risk_level = response.report.risk_level.as_str(),
            suggestion_source = ?response.llm_suggestion.source,
            "report served"
        );
        Ok(Json(response))
    }
    .instrument(span)
    .await
}

pub fn to_client_error(error: &AppError) -> (StatusCode, ErrorResponse) {
    match error {
        AppError::NotFound(detail) => (
            StatusCode::NOT_FOUND,
            ErrorResponse {
                detail: detail.clone(),
                code: Some(error.code().to_string()),
            },
        ),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorResponse {
                detail: "Internal server error".to_string(),
                code: Some("INTERNAL".to_string()),
            },
        ),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = to_client_error(&self);
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::info!(error = %self, "request rejected");
        }
        (status, Json(body)).into_response()
    }
}
