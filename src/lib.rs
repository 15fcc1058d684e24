pub mod advisor;
pub mod analysis;
pub mod api;
pub mod config;
pub mod errors;
pub mod models;
pub mod redaction;
pub mod report;
pub mod tables;

use crate::advisor::StrategyAdvisor;
use crate::config::AppSettings;
use crate::errors::{AppError, AppResult};
use crate::report::ReportService;
use crate::tables::DataTables;
use std::path::Path;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

#[derive(Clone)]
pub struct AppState {
    pub reports: Arc<ReportService>,
}

impl AppState {
    pub fn new(reports: ReportService) -> Self {
        Self {
            reports: Arc::new(reports),
        }
    }

    pub fn from_settings(settings: &AppSettings) -> AppResult<Self> {
        let tables = DataTables::load(&settings.data_dir)?;
        let advisor = StrategyAdvisor::from_settings(&settings.llm)?;
        Ok(Self::new(ReportService::new(Arc::new(tables), advisor, settings)))
    }
}

pub fn build_router(settings: &AppSettings) -> AppResult<axum::Router> {
    let state = AppState::from_settings(settings)?;
    Ok(api::router(state, &settings.frontend_origins))
}

pub async fn run(settings: AppSettings) -> AppResult<()> {
    let app = build_router(&settings)?;
    let listener = tokio::net::TcpListener::bind(&settings.bind_addr)
        .await
        .map_err(|error| AppError::Io(format!("failed to bind {}: {}", settings.bind_addr, error)))?;
    tracing::info!(
        bind_addr = %settings.bind_addr,
        data_dir = %settings.data_dir.display(),
        "franchise risk api listening"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("franchise risk api stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

pub fn init_tracing(log_dir: Option<&Path>) -> Result<(), String> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let Some(log_dir) = log_dir else {
        return tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init()
            .map_err(|error| error.to_string());
    };

    std::fs::create_dir_all(log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "franchise-risk-api.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}
