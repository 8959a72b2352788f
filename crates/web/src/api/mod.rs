pub mod dataset;
pub mod generate;
pub mod snapshots;

use analyzer::multipliers::MultiplierTable;
use analyzer::Dataset;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use common::config::{Config, Generator, Snapshots};
use common::error::{GeneratorError, SnapshotError};
use common::snapshots::AnySnapshotSource;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Shared application state available to all handlers.
pub struct AppState {
    /// The dataset every view is computed from; replaced wholesale on upload,
    /// snapshot load or generator run.
    pub current: RwLock<Option<Arc<Dataset>>>,
    pub source: AnySnapshotSource,
    pub multipliers: MultiplierTable,
    pub snapshots: Snapshots,
    pub generator: Generator,
    /// Held for the duration of a generator run; a second run is refused.
    pub generator_running: Mutex<()>,
    pub prometheus: PrometheusHandle,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn from_config(config: &Config, prometheus: PrometheusHandle) -> anyhow::Result<Self> {
        Ok(Self {
            current: RwLock::new(None),
            source: AnySnapshotSource::from_config(&config.snapshots)?,
            multipliers: MultiplierTable::from(&config.multipliers),
            snapshots: config.snapshots.clone(),
            generator: config.generator.clone(),
            generator_running: Mutex::new(()),
            prometheus,
            started_at: chrono::Utc::now(),
        })
    }

    pub async fn current(&self) -> Option<Arc<Dataset>> {
        self.current.read().await.clone()
    }

    pub async fn replace(&self, dataset: Dataset, origin: &'static str) {
        analyzer::metrics::record_dataset_loaded(origin, &dataset.summary());
        tracing::info!(
            origin,
            label = dataset.label(),
            holders = dataset.balances().len(),
            "dataset replaced"
        );
        *self.current.write().await = Some(Arc::new(dataset));
    }
}

#[derive(Serialize)]
pub(crate) struct MessageResponse {
    pub message: String,
}

pub(crate) type ApiError = (StatusCode, Json<MessageResponse>);

pub(crate) fn error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(MessageResponse {
            message: message.into(),
        }),
    )
}

pub(crate) async fn require_dataset(state: &AppState) -> Result<Arc<Dataset>, ApiError> {
    state
        .current()
        .await
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "no dataset loaded"))
}

pub(crate) fn snapshot_error(e: &SnapshotError) -> ApiError {
    let status = match e {
        SnapshotError::NotFound(_) => StatusCode::NOT_FOUND,
        SnapshotError::TimedOut(_) => StatusCode::GATEWAY_TIMEOUT,
        SnapshotError::Io { .. }
        | SnapshotError::Http { .. }
        | SnapshotError::Malformed { .. }
        | SnapshotError::OutsideStore(_) => StatusCode::BAD_GATEWAY,
    };
    error(status, e.to_string())
}

pub(crate) fn generator_error(e: &GeneratorError) -> ApiError {
    let status = match e {
        GeneratorError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        GeneratorError::TimedOut(_) => StatusCode::GATEWAY_TIMEOUT,
        GeneratorError::Spawn { .. } | GeneratorError::Failed { .. } | GeneratorError::MissingOutput(_) => {
            StatusCode::BAD_GATEWAY
        }
        GeneratorError::ClearOutput { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error(status, e.to_string())
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/dataset", post(dataset::upload))
        .route("/api/report", get(dataset::report))
        .route("/api/wallets/{address}", get(dataset::wallet))
        .route("/api/snapshots", get(snapshots::list))
        .route("/api/snapshots/{date}/load", post(snapshots::load))
        .route("/api/snapshots/{date}/compare", get(snapshots::compare))
        .route("/api/track/{address}", get(snapshots::track))
        .route("/api/generate", post(generate::generate))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: i64,
    dataset_loaded: bool,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime = chrono::Utc::now()
        .signed_duration_since(state.started_at)
        .num_seconds();

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: uptime,
        dataset_loaded: state.current().await.is_some(),
    })
}
