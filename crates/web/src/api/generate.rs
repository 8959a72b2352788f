use analyzer::dataset::CURRENT_LABEL;
use analyzer::{Dataset, DatasetSummary};
use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use common::generator::{run_generator, GenerateRequest};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::api::{error, generator_error, ApiError, AppState};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub summary: DatasetSummary,
    pub downloads: Vec<String>,
    pub duration_ms: u64,
}

fn download_url(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    format!("/downloads/{name}")
}

/// Run the external generator, then make its output the current dataset.
/// The body is optional: `{}` or empty runs with defaults, `{"date": "DD-MM-YYYY"}` pins a date.
pub async fn generate(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<GenerateResponse>, ApiError> {
    let request: GenerateRequest = if body.iter().all(u8::is_ascii_whitespace) {
        GenerateRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| error(StatusCode::BAD_REQUEST, format!("invalid request body: {e}")))?
    };

    let Ok(_running) = state.generator_running.try_lock() else {
        return Err(error(StatusCode::CONFLICT, "generator is already running"));
    };

    let output = run_generator(&state.generator, &request).await.map_err(|e| {
        tracing::error!(error = %e, "generator run failed");
        generator_error(&e)
    })?;

    let dataset = Dataset::load_files(CURRENT_LABEL, &output.balances_path, &output.voting_power_path)
        .map_err(|e| error(StatusCode::BAD_GATEWAY, format!("generator output unreadable: {e:#}")))?;
    let summary = dataset.summary();
    state.replace(dataset, "generator").await;

    Ok(Json(GenerateResponse {
        summary,
        downloads: vec![
            download_url(&output.balances_path),
            download_url(&output.voting_power_path),
        ],
        duration_ms: u64::try_from(output.duration.as_millis()).unwrap_or(u64::MAX),
    }))
}
