use analyzer::dataset::{WalletDetail, CURRENT_LABEL, DEFAULT_TOP_N};
use analyzer::{Dataset, DatasetReport, DatasetSummary};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::api::{error, require_dataset, ApiError, AppState};

#[derive(Deserialize)]
pub struct UploadRequest {
    pub balances: Value,
    #[serde(rename = "votingPower")]
    pub voting_power: Value,
}

/// Replace the current dataset with two uploaded documents.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UploadRequest>,
) -> Result<Json<DatasetSummary>, ApiError> {
    let dataset = Dataset::from_documents(CURRENT_LABEL, &req.balances, &req.voting_power)
        .map_err(|e| error(StatusCode::BAD_REQUEST, format!("{e:#}")))?;
    let summary = dataset.summary();
    state.replace(dataset, "upload").await;
    Ok(Json(summary))
}

#[derive(Deserialize)]
pub struct ReportQuery {
    pub top: Option<usize>,
}

pub async fn report(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ReportQuery>,
) -> Result<Json<DatasetReport>, ApiError> {
    let dataset = require_dataset(&state).await?;
    Ok(Json(dataset.report(q.top.unwrap_or(DEFAULT_TOP_N))))
}

pub async fn wallet(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<Json<WalletDetail>, ApiError> {
    let dataset = require_dataset(&state).await?;
    dataset
        .wallet_detail(&address, &state.multipliers)
        .map(Json)
        .ok_or_else(|| error(StatusCode::NOT_FOUND, format!("address {address} not in dataset")))
}
