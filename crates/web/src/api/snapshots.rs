use analyzer::address_tracker::{track_address, AddressSnapshotResult};
use analyzer::comparator::{compare as compare_summaries, SnapshotComparison};
use analyzer::{Dataset, DatasetSummary};
use axum::{
    extract::{Path, State},
    Json,
};
use common::snapshots::SnapshotSource;
use common::types::SnapshotEntry;
use std::sync::Arc;

use crate::api::{require_dataset, snapshot_error, ApiError, AppState};

pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<SnapshotEntry>>, ApiError> {
    state
        .source
        .list_snapshots()
        .await
        .map(Json)
        .map_err(|e| snapshot_error(&e))
}

async fn fetch(state: &AppState, date: &str) -> Result<Dataset, ApiError> {
    let docs = tokio::time::timeout(state.snapshots.fetch_timeout(), state.source.load_snapshot(date))
        .await
        .map_err(|_elapsed| {
            snapshot_error(&common::error::SnapshotError::TimedOut(
                state.snapshots.fetch_timeout_secs,
            ))
        })?
        .map_err(|e| {
            tracing::warn!(date, error = %e, "snapshot load failed");
            snapshot_error(&e)
        })?;
    Ok(Dataset::from_snapshot(&docs))
}

/// Make a historical snapshot the current dataset.
pub async fn load(
    State(state): State<Arc<AppState>>,
    Path(date): Path<String>,
) -> Result<Json<DatasetSummary>, ApiError> {
    let dataset = fetch(&state, &date).await?;
    let summary = dataset.summary();
    state.replace(dataset, "snapshot").await;
    Ok(Json(summary))
}

pub async fn compare(
    State(state): State<Arc<AppState>>,
    Path(date): Path<String>,
) -> Result<Json<SnapshotComparison>, ApiError> {
    let current = require_dataset(&state).await?;
    let historical = fetch(&state, &date).await?;
    Ok(Json(compare_summaries(
        &date,
        current.summary(),
        historical.summary(),
    )))
}

pub async fn track(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<Json<Vec<AddressSnapshotResult>>, ApiError> {
    let dates: Vec<String> = state
        .source
        .list_snapshots()
        .await
        .map_err(|e| snapshot_error(&e))?
        .into_iter()
        .map(|e| e.date)
        .collect();
    let current = state.current().await;
    let results = track_address(
        &state.source,
        current.as_deref(),
        &address,
        &dates,
        state.snapshots.fetch_timeout(),
    )
    .await;
    Ok(Json(results))
}
