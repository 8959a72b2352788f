use anyhow::Result;
use common::generator::GENERATOR_RUNS;
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub const BUILD_INFO: &str = "reg_web_build_info";

pub fn describe() {
    describe_gauge!(BUILD_INFO, "REG dashboard build; always 1, labelled by version and git sha.");
    describe_counter!(GENERATOR_RUNS, "Generator subprocess runs by outcome.");
    analyzer::metrics::describe();
}

fn set_build_info() {
    let git_sha = std::env::var("GIT_SHA").unwrap_or_else(|_| "unknown".to_owned());
    ::metrics::gauge!(BUILD_INFO, "version" => env!("CARGO_PKG_VERSION"), "git_sha" => git_sha)
        .set(1.0);
}

/// Install the process-wide Prometheus recorder on first call; later calls reuse it.
/// `/metrics` runs upkeep on each scrape since nothing else does.
pub fn init_global() -> Result<PrometheusHandle> {
    if let Some(handle) = PROM_HANDLE.get() {
        return Ok(handle.clone());
    }
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe();
    set_build_info();
    Ok(PROM_HANDLE.get_or_init(|| handle).clone())
}
