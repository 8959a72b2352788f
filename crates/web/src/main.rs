mod api;
mod metrics;
mod models;

use anyhow::Result;
use api::AppState;
use askama::Template;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use common::config::Config;
use models::{CorrelationRow, OverviewView};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

const CORRELATION_ROWS: usize = 50;

// --- Templates ---

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate;

#[derive(Template)]
#[template(path = "partials/overview.html")]
struct OverviewTemplate {
    overview: Option<OverviewView>,
}

#[derive(Template)]
#[template(path = "partials/correlation.html")]
struct CorrelationTemplate {
    loaded: bool,
    rows: Vec<CorrelationRow>,
    total: usize,
}

fn render<T: Template>(template: &T) -> Response {
    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "template render failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// --- Handlers ---

async fn index() -> Response {
    render(&DashboardTemplate)
}

async fn overview_partial(State(state): State<Arc<AppState>>) -> Response {
    let overview = state
        .current()
        .await
        .map(|ds| OverviewView::from_report(&ds.report(analyzer::dataset::DEFAULT_TOP_N)));
    render(&OverviewTemplate { overview })
}

async fn correlation_partial(State(state): State<Arc<AppState>>) -> Response {
    let Some(dataset) = state.current().await else {
        return render(&CorrelationTemplate {
            loaded: false,
            rows: Vec::new(),
            total: 0,
        });
    };
    let profiles = dataset.pool_power_correlation();
    let rows = profiles
        .iter()
        .take(CORRELATION_ROWS)
        .map(CorrelationRow::from_profile)
        .collect();
    render(&CorrelationTemplate {
        loaded: true,
        rows,
        total: profiles.len(),
    })
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.prometheus.run_upkeep();
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.prometheus.render(),
    )
}

// --- Router ---

pub fn create_router_with_state(state: Arc<AppState>) -> Router {
    let downloads = ServeDir::new(&state.generator.output_dir);

    Router::new()
        .route("/", get(index))
        .route("/partials/overview", get(overview_partial))
        .route("/partials/correlation", get(correlation_partial))
        .route("/metrics", get(metrics_handler))
        .merge(api::router())
        .nest_service("/downloads", downloads)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map_or_else(Config::default_config_path, PathBuf::from);
    let config = Config::load(&config_path)?;

    let _otel_guard = common::observability::init("web", &config.general.log_level)?;
    let prometheus = metrics::init_global()?;

    // Use [web] section if present, otherwise defaults
    let web_port = config.web.as_ref().map_or(8080, |w| w.port);
    let web_host = config
        .web
        .as_ref()
        .map_or("0.0.0.0".to_string(), |w| w.host.clone());

    let state = Arc::new(AppState::from_config(&config, prometheus)?);
    let app = create_router_with_state(state);

    let addr: SocketAddr = format!("{web_host}:{web_port}").parse()?;
    tracing::info!(%addr, config = %config_path.display(), "dashboard listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct TestApp {
        state: Arc<AppState>,
        snapshots: TempDir,
        #[cfg_attr(not(unix), allow(dead_code))]
        outputs: TempDir,
    }

    impl TestApp {
        fn new() -> Self {
            Self::with_generator("true", &[], 5)
        }

        fn with_generator(program: &str, args: &[&str], timeout_secs: u64) -> Self {
            let snapshots = TempDir::new().unwrap();
            let outputs = TempDir::new().unwrap();
            let mut state = api::test_support::state(snapshots.path(), outputs.path(), program, args);
            state.generator.timeout_secs = timeout_secs;
            Self {
                state: Arc::new(state),
                snapshots,
                outputs,
            }
        }

        fn router(&self) -> Router {
            create_router_with_state(self.state.clone())
        }

        fn write_snapshot(&self, date: &str, balances: &str, voting_power: &str) {
            let dir = self.snapshots.path().join(date);
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("balances.json"), balances).unwrap();
            std::fs::write(dir.join("voting_power.json"), voting_power).unwrap();
        }

        async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, String) {
            let mut builder = Request::builder().method(method).uri(uri);
            let body = match body {
                Some(v) => {
                    builder = builder.header("content-type", "application/json");
                    Body::from(v.to_string())
                }
                None => Body::empty(),
            };
            let response = self
                .router()
                .oneshot(builder.body(body).unwrap())
                .await
                .unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            (status, String::from_utf8(bytes.to_vec()).unwrap())
        }

        async fn json(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
            let (status, text) = self.send(method, uri, body).await;
            (status, serde_json::from_str(&text).unwrap_or(Value::Null))
        }

        async fn upload_sample(&self) {
            let (status, _) = self.json("POST", "/api/dataset", Some(sample_upload())).await;
            assert_eq!(status, StatusCode::OK);
        }
    }

    fn sample_upload() -> Value {
        json!({
            "balances": {"result": {"balances": [
                {"address": "0xA", "totalBalanceREG": 1000},
                {
                    "address": "0xB00000000000000000000000000000000000000b",
                    "totalBalanceREG": "500",
                    "sourceBalance": {"gnosis": {"dexs": {"sushiswap": [{"equivalentREG": 500, "poolAddress": "0xpool"}]}}}
                }
            ]}},
            "votingPower": [
                {"address": "0xa", "votingPower": 1000},
                {"address": "0xb00000000000000000000000000000000000000B", "votingPower": 2000}
            ]
        })
    }

    #[tokio::test]
    async fn test_index_returns_200() {
        let app = TestApp::new();
        let (status, html) = app.send("GET", "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("/partials/overview"));
    }

    #[tokio::test]
    async fn test_health_reports_dataset_state() {
        let app = TestApp::new();
        let (status, body) = app.json("GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["datasetLoaded"], false);

        app.upload_sample().await;
        let (_, body) = app.json("GET", "/api/health", None).await;
        assert_eq!(body["datasetLoaded"], true);
    }

    #[tokio::test]
    async fn test_report_requires_dataset() {
        let app = TestApp::new();
        let (status, body) = app.json("GET", "/api/report", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "no dataset loaded");
    }

    #[tokio::test]
    async fn test_upload_then_report() {
        let app = TestApp::new();
        let (status, summary) = app.json("POST", "/api/dataset", Some(sample_upload())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["holders"], 2);
        assert_eq!(summary["poolWallets"], 1);
        assert_eq!(summary["totalPower"], 3000.0);

        let (status, report) = app.json("GET", "/api/report?top=1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["topBalanceHolders"].as_array().unwrap().len(), 1);
        assert_eq!(report["topBalanceHolders"][0]["address"], "0xa");
        let correlation = report["poolPowerCorrelation"].as_array().unwrap();
        assert_eq!(correlation.len(), 1);
        assert_eq!(correlation[0]["boostMultiplier"], 4.0);
        assert_eq!(correlation[0]["walletDirectREG"], 0.0);
        assert_eq!(report["poolAnalysis"]["distinctPools"], 1);
    }

    #[tokio::test]
    async fn test_upload_rejects_unknown_document_shape() {
        let app = TestApp::new();
        let (status, body) = app
            .json(
                "POST",
                "/api/dataset",
                Some(json!({"balances": {"rows": []}, "votingPower": []})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("balances document"));
    }

    #[tokio::test]
    async fn test_wallet_detail() {
        let app = TestApp::new();
        app.upload_sample().await;
        let (status, body) = app
            .json("GET", "/api/wallets/0xB00000000000000000000000000000000000000B", None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["profile"]["boostMultiplier"], 4.0);
        assert_eq!(body["positions"][0]["source"], "power_derived");
        assert_eq!(body["estimatedAverageMultiplier"], 1.3);

        let (status, _) = app.json("GET", "/api/wallets/0xmissing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_partials_render_with_and_without_dataset() {
        let app = TestApp::new();
        let (status, html) = app.send("GET", "/partials/overview", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("No dataset loaded"));

        app.upload_sample().await;
        let (_, html) = app.send("GET", "/partials/overview", None).await;
        assert!(html.contains("1,500.00"));
        let (status, html) = app.send("GET", "/partials/correlation", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("0xb000..000b"));
        assert!(html.contains("4.00x"));
    }

    #[tokio::test]
    async fn test_snapshot_list_load_and_compare() {
        let app = TestApp::new();
        app.write_snapshot(
            "01-01-2025",
            r#"[{"address": "0xa", "totalBalanceREG": 10}]"#,
            r#"[{"address": "0xa", "votingPower": 500}]"#,
        );
        app.write_snapshot(
            "01-03-2025",
            r#"[{"address": "0xa", "totalBalanceREG": 10}, {"address": "0xc", "totalBalanceREG": 5}]"#,
            r#"{"result": {"votingPower": []}}"#,
        );

        let (status, list) = app.json("GET", "/api/snapshots", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list[0]["date"], "01-03-2025");
        assert_eq!(list[1]["date"], "01-01-2025");

        let (status, _) = app.json("GET", "/api/snapshots/01-01-2025/compare", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        app.upload_sample().await;
        let (status, cmp) = app.json("GET", "/api/snapshots/01-01-2025/compare", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cmp["delta"]["holders"], 1);
        assert_eq!(cmp["delta"]["poolWallets"], 1);
        assert_eq!(cmp["delta"]["totalPower"], 2500.0);

        let (status, summary) = app.json("POST", "/api/snapshots/01-03-2025/load", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["holders"], 2);
        let (_, report) = app.json("GET", "/api/report", None).await;
        assert_eq!(report["label"], "01-03-2025");

        let (status, _) = app.json("POST", "/api/snapshots/02-02-2022/load", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_track_tolerates_broken_snapshot() {
        let app = TestApp::new();
        app.write_snapshot("01-01-2025", "{not json", "[]");
        app.write_snapshot(
            "01-02-2025",
            r#"[{"address": "0xA", "totalBalanceREG": 7}]"#,
            "[]",
        );
        app.write_snapshot("01-03-2025", "[]", r#"[{"address": "0xa", "votingPower": 9}]"#);
        app.upload_sample().await;

        let (status, body) = app.json("GET", "/api/track/0xA", None).await;
        assert_eq!(status, StatusCode::OK);
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0]["isCurrent"], true);
        assert_eq!(rows[0]["totalREG"], 1000.0);
        assert_eq!(rows[1]["label"], "01-03-2025");
        assert_eq!(rows[1]["power"], 9.0);
        assert_eq!(rows[2]["totalREG"], 7.0);
        assert_eq!(rows[3]["label"], "01-01-2025");
        assert_eq!(rows[3]["found"], false);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let app = TestApp::new();
        let (status, _) = app.send("GET", "/metrics", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_download_missing_file_is_404() {
        let app = TestApp::new();
        let (status, _) = app.send("GET", "/downloads/balances.json", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_generate_loads_output_and_serves_downloads() {
        let script = r#"echo '[{"address":"0xg","totalBalanceREG":42}]' > "$GENERATOR_OUTPUT_DIR/balances.json"; echo '[{"address":"0xg","votingPower":42}]' > "$GENERATOR_OUTPUT_DIR/voting_power.json""#;
        let app = TestApp::with_generator("sh", &["-c", script], 5);

        let (status, body) = app.json("POST", "/api/generate", None).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["summary"]["holders"], 1);
        assert_eq!(body["downloads"][0], "/downloads/balances.json");

        let (status, text) = app.send("GET", "/downloads/balances.json", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(text.contains("0xg"));
        assert!(app.outputs.path().join("voting_power.json").exists());

        let (_, report) = app.json("GET", "/api/report", None).await;
        assert_eq!(report["summary"]["totalPower"], 42.0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_generate_timeout_is_504() {
        let app = TestApp::with_generator("sh", &["-c", "sleep 30"], 1);
        let (status, body) = app.json("POST", "/api/generate", Some(json!({}))).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert!(body["message"].as_str().unwrap().contains("timed out"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_generate_failure_is_502() {
        let app = TestApp::with_generator("sh", &["-c", "echo boom >&2; exit 3"], 5);
        let (status, body) = app.json("POST", "/api/generate", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["message"].as_str().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn test_generate_rejects_bad_date() {
        let app = TestApp::new();
        let (status, _) = app
            .json("POST", "/api/generate", Some(json!({"date": "2025-01-01"})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
