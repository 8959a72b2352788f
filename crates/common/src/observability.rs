//! Process-wide tracing setup shared by the `analyzer` CLI and the `web` server.

use std::borrow::Cow;

use anyhow::Result;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_sdk::trace::{Tracer, TracerProvider};
use opentelemetry_sdk::Resource;
use tracing::{Dispatch, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::{fmt, EnvFilter, Layer};

pub const OTLP_ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
pub const ERROR_EVENTS: &str = "tracing_error_events";

/// Flushes the global tracer provider when dropped.
pub struct OtelGuard {
    _private: (),
}

impl Drop for OtelGuard {
    fn drop(&mut self) {
        opentelemetry::global::shutdown_tracer_provider();
    }
}

/// Counts ERROR events into [`ERROR_EVENTS`].
struct ErrorEvents;

impl<S: Subscriber> Layer<S> for ErrorEvents {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::ERROR {
            metrics::counter!(ERROR_EVENTS).increment(1);
        }
    }
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

// Needs a Tokio runtime for the batch exporter; both binaries start one first.
fn otlp_tracer(service_name: &str) -> Option<(Tracer, OtelGuard)> {
    use opentelemetry_otlp::WithExportConfig;

    let endpoint = std::env::var(OTLP_ENDPOINT_ENV).ok()?;
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .ok()?;

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .with_resource(Resource::new([KeyValue::new("service.name", service_name.to_owned())]))
        .build();
    let tracer = provider.tracer("reg_analytics");
    let _previous = opentelemetry::global::set_tracer_provider(provider);

    Some((tracer, OtelGuard { _private: () }))
}

/// Build a dispatcher writing JSON lines to stderr (stdout is reserved for
/// command output), filtered by `RUST_LOG` or `default_level`. ERROR events
/// are counted, and spans go to OTLP only when [`OTLP_ENDPOINT_ENV`] is set.
pub fn build_dispatch(
    service_name: impl Into<Cow<'static, str>>,
    default_level: &str,
) -> (Dispatch, Option<OtelGuard>) {
    let service_name = service_name.into();
    let (otel_layer, guard) = match otlp_tracer(&service_name) {
        Some((tracer, guard)) => (
            Some(tracing_opentelemetry::layer().with_tracer(tracer)),
            Some(guard),
        ),
        None => (None, None),
    };

    let json_lines = fmt::layer()
        .json()
        .with_target(true)
        .with_timer(fmt::time::SystemTime)
        .with_writer(std::io::stderr);

    let subscriber = tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(json_lines)
        .with(ErrorEvents)
        .with(otel_layer);

    (Dispatch::new(subscriber), guard)
}

/// Install [`build_dispatch`] as the global default for `service_name`.
pub fn init(service_name: &'static str, default_level: &str) -> Result<Option<OtelGuard>> {
    let (dispatch, guard) = build_dispatch(service_name, default_level);
    tracing::dispatcher::set_global_default(dispatch).map_err(anyhow::Error::msg)?;
    Ok(guard)
}
