use std::borrow::Cow;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_sdk::Resource;
use tracing::Subscriber;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::{EnvFilter, Layer};

/// Flushes the global tracer provider when dropped. Only handed out when OTLP export is active.
pub struct OtelGuard {
    _private: (),
}

impl Drop for OtelGuard {
    fn drop(&mut self) {
        opentelemetry::global::shutdown_tracer_provider();
    }
}

struct ErrorCounterLayer;

impl<S> Layer<S> for ErrorCounterLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == tracing::Level::ERROR {
            metrics::counter!("tracing_error_events").increment(1);
        }
    }
}

/// Build an OTLP/HTTP tracer when `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
/// Returns `None` when the variable is absent or the exporter cannot be built.
fn otlp_tracer(service_name: &str) -> Option<opentelemetry_sdk::trace::Tracer> {
    use opentelemetry_otlp::WithExportConfig;

    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok()?;
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .ok()?;

    let resource = Resource::new(vec![KeyValue::new(
        "service.name",
        service_name.to_string(),
    )]);

    // Batch export needs a Tokio runtime; the web binary is `#[tokio::main]`.
    let provider = opentelemetry_sdk::trace::TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .with_resource(resource)
        .build();

    let tracer = provider.tracer("credit_score");
    let _ = opentelemetry::global::set_tracer_provider(provider);
    Some(tracer)
}

/// Build a `tracing` dispatcher configured for:
/// - JSON logs to stdout
/// - EnvFilter that respects `RUST_LOG` (takes precedence) and falls back to `default_level`
/// - `tracing_error_events` counter for ERROR events
/// - Optional OpenTelemetry OTLP trace export when `OTEL_EXPORTER_OTLP_ENDPOINT` is set
pub fn build_dispatch(
    service_name: impl Into<Cow<'static, str>>,
    default_level: &str,
) -> (tracing::Dispatch, Option<OtelGuard>) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .json();

    let service_name = service_name.into();
    let tracer = otlp_tracer(&service_name);
    let guard = tracer.as_ref().map(|_| OtelGuard { _private: () });
    let otel_layer = tracer.map(|t| tracing_opentelemetry::layer().with_tracer(t));

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(ErrorCounterLayer)
        .with(otel_layer);

    (tracing::Dispatch::new(subscriber), guard)
}
