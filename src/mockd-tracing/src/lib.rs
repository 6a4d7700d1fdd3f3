use anyhow::Result;
use mockd_config::TracingCfg;
use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace as sdktrace};
use std::borrow::Cow;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::{Registry, prelude::*};

/// Flushes and shuts the tracer provider down when dropped.
pub struct TracingGuard {
    provider: Option<sdktrace::SdkTracerProvider>,
}

impl Drop for TracingGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("tracer provider shutdown failed: {e}");
            }
        }
    }
}

fn tracer_provider(cfg: &TracingCfg) -> Result<Option<sdktrace::SdkTracerProvider>> {
    let resource = Resource::builder()
        .with_service_name(Cow::Owned(cfg.service_name.clone()))
        .with_attributes(vec![KeyValue::new("service.version", env!("CARGO_PKG_VERSION"))])
        .build();

    let provider = if !cfg.otlp_endpoint.is_empty() {
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(cfg.otlp_endpoint.clone())
            .build()?;
        sdktrace::SdkTracerProvider::builder()
            .with_batch_exporter(exporter)
            .with_resource(resource)
            .build()
    } else if cfg.stdout_spans {
        sdktrace::SdkTracerProvider::builder()
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .with_resource(resource)
            .build()
    } else {
        return Ok(None);
    };
    opentelemetry::global::set_tracer_provider(provider.clone());
    Ok(Some(provider))
}

/// Initialize tracing, plus an OpenTelemetry layer when spans are exported.
/// Logs go to stderr. `RUST_LOG` takes precedence over `cfg.level`.
pub fn init(cfg: &TracingCfg) -> Result<TracingGuard> {
    let provider = tracer_provider(cfg)?;
    let otel_layer = provider
        .as_ref()
        .map(|p| OpenTelemetryLayer::new(p.tracer(cfg.service_name.clone())));

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // Logging modes (boxed trait objects so types unify)
    let fmt_layer: Box<dyn tracing_subscriber::Layer<_> + Send + Sync> = match cfg.logging_mode.as_str() {
        "json" => Box::new(
            fmt::layer()
                .with_writer(std::io::stderr)
                .json()
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_filter(filter),
        ),
        "pretty" => Box::new(fmt::layer().with_writer(std::io::stderr).pretty().with_filter(filter)),
        _ => Box::new(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(filter),
        ),
    };

    let subscriber = Registry::default().with(fmt_layer).with(otel_layer);
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(TracingGuard { provider })
}
