//! Tracing subscriber setup with optional OTLP export.
//!
//! Exporter endpoints come from the standard `OTEL_EXPORTER_OTLP_*` variables.

use anyhow::Context;
use opentelemetry::{global, trace::TracerProvider};
use opentelemetry_otlp::{MetricExporter, SpanExporter};
use opentelemetry_sdk::{Resource, metrics::SdkMeterProvider, trace::SdkTracerProvider};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt,
};

pub const SERVICE_NAME: &str = "tweet-store";

struct Providers {
    tracer: SdkTracerProvider,
    meter: SdkMeterProvider,
}

/// Holds the OTLP providers until shutdown so buffered spans and metrics get flushed.
pub struct Telemetry {
    providers: Option<Providers>,
}

pub fn init_telemetry(otel_enabled: bool) -> anyhow::Result<Telemetry> {
    let providers = otel_enabled.then(init_providers).transpose()?;

    let otel_layer = providers.as_ref().map(|p| {
        global::set_meter_provider(p.meter.clone());
        tracing_opentelemetry::layer().with_tracer(p.tracer.tracer(SERVICE_NAME))
    });
    let fmt_layer = tracing_subscriber::fmt::layer().with_span_events(FmtSpan::CLOSE);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(Telemetry { providers })
}

fn init_providers() -> anyhow::Result<Providers> {
    let resource = Resource::builder().with_service_name(SERVICE_NAME).build();

    let spans = SpanExporter::builder()
        .with_tonic()
        .build()
        .context("Failed to create OTLP span exporter")?;
    let metrics = MetricExporter::builder()
        .with_tonic()
        .build()
        .context("Failed to create OTLP metric exporter")?;

    Ok(Providers {
        tracer: SdkTracerProvider::builder()
            .with_batch_exporter(spans)
            .with_resource(resource.clone())
            .build(),
        meter: SdkMeterProvider::builder()
            .with_periodic_exporter(metrics)
            .with_resource(resource)
            .build(),
    })
}

impl Telemetry {
    pub fn shutdown(self) {
        let Some(providers) = self.providers else {
            return;
        };
        info!("Flushing telemetry...");
        if let Err(e) = providers.tracer.shutdown() {
            warn!(error = %e, "Failed to shut down tracer provider");
        }
        if let Err(e) = providers.meter.shutdown() {
            warn!(error = %e, "Failed to shut down meter provider");
        }
    }
}
