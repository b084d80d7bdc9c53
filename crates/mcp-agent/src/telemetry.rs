//! Exports trace scopes to Langfuse over OTLP/HTTP.
//!
//! Scope spans reach the exporter through a `tracing-opentelemetry` layer
//! that only listens to [`SCOPE_TARGET`]. Spans are batched and posted from
//! the SDK's own thread, so a slow or unreachable collector never holds up
//! a turn.

use std::collections::HashMap;

use mcp_agent_core::trace::SCOPE_TARGET;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::{ExporterBuildError, Protocol, WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};
use tracing::{Level, Subscriber};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::Layer;
use tracing_subscriber::filter::{Filtered, Targets};
use tracing_subscriber::registry::LookupSpan;

use crate::config::TelemetryConfig;

const SERVICE_NAME: &str = "github_mcp";

/// Sends scope spans, and nothing else, to an OpenTelemetry tracer.
pub type ScopeLayer<S> = Filtered<OpenTelemetryLayer<S, SdkTracer>, Targets, S>;

pub struct Telemetry {
    provider: SdkTracerProvider,
}

impl Telemetry {
    /// Builds the Langfuse exporter.
    ///
    /// The OTLP HTTP client is blocking; call this outside the async
    /// runtime.
    pub fn new(config: &TelemetryConfig) -> Result<Self, ExporterBuildError> {
        let headers = HashMap::from([(
            "Authorization".to_owned(),
            config.authorization().to_owned(),
        )]);
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_protocol(Protocol::HttpBinary)
            .with_endpoint(config.endpoint())
            .with_headers(headers)
            .build()?;
        let provider = SdkTracerProvider::builder()
            .with_resource(Resource::builder().with_service_name(SERVICE_NAME).build())
            .with_batch_exporter(exporter)
            .build();
        Ok(Self { provider })
    }

    pub fn layer<S>(&self) -> ScopeLayer<S>
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        scope_layer(&self.provider)
    }

    /// Flushes queued spans. Blocks until the batch processor is done.
    pub fn shutdown(self) {
        match self.provider.shutdown() {
            Ok(()) => debug!("telemetry flushed"),
            Err(err) => warn!("failed to flush telemetry: {err}"),
        }
    }
}

fn scope_layer<S>(provider: &SdkTracerProvider) -> ScopeLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    OpenTelemetryLayer::new(provider.tracer(env!("CARGO_PKG_NAME")))
        .with_filter(Targets::new().with_target(SCOPE_TARGET, Level::INFO))
}
