//! Named, nestable scopes for grouping agent work.
//!
//! A scope is an `info` span with target [`SCOPE_TARGET`] wrapped around a
//! future. Scopes entered while another is being polled become its
//! children, so the two prompts of one session, and the model calls and
//! tool invocations inside them, end up in one trace. Nothing here talks
//! to a collector: attach a `tracing-opentelemetry` layer filtered on
//! [`SCOPE_TARGET`] to export them.
//!
//! The outcome is recorded with the `otel.*` field names understood by
//! `tracing-opentelemetry`. A scope whose future is dropped before it
//! finishes keeps an unset status and gets `scope.cancelled = true`.
//!
//! Nesting follows the current span, so it crosses `.await` points but not
//! into spawned tasks.

use std::fmt::Display;

use tracing::field::Empty;
use tracing::{Instrument, Span};

/// The target of every scope span.
pub const SCOPE_TARGET: &str = "mcp_agent::scope";

/// Runs `fut` inside a scope named `name`.
///
/// The scope's status follows the future's result and the span is closed
/// on every exit path, including the future being dropped early.
pub async fn with_scope<F, T, E>(name: &str, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    let span = info_span!(
        target: SCOPE_TARGET,
        "scope",
        otel.name = name,
        otel.status_code = Empty,
        otel.status_message = Empty,
        scope.cancelled = Empty,
    );
    let mut guard = ScopeGuard {
        span: Some(span.clone()),
    };
    let result = fut.instrument(span).await;
    guard.finish(result.as_ref().map(|_| ()).map_err(ToString::to_string));
    result
}

struct ScopeGuard {
    span: Option<Span>,
}

impl ScopeGuard {
    fn finish(&mut self, outcome: Result<(), String>) {
        let Some(span) = self.span.take() else {
            return;
        };
        match outcome {
            Ok(()) => {
                span.record("otel.status_code", "ok");
            }
            Err(message) => {
                // The message implies an error status, so it goes last.
                span.record("otel.status_code", "error");
                span.record("otel.status_message", message.as_str());
            }
        }
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if let Some(span) = self.span.take() {
            span.record("scope.cancelled", true);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider, SpanData};
    use tracing::Level;
    use tracing_opentelemetry::OpenTelemetryLayer;
    use tracing_subscriber::Layer as _;
    use tracing_subscriber::filter::Targets;
    use tracing_subscriber::layer::SubscriberExt;

    use super::SCOPE_TARGET;

    /// Collects scope spans on the current thread until dropped.
    pub struct ScopeCapture {
        exporter: InMemorySpanExporter,
        _provider: SdkTracerProvider,
        _guard: tracing::subscriber::DefaultGuard,
    }

    impl ScopeCapture {
        pub fn install() -> Self {
            let exporter = InMemorySpanExporter::default();
            let provider = SdkTracerProvider::builder()
                .with_simple_exporter(exporter.clone())
                .build();
            let layer = OpenTelemetryLayer::new(provider.tracer("test"))
                .with_filter(Targets::new().with_target(SCOPE_TARGET, Level::TRACE));
            let subscriber = tracing_subscriber::registry().with(layer);
            Self {
                exporter,
                _provider: provider,
                _guard: tracing::subscriber::set_default(subscriber),
            }
        }

        /// Finished spans, innermost first.
        pub fn spans(&self) -> Vec<SpanData> {
            self.exporter.get_finished_spans().unwrap()
        }
    }

    pub fn attribute<'a>(span: &'a SpanData, key: &str) -> Option<&'a opentelemetry::Value> {
        span.attributes
            .iter()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| &kv.value)
    }
}
