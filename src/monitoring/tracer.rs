/*!
 * Tracing
 * Subscriber setup and session-scoped spans using the tracing crate
 */

use crate::simulation::{ReconciliationReport, SyncMode};
use std::time::Instant;
use tracing::{info, span, warn, Level, Span};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Initialize the global subscriber
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - HIGHWAY_TRACE_JSON: Enable JSON output (default: false)
///
/// Returns false if a subscriber was already installed.
pub fn init_tracing() -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("HIGHWAY_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .is_ok()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_names(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        info!(json = use_json, "Tracing initialized");
    }
    installed
}

/// Span covering one simulation session, from start to reconciliation
pub struct SessionSpan {
    span: Span,
    start: Instant,
    mode: SyncMode,
}

impl SessionSpan {
    pub fn new(session_id: &str, mode: SyncMode, units: usize) -> Self {
        let span = span!(
            Level::INFO,
            "session",
            session = %session_id,
            mode = %mode,
            units,
            duration_ms = tracing::field::Empty,
            total = tracing::field::Empty,
            lost = tracing::field::Empty,
            consistent = tracing::field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
            mode,
        }
    }

    #[inline]
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }

    /// Attach the reconciliation outcome to the span
    pub fn record_report(&self, report: &ReconciliationReport) {
        self.span.record("total", report.aggregate_total);
        self.span.record("lost", report.lost_distance);
        self.span.record("consistent", report.is_consistent());

        // Protected modes must never lose distance
        if self.mode.is_protected() && !report.is_consistent() {
            let _entered = self.span.enter();
            warn!(
                mode = %self.mode,
                lost = report.lost_distance,
                "Protected mode lost distance"
            );
        }
    }
}

impl Drop for SessionSpan {
    fn drop(&mut self) {
        self.span
            .record("duration_ms", self.start.elapsed().as_millis() as u64);
    }
}
