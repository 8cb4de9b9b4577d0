//! OpenTelemetry metrics for boomerang, exported via OTLP to a collector
//! that Prometheus can scrape.
//!
//! Instrument set mirrors the component boundaries in the storage and
//! dispatcher crates: bulk writer throughput/latency, dispatch call
//! outcomes/latency, in-flight HTTP concurrency, and ingress accept/reject
//! counts.

mod error;
mod exporter;

pub use error::MetricsError;

use boomerang_common::config::MetricsConfig;
use opentelemetry::metrics::{Counter, Histogram, Meter, MeterProvider as _, UpDownCounter};
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;

/// Metric instruments for the storage and dispatch pipeline.
pub struct Metrics {
    bulk_ops_total: Counter<u64>,
    bulk_flush_duration_seconds: Histogram<f64>,
    dispatch_calls_total: Counter<u64>,
    dispatch_duration_seconds: Histogram<f64>,
    dispatch_inflight: UpDownCounter<i64>,
    submit_requests_total: Counter<u64>,
    provider: Option<SdkMeterProvider>,
}

impl Metrics {
    #[must_use]
    pub fn new(meter: &Meter) -> Self {
        Self::with_provider(meter, None)
    }

    fn with_provider(meter: &Meter, provider: Option<SdkMeterProvider>) -> Self {
        Self {
            provider,
            bulk_ops_total: meter
                .u64_counter("boomerang.bulk.ops.total")
                .with_description("BulkProcessor flush outcomes, labeled by op and success")
                .build(),
            bulk_flush_duration_seconds: meter
                .f64_histogram("boomerang.bulk.flush.duration.seconds")
                .with_description("BulkProcessor flush latency, labeled by op")
                .build(),
            dispatch_calls_total: meter
                .u64_counter("boomerang.dispatch.calls.total")
                .with_description("Dispatcher HTTP call outcomes, labeled by success and http_status")
                .build(),
            dispatch_duration_seconds: meter
                .f64_histogram("boomerang.dispatch.duration.seconds")
                .with_description("Dispatcher HTTP call latency, labeled by success")
                .build(),
            dispatch_inflight: meter
                .i64_up_down_counter("boomerang.dispatch.inflight")
                .with_description("HTTP calls currently in flight")
                .build(),
            submit_requests_total: meter
                .u64_counter("boomerang.submit.requests.total")
                .with_description("Submit requests accepted/rejected, labeled by status")
                .build(),
        }
    }

    pub fn record_bulk_op(&self, op: &'static str, success: bool, duration_secs: f64) {
        self.bulk_ops_total
            .add(1, &[KeyValue::new("op", op), KeyValue::new("success", success)]);
        self.bulk_flush_duration_seconds
            .record(duration_secs, &[KeyValue::new("op", op)]);
    }

    pub fn record_dispatch_call(&self, success: bool, http_status: Option<u16>, duration_secs: f64) {
        let status = http_status.map_or_else(|| "none".to_string(), |s| s.to_string());
        self.dispatch_calls_total.add(
            1,
            &[KeyValue::new("success", success), KeyValue::new("http_status", status)],
        );
        self.dispatch_duration_seconds
            .record(duration_secs, &[KeyValue::new("success", success)]);
    }

    pub fn inflight_started(&self) {
        self.dispatch_inflight.add(1, &[]);
    }

    pub fn inflight_finished(&self) {
        self.dispatch_inflight.add(-1, &[]);
    }

    pub fn record_submit(&self, status: &'static str) {
        self.submit_requests_total.add(1, &[KeyValue::new("status", status)]);
    }

    /// Flushes and shuts down the OTLP exporter, if one is running. A no-op
    /// when metrics are disabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the exporter fails to flush its pending batch.
    pub fn shutdown(&self) -> Result<(), MetricsError> {
        if let Some(provider) = &self.provider {
            provider
                .shutdown()
                .map_err(|e| MetricsError::OpenTelemetry(e.to_string()))?;
        }
        Ok(())
    }
}

/// Initializes the OTLP exporter and builds the instrument set. A no-op
/// stub (no export, instruments still callable) when `config.enabled` is
/// false, so callers never need to branch on whether metrics are on.
///
/// # Errors
///
/// Returns an error if the OTLP exporter cannot be constructed.
pub fn init(config: &MetricsConfig) -> Result<Metrics, MetricsError> {
    if config.enabled {
        let provider = exporter::init_otlp_exporter(&config.endpoint)?;
        let meter = provider.meter("boomerang");
        Ok(Metrics::with_provider(&meter, Some(provider)))
    } else {
        let meter = opentelemetry::global::meter("boomerang");
        Ok(Metrics::new(&meter))
    }
}
