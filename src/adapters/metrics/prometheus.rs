//! Prometheus Metrics Registry - Ingest Observability
//!
//! Registers the ingest pipeline metrics on a private registry so tests
//! can build independent instances. All metrics follow the naming
//! convention `mcap_ingest_*` and carry feed/source labels.

use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};

/// Centralized Prometheus metrics for the ingest pipeline.
pub struct IngestMetrics {
    /// Prometheus registry.
    registry: Registry,
    /// Successful poll cycles.
    pub cycles_total: IntCounterVec,
    /// Failed poll cycles by error kind.
    pub cycle_failures_total: IntCounterVec,
    /// Validation outcomes by stage.
    pub validations_total: IntCounterVec,
    /// Records written by the last successful cycle.
    pub records_last_cycle: IntGaugeVec,
    /// Feed lifecycle flag (1 = active).
    pub feed_active: IntGaugeVec,
    /// Unix seconds of the last successful cycle.
    pub last_success_timestamp: GaugeVec,
    /// Wall time of one cycle (fetch through persist).
    pub cycle_duration_seconds: HistogramVec,
}

impl IngestMetrics {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let cycles_total = IntCounterVec::new(
            Opts::new("mcap_ingest_cycles_total", "Successful poll cycles"),
            &["feed", "source"],
        )?;

        let cycle_failures_total = IntCounterVec::new(
            Opts::new(
                "mcap_ingest_cycle_failures_total",
                "Failed poll cycles by error kind",
            ),
            &["feed", "source", "kind"],
        )?;

        let validations_total = IntCounterVec::new(
            Opts::new(
                "mcap_ingest_validations_total",
                "Payload validation outcomes by stage",
            ),
            &["source", "stage", "outcome"],
        )?;

        let records_last_cycle = IntGaugeVec::new(
            Opts::new(
                "mcap_ingest_records_last_cycle",
                "Records persisted by the last successful cycle",
            ),
            &["feed"],
        )?;

        let feed_active = IntGaugeVec::new(
            Opts::new("mcap_ingest_feed_active", "Feed lifecycle (1=active, 0=inactive)"),
            &["feed"],
        )?;

        let last_success_timestamp = GaugeVec::new(
            Opts::new(
                "mcap_ingest_last_success_timestamp_seconds",
                "Unix time of the last successful cycle",
            ),
            &["feed"],
        )?;

        let cycle_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "mcap_ingest_cycle_duration_seconds",
                "Duration of one poll cycle in seconds",
            )
            .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
            &["feed"],
        )?;

        registry.register(Box::new(cycles_total.clone()))?;
        registry.register(Box::new(cycle_failures_total.clone()))?;
        registry.register(Box::new(validations_total.clone()))?;
        registry.register(Box::new(records_last_cycle.clone()))?;
        registry.register(Box::new(feed_active.clone()))?;
        registry.register(Box::new(last_success_timestamp.clone()))?;
        registry.register(Box::new(cycle_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            cycles_total,
            cycle_failures_total,
            validations_total,
            records_last_cycle,
            feed_active,
            last_success_timestamp,
            cycle_duration_seconds,
        })
    }

    /// Encode every registered metric in the Prometheus text format.
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
