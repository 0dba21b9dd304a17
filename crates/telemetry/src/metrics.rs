//! Prometheus metrics for slippage checks.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, Opts, Registry, TextEncoder,
};

/// Metrics collector for a slippage run.
///
/// Each instance owns its registry, so several collectors can coexist in one
/// process.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    queries_executed: IntCounter,
    query_errors: IntCounter,
    query_latency: HistogramVec,
    observations_fetched: IntCounter,
    solvers_flagged: IntCounter,
}

impl Metrics {
    /// Create a new metrics instance.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let queries_executed = IntCounter::with_opts(Opts::new(
            "slippage_queries_executed_total",
            "Total number of slippage queries executed",
        ))?;
        registry.register(Box::new(queries_executed.clone()))?;

        let query_errors = IntCounter::with_opts(Opts::new(
            "slippage_query_errors_total",
            "Total number of failed slippage queries",
        ))?;
        registry.register(Box::new(query_errors.clone()))?;

        let query_latency = HistogramVec::new(
            HistogramOpts::new(
                "slippage_query_latency_seconds",
                "Query service call latency in seconds",
            ),
            &["operation"],
        )?;
        registry.register(Box::new(query_latency.clone()))?;

        let observations_fetched = IntCounter::with_opts(Opts::new(
            "slippage_observations_fetched_total",
            "Total number of slippage observations fetched",
        ))?;
        registry.register(Box::new(observations_fetched.clone()))?;

        let solvers_flagged = IntCounter::with_opts(Opts::new(
            "slippage_solvers_flagged_total",
            "Total number of solvers classified as pennying",
        ))?;
        registry.register(Box::new(solvers_flagged.clone()))?;

        Ok(Self {
            registry,
            queries_executed,
            query_errors,
            query_latency,
            observations_fetched,
            solvers_flagged,
        })
    }

    pub fn inc_queries_executed(&self) {
        self.queries_executed.inc();
    }

    pub fn inc_query_errors(&self) {
        self.query_errors.inc();
    }

    /// Record query service latency.
    pub fn observe_query_latency(&self, operation: &str, duration_secs: f64) {
        self.query_latency
            .with_label_values(&[operation])
            .observe(duration_secs);
    }

    pub fn inc_observations_fetched(&self, count: u64) {
        self.observations_fetched.inc_by(count);
    }

    pub fn inc_solvers_flagged(&self, count: u64) {
        self.solvers_flagged.inc_by(count);
    }

    /// Get Prometheus metrics as a string.
    pub fn gather(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_independent_registries() {
        let first = Metrics::new().unwrap();
        let second = Metrics::new().unwrap();

        first.inc_queries_executed();
        first.inc_observations_fetched(42);

        let text = first.gather().unwrap();
        assert!(text.contains("slippage_queries_executed_total 1"));
        assert!(text.contains("slippage_observations_fetched_total 42"));
        assert!(second
            .gather()
            .unwrap()
            .contains("slippage_queries_executed_total 0"));
    }

    #[test]
    fn test_latency_labelled_by_operation() {
        let metrics = Metrics::new().unwrap();
        metrics.observe_query_latency("execute", 0.25);

        let text = metrics.gather().unwrap();
        assert!(text.contains(r#"slippage_query_latency_seconds_count{operation="execute"} 1"#));
    }
}
