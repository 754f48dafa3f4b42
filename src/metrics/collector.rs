// src/metrics/collector.rs
use crate::health::{Report, Status};
use anyhow::Result;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    /// Text exposition format.
    pub fn gather(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(buffer)
    }
}

pub struct MetricsCollector {
    pub requests_total: IntCounterVec,
    pub evaluation_duration_seconds: Histogram,
    pub probe_status: IntGaugeVec,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        let requests_total = IntCounterVec::new(
            Opts::new(
                "healthcheck_requests_total",
                "Health check requests by verdict",
            ),
            &["verdict"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let evaluation_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "healthcheck_evaluation_duration_seconds",
            "Time to evaluate every probe of a report",
        ))?;
        registry.register(Box::new(evaluation_duration_seconds.clone()))?;

        let probe_status = IntGaugeVec::new(
            Opts::new(
                "healthcheck_probe_status",
                "Last probe status (1=healthy, 0=failed)",
            ),
            &["probe"],
        )?;
        registry.register(Box::new(probe_status.clone()))?;

        Ok(Self {
            requests_total,
            evaluation_duration_seconds,
            probe_status,
        })
    }

    pub fn record_evaluation(&self, report: &Report<Status>, duration: Duration) {
        let verdict = if report.is_healthy() { "healthy" } else { "failed" };
        self.requests_total.with_label_values(&[verdict]).inc();
        self.evaluation_duration_seconds
            .observe(duration.as_secs_f64());

        for element in report.elements() {
            let value = if element.status().is_healthy() { 1 } else { 0 };
            self.probe_status
                .with_label_values(&[element.name()])
                .set(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_evaluation() {
        let registry = MetricsRegistry::new().unwrap();
        let collector = registry.collector();

        let report = Report::new("db", Status::Healthy)
            .unwrap()
            .append("broker", Status::failed("unreachable"))
            .unwrap();
        collector.record_evaluation(&report, Duration::from_millis(12));

        assert_eq!(collector.requests_total.with_label_values(&["failed"]).get(), 1);
        assert_eq!(collector.probe_status.with_label_values(&["db"]).get(), 1);
        assert_eq!(collector.probe_status.with_label_values(&["broker"]).get(), 0);

        let text = String::from_utf8(registry.gather().unwrap()).unwrap();
        assert!(text.contains("healthcheck_requests_total{verdict=\"failed\"} 1"));
    }
}
