//! The metrics seam between the pipelines and whatever scrapes them.
//!
//! Pipeline code reports through [`MetricsSink`] by metric name; the
//! Prometheus binding is a thin adapter owning a registry with the fixed
//! KV6 metric families. Exposition (HTTP, push gateway) is the deployment's
//! concern, reachable through [`PrometheusMetrics::registry`].

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};

/// Counter, label `status` in {ok, warning, error}: payloads received.
pub const MESSAGES_TOTAL: &str = "kv6_vv_tm_push_messages_total";
/// Counter: rows written to columnar files.
pub const RECORDS_WRITTEN: &str = "kv6_vv_tm_push_records_written";
/// Histogram: records per payload.
pub const RECORDS_AMOUNT: &str = "kv6_vv_tm_push_records_amount";
/// Histogram: milliseconds spent parsing one payload.
pub const PARSE_MILLIS: &str = "kv6_vv_tm_push_message_parse_millis";
/// Histogram: payload sizes in bytes.
pub const PAYLOAD_SIZE: &str = "kv6_payload_size";

pub trait MetricsSink: Send + Sync {
    fn counter_add(&self, name: &str, labels: &[(&str, &str)], value: u64);
    fn histogram_observe(&self, name: &str, value: f64);

    fn counter_inc(&self, name: &str, labels: &[(&str, &str)]) {
        self.counter_add(name, labels, 1);
    }
}

/// Discards everything. For tests and tools that do not report.
pub struct NullMetrics;

impl MetricsSink for NullMetrics {
    fn counter_add(&self, _name: &str, _labels: &[(&str, &str)], _value: u64) {}
    fn histogram_observe(&self, _name: &str, _value: f64) {}
}

pub struct PrometheusMetrics {
    registry: Registry,
    messages_total: IntCounterVec,
    records_written: IntCounter,
    records_amount: Histogram,
    parse_millis: Histogram,
    payload_size: Histogram,
}

impl PrometheusMetrics {
    pub fn new() -> prometheus::Result<PrometheusMetrics> {
        let registry = Registry::new();

        let messages_total = IntCounterVec::new(
            Opts::new(MESSAGES_TOTAL, "Number of KV6 VV_TM_PUSH messages received"),
            &["status"],
        )?;
        let records_written = IntCounter::with_opts(Opts::new(
            RECORDS_WRITTEN,
            "Number of VV_TM_PUSH records written to disk",
        ))?;
        let records_amount = Histogram::with_opts(
            HistogramOpts::new(RECORDS_AMOUNT, "Number of KV6 VV_TM_PUSH records")
                .buckets(vec![5.0, 10.0, 20.0, 50.0, 100.0, 250.0, 500.0]),
        )?;
        let parse_millis = Histogram::with_opts(
            HistogramOpts::new(
                PARSE_MILLIS,
                "Milliseconds taken to parse KV6 VV_TM_PUSH messages",
            )
            .buckets(vec![0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 100.0, 1000.0, 2000.0]),
        )?;
        let payload_size = Histogram::with_opts(
            HistogramOpts::new(PAYLOAD_SIZE, "Sizes of KV6 message payloads")
                .buckets(vec![500.0, 1000.0, 2500.0, 5000.0, 10000.0, 25000.0, 50000.0]),
        )?;

        registry.register(Box::new(messages_total.clone()))?;
        registry.register(Box::new(records_written.clone()))?;
        registry.register(Box::new(records_amount.clone()))?;
        registry.register(Box::new(parse_millis.clone()))?;
        registry.register(Box::new(payload_size.clone()))?;

        Ok(PrometheusMetrics {
            registry,
            messages_total,
            records_written,
            records_amount,
            parse_millis,
            payload_size,
        })
    }

    /// The registry backing this sink, for whatever exposition the binary
    /// wires up.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl MetricsSink for PrometheusMetrics {
    fn counter_add(&self, name: &str, labels: &[(&str, &str)], value: u64) {
        match name {
            MESSAGES_TOTAL => {
                let status = labels
                    .iter()
                    .find(|(k, _)| *k == "status")
                    .map(|(_, v)| *v)
                    .unwrap_or("");
                self.messages_total.with_label_values(&[status]).inc_by(value);
            }
            RECORDS_WRITTEN => self.records_written.inc_by(value),
            _ => log::debug!("unregistered counter {name}"),
        }
    }

    fn histogram_observe(&self, name: &str, value: f64) {
        match name {
            RECORDS_AMOUNT => self.records_amount.observe(value),
            PARSE_MILLIS => self.parse_millis.observe(value),
            PAYLOAD_SIZE => self.payload_size.observe(value),
            _ => log::debug!("unregistered histogram {name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_counters_are_labelled() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.counter_inc(MESSAGES_TOTAL, &[("status", "ok")]);
        metrics.counter_inc(MESSAGES_TOTAL, &[("status", "ok")]);
        metrics.counter_inc(MESSAGES_TOTAL, &[("status", "error")]);
        metrics.counter_add(RECORDS_WRITTEN, &[], 25);

        let families = metrics.registry().gather();
        let messages = families
            .iter()
            .find(|f| f.get_name() == MESSAGES_TOTAL)
            .unwrap();
        let by_status: Vec<(String, f64)> = messages
            .get_metric()
            .iter()
            .map(|m| {
                (
                    m.get_label()[0].get_value().to_string(),
                    m.get_counter().get_value(),
                )
            })
            .collect();
        assert!(by_status.contains(&("ok".to_string(), 2.0)));
        assert!(by_status.contains(&("error".to_string(), 1.0)));

        let written = families
            .iter()
            .find(|f| f.get_name() == RECORDS_WRITTEN)
            .unwrap();
        assert_eq!(written.get_metric()[0].get_counter().get_value(), 25.0);
    }

    #[test]
    fn histograms_count_observations() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.histogram_observe(PAYLOAD_SIZE, 1200.0);
        metrics.histogram_observe(PAYLOAD_SIZE, 80000.0);
        let families = metrics.registry().gather();
        let payloads = families
            .iter()
            .find(|f| f.get_name() == PAYLOAD_SIZE)
            .unwrap();
        assert_eq!(payloads.get_metric()[0].get_histogram().get_sample_count(), 2);
    }

    #[test]
    fn null_sink_accepts_anything() {
        NullMetrics.counter_inc("whatever", &[]);
        NullMetrics.histogram_observe("whatever", 1.0);
    }
}
