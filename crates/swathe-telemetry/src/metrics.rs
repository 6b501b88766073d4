//! Prometheus-backed metrics for the list engine.

use std::sync::Arc;

use anyhow::{Context, Result};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

/// Prometheus-backed metrics registry shared by a list controller and its transport.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    list_fetches_total: IntCounterVec,
    stale_responses_total: IntCounter,
    bulk_actions_total: IntCounterVec,
    cached_queries: IntGauge,
    selected_items: IntGauge,
}

/// Snapshot of selected gauges and counters for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Responses discarded because a newer request superseded them.
    pub stale_responses_total: u64,
    /// Query variants currently held by the item cache.
    pub cached_queries: i64,
    /// Effective selected item count at the last update.
    pub selected_items: i64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let list_fetches_total = IntCounterVec::new(
            Opts::new("list_fetches_total", "List page requests issued by kind"),
            &["kind"],
        )?;
        let stale_responses_total = IntCounter::with_opts(Opts::new(
            "stale_responses_total",
            "List responses discarded because a newer request superseded them",
        ))?;
        let bulk_actions_total = IntCounterVec::new(
            Opts::new("bulk_actions_total", "Bulk actions dispatched by verb and outcome"),
            &["action", "outcome"],
        )?;
        let cached_queries = IntGauge::with_opts(Opts::new(
            "cached_queries",
            "Query variants held by the item cache",
        ))?;
        let selected_items = IntGauge::with_opts(Opts::new(
            "selected_items",
            "Effective number of selected items",
        ))?;

        registry.register(Box::new(list_fetches_total.clone()))?;
        registry.register(Box::new(stale_responses_total.clone()))?;
        registry.register(Box::new(bulk_actions_total.clone()))?;
        registry.register(Box::new(cached_queries.clone()))?;
        registry.register(Box::new(selected_items.clone()))?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                list_fetches_total,
                stale_responses_total,
                bulk_actions_total,
                cached_queries,
                selected_items,
            }),
        })
    }

    /// Increment the list fetch counter for a request kind.
    pub fn inc_list_fetch(&self, kind: &str) {
        self.inner
            .list_fetches_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Increment the stale response counter.
    pub fn inc_stale_response(&self) {
        self.inner.stale_responses_total.inc();
    }

    /// Increment the bulk action counter for a verb and outcome.
    pub fn inc_bulk_action(&self, action: &str, outcome: &str) {
        self.inner
            .bulk_actions_total
            .with_label_values(&[action, outcome])
            .inc();
    }

    /// Set the cached query gauge.
    pub fn set_cached_queries(&self, count: usize) {
        self.inner
            .cached_queries
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Set the selected item gauge.
    pub fn set_selected_items(&self, count: u64) {
        self.inner
            .selected_items
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .context("failed to encode Prometheus metrics")?;
        String::from_utf8(buffer).context("metrics output was not valid UTF-8")
    }

    /// Take a point-in-time snapshot of the gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            stale_responses_total: self.inner.stale_responses_total.get(),
            cached_queries: self.inner.cached_queries.get(),
            selected_items: self.inner.selected_items.get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_render_in_exposition_format() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_list_fetch("initial");
        metrics.inc_bulk_action("remove", "ok");
        metrics.inc_stale_response();
        metrics.set_selected_items(497);

        let rendered = metrics.render()?;
        assert!(rendered.contains("list_fetches_total{kind=\"initial\"} 1"));
        assert!(rendered.contains("bulk_actions_total{action=\"remove\",outcome=\"ok\"} 1"));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.stale_responses_total, 1);
        assert_eq!(snapshot.selected_items, 497);
        Ok(())
    }
}
