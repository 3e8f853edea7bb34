use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

// ============================================================================
// Metrics - Prometheus counters for the ingestion pipeline and lookups
// ============================================================================
//
// Registered against a private registry and scraped via the HTTP /metrics
// route. The ingest failure counter is labelled with the error taxonomy
// (decode / validation / persistence) so dropped messages stay visible.
//
// ============================================================================

pub struct Metrics {
    registry: Registry,

    pub orders_ingested: IntCounter,
    pub ingest_failures: IntCounterVec,
    pub cache_orders: IntGauge,
    pub lookup_requests: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let orders_ingested = IntCounter::new(
            "orders_ingested_total",
            "Orders durably saved and mirrored into the cache",
        )?;
        registry.register(Box::new(orders_ingested.clone()))?;

        let ingest_failures = IntCounterVec::new(
            Opts::new(
                "ingest_failures_total",
                "Messages dropped during ingestion, by failure kind",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(ingest_failures.clone()))?;

        let cache_orders = IntGauge::new("cache_orders", "Orders currently held in the cache")?;
        registry.register(Box::new(cache_orders.clone()))?;

        let lookup_requests = IntCounterVec::new(
            Opts::new("lookup_requests_total", "Order lookups served, by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(lookup_requests.clone()))?;

        Ok(Self {
            registry,
            orders_ingested,
            ingest_failures,
            cache_orders,
            lookup_requests,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_register_and_encode() {
        use prometheus::{Encoder, TextEncoder};

        let metrics = Metrics::new().unwrap();
        metrics.orders_ingested.inc();
        metrics.ingest_failures.with_label_values(&["decode"]).inc();
        metrics.cache_orders.set(7);

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&metrics.registry().gather(), &mut buffer)
            .unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("orders_ingested_total 1"));
        assert!(text.contains("cache_orders 7"));
        assert!(text.contains("ingest_failures_total{reason=\"decode\"} 1"));
    }
}
