use std::sync::Arc;

use anyhow::Context;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::Message;
use tokio_util::sync::CancellationToken;

use crate::cache::OrderCache;
use crate::config::Config;
use crate::metrics::Metrics;
use crate::models::Order;
use crate::store::OrderBackend;

// ============================================================================
// Ingestion Pipeline - Kafka -> store -> cache
// ============================================================================
//
// One logical task drains the orders topic: decode, durable transactional
// save, mirror into the cache. Every per-message failure (decode,
// validation, persistence) is contained at the message boundary; the
// message is logged, counted and dropped, and the loop moves on. Only a
// consumer-level stream error is fatal, and it propagates to the
// supervisor in main rather than being retried here.
//
// ============================================================================

pub struct OrderConsumer {
    consumer: StreamConsumer,
    backend: Arc<dyn OrderBackend>,
    cache: Arc<OrderCache>,
    metrics: Arc<Metrics>,
}

/// What happened to a single message. Returned by `ingest_payload` so the
/// per-message semantics are testable without a broker.
#[derive(Debug, PartialEq)]
pub enum IngestOutcome {
    /// Saved and mirrored; carries the order identifier.
    Stored(String),
    /// Payload was not a valid order message.
    DecodeFailed,
    /// Decoded but rejected by validation or the transactional write.
    Dropped,
}

impl OrderConsumer {
    pub fn new(
        config: &Config,
        backend: Arc<dyn OrderBackend>,
        cache: Arc<OrderCache>,
        metrics: Arc<Metrics>,
    ) -> anyhow::Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.kafka_brokers)
            .set("group.id", &config.kafka_group_id)
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "false")
            .create()
            .context("failed to create Kafka consumer")?;

        consumer
            .subscribe(&[&config.kafka_topic])
            .with_context(|| format!("failed to subscribe to topic {}", config.kafka_topic))?;

        tracing::info!(
            topic = %config.kafka_topic,
            group_id = %config.kafka_group_id,
            "Kafka consumer created"
        );

        Ok(Self {
            consumer,
            backend,
            cache,
            metrics,
        })
    }

    /// Poll loop. Checks the cancellation token at every iteration
    /// boundary; an in-flight message is always processed to completion
    /// before the loop exits.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        tracing::info!("ingestion pipeline started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("ingestion pipeline stopping");
                    return Ok(());
                }
                received = self.consumer.recv() => {
                    // A consumer-level error means the stream itself is
                    // broken; let the supervisor decide what happens next.
                    let message = received.context("Kafka consumer failed")?;

                    match message.payload() {
                        Some(payload) => {
                            ingest_payload(payload, self.backend.as_ref(), &self.cache, &self.metrics)
                                .await;
                        }
                        None => {
                            tracing::warn!("skipping message with empty payload");
                            self.metrics.ingest_failures.with_label_values(&["decode"]).inc();
                        }
                    }

                    // Offsets advance even for dropped messages; there is
                    // no dead-letter or redelivery in this design.
                    if let Err(e) = self.consumer.commit_message(&message, CommitMode::Async) {
                        tracing::warn!(error = %e, "offset commit failed");
                    }
                }
            }
        }
    }
}

/// Processes one message payload end to end: decode, save, mirror.
pub(crate) async fn ingest_payload(
    payload: &[u8],
    backend: &dyn OrderBackend,
    cache: &OrderCache,
    metrics: &Metrics,
) -> IngestOutcome {
    let order: Order = match serde_json::from_slice(payload) {
        Ok(order) => order,
        Err(e) => {
            tracing::warn!(error = %e, "failed to decode order message, skipping");
            metrics.ingest_failures.with_label_values(&["decode"]).inc();
            return IngestOutcome::DecodeFailed;
        }
    };

    match backend.save(&order).await {
        Ok(persisted) => {
            let order_uid = persisted.order_uid.clone();
            // Best-effort mirror of what was just committed. The cached
            // snapshot is the persisted form, timestamp defaulting included.
            cache.put(persisted);
            metrics.orders_ingested.inc();
            metrics.cache_orders.set(cache.len() as i64);
            tracing::info!(order_uid = %order_uid, "order ingested");
            IngestOutcome::Stored(order_uid)
        }
        Err(e) => {
            tracing::warn!(
                order_uid = %order.order_uid,
                error = %e,
                "failed to process order, dropping message"
            );
            metrics.ingest_failures.with_label_values(&[e.kind()]).inc();
            IngestOutcome::Dropped
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
