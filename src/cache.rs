use std::sync::Arc;

use dashmap::DashMap;

use crate::error::StoreError;
use crate::models::Order;
use crate::store::OrderBackend;

// ============================================================================
// Order Cache - concurrent read view of assembled orders
// ============================================================================
//
// Derived, rebuildable state: populated once from the store at startup,
// kept current by the ingestion pipeline, discarded on exit. Lookups never
// touch the database. Values are immutable Arc snapshots replaced wholesale
// on update, so readers can never observe a partially written order.
//
// ============================================================================

#[derive(Default)]
pub struct OrderCache {
    entries: DashMap<String, Arc<Order>>,
}

impl OrderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// One-shot startup load: enumerates every persisted identifier and
    /// assembles each aggregate through the backend. A single corrupt or
    /// unreadable order is logged and skipped; it must not abort the whole
    /// load. Only the identifier enumeration itself is fatal.
    ///
    /// Returns the number of orders loaded. Call once, before serving
    /// traffic; not re-entrant.
    pub async fn bulk_load(&self, backend: &dyn OrderBackend) -> Result<usize, StoreError> {
        let uids = backend.order_uids().await?;
        tracing::info!(total = uids.len(), "loading orders into cache");

        let mut loaded = 0;
        for uid in uids {
            match backend.get_by_uid(&uid).await {
                Ok(Some(order)) => {
                    self.put(order);
                    loaded += 1;
                }
                Ok(None) => {
                    // Row disappeared between enumeration and read.
                    tracing::warn!(order_uid = %uid, "order vanished during bulk load, skipping");
                }
                Err(e) => {
                    tracing::warn!(order_uid = %uid, error = %e, "failed to load order, skipping");
                }
            }
        }

        tracing::info!(loaded, "cache bulk load finished");
        Ok(loaded)
    }

    /// Constant-time point lookup; absent keys are `None`, never an error.
    pub fn get(&self, order_uid: &str) -> Option<Arc<Order>> {
        self.entries.get(order_uid).map(|entry| entry.value().clone())
    }

    /// Unconditional upsert, last write wins. Callers pass a fully
    /// assembled order; the cache never merges partial fields.
    pub fn put(&self, order: Order) {
        self.entries
            .insert(order.order_uid.clone(), Arc::new(order));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tests::sample_order;
    use crate::store::testing::MemoryBackend;

    #[test]
    fn test_get_unknown_uid_is_none() {
        let cache = OrderCache::new();
        assert!(cache.get("nope").is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_put_then_get_returns_same_order() {
        let cache = OrderCache::new();
        let order = sample_order();
        cache.put(order.clone());

        let cached = cache.get(&order.order_uid).unwrap();
        assert_eq!(*cached, order);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_put_overwrites_previous_entry() {
        let cache = OrderCache::new();
        let order = sample_order();
        cache.put(order.clone());

        let mut updated = order.clone();
        updated.track_number = "REPLACED".into();
        cache.put(updated);

        let cached = cache.get(&order.order_uid).unwrap();
        assert_eq!(cached.track_number, "REPLACED");
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_bulk_load_populates_all_orders() {
        let backend = MemoryBackend::new();
        for n in 0..5 {
            let mut order = sample_order();
            order.order_uid = format!("order-{n}");
            backend.seed(order);
        }

        let cache = OrderCache::new();
        let loaded = cache.bulk_load(&backend).await.unwrap();
        assert_eq!(loaded, 5);
        assert_eq!(cache.len(), 5);
        assert!(cache.get("order-3").is_some());
    }

    #[tokio::test]
    async fn test_bulk_load_skips_corrupt_order() {
        let backend = MemoryBackend::new();
        for n in 0..4 {
            let mut order = sample_order();
            order.order_uid = format!("order-{n}");
            backend.seed(order);
        }
        // order-1 has lost its payment row; the other three must still load.
        backend
            .missing_payment
            .lock()
            .unwrap()
            .insert("order-1".into());

        let cache = OrderCache::new();
        let loaded = cache.bulk_load(&backend).await.unwrap();
        assert_eq!(loaded, 3);
        assert!(cache.get("order-1").is_none());
        assert!(cache.get("order-0").is_some());
    }

    #[test]
    fn test_concurrent_readers_and_writer() {
        let cache = Arc::new(OrderCache::new());
        let order = sample_order();
        cache.put(order.clone());

        let mut handles = Vec::new();
        for n in 0..8 {
            let cache = Arc::clone(&cache);
            let uid = order.order_uid.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..500 {
                    if n % 2 == 0 {
                        // Reader: the entry is always a complete order.
                        let cached = cache.get(&uid).unwrap();
                        assert!(!cached.items.is_empty());
                    } else {
                        let mut updated = sample_order();
                        updated.sm_id = i;
                        cache.put(updated);
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 1);
    }
}
