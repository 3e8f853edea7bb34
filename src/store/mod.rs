use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use crate::error::StoreError;
use crate::models::Order;
use crate::repository::{deliveries, items, orders, payments};

// ============================================================================
// Order Store - transactional write / whole-aggregate read
// ============================================================================
//
// Composes the four table mappers into one atomic save and one assembled
// read. The store is the only writer to the four tables; the cache never
// writes through.
//
// ============================================================================

/// Narrow seam between the pipeline/cache and storage. The Postgres
/// implementation is `OrderStore`; tests substitute an in-memory double.
#[async_trait]
pub trait OrderBackend: Send + Sync {
    /// Validates, defaults the creation timestamp, and persists the whole
    /// aggregate atomically. Returns the order as persisted.
    async fn save(&self, order: &Order) -> Result<Order, StoreError>;

    /// Assembles the full aggregate, or `None` when the order row is absent.
    async fn get_by_uid(&self, order_uid: &str) -> Result<Option<Order>, StoreError>;

    /// Every persisted order identifier, for the startup bulk-load.
    async fn order_uids(&self) -> Result<Vec<String>, StoreError>;
}

/// Gate checked before any I/O. A violation means the message was
/// structurally valid JSON but semantically incomplete.
pub fn validate(order: &Order) -> Result<(), StoreError> {
    if order.order_uid.trim().is_empty() {
        return Err(StoreError::Validation {
            field: "order_uid",
            reason: "must not be empty",
        });
    }
    if order.items.is_empty() {
        return Err(StoreError::Validation {
            field: "items",
            reason: "order must contain at least one item",
        });
    }
    if order.delivery.name.trim().is_empty() {
        return Err(StoreError::Validation {
            field: "delivery.name",
            reason: "must not be empty",
        });
    }
    if order.delivery.phone.trim().is_empty() {
        return Err(StoreError::Validation {
            field: "delivery.phone",
            reason: "must not be empty",
        });
    }
    Ok(())
}

pub struct OrderStore {
    pool: PgPool,
}

impl OrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderBackend for OrderStore {
    async fn save(&self, order: &Order) -> Result<Order, StoreError> {
        validate(order)?;

        let mut order = order.clone();
        if order.created_at_is_unset() {
            order.date_created = Utc::now();
        }

        // One transaction for all four tables, inserted in the fixed
        // order -> delivery -> payment -> items sequence. Any error
        // propagates before commit, and dropping the transaction rolls
        // everything back.
        let mut tx = self.pool.begin().await?;

        orders::insert(&mut *tx, &order).await?;
        deliveries::insert(&mut *tx, &order.delivery, &order.order_uid).await?;
        payments::insert(&mut *tx, &order.payment, &order.order_uid).await?;
        items::insert(&mut *tx, &order.items, &order.order_uid).await?;

        tx.commit().await?;

        tracing::info!(order_uid = %order.order_uid, "order saved");
        Ok(order)
    }

    async fn get_by_uid(&self, order_uid: &str) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;

        let Some(row) = orders::fetch(&mut *conn, order_uid).await? else {
            return Ok(None);
        };

        // An order row without its delivery or payment is a corrupt
        // aggregate, not a missing one.
        let delivery = deliveries::fetch(&mut *conn, order_uid)
            .await?
            .ok_or_else(|| StoreError::Integrity {
                order_uid: order_uid.to_string(),
                entity: "delivery",
            })?;
        let payment = payments::fetch(&mut *conn, order_uid)
            .await?
            .ok_or_else(|| StoreError::Integrity {
                order_uid: order_uid.to_string(),
                entity: "payment",
            })?;
        let order_items = items::fetch(&mut *conn, order_uid).await?;

        Ok(Some(Order {
            order_uid: row.order_uid,
            track_number: row.track_number,
            entry: row.entry,
            delivery,
            payment,
            items: order_items,
            locale: row.locale,
            internal_signature: row.internal_signature,
            customer_id: row.customer_id,
            delivery_service: row.delivery_service,
            shardkey: row.shardkey,
            sm_id: row.sm_id,
            date_created: row.date_created,
            oof_shard: row.oof_shard,
        }))
    }

    async fn order_uids(&self) -> Result<Vec<String>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::all_uids(&mut *conn).await?)
    }
}

// ============================================================================
// In-memory backend for tests
// ============================================================================

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::{BTreeMap, HashSet};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use super::*;

    /// Test double with the same save semantics as the Postgres store
    /// (validation gate, timestamp defaulting, last-write-wins), plus
    /// switches to simulate persistence failures and corrupt aggregates.
    #[derive(Default)]
    pub(crate) struct MemoryBackend {
        orders: Mutex<BTreeMap<String, Order>>,
        pub fail_saves: AtomicBool,
        pub missing_payment: Mutex<HashSet<String>>,
    }

    impl MemoryBackend {
        pub fn new() -> Self {
            Self::default()
        }

        /// Seeds a persisted order directly, bypassing validation the way
        /// pre-existing rows in the database would.
        pub fn seed(&self, order: Order) {
            self.orders
                .lock()
                .unwrap()
                .insert(order.order_uid.clone(), order);
        }

        pub fn contains(&self, order_uid: &str) -> bool {
            self.orders.lock().unwrap().contains_key(order_uid)
        }
    }

    #[async_trait]
    impl OrderBackend for MemoryBackend {
        async fn save(&self, order: &Order) -> Result<Order, StoreError> {
            validate(order)?;

            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(StoreError::Persistence(sqlx::Error::PoolClosed));
            }

            let mut order = order.clone();
            if order.created_at_is_unset() {
                order.date_created = Utc::now();
            }
            self.orders
                .lock()
                .unwrap()
                .insert(order.order_uid.clone(), order.clone());
            Ok(order)
        }

        async fn get_by_uid(&self, order_uid: &str) -> Result<Option<Order>, StoreError> {
            let orders = self.orders.lock().unwrap();
            let Some(order) = orders.get(order_uid) else {
                return Ok(None);
            };
            if self.missing_payment.lock().unwrap().contains(order_uid) {
                return Err(StoreError::Integrity {
                    order_uid: order_uid.to_string(),
                    entity: "payment",
                });
            }
            Ok(Some(order.clone()))
        }

        async fn order_uids(&self) -> Result<Vec<String>, StoreError> {
            Ok(self.orders.lock().unwrap().keys().cloned().collect())
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::testing::MemoryBackend;
    use super::*;
    use crate::models::tests::sample_order;
    use crate::models::epoch;

    #[test]
    fn test_validate_accepts_complete_order() {
        assert!(validate(&sample_order()).is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_uid() {
        let mut order = sample_order();
        order.order_uid = "  ".into();
        assert!(matches!(
            validate(&order),
            Err(StoreError::Validation { field: "order_uid", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_no_items() {
        let mut order = sample_order();
        order.items.clear();
        assert!(matches!(
            validate(&order),
            Err(StoreError::Validation { field: "items", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_blank_delivery_contact() {
        let mut order = sample_order();
        order.delivery.name = String::new();
        assert!(matches!(
            validate(&order),
            Err(StoreError::Validation { field: "delivery.name", .. })
        ));

        let mut order = sample_order();
        order.delivery.phone = " ".into();
        assert!(matches!(
            validate(&order),
            Err(StoreError::Validation { field: "delivery.phone", .. })
        ));
    }

    #[tokio::test]
    async fn test_save_rejects_invalid_order_with_zero_writes() {
        let backend = MemoryBackend::new();
        let mut order = sample_order();
        order.items.clear();

        let err = backend.save(&order).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation { .. }));
        assert_eq!(backend.get_by_uid(&order.order_uid).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_defaults_unset_timestamp() {
        let backend = MemoryBackend::new();
        let mut order = sample_order();
        order.date_created = epoch();

        let persisted = backend.save(&order).await.unwrap();
        assert!(!persisted.created_at_is_unset());
        let fetched = backend.get_by_uid(&order.order_uid).await.unwrap().unwrap();
        assert!(fetched.date_created > epoch());
    }

    #[tokio::test]
    async fn test_save_keeps_supplied_timestamp() {
        let backend = MemoryBackend::new();
        let order = sample_order();

        let persisted = backend.save(&order).await.unwrap();
        assert_eq!(persisted.date_created, order.date_created);
    }

    #[tokio::test]
    async fn test_resave_is_last_write_wins() {
        let backend = MemoryBackend::new();
        let order = sample_order();
        backend.save(&order).await.unwrap();

        let mut updated = order.clone();
        updated.track_number = "NEWTRACK".into();
        updated.items[0].brand = "Other".into();
        backend.save(&updated).await.unwrap();

        let fetched = backend.get_by_uid(&order.order_uid).await.unwrap().unwrap();
        assert_eq!(fetched.track_number, "NEWTRACK");
        assert_eq!(fetched.items[0].brand, "Other");
    }

    #[tokio::test]
    async fn test_absent_order_is_none_not_error() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.get_by_uid("never-ingested").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_payment_surfaces_integrity_error() {
        let backend = MemoryBackend::new();
        let order = sample_order();
        backend.seed(order.clone());
        backend
            .missing_payment
            .lock()
            .unwrap()
            .insert(order.order_uid.clone());

        let err = backend.get_by_uid(&order.order_uid).await.unwrap_err();
        assert!(matches!(err, StoreError::Integrity { entity: "payment", .. }));
    }
}
