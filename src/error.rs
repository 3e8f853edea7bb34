// ============================================================================
// Store Error Taxonomy
// ============================================================================
//
// Validation  - order rejected before any I/O (missing uid, items, contact)
// Integrity   - an order row exists but its delivery/payment row is gone;
//               a corrupt aggregate, distinct from "not found"
// Persistence - the transactional write or a read against Postgres failed
//
// "Not found" is not an error anywhere in this crate; reads return Option.
// Decode failures stay serde_json::Error at the consumer boundary.
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("order validation failed: {field} {reason}")]
    Validation {
        field: &'static str,
        reason: &'static str,
    },

    #[error("order {order_uid} has no {entity} row")]
    Integrity {
        order_uid: String,
        entity: &'static str,
    },

    #[error("persistence failure")]
    Persistence(#[from] sqlx::Error),
}

impl StoreError {
    /// Metric label for the failure counter.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::Validation { .. } => "validation",
            StoreError::Integrity { .. } => "integrity",
            StoreError::Persistence(_) => "persistence",
        }
    }
}
