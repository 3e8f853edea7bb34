use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Order Aggregate
// ============================================================================
//
// Wire and domain representation of one order. The same structs are used for
// decoding Kafka payloads, for HTTP responses, and as the unit stored in the
// cache, so field names mirror the JSON contract exactly.
//
// ============================================================================

/// Recipient and shipping details, 1:1 with an order.
#[derive(Serialize, Deserialize, sqlx::FromRow, Clone, Debug, PartialEq)]
pub struct Delivery {
    pub name: String,
    pub phone: String,
    pub zip: String,
    pub city: String,
    pub address: String,
    pub region: String,
    pub email: String,
}

/// Payment transaction details, 1:1 with an order.
#[derive(Serialize, Deserialize, sqlx::FromRow, Clone, Debug, PartialEq)]
pub struct Payment {
    pub transaction: String,
    pub request_id: Option<String>,
    pub currency: String,
    pub provider: String,
    pub amount: i64,
    pub payment_dt: i64,
    pub bank: String,
    pub delivery_cost: i64,
    pub goods_total: i64,
    pub custom_fee: i64,
}

/// One line item. An order carries at least one; wire order is preserved
/// through storage and cache.
#[derive(Serialize, Deserialize, sqlx::FromRow, Clone, Debug, PartialEq)]
pub struct Item {
    pub chrt_id: i64,
    pub track_number: String,
    pub price: i64,
    pub rid: String,
    pub name: String,
    pub sale: i32,
    pub size: String,
    pub total_price: i64,
    pub nm_id: i64,
    pub brand: String,
    pub status: i32,
}

/// Root aggregate. `order_uid` is the cache key and the primary key across
/// all four tables.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Order {
    pub order_uid: String,
    pub track_number: String,
    pub entry: String,
    pub delivery: Delivery,
    pub payment: Payment,
    pub items: Vec<Item>,
    pub locale: String,
    pub internal_signature: Option<String>,
    pub customer_id: String,
    pub delivery_service: String,
    pub shardkey: String,
    pub sm_id: i32,
    #[serde(with = "date_created_format", default = "epoch")]
    pub date_created: DateTime<Utc>,
    pub oof_shard: String,
}

impl Order {
    /// True when the producer left `date_created` empty or missing; the
    /// store replaces the sentinel with the current time before persisting.
    pub fn created_at_is_unset(&self) -> bool {
        self.date_created == epoch()
    }
}

/// The zero-timestamp sentinel for an omitted `date_created`.
pub fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

// `date_created` arrives as an ISO-8601 string; producers are allowed to
// send it empty, which maps to the epoch sentinel rather than a decode error.
mod date_created_format {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&dt.to_rfc3339())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        if raw.trim().is_empty() {
            return Ok(super::epoch());
        }
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
