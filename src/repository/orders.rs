use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::models::Order;

/// The `orders` row without its child entities; the store joins in
/// delivery, payment and items to build the full aggregate.
#[derive(sqlx::FromRow, Debug)]
pub struct OrderRow {
    pub order_uid: String,
    pub track_number: String,
    pub entry: String,
    pub locale: String,
    pub internal_signature: Option<String>,
    pub customer_id: String,
    pub delivery_service: String,
    pub shardkey: String,
    pub sm_id: i32,
    pub date_created: DateTime<Utc>,
    pub oof_shard: String,
}

pub async fn insert(conn: &mut PgConnection, order: &Order) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO orders (order_uid, track_number, entry, locale, internal_signature,
                            customer_id, delivery_service, shardkey, sm_id, date_created, oof_shard)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (order_uid) DO UPDATE SET
            track_number = EXCLUDED.track_number,
            entry = EXCLUDED.entry,
            locale = EXCLUDED.locale,
            internal_signature = EXCLUDED.internal_signature,
            customer_id = EXCLUDED.customer_id,
            delivery_service = EXCLUDED.delivery_service,
            shardkey = EXCLUDED.shardkey,
            sm_id = EXCLUDED.sm_id,
            date_created = EXCLUDED.date_created,
            oof_shard = EXCLUDED.oof_shard
        "#,
    )
    .bind(&order.order_uid)
    .bind(&order.track_number)
    .bind(&order.entry)
    .bind(&order.locale)
    .bind(&order.internal_signature)
    .bind(&order.customer_id)
    .bind(&order.delivery_service)
    .bind(&order.shardkey)
    .bind(order.sm_id)
    .bind(order.date_created)
    .bind(&order.oof_shard)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn fetch(
    conn: &mut PgConnection,
    order_uid: &str,
) -> Result<Option<OrderRow>, sqlx::Error> {
    sqlx::query_as::<_, OrderRow>(
        r#"
        SELECT order_uid, track_number, entry, locale, internal_signature,
               customer_id, delivery_service, shardkey, sm_id, date_created, oof_shard
        FROM orders
        WHERE order_uid = $1
        "#,
    )
    .bind(order_uid)
    .fetch_optional(conn)
    .await
}

/// Startup enumeration feeding the cache bulk-load.
pub async fn all_uids(conn: &mut PgConnection) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT order_uid FROM orders")
        .fetch_all(conn)
        .await
}
