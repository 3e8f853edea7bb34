use sqlx::PgConnection;

use crate::models::Item;

/// Replaces an order's line items: clears any previous rows, then inserts
/// the new payload one row at a time. Runs inside the store's transaction,
/// so a failure part way through rolls back with everything else.
pub async fn insert(
    conn: &mut PgConnection,
    items: &[Item],
    order_uid: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM items WHERE order_uid = $1")
        .bind(order_uid)
        .execute(&mut *conn)
        .await?;

    for item in items {
        sqlx::query(
            r#"
            INSERT INTO items (order_uid, chrt_id, track_number, price, rid, name,
                               sale, size, total_price, nm_id, brand, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(order_uid)
        .bind(item.chrt_id)
        .bind(&item.track_number)
        .bind(item.price)
        .bind(&item.rid)
        .bind(&item.name)
        .bind(item.sale)
        .bind(&item.size)
        .bind(item.total_price)
        .bind(item.nm_id)
        .bind(&item.brand)
        .bind(item.status)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Ordered by the surrogate id, which preserves insertion order.
pub async fn fetch(conn: &mut PgConnection, order_uid: &str) -> Result<Vec<Item>, sqlx::Error> {
    sqlx::query_as::<_, Item>(
        r#"
        SELECT chrt_id, track_number, price, rid, name, sale, size,
               total_price, nm_id, brand, status
        FROM items
        WHERE order_uid = $1
        ORDER BY id
        "#,
    )
    .bind(order_uid)
    .fetch_all(conn)
    .await
}
