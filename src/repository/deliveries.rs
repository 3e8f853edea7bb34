use sqlx::PgConnection;

use crate::models::Delivery;

pub async fn insert(
    conn: &mut PgConnection,
    delivery: &Delivery,
    order_uid: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO deliveries (order_uid, name, phone, zip, city, address, region, email)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (order_uid) DO UPDATE SET
            name = EXCLUDED.name,
            phone = EXCLUDED.phone,
            zip = EXCLUDED.zip,
            city = EXCLUDED.city,
            address = EXCLUDED.address,
            region = EXCLUDED.region,
            email = EXCLUDED.email
        "#,
    )
    .bind(order_uid)
    .bind(&delivery.name)
    .bind(&delivery.phone)
    .bind(&delivery.zip)
    .bind(&delivery.city)
    .bind(&delivery.address)
    .bind(&delivery.region)
    .bind(&delivery.email)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn fetch(
    conn: &mut PgConnection,
    order_uid: &str,
) -> Result<Option<Delivery>, sqlx::Error> {
    sqlx::query_as::<_, Delivery>(
        r#"
        SELECT name, phone, zip, city, address, region, email
        FROM deliveries
        WHERE order_uid = $1
        "#,
    )
    .bind(order_uid)
    .fetch_optional(conn)
    .await
}
