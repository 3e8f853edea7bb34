use sqlx::PgConnection;

use crate::models::Payment;

pub async fn insert(
    conn: &mut PgConnection,
    payment: &Payment,
    order_uid: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO payments (order_uid, transaction, request_id, currency, provider,
                              amount, payment_dt, bank, delivery_cost, goods_total, custom_fee)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (order_uid) DO UPDATE SET
            transaction = EXCLUDED.transaction,
            request_id = EXCLUDED.request_id,
            currency = EXCLUDED.currency,
            provider = EXCLUDED.provider,
            amount = EXCLUDED.amount,
            payment_dt = EXCLUDED.payment_dt,
            bank = EXCLUDED.bank,
            delivery_cost = EXCLUDED.delivery_cost,
            goods_total = EXCLUDED.goods_total,
            custom_fee = EXCLUDED.custom_fee
        "#,
    )
    .bind(order_uid)
    .bind(&payment.transaction)
    .bind(&payment.request_id)
    .bind(&payment.currency)
    .bind(&payment.provider)
    .bind(payment.amount)
    .bind(payment.payment_dt)
    .bind(&payment.bank)
    .bind(payment.delivery_cost)
    .bind(payment.goods_total)
    .bind(payment.custom_fee)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn fetch(
    conn: &mut PgConnection,
    order_uid: &str,
) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as::<_, Payment>(
        r#"
        SELECT transaction, request_id, currency, provider, amount,
               payment_dt, bank, delivery_cost, goods_total, custom_fee
        FROM payments
        WHERE order_uid = $1
        "#,
    )
    .bind(order_uid)
    .fetch_optional(conn)
    .await
}
