// ============================================================================
// Table Mappers
// ============================================================================
//
// One module per table, insert + fetch only. No cross-table logic lives
// here; the store composes these into whole-aggregate reads and the single
// transactional write. Inserts take `&mut PgConnection` so they run equally
// inside a transaction or on a pooled connection.
//
// Inserts are upserts on order_uid: re-ingesting an order replaces every
// row of the previous payload (items are delete-then-insert inside the
// same transaction).
// ============================================================================

pub mod deliveries;
pub mod items;
pub mod orders;
pub mod payments;
