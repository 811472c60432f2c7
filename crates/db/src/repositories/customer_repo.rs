//! Repository for the `customers` table.

use frontdesk_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::customer::CustomerRow;

const COLUMNS: &str = "id, name, membership_number, membership_valid_until, primary_language, \
    notes, past_due_balance_cents, id_scan_hash, banned_until";

pub struct CustomerRepo;

impl CustomerRepo {
    pub async fn list(pool: &PgPool) -> Result<Vec<CustomerRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM customers ORDER BY id");
        sqlx::query_as::<_, CustomerRow>(&query).fetch_all(pool).await
    }

    /// Record a ban. An existing later ban is kept.
    pub async fn set_banned_until(
        pool: &PgPool,
        id: DbId,
        until: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE customers SET banned_until = $2, updated_at = now() \
             WHERE id = $1 AND (banned_until IS NULL OR banned_until < $2)",
        )
        .bind(id)
        .bind(until)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
