//! Repository for the `rooms` and `lockers` tables.

use frontdesk_core::inventory::Resource;
use frontdesk_core::rental::ResourceType;
use sqlx::PgPool;

use crate::models::inventory::ResourceRow;

/// Column list shared by both tables. Lockers have no tier column.
const ROOM_COLUMNS: &str = "id, number, tier, status, assigned_session_id, assigned_customer_id, \
    visit_id, checkin_at, checkout_at, occupancy_id, version";
const LOCKER_COLUMNS: &str = "id, number, 'LOCKER' AS tier, status, assigned_session_id, \
    assigned_customer_id, visit_id, checkin_at, checkout_at, occupancy_id, version";

pub struct InventoryRepo;

impl InventoryRepo {
    pub async fn list_rooms(pool: &PgPool) -> Result<Vec<ResourceRow>, sqlx::Error> {
        let query = format!("SELECT {ROOM_COLUMNS} FROM rooms ORDER BY id");
        sqlx::query_as::<_, ResourceRow>(&query).fetch_all(pool).await
    }

    pub async fn list_lockers(pool: &PgPool) -> Result<Vec<ResourceRow>, sqlx::Error> {
        let query = format!("SELECT {LOCKER_COLUMNS} FROM lockers ORDER BY id");
        sqlx::query_as::<_, ResourceRow>(&query).fetch_all(pool).await
    }

    /// Write the in-memory state of `resource` back to its row.
    ///
    /// The update is skipped when the row already carries a newer version,
    /// so out-of-order write-backs never regress a resource. Returns whether
    /// a row was written.
    pub async fn write_state(pool: &PgPool, resource: &Resource) -> Result<bool, sqlx::Error> {
        let table = match resource.resource_type {
            ResourceType::Room => "rooms",
            ResourceType::Locker => "lockers",
        };
        let holder = resource.assigned_to.as_ref();
        let query = format!(
            "UPDATE {table} SET \
                status = $2, assigned_session_id = $3, assigned_customer_id = $4, visit_id = $5, \
                checkin_at = $6, checkout_at = $7, occupancy_id = $8, version = $9, \
                updated_at = now() \
             WHERE id = $1 AND version < $9"
        );
        let result = sqlx::query(&query)
            .bind(resource.id)
            .bind(resource.status.as_str())
            .bind(holder.map(|h| h.session_id.as_str()))
            .bind(holder.map(|h| h.customer_id))
            .bind(holder.and_then(|h| h.visit_id.as_deref()))
            .bind(resource.checkin_at)
            .bind(resource.checkout_at)
            .bind(resource.occupancy_id.as_deref())
            .bind(i64::try_from(resource.version).unwrap_or(i64::MAX))
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
