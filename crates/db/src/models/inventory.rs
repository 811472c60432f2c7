//! Room and locker rows.

use frontdesk_core::error::CoreError;
use frontdesk_core::inventory::{Holder, Resource};
use frontdesk_core::rental::{RentalTier, ResourceStatus, ResourceType};
use frontdesk_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from `rooms` or `lockers`. Locker queries select the literal
/// `'LOCKER'` as `tier`.
#[derive(Debug, Clone, FromRow)]
pub struct ResourceRow {
    pub id: DbId,
    pub number: String,
    pub tier: String,
    pub status: String,
    pub assigned_session_id: Option<String>,
    pub assigned_customer_id: Option<DbId>,
    pub visit_id: Option<String>,
    pub checkin_at: Option<Timestamp>,
    pub checkout_at: Option<Timestamp>,
    pub occupancy_id: Option<String>,
    pub version: i64,
}

impl ResourceRow {
    pub fn into_resource(self, resource_type: ResourceType) -> Result<Resource, CoreError> {
        let tier = match resource_type {
            ResourceType::Locker => RentalTier::Locker,
            ResourceType::Room => RentalTier::from_str_db(&self.tier)?,
        };
        let assigned_to = match (self.assigned_session_id, self.assigned_customer_id) {
            (Some(session_id), Some(customer_id)) => Some(Holder {
                session_id,
                customer_id,
                visit_id: self.visit_id,
            }),
            _ => None,
        };

        let mut status = ResourceStatus::from_str_db(&self.status)?;
        if assigned_to.is_none() && status == ResourceStatus::Occupied {
            // An occupied row with no holder cannot be released by anyone;
            // send it to housekeeping instead.
            tracing::warn!(id = self.id, number = %self.number, "Occupied row without holder, loading as DIRTY");
            status = ResourceStatus::Dirty;
        }

        Ok(Resource {
            id: self.id,
            resource_type,
            number: self.number,
            tier,
            status,
            checkin_at: self.checkin_at.filter(|_| assigned_to.is_some()),
            checkout_at: self.checkout_at.filter(|_| assigned_to.is_some()),
            occupancy_id: self.occupancy_id.filter(|_| assigned_to.is_some()),
            assigned_to,
            version: u64::try_from(self.version).unwrap_or(0),
        })
    }
}
