//! Startup venue seed.
//!
//! The venue comes from one of three places, first match wins: the database
//! (when `DATABASE_URL` is set), a JSON file at `VENUE_SEED_PATH`, or the
//! built-in demo venue.

use frontdesk_core::customer::{hash_id_scan, Customer, Visit};
use frontdesk_core::error::CoreError;
use frontdesk_core::inventory::Resource;
use frontdesk_core::rental::{RentalTier, ResourceRef, ResourceStatus, ResourceType};
use frontdesk_core::types::{Cents, DbId};
use frontdesk_db::repositories::{CustomerRepo, InventoryRepo};
use frontdesk_db::DbPool;
use serde::Deserialize;

use crate::error::{AppError, AppResult};

/// Everything the coordinator starts from.
#[derive(Debug, Clone, Default)]
pub struct VenueSeed {
    pub resources: Vec<Resource>,
    pub customers: Vec<Customer>,
    pub visits: Vec<Visit>,
    /// Resources whose unfinished hold was dropped on load. Their rows
    /// still read OCCUPIED until the change is written back.
    pub released: Vec<ResourceRef>,
}

impl VenueSeed {
    /// Load rooms, lockers and customers from PostgreSQL.
    pub async fn from_db(pool: &DbPool) -> AppResult<Self> {
        let mut resources = Vec::new();
        for row in InventoryRepo::list_rooms(pool).await? {
            resources.push(row.into_resource(ResourceType::Room)?);
        }
        for row in InventoryRepo::list_lockers(pool).await? {
            resources.push(row.into_resource(ResourceType::Locker)?);
        }
        let customers = CustomerRepo::list(pool)
            .await?
            .into_iter()
            .map(Customer::from)
            .collect();

        Ok(Self::restore(resources, customers))
    }

    /// Load a venue described by a JSON file.
    pub fn from_json_file(path: &str) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AppError::InternalError(format!("Cannot read venue seed {path}: {e}")))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> AppResult<Self> {
        let file: SeedFile = serde_json::from_str(raw)
            .map_err(|e| AppError::Core(CoreError::Validation(format!("Invalid venue seed: {e}"))))?;
        Ok(file.into_seed())
    }

    /// A small venue for development and rehearsals.
    pub fn demo() -> Self {
        let mut resources = Vec::new();
        let mut id: DbId = 0;
        let mut room = |number: &str, tier: RentalTier| {
            id += 1;
            Resource::new_room(id, number, tier)
        };
        for n in 101..=106 {
            resources.push(room(&n.to_string(), RentalTier::Standard));
        }
        for n in 201..=203 {
            resources.push(room(&n.to_string(), RentalTier::Double));
        }
        resources.push(room("301", RentalTier::Special));
        for n in 1..=12 {
            resources.push(Resource::new_locker(n, n.to_string()));
        }

        let customers = [
            (1, "Alex Rivera", "M-1001", None),
            (2, "Sam Okafor", "M-1002", Some("ID-2002")),
            (3, "Jordan Lee", "M-1003", None),
        ]
        .into_iter()
        .map(|(id, name, membership, scan): (DbId, &str, &str, Option<&str>)| Customer {
            id,
            name: name.into(),
            membership_number: Some(membership.into()),
            membership_valid_until: None,
            primary_language: Some("EN".into()),
            notes: None,
            past_due_balance: Cents::ZERO,
            id_scan_hash: scan.map(hash_id_scan),
            banned_until: None,
        })
        .collect();

        Self::restore(resources, customers)
    }

    /// Rebuild open visits from occupied resources. A resource held by a
    /// lane session that never completed goes to housekeeping, since lane
    /// sessions do not survive a restart.
    fn restore(mut resources: Vec<Resource>, customers: Vec<Customer>) -> Self {
        let mut visits = Vec::new();
        let mut released = Vec::new();
        for r in &mut resources {
            let Some(holder) = r.assigned_to.clone() else {
                continue;
            };
            match (holder.visit_id, r.occupancy_id.clone(), r.checkin_at, r.checkout_at) {
                (Some(visit_id), Some(occupancy_id), Some(checkin_at), Some(checkout_at)) => {
                    visits.push(Visit {
                        visit_id,
                        customer_id: holder.customer_id,
                        rental_type: r.tier,
                        resource: r.resource_ref(),
                        resource_number: r.number.clone(),
                        occupancy_id,
                        checkin_at,
                        checkout_at,
                    });
                }
                _ => {
                    tracing::warn!(
                        resource = %r.resource_ref(),
                        session_id = %holder.session_id,
                        "Resource held by an unfinished session, releasing as DIRTY"
                    );
                    r.status = ResourceStatus::Dirty;
                    r.assigned_to = None;
                    r.checkin_at = None;
                    r.checkout_at = None;
                    r.occupancy_id = None;
                    r.version += 1;
                    released.push(r.resource_ref());
                }
            }
        }

        Self {
            resources,
            customers,
            visits,
            released,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedFile {
    #[serde(default)]
    rooms: Vec<SeedRoom>,
    #[serde(default)]
    lockers: Vec<SeedLocker>,
    #[serde(default)]
    customers: Vec<SeedCustomer>,
}

#[derive(Debug, Deserialize)]
struct SeedRoom {
    id: DbId,
    number: String,
    tier: RentalTier,
}

#[derive(Debug, Deserialize)]
struct SeedLocker {
    id: DbId,
    number: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedCustomer {
    #[serde(flatten)]
    customer: Customer,
    /// Raw ID-scan value, hashed on load.
    id_scan_value: Option<String>,
}

impl SeedFile {
    fn into_seed(self) -> VenueSeed {
        let resources = self
            .rooms
            .into_iter()
            .map(|r| Resource::new_room(r.id, r.number, r.tier))
            .chain(
                self.lockers
                    .into_iter()
                    .map(|l| Resource::new_locker(l.id, l.number)),
            )
            .collect();
        let customers = self
            .customers
            .into_iter()
            .map(|c| {
                let mut customer = c.customer;
                if let Some(raw) = c.id_scan_value {
                    customer.id_scan_hash = Some(hash_id_scan(&raw));
                }
                customer
            })
            .collect();
        VenueSeed::restore(resources, customers)
    }
}
