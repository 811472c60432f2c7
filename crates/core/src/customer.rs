//! Customer directory and open visits.
//!
//! A visit opens when a check-in completes and closes when its checkout
//! completes. A customer has at most one open visit and is active on at
//! most one lane at a time.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{ConflictCode, CoreError, CoreResult};
use crate::rental::{RentalTier, ResourceRef};
use crate::types::{Cents, DbId, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: DbId,
    pub name: String,
    pub membership_number: Option<String>,
    pub membership_valid_until: Option<Timestamp>,
    pub primary_language: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub past_due_balance: Cents,
    /// SHA-256 hex of the raw ID-scan payload. Raw scans are never stored.
    #[serde(default, skip_serializing)]
    pub id_scan_hash: Option<String>,
    pub banned_until: Option<Timestamp>,
}

impl Customer {
    pub fn is_banned(&self, now: Timestamp) -> bool {
        self.banned_until.is_some_and(|until| until > now)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    pub visit_id: String,
    pub customer_id: DbId,
    pub rental_type: RentalTier,
    pub resource: ResourceRef,
    pub resource_number: String,
    pub occupancy_id: String,
    pub checkin_at: Timestamp,
    pub checkout_at: Timestamp,
}

/// How a terminal identified the customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomerLookup {
    Id(DbId),
    IdScan(String),
    Membership(String),
}

/// Hash a raw ID-scan payload for lookup. Surrounding whitespace is ignored.
pub fn hash_id_scan(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.trim().as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone, Default)]
pub struct CustomerRegistry {
    customers: HashMap<DbId, Customer>,
    visits: HashMap<String, Visit>,
    /// Customer id to the lane holding their session.
    active_lanes: HashMap<DbId, String>,
}

impl CustomerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_customers(customers: impl IntoIterator<Item = Customer>) -> Self {
        let mut reg = Self::new();
        for c in customers {
            reg.customers.insert(c.id, c);
        }
        reg
    }

    pub fn get(&self, id: DbId) -> Option<&Customer> {
        self.customers.get(&id)
    }

    pub fn require(&self, id: DbId) -> CoreResult<&Customer> {
        self.customers
            .get(&id)
            .ok_or_else(|| CoreError::not_found("Customer", id))
    }

    pub fn lookup(&self, by: &CustomerLookup) -> CoreResult<&Customer> {
        match by {
            CustomerLookup::Id(id) => self.require(*id),
            CustomerLookup::IdScan(raw) => {
                let hash = hash_id_scan(raw);
                self.customers
                    .values()
                    .find(|c| c.id_scan_hash.as_deref() == Some(hash.as_str()))
                    .ok_or_else(|| CoreError::not_found("Customer", "id-scan"))
            }
            CustomerLookup::Membership(number) => {
                let number = number.trim();
                self.customers
                    .values()
                    .find(|c| c.membership_number.as_deref() == Some(number))
                    .ok_or_else(|| CoreError::not_found("Customer", number))
            }
        }
    }

    pub fn ban(&mut self, customer_id: DbId, until: Timestamp) -> CoreResult<&Customer> {
        let customer = self
            .customers
            .get_mut(&customer_id)
            .ok_or_else(|| CoreError::not_found("Customer", customer_id))?;
        // Never shorten an existing ban.
        if customer.banned_until.is_none_or(|existing| existing < until) {
            customer.banned_until = Some(until);
        }
        Ok(customer)
    }

    pub fn open_visit_for(&self, customer_id: DbId) -> Option<&Visit> {
        self.visits.values().find(|v| v.customer_id == customer_id)
    }

    pub fn visit(&self, visit_id: &str) -> Option<&Visit> {
        self.visits.get(visit_id)
    }

    pub fn visit_for_resource(&self, r: ResourceRef) -> Option<&Visit> {
        self.visits.values().find(|v| v.resource == r)
    }

    /// Record a new visit. Fails with `ALREADY_CHECKED_IN` if the customer
    /// already has one open.
    pub fn open_visit(&mut self, visit: Visit) -> CoreResult<()> {
        if let Some(open) = self.open_visit_for(visit.customer_id) {
            return Err(CoreError::conflict_with(
                ConflictCode::AlreadyCheckedIn,
                "Customer already has an open visit",
                serde_json::json!({ "visitId": open.visit_id }),
            ));
        }
        self.visits.insert(visit.visit_id.clone(), visit);
        Ok(())
    }

    /// The lane where the customer currently has a session.
    pub fn active_lane(&self, customer_id: DbId) -> Option<&str> {
        self.active_lanes.get(&customer_id).map(String::as_str)
    }

    /// Bind the customer to `lane_id`. Re-binding the same lane is a no-op.
    pub fn bind_lane(&mut self, customer_id: DbId, lane_id: &str) -> CoreResult<()> {
        match self.active_lanes.get(&customer_id) {
            Some(other) if other != lane_id => Err(CoreError::conflict_with(
                ConflictCode::CustomerOnOtherLane,
                "Customer is active on another lane",
                serde_json::json!({ "laneId": other }),
            )),
            Some(_) => Ok(()),
            None => {
                self.active_lanes.insert(customer_id, lane_id.to_string());
                Ok(())
            }
        }
    }

    /// Drop the customer's binding if it belongs to `lane_id`.
    pub fn unbind_lane(&mut self, customer_id: DbId, lane_id: &str) {
        if self.active_lane(customer_id) == Some(lane_id) {
            self.active_lanes.remove(&customer_id);
        }
    }

    pub fn close_visit(&mut self, visit_id: &str) -> Option<Visit> {
        self.visits.remove(visit_id)
    }

    pub fn extend_visit(&mut self, visit_id: &str, checkout_at: Timestamp) -> CoreResult<&Visit> {
        let visit = self
            .visits
            .get_mut(visit_id)
            .ok_or_else(|| CoreError::not_found("Visit", visit_id))?;
        visit.checkout_at = checkout_at;
        Ok(visit)
    }

    /// Point an open visit at a different resource (waitlist upgrade).
    pub fn move_visit(
        &mut self,
        visit_id: &str,
        resource: ResourceRef,
        resource_number: String,
        occupancy_id: String,
        rental_type: RentalTier,
    ) -> CoreResult<&Visit> {
        let visit = self
            .visits
            .get_mut(visit_id)
            .ok_or_else(|| CoreError::not_found("Visit", visit_id))?;
        visit.resource = resource;
        visit.resource_number = resource_number;
        visit.occupancy_id = occupancy_id;
        visit.rental_type = rental_type;
        Ok(visit)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    fn customer(id: DbId) -> Customer {
        Customer {
            id,
            name: format!("Customer {id}"),
            membership_number: Some(format!("M-{id}")),
            membership_valid_until: None,
            primary_language: Some("EN".into()),
            notes: None,
            past_due_balance: Cents::ZERO,
            id_scan_hash: Some(hash_id_scan(&format!("scan-{id}"))),
            banned_until: None,
        }
    }

    #[test]
    fn lookup_by_each_identifier() {
        let reg = CustomerRegistry::from_customers([customer(1), customer(2)]);

        assert_eq!(reg.lookup(&CustomerLookup::Id(2)).unwrap().id, 2);
        assert_eq!(
            reg.lookup(&CustomerLookup::IdScan("  scan-1 ".into()))
                .unwrap()
                .id,
            1
        );
        assert_eq!(
            reg.lookup(&CustomerLookup::Membership("M-2".into()))
                .unwrap()
                .id,
            2
        );
        assert!(reg.lookup(&CustomerLookup::Id(99)).is_err());
    }

    #[test]
    fn ban_never_shortens() {
        let mut reg = CustomerRegistry::from_customers([customer(1)]);
        let now = Utc::now();
        let long = now + Duration::days(30);

        reg.ban(1, long).unwrap();
        reg.ban(1, now + Duration::days(1)).unwrap();

        let c = reg.get(1).unwrap();
        assert_eq!(c.banned_until, Some(long));
        assert!(c.is_banned(now));
        assert!(!c.is_banned(long + Duration::seconds(1)));
    }

    fn visit(id: &str, customer_id: DbId, room: DbId) -> Visit {
        let now = Utc::now();
        Visit {
            visit_id: id.into(),
            customer_id,
            rental_type: RentalTier::Standard,
            resource: ResourceRef::room(room),
            resource_number: format!("{}", 100 + room),
            occupancy_id: format!("occ-{id}"),
            checkin_at: now,
            checkout_at: now + Duration::hours(6),
        }
    }

    #[test]
    fn second_open_visit_is_rejected() {
        let mut reg = CustomerRegistry::from_customers([customer(1)]);
        reg.open_visit(visit("v-1", 1, 1)).unwrap();

        let err = reg.open_visit(visit("v-2", 1, 2)).unwrap_err();
        assert_eq!(err.conflict_code(), Some(ConflictCode::AlreadyCheckedIn));
        assert_eq!(reg.open_visit_for(1).unwrap().visit_id, "v-1");
        assert!(reg.visit("v-2").is_none());

        reg.close_visit("v-1");
        reg.open_visit(visit("v-2", 1, 2)).unwrap();
    }

    #[test]
    fn customer_binds_to_one_lane() {
        let mut reg = CustomerRegistry::from_customers([customer(1)]);
        reg.bind_lane(1, "lane-1").unwrap();
        reg.bind_lane(1, "lane-1").unwrap();

        let err = reg.bind_lane(1, "lane-2").unwrap_err();
        assert_eq!(err.conflict_code(), Some(ConflictCode::CustomerOnOtherLane));

        reg.unbind_lane(1, "lane-2");
        assert_eq!(reg.active_lane(1), Some("lane-1"));
        reg.unbind_lane(1, "lane-1");
        reg.bind_lane(1, "lane-2").unwrap();
    }

    #[test]
    fn id_scan_hash_is_not_serialized() {
        let json = serde_json::to_value(customer(1)).unwrap();
        assert!(json.get("idScanHash").is_none());
        assert_eq!(json["membershipNumber"], "M-1");
    }
}
