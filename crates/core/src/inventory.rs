//! Resource inventory: the single source of truth for room and locker
//! availability.
//!
//! [`InventoryStore::try_assign`] is a compare-and-swap on a resource's
//! holder: it succeeds only if the resource is unassigned and clean, and it
//! never overwrites an existing holder. Callers serialize access to the
//! store (one mutex in the server), which makes the check and the set one
//! atomic step across every lane.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ConflictCode, CoreError, CoreResult, PreconditionCode};
use crate::rental::{RentalTier, ResourceRef, ResourceStatus, ResourceType};
use crate::types::{DbId, Timestamp};

/// Who currently holds an occupied resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holder {
    pub session_id: String,
    pub customer_id: DbId,
    /// Set once check-in completes and a visit is opened.
    pub visit_id: Option<String>,
}

/// A room or locker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: DbId,
    pub resource_type: ResourceType,
    pub number: String,
    /// Rooms carry their own tier; lockers are always `LOCKER`.
    pub tier: RentalTier,
    pub status: ResourceStatus,
    pub assigned_to: Option<Holder>,
    pub checkin_at: Option<Timestamp>,
    pub checkout_at: Option<Timestamp>,
    /// Unique per holding period; `None` while unoccupied.
    pub occupancy_id: Option<String>,
    /// Incremented on every mutation so terminals can drop stale updates.
    pub version: u64,
}

impl Resource {
    pub fn new_room(id: DbId, number: impl Into<String>, tier: RentalTier) -> Self {
        Self::new(id, ResourceType::Room, number.into(), tier)
    }

    pub fn new_locker(id: DbId, number: impl Into<String>) -> Self {
        Self::new(id, ResourceType::Locker, number.into(), RentalTier::Locker)
    }

    fn new(id: DbId, resource_type: ResourceType, number: String, tier: RentalTier) -> Self {
        Self {
            id,
            resource_type,
            number,
            tier,
            status: ResourceStatus::Clean,
            assigned_to: None,
            checkin_at: None,
            checkout_at: None,
            occupancy_id: None,
            version: 0,
        }
    }

    pub fn resource_ref(&self) -> ResourceRef {
        ResourceRef {
            resource_type: self.resource_type,
            resource_id: self.id,
        }
    }

    /// Free for a new assignment right now.
    pub fn is_available(&self) -> bool {
        self.status == ResourceStatus::Clean && self.assigned_to.is_none()
    }
}

/// Read model returned by `GET /inventory/detailed`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub rooms: Vec<Resource>,
    pub lockers: Vec<Resource>,
}

/// Sort key giving ascending resource-number order ("9" before "10").
fn number_key(number: &str) -> (u8, i64, String) {
    match number.parse::<i64>() {
        Ok(n) => (0, n, String::new()),
        Err(_) => (1, 0, number.to_string()),
    }
}

#[derive(Debug, Clone, Default)]
pub struct InventoryStore {
    resources: BTreeMap<ResourceRef, Resource>,
}

impl InventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from seed rows. Later duplicates replace earlier ones.
    pub fn from_resources(resources: impl IntoIterator<Item = Resource>) -> Self {
        let mut store = Self::new();
        for r in resources {
            store.insert(r);
        }
        store
    }

    pub fn insert(&mut self, resource: Resource) {
        self.resources.insert(resource.resource_ref(), resource);
    }

    pub fn get(&self, r: ResourceRef) -> Option<&Resource> {
        self.resources.get(&r)
    }

    pub fn require(&self, r: ResourceRef) -> CoreResult<&Resource> {
        self.resources
            .get(&r)
            .ok_or_else(|| CoreError::not_found("Resource", r))
    }

    fn require_mut(&mut self, r: ResourceRef) -> CoreResult<&mut Resource> {
        self.resources
            .get_mut(&r)
            .ok_or_else(|| CoreError::not_found("Resource", r))
    }

    /// Find a resource by its display number (key tag).
    pub fn find_by_number(&self, resource_type: ResourceType, number: &str) -> Option<&Resource> {
        self.resources
            .values()
            .find(|r| r.resource_type == resource_type && r.number == number)
    }

    /// Atomic check-and-set of a resource's holder.
    ///
    /// Fails with `RACE_LOST` if someone already holds the resource and
    /// with `RESOURCE_UNAVAILABLE` if it is free but not clean. Both
    /// conflicts carry a `raceLost` flag for the client.
    pub fn try_assign(
        &mut self,
        r: ResourceRef,
        holder: Holder,
        now: Timestamp,
        checkout_at: Timestamp,
    ) -> CoreResult<Resource> {
        let resource = self.require_mut(r)?;

        if resource.assigned_to.is_some() {
            return Err(CoreError::conflict_with(
                ConflictCode::RaceLost,
                format!("{} {} is already assigned", r.resource_type, resource.number),
                serde_json::json!({ "raceLost": true }),
            ));
        }
        if resource.status != ResourceStatus::Clean {
            return Err(CoreError::conflict_with(
                ConflictCode::ResourceUnavailable,
                format!(
                    "{} {} is {} and cannot be assigned",
                    r.resource_type,
                    resource.number,
                    resource.status.as_str()
                ),
                serde_json::json!({ "raceLost": false }),
            ));
        }

        resource.status = ResourceStatus::Occupied;
        resource.assigned_to = Some(holder);
        resource.checkin_at = Some(now);
        resource.checkout_at = Some(checkout_at);
        resource.occupancy_id = Some(uuid::Uuid::new_v4().to_string());
        resource.version += 1;
        Ok(resource.clone())
    }

    /// Release the holding period identified by `occupancy_id`, leaving the
    /// resource in `status`.
    ///
    /// A stale `occupancy_id` (the resource has since been released or
    /// reassigned) is rejected so a late release can never evict a newer
    /// holder.
    pub fn release(
        &mut self,
        r: ResourceRef,
        occupancy_id: &str,
        status: ResourceStatus,
    ) -> CoreResult<Resource> {
        let resource = self.require_mut(r)?;
        if resource.occupancy_id.as_deref() != Some(occupancy_id) {
            return Err(CoreError::precondition(
                PreconditionCode::InvalidTransition,
                format!("{r} is not held by occupancy {occupancy_id}"),
            ));
        }

        resource.status = status;
        resource.assigned_to = None;
        resource.checkin_at = None;
        resource.checkout_at = None;
        resource.occupancy_id = None;
        resource.version += 1;
        Ok(resource.clone())
    }

    /// Link a held resource to the visit opened at check-in completion.
    pub fn attach_visit(
        &mut self,
        r: ResourceRef,
        occupancy_id: &str,
        visit_id: &str,
    ) -> CoreResult<Resource> {
        let resource = self.held_mut(r, occupancy_id)?;
        if let Some(holder) = resource.assigned_to.as_mut() {
            holder.visit_id = Some(visit_id.to_string());
        }
        resource.version += 1;
        Ok(resource.clone())
    }

    /// Move the scheduled checkout of a held resource (renewal).
    pub fn extend(
        &mut self,
        r: ResourceRef,
        occupancy_id: &str,
        checkout_at: Timestamp,
    ) -> CoreResult<Resource> {
        let resource = self.held_mut(r, occupancy_id)?;
        resource.checkout_at = Some(checkout_at);
        resource.version += 1;
        Ok(resource.clone())
    }

    fn held_mut(&mut self, r: ResourceRef, occupancy_id: &str) -> CoreResult<&mut Resource> {
        let resource = self.require_mut(r)?;
        if resource.occupancy_id.as_deref() != Some(occupancy_id) {
            return Err(CoreError::precondition(
                PreconditionCode::InvalidTransition,
                format!("{r} is not held by occupancy {occupancy_id}"),
            ));
        }
        Ok(resource)
    }

    /// Housekeeping status change (DIRTY → CLEANING → CLEAN and so on).
    ///
    /// Occupancy is only ever entered through [`try_assign`](Self::try_assign)
    /// and left through [`release`](Self::release). Returns the previous
    /// status, or `None` when the call changed nothing.
    pub fn set_status(
        &mut self,
        r: ResourceRef,
        status: ResourceStatus,
    ) -> CoreResult<(Resource, Option<ResourceStatus>)> {
        if status == ResourceStatus::Occupied {
            return Err(CoreError::Validation(
                "OCCUPIED can only be set by an assignment".into(),
            ));
        }

        let resource = self.require_mut(r)?;
        if resource.status == ResourceStatus::Occupied {
            return Err(CoreError::conflict(
                ConflictCode::ResourceOccupied,
                format!("{} {} is occupied", r.resource_type, resource.number),
            ));
        }
        if resource.status == status {
            return Ok((resource.clone(), None));
        }

        let previous = resource.status;
        resource.status = status;
        resource.version += 1;
        Ok((resource.clone(), Some(previous)))
    }

    /// First available resource for `tier` by ascending number, skipping
    /// anything in `exclude`.
    pub fn first_available(&self, tier: RentalTier, exclude: &[ResourceRef]) -> Option<&Resource> {
        self.resources
            .values()
            .filter(|r| r.tier == tier && r.is_available())
            .filter(|r| !exclude.contains(&r.resource_ref()))
            .min_by_key(|r| (number_key(&r.number), r.id))
    }

    pub fn available_count(&self, tier: RentalTier) -> usize {
        self.resources
            .values()
            .filter(|r| r.tier == tier && r.is_available())
            .count()
    }

    /// Snapshot ordered by ascending number within each type.
    pub fn snapshot(&self) -> InventorySnapshot {
        let mut rooms: Vec<Resource> = Vec::new();
        let mut lockers: Vec<Resource> = Vec::new();
        for r in self.resources.values() {
            match r.resource_type {
                ResourceType::Room => rooms.push(r.clone()),
                ResourceType::Locker => lockers.push(r.clone()),
            }
        }
        rooms.sort_by_key(|r| (number_key(&r.number), r.id));
        lockers.sort_by_key(|r| (number_key(&r.number), r.id));
        InventorySnapshot { rooms, lockers }
    }

    /// Resources currently held by `session_id`.
    pub fn held_by_session(&self, session_id: &str) -> Vec<&Resource> {
        self.resources
            .values()
            .filter(|r| {
                r.assigned_to
                    .as_ref()
                    .is_some_and(|h| h.session_id == session_id)
            })
            .collect()
    }
}
