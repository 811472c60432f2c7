//! Upgrade waitlist.
//!
//! A customer who wants a sold-out tier rents a backup tier and joins the
//! waitlist. When a matching resource frees up an employee offers it, and
//! fulfilling the offer moves the customer's visit to the new resource.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ConflictCode, CoreError, CoreResult, PreconditionCode};
use crate::inventory::Resource;
use crate::rental::{RentalTier, ResourceRef};
use crate::types::{DbId, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WaitlistStatus {
    Active,
    Offered,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferedResource {
    #[serde(flatten)]
    pub resource: ResourceRef,
    pub number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitlistEntry {
    pub id: String,
    pub customer_id: DbId,
    /// Linked once the check-in that created the entry completes.
    pub visit_id: Option<String>,
    pub session_id: Option<String>,
    pub desired_tier: RentalTier,
    pub backup_tier: RentalTier,
    pub status: WaitlistStatus,
    pub offered_resource: Option<OfferedResource>,
    pub created_at: Timestamp,
    pub offered_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Default)]
pub struct Waitlist {
    entries: BTreeMap<String, WaitlistEntry>,
}

impl Waitlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue demand for `desired`. `desired_available` is the current count
    /// of free resources of that tier; joining is pointless when it is
    /// non-zero.
    pub fn join(
        &mut self,
        customer_id: DbId,
        session_id: &str,
        desired: RentalTier,
        backup: RentalTier,
        desired_available: usize,
        now: Timestamp,
    ) -> CoreResult<WaitlistEntry> {
        if desired == backup {
            return Err(CoreError::Validation(
                "Desired and backup tiers must differ".into(),
            ));
        }
        if desired_available > 0 {
            return Err(CoreError::precondition(
                PreconditionCode::TierAvailable,
                format!("{desired} is available now; select it instead"),
            ));
        }

        // Re-joining from the same session replaces the earlier entry.
        self.entries
            .retain(|_, e| e.session_id.as_deref() != Some(session_id));

        let entry = WaitlistEntry {
            id: uuid::Uuid::new_v4().to_string(),
            customer_id,
            visit_id: None,
            session_id: Some(session_id.to_string()),
            desired_tier: desired,
            backup_tier: backup,
            status: WaitlistStatus::Active,
            offered_resource: None,
            created_at: now,
            offered_at: None,
        };
        self.entries.insert(entry.id.clone(), entry.clone());
        Ok(entry)
    }

    pub fn get(&self, id: &str) -> Option<&WaitlistEntry> {
        self.entries.get(id)
    }

    pub fn require(&self, id: &str) -> CoreResult<&WaitlistEntry> {
        self.entries
            .get(id)
            .ok_or_else(|| CoreError::not_found("WaitlistEntry", id))
    }

    /// Entries in creation order.
    pub fn list(&self) -> Vec<WaitlistEntry> {
        let mut all: Vec<_> = self.entries.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        all
    }

    pub fn for_customer(&self, customer_id: DbId) -> Option<&WaitlistEntry> {
        self.entries.values().find(|e| e.customer_id == customer_id)
    }

    /// Turn the session link into a visit link once check-in completes.
    pub fn attach_visit(&mut self, id: &str, visit_id: &str) -> Option<WaitlistEntry> {
        let entry = self.entries.get_mut(id)?;
        entry.visit_id = Some(visit_id.to_string());
        entry.session_id = None;
        Some(entry.clone())
    }

    /// Drop entries still tied to a session that never completed.
    pub fn remove_for_session(&mut self, session_id: &str) -> Vec<WaitlistEntry> {
        self.drain(|e| e.session_id.as_deref() == Some(session_id))
    }

    /// Expire everything a departing customer queued.
    pub fn expire_for_customer(&mut self, customer_id: DbId) -> Vec<WaitlistEntry> {
        self.drain(|e| e.customer_id == customer_id)
    }

    fn drain(&mut self, pred: impl Fn(&WaitlistEntry) -> bool) -> Vec<WaitlistEntry> {
        let ids: Vec<String> = self
            .entries
            .values()
            .filter(|e| pred(e))
            .map(|e| e.id.clone())
            .collect();
        ids.iter().filter_map(|id| self.entries.remove(id)).collect()
    }

    /// Offer a free resource of the desired tier.
    pub fn offer(&mut self, id: &str, resource: &Resource, now: Timestamp) -> CoreResult<WaitlistEntry> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| CoreError::not_found("WaitlistEntry", id))?;

        if entry.visit_id.is_none() {
            return Err(CoreError::precondition(
                PreconditionCode::NoActiveVisit,
                "Waitlist entry has no completed check-in yet",
            ));
        }
        if resource.tier != entry.desired_tier {
            return Err(CoreError::Validation(format!(
                "{} {} is {}, not the desired {}",
                resource.resource_type, resource.number, resource.tier, entry.desired_tier
            )));
        }
        if !resource.is_available() {
            return Err(CoreError::conflict_with(
                ConflictCode::ResourceUnavailable,
                format!("{} {} is not available", resource.resource_type, resource.number),
                serde_json::json!({ "raceLost": false }),
            ));
        }

        entry.status = WaitlistStatus::Offered;
        entry.offered_resource = Some(OfferedResource {
            resource: resource.resource_ref(),
            number: resource.number.clone(),
        });
        entry.offered_at = Some(now);
        Ok(entry.clone())
    }

    /// The offered entry, ready to fulfil. Does not remove it.
    pub fn offered(&self, id: &str) -> CoreResult<(&WaitlistEntry, &OfferedResource, &str)> {
        let entry = self.require(id)?;
        match (&entry.offered_resource, entry.visit_id.as_deref()) {
            (Some(offer), Some(visit_id)) if entry.status == WaitlistStatus::Offered => {
                Ok((entry, offer, visit_id))
            }
            _ => Err(CoreError::precondition(
                PreconditionCode::InvalidTransition,
                "Waitlist entry has not been offered a resource",
            )),
        }
    }

    pub fn remove(&mut self, id: &str) -> CoreResult<WaitlistEntry> {
        self.entries
            .remove(id)
            .ok_or_else(|| CoreError::not_found("WaitlistEntry", id))
    }
}
