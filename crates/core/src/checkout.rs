//! Checkout requests and the claim, verify, complete protocol.
//!
//! A request is raised by the customer kiosk for an occupied resource. One
//! employee claims it (exclusive), confirms returned items, collects any
//! late fee, and completes it. Lateness is never stored: every read runs
//! the [`LateFeePolicy`] against the current time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::customer::{Customer, CustomerRegistry, Visit};
use crate::error::{ConflictCode, CoreError, CoreResult, PreconditionCode};
use crate::inventory::{InventoryStore, Resource};
use crate::late_fee::{LateAssessment, LateFeePolicy};
use crate::rental::{ResourceRef, ResourceType};
use crate::types::{Cents, DbId, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckoutStatus {
    Unclaimed,
    Claimed,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub request_id: String,
    #[serde(flatten)]
    pub resource: ResourceRef,
    pub resource_number: String,
    pub customer_id: DbId,
    pub customer_name: String,
    pub visit_id: String,
    pub scheduled_checkout_at: Timestamp,
    pub items_confirmed: bool,
    pub fee_paid_amount: Cents,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

/// A request plus everything computed at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutView {
    #[serde(flatten)]
    pub request: CheckoutRequest,
    pub status: CheckoutStatus,
    pub late_minutes: i64,
    pub late_fee_amount: Cents,
    pub ban_applied: bool,
    pub fee_paid: bool,
}

impl CheckoutRequest {
    pub fn assess(&self, policy: &LateFeePolicy, now: Timestamp) -> LateAssessment {
        policy.assess(self.scheduled_checkout_at, now)
    }

    pub fn status(&self) -> CheckoutStatus {
        if self.claimed_by.is_some() {
            CheckoutStatus::Claimed
        } else {
            CheckoutStatus::Unclaimed
        }
    }

    /// The recorded payment covers `fee`. A zero fee is always covered.
    pub fn fee_covered(&self, fee: Cents) -> bool {
        self.fee_paid_amount >= fee
    }

    pub fn view(&self, policy: &LateFeePolicy, now: Timestamp) -> CheckoutView {
        self.view_with_status(self.status(), policy, now)
    }

    pub fn view_with_status(
        &self,
        status: CheckoutStatus,
        policy: &LateFeePolicy,
        now: Timestamp,
    ) -> CheckoutView {
        let a = self.assess(policy, now);
        CheckoutView {
            request: self.clone(),
            status,
            late_minutes: a.late_minutes,
            late_fee_amount: a.late_fee_amount,
            ban_applied: a.ban_applied,
            fee_paid: self.fee_covered(a.late_fee_amount),
        }
    }

    fn require_holder(&self, employee: &str) -> CoreResult<()> {
        if self.claimed_by.as_deref() != Some(employee) {
            return Err(CoreError::precondition(
                PreconditionCode::NotClaimHolder,
                "Checkout is not claimed by this employee",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

/// The set of active checkout requests.
#[derive(Debug, Clone, Default)]
pub struct CheckoutBoard {
    requests: BTreeMap<String, CheckoutRequest>,
}

impl CheckoutBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise a request for `visit`. Returns the existing request and
    /// `false` if one is already active for the visit.
    pub fn request(
        &mut self,
        visit: &Visit,
        customer_name: &str,
        now: Timestamp,
    ) -> (CheckoutRequest, bool) {
        if let Some(existing) = self.for_visit(&visit.visit_id) {
            return (existing.clone(), false);
        }

        let req = CheckoutRequest {
            request_id: uuid::Uuid::new_v4().to_string(),
            resource: visit.resource,
            resource_number: visit.resource_number.clone(),
            customer_id: visit.customer_id,
            customer_name: customer_name.to_string(),
            visit_id: visit.visit_id.clone(),
            scheduled_checkout_at: visit.checkout_at,
            items_confirmed: false,
            fee_paid_amount: Cents::ZERO,
            claimed_by: None,
            claimed_at: None,
            created_at: now,
        };
        self.requests.insert(req.request_id.clone(), req.clone());
        (req, true)
    }

    pub fn for_visit(&self, visit_id: &str) -> Option<&CheckoutRequest> {
        self.requests.values().find(|r| r.visit_id == visit_id)
    }

    pub fn get(&self, request_id: &str) -> Option<&CheckoutRequest> {
        self.requests.get(request_id)
    }

    pub fn require(&self, request_id: &str) -> CoreResult<&CheckoutRequest> {
        self.requests
            .get(request_id)
            .ok_or_else(|| CoreError::not_found("CheckoutRequest", request_id))
    }

    fn require_mut(&mut self, request_id: &str) -> CoreResult<&mut CheckoutRequest> {
        self.requests
            .get_mut(request_id)
            .ok_or_else(|| CoreError::not_found("CheckoutRequest", request_id))
    }

    /// Oldest first.
    pub fn list(&self) -> Vec<&CheckoutRequest> {
        let mut all: Vec<_> = self.requests.values().collect();
        all.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then(a.request_id.cmp(&b.request_id))
        });
        all
    }

    /// Exclusive claim. Returns `true` if this call took the claim and
    /// `false` for an idempotent re-claim by the same employee.
    pub fn claim(
        &mut self,
        request_id: &str,
        employee: &str,
        now: Timestamp,
    ) -> CoreResult<(CheckoutRequest, bool)> {
        let req = self.require_mut(request_id)?;
        match req.claimed_by.as_deref() {
            Some(holder) if holder == employee => Ok((req.clone(), false)),
            Some(holder) => Err(CoreError::conflict_with(
                ConflictCode::AlreadyClaimed,
                "Checkout has already been claimed",
                serde_json::json!({ "claimedBy": holder }),
            )),
            None => {
                req.claimed_by = Some(employee.to_string());
                req.claimed_at = Some(now);
                Ok((req.clone(), true))
            }
        }
    }

    pub fn confirm_items(
        &mut self,
        request_id: &str,
        employee: &str,
    ) -> CoreResult<(CheckoutRequest, bool)> {
        let req = self.require_mut(request_id)?;
        req.require_holder(employee)?;
        let changed = !req.items_confirmed;
        req.items_confirmed = true;
        Ok((req.clone(), changed))
    }

    /// Record `fee` (the fee as of now) as collected.
    pub fn mark_fee_paid(
        &mut self,
        request_id: &str,
        employee: &str,
        fee: Cents,
    ) -> CoreResult<(CheckoutRequest, bool)> {
        let req = self.require_mut(request_id)?;
        req.require_holder(employee)?;
        if fee.is_zero() || req.fee_covered(fee) {
            return Ok((req.clone(), false));
        }
        req.fee_paid_amount = fee;
        Ok((req.clone(), true))
    }

    /// The completion gate. Does not remove the request.
    pub fn ensure_completable(
        &self,
        request_id: &str,
        employee: &str,
        policy: &LateFeePolicy,
        now: Timestamp,
    ) -> CoreResult<(&CheckoutRequest, LateAssessment)> {
        let req = self.require(request_id)?;
        req.require_holder(employee)?;
        if !req.items_confirmed {
            return Err(CoreError::precondition(
                PreconditionCode::ItemsNotConfirmed,
                "Returned items have not been confirmed",
            ));
        }
        let assessment = req.assess(policy, now);
        if !req.fee_covered(assessment.late_fee_amount) {
            return Err(CoreError::precondition(
                PreconditionCode::FeeUnpaid,
                format!("Late fee of {} is unpaid", assessment.late_fee_amount),
            ));
        }
        Ok((req, assessment))
    }

    pub fn remove(&mut self, request_id: &str) -> CoreResult<CheckoutRequest> {
        self.requests
            .remove(request_id)
            .ok_or_else(|| CoreError::not_found("CheckoutRequest", request_id))
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Everything an employee needs to check a resource out, computed now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutContext {
    pub customer: Customer,
    pub resource: Resource,
    pub visit_id: String,
    pub scheduled_checkout_at: Timestamp,
    pub late_minutes: i64,
    pub late_fee_amount: Cents,
    pub ban_applied: bool,
    pub request_id: Option<String>,
}

pub fn resolve(
    inventory: &InventoryStore,
    registry: &CustomerRegistry,
    board: &CheckoutBoard,
    resource_type: ResourceType,
    number: &str,
    policy: &LateFeePolicy,
    now: Timestamp,
) -> CoreResult<CheckoutContext> {
    let resource = inventory
        .find_by_number(resource_type, number)
        .ok_or_else(|| CoreError::not_found("Resource", format!("{resource_type} {number}")))?;
    let visit = registry
        .visit_for_resource(resource.resource_ref())
        .ok_or_else(|| {
            CoreError::precondition(
                PreconditionCode::NoActiveVisit,
                format!("{resource_type} {number} has no active visit"),
            )
        })?;
    let customer = registry.require(visit.customer_id)?;
    let a = policy.assess(visit.checkout_at, now);

    Ok(CheckoutContext {
        customer: customer.clone(),
        resource: resource.clone(),
        visit_id: visit.visit_id.clone(),
        scheduled_checkout_at: visit.checkout_at,
        late_minutes: a.late_minutes,
        late_fee_amount: a.late_fee_amount,
        ban_applied: a.ban_applied,
        request_id: board.for_visit(&visit.visit_id).map(|r| r.request_id.clone()),
    })
}
