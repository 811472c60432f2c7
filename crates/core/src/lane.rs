//! Lane sessions: the authoritative record of the customer currently at a
//! lane, and the partial patches broadcast when it changes.
//!
//! Every mutation here is pure. The server applies them to a clone under the
//! lane lock and broadcasts [`SessionPatch::diff`] of before and after.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::customer::{Customer, Visit};
use crate::error::{ConflictCode, CoreError, CoreResult, PreconditionCode};
use crate::inventory::Resource;
use crate::rental::{Actor, RentalTier, ResourceRef, ResourceType};
use crate::types::{double_option, Cents, DbId, Timestamp};
use crate::waitlist::WaitlistEntry;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    #[default]
    Initial,
    Renewal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Due,
    Paid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Active,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub description: String,
    pub amount: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentQuote {
    pub line_items: Vec<LineItem>,
    pub total: Cents,
}

impl PaymentQuote {
    pub fn new(line_items: Vec<LineItem>) -> Self {
        let total = line_items
            .iter()
            .fold(Cents::ZERO, |acc, item| acc + item.amount);
        Self { line_items, total }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaneSession {
    pub session_id: String,
    pub lane_id: String,
    pub customer_id: DbId,
    pub customer_name: String,
    pub membership_number: Option<String>,
    pub membership_valid_until: Option<Timestamp>,
    pub primary_language: Option<String>,
    pub notes: Option<String>,
    pub past_due_balance: Cents,

    pub mode: Mode,
    pub renewal_visit_id: Option<String>,
    pub block_ends_at: Option<Timestamp>,
    pub active_assigned_resource_type: Option<ResourceType>,
    pub active_assigned_resource_number: Option<String>,

    pub proposed_rental_type: Option<RentalTier>,
    pub proposed_by: Option<Actor>,
    pub selection_confirmed: bool,
    pub confirmed_by: Option<Actor>,
    pub customer_selected_type: Option<RentalTier>,
    pub selection_acknowledged: bool,

    pub assigned_resource_type: Option<ResourceType>,
    pub assigned_resource_id: Option<DbId>,
    pub assigned_resource_number: Option<String>,
    pub checkout_at: Option<Timestamp>,
    pub needs_confirmation: bool,
    /// Holding period of the assigned resource. Server-side only.
    #[serde(skip)]
    pub occupancy_id: Option<String>,

    pub payment_intent_id: Option<String>,
    pub payment_status: Option<PaymentStatus>,
    pub payment_quote: Option<PaymentQuote>,
    pub payment_failure_reason: Option<String>,

    pub agreement_signed: bool,
    pub signature_override: bool,

    pub waitlist_id: Option<String>,

    pub status: SessionStatus,
    pub created_at: Timestamp,
}

impl LaneSession {
    /// A fresh session for `customer`. `renewal` is the visit being extended
    /// and is only consulted in [`Mode::Renewal`].
    pub fn start(
        lane_id: &str,
        customer: &Customer,
        mode: Mode,
        renewal: Option<&Visit>,
        now: Timestamp,
    ) -> Self {
        let renewal = renewal.filter(|_| mode == Mode::Renewal);
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            lane_id: lane_id.to_string(),
            customer_id: customer.id,
            customer_name: customer.name.clone(),
            membership_number: customer.membership_number.clone(),
            membership_valid_until: customer.membership_valid_until,
            primary_language: customer.primary_language.clone(),
            notes: customer.notes.clone(),
            past_due_balance: customer.past_due_balance,
            mode,
            renewal_visit_id: renewal.map(|v| v.visit_id.clone()),
            block_ends_at: renewal.map(|v| v.checkout_at),
            active_assigned_resource_type: renewal.map(|v| v.resource.resource_type),
            active_assigned_resource_number: renewal.map(|v| v.resource_number.clone()),
            proposed_rental_type: None,
            proposed_by: None,
            selection_confirmed: false,
            confirmed_by: None,
            customer_selected_type: None,
            selection_acknowledged: false,
            assigned_resource_type: None,
            assigned_resource_id: None,
            assigned_resource_number: None,
            checkout_at: None,
            needs_confirmation: false,
            occupancy_id: None,
            payment_intent_id: None,
            payment_status: None,
            payment_quote: None,
            payment_failure_reason: None,
            agreement_signed: false,
            signature_override: false,
            waitlist_id: None,
            status: SessionStatus::Active,
            created_at: now,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == Some(PaymentStatus::Paid)
    }

    /// The resource this session holds and its holding period, if any.
    pub fn held_resource(&self) -> Option<(ResourceRef, &str)> {
        match (
            self.assigned_resource_type,
            self.assigned_resource_id,
            self.occupancy_id.as_deref(),
        ) {
            (Some(resource_type), Some(resource_id), Some(occupancy)) => Some((
                ResourceRef {
                    resource_type,
                    resource_id,
                },
                occupancy,
            )),
            _ => None,
        }
    }

    fn require_selection(&self) -> CoreResult<RentalTier> {
        match self.customer_selected_type {
            Some(tier) if self.selection_confirmed => Ok(tier),
            _ => Err(CoreError::precondition(
                PreconditionCode::SelectionRequired,
                "Rental selection has not been confirmed",
            )),
        }
    }

    // -- Payment --------------------------------------------------------

    /// Quote the locked selection and open a payment intent.
    ///
    /// Returns the existing intent when one is already open.
    pub fn create_payment_intent(&mut self) -> CoreResult<String> {
        if self.is_paid() {
            return Err(CoreError::conflict(
                ConflictCode::AlreadyPaid,
                "Session has already been paid",
            ));
        }
        let tier = self.require_selection()?;
        if let Some(existing) = &self.payment_intent_id {
            return Ok(existing.clone());
        }

        let label = match self.mode {
            Mode::Initial => format!("{tier} rental"),
            Mode::Renewal => format!("{tier} renewal"),
        };
        let mut items = vec![LineItem {
            description: label,
            amount: tier.block_price(),
        }];
        if self.past_due_balance > Cents::ZERO {
            items.push(LineItem {
                description: "Past due balance".into(),
                amount: self.past_due_balance,
            });
        }

        let id = uuid::Uuid::new_v4().to_string();
        self.payment_quote = Some(PaymentQuote::new(items));
        self.payment_status = Some(PaymentStatus::Due);
        self.payment_intent_id = Some(id.clone());
        Ok(id)
    }

    pub fn mark_paid(&mut self, payment_intent_id: &str) -> CoreResult<()> {
        let Some(current) = self.payment_intent_id.as_deref() else {
            return Err(CoreError::precondition(
                PreconditionCode::NoPaymentIntent,
                "No payment intent exists for this session",
            ));
        };
        if current != payment_intent_id {
            return Err(CoreError::precondition(
                PreconditionCode::PaymentIntentMismatch,
                format!("Payment intent {payment_intent_id} does not match the session"),
            ));
        }
        self.payment_status = Some(PaymentStatus::Paid);
        self.payment_failure_reason = None;
        Ok(())
    }

    pub fn record_payment_failure(&mut self, reason: &str) -> CoreResult<()> {
        if self.payment_intent_id.is_none() {
            return Err(CoreError::precondition(
                PreconditionCode::NoPaymentIntent,
                "No payment intent exists for this session",
            ));
        }
        if self.is_paid() {
            return Err(CoreError::conflict(
                ConflictCode::AlreadyPaid,
                "Session has already been paid",
            ));
        }
        self.payment_failure_reason = Some(reason.to_string());
        Ok(())
    }

    // -- Agreement ------------------------------------------------------

    pub fn sign_agreement(&mut self) {
        self.agreement_signed = true;
    }

    /// Administrative bypass of the customer signature.
    pub fn override_signature(&mut self) {
        self.agreement_signed = true;
        self.signature_override = true;
    }

    // -- Assignment -----------------------------------------------------

    /// Guard for `assign`. Returns the locked tier on success.
    pub fn ensure_assignable(&self) -> CoreResult<RentalTier> {
        if self.mode == Mode::Renewal {
            return Err(CoreError::precondition(
                PreconditionCode::RenewalHasResource,
                "Renewal sessions keep their current resource",
            ));
        }
        if self.assigned_resource_id.is_some() {
            return Err(CoreError::precondition(
                PreconditionCode::AlreadyAssigned,
                "A resource is already assigned to this session",
            ));
        }
        let tier = self.require_selection()?;
        if !self.is_paid() {
            return Err(CoreError::precondition(
                PreconditionCode::PaymentRequired,
                "Payment must be completed before assignment",
            ));
        }
        if !self.agreement_signed {
            return Err(CoreError::precondition(
                PreconditionCode::AgreementRequired,
                "Agreement must be signed before assignment",
            ));
        }
        Ok(tier)
    }

    /// Record a successful inventory assignment. A resource of a different
    /// tier than the locked selection waits for the customer's confirmation.
    pub fn record_assignment(&mut self, resource: &Resource) {
        self.assigned_resource_type = Some(resource.resource_type);
        self.assigned_resource_id = Some(resource.id);
        self.assigned_resource_number = Some(resource.number.clone());
        self.checkout_at = resource.checkout_at;
        self.occupancy_id = resource.occupancy_id.clone();
        self.needs_confirmation = self.customer_selected_type != Some(resource.tier);
    }

    fn require_pending_confirmation(&self) -> CoreResult<()> {
        if self.assigned_resource_id.is_none() || !self.needs_confirmation {
            return Err(CoreError::precondition(
                PreconditionCode::NoPendingConfirmation,
                "No assignment is waiting for customer confirmation",
            ));
        }
        Ok(())
    }

    pub fn confirm_assignment(&mut self) -> CoreResult<()> {
        self.require_pending_confirmation()?;
        self.needs_confirmation = false;
        Ok(())
    }

    /// Drop a held cross-type assignment. Returns the resource to release.
    pub fn decline_assignment(&mut self) -> CoreResult<(ResourceRef, String)> {
        self.require_pending_confirmation()?;
        let held = self
            .held_resource()
            .map(|(r, occupancy)| (r, occupancy.to_string()))
            .ok_or_else(|| CoreError::Internal("assignment without occupancy".into()))?;
        self.clear_assignment();
        Ok(held)
    }

    pub fn clear_assignment(&mut self) {
        self.assigned_resource_type = None;
        self.assigned_resource_id = None;
        self.assigned_resource_number = None;
        self.checkout_at = None;
        self.needs_confirmation = false;
        self.occupancy_id = None;
    }

    // -- Completion -----------------------------------------------------

    /// Guard for completing the check-in. Returns the locked tier.
    pub fn ensure_completable(&self) -> CoreResult<RentalTier> {
        let tier = self.require_selection()?;
        if !self.is_paid() {
            return Err(CoreError::precondition(
                PreconditionCode::PaymentRequired,
                "Payment must be completed before check-in",
            ));
        }
        if !self.agreement_signed {
            return Err(CoreError::precondition(
                PreconditionCode::AgreementRequired,
                "Agreement must be signed before check-in",
            ));
        }
        if self.mode == Mode::Initial {
            if self.held_resource().is_none() {
                return Err(CoreError::precondition(
                    PreconditionCode::AssignmentRequired,
                    "A resource must be assigned before check-in",
                ));
            }
            if self.needs_confirmation {
                return Err(CoreError::precondition(
                    PreconditionCode::AssignmentRequired,
                    "Assignment is waiting for customer confirmation",
                ));
            }
        }
        Ok(tier)
    }

    /// A resource held by a session that never completed goes back to the
    /// pool on clear. Renewals never hold a fresh resource.
    pub fn releasable_resource(&self) -> Option<(ResourceRef, &str)> {
        match (self.mode, self.status) {
            (Mode::Initial, SessionStatus::Active) => self.held_resource(),
            _ => None,
        }
    }
}

/// Read model for `GET /checkin/lane/{lane}/session`, used to resync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaneSnapshot {
    pub lane_id: String,
    pub revision: u64,
    pub session: Option<LaneSession>,
}

/// Extend `from` by `hours`.
pub fn block_end(from: Timestamp, hours: i64) -> Timestamp {
    from + Duration::hours(hours)
}

// ---------------------------------------------------------------------------
// Active check-in conflict details
// ---------------------------------------------------------------------------

/// Carried in the `ALREADY_CHECKED_IN` conflict so the terminal can show the
/// customer's current stay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveCheckin {
    pub visit_id: String,
    pub rental_type: RentalTier,
    pub assigned_resource_type: ResourceType,
    pub assigned_resource_number: String,
    pub checkin_at: Timestamp,
    pub checkout_at: Timestamp,
    pub overdue: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waitlist: Option<WaitlistEntry>,
}

impl ActiveCheckin {
    pub fn new(visit: &Visit, waitlist: Option<WaitlistEntry>, now: Timestamp) -> Self {
        Self {
            visit_id: visit.visit_id.clone(),
            rental_type: visit.rental_type,
            assigned_resource_type: visit.resource.resource_type,
            assigned_resource_number: visit.resource_number.clone(),
            checkin_at: visit.checkin_at,
            checkout_at: visit.checkout_at,
            overdue: now > visit.checkout_at,
            waitlist,
        }
    }

    pub fn into_conflict(self) -> CoreError {
        CoreError::conflict_with(
            ConflictCode::AlreadyCheckedIn,
            "Customer already has an active check-in",
            serde_json::json!({ "activeCheckin": self }),
        )
    }
}

// ---------------------------------------------------------------------------
// Session patch
// ---------------------------------------------------------------------------

macro_rules! define_session_patch {
    (
        required { $( $req:ident : $req_ty:ty ),+ $(,)? }
        nullable { $( $nul:ident : $nul_ty:ty ),+ $(,)? }
    ) => {
        /// The changed subset of a [`LaneSession`].
        ///
        /// Absent fields are untouched by the receiver. Nullable fields use a
        /// double option: `Some(None)` serializes as `null` and clears the
        /// field.
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub struct SessionPatch {
            $(
                #[serde(default, skip_serializing_if = "Option::is_none")]
                pub $req: Option<$req_ty>,
            )+
            $(
                #[serde(
                    default,
                    skip_serializing_if = "Option::is_none",
                    deserialize_with = "double_option"
                )]
                pub $nul: Option<Option<$nul_ty>>,
            )+
        }

        impl SessionPatch {
            /// Every field of `session`.
            pub fn full(session: &LaneSession) -> Self {
                Self {
                    $( $req: Some(session.$req.clone()), )+
                    $( $nul: Some(session.$nul.clone()), )+
                }
            }

            /// Only the fields that differ between `before` and `after`.
            pub fn diff(before: &LaneSession, after: &LaneSession) -> Self {
                let mut patch = Self::default();
                $(
                    if before.$req != after.$req {
                        patch.$req = Some(after.$req.clone());
                    }
                )+
                $(
                    if before.$nul != after.$nul {
                        patch.$nul = Some(after.$nul.clone());
                    }
                )+
                patch
            }

            /// Overlay the present fields of `other` onto `self`.
            pub fn merge(&mut self, other: &SessionPatch) {
                $(
                    if other.$req.is_some() {
                        self.$req = other.$req.clone();
                    }
                )+
                $(
                    if other.$nul.is_some() {
                        self.$nul = other.$nul.clone();
                    }
                )+
            }

            pub fn is_empty(&self) -> bool {
                $( self.$req.is_none() && )+
                $( self.$nul.is_none() && )+
                true
            }
        }
    };
}

define_session_patch! {
    required {
        session_id: String,
        lane_id: String,
        customer_id: DbId,
        customer_name: String,
        past_due_balance: Cents,
        mode: Mode,
        selection_confirmed: bool,
        selection_acknowledged: bool,
        needs_confirmation: bool,
        agreement_signed: bool,
        signature_override: bool,
        status: SessionStatus,
    }
    nullable {
        membership_number: String,
        membership_valid_until: Timestamp,
        primary_language: String,
        notes: String,
        renewal_visit_id: String,
        block_ends_at: Timestamp,
        active_assigned_resource_type: ResourceType,
        active_assigned_resource_number: String,
        proposed_rental_type: RentalTier,
        proposed_by: Actor,
        confirmed_by: Actor,
        customer_selected_type: RentalTier,
        assigned_resource_type: ResourceType,
        assigned_resource_id: DbId,
        assigned_resource_number: String,
        checkout_at: Timestamp,
        payment_intent_id: String,
        payment_status: PaymentStatus,
        payment_quote: PaymentQuote,
        payment_failure_reason: String,
        waitlist_id: String,
    }
}

impl SessionPatch {
    /// The broadcast that tells every terminal the lane has been emptied.
    pub fn completion() -> Self {
        Self {
            status: Some(SessionStatus::Completed),
            customer_name: Some(String::new()),
            ..Self::default()
        }
    }

    pub fn is_completion_reset(&self) -> bool {
        self.status == Some(SessionStatus::Completed)
            && self.customer_name.as_deref() == Some("")
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;

    use super::*;

    fn customer(balance: i64) -> Customer {
        Customer {
            id: 7,
            name: "Alex Doe".into(),
            membership_number: Some("M-7".into()),
            membership_valid_until: None,
            primary_language: None,
            notes: None,
            past_due_balance: Cents(balance),
            id_scan_hash: None,
            banned_until: None,
        }
    }

    fn locked(tier: RentalTier, balance: i64) -> LaneSession {
        let mut s = LaneSession::start("lane-1", &customer(balance), Mode::Initial, None, Utc::now());
        s.proposed_rental_type = Some(tier);
        s.proposed_by = Some(Actor::Customer);
        s.customer_selected_type = Some(tier);
        s.selection_confirmed = true;
        s.confirmed_by = Some(Actor::Employee);
        s
    }

    #[test]
    fn payment_intent_requires_selection() {
        let mut s = LaneSession::start("lane-1", &customer(0), Mode::Initial, None, Utc::now());
        let err = s.create_payment_intent().unwrap_err();
        assert_eq!(err.precondition_code(), Some(PreconditionCode::SelectionRequired));
    }

    #[test]
    fn payment_quote_includes_past_due_balance() {
        let mut s = locked(RentalTier::Standard, 1250);
        s.create_payment_intent().unwrap();

        let quote = s.payment_quote.as_ref().unwrap();
        assert_eq!(quote.line_items.len(), 2);
        assert_eq!(quote.total, Cents::dollars(30) + Cents(1250));
        assert_eq!(s.payment_status, Some(PaymentStatus::Due));
    }

    #[test]
    fn payment_intent_is_idempotent_until_paid() {
        let mut s = locked(RentalTier::Locker, 0);
        let first = s.create_payment_intent().unwrap();
        assert_eq!(s.create_payment_intent().unwrap(), first);

        s.mark_paid(&first).unwrap();
        let err = s.create_payment_intent().unwrap_err();
        assert_eq!(err.conflict_code(), Some(ConflictCode::AlreadyPaid));
    }

    #[test]
    fn mark_paid_checks_intent() {
        let mut s = locked(RentalTier::Locker, 0);
        let err = s.mark_paid("nope").unwrap_err();
        assert_eq!(err.precondition_code(), Some(PreconditionCode::NoPaymentIntent));

        s.create_payment_intent().unwrap();
        s.record_payment_failure("card declined").unwrap();
        let err = s.mark_paid("nope").unwrap_err();
        assert_eq!(err.precondition_code(), Some(PreconditionCode::PaymentIntentMismatch));

        let id = s.payment_intent_id.clone().unwrap();
        s.mark_paid(&id).unwrap();
        assert!(s.is_paid());
        assert_eq!(s.payment_failure_reason, None);
    }

    #[test]
    fn assignment_guards_run_in_order() {
        let mut s = locked(RentalTier::Standard, 0);
        assert_matches!(
            s.ensure_assignable().unwrap_err().precondition_code(),
            Some(PreconditionCode::PaymentRequired)
        );

        let id = s.create_payment_intent().unwrap();
        s.mark_paid(&id).unwrap();
        assert_matches!(
            s.ensure_assignable().unwrap_err().precondition_code(),
            Some(PreconditionCode::AgreementRequired)
        );

        s.sign_agreement();
        assert_eq!(s.ensure_assignable().unwrap(), RentalTier::Standard);

        let mut room = Resource::new_room(1, "101", RentalTier::Standard);
        room.occupancy_id = Some("occ-1".into());
        s.record_assignment(&room);
        assert!(!s.needs_confirmation);
        assert_matches!(
            s.ensure_assignable().unwrap_err().precondition_code(),
            Some(PreconditionCode::AlreadyAssigned)
        );
    }

    #[test]
    fn cross_type_assignment_needs_confirmation() {
        let mut s = locked(RentalTier::Standard, 0);
        let mut room = Resource::new_room(2, "201", RentalTier::Double);
        room.occupancy_id = Some("occ-2".into());
        s.record_assignment(&room);
        assert!(s.needs_confirmation);
        assert!(s.ensure_completable().is_err());

        let (released, occupancy) = s.decline_assignment().unwrap();
        assert_eq!(released, ResourceRef::room(2));
        assert_eq!(occupancy, "occ-2");
        assert_eq!(s.assigned_resource_id, None);
        assert_matches!(
            s.confirm_assignment().unwrap_err().precondition_code(),
            Some(PreconditionCode::NoPendingConfirmation)
        );
    }

    #[test]
    fn diff_reports_only_changes() {
        let before = locked(RentalTier::Standard, 0);
        let mut after = before.clone();
        after.sign_agreement();
        after.payment_failure_reason = None;

        let patch = SessionPatch::diff(&before, &after);
        assert_eq!(patch.agreement_signed, Some(true));
        assert_eq!(patch.customer_name, None);
        assert_eq!(patch.payment_failure_reason, None);

        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({ "agreementSigned": true }));
    }

    #[test]
    fn cleared_fields_serialize_as_null() {
        let mut before = locked(RentalTier::Standard, 0);
        before.payment_failure_reason = Some("declined".into());
        let mut after = before.clone();
        after.payment_failure_reason = None;

        let json = serde_json::to_value(SessionPatch::diff(&before, &after)).unwrap();
        assert_eq!(json, serde_json::json!({ "paymentFailureReason": null }));

        let back: SessionPatch = serde_json::from_value(json).unwrap();
        assert_eq!(back.payment_failure_reason, Some(None));
        assert_eq!(back.notes, None);
    }

    #[test]
    fn completion_patch_is_recognised() {
        let patch = SessionPatch::completion();
        assert!(patch.is_completion_reset());
        assert!(!SessionPatch::full(&locked(RentalTier::Locker, 0)).is_completion_reset());
        assert!(SessionPatch::default().is_empty());
    }
}
