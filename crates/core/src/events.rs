//! The server-to-terminal event catalogue.
//!
//! On the wire every event is a `{type, payload}` frame. Lane-scoped
//! payloads carry the lane id, the lane's revision after the change, and a
//! [`SessionPatch`] of the fields that changed. Venue-scoped payloads carry
//! keyed upserts and removals.

use serde::{Deserialize, Serialize};

use crate::checkout::CheckoutView;
use crate::error::ConflictCode;
use crate::inventory::Resource;
use crate::lane::SessionPatch;
use crate::rental::{RentalTier, ResourceRef, ResourceStatus};
use crate::types::{Cents, DbId, Timestamp};
use crate::waitlist::WaitlistEntry;

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanePayload {
    pub lane_id: String,
    pub revision: u64,
    #[serde(default)]
    pub session: SessionPatch,
}

/// A free resource offered to a terminal as the next best choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedResource {
    #[serde(flatten)]
    pub resource: ResourceRef,
    pub number: String,
    pub tier: RentalTier,
}

impl From<&Resource> for SuggestedResource {
    fn from(r: &Resource) -> Self {
        Self {
            resource: r.resource_ref(),
            number: r.number.clone(),
            tier: r.tier,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentFailedPayload {
    #[serde(flatten)]
    pub lane: LanePayload,
    pub contested: ResourceRef,
    pub code: ConflictCode,
    pub race_lost: bool,
    pub suggested_resource: Option<SuggestedResource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDeclinedPayload {
    #[serde(flatten)]
    pub lane: LanePayload,
    pub released: ResourceRef,
    pub suggested_resource: Option<SuggestedResource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutPayload {
    pub request: CheckoutView,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutCompletedPayload {
    pub request_id: String,
    pub visit_id: String,
    pub customer_id: DbId,
    pub resource: ResourceRef,
    pub late_minutes: i64,
    pub late_fee_amount: Cents,
    pub ban_applied: bool,
    pub banned_until: Option<Timestamp>,
    pub completed_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryPayload {
    pub resources: Vec<Resource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStatusPayload {
    pub resource: Resource,
    pub previous_status: ResourceStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitlistPayload {
    #[serde(default)]
    pub entries: Vec<WaitlistEntry>,
    #[serde(default)]
    pub removed: Vec<String>,
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerEvent {
    SessionUpdated(LanePayload),
    CheckoutRequested(CheckoutPayload),
    CheckoutClaimed(CheckoutPayload),
    CheckoutUpdated(CheckoutPayload),
    CheckoutCompleted(CheckoutCompletedPayload),
    InventoryUpdated(InventoryPayload),
    RoomStatusChanged(RoomStatusPayload),
    SelectionProposed(LanePayload),
    SelectionLocked(LanePayload),
    SelectionForced(LanePayload),
    SelectionAcknowledged(LanePayload),
    AssignmentCreated(LanePayload),
    AssignmentFailed(AssignmentFailedPayload),
    CustomerConfirmed(LanePayload),
    CustomerDeclined(CustomerDeclinedPayload),
    WaitlistUpdated(WaitlistPayload),
}

/// Every event type name, as it appears in the `type` field.
pub const EVENT_TYPES: [&str; 16] = [
    "SESSION_UPDATED",
    "CHECKOUT_REQUESTED",
    "CHECKOUT_CLAIMED",
    "CHECKOUT_UPDATED",
    "CHECKOUT_COMPLETED",
    "INVENTORY_UPDATED",
    "ROOM_STATUS_CHANGED",
    "SELECTION_PROPOSED",
    "SELECTION_LOCKED",
    "SELECTION_FORCED",
    "SELECTION_ACKNOWLEDGED",
    "ASSIGNMENT_CREATED",
    "ASSIGNMENT_FAILED",
    "CUSTOMER_CONFIRMED",
    "CUSTOMER_DECLINED",
    "WAITLIST_UPDATED",
];

impl ServerEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SessionUpdated(_) => "SESSION_UPDATED",
            Self::CheckoutRequested(_) => "CHECKOUT_REQUESTED",
            Self::CheckoutClaimed(_) => "CHECKOUT_CLAIMED",
            Self::CheckoutUpdated(_) => "CHECKOUT_UPDATED",
            Self::CheckoutCompleted(_) => "CHECKOUT_COMPLETED",
            Self::InventoryUpdated(_) => "INVENTORY_UPDATED",
            Self::RoomStatusChanged(_) => "ROOM_STATUS_CHANGED",
            Self::SelectionProposed(_) => "SELECTION_PROPOSED",
            Self::SelectionLocked(_) => "SELECTION_LOCKED",
            Self::SelectionForced(_) => "SELECTION_FORCED",
            Self::SelectionAcknowledged(_) => "SELECTION_ACKNOWLEDGED",
            Self::AssignmentCreated(_) => "ASSIGNMENT_CREATED",
            Self::AssignmentFailed(_) => "ASSIGNMENT_FAILED",
            Self::CustomerConfirmed(_) => "CUSTOMER_CONFIRMED",
            Self::CustomerDeclined(_) => "CUSTOMER_DECLINED",
            Self::WaitlistUpdated(_) => "WAITLIST_UPDATED",
        }
    }

    /// The lane part of a lane-scoped event; `None` for venue events.
    pub fn lane(&self) -> Option<&LanePayload> {
        match self {
            Self::SessionUpdated(p)
            | Self::SelectionProposed(p)
            | Self::SelectionLocked(p)
            | Self::SelectionForced(p)
            | Self::SelectionAcknowledged(p)
            | Self::AssignmentCreated(p)
            | Self::CustomerConfirmed(p) => Some(p),
            Self::AssignmentFailed(p) => Some(&p.lane),
            Self::CustomerDeclined(p) => Some(&p.lane),
            _ => None,
        }
    }

    pub fn lane_id(&self) -> Option<&str> {
        self.lane().map(|p| p.lane_id.as_str())
    }

    pub fn is_venue_scoped(&self) -> bool {
        self.lane().is_none()
    }
}
