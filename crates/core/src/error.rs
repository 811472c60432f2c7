use serde::{Deserialize, Serialize};

/// Machine-readable codes for expected concurrent-use conflicts (HTTP 409).
///
/// Terminals branch on these codes to pick a recovery flow; message text is
/// for humans only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictCode {
    AlreadyCheckedIn,
    RaceLost,
    ResourceUnavailable,
    AlreadyClaimed,
    LaneOccupied,
    SelectionLocked,
    CustomerBanned,
    AlreadyPaid,
    ResourceOccupied,
    CustomerOnOtherLane,
}

impl ConflictCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyCheckedIn => "ALREADY_CHECKED_IN",
            Self::RaceLost => "RACE_LOST",
            Self::ResourceUnavailable => "RESOURCE_UNAVAILABLE",
            Self::AlreadyClaimed => "ALREADY_CLAIMED",
            Self::LaneOccupied => "LANE_OCCUPIED",
            Self::SelectionLocked => "SELECTION_LOCKED",
            Self::CustomerBanned => "CUSTOMER_BANNED",
            Self::AlreadyPaid => "ALREADY_PAID",
            Self::ResourceOccupied => "RESOURCE_OCCUPIED",
            Self::CustomerOnOtherLane => "CUSTOMER_ON_OTHER_LANE",
        }
    }
}

/// Machine-readable codes for business-rule guards that the caller can fix by
/// completing an earlier step (HTTP 400).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PreconditionCode {
    NoActiveSession,
    NoProposal,
    SelectionRequired,
    PaymentRequired,
    AgreementRequired,
    NoPaymentIntent,
    PaymentIntentMismatch,
    AlreadyAssigned,
    AssignmentRequired,
    NoPendingConfirmation,
    RenewalHasResource,
    NoActiveVisit,
    ItemsNotConfirmed,
    FeeUnpaid,
    NotClaimHolder,
    TierAvailable,
    InvalidTransition,
}

impl PreconditionCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoActiveSession => "NO_ACTIVE_SESSION",
            Self::NoProposal => "NO_PROPOSAL",
            Self::SelectionRequired => "SELECTION_REQUIRED",
            Self::PaymentRequired => "PAYMENT_REQUIRED",
            Self::AgreementRequired => "AGREEMENT_REQUIRED",
            Self::NoPaymentIntent => "NO_PAYMENT_INTENT",
            Self::PaymentIntentMismatch => "PAYMENT_INTENT_MISMATCH",
            Self::AlreadyAssigned => "ALREADY_ASSIGNED",
            Self::AssignmentRequired => "ASSIGNMENT_REQUIRED",
            Self::NoPendingConfirmation => "NO_PENDING_CONFIRMATION",
            Self::RenewalHasResource => "RENEWAL_HAS_RESOURCE",
            Self::NoActiveVisit => "NO_ACTIVE_VISIT",
            Self::ItemsNotConfirmed => "ITEMS_NOT_CONFIRMED",
            Self::FeeUnpaid => "FEE_UNPAID",
            Self::NotClaimHolder => "NOT_CLAIM_HOLDER",
            Self::TierAvailable => "TIER_AVAILABLE",
            Self::InvalidTransition => "INVALID_TRANSITION",
        }
    }

    /// Whether the guard is about who is calling rather than what state the
    /// session is in (HTTP 403 instead of 400).
    pub fn is_ownership(&self) -> bool {
        matches!(self, Self::NotClaimHolder)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Precondition failed ({}): {message}", code.as_str())]
    Precondition {
        code: PreconditionCode,
        message: String,
    },

    /// A conflict with concurrent state. `details` is merged into the
    /// response body (e.g. `{"raceLost": true}` or `{"activeCheckin": ...}`).
    #[error("Conflict ({}): {message}", code.as_str())]
    Conflict {
        code: ConflictCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn precondition(code: PreconditionCode, message: impl Into<String>) -> Self {
        Self::Precondition {
            code,
            message: message.into(),
        }
    }

    pub fn conflict(code: ConflictCode, message: impl Into<String>) -> Self {
        Self::Conflict {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn conflict_with(
        code: ConflictCode,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self::Conflict {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    /// The conflict code, if this is a conflict.
    pub fn conflict_code(&self) -> Option<ConflictCode> {
        match self {
            Self::Conflict { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// The precondition code, if this is a precondition failure.
    pub fn precondition_code(&self) -> Option<PreconditionCode> {
        match self {
            Self::Precondition { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
