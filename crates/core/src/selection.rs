//! The employee/customer selection handshake.
//!
//! Either party may propose a tier. A proposal binds when the other party
//! (or the proposer) confirms it, or when the same party proposes the same
//! tier twice in a row. Once bound, the tier cannot change until the lane
//! is cleared.

use serde::Serialize;

use crate::error::{ConflictCode, CoreError, CoreResult, PreconditionCode};
use crate::lane::LaneSession;
use crate::rental::{Actor, RentalTier};

/// What a handshake step did, which decides the event that announces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelectionOutcome {
    Proposed,
    /// Bound by the customer, or by a party other than the proposer.
    Locked,
    /// The employee bound their own proposal.
    Forced,
    Acknowledged,
    /// Nothing changed (repeat confirm or acknowledge).
    Unchanged,
}

fn lock_outcome(proposed_by: Option<Actor>, confirmed_by: Actor) -> SelectionOutcome {
    match (proposed_by, confirmed_by) {
        (Some(Actor::Employee), Actor::Employee) => SelectionOutcome::Forced,
        _ => SelectionOutcome::Locked,
    }
}

fn bind(session: &mut LaneSession, tier: RentalTier, by: Actor) -> SelectionOutcome {
    session.customer_selected_type = Some(tier);
    session.selection_confirmed = true;
    session.confirmed_by = Some(by);
    session.selection_acknowledged = false;
    lock_outcome(session.proposed_by, by)
}

pub fn propose(
    session: &mut LaneSession,
    tier: RentalTier,
    by: Actor,
) -> CoreResult<SelectionOutcome> {
    if session.selection_confirmed {
        return Err(CoreError::conflict(
            ConflictCode::SelectionLocked,
            "Selection is already locked for this session",
        ));
    }

    if session.proposed_rental_type == Some(tier) && session.proposed_by == Some(by) {
        return Ok(bind(session, tier, by));
    }

    session.proposed_rental_type = Some(tier);
    session.proposed_by = Some(by);
    Ok(SelectionOutcome::Proposed)
}

pub fn confirm(session: &mut LaneSession, by: Actor) -> CoreResult<SelectionOutcome> {
    if session.selection_confirmed {
        return Ok(SelectionOutcome::Unchanged);
    }
    let Some(tier) = session.proposed_rental_type else {
        return Err(CoreError::precondition(
            PreconditionCode::NoProposal,
            "Nothing has been proposed yet",
        ));
    };
    Ok(bind(session, tier, by))
}

/// The other party acknowledges a locked selection.
pub fn acknowledge(session: &mut LaneSession, _by: Actor) -> CoreResult<SelectionOutcome> {
    if !session.selection_confirmed {
        return Err(CoreError::precondition(
            PreconditionCode::SelectionRequired,
            "Selection has not been locked",
        ));
    }
    if session.selection_acknowledged {
        return Ok(SelectionOutcome::Unchanged);
    }
    session.selection_acknowledged = true;
    Ok(SelectionOutcome::Acknowledged)
}
