//! Terminal view model.
//!
//! [`reduce`] folds server events into a [`TerminalState`]. It is pure and
//! idempotent: lane events at or below the last seen revision and inventory
//! rows at or below the held version are dropped, so redelivered or stale
//! frames change nothing. Lane revisions step by one, so a jump means frames
//! were lost and [`TerminalState::needs_resync`] is raised until the next
//! snapshot. Purely local UI state lives in [`LocalUi`] and is torn down by
//! watching [`TerminalState::clear_epoch`].

use std::collections::{BTreeMap, BTreeSet};

use crate::checkout::{CheckoutStatus, CheckoutView};
use crate::events::{
    AssignmentFailedPayload, CheckoutPayload, CustomerDeclinedPayload, LanePayload, ServerEvent,
    SuggestedResource,
};
use crate::inventory::{InventorySnapshot, Resource};
use crate::lane::{LaneSnapshot, SessionPatch};
use crate::rental::{RentalTier, ResourceRef};
use crate::waitlist::WaitlistEntry;

/// The resource the employee has picked for assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceSelector {
    pub selected: Option<ResourceRef>,
    /// Resources known to be lost to another lane since the last refetch.
    pub excluded: BTreeSet<ResourceRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerminalState {
    pub lane_id: String,
    /// Employee id of this terminal, used to recognise its own claims.
    pub me: Option<String>,
    pub last_revision: u64,
    pub clear_epoch: u64,
    /// Accumulated session fields; `None` when the lane is empty.
    pub session: Option<SessionPatch>,
    pub selector: ResourceSelector,
    pub inventory: BTreeMap<ResourceRef, Resource>,
    pub needs_refetch: bool,
    /// A lane revision was skipped; the session may be missing fields.
    pub needs_resync: bool,
    /// The feed is restricted to some event types, so revision jumps are
    /// expected and not treated as loss.
    pub filtered_feed: bool,
    pub pending_checkouts: BTreeMap<String, CheckoutView>,
    pub active_verification: Option<CheckoutView>,
    pub waitlist: BTreeMap<String, WaitlistEntry>,
    pub last_failure: Option<AssignmentFailedPayload>,
}

impl TerminalState {
    pub fn new(lane_id: impl Into<String>, me: Option<String>) -> Self {
        Self {
            lane_id: lane_id.into(),
            me,
            ..Self::default()
        }
    }

    pub fn with_filtered_feed(mut self, filtered: bool) -> Self {
        self.filtered_feed = filtered;
        self
    }

    fn reset_session(&mut self) {
        self.session = None;
        self.selector = ResourceSelector::default();
        self.last_failure = None;
        self.clear_epoch += 1;
    }

    /// First free resource of `tier` by ascending number that is not
    /// excluded.
    pub fn first_candidate(&self, tier: RentalTier) -> Option<ResourceRef> {
        let mut candidates: Vec<&Resource> = self
            .inventory
            .values()
            .filter(|r| r.tier == tier && r.is_available())
            .filter(|r| !self.selector.excluded.contains(&r.resource_ref()))
            .collect();
        candidates.sort_by_key(|r| (r.number.parse::<i64>().unwrap_or(i64::MAX), r.number.clone()));
        candidates.first().map(|r| r.resource_ref())
    }

    fn contested_tier(&self, contested: ResourceRef, hint: Option<&SuggestedResource>) -> Option<RentalTier> {
        self.inventory
            .get(&contested)
            .map(|r| r.tier)
            .or_else(|| hint.map(|s| s.tier))
    }

    fn reselect(&mut self, contested: ResourceRef, hint: Option<&SuggestedResource>) {
        self.selector.selected = None;
        self.selector.excluded.insert(contested);
        self.needs_refetch = true;

        let Some(tier) = self.contested_tier(contested, hint) else {
            return;
        };
        self.selector.selected = self.first_candidate(tier).or_else(|| {
            hint.map(|s| s.resource)
                .filter(|r| !self.selector.excluded.contains(r))
        });
    }

    /// Apply a 409 from this terminal's own `assign` call. The response can
    /// arrive before (or instead of) the matching `ASSIGNMENT_FAILED` event.
    pub fn apply_assign_rejection(
        mut self,
        contested: ResourceRef,
        suggested: Option<&SuggestedResource>,
    ) -> Self {
        self.reselect(contested, suggested);
        self
    }

    pub fn select(&mut self, resource: ResourceRef) {
        self.selector.selected = Some(resource);
    }

    /// Replace the lane projection with the server's current view.
    pub fn resync_lane(mut self, snapshot: &LaneSnapshot) -> Self {
        if snapshot.lane_id != self.lane_id {
            return self;
        }
        self.last_revision = snapshot.revision;
        self.needs_resync = false;
        match &snapshot.session {
            Some(session) => self.session = Some(SessionPatch::full(session)),
            None if self.session.is_some() => self.reset_session(),
            None => {}
        }
        self
    }

    pub fn resync_inventory(mut self, snapshot: &InventorySnapshot) -> Self {
        self.inventory = snapshot
            .rooms
            .iter()
            .chain(snapshot.lockers.iter())
            .map(|r| (r.resource_ref(), r.clone()))
            .collect();
        self.selector.excluded.clear();
        self.needs_refetch = false;
        self
    }

    pub fn resync_checkouts(mut self, requests: &[CheckoutView]) -> Self {
        self.pending_checkouts.clear();
        self.active_verification = None;
        for view in requests {
            self.place_checkout(view.clone());
        }
        self
    }

    fn is_mine(&self, view: &CheckoutView) -> bool {
        self.me.is_some() && view.request.claimed_by == self.me
    }

    fn place_checkout(&mut self, view: CheckoutView) {
        let id = view.request.request_id.clone();
        match view.status {
            CheckoutStatus::Unclaimed => {
                self.pending_checkouts.insert(id, view);
            }
            CheckoutStatus::Claimed => {
                self.pending_checkouts.remove(&id);
                if self.is_mine(&view) {
                    self.active_verification = Some(view);
                }
            }
            CheckoutStatus::Completed | CheckoutStatus::Cancelled => self.drop_checkout(&id),
        }
    }

    fn drop_checkout(&mut self, request_id: &str) {
        self.pending_checkouts.remove(request_id);
        if self
            .active_verification
            .as_ref()
            .is_some_and(|v| v.request.request_id == request_id)
        {
            self.active_verification = None;
        }
    }

    fn upsert_resource(&mut self, resource: &Resource) {
        let key = resource.resource_ref();
        let newer = self
            .inventory
            .get(&key)
            .is_none_or(|held| resource.version > held.version);
        if newer {
            self.inventory.insert(key, resource.clone());
        }
    }

    fn apply_lane(&mut self, lane: &LanePayload) -> bool {
        if lane.lane_id != self.lane_id || lane.revision <= self.last_revision {
            return false;
        }
        if lane.revision > self.last_revision + 1 && !self.filtered_feed {
            self.needs_resync = true;
        }
        self.last_revision = lane.revision;

        if lane.session.is_completion_reset() {
            self.reset_session();
        } else if !lane.session.is_empty() {
            self.session
                .get_or_insert_with(SessionPatch::default)
                .merge(&lane.session);
        }
        true
    }

    fn apply_checkout(&mut self, payload: &CheckoutPayload) {
        self.place_checkout(payload.request.clone());
    }
}

/// Fold one server event into the terminal state.
pub fn reduce(mut state: TerminalState, event: &ServerEvent) -> TerminalState {
    match event {
        ServerEvent::SessionUpdated(p)
        | ServerEvent::SelectionProposed(p)
        | ServerEvent::SelectionLocked(p)
        | ServerEvent::SelectionForced(p)
        | ServerEvent::SelectionAcknowledged(p)
        | ServerEvent::CustomerConfirmed(p) => {
            state.apply_lane(p);
        }
        ServerEvent::AssignmentCreated(p) => {
            if state.apply_lane(p) {
                state.last_failure = None;
            }
        }
        ServerEvent::AssignmentFailed(p) => {
            if state.apply_lane(&p.lane) {
                state.reselect(p.contested, p.suggested_resource.as_ref());
                state.last_failure = Some(p.clone());
            }
        }
        ServerEvent::CustomerDeclined(CustomerDeclinedPayload {
            lane,
            suggested_resource,
            ..
        }) => {
            if state.apply_lane(lane) {
                state.selector.selected = suggested_resource.as_ref().map(|s| s.resource);
            }
        }
        ServerEvent::CheckoutRequested(p)
        | ServerEvent::CheckoutClaimed(p)
        | ServerEvent::CheckoutUpdated(p) => state.apply_checkout(p),
        ServerEvent::CheckoutCompleted(p) => state.drop_checkout(&p.request_id),
        ServerEvent::InventoryUpdated(p) => {
            for r in &p.resources {
                state.upsert_resource(r);
            }
        }
        ServerEvent::RoomStatusChanged(p) => state.upsert_resource(&p.resource),
        ServerEvent::WaitlistUpdated(p) => {
            for id in &p.removed {
                state.waitlist.remove(id);
            }
            for entry in &p.entries {
                state.waitlist.insert(entry.id.clone(), entry.clone());
            }
        }
    }
    state
}

// ---------------------------------------------------------------------------
// Local UI
// ---------------------------------------------------------------------------

/// Terminal-only UI state that never comes from the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalUi {
    epoch: u64,
    pub open_modals: BTreeSet<String>,
    pub pending_prompt: Option<String>,
}

impl LocalUi {
    pub fn open(&mut self, modal: impl Into<String>) {
        self.open_modals.insert(modal.into());
    }

    pub fn prompt(&mut self, prompt: impl Into<String>) {
        self.pending_prompt = Some(prompt.into());
    }

    /// Tear everything down if the lane has been cleared since the last
    /// sync. Returns whether anything was reset.
    pub fn sync(&mut self, clear_epoch: u64) -> bool {
        if clear_epoch <= self.epoch {
            return false;
        }
        self.epoch = clear_epoch;
        self.open_modals.clear();
        self.pending_prompt = None;
        true
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::checkout::CheckoutRequest;
    use crate::error::ConflictCode;
    use crate::events::InventoryPayload;
    use crate::lane::SessionStatus;
    use crate::rental::ResourceStatus;
    use crate::types::Cents;

    fn lane(revision: u64, session: SessionPatch) -> LanePayload {
        LanePayload {
            lane_id: "lane-1".into(),
            revision,
            session,
        }
    }

    fn named(name: &str) -> SessionPatch {
        SessionPatch {
            customer_name: Some(name.into()),
            status: Some(SessionStatus::Active),
            ..SessionPatch::default()
        }
    }

    fn room(id: i64, number: &str, tier: RentalTier, version: u64) -> Resource {
        let mut r = Resource::new_room(id, number, tier);
        r.version = version;
        r
    }

    fn state_with_rooms() -> TerminalState {
        let mut s = TerminalState::new("lane-1", Some("emp-a".into()));
        for r in [
            room(1, "101", RentalTier::Standard, 1),
            room(2, "102", RentalTier::Standard, 1),
            room(3, "103", RentalTier::Standard, 1),
            room(9, "201", RentalTier::Double, 1),
        ] {
            s.inventory.insert(r.resource_ref(), r);
        }
        s
    }

    fn checkout(id: &str, claimed_by: Option<&str>) -> CheckoutView {
        let now = Utc::now();
        CheckoutView {
            request: CheckoutRequest {
                request_id: id.into(),
                resource: ResourceRef::room(1),
                resource_number: "101".into(),
                customer_id: 1,
                customer_name: "Pat".into(),
                visit_id: "v1".into(),
                scheduled_checkout_at: now,
                items_confirmed: false,
                fee_paid_amount: Cents::ZERO,
                claimed_by: claimed_by.map(String::from),
                claimed_at: None,
                created_at: now,
            },
            status: if claimed_by.is_some() {
                CheckoutStatus::Claimed
            } else {
                CheckoutStatus::Unclaimed
            },
            late_minutes: 0,
            late_fee_amount: Cents::ZERO,
            ban_applied: false,
            fee_paid: true,
        }
    }

    // ---------------------------------------------------------------------
    // Revisions
    // ---------------------------------------------------------------------

    #[test]
    fn redelivered_event_is_a_no_op() {
        let event = ServerEvent::SessionUpdated(lane(1, named("Alex")));
        let once = reduce(TerminalState::new("lane-1", None), &event);
        let twice = reduce(once.clone(), &event);
        assert_eq!(once, twice);
    }

    #[test]
    fn stale_revision_is_ignored() {
        let s = reduce(
            TerminalState::new("lane-1", None),
            &ServerEvent::SessionUpdated(lane(5, named("Current"))),
        );
        let s = reduce(s, &ServerEvent::SessionUpdated(lane(4, named("Stale"))));

        assert_eq!(s.last_revision, 5);
        assert_eq!(
            s.session.unwrap().customer_name.as_deref(),
            Some("Current")
        );
    }

    #[test]
    fn skipped_revision_raises_resync() {
        let s = reduce(
            TerminalState::new("lane-1", None),
            &ServerEvent::SessionUpdated(lane(1, named("Alex"))),
        );
        assert!(!s.needs_resync);

        let mut name_only = named("Alex");
        name_only.status = None;
        let s = reduce(s, &ServerEvent::SessionUpdated(lane(3, name_only)));
        assert!(s.needs_resync);
        assert_eq!(s.last_revision, 3);

        let snapshot = LaneSnapshot {
            lane_id: "lane-1".into(),
            revision: 3,
            session: None,
        };
        let s = s.resync_lane(&snapshot);
        assert!(!s.needs_resync);
    }

    #[test]
    fn filtered_feed_tolerates_revision_jumps() {
        let s = TerminalState::new("lane-1", None).with_filtered_feed(true);
        let s = reduce(s, &ServerEvent::SessionUpdated(lane(1, named("Alex"))));
        let s = reduce(s, &ServerEvent::SessionUpdated(lane(4, named("Alex"))));
        assert!(!s.needs_resync);
        assert_eq!(s.last_revision, 4);
    }

    #[test]
    fn other_lane_events_are_ignored() {
        let mut p = lane(1, named("Elsewhere"));
        p.lane_id = "lane-2".into();
        let s = reduce(TerminalState::new("lane-1", None), &ServerEvent::SessionUpdated(p));
        assert!(s.session.is_none());
        assert_eq!(s.last_revision, 0);
    }

    // ---------------------------------------------------------------------
    // Patches and resets
    // ---------------------------------------------------------------------

    #[test]
    fn partial_patch_leaves_other_fields() {
        let s = reduce(
            TerminalState::new("lane-1", None),
            &ServerEvent::SessionUpdated(lane(1, named("Alex"))),
        );
        let s = reduce(
            s,
            &ServerEvent::SelectionProposed(lane(
                2,
                SessionPatch {
                    proposed_rental_type: Some(Some(RentalTier::Double)),
                    ..SessionPatch::default()
                },
            )),
        );
        let s = reduce(
            s,
            &ServerEvent::SessionUpdated(lane(
                3,
                SessionPatch {
                    proposed_rental_type: Some(None),
                    ..SessionPatch::default()
                },
            )),
        );

        let session = s.session.unwrap();
        assert_eq!(session.customer_name.as_deref(), Some("Alex"));
        assert_eq!(session.proposed_rental_type, Some(None));
    }

    #[test]
    fn completion_resets_and_bumps_epoch() {
        let mut s = state_with_rooms();
        s = reduce(s, &ServerEvent::SessionUpdated(lane(1, named("Alex"))));
        s.select(ResourceRef::room(1));

        let s = reduce(s, &ServerEvent::SessionUpdated(lane(2, SessionPatch::completion())));

        assert!(s.session.is_none());
        assert_eq!(s.selector, ResourceSelector::default());
        assert_eq!(s.clear_epoch, 1);
        assert_eq!(s.last_revision, 2);
    }

    #[test]
    fn local_ui_tears_down_on_epoch_advance() {
        let mut ui = LocalUi::default();
        ui.open("agreement");
        ui.prompt("Confirm DOUBLE?");

        assert!(!ui.sync(0));
        assert!(ui.sync(1));
        assert!(ui.open_modals.is_empty());
        assert!(ui.pending_prompt.is_none());
        assert!(!ui.sync(1));
    }

    // ---------------------------------------------------------------------
    // Race recovery
    // ---------------------------------------------------------------------

    #[test]
    fn race_loss_excludes_and_reselects_same_tier() {
        let mut s = state_with_rooms();
        s.select(ResourceRef::room(1));

        let s = reduce(
            s,
            &ServerEvent::AssignmentFailed(AssignmentFailedPayload {
                lane: lane(1, SessionPatch::default()),
                contested: ResourceRef::room(1),
                code: ConflictCode::RaceLost,
                race_lost: true,
                suggested_resource: None,
            }),
        );

        assert!(s.needs_refetch);
        assert!(s.selector.excluded.contains(&ResourceRef::room(1)));
        assert_eq!(s.selector.selected, Some(ResourceRef::room(2)));
    }

    #[test]
    fn http_rejection_never_reselects_excluded() {
        let s = state_with_rooms()
            .apply_assign_rejection(ResourceRef::room(1), None)
            .apply_assign_rejection(ResourceRef::room(2), None);

        assert_eq!(s.selector.selected, Some(ResourceRef::room(3)));

        let s = s.apply_assign_rejection(ResourceRef::room(3), None);
        assert_eq!(s.selector.selected, None);
    }

    #[test]
    fn refetch_clears_exclusions() {
        let s = state_with_rooms().apply_assign_rejection(ResourceRef::room(1), None);
        let snapshot = InventorySnapshot {
            rooms: s.inventory.values().cloned().collect(),
            lockers: vec![],
        };
        let s = s.resync_inventory(&snapshot);
        assert!(!s.needs_refetch);
        assert!(s.selector.excluded.is_empty());
    }

    // ---------------------------------------------------------------------
    // Venue events
    // ---------------------------------------------------------------------

    #[test]
    fn older_inventory_version_is_ignored() {
        let s = state_with_rooms();
        let mut newer = room(1, "101", RentalTier::Standard, 3);
        newer.status = ResourceStatus::Dirty;
        let s = reduce(
            s,
            &ServerEvent::InventoryUpdated(InventoryPayload {
                resources: vec![newer],
            }),
        );
        let s = reduce(
            s,
            &ServerEvent::InventoryUpdated(InventoryPayload {
                resources: vec![room(1, "101", RentalTier::Standard, 2)],
            }),
        );
        assert_eq!(
            s.inventory[&ResourceRef::room(1)].status,
            ResourceStatus::Dirty
        );
    }

    #[test]
    fn claim_moves_request_out_of_pending() {
        let s = TerminalState::new("lane-1", Some("emp-a".into()));
        let s = reduce(
            s,
            &ServerEvent::CheckoutRequested(CheckoutPayload {
                request: checkout("r1", None),
            }),
        );
        assert!(s.pending_checkouts.contains_key("r1"));

        let mine = reduce(
            s.clone(),
            &ServerEvent::CheckoutClaimed(CheckoutPayload {
                request: checkout("r1", Some("emp-a")),
            }),
        );
        assert!(mine.pending_checkouts.is_empty());
        assert_eq!(
            mine.active_verification.as_ref().map(|v| v.request.request_id.as_str()),
            Some("r1")
        );

        let theirs = reduce(
            s,
            &ServerEvent::CheckoutClaimed(CheckoutPayload {
                request: checkout("r1", Some("emp-b")),
            }),
        );
        assert!(theirs.pending_checkouts.is_empty());
        assert!(theirs.active_verification.is_none());
    }
}
