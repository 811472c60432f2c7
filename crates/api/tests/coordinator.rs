//! Coordinator tests run without HTTP, against the demo venue and a
//! hand-driven clock.

use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use chrono::{Duration, TimeZone, Utc};
use frontdesk_api::engine::{Coordinator, CoordinatorSettings, VenueSeed};
use frontdesk_core::customer::CustomerLookup;
use frontdesk_core::error::{ConflictCode, CoreError, PreconditionCode};
use frontdesk_core::events::ServerEvent;
use frontdesk_core::inventory::Resource;
use frontdesk_core::lane::Mode;
use frontdesk_core::rental::{Actor, RentalTier, ResourceRef, ResourceStatus};
use frontdesk_core::types::{Cents, Timestamp};
use frontdesk_events::{EventBus, VenueEvent};
use tokio::sync::broadcast;

const EMP: &str = "emp-1";

struct Harness {
    coordinator: Coordinator,
    bus: Arc<EventBus>,
    now: Arc<Mutex<Timestamp>>,
}

impl Harness {
    fn new() -> Self {
        let bus = Arc::new(EventBus::default());
        let now = Arc::new(Mutex::new(Utc.with_ymd_and_hms(2026, 3, 6, 18, 0, 0).unwrap()));
        let clock = Arc::clone(&now);
        let coordinator = Coordinator::new(
            VenueSeed::demo(),
            CoordinatorSettings::default(),
            Arc::clone(&bus),
        )
        .with_clock(Arc::new(move || *clock.lock().unwrap()));
        Self {
            coordinator,
            bus,
            now,
        }
    }

    fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }

    fn events(&self) -> broadcast::Receiver<VenueEvent> {
        self.bus.subscribe()
    }

    /// Start `customer` on `lane` and take the session through selection,
    /// payment and agreement.
    async fn ready(&self, lane: &str, customer: i64, tier: RentalTier, mode: Mode) {
        let c = &self.coordinator;
        c.start_session(lane, &CustomerLookup::Id(customer), mode, EMP)
            .await
            .unwrap();
        c.propose_selection(lane, tier, Actor::Employee, EMP).await.unwrap();
        c.confirm_selection(lane, Actor::Customer, "kiosk").await.unwrap();
        let session = c.create_payment_intent(lane, EMP).await.unwrap();
        let intent = session.payment_intent_id.unwrap();
        c.mark_paid(lane, &intent, EMP).await.unwrap();
        c.sign_agreement(lane, "kiosk").await.unwrap();
    }

    async fn check_in(&self, lane: &str, customer: i64, room_id: i64) {
        self.ready(lane, customer, RentalTier::Standard, Mode::Initial).await;
        self.coordinator
            .assign(lane, ResourceRef::room(room_id), EMP)
            .await
            .unwrap();
        self.coordinator.complete_checkin(lane, EMP).await.unwrap();
    }
}

fn drain(rx: &mut broadcast::Receiver<VenueEvent>) -> Vec<ServerEvent> {
    let mut out = Vec::new();
    while let Ok(e) = rx.try_recv() {
        out.push(e.event);
    }
    out
}

#[tokio::test]
async fn concurrent_assign_has_exactly_one_winner() {
    let h = Harness::new();
    h.ready("lane-1", 1, RentalTier::Standard, Mode::Initial).await;
    h.ready("lane-2", 2, RentalTier::Standard, Mode::Initial).await;
    let mut rx = h.events();

    let (a, b) = tokio::join!(
        h.coordinator.assign("lane-1", ResourceRef::room(1), EMP),
        h.coordinator.assign("lane-2", ResourceRef::room(1), EMP),
    );

    let (winner, loser) = match (a, b) {
        (Ok(w), Err(l)) | (Err(l), Ok(w)) => (w, l),
        other => panic!("expected exactly one winner, got {other:?}"),
    };
    assert_eq!(winner.resource.number, "101");
    assert_eq!(loser.conflict_code(), Some(ConflictCode::RaceLost));
    assert_matches!(&loser, CoreError::Conflict { details: Some(d), .. } => {
        assert_eq!(d["raceLost"], true);
        assert_eq!(d["suggestedResource"]["number"], "102");
    });

    let events = drain(&mut rx);
    let failed = events
        .iter()
        .find_map(|e| match e {
            ServerEvent::AssignmentFailed(p) => Some(p),
            _ => None,
        })
        .expect("loser's lane is told about the failure");
    assert!(failed.race_lost);
    assert!(failed.lane.session.is_empty());
    assert!(events
        .iter()
        .any(|e| matches!(e, ServerEvent::AssignmentCreated(_))));

    let inventory = h.coordinator.inventory().await;
    let held: Vec<_> = inventory
        .rooms
        .iter()
        .filter(|r| r.status == ResourceStatus::Occupied)
        .collect();
    assert_eq!(held.len(), 1);
}

#[tokio::test]
async fn lane_events_carry_increasing_revisions() {
    let h = Harness::new();
    let mut rx = h.events();
    h.ready("lane-1", 1, RentalTier::Standard, Mode::Initial).await;

    let revisions: Vec<u64> = drain(&mut rx)
        .iter()
        .filter_map(|e| e.lane().map(|p| p.revision))
        .collect();
    assert!(!revisions.is_empty());
    assert!(revisions.windows(2).all(|w| w[1] == w[0] + 1));
    assert_eq!(
        h.coordinator.snapshot("lane-1").await.revision,
        *revisions.last().unwrap()
    );
}

#[tokio::test]
async fn repeated_commands_emit_nothing() {
    let h = Harness::new();
    h.ready("lane-1", 1, RentalTier::Standard, Mode::Initial).await;
    let mut rx = h.events();

    h.coordinator
        .confirm_selection("lane-1", Actor::Customer, "kiosk")
        .await
        .unwrap();
    h.coordinator.sign_agreement("lane-1", "kiosk").await.unwrap();
    h.coordinator
        .start_session("lane-1", &CustomerLookup::Id(1), Mode::Initial, EMP)
        .await
        .unwrap();

    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn selection_cannot_change_once_locked() {
    let h = Harness::new();
    h.ready("lane-1", 1, RentalTier::Standard, Mode::Initial).await;

    let err = h
        .coordinator
        .propose_selection("lane-1", RentalTier::Double, Actor::Customer, "kiosk")
        .await
        .unwrap_err();
    assert_eq!(err.conflict_code(), Some(ConflictCode::SelectionLocked));
}

#[tokio::test]
async fn clear_is_idempotent_and_frees_the_resource() {
    let h = Harness::new();
    h.ready("lane-1", 1, RentalTier::Standard, Mode::Initial).await;
    h.coordinator
        .assign("lane-1", ResourceRef::room(1), EMP)
        .await
        .unwrap();
    let mut rx = h.events();

    assert!(h.coordinator.clear("lane-1", EMP).await.unwrap());
    assert!(!h.coordinator.clear("lane-1", EMP).await.unwrap());

    let events = drain(&mut rx);
    let resets = events
        .iter()
        .filter(|e| e.lane().is_some_and(|p| p.session.is_completion_reset()))
        .count();
    assert_eq!(resets, 1);

    let inventory = h.coordinator.inventory().await;
    assert!(inventory.rooms[0].is_available());
    assert!(h.coordinator.snapshot("lane-1").await.session.is_none());
}

#[tokio::test]
async fn declined_cross_tier_room_returns_to_the_pool() {
    let h = Harness::new();
    h.ready("lane-1", 1, RentalTier::Standard, Mode::Initial).await;

    let assignment = h
        .coordinator
        .assign("lane-1", ResourceRef::room(7), EMP)
        .await
        .unwrap();
    assert!(assignment.needs_confirmation);
    let mut rx = h.events();

    let session = h
        .coordinator
        .decline_assignment("lane-1", "kiosk")
        .await
        .unwrap();
    assert!(session.assigned_resource_id.is_none());
    assert!(!session.needs_confirmation);

    let declined = drain(&mut rx)
        .into_iter()
        .find_map(|e| match e {
            ServerEvent::CustomerDeclined(p) => Some(p),
            _ => None,
        })
        .unwrap();
    assert_eq!(declined.released, ResourceRef::room(7));
    assert_eq!(declined.suggested_resource.unwrap().tier, RentalTier::Standard);

    let err = h
        .coordinator
        .confirm_assignment("lane-1", "kiosk")
        .await
        .unwrap_err();
    assert_eq!(err.precondition_code(), Some(PreconditionCode::NoPendingConfirmation));
}

#[tokio::test]
async fn open_visit_blocks_a_second_initial_check_in() {
    let h = Harness::new();
    h.check_in("lane-1", 1, 1).await;

    let err = h
        .coordinator
        .start_session("lane-2", &CustomerLookup::Id(1), Mode::Initial, EMP)
        .await
        .unwrap_err();
    assert_eq!(err.conflict_code(), Some(ConflictCode::AlreadyCheckedIn));
    assert_matches!(&err, CoreError::Conflict { details: Some(d), .. } => {
        assert_eq!(d["activeCheckin"]["assignedResourceNumber"], "101");
        assert_eq!(d["activeCheckin"]["overdue"], false);
    });
}

#[tokio::test]
async fn customer_cannot_check_in_on_two_lanes_at_once() {
    let h = Harness::new();
    h.ready("lane-1", 1, RentalTier::Standard, Mode::Initial).await;

    let err = h
        .coordinator
        .start_session("lane-2", &CustomerLookup::Id(1), Mode::Initial, EMP)
        .await
        .unwrap_err();
    assert_eq!(err.conflict_code(), Some(ConflictCode::CustomerOnOtherLane));
    assert_matches!(&err, CoreError::Conflict { details: Some(d), .. } => {
        assert_eq!(d["laneId"], "lane-1");
    });
    assert!(h.coordinator.snapshot("lane-2").await.session.is_none());

    h.coordinator
        .assign("lane-1", ResourceRef::room(1), EMP)
        .await
        .unwrap();
    h.coordinator.complete_checkin("lane-1", EMP).await.unwrap();

    let held: Vec<_> = h
        .coordinator
        .inventory()
        .await
        .rooms
        .into_iter()
        .filter(|r| r.status == ResourceStatus::Occupied)
        .map(|r| r.number)
        .collect();
    assert_eq!(held, vec!["101".to_string()]);

    // Completion releases the lane, so a renewal elsewhere is allowed.
    h.coordinator
        .start_session("lane-2", &CustomerLookup::Id(1), Mode::Renewal, EMP)
        .await
        .unwrap();
}

#[tokio::test]
async fn clearing_a_lane_frees_the_customer_for_another_lane() {
    let h = Harness::new();
    h.coordinator
        .start_session("lane-1", &CustomerLookup::Id(2), Mode::Initial, EMP)
        .await
        .unwrap();
    h.coordinator.clear("lane-1", EMP).await.unwrap();

    let session = h
        .coordinator
        .start_session("lane-2", &CustomerLookup::Id(2), Mode::Initial, EMP)
        .await
        .unwrap();
    assert_eq!(session.customer_id, 2);
}

#[tokio::test]
async fn renewal_extends_the_same_room() {
    let h = Harness::new();
    h.check_in("lane-1", 1, 1).await;
    let first_checkout = h.coordinator.inventory().await.rooms[0].checkout_at.unwrap();

    h.ready("lane-1", 1, RentalTier::Standard, Mode::Renewal).await;
    let err = h
        .coordinator
        .assign("lane-1", ResourceRef::room(2), EMP)
        .await
        .unwrap_err();
    assert_eq!(err.precondition_code(), Some(PreconditionCode::RenewalHasResource));

    let done = h.coordinator.complete_checkin("lane-1", EMP).await.unwrap();
    assert_eq!(done.mode, Mode::Renewal);
    assert_eq!(done.assigned_resource_number, "101");
    assert_eq!(done.checkout_at, first_checkout + Duration::hours(6));
}

#[tokio::test]
async fn renewal_without_a_visit_is_rejected() {
    let h = Harness::new();
    let err = h
        .coordinator
        .start_session("lane-1", &CustomerLookup::Id(3), Mode::Renewal, EMP)
        .await
        .unwrap_err();
    assert_eq!(err.precondition_code(), Some(PreconditionCode::NoActiveVisit));
}

#[tokio::test]
async fn very_late_checkout_bans_the_customer() {
    let h = Harness::new();
    h.check_in("lane-1", 1, 1).await;
    h.advance(Duration::hours(6) + Duration::minutes(95));

    let view = h
        .coordinator
        .request_checkout(frontdesk_core::rental::ResourceType::Room, "101", "kiosk")
        .await
        .unwrap();
    assert!(view.ban_applied);
    assert!(!view.fee_paid);
    let id = view.request.request_id.clone();

    h.coordinator.claim_checkout(&id, EMP).await.unwrap();
    h.coordinator.confirm_checkout_items(&id, EMP).await.unwrap();
    let err = h.coordinator.complete_checkout(&id, EMP).await.unwrap_err();
    assert_eq!(err.precondition_code(), Some(PreconditionCode::FeeUnpaid));

    let paid = h.coordinator.mark_checkout_fee_paid(&id, EMP).await.unwrap();
    assert!(paid.fee_paid);
    assert_eq!(paid.late_fee_amount, Cents::dollars(35));

    let done = h.coordinator.complete_checkout(&id, EMP).await.unwrap();
    assert!(done.ban_applied);
    assert!(done.banned_until.is_some());

    let err = h
        .coordinator
        .start_session("lane-1", &CustomerLookup::Id(1), Mode::Initial, EMP)
        .await
        .unwrap_err();
    assert_eq!(err.conflict_code(), Some(ConflictCode::CustomerBanned));
}

#[tokio::test]
async fn cancel_by_another_employee_is_refused() {
    let h = Harness::new();
    h.check_in("lane-1", 1, 1).await;
    let view = h
        .coordinator
        .request_checkout(frontdesk_core::rental::ResourceType::Room, "101", "kiosk")
        .await
        .unwrap();
    let id = view.request.request_id;
    h.coordinator.claim_checkout(&id, EMP).await.unwrap();

    let err = h.coordinator.cancel_checkout(&id, "emp-2").await.unwrap_err();
    assert_eq!(err.precondition_code(), Some(PreconditionCode::NotClaimHolder));

    let cancelled = h.coordinator.cancel_checkout(&id, EMP).await.unwrap();
    assert_eq!(
        cancelled.status,
        frontdesk_core::checkout::CheckoutStatus::Cancelled
    );
    assert!(h.coordinator.list_checkouts().await.is_empty());
}

#[tokio::test]
async fn housekeeping_cannot_touch_an_occupied_room() {
    let h = Harness::new();
    h.check_in("lane-1", 1, 1).await;

    let err = h
        .coordinator
        .set_resource_status(ResourceRef::room(1), ResourceStatus::Dirty, EMP)
        .await
        .unwrap_err();
    assert_eq!(err.conflict_code(), Some(ConflictCode::ResourceOccupied));
}

#[tokio::test]
async fn holds_released_on_load_are_announced_once() {
    let mut dirty = Resource::new_room(1, "101", RentalTier::Standard);
    dirty.status = ResourceStatus::Dirty;
    dirty.version = 4;
    let seed = VenueSeed {
        resources: vec![dirty, Resource::new_room(2, "102", RentalTier::Standard)],
        released: vec![ResourceRef::room(1)],
        ..VenueSeed::default()
    };
    let bus = Arc::new(EventBus::default());
    let coordinator = Coordinator::new(seed, CoordinatorSettings::default(), Arc::clone(&bus));
    let mut rx = bus.subscribe();

    assert_eq!(coordinator.announce_released_holds("system").await, 1);
    assert_eq!(coordinator.announce_released_holds("system").await, 0);

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert_matches!(&events[0], ServerEvent::InventoryUpdated(p) => {
        assert_eq!(p.resources.len(), 1);
        assert_eq!(p.resources[0].number, "101");
        assert_eq!(p.resources[0].status, ResourceStatus::Dirty);
        assert_eq!(p.resources[0].version, 4);
    });
}
