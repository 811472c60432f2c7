//! Lane serializer and assignment coordinator.
//!
//! Every lane has its own `tokio::sync::Mutex`, so commands on one lane
//! apply in arrival order while lanes proceed in parallel. Venue state has
//! one mutex per concern. Locks are always taken in the order
//! lane → checkouts → waitlist → registry → inventory.
//!
//! A command works on a clone of the session and only stores it when every
//! step has succeeded. The lane event is published while the lane lock is
//! still held, so each lane's events leave in the order they were applied.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use frontdesk_core::checkout::{self, CheckoutBoard, CheckoutContext, CheckoutStatus, CheckoutView};
use frontdesk_core::customer::{CustomerLookup, CustomerRegistry, Visit};
use frontdesk_core::error::{ConflictCode, CoreError, CoreResult, PreconditionCode};
use frontdesk_core::events::{
    AssignmentFailedPayload, CheckoutCompletedPayload, CheckoutPayload, CustomerDeclinedPayload,
    InventoryPayload, LanePayload, RoomStatusPayload, ServerEvent, SuggestedResource,
    WaitlistPayload,
};
use frontdesk_core::inventory::{Holder, InventorySnapshot, InventoryStore, Resource};
use frontdesk_core::lane::{block_end, ActiveCheckin, LaneSession, LaneSnapshot, Mode, SessionPatch};
use frontdesk_core::late_fee::{LateFeePolicy, BAN_DURATION_DAYS};
use frontdesk_core::rental::{
    Actor, RentalTier, ResourceRef, ResourceStatus, ResourceType, DEFAULT_RENTAL_BLOCK_HOURS,
};
use frontdesk_core::selection::{self, SelectionOutcome};
use frontdesk_core::types::Timestamp;
use frontdesk_core::waitlist::{Waitlist, WaitlistEntry};
use frontdesk_events::{EventBus, VenueEvent};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::{Mutex, RwLock};

use crate::config::ServerConfig;
use crate::engine::seed::VenueSeed;

/// Source of the current time. Tests inject a controllable clock.
pub type Clock = Arc<dyn Fn() -> Timestamp + Send + Sync>;

type EventKind = fn(LanePayload) -> ServerEvent;

#[derive(Debug, Clone, Copy)]
pub struct CoordinatorSettings {
    pub policy: LateFeePolicy,
    pub rental_block_hours: i64,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            policy: LateFeePolicy::default(),
            rental_block_hours: DEFAULT_RENTAL_BLOCK_HOURS,
        }
    }
}

impl CoordinatorSettings {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            policy: LateFeePolicy::new(config.demo_mode),
            rental_block_hours: config.rental_block_hours,
        }
    }
}

/// Result of a successful `assign`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub needs_confirmation: bool,
    pub resource: Resource,
}

/// Result of a completed check-in.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckinCompleted {
    pub visit_id: String,
    pub customer_id: i64,
    pub mode: Mode,
    pub rental_type: RentalTier,
    pub assigned_resource_type: ResourceType,
    pub assigned_resource_number: String,
    pub checkin_at: Timestamp,
    pub checkout_at: Timestamp,
    pub waitlist_id: Option<String>,
}

#[derive(Debug, Default)]
struct LaneSlot {
    /// Never reset, not even when the lane is cleared.
    revision: u64,
    session: Option<LaneSession>,
}

impl LaneSlot {
    fn session(&self) -> CoreResult<&LaneSession> {
        self.session.as_ref().ok_or_else(|| {
            CoreError::precondition(
                PreconditionCode::NoActiveSession,
                "No active session on this lane",
            )
        })
    }

    fn next_revision(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }
}

pub struct Coordinator {
    lanes: RwLock<HashMap<String, Arc<Mutex<LaneSlot>>>>,
    checkouts: Mutex<CheckoutBoard>,
    waitlist: Mutex<Waitlist>,
    registry: Mutex<CustomerRegistry>,
    inventory: Mutex<InventoryStore>,
    /// Holds dropped while loading the seed, announced once by
    /// [`Coordinator::announce_released_holds`].
    released_on_load: Mutex<Vec<ResourceRef>>,
    settings: CoordinatorSettings,
    bus: Arc<EventBus>,
    clock: Clock,
}

impl Coordinator {
    pub fn new(seed: VenueSeed, settings: CoordinatorSettings, bus: Arc<EventBus>) -> Self {
        let mut registry = CustomerRegistry::from_customers(seed.customers);
        for visit in seed.visits {
            let visit_id = visit.visit_id.clone();
            if let Err(e) = registry.open_visit(visit) {
                tracing::warn!(visit_id, error = %e, "Skipping duplicate open visit");
            }
        }

        Self {
            lanes: RwLock::new(HashMap::new()),
            checkouts: Mutex::new(CheckoutBoard::new()),
            waitlist: Mutex::new(Waitlist::new()),
            registry: Mutex::new(registry),
            inventory: Mutex::new(InventoryStore::from_resources(seed.resources)),
            released_on_load: Mutex::new(seed.released),
            settings,
            bus,
            clock: Arc::new(chrono::Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    fn now(&self) -> Timestamp {
        (self.clock)()
    }

    async fn lane(&self, lane_id: &str) -> Arc<Mutex<LaneSlot>> {
        if let Some(slot) = self.lanes.read().await.get(lane_id) {
            return Arc::clone(slot);
        }
        let mut lanes = self.lanes.write().await;
        Arc::clone(lanes.entry(lane_id.to_string()).or_default())
    }

    fn publish(&self, event: ServerEvent, actor: &str) {
        self.bus.publish(VenueEvent::new(event).with_actor(actor));
    }

    /// Store `next` as the lane's session and announce what changed. Emits
    /// nothing when the command changed nothing.
    fn commit(
        &self,
        lane_id: &str,
        slot: &mut LaneSlot,
        next: LaneSession,
        kind: EventKind,
        actor: &str,
    ) -> LaneSession {
        let patch = match &slot.session {
            Some(before) => SessionPatch::diff(before, &next),
            None => SessionPatch::full(&next),
        };
        if !patch.is_empty() {
            let payload = LanePayload {
                lane_id: lane_id.to_string(),
                revision: slot.next_revision(),
                session: patch,
            };
            self.publish(kind(payload), actor);
        }
        slot.session = Some(next.clone());
        next
    }

    /// Apply a single-scope session command under the lane lock.
    async fn update_session<T>(
        &self,
        lane_id: &str,
        actor: &str,
        kind: EventKind,
        apply: impl FnOnce(&mut LaneSession) -> CoreResult<T>,
    ) -> CoreResult<(T, LaneSession)> {
        let lane = self.lane(lane_id).await;
        let mut slot = lane.lock().await;
        let mut next = slot.session()?.clone();
        let out = apply(&mut next)?;
        let session = self.commit(lane_id, &mut slot, next, kind, actor);
        Ok((out, session))
    }

    /// The completion reset that ends a session on every terminal.
    fn announce_completion(&self, lane_id: &str, slot: &mut LaneSlot, actor: &str) {
        let payload = LanePayload {
            lane_id: lane_id.to_string(),
            revision: slot.next_revision(),
            session: SessionPatch::completion(),
        };
        slot.session = None;
        self.publish(ServerEvent::SessionUpdated(payload), actor);
    }

    /// Publish the resources freed while loading the seed so the write-back
    /// persists them. Call once the bus subscribers are running. Returns how
    /// many resources were announced; later calls announce nothing.
    pub async fn announce_released_holds(&self, actor: &str) -> usize {
        let released = std::mem::take(&mut *self.released_on_load.lock().await);
        if released.is_empty() {
            return 0;
        }
        let inventory = self.inventory.lock().await;
        let resources: Vec<Resource> = released
            .iter()
            .filter_map(|r| inventory.get(*r).cloned())
            .collect();
        drop(inventory);

        let count = resources.len();
        tracing::info!(count, "Announcing holds released on load");
        self.publish(ServerEvent::InventoryUpdated(InventoryPayload { resources }), actor);
        count
    }

    // -----------------------------------------------------------------------
    // Lane sessions
    // -----------------------------------------------------------------------

    pub async fn snapshot(&self, lane_id: &str) -> LaneSnapshot {
        let slot = self.lanes.read().await.get(lane_id).cloned();
        let (revision, session) = match slot {
            Some(slot) => {
                let slot = slot.lock().await;
                (slot.revision, slot.session.clone())
            }
            None => (0, None),
        };
        LaneSnapshot {
            lane_id: lane_id.to_string(),
            revision,
            session,
        }
    }

    pub async fn start_session(
        &self,
        lane_id: &str,
        lookup: &CustomerLookup,
        mode: Mode,
        actor: &str,
    ) -> CoreResult<LaneSession> {
        let now = self.now();
        let lane = self.lane(lane_id).await;
        let mut slot = lane.lock().await;
        let waitlist = self.waitlist.lock().await;
        let mut registry = self.registry.lock().await;

        let customer = registry.lookup(lookup)?;
        if let Some(existing) = &slot.session {
            if existing.customer_id == customer.id {
                tracing::debug!(lane_id, customer_id = customer.id, "Attached to existing session");
                return Ok(existing.clone());
            }
            return Err(CoreError::conflict(
                ConflictCode::LaneOccupied,
                "Another customer is active on this lane",
            ));
        }
        if customer.is_banned(now) {
            return Err(CoreError::conflict_with(
                ConflictCode::CustomerBanned,
                "Customer is banned",
                json!({ "bannedUntil": customer.banned_until }),
            ));
        }

        let visit = registry.open_visit_for(customer.id);
        match (mode, visit) {
            (Mode::Initial, Some(visit)) => {
                let waitlist = waitlist.for_customer(customer.id).cloned();
                return Err(ActiveCheckin::new(visit, waitlist, now).into_conflict());
            }
            (Mode::Renewal, None) => {
                return Err(CoreError::precondition(
                    PreconditionCode::NoActiveVisit,
                    "Renewal requires an open visit",
                ));
            }
            _ => {}
        }

        let session = LaneSession::start(lane_id, customer, mode, visit, now);
        registry.bind_lane(session.customer_id, lane_id)?;
        drop(registry);
        drop(waitlist);

        tracing::info!(
            lane_id,
            session_id = %session.session_id,
            customer_id = session.customer_id,
            mode = ?mode,
            "Lane session started"
        );
        Ok(self.commit(lane_id, &mut slot, session, ServerEvent::SessionUpdated, actor))
    }

    pub async fn propose_selection(
        &self,
        lane_id: &str,
        tier: RentalTier,
        by: Actor,
        actor: &str,
    ) -> CoreResult<LaneSession> {
        self.handshake(lane_id, actor, |s| selection::propose(s, tier, by))
            .await
    }

    pub async fn confirm_selection(
        &self,
        lane_id: &str,
        by: Actor,
        actor: &str,
    ) -> CoreResult<LaneSession> {
        self.handshake(lane_id, actor, |s| selection::confirm(s, by)).await
    }

    pub async fn acknowledge_selection(
        &self,
        lane_id: &str,
        by: Actor,
        actor: &str,
    ) -> CoreResult<LaneSession> {
        self.handshake(lane_id, actor, |s| selection::acknowledge(s, by))
            .await
    }

    async fn handshake(
        &self,
        lane_id: &str,
        actor: &str,
        step: impl FnOnce(&mut LaneSession) -> CoreResult<SelectionOutcome>,
    ) -> CoreResult<LaneSession> {
        let lane = self.lane(lane_id).await;
        let mut slot = lane.lock().await;
        let mut next = slot.session()?.clone();

        let kind: EventKind = match step(&mut next)? {
            SelectionOutcome::Proposed => ServerEvent::SelectionProposed,
            SelectionOutcome::Locked => ServerEvent::SelectionLocked,
            SelectionOutcome::Forced => ServerEvent::SelectionForced,
            SelectionOutcome::Acknowledged => ServerEvent::SelectionAcknowledged,
            SelectionOutcome::Unchanged => return Ok(next),
        };
        Ok(self.commit(lane_id, &mut slot, next, kind, actor))
    }

    /// Queue the session's customer for a sold-out tier.
    pub async fn join_waitlist(
        &self,
        lane_id: &str,
        desired: RentalTier,
        backup: RentalTier,
        actor: &str,
    ) -> CoreResult<WaitlistEntry> {
        let now = self.now();
        let lane = self.lane(lane_id).await;
        let mut slot = lane.lock().await;
        let mut next = slot.session()?.clone();

        let mut waitlist = self.waitlist.lock().await;
        let available = self.inventory.lock().await.available_count(desired);
        let entry = waitlist.join(
            next.customer_id,
            &next.session_id,
            desired,
            backup,
            available,
            now,
        )?;
        drop(waitlist);

        let removed: Vec<String> = next
            .waitlist_id
            .take()
            .filter(|old| *old != entry.id)
            .into_iter()
            .collect();
        next.waitlist_id = Some(entry.id.clone());
        self.commit(lane_id, &mut slot, next, ServerEvent::SessionUpdated, actor);
        self.publish(
            ServerEvent::WaitlistUpdated(WaitlistPayload {
                entries: vec![entry.clone()],
                removed,
            }),
            actor,
        );
        Ok(entry)
    }

    pub async fn create_payment_intent(
        &self,
        lane_id: &str,
        actor: &str,
    ) -> CoreResult<LaneSession> {
        let (_, session) = self
            .update_session(lane_id, actor, ServerEvent::SessionUpdated, |s| {
                s.create_payment_intent()
            })
            .await?;
        Ok(session)
    }

    pub async fn mark_paid(
        &self,
        lane_id: &str,
        payment_intent_id: &str,
        actor: &str,
    ) -> CoreResult<LaneSession> {
        let (_, session) = self
            .update_session(lane_id, actor, ServerEvent::SessionUpdated, |s| {
                s.mark_paid(payment_intent_id)
            })
            .await?;
        tracing::info!(lane_id, payment_intent_id, "Payment recorded");
        Ok(session)
    }

    pub async fn record_payment_failure(
        &self,
        lane_id: &str,
        reason: &str,
        actor: &str,
    ) -> CoreResult<LaneSession> {
        let (_, session) = self
            .update_session(lane_id, actor, ServerEvent::SessionUpdated, |s| {
                s.record_payment_failure(reason)
            })
            .await?;
        tracing::info!(lane_id, reason, "Payment failed");
        Ok(session)
    }

    pub async fn sign_agreement(&self, lane_id: &str, actor: &str) -> CoreResult<LaneSession> {
        let (_, session) = self
            .update_session(lane_id, actor, ServerEvent::SessionUpdated, |s| {
                s.sign_agreement();
                Ok(())
            })
            .await?;
        Ok(session)
    }

    pub async fn override_signature(
        &self,
        lane_id: &str,
        reason: &str,
        actor: &str,
    ) -> CoreResult<LaneSession> {
        let (_, session) = self
            .update_session(lane_id, actor, ServerEvent::SessionUpdated, |s| {
                s.override_signature();
                Ok(())
            })
            .await?;
        tracing::warn!(
            lane_id,
            employee_id = actor,
            reason,
            session_id = %session.session_id,
            "Agreement signature overridden"
        );
        Ok(session)
    }

    // -----------------------------------------------------------------------
    // Assignment
    // -----------------------------------------------------------------------

    /// Assign `target` to the lane's session. The inventory check-and-set
    /// is the only cross-lane synchronization point: of two lanes racing
    /// for one resource, exactly one wins and the other gets `RACE_LOST`.
    pub async fn assign(
        &self,
        lane_id: &str,
        target: ResourceRef,
        actor: &str,
    ) -> CoreResult<Assignment> {
        let now = self.now();
        let lane = self.lane(lane_id).await;
        let mut slot = lane.lock().await;
        let mut next = slot.session()?.clone();
        next.ensure_assignable()?;

        let holder = Holder {
            session_id: next.session_id.clone(),
            customer_id: next.customer_id,
            visit_id: None,
        };
        let checkout_at = block_end(now, self.settings.rental_block_hours);

        let mut inventory = self.inventory.lock().await;
        let contested_tier = inventory.require(target)?.tier;
        match inventory.try_assign(target, holder, now, checkout_at) {
            Ok(resource) => {
                drop(inventory);
                next.record_assignment(&resource);
                let session =
                    self.commit(lane_id, &mut slot, next, ServerEvent::AssignmentCreated, actor);
                self.publish(
                    ServerEvent::InventoryUpdated(InventoryPayload {
                        resources: vec![resource.clone()],
                    }),
                    actor,
                );
                tracing::info!(
                    lane_id,
                    resource = %target,
                    number = %resource.number,
                    needs_confirmation = session.needs_confirmation,
                    "Resource assigned"
                );
                Ok(Assignment {
                    needs_confirmation: session.needs_confirmation,
                    resource,
                })
            }
            Err(err) => {
                let Some(code) = err.conflict_code() else {
                    return Err(err);
                };
                let suggested = inventory
                    .first_available(contested_tier, &[target])
                    .map(SuggestedResource::from);
                drop(inventory);

                let race_lost = code == ConflictCode::RaceLost;
                tracing::warn!(
                    lane_id,
                    resource = %target,
                    code = code.as_str(),
                    suggested = ?suggested.as_ref().map(|s| s.number.as_str()),
                    "Assignment rejected"
                );
                let payload = AssignmentFailedPayload {
                    lane: LanePayload {
                        lane_id: lane_id.to_string(),
                        revision: slot.next_revision(),
                        session: SessionPatch::default(),
                    },
                    contested: target,
                    code,
                    race_lost,
                    suggested_resource: suggested.clone(),
                };
                self.publish(ServerEvent::AssignmentFailed(payload), actor);
                Err(with_suggestion(err, suggested))
            }
        }
    }

    /// The customer accepts a resource of a different tier than selected.
    pub async fn confirm_assignment(&self, lane_id: &str, actor: &str) -> CoreResult<LaneSession> {
        let (_, session) = self
            .update_session(lane_id, actor, ServerEvent::CustomerConfirmed, |s| {
                s.confirm_assignment()
            })
            .await?;
        Ok(session)
    }

    /// The customer refuses a cross-tier resource. It goes back to the pool
    /// and the event suggests a resource of the originally selected tier.
    pub async fn decline_assignment(&self, lane_id: &str, actor: &str) -> CoreResult<LaneSession> {
        let lane = self.lane(lane_id).await;
        let mut slot = lane.lock().await;
        let mut next = slot.session()?.clone();
        let selected = next.customer_selected_type;
        let (released_ref, occupancy) = next.decline_assignment()?;

        let mut inventory = self.inventory.lock().await;
        let released = inventory.release(released_ref, &occupancy, ResourceStatus::Clean)?;
        let suggested = selected
            .and_then(|tier| inventory.first_available(tier, &[released_ref]))
            .map(SuggestedResource::from);
        drop(inventory);

        let patch = SessionPatch::diff(slot.session()?, &next);
        let payload = CustomerDeclinedPayload {
            lane: LanePayload {
                lane_id: lane_id.to_string(),
                revision: slot.next_revision(),
                session: patch,
            },
            released: released_ref,
            suggested_resource: suggested,
        };
        slot.session = Some(next.clone());
        self.publish(ServerEvent::CustomerDeclined(payload), actor);
        self.publish(
            ServerEvent::InventoryUpdated(InventoryPayload {
                resources: vec![released],
            }),
            actor,
        );
        tracing::info!(lane_id, resource = %released_ref, "Customer declined assignment");
        Ok(next)
    }

    // -----------------------------------------------------------------------
    // Completion and clear
    // -----------------------------------------------------------------------

    /// Finish the check-in: open a visit (or extend it, for a renewal) and
    /// empty the lane.
    pub async fn complete_checkin(
        &self,
        lane_id: &str,
        actor: &str,
    ) -> CoreResult<CheckinCompleted> {
        let now = self.now();
        let hours = self.settings.rental_block_hours;
        let lane = self.lane(lane_id).await;
        let mut slot = lane.lock().await;
        let session = slot.session()?.clone();
        session.ensure_completable()?;

        let mut waitlist = self.waitlist.lock().await;
        let mut registry = self.registry.lock().await;
        let mut inventory = self.inventory.lock().await;

        let (visit, resource) = match session.mode {
            Mode::Initial => {
                let (r, occupancy) = session.held_resource().ok_or_else(|| {
                    CoreError::precondition(
                        PreconditionCode::AssignmentRequired,
                        "A resource must be assigned before check-in",
                    )
                })?;
                if let Some(open) = registry.open_visit_for(session.customer_id) {
                    let entry = waitlist.for_customer(session.customer_id).cloned();
                    return Err(ActiveCheckin::new(open, entry, now).into_conflict());
                }
                let visit_id = uuid::Uuid::new_v4().to_string();
                let resource = inventory.attach_visit(r, occupancy, &visit_id)?;
                let visit = Visit {
                    visit_id,
                    customer_id: session.customer_id,
                    rental_type: resource.tier,
                    resource: r,
                    resource_number: resource.number.clone(),
                    occupancy_id: occupancy.to_string(),
                    checkin_at: resource.checkin_at.unwrap_or(now),
                    checkout_at: resource
                        .checkout_at
                        .unwrap_or_else(|| block_end(now, hours)),
                };
                registry.open_visit(visit.clone())?;
                (visit, resource)
            }
            Mode::Renewal => {
                let visit_id = session.renewal_visit_id.as_deref().unwrap_or_default();
                let current = registry.visit(visit_id).cloned().ok_or_else(|| {
                    CoreError::precondition(
                        PreconditionCode::NoActiveVisit,
                        "The visit being renewed is no longer open",
                    )
                })?;
                let checkout_at = block_end(current.checkout_at, hours);
                let resource = inventory.extend(current.resource, &current.occupancy_id, checkout_at)?;
                let visit = registry.extend_visit(visit_id, checkout_at)?.clone();
                (visit, resource)
            }
        };
        registry.unbind_lane(session.customer_id, lane_id);
        drop(inventory);
        drop(registry);

        let linked = session
            .waitlist_id
            .as_deref()
            .and_then(|id| waitlist.attach_visit(id, &visit.visit_id));
        drop(waitlist);

        self.announce_completion(lane_id, &mut slot, actor);
        self.publish(
            ServerEvent::InventoryUpdated(InventoryPayload {
                resources: vec![resource],
            }),
            actor,
        );
        if let Some(entry) = &linked {
            self.publish(
                ServerEvent::WaitlistUpdated(WaitlistPayload {
                    entries: vec![entry.clone()],
                    removed: Vec::new(),
                }),
                actor,
            );
        }

        tracing::info!(
            lane_id,
            visit_id = %visit.visit_id,
            customer_id = visit.customer_id,
            mode = ?session.mode,
            checkout_at = %visit.checkout_at,
            "Check-in completed"
        );
        Ok(CheckinCompleted {
            visit_id: visit.visit_id,
            customer_id: visit.customer_id,
            mode: session.mode,
            rental_type: visit.rental_type,
            assigned_resource_type: visit.resource.resource_type,
            assigned_resource_number: visit.resource_number,
            checkin_at: visit.checkin_at,
            checkout_at: visit.checkout_at,
            waitlist_id: linked.map(|e| e.id),
        })
    }

    /// Abandon the lane's session. Idempotent: an empty lane reports
    /// `false` and emits nothing.
    pub async fn clear(&self, lane_id: &str, actor: &str) -> CoreResult<bool> {
        let lane = self.lane(lane_id).await;
        let mut slot = lane.lock().await;
        let Some(session) = slot.session.clone() else {
            return Ok(false);
        };

        let removed: Vec<String> = self
            .waitlist
            .lock()
            .await
            .remove_for_session(&session.session_id)
            .into_iter()
            .map(|e| e.id)
            .collect();
        self.registry
            .lock()
            .await
            .unbind_lane(session.customer_id, lane_id);

        let released = match session.releasable_resource() {
            Some((r, occupancy)) => {
                match self
                    .inventory
                    .lock()
                    .await
                    .release(r, occupancy, ResourceStatus::Clean)
                {
                    Ok(resource) => Some(resource),
                    Err(e) => {
                        tracing::warn!(lane_id, resource = %r, error = %e, "Held resource already released");
                        None
                    }
                }
            }
            None => None,
        };

        self.announce_completion(lane_id, &mut slot, actor);
        if let Some(resource) = released {
            self.publish(
                ServerEvent::InventoryUpdated(InventoryPayload {
                    resources: vec![resource],
                }),
                actor,
            );
        }
        if !removed.is_empty() {
            self.publish(
                ServerEvent::WaitlistUpdated(WaitlistPayload {
                    entries: Vec::new(),
                    removed,
                }),
                actor,
            );
        }

        tracing::info!(lane_id, session_id = %session.session_id, "Lane cleared");
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Checkout
    // -----------------------------------------------------------------------

    pub async fn resolve_checkout(
        &self,
        resource_type: ResourceType,
        number: &str,
    ) -> CoreResult<CheckoutContext> {
        let now = self.now();
        let board = self.checkouts.lock().await;
        let registry = self.registry.lock().await;
        let inventory = self.inventory.lock().await;
        checkout::resolve(
            &inventory,
            &registry,
            &board,
            resource_type,
            number,
            &self.settings.policy,
            now,
        )
    }

    /// Raise a checkout request for an occupied resource. A repeat for the
    /// same visit returns the existing request.
    pub async fn request_checkout(
        &self,
        resource_type: ResourceType,
        number: &str,
        actor: &str,
    ) -> CoreResult<CheckoutView> {
        let now = self.now();
        let mut board = self.checkouts.lock().await;
        let registry = self.registry.lock().await;
        let inventory = self.inventory.lock().await;

        let resource = inventory.find_by_number(resource_type, number).ok_or_else(|| {
            CoreError::not_found("Resource", format!("{resource_type} {number}"))
        })?;
        let visit = registry
            .visit_for_resource(resource.resource_ref())
            .ok_or_else(|| {
                CoreError::precondition(
                    PreconditionCode::NoActiveVisit,
                    format!("{resource_type} {number} has no active visit"),
                )
            })?;
        let customer = registry.require(visit.customer_id)?;
        let (request, created) = board.request(visit, &customer.name, now);
        drop(inventory);
        drop(registry);

        let view = request.view(&self.settings.policy, now);
        if created {
            tracing::info!(
                request_id = %request.request_id,
                resource = %request.resource,
                late_minutes = view.late_minutes,
                "Checkout requested"
            );
            self.publish(
                ServerEvent::CheckoutRequested(CheckoutPayload {
                    request: view.clone(),
                }),
                actor,
            );
        }
        Ok(view)
    }

    /// Active requests, oldest first, with lateness computed now.
    pub async fn list_checkouts(&self) -> Vec<CheckoutView> {
        let now = self.now();
        let board = self.checkouts.lock().await;
        board
            .list()
            .into_iter()
            .map(|r| r.view(&self.settings.policy, now))
            .collect()
    }

    pub async fn claim_checkout(&self, request_id: &str, employee: &str) -> CoreResult<CheckoutView> {
        let now = self.now();
        let mut board = self.checkouts.lock().await;
        let (request, took) = board.claim(request_id, employee, now)?;
        let view = request.view(&self.settings.policy, now);
        if took {
            tracing::info!(request_id, employee_id = employee, "Checkout claimed");
            self.publish(
                ServerEvent::CheckoutClaimed(CheckoutPayload {
                    request: view.clone(),
                }),
                employee,
            );
        }
        Ok(view)
    }

    pub async fn confirm_checkout_items(
        &self,
        request_id: &str,
        employee: &str,
    ) -> CoreResult<CheckoutView> {
        let now = self.now();
        let mut board = self.checkouts.lock().await;
        let (request, changed) = board.confirm_items(request_id, employee)?;
        Ok(self.announce_checkout_update(&request, changed, employee, now))
    }

    /// Record the late fee as it stands right now as collected.
    pub async fn mark_checkout_fee_paid(
        &self,
        request_id: &str,
        employee: &str,
    ) -> CoreResult<CheckoutView> {
        let now = self.now();
        let mut board = self.checkouts.lock().await;
        let fee = board
            .require(request_id)?
            .assess(&self.settings.policy, now)
            .late_fee_amount;
        let (request, changed) = board.mark_fee_paid(request_id, employee, fee)?;
        if changed {
            tracing::info!(request_id, employee_id = employee, fee = %fee, "Late fee collected");
        }
        Ok(self.announce_checkout_update(&request, changed, employee, now))
    }

    fn announce_checkout_update(
        &self,
        request: &checkout::CheckoutRequest,
        changed: bool,
        actor: &str,
        now: Timestamp,
    ) -> CheckoutView {
        let view = request.view(&self.settings.policy, now);
        if changed {
            self.publish(
                ServerEvent::CheckoutUpdated(CheckoutPayload {
                    request: view.clone(),
                }),
                actor,
            );
        }
        view
    }

    /// Close the visit behind a verified checkout. The resource goes to
    /// housekeeping, a long-overdue customer is banned, and the customer's
    /// waitlist entries expire.
    pub async fn complete_checkout(
        &self,
        request_id: &str,
        employee: &str,
    ) -> CoreResult<CheckoutCompletedPayload> {
        let now = self.now();
        let mut board = self.checkouts.lock().await;
        let (request, assessment) = {
            let (request, assessment) =
                board.ensure_completable(request_id, employee, &self.settings.policy, now)?;
            (request.clone(), assessment)
        };

        let mut waitlist = self.waitlist.lock().await;
        let mut registry = self.registry.lock().await;
        let mut inventory = self.inventory.lock().await;

        let visit = registry.visit(&request.visit_id).cloned().ok_or_else(|| {
            CoreError::precondition(
                PreconditionCode::NoActiveVisit,
                "The visit for this checkout is no longer open",
            )
        })?;
        registry.require(visit.customer_id)?;
        let resource = inventory.release(visit.resource, &visit.occupancy_id, ResourceStatus::Dirty)?;
        drop(inventory);

        registry.close_visit(&visit.visit_id);
        let banned_until = if assessment.ban_applied {
            let until = now + Duration::days(BAN_DURATION_DAYS);
            registry.ban(visit.customer_id, until)?.banned_until
        } else {
            None
        };
        drop(registry);

        let expired: Vec<String> = waitlist
            .expire_for_customer(visit.customer_id)
            .into_iter()
            .map(|e| e.id)
            .collect();
        drop(waitlist);
        board.remove(request_id)?;

        let payload = CheckoutCompletedPayload {
            request_id: request.request_id.clone(),
            visit_id: visit.visit_id.clone(),
            customer_id: visit.customer_id,
            resource: visit.resource,
            late_minutes: assessment.late_minutes,
            late_fee_amount: assessment.late_fee_amount,
            ban_applied: assessment.ban_applied,
            banned_until,
            completed_by: employee.to_string(),
        };
        self.publish(ServerEvent::CheckoutCompleted(payload.clone()), employee);
        self.publish(
            ServerEvent::InventoryUpdated(InventoryPayload {
                resources: vec![resource],
            }),
            employee,
        );
        if !expired.is_empty() {
            self.publish(
                ServerEvent::WaitlistUpdated(WaitlistPayload {
                    entries: Vec::new(),
                    removed: expired,
                }),
                employee,
            );
        }

        if assessment.ban_applied {
            tracing::warn!(
                customer_id = visit.customer_id,
                late_minutes = assessment.late_minutes,
                banned_until = ?banned_until,
                "Customer banned for late checkout"
            );
        }
        tracing::info!(
            request_id,
            visit_id = %visit.visit_id,
            employee_id = employee,
            late_fee = %assessment.late_fee_amount,
            "Checkout completed"
        );
        Ok(payload)
    }

    /// Withdraw a request. Only the claim holder may cancel a claimed one.
    pub async fn cancel_checkout(&self, request_id: &str, employee: &str) -> CoreResult<CheckoutView> {
        let now = self.now();
        let mut board = self.checkouts.lock().await;
        let claimed_by = board.require(request_id)?.claimed_by.clone();
        if claimed_by.is_some_and(|holder| holder != employee) {
            return Err(CoreError::precondition(
                PreconditionCode::NotClaimHolder,
                "Checkout is claimed by another employee",
            ));
        }

        let request = board.remove(request_id)?;
        let view = request.view_with_status(CheckoutStatus::Cancelled, &self.settings.policy, now);
        self.publish(
            ServerEvent::CheckoutUpdated(CheckoutPayload {
                request: view.clone(),
            }),
            employee,
        );
        tracing::info!(request_id, employee_id = employee, "Checkout cancelled");
        Ok(view)
    }

    // -----------------------------------------------------------------------
    // Inventory
    // -----------------------------------------------------------------------

    pub async fn inventory(&self) -> InventorySnapshot {
        self.inventory.lock().await.snapshot()
    }

    /// Housekeeping status change. A no-op change emits nothing.
    pub async fn set_resource_status(
        &self,
        target: ResourceRef,
        status: ResourceStatus,
        actor: &str,
    ) -> CoreResult<Resource> {
        let (resource, previous) = self.inventory.lock().await.set_status(target, status)?;
        if let Some(previous_status) = previous {
            tracing::info!(
                resource = %target,
                from = previous_status.as_str(),
                to = status.as_str(),
                "Resource status changed"
            );
            self.publish(
                ServerEvent::RoomStatusChanged(RoomStatusPayload {
                    resource: resource.clone(),
                    previous_status,
                }),
                actor,
            );
        }
        Ok(resource)
    }

    // -----------------------------------------------------------------------
    // Waitlist
    // -----------------------------------------------------------------------

    pub async fn waitlist(&self) -> Vec<WaitlistEntry> {
        self.waitlist.lock().await.list()
    }

    pub async fn offer_waitlist(
        &self,
        entry_id: &str,
        target: ResourceRef,
        actor: &str,
    ) -> CoreResult<WaitlistEntry> {
        let now = self.now();
        let mut waitlist = self.waitlist.lock().await;
        let resource = self.inventory.lock().await.require(target)?.clone();
        let entry = waitlist.offer(entry_id, &resource, now)?;
        drop(waitlist);

        tracing::info!(entry_id, resource = %target, "Waitlist upgrade offered");
        self.publish(
            ServerEvent::WaitlistUpdated(WaitlistPayload {
                entries: vec![entry.clone()],
                removed: Vec::new(),
            }),
            actor,
        );
        Ok(entry)
    }

    /// Move the customer's visit onto the offered resource. The vacated
    /// resource goes to housekeeping.
    pub async fn fulfill_waitlist(&self, entry_id: &str, actor: &str) -> CoreResult<Visit> {
        let now = self.now();
        let board = self.checkouts.lock().await;
        let mut waitlist = self.waitlist.lock().await;
        let mut registry = self.registry.lock().await;
        let mut inventory = self.inventory.lock().await;

        let (entry, offer, visit_id) = {
            let (entry, offer, visit_id) = waitlist.offered(entry_id)?;
            (entry.clone(), offer.clone(), visit_id.to_string())
        };
        if board.for_visit(&visit_id).is_some() {
            return Err(CoreError::precondition(
                PreconditionCode::InvalidTransition,
                "Checkout has already been requested for this visit",
            ));
        }
        let visit = registry.visit(&visit_id).cloned().ok_or_else(|| {
            CoreError::precondition(
                PreconditionCode::NoActiveVisit,
                "The visit for this waitlist entry is no longer open",
            )
        })?;

        let session_id = inventory
            .get(visit.resource)
            .and_then(|r| r.assigned_to.as_ref())
            .map(|h| h.session_id.clone())
            .unwrap_or_else(|| visit.visit_id.clone());
        let holder = Holder {
            session_id,
            customer_id: entry.customer_id,
            visit_id: Some(visit_id.clone()),
        };
        let upgraded = inventory.try_assign(offer.resource, holder, now, visit.checkout_at)?;
        let occupancy = upgraded
            .occupancy_id
            .clone()
            .ok_or_else(|| CoreError::Internal("assignment without occupancy".into()))?;
        let vacated =
            match inventory.release(visit.resource, &visit.occupancy_id, ResourceStatus::Dirty) {
                Ok(resource) => resource,
                Err(e) => {
                    if let Err(rollback) =
                        inventory.release(offer.resource, &occupancy, ResourceStatus::Clean)
                    {
                        tracing::error!(
                            entry_id,
                            resource = %offer.resource,
                            error = %rollback,
                            "Failed to roll back waitlist upgrade"
                        );
                    }
                    return Err(e);
                }
            };
        drop(inventory);

        let moved = registry
            .move_visit(
                &visit_id,
                upgraded.resource_ref(),
                upgraded.number.clone(),
                occupancy,
                upgraded.tier,
            )?
            .clone();
        drop(registry);
        waitlist.remove(entry_id)?;
        drop(waitlist);

        self.publish(
            ServerEvent::InventoryUpdated(InventoryPayload {
                resources: vec![vacated, upgraded],
            }),
            actor,
        );
        self.publish(
            ServerEvent::WaitlistUpdated(WaitlistPayload {
                entries: Vec::new(),
                removed: vec![entry_id.to_string()],
            }),
            actor,
        );
        tracing::info!(
            entry_id,
            visit_id = %moved.visit_id,
            resource = %moved.resource,
            "Waitlist upgrade fulfilled"
        );
        Ok(moved)
    }

    pub async fn cancel_waitlist(&self, entry_id: &str, actor: &str) -> CoreResult<WaitlistEntry> {
        let entry = self.waitlist.lock().await.remove(entry_id)?;
        tracing::info!(entry_id, customer_id = entry.customer_id, "Waitlist entry cancelled");
        self.publish(
            ServerEvent::WaitlistUpdated(WaitlistPayload {
                entries: Vec::new(),
                removed: vec![entry.id.clone()],
            }),
            actor,
        );
        Ok(entry)
    }
}

/// Add the suggested replacement to a rejected assignment's error body.
fn with_suggestion(err: CoreError, suggested: Option<SuggestedResource>) -> CoreError {
    match err {
        CoreError::Conflict {
            code,
            message,
            details,
        } => {
            let mut details = details.unwrap_or_else(|| json!({}));
            if let Some(fields) = details.as_object_mut() {
                let value = serde_json::to_value(&suggested).unwrap_or(Value::Null);
                fields.insert("suggestedResource".into(), value);
            }
            CoreError::Conflict {
                code,
                message,
                details: Some(details),
            }
        }
        other => other,
    }
}
