//! Write-back of in-memory venue state to PostgreSQL.
//!
//! The coordinator never touches the database. [`StateWriteBack`] follows
//! the bus instead and writes every resource carried by an inventory event,
//! plus customer bans from completed checkouts, back to their rows.

use frontdesk_core::events::ServerEvent;
use frontdesk_core::inventory::Resource;
use frontdesk_db::repositories::{CustomerRepo, InventoryRepo};
use frontdesk_db::DbPool;
use tokio::sync::broadcast;

use crate::bus::VenueEvent;

pub struct StateWriteBack;

/// What one event asks to be written.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct WriteSet<'a> {
    pub resources: Vec<&'a Resource>,
    pub ban: Option<(i64, chrono::DateTime<chrono::Utc>)>,
}

pub(crate) fn write_set(event: &ServerEvent) -> WriteSet<'_> {
    match event {
        ServerEvent::InventoryUpdated(p) => WriteSet {
            resources: p.resources.iter().collect(),
            ban: None,
        },
        ServerEvent::RoomStatusChanged(p) => WriteSet {
            resources: vec![&p.resource],
            ban: None,
        },
        ServerEvent::CheckoutCompleted(p) => WriteSet {
            resources: Vec::new(),
            ban: p.banned_until.map(|until| (p.customer_id, until)),
        },
        _ => WriteSet::default(),
    }
}

impl StateWriteBack {
    /// Run the write-back loop until the channel closes.
    pub async fn run(pool: DbPool, mut receiver: broadcast::Receiver<VenueEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => Self::apply(&pool, &event).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Missed resource rows are corrected by the next event
                    // touching them; versions keep older writes out.
                    tracing::warn!(skipped = n, "State write-back lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, write-back shutting down");
                    break;
                }
            }
        }
    }

    async fn apply(pool: &DbPool, event: &VenueEvent) {
        let set = write_set(&event.event);

        for resource in set.resources {
            match InventoryRepo::write_state(pool, resource).await {
                Ok(true) => {}
                Ok(false) => tracing::debug!(
                    resource = %resource.resource_ref(),
                    version = resource.version,
                    "Write-back skipped, row is newer or missing"
                ),
                Err(e) => tracing::error!(
                    error = %e,
                    resource = %resource.resource_ref(),
                    "Failed to write back resource"
                ),
            }
        }

        if let Some((customer_id, until)) = set.ban {
            if let Err(e) = CustomerRepo::set_banned_until(pool, customer_id, until).await {
                tracing::error!(error = %e, customer_id, "Failed to write back ban");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use frontdesk_core::events::{CheckoutCompletedPayload, InventoryPayload, WaitlistPayload};
    use frontdesk_core::rental::{RentalTier, ResourceRef};
    use frontdesk_core::types::Cents;

    use super::*;

    #[test]
    fn inventory_events_write_every_resource() {
        let event = ServerEvent::InventoryUpdated(InventoryPayload {
            resources: vec![
                Resource::new_room(1, "101", RentalTier::Standard),
                Resource::new_locker(2, "L2"),
            ],
        });
        let set = write_set(&event);
        assert_eq!(set.resources.len(), 2);
        assert!(set.ban.is_none());
    }

    #[test]
    fn completed_checkout_writes_ban_only_when_applied() {
        let until = Utc::now();
        let mut payload = CheckoutCompletedPayload {
            request_id: "r".into(),
            visit_id: "v".into(),
            customer_id: 3,
            resource: ResourceRef::room(1),
            late_minutes: 95,
            late_fee_amount: Cents::dollars(35),
            ban_applied: true,
            banned_until: Some(until),
            completed_by: "emp".into(),
        };
        let event = ServerEvent::CheckoutCompleted(payload.clone());
        let set = write_set(&event);
        assert_eq!(set.ban, Some((3, until)));

        payload.banned_until = None;
        assert!(write_set(&ServerEvent::CheckoutCompleted(payload)).ban.is_none());
    }

    #[test]
    fn other_events_write_nothing() {
        let event = ServerEvent::WaitlistUpdated(WaitlistPayload::default());
        let set = write_set(&event);
        assert_eq!(set, WriteSet::default());
    }
}
