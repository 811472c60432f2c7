//! A running lane terminal: connect, resync, process, reconnect.
//!
//! [`LaneTerminal`] owns the projection for one lane and publishes it on a
//! [`watch`] channel. Every (re)connection is followed by a REST resync of
//! the lane snapshot, the inventory and the checkout board, since frames
//! sent while the socket was down are not replayed.

use frontdesk_core::checkout::CheckoutView;
use frontdesk_core::inventory::InventorySnapshot;
use frontdesk_core::lane::LaneSnapshot;
use frontdesk_core::projection::TerminalState;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::api::{AssignResult, CommandError, LaneApi, Recovery};
use crate::client::LaneClient;
use crate::processor::{process_frames, StreamEnd};
use crate::reconnect::{reconnect_loop, ReconnectConfig};

/// Server views fetched after a (re)connect.
#[derive(Debug, Clone)]
pub struct Resync {
    pub lane: LaneSnapshot,
    pub inventory: InventorySnapshot,
    pub checkouts: Vec<CheckoutView>,
}

impl Resync {
    pub fn apply(&self, state: TerminalState) -> TerminalState {
        state
            .resync_lane(&self.lane)
            .resync_inventory(&self.inventory)
            .resync_checkouts(&self.checkouts)
    }
}

pub struct LaneTerminal {
    api: LaneApi,
    client: LaneClient,
    reconnect: ReconnectConfig,
    state: watch::Sender<TerminalState>,
}

impl LaneTerminal {
    /// `me` is the employee id of this terminal, `None` on a kiosk.
    pub fn new(api: LaneApi, client: LaneClient, me: Option<String>) -> Self {
        let initial = TerminalState::new(client.lane_id(), me)
            .with_filtered_feed(!client.subscriptions().is_empty());
        let (state, _) = watch::channel(initial);
        Self {
            api,
            client,
            reconnect: ReconnectConfig::default(),
            state,
        }
    }

    pub fn with_reconnect(mut self, config: ReconnectConfig) -> Self {
        self.reconnect = config;
        self
    }

    pub fn lane_id(&self) -> &str {
        self.client.lane_id()
    }

    pub fn api(&self) -> &LaneApi {
        &self.api
    }

    pub fn subscribe(&self) -> watch::Receiver<TerminalState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> TerminalState {
        self.state.borrow().clone()
    }

    /// Replace the projection with the server's current views.
    pub async fn resync(&self) -> Result<(), CommandError> {
        let lane = self.lane_id();
        let (lane_snapshot, inventory, checkouts) = tokio::try_join!(
            self.api.lane_snapshot(lane),
            self.api.inventory(),
            self.api.list_checkouts(),
        )?;
        let resync = Resync {
            lane: lane_snapshot,
            inventory,
            checkouts,
        };
        self.state
            .send_modify(|s| *s = resync.apply(std::mem::take(s)));
        tracing::debug!(lane_id = lane, revision = resync.lane.revision, "Lane resynced");
        Ok(())
    }

    /// Refetch only the inventory, clearing race exclusions.
    pub async fn refresh_inventory(&self) -> Result<(), CommandError> {
        let inventory = self.api.inventory().await?;
        self.state
            .send_modify(|s| *s = std::mem::take(s).resync_inventory(&inventory));
        Ok(())
    }

    /// Assign whatever the selector currently holds.
    ///
    /// Returns `Ok(None)` when nothing is selected. When another lane won
    /// the resource the selector moves on to the next candidate of the same
    /// tier and the inventory is refetched before the error is returned.
    pub async fn assign_selected(&self) -> Result<Option<AssignResult>, CommandError> {
        let selected = self.state.borrow().selector.selected;
        let Some(target) = selected else {
            return Ok(None);
        };

        match self.api.assign(self.lane_id(), target).await {
            Ok(result) => Ok(Some(result)),
            Err(e) if e.recovery() == Recovery::ReselectResource => {
                let suggested = e.suggested_resource();
                self.state.send_modify(|s| {
                    *s = std::mem::take(s).apply_assign_rejection(target, suggested.as_ref());
                });
                tracing::info!(
                    lane_id = self.lane_id(),
                    contested = ?target,
                    code = e.code().unwrap_or_default(),
                    "Assignment lost, reselecting",
                );
                if let Err(refresh) = self.refresh_inventory().await {
                    tracing::warn!(error = %refresh, "Inventory refetch failed");
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Connect, resync, and fold events until `cancel` fires, reconnecting
    /// with backoff whenever the stream drops. A revision gap triggers a
    /// resync on the open connection.
    pub async fn run(&self, cancel: CancellationToken) {
        let lane_id = self.lane_id().to_string();

        let mut connection = match self.client.connect().await {
            Ok(conn) => Some(conn),
            Err(e) => {
                tracing::warn!(lane_id, error = %e, "Connection failed, entering reconnect loop");
                reconnect_loop(&self.client, &self.reconnect, &cancel).await
            }
        };

        'connected: while let Some(mut conn) = connection.take() {
            let end = loop {
                if let Err(e) = self.resync().await {
                    tracing::warn!(lane_id, error = %e, "Resync failed");
                }
                match process_frames(&mut conn.ws_stream, &lane_id, &self.state, &cancel).await {
                    StreamEnd::ResyncNeeded => continue,
                    end => break end,
                }
            };
            if end == StreamEnd::Cancelled || cancel.is_cancelled() {
                break 'connected;
            }

            tracing::info!(lane_id, ?end, "Lane event stream lost, reconnecting");
            connection = reconnect_loop(&self.client, &self.reconnect, &cancel).await;
        }

        tracing::info!(lane_id, "Lane terminal stopped");
    }
}
