//! Exponential-backoff reconnection for lane event streams.
//!
//! When the socket drops, the runner calls [`reconnect_loop`], which keeps
//! retrying with growing delays until the connection is restored or the
//! [`CancellationToken`] fires. Events missed while disconnected are not
//! replayed; the caller resyncs over REST afterwards.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::client::{LaneClient, LaneConnection};

/// Tunable parameters for the exponential-backoff strategy.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// The next backoff delay, clamped to [`ReconnectConfig::max_delay`].
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// Wait `initial_delay`, then retry with backoff until connected.
///
/// Returns `None` if `cancel` fires first.
pub async fn reconnect_loop(
    client: &LaneClient,
    config: &ReconnectConfig,
    cancel: &CancellationToken,
) -> Option<LaneConnection> {
    let mut delay = config.initial_delay;
    let mut attempt = 0u32;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(lane_id = client.lane_id(), "Reconnect cancelled");
                return None;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        attempt += 1;
        tracing::info!(
            lane_id = client.lane_id(),
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting to lane event stream",
        );

        tokio::select! {
            _ = cancel.cancelled() => return None,
            result = client.connect() => match result {
                Ok(conn) => {
                    tracing::info!(lane_id = client.lane_id(), attempt, "Reconnected");
                    return Some(conn);
                }
                Err(e) => {
                    tracing::warn!(
                        lane_id = client.lane_id(),
                        error = %e,
                        "Reconnect attempt {attempt} failed",
                    );
                }
            }
        }

        delay = next_delay(delay, config);
    }
}
