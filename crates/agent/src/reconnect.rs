//! Exponential-backoff reconnection for agent connections.
//!
//! When an agent connection drops, [`reconnect_loop`] keeps retrying with
//! increasing delays until the connection is restored or the
//! [`CancellationToken`] is triggered.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::client::{AgentClient, AgentConnection};

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

/// Next backoff delay, clamped to [`ReconnectConfig::max_delay`].
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// Reconnect with exponential backoff.
///
/// Returns `Some(connection)` once a connection succeeds, or `None` if
/// `cancel` fires first.
pub async fn reconnect_loop(
    client: &AgentClient,
    config: &ReconnectConfig,
    cancel: &CancellationToken,
) -> Option<AgentConnection> {
    let mut delay = config.initial_delay;
    let mut attempt = 0u32;

    loop {
        // Wait before each attempt, respecting cancellation.
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(endpoint = %client.endpoint(), "Reconnect cancelled");
                return None;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        attempt += 1;
        tracing::info!(
            endpoint = %client.endpoint(),
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting to agent",
        );

        tokio::select! {
            _ = cancel.cancelled() => return None,
            result = client.connect() => match result {
                Ok(conn) => {
                    tracing::info!(endpoint = %client.endpoint(), attempt, "Reconnected to agent");
                    return Some(conn);
                }
                Err(e) => {
                    tracing::warn!(
                        endpoint = %client.endpoint(),
                        error = %e,
                        "Reconnect attempt {attempt} failed",
                    );
                }
            }
        }

        delay = next_delay(delay, config);
    }
}
