use std::time::Duration;

/// Timing policy of a batch run.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Delay between service-health polls while verifying.
    pub health_poll_interval: Duration,
    /// Shared window for the running notification and health verification.
    pub verify_timeout: Duration,
    /// How long to wait for the agent to acknowledge an update request.
    pub ack_timeout: Duration,
    /// Period of the elapsed-seconds counter. One second outside tests.
    pub tick_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            health_poll_interval: Duration::from_millis(2000),
            verify_timeout: Duration::from_secs(300),
            ack_timeout: Duration::from_secs(120),
            tick_interval: Duration::from_secs(1),
        }
    }
}
