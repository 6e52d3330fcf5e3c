use std::path::PathBuf;
use std::time::Duration;

use rollout_agent::AgentManagerConfig;
use rollout_orchestrator::OrchestratorConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Location of the host registry file.
    pub registry_path: PathBuf,
    pub agent: AgentManagerConfig,
    pub orchestrator: OrchestratorConfig,
    pub metrics: MetricsConfig,
}

/// Settings of the host metrics fan-out.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Per-host request timeout.
    pub timeout: Duration,
    /// `host:port` queried for the local endpoint.
    pub local_addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(3000),
            local_addr: "127.0.0.1:5000".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                      |
    /// |---------------------------|------------------------------|
    /// | `HOST`                    | `0.0.0.0`                    |
    /// | `PORT`                    | `3000`                       |
    /// | `CORS_ORIGINS`            | `http://localhost:5173`      |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                         |
    /// | `REGISTRY_PATH`           | `data/config/updates.json`   |
    /// | `AGENT_WS_PATH`           | `/agent`                     |
    /// | `LOCAL_AGENT_URL`         | `ws://127.0.0.1:5001/agent`  |
    /// | `HEALTH_POLL_INTERVAL_MS` | `2000`                       |
    /// | `VERIFY_TIMEOUT_SECS`     | `300`                        |
    /// | `ACK_TIMEOUT_SECS`        | `120`                        |
    /// | `METRICS_TIMEOUT_MS`      | `3000`                       |
    /// | `LOCAL_METRICS_ADDR`      | `127.0.0.1:5000`             |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs = env_u64("REQUEST_TIMEOUT_SECS", 30);

        let registry_path = std::env::var("REGISTRY_PATH")
            .unwrap_or_else(|_| "data/config/updates.json".into())
            .into();

        let defaults = AgentManagerConfig::default();
        let agent = AgentManagerConfig {
            ws_path: std::env::var("AGENT_WS_PATH").unwrap_or(defaults.ws_path),
            local_url: std::env::var("LOCAL_AGENT_URL").unwrap_or(defaults.local_url),
            request_timeout: Duration::from_secs(env_u64("ACK_TIMEOUT_SECS", 120)),
            ..AgentManagerConfig::default()
        };

        let orchestrator = OrchestratorConfig {
            health_poll_interval: Duration::from_millis(env_u64("HEALTH_POLL_INTERVAL_MS", 2000)),
            verify_timeout: Duration::from_secs(env_u64("VERIFY_TIMEOUT_SECS", 300)),
            ack_timeout: Duration::from_secs(env_u64("ACK_TIMEOUT_SECS", 120)),
            ..OrchestratorConfig::default()
        };

        let metrics = MetricsConfig {
            timeout: Duration::from_millis(env_u64("METRICS_TIMEOUT_MS", 3000)),
            local_addr: std::env::var("LOCAL_METRICS_ADDR")
                .unwrap_or_else(|_| MetricsConfig::default().local_addr),
        };

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            registry_path,
            agent,
            orchestrator,
            metrics,
        }
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{name} must be a valid u64")),
        Err(_) => default,
    }
}
