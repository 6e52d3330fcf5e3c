//! Scripted in-memory agents and helpers shared by the orchestrator tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rollout_agent::{
    AgentChannel, AgentChannelFactory, AgentNotification, ChannelError, ServiceHealthReport,
    UpdateAck,
};
use rollout_core::batch::BatchRun;
use rollout_core::health::ServiceStatus;
use rollout_core::item::Phase;
use rollout_core::run_state::RunState;
use rollout_orchestrator::{BatchOrchestrator, OrchestratorConfig};
use rollout_registry::{HostEntry, HostRegistry, MemoryRegistry, PendingUpdate, RegistryError};
use tokio::sync::{broadcast, Notify};

/// How the fake agent answers `request_update`.
#[derive(Clone)]
pub enum Ack {
    Accept,
    Reject(String),
    /// Never answers.
    Hang,
    /// Accepts once the gate is opened.
    Gated(Arc<Notify>),
}

/// Behaviour of one stack on a fake agent.
#[derive(Clone)]
pub struct Script {
    pub ack: Ack,
    /// Run states pushed right after an accepted request.
    pub after_ack: Vec<RunState>,
    /// Successive health answers; the last one repeats.
    pub health: Vec<Vec<ServiceStatus>>,
}

impl Script {
    /// Accept, report running, all services healthy.
    pub fn healthy() -> Self {
        Self {
            ack: Ack::Accept,
            after_ack: vec![RunState::Updating, RunState::Running],
            health: vec![services(2, 0, 0)],
        }
    }

    pub fn with_ack(mut self, ack: Ack) -> Self {
        self.ack = ack;
        self
    }

    pub fn with_after_ack(mut self, states: Vec<RunState>) -> Self {
        self.after_ack = states;
        self
    }

    pub fn with_health(mut self, health: Vec<Vec<ServiceStatus>>) -> Self {
        self.health = health;
        self
    }
}

/// Service list with the given number of healthy, unhealthy and starting services.
pub fn services(healthy: usize, unhealthy: usize, starting: usize) -> Vec<ServiceStatus> {
    let mut out = Vec::new();
    for i in 0..healthy {
        out.push(ServiceStatus {
            name: format!("ok-{i}"),
            state: "running".into(),
        });
    }
    for i in 0..unhealthy {
        out.push(ServiceStatus {
            name: format!("bad-{i}"),
            state: "exited (1)".into(),
        });
    }
    for i in 0..starting {
        out.push(ServiceStatus {
            name: format!("slow-{i}"),
            state: "Up 2 seconds (health: starting)".into(),
        });
    }
    out
}

/// Shared log of every RPC, e.g. `update:web@host1`.
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub struct FakeAgent {
    endpoint: String,
    scripts: HashMap<String, Script>,
    health_calls: Mutex<HashMap<String, usize>>,
    notify_tx: broadcast::Sender<AgentNotification>,
    log: CallLog,
}

#[async_trait]
impl AgentChannel for FakeAgent {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn request_update(&self, stack: &str) -> Result<UpdateAck, ChannelError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("update:{stack}@{}", self.endpoint));
        let script = self
            .scripts
            .get(stack)
            .cloned()
            .unwrap_or_else(Script::healthy);

        match script.ack {
            Ack::Accept => {}
            Ack::Reject(reason) => return Ok(UpdateAck::rejected(reason)),
            Ack::Hang => std::future::pending::<()>().await,
            Ack::Gated(gate) => gate.notified().await,
        }

        for run_state in script.after_ack {
            let _ = self.notify_tx.send(AgentNotification {
                endpoint: self.endpoint.clone(),
                stack: stack.to_string(),
                run_state,
            });
        }
        Ok(UpdateAck::accepted())
    }

    fn subscribe(&self) -> broadcast::Receiver<AgentNotification> {
        self.notify_tx.subscribe()
    }

    async fn query_service_health(&self, stack: &str) -> Result<ServiceHealthReport, ChannelError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("health:{stack}@{}", self.endpoint));
        let script = self
            .scripts
            .get(stack)
            .cloned()
            .unwrap_or_else(Script::healthy);

        let call = {
            let mut calls = self.health_calls.lock().unwrap();
            let n = calls.entry(stack.to_string()).or_insert(0);
            *n += 1;
            *n - 1
        };
        let services = script
            .health
            .get(call)
            .or_else(|| script.health.last())
            .cloned()
            .unwrap_or_default();

        Ok(ServiceHealthReport {
            ok: true,
            services,
            error: None,
        })
    }
}

/// Factory over a fixed set of fake agents. Unknown endpoints fail to connect.
pub struct FakeFactory {
    agents: HashMap<String, Arc<FakeAgent>>,
    pub log: CallLog,
}

impl FakeFactory {
    pub fn new() -> Self {
        Self {
            agents: HashMap::new(),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add an agent for `endpoint` with per-stack scripts.
    pub fn agent(mut self, endpoint: &str, scripts: Vec<(&str, Script)>) -> Self {
        let (notify_tx, _) = broadcast::channel(64);
        let agent = FakeAgent {
            endpoint: endpoint.to_string(),
            scripts: scripts
                .into_iter()
                .map(|(stack, script)| (stack.to_string(), script))
                .collect(),
            health_calls: Mutex::new(HashMap::new()),
            notify_tx,
            log: Arc::clone(&self.log),
        };
        self.agents.insert(endpoint.to_string(), Arc::new(agent));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentChannelFactory for FakeFactory {
    async fn channel(&self, endpoint: &str) -> Result<Arc<dyn AgentChannel>, ChannelError> {
        self.agents
            .get(endpoint)
            .map(|agent| Arc::clone(agent) as Arc<dyn AgentChannel>)
            .ok_or_else(|| ChannelError::Connection(format!("No agent at {endpoint}")))
    }
}

/// Short timings so tests finish quickly.
pub fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        health_poll_interval: Duration::from_millis(20),
        verify_timeout: Duration::from_secs(2),
        ack_timeout: Duration::from_secs(2),
        tick_interval: Duration::from_millis(50),
    }
}

/// Registry entry for `hostname` at `endpoint` with pending `stacks`.
pub fn host(hostname: &str, endpoint: &str, stacks: &[&str]) -> HostEntry {
    HostEntry {
        hostname: hostname.to_string(),
        endpoint: endpoint.to_string(),
        updates: stacks.iter().map(|s| PendingUpdate::new(*s)).collect(),
    }
}

pub fn registry(hosts: Vec<HostEntry>) -> Arc<MemoryRegistry> {
    Arc::new(MemoryRegistry::new(hosts))
}

/// Registry whose reads and removals take `delay`, like a store on slow disk.
pub struct SlowRegistry {
    inner: MemoryRegistry,
    delay: Duration,
}

impl SlowRegistry {
    pub fn new(hosts: Vec<HostEntry>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryRegistry::new(hosts),
            delay,
        })
    }
}

#[async_trait]
impl HostRegistry for SlowRegistry {
    async fn list_hosts(&self) -> Result<Vec<HostEntry>, RegistryError> {
        tokio::time::sleep(self.delay).await;
        self.inner.list_hosts().await
    }

    async fn remove_update(&self, stack: &str, hostname: &str) -> Result<bool, RegistryError> {
        tokio::time::sleep(self.delay).await;
        self.inner.remove_update(stack, hostname).await
    }

    async fn remove_update_at(&self, stack: &str, endpoint: &str) -> Result<bool, RegistryError> {
        tokio::time::sleep(self.delay).await;
        self.inner.remove_update_at(stack, endpoint).await
    }

    async fn replace_all(&self, hosts: Vec<HostEntry>) -> Result<(), RegistryError> {
        self.inner.replace_all(hosts).await
    }

    async fn set_updates(
        &self,
        hostname: &str,
        endpoint: &str,
        updates: Vec<PendingUpdate>,
    ) -> Result<HostEntry, RegistryError> {
        self.inner.set_updates(hostname, endpoint, updates).await
    }

    async fn register_agent(&self, hostname: &str, endpoint: &str) -> Result<bool, RegistryError> {
        self.inner.register_agent(hostname, endpoint).await
    }
}

pub fn orchestrator<R: HostRegistry + 'static>(
    registry: Arc<R>,
    factory: Arc<FakeFactory>,
    config: OrchestratorConfig,
) -> Arc<BatchOrchestrator> {
    BatchOrchestrator::new(registry, factory, config)
}

/// Wait (bounded) for the batch to complete.
pub async fn wait_completed(orch: &BatchOrchestrator) -> BatchRun {
    tokio::time::timeout(Duration::from_secs(10), orch.wait_idle())
        .await
        .expect("batch completes in time")
        .expect("batch still present")
}

/// Wait (bounded) until item `index` is in `phase`.
pub async fn wait_for_phase(orch: &BatchOrchestrator, index: usize, phase: Phase) {
    let mut rx = orch.watch();
    tokio::time::timeout(
        Duration::from_secs(10),
        rx.wait_for(|run| {
            run.as_ref()
                .and_then(|r| r.items.get(index))
                .is_some_and(|item| item.phase == phase)
        }),
    )
    .await
    .expect("phase reached in time")
    .expect("orchestrator alive");
}
