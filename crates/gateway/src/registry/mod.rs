//! Agent Registry: the gateway's in-memory view of which agents exist,
//! whether their containers are running, and when they were last invoked.
//!
//! `refresh` is the only place the registry talks to the container host;
//! everything else reads the cached map under a mutex, so a burst of
//! concurrent `/invoke` requests never triggers a burst of Docker calls.

pub mod docker;

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use tokio::time::sleep;

use crate::config::{AgentsFile, Config};
use crate::errors::{AppError, AppResult};
use crate::models::AgentDescriptor;
use crate::utils::jitter::generate_jitter_ms;
use docker::ContainerHostAdapter;

pub struct AgentRegistry {
    host: ContainerHostAdapter,
    config_view: Mutex<HashMap<String, AgentOverride>>,
    agents: Mutex<HashMap<String, AgentDescriptor>>,
    ip_to_name: Mutex<HashMap<String, String>>,
    default_idle_timeout_minutes: u64,
    start_poll: StartPollSettings,
}

#[derive(Debug, Clone)]
struct AgentOverride {
    egress_allowlist: Vec<String>,
    idle_timeout_minutes: Option<u64>,
    registry_id: Option<String>,
}

#[derive(Debug, Clone, Copy)]
struct StartPollSettings {
    max_wait: Duration,
    base_interval: Duration,
    jitter_ms: u64,
}

impl AgentRegistry {
    pub fn new(config: &Config, agents_file: AgentsFile) -> AppResult<Self> {
        let host = ContainerHostAdapter::connect(&config.discovery.label)?;

        let config_view = agents_file
            .agents
            .into_iter()
            .map(|entry| {
                (
                    entry.name,
                    AgentOverride {
                        egress_allowlist: entry.egress_allowlist,
                        idle_timeout_minutes: entry.idle_timeout_minutes,
                        registry_id: entry.registry_id,
                    },
                )
            })
            .collect();

        Ok(Self {
            host,
            config_view: Mutex::new(config_view),
            agents: Mutex::new(HashMap::new()),
            ip_to_name: Mutex::new(HashMap::new()),
            default_idle_timeout_minutes: config.lifecycle.idle_timeout_minutes,
            start_poll: StartPollSettings {
                max_wait: Duration::from_secs(config.start_poll.max_wait_seconds),
                base_interval: Duration::from_millis(config.start_poll.base_interval_ms),
                jitter_ms: config.start_poll.jitter_ms,
            },
        })
    }

    /// Re-list containers from the host and merge with config-view
    /// overrides, preserving `last_seen` for agents that survive the
    /// refresh. Both the agent map and the IP reverse-lookup map are
    /// rebuilt into fresh maps and swapped in together, so a concurrent
    /// reader never observes one updated and the other stale.
    pub async fn refresh(&self) -> AppResult<()> {
        let discovered = self.host.discover().await?;
        let overrides = self.config_view.lock().unwrap().clone();
        let previous = self.agents.lock().unwrap().clone();

        let mut next_agents = HashMap::new();
        let mut next_ip_to_name = HashMap::new();

        for container in discovered {
            let name = overrides
                .iter()
                .find(|(_, ov)| ov.registry_id.as_deref() == Some(container.name.as_str()))
                .map(|(name, _)| name.clone())
                .unwrap_or_else(|| container.name.clone());

            let ov = overrides.get(&name);
            let last_seen = previous.get(&name).and_then(|a| a.last_seen);

            if let Some(ip) = &container.ip_address {
                next_ip_to_name.insert(ip.clone(), name.clone());
            }

            next_agents.insert(
                name.clone(),
                AgentDescriptor {
                    name,
                    container_id: container.id,
                    running: container.running,
                    container_ip: container.ip_address,
                    port: container.port,
                    last_seen,
                    egress_allowlist: ov.map(|o| o.egress_allowlist.clone()).unwrap_or_default(),
                    idle_timeout_minutes: ov
                        .and_then(|o| o.idle_timeout_minutes)
                        .unwrap_or(self.default_idle_timeout_minutes),
                },
            );
        }

        // Configured-but-not-yet-running agents stay visible as "stopped"
        // so `list(all)` and onboarding-before-first-start both work.
        for (name, ov) in &overrides {
            next_agents.entry(name.clone()).or_insert_with(|| AgentDescriptor {
                name: name.clone(),
                container_id: String::new(),
                running: false,
                container_ip: None,
                port: None,
                last_seen: previous.get(name).and_then(|a| a.last_seen),
                egress_allowlist: ov.egress_allowlist.clone(),
                idle_timeout_minutes: ov.idle_timeout_minutes.unwrap_or(self.default_idle_timeout_minutes),
            });
        }

        *self.agents.lock().unwrap() = next_agents;
        *self.ip_to_name.lock().unwrap() = next_ip_to_name;
        Ok(())
    }

    pub fn list(&self) -> Vec<AgentDescriptor> {
        self.agents.lock().unwrap().values().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<AgentDescriptor> {
        self.agents.lock().unwrap().get(name).cloned()
    }

    /// Reverse lookup used by the Egress Proxy to identify the calling
    /// agent from its container's source IP.
    pub fn name_for_ip(&self, ip: &str) -> Option<String> {
        self.ip_to_name.lock().unwrap().get(ip).cloned()
    }

    /// Mark an agent as just-used, so the reaper's idle clock restarts.
    pub fn mark_seen(&self, name: &str) {
        if let Some(agent) = self.agents.lock().unwrap().get_mut(name) {
            agent.last_seen = Some(Utc::now());
        }
    }

    /// Clear `last_seen`, called by the reaper immediately after it stops
    /// an idle agent so a freshly-stopped container isn't immediately
    /// eligible for reaping again the next time it's started.
    pub fn clear_seen(&self, name: &str) {
        if let Some(agent) = self.agents.lock().unwrap().get_mut(name) {
            agent.last_seen = None;
        }
    }

    pub fn mark_running(&self, name: &str, running: bool) {
        if let Some(agent) = self.agents.lock().unwrap().get_mut(name) {
            agent.running = running;
        }
    }

    /// Start the agent's container if it isn't already running, and poll
    /// with jittered backoff until it reports running or `max_wait`
    /// elapses. Replaces a fixed `sleep(2)` poll with a bounded,
    /// jittered one so concurrent starts don't all wake in lockstep.
    ///
    /// Polls `refresh()` rather than inspecting the container directly, so
    /// `container_ip`/`ip_to_name` are populated together with the running
    /// flag — otherwise a freshly started agent's peer IP wouldn't be
    /// registered until the next scheduled discovery tick, and the Egress
    /// Proxy would 403 a legitimate just-started agent in the meantime.
    pub async fn ensure_running(&self, name: &str) -> AppResult<()> {
        let agent = self
            .get(name)
            .ok_or_else(|| AppError::AgentNotFound(name.to_string()))?;

        if agent.running {
            return Ok(());
        }

        self.host.start(&agent.container_id).await?;

        let deadline = tokio::time::Instant::now() + self.start_poll.max_wait;
        loop {
            self.refresh().await?;
            if self.get(name).is_some_and(|a| a.running) {
                return Ok(());
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(AppError::host_unavailable(format!(
                    "agent '{name}' did not report running within {:?}",
                    self.start_poll.max_wait
                )));
            }

            let jitter = generate_jitter_ms(self.start_poll.jitter_ms);
            sleep(self.start_poll.base_interval + Duration::from_millis(jitter)).await;
        }
    }

    pub async fn stop(&self, name: &str) -> AppResult<()> {
        let agent = self
            .get(name)
            .ok_or_else(|| AppError::AgentNotFound(name.to_string()))?;
        self.host.stop(&agent.container_id).await?;
        self.mark_running(name, false);
        Ok(())
    }
}
