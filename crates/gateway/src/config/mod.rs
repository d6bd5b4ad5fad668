//! Configuration loading for the gateway.
//!
//! Layered the way the teacher project layers it: a TOML file provides the
//! base, environment variables prefixed `GATEWAY_` (double-underscore
//! nested) override it, and if the file is absent the compiled-in defaults
//! are used outright so the gateway can run from environment variables
//! alone in a container.

use anyhow::Result;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod defaults;

use defaults::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub start_poll: StartPollConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default = "default_agents_config_path")]
    pub agents_config_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_web_host")]
    pub host: String,
    #[serde(default = "default_web_port")]
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_web_host(),
            port: default_web_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    #[serde(default = "default_artifacts_root")]
    pub root: String,
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: u64,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            root: default_artifacts_root(),
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

impl ArtifactsConfig {
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb * 1024 * 1024
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_proxy_host")]
    pub host: String,
    #[serde(default = "default_proxy_port")]
    pub port: u16,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: default_proxy_host(),
            port: default_proxy_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    #[serde(default = "default_idle_timeout_minutes")]
    pub idle_timeout_minutes: u64,
    #[serde(default = "default_reaper_tick_seconds")]
    pub reaper_tick_seconds: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            idle_timeout_minutes: default_idle_timeout_minutes(),
            reaper_tick_seconds: default_reaper_tick_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_agent_label")]
    pub label: String,
    #[serde(default = "default_discovery_interval_seconds")]
    pub interval_seconds: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            label: default_agent_label(),
            interval_seconds: default_discovery_interval_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartPollConfig {
    #[serde(default = "default_start_poll_max_wait_seconds")]
    pub max_wait_seconds: u64,
    #[serde(default = "default_start_poll_base_interval_ms")]
    pub base_interval_ms: u64,
    #[serde(default = "default_start_poll_jitter_ms")]
    pub jitter_ms: u64,
}

impl Default for StartPollConfig {
    fn default() -> Self {
        Self {
            max_wait_seconds: default_start_poll_max_wait_seconds(),
            base_interval_ms: default_start_poll_base_interval_ms(),
            jitter_ms: default_start_poll_jitter_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            web: WebConfig::default(),
            artifacts: ArtifactsConfig::default(),
            proxy: ProxyConfig::default(),
            lifecycle: LifecycleConfig::default(),
            discovery: DiscoveryConfig::default(),
            start_poll: StartPollConfig::default(),
            observability: ObservabilityConfig::default(),
            agents_config_path: default_agents_config_path(),
        }
    }
}

impl Config {
    /// Load from the default `config.toml`, falling back to defaults.
    pub fn load() -> Result<Self> {
        Self::load_from_file("config.toml")
    }

    pub fn load_from_file(config_file: &str) -> Result<Self> {
        if !Path::new(config_file).exists() {
            tracing::warn!(
                "config file '{}' not found, using default configuration values",
                config_file
            );
            let config: Config = Figment::new()
                .merge(figment::providers::Serialized::defaults(Config::default()))
                .merge(Env::prefixed("GATEWAY_").split("__"))
                .extract()?;
            return Ok(config);
        }

        let config: Config = Figment::new()
            .merge(Toml::file(config_file))
            .merge(Env::prefixed("GATEWAY_").split("__"))
            .extract()?;
        Ok(config)
    }
}

/// Per-agent egress and lifecycle overrides, loaded separately from the
/// main gateway config since this file is expected to be edited far more
/// often (every time an agent is onboarded).
///
/// See `registry::ConfigView`, which wraps this in an in-memory map keyed
/// by agent name.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentsFile {
    #[serde(default)]
    pub agents: Vec<AgentEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEntry {
    pub name: String,
    /// Glob patterns (e.g. `*.githubusercontent.com`, `api.openai.com`)
    /// matched against the outbound CONNECT host.
    #[serde(default)]
    pub egress_allowlist: Vec<String>,
    /// Overrides `lifecycle.idle_timeout_minutes` for this agent only.
    #[serde(default)]
    pub idle_timeout_minutes: Option<u64>,
    /// Identifier used to resolve this agent against the container host
    /// adapter's discovered containers, when it differs from `name`.
    #[serde(default)]
    pub registry_id: Option<String>,
}

/// Mirrors `AgentEntry`, but captures `idle_timeout_minutes` as a raw TOML
/// value rather than `Option<u64>` directly, so a malformed value doesn't
/// fail parsing of the whole file — it's validated and dropped afterward
/// instead.
#[derive(Debug, Clone, Deserialize)]
struct RawAgentEntry {
    name: String,
    #[serde(default)]
    egress_allowlist: Vec<String>,
    #[serde(default)]
    idle_timeout_minutes: Option<toml::Value>,
    #[serde(default)]
    registry_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct RawAgentsFile {
    #[serde(default)]
    agents: Vec<RawAgentEntry>,
}

impl AgentsFile {
    pub fn load_from_file(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            tracing::warn!("agents config file '{}' not found, starting with no agent overrides", path);
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let raw: RawAgentsFile = toml::from_str(&contents)?;

        let agents = raw
            .agents
            .into_iter()
            .map(|entry| {
                let idle_timeout_minutes = entry.idle_timeout_minutes.and_then(|v| match v.as_integer() {
                    Some(n) if n >= 0 => Some(n as u64),
                    _ => {
                        tracing::warn!(
                            agent = %entry.name,
                            "malformed idle_timeout_minutes, dropping override for this agent"
                        );
                        None
                    }
                });
                AgentEntry {
                    name: entry.name,
                    egress_allowlist: entry.egress_allowlist,
                    idle_timeout_minutes,
                    registry_id: entry.registry_id,
                }
            })
            .collect();

        Ok(AgentsFile { agents })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_ports() {
        let config = Config::default();
        assert_eq!(config.web.port, 8080);
        assert_eq!(config.proxy.port, 3128);
        assert_eq!(config.artifacts.max_upload_bytes(), 200 * 1024 * 1024);
    }

    #[test]
    fn agents_file_defaults_to_empty() {
        let file = AgentsFile::default();
        assert!(file.agents.is_empty());
    }
}
