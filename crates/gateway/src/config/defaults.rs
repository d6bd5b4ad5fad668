//! Configuration default values
//!
//! Central location for every `#[serde(default = "...")]` backing function,
//! so the defaults documented in the sample config file and the defaults
//! compiled into the binary never drift apart.

// Database defaults
pub const DEFAULT_DATABASE_URL: &str = "sqlite://./data/gateway.db?mode=rwc";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

// Web server defaults
pub const DEFAULT_WEB_HOST: &str = "0.0.0.0";
pub const DEFAULT_WEB_PORT: u16 = 8080;

// Artifact store defaults
pub const DEFAULT_ARTIFACTS_ROOT: &str = "/artifacts";
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 200;

// Egress proxy defaults
pub const DEFAULT_PROXY_HOST: &str = "0.0.0.0";
pub const DEFAULT_PROXY_PORT: u16 = 3128;

// Lifecycle reaper defaults
pub const DEFAULT_IDLE_TIMEOUT_MINUTES: u64 = 15;
pub const DEFAULT_REAPER_TICK_SECONDS: u64 = 60;

// Container host defaults
pub const DEFAULT_AGENT_LABEL: &str = "agent.enabled=true";
pub const DEFAULT_DISCOVERY_INTERVAL_SECONDS: u64 = 30;

// Agent start polling defaults (bounded, jittered)
pub const DEFAULT_START_POLL_MAX_WAIT_SECONDS: u64 = 30;
pub const DEFAULT_START_POLL_BASE_INTERVAL_MS: u64 = 500;
pub const DEFAULT_START_POLL_JITTER_MS: u64 = 250;

// Observability defaults
pub const DEFAULT_LOG_FILTER: &str = "gateway=info";

pub fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

pub fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

pub fn default_web_host() -> String {
    DEFAULT_WEB_HOST.to_string()
}

pub fn default_web_port() -> u16 {
    DEFAULT_WEB_PORT
}

pub fn default_artifacts_root() -> String {
    DEFAULT_ARTIFACTS_ROOT.to_string()
}

pub fn default_max_upload_mb() -> u64 {
    DEFAULT_MAX_UPLOAD_MB
}

pub fn default_proxy_host() -> String {
    DEFAULT_PROXY_HOST.to_string()
}

pub fn default_proxy_port() -> u16 {
    DEFAULT_PROXY_PORT
}

pub fn default_idle_timeout_minutes() -> u64 {
    DEFAULT_IDLE_TIMEOUT_MINUTES
}

pub fn default_reaper_tick_seconds() -> u64 {
    DEFAULT_REAPER_TICK_SECONDS
}

pub fn default_agent_label() -> String {
    DEFAULT_AGENT_LABEL.to_string()
}

pub fn default_discovery_interval_seconds() -> u64 {
    DEFAULT_DISCOVERY_INTERVAL_SECONDS
}

pub fn default_start_poll_max_wait_seconds() -> u64 {
    DEFAULT_START_POLL_MAX_WAIT_SECONDS
}

pub fn default_start_poll_base_interval_ms() -> u64 {
    DEFAULT_START_POLL_BASE_INTERVAL_MS
}

pub fn default_start_poll_jitter_ms() -> u64 {
    DEFAULT_START_POLL_JITTER_MS
}

pub fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

pub fn default_agents_config_path() -> String {
    "agents.toml".to_string()
}
