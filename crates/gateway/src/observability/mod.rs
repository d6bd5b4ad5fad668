//! Structured logging setup.
//!
//! Registry refreshes, lazy-start attempts, reaper sweeps, proxy connection
//! outcomes, audit insert failures and job state transitions all log
//! through `tracing` with structured fields (`agent`, `thread_id`,
//! `status`, ...) rather than free text, so an invocation's path can be
//! reconstructed from logs alone. Verbosity is controlled entirely by the
//! startup filter directive; there is no runtime log-level API.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_tracing(filter: &str) {
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}
