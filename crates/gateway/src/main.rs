use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use gateway::artifacts::ArtifactStore;
use gateway::audit::{AuditStore, NoopAuditStore, SeaOrmAuditStore};
use gateway::config::{AgentsFile, Config};
use gateway::database::Database;
use gateway::invocation::InvocationEngine;
use gateway::lifecycle::LifecycleReaper;
use gateway::observability::init_tracing;
use gateway::proxy::EgressProxy;
use gateway::registry::AgentRegistry;
use gateway::repositories::{InMemoryJobStore, JobStore, SeaOrmJobStore};
use gateway::web::{AppState, create_router};

#[derive(Parser)]
#[command(name = "agent-gateway")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Control-plane gateway for containerized agents")]
struct Cli {
    /// Gateway configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Per-agent egress/lifecycle overrides (overrides config.agents_config_path)
    #[arg(long)]
    agents_config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load_from_file(&cli.config).context("loading gateway configuration")?;
    init_tracing(&config.observability.log_filter);

    info!(version = env!("CARGO_PKG_VERSION"), "starting agent gateway");

    let agents_config_path = cli.agents_config.unwrap_or_else(|| config.agents_config_path.clone());
    let agents_file = AgentsFile::load_from_file(&agents_config_path).context("loading agents config")?;

    // Store unavailable at startup degrades to the in-memory job store and
    // a no-op audit store rather than preventing the gateway from serving
    // traffic at all; a malformed database URL is still a hard error.
    let database = Database::try_connect(&config.database).await.context("connecting to database")?;

    if let Some(db) = &database {
        db.migrate().await.context("running database migrations")?;
    }

    let registry = Arc::new(AgentRegistry::new(&config, agents_file).context("initializing agent registry")?);
    registry.refresh().await.context("initial agent discovery")?;

    let jobs: Arc<dyn JobStore> = match &database {
        Some(db) => Arc::new(SeaOrmJobStore::new(db.connection())),
        None => Arc::new(InMemoryJobStore::new()),
    };

    let audit: Arc<dyn AuditStore> = match &database {
        Some(db) => Arc::new(SeaOrmAuditStore::new(db.connection())),
        None => Arc::new(NoopAuditStore::new()),
    };
    let artifacts = Arc::new(ArtifactStore::new(
        config.artifacts.root.clone(),
        config.artifacts.max_upload_bytes(),
    ));
    let reaper = Arc::new(LifecycleReaper::new(registry.clone(), config.lifecycle.reaper_tick_seconds));

    let engine = Arc::new(InvocationEngine::new(
        registry.clone(),
        jobs.clone(),
        audit.clone(),
        artifacts.clone(),
        reaper.clone(),
    ));

    let shutdown = CancellationToken::new();

    let reaper_handle = {
        let reaper = reaper.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { reaper.run(shutdown).await })
    };

    let proxy = Arc::new(EgressProxy::new(registry.clone()));
    let proxy_handle = {
        let proxy = proxy.clone();
        let shutdown = shutdown.clone();
        let bind = format!("{}:{}", config.proxy.host, config.proxy.port);
        tokio::spawn(async move {
            if let Err(e) = proxy.run(&bind, shutdown).await {
                tracing::error!(error = %e, "egress proxy exited");
            }
        })
    };

    let discovery_handle = {
        let registry = registry.clone();
        let shutdown = shutdown.clone();
        let interval = std::time::Duration::from_secs(config.discovery.interval_seconds);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = ticker.tick() => {
                        if let Err(e) = registry.refresh().await {
                            tracing::warn!(error = %e, "periodic agent discovery refresh failed");
                        }
                    }
                }
            }
        })
    };

    let state = AppState {
        engine,
        registry: registry.clone(),
        audit,
        http: reqwest::Client::new(),
    };
    let app = create_router(state);

    let bind = format!("{}:{}", config.web.host, config.web.port);
    let listener = tokio::net::TcpListener::bind(&bind).await.with_context(|| format!("binding web server to {bind}"))?;
    info!(%bind, "web server listening");

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            server_shutdown.cancel();
        })
        .await
        .context("web server failed")?;

    shutdown.cancel();
    let _ = tokio::join!(reaper_handle, proxy_handle, discovery_handle);

    info!("agent gateway shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
