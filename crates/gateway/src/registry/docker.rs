//! Container Host Adapter: the gateway's only point of contact with the
//! Docker API, used to discover agent containers and to start/stop them.
//!
//! Discovery is a single cheap, label-filtered `ListContainers` call —
//! the gateway never inspects or dials a container it didn't pick up via
//! the `agent.enabled=true` label.

use bollard::Docker;
use bollard::query_parameters::{
    ListContainersOptionsBuilder, StartContainerOptionsBuilder, StopContainerOptionsBuilder,
};
use std::collections::HashMap;

use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct DiscoveredContainer {
    pub id: String,
    pub name: String,
    pub running: bool,
    pub ip_address: Option<String>,
    /// The container's exposed/mapped private port, when the host reports
    /// one. Used to build the invoke endpoint instead of an assumed port.
    pub port: Option<u16>,
}

#[derive(Clone)]
pub struct ContainerHostAdapter {
    docker: Docker,
    label: String,
}

impl ContainerHostAdapter {
    pub fn connect(label: impl Into<String>) -> AppResult<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| AppError::host_unavailable(format!("failed to connect to docker: {e}")))?;
        Ok(Self {
            docker,
            label: label.into(),
        })
    }

    /// List every container carrying the agent-enabled label, running or
    /// not. The gateway derives the agent's logical name from the
    /// container name, stripping a leading `/`.
    pub async fn discover(&self) -> AppResult<Vec<DiscoveredContainer>> {
        let mut filters: HashMap<String, Vec<String>> = HashMap::new();
        filters.insert("label".to_string(), vec![self.label.clone()]);

        let options = ListContainersOptionsBuilder::default()
            .all(true)
            .filters(&filters)
            .build();

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| AppError::host_unavailable(format!("docker list_containers failed: {e}")))?;

        Ok(containers
            .into_iter()
            .filter_map(|c| {
                let id = c.id?;
                let name = c
                    .names
                    .and_then(|names| names.into_iter().next())
                    .map(|n| n.trim_start_matches('/').to_string())
                    .unwrap_or_else(|| id.clone());
                let running = c.state == Some(bollard::models::ContainerSummaryStateEnum::RUNNING);
                let ip_address = c
                    .network_settings
                    .and_then(|ns| ns.networks)
                    .and_then(|networks| networks.into_values().next())
                    .and_then(|endpoint| endpoint.ip_address)
                    .filter(|ip| !ip.is_empty());
                let port = c.ports.and_then(|ports| ports.into_iter().next()).map(|p| p.private_port);
                Some(DiscoveredContainer {
                    id,
                    name,
                    running,
                    ip_address,
                    port,
                })
            })
            .collect())
    }

    pub async fn start(&self, container_id: &str) -> AppResult<()> {
        self.docker
            .start_container(container_id, Some(StartContainerOptionsBuilder::default().build()))
            .await
            .map_err(|e| AppError::host_unavailable(format!("failed to start container {container_id}: {e}")))
    }

    pub async fn stop(&self, container_id: &str) -> AppResult<()> {
        self.docker
            .stop_container(container_id, Some(StopContainerOptionsBuilder::default().build()))
            .await
            .map_err(|e| AppError::host_unavailable(format!("failed to stop container {container_id}: {e}")))
    }

    pub async fn is_running(&self, container_id: &str) -> AppResult<bool> {
        let inspect = self
            .docker
            .inspect_container(container_id, None::<bollard::query_parameters::InspectContainerOptions>)
            .await
            .map_err(|e| AppError::host_unavailable(format!("failed to inspect container {container_id}: {e}")))?;

        Ok(inspect
            .state
            .and_then(|s| s.running)
            .unwrap_or(false))
    }
}
