// Container runtime adapters: Docker Engine API (bollard) and the docker CLI

mod cli;
mod stats;

pub use cli::{DockerCli, parse_stats_output};

use crate::models::RawStatSnapshot;
use bollard::Docker;
use bollard::query_parameters::{ListContainersOptions, StatsOptions};
use futures_util::StreamExt;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tracing::{instrument, warn};

/// A runtime that can be asked for the current stats of every running container.
///
/// `poll` never fails: an unreachable runtime yields an empty list, and a container whose
/// stats cannot be fetched is left out without affecting the others.
pub trait StatsSource {
    fn poll(&self) -> impl Future<Output = Vec<RawStatSnapshot>> + Send;
}

pub struct DockerRepo {
    docker: Docker,
    timeout: Duration,
}

impl DockerRepo {
    pub fn connect(timeout: Duration) -> anyhow::Result<Self> {
        let docker = Docker::connect_with_unix_defaults()?.with_timeout(timeout);
        Ok(Self { docker, timeout })
    }

    /// (id, name) of running containers, `None` when the daemon cannot be reached.
    async fn list_running(&self) -> Option<Vec<(String, String)>> {
        let mut filters = HashMap::new();
        filters.insert("status".to_string(), vec!["running".to_string()]);

        let filter = ListContainersOptions {
            all: false,
            filters: Some(filters),
            ..Default::default()
        };

        let containers =
            match tokio::time::timeout(self.timeout, self.docker.list_containers(Some(filter)))
                .await
            {
                Ok(Ok(c)) => c,
                Ok(Err(e)) => {
                    warn!(
                        error = %e,
                        operation = "list_containers",
                        "Docker list_containers failed"
                    );
                    return None;
                }
                Err(_) => {
                    warn!(operation = "list_containers", "Docker list_containers timed out");
                    return None;
                }
            };

        Some(
            containers
                .into_iter()
                .filter_map(|c| {
                    let id = c.id?;
                    let name = c
                        .names
                        .as_ref()
                        .and_then(|n| n.first())
                        .map(|n| n.trim_start_matches('/').to_string())
                        .unwrap_or_else(|| id.clone());
                    Some((id, name))
                })
                .collect(),
        )
    }

    async fn fetch_one(&self, id: &str, name: &str) -> Option<RawStatSnapshot> {
        let options = StatsOptions {
            stream: false,
            one_shot: true,
            ..Default::default()
        };
        let mut stream = self.docker.stats(id, Some(options));

        let response = match tokio::time::timeout(self.timeout, stream.next()).await {
            Ok(Some(Ok(s))) => s,
            Ok(Some(Err(e))) => {
                warn!(error = %e, container = %name, "container stats failed");
                return None;
            }
            Ok(None) => {
                warn!(container = %name, "container stats stream ended without data");
                return None;
            }
            Err(_) => {
                warn!(container = %name, "container stats timed out");
                return None;
            }
        };

        match stats::counters_from_response(&response) {
            Some(counters) => Some(RawStatSnapshot::counter_based(name, counters)),
            None => {
                warn!(container = %name, "container stats without cpu section; skipped");
                None
            }
        }
    }
}

impl StatsSource for DockerRepo {
    #[instrument(skip(self), fields(repo = "docker", operation = "poll"))]
    async fn poll(&self) -> Vec<RawStatSnapshot> {
        let Some(running) = self.list_running().await else {
            return Vec::new();
        };
        join_all(running.iter().map(|(id, name)| self.fetch_one(id, name)))
            .await
            .into_iter()
            .flatten()
            .collect()
    }
}
