//! Docker engine implementation backed by bollard.
//!
//! Unary control calls map directly onto the Docker API. The streaming
//! calls surface the wire shapes the trait promises: `logs` yields the
//! combined stream in the interleaved frame format (or raw bytes for TTY
//! containers), and `stats` yields one JSON snapshot per line.

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions, LogOutput,
    LogsOptions, StartContainerOptions, StatsOptions, StopContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, PortBinding, RestartPolicy, RestartPolicyNameEnum};
use bollard::Docker;
use bytes::Bytes;
use futures_util::StreamExt;
use tracing::debug;

use crate::stream::demux::{wire_encode, StreamFrame, StreamSource};
use crate::stream::{ByteStream, LogFeed};
use crate::{AppError, Result};

use super::{
    short_id, ContainerDetails, ContainerEngine, ContainerSummary, LogOptions, PortInfo,
};
use crate::runtime::spec::NormalizedSpec;

/// Engine backed by the local Docker daemon.
#[derive(Debug, Clone)]
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connect using the environment's defaults (socket path or host env).
    ///
    /// The connection is lazy; failures surface on the first call.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Upstream` when the client cannot be constructed.
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|err| AppError::Upstream(format!("docker client init failed: {err}")))?;
        Ok(Self { docker })
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn list(&self) -> Result<Vec<ContainerSummary>> {
        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions::<String> {
                all: true,
                ..Default::default()
            }))
            .await?;

        Ok(containers
            .into_iter()
            .map(|c| ContainerSummary {
                id: short_id(c.id.as_deref().unwrap_or_default()),
                name: c
                    .names
                    .as_ref()
                    .and_then(|names| names.first())
                    .map(|n| n.trim_start_matches('/').to_owned())
                    .unwrap_or_default(),
                image: c.image.unwrap_or_default(),
                status: c.status.unwrap_or_default(),
                state: c.state.unwrap_or_default(),
                created: c.created.unwrap_or_default(),
                ports: c
                    .ports
                    .unwrap_or_default()
                    .into_iter()
                    .map(|p| PortInfo {
                        private_port: u16::try_from(p.private_port).unwrap_or_default(),
                        public_port: p
                            .public_port
                            .and_then(|port| u16::try_from(port).ok()),
                    })
                    .collect(),
                labels: c.labels.unwrap_or_default(),
            })
            .collect())
    }

    async fn start(&self, id: &str) -> Result<()> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await?;
        Ok(())
    }

    async fn stop(&self, id: &str, timeout_seconds: i64) -> Result<()> {
        self.docker
            .stop_container(id, Some(StopContainerOptions { t: timeout_seconds }))
            .await?;
        Ok(())
    }

    async fn inspect(&self, id: &str) -> Result<ContainerDetails> {
        let inspect = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await?;

        let state = inspect.state.unwrap_or_default();
        Ok(ContainerDetails {
            id: short_id(inspect.id.as_deref().unwrap_or_default()),
            name: inspect
                .name
                .map(|n| n.trim_start_matches('/').to_owned())
                .unwrap_or_default(),
            image: inspect
                .config
                .as_ref()
                .and_then(|c| c.image.clone())
                .unwrap_or_default(),
            state: state.status.map(|s| s.to_string()).unwrap_or_default(),
            running: state.running.unwrap_or(false),
            tty: inspect
                .config
                .as_ref()
                .and_then(|c| c.tty)
                .unwrap_or(false),
            started_at: state.started_at,
        })
    }

    async fn image_present(&self, image: &str) -> Result<bool> {
        match self.docker.inspect_image(image).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn pull_image(&self, image: &str) -> Result<()> {
        let mut progress = self.docker.create_image(
            Some(CreateImageOptions::<String> {
                from_image: image.to_owned(),
                ..Default::default()
            }),
            None,
            None,
        );

        // Progress messages are drained, not surfaced; the pull is complete
        // when the stream ends.
        while let Some(item) = progress.next().await {
            item?;
        }
        debug!(image, "image pull stream drained");
        Ok(())
    }

    async fn create(&self, spec: &NormalizedSpec) -> Result<String> {
        let mut exposed_ports: HashMap<String, HashMap<(), ()>> = HashMap::new();
        let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
        for mapping in &spec.ports {
            let key = format!("{}/tcp", mapping.container);
            exposed_ports.insert(key.clone(), HashMap::new());
            port_bindings.insert(
                key,
                Some(vec![PortBinding {
                    host_ip: None,
                    host_port: Some(mapping.host.clone()),
                }]),
            );
        }

        let host_config = HostConfig {
            binds: (!spec.binds.is_empty()).then(|| spec.binds.clone()),
            port_bindings: (!port_bindings.is_empty()).then_some(port_bindings),
            nano_cpus: spec.nano_cpus,
            memory: spec.memory_bytes,
            restart_policy: spec.restart_policy.as_deref().map(|name| RestartPolicy {
                name: Some(restart_policy_name(name)),
                maximum_retry_count: None,
            }),
            network_mode: spec.network_mode.clone(),
            ..Default::default()
        };

        let config = Config {
            image: Some(spec.image.clone()),
            env: (!spec.env.is_empty()).then(|| spec.env.clone()),
            exposed_ports: (!exposed_ports.is_empty()).then_some(exposed_ports),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = spec.name.as_ref().map(|name| CreateContainerOptions {
            name: name.clone(),
            ..Default::default()
        });

        let response = self.docker.create_container(options, config).await?;
        Ok(response.id)
    }

    async fn logs(&self, id: &str, options: &LogOptions) -> Result<LogFeed> {
        // TTY containers deliver a raw merged stream; everything else uses
        // the interleaved frame format.
        let tty = self.inspect(id).await?.tty;

        let stream = self.docker.logs(
            id,
            Some(LogsOptions::<String> {
                stdout: options.stdout,
                stderr: options.stderr,
                follow: options.follow,
                tail: options.tail.clone(),
                ..Default::default()
            }),
        );

        let bytes: ByteStream = if tty {
            stream
                .map(|item| {
                    item.map(LogOutput::into_bytes)
                        .map_err(AppError::from)
                })
                .boxed()
        } else {
            stream
                .map(|item| {
                    item.map(|output| wire_encode(&to_frame(output)))
                        .map_err(AppError::from)
                })
                .boxed()
        };

        Ok(LogFeed { tty, bytes })
    }

    async fn stats(&self, id: &str) -> Result<ByteStream> {
        let stream = self.docker.stats(
            id,
            Some(StatsOptions {
                stream: true,
                one_shot: false,
            }),
        );

        Ok(stream
            .map(|item| {
                item.map(|stats| snapshot_line(&stats))
                    .map_err(AppError::from)
            })
            .boxed())
    }
}

/// Map a typed log chunk onto its wire-format frame.
fn to_frame(output: LogOutput) -> StreamFrame {
    match output {
        LogOutput::StdErr { message } => StreamFrame {
            source: StreamSource::Stderr,
            payload: message,
        },
        LogOutput::StdIn { message } => StreamFrame {
            source: StreamSource::Stdin,
            payload: message,
        },
        LogOutput::StdOut { message } | LogOutput::Console { message } => StreamFrame {
            source: StreamSource::Stdout,
            payload: message,
        },
    }
}

/// Serialize one stats snapshot as a single NDJSON line.
fn snapshot_line(stats: &bollard::container::Stats) -> Bytes {
    let line = serde_json::json!({
        "cpu_stats": {
            "cpu_usage": { "total_usage": stats.cpu_stats.cpu_usage.total_usage },
            "system_cpu_usage": stats.cpu_stats.system_cpu_usage,
            "online_cpus": stats.cpu_stats.online_cpus,
        },
        "precpu_stats": {
            "cpu_usage": { "total_usage": stats.precpu_stats.cpu_usage.total_usage },
            "system_cpu_usage": stats.precpu_stats.system_cpu_usage,
            "online_cpus": stats.precpu_stats.online_cpus,
        },
        "memory_stats": {
            "usage": stats.memory_stats.usage,
            "limit": stats.memory_stats.limit,
        },
    });
    let mut buf = line.to_string().into_bytes();
    buf.push(b'\n');
    Bytes::from(buf)
}

fn restart_policy_name(name: &str) -> RestartPolicyNameEnum {
    match name {
        "always" => RestartPolicyNameEnum::ALWAYS,
        "unless-stopped" => RestartPolicyNameEnum::UNLESS_STOPPED,
        "on-failure" => RestartPolicyNameEnum::ON_FAILURE,
        "no" => RestartPolicyNameEnum::NO,
        _ => RestartPolicyNameEnum::EMPTY,
    }
}
