/// Docker-based execution backend
///
/// **Docker Execution Rules:**
/// 1. Pulls the harness image if not present
/// 2. Creates one container per test case with:
///    - Network disabled
///    - CPU/memory limits enforced
/// 3. Injects the function (base64) and the test input through the environment
/// 4. Captures stdout/stderr streams
/// 5. Classifies non-zero exits (OOM kill, segfault) as execution failures
/// 6. Removes the container on every exit path via `ContainerGuard`
///
/// Timeouts are enforced by the case runner: dropping the execution future
/// drops the guard, which force-removes the container.

use crate::backend::{
    check_limits, describe_exit, split_harness_output, BackendError, ExecutionBackend,
    ExecutionOutcome,
};
use crate::config::BackendConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use bollard::container::{
    Config, CreateContainerOptions, LogOutput, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::Docker;
use futures_util::stream::StreamExt;
use judge_common::types::FunctionSchema;
use tracing::{debug, info, warn};

/// Container cleanup guard - guarantees container removal on drop
struct ContainerGuard<'a> {
    docker: &'a Docker,
    container_id: String,
}

impl<'a> ContainerGuard<'a> {
    fn new(docker: &'a Docker, container_id: String) -> Self {
        Self { docker, container_id }
    }
}

impl<'a> Drop for ContainerGuard<'a> {
    fn drop(&mut self) {
        // Drop cannot be async, hand the removal to the runtime
        let container_id = self.container_id.clone();
        let docker = self.docker.clone();

        tokio::spawn(async move {
            let remove_options = RemoveContainerOptions {
                force: true,
                ..Default::default()
            };

            if let Err(e) = docker.remove_container(&container_id, Some(remove_options)).await {
                warn!(container_id = %container_id, error = %e, "Failed to clean up container");
            }
        });
    }
}

pub struct DockerBackend {
    name: String,
    docker: Docker,
    image: String,
    command: Vec<String>,
    memory_limit_bytes: i64,
    nano_cpus: i64,
}

impl DockerBackend {
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .context("Failed to connect to Docker daemon")?;

        let image = config
            .image
            .clone()
            .with_context(|| format!("Docker backend '{}' has no image", config.name))?;

        let mut command = vec![config.command.clone()];
        command.extend(config.args.iter().cloned());

        Ok(Self {
            name: config.name.clone(),
            docker,
            image,
            command,
            memory_limit_bytes: (config.memory_limit_mb as i64) * 1024 * 1024,
            nano_cpus: (config.cpu_limit as f64 * 1_000_000_000.0) as i64,
        })
    }

    /// Ensure the harness image is available (pull if needed)
    async fn ensure_image(&self) -> Result<(), BackendError> {
        if self.docker.inspect_image(&self.image).await.is_ok() {
            debug!(image = %self.image, "Image cache hit");
            return Ok(());
        }

        warn!(image = %self.image, "Image cache miss, pulling");

        let options = Some(CreateImageOptions {
            from_image: self.image.as_str(),
            ..Default::default()
        });

        let mut stream = self.docker.create_image(options, None, None);
        while let Some(result) = stream.next().await {
            result?;
        }

        info!(image = %self.image, "Image pulled");
        Ok(())
    }

    /// Follow the container logs to completion, then read the exit code
    async fn collect(
        &self,
        container_id: &str,
    ) -> Result<(String, String, Option<i64>), BackendError> {
        let mut stdout = String::new();
        let mut stderr = String::new();

        let logs_options = Some(LogsOptions::<String> {
            stdout: true,
            stderr: true,
            follow: true,
            ..Default::default()
        });

        let mut logs_stream = self.docker.logs(container_id, logs_options);
        while let Some(output) = logs_stream.next().await {
            match output? {
                LogOutput::StdOut { message } => {
                    stdout.push_str(&String::from_utf8_lossy(&message))
                }
                LogOutput::StdErr { message } => {
                    stderr.push_str(&String::from_utf8_lossy(&message))
                }
                _ => {}
            }
        }

        let wait_options = Some(WaitContainerOptions {
            condition: "not-running",
        });

        let mut wait_stream = self.docker.wait_container(container_id, wait_options);
        let exit_code = match wait_stream.next().await {
            Some(Ok(response)) => Some(response.status_code),
            // Non-zero exits surface as a wait error carrying the code
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Some(code),
            Some(Err(e)) => return Err(e.into()),
            None => None,
        };

        Ok((stdout, stderr, exit_code))
    }
}

#[async_trait]
impl ExecutionBackend for DockerBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        schema: &FunctionSchema,
        input: &str,
    ) -> Result<ExecutionOutcome, BackendError> {
        check_limits(schema, input)?;
        self.ensure_image().await?;

        let container_name = format!("judge-{}", uuid::Uuid::new_v4());

        let env = vec![
            format!("FUNCTION_NAME={}", schema.name),
            format!("FUNCTION_BODY={}", general_purpose::STANDARD.encode(&schema.body)),
            format!("ARG_SIGNATURE={}", schema.arg_signature.join(",")),
            format!("TEST_INPUT={}", general_purpose::STANDARD.encode(input)),
        ];

        let config = Config {
            image: Some(self.image.clone()),
            cmd: Some(self.command.clone()),
            env: Some(env),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            network_disabled: Some(true),
            host_config: Some(bollard::models::HostConfig {
                memory: Some(self.memory_limit_bytes),
                nano_cpus: Some(self.nano_cpus),
                ..Default::default()
            }),
            ..Default::default()
        };

        let create_options = CreateContainerOptions {
            name: container_name.as_str(),
            platform: None,
        };

        let container = self.docker.create_container(Some(create_options), config).await?;
        let container_id = container.id.clone();

        // Cleanup is guaranteed from here on, including when this future is dropped
        let _guard = ContainerGuard::new(&self.docker, container_id.clone());

        self.docker
            .start_container(&container_id, None::<StartContainerOptions<String>>)
            .await?;

        let (stdout, stderr, exit_code) = self.collect(&container_id).await?;

        match exit_code {
            Some(0) => {
                let (output, console_output) = split_harness_output(&stdout, &stderr);
                Ok(ExecutionOutcome::Completed {
                    output,
                    console_output,
                    memory_mb: None,
                })
            }
            Some(code) => {
                debug!(
                    container_id = %container_id,
                    exit_code = code,
                    "Container exited with failure"
                );
                Ok(ExecutionOutcome::Failed {
                    error_text: describe_exit(code, &stderr),
                    memory_mb: None,
                })
            }
            None => Err(BackendError::Unavailable(format!(
                "no exit code reported for container {}",
                container_id
            ))),
        }
    }
}
