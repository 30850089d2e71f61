use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, trace};
use tokio::process::Command;
use tokio::time::timeout;

use super::docker_output::{
    command_failure, parse_container_list, parse_environment, parse_start_time, parse_stats,
};
use crate::managers::runtime::{
    ContainerInfo, ContainerRuntime, LogTail, NetworkStats, RunSpec, RuntimeError,
};

const CONNECTION_CHECK_TIMEOUT: Duration = Duration::from_secs(5);
const PULL_TIMEOUT: Duration = Duration::from_secs(900);
const RESTART_POLICY: &str = "always";

struct Output {
    stdout: String,
    stderr: String,
}

/// [`ContainerRuntime`] driving the docker command line client.
pub struct DockerCli {
    binary: PathBuf,
    host: Option<String>,
    command_timeout: Duration,
}

impl DockerCli {
    pub fn new(binary: PathBuf, host: Option<String>, command_timeout: Duration) -> Self {
        Self {
            binary,
            host,
            command_timeout,
        }
    }

    pub fn run_args(spec: &RunSpec) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "run".into(),
            "-d".into(),
            "--name".into(),
            spec.name.clone(),
            "--restart".into(),
            RESTART_POLICY.into(),
        ];
        if let Some(network) = &spec.network {
            args.extend(["--network".into(), network.clone()]);
        }
        for variable in &spec.env {
            args.extend(["-e".into(), variable.clone()]);
        }
        for volume in &spec.volumes {
            args.extend(["-v".into(), volume.clone()]);
        }
        for port in &spec.ports {
            args.extend(["-p".into(), port.to_string()]);
        }
        for capability in &spec.capabilities {
            args.extend(["--cap-add".into(), capability.clone()]);
        }
        if spec.privileged {
            args.push("--privileged".into());
        }
        for server in &spec.dns {
            args.extend(["--dns".into(), server.clone()]);
        }
        if let Some(limits) = &spec.resource_limits {
            args.extend([
                "--cpus".into(),
                limits.cpus.clone(),
                "--memory-reservation".into(),
                limits.memory_reservation.clone(),
                "--memory".into(),
                limits.memory_limit.clone(),
            ]);
        }
        args.push(spec.image.clone());
        args.extend(spec.command.iter().cloned());
        args
    }

    fn command(&self, args: &[String]) -> Command {
        let mut command = Command::new(&self.binary);
        if let Some(host) = &self.host {
            command.arg("--host").arg(host);
        }
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    /// `target` names the container the call is about so that a missing one maps
    /// onto `NotFound`.
    async fn execute_with(
        &self,
        args: &[String],
        target: Option<&str>,
        limit: Duration,
    ) -> Result<Output, RuntimeError> {
        trace!("Executing {:?} {:?}", self.binary, args);
        let output = timeout(limit, self.command(args).output())
            .await
            .map_err(|_| {
                RuntimeError::Timeout(limit.as_millis().try_into().unwrap_or(u64::MAX))
            })?
            .map_err(|err| RuntimeError::SpawnFail(err.to_string()))?;
        let result = Output {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        if !output.status.success() {
            debug!("{:?} failed with {}: {}", args, output.status, result.stderr.trim());
            return Err(command_failure(target, &result.stderr));
        }
        Ok(result)
    }

    async fn execute(&self, args: &[String], target: Option<&str>) -> Result<String, RuntimeError> {
        self.execute_with(args, target, self.command_timeout)
            .await
            .map(|output| output.stdout)
    }

    async fn on_container(&self, verb: &str, name: &str) -> Result<(), RuntimeError> {
        self.execute(&[verb.to_string(), name.to_string()], Some(name))
            .await
            .map(|_| ())
    }
}

fn args<const N: usize>(values: [&str; N]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn test_connection(&self) -> Result<(), RuntimeError> {
        self.execute_with(
            &args(["version", "--format", "{{.Server.Version}}"]),
            None,
            CONNECTION_CHECK_TIMEOUT,
        )
        .await
        .map(|_| ())
    }

    async fn pull(&self, image: &str) -> Result<(), RuntimeError> {
        self.execute_with(&args(["pull", image]), None, PULL_TIMEOUT)
            .await
            .map(|_| ())
    }

    async fn run(&self, spec: &RunSpec) -> Result<String, RuntimeError> {
        let id = self.execute(&Self::run_args(spec), None).await?;
        let id = id.trim();
        if id.is_empty() {
            return Err(RuntimeError::InvalidOutput(format!(
                "No container id printed for {}",
                spec.name
            )));
        }
        Ok(id.to_string())
    }

    async fn start(&self, name: &str) -> Result<(), RuntimeError> {
        self.on_container("start", name).await
    }

    async fn stop(&self, name: &str) -> Result<(), RuntimeError> {
        self.on_container("stop", name).await
    }

    async fn restart(&self, name: &str) -> Result<(), RuntimeError> {
        self.on_container("restart", name).await
    }

    async fn remove(&self, name: &str) -> Result<(), RuntimeError> {
        self.execute(&args(["rm", "-f", name]), Some(name))
            .await
            .map(|_| ())
    }

    async fn list(&self) -> Result<Vec<ContainerInfo>, RuntimeError> {
        let output = self
            .execute(&args(["ps", "-a", "--no-trunc", "--format", "{{json .}}"]), None)
            .await?;
        parse_container_list(&output)
    }

    /// Containers log to both streams, so both are returned.
    async fn logs(&self, name: &str, tail: LogTail) -> Result<String, RuntimeError> {
        let tail = match tail {
            LogTail::Lines(lines) => lines.to_string(),
            LogTail::All => String::from("all"),
        };
        let output = self
            .execute_with(
                &args(["logs", "--tail", tail.as_str(), name]),
                Some(name),
                self.command_timeout,
            )
            .await?;
        Ok(output.stdout + &output.stderr)
    }

    async fn inspect_env(&self, name: &str) -> Result<BTreeMap<String, String>, RuntimeError> {
        let output = self
            .execute(
                &args(["inspect", "--format", "{{json .Config.Env}}", name]),
                Some(name),
            )
            .await?;
        parse_environment(&output)
    }

    async fn network_create(&self, name: &str) -> Result<(), RuntimeError> {
        match self.execute(&args(["network", "create", name]), None).await {
            Err(RuntimeError::CommandFail(message)) if message.contains("already exists") => {
                debug!("Network {name} already exists.");
                Ok(())
            }
            result => result.map(|_| ()),
        }
    }

    async fn network_remove(&self, name: &str) -> Result<(), RuntimeError> {
        match self.execute(&args(["network", "rm", name]), None).await {
            Err(RuntimeError::CommandFail(message)) if message.contains("not found") => {
                debug!("Network {name} is already gone.");
                Ok(())
            }
            result => result.map(|_| ()),
        }
    }

    async fn network_stats(
        &self,
        names: &[String],
    ) -> Result<BTreeMap<String, NetworkStats>, RuntimeError> {
        if names.is_empty() {
            return Ok(BTreeMap::new());
        }
        let mut arguments = args(["stats", "--no-stream", "--format", "{{json .}}"]);
        arguments.extend(names.iter().cloned());
        let output = self.execute(&arguments, None).await?;
        parse_stats(&output)
    }

    async fn start_time(&self, name: &str) -> Result<Option<DateTime<Utc>>, RuntimeError> {
        let output = self
            .execute(
                &args(["inspect", "--format", "{{.State.StartedAt}}", name]),
                Some(name),
            )
            .await?;
        parse_start_time(&output)
    }
}
