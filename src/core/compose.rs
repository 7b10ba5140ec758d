//! Orchestration facade.
//!
//! The engine only ever talks to the container runtime through the
//! [`Orchestrator`] trait; [`ComposeRunner`] is the docker compose
//! implementation. Tests script an in-memory double instead.

use std::io::Write as _;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ComposeError, Result};

/// Captured output of a facade command.
///
/// A non-zero exit is reported here rather than as an `Err`, so callers
/// decide whether the failure is fatal for their step.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// A named-volume mount for an ephemeral helper container.
#[derive(Debug, Clone)]
pub struct Mount {
    pub volume: String,
    pub target: String,
    pub read_only: bool,
}

impl Mount {
    pub fn read_only(volume: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            volume: volume.into(),
            target: target.into(),
            read_only: true,
        }
    }

    pub fn read_write(volume: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            volume: volume.into(),
            target: target.into(),
            read_only: false,
        }
    }

    fn to_arg(&self) -> String {
        if self.read_only {
            format!("{}:{}:ro", self.volume, self.target)
        } else {
            format!("{}:{}", self.volume, self.target)
        }
    }
}

/// State of one orchestrated service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceState {
    pub name: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<String>,
}

/// Narrow command surface over the container runtime.
pub trait Orchestrator {
    /// Start services (all when empty) under the given profiles.
    fn start(&self, services: &[&str], profiles: &[&str]) -> Result<()>;

    /// Stop services under the given profiles (all when empty).
    fn stop(&self, profiles: &[&str]) -> Result<()>;

    /// Restart a single service.
    fn restart(&self, service: &str) -> Result<()>;

    /// Current state of all orchestrated services.
    fn status(&self) -> Result<Vec<ServiceState>>;

    /// Tail of a service's logs.
    fn logs(&self, service: &str, tail: Option<usize>) -> Result<String>;

    /// Run a command inside a running service container.
    fn exec(&self, service: &str, command: &[&str]) -> Result<CommandOutput>;

    /// Run a command inside a running service container, feeding `input`
    /// to its stdin.
    fn exec_with_input(&self, service: &str, command: &[&str], input: &str)
        -> Result<CommandOutput>;

    /// Run a one-shot helper container with the given volume mounts.
    fn run_ephemeral(&self, image: &str, mounts: &[Mount], command: &[&str])
        -> Result<CommandOutput>;
}

/// docker compose implementation of the facade.
pub struct ComposeRunner {
    project_root: PathBuf,
}

impl ComposeRunner {
    /// Create a runner for the given project root.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::BinaryNotFound`] when docker is not on PATH.
    pub fn new(project_root: impl Into<PathBuf>) -> Result<Self> {
        which::which("docker")
            .map_err(|_| ComposeError::BinaryNotFound("docker".to_string()))?;
        Ok(Self {
            project_root: project_root.into(),
        })
    }

    fn docker(&self, args: &[&str], input: Option<&str>) -> Result<CommandOutput> {
        debug!(args = ?args, "docker");
        let mut cmd = Command::new("docker");
        cmd.args(args)
            .current_dir(&self.project_root)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if input.is_some() {
            cmd.stdin(Stdio::piped());
        }

        let mut child = cmd.spawn().map_err(|e| ComposeError::CommandFailed {
            command: format!("docker {}", args.join(" ")),
            stderr: e.to_string(),
        })?;

        if let Some(input) = input {
            if let Some(mut stdin) = child.stdin.take() {
                let _ = stdin.write_all(input.as_bytes());
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| ComposeError::CommandFailed {
                command: format!("docker {}", args.join(" ")),
                stderr: e.to_string(),
            })?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    /// Run a compose subcommand, failing on non-zero exit.
    fn compose(&self, args: &[&str]) -> Result<CommandOutput> {
        let mut full = vec!["compose"];
        full.extend_from_slice(args);
        let out = self.docker(&full, None)?;
        if !out.success {
            return Err(ComposeError::CommandFailed {
                command: format!("docker compose {}", args.join(" ")),
                stderr: out.stderr,
            }
            .into());
        }
        Ok(out)
    }

    /// Pull the latest images for all services.
    pub fn pull(&self) -> Result<()> {
        self.compose(&["pull"])?;
        Ok(())
    }
}

impl Orchestrator for ComposeRunner {
    fn start(&self, services: &[&str], profiles: &[&str]) -> Result<()> {
        let mut args = Vec::new();
        for profile in profiles {
            args.push("--profile");
            args.push(profile);
        }
        args.extend_from_slice(&["up", "-d"]);
        args.extend_from_slice(services);
        self.compose(&args)?;
        Ok(())
    }

    fn stop(&self, profiles: &[&str]) -> Result<()> {
        let mut args = Vec::new();
        for profile in profiles {
            args.push("--profile");
            args.push(profile);
        }
        args.push("stop");
        self.compose(&args)?;
        Ok(())
    }

    fn restart(&self, service: &str) -> Result<()> {
        self.compose(&["restart", service])?;
        Ok(())
    }

    fn status(&self) -> Result<Vec<ServiceState>> {
        let out = self.compose(&["ps", "--all", "--format", "json"])?;

        // `compose ps` emits one JSON object per line
        let mut states = Vec::new();
        for line in out.stdout.lines().filter(|l| !l.trim().is_empty()) {
            let value: serde_json::Value = match serde_json::from_str(line) {
                Ok(v) => v,
                Err(_) => continue,
            };
            let name = value
                .get("Service")
                .or_else(|| value.get("Name"))
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string();
            let state = value
                .get("State")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string();
            let health = value
                .get("Health")
                .and_then(|v| v.as_str())
                .filter(|h| !h.is_empty())
                .map(|h| h.to_string());
            states.push(ServiceState {
                name,
                state,
                health,
            });
        }
        Ok(states)
    }

    fn logs(&self, service: &str, tail: Option<usize>) -> Result<String> {
        let tail_str;
        let mut args = vec!["logs"];
        if let Some(n) = tail {
            tail_str = n.to_string();
            args.push("--tail");
            args.push(&tail_str);
        }
        args.push(service);
        Ok(self.compose(&args)?.stdout)
    }

    fn exec(&self, service: &str, command: &[&str]) -> Result<CommandOutput> {
        let mut args = vec!["compose", "exec", "-T", service];
        args.extend_from_slice(command);
        self.docker(&args, None)
    }

    fn exec_with_input(
        &self,
        service: &str,
        command: &[&str],
        input: &str,
    ) -> Result<CommandOutput> {
        let mut args = vec!["compose", "exec", "-T", service];
        args.extend_from_slice(command);
        self.docker(&args, Some(input))
    }

    fn run_ephemeral(
        &self,
        image: &str,
        mounts: &[Mount],
        command: &[&str],
    ) -> Result<CommandOutput> {
        let mount_args: Vec<String> = mounts.iter().map(Mount::to_arg).collect();
        let mut args = vec!["run", "--rm"];
        for arg in &mount_args {
            args.push("-v");
            args.push(arg);
        }
        args.push(image);
        args.extend_from_slice(command);
        self.docker(&args, None)
    }
}

/// Poll a readiness probe until it succeeds or `timeout` elapses.
///
/// The probe is an `exec` into the service; the interval grows from 500ms
/// towards 5s. Replaces fixed-duration sleeps as a readiness check.
pub fn wait_for_service_ready(
    orchestrator: &dyn Orchestrator,
    service: &str,
    probe: &[&str],
    timeout: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    let mut interval = Duration::from_millis(500);

    loop {
        match orchestrator.exec(service, probe) {
            Ok(out) if out.success => return Ok(()),
            // Probe failures before the deadline just mean "not yet"
            _ => {}
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(ComposeError::ServiceNotReady {
                service: service.to_string(),
                waited_secs: timeout.as_secs(),
            }
            .into());
        }
        // Clamp the last sleep so the full budget is spent and a final
        // probe runs at the deadline
        std::thread::sleep(interval.min(deadline - now));
        interval = (interval * 3 / 2).min(Duration::from_secs(5));
    }
}
