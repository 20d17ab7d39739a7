//! Background launch of the backing service.
//!
//! The service is started with its combined stdout/stderr appended to a log
//! file and control returns immediately. Nothing here waits for readiness and
//! nothing here ever stops the process: the returned [`ServiceHandle`] is
//! released at handoff so the downstream application can adopt it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};

use crate::config::{ProcessGroup, ServiceConfig};
use crate::error::{BootError, Result};
use crate::paths;

/// Everything needed to start the service process.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub cwd: PathBuf,
    pub log_path: PathBuf,
    pub process_group: ProcessGroup,
}

impl LaunchSpec {
    pub fn from_config(service: &ServiceConfig, root: &Path) -> Self {
        Self {
            program: service.command.clone(),
            args: service.args.clone(),
            env: service.env.clone(),
            cwd: root.to_path_buf(),
            log_path: paths::resolve(root, &service.log_file),
            process_group: service.process_group,
        }
    }

    /// The command line as a single display string.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// ---------------------------------------------------------------------------
// ServiceHandle
// ---------------------------------------------------------------------------

/// A running background service owned by the bootstrap until handoff.
///
/// Dropping the handle does not kill the process.
#[derive(Debug)]
pub struct ServiceHandle {
    pid: u32,
    log_path: PathBuf,
    child: Option<Child>,
}

impl ServiceHandle {
    pub fn new(child: Child, log_path: PathBuf) -> Self {
        Self {
            pid: child.id(),
            log_path,
            child: Some(child),
        }
    }

    /// A handle for a process this bootstrap did not spawn itself.
    pub fn adopted(pid: u32, log_path: PathBuf) -> Self {
        Self {
            pid,
            log_path,
            child: None,
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Non-blocking check for an early exit. `None` while still running
    /// or when the process was not spawned by us.
    pub fn try_exited(&mut self) -> Option<ExitStatus> {
        let child = self.child.as_mut()?;
        match child.try_wait() {
            Ok(status) => status,
            Err(e) => {
                tracing::debug!(pid = self.pid, error = %e, "could not check service status");
                None
            }
        }
    }

    /// Give up ownership: record the PID in `pid_file` and return the
    /// details the downstream application needs to adopt the service.
    pub fn release(mut self, pid_file: &Path) -> Result<ReleasedService> {
        crate::io::atomic_write(pid_file, format!("{}\n", self.pid).as_bytes())?;
        // Child has no Drop impl that kills; forgetting it only skips the reap.
        self.child.take();
        tracing::debug!(pid = self.pid, pid_file = %pid_file.display(), "released service handle");
        Ok(ReleasedService {
            pid: self.pid,
            log_path: self.log_path,
            pid_file: pid_file.to_path_buf(),
        })
    }
}

/// A service whose ownership has passed to whoever runs after handoff.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ReleasedService {
    pub pid: u32,
    pub log_path: PathBuf,
    pub pid_file: PathBuf,
}

impl ReleasedService {
    /// Environment exported across the handoff.
    pub fn env(&self) -> Vec<(String, String)> {
        vec![
            (paths::ENV_SERVICE_PID.to_string(), self.pid.to_string()),
            (
                paths::ENV_SERVICE_LOG.to_string(),
                self.log_path.display().to_string(),
            ),
        ]
    }
}

// ---------------------------------------------------------------------------
// Launcher
// ---------------------------------------------------------------------------

pub trait Launcher {
    fn launch(&mut self, spec: &LaunchSpec) -> Result<ServiceHandle>;
}

/// Spawns the service as a real OS process.
#[derive(Debug, Default)]
pub struct ProcessLauncher;

impl Launcher for ProcessLauncher {
    fn launch(&mut self, spec: &LaunchSpec) -> Result<ServiceHandle> {
        if !spec.program.contains(std::path::MAIN_SEPARATOR) {
            which::which(&spec.program)
                .map_err(|_| BootError::BinaryNotFound(spec.program.clone()))?;
        }

        let log = crate::io::open_append(&spec.log_path)?;
        let log_err = log.try_clone()?;

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(&spec.env)
            .current_dir(&spec.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err));

        #[cfg(unix)]
        if spec.process_group == ProcessGroup::Isolated {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let child = cmd.spawn()?;
        tracing::info!(
            pid = child.id(),
            command = %spec.display(),
            log = %spec.log_path.display(),
            "service launched in background"
        );
        Ok(ServiceHandle::new(child, spec.log_path.clone()))
    }
}
