use std::convert::Infallible;
use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::HandoffConfig;
use crate::error::{BootError, Result};
use crate::paths;

/// The downstream application that takes over this process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffTarget {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
}

impl HandoffTarget {
    pub fn from_config(cfg: &HandoffConfig, root: &Path) -> Self {
        Self {
            program: cfg.program.clone(),
            args: cfg.args.clone(),
            cwd: cfg
                .cwd
                .as_deref()
                .map(|p| paths::resolve(root, p))
                .unwrap_or_else(|| root.to_path_buf()),
            env: Vec::new(),
        }
    }

    /// Replace program and arguments, e.g. from a `-- <app> <args>` override.
    pub fn with_argv(mut self, argv: &[String]) -> Self {
        if let Some((program, args)) = argv.split_first() {
            self.program = program.clone();
            self.args = args.to_vec();
        }
        self
    }

    pub fn with_env(mut self, env: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env.extend(env);
        self
    }

    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).current_dir(&self.cwd);
        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        cmd
    }

    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Replace the current process image with `target`.
///
/// Only returns if the exec itself failed; on success the calling process
/// is gone and the application owns its PID, descriptors, and exit code.
#[cfg(unix)]
pub fn exec(target: &HandoffTarget) -> Result<Infallible> {
    use std::os::unix::process::CommandExt;

    tracing::info!(command = %target.display(), cwd = %target.cwd.display(), "handing off");
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();

    let err = target.command().exec();
    Err(BootError::Handoff(format!(
        "failed to exec '{}': {err}",
        program_name(&target.program)
    )))
}

/// Run `target` to completion and exit with its status.
///
/// Without `exec`, the bootstrap stays resident as a thin parent.
#[cfg(not(unix))]
pub fn exec(target: &HandoffTarget) -> Result<Infallible> {
    tracing::info!(command = %target.display(), cwd = %target.cwd.display(), "handing off");
    let _ = std::io::stdout().flush();

    let status = target.command().status().map_err(|e| {
        BootError::Handoff(format!(
            "failed to start '{}': {e}",
            program_name(&target.program)
        ))
    })?;
    std::process::exit(status.code().unwrap_or(1))
}

fn program_name(program: &str) -> &str {
    Path::new(program)
        .file_name()
        .and_then(OsStr::to_str)
        .unwrap_or(program)
}
