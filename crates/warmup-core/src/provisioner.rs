//! Model provisioning against a ready service.
//!
//! Every Modelfile is checked before the first side effect; a missing one
//! aborts with `ConfigurationMissing` and no `create` call is ever made.
//! `create` and the smoke test run once each, with no retry: a non-zero exit
//! becomes `ProvisioningFailure` carrying the command's own status.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Serialize;

use crate::config::{ModelSpec, ProvisionConfig};
use crate::error::{BootError, Result};
use crate::paths;

// ---------------------------------------------------------------------------
// ConfigArtifact / ModelHandle
// ---------------------------------------------------------------------------

/// A file that must already exist on disk. Never created here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigArtifact {
    path: PathBuf,
}

impl ConfigArtifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn verify(&self) -> Result<()> {
        if self.path.is_file() {
            Ok(())
        } else {
            Err(BootError::ConfigurationMissing(self.path.clone()))
        }
    }
}

/// A model registered against the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelHandle {
    pub name: String,
    pub modelfile: PathBuf,
    pub smoke_tested: bool,
}

/// A model ready to be provisioned: validated name plus resolved Modelfile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPlan {
    pub name: String,
    pub artifact: ConfigArtifact,
    pub smoke_prompt: Option<String>,
}

impl ModelPlan {
    pub fn from_spec(spec: &ModelSpec, root: &Path) -> Result<Self> {
        paths::validate_model_name(&spec.name)?;
        Ok(Self {
            name: spec.name.clone(),
            artifact: ConfigArtifact::new(paths::resolve(root, &spec.modelfile)),
            smoke_prompt: spec.smoke_prompt.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// ModelService
// ---------------------------------------------------------------------------

/// One-time setup operations issued against the running service.
pub trait ModelService {
    fn create(&mut self, name: &str, modelfile: &Path) -> Result<()>;
    fn smoke_test(&mut self, name: &str, prompt: &str) -> Result<()>;
}

/// Drives the service's own CLI (`ollama create` / `ollama run`).
#[derive(Debug, Clone)]
pub struct CliModelService {
    binary: String,
    cwd: PathBuf,
}

impl CliModelService {
    pub fn new(binary: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            cwd: cwd.into(),
        }
    }

    pub fn from_config(cfg: &ProvisionConfig, root: &Path) -> Self {
        Self::new(cfg.binary.clone(), root)
    }

    fn run(&self, step: &str, model: &str, args: &[&str]) -> Result<()> {
        tracing::info!(binary = %self.binary, ?args, "running {step}");
        let status = Command::new(&self.binary)
            .args(args)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::from(std::io::stderr()))
            .status()
            .map_err(|e| {
                tracing::error!(binary = %self.binary, error = %e, "failed to spawn {step}");
                BootError::ProvisioningFailure {
                    step: step.to_string(),
                    model: model.to_string(),
                    code: Some(127),
                }
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(BootError::ProvisioningFailure {
                step: step.to_string(),
                model: model.to_string(),
                code: status.code(),
            })
        }
    }
}

impl ModelService for CliModelService {
    fn create(&mut self, name: &str, modelfile: &Path) -> Result<()> {
        let modelfile = modelfile.to_string_lossy();
        self.run("create", name, &["create", name, "-f", &*modelfile])
    }

    fn smoke_test(&mut self, name: &str, prompt: &str) -> Result<()> {
        self.run("smoke test", name, &["run", name, prompt])
    }
}

// ---------------------------------------------------------------------------
// provision
// ---------------------------------------------------------------------------

/// Verify every artifact, then create and smoke-test each model in order.
pub fn provision<S>(plans: &[ModelPlan], service: &mut S) -> Result<Vec<ModelHandle>>
where
    S: ModelService + ?Sized,
{
    for plan in plans {
        if let Err(e) = plan.artifact.verify() {
            tracing::error!(
                model = %plan.name,
                path = %plan.artifact.path().display(),
                "modelfile not found"
            );
            return Err(e);
        }
    }

    let mut handles = Vec::with_capacity(plans.len());
    for plan in plans {
        service.create(&plan.name, plan.artifact.path())?;
        tracing::info!(model = %plan.name, "model created");

        let smoke_tested = match &plan.smoke_prompt {
            Some(prompt) => {
                service.smoke_test(&plan.name, prompt)?;
                tracing::info!(model = %plan.name, "smoke test passed");
                true
            }
            None => false,
        };

        handles.push(ModelHandle {
            name: plan.name.clone(),
            modelfile: plan.artifact.path().to_path_buf(),
            smoke_tested,
        });
    }
    Ok(handles)
}
