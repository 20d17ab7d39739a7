use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BootError {
    #[error("service failed to start: {url} did not respond after {attempts} attempts")]
    ServiceUnavailable { url: String, attempts: u32 },

    #[error("{} not found", .0.display())]
    ConfigurationMissing(PathBuf),

    #[error("{step} failed for model '{model}' (exit status {})", fmt_code(.code))]
    ProvisioningFailure {
        step: String,
        model: String,
        code: Option<i32>,
    },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid model name '{0}': must be lowercase alphanumeric with '-', '_', '.', or ':'")]
    InvalidModelName(String),

    #[error("executable not found on PATH: {0}")]
    BinaryNotFound(String),

    #[error("handoff failed: {0}")]
    Handoff(String),

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl BootError {
    /// Process exit code the CLI should use for this error.
    ///
    /// Provisioning failures propagate the underlying command's status;
    /// everything else exits `1`.
    pub fn exit_code(&self) -> i32 {
        match self {
            BootError::ProvisioningFailure {
                code: Some(code), ..
            } if *code != 0 => *code,
            _ => 1,
        }
    }
}

fn fmt_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => c.to_string(),
        None => "signal".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, BootError>;
