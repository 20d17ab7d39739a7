use crate::error::{BootError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// File constants
// ---------------------------------------------------------------------------

pub const CONFIG_FILE: &str = "warmup.yaml";
pub const DEFAULT_MODELFILE: &str = "Modelfile";
pub const DEFAULT_LOG_FILE: &str = "ollama.log";
pub const DEFAULT_PID_FILE: &str = "ollama.pid";

// ---------------------------------------------------------------------------
// Environment passed across the handoff
// ---------------------------------------------------------------------------

pub const ENV_SERVICE_PID: &str = "WARMUP_SERVICE_PID";
pub const ENV_SERVICE_LOG: &str = "WARMUP_SERVICE_LOG";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Resolve a config-relative path against the project root.
/// Absolute paths are returned unchanged.
pub fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

// ---------------------------------------------------------------------------
// Model name validation
// ---------------------------------------------------------------------------

static MODEL_RE: OnceLock<Regex> = OnceLock::new();

fn model_re() -> &'static Regex {
    MODEL_RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9][a-z0-9._\-]*(:[a-z0-9][a-z0-9._\-]*)?$")
            .expect("model name regex is valid")
    })
}

/// Ollama model names: lowercase, optionally tagged (`name:tag`).
pub fn validate_model_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 128 || !model_re().is_match(name) {
        return Err(BootError::InvalidModelName(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_model_names() {
        for name in ["jp-gemma3", "llama3:8b", "a", "qwen2.5_coder:latest"] {
            validate_model_name(name).unwrap_or_else(|_| panic!("expected valid: {name}"));
        }
    }

    #[test]
    fn invalid_model_names() {
        for name in ["", "-dash", "Upper", "has space", "a:b:c", "tag:"] {
            assert!(
                validate_model_name(name).is_err(),
                "expected invalid: {name}"
            );
        }
    }

    #[test]
    fn resolve_keeps_absolute_paths() {
        let root = Path::new("/srv/app");
        assert_eq!(
            resolve(root, Path::new("/etc/Modelfile")),
            PathBuf::from("/etc/Modelfile")
        );
        assert_eq!(
            resolve(root, Path::new("Modelfile")),
            PathBuf::from("/srv/app/Modelfile")
        );
    }
}
