use crate::error::{BootError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

impl ConfigWarning {
    fn warning(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Warning,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Error,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// ProcessGroup
// ---------------------------------------------------------------------------

/// Which process group the background service runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessGroup {
    /// Stay in the bootstrap's group: a terminal Ctrl-C reaches the
    /// service and the application that replaced us.
    #[default]
    Shared,
    /// Own group: the service outlives an interrupt of the foreground job.
    Isolated,
}

// ---------------------------------------------------------------------------
// ServiceConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_command")]
    pub command: String,
    #[serde(default = "default_service_args")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_health_path")]
    pub health_path: String,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,
    #[serde(default)]
    pub process_group: ProcessGroup,
}

fn default_service_command() -> String {
    "ollama".to_string()
}

fn default_service_args() -> Vec<String> {
    vec!["serve".to_string()]
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    11434
}

fn default_health_path() -> String {
    "/".to_string()
}

fn default_probe_timeout() -> u64 {
    2
}

fn default_log_file() -> PathBuf {
    PathBuf::from(paths::DEFAULT_LOG_FILE)
}

fn default_pid_file() -> PathBuf {
    PathBuf::from(paths::DEFAULT_PID_FILE)
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            command: default_service_command(),
            args: default_service_args(),
            env: BTreeMap::new(),
            host: default_host(),
            port: default_port(),
            health_path: default_health_path(),
            probe_timeout_secs: default_probe_timeout(),
            log_file: default_log_file(),
            pid_file: default_pid_file(),
            process_group: ProcessGroup::default(),
        }
    }
}

impl ServiceConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn health_url(&self) -> String {
        if self.health_path.starts_with('/') {
            format!("{}{}", self.base_url(), self.health_path)
        } else {
            format!("{}/{}", self.base_url(), self.health_path)
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// ReadinessConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessConfig {
    /// Total probe attempts before giving up.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_max_retries() -> u32 {
    20
}

fn default_interval_ms() -> u64 {
    1000
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            interval_ms: default_interval_ms(),
        }
    }
}

impl ReadinessConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

// ---------------------------------------------------------------------------
// ProvisionConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelSpec {
    pub name: String,
    #[serde(default = "default_modelfile")]
    pub modelfile: PathBuf,
    /// Prompt for the post-create smoke run. `null` skips the smoke test.
    #[serde(default = "default_smoke_prompt")]
    pub smoke_prompt: Option<String>,
}

fn default_modelfile() -> PathBuf {
    PathBuf::from(paths::DEFAULT_MODELFILE)
}

fn default_smoke_prompt() -> Option<String> {
    Some("hello".to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionConfig {
    /// CLI used for `create` and `run`.
    #[serde(default = "default_service_command")]
    pub binary: String,
    #[serde(default = "default_models")]
    pub models: Vec<ModelSpec>,
}

fn default_models() -> Vec<ModelSpec> {
    vec![ModelSpec {
        name: "jp-gemma3".to_string(),
        modelfile: default_modelfile(),
        smoke_prompt: default_smoke_prompt(),
    }]
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            binary: default_service_command(),
            models: default_models(),
        }
    }
}

// ---------------------------------------------------------------------------
// HandoffConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffConfig {
    #[serde(default = "default_handoff_program")]
    pub program: String,
    #[serde(default = "default_handoff_args")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
}

fn default_handoff_program() -> String {
    "python".to_string()
}

fn default_handoff_args() -> Vec<String> {
    vec!["main.py".to_string()]
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            program: default_handoff_program(),
            args: default_handoff_args(),
            cwd: None,
        }
    }
}

// ---------------------------------------------------------------------------
// BootConfig (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub readiness: ReadinessConfig,
    #[serde(default)]
    pub provision: ProvisionConfig,
    #[serde(default)]
    pub handoff: HandoffConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            service: ServiceConfig::default(),
            readiness: ReadinessConfig::default(),
            provision: ProvisionConfig::default(),
            handoff: HandoffConfig::default(),
        }
    }
}

impl BootConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: BootConfig = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Load `path` if it exists, otherwise fall back to the built-in defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.service.command.trim().is_empty() {
            warnings.push(ConfigWarning::error("service.command is empty"));
        }
        if self.service.port == 0 {
            warnings.push(ConfigWarning::error(
                "service.port must be between 1 and 65535",
            ));
        }
        if self.service.probe_timeout_secs == 0 {
            warnings.push(ConfigWarning::error(
                "service.probe_timeout_secs must be positive",
            ));
        }

        if self.readiness.max_retries == 0 {
            warnings.push(ConfigWarning::error(
                "readiness.max_retries must be at least 1",
            ));
        }
        if self.readiness.interval_ms == 0 {
            warnings.push(ConfigWarning::warning(
                "readiness.interval_ms is 0; the service will be probed in a tight loop",
            ));
        }

        if self.provision.binary.trim().is_empty() {
            warnings.push(ConfigWarning::error("provision.binary is empty"));
        }
        if self.provision.models.is_empty() {
            warnings.push(ConfigWarning::warning(
                "provision.models is empty; no model will be created",
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for model in &self.provision.models {
            if paths::validate_model_name(&model.name).is_err() {
                warnings.push(ConfigWarning::error(format!(
                    "invalid model name '{}'",
                    model.name
                )));
            }
            if !seen.insert(model.name.as_str()) {
                warnings.push(ConfigWarning::error(format!(
                    "model '{}' is listed more than once",
                    model.name
                )));
            }
            if let Some(prompt) = &model.smoke_prompt {
                if prompt.trim().is_empty() {
                    warnings.push(ConfigWarning::warning(format!(
                        "model '{}' has an empty smoke_prompt",
                        model.name
                    )));
                }
            }
        }

        if self.handoff.program.trim().is_empty() {
            warnings.push(ConfigWarning::error("handoff.program is empty"));
        }

        warnings
    }

    /// Fail with `InvalidConfig` if validation reports any errors.
    pub fn ensure_valid(&self) -> Result<()> {
        let errors: Vec<String> = self
            .validate()
            .into_iter()
            .filter(|w| w.level == WarnLevel::Error)
            .map(|w| w.message)
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(BootError::InvalidConfig(errors.join("; ")))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_setup_script() {
        let cfg = BootConfig::default();
        assert_eq!(cfg.service.health_url(), "http://localhost:11434/");
        assert_eq!(cfg.service.command, "ollama");
        assert_eq!(cfg.service.args, vec!["serve"]);
        assert_eq!(cfg.service.log_file, PathBuf::from("ollama.log"));
        assert_eq!(cfg.readiness.max_retries, 20);
        assert_eq!(cfg.readiness.interval(), Duration::from_secs(1));
        assert_eq!(cfg.provision.models.len(), 1);
        assert_eq!(cfg.provision.models[0].modelfile, PathBuf::from("Modelfile"));
        assert_eq!(cfg.handoff.program, "python");
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn empty_yaml_uses_defaults() {
        let cfg: BootConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg.version, 1);
        assert_eq!(cfg.service.port, 11434);
        assert_eq!(cfg.service.process_group, ProcessGroup::Shared);
    }

    #[test]
    fn partial_yaml_overrides() {
        let yaml = r#"
service:
  port: 8080
  health_path: api/tags
  process_group: isolated
readiness:
  max_retries: 5
  interval_ms: 250
provision:
  models:
    - name: llama3:8b
      modelfile: models/Llama
      smoke_prompt: null
handoff:
  program: ./ui-service
  args: []
"#;
        let cfg: BootConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.service.health_url(), "http://localhost:8080/api/tags");
        assert_eq!(cfg.service.process_group, ProcessGroup::Isolated);
        assert_eq!(cfg.readiness.max_retries, 5);
        assert_eq!(cfg.readiness.interval(), Duration::from_millis(250));
        assert_eq!(cfg.provision.binary, "ollama");
        assert_eq!(cfg.provision.models[0].smoke_prompt, None);
        assert!(cfg.handoff.args.is_empty());
    }

    #[test]
    fn model_spec_rejects_unknown_fields() {
        let yaml = "name: jp-gemma3\nmodel_file: Modelfile\n";
        assert!(serde_yaml::from_str::<ModelSpec>(yaml).is_err());
    }

    #[test]
    fn validate_flags_zero_budget_and_bad_names() {
        let mut cfg = BootConfig::default();
        cfg.readiness.max_retries = 0;
        cfg.provision.models.push(ModelSpec {
            name: "Bad Name".into(),
            modelfile: PathBuf::from("Modelfile"),
            smoke_prompt: None,
        });
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("max_retries")));
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("Bad Name")));
        assert!(matches!(
            cfg.ensure_valid(),
            Err(BootError::InvalidConfig(_))
        ));
    }

    #[test]
    fn validate_flags_duplicate_models() {
        let mut cfg = BootConfig::default();
        let dup = cfg.provision.models[0].clone();
        cfg.provision.models.push(dup);
        assert!(cfg
            .validate()
            .iter()
            .any(|w| w.message.contains("more than once")));
    }

    #[test]
    fn zero_interval_is_only_a_warning() {
        let mut cfg = BootConfig::default();
        cfg.readiness.interval_ms = 0;
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].level, WarnLevel::Warning);
        assert!(cfg.ensure_valid().is_ok());
    }

    #[test]
    fn load_or_default_without_file() {
        let dir = TempDir::new().unwrap();
        let cfg = BootConfig::load_or_default(&dir.path().join("warmup.yaml")).unwrap();
        assert_eq!(cfg.service.port, 11434);
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("warmup.yaml");
        let mut cfg = BootConfig::default();
        cfg.service.port = 12000;
        cfg.save(&path).unwrap();
        let loaded = BootConfig::load(&path).unwrap();
        assert_eq!(loaded.service.port, 12000);
        assert_eq!(loaded.provision.models, cfg.provision.models);
    }

    #[test]
    fn load_reports_yaml_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("warmup.yaml");
        std::fs::write(&path, "service: [not, a, map]\n").unwrap();
        assert!(matches!(BootConfig::load(&path), Err(BootError::Yaml(_))));
    }
}
