//! The bootstrap sequence: launch → poll → provision → handoff.
//!
//! Each stage runs only after the previous one succeeded and every failure
//! ends the sequence. The launched service is never stopped here, including
//! when a later stage fails.

use std::convert::Infallible;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::BootConfig;
use crate::error::Result;
use crate::handoff::{self, HandoffTarget};
use crate::launcher::{LaunchSpec, Launcher, ProcessLauncher, ReleasedService, ServiceHandle};
use crate::paths;
use crate::poller::{self, PollReport, RetryBudget, Sleeper, ThreadSleeper};
use crate::probe::{HttpProbe, Probe};
use crate::provisioner::{self, CliModelService, ModelHandle, ModelPlan, ModelService};

/// What the sequence did, in order. Serialized for `--json` output.
#[derive(Debug, Clone, Serialize)]
pub struct BootReport {
    pub started_at: DateTime<Utc>,
    pub ready_at: DateTime<Utc>,
    pub health_url: String,
    pub service: Option<ReleasedService>,
    pub poll: PollReport,
    pub models: Vec<ModelHandle>,
    pub handoff: String,
}

/// Stages 1–3 completed; only the handoff remains.
#[derive(Debug)]
pub struct Prepared {
    pub report: BootReport,
    pub target: HandoffTarget,
}

impl Prepared {
    /// Replace this process with the downstream application.
    pub fn hand_off(self) -> Result<Infallible> {
        handoff::exec(&self.target)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SequenceOptions {
    pub skip_provision: bool,
    /// Overrides `handoff.program` / `handoff.args` when non-empty.
    pub handoff_argv: Vec<String>,
}

pub struct Sequencer<'a> {
    config: &'a BootConfig,
    root: PathBuf,
    options: SequenceOptions,
}

impl<'a> Sequencer<'a> {
    pub fn new(config: &'a BootConfig, root: &Path, options: SequenceOptions) -> Self {
        Self {
            config,
            root: root.to_path_buf(),
            options,
        }
    }

    /// Run launch, poll, and provision with the real process and HTTP stages.
    pub fn prepare_default(&self) -> Result<Prepared> {
        let mut probe =
            HttpProbe::new(self.config.service.health_url(), self.config.service.probe_timeout())?;
        let mut models = CliModelService::from_config(&self.config.provision, &self.root);
        self.prepare(
            &mut ProcessLauncher,
            &mut probe,
            &mut ThreadSleeper,
            &mut models,
        )
    }

    pub fn prepare<L, P, S, M>(
        &self,
        launcher: &mut L,
        probe: &mut P,
        sleeper: &mut S,
        models: &mut M,
    ) -> Result<Prepared>
    where
        L: Launcher + ?Sized,
        P: Probe + ?Sized,
        S: Sleeper + ?Sized,
        M: ModelService + ?Sized,
    {
        let cfg = self.config;
        cfg.ensure_valid()?;
        let plans = if self.options.skip_provision {
            Vec::new()
        } else {
            cfg.provision
                .models
                .iter()
                .map(|m| ModelPlan::from_spec(m, &self.root))
                .collect::<Result<Vec<_>>>()?
        };

        let started_at = Utc::now();

        // 1. Launch. A failed spawn is not fatal on its own: the poller
        //    decides, and an already-running service is accepted.
        let spec = LaunchSpec::from_config(&cfg.service, &self.root);
        let mut service = match launcher.launch(&spec) {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!(command = %spec.display(), error = %e, "could not launch service");
                None
            }
        };

        // 2. Poll.
        let budget = RetryBudget::new(cfg.readiness.max_retries, cfg.readiness.interval());
        let poll = match poller::poll_until_ready(probe, budget, sleeper) {
            Ok(report) => report,
            Err(e) => {
                report_unready_service(service.as_mut());
                return Err(e);
            }
        };
        let ready_at = Utc::now();

        // 3. Provision.
        let provisioned = if plans.is_empty() {
            tracing::info!("skipping model provisioning");
            Vec::new()
        } else {
            provisioner::provision(&plans, models).inspect_err(|_| {
                if let Some(handle) = &service {
                    tracing::warn!(pid = handle.pid(), "provisioning failed; service left running");
                }
            })?
        };

        // 4. Release the service to whoever runs after us.
        let released = match service {
            Some(handle) => {
                let pid_file = paths::resolve(&self.root, &cfg.service.pid_file);
                Some(handle.release(&pid_file)?)
            }
            None => None,
        };

        let target = HandoffTarget::from_config(&cfg.handoff, &self.root)
            .with_argv(&self.options.handoff_argv)
            .with_env(released.iter().flat_map(ReleasedService::env));

        let report = BootReport {
            started_at,
            ready_at,
            health_url: probe.target().to_string(),
            service: released,
            poll,
            models: provisioned,
            handoff: target.display(),
        };
        Ok(Prepared { report, target })
    }
}

fn report_unready_service(service: Option<&mut ServiceHandle>) {
    let Some(handle) = service else {
        return;
    };
    match handle.try_exited() {
        Some(status) => tracing::error!(
            pid = handle.pid(),
            %status,
            log = %handle.log_path().display(),
            "service exited before becoming ready"
        ),
        None => tracing::warn!(
            pid = handle.pid(),
            log = %handle.log_path().display(),
            "service never became ready; left running"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelSpec;
    use crate::error::BootError;
    use crate::probe::ProbeOutcome;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;
    use tempfile::TempDir;

    type Journal = Rc<RefCell<Vec<String>>>;

    struct FakeLauncher {
        journal: Journal,
        fail: bool,
    }

    impl Launcher for FakeLauncher {
        fn launch(&mut self, spec: &LaunchSpec) -> Result<ServiceHandle> {
            self.journal.borrow_mut().push(format!("launch {}", spec.display()));
            if self.fail {
                return Err(BootError::BinaryNotFound(spec.program.clone()));
            }
            Ok(ServiceHandle::adopted(777, spec.log_path.clone()))
        }
    }

    struct FakeProbe {
        journal: Journal,
        ready_on: Option<u32>,
        calls: u32,
    }

    impl Probe for FakeProbe {
        fn target(&self) -> &str {
            "http://localhost:11434/"
        }

        fn probe(&mut self) -> ProbeOutcome {
            self.calls += 1;
            self.journal.borrow_mut().push("probe".into());
            match self.ready_on {
                Some(n) if self.calls >= n => ProbeOutcome::Ready { status: 200 },
                _ => ProbeOutcome::Unreachable {
                    reason: "connection refused".into(),
                },
            }
        }
    }

    struct FakeSleeper {
        journal: Journal,
    }

    impl Sleeper for FakeSleeper {
        fn sleep(&mut self, _interval: Duration) {
            self.journal.borrow_mut().push("sleep".into());
        }
    }

    struct FakeModels {
        journal: Journal,
    }

    impl ModelService for FakeModels {
        fn create(&mut self, name: &str, _modelfile: &Path) -> Result<()> {
            self.journal.borrow_mut().push(format!("create {name}"));
            Ok(())
        }

        fn smoke_test(&mut self, name: &str, _prompt: &str) -> Result<()> {
            self.journal.borrow_mut().push(format!("run {name}"));
            Ok(())
        }
    }

    struct Harness {
        journal: Journal,
        launcher: FakeLauncher,
        probe: FakeProbe,
        sleeper: FakeSleeper,
        models: FakeModels,
    }

    impl Harness {
        fn new(ready_on: Option<u32>) -> Self {
            let journal: Journal = Rc::default();
            Self {
                launcher: FakeLauncher {
                    journal: journal.clone(),
                    fail: false,
                },
                probe: FakeProbe {
                    journal: journal.clone(),
                    ready_on,
                    calls: 0,
                },
                sleeper: FakeSleeper {
                    journal: journal.clone(),
                },
                models: FakeModels {
                    journal: journal.clone(),
                },
                journal,
            }
        }

        fn run(&mut self, seq: &Sequencer<'_>) -> Result<Prepared> {
            seq.prepare(
                &mut self.launcher,
                &mut self.probe,
                &mut self.sleeper,
                &mut self.models,
            )
        }

        fn count(&self, prefix: &str) -> usize {
            self.journal
                .borrow()
                .iter()
                .filter(|e| e.starts_with(prefix))
                .count()
        }
    }

    fn project_with_modelfile() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Modelfile"), "FROM gemma3\n").unwrap();
        dir
    }

    #[test]
    fn happy_path_creates_and_smoke_tests_once() {
        let dir = project_with_modelfile();
        let cfg = BootConfig::default();
        let seq = Sequencer::new(&cfg, dir.path(), SequenceOptions::default());
        let mut h = Harness::new(Some(1));

        let prepared = h.run(&seq).unwrap();
        assert_eq!(
            *h.journal.borrow(),
            vec!["launch ollama serve", "probe", "create jp-gemma3", "run jp-gemma3"]
        );
        assert_eq!(prepared.report.models.len(), 1);
        assert_eq!(prepared.report.poll.attempts, 1);
        assert_eq!(prepared.target.display(), "python main.py");
        assert!(prepared
            .target
            .env
            .contains(&("WARMUP_SERVICE_PID".to_string(), "777".to_string())));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("ollama.pid")).unwrap(),
            "777\n"
        );
    }

    #[test]
    fn ready_on_third_attempt_then_provisions() {
        let dir = project_with_modelfile();
        let cfg = BootConfig::default();
        let seq = Sequencer::new(&cfg, dir.path(), SequenceOptions::default());
        let mut h = Harness::new(Some(3));

        let prepared = h.run(&seq).unwrap();
        assert_eq!(h.count("probe"), 3);
        assert_eq!(h.count("sleep"), 2);
        assert_eq!(h.count("create"), 1);
        assert_eq!(prepared.report.poll.sleeps, 2);
    }

    #[test]
    fn exhausted_poll_never_provisions() {
        let dir = project_with_modelfile();
        let cfg = BootConfig::default();
        let seq = Sequencer::new(&cfg, dir.path(), SequenceOptions::default());
        let mut h = Harness::new(None);

        let err = h.run(&seq).unwrap_err();
        assert!(err.to_string().contains("failed to start"));
        assert_eq!(err.exit_code(), 1);
        assert_eq!(h.count("probe"), 20);
        assert_eq!(h.count("create"), 0);
        assert_eq!(h.count("run"), 0);
        assert!(!dir.path().join("ollama.pid").exists());
    }

    #[test]
    fn missing_modelfile_fails_before_create() {
        let dir = TempDir::new().unwrap();
        let cfg = BootConfig::default();
        let seq = Sequencer::new(&cfg, dir.path(), SequenceOptions::default());
        let mut h = Harness::new(Some(1));

        let err = h.run(&seq).unwrap_err();
        assert!(matches!(err, BootError::ConfigurationMissing(_)));
        assert!(err.to_string().contains("not found"));
        assert_eq!(h.count("create"), 0);
    }

    #[test]
    fn launch_failure_surfaces_as_poll_exhaustion() {
        let dir = project_with_modelfile();
        let mut cfg = BootConfig::default();
        cfg.readiness.max_retries = 3;
        let seq = Sequencer::new(&cfg, dir.path(), SequenceOptions::default());
        let mut h = Harness::new(None);
        h.launcher.fail = true;

        let err = h.run(&seq).unwrap_err();
        assert!(matches!(err, BootError::ServiceUnavailable { attempts: 3, .. }));
    }

    #[test]
    fn already_running_service_is_accepted_without_handle() {
        let dir = project_with_modelfile();
        let cfg = BootConfig::default();
        let seq = Sequencer::new(&cfg, dir.path(), SequenceOptions::default());
        let mut h = Harness::new(Some(1));
        h.launcher.fail = true;

        let prepared = h.run(&seq).unwrap();
        assert!(prepared.report.service.is_none());
        assert!(prepared.target.env.is_empty());
    }

    #[test]
    fn skip_provision_goes_straight_to_handoff() {
        let dir = TempDir::new().unwrap();
        let cfg = BootConfig::default();
        let options = SequenceOptions {
            skip_provision: true,
            handoff_argv: vec!["./ui-service".into(), "--port".into(), "7860".into()],
        };
        let seq = Sequencer::new(&cfg, dir.path(), options);
        let mut h = Harness::new(Some(1));

        let prepared = h.run(&seq).unwrap();
        assert_eq!(h.count("create"), 0);
        assert_eq!(prepared.target.display(), "./ui-service --port 7860");
    }

    #[test]
    fn invalid_config_fails_before_launch() {
        let dir = project_with_modelfile();
        let mut cfg = BootConfig::default();
        cfg.provision.models = vec![ModelSpec {
            name: "Bad Name".into(),
            modelfile: PathBuf::from("Modelfile"),
            smoke_prompt: None,
        }];
        let seq = Sequencer::new(&cfg, dir.path(), SequenceOptions::default());
        let mut h = Harness::new(Some(1));

        assert!(matches!(h.run(&seq), Err(BootError::InvalidConfig(_))));
        assert!(h.journal.borrow().is_empty());
    }
}
