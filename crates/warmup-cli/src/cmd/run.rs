use crate::output::print_json;
use anyhow::Context;
use std::path::Path;
use warmup_core::config::BootConfig;
use warmup_core::sequencer::{BootReport, SequenceOptions, Sequencer};

pub struct RunArgs {
    pub max_retries: Option<u32>,
    pub interval_ms: Option<u64>,
    pub skip_provision: bool,
    pub no_handoff: bool,
    pub app: Vec<String>,
}

pub fn run(root: &Path, config_path: &Path, args: RunArgs, json: bool) -> anyhow::Result<()> {
    let mut config = BootConfig::load_or_default(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    if let Some(n) = args.max_retries {
        config.readiness.max_retries = n;
    }
    if let Some(ms) = args.interval_ms {
        config.readiness.interval_ms = ms;
    }

    let options = SequenceOptions {
        skip_provision: args.skip_provision,
        handoff_argv: args.app,
    };
    let prepared = Sequencer::new(&config, root, options).prepare_default()?;

    if json {
        print_json(&prepared.report)?;
    } else {
        print_summary(&prepared.report, args.no_handoff);
    }

    if args.no_handoff {
        return Ok(());
    }

    let never = prepared.hand_off()?;
    match never {}
}

fn print_summary(report: &BootReport, no_handoff: bool) {
    let attempts = report.poll.attempts;
    println!(
        "Service ready at {} after {attempts} attempt{}",
        report.health_url,
        if attempts == 1 { "" } else { "s" }
    );
    if let Some(service) = &report.service {
        println!(
            "  pid {} (log: {})",
            service.pid,
            service.log_path.display()
        );
    }
    for model in &report.models {
        let smoke = if model.smoke_tested {
            "smoke test passed"
        } else {
            "smoke test skipped"
        };
        println!("  model '{}' created ({smoke})", model.name);
    }
    if no_handoff {
        println!("Skipping handoff to: {}", report.handoff);
    } else {
        println!("Handing off to: {}", report.handoff);
    }
}
