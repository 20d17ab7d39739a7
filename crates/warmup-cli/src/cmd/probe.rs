use crate::output::print_json;
use anyhow::Context;
use std::path::Path;
use warmup_core::config::BootConfig;
use warmup_core::poller::{self, RetryBudget, ThreadSleeper};
use warmup_core::probe::{HttpProbe, Probe};
use warmup_core::BootError;

pub fn run(config_path: &Path, wait: bool, json: bool) -> anyhow::Result<()> {
    let config = BootConfig::load_or_default(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    config.ensure_valid()?;

    let url = config.service.health_url();
    let mut probe = HttpProbe::new(&url, config.service.probe_timeout())?;

    if wait {
        let budget = RetryBudget::new(config.readiness.max_retries, config.readiness.interval());
        let report = poller::poll_until_ready(&mut probe, budget, &mut ThreadSleeper)?;
        if json {
            print_json(&serde_json::json!({
                "url": url,
                "ready": true,
                "attempts": report.attempts,
            }))?;
        } else {
            println!("{url} is ready after {} attempt(s)", report.attempts);
        }
        return Ok(());
    }

    let outcome = probe.probe();
    if json {
        print_json(&serde_json::json!({
            "url": url,
            "ready": outcome.is_ready(),
            "outcome": outcome.to_string(),
        }))?;
    } else {
        println!("{url}: {outcome}");
    }

    if !outcome.is_ready() {
        return Err(BootError::ServiceUnavailable { url, attempts: 1 }.into());
    }
    Ok(())
}
