use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use std::path::Path;
use warmup_core::config::{BootConfig, ConfigWarning, WarnLevel};
use warmup_core::paths;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the effective configuration (file merged over defaults)
    Show,

    /// Validate the config for common mistakes
    Validate,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(
    root: &Path,
    config_path: &Path,
    subcmd: ConfigSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    let config = BootConfig::load_or_default(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    match subcmd {
        ConfigSubcommand::Show => show(&config, json),
        ConfigSubcommand::Validate => validate(root, &config, json),
    }
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(config: &BootConfig, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(config);
    }

    println!("health:    {}", config.service.health_url());
    println!(
        "service:   {} {}",
        config.service.command,
        config.service.args.join(" ")
    );
    println!("log:       {}", config.service.log_file.display());
    println!(
        "readiness: {} attempts, {} ms apart",
        config.readiness.max_retries, config.readiness.interval_ms
    );
    println!(
        "handoff:   {} {}",
        config.handoff.program,
        config.handoff.args.join(" ")
    );
    println!();

    let rows: Vec<Vec<String>> = config
        .provision
        .models
        .iter()
        .map(|m| {
            vec![
                m.name.clone(),
                m.modelfile.display().to_string(),
                m.smoke_prompt.clone().unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();
    print_table(&["MODEL", "MODELFILE", "SMOKE PROMPT"], &rows);
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(root: &Path, config: &BootConfig, json: bool) -> anyhow::Result<()> {
    let mut warnings = config.validate();

    // Modelfiles may legitimately appear later; only warn here.
    for model in &config.provision.models {
        let path = paths::resolve(root, &model.modelfile);
        if !path.is_file() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "modelfile for '{}' not found at {}",
                    model.name,
                    path.display()
                ),
            });
        }
    }

    if json {
        let value = serde_json::json!({
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    let has_errors = warnings.iter().any(|w| w.level == WarnLevel::Error);
    if has_errors {
        anyhow::bail!("config validation found errors");
    }

    Ok(())
}
