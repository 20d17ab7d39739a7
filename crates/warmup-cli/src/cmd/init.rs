use anyhow::Context;
use std::path::Path;
use warmup_core::config::BootConfig;
use warmup_core::{io, paths};

pub fn run(root: &Path, config_path: &Path) -> anyhow::Result<()> {
    println!("Initializing warmup in: {}", root.display());

    let config = BootConfig::default();
    let yaml = serde_yaml::to_string(&config).context("failed to render default config")?;
    let written = io::write_if_missing(config_path, yaml.as_bytes())
        .with_context(|| format!("failed to write {}", config_path.display()))?;
    let shown = config_path.strip_prefix(root).unwrap_or(config_path);
    if written {
        println!("  created: {}", shown.display());
    } else {
        println!("  exists:  {}", shown.display());
    }

    // Modelfiles are never generated; point out the ones still missing.
    let config = BootConfig::load_or_default(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    for model in &config.provision.models {
        let modelfile = paths::resolve(root, &model.modelfile);
        if !modelfile.is_file() {
            println!(
                "  missing: {} (required to create model '{}')",
                model.modelfile.display(),
                model.name
            );
        }
    }

    Ok(())
}
