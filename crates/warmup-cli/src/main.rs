mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "warmup",
    about = "Start a local model runtime, wait until it answers, provision models, then exec the app",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from warmup.yaml)
    #[arg(long, global = true, env = "WARMUP_ROOT")]
    root: Option<PathBuf>,

    /// Config file (default: <root>/warmup.yaml; built-in defaults if absent)
    #[arg(long, global = true, env = "WARMUP_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the service, wait for it, provision models, and hand off
    Run {
        /// Override readiness.max_retries
        #[arg(long)]
        max_retries: Option<u32>,

        /// Override readiness.interval_ms
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Do not create or smoke-test any model
        #[arg(long)]
        skip_provision: bool,

        /// Stop after provisioning instead of exec'ing the application
        #[arg(long)]
        no_handoff: bool,

        /// Application to exec instead of handoff.program (after `--`)
        #[arg(last = true)]
        app: Vec<String>,
    },

    /// Probe the service health endpoint without launching anything
    Probe {
        /// Keep probing with the configured retry budget
        #[arg(long)]
        wait: bool,
    },

    /// Write a default warmup.yaml to the project root
    Init,

    /// Inspect or validate the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Run { .. } | Commands::Probe { wait: true } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level.as_str())),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    let config_path = root::resolve_config(&root, cli.config.as_deref());

    let result = match cli.command {
        Commands::Run {
            max_retries,
            interval_ms,
            skip_provision,
            no_handoff,
            app,
        } => cmd::run::run(
            &root,
            &config_path,
            cmd::run::RunArgs {
                max_retries,
                interval_ms,
                skip_provision,
                no_handoff,
                app,
            },
            cli.json,
        ),
        Commands::Probe { wait } => cmd::probe::run(&config_path, wait, cli.json),
        Commands::Init => cmd::init::run(&root, &config_path),
        Commands::Config { subcommand } => {
            cmd::config::run(&root, &config_path, subcommand, cli.json)
        }
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        let code = e
            .downcast_ref::<warmup_core::BootError>()
            .map(warmup_core::BootError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}
