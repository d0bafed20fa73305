/// Mellow host - application entry point for the native media bridge
use anyhow::Context;
use clap::{Parser, Subcommand};
use mellow_bridge::{BridgeConfig, MediaBridgeContext};
use mellow_host::{parse_script, run_script};
use mellow_playback::simulated_native;
use std::io::Read;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mellow-host")]
#[command(about = "Mellow native media bridge host", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bridge on the simulated engine and replay a script
    Run {
        /// Configuration file path
        #[arg(short, long, env = "MELLOW_CONFIG")]
        config: Option<PathBuf>,

        /// Newline-delimited JSON script (stdin when omitted)
        #[arg(short, long)]
        script: Option<PathBuf>,
    },
    /// Load and validate configuration, then exit
    CheckConfig {
        /// Configuration file path
        #[arg(short, long, env = "MELLOW_CONFIG")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the JSON output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mellow_host=info,mellow_bridge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, script } => {
            run(config, script).await?;
        }
        Commands::CheckConfig { config } => {
            let config = load_config(config.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<BridgeConfig> {
    let config = BridgeConfig::load(path).context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn run(config: Option<PathBuf>, script: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(config.as_deref())?;

    let source = match &script {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read script {}", path.display()))?,
        None => {
            let mut source = String::new();
            std::io::stdin()
                .read_to_string(&mut source)
                .context("failed to read script from stdin")?;
            source
        }
    };
    let steps = parse_script(&source)?;

    tracing::info!(plugin = %config.plugin_id, steps = steps.len(), "Starting media bridge");

    // Registration happens inside start, before the bridge initializes
    let (native, _probe) = simulated_native();
    let context = MediaBridgeContext::start(config, native)?;

    let mut stdout = std::io::stdout().lock();
    let report = run_script(&context, &steps, &mut stdout).await?;

    tracing::info!(
        calls = report.calls,
        failed = report.failed_calls,
        signals = report.signals,
        events = report.events,
        "Script finished"
    );
    Ok(())
}
