use anyhow::Context;
use clap::Parser;
use bulwark::cli::{Cli, Commands};
use bulwark::config::AppConfig;
use bulwark::persistence::{EmergencyStore, FileEmergencyStore, MemoryEmergencyStore};
use bulwark::{LogTransport, NotificationTransport, ResilienceCore, TradeOutcome};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

mod main_runtime;

use main_runtime::{init_logging, init_logging_simple};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::CheckConfig => {
            init_logging_simple();
            check_config(&cli.config_dir)?;
        }
        Commands::Status => {
            init_logging_simple();
            show_status(&cli.config_dir).await?;
        }
        Commands::Replay { file, breakdown } => {
            let config = load_config(&cli.config_dir)?;
            init_logging(&config.logging);
            replay(config, file, *breakdown).await?;
        }
    }

    Ok(())
}

/// Invalid configuration is fatal: never run with ambiguous risk parameters
fn load_config(dir: &Path) -> anyhow::Result<AppConfig> {
    AppConfig::load_validated(dir)
        .with_context(|| format!("loading configuration from {}", dir.display()))
}

fn check_config(dir: &Path) -> anyhow::Result<()> {
    match load_config(dir) {
        Ok(config) => {
            println!("\x1b[32m✓ Configuration valid\x1b[0m");
            println!("{}", config.summary());
            let creds = bulwark::config::TelegramCredentials::from_env();
            println!("telegram: {:?}", creds);
            Ok(())
        }
        Err(e) => {
            println!("\x1b[31m✗ {e:#}\x1b[0m");
            Err(e)
        }
    }
}

async fn show_status(dir: &Path) -> anyhow::Result<()> {
    let config = load_config(dir)?;
    let store = FileEmergencyStore::new(&config.persistence.emergency_file);
    match store.load().await? {
        Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
        None => println!(
            "No emergency state recorded at {}",
            config.persistence.emergency_file.display()
        ),
    }
    Ok(())
}

async fn replay(config: AppConfig, file: &Path, breakdown: bool) -> anyhow::Result<()> {
    let raw = tokio::fs::read(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let outcomes: Vec<TradeOutcome> =
        serde_json::from_slice(&raw).with_context(|| format!("parsing {}", file.display()))?;

    // Replays never touch the real emergency file or a real chat
    let transport: Arc<dyn NotificationTransport> = Arc::new(LogTransport);
    let store: Arc<dyn EmergencyStore> = Arc::new(MemoryEmergencyStore::new());
    let core = ResilienceCore::with_parts(config, Some(transport), store).await?;

    info!("Replaying {} trade outcome(s) from {}", outcomes.len(), file.display());
    for outcome in outcomes {
        let outcome = TradeOutcome::new(
            outcome.asset,
            outcome.won,
            outcome.confidence_used,
            outcome.strategies_agreed,
            outcome.profit,
            outcome.timestamp_hour,
        );
        if let Some(transition) = core.record_trade_outcome(outcome).await {
            info!("Transition -> {}", transition.to_level());
        }
    }

    let report = core.performance_report().await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if breakdown {
        println!("{}", serde_json::to_string_pretty(&core.performance_by_hour().await)?);
        println!("{}", serde_json::to_string_pretty(&core.performance_by_asset().await)?);
    }

    core.shutdown().await;
    let stats = core.dispatcher_stats();
    if stats.dropped > 0 {
        error!("{} notification(s) dropped during replay", stats.dropped);
    }
    Ok(())
}
