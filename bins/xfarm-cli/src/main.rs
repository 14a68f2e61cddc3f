//! xfarm-cli: Offline driver for the XFarm ledgers.
//!
//! Prints the emission schedule, replays scenario files against an
//! in-memory farm and inspects saved snapshots. Results go to stdout as
//! JSON lines; logs go to stderr.

mod config;
mod scenario;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing::info;

use xfarm_core::traits::AssetLedger;
use xfarm_core::types::Height;
use xfarm_farm::{bridge_account, pool_account, vesting_account, Farm};

/// XFarm command-line interface.
#[derive(Parser)]
#[command(name = "xfarm-cli")]
#[command(version, about = "Weighted yield farming with decay-vesting reward streams")]
struct Cli {
    /// Config file (TOML or JSON). Defaults to <config dir>/xfarm/farm.toml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the configured emission table.
    Schedule,
    /// Total emission over [from, to).
    Emission(EmissionArgs),
    /// Replay a scenario file against a fresh in-memory farm.
    Simulate(SimulateArgs),
    /// Summarise a snapshot written by `simulate --snapshot`.
    Inspect(InspectArgs),
}

#[derive(Args)]
struct EmissionArgs {
    #[arg(long)]
    from: Height,
    #[arg(long)]
    to: Height,
}

#[derive(Args)]
struct SimulateArgs {
    /// Scenario JSON file.
    scenario: PathBuf,

    /// Write the final farm state here.
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

#[derive(Args)]
struct InspectArgs {
    /// Snapshot file.
    snapshot: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, &cli.log_format);

    match cli.command {
        Commands::Schedule => schedule(cli.config),
        Commands::Emission(args) => emission(cli.config, args),
        Commands::Simulate(args) => simulate(cli.config, args),
        Commands::Inspect(args) => inspect(args),
    }
}

fn schedule(config: Option<PathBuf>) -> Result<()> {
    let config = config::load(config.as_deref())?;
    let schedule = config.schedule()?;
    for (i, stage) in schedule.stages().iter().enumerate() {
        println!(
            "{}",
            json!({
                "stage": i,
                "from": schedule.stage_start(i),
                "until": stage.until,
                "reward_per_block": stage.reward_per_block.to_string(),
            })
        );
    }
    println!(
        "{}",
        json!({
            "start_height": schedule.start_height(),
            "last_reward_height": schedule.last_reward_height(),
            "total_emission": schedule.total_emission()?.to_string(),
        })
    );
    Ok(())
}

fn emission(config: Option<PathBuf>, args: EmissionArgs) -> Result<()> {
    let config = config::load(config.as_deref())?;
    let total = config.schedule()?.emission(args.from, args.to)?;
    println!("{}", json!({ "from": args.from, "to": args.to, "emission": total.to_string() }));
    Ok(())
}

fn simulate(config: Option<PathBuf>, args: SimulateArgs) -> Result<()> {
    let text = std::fs::read_to_string(&args.scenario)
        .with_context(|| format!("Failed to read scenario: {}", args.scenario.display()))?;
    let scenario = scenario::parse(&text)?;
    let config = match scenario.config.clone() {
        Some(inline) => {
            inline.validate().context("Scenario configuration rejected")?;
            inline
        }
        None => config::load(config.as_deref())?,
    };

    let mut farm = Farm::in_memory(&config)?;
    let summary = scenario::run(&mut farm, &scenario.steps, |line| println!("{line}"));
    info!(ok = summary.ok, failed = summary.failed, height = farm.height(), "scenario finished");

    if let Some(path) = args.snapshot {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        std::fs::write(&path, farm.snapshot()?)
            .with_context(|| format!("Failed to write snapshot: {}", path.display()))?;
        info!(path = %path.display(), "snapshot written");
    }
    println!("{}", json!({ "ok": summary.ok, "failed": summary.failed, "height": farm.height() }));
    Ok(())
}

fn inspect(args: InspectArgs) -> Result<()> {
    let bytes = std::fs::read(&args.snapshot)
        .with_context(|| format!("Failed to read snapshot: {}", args.snapshot.display()))?;
    let farm = Farm::restore(&bytes)?;
    let reward = farm.reward_asset();

    for pool in farm.pools().pools() {
        let assets: Vec<_> = pool
            .assets
            .iter()
            .map(|a| {
                json!({
                    "asset": a.asset,
                    "weight": a.weight,
                    "status": a.status,
                    "total_staked": a.total_staked.to_string(),
                })
            })
            .collect();
        println!(
            "{}",
            json!({
                "pool": pool.id.0,
                "kind": farm.pools().stream_kind(pool.id),
                "positions": farm.pools().positions_in(pool.id).count(),
                "last_accrual_height": pool.last_accrual_height,
                "assets": assets,
            })
        );
    }

    let assets = farm.assets();
    println!(
        "{}",
        json!({
            "height": farm.height(),
            "streams": farm.vesting().stream_count(),
            "reward_supply": assets.total_supply(&reward).to_string(),
            "pool_custody": assets.balance_of(&reward, &pool_account()).to_string(),
            "vesting_custody": assets.balance_of(&reward, &vesting_account()).to_string(),
            "bridge_balance": assets.balance_of(&reward, &bridge_account()).to_string(),
        })
    );
    Ok(())
}

/// Initialize tracing on stderr with the given level and output format.
///
/// `format = "json"` selects structured JSON output; anything else is text.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
