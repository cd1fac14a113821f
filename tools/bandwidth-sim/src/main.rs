use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use lino_bandwidth::BandwidthParams;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod chain;
mod scenario;
mod sim;

use scenario::Scenario;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Replay a scenario block by block and print the final bandwidth state.
    Run(RunArgs),
    /// Print the genesis bandwidth parameters.
    Params,
}

#[derive(Debug, Parser)]
struct RunArgs {
    /// Scenario file (TOML, YAML or JSON); LINO_SIM__* variables override it
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Override the number of blocks
    #[arg(long)]
    blocks: Option<u64>,

    /// Keep every check but skip fee transfers
    #[arg(long)]
    simulate: bool,

    /// Persist state in a sled database at this path
    #[arg(long)]
    store: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format);

    match cli.cmd {
        Command::Run(args) => run(args),
        Command::Params => {
            println!("{}", serde_json::to_string_pretty(&BandwidthParams::default())?);
            Ok(())
        }
    }
}

fn run(args: RunArgs) -> Result<()> {
    let mut scenario = Scenario::load(args.scenario.as_deref())?;
    if let Some(blocks) = args.blocks {
        scenario.blocks = blocks;
    }
    if let Some(store) = args.store {
        scenario.store_path = Some(store);
    }

    let report = sim::run(&scenario, args.simulate).context("simulation failed")?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
            .init(),
    }
}
