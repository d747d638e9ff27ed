//! mtm-cli - command-line driver for the mtm backtesting engine.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use chrono::{DateTime, TimeZone, Utc};
use mtm_core::prelude::*;
use mtm_logging::{init_cli_logging, LogConfig};
use polars::prelude::*;

#[derive(Parser)]
#[command(name = "mtm")]
#[command(author, version, about = "Deterministic mark-to-market backtesting engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a backtest over a bar CSV and a strategy config TOML.
    Run {
        /// CSV with columns: ts (unix seconds), close, buy (0/1), sell (0/1)
        #[arg(long)]
        bars: PathBuf,

        /// TOML file deserializing into a PnlCalcConfig
        #[arg(long)]
        config: PathBuf,

        /// Symbol label attached to the run's trades
        #[arg(long)]
        symbol: String,

        /// Inventory discipline for closing positions
        #[arg(long, value_enum, default_value = "fifo")]
        inventory_mode: CliInventoryMode,
    },
}

#[derive(Clone, clap::ValueEnum)]
enum CliInventoryMode {
    Fifo,
    Lifo,
    WorstPrice,
}

impl From<CliInventoryMode> for InventoryMode {
    fn from(mode: CliInventoryMode) -> Self {
        match mode {
            CliInventoryMode::Fifo => InventoryMode::Fifo,
            CliInventoryMode::Lifo => InventoryMode::Lifo,
            CliInventoryMode::WorstPrice => InventoryMode::WorstPrice,
        }
    }
}

fn main() -> Result<()> {
    let log_config = LogConfig::from_env();
    let _guard = init_cli_logging(&log_config);

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            bars,
            config,
            symbol,
            inventory_mode,
        } => run(bars, config, symbol, inventory_mode.into()),
    }
}

fn run(bars_path: PathBuf, config_path: PathBuf, symbol: String, inventory_mode: InventoryMode) -> Result<()> {
    let bars = load_bars(&bars_path)?;
    let raw_config = load_config(&config_path)?;
    let config = PnlCalcConfig::try_from(raw_config).context("invalid strategy configuration")?;

    tracing::info!(symbol = %symbol, bar_count = bars.len(), "starting backtest");

    let result = EngineDriver::calculate(symbol, &bars, config, inventory_mode, RunMetadata::default())?;

    serde_json::to_writer_pretty(std::io::stdout(), &result)?;
    println!();

    Ok(())
}

fn load_config(path: &PathBuf) -> Result<RawPnlCalcConfig> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
}

/// Load a bar CSV (columns: `ts`, `close`, `buy`, `sell`) via `polars`.
fn load_bars(path: &PathBuf) -> Result<Vec<Bar>> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.clone()))
        .with_context(|| format!("opening bar CSV {}", path.display()))?
        .finish()
        .with_context(|| format!("reading bar CSV {}", path.display()))?;

    let ts = df.column("ts")?.i64()?;
    let close = df.column("close")?.f64()?;
    let buy = df.column("buy")?.i64()?;
    let sell = df.column("sell")?.i64()?;

    let mut out = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let ts_secs = ts.get(i).context("missing ts value")?;
        let ts: DateTime<Utc> = Utc
            .timestamp_opt(ts_secs, 0)
            .single()
            .context("invalid ts value")?;
        out.push(Bar {
            ts,
            close: close.get(i).context("missing close value")?,
            buy: buy.get(i).unwrap_or(0) != 0,
            sell: sell.get(i).unwrap_or(0) != 0,
        });
    }

    Ok(out)
}
