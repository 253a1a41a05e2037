mod config;
mod engine;
mod error;
mod risk;
mod types;
mod web;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::{load_config, render_toml, RuntimeConfig};
use crate::engine::{RoiTrailingSimulator, SimulationSummary};
use crate::types::{Direction, SimulationRequest};
use crate::web::{start_server, AppState};

#[derive(Parser)]
#[command(name = "roi-trailing-bot")]
#[command(author = "Trading Bot")]
#[command(version)]
#[command(about = "Leveraged-position ROI trailing stop simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the simulation API
    Serve {
        /// Listen port (defaults to server.port from config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run a single simulation and print the steps
    Simulate {
        /// Entry price of the position
        #[arg(short, long)]
        entry: Decimal,
        /// LONG or SHORT
        #[arg(short, long)]
        direction: Direction,
        /// Comma-separated price path, e.g. 100,102,105
        #[arg(short, long, value_delimiter = ',', required = true)]
        prices: Vec<Decimal>,
        /// Margin in USDT (defaults to margin_usdt from config)
        #[arg(short, long)]
        margin: Option<Decimal>,
        /// Leverage multiplier (defaults to leverage from config)
        #[arg(short, long)]
        leverage: Option<u32>,
        /// Print the steps as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let runtime_config = load_config(Some(Path::new(&cli.config)))?;

    match cli.command {
        Commands::Serve { port } => {
            info!("ROI Trailing Simulator v{}", env!("CARGO_PKG_VERSION"));
            run_server(runtime_config, port).await?;
        }
        Commands::Simulate { entry, direction, prices, margin, leverage, json } => {
            let defaults = runtime_config.request_defaults();
            let request = SimulationRequest {
                entry_price: entry,
                direction,
                margin: margin.unwrap_or(defaults.margin),
                leverage: leverage.unwrap_or(defaults.leverage),
                prices,
            };
            run_simulation(&runtime_config, &request, json)?;
        }
        Commands::Config => {
            print!("{}", render_toml(&runtime_config)?);
        }
    }

    Ok(())
}

async fn run_server(runtime_config: RuntimeConfig, port: Option<u16>) -> Result<()> {
    let port = port.unwrap_or(runtime_config.server.port);
    if runtime_config.server.cors_origins.is_empty() {
        warn!("No CORS origins configured, allowing any origin");
    }

    let state = AppState::from_config(runtime_config);
    start_server(state, port).await
}

fn run_simulation(runtime_config: &RuntimeConfig, request: &SimulationRequest, json: bool) -> Result<()> {
    let policy = runtime_config
        .policy()
        .map_err(|errors| anyhow!("invalid trailing policy: {}", errors.join(", ")))?;
    let steps = RoiTrailingSimulator::new(policy).run(request)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&steps)?);
        return Ok(());
    }

    info!(
        "Simulating {} @ {} with {}x leverage, margin {} USDT",
        request.direction, request.entry_price, request.leverage, request.margin
    );
    for step in &steps {
        info!(
            "#{:<3} price={:<12} roe={:>8.2}% peak={:>8.2}% pnl={:>9.4} sl={} ({}%){}",
            step.step,
            step.price,
            step.roe,
            step.peak_roe,
            step.pnl,
            step.sl_price.round_dp(8),
            step.sl_roe,
            if step.stopped_out { "  STOPPED OUT" } else { "" }
        );
    }

    if let Some(summary) = SimulationSummary::from_steps(&steps) {
        let outcome = if summary.stopped_out { "stopped out" } else { "still open" };
        info!(
            "Position {} after {} step(s): exit {} roe {:.2}% pnl {:.4} (peak {:.2}%)",
            outcome,
            summary.steps_evaluated,
            summary.exit_price,
            summary.final_roe,
            summary.final_pnl,
            summary.peak_roe
        );
    }

    Ok(())
}
