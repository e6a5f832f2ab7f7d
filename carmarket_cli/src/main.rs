mod commands;
mod output;

use std::path::PathBuf;

use anyhow::{bail, Result};
use carmarket_lib::{AnalyticsConfig, Db, MarketEngine};
use clap::{Parser, Subcommand};

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "carmarket")]
#[command(about = "Price, depreciation and sales analytics over used-vehicle listings")]
struct Cli {
    /// Output format: table, json, csv, markdown
    #[arg(long, default_value = "table", global = true)]
    output: String,

    /// SQLite database path (falls back to CARMARKET_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Engine configuration TOML file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema
    Init,
    /// Import listings, reference prices or sales from CSV
    Import(commands::import::ImportArgs),
    /// Price or mileage distribution statistics
    Distribution(commands::analytics::DistributionArgs),
    /// Listings with anomalous price or yearly mileage
    Anomalies(commands::anomalies::AnomaliesArgs),
    /// Fair market value estimate
    Fmv(commands::analytics::FmvArgs),
    /// Location price premiums or heatmap
    Premiums(commands::analytics::PremiumsArgs),
    /// Depreciation curves against reference prices
    Depreciation(commands::analytics::ListingFilterArgs),
    /// Average price by model year and overall trend
    Trends(commands::analytics::ListingFilterArgs),
    /// Predict a listing price from its attributes
    Predict(Box<commands::predict::PredictArgs>),
    /// Forecast yearly unit sales
    Forecast(commands::forecast::ForecastArgs),
    /// Sales market share by maker
    MarketShare(commands::forecast::MarketShareArgs),
    /// Show or retrain the prediction models
    Models(commands::models::ModelsArgs),
    /// Engine health check
    Status,
}

fn resolve_db_path(flag: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = flag {
        return Ok(path);
    }
    match std::env::var("CARMARKET_DB") {
        Ok(path) if !path.trim().is_empty() => Ok(PathBuf::from(path)),
        _ => bail!("No database given: pass --db <path> or set CARMARKET_DB"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("carmarket=info".parse()?),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let format = OutputFormat::parse(&cli.output)?;
    let db_path = resolve_db_path(cli.db)?;

    match &cli.command {
        Commands::Init => return commands::import::run_init(&db_path),
        Commands::Import(args) => return commands::import::run(args, &db_path),
        _ => {}
    }

    let config = AnalyticsConfig::load(cli.config.as_deref())?;
    let db = Db::open(&db_path)?;
    db.init()?;
    let engine = MarketEngine::new(db, config);

    match &cli.command {
        Commands::Init | Commands::Import(_) => {}
        Commands::Distribution(args) => {
            commands::analytics::run_distribution(args, &engine, &format).await?
        }
        Commands::Anomalies(args) => commands::anomalies::run(args, &engine, &format).await?,
        Commands::Fmv(args) => commands::analytics::run_fmv(args, &engine, &format).await?,
        Commands::Premiums(args) => commands::analytics::run_premiums(args, &engine, &format).await?,
        Commands::Depreciation(args) => {
            commands::analytics::run_depreciation(args, &engine, &format).await?
        }
        Commands::Trends(args) => commands::analytics::run_trends(args, &engine, &format).await?,
        Commands::Predict(args) => commands::predict::run(args.as_ref(), &engine, &format).await?,
        Commands::Forecast(args) => commands::forecast::run_forecast(args, &engine, &format).await?,
        Commands::MarketShare(args) => {
            commands::forecast::run_market_share(args, &engine, &format).await?
        }
        Commands::Models(args) => commands::models::run_models(args, &engine, &format).await?,
        Commands::Status => commands::models::run_status(&engine, &format).await?,
    }

    Ok(())
}
