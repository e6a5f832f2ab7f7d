//! Sales subcommands: `forecast` and `market-share`.

use anyhow::Result;
use carmarket_lib::{validation, MarketEngine, Outcome, SalesQuery};
use clap::Args;

use crate::output::{
    build_forecast_rows, build_share_rows, print_json, print_rows, print_unavailable, OutputFormat,
};

/// Arguments for the `forecast` subcommand.
#[derive(Args)]
pub struct ForecastArgs {
    /// Catalog maker name (partial, case-insensitive)
    #[arg(long)]
    pub make: Option<String>,

    /// Catalog model name (partial, case-insensitive)
    #[arg(long)]
    pub model: Option<String>,

    /// Years to forecast (1-60)
    #[arg(long, default_value_t = validation::DEFAULT_FORECAST_PERIODS as i64)]
    pub periods: i64,
}

/// Arguments for the `market-share` subcommand.
#[derive(Args)]
pub struct MarketShareArgs {
    /// Restrict to one sales year
    #[arg(long)]
    pub year: Option<i32>,
}

pub async fn run_forecast(
    args: &ForecastArgs,
    engine: &MarketEngine,
    format: &OutputFormat,
) -> Result<()> {
    let periods = validation::validate_periods(args.periods)?;
    let mut query = SalesQuery::default();
    if let Some(make) = &args.make {
        query = query.with_make(&validation::validate_search(make)?);
    }
    if let Some(model) = &args.model {
        query = query.with_model(&validation::validate_search(model)?);
    }

    match engine.forecast_sales(&query, periods).await? {
        Outcome::Data(forecast) => match format {
            OutputFormat::Json => print_json(&forecast),
            _ => {
                print_rows(&build_forecast_rows(&forecast.forecast), format)?;
                eprintln!("\n{} forecast, {} years", forecast.model_type, forecast.periods);
            }
        },
        Outcome::Unavailable { error, message } => {
            print_unavailable(&error, message.as_deref(), format);
            eprintln!("Hint: import yearly sales with 'import --sales <file>'.");
        }
    }
    Ok(())
}

pub async fn run_market_share(
    args: &MarketShareArgs,
    engine: &MarketEngine,
    format: &OutputFormat,
) -> Result<()> {
    let year = args.year.map(validation::validate_year).transpose()?;
    let share = engine.market_share(year).await?;
    if share.is_empty() {
        eprintln!("No sales data available.");
        return Ok(());
    }
    match format {
        OutputFormat::Json => print_json(&share),
        _ => print_rows(&build_share_rows(&share), format)?,
    }
    Ok(())
}
