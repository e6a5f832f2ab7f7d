//! Listing analytics subcommands: `distribution`, `fmv`, `premiums`,
//! `depreciation` and `trends`.

use anyhow::Result;
use carmarket_lib::{MarketEngine, Outcome};
use clap::{Args, ValueEnum};

use super::FilterArgs;
use crate::output::{
    build_curve_rows, build_evolution_rows, build_field_rows, build_heatmap_rows,
    build_premium_rows, print_json, print_rows, print_unavailable, OutputFormat,
};

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq)]
pub enum DistributionField {
    #[default]
    Price,
    Mileage,
}

/// Arguments for the `distribution` subcommand.
#[derive(Args)]
pub struct DistributionArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Field to summarize
    #[arg(long, value_enum, default_value = "price")]
    pub field: DistributionField,
}

/// Arguments for the `fmv` subcommand. `--mileage-km` is the target
/// mileage of the vehicle being valued.
#[derive(Args)]
pub struct FmvArgs {
    #[command(flatten)]
    pub filter: FilterArgs,
}

/// Arguments for the `premiums` subcommand.
#[derive(Args)]
pub struct PremiumsArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Show the per-location price heatmap instead of premiums
    #[arg(long)]
    pub heatmap: bool,
}

/// Arguments for the `depreciation` and `trends` subcommands.
#[derive(Args)]
pub struct ListingFilterArgs {
    #[command(flatten)]
    pub filter: FilterArgs,
}

/// Prints a single-object result, or its unavailable marker.
fn print_outcome<T: serde::Serialize>(outcome: &Outcome<T>, format: &OutputFormat) -> Result<()> {
    match outcome {
        Outcome::Data(value) => match format {
            OutputFormat::Json => print_json(value),
            _ => print_rows(&build_field_rows(value), format)?,
        },
        Outcome::Unavailable { error, message } => {
            print_unavailable(error, message.as_deref(), format)
        }
    }
    Ok(())
}

pub async fn run_distribution(
    args: &DistributionArgs,
    engine: &MarketEngine,
    format: &OutputFormat,
) -> Result<()> {
    let query = args.filter.to_query()?;
    match args.field {
        DistributionField::Price => {
            print_outcome(&engine.price_distribution(&query).await?, format)
        }
        DistributionField::Mileage => {
            print_outcome(&engine.mileage_distribution(&query).await?, format)
        }
    }
}

pub async fn run_fmv(args: &FmvArgs, engine: &MarketEngine, format: &OutputFormat) -> Result<()> {
    let query = args.filter.to_query()?;
    print_outcome(&engine.fair_value(&query).await?, format)
}

pub async fn run_premiums(
    args: &PremiumsArgs,
    engine: &MarketEngine,
    format: &OutputFormat,
) -> Result<()> {
    let query = args.filter.to_query()?;

    if args.heatmap {
        let heatmap = engine.location_heatmap(&query).await?;
        if heatmap.is_empty() {
            eprintln!("No location has enough priced listings for a heatmap.");
        }
        match format {
            OutputFormat::Json => print_json(&heatmap),
            _ => print_rows(&build_heatmap_rows(&heatmap), format)?,
        }
        return Ok(());
    }

    let premiums = engine.location_premiums(&query).await?;
    match format {
        OutputFormat::Json => print_json(&premiums),
        _ => {
            print_rows(&build_premium_rows(&premiums.premiums), format)?;
            eprintln!(
                "\n{} locations vs. overall average {}",
                premiums.premiums.len(),
                crate::output::format_eur(premiums.overall_avg_price)
            );
        }
    }
    Ok(())
}

pub async fn run_depreciation(
    args: &ListingFilterArgs,
    engine: &MarketEngine,
    format: &OutputFormat,
) -> Result<()> {
    let query = args.filter.to_query()?;
    let outcome = engine.depreciation_curves(&query).await?;
    match (&outcome, format) {
        (Outcome::Data(curves), OutputFormat::Json) => print_json(curves),
        (Outcome::Data(curves), _) => {
            print_rows(&build_curve_rows(&curves.curves), format)?;
            eprintln!(
                "\n{} samples, avg annual depreciation {:.2}%, avg total depreciation {:.2}%",
                curves.summary.total_samples,
                curves.summary.avg_annual_depreciation_rate,
                curves.summary.avg_total_depreciation_percent
            );
        }
        (Outcome::Unavailable { error, message }, _) => {
            print_unavailable(error, message.as_deref(), format);
            eprintln!("Hint: import reference prices with 'import --prices <file>'.");
        }
    }
    Ok(())
}

pub async fn run_trends(
    args: &ListingFilterArgs,
    engine: &MarketEngine,
    format: &OutputFormat,
) -> Result<()> {
    let query = args.filter.to_query()?;
    let trend = engine.price_trend(&query).await?;
    match format {
        OutputFormat::Json => print_json(&trend),
        _ => {
            print_rows(&build_evolution_rows(&trend.patterns), format)?;
            eprintln!("\nTrend: {} ({:+.2}%)", trend.trend, trend.trend_percent);
            eprintln!("{}", trend.note);
        }
    }
    Ok(())
}
