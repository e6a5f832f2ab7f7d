//! The `anomalies` subcommand: z-score outliers on price or yearly mileage.

use anyhow::Result;
use carmarket_lib::{validation, MarketEngine};
use clap::{Args, ValueEnum};

use super::FilterArgs;
use crate::output::{
    build_mileage_anomaly_rows, build_price_anomaly_rows, print_json, print_rows, OutputFormat,
};

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq)]
pub enum AnomalyKind {
    #[default]
    Price,
    Mileage,
}

/// Arguments for the `anomalies` subcommand.
///
/// Flags listings whose price, or mileage per year of age, lies at least
/// `--threshold` standard deviations from the mean of the matching sample.
#[derive(Args)]
pub struct AnomaliesArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// What to test: price or mileage (per year of age)
    #[arg(long, value_enum, default_value = "price")]
    pub kind: AnomalyKind,

    /// Z-score threshold (1.0-5.0, default from config: 2.0)
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Maximum results (1-500, default from config: 50)
    #[arg(long)]
    pub limit: Option<i64>,
}

pub async fn run(args: &AnomaliesArgs, engine: &MarketEngine, format: &OutputFormat) -> Result<()> {
    let query = args.filter.to_query()?;
    let threshold = args
        .threshold
        .map(validation::validate_threshold)
        .transpose()?;
    let limit = args.limit.map(validation::validate_limit).transpose()?;
    let min_samples = engine.config().anomaly.min_samples;

    let shown = match args.kind {
        AnomalyKind::Price => {
            let anomalies = engine.price_anomalies(&query, threshold, limit).await?;
            match format {
                OutputFormat::Json => print_json(&anomalies),
                _ => print_rows(&build_price_anomaly_rows(&anomalies), format)?,
            }
            anomalies.len()
        }
        AnomalyKind::Mileage => {
            let anomalies = engine.mileage_anomalies(&query, threshold, limit).await?;
            match format {
                OutputFormat::Json => print_json(&anomalies),
                _ => print_rows(&build_mileage_anomaly_rows(&anomalies), format)?,
            }
            anomalies.len()
        }
    };

    if shown == 0 {
        eprintln!("No anomalies found.");
        eprintln!(
            "Hint: detection needs at least {} matching listings; try a broader filter or a lower --threshold.",
            min_samples
        );
    } else {
        eprintln!(
            "\nShowing {} anomalies (threshold: {:.1})",
            shown,
            threshold.unwrap_or(engine.config().anomaly.default_threshold)
        );
    }
    Ok(())
}
