//! Model management (`models status|retrain`) and the `status` health check.

use anyhow::Result;
use carmarket_lib::{MarketEngine, ModelStatus, Outcome};
use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{build_field_rows, print_json, print_rows, print_unavailable, OutputFormat};

/// Arguments for the `models` subcommand.
#[derive(Args)]
pub struct ModelsArgs {
    #[command(subcommand)]
    pub action: ModelsAction,
}

#[derive(Subcommand)]
pub enum ModelsAction {
    /// Show the loaded price model and forecaster settings
    Status,
    /// Retrain the price model and clear cached forecasts
    Retrain,
}

#[derive(Tabled, Serialize)]
struct ModelRow {
    #[tabled(rename = "Model")]
    #[serde(rename = "Model")]
    model: String,
    #[tabled(rename = "Kind")]
    #[serde(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Loaded")]
    #[serde(rename = "Loaded")]
    loaded: String,
    #[tabled(rename = "Samples")]
    #[serde(rename = "Samples")]
    samples: String,
    #[tabled(rename = "Test R2")]
    #[serde(rename = "Test R2")]
    test_r2: String,
    #[tabled(rename = "Trained")]
    #[serde(rename = "Trained")]
    trained_at: String,
}

fn build_model_rows(status: &ModelStatus) -> Vec<ModelRow> {
    let price = &status.price_model;
    vec![
        ModelRow {
            model: "price".to_string(),
            kind: price.regressor.unwrap_or("-").to_string(),
            loaded: if price.trained { "yes" } else { "no" }.to_string(),
            samples: price
                .sample_count
                .map_or_else(|| "-".to_string(), |n| n.to_string()),
            test_r2: price
                .test_r2
                .map_or_else(|| "-".to_string(), |r| format!("{:.4}", r)),
            trained_at: price.trained_at.map_or_else(
                || "-".to_string(),
                |t| t.format("%Y-%m-%d %H:%M UTC").to_string(),
            ),
        },
        ModelRow {
            model: "sales".to_string(),
            kind: status.forecaster.clone(),
            loaded: format!("{} cached", status.cached_forecasts),
            samples: "-".to_string(),
            test_r2: "-".to_string(),
            trained_at: status.forecast_policy.clone(),
        },
    ]
}

fn print_status(status: &ModelStatus, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(status),
        _ => print_rows(&build_model_rows(status), format)?,
    }
    Ok(())
}

pub async fn run_models(args: &ModelsArgs, engine: &MarketEngine, format: &OutputFormat) -> Result<()> {
    match args.action {
        ModelsAction::Status => print_status(&engine.model_status(), format),
        ModelsAction::Retrain => match engine.retrain().await? {
            Outcome::Data(status) => {
                eprintln!("Retrained price model; forecast cache cleared.");
                print_status(&status, format)
            }
            Outcome::Unavailable { error, message } => {
                print_unavailable(&error, message.as_deref(), format);
                Ok(())
            }
        },
    }
}

pub async fn run_status(engine: &MarketEngine, format: &OutputFormat) -> Result<()> {
    let health = engine.health().await;
    match format {
        OutputFormat::Json => print_json(&health),
        _ => print_rows(&build_field_rows(&health), format)?,
    }
    Ok(())
}
