//! The `predict` subcommand: price estimate from the trained regressor.

use anyhow::Result;
use carmarket_lib::types::{ListingInput, SpecValue, Specs};
use carmarket_lib::{validation, MarketEngine, Outcome};
use clap::Args;

use crate::output::{build_field_rows, print_json, print_rows, print_unavailable, OutputFormat};

/// Arguments for the `predict` subcommand.
///
/// The price model is trained on first use when none is loaded.
#[derive(Args, Debug, Default)]
pub struct PredictArgs {
    #[arg(long)]
    pub year: Option<i32>,

    #[arg(long)]
    pub mileage_km: Option<f64>,

    #[arg(long)]
    pub make: Option<String>,

    #[arg(long)]
    pub model: Option<String>,

    #[arg(long)]
    pub location: Option<String>,

    /// Fuel type, e.g. diesel, petrol
    #[arg(long)]
    pub fuel: Option<String>,

    #[arg(long)]
    pub transmission: Option<String>,

    /// Engine power
    #[arg(long)]
    pub power: Option<f64>,

    /// Engine descriptor, e.g. "2.0 TDI"
    #[arg(long)]
    pub engine: Option<String>,
}

impl PredictArgs {
    fn to_input(&self) -> Result<ListingInput> {
        let mut specs = Specs::new();
        if let Some(fuel) = &self.fuel {
            specs.insert("fuel", SpecValue::Text(fuel.clone()));
        }
        if let Some(transmission) = &self.transmission {
            specs.insert("transmission", SpecValue::Text(transmission.clone()));
        }
        if let Some(power) = self.power {
            specs.insert("power", SpecValue::Number(power));
        }
        if let Some(engine) = &self.engine {
            specs.insert("engine", SpecValue::Text(engine.clone()));
        }
        Ok(ListingInput {
            year: self.year.map(validation::validate_year).transpose()?,
            mileage_km: self.mileage_km.map(validation::validate_mileage).transpose()?,
            make: self.make.as_deref().map(validation::validate_search).transpose()?,
            model: self.model.as_deref().map(validation::validate_search).transpose()?,
            location: self
                .location
                .as_deref()
                .map(validation::validate_location)
                .transpose()?,
            specs,
            ..ListingInput::default()
        })
    }
}

pub async fn run(args: &PredictArgs, engine: &MarketEngine, format: &OutputFormat) -> Result<()> {
    let input = args.to_input()?;
    match engine.predict_price(&input).await? {
        Outcome::Data(prediction) => match format {
            OutputFormat::Json => print_json(&prediction),
            _ => print_rows(&build_field_rows(&prediction), format)?,
        },
        Outcome::Unavailable { error, message } => {
            print_unavailable(&error, message.as_deref(), format);
            eprintln!(
                "Hint: training needs at least {} clean listings; import more and run 'models retrain'.",
                engine.config().models.min_training_samples
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predict_args_fill_specs() {
        let args = PredictArgs {
            year: Some(2018),
            make: Some("Volkswagen".into()),
            fuel: Some("Diesel".into()),
            engine: Some("2.0 TDI".into()),
            power: Some(110.0),
            ..PredictArgs::default()
        };
        let input = args.to_input().unwrap();
        assert_eq!(input.year, Some(2018));
        assert_eq!(input.specs.text_or("fuel", ""), "diesel");
        assert_eq!(input.specs.digits_or("engine", 0.0), 20.0);
        assert_eq!(input.specs.number_or("power", 0.0), 110.0);
    }

    #[test]
    fn test_predict_args_reject_bad_year() {
        let args = PredictArgs {
            year: Some(3000),
            ..PredictArgs::default()
        };
        assert!(args.to_input().is_err());
    }
}
