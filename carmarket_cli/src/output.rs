use anyhow::{bail, Result};
use carmarket_lib::anomaly::{MileageAnomaly, PriceAnomaly};
use carmarket_lib::depreciation::CurvePoint;
use carmarket_lib::model::ForecastPoint;
use carmarket_lib::premium::{HeatmapEntry, LocationPremium};
use carmarket_lib::trend::EvolutionPoint;
use carmarket_lib::MarketShareRow;
use serde::Serialize;
use serde_json::Value;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Clone, Debug, PartialEq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
    Markdown,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => bail!(
                "Invalid --output value: '{}'. Must be one of: table, json, csv, markdown",
                other
            ),
        }
    }
}

#[derive(Tabled, Serialize)]
pub struct FieldRow {
    #[tabled(rename = "Field")]
    #[serde(rename = "Field")]
    field: String,
    #[tabled(rename = "Value")]
    #[serde(rename = "Value")]
    value: String,
}

#[derive(Tabled, Serialize)]
pub struct PriceAnomalyRow {
    #[tabled(rename = "ID")]
    #[serde(rename = "ID")]
    id: i64,
    #[tabled(rename = "Vehicle")]
    #[serde(rename = "Vehicle")]
    vehicle: String,
    #[tabled(rename = "Year")]
    #[serde(rename = "Year")]
    year: String,
    #[tabled(rename = "Mileage")]
    #[serde(rename = "Mileage")]
    mileage: String,
    #[tabled(rename = "Price")]
    #[serde(rename = "Price")]
    price: String,
    #[tabled(rename = "Z-Score")]
    #[serde(rename = "Z-Score")]
    z_score: f64,
    #[tabled(rename = "Type")]
    #[serde(rename = "Type")]
    anomaly_type: String,
}

#[derive(Tabled, Serialize)]
pub struct MileageAnomalyRow {
    #[tabled(rename = "ID")]
    #[serde(rename = "ID")]
    id: i64,
    #[tabled(rename = "Vehicle")]
    #[serde(rename = "Vehicle")]
    vehicle: String,
    #[tabled(rename = "Year")]
    #[serde(rename = "Year")]
    year: String,
    #[tabled(rename = "Mileage")]
    #[serde(rename = "Mileage")]
    mileage: String,
    #[tabled(rename = "Km/Year")]
    #[serde(rename = "Km/Year")]
    per_year: String,
    #[tabled(rename = "Z-Score")]
    #[serde(rename = "Z-Score")]
    z_score: f64,
    #[tabled(rename = "Type")]
    #[serde(rename = "Type")]
    anomaly_type: String,
}

#[derive(Tabled, Serialize)]
pub struct PremiumRow {
    #[tabled(rename = "Location")]
    #[serde(rename = "Location")]
    location: String,
    #[tabled(rename = "Listings")]
    #[serde(rename = "Listings")]
    listings: usize,
    #[tabled(rename = "Avg Price")]
    #[serde(rename = "Avg Price")]
    avg_price: String,
    #[tabled(rename = "Premium")]
    #[serde(rename = "Premium")]
    premium: String,
    #[tabled(rename = "Premium %")]
    #[serde(rename = "Premium %")]
    premium_percent: f64,
    #[tabled(rename = "Type")]
    #[serde(rename = "Type")]
    premium_type: String,
}

#[derive(Tabled, Serialize)]
pub struct HeatmapRow {
    #[tabled(rename = "Location")]
    #[serde(rename = "Location")]
    location: String,
    #[tabled(rename = "Listings")]
    #[serde(rename = "Listings")]
    listings: usize,
    #[tabled(rename = "Avg")]
    #[serde(rename = "Avg")]
    avg_price: String,
    #[tabled(rename = "Median")]
    #[serde(rename = "Median")]
    median_price: String,
    #[tabled(rename = "Min")]
    #[serde(rename = "Min")]
    min_price: String,
    #[tabled(rename = "Max")]
    #[serde(rename = "Max")]
    max_price: String,
}

#[derive(Tabled, Serialize)]
pub struct CurveRow {
    #[tabled(rename = "Age")]
    #[serde(rename = "Age")]
    age_years: i32,
    #[tabled(rename = "Samples")]
    #[serde(rename = "Samples")]
    samples: usize,
    #[tabled(rename = "Avg Price")]
    #[serde(rename = "Avg Price")]
    avg_price: String,
    #[tabled(rename = "Avg Original")]
    #[serde(rename = "Avg Original")]
    avg_original: String,
    #[tabled(rename = "Depreciation %")]
    #[serde(rename = "Depreciation %")]
    depreciation_percent: String,
    #[tabled(rename = "Annual Rate %")]
    #[serde(rename = "Annual Rate %")]
    annual_rate: String,
}

#[derive(Tabled, Serialize)]
pub struct EvolutionRow {
    #[tabled(rename = "Year")]
    #[serde(rename = "Year")]
    year: i32,
    #[tabled(rename = "Listings")]
    #[serde(rename = "Listings")]
    listings: usize,
    #[tabled(rename = "Avg")]
    #[serde(rename = "Avg")]
    avg_price: String,
    #[tabled(rename = "Median")]
    #[serde(rename = "Median")]
    median_price: String,
    #[tabled(rename = "Min")]
    #[serde(rename = "Min")]
    min_price: String,
    #[tabled(rename = "Max")]
    #[serde(rename = "Max")]
    max_price: String,
}

#[derive(Tabled, Serialize)]
pub struct ForecastRow {
    #[tabled(rename = "Year")]
    #[serde(rename = "Year")]
    year: i32,
    #[tabled(rename = "Units")]
    #[serde(rename = "Units")]
    units: f64,
    #[tabled(rename = "Lower")]
    #[serde(rename = "Lower")]
    lower: f64,
    #[tabled(rename = "Upper")]
    #[serde(rename = "Upper")]
    upper: f64,
}

#[derive(Tabled, Serialize)]
pub struct ShareRow {
    #[tabled(rename = "Maker")]
    #[serde(rename = "Maker")]
    maker: String,
    #[tabled(rename = "Models")]
    #[serde(rename = "Models")]
    models: i64,
    #[tabled(rename = "Units")]
    #[serde(rename = "Units")]
    units: f64,
    #[tabled(rename = "Share %")]
    #[serde(rename = "Share %")]
    share: f64,
}

// -- Row builders --

fn vehicle(make: Option<&str>, model: Option<&str>) -> String {
    match (make, model) {
        (Some(make), Some(model)) => format!("{} {}", make, model),
        (Some(one), None) | (None, Some(one)) => one.to_string(),
        (None, None) => "-".to_string(),
    }
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

pub fn build_price_anomaly_rows(anomalies: &[PriceAnomaly]) -> Vec<PriceAnomalyRow> {
    anomalies
        .iter()
        .map(|a| PriceAnomalyRow {
            id: a.id,
            vehicle: vehicle(a.make.as_deref(), a.model.as_deref()),
            year: or_dash(a.year),
            mileage: a.mileage_km.map_or_else(|| "-".to_string(), format_km),
            price: format_eur(a.price_eur),
            z_score: a.z_score,
            anomaly_type: a.anomaly_type.to_string(),
        })
        .collect()
}

pub fn build_mileage_anomaly_rows(anomalies: &[MileageAnomaly]) -> Vec<MileageAnomalyRow> {
    anomalies
        .iter()
        .map(|a| MileageAnomalyRow {
            id: a.id,
            vehicle: vehicle(a.make.as_deref(), a.model.as_deref()),
            year: or_dash(a.year),
            mileage: format_km(a.mileage_km),
            per_year: format_km(a.mileage_per_year),
            z_score: a.z_score,
            anomaly_type: a.anomaly_type.to_string(),
        })
        .collect()
}

pub fn build_premium_rows(premiums: &[LocationPremium]) -> Vec<PremiumRow> {
    premiums
        .iter()
        .map(|p| PremiumRow {
            location: p.location.clone(),
            listings: p.listing_count,
            avg_price: format_eur(p.avg_price),
            premium: format_signed_eur(p.premium_amount),
            premium_percent: p.premium_percent,
            premium_type: p.premium_type.to_string(),
        })
        .collect()
}

pub fn build_heatmap_rows(entries: &[HeatmapEntry]) -> Vec<HeatmapRow> {
    entries
        .iter()
        .map(|h| HeatmapRow {
            location: h.location.clone(),
            listings: h.listing_count,
            avg_price: format_eur(h.avg_price),
            median_price: format_eur(h.median_price),
            min_price: format_eur(h.min_price),
            max_price: format_eur(h.max_price),
        })
        .collect()
}

pub fn build_curve_rows(curves: &[CurvePoint]) -> Vec<CurveRow> {
    curves
        .iter()
        .map(|c| CurveRow {
            age_years: c.age_years,
            samples: c.sample_size,
            avg_price: format_eur(c.avg_current_price),
            avg_original: format_eur(c.avg_original_price),
            depreciation_percent: format!("{:.2}", c.avg_depreciation_percent),
            annual_rate: format!("{:.2}", c.avg_annual_depreciation_rate),
        })
        .collect()
}

pub fn build_evolution_rows(points: &[EvolutionPoint]) -> Vec<EvolutionRow> {
    points
        .iter()
        .map(|p| EvolutionRow {
            year: p.year,
            listings: p.listing_count,
            avg_price: format_eur(p.avg_price),
            median_price: format_eur(p.median_price),
            min_price: format_eur(p.min_price),
            max_price: format_eur(p.max_price),
        })
        .collect()
}

pub fn build_forecast_rows(points: &[ForecastPoint]) -> Vec<ForecastRow> {
    points
        .iter()
        .map(|p| ForecastRow {
            year: p.year,
            units: p.predicted_units,
            lower: p.lower_bound,
            upper: p.upper_bound,
        })
        .collect()
}

pub fn build_share_rows(rows: &[MarketShareRow]) -> Vec<ShareRow> {
    rows.iter()
        .map(|r| ShareRow {
            maker: r.maker.clone(),
            models: r.model_count,
            units: r.total_units,
            share: r.market_share_percent,
        })
        .collect()
}

/// Flattens a serialized object into `field`/`value` rows. Nested objects
/// use dotted keys and `null` prints as `-`.
pub fn build_field_rows<T: Serialize>(value: &T) -> Vec<FieldRow> {
    let mut rows = Vec::new();
    match serde_json::to_value(value) {
        Ok(v) => flatten_into("", &v, &mut rows),
        Err(e) => eprintln!("Failed to serialize result: {}", e),
    }
    rows
}

fn flatten_into(prefix: &str, value: &Value, rows: &mut Vec<FieldRow>) {
    match value {
        Value::Object(map) => {
            for (key, v) in map {
                let field = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_into(&field, v, rows);
            }
        }
        Value::Null => rows.push(FieldRow {
            field: prefix.to_string(),
            value: "-".to_string(),
        }),
        Value::String(s) => rows.push(FieldRow {
            field: prefix.to_string(),
            value: s.clone(),
        }),
        other => rows.push(FieldRow {
            field: prefix.to_string(),
            value: other.to_string(),
        }),
    }
}

// -- Printing --

/// Prints rows as a table, markdown table, CSV, or a JSON array.
pub fn print_rows<R: Tabled + Serialize>(rows: &[R], format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", Table::new(rows)),
        OutputFormat::Markdown => {
            let mut table = Table::new(rows);
            table.with(Style::markdown());
            println!("{}", table);
        }
        OutputFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(std::io::stdout());
            for row in rows {
                wtr.serialize(row)?;
            }
            wtr.flush()?;
        }
        OutputFormat::Json => print_json(&rows),
    }
    Ok(())
}

pub fn print_json<T: serde::Serialize>(data: &T) {
    match serde_json::to_string_pretty(data) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize to JSON: {}", e),
    }
}

/// Reports an unavailable result. JSON keeps the marker on stdout; other
/// formats print it to stderr.
pub fn print_unavailable(error: &str, message: Option<&str>, format: &OutputFormat) {
    if *format == OutputFormat::Json {
        print_json(&serde_json::json!({ "error": error, "message": message }));
        return;
    }
    match message {
        Some(m) => eprintln!("{}: {}", error, m),
        None => eprintln!("{}", error),
    }
}

// -- Formatting --

fn group_thousands(whole: u64) -> String {
    let digits = whole.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Whole euros with thousands separators.
pub fn format_eur(value: f64) -> String {
    let sign = if value < -0.5 { "-" } else { "" };
    format!("{}€{}", sign, group_thousands(value.abs().round() as u64))
}

fn format_signed_eur(value: f64) -> String {
    if value > 0.5 {
        format!("+{}", format_eur(value))
    } else {
        format_eur(value)
    }
}

pub fn format_km(value: f64) -> String {
    format!("{} km", group_thousands(value.max(0.0).round() as u64))
}
