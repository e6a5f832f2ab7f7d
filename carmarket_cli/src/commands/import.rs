//! Store setup (`init`) and batch CSV import (`import`).
//!
//! Expected CSV headers:
//!
//! - listings: `id,url,title,price_eur,year,mileage_km,location,make,model,extracted_make,extracted_model,specs`
//!   (`specs` is a JSON object; `make`/`model` link the listing to the catalog)
//! - prices: `make,model,year,entry_price_eur`
//! - sales: `make,model,year,units`
//!
//! Empty cells are read as missing values.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use carmarket_lib::types::{Listing, PriceReference, SaleRecord, Specs};
use carmarket_lib::Db;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;

/// Arguments for the `import` subcommand.
#[derive(Args)]
pub struct ImportArgs {
    /// Listings CSV file
    #[arg(long)]
    pub listings: Option<PathBuf>,

    /// Reference (original) prices CSV file
    #[arg(long)]
    pub prices: Option<PathBuf>,

    /// Yearly unit sales CSV file
    #[arg(long)]
    pub sales: Option<PathBuf>,
}

#[derive(Deserialize, Debug)]
struct ListingRecord {
    id: Option<i64>,
    url: Option<String>,
    title: Option<String>,
    price_eur: Option<f64>,
    year: Option<i32>,
    mileage_km: Option<f64>,
    location: Option<String>,
    make: Option<String>,
    model: Option<String>,
    extracted_make: Option<String>,
    extracted_model: Option<String>,
    specs: Option<String>,
}

#[derive(Deserialize, Debug)]
struct PriceRecord {
    make: String,
    model: String,
    year: i32,
    entry_price_eur: f64,
}

#[derive(Deserialize, Debug)]
struct SalesRecord {
    make: String,
    model: String,
    year: i32,
    units: f64,
}

/// Resolves make/model names to catalog model ids, creating entries once.
struct CatalogResolver<'a> {
    db: &'a Db,
    ids: HashMap<(String, String), i64>,
}

impl<'a> CatalogResolver<'a> {
    fn new(db: &'a Db) -> Self {
        Self {
            db,
            ids: HashMap::new(),
        }
    }

    fn model_id(&mut self, make: &str, model: &str) -> Result<i64> {
        let key = (make.trim().to_string(), model.trim().to_string());
        if let Some(id) = self.ids.get(&key) {
            return Ok(*id);
        }
        let entry = self.db.upsert_catalog_entry(&key.0, &key.1)?;
        self.ids.insert(key, entry.model_id);
        Ok(entry.model_id)
    }
}

fn read_records<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("cannot open {}", path.display()))?;
    let mut records = Vec::new();
    for (i, record) in rdr.deserialize().enumerate() {
        let record: T =
            record.with_context(|| format!("{}: invalid row {}", path.display(), i + 2))?;
        records.push(record);
    }
    Ok(records)
}

fn progress(len: usize, message: &'static str) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(ProgressStyle::with_template(
        "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}",
    )?);
    pb.set_message(message);
    Ok(pb)
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn to_listing(record: ListingRecord, model_id: Option<i64>, row: usize) -> Result<Listing> {
    let specs = match blank_to_none(record.specs) {
        Some(json) => serde_json::from_str::<Specs>(&json)
            .with_context(|| format!("row {}: specs is not a JSON object", row))?,
        None => Specs::default(),
    };
    Ok(Listing {
        id: record.id.unwrap_or(0),
        url: blank_to_none(record.url),
        title: blank_to_none(record.title),
        price_eur: record.price_eur,
        year: record.year,
        mileage_km: record.mileage_km,
        location: blank_to_none(record.location),
        model_id,
        catalog_make: None,
        catalog_model: None,
        extracted_make: blank_to_none(record.extracted_make),
        extracted_model: blank_to_none(record.extracted_model),
        specs,
    })
}

fn import_listings(db: &mut Db, path: &Path) -> Result<usize> {
    let records: Vec<ListingRecord> = read_records(path)?;
    let pb = progress(records.len(), "resolving catalog models...")?;
    let mut listings = Vec::with_capacity(records.len());
    {
        let mut catalog = CatalogResolver::new(db);
        for (i, mut record) in records.into_iter().enumerate() {
            let make = blank_to_none(record.make.take());
            let model = blank_to_none(record.model.take());
            let model_id = match (make, model) {
                (Some(make), Some(model)) => Some(catalog.model_id(&make, &model)?),
                _ => None,
            };
            listings.push(to_listing(record, model_id, i + 2)?);
            pb.inc(1);
        }
    }
    pb.finish_and_clear();
    Ok(db.insert_listings(&listings)?)
}

fn import_prices(db: &mut Db, path: &Path) -> Result<usize> {
    let records: Vec<PriceRecord> = read_records(path)?;
    let mut references = Vec::with_capacity(records.len());
    {
        let mut catalog = CatalogResolver::new(db);
        for r in records {
            references.push(PriceReference {
                model_id: catalog.model_id(&r.make, &r.model)?,
                year: r.year,
                entry_price_eur: r.entry_price_eur,
            });
        }
    }
    Ok(db.insert_price_references(&references)?)
}

fn import_sales(db: &mut Db, path: &Path) -> Result<usize> {
    let records: Vec<SalesRecord> = read_records(path)?;
    let mut sales = Vec::with_capacity(records.len());
    {
        let mut catalog = CatalogResolver::new(db);
        for r in records {
            sales.push(SaleRecord {
                model_id: catalog.model_id(&r.make, &r.model)?,
                year: r.year,
                units: r.units,
            });
        }
    }
    Ok(db.insert_sales(&sales)?)
}

pub fn run_init(db_path: &Path) -> Result<()> {
    let db = Db::open(db_path)?;
    db.init()?;
    eprintln!("Initialized {}", db_path.display());
    Ok(())
}

pub fn run(args: &ImportArgs, db_path: &Path) -> Result<()> {
    if args.listings.is_none() && args.prices.is_none() && args.sales.is_none() {
        bail!("Nothing to import: pass at least one of --listings, --prices, --sales");
    }

    let mut db = Db::open(db_path)?;
    db.init()?;

    if let Some(path) = &args.listings {
        let n = import_listings(&mut db, path)?;
        eprintln!("Imported {} listings from {}", n, path.display());
    }
    if let Some(path) = &args.prices {
        let n = import_prices(&mut db, path)?;
        eprintln!("Imported {} reference prices from {}", n, path.display());
    }
    if let Some(path) = &args.sales {
        let n = import_sales(&mut db, path)?;
        eprintln!("Imported {} sales records from {}", n, path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use carmarket_lib::ListingQuery;

    fn write_temp(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("carmarket_{}_{}", std::process::id(), name));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_import_listings_links_catalog_and_specs() {
        let path = write_temp(
            "listings.csv",
            "id,url,title,price_eur,year,mileage_km,location,make,model,extracted_make,extracted_model,specs\n\
             1,,Golf 1.6,12000,2018,90000,Zagreb,Volkswagen,Golf,,,\"{\"\"fuel\"\": \"\"Diesel\"\"}\"\n\
             2,,Raw ad,,2017,,Split,,,VW,golf 7,\n",
        );
        let mut db = Db::open_in_memory().unwrap();
        db.init().unwrap();
        assert_eq!(import_listings(&mut db, &path).unwrap(), 2);
        std::fs::remove_file(&path).ok();

        let rows = db.query_listings(&ListingQuery::default()).unwrap();
        assert_eq!(rows[0].catalog_model.as_deref(), Some("Golf"));
        assert_eq!(rows[0].specs.text_or("fuel", ""), "diesel");
        assert_eq!(rows[1].model_id, None);
        assert_eq!(rows[1].price_eur, None);
        assert_eq!(rows[1].extracted_model.as_deref(), Some("golf 7"));
    }

    #[test]
    fn test_import_listings_rejects_bad_specs() {
        let path = write_temp(
            "bad_specs.csv",
            "id,url,title,price_eur,year,mileage_km,location,make,model,extracted_make,extracted_model,specs\n\
             1,,,1000,2018,1000,,,,,,not-json\n",
        );
        let mut db = Db::open_in_memory().unwrap();
        db.init().unwrap();
        let err = import_listings(&mut db, &path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(err.to_string().contains("row 2"));
    }

    #[test]
    fn test_import_sales_reuses_catalog_ids() {
        let path = write_temp(
            "sales.csv",
            "make,model,year,units\nVolkswagen,Golf,2020,100\nVolkswagen,Golf,2021,120\n",
        );
        let mut db = Db::open_in_memory().unwrap();
        db.init().unwrap();
        assert_eq!(import_sales(&mut db, &path).unwrap(), 2);
        std::fs::remove_file(&path).ok();

        let share = db.query_market_share(None, 20).unwrap();
        assert_eq!(share.len(), 1);
        assert_eq!(share[0].model_count, 1);
        assert_eq!(share[0].total_units, 220.0);
    }
}
