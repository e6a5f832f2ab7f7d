//! SQLite storage for listings, the make/model catalog, reference prices
//! and sales.
//!
//! SQLite has no `PERCENTILE_CONT` or `STDDEV`, so queries return record
//! subsets and the aggregates are computed by [`crate::stats`].

use std::path::Path;

use rusqlite::functions::FunctionFlags;
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, Row};
use serde::Serialize;
use tracing::warn;

use carmarket_types::{
    CatalogEntry, Listing, ListingQuery, PriceReference, Query, SaleRecord, SalesQuery, Specs,
    SqlFilter, SqlParam, YearlySales, CASE_FOLD_FN,
};

const SCHEMA_VERSION: i32 = 1;
/// Bound parameters per `IN (...)` chunk.
const IN_CHUNK: usize = 500;

#[derive(thiserror::Error, Debug)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Unit sales and market share of one maker.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct MarketShareRow {
    pub maker: String,
    pub model_count: i64,
    pub total_units: f64,
    pub market_share_percent: f64,
}

const LISTING_SELECT: &str = "SELECT l.id, l.url, l.title, l.price_eur, l.year, l.mileage_km,
        l.location, l.model_id, mk.name, m.name, l.extracted_make, l.extracted_model, l.specs
 FROM listings l
 LEFT JOIN models m ON m.id = l.model_id
 LEFT JOIN makers mk ON mk.id = m.maker_id";

pub struct Db {
    conn: Connection,
}

impl Db {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        register_functions(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        register_functions(&conn)?;
        Ok(Self { conn })
    }

    /// Applies the schema. Safe to call on an initialized database.
    pub fn init(&self) -> Result<(), DbError> {
        let schema = include_str!("../../schema/sqlite.sql");
        self.conn.execute_batch(schema)?;

        let version: i32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;
        if version < SCHEMA_VERSION {
            self.conn
                .pragma_update(None, "user_version", SCHEMA_VERSION)?;
        }
        Ok(())
    }

    /// Round-trips a trivial query to check the connection.
    pub fn ping(&self) -> Result<(), DbError> {
        self.conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    pub fn listing_count(&self) -> Result<i64, DbError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(1) FROM listings", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Listings matching `query`, joined with their catalog names.
    pub fn query_listings(&self, query: &ListingQuery) -> Result<Vec<Listing>, DbError> {
        let filter = query.to_sql();
        let mut sql = format!(
            "{} {} {}",
            LISTING_SELECT,
            filter.where_clause(),
            query.order_by()
        );
        if let Some(n) = query.common.limit {
            sql.push_str(&format!(" LIMIT {}", n));
        }
        self.fetch_listings(&sql, &filter)
    }

    /// Listings admissible for price model training.
    pub fn query_training_listings(&self) -> Result<Vec<Listing>, DbError> {
        let sql = format!(
            "{} WHERE l.price_eur > 0 AND l.price_eur < 1000000
               AND l.year IS NOT NULL AND l.year >= 1990
               AND l.mileage_km IS NOT NULL AND l.mileage_km >= 0 AND l.mileage_km < 500000
             ORDER BY l.id",
            LISTING_SELECT
        );
        self.fetch_listings(&sql, &SqlFilter::default())
    }

    fn fetch_listings(&self, sql: &str, filter: &SqlFilter) -> Result<Vec<Listing>, DbError> {
        let params_vec = bind_params(filter);
        let param_refs: Vec<&dyn ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();

        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(param_refs.as_slice(), listing_from_row)?;

        let mut result = Vec::new();
        for row in rows {
            let (mut listing, specs_json) = row?;
            listing.specs = parse_specs(listing.id, specs_json.as_deref());
            result.push(listing);
        }
        Ok(result)
    }

    /// Reference prices for the given catalog models.
    pub fn query_price_references(&self, model_ids: &[i64]) -> Result<Vec<PriceReference>, DbError> {
        let mut result = Vec::new();
        for chunk in model_ids.chunks(IN_CHUNK) {
            let placeholders: Vec<String> = (1..=chunk.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT model_id, year, entry_price_eur FROM prices
                 WHERE model_id IN ({}) ORDER BY model_id, year",
                placeholders.join(", ")
            );
            let param_refs: Vec<&dyn ToSql> = chunk.iter().map(|id| id as &dyn ToSql).collect();
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(param_refs.as_slice(), |row| {
                Ok(PriceReference {
                    model_id: row.get(0)?,
                    year: row.get(1)?,
                    entry_price_eur: row.get(2)?,
                })
            })?;
            for row in rows {
                result.push(row?);
            }
        }
        Ok(result)
    }

    /// Unit sales per year summed over every model matching `query`,
    /// oldest year first.
    pub fn query_yearly_sales(&self, query: &SalesQuery) -> Result<Vec<YearlySales>, DbError> {
        let filter = query.to_sql();
        let sql = format!(
            "SELECT s.year, SUM(s.units)
             FROM sales s
             JOIN models m ON m.id = s.model_id
             JOIN makers mk ON mk.id = m.maker_id
             {}
             GROUP BY s.year
             ORDER BY s.year",
            filter.where_clause()
        );
        let params_vec = bind_params(&filter);
        let param_refs: Vec<&dyn ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(param_refs.as_slice(), |row| {
            Ok(YearlySales {
                year: row.get(0)?,
                units: row.get(1)?,
            })
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Makers ranked by total units, with their share of all units sold.
    pub fn query_market_share(
        &self,
        year: Option<i32>,
        limit: i64,
    ) -> Result<Vec<MarketShareRow>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT mk.name,
                    COUNT(DISTINCT m.id),
                    SUM(s.units) AS total_units,
                    ROUND(100.0 * SUM(s.units) / SUM(SUM(s.units)) OVER (), 2)
             FROM sales s
             JOIN models m ON m.id = s.model_id
             JOIN makers mk ON mk.id = m.maker_id
             WHERE (?1 IS NULL OR s.year = ?1)
             GROUP BY mk.name
             ORDER BY total_units DESC, mk.name
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![year, limit], |row| {
            Ok(MarketShareRow {
                maker: row.get(0)?,
                model_count: row.get(1)?,
                total_units: row.get(2)?,
                market_share_percent: row.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
            })
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Resolves a make/model pair to catalog ids, creating either as needed.
    pub fn upsert_catalog_entry(&self, maker: &str, model: &str) -> Result<CatalogEntry, DbError> {
        let maker_id = self.upsert_maker(maker)?;
        let model_id = self.upsert_model(maker_id, model)?;
        Ok(CatalogEntry {
            maker_id,
            maker: maker.to_string(),
            model_id,
            model: model.to_string(),
        })
    }

    pub fn upsert_maker(&self, name: &str) -> Result<i64, DbError> {
        self.conn.execute(
            "INSERT INTO makers (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
            params![name],
        )?;
        let id = self
            .conn
            .query_row("SELECT id FROM makers WHERE name = ?1", params![name], |row| {
                row.get(0)
            })?;
        Ok(id)
    }

    pub fn upsert_model(&self, maker_id: i64, name: &str) -> Result<i64, DbError> {
        self.conn.execute(
            "INSERT INTO models (maker_id, name) VALUES (?1, ?2)
             ON CONFLICT(maker_id, name) DO NOTHING",
            params![maker_id, name],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM models WHERE maker_id = ?1 AND name = ?2",
            params![maker_id, name],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Inserts or replaces listings. A zero id lets SQLite assign one.
    /// Catalog names on the records are ignored; only `model_id` is stored.
    pub fn insert_listings(&mut self, listings: &[Listing]) -> Result<usize, DbError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO listings (id, url, title, price_eur, year, mileage_km, location,
                                       model_id, extracted_make, extracted_model, specs)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(id) DO UPDATE SET
                   url = excluded.url,
                   title = excluded.title,
                   price_eur = excluded.price_eur,
                   year = excluded.year,
                   mileage_km = excluded.mileage_km,
                   location = excluded.location,
                   model_id = excluded.model_id,
                   extracted_make = excluded.extracted_make,
                   extracted_model = excluded.extracted_model,
                   specs = excluded.specs",
            )?;
            for l in listings {
                let id = (l.id > 0).then_some(l.id);
                let specs = serde_json::to_string(&l.specs)?;
                stmt.execute(params![
                    id,
                    l.url,
                    l.title,
                    l.price_eur,
                    l.year,
                    l.mileage_km,
                    l.location,
                    l.model_id,
                    l.extracted_make,
                    l.extracted_model,
                    specs,
                ])?;
            }
        }
        tx.commit()?;
        Ok(listings.len())
    }

    pub fn insert_price_references(&mut self, references: &[PriceReference]) -> Result<usize, DbError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO prices (model_id, year, entry_price_eur) VALUES (?1, ?2, ?3)
                 ON CONFLICT(model_id, year) DO UPDATE SET entry_price_eur = excluded.entry_price_eur",
            )?;
            for r in references {
                stmt.execute(params![r.model_id, r.year, r.entry_price_eur])?;
            }
        }
        tx.commit()?;
        Ok(references.len())
    }

    pub fn insert_sales(&mut self, sales: &[SaleRecord]) -> Result<usize, DbError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO sales (model_id, year, units) VALUES (?1, ?2, ?3)
                 ON CONFLICT(model_id, year) DO UPDATE SET units = excluded.units",
            )?;
            for s in sales {
                stmt.execute(params![s.model_id, s.year, s.units])?;
            }
        }
        tx.commit()?;
        Ok(sales.len())
    }
}

fn bind_params(filter: &SqlFilter) -> Vec<Box<dyn ToSql>> {
    filter
        .params
        .iter()
        .map(|p| -> Box<dyn ToSql> {
            match p {
                SqlParam::Text(s) => Box::new(s.clone()),
                SqlParam::Integer(i) => Box::new(*i),
                SqlParam::Real(r) => Box::new(*r),
            }
        })
        .collect()
}

/// Unicode lowercasing for the query builders' case-insensitive `LIKE`.
fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        CASE_FOLD_FN,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| Ok(ctx.get::<Option<String>>(0)?.map(|s| s.to_lowercase())),
    )
}

fn listing_from_row(row: &Row<'_>) -> rusqlite::Result<(Listing, Option<String>)> {
    let listing = Listing {
        id: row.get(0)?,
        url: row.get(1)?,
        title: row.get(2)?,
        price_eur: row.get(3)?,
        year: row.get(4)?,
        mileage_km: row.get(5)?,
        location: row.get(6)?,
        model_id: row.get(7)?,
        catalog_make: row.get(8)?,
        catalog_model: row.get(9)?,
        extracted_make: row.get(10)?,
        extracted_model: row.get(11)?,
        specs: Specs::default(),
    };
    Ok((listing, row.get(12)?))
}

/// Malformed specs JSON degrades to an empty map.
fn parse_specs(id: i64, json: Option<&str>) -> Specs {
    match json {
        None => Specs::default(),
        Some(text) => serde_json::from_str(text).unwrap_or_else(|e| {
            warn!("Ignoring malformed specs on listing {}: {}", id, e);
            Specs::default()
        }),
    }
}
