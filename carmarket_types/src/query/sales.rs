use super::common::{like_ci, like_contains, Query, QueryCommon, SqlFilter, SqlParam};

/// Selects sales records by catalog maker/model name and year.
///
/// Sales only exist for catalog models, so make/model match catalog names
/// only. Rendered against the aliases `s` (sales), `m` (models) and `mk` (makers).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SalesQuery {
    pub common: QueryCommon,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
}

impl Query for SalesQuery {
    fn get_common(&mut self) -> &mut QueryCommon {
        &mut self.common
    }

    fn to_sql(&self) -> SqlFilter {
        let mut filter = SqlFilter::default();
        if let Some(make) = &self.make {
            let n = filter.bind(SqlParam::Text(like_contains(make)));
            filter.push(like_ci("mk.name", n));
        }
        if let Some(model) = &self.model {
            let n = filter.bind(SqlParam::Text(like_contains(model)));
            filter.push(like_ci("m.name", n));
        }
        if let Some(year) = self.year {
            let n = filter.bind(SqlParam::Integer(year as i64));
            filter.push(format!("s.year = ?{n}"));
        }
        filter
    }
}

impl SalesQuery {
    pub fn with_make(mut self, make: &str) -> Self {
        self.make = Some(make.to_string());
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    /// Stable key identifying the series this query selects.
    pub fn cache_key(&self) -> String {
        format!(
            "mk{}:m{}:y{:?}",
            self.make.as_deref().unwrap_or("").to_lowercase(),
            self.model.as_deref().unwrap_or("").to_lowercase(),
            self.year
        )
    }
}
