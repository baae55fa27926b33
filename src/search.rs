//! Full-text vendor search.
//!
//! A search is a fixed base statement plus up to three optional filters. Each
//! filter contributes one SQL fragment with `?` markers and the values bound
//! to them. The fragments are collected in order first and rendered once, so
//! `$n` positions always line up with the bind list no matter which filters
//! are present.

use chrono::NaiveDate;
use diesel::{
    connection::DefaultLoadingMode,
    pg::Pg,
    prelude::*,
    sql_types::{Date, Text},
};

use crate::actions::collect_rows;
use crate::error::AppError;
use crate::models::{SearchParams, Vendor};

pub const SEARCH_LIMIT: i64 = 50;

const DATE_FORMAT: &str = "%Y-%m-%d";

const SELECT_VENDORS: &str = "SELECT id, vendor_id, title, description, category, price_range, location, \
     photos, rating, featured, created_at, updated_at FROM vendors";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchBind {
    Text(String),
    Date(NaiveDate),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Clause {
    fragment: &'static str,
    binds: Vec<SearchBind>,
}

impl Clause {
    fn new(fragment: &'static str, binds: Vec<SearchBind>) -> Self {
        debug_assert_eq!(fragment.matches('?').count(), binds.len());
        Self { fragment, binds }
    }
}

/// A rendered statement and its bind values, in placeholder order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchStatement {
    pub sql: String,
    pub binds: Vec<SearchBind>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorSearch {
    query: String,
    location: Option<String>,
    category: Option<String>,
    dates: Option<(NaiveDate, NaiveDate)>,
}

impl VendorSearch {
    /// Starts a search for `query`. Blank phrases are rejected.
    pub fn new(query: &str) -> Result<Self, AppError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::validation("Search query is required"));
        }
        Ok(Self {
            query: query.to_owned(),
            location: None,
            category: None,
            dates: None,
        })
    }

    pub fn location(mut self, location: &str) -> Self {
        self.location = non_blank(location);
        self
    }

    pub fn category(mut self, category: &str) -> Self {
        self.category = non_blank(category);
        self
    }

    /// Restricts results to vendors with no unavailability window touching
    /// `[from, to]`.
    pub fn available_between(mut self, from: NaiveDate, to: NaiveDate) -> Result<Self, AppError> {
        if from > to {
            return Err(AppError::validation("from_date must not be after to_date"));
        }
        self.dates = Some((from, to));
        Ok(self)
    }

    /// Builds a search from raw query-string values. The date filter only
    /// applies when both ends are given.
    pub fn from_params(params: &SearchParams) -> Result<Self, AppError> {
        let mut search = Self::new(params.q.as_deref().unwrap_or_default())?;
        if let Some(location) = &params.location {
            search = search.location(location);
        }
        if let Some(category) = &params.category {
            search = search.category(category);
        }
        let from = params.from_date.as_deref().and_then(non_blank);
        let to = params.to_date.as_deref().and_then(non_blank);
        if let (Some(from), Some(to)) = (from, to) {
            search = search.available_between(parse_date("from_date", &from)?, parse_date("to_date", &to)?)?;
        }
        Ok(search)
    }

    fn clauses(&self) -> Vec<Clause> {
        let mut clauses = vec![Clause::new(
            "search_vector @@ websearch_to_tsquery('english', ?)",
            vec![SearchBind::Text(self.query.clone())],
        )];

        if let Some(location) = &self.location {
            clauses.push(Clause::new(
                "location ILIKE ?",
                vec![SearchBind::Text(contains_pattern(location))],
            ));
        }

        if let Some(category) = &self.category {
            clauses.push(Clause::new(
                "category ILIKE ?",
                vec![SearchBind::Text(contains_pattern(category))],
            ));
        }

        if let Some((from, to)) = self.dates {
            // Overlap: stored window starts on or before the requested end and
            // ends on or after the requested start.
            clauses.push(Clause::new(
                "NOT EXISTS (SELECT 1 FROM vendor_bookings vb WHERE vb.vendor_id = vendors.id \
                 AND vb.booked_from <= ? AND vb.booked_to >= ?)",
                vec![SearchBind::Date(to), SearchBind::Date(from)],
            ));
        }

        clauses
    }

    pub fn to_statement(&self) -> SearchStatement {
        let mut binds = Vec::new();
        let conditions: Vec<String> = self
            .clauses()
            .into_iter()
            .map(|clause| render_clause(clause, &mut binds))
            .collect();

        // The text phrase is always the first bind.
        let sql = format!(
            "{} WHERE {} ORDER BY ts_rank(search_vector, websearch_to_tsquery('english', $1)) DESC, \
             created_at DESC LIMIT {}",
            SELECT_VENDORS,
            conditions.join(" AND "),
            SEARCH_LIMIT
        );

        SearchStatement { sql, binds }
    }
}

fn render_clause(clause: Clause, binds: &mut Vec<SearchBind>) -> String {
    let mut values = clause.binds.into_iter();
    let mut rendered = String::with_capacity(clause.fragment.len() + 4);
    for ch in clause.fragment.chars() {
        if ch != '?' {
            rendered.push(ch);
            continue;
        }
        if let Some(value) = values.next() {
            binds.push(value);
        }
        rendered.push('$');
        rendered.push_str(&binds.len().to_string());
    }
    rendered
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_owned())
}

/// `%value%` with LIKE wildcards in the user input escaped.
pub(crate) fn contains_pattern(value: &str) -> String {
    let mut pattern = String::with_capacity(value.len() + 2);
    pattern.push('%');
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

fn parse_date(name: &str, value: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| AppError::validation(format!("{} must be a date in YYYY-MM-DD format", name)))
}

/// Runs the search. Rows that fail to decode are logged and skipped.
pub fn search_vendors(conn: &mut PgConnection, search: &VendorSearch) -> Result<Vec<Vendor>, AppError> {
    let statement = search.to_statement();
    log::debug!("vendor search: {} ({} binds)", statement.sql, statement.binds.len());

    let mut query = diesel::sql_query(statement.sql).into_boxed::<Pg>();
    for bind in statement.binds {
        query = match bind {
            SearchBind::Text(value) => query.bind::<Text, _>(value),
            SearchBind::Date(value) => query.bind::<Date, _>(value),
        };
    }

    let rows = query.load_iter::<Vendor, DefaultLoadingMode>(conn)?;
    Ok(collect_rows(rows, "vendor search"))
}
