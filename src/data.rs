//! CSV loading, column-role resolution and typed row extraction using Polars

use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;

use crate::error::AnalyticsError;

/// Header tokens recognized for each column role. Matching is
/// case-insensitive substring search, first declared column wins. The sets
/// cover common Spanish-language export headers plus English equivalents.
pub const DATE_TOKENS: &[&str] = &["fecha", "date"];
pub const AMOUNT_TOKENS: &[&str] = &["total", "monto", "venta", "amount", "sale"];
pub const CUSTOMER_TOKENS: &[&str] = &["cliente", "customer", "company", "empresa", "entity"];

/// Date formats tried in order when parsing the date column.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Column roles inferred from the raw headers. Computed once per upload and
/// immutable afterward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSchema {
    pub date_column: String,
    pub amount_column: String,
    /// Absent customer column only disables segmentation downstream.
    pub customer_column: Option<String>,
}

/// One cleaned transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct SalesRow {
    pub date: NaiveDate,
    pub amount: f64,
    pub customer: Option<String>,
}

/// The cleaned, typed table every pipeline stage reads from. Rows are sorted
/// ascending by date and never mutated; each stage computes its own
/// projection.
#[derive(Debug, Clone)]
pub struct SalesTable {
    pub schema: ResolvedSchema,
    pub rows: Vec<SalesRow>,
}

impl SalesTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn total_revenue(&self) -> f64 {
        self.rows.iter().map(|r| r.amount).sum()
    }

    pub fn avg_ticket(&self) -> f64 {
        if self.rows.is_empty() {
            0.0
        } else {
            self.total_revenue() / self.rows.len() as f64
        }
    }

    pub fn amounts(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.amount).collect()
    }

    /// Latest transaction date. Rows are date-sorted, so this is the last row.
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.last().map(|r| r.date)
    }
}

/// Infer column roles from raw header names.
///
/// Missing date or amount column is fatal for the whole pipeline; a missing
/// customer column is not.
pub fn resolve_schema(headers: &[&str]) -> crate::Result<ResolvedSchema> {
    let date_column = find_column(headers, DATE_TOKENS);
    let amount_column = find_column(headers, AMOUNT_TOKENS);
    let customer_column = find_column(headers, CUSTOMER_TOKENS);

    match (date_column, amount_column) {
        (Some(date), Some(amount)) => Ok(ResolvedSchema {
            date_column: date,
            amount_column: amount,
            customer_column,
        }),
        (date, amount) => {
            let mut missing = Vec::new();
            if date.is_none() {
                missing.push("date");
            }
            if amount.is_none() {
                missing.push("amount");
            }
            Err(AnalyticsError::MissingRequiredColumns {
                missing: missing.join(", "),
                headers: headers.iter().map(|h| h.to_string()).collect(),
            }
            .into())
        }
    }
}

/// First header containing any of the tokens, case-insensitive.
fn find_column(headers: &[&str], tokens: &[&str]) -> Option<String> {
    headers
        .iter()
        .find(|h| {
            let lower = h.to_lowercase();
            tokens.iter().any(|t| lower.contains(t))
        })
        .map(|h| h.to_string())
}

/// Load a CSV export, resolve its schema and extract a cleaned `SalesTable`.
///
/// Rows with an unparseable date or a non-finite amount are dropped (and
/// counted in a warning); an input that cleans down to nothing is an error.
pub fn load_sales_table(path: &str) -> crate::Result<SalesTable> {
    let df = CsvReader::from_path(path)?.has_header(true).finish()?;
    let headers = df.get_column_names();
    let schema = resolve_schema(&headers)?;
    extract_rows(&df, schema)
}

fn extract_rows(df: &DataFrame, schema: ResolvedSchema) -> crate::Result<SalesTable> {
    let dates = df.column(&schema.date_column)?.cast(&DataType::String)?;
    let dates = dates.str()?;
    let amounts = df.column(&schema.amount_column)?.cast(&DataType::Float64)?;
    let amounts = amounts.f64()?;
    let customers = match &schema.customer_column {
        Some(name) => Some(df.column(name)?.cast(&DataType::String)?),
        None => None,
    };
    let customers = match &customers {
        Some(series) => Some(series.str()?),
        None => None,
    };

    let mut rows = Vec::with_capacity(df.height());
    let mut dropped = 0usize;
    for i in 0..df.height() {
        let date = dates.get(i).and_then(parse_date);
        let amount = amounts.get(i).filter(|a| a.is_finite());
        match (date, amount) {
            (Some(date), Some(amount)) => {
                let customer = customers
                    .and_then(|c| c.get(i))
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty());
                rows.push(SalesRow {
                    date,
                    amount,
                    customer,
                });
            }
            _ => dropped += 1,
        }
    }

    if dropped > 0 {
        log::warn!("dropped {dropped} rows with invalid date or amount");
    }
    if rows.is_empty() {
        return Err(AnalyticsError::EmptyTable.into());
    }

    rows.sort_by_key(|r| r.date);
    log::debug!(
        "loaded {} rows ({} -> {})",
        rows.len(),
        rows.first().map(|r| r.date).unwrap_or_default(),
        rows.last().map(|r| r.date).unwrap_or_default()
    );
    Ok(SalesTable { schema, rows })
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }
    None
}
