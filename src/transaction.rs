//! Typed transaction rows built from the canonical table

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use tracing::{info, warn};

use crate::data::{CUSTOMER_ID, LIST_PRICE, PROFIT, STANDARD_COST, TRANSACTION_DATE};
use crate::error::CohortError;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y"];
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// A single purchase by a customer
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub customer_id: String,
    pub transaction_date: NaiveDate,
    pub list_price: f64,
    pub standard_cost: f64,
    /// Always `list_price - standard_cost`
    pub profit: f64,
    /// Additional numeric columns
    pub numeric: BTreeMap<String, f64>,
    /// Categorical facets such as brand or product line
    pub categorical: BTreeMap<String, String>,
}

impl Transaction {
    pub fn new(
        customer_id: impl Into<String>,
        transaction_date: NaiveDate,
        list_price: f64,
        standard_cost: f64,
    ) -> Self {
        Self {
            customer_id: customer_id.into(),
            transaction_date,
            list_price,
            standard_cost,
            profit: list_price - standard_cost,
            numeric: BTreeMap::new(),
            categorical: BTreeMap::new(),
        }
    }

    pub fn with_category(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.categorical.insert(field.into(), value.into());
        self
    }

    pub fn with_numeric(mut self, field: impl Into<String>, value: f64) -> Self {
        self.numeric.insert(field.into(), value);
        self
    }

    /// Value of a numeric field, including the price columns and profit
    pub fn numeric_field(&self, field: &str) -> Option<f64> {
        match field {
            LIST_PRICE => Some(self.list_price),
            STANDARD_COST => Some(self.standard_cost),
            PROFIT => Some(self.profit),
            other => self.numeric.get(other).copied(),
        }
    }

    pub fn category(&self, field: &str) -> Option<&str> {
        self.categorical.get(field).map(String::as_str)
    }
}

impl AsRef<Transaction> for Transaction {
    fn as_ref(&self) -> &Transaction {
        self
    }
}

/// Parse a transaction date from the common textual layouts
pub fn parse_transaction_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
                .map(|datetime| datetime.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|d| d.date_naive()))
}

/// Immutable snapshot of typed transactions for one analysis session
#[derive(Debug, Clone, Default)]
pub struct TransactionTable {
    rows: Vec<Transaction>,
    /// Rows dropped for a missing customer or an unusable date
    rejected: usize,
}

impl TransactionTable {
    pub fn from_rows(rows: Vec<Transaction>) -> Self {
        Self { rows, rejected: 0 }
    }

    /// Convert a canonical frame (see [`crate::data::normalize`]) into typed rows
    ///
    /// Rows without a customer or a parseable date are rejected and counted.
    pub fn from_frame(df: &DataFrame) -> crate::Result<Self> {
        let customers = text_column(df, CUSTOMER_ID)?;
        let dates = text_column(df, TRANSACTION_DATE)?;
        let prices = numeric_column(df, LIST_PRICE)?;
        let costs = numeric_column(df, STANDARD_COST)?;

        let mut numeric_extras = Vec::new();
        let mut categorical_extras = Vec::new();
        for column in df.get_columns() {
            let name = column.name().as_str();
            if [CUSTOMER_ID, TRANSACTION_DATE, LIST_PRICE, STANDARD_COST, PROFIT].contains(&name) {
                continue;
            }
            if column.dtype() == &DataType::Float64 {
                numeric_extras.push((name.to_string(), numeric_column(df, name)?));
            } else {
                categorical_extras.push((name.to_string(), text_column(df, name)?));
            }
        }

        let mut rows = Vec::with_capacity(df.height());
        let mut rejected = 0;
        for i in 0..df.height() {
            let customer = customers[i].as_ref();
            let date = dates[i].as_deref().and_then(parse_transaction_date);
            let (Some(customer), Some(date), Some(price), Some(cost)) =
                (customer, date, prices[i], costs[i])
            else {
                rejected += 1;
                continue;
            };

            let mut transaction = Transaction::new(customer.clone(), date, price, cost);
            for (name, values) in &numeric_extras {
                if let Some(value) = values[i] {
                    transaction.numeric.insert(name.clone(), value);
                }
            }
            for (name, values) in &categorical_extras {
                if let Some(value) = &values[i] {
                    transaction.categorical.insert(name.clone(), value.clone());
                }
            }
            rows.push(transaction);
        }

        if rejected > 0 {
            warn!(rejected, "dropped transactions without a customer or a valid date");
        }
        info!(rows = rows.len(), "built transaction table");
        Ok(Self { rows, rejected })
    }

    pub fn rows(&self) -> &[Transaction] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rejected(&self) -> usize {
        self.rejected
    }

    /// Number of distinct customers
    pub fn customer_count(&self) -> usize {
        self.rows
            .iter()
            .map(|t| t.customer_id.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Names of categorical facets present on any row
    pub fn categorical_fields(&self) -> Vec<String> {
        self.rows
            .iter()
            .flat_map(|t| t.categorical.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Names of numeric fields, price columns and profit first
    pub fn numeric_fields(&self) -> Vec<String> {
        let extras: BTreeSet<String> = self
            .rows
            .iter()
            .flat_map(|t| t.numeric.keys().cloned())
            .collect();
        [LIST_PRICE, STANDARD_COST, PROFIT]
            .into_iter()
            .map(str::to_string)
            .chain(extras)
            .collect()
    }

    /// Sorted distinct values of a categorical facet
    pub fn facet_values(&self, field: &str) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|t| t.category(field))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Smallest and largest value of a numeric field
    pub fn numeric_range(&self, field: &str) -> Option<(f64, f64)> {
        self.rows
            .iter()
            .filter_map(|t| t.numeric_field(field))
            .fold(None, |range, value| match range {
                None => Some((value, value)),
                Some((min, max)) => Some((min.min(value), max.max(value))),
            })
    }
}

fn text_column(df: &DataFrame, name: &str) -> crate::Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| CohortError::missing_column(name))?;
    let as_text = column.as_materialized_series().cast(&DataType::String)?;
    let values = as_text
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect();
    Ok(values)
}

fn numeric_column(df: &DataFrame, name: &str) -> crate::Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| CohortError::missing_column(name))?;
    if column.dtype() == &DataType::String {
        return Err(CohortError::schema(name, "expected a numeric column"));
    }
    let as_float = column.as_materialized_series().cast(&DataType::Float64)?;
    let values = as_float.f64()?.into_iter().collect();
    Ok(values)
}
