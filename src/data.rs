//! Transaction loading and normalization using Polars

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::error::CohortError;
use crate::filter::CHANNEL_FIELD;

pub const CUSTOMER_ID: &str = "customer_id";
pub const TRANSACTION_DATE: &str = "transaction_date";
pub const LIST_PRICE: &str = "list_price";
pub const STANDARD_COST: &str = "standard_cost";
pub const PROFIT: &str = "profit";

/// Columns every transaction table must provide
pub const REQUIRED_COLUMNS: [&str; 4] = [CUSTOMER_ID, TRANSACTION_DATE, LIST_PRICE, STANDARD_COST];

/// Supplies the raw transaction table for an analysis session
pub trait TransactionSource {
    /// Load the raw, unnormalized table
    fn load(&self) -> crate::Result<DataFrame>;

    /// Human-readable origin of the data, used in logs
    fn describe(&self) -> String;
}

/// Reads transactions from a CSV file with a header row
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TransactionSource for CsvSource {
    fn load(&self) -> crate::Result<DataFrame> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(10_000))
            .try_into_reader_with_file_path(Some(self.path.clone()))?
            .finish()?;

        info!(
            source = %self.path.display(),
            rows = df.height(),
            columns = df.width(),
            "loaded raw transactions"
        );
        Ok(df)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Serves an in-memory table, mainly as a test fixture
#[derive(Debug, Clone)]
pub struct FrameSource {
    frame: DataFrame,
}

impl FrameSource {
    pub fn new(frame: DataFrame) -> Self {
        Self { frame }
    }
}

impl TransactionSource for FrameSource {
    fn load(&self) -> crate::Result<DataFrame> {
        Ok(self.frame.clone())
    }

    fn describe(&self) -> String {
        format!("in-memory frame ({} rows)", self.frame.height())
    }
}

/// How a column is treated during normalization, with its cleaned values
enum ColumnKind {
    Key(Vec<Option<String>>),
    Numeric(Vec<Option<f64>>),
    Categorical(Vec<Option<String>>),
}

/// Normalize a raw transaction table into the canonical schema
///
/// Column names are trimmed and lower-cased, blank strings become missing,
/// numeric gaps are filled with the column mean and categorical gaps with the
/// column mode. `profit` is derived last from the imputed prices, so
/// normalizing a canonical table again changes nothing.
///
/// # Errors
/// * `Schema` if a required column is absent, duplicated or non-numeric
/// * `Imputation` if a numeric column has no values to average
pub fn normalize(raw: &DataFrame) -> crate::Result<DataFrame> {
    let mut seen = HashSet::new();
    let mut columns: Vec<Column> = Vec::with_capacity(raw.width() + 1);
    let mut list_price: Option<Vec<f64>> = None;
    let mut standard_cost: Option<Vec<f64>> = None;

    for column in raw.get_columns() {
        let name = column.name().as_str().trim().to_lowercase();
        if !seen.insert(name.clone()) {
            return Err(CohortError::schema(&name, "duplicate column after case folding"));
        }
        // Always re-derived from the imputed prices below
        if name == PROFIT {
            continue;
        }

        let series = column.as_materialized_series();
        let normalized = match classify(&name, series)? {
            ColumnKind::Key(values) => Series::new(name.as_str().into(), values),
            ColumnKind::Numeric(values) => {
                let filled = impute_mean(&name, values)?;
                if name == LIST_PRICE {
                    list_price = Some(filled.clone());
                } else if name == STANDARD_COST {
                    standard_cost = Some(filled.clone());
                }
                Series::new(name.as_str().into(), filled)
            }
            ColumnKind::Categorical(values) => {
                Series::new(name.as_str().into(), impute_mode(&name, values))
            }
        };
        columns.push(Column::from(normalized));
    }

    for required in REQUIRED_COLUMNS {
        if !seen.contains(required) {
            return Err(CohortError::missing_column(required));
        }
    }

    let list_price = list_price.ok_or_else(|| CohortError::missing_column(LIST_PRICE))?;
    let standard_cost = standard_cost.ok_or_else(|| CohortError::missing_column(STANDARD_COST))?;
    let profit: Vec<f64> = list_price
        .iter()
        .zip(standard_cost.iter())
        .map(|(price, cost)| price - cost)
        .collect();
    columns.push(Column::from(Series::new(PROFIT.into(), profit)));

    let df = DataFrame::new(columns)?;
    info!(rows = df.height(), columns = df.width(), "normalized transaction table");
    Ok(df)
}

/// Print-friendly head of a table
pub fn preview(df: &DataFrame, rows: usize) -> DataFrame {
    df.head(Some(rows))
}

fn classify(name: &str, series: &Series) -> crate::Result<ColumnKind> {
    if name == CUSTOMER_ID || name == TRANSACTION_DATE {
        return Ok(ColumnKind::Key(string_values(series)?));
    }
    if name == CHANNEL_FIELD {
        return Ok(ColumnKind::Categorical(string_values(series)?));
    }

    let required_numeric = name == LIST_PRICE || name == STANDARD_COST;

    if is_numeric_dtype(series.dtype()) {
        let values = series
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|value| value.filter(|v| !v.is_nan()))
            .collect();
        return Ok(ColumnKind::Numeric(values));
    }

    let values = string_values(series)?;
    let parsed: Vec<Option<f64>> = values
        .iter()
        .map(|value| value.as_deref().and_then(|v| v.trim().parse::<f64>().ok()))
        .collect();
    let present = values.iter().filter(|v| v.is_some()).count();
    let numeric = parsed.iter().filter(|v| v.is_some()).count();

    if required_numeric {
        if numeric != present {
            return Err(CohortError::schema(name, "expected numeric values"));
        }
        if present == 0 && !values.is_empty() {
            return Err(CohortError::Imputation {
                column: name.to_string(),
            });
        }
        return Ok(ColumnKind::Numeric(parsed));
    }

    if present > 0 && numeric == present {
        Ok(ColumnKind::Numeric(parsed))
    } else {
        Ok(ColumnKind::Categorical(values))
    }
}

fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int32
            | DataType::Int64
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Column values as strings, with blank placeholders mapped to missing
fn string_values(series: &Series) -> crate::Result<Vec<Option<String>>> {
    let as_text = series.cast(&DataType::String)?;
    let values = as_text
        .str()?
        .into_iter()
        .map(|value| {
            value
                .filter(|v| !v.trim().is_empty())
                .map(str::to_string)
        })
        .collect();
    Ok(values)
}

fn impute_mean(name: &str, values: Vec<Option<f64>>) -> crate::Result<Vec<f64>> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let missing = values.len() - present.len();
    if missing == 0 {
        return Ok(present);
    }
    if present.is_empty() {
        return Err(CohortError::Imputation {
            column: name.to_string(),
        });
    }

    let mean = present.iter().sum::<f64>() / present.len() as f64;
    debug!(column = name, missing, mean, "imputed numeric column with mean");
    Ok(values.into_iter().map(|v| v.unwrap_or(mean)).collect())
}

fn impute_mode(name: &str, values: Vec<Option<String>>) -> Vec<Option<String>> {
    let missing = values.iter().filter(|v| v.is_none()).count();
    if missing == 0 {
        return values;
    }

    let Some(mode) = mode(&values) else {
        warn!(column = name, "categorical column has no values, leaving it missing");
        return values;
    };

    debug!(column = name, missing, mode = %mode, "imputed categorical column with mode");
    values
        .into_iter()
        .map(|v| v.or_else(|| Some(mode.clone())))
        .collect()
}

/// Most frequent present value; ties go to the value seen first
fn mode(values: &[Option<String>]) -> Option<String> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (position, value) in values.iter().enumerate() {
        if let Some(value) = value {
            let entry = counts.entry(value.as_str()).or_insert((0, position));
            entry.0 += 1;
        }
    }

    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(value, _)| value.to_string())
}
