//! Error taxonomy for the cohort pipeline

use thiserror::Error;

/// Fatal failures of the normalization and cohort pipeline.
///
/// An empty filter result is not an error; it surfaces as
/// [`crate::retention::RetentionOutcome::NoData`].
#[derive(Debug, Error)]
pub enum CohortError {
    /// A required column is missing, duplicated or has an incompatible type
    #[error("schema error in column `{column}`: {reason}")]
    Schema { column: String, reason: String },

    /// A numeric column has no present values to compute a mean from
    #[error("cannot impute column `{column}`: no non-missing values")]
    Imputation { column: String },

    /// A transaction month precedes its cohort month
    #[error("transaction month {transaction} precedes cohort month {cohort}")]
    PeriodInvariant { transaction: String, cohort: String },

    #[error(transparent)]
    Polars(#[from] polars::error::PolarsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CohortError {
    pub fn missing_column(column: &str) -> Self {
        Self::Schema {
            column: column.to_string(),
            reason: "required column is missing".to_string(),
        }
    }

    pub fn schema(column: &str, reason: impl Into<String>) -> Self {
        Self::Schema {
            column: column.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CohortError::missing_column("customer_id");
        assert_eq!(
            err.to_string(),
            "schema error in column `customer_id`: required column is missing"
        );

        let err = CohortError::Imputation {
            column: "list_price".to_string(),
        };
        assert!(err.to_string().contains("list_price"));
    }
}
