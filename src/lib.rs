//! CohortForge: customer retention cohort analysis
//!
//! This library turns a transaction log into a cohort retention matrix:
//! normalization, cohort assignment, period indexing and aggregation, with
//! optional filters applied before recomputation.

pub mod cli;
pub mod cohort;
pub mod data;
pub mod error;
pub mod filter;
pub mod logging;
pub mod period;
pub mod pipeline;
pub mod retention;
pub mod transaction;
pub mod viz;

// Re-export public items for easier access
pub use cli::Args;
pub use cohort::{assign_cohorts, AssignedTransaction, YearMonth};
pub use data::{normalize, CsvSource, FrameSource, TransactionSource};
pub use error::CohortError;
pub use filter::{Filter, FilterSet};
pub use period::{cohort_index, index_periods, IndexedTransaction};
pub use pipeline::{compute_retention, CohortBasis, CohortSession};
pub use retention::{build_retention, NoDataReason, RetentionMatrix, RetentionOutcome};
pub use transaction::{Transaction, TransactionTable};
pub use viz::generate_retention_report;

/// Result type of the cohort pipeline
pub type Result<T> = std::result::Result<T, CohortError>;

/// Result type used by the command-line and rendering layers
pub type AnyResult<T> = anyhow::Result<T>;
