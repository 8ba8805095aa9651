//! End-to-end recomputation: filter, assign cohorts, index periods, aggregate

use clap::ValueEnum;
use polars::prelude::DataFrame;
use tracing::{debug, info};

use crate::cohort::assign_cohorts;
use crate::data::{normalize, TransactionSource};
use crate::filter::FilterSet;
use crate::period::index_periods;
use crate::retention::{build_retention, NoDataReason, RetentionOutcome};
use crate::transaction::{Transaction, TransactionTable};

/// Which transaction set cohorts are derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CohortBasis {
    /// Cohorts are recomputed on the filtered transactions
    #[default]
    Filtered,
    /// Cohorts come from the full table; filters only narrow the aggregation
    Full,
}

/// Compute the retention matrix for `rows` narrowed by `filters`
pub fn compute_retention(
    rows: &[Transaction],
    filters: &FilterSet,
    basis: CohortBasis,
) -> crate::Result<RetentionOutcome> {
    let indexed = match basis {
        CohortBasis::Filtered => {
            let filtered = filters.apply(rows);
            if filtered.is_empty() {
                return Ok(RetentionOutcome::NoData(NoDataReason::EmptyTransactionSet));
            }
            index_periods(assign_cohorts(&filtered))?
        }
        CohortBasis::Full => {
            let indexed = index_periods(assign_cohorts(rows))?;
            filters.apply(&indexed)
        }
    };

    debug!(rows = indexed.len(), basis = ?basis, "aggregating retention");
    Ok(build_retention(&indexed))
}

/// One analysis session over an immutable transaction snapshot
#[derive(Debug, Clone)]
pub struct CohortSession {
    frame: DataFrame,
    table: TransactionTable,
    basis: CohortBasis,
}

impl CohortSession {
    /// Load and normalize the snapshot from `source`
    pub fn load(source: &dyn TransactionSource) -> crate::Result<Self> {
        let raw = source.load()?;
        let frame = normalize(&raw)?;
        let table = TransactionTable::from_frame(&frame)?;
        info!(
            source = %source.describe(),
            transactions = table.len(),
            customers = table.customer_count(),
            "session loaded"
        );
        Ok(Self {
            frame,
            table,
            basis: CohortBasis::default(),
        })
    }

    pub fn with_basis(mut self, basis: CohortBasis) -> Self {
        self.basis = basis;
        self
    }

    /// The canonical table after normalization
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn table(&self) -> &TransactionTable {
        &self.table
    }

    pub fn basis(&self) -> CohortBasis {
        self.basis
    }

    /// Recompute the matrix for a filter selection; the snapshot is untouched
    pub fn recompute(&self, filters: &FilterSet) -> crate::Result<RetentionOutcome> {
        compute_retention(self.table.rows(), filters, self.basis)
    }
}
