//! Relative period indexing: months elapsed since the cohort month

use crate::cohort::{AssignedTransaction, YearMonth};
use crate::error::CohortError;
use crate::transaction::Transaction;

/// A transaction with its cohort and 1-based period index
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedTransaction {
    pub transaction: Transaction,
    pub transaction_month: YearMonth,
    pub cohort_month: YearMonth,
    /// 1 for the cohort's own month
    pub cohort_index: u32,
}

impl AsRef<Transaction> for IndexedTransaction {
    fn as_ref(&self) -> &Transaction {
        &self.transaction
    }
}

/// `(years between) * 12 + (months between) + 1`
///
/// Fails if the transaction month precedes the cohort month.
pub fn cohort_index(transaction_month: YearMonth, cohort_month: YearMonth) -> crate::Result<u32> {
    let elapsed = transaction_month.months_since(cohort_month);
    u32::try_from(elapsed + 1)
        .ok()
        .filter(|index| *index >= 1)
        .ok_or_else(|| CohortError::PeriodInvariant {
            transaction: transaction_month.to_string(),
            cohort: cohort_month.to_string(),
        })
}

pub fn index_periods(rows: Vec<AssignedTransaction>) -> crate::Result<Vec<IndexedTransaction>> {
    rows.into_iter()
        .map(|row| {
            let cohort_index = cohort_index(row.transaction_month, row.cohort_month)?;
            Ok(IndexedTransaction {
                transaction: row.transaction,
                transaction_month: row.transaction_month,
                cohort_month: row.cohort_month,
                cohort_index,
            })
        })
        .collect()
}
