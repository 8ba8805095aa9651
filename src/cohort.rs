//! Cohort assignment: purchase month and first-purchase month per transaction

use std::collections::HashMap;
use std::fmt;

use chrono::{Datelike, NaiveDate};

use crate::transaction::Transaction;

/// A calendar month, ordered chronologically
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// Truncate a date to its month
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Signed number of calendar months from `earlier` to `self`
    pub fn months_since(&self, earlier: YearMonth) -> i32 {
        (self.year - earlier.year) * 12 + self.month as i32 - earlier.month as i32
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// A transaction tagged with its own month and its customer's cohort month
#[derive(Debug, Clone, PartialEq)]
pub struct AssignedTransaction {
    pub transaction: Transaction,
    pub transaction_month: YearMonth,
    pub cohort_month: YearMonth,
}

impl AsRef<Transaction> for AssignedTransaction {
    fn as_ref(&self) -> &Transaction {
        &self.transaction
    }
}

/// Assign every transaction its purchase month and its customer's cohort
///
/// The cohort is the earliest purchase month of the customer within `rows`,
/// so the result does not depend on row order.
pub fn assign_cohorts<T: AsRef<Transaction>>(rows: &[T]) -> Vec<AssignedTransaction> {
    let mut cohorts: HashMap<&str, YearMonth> = HashMap::new();
    for row in rows {
        let transaction = row.as_ref();
        let month = YearMonth::from_date(transaction.transaction_date);
        cohorts
            .entry(transaction.customer_id.as_str())
            .and_modify(|cohort| *cohort = (*cohort).min(month))
            .or_insert(month);
    }

    rows.iter()
        .map(|row| {
            let transaction = row.as_ref();
            let transaction_month = YearMonth::from_date(transaction.transaction_date);
            let cohort_month = cohorts
                .get(transaction.customer_id.as_str())
                .copied()
                .unwrap_or(transaction_month);
            AssignedTransaction {
                transaction: transaction.clone(),
                transaction_month,
                cohort_month,
            }
        })
        .collect()
}

/// Cohort month per customer, keyed by customer id
pub fn customer_cohorts<T: AsRef<Transaction>>(rows: &[T]) -> HashMap<String, YearMonth> {
    assign_cohorts(rows)
        .into_iter()
        .map(|row| (row.transaction.customer_id, row.cohort_month))
        .collect()
}
