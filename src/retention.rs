//! Retention matrix: unique customers per (cohort, period) normalized by period 1

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cohort::YearMonth;
use crate::period::IndexedTransaction;

/// Why no matrix could be produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoDataReason {
    /// The (filtered) transaction set is empty
    EmptyTransactionSet,
    /// No cohort has any customers in its first period
    MissingBaseline,
}

impl fmt::Display for NoDataReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyTransactionSet => write!(f, "no transactions match the current filters"),
            Self::MissingBaseline => write!(f, "no cohort has a first-period baseline"),
        }
    }
}

/// Result of a retention computation
#[derive(Debug, Clone, PartialEq)]
pub enum RetentionOutcome {
    Matrix(RetentionMatrix),
    NoData(NoDataReason),
}

impl RetentionOutcome {
    pub fn matrix(&self) -> Option<&RetentionMatrix> {
        match self {
            Self::Matrix(matrix) => Some(matrix),
            Self::NoData(_) => None,
        }
    }

    pub fn into_matrix(self) -> Option<RetentionMatrix> {
        match self {
            Self::Matrix(matrix) => Some(matrix),
            Self::NoData(_) => None,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData(_))
    }
}

/// Cohort-by-period retention table
#[derive(Debug, Clone, PartialEq)]
pub struct RetentionMatrix {
    /// Row keys, chronological
    pub cohorts: Vec<YearMonth>,
    /// Column keys, `1..=max observed`
    pub periods: Vec<u32>,
    /// Distinct customers per cell; 0 where no transactions exist
    pub counts: Array2<usize>,
    /// Percentage of the period-1 baseline; `None` where there is no data
    pub retention: Array2<Option<f64>>,
}

impl RetentionMatrix {
    /// Row labels formatted as `YYYY-MM`
    pub fn cohort_labels(&self) -> Vec<String> {
        self.cohorts.iter().map(ToString::to_string).collect()
    }

    /// Period-1 customer count per cohort
    pub fn cohort_sizes(&self) -> Vec<usize> {
        self.counts.column(0).to_vec()
    }

    pub fn max_period(&self) -> u32 {
        self.periods.last().copied().unwrap_or(0)
    }

    pub fn get(&self, cohort: YearMonth, period: u32) -> Option<f64> {
        let row = self.cohorts.binary_search(&cohort).ok()?;
        let column = usize::try_from(period).ok()?.checked_sub(1)?;
        self.retention.get((row, column)).copied().flatten()
    }

    /// Retention values of one cohort in period order
    pub fn row(&self, cohort: YearMonth) -> Option<Vec<Option<f64>>> {
        let row = self.cohorts.binary_search(&cohort).ok()?;
        Some(self.retention.row(row).to_vec())
    }

    pub fn to_report(&self) -> RetentionReport {
        let cohorts = self
            .cohorts
            .iter()
            .enumerate()
            .map(|(i, cohort)| CohortReport {
                cohort: cohort.to_string(),
                size: self.counts[[i, 0]],
                retention: self
                    .periods
                    .iter()
                    .zip(self.retention.row(i))
                    .filter_map(|(&period, value)| value.map(|v| (period, v)))
                    .collect(),
            })
            .collect();

        RetentionReport {
            periods: self.periods.clone(),
            cohorts,
        }
    }
}

/// Serializable form of a matrix for external renderers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionReport {
    pub periods: Vec<u32>,
    pub cohorts: Vec<CohortReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortReport {
    pub cohort: String,
    pub size: usize,
    /// Period index to percentage; absent periods are omitted
    pub retention: BTreeMap<u32, f64>,
}

/// `round(count / baseline, 3) * 100`, with ties going to the even digit
pub fn retention_rate(count: usize, baseline: usize) -> f64 {
    (count as f64 / baseline as f64 * 1000.0).round_ties_even() / 10.0
}

/// Build the retention matrix from indexed transactions
///
/// Empty input and cohorts without a period-1 baseline are checked up front
/// and reported as [`RetentionOutcome::NoData`] rather than failing.
pub fn build_retention(rows: &[IndexedTransaction]) -> RetentionOutcome {
    if rows.is_empty() {
        return RetentionOutcome::NoData(NoDataReason::EmptyTransactionSet);
    }

    let mut customers: BTreeMap<(YearMonth, u32), HashSet<&str>> = BTreeMap::new();
    for row in rows {
        customers
            .entry((row.cohort_month, row.cohort_index))
            .or_default()
            .insert(row.transaction.customer_id.as_str());
    }

    let cohorts: Vec<YearMonth> = customers
        .keys()
        .map(|(cohort, _)| *cohort)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let max_period = customers.keys().map(|(_, period)| *period).max().unwrap_or(1);
    let periods: Vec<u32> = (1..=max_period).collect();

    let mut counts = Array2::<usize>::zeros((cohorts.len(), periods.len()));
    for ((cohort, period), ids) in &customers {
        // Both lookups succeed: keys were collected from the same map
        if let (Ok(row), Some(column)) = (
            cohorts.binary_search(cohort),
            (*period as usize).checked_sub(1),
        ) {
            counts[[row, column]] = ids.len();
        }
    }

    let mut retention = Array2::<Option<f64>>::from_elem(counts.dim(), None);
    let mut with_baseline = 0;
    for (i, cohort) in cohorts.iter().enumerate() {
        let baseline = counts[[i, 0]];
        if baseline == 0 {
            warn!(cohort = %cohort, "cohort has no period-1 customers, leaving row empty");
            continue;
        }
        with_baseline += 1;
        for (j, &count) in counts.row(i).iter().enumerate() {
            if count > 0 {
                retention[[i, j]] = Some(retention_rate(count, baseline));
            }
        }
    }

    if with_baseline == 0 {
        return RetentionOutcome::NoData(NoDataReason::MissingBaseline);
    }

    debug!(
        cohorts = cohorts.len(),
        periods = periods.len(),
        "built retention matrix"
    );
    RetentionOutcome::Matrix(RetentionMatrix {
        cohorts,
        periods,
        counts,
        retention,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Transaction;
    use chrono::NaiveDate;

    fn ym(year: i32, month: u32) -> YearMonth {
        YearMonth::new(year, month).unwrap()
    }

    fn indexed(customer: &str, cohort: YearMonth, period: u32) -> IndexedTransaction {
        let day = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        IndexedTransaction {
            transaction: Transaction::new(customer, day, 10.0, 5.0),
            transaction_month: cohort,
            cohort_month: cohort,
            cohort_index: period,
        }
    }

    #[test]
    fn test_retention_rate_rounding() {
        assert_eq!(retention_rate(1, 1), 100.0);
        assert_eq!(retention_rate(1, 3), 33.3);
        assert_eq!(retention_rate(2, 3), 66.7);
        assert_eq!(retention_rate(1, 8), 12.5);
    }

    #[test]
    fn test_retention_rate_ties_round_to_even() {
        // 0.0625 and 0.3125 sit exactly halfway at three decimals
        assert_eq!(retention_rate(1, 16), 6.2);
        assert_eq!(retention_rate(5, 16), 31.2);
        assert_eq!(retention_rate(3, 16), 18.8);
    }

    #[test]
    fn test_empty_input_is_no_data() {
        assert_eq!(
            build_retention(&[]),
            RetentionOutcome::NoData(NoDataReason::EmptyTransactionSet)
        );
    }

    #[test]
    fn test_counts_distinct_customers() {
        let jan = ym(2023, 1);
        let rows = vec![
            indexed("a", jan, 1),
            indexed("a", jan, 1),
            indexed("b", jan, 1),
            indexed("c", jan, 1),
            indexed("a", jan, 3),
        ];

        let matrix = build_retention(&rows).into_matrix().unwrap();
        assert_eq!(matrix.periods, vec![1, 2, 3]);
        assert_eq!(matrix.cohort_sizes(), vec![3]);
        assert_eq!(matrix.row(jan).unwrap(), vec![Some(100.0), None, Some(33.3)]);
        assert_eq!(matrix.get(jan, 2), None);
        assert_eq!(matrix.get(jan, 0), None);
    }

    #[test]
    fn test_rows_sorted_chronologically() {
        let rows = vec![
            indexed("x", ym(2023, 3), 1),
            indexed("y", ym(2022, 12), 1),
            indexed("z", ym(2023, 1), 1),
        ];

        let matrix = build_retention(&rows).into_matrix().unwrap();
        assert_eq!(matrix.cohort_labels(), vec!["2022-12", "2023-01", "2023-03"]);
        for cohort in &matrix.cohorts {
            assert_eq!(matrix.get(*cohort, 1), Some(100.0));
        }
    }

    #[test]
    fn test_missing_baseline() {
        let jan = ym(2023, 1);
        let feb = ym(2023, 2);

        let outcome = build_retention(&[indexed("a", jan, 2)]);
        assert_eq!(outcome, RetentionOutcome::NoData(NoDataReason::MissingBaseline));

        let matrix = build_retention(&[indexed("a", jan, 2), indexed("b", feb, 1)])
            .into_matrix()
            .unwrap();
        assert_eq!(matrix.row(jan).unwrap(), vec![None, None]);
        assert_eq!(matrix.get(feb, 1), Some(100.0));
    }

    #[test]
    fn test_report_omits_absent_cells() {
        let jan = ym(2023, 1);
        let rows = vec![indexed("a", jan, 1), indexed("b", jan, 1), indexed("a", jan, 3)];

        let report = build_retention(&rows).into_matrix().unwrap().to_report();
        assert_eq!(report.periods, vec![1, 2, 3]);
        assert_eq!(report.cohorts[0].cohort, "2023-01");
        assert_eq!(report.cohorts[0].size, 2);
        assert_eq!(
            report.cohorts[0].retention,
            BTreeMap::from([(1, 100.0), (3, 50.0)])
        );

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"1\":100.0"));
        let parsed: RetentionReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report);
    }
}
