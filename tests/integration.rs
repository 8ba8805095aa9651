//! Integration tests for CohortForge

use cohortforge::data::{LIST_PRICE, PROFIT};
use cohortforge::filter::{Channel, CHANNEL_FIELD};
use cohortforge::{
    compute_retention, normalize, CohortBasis, CohortError, CohortSession, CsvSource, Filter,
    FilterSet, FrameSource, NoDataReason, RetentionOutcome, TransactionSource, TransactionTable,
    YearMonth,
};
use polars::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

/// Create a test CSV file with bike shop transactions
fn create_test_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "Transaction_ID,Customer_ID,Transaction_Date,Online_Order,Brand,Product_Line,List_Price,Standard_Cost"
    )
    .unwrap();

    // Customer 1 - January cohort, returns in February and April
    writeln!(file, "1,1,2017-01-15,True,Solex,Standard,100.0,60.0").unwrap();
    writeln!(file, "2,1,2017-02-10,False,Trek Bicycles,Road,100.0,60.0").unwrap();
    writeln!(file, "3,1,2017-04-02,True,Solex,Standard,300.0,100.0").unwrap();

    // Customer 2 - January cohort, never returns
    writeln!(file, "4,2,2017-01-20,False,Giant Bicycles,Standard,50.0,20.0").unwrap();

    // Customer 3 - January cohort, returns in February; missing cost and brand
    writeln!(file, "5,3,2017-01-03,True,Solex,Road,80.0,").unwrap();
    writeln!(file, "6,3,2017-02-28,True, ,Standard,1200.0,500.0").unwrap();

    // Customer 4 - February cohort
    writeln!(file, "7,4,2017-02-01,False,Trek Bicycles,Touring,2000.0,400.0").unwrap();

    // Customer 5 - row without a usable date
    writeln!(file, "8,5,,True,Solex,Standard,70.0,30.0").unwrap();

    file
}

fn ym(year: i32, month: u32) -> YearMonth {
    YearMonth::new(year, month).unwrap()
}

fn load_session(file: &NamedTempFile) -> CohortSession {
    CohortSession::load(&CsvSource::new(file.path())).unwrap()
}

#[test]
fn test_end_to_end_pipeline() {
    let test_file = create_test_csv();
    let session = load_session(&test_file);

    // Row 8 has no date
    assert_eq!(session.table().len(), 7);
    assert_eq!(session.table().rejected(), 1);
    assert_eq!(session.table().customer_count(), 4);

    let outcome = session.recompute(&FilterSet::new()).unwrap();
    let matrix = outcome.matrix().unwrap();

    assert_eq!(matrix.cohort_labels(), vec!["2017-01", "2017-02"]);
    assert_eq!(matrix.periods, vec![1, 2, 3, 4]);
    assert_eq!(matrix.cohort_sizes(), vec![3, 1]);

    let jan = matrix.row(ym(2017, 1)).unwrap();
    assert_eq!(jan, vec![Some(100.0), Some(66.7), None, Some(33.3)]);

    let feb = matrix.row(ym(2017, 2)).unwrap();
    assert_eq!(feb, vec![Some(100.0), None, None, None]);
}

#[test]
fn test_every_cohort_starts_at_100() {
    let test_file = create_test_csv();
    let session = load_session(&test_file);

    for basis in [CohortBasis::Filtered, CohortBasis::Full] {
        let filters = FilterSet::new().with(Filter::above(PROFIT, 35.0));
        let outcome = session.clone().with_basis(basis).recompute(&filters).unwrap();
        let matrix = outcome.matrix().unwrap();

        for (i, cohort) in matrix.cohorts.iter().enumerate() {
            if matrix.counts[[i, 0]] > 0 {
                assert_eq!(matrix.get(*cohort, 1), Some(100.0));
            }
        }
    }
}

#[test]
fn test_imputation_in_loaded_data() {
    let test_file = create_test_csv();
    let session = load_session(&test_file);

    // Row 5's cost is the mean of the seven present costs
    let present = [60.0, 60.0, 100.0, 20.0, 500.0, 400.0, 30.0];
    let mean = present.iter().sum::<f64>() / present.len() as f64;

    let row = session
        .table()
        .rows()
        .iter()
        .find(|t| t.customer_id == "3" && t.list_price == 80.0)
        .unwrap();
    assert!((row.standard_cost - mean).abs() < 1e-9);
    assert!((row.profit - (80.0 - mean)).abs() < 1e-9);

    // Row 6's blank brand takes the most frequent brand
    let row = session
        .table()
        .rows()
        .iter()
        .find(|t| t.customer_id == "3" && t.list_price == 1200.0)
        .unwrap();
    assert_eq!(row.category("brand"), Some("Solex"));
}

#[test]
fn test_scenario_a() {
    let raw = df!(
        "customer_id" => &[1i64, 1, 2],
        "transaction_date" => &["2023-01-15", "2023-02-10", "2023-02-01"],
        "list_price" => &[100.0, 100.0, 50.0],
        "standard_cost" => &[60.0, 60.0, 20.0],
    )
    .unwrap();

    let session = CohortSession::load(&FrameSource::new(raw)).unwrap();
    let matrix = session.recompute(&FilterSet::new()).unwrap().into_matrix().unwrap();

    assert_eq!(matrix.get(ym(2023, 1), 1), Some(100.0));
    assert_eq!(matrix.get(ym(2023, 1), 2), Some(100.0));
    assert_eq!(matrix.get(ym(2023, 2), 1), Some(100.0));
    assert_eq!(matrix.get(ym(2023, 2), 2), None);
}

#[test]
fn test_scenario_b_absent_category_is_no_data() {
    let test_file = create_test_csv();
    let session = load_session(&test_file);

    let filters = FilterSet::new().with(Filter::category("brand", ["Cannondale"]));
    let outcome = session.recompute(&filters).unwrap();
    assert_eq!(outcome, RetentionOutcome::NoData(NoDataReason::EmptyTransactionSet));
}

#[test]
fn test_scenario_c_profit_threshold() {
    let raw = df!(
        "customer_id" => &["c1"],
        "transaction_date" => &["2023-01-15"],
        "list_price" => &[100.0],
        "standard_cost" => &[60.0],
    )
    .unwrap();

    let table = TransactionTable::from_frame(&normalize(&raw).unwrap()).unwrap();
    assert_eq!(table.rows()[0].profit, 40.0);

    let filters = FilterSet::new().with(Filter::above(PROFIT, 50.0));
    let outcome = compute_retention(table.rows(), &filters, CohortBasis::Filtered).unwrap();
    assert!(outcome.is_no_data());
}

#[test]
fn test_scenario_d_mean_imputation() {
    let raw = df!(
        "customer_id" => &[1i64, 2, 3],
        "transaction_date" => &["2023-01-01", "2023-01-02", "2023-01-03"],
        "list_price" => &[Some(10.0), None, Some(30.0)],
        "standard_cost" => &[1.0, 1.0, 1.0],
    )
    .unwrap();

    let table = TransactionTable::from_frame(&normalize(&raw).unwrap()).unwrap();
    let prices: Vec<f64> = table.rows().iter().map(|t| t.list_price).collect();
    assert_eq!(prices, vec![10.0, 20.0, 30.0]);
}

#[test]
fn test_category_then_threshold_equals_conjunction() {
    let test_file = create_test_csv();
    let session = load_session(&test_file);
    let rows = session.table().rows();

    let set = FilterSet::new()
        .with(Filter::category("brand", ["Solex", "Trek Bicycles"]))
        .with(Filter::above(LIST_PRICE, 90.0));

    let sequential = set.apply(rows);
    let combined = Filter::All(set.iter().cloned().collect()).apply(rows);
    assert_eq!(sequential, combined);
    assert!(sequential
        .iter()
        .all(|t| t.list_price > 90.0 && matches!(t.category("brand"), Some("Solex" | "Trek Bicycles"))));

    let first = compute_retention(rows, &set, CohortBasis::Filtered).unwrap();
    let second = compute_retention(rows, &FilterSet::new().with(set.conjunction()), CohortBasis::Filtered)
        .unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_online_channel_filter() {
    let test_file = create_test_csv();
    let session = load_session(&test_file);

    let online = FilterSet::new().with(Filter::channel(true, false));
    let kept = online.apply(session.table().rows());
    assert_eq!(kept.len(), 4);
    assert!(kept
        .iter()
        .all(|t| t.category(CHANNEL_FIELD).and_then(Channel::parse) == Some(Channel::Online)));

    let everything = FilterSet::new().with(Filter::channel(true, true));
    assert_eq!(everything.apply(session.table().rows()).len(), 7);
}

#[test]
fn test_normalization_is_idempotent_on_csv_data() {
    let test_file = create_test_csv();
    let raw = CsvSource::new(test_file.path()).load().unwrap();

    let once = normalize(&raw).unwrap();
    let twice = normalize(&once).unwrap();
    assert!(once.equals_missing(&twice));
    assert_eq!(once.get_column_names(), twice.get_column_names());
}

#[test]
fn test_missing_required_column_aborts_load() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "customer_id,transaction_date,list_price").unwrap();
    writeln!(file, "1,2017-01-15,100.0").unwrap();

    let result = CohortSession::load(&CsvSource::new(file.path()));
    assert!(matches!(result, Err(CohortError::Schema { .. })));
}

#[test]
fn test_empty_cost_column_aborts_load() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "customer_id,transaction_date,list_price,standard_cost").unwrap();
    writeln!(file, "1,2017-01-15,100.0,").unwrap();
    writeln!(file, "2,2017-01-16,120.0, ").unwrap();

    let result = CohortSession::load(&CsvSource::new(file.path()));
    assert!(matches!(result, Err(CohortError::Imputation { .. })));
}
