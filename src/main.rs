//! CohortForge: customer retention cohort analysis CLI
//!
//! This is the main entrypoint that orchestrates data loading, filtering,
//! retention computation and rendering.

use anyhow::Result;
use clap::Parser;
use cohortforge::logging::init_logging;
use cohortforge::{viz, Args, CohortSession, CsvSource, RetentionOutcome};
use std::time::Instant;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();
    init_logging(args.verbose);

    if args.verbose {
        println!("CohortForge - Customer Retention Cohorts");
        println!("========================================\n");
    }

    let filters = args.filter_set()?;

    // Step 1: Load and normalize data
    let data_start = Instant::now();
    let source = CsvSource::new(&args.input);
    let session = CohortSession::load(&source)?.with_basis(args.cohort_basis);
    let data_time = data_start.elapsed();

    let table = session.table();
    println!(
        "✓ Data loaded: {} transactions, {} customers",
        table.len(),
        table.customer_count()
    );
    if table.rejected() > 0 {
        println!("  Skipped {} rows without a customer or valid date", table.rejected());
    }
    if args.verbose {
        println!("  Input file: {}", args.input);
        println!("  Processing time: {:.2}s", data_time.as_secs_f64());
    }

    if let Some(rows) = args.preview {
        println!("\n{}", cohortforge::data::preview(session.frame(), rows));
    }

    if args.describe {
        print_facets(&session);
        return Ok(());
    }

    run_pipeline(&args, &session, &filters)
}

/// Print facet values and numeric ranges available for filtering
fn print_facets(session: &CohortSession) {
    let table = session.table();

    println!("\n=== Categorical Facets ===");
    for field in table.categorical_fields() {
        let values = table.facet_values(&field);
        println!("{} ({} values): {}", field, values.len(), values.join(", "));
    }

    println!("\n=== Numeric Ranges ===");
    for field in table.numeric_fields() {
        if let Some((min, max)) = table.numeric_range(&field) {
            println!("{}: {:.2} .. {:.2}", field, min, max);
        }
    }
}

/// Run retention computation and rendering
fn run_pipeline(args: &Args, session: &CohortSession, filters: &cohortforge::FilterSet) -> Result<()> {
    if args.verbose {
        println!("\nStep 2: Computing retention");
        println!("  Filters: {}", filters.len());
        println!("  Cohort basis: {:?}", session.basis());
    }

    let compute_start = Instant::now();
    let outcome = session.recompute(filters)?;
    let compute_time = compute_start.elapsed();

    let matrix = match outcome {
        RetentionOutcome::Matrix(matrix) => matrix,
        RetentionOutcome::NoData(reason) => {
            println!("\n! No data to compute retention: {}", reason);
            return Ok(());
        }
    };

    println!(
        "✓ Retention computed: {} cohorts over {} periods",
        matrix.cohorts.len(),
        matrix.max_period()
    );
    if args.verbose {
        println!("  Computation time: {:.2}s", compute_time.as_secs_f64());
        println!("\nStep 3: Rendering");
        println!("  Output file: {}", args.output);
    }

    let viz_start = Instant::now();
    viz::generate_retention_report(&matrix, &args.output, args.json.as_deref())?;

    if args.verbose {
        println!("\n  Rendering time: {:.2}s", viz_start.elapsed().as_secs_f64());
    }

    Ok(())
}
