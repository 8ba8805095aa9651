//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use clap::Parser;

use crate::filter::{Filter, FilterSet};
use crate::pipeline::CohortBasis;

/// Customer retention cohort analysis with heatmap output
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input CSV file
    #[arg(short, long, default_value = "transactions.csv")]
    pub input: String,

    /// Output path for the retention heatmap
    #[arg(short, long, default_value = "cohort_heatmap.png")]
    pub output: String,

    /// Also write the retention matrix as JSON
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Categorical filter as FIELD=VALUE[,VALUE...]; repeatable
    /// Example: --category "brand=Solex,Trek Bicycles"
    #[arg(short = 'c', long = "category")]
    pub categories: Vec<String>,

    /// Numeric filter keeping rows strictly above a threshold, as FIELD=VALUE; repeatable
    /// Example: --min profit=50
    #[arg(short = 'm', long = "min")]
    pub thresholds: Vec<String>,

    /// Keep online orders
    #[arg(long)]
    pub online: bool,

    /// Keep offline orders
    #[arg(long)]
    pub offline: bool,

    /// Derive cohorts from the filtered set or from the full table
    #[arg(long, value_enum, default_value_t = CohortBasis::Filtered)]
    pub cohort_basis: CohortBasis,

    /// Print facet values and numeric ranges, then exit
    #[arg(long)]
    pub describe: bool,

    /// Print the first N normalized rows
    #[arg(long, value_name = "N")]
    pub preview: Option<usize>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Build the filter set from the command-line selections
    ///
    /// Filters are applied in order: categories, thresholds, then channel.
    pub fn filter_set(&self) -> crate::AnyResult<FilterSet> {
        let mut filters = FilterSet::new();

        for raw in &self.categories {
            let (field, values) = split_assignment(raw)?;
            let values: Vec<&str> = values
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .collect();
            if values.is_empty() {
                anyhow::bail!("Category filter '{}' selects no values", raw);
            }
            filters.push(Filter::category(field, values));
        }

        for raw in &self.thresholds {
            let (field, value) = split_assignment(raw)?;
            let threshold: f64 = value
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid threshold value: {}", value))?;
            filters.push(Filter::above(field, threshold));
        }

        filters.push(Filter::channel(self.online, self.offline));

        Ok(filters)
    }
}

/// Split `FIELD=VALUE`, lower-casing the field to match normalized columns
fn split_assignment(raw: &str) -> crate::AnyResult<(String, &str)> {
    let Some((field, value)) = raw.split_once('=') else {
        anyhow::bail!("Filter must be in format 'field=value': {}", raw);
    };
    let field = field.trim().to_lowercase();
    if field.is_empty() {
        anyhow::bail!("Filter field is empty: {}", raw);
    }
    Ok((field, value.trim()))
}
