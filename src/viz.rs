//! Retention heatmap rendering with Plotters, plus console and JSON output

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use plotters::prelude::*;

use crate::retention::RetentionMatrix;

/// Colour of a 0% cell
const LOW_COLOR: (u8, u8, u8) = (237, 248, 177);
/// Colour of a 100% cell
const HIGH_COLOR: (u8, u8, u8) = (37, 52, 148);

const CELL_SIZE: u32 = 56;

/// Interpolate the heatmap colour for a retention percentage
pub fn retention_color(percent: f64) -> RGBColor {
    let t = (percent / 100.0).clamp(0.0, 1.0);
    let mix = |low: u8, high: u8| (low as f64 + (high as f64 - low as f64) * t).round() as u8;
    RGBColor(
        mix(LOW_COLOR.0, HIGH_COLOR.0),
        mix(LOW_COLOR.1, HIGH_COLOR.1),
        mix(LOW_COLOR.2, HIGH_COLOR.2),
    )
}

/// A filled heatmap cell in chart coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct HeatCell {
    /// Column offset, period index minus one
    pub x: i32,
    /// Row offset from the bottom; the earliest cohort is at the top
    pub y: i32,
    pub percent: f64,
}

/// Lay out the present cells of a matrix; absent cells are skipped
pub fn heat_cells(matrix: &RetentionMatrix) -> Vec<HeatCell> {
    let rows = matrix.cohorts.len() as i32;
    matrix
        .retention
        .indexed_iter()
        .filter_map(|((row, column), value)| {
            value.map(|percent| HeatCell {
                x: column as i32,
                y: rows - 1 - row as i32,
                percent,
            })
        })
        .collect()
}

/// Render the retention matrix as a PNG heatmap
///
/// # Arguments
/// * `matrix` - Retention matrix to draw
/// * `output_path` - Path to save the PNG
/// * `plot_title` - Title for the plot
pub fn create_retention_heatmap(
    matrix: &RetentionMatrix,
    output_path: &str,
    plot_title: Option<&str>,
) -> anyhow::Result<()> {
    let title = plot_title.unwrap_or("Monthly cohorts showing retention rates");
    let n_periods = matrix.periods.len() as i32;
    let n_cohorts = matrix.cohorts.len() as i32;
    let labels = matrix.cohort_labels();

    let width = 160 + CELL_SIZE * n_periods.max(1) as u32;
    let height = 140 + CELL_SIZE * n_cohorts.max(1) as u32;
    let root = BitMapBackend::new(output_path, (width.max(480), height.max(360))).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(80)
        .build_cartesian_2d(0..n_periods, 0..n_cohorts)?;

    let x_formatter = |x: &i32| format!("{}", x + 1);
    let y_formatter = |y: &i32| {
        let row = (n_cohorts - 1 - *y) as usize;
        labels.get(row).cloned().unwrap_or_default()
    };

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(n_periods as usize + 1)
        .y_labels(n_cohorts as usize + 1)
        .x_label_formatter(&x_formatter)
        .y_label_formatter(&y_formatter)
        .x_desc("Cohort Period")
        .y_desc("Cohort Group")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    let cells = heat_cells(matrix);

    chart.draw_series(cells.iter().map(|cell| {
        Rectangle::new(
            [(cell.x, cell.y), (cell.x + 1, cell.y + 1)],
            retention_color(cell.percent).filled(),
        )
    }))?;

    chart.draw_series(cells.iter().map(|cell| {
        let text_color = if cell.percent >= 50.0 { &WHITE } else { &BLACK };
        EmptyElement::at((cell.x, cell.y + 1))
            + Text::new(
                format!("{:.1}", cell.percent),
                (6, 6),
                ("sans-serif", 12).into_font().color(text_color),
            )
    }))?;

    root.present()?;
    println!("Retention heatmap saved to: {}", output_path);

    Ok(())
}

/// Format the matrix as an aligned text table
pub fn format_retention_table(matrix: &RetentionMatrix) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:>8} | {:>5}", "Cohort", "Size"));
    for period in &matrix.periods {
        out.push_str(&format!(" | {:>5}", period));
    }
    out.push('\n');
    out.push_str(&"-".repeat(16 + 8 * matrix.periods.len()));
    out.push('\n');

    let sizes = matrix.cohort_sizes();
    for (i, label) in matrix.cohort_labels().iter().enumerate() {
        out.push_str(&format!("{:>8} | {:>5}", label, sizes[i]));
        for value in matrix.retention.row(i) {
            match value {
                Some(percent) => out.push_str(&format!(" | {:>5.1}", percent)),
                None => out.push_str(&format!(" | {:>5}", "")),
            }
        }
        out.push('\n');
    }
    out
}

/// Print retention statistics to console
pub fn print_retention_statistics(matrix: &RetentionMatrix) {
    println!("\n=== Retention Matrix ===");
    println!("Cohorts: {}", matrix.cohorts.len());
    println!("Periods: {}", matrix.max_period());
    println!(
        "Customers in cohorts: {}",
        matrix.cohort_sizes().iter().sum::<usize>()
    );
    println!();
    print!("{}", format_retention_table(matrix));
}

/// Write the matrix as a JSON report
pub fn write_json_report(matrix: &RetentionMatrix, output_path: &Path) -> anyhow::Result<()> {
    let writer = BufWriter::new(File::create(output_path)?);
    serde_json::to_writer_pretty(writer, &matrix.to_report())?;
    println!("Retention report saved to: {}", output_path.display());
    Ok(())
}

/// Generate the heatmap, the optional JSON report and console statistics
pub fn generate_retention_report(
    matrix: &RetentionMatrix,
    heatmap_path: &str,
    json_path: Option<&Path>,
) -> anyhow::Result<()> {
    create_retention_heatmap(matrix, heatmap_path, None)?;

    if let Some(json_path) = json_path {
        write_json_report(matrix, json_path)?;
    }

    print_retention_statistics(matrix);

    Ok(())
}
