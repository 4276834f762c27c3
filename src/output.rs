use crate::error::PipelineResult;
use crate::types::{GroupCount, PivotReport};
use serde::Serialize;
use std::path::Path;
use tabled::{builder::Builder, settings::Style, Table, Tabled};

const BAR_WIDTH: usize = 40;

/// Header comes from the row type, so an export with no rows still has columns.
pub fn write_csv<T: Serialize + Tabled>(path: &Path, rows: &[T]) -> PipelineResult<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_path(path)?;
    wtr.write_record(T::headers().iter().map(|h| h.as_bytes()))?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Pivot as CSV: `ZONA`, one column per date, `Total`.
pub fn write_pivot_csv(path: &Path, pivot: &PivotReport) -> PipelineResult<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(pivot_header(pivot))?;
    for row in &pivot.rows {
        wtr.write_record(pivot_cells(&row.zone, &row.counts, row.total))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> PipelineResult<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}", table_str);
    if rows.len() > max_rows {
        println!("... {} more rows", rows.len() - max_rows);
    }
    println!();
}

pub fn render_pivot(pivot: &PivotReport) -> Option<String> {
    if pivot.is_empty() {
        return None;
    }
    let mut builder = Builder::default();
    builder.push_record(pivot_header(pivot));
    for row in &pivot.rows {
        builder.push_record(pivot_cells(&row.zone, &row.counts, row.total));
    }
    Some(builder.build().with(Style::markdown()).to_string())
}

/// Horizontal text bar chart, one line per value, scaled to the largest count.
pub fn render_bars(counts: &[GroupCount]) -> Option<String> {
    let max = counts.iter().map(|g| g.count).max()?;
    let label_width = counts.iter().map(|g| g.value.chars().count()).max().unwrap_or(0);
    let lines: Vec<String> = counts
        .iter()
        .map(|g| {
            let len = (g.count * BAR_WIDTH).div_ceil(max.max(1));
            format!(
                "{:<width$} | {} {}",
                g.value,
                "#".repeat(len),
                g.count,
                width = label_width
            )
        })
        .collect();
    Some(lines.join("\n"))
}

fn pivot_header(pivot: &PivotReport) -> Vec<String> {
    let mut header = vec!["ZONA".to_string()];
    header.extend(pivot.dates.iter().map(|d| d.format("%Y-%m-%d").to_string()));
    header.push("Total".to_string());
    header
}

fn pivot_cells(zone: &str, counts: &[usize], total: usize) -> Vec<String> {
    let mut cells = vec![zone.to_string()];
    cells.extend(counts.iter().map(usize::to_string));
    cells.push(total.to_string());
    cells
}
