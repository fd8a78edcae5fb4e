use crate::config::Granularity;
use crate::error::{ReportError, Result};
use crate::types::TrendTable;
use serde::Serialize;
use std::collections::BTreeMap;
use tabled::{builder::Builder, settings::Style};

/// Placeholder for a `(bucket, label)` cell whose group received no records.
pub const EMPTY_CELL: &str = "-";
pub const DELTA_HEADER: &str = "Change";

pub fn write_csv<T: Serialize>(path: &str, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush().map_err(|e| ReportError::io(path, e))?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &str, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s).map_err(|e| ReportError::io(path, e))?;
    Ok(())
}

/// Label-per-row grid of a trend table: header record(s), then one record per
/// label with a trailing change column. Shift tables get a date header
/// spanning the shift sub-columns plus a second header of shift numbers.
pub fn trend_grid(table: &TrendTable, granularity: Granularity) -> Vec<Vec<String>> {
    let mut grid = Vec::new();
    if granularity == Granularity::Shift {
        let mut dates = vec!["Label".to_string()];
        let mut shifts = vec![String::new()];
        for span in table.header_spans(granularity) {
            for (i, shift) in span.shifts.iter().enumerate() {
                dates.push(if i == 0 { span.date.clone() } else { String::new() });
                shifts.push(format!("S{}", shift));
            }
        }
        dates.push(DELTA_HEADER.to_string());
        shifts.push(String::new());
        grid.push(dates);
        grid.push(shifts);
    } else {
        let mut header = vec!["Label".to_string()];
        header.extend(table.dates.iter().cloned());
        header.push(DELTA_HEADER.to_string());
        grid.push(header);
    }

    for (label, values, delta) in table.label_rows() {
        let mut record = vec![label];
        record.extend(values.into_iter().map(|v| v.unwrap_or_else(|| EMPTY_CELL.to_string())));
        record.push(delta);
        grid.push(record);
    }
    grid
}

pub fn write_trend_csv(path: &str, table: &TrendTable, granularity: Granularity) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for record in trend_grid(table, granularity) {
        wtr.write_record(&record)?;
    }
    wtr.flush().map_err(|e| ReportError::io(path, e))?;
    Ok(())
}

fn markdown(grid: Vec<Vec<String>>) -> String {
    let mut builder = Builder::default();
    for record in grid {
        builder.push_record(record);
    }
    builder.build().with(Style::markdown()).to_string()
}

/// Markdown preview of the first `max_rows` labels of a trend table.
pub fn preview_trend(table: &TrendTable, granularity: Granularity, max_rows: usize) {
    if table.labels.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let header_rows = if granularity == Granularity::Shift { 2 } else { 1 };
    let grid: Vec<Vec<String>> = trend_grid(table, granularity)
        .into_iter()
        .take(header_rows + max_rows)
        .collect();
    println!("{}\n", markdown(grid));
}

/// Markdown preview of labelled metric rows (grouped report, rollups).
pub fn preview_metric_rows<'a, I>(label_header: &str, rows: I, max_rows: usize)
where
    I: IntoIterator<Item = (&'a str, &'a BTreeMap<String, String>)>,
{
    let rows: Vec<(&str, &BTreeMap<String, String>)> = rows.into_iter().take(max_rows).collect();
    let Some((_, first)) = rows.first() else {
        println!("(no rows)\n");
        return;
    };
    let columns: Vec<String> = first.keys().cloned().collect();
    let mut grid = vec![std::iter::once(label_header.to_string())
        .chain(columns.iter().cloned())
        .collect::<Vec<_>>()];
    for (label, metrics) in &rows {
        let mut record = vec![label.to_string()];
        record.extend(
            columns
                .iter()
                .map(|c| metrics.get(c).cloned().unwrap_or_else(|| EMPTY_CELL.to_string())),
        );
        grid.push(record);
    }
    println!("{}\n", markdown(grid));
}
