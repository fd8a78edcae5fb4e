use crate::error::{ReportError, Result};
use crate::grouping::parse_timestamp;
use crate::types::{LiveReportData, ProductionRecord};
use serde_json::Value;
use std::fs;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub loaded_rows: usize,
    /// Entries that were not objects and could not be decoded as records.
    pub skipped_rows: usize,
    /// Loaded records whose timestamp will not parse; grouping drops them.
    pub bad_timestamps: usize,
}

/// Load production records from a JSON file holding either a bare array or
/// an API envelope `{"data": [...]}`.
pub fn load_records(path: &str) -> Result<(Vec<ProductionRecord>, LoadReport)> {
    let text = fs::read_to_string(path).map_err(|e| ReportError::io(path, e))?;
    parse_records(&text, path)
}

/// Decode records from JSON text; `source` names the input in errors.
pub fn parse_records(text: &str, source: &str) -> Result<(Vec<ProductionRecord>, LoadReport)> {
    let root: Value = serde_json::from_str(text).map_err(|e| ReportError::json(source, e))?;
    let rows = match root {
        Value::Array(rows) => rows,
        Value::Object(mut obj) => match obj.remove("data") {
            Some(Value::Array(rows)) => rows,
            _ => {
                return Err(ReportError::InvalidShape {
                    path: source.to_string(),
                    message: "expected an array of records or an object with a `data` array".into(),
                })
            }
        },
        _ => {
            return Err(ReportError::InvalidShape {
                path: source.to_string(),
                message: "expected an array of records".into(),
            })
        }
    };

    let mut report = LoadReport {
        total_rows: rows.len(),
        ..Default::default()
    };
    let mut records = Vec::with_capacity(rows.len());
    for (idx, row) in rows.into_iter().enumerate() {
        if !row.is_object() {
            report.skipped_rows += 1;
            warn!(row = idx, "skipping non-object record");
            continue;
        }
        match serde_json::from_value::<ProductionRecord>(row) {
            Ok(rec) => {
                if parse_timestamp(rec.shift_start_time.as_deref()).is_none() {
                    report.bad_timestamps += 1;
                }
                records.push(rec);
            }
            Err(e) => {
                report.skipped_rows += 1;
                warn!(row = idx, error = %e, "skipping undecodable record");
            }
        }
    }
    report.loaded_rows = records.len();
    debug!(?report, source, "loaded production records");
    Ok((records, report))
}

/// Load a live snapshot (`LiveReportData`) from a JSON file.
pub fn load_snapshot(path: &str) -> Result<LiveReportData> {
    let text = fs::read_to_string(path).map_err(|e| ReportError::io(path, e))?;
    parse_snapshot(&text, path)
}

pub fn parse_snapshot(text: &str, source: &str) -> Result<LiveReportData> {
    let root: Value = serde_json::from_str(text).map_err(|e| ReportError::json(source, e))?;
    if !root.is_object() {
        return Err(ReportError::InvalidShape {
            path: source.to_string(),
            message: "expected a snapshot object".into(),
        });
    }
    serde_json::from_value(root).map_err(|e| ReportError::json(source, e))
}
