// Narrowing of the input record set ahead of grouping.

use crate::config::AggregationRequest;
use crate::grouping::parse_timestamp;
use crate::types::ProductionRecord;
use std::collections::HashSet;
use tracing::debug;

/// Records that pass the request's unit, date range and secondary-dimension
/// filters. Borrowed, so the caller's record set stays untouched.
pub fn apply_filters<'a>(
    records: &'a [ProductionRecord],
    req: &AggregationRequest,
) -> Vec<&'a ProductionRecord> {
    let wanted: HashSet<&str> = req.filter_values.iter().map(|s| s.as_str()).collect();

    let kept: Vec<&ProductionRecord> = records
        .iter()
        .filter(|r| match &req.unit {
            Some(unit) => r.mill_unit.as_deref().map(str::trim) == Some(unit.trim()),
            None => true,
        })
        .filter(|r| match &req.date_range {
            Some(range) => parse_timestamp(r.shift_start_time.as_deref())
                .map(|ts| range.contains(ts.date()))
                .unwrap_or(false),
            None => true,
        })
        .filter(|r| match req.filter_field {
            Some(field) if !wanted.is_empty() => {
                let v = field.value(r).map(str::trim).unwrap_or(req.fallback_label.as_str());
                wanted.contains(v)
            }
            _ => true,
        })
        .collect();

    debug!(input = records.len(), kept = kept.len(), "filtered production records");
    kept
}
