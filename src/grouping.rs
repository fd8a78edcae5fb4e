// Partitioning of filtered records into `(bucket, label)` groups.
//
// Records are folded straight into accumulators; the partition itself is
// never materialised.

use crate::accumulator::AggregationGroup;
use crate::config::{AggregationRequest, GroupKeyField, Granularity};
use crate::types::ProductionRecord;
use crate::util::natural_cmp;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use tracing::debug;

/// Time-grouping key. Ordering is chronological within one granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bucket {
    Day(NaiveDate),
    /// Fixed day-of-month weeks: 1-7, 8-14, 15-21, 22-28, 29+.
    Week { year: i32, month: u32, week: u32 },
    Month { year: i32, month: u32 },
    Shift { date: NaiveDate, shift: u32 },
}

impl Bucket {
    pub fn new(ts: NaiveDateTime, shift_number: f64, granularity: Granularity) -> Self {
        let date = ts.date();
        match granularity {
            Granularity::Daily => Bucket::Day(date),
            Granularity::Weekly => Bucket::Week {
                year: date.year(),
                month: date.month(),
                week: week_of_month(date.day()),
            },
            Granularity::Monthly => Bucket::Month {
                year: date.year(),
                month: date.month(),
            },
            Granularity::Shift => Bucket::Shift {
                date,
                shift: shift_of(ts, shift_number),
            },
        }
    }

    /// Column prefix shared by the sub-columns of one date. Only shift
    /// buckets are sub-divided; every other bucket is its own prefix.
    pub fn prefix(&self) -> String {
        match self {
            Bucket::Shift { date, .. } => date.format("%Y-%m-%d").to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bucket::Day(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Bucket::Week { year, month, week } => write!(f, "{:04}-{:02}-W{}", year, month, week),
            Bucket::Month { year, month } => write!(f, "{:04}-{:02}", year, month),
            Bucket::Shift { date, shift } => write!(f, "{}_{}", date.format("%Y-%m-%d"), shift),
        }
    }
}

pub fn week_of_month(day: u32) -> u32 {
    match day {
        1..=7 => 1,
        8..=14 => 2,
        15..=21 => 3,
        22..=28 => 4,
        _ => 5,
    }
}

/// Explicit shift number when the record carries one, otherwise derived from
/// the start hour of a three-shift day beginning at 06:00.
fn shift_of(ts: NaiveDateTime, shift_number: f64) -> u32 {
    if shift_number >= 1.0 {
        return shift_number as u32;
    }
    match ts.hour() {
        6..=13 => 1,
        14..=21 => 2,
        _ => 3,
    }
}

/// Parse a shift start timestamp. Offsets are dropped; the wall-clock time
/// of the mill is what buckets are built from.
pub fn parse_timestamp(s: Option<&str>) -> Option<NaiveDateTime> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Group label of a record: the configured dimension, the bucket itself for
/// time grouping, or the request's fallback label.
pub fn resolve_label(rec: &ProductionRecord, bucket: &Bucket, req: &AggregationRequest) -> String {
    match req.group_key_field {
        GroupKeyField::ShiftStartTime => bucket.to_string(),
        field => field
            .value(rec)
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| req.fallback_label.clone()),
    }
}

#[derive(Debug, Default)]
pub struct Grouping {
    pub groups: BTreeMap<(Bucket, String), AggregationGroup>,
    /// Records without a parseable timestamp.
    pub dropped: usize,
}

impl Grouping {
    pub fn labels(&self) -> Vec<String> {
        let set: HashSet<&String> = self.groups.keys().map(|(_, l)| l).collect();
        let mut v: Vec<String> = set.into_iter().cloned().collect();
        sort_labels(&mut v);
        v
    }
}

/// Natural order, falling back to plain order so the result is total.
pub fn sort_labels(labels: &mut [String]) {
    labels.sort_by(|a, b| natural_cmp(a, b).then_with(|| a.cmp(b)));
}

/// Fold records into `(bucket, label)` groups.
///
/// Records with an unparseable timestamp are dropped, as are records whose
/// label falls outside `selected_labels` when that list is non-empty. Machine
/// sub-accumulators are tracked when the request asks for drill-down.
pub fn group_records<'a, I>(records: I, req: &AggregationRequest) -> Grouping
where
    I: IntoIterator<Item = &'a ProductionRecord>,
{
    let selected: HashSet<&str> = req.selected_labels.iter().map(|s| s.as_str()).collect();
    let mut out = Grouping::default();

    for rec in records {
        let Some(ts) = parse_timestamp(rec.shift_start_time.as_deref()) else {
            out.dropped += 1;
            continue;
        };
        let bucket = Bucket::new(ts, rec.shift_number, req.granularity);
        let label = resolve_label(rec, &bucket, req);
        if !selected.is_empty() && !selected.contains(label.as_str()) {
            continue;
        }
        let machine = if req.drill_down {
            Some(
                GroupKeyField::MachineName
                    .value(rec)
                    .unwrap_or(req.fallback_label.as_str()),
            )
        } else {
            None
        };
        out.groups.entry((bucket, label)).or_default().absorb(rec, machine);
    }

    debug!(
        groups = out.groups.len(),
        dropped = out.dropped,
        "grouped production records"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ts: &str) -> NaiveDateTime {
        parse_timestamp(Some(ts)).unwrap()
    }

    fn week_label(date: &str) -> String {
        Bucket::new(at(date), 0.0, Granularity::Weekly).to_string()
    }

    #[test]
    fn test_weekly_boundaries() {
        assert_eq!(week_label("2024-03-07"), "2024-03-W1");
        assert_eq!(week_label("2024-03-08"), "2024-03-W2");
        assert_eq!(week_label("2024-03-28"), "2024-03-W4");
        assert_eq!(week_label("2024-03-29"), "2024-03-W5");
        assert_eq!(week_label("2024-03-31"), "2024-03-W5");
    }

    #[test]
    fn test_weekly_sorts_numerically() {
        let mut v = vec![
            Bucket::new(at("2024-10-02"), 0.0, Granularity::Weekly),
            Bucket::new(at("2024-09-30"), 0.0, Granularity::Weekly),
            Bucket::new(at("2024-09-10"), 0.0, Granularity::Weekly),
        ];
        v.sort();
        let labels: Vec<String> = v.iter().map(|b| b.to_string()).collect();
        assert_eq!(labels, vec!["2024-09-W2", "2024-09-W5", "2024-10-W1"]);
    }

    #[test]
    fn test_daily_monthly_and_shift_labels() {
        let ts = at("2024-01-05T14:00:00");
        assert_eq!(Bucket::new(ts, 0.0, Granularity::Daily).to_string(), "2024-01-05");
        assert_eq!(Bucket::new(ts, 0.0, Granularity::Monthly).to_string(), "2024-01");
        assert_eq!(Bucket::new(ts, 0.0, Granularity::Shift).to_string(), "2024-01-05_2");
        assert_eq!(Bucket::new(ts, 3.0, Granularity::Shift).to_string(), "2024-01-05_3");
        assert_eq!(Bucket::new(ts, 3.0, Granularity::Shift).prefix(), "2024-01-05");
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp(Some("2024-01-01T06:00:00Z")).is_some());
        assert!(parse_timestamp(Some("2024-01-01T06:00:00.000+05:30")).is_some());
        assert!(parse_timestamp(Some("2024-01-01 06:00:00")).is_some());
        assert!(parse_timestamp(Some("2024-01-01")).is_some());
        assert!(parse_timestamp(Some("yesterday")).is_none());
        assert!(parse_timestamp(Some("")).is_none());
        assert!(parse_timestamp(None).is_none());
    }

    #[test]
    fn test_bad_timestamps_are_dropped_and_fallback_applied() {
        let records = vec![
            ProductionRecord {
                shift_start_time: Some("2024-01-01T06:00:00".into()),
                mill_unit: None,
                ..Default::default()
            },
            ProductionRecord {
                shift_start_time: Some("not a date".into()),
                mill_unit: Some("U1".into()),
                ..Default::default()
            },
        ];
        let trend = group_records(&records, &AggregationRequest::default());
        assert_eq!(trend.dropped, 1);
        assert_eq!(trend.labels(), vec!["Unknown"]);

        let report = group_records(&records, &AggregationRequest::grouped_report());
        assert_eq!(report.labels(), vec!["N/A"]);
    }

    #[test]
    fn test_selected_labels_exclude_others() {
        let mk = |unit: &str| ProductionRecord {
            shift_start_time: Some("2024-01-01".into()),
            mill_unit: Some(unit.into()),
            ..Default::default()
        };
        let records = vec![mk("U1"), mk("U2"), mk("U10")];
        let req = AggregationRequest {
            selected_labels: vec!["U10".into(), "U1".into()],
            ..Default::default()
        };
        assert_eq!(group_records(&records, &req).labels(), vec!["U1", "U10"]);
    }
}
