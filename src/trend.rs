// Trend assembly: finalised `(bucket, label)` cells into a dense table with
// drill-down and percent change.
//
// Everything here is a pure function of its inputs; calling it twice on the
// same records yields byte-identical output.

use crate::config::{AggregationRequest, Granularity};
use crate::filter::apply_filters;
use crate::finalizer::FinalizePolicy;
use crate::grouping::{group_records, sort_labels, Bucket};
use crate::types::{DrillDown, HeaderSpan, ProductionRecord, TrendRow, TrendTable};
use crate::util::parse_f64_safe;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Finalised display value per `(bucket, label)`.
pub type Cells = BTreeMap<(Bucket, String), String>;

/// Run the full pipeline: filter, group, accumulate, finalise, assemble.
pub fn build_trend(
    records: &[ProductionRecord],
    req: &AggregationRequest,
    policy: &FinalizePolicy,
) -> TrendTable {
    let filtered = apply_filters(records, req);
    let grouping = group_records(filtered, req);
    let metric = req.selected_metric.as_str();
    let ty = policy.resolve(req.metric_group, metric);

    let mut cells = Cells::new();
    let mut drill: BTreeMap<String, Cells> = BTreeMap::new();
    for ((bucket, label), group) in &grouping.groups {
        cells.insert(
            (*bucket, label.clone()),
            policy.finalize(&group.totals, metric, ty),
        );
        for (machine, acc) in &group.machines {
            drill
                .entry(label.clone())
                .or_default()
                .insert((*bucket, machine.clone()), policy.finalize(acc, metric, ty));
        }
    }

    debug!(metric, ?ty, cells = cells.len(), "finalised trend cells");
    assemble(&cells, &drill, req.hide_empty_latest)
}

/// Build the table from finalised cells.
///
/// `drill` maps a primary label to cells keyed by the secondary label.
pub fn assemble(cells: &Cells, drill: &BTreeMap<String, Cells>, hide_empty_latest: bool) -> TrendTable {
    let buckets: Vec<Bucket> = cells
        .keys()
        .map(|(b, _)| *b)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let mut labels: Vec<String> = cells
        .keys()
        .map(|(_, l)| l.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    sort_labels(&mut labels);

    if hide_empty_latest {
        let latest = latest_buckets(&buckets);
        labels.retain(|label| {
            latest.iter().any(|b| {
                cells
                    .get(&(*b, label.clone()))
                    .and_then(|v| parse_f64_safe(Some(v)))
                    .map_or(false, |v| v != 0.0)
            })
        });
    }

    let data = rows(cells, &buckets, &labels);
    let deltas = row_deltas(cells, &buckets, &labels);

    let mut drill_down = BTreeMap::new();
    for label in &labels {
        let Some(sub) = drill.get(label) else { continue };
        let mut sub_labels: Vec<String> = sub
            .keys()
            .map(|(_, l)| l.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if sub_labels.is_empty() {
            continue;
        }
        sort_labels(&mut sub_labels);
        drill_down.insert(
            label.clone(),
            DrillDown {
                data: rows(sub, &buckets, &sub_labels),
                deltas: row_deltas(sub, &buckets, &sub_labels),
                labels: sub_labels,
            },
        );
    }

    TrendTable {
        data,
        labels,
        dates: buckets.iter().map(|b| b.to_string()).collect(),
        deltas,
        drill_down_data: if drill_down.is_empty() { None } else { Some(drill_down) },
    }
}

/// Buckets that make up the most recent column group: the last bucket, or
/// every shift of the last date.
fn latest_buckets(buckets: &[Bucket]) -> Vec<Bucket> {
    let Some(last) = buckets.last() else {
        return Vec::new();
    };
    let prefix = last.prefix();
    buckets
        .iter()
        .filter(|b| b.prefix() == prefix)
        .copied()
        .collect()
}

fn rows(cells: &Cells, buckets: &[Bucket], labels: &[String]) -> Vec<TrendRow> {
    buckets
        .iter()
        .map(|b| TrendRow {
            date: b.to_string(),
            values: labels
                .iter()
                .filter_map(|l| cells.get(&(*b, l.clone())).map(|v| (l.clone(), v.clone())))
                .collect(),
        })
        .collect()
}

fn row_deltas(cells: &Cells, buckets: &[Bucket], labels: &[String]) -> BTreeMap<String, String> {
    labels
        .iter()
        .map(|l| {
            let series: Vec<Option<f64>> = buckets
                .iter()
                .map(|b| cells.get(&(*b, l.clone())).and_then(|v| parse_f64_safe(Some(v))))
                .collect();
            (l.clone(), row_delta(&series))
        })
        .collect()
}

/// Percent change from the earliest defined value to the value in the final
/// bucket of the series.
pub fn row_delta(series: &[Option<f64>]) -> String {
    let Some(first) = series.iter().position(|v| v.is_some()) else {
        return "-".to_string();
    };
    let last = series.len() - 1;
    if first == last {
        return "-".to_string();
    }
    percent_change(series[first], series[last])
}

pub fn percent_change(earliest: Option<f64>, latest: Option<f64>) -> String {
    let (Some(earliest), Some(latest)) = (earliest, latest) else {
        return "-".to_string();
    };
    if earliest == 0.0 {
        return if latest != 0.0 { "New".to_string() } else { "0.0%".to_string() };
    }
    let pct = (latest - earliest) / earliest * 100.0;
    if pct.abs() < 0.05 {
        "0.0%".to_string()
    } else {
        format!("{:+.1}%", pct)
    }
}

impl TrendTable {
    /// Column header spans. Shift buckets (`date_shift`) collapse into one
    /// span per date; other granularities get one span per bucket.
    pub fn header_spans(&self, granularity: Granularity) -> Vec<HeaderSpan> {
        let mut spans: Vec<HeaderSpan> = Vec::new();
        for key in &self.dates {
            let (date, shift) = match (granularity, key.rsplit_once('_')) {
                (Granularity::Shift, Some((d, s))) => (d, Some(s)),
                _ => (key.as_str(), None),
            };
            let same_date = shift.is_some() && spans.last().map_or(false, |s| s.date == date);
            if let Some(span) = spans.last_mut().filter(|_| same_date) {
                span.shifts.extend(shift.map(String::from));
            } else {
                spans.push(HeaderSpan {
                    date: date.to_string(),
                    shifts: shift.map(String::from).into_iter().collect(),
                });
            }
        }
        spans
    }

    /// Row view for rendering: one entry per label with its value per bucket
    /// (`None` where the group received no records) and its delta.
    pub fn label_rows(&self) -> Vec<(String, Vec<Option<String>>, String)> {
        self.labels
            .iter()
            .map(|label| {
                let values: Vec<Option<String>> =
                    self.data.iter().map(|row| row.values.get(label).cloned()).collect();
                let delta = self.deltas.get(label).cloned().unwrap_or_else(|| "-".to_string());
                (label.clone(), values, delta)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> Bucket {
        Bucket::Day(NaiveDate::from_ymd_opt(2024, 1, d).unwrap())
    }

    fn cell(cells: &mut Cells, b: Bucket, label: &str, v: &str) {
        cells.insert((b, label.to_string()), v.to_string());
    }

    #[test]
    fn test_delta_edge_cases() {
        assert_eq!(row_delta(&[Some(0.0), None, Some(5.0)]), "New");
        assert_eq!(row_delta(&[Some(10.0), Some(15.0)]), "+50.0%");
        assert_eq!(row_delta(&[None, Some(20.0), Some(15.0)]), "-25.0%");
        assert_eq!(row_delta(&[None, Some(7.0)]), "-");
        assert_eq!(row_delta(&[Some(7.0), None]), "-");
        assert_eq!(row_delta(&[None, None]), "-");
        assert_eq!(row_delta(&[]), "-");
        assert_eq!(row_delta(&[Some(0.0), Some(0.0)]), "0.0%");
    }

    #[test]
    fn test_assemble_orders_and_leaves_gaps() {
        let mut cells = Cells::new();
        cell(&mut cells, day(2), "M10", "3.00");
        cell(&mut cells, day(1), "M2", "1.00");
        cell(&mut cells, day(2), "M2", "2.00");
        let t = assemble(&cells, &BTreeMap::new(), false);
        assert_eq!(t.dates, vec!["2024-01-01", "2024-01-02"]);
        assert_eq!(t.labels, vec!["M2", "M10"]);
        assert!(!t.data[0].values.contains_key("M10"));
        assert_eq!(t.deltas["M2"], "+100.0%");
        assert_eq!(t.deltas["M10"], "-");
        assert!(t.drill_down_data.is_none());
    }

    #[test]
    fn test_hide_empty_latest() {
        let mut cells = Cells::new();
        cell(&mut cells, day(1), "U1", "1.00");
        cell(&mut cells, day(2), "U1", "0.00");
        cell(&mut cells, day(1), "U2", "4.00");
        cell(&mut cells, day(2), "U2", "2.00");
        cell(&mut cells, day(1), "U3", "4.00");
        let t = assemble(&cells, &BTreeMap::new(), true);
        assert_eq!(t.labels, vec!["U2"]);
        assert!(t.deltas.get("U1").is_none());
    }

    #[test]
    fn test_hide_empty_latest_checks_every_shift_of_last_date() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let mut cells = Cells::new();
        cell(&mut cells, Bucket::Shift { date: d, shift: 1 }, "U1", "3.00");
        cell(&mut cells, Bucket::Shift { date: d, shift: 2 }, "U2", "1.00");
        cell(&mut cells, Bucket::Shift { date: d, shift: 3 }, "U2", "N/A");
        let t = assemble(&cells, &BTreeMap::new(), true);
        assert_eq!(t.labels, vec!["U1", "U2"]);
    }

    #[test]
    fn test_header_spans_for_shifts() {
        let table = TrendTable {
            dates: vec![
                "2024-01-01_1".into(),
                "2024-01-01_2".into(),
                "2024-01-02_1".into(),
            ],
            ..Default::default()
        };
        let spans = table.header_spans(Granularity::Shift);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].date, "2024-01-01");
        assert_eq!(spans[0].shifts, vec!["1", "2"]);
        assert_eq!(spans[1].shifts, vec!["1"]);

        let daily = TrendTable {
            dates: vec!["2024-01-01".into(), "2024-01-02".into()],
            ..Default::default()
        };
        assert!(daily.header_spans(Granularity::Daily).iter().all(|s| s.shifts.is_empty()));
    }

    #[test]
    fn test_empty_input_is_well_formed() {
        let t = assemble(&Cells::new(), &BTreeMap::new(), true);
        assert!(t.labels.is_empty());
        assert!(t.dates.is_empty());
        assert!(t.data.is_empty());
        assert_eq!(serde_json::to_string(&t).unwrap(), r#"{"data":[],"labels":[],"dates":[],"deltas":{}}"#);
    }
}
