use crate::accumulator::MetricAccumulator;
use crate::config::{AggregationRequest, GroupKeyField, MetricGroup};
use crate::filter::apply_filters;
use crate::finalizer::FinalizePolicy;
use crate::grouping::{group_records, sort_labels, Bucket};
use crate::metrics::{metric_names, CUT_METRICS, TOTAL_ALARMS};
use crate::types::{
    GroupedReportRow, LiveReportData, MachineRollup, ProductionRecord, SnapshotRow,
};
use crate::util::{format_fixed, natural_cmp};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Grouped (search) report: one row per `(bucket, label)` with every metric of
/// the requested group.
pub fn generate_grouped_report(
    records: &[ProductionRecord],
    req: &AggregationRequest,
    policy: &FinalizePolicy,
) -> Vec<GroupedReportRow> {
    let filtered = apply_filters(records, req);
    let names = metric_names(req.metric_group, filtered.iter().copied());
    let grouping = group_records(filtered, req);

    let mut rows: Vec<(Bucket, GroupedReportRow)> = grouping
        .groups
        .iter()
        .map(|((bucket, label), group)| {
            let values: BTreeMap<String, String> = names
                .iter()
                .map(|m| (m.clone(), policy.value(&group.totals, req.metric_group, m)))
                .collect();
            (
                *bucket,
                GroupedReportRow {
                    date: bucket.to_string(),
                    label: label.clone(),
                    values,
                },
            )
        })
        .collect();

    rows.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then_with(|| natural_cmp(&a.1.label, &b.1.label))
            .then_with(|| a.1.label.cmp(&b.1.label))
    });
    rows.into_iter().map(|(_, row)| row).collect()
}

/// Metrics shown on the live dashboard rollups, with the group each one is
/// finalised under.
fn snapshot_metrics() -> Vec<(MetricGroup, String)> {
    let mut v: Vec<(MetricGroup, String)> = metric_names(MetricGroup::Quality, std::iter::empty())
        .into_iter()
        .map(|m| (MetricGroup::Quality, m))
        .collect();
    v.extend(CUT_METRICS.iter().map(|m| (MetricGroup::Cuts, m.to_string())));
    v.push((MetricGroup::Alarms, TOTAL_ALARMS.to_string()));
    v
}

fn finalize_all(acc: &MetricAccumulator, policy: &FinalizePolicy) -> BTreeMap<String, String> {
    snapshot_metrics()
        .into_iter()
        .map(|(group, m)| {
            let v = policy.value(acc, group, &m);
            (m, v)
        })
        .collect()
}

/// Flatten a live snapshot into machine rows, filling unit and article
/// dimensions from the enclosing blocks where the row leaves them out.
pub fn snapshot_records(data: &LiveReportData) -> Vec<ProductionRecord> {
    let mut out = Vec::new();
    for unit in &data.units {
        for article in &unit.articles {
            for machine in &article.machines {
                let mut rec = machine.clone();
                if rec.mill_unit.is_none() {
                    rec.mill_unit = unit.mill_unit.clone();
                }
                if rec.article_number.is_none() {
                    rec.article_number = article.article_number.clone();
                }
                if rec.article_name.is_none() {
                    rec.article_name = article.article_name.clone();
                }
                out.push(rec);
            }
        }
    }
    out
}

/// Machine-wise rollup of the live snapshot. A machine that ran several
/// articles gets one row with summed counters and averaged ratios.
///
/// `displayMachineName` carries the unit only when the same machine name
/// appears under more than one unit.
pub fn rollup_machines(data: &LiveReportData, policy: &FinalizePolicy, fallback: &str) -> Vec<MachineRollup> {
    #[derive(Default)]
    struct Acc {
        totals: MetricAccumulator,
        articles: BTreeSet<String>,
    }

    let records = snapshot_records(data);
    let mut map: BTreeMap<(String, String), Acc> = BTreeMap::new();
    for rec in &records {
        let unit = GroupKeyField::Unit.value(rec).unwrap_or(fallback).to_string();
        let machine = GroupKeyField::MachineName.value(rec).unwrap_or(fallback).to_string();
        let e = map.entry((unit, machine)).or_default();
        e.totals.absorb(rec);
        if let Some(article) = GroupKeyField::ArticleName
            .value(rec)
            .or_else(|| GroupKeyField::ArticleNumber.value(rec))
        {
            e.articles.insert(article.to_string());
        }
    }

    let mut units_per_machine: BTreeMap<&str, usize> = BTreeMap::new();
    for (_, machine) in map.keys() {
        *units_per_machine.entry(machine.as_str()).or_insert(0) += 1;
    }

    let mut rows: Vec<MachineRollup> = map
        .iter()
        .map(|((unit, machine), acc)| {
            let display = if units_per_machine.get(machine.as_str()).copied().unwrap_or(0) > 1 {
                format!("{} ({})", machine, unit)
            } else {
                machine.clone()
            };
            let mut articles: Vec<String> = acc.articles.iter().cloned().collect();
            sort_labels(&mut articles);
            MachineRollup {
                machine_name: machine.clone(),
                display_machine_name: display,
                metrics: finalize_all(&acc.totals, policy),
                articles,
            }
        })
        .collect();

    rows.sort_by(|a, b| match natural_cmp(&a.display_machine_name, &b.display_machine_name) {
        Ordering::Equal => a.display_machine_name.cmp(&b.display_machine_name),
        other => other,
    });
    debug!(machines = rows.len(), "rolled up live snapshot");
    rows
}

/// Unit-, article- or lot-wise rollup of the live snapshot.
pub fn rollup_by(
    data: &LiveReportData,
    key: GroupKeyField,
    policy: &FinalizePolicy,
    fallback: &str,
) -> Vec<SnapshotRow> {
    let mut map: BTreeMap<String, MetricAccumulator> = BTreeMap::new();
    for rec in &snapshot_records(data) {
        let label = key.value(rec).unwrap_or(fallback).to_string();
        map.entry(label).or_default().absorb(rec);
    }
    let mut rows: Vec<SnapshotRow> = map
        .iter()
        .map(|(label, acc)| SnapshotRow {
            label: label.clone(),
            metrics: finalize_all(acc, policy),
        })
        .collect();
    rows.sort_by(|a, b| natural_cmp(&a.label, &b.label).then_with(|| a.label.cmp(&b.label)));
    rows
}

/// The snapshot's own per-unit totals (`unitCuts`, `unitQuality`,
/// `alarmBreakdown`), rendered without recomputation.
pub fn unit_overview(data: &LiveReportData, fallback: &str) -> Vec<SnapshotRow> {
    let mut rows: Vec<SnapshotRow> = data
        .units
        .iter()
        .map(|unit| {
            let mut metrics = BTreeMap::new();
            for (k, v) in &unit.unit_cuts {
                metrics.insert(k.clone(), format_fixed(*v, 0));
            }
            for (k, v) in &unit.unit_quality {
                metrics.insert(k.clone(), format_fixed(*v, 2));
            }
            for (k, v) in &unit.alarm_breakdown {
                metrics.insert(k.clone(), format_fixed(*v, 0));
            }
            let total = unit
                .total_alarms
                .unwrap_or_else(|| unit.alarm_breakdown.values().sum());
            metrics.insert(TOTAL_ALARMS.to_string(), format_fixed(total, 0));
            SnapshotRow {
                label: unit
                    .mill_unit
                    .clone()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| fallback.to_string()),
                metrics,
            }
        })
        .collect();
    rows.sort_by(|a, b| natural_cmp(&a.label, &b.label));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ArticleSnapshot, UnitSnapshot};

    fn machine(name: &str, faults: f64, length: f64) -> ProductionRecord {
        ProductionRecord {
            machine_name: Some(name.into()),
            yarn_faults: faults,
            yarn_length: length,
            cv_avg: 12.0,
            ..Default::default()
        }
    }

    fn snapshot() -> LiveReportData {
        LiveReportData {
            units: vec![
                UnitSnapshot {
                    mill_unit: Some("U1".into()),
                    articles: vec![
                        ArticleSnapshot {
                            article_number: Some("A1".into()),
                            article_name: None,
                            machines: vec![machine("M1", 10.0, 1000.0), machine("M2", 5.0, 1000.0)],
                        },
                        ArticleSnapshot {
                            article_number: Some("A2".into()),
                            article_name: Some("Combed 40s".into()),
                            machines: vec![machine("M1", 20.0, 1000.0)],
                        },
                    ],
                    ..Default::default()
                },
                UnitSnapshot {
                    mill_unit: Some("U2".into()),
                    articles: vec![ArticleSnapshot {
                        article_number: Some("A1".into()),
                        article_name: None,
                        machines: vec![machine("M2", 1.0, 0.0)],
                    }],
                    ..Default::default()
                },
            ],
        }
    }

    #[test]
    fn test_machine_rollup_merges_articles() {
        let rows = rollup_machines(&snapshot(), &FinalizePolicy::dashboard(), "N/A");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].display_machine_name, "M1");
        assert_eq!(rows[0].articles, vec!["A1", "Combed 40s"]);
        // 30 faults over 2000 m
        assert_eq!(rows[0].metrics["yarnFaults"], "2");
        assert_eq!(rows[0].metrics["cvAvg"], "12.00");
        assert_eq!(rows[1].display_machine_name, "M2 (U1)");
        assert_eq!(rows[2].display_machine_name, "M2 (U2)");
        assert_eq!(rows[2].metrics["yarnFaults"], "0");
    }

    #[test]
    fn test_rollup_by_unit_and_article() {
        let data = snapshot();
        let policy = FinalizePolicy::search_report(2);
        let units = rollup_by(&data, GroupKeyField::Unit, &policy, "N/A");
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].metrics["yarnFaults"], "1.17");
        assert_eq!(units[1].metrics["yarnFaults"], "N/A");
        let articles = rollup_by(&data, GroupKeyField::ArticleNumber, &policy, "N/A");
        let labels: Vec<&str> = articles.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["A1", "A2"]);
    }

    #[test]
    fn test_unit_overview_uses_precomputed_totals() {
        let mut data = snapshot();
        data.units[0].unit_cuts.insert("nCuts".into(), 12.0);
        data.units[0].alarm_breakdown.insert("motor".into(), 2.0);
        data.units[0].alarm_breakdown.insert("sensor".into(), 1.0);
        let rows = unit_overview(&data, "Unknown");
        assert_eq!(rows[0].metrics["nCuts"], "12");
        assert_eq!(rows[0].metrics["totalAlarms"], "3");
        assert_eq!(rows[1].metrics["totalAlarms"], "0");

        data.units[1].alarm_breakdown.insert("motor".into(), 1.0);
        data.units[1].total_alarms = Some(7.0);
        let rows = unit_overview(&data, "Unknown");
        assert_eq!(rows[1].metrics["totalAlarms"], "7");
    }

    #[test]
    fn test_grouped_report_columns_follow_filtered_records() {
        let mk = |unit: &str, alarm: &str| {
            let mut rec = ProductionRecord {
                shift_start_time: Some("2024-01-01".into()),
                mill_unit: Some(unit.into()),
                ..Default::default()
            };
            rec.alarm_breakdown.insert(alarm.into(), 2.0);
            rec
        };
        let records = vec![mk("U1", "motor"), mk("U2", "sensor")];
        let req = AggregationRequest {
            metric_group: MetricGroup::Alarms,
            unit: Some("U1".into()),
            ..AggregationRequest::grouped_report()
        };
        let rows = generate_grouped_report(&records, &req, &FinalizePolicy::search_report(2));
        assert_eq!(rows.len(), 1);
        let columns: Vec<&str> = rows[0].values.keys().map(|k| k.as_str()).collect();
        assert_eq!(columns, vec!["motor", "totalAlarms"]);
        assert_eq!(rows[0].values["motor"], "2");
    }

    #[test]
    fn test_grouped_report_rows() {
        let mk = |ts: &str, unit: Option<&str>, n: f64| ProductionRecord {
            shift_start_time: Some(ts.into()),
            mill_unit: unit.map(String::from),
            n_cuts: n,
            yarn_length: 100.0,
            ..Default::default()
        };
        let records = vec![
            mk("2024-01-02", Some("U10"), 1.0),
            mk("2024-01-01", Some("U2"), 2.0),
            mk("2024-01-01", None, 3.0),
            mk("2024-01-01", Some("U10"), 4.0),
        ];
        let req = AggregationRequest {
            metric_group: MetricGroup::Cuts,
            ..AggregationRequest::grouped_report()
        };
        let rows = generate_grouped_report(&records, &req, &FinalizePolicy::search_report(2));
        let keys: Vec<(String, String)> = rows.iter().map(|r| (r.date.clone(), r.label.clone())).collect();
        assert_eq!(
            keys,
            vec![
                ("2024-01-01".to_string(), "N/A".to_string()),
                ("2024-01-01".to_string(), "U2".to_string()),
                ("2024-01-01".to_string(), "U10".to_string()),
                ("2024-01-02".to_string(), "U10".to_string()),
            ]
        );
        assert_eq!(rows[2].values["nCuts"], "4.00");
        assert_eq!(rows[2].values.len(), CUT_METRICS.len());
    }
}
