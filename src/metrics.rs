// Metric catalog and the tagged metric type that drives finalisation.

use crate::config::MetricGroup;
use crate::types::ProductionRecord;
use crate::util::natural_cmp;
use std::collections::BTreeSet;

pub const CUSTOM_TOTAL_IPI: &str = "customTotalIPI";
pub const CUSTOM_TOTAL_HSIPI: &str = "customTotalHSIPI";
pub const TOTAL_ALARMS: &str = "totalAlarms";

/// Summable counters, normalised by yarn length.
pub const CUT_METRICS: &[&str] = &[
    "yarnFaults",
    "nCuts",
    "sCuts",
    "lCuts",
    "tCuts",
    "fdCuts",
    "ppCuts",
    "cpCuts",
    "cmCuts",
    "ccpCuts",
    "ccmCuts",
];

/// Raw defect counts feeding the two composite indices.
pub const DEFECT_METRICS: &[&str] = &["thin50", "thick50", "nep200", "thin40", "thick35", "nep140"];

/// Already-averaged per-record values; averaged again, never summed.
pub const RATIO_METRICS: &[&str] = &["cvAvg", "hAvg"];

/// How a metric's accumulated sums become its displayed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    /// `sum / totalLength * 100`
    PerLength,
    /// `sum / count`
    SimpleAvg,
    /// `sum / refLength`, quality rates in the trend engine
    PerRefLength,
    /// `(thin50 + thick50 + nep200) / refLength`
    CustomTotalIpi,
    /// `(thin40 + thick35 + nep140) / refLength`
    CustomTotalHsipi,
    /// `sum`, no normalisation
    RawCount,
}

pub fn is_ratio(metric: &str) -> bool {
    RATIO_METRICS.contains(&metric)
}

/// Metric names shown for a group. Alarm and CMT keys are open-ended, so
/// they are discovered from the records themselves.
pub fn metric_names<'a, I>(group: MetricGroup, records: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a ProductionRecord>,
{
    match group {
        MetricGroup::Quality => [CUSTOM_TOTAL_IPI, CUSTOM_TOTAL_HSIPI]
            .iter()
            .chain(DEFECT_METRICS)
            .chain(RATIO_METRICS)
            .map(|s| s.to_string())
            .collect(),
        MetricGroup::Cuts => CUT_METRICS.iter().map(|s| s.to_string()).collect(),
        MetricGroup::Alarms => {
            let mut names = sorted_keys(records.into_iter().flat_map(|r| r.alarm_breakdown.keys()));
            names.push(TOTAL_ALARMS.to_string());
            names
        }
        MetricGroup::Cmt => sorted_keys(records.into_iter().flat_map(|r| r.cmt_events.keys())),
    }
}

fn sorted_keys<'a>(keys: impl Iterator<Item = &'a String>) -> Vec<String> {
    let set: BTreeSet<&String> = keys.collect();
    let mut v: Vec<String> = set.into_iter().cloned().collect();
    v.sort_by(|a, b| natural_cmp(a, b));
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alarm_names_are_discovered() {
        let mut a = ProductionRecord::default();
        a.alarm_breakdown.insert("sensor".into(), 1.0);
        let mut b = ProductionRecord::default();
        b.alarm_breakdown.insert("motor".into(), 2.0);
        b.alarm_breakdown.insert("sensor".into(), 1.0);
        assert_eq!(
            metric_names(MetricGroup::Alarms, &[a, b]),
            vec!["motor", "sensor", "totalAlarms"]
        );
    }

    #[test]
    fn test_quality_group_lists_composites_first() {
        let names = metric_names(MetricGroup::Quality, std::iter::empty());
        assert_eq!(names[0], CUSTOM_TOTAL_IPI);
        assert_eq!(names[1], CUSTOM_TOTAL_HSIPI);
        assert!(names.contains(&"cvAvg".to_string()));
    }
}
