// Running sums per aggregation group.

use crate::metrics::{CUSTOM_TOTAL_HSIPI, CUSTOM_TOTAL_IPI, CUT_METRICS, DEFECT_METRICS, RATIO_METRICS, TOTAL_ALARMS};
use crate::types::ProductionRecord;
use std::collections::BTreeMap;

/// Sums needed to finalise every metric of one group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricAccumulator {
    /// Count metrics keyed by API field name.
    pub sums: BTreeMap<String, f64>,
    /// Running totals of the ratio metrics (`cvAvg`, `hAvg`).
    pub ratio_sums: BTreeMap<String, f64>,
    /// Records absorbed; denominator of the simple averages.
    pub count: u64,
    pub total_length: f64,
    pub ref_length: f64,
    pub total_ipi: f64,
    pub total_hsipi: f64,
    pub alarms: BTreeMap<String, f64>,
    pub total_alarms: f64,
    pub cmt: BTreeMap<String, f64>,
}

impl MetricAccumulator {
    pub fn absorb(&mut self, rec: &ProductionRecord) {
        for name in CUT_METRICS.iter().chain(DEFECT_METRICS) {
            *self.sums.entry(name.to_string()).or_insert(0.0) += rec.count_metric(name);
        }
        *self.ratio_sums.entry("cvAvg".to_string()).or_insert(0.0) += rec.cv_avg;
        *self.ratio_sums.entry("hAvg".to_string()).or_insert(0.0) += rec.h_avg;
        self.count += 1;

        self.total_length += rec.yarn_length;
        self.ref_length += rec.ip_ref_length;
        self.total_ipi += rec.ipi();
        self.total_hsipi += rec.hsipi();

        for (k, v) in &rec.alarm_breakdown {
            *self.alarms.entry(k.clone()).or_insert(0.0) += v;
        }
        self.total_alarms += rec.alarm_total();
        for (k, v) in &rec.cmt_events {
            *self.cmt.entry(k.clone()).or_insert(0.0) += v;
        }
    }

    /// Accumulated numerator for a metric name.
    pub fn sum(&self, metric: &str) -> f64 {
        match metric {
            CUSTOM_TOTAL_IPI => self.total_ipi,
            CUSTOM_TOTAL_HSIPI => self.total_hsipi,
            TOTAL_ALARMS => self.total_alarms,
            m if RATIO_METRICS.contains(&m) => self.ratio_sums.get(m).copied().unwrap_or(0.0),
            m => self
                .sums
                .get(m)
                .or_else(|| self.alarms.get(m))
                .or_else(|| self.cmt.get(m))
                .copied()
                .unwrap_or(0.0),
        }
    }
}

/// Accumulator for one `(bucket, label)` pair plus its per-machine mirror.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationGroup {
    pub totals: MetricAccumulator,
    pub machines: BTreeMap<String, MetricAccumulator>,
}

impl AggregationGroup {
    /// Fold a record into the group, mirroring it into the machine
    /// sub-accumulator when one is given.
    pub fn absorb(&mut self, rec: &ProductionRecord, machine: Option<&str>) {
        self.totals.absorb(rec);
        if let Some(m) = machine {
            self.machines.entry(m.to_string()).or_default().absorb(rec);
        }
    }
}
