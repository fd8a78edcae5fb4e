// Turns accumulated sums into display strings.
//
// Three call sites finalise differently and are kept as separate policies:
// the grouped (search) report, the live dashboard snapshot, and the trend
// engine. Their rounding and sentinel conventions are consumed as-is by
// existing reports.

use crate::accumulator::MetricAccumulator;
use crate::config::MetricGroup;
use crate::metrics::{is_ratio, MetricType, CUSTOM_TOTAL_HSIPI, CUSTOM_TOTAL_IPI, TOTAL_ALARMS};
use crate::util::format_fixed;

pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    SearchReport,
    Dashboard,
    LiveTrend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalizePolicy {
    pub kind: PolicyKind,
    /// Decimals for per-length rates.
    pub per_length_decimals: usize,
    /// Rendered when a per-length, per-ref-length or average denominator is 0.
    pub zero_denominator: &'static str,
}

impl FinalizePolicy {
    /// Grouped report: `"N/A"` on empty denominators, alarm counters raw.
    pub fn search_report(per_length_decimals: usize) -> Self {
        Self {
            kind: PolicyKind::SearchReport,
            per_length_decimals,
            zero_denominator: NOT_AVAILABLE,
        }
    }

    /// Live dashboard and cuts tables: whole-number rates, `"0"` when empty.
    pub fn dashboard() -> Self {
        Self {
            kind: PolicyKind::Dashboard,
            per_length_decimals: 0,
            zero_denominator: "0",
        }
    }

    /// Trend engine: two decimals everywhere, quality rates per reference
    /// length, `"0.00"` when empty.
    pub fn live_trend() -> Self {
        Self {
            kind: PolicyKind::LiveTrend,
            per_length_decimals: 2,
            zero_denominator: "0.00",
        }
    }

    /// Resolve how `metric` is finalised under this policy.
    pub fn resolve(&self, group: MetricGroup, metric: &str) -> MetricType {
        match metric {
            CUSTOM_TOTAL_IPI => return MetricType::CustomTotalIpi,
            CUSTOM_TOTAL_HSIPI => return MetricType::CustomTotalHsipi,
            m if is_ratio(m) => return MetricType::SimpleAvg,
            _ => {}
        }
        match self.kind {
            PolicyKind::LiveTrend if group == MetricGroup::Quality => MetricType::PerRefLength,
            PolicyKind::LiveTrend => MetricType::PerLength,
            PolicyKind::SearchReport | PolicyKind::Dashboard
                if group == MetricGroup::Alarms || metric == TOTAL_ALARMS =>
            {
                MetricType::RawCount
            }
            PolicyKind::SearchReport | PolicyKind::Dashboard => MetricType::PerLength,
        }
    }

    pub fn finalize(&self, acc: &MetricAccumulator, metric: &str, ty: MetricType) -> String {
        let sum = acc.sum(metric);
        match ty {
            MetricType::PerLength => {
                if acc.total_length > 0.0 {
                    format_fixed(sum / acc.total_length * 100.0, self.per_length_decimals)
                } else {
                    self.zero_denominator.to_string()
                }
            }
            MetricType::SimpleAvg => {
                if acc.count > 0 {
                    format_fixed(sum / acc.count as f64, 2)
                } else {
                    self.zero_denominator.to_string()
                }
            }
            MetricType::PerRefLength => {
                if acc.ref_length > 0.0 {
                    format_fixed(sum / acc.ref_length, 2)
                } else {
                    self.zero_denominator.to_string()
                }
            }
            MetricType::CustomTotalIpi | MetricType::CustomTotalHsipi => {
                if acc.ref_length > 0.0 {
                    format_fixed(sum / acc.ref_length, 0)
                } else {
                    NOT_AVAILABLE.to_string()
                }
            }
            MetricType::RawCount => format_fixed(sum, 0),
        }
    }

    /// Resolve and finalise in one step.
    pub fn value(&self, acc: &MetricAccumulator, group: MetricGroup, metric: &str) -> String {
        self.finalize(acc, metric, self.resolve(group, metric))
    }
}
