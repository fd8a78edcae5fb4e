// Immutable aggregation request and its JSON configuration file.
//
// The UI layer owns mutable selection state; each aggregation pass receives a
// snapshot of it as an [`AggregationRequest`].

use crate::error::{ReportError, Result};
use crate::types::ProductionRecord;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;

/// Fallback group label used by the trend views.
pub const TREND_FALLBACK_LABEL: &str = "Unknown";
/// Fallback group label used by the grouped (search) report view.
pub const REPORT_FALLBACK_LABEL: &str = "N/A";

/// Record dimension usable as a group key or secondary filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GroupKeyField {
    #[default]
    #[serde(alias = "millUnit")]
    Unit,
    ArticleName,
    ArticleNumber,
    LotId,
    MachineName,
    /// Group by the time bucket itself.
    ShiftStartTime,
}

impl GroupKeyField {
    /// Raw dimension value on a record. Time-bucket grouping has no
    /// categorical value and resolves through the bucket instead.
    pub fn value<'a>(&self, rec: &'a ProductionRecord) -> Option<&'a str> {
        let v = match self {
            GroupKeyField::Unit => rec.mill_unit.as_deref(),
            GroupKeyField::ArticleName => rec.article_name.as_deref(),
            GroupKeyField::ArticleNumber => rec.article_number.as_deref(),
            GroupKeyField::LotId => rec.lot_id.as_deref(),
            GroupKeyField::MachineName => rec.machine_name.as_deref(),
            GroupKeyField::ShiftStartTime => rec.shift_start_time.as_deref(),
        };
        v.filter(|s| !s.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Granularity {
    #[default]
    Daily,
    Weekly,
    Monthly,
    Shift,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricGroup {
    #[default]
    Quality,
    Cuts,
    Alarms,
    Cmt,
}

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, d: NaiveDate) -> bool {
        d >= self.from && d <= self.to
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AggregationRequest {
    pub group_key_field: GroupKeyField,
    pub granularity: Granularity,
    pub metric_group: MetricGroup,
    /// Field name, alarm/CMT key, or `customTotalIPI` / `customTotalHSIPI`.
    pub selected_metric: String,
    pub hide_empty_latest: bool,
    pub filter_field: Option<GroupKeyField>,
    pub filter_values: Vec<String>,
    /// Restrict output to these group labels (empty = all).
    pub selected_labels: Vec<String>,
    pub unit: Option<String>,
    pub date_range: Option<DateRange>,
    /// Track per-machine sub-accumulators for drill-down.
    pub drill_down: bool,
    pub fallback_label: String,
}

impl Default for AggregationRequest {
    fn default() -> Self {
        Self {
            group_key_field: GroupKeyField::Unit,
            granularity: Granularity::Daily,
            metric_group: MetricGroup::Quality,
            selected_metric: "customTotalIPI".to_string(),
            hide_empty_latest: false,
            filter_field: None,
            filter_values: Vec::new(),
            selected_labels: Vec::new(),
            unit: None,
            date_range: None,
            drill_down: false,
            fallback_label: TREND_FALLBACK_LABEL.to_string(),
        }
    }
}

impl AggregationRequest {
    /// Defaults for the grouped report view, which labels missing dimensions
    /// `"N/A"` rather than `"Unknown"`.
    pub fn grouped_report() -> Self {
        Self::default().for_grouped_report()
    }

    /// Reuse a configured request for the grouped report: same grouping,
    /// filters and metric group, with the report's fallback label.
    pub fn for_grouped_report(self) -> Self {
        Self {
            fallback_label: REPORT_FALLBACK_LABEL.to_string(),
            ..self
        }
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| ReportError::io(path, e))?;
        serde_json::from_str(&text).map_err(|e| ReportError::json(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_parses_camel_case_with_defaults() {
        let req: AggregationRequest = serde_json::from_str(
            r#"{
                "groupKeyField": "machineName",
                "granularity": "weekly",
                "metricGroup": "cuts",
                "selectedMetric": "nCuts",
                "hideEmptyLatest": true,
                "filterField": "articleNumber",
                "filterValues": ["A1"],
                "dateRange": {"from": "2024-01-01", "to": "2024-01-31"}
            }"#,
        )
        .unwrap();
        assert_eq!(req.group_key_field, GroupKeyField::MachineName);
        assert_eq!(req.granularity, Granularity::Weekly);
        assert_eq!(req.metric_group, MetricGroup::Cuts);
        assert_eq!(req.filter_field, Some(GroupKeyField::ArticleNumber));
        assert_eq!(req.fallback_label, "Unknown");
        assert!(!req.drill_down);
        let range = req.date_range.unwrap();
        assert!(range.contains(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()));
        assert!(!range.contains(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()));
    }

    #[test]
    fn test_fallback_labels_differ_per_view() {
        assert_eq!(AggregationRequest::default().fallback_label, "Unknown");
        assert_eq!(AggregationRequest::grouped_report().fallback_label, "N/A");
    }

    #[test]
    fn test_grouped_report_keeps_configured_grouping() {
        let configured: AggregationRequest = serde_json::from_str(
            r#"{
                "granularity": "weekly",
                "groupKeyField": "machineName",
                "metricGroup": "alarms",
                "unit": "U2",
                "filterField": "lotId",
                "filterValues": ["L7"]
            }"#,
        )
        .unwrap();
        let req = configured.for_grouped_report();
        assert_eq!(req.granularity, Granularity::Weekly);
        assert_eq!(req.group_key_field, GroupKeyField::MachineName);
        assert_eq!(req.metric_group, MetricGroup::Alarms);
        assert_eq!(req.unit.as_deref(), Some("U2"));
        assert_eq!(req.filter_field, Some(GroupKeyField::LotId));
        assert_eq!(req.filter_values, vec!["L7"]);
        assert_eq!(req.fallback_label, "N/A");
    }

    #[test]
    fn test_blank_dimension_is_missing() {
        let rec = ProductionRecord {
            mill_unit: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(GroupKeyField::Unit.value(&rec), None);
    }
}
