use crate::util::{lenient_counter_map, lenient_f64, lenient_opt_f64, lenient_string};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One machine-shift-article production record as delivered by the telemetry
/// API.
///
/// Every numeric field decodes leniently: missing, `null` or non-numeric
/// values become `0.0`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductionRecord {
    #[serde(deserialize_with = "lenient_string")]
    pub shift_start_time: Option<String>,
    /// Explicit shift number; 0 when the API did not send one.
    #[serde(deserialize_with = "lenient_f64")]
    pub shift_number: f64,
    #[serde(deserialize_with = "lenient_string")]
    pub mill_unit: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub machine_name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub article_number: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub article_name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub lot_id: Option<String>,

    #[serde(deserialize_with = "lenient_f64")]
    pub yarn_length: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub ip_ref_length: f64,

    #[serde(deserialize_with = "lenient_f64")]
    pub yarn_faults: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub n_cuts: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub s_cuts: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub l_cuts: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub t_cuts: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub fd_cuts: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub pp_cuts: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub cp_cuts: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub cm_cuts: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub ccp_cuts: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub ccm_cuts: f64,

    #[serde(deserialize_with = "lenient_f64")]
    pub thin50: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub thick50: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub nep200: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub thin40: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub thick35: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub nep140: f64,

    #[serde(deserialize_with = "lenient_f64")]
    pub cv_avg: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub h_avg: f64,

    #[serde(deserialize_with = "lenient_counter_map")]
    pub alarm_breakdown: BTreeMap<String, f64>,
    /// Precomputed alarm total, only present on live snapshot rows.
    #[serde(deserialize_with = "lenient_opt_f64", skip_serializing_if = "Option::is_none")]
    pub total_alarms: Option<f64>,
    #[serde(deserialize_with = "lenient_counter_map")]
    pub cmt_events: BTreeMap<String, f64>,
}

impl ProductionRecord {
    /// Value of a summable counter by its API field name.
    ///
    /// Alarm and CMT keys are looked up in their breakdown maps; unknown
    /// names read as 0.
    pub fn count_metric(&self, name: &str) -> f64 {
        match name {
            "yarnFaults" => self.yarn_faults,
            "nCuts" => self.n_cuts,
            "sCuts" => self.s_cuts,
            "lCuts" => self.l_cuts,
            "tCuts" => self.t_cuts,
            "fdCuts" => self.fd_cuts,
            "ppCuts" => self.pp_cuts,
            "cpCuts" => self.cp_cuts,
            "cmCuts" => self.cm_cuts,
            "ccpCuts" => self.ccp_cuts,
            "ccmCuts" => self.ccm_cuts,
            "thin50" => self.thin50,
            "thick50" => self.thick50,
            "nep200" => self.nep200,
            "thin40" => self.thin40,
            "thick35" => self.thick35,
            "nep140" => self.nep140,
            "totalAlarms" => self.alarm_total(),
            other => self
                .alarm_breakdown
                .get(other)
                .or_else(|| self.cmt_events.get(other))
                .copied()
                .unwrap_or(0.0),
        }
    }

    pub fn ipi(&self) -> f64 {
        self.thin50 + self.thick50 + self.nep200
    }

    pub fn hsipi(&self) -> f64 {
        self.thin40 + self.thick35 + self.nep140
    }

    /// Precomputed total when the snapshot carries one, else the breakdown sum.
    pub fn alarm_total(&self) -> f64 {
        self.total_alarms
            .unwrap_or_else(|| self.alarm_breakdown.values().sum())
    }
}

/// Live (current shift) snapshot as served by the dashboard endpoint.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LiveReportData {
    pub units: Vec<UnitSnapshot>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UnitSnapshot {
    #[serde(deserialize_with = "lenient_string")]
    pub mill_unit: Option<String>,
    #[serde(deserialize_with = "lenient_counter_map")]
    pub unit_cuts: BTreeMap<String, f64>,
    #[serde(deserialize_with = "lenient_counter_map")]
    pub unit_quality: BTreeMap<String, f64>,
    #[serde(deserialize_with = "lenient_counter_map")]
    pub alarm_breakdown: BTreeMap<String, f64>,
    #[serde(deserialize_with = "lenient_opt_f64", skip_serializing_if = "Option::is_none")]
    pub total_alarms: Option<f64>,
    pub articles: Vec<ArticleSnapshot>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArticleSnapshot {
    #[serde(deserialize_with = "lenient_string")]
    pub article_number: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub article_name: Option<String>,
    /// Per-machine rows reuse the production record schema; dimension fields
    /// missing on the row are filled from the enclosing unit and article.
    pub machines: Vec<ProductionRecord>,
}

/// One row of a trend table: a bucket and its finalised value per label.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrendRow {
    pub date: String,
    #[serde(flatten)]
    pub values: BTreeMap<String, String>,
}

/// One level of drill-down under a primary label.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DrillDown {
    pub labels: Vec<String>,
    pub data: Vec<TrendRow>,
    pub deltas: BTreeMap<String, String>,
}

/// Presentation-ready trend table (`TrendResponse`).
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrendTable {
    pub data: Vec<TrendRow>,
    pub labels: Vec<String>,
    pub dates: Vec<String>,
    /// Percent change per label, oldest defined bucket vs latest bucket.
    pub deltas: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drill_down_data: Option<BTreeMap<String, DrillDown>>,
}

/// Header span for shift-granularity tables: one date over its shift columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderSpan {
    pub date: String,
    pub shifts: Vec<String>,
}

/// Row of the grouped (search) report.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GroupedReportRow {
    pub date: String,
    pub label: String,
    #[serde(flatten)]
    pub values: BTreeMap<String, String>,
}

/// Machine-wise rollup of a live snapshot.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MachineRollup {
    pub machine_name: String,
    pub display_machine_name: String,
    #[serde(flatten)]
    pub metrics: BTreeMap<String, String>,
    pub articles: Vec<String>,
}

/// Unit- or article-wise rollup of a live snapshot.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SnapshotRow {
    pub label: String,
    #[serde(flatten)]
    pub metrics: BTreeMap<String, String>,
}
