// Trend and aggregation engine for textile quality telemetry.
//
// Flat per-shift production records flow through
// filter → grouping → accumulation → finalisation → trend assembly and come
// out as presentation-ready tables. A separate path rolls up the live
// current-shift snapshot by machine, unit or article.

pub mod accumulator;
pub mod config;
pub mod error;
pub mod filter;
pub mod finalizer;
pub mod grouping;
pub mod loader;
pub mod logging;
pub mod metrics;
pub mod output;
pub mod reports;
pub mod session;
pub mod trend;
pub mod types;
pub mod util;

pub use config::{AggregationRequest, GroupKeyField, Granularity, MetricGroup};
pub use error::{ReportError, Result};
pub use finalizer::FinalizePolicy;
pub use trend::build_trend;
pub use types::{LiveReportData, ProductionRecord, TrendTable};
