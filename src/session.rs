// Holds the loaded record set between requests.
//
// Trend requests that arrive before the records do are queued and run, in
// arrival order, as soon as [`ReportSession::load`] is called.

use crate::config::AggregationRequest;
use crate::finalizer::FinalizePolicy;
use crate::trend::build_trend;
use crate::types::{ProductionRecord, TrendTable};
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::info;

#[derive(Debug)]
pub struct ReportSession {
    records: Option<Arc<Vec<ProductionRecord>>>,
    pending: VecDeque<AggregationRequest>,
    policy: FinalizePolicy,
}

impl ReportSession {
    pub fn new(policy: FinalizePolicy) -> Self {
        Self {
            records: None,
            pending: VecDeque::new(),
            policy,
        }
    }

    pub fn records(&self) -> Option<&[ProductionRecord]> {
        self.records.as_deref().map(|v| v.as_slice())
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Replace the record set and run every queued request against it.
    pub fn load(&mut self, records: Vec<ProductionRecord>) -> Vec<(AggregationRequest, TrendTable)> {
        let records = Arc::new(records);
        let queued: Vec<AggregationRequest> = self.pending.drain(..).collect();
        if !queued.is_empty() {
            info!(queued = queued.len(), "running queued trend requests");
        }
        let out = queued
            .into_iter()
            .map(|req| {
                let table = build_trend(&records, &req, &self.policy);
                (req, table)
            })
            .collect();
        self.records = Some(records);
        out
    }

    /// Run `req` now, or queue it and return `None` when nothing is loaded.
    pub fn request(&mut self, req: AggregationRequest) -> Option<TrendTable> {
        match &self.records {
            Some(records) => Some(build_trend(records, &req, &self.policy)),
            None => {
                self.pending.push_back(req);
                None
            }
        }
    }

    /// Run `req` on a worker thread against the shared, immutable record set.
    pub fn spawn_trend(&self, req: AggregationRequest) -> Option<JoinHandle<TrendTable>> {
        let records = Arc::clone(self.records.as_ref()?);
        let policy = self.policy;
        Some(thread::spawn(move || build_trend(&records, &req, &policy)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetricGroup;

    fn records() -> Vec<ProductionRecord> {
        vec![ProductionRecord {
            shift_start_time: Some("2024-01-01T06:00:00".into()),
            mill_unit: Some("U1".into()),
            n_cuts: 3.0,
            yarn_length: 100.0,
            ..Default::default()
        }]
    }

    fn cuts_request() -> AggregationRequest {
        AggregationRequest {
            metric_group: MetricGroup::Cuts,
            selected_metric: "nCuts".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_requests_queue_until_loaded() {
        let mut session = ReportSession::new(FinalizePolicy::live_trend());
        assert!(session.request(cuts_request()).is_none());
        assert!(session.request(AggregationRequest::default()).is_none());
        assert_eq!(session.pending(), 2);

        let done = session.load(records());
        assert_eq!(done.len(), 2);
        assert_eq!(done[0].0.selected_metric, "nCuts");
        assert_eq!(done[0].1.data[0].values["U1"], "3.00");
        assert_eq!(session.pending(), 0);

        let now = session.request(cuts_request()).unwrap();
        assert_eq!(now, done[0].1);
    }

    #[test]
    fn test_spawned_trend_matches_inline() {
        let mut session = ReportSession::new(FinalizePolicy::live_trend());
        assert!(session.spawn_trend(cuts_request()).is_none());
        session.load(records());
        let handle = session.spawn_trend(cuts_request()).unwrap();
        let threaded = handle.join().unwrap();
        assert_eq!(Some(threaded), session.request(cuts_request()));
    }
}
