//! Overlay pass metrics
//!
//! Aggregates pass reports locally and mirrors them to the `metrics` facade.
//! Without an installed recorder the facade calls are no-ops.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::overlay::PassReport;

/// Running totals over all passes of one controller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassMetrics {
    pub passes: u64,
    pub failed_passes: u64,
    pub lines_created: u64,
    pub lines_deleted: u64,
    pub stale_deletes: u64,
    pub unchanged: u64,
    /// Passes that issued no adapter call
    pub noop_passes: u64,
    pub last_pass_ms: Option<u64>,
}

impl PassMetrics {
    pub fn record_pass(&mut self, report: &PassReport) {
        self.passes += 1;
        self.lines_created += report.created as u64;
        self.lines_deleted += report.deleted as u64;
        self.stale_deletes += report.stale_deletes as u64;
        self.unchanged += report.unchanged as u64;
        if report.is_noop() {
            self.noop_passes += 1;
        }
        self.last_pass_ms = Some(now_ms());

        metrics::increment_counter!("chartsync_passes_total");
        metrics::counter!("chartsync_lines_created_total", report.created as u64);
        metrics::counter!("chartsync_lines_deleted_total", report.deleted as u64);
        metrics::counter!("chartsync_stale_deletes_total", report.stale_deletes as u64);
    }

    pub fn record_failure(&mut self) {
        self.failed_passes += 1;
        self.last_pass_ms = Some(now_ms());
        metrics::increment_counter!("chartsync_failed_passes_total");
    }

    /// Net lines the overlay currently believes it owns
    pub fn net_lines(&self) -> i64 {
        self.lines_created as i64 - (self.lines_deleted + self.stale_deletes) as i64
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
