use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;

/// Process-wide counters for the watcher pipeline.
///
/// Lock-free; safe to bump from any task. Only read by the
/// periodic reporter in `main`, never by pipeline logic.
#[derive(Default)]
pub struct RuntimeMetrics {
    // Emission
    pub events_emitted: AtomicUsize,
    pub events_delivered: AtomicUsize,
    pub send_errors: AtomicUsize,

    // Sampling
    pub join_probes: AtomicUsize,
    pub roster_ticks: AtomicUsize,
    pub roster_empty_ticks: AtomicUsize,
}

impl RuntimeMetrics {
    /// One-line summary for the log.
    pub fn summary(&self) -> String {
        format!(
            "emitted={} delivered={} send_err={} join_probes={} roster_ticks={} roster_empty={}",
            self.events_emitted.load(Ordering::Relaxed),
            self.events_delivered.load(Ordering::Relaxed),
            self.send_errors.load(Ordering::Relaxed),
            self.join_probes.load(Ordering::Relaxed),
            self.roster_ticks.load(Ordering::Relaxed),
            self.roster_empty_ticks.load(Ordering::Relaxed),
        )
    }
}

/// Global metrics registry (singleton)
pub static METRICS: Lazy<Arc<RuntimeMetrics>> =
    Lazy::new(|| Arc::new(RuntimeMetrics::default()));
