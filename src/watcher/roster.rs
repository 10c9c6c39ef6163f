use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use log::debug;
use serde_json::json;

use crate::{
    config::RosterConfig,
    dom::Document,
    emitter::Emitter,
    metrics::METRICS,
    schema::{EventKind, Payload},
    util,
};

use super::{WatcherHandle, sampling_timer};

/// Reports the participant roster on every tick.
///
/// Each tick rebuilds the snapshot from scratch and emits it, even
/// when nothing changed since the last one. Deduplication happens
/// at the collector. A tick that finds no entries is skipped.
///
/// Runs until cancelled.
pub struct RosterWatcher {
    doc: Arc<dyn Document>,
    emitter: Emitter,
    selector: String,
    period: Duration,
}

impl RosterWatcher {
    pub fn new(doc: Arc<dyn Document>, emitter: Emitter, cfg: &RosterConfig) -> Self {
        Self {
            doc,
            emitter,
            selector: cfg.selector.clone(),
            period: Duration::from_millis(cfg.interval_ms),
        }
    }

    pub fn spawn(self) -> WatcherHandle {
        WatcherHandle::spawn("roster", self.run())
    }

    async fn run(self) {
        let mut timer = sampling_timer(self.period);
        loop {
            timer.tick().await;
            self.sample();
        }
    }

    /// One tick: read the roster and emit it if non-empty.
    fn sample(&self) -> Option<usize> {
        METRICS.roster_ticks.fetch_add(1, Ordering::Relaxed);

        let nodes = self.doc.query_selector_all(&self.selector);
        if nodes.is_empty() {
            METRICS.roster_empty_ticks.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let participants = util::trimmed_texts(nodes.iter().map(|n| n.text.as_str()));
        let count = participants.len();
        debug!("roster tick: {} entries", count);

        let mut payload = Payload::new();
        payload.insert("participants".into(), json!(participants));
        self.emitter.emit_with(EventKind::ParticipantsUpdate, payload);

        Some(count)
    }
}
