use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use log::{debug, info};
use tokio::sync::watch;

use crate::{
    config::JoinConfig,
    dom::{Document, Element},
    emitter::Emitter,
    metrics::METRICS,
    schema::EventKind,
};

use super::{WatcherHandle, sampling_timer};

/// Join watcher state.
///
/// Moves `Waiting → Attached` at most once and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinState {
    /// Probing for the join control
    Waiting,

    /// Control found, click detector armed, probing stopped
    Attached,
}

/// Catches the first join of the session.
///
/// While `Waiting`, every tick and every page mutation tries the
/// configured selectors in order and takes the first hit. Once found,
/// the timer and mutation signal are released and the task waits for
/// a single click on that control, emits `meeting_started`, and ends.
///
/// NOT RESPONSIBLE FOR:
/// - Tracking the control after the first sighting
/// - Re-arming if the control is replaced
///
pub struct JoinWatcher {
    doc: Arc<dyn Document>,
    emitter: Emitter,
    selectors: Vec<String>,
    period: Duration,
    mutations: watch::Receiver<u64>,
    state: watch::Sender<JoinState>,
}

impl JoinWatcher {
    /// Page changes from this point on count as probe triggers, even
    /// before the task is spawned.
    pub fn new(doc: Arc<dyn Document>, emitter: Emitter, cfg: &JoinConfig) -> Self {
        let (state, _) = watch::channel(JoinState::Waiting);
        let mutations = doc.mutations();
        Self {
            doc,
            emitter,
            selectors: cfg.selectors.clone(),
            period: Duration::from_millis(cfg.interval_ms),
            mutations,
            state,
        }
    }

    /// Observer for the watcher's state.
    pub fn subscribe(&self) -> watch::Receiver<JoinState> {
        self.state.subscribe()
    }

    /// Starts the watcher task.
    pub fn spawn(self) -> WatcherHandle {
        WatcherHandle::spawn("join", self.run())
    }

    async fn run(mut self) {
        let control = {
            let mut timer = sampling_timer(self.period);
            let mut observing = true;
            loop {
                tokio::select! {
                    _ = timer.tick() => {}
                    changed = self.mutations.changed(), if observing => {
                        if changed.is_err() {
                            debug!("page stopped reporting mutations, ticks only");
                            observing = false;
                        }
                    }
                }
                METRICS.join_probes.fetch_add(1, Ordering::Relaxed);

                match self.probe() {
                    Some(el) => break el,
                    None => debug!("join control not present yet"),
                }
            }
            // timer dropped here: no probing past this point
        };

        self.state.send_replace(JoinState::Attached);
        info!("Join control found ({:?}), waiting for click", control.text.trim());

        self.doc.clicked(&control).await;
        info!("Join control clicked");
        self.emitter.emit(EventKind::MeetingStarted);
    }

    /// First element matched by the selectors, tried in order.
    fn probe(&self) -> Option<Element> {
        self.selectors
            .iter()
            .find_map(|selector| self.doc.query_selector(selector))
    }
}
