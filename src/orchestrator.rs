use std::sync::Arc;

use anyhow::Result;
use log::info;
use serde_json::json;
use tokio::sync::watch;

use crate::{
    config::Config,
    dom::Document,
    emitter::{Emitter, transport::Transport},
    schema::{EventKind, Payload},
    session::SessionId,
    watcher::{
        WatcherHandle,
        join::{JoinState, JoinWatcher},
        roster::RosterWatcher,
    },
};

/// What the control surface told us about the page being watched.
///
/// Attached to `meet_loaded` so the collector can tie the generated
/// session to the scheduled interview.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub meet_url: Option<String>,
    pub interview_id: Option<String>,
}

impl PageContext {
    fn loaded_payload(&self) -> Payload {
        let mut payload = Payload::new();
        if let Some(url) = &self.meet_url {
            payload.insert("meet_url".into(), json!(url));
        }
        if let Some(id) = &self.interview_id {
            payload.insert("interview_id".into(), json!(id));
        }
        payload
    }
}

/// Wires one page load together.
///
/// `start` is the page-load hook and `teardown` the unload hook.
/// Between the two, the orchestrator only owns the watcher handles.
///
/// GUARANTEES:
/// - One session identity per `start`
/// - `meet_loaded` is issued before any watcher runs
/// - `meeting_ended` is issued exactly once, by `teardown`
///
/// `teardown` consumes the orchestrator, so a second call cannot be
/// written. Dropping without teardown still stops the watchers but
/// sends no `meeting_ended`.
pub struct Orchestrator {
    emitter: Emitter,
    join: WatcherHandle,
    roster: WatcherHandle,
    join_state: watch::Receiver<JoinState>,
}

impl Orchestrator {

    /// Page-load hook.
    ///
    /// FAILURE:
    /// - Only identity generation can fail, and nothing is emitted
    ///   or started in that case.
    pub fn start(
        doc: Arc<dyn Document>,
        transport: Arc<dyn Transport>,
        config: &Config,
        context: &PageContext,
    ) -> Result<Self> {
        let session = Arc::new(SessionId::generate()?);
        info!("Page loaded, session {}", session);

        let emitter = Emitter::new(session, transport);
        emitter.emit_with(EventKind::MeetLoaded, context.loaded_payload());

        let join = JoinWatcher::new(doc.clone(), emitter.clone(), &config.join);
        let join_state = join.subscribe();
        let join = join.spawn();

        let roster = RosterWatcher::new(doc, emitter.clone(), &config.roster).spawn();

        Ok(Self {
            emitter,
            join,
            roster,
            join_state,
        })
    }

    pub fn session(&self) -> &SessionId {
        self.emitter.session()
    }

    pub fn join_state(&self) -> JoinState {
        *self.join_state.borrow()
    }

    /// Page-teardown hook.
    ///
    /// Stops whatever watchers are still running, then issues
    /// `meeting_ended`. Returns the emitter so the caller may give
    /// in-flight sends a chance to finish.
    pub fn teardown(mut self) -> Emitter {
        let join_running = self.join.cancel();
        let roster_running = self.roster.cancel();
        info!(
            "Page teardown (join watcher running={}, roster watcher running={})",
            join_running, roster_running
        );

        self.emitter.emit(EventKind::MeetingEnded);
        self.emitter.clone()
    }
}
