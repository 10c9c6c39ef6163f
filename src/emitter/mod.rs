//! Event emitter
//!
//! Every event leaves the process through [`Emitter`]. Emission is
//! fire-and-forget: the record is built synchronously and pushed onto
//! an unbounded queue. A single dispatcher task drains the queue and
//! starts one delivery attempt per record, in queue order. Attempts
//! run concurrently once started.
//!
//! The caller never sees the outcome. Failures are logged and
//! counted, nothing is retried.

pub mod transport;

#[cfg(test)]
pub mod testing;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use log::{debug, error};
use tokio::sync::{Notify, mpsc};

use crate::{
    metrics::METRICS,
    schema::{EventKind, EventRecord, Payload},
    session::SessionId,
};

use transport::Transport;

/// Number of sends currently in flight.
#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

/// Decrements the in-flight count when a queued record settles,
/// including when it is dropped by runtime shutdown.
struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// A record waiting for (or undergoing) its delivery attempt.
struct Queued {
    record: EventRecord,
    _guard: InFlightGuard,
}

#[derive(Clone)]
pub struct Emitter {
    session: Arc<SessionId>,
    queue: mpsc::UnboundedSender<Queued>,
    in_flight: Arc<InFlight>,
}

impl Emitter {
    /// Creates the emitter and spawns its dispatcher.
    ///
    /// Must be called from within a tokio runtime. The dispatcher
    /// exits once every clone of the emitter is dropped and the
    /// remaining attempts have settled.
    pub fn new(session: Arc<SessionId>, transport: Arc<dyn Transport>) -> Self {
        let (queue, rx) = mpsc::unbounded_channel();
        tokio::spawn(dispatch(rx, transport));

        Self {
            session,
            queue,
            in_flight: Arc::new(InFlight::default()),
        }
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    /// Emits an event with an empty payload.
    pub fn emit(&self, kind: EventKind) {
        self.emit_with(kind, Payload::new());
    }

    /// Emits an event carrying `payload` verbatim.
    ///
    /// Returns immediately. Must be called from within a tokio runtime.
    pub fn emit_with(&self, kind: EventKind, payload: Payload) {
        let record = EventRecord {
            interview_id: self.session.as_str().to_string(),
            event_type: kind,
            payload,
        };

        METRICS.events_emitted.fetch_add(1, Ordering::Relaxed);
        debug!("Sending event: {}", kind);

        self.in_flight.count.fetch_add(1, Ordering::AcqRel);
        let queued = Queued {
            record,
            _guard: InFlightGuard(self.in_flight.clone()),
        };

        // Dispatcher gone means the runtime is shutting down; the
        // returned record drops here and releases its in-flight slot.
        if self.queue.send(queued).is_err() {
            debug!("Dispatcher stopped, dropping {}", kind);
        }
    }

    /// Waits up to `grace` for every in-flight send to settle.
    ///
    /// Returns `true` if nothing is left in flight. Delivery stays
    /// best-effort; this only gives pending sends a chance to finish
    /// before the process exits.
    pub async fn flush(&self, grace: Duration) -> bool {
        let wait_idle = async {
            loop {
                let idle = self.in_flight.idle.notified();
                if self.in_flight.count.load(Ordering::Acquire) == 0 {
                    return;
                }
                idle.await;
            }
        };

        tokio::time::timeout(grace, wait_idle).await.is_ok()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.count.load(Ordering::Acquire)
    }
}

/// Starts attempts in queue order and keeps them running side by side.
async fn dispatch(mut rx: mpsc::UnboundedReceiver<Queued>, transport: Arc<dyn Transport>) {
    let mut sends = FuturesUnordered::new();

    loop {
        tokio::select! {
            biased;

            next = rx.recv() => match next {
                Some(queued) => sends.push(deliver(transport.clone(), queued)),
                None => break,
            },

            Some(()) = sends.next(), if !sends.is_empty() => {}
        }
    }

    while sends.next().await.is_some() {}
}

async fn deliver(transport: Arc<dyn Transport>, queued: Queued) {
    let kind = queued.record.event_type;

    match transport.post(&queued.record).await {
        Ok(()) => {
            METRICS.events_delivered.fetch_add(1, Ordering::Relaxed);
            debug!("Event delivered: {} via {}", kind, transport.name());
        }
        Err(e) => {
            METRICS.send_errors.fetch_add(1, Ordering::Relaxed);
            error!("Failed to deliver {} via {}: {:#}", kind, transport.name(), e);
        }
    }
}
