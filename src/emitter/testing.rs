//! In-memory transport for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, bail};
use tokio::time::Instant;

use crate::schema::{EventKind, EventRecord};

use super::transport::Transport;

/// Records every delivered event with the (virtual) time it was posted.
pub struct RecordingTransport {
    origin: Instant,
    delivered: Mutex<Vec<(Duration, EventRecord)>>,
    started: Mutex<Vec<EventRecord>>,
    attempts: AtomicUsize,
    fail: bool,
    delay: Option<Duration>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Self::build(false, None)
    }

    /// Every post fails after being counted.
    pub fn failing() -> Arc<Self> {
        Self::build(true, None)
    }

    /// Every post takes `delay` before succeeding.
    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Self::build(false, Some(delay))
    }

    fn build(fail: bool, delay: Option<Duration>) -> Arc<Self> {
        Arc::new(Self {
            origin: Instant::now(),
            delivered: Mutex::new(Vec::new()),
            started: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            fail,
            delay,
        })
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Every attempted record, in the order `post` was entered.
    pub fn started(&self) -> Vec<EventRecord> {
        self.started.lock().unwrap().clone()
    }

    pub fn records(&self) -> Vec<EventRecord> {
        self.timeline().into_iter().map(|(_, r)| r).collect()
    }

    /// Delivered records with their offset from transport creation.
    pub fn timeline(&self) -> Vec<(Duration, EventRecord)> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.records().iter().map(|r| r.event_type).collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.kinds().into_iter().filter(|k| *k == kind).count()
    }
}

#[async_trait::async_trait]
impl Transport for RecordingTransport {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn post(&self, record: &EventRecord) -> Result<()> {
        let at = self.origin.elapsed();
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.started.lock().unwrap().push(record.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            bail!("simulated network error");
        }

        self.delivered.lock().unwrap().push((at, record.clone()));
        Ok(())
    }
}
