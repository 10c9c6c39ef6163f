use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Result, bail};
use log::{debug, warn};
use serde::Deserialize;
use tokio::sync::{broadcast, watch};
use tokio::time::{Instant, sleep_until};

use super::{Document, Element};

// ------------------------------------------------------------
// Scripted document
// ------------------------------------------------------------
//
// In-memory page. Elements are keyed by the selector that finds
// them; the selector string itself is the match rule, there is no
// CSS engine. Each selector keeps its elements in document order.
//
#[derive(Default)]
struct State {
    next_id: u64,
    nodes: HashMap<String, Vec<Element>>,
    queries: HashMap<String, usize>,
}

pub struct ScriptedDocument {
    state: Mutex<State>,
    clicks: broadcast::Sender<u64>,
    changes: watch::Sender<u64>,
}

impl Default for ScriptedDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedDocument {
    pub fn new() -> Self {
        let (clicks, _) = broadcast::channel(64);
        let (changes, _) = watch::channel(0);
        Self {
            state: Mutex::new(State::default()),
            clicks,
            changes,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // State stays consistent even if a holder panicked mid-query.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replaces everything `selector` matches with fresh elements.
    pub fn set<S: AsRef<str>>(&self, selector: &str, texts: &[S]) {
        {
            let mut state = self.lock();
            let mut elements = Vec::with_capacity(texts.len());
            for text in texts {
                state.next_id += 1;
                elements.push(Element {
                    id: state.next_id,
                    text: text.as_ref().to_string(),
                });
            }
            state.nodes.insert(selector.to_string(), elements);
        }
        self.changed();
    }

    /// Removes everything `selector` matches.
    pub fn clear(&self, selector: &str) {
        let removed = self.lock().nodes.remove(selector).is_some();
        if removed {
            self.changed();
        }
    }

    fn changed(&self) {
        self.changes.send_modify(|version| *version += 1);
    }

    /// Clicks the first element matching `selector`.
    ///
    /// Returns `false` when nothing matches.
    pub fn click(&self, selector: &str) -> bool {
        let target = self
            .lock()
            .nodes
            .get(selector)
            .and_then(|els| els.first())
            .map(|el| el.id);

        match target {
            Some(id) => {
                // No listener is a normal outcome: nobody cares about this click.
                let _ = self.clicks.send(id);
                true
            }
            None => false,
        }
    }

    /// How many times `selector` has been queried.
    pub fn query_count(&self, selector: &str) -> usize {
        self.lock().queries.get(selector).copied().unwrap_or(0)
    }

    fn matches(&self, selector: &str) -> Vec<Element> {
        let mut state = self.lock();
        *state.queries.entry(selector.to_string()).or_default() += 1;
        state.nodes.get(selector).cloned().unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Document for ScriptedDocument {
    fn query_selector(&self, selector: &str) -> Option<Element> {
        self.matches(selector).into_iter().next()
    }

    fn query_selector_all(&self, selector: &str) -> Vec<Element> {
        self.matches(selector)
    }

    async fn clicked(&self, element: &Element) {
        let mut rx = self.clicks.subscribe();
        loop {
            match rx.recv().await {
                Ok(id) if id == element.id => return,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!("click listener lagged by {} events", n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    futures_util::future::pending::<()>().await;
                }
            }
        }
    }

    fn mutations(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}

// ------------------------------------------------------------
// Scenario
// ------------------------------------------------------------
//
// Timeline of page changes, loaded from JSON:
//
//     {
//       "steps": [
//         { "at_ms": 900,  "set":   { "button[aria-label*='Join']": ["Join now"] } },
//         { "at_ms": 1200, "click": "button[aria-label*='Join']" },
//         { "at_ms": 7000, "clear": "div[role='listitem'] .zWGUib" }
//       ],
//       "unload_at_ms": 10000
//     }
//
// Offsets are measured from page load.
//
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct Scenario {
    #[serde(default)]
    pub steps: Vec<Step>,

    /// When the page tears down; `None` keeps it open indefinitely
    #[serde(default)]
    pub unload_at_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Step {
    pub at_ms: u64,

    #[serde(flatten)]
    pub action: Action,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Replace the elements of each selector
    Set(BTreeMap<String, Vec<String>>),

    /// Remove all elements of a selector
    Clear(String),

    /// Click the first element of a selector
    Click(String),
}

impl Scenario {
    pub fn load(path: &str) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let scenario: Scenario = serde_json::from_str(data)?;
        scenario.validate()?;
        Ok(scenario)
    }

    fn validate(&self) -> Result<()> {
        if self.steps.windows(2).any(|w| w[0].at_ms > w[1].at_ms) {
            bail!("scenario steps must be sorted by at_ms");
        }
        if let (Some(unload), Some(last)) = (self.unload_at_ms, self.steps.last()) {
            if last.at_ms > unload {
                bail!("scenario step at {}ms comes after unload at {}ms", last.at_ms, unload);
            }
        }
        Ok(())
    }

    pub fn unload_after(&self) -> Option<Duration> {
        self.unload_at_ms.map(Duration::from_millis)
    }

    /// Applies every step to `doc` at its offset from `start`.
    pub async fn play(&self, doc: &ScriptedDocument, start: Instant) {
        for step in &self.steps {
            sleep_until(start + Duration::from_millis(step.at_ms)).await;
            apply(doc, step);
        }
    }
}

fn apply(doc: &ScriptedDocument, step: &Step) {
    match &step.action {
        Action::Set(sets) => {
            for (selector, texts) in sets {
                debug!("t={}ms set {} ({} nodes)", step.at_ms, selector, texts.len());
                doc.set(selector, texts.as_slice());
            }
        }
        Action::Clear(selector) => {
            debug!("t={}ms clear {}", step.at_ms, selector);
            doc.clear(selector);
        }
        Action::Click(selector) => {
            if !doc.click(selector) {
                warn!("t={}ms click on {} matched nothing", step.at_ms, selector);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const JOIN: &str = "button[aria-label*='Join']";
    const ROSTER: &str = "div[role='listitem'] .zWGUib";

    #[test]
    fn queries_follow_document_order() {
        let doc = ScriptedDocument::new();
        assert!(doc.query_selector(JOIN).is_none());
        assert!(doc.query_selector_all(ROSTER).is_empty());

        doc.set(ROSTER, &["Ann", "Bob", "Cy"]);
        let texts: Vec<String> = doc
            .query_selector_all(ROSTER)
            .into_iter()
            .map(|e| e.text)
            .collect();
        assert_eq!(texts, vec!["Ann", "Bob", "Cy"]);
        assert_eq!(doc.query_selector(ROSTER).unwrap().text, "Ann");
        assert_eq!(doc.query_count(ROSTER), 3);

        doc.clear(ROSTER);
        assert!(doc.query_selector_all(ROSTER).is_empty());
    }

    #[test]
    fn set_issues_fresh_ids() {
        let doc = ScriptedDocument::new();
        doc.set(JOIN, &["Join now"]);
        let first = doc.query_selector(JOIN).unwrap();
        doc.set(JOIN, &["Join now"]);
        let second = doc.query_selector(JOIN).unwrap();
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn clicked_resolves_only_for_its_element() {
        let doc = Arc::new(ScriptedDocument::new());
        doc.set(JOIN, &["Join now"]);
        doc.set("other", &["x"]);
        let el = doc.query_selector(JOIN).unwrap();

        let waiter = tokio::spawn({
            let doc = doc.clone();
            async move { doc.clicked(&el).await }
        });
        tokio::task::yield_now().await;

        assert!(doc.click("other"));
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        assert!(doc.click(JOIN));
        waiter.await.unwrap();
    }

    #[test]
    fn mutations_track_attach_and_detach_only() {
        let doc = ScriptedDocument::new();
        let mut rx = doc.mutations();
        assert!(!rx.has_changed().unwrap());

        doc.set(JOIN, &["Join now"]);
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        // queries and clicks leave the page as it is
        doc.query_selector(JOIN);
        doc.click(JOIN);
        doc.clear("never-set");
        assert!(!rx.has_changed().unwrap());

        doc.clear(JOIN);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 2);
    }

    #[test]
    fn click_without_match_reports_false() {
        let doc = ScriptedDocument::new();
        assert!(!doc.click(JOIN));
    }

    #[test]
    fn scenario_parses_all_actions() {
        let scenario = Scenario::from_json(
            r#"{
                "steps": [
                    { "at_ms": 900, "set": { "button[aria-label*='Join']": ["Join now"] } },
                    { "at_ms": 1200, "click": "button[aria-label*='Join']" },
                    { "at_ms": 7000, "clear": "div[role='listitem'] .zWGUib" }
                ],
                "unload_at_ms": 10000
            }"#,
        )
        .unwrap();

        assert_eq!(scenario.steps.len(), 3);
        assert_eq!(scenario.steps[1].action, Action::Click(JOIN.to_string()));
        assert_eq!(scenario.steps[2].action, Action::Clear(ROSTER.to_string()));
        assert_eq!(scenario.unload_after(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn scenario_rejects_unsorted_steps() {
        let err = Scenario::from_json(
            r#"{ "steps": [ { "at_ms": 500, "clear": "a" }, { "at_ms": 100, "clear": "b" } ] }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("sorted"));
    }

    #[test]
    fn scenario_rejects_steps_after_unload() {
        assert!(
            Scenario::from_json(
                r#"{ "steps": [ { "at_ms": 500, "clear": "a" } ], "unload_at_ms": 100 }"#
            )
            .is_err()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn play_applies_steps_on_schedule() {
        let doc = ScriptedDocument::new();
        let scenario = Scenario::from_json(
            r#"{ "steps": [
                { "at_ms": 1000, "set": { "div[role='listitem'] .zWGUib": ["Ann"] } },
                { "at_ms": 3000, "clear": "div[role='listitem'] .zWGUib" }
            ] }"#,
        )
        .unwrap();

        let start = Instant::now();
        let doc = Arc::new(doc);
        let player = tokio::spawn({
            let doc = doc.clone();
            async move { scenario.play(&doc, start).await }
        });

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(doc.query_selector(ROSTER).is_none());

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(doc.query_selector(ROSTER).unwrap().text, "Ann");

        player.await.unwrap();
        assert!(doc.query_selector(ROSTER).is_none());
        assert_eq!(Instant::now() - start, Duration::from_millis(3000));
    }
}
