//! Page document abstraction
//!
//! Watchers never touch a concrete page. They see the host page
//! through the [`Document`] trait: element queries, a click wait,
//! and a mutation signal that fires whenever the page changes.
//!
//! `scripted` provides an in-memory document driven by a scenario.

pub mod scripted;

use tokio::sync::watch;

/// A node found by a selector query.
///
/// `id` identifies the node within its document for as long as it
/// stays attached; `text` is its visible text at query time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub id: u64,
    pub text: String,
}

/// Document is the seam between the watchers and the host page.
///
/// CONTRACT:
/// - Queries are synchronous and must not block
/// - Results are in document order
/// - A miss is `None` / an empty `Vec`, never an error
///
/// THREAD SAFETY:
/// - Shared between the watcher tasks via `Arc`
///
#[async_trait::async_trait]
pub trait Document: Send + Sync {

    /// First element matching `selector`.
    fn query_selector(&self, selector: &str) -> Option<Element>;

    /// Every element matching `selector`.
    fn query_selector_all(&self, selector: &str) -> Vec<Element>;

    /// Resolves on the next click on `element`.
    ///
    /// Stays pending forever if the element is never clicked,
    /// including after it has been removed from the page.
    async fn clicked(&self, element: &Element);

    /// Mutation signal for the page.
    ///
    /// The value is a counter bumped after every change to the set
    /// of attached elements. A fresh receiver starts with the current
    /// value marked as seen.
    fn mutations(&self) -> watch::Receiver<u64>;
}
