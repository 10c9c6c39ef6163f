use anyhow::{Result, bail};
use serde::Deserialize;

// ------------------------------------------------------------
// Root configuration
// ------------------------------------------------------------
//
// Top-level structure loaded from `config.json`.
//
// Every section is optional; a missing file section falls back
// to the values the watcher has always shipped with.
//
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    /// Where and how events are delivered
    pub collector: CollectorConfig,

    /// Join control detection
    pub join: JoinConfig,

    /// Participant roster sampling
    pub roster: RosterConfig,

    /// Path of the page scenario driving the scripted document
    pub scenario: Option<String>,

    /// Optional debug configuration
    pub debug: DebugConfig,
}

impl Config {
    /// Rejects values the watchers cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.join.interval_ms == 0 || self.roster.interval_ms == 0 {
            bail!("sampling intervals must be greater than zero");
        }
        if self.join.selectors.iter().all(|s| s.trim().is_empty()) {
            bail!("join.selectors must contain at least one selector");
        }
        if self.roster.selector.trim().is_empty() {
            bail!("roster.selector must not be empty");
        }
        if self.collector.timeout_ms == 0 {
            bail!("collector.timeout_ms must be greater than zero");
        }
        Ok(())
    }
}

// ------------------------------------------------------------
// Collector configuration
// ------------------------------------------------------------
//
// Notes:
// - `endpoint` overrides the one derived from the start command.
// - `demo` disables all network traffic; records are only logged.
// - `flush_grace_ms` bounds how long shutdown waits for in-flight sends.
//
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CollectorConfig {
    pub endpoint: Option<String>,

    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,

    pub demo: bool,

    pub flush_grace_ms: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: 10_000,
            demo: false,
            flush_grace_ms: 2_000,
        }
    }
}

// ------------------------------------------------------------
// Join watcher configuration
// ------------------------------------------------------------
//
// IMPORTANT:
// - Selectors are tried in order, most specific first.
// - The first selector that matches wins.
//
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct JoinConfig {
    pub interval_ms: u64,
    pub selectors: Vec<String>,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            interval_ms: 800,
            selectors: vec![
                "button[aria-label*='Join']".to_string(),
                "button[jsname='LgbsSe']".to_string(),
            ],
        }
    }
}

// ------------------------------------------------------------
// Roster watcher configuration
// ------------------------------------------------------------
//
// The selector is tied to the conference page's current markup.
// When the page changes its class names this stops matching and
// the watcher goes quiet.
//
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RosterConfig {
    pub interval_ms: u64,
    pub selector: String,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            interval_ms: 4_000,
            selector: "div[role='listitem'] .zWGUib".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DebugConfig {
    /// Enables the periodic metrics log line
    pub metrics: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self { metrics: true }
    }
}
