use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Payload attached to an event record.
///
/// Always a JSON object. Its shape depends on the event kind and is
/// not validated on this side; the collector owns interpretation.
pub type Payload = Map<String, Value>;

/// Fixed vocabulary of event kinds understood by the collector.
///
/// Serialized as the snake_case strings the collector routes on
/// (e.g. "meet_loaded", "participants_update").
///
/// IMPORTANT:
/// - New kinds are added by convention only; the collector stores
///   unknown kinds verbatim.
///
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The conference page finished loading
    MeetLoaded,

    /// The user clicked the join control
    MeetingStarted,

    /// Roster snapshot, payload `{participants: [...]}`
    ParticipantsUpdate,

    /// The page is tearing down
    MeetingEnded,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::MeetLoaded => "meet_loaded",
            EventKind::MeetingStarted => "meeting_started",
            EventKind::ParticipantsUpdate => "participants_update",
            EventKind::MeetingEnded => "meeting_ended",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ------------------------------------------------------------
// Event record
// ------------------------------------------------------------
//
// Wire format of a single POST body:
//
//     { "interview_id": "...", "event_type": "...", "payload": {...} }
//
// `interview_id` carries the session identity generated at page
// load, not the scheduled interview id. Capture time is assigned
// by the collector on receipt.
//
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct EventRecord {
    pub interview_id: String,
    pub event_type: EventKind,
    pub payload: Payload,
}

// ------------------------------------------------------------
// Start command (control surface → watcher)
// ------------------------------------------------------------
//
// {"type":"START_MEET_BOT","meetUrl":"...","interviewId":null,"backendBaseUrl":"..."}
//
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ControlMessage {
    #[serde(rename = "START_MEET_BOT")]
    StartMeetBot(StartCommand),
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StartCommand {
    #[serde(default)]
    pub meet_url: String,

    #[serde(default)]
    pub interview_id: Option<String>,

    #[serde(default)]
    pub backend_base_url: Option<String>,
}

/// Backend used when the control surface leaves the field empty.
pub const DEFAULT_BACKEND_BASE_URL: &str = "http://localhost:8000";

impl StartCommand {
    /// Rejects commands that cannot start a session.
    pub fn validate(&self) -> Result<(), String> {
        if self.meet_url.trim().is_empty() {
            return Err("Please enter a Google Meet URL".to_string());
        }
        Ok(())
    }

    pub fn meet_url(&self) -> &str {
        self.meet_url.trim()
    }

    /// Interview id, with blank values treated as absent.
    pub fn interview_id(&self) -> Option<&str> {
        self.interview_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn backend_base_url(&self) -> &str {
        self.backend_base_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_BACKEND_BASE_URL)
    }
}

/// Reply to a start command, written back as a single JSON line.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct StartResponse {
    pub ok: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StartResponse {
    pub fn ok() -> Self {
        Self { ok: true, error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { ok: false, error: Some(error.into()) }
    }
}
