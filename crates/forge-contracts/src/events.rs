use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

pub type EventPayload = Map<String, Value>;

const RESERVED_KEYS: [&str; 3] = ["type", "session_id", "ts"];

/// Every state change a session records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    SessionStarted,
    CommandInterpreted,
    PromptExpanded,
    ExpansionFailed,
    DraftUpdated,
    ReferenceAdded,
    ReferenceToggled,
    ReferencesCleared,
    GenerationStarted,
    ArtifactCreated,
    GenerationFailed,
    HistoryExported,
    SessionFinished,
}

impl SessionEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionEvent::SessionStarted => "session_started",
            SessionEvent::CommandInterpreted => "command_interpreted",
            SessionEvent::PromptExpanded => "prompt_expanded",
            SessionEvent::ExpansionFailed => "expansion_failed",
            SessionEvent::DraftUpdated => "draft_updated",
            SessionEvent::ReferenceAdded => "reference_added",
            SessionEvent::ReferenceToggled => "reference_toggled",
            SessionEvent::ReferencesCleared => "references_cleared",
            SessionEvent::GenerationStarted => "generation_started",
            SessionEvent::ArtifactCreated => "artifact_created",
            SessionEvent::GenerationFailed => "generation_failed",
            SessionEvent::HistoryExported => "history_exported",
            SessionEvent::SessionFinished => "session_finished",
        }
    }
}

/// Appends one JSON object per line to a session's `events.jsonl`.
///
/// Each line carries `type`, `session_id` and `ts`; payload entries using
/// those keys are dropped.
#[derive(Debug, Clone)]
pub struct EventWriter {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    path: PathBuf,
    session_id: String,
    append: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(Shared {
                path: path.into(),
                session_id: session_id.into(),
                append: Mutex::new(()),
            }),
        }
    }

    /// Writer for a fresh session with a random id.
    pub fn for_new_session(path: impl Into<PathBuf>) -> Self {
        Self::new(path, format!("session-{}", Uuid::new_v4().simple()))
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    pub fn session_id(&self) -> &str {
        &self.shared.session_id
    }

    pub fn emit(&self, event: SessionEvent, payload: EventPayload) -> anyhow::Result<Value> {
        let mut record = Map::new();
        record.insert("type".to_string(), Value::String(event.as_str().to_string()));
        record.insert(
            "session_id".to_string(),
            Value::String(self.shared.session_id.clone()),
        );
        record.insert(
            "ts".to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)),
        );
        record.extend(
            payload
                .into_iter()
                .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str())),
        );

        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        if let Some(parent) = self.shared.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let _guard = self
            .shared
            .append
            .lock()
            .map_err(|_| anyhow::anyhow!("event log lock poisoned"))?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.shared.path)?
            .write_all(line.as_bytes())?;

        Ok(Value::Object(record))
    }
}
