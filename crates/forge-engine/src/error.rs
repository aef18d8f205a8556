use std::fmt;

use forge_contracts::models::SelectionError;
use thiserror::Error;

/// The text delegate could not produce a usable prompt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpansionFailed {
    #[error("prompt engine error: {0}")]
    Delegate(String),
    #[error("prompt engine returned no text")]
    EmptyOutput,
    #[error("prompt engine returned {found} numbered variation(s); 3 are required")]
    MalformedVariants { found: usize },
}

/// Why a generation call produced no artifact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationFailure {
    #[error("the image service returned an empty response")]
    EmptyResponse,
    #[error("the model returned no image (safety block or internal error)")]
    NoImagePart,
    #[error("image request failed: {0}")]
    TransportError(String),
    #[error("the returned image could not be decoded: {0}")]
    UndecodableImage(String),
}

impl GenerationFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationFailure::EmptyResponse => "empty_response",
            GenerationFailure::NoImagePart => "no_image_part",
            GenerationFailure::TransportError(_) => "transport_error",
            GenerationFailure::UndecodableImage(_) => "undecodable_image",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Interpret,
    Generate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Interpret => f.write_str("Type a command first."),
            Stage::Generate => {
                f.write_str("The prompt is empty. Run a command or write a prompt first.")
            }
        }
    }
}

/// Every recoverable failure a session action can report.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{0}")]
    EmptyInput(Stage),
    #[error(transparent)]
    Expansion(#[from] ExpansionFailed),
    #[error(transparent)]
    Generation(#[from] GenerationFailure),
    #[error("unknown model '{0}'")]
    UnknownModel(String),
    #[error("no {0} model is registered")]
    NoModelAvailable(String),
    #[error("no reference named '{0}'")]
    UnknownReference(String),
    #[error("reference '{identity}' rejected: {reason}")]
    InvalidReference { identity: String, reason: String },
    #[error("no variation {0}; run a 'multiple:' command and pick 1, 2 or 3")]
    NoSuchVariant(usize),
    #[error("event log write failed: {0:#}")]
    EventLog(#[from] anyhow::Error),
}

impl From<SelectionError> for SessionError {
    fn from(err: SelectionError) -> Self {
        match err {
            SelectionError::Unknown { requested, .. } => SessionError::UnknownModel(requested),
            SelectionError::NoneAvailable { capability } => {
                SessionError::NoModelAvailable(capability)
            }
        }
    }
}

pub(crate) fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts
            .last()
            .map(|existing| existing == trimmed)
            .unwrap_or(false)
        {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
