use serde::{Deserialize, Serialize};

use super::command_registry::{CommandSpec, Operation, NO_ARG_COMMANDS};

/// A prompt command resolved once at interpretation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub operation: Operation,
    pub payload: String,
}

impl Command {
    pub fn new(operation: Operation, payload: impl Into<String>) -> Self {
        Self {
            operation,
            payload: payload.into(),
        }
    }
}

/// One line typed into a session, either a meta command or a prompt command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionInput {
    Noop,
    Help,
    ListModels,
    SetModel(String),
    AddReferences(Vec<String>),
    UseReference(String),
    UnuseReference(String),
    ListReferences,
    ClearReferences,
    SetDraft(String),
    ShowDraft,
    PickVariant(Option<usize>),
    Generate,
    History,
    Export(Option<String>),
    Prompt(String),
    Unknown { command: String, arg: String },
}

/// Splits `<tag>: <payload>` into a [`Command`].
///
/// The text before the first colon must equal one of the literal tags once
/// trimmed. Anything else falls back to `improve` with the whole trimmed input
/// as payload. Empty payloads are forwarded as-is.
pub fn interpret(raw: &str) -> Command {
    let trimmed = raw.trim();
    if let Some((head, tail)) = trimmed.split_once(':') {
        if let Some(operation) = Operation::from_tag(head.trim()) {
            return Command::new(operation, tail.trim());
        }
    }
    Command::new(Operation::Improve, trimmed)
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

fn parse_path_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

fn parse_single_arg(arg: &str) -> String {
    let parts = parse_path_args(arg);
    match parts.len() {
        0 => String::new(),
        1 => parts[0].clone(),
        _ => parts.join(" "),
    }
}

pub fn parse_session_input(text: &str) -> SessionInput {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return SessionInput::Noop;
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let arg = slash_tail[command_len..].trim();

            if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
                return match action {
                    "help" => SessionInput::Help,
                    "list_models" => SessionInput::ListModels,
                    "list_references" => SessionInput::ListReferences,
                    "clear_references" => SessionInput::ClearReferences,
                    "show_draft" => SessionInput::ShowDraft,
                    "generate" => SessionInput::Generate,
                    _ => SessionInput::History,
                };
            }

            match command.as_str() {
                "model" => return SessionInput::SetModel(arg.to_string()),
                "ref" => return SessionInput::AddReferences(parse_path_args(arg)),
                "use" => return SessionInput::UseReference(parse_single_arg(arg)),
                "unuse" => return SessionInput::UnuseReference(parse_single_arg(arg)),
                // The draft keeps the user's text verbatim, colons included.
                "draft" => return SessionInput::SetDraft(arg.to_string()),
                "pick" => return SessionInput::PickVariant(arg.parse::<usize>().ok()),
                "export" => {
                    let dir = parse_single_arg(arg);
                    return SessionInput::Export(if dir.is_empty() { None } else { Some(dir) });
                }
                _ => {}
            }

            return SessionInput::Unknown {
                command,
                arg: arg.to_string(),
            };
        }
    }

    SessionInput::Prompt(raw_trimmed.to_string())
}
