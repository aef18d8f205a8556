use serde::{Deserialize, Serialize};

/// Prompt-engineering operation selected by a leading tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Improve,
    Edit,
    Subject,
    Style,
    Multiple,
}

impl Operation {
    pub fn tag(self) -> &'static str {
        TAG_SPECS
            .iter()
            .find(|spec| spec.operation == self)
            .map(|spec| spec.tag)
            .unwrap_or("improve")
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        TAG_SPECS
            .iter()
            .find(|spec| spec.tag == tag)
            .map(|spec| spec.operation)
    }

    /// Number of prompt strings an expansion of this operation yields.
    pub fn result_count(self) -> usize {
        match self {
            Operation::Multiple => 3,
            _ => 1,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct TagSpec {
    pub tag: &'static str,
    pub operation: Operation,
}

pub(crate) const TAG_SPECS: &[TagSpec] = &[
    TagSpec {
        tag: "improve",
        operation: Operation::Improve,
    },
    TagSpec {
        tag: "edit",
        operation: Operation::Edit,
    },
    TagSpec {
        tag: "subject",
        operation: Operation::Subject,
    },
    TagSpec {
        tag: "style",
        operation: Operation::Style,
    },
    TagSpec {
        tag: "multiple",
        operation: Operation::Multiple,
    },
];

#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "models",
        action: "list_models",
    },
    CommandSpec {
        command: "refs",
        action: "list_references",
    },
    CommandSpec {
        command: "clear_refs",
        action: "clear_references",
    },
    CommandSpec {
        command: "show",
        action: "show_draft",
    },
    CommandSpec {
        command: "generate",
        action: "generate",
    },
    CommandSpec {
        command: "history",
        action: "history",
    },
];

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "improve:",
    "edit:",
    "subject:",
    "style:",
    "multiple:",
    "/help",
    "/models",
    "/model",
    "/ref",
    "/use",
    "/unuse",
    "/refs",
    "/clear_refs",
    "/draft",
    "/show",
    "/pick",
    "/generate",
    "/history",
    "/export",
];
