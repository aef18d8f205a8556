use forge_contracts::chat::{Command, Operation};
use forge_contracts::prompts::{delegate_input, instruction_for, parse_numbered_variants};

use crate::error::{error_chain_text, ExpansionFailed};
use crate::providers::TextGenerator;

const DELEGATE_ERROR_MAX_CHARS: usize = 512;

/// Result of expanding one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expansion {
    Single(String),
    Variants([String; 3]),
}

impl Expansion {
    pub fn prompts(&self) -> Vec<&str> {
        match self {
            Expansion::Single(prompt) => vec![prompt.as_str()],
            Expansion::Variants(variants) => variants.iter().map(String::as_str).collect(),
        }
    }

    /// Text placed in the editable draft: the prompt itself, or the three
    /// variants as a numbered list.
    pub fn draft_text(&self) -> String {
        match self {
            Expansion::Single(prompt) => prompt.clone(),
            Expansion::Variants(variants) => variants
                .iter()
                .enumerate()
                .map(|(idx, variant)| format!("{}. {variant}", idx + 1))
                .collect::<Vec<String>>()
                .join("\n"),
        }
    }
}

/// Template-and-delegate layer over a text capability.
pub struct PromptExpander<'a> {
    generator: &'a dyn TextGenerator,
    model: &'a str,
}

impl<'a> PromptExpander<'a> {
    pub fn new(generator: &'a dyn TextGenerator, model: &'a str) -> Self {
        Self { generator, model }
    }

    pub fn expand(&self, command: &Command) -> Result<Expansion, ExpansionFailed> {
        let instruction = instruction_for(command.operation);
        let reply = self
            .generator
            .generate_text(self.model, &instruction, &delegate_input(command))
            .map_err(|err| {
                ExpansionFailed::Delegate(error_chain_text(&err, DELEGATE_ERROR_MAX_CHARS))
            })?;
        let reply = reply.trim();
        if reply.is_empty() {
            return Err(ExpansionFailed::EmptyOutput);
        }

        match command.operation {
            Operation::Multiple => {
                let mut variants = parse_numbered_variants(reply);
                let found = variants.len();
                variants.truncate(command.operation.result_count());
                let variants = <[String; 3]>::try_from(variants)
                    .map_err(|_| ExpansionFailed::MalformedVariants { found })?;
                Ok(Expansion::Variants(variants))
            }
            _ => Ok(Expansion::Single(reply.to_string())),
        }
    }
}
