//! Instruction blocks sent to the text delegate.
//!
//! These strings are the whole contract with the delegate model, so they are
//! kept as static data and assembled by pure functions.

use crate::chat::{Command, Operation};

pub const PERSONA_PREAMBLE: &str = "You are the 'Ultimate AI Image Prompt Generator'. \
You are NOT a chat bot. You are a CLI (Command Line Interface) for prompt engineering.
Your goal is to accept commands and output strictly formatted image prompts or variations.";

pub const OUTPUT_RULES: &str = "RULES:
- Output ONLY the prompt text. No \"Here is your prompt\" or conversational filler.
- Do not greet, explain, apologise or add meta-commentary.
- Do not wrap the output in quotes or markdown.";

const IMPROVE_BLOCK: &str = "COMMAND 'improve': Apply the 'Ultimate Structure': \
Subject + Medium + Style + Artist + Website + Resolution + Additional Details + Color + Lighting.
Render the result as a single, comma-separated, high-quality prompt optimized for generative AI, on one line.";

const EDIT_BLOCK: &str = "COMMAND 'edit': Fix grammar and clarity and add slight detail \
without changing the core style. Keep stylistic drift to a minimum.";

const SUBJECT_BLOCK: &str = "COMMAND 'subject': Focus purely on describing the subject. \
Ignore style, medium and lighting entirely.";

const STYLE_BLOCK: &str = "COMMAND 'style': Focus purely on describing an aesthetic style \
(e.g., Cyberpunk, Baroque). Do not describe a subject.";

const MULTIPLE_BLOCK: &str = "COMMAND 'multiple': Generate 3 distinct variations of the prompt, \
each following the 'improve' structure (Subject + Medium + Style + Artist + Website + Resolution + \
Additional Details + Color + Lighting) as one comma-separated line.
Number them 1, 2, 3, one variation per line, formatted exactly as \"1. <prompt>\".";

pub fn operation_block(operation: Operation) -> &'static str {
    match operation {
        Operation::Improve => IMPROVE_BLOCK,
        Operation::Edit => EDIT_BLOCK,
        Operation::Subject => SUBJECT_BLOCK,
        Operation::Style => STYLE_BLOCK,
        Operation::Multiple => MULTIPLE_BLOCK,
    }
}

pub fn instruction_for(operation: Operation) -> String {
    format!(
        "{PERSONA_PREAMBLE}\n\n{}\n\n{OUTPUT_RULES}",
        operation_block(operation)
    )
}

/// The `INPUT COMMAND` line sent after the instruction block.
pub fn delegate_input(command: &Command) -> String {
    format!(
        "INPUT COMMAND: {}: {}",
        command.operation.tag(),
        command.payload
    )
}

/// Splits a numbered list (`1.`, `1)` or `1:` heads) into its entries.
///
/// Heads must count up from 1; any other line, including an out-of-sequence
/// number such as `12: warm palette`, continues the current entry. Lines
/// before the first head are dropped.
pub fn parse_numbered_variants(text: &str) -> Vec<String> {
    let mut variants: Vec<String> = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(body) = strip_number_head(line, variants.len() + 1) {
            variants.push(body.to_string());
            continue;
        }
        if let Some(last) = variants.last_mut() {
            if !last.is_empty() {
                last.push(' ');
            }
            last.push_str(line);
        }
    }
    variants
        .into_iter()
        .map(|value| clean_variant(&value))
        .filter(|value| !value.is_empty())
        .collect()
}

fn strip_number_head(line: &str, expected: usize) -> Option<&str> {
    let unbolded = line.trim_start_matches('*');
    let digits = unbolded
        .chars()
        .take_while(|ch| ch.is_ascii_digit())
        .count();
    let number: usize = unbolded[..digits].parse().ok()?;
    if number != expected {
        return None;
    }
    let rest = unbolded[digits..].trim_start_matches('*');
    let mut chars = rest.chars();
    match chars.next() {
        Some('.') | Some(')') | Some(':') => Some(chars.as_str().trim()),
        _ => None,
    }
}

fn clean_variant(value: &str) -> String {
    value
        .trim()
        .trim_matches(|ch| ch == '"' || ch == '*')
        .trim()
        .to_string()
}
