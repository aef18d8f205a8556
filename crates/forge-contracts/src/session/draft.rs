/// The editable prompt handed to generation. An empty string means unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptDraft {
    text: String,
}

impl PromptDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Whitespace-only drafts count as empty.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}
