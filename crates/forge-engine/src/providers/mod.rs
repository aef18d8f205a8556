use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use forge_contracts::session::ImageData;

mod dryrun;
mod gemini;

pub use dryrun::DryrunProvider;
pub use gemini::{GeminiConfig, GeminiProvider};

/// One entry of a multimodal request, in send order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentPart<'a> {
    Text(&'a str),
    Image(&'a ImageData),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePart {
    Text(String),
    InlineImage { mime_type: String, data: Vec<u8> },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageResponse {
    pub parts: Vec<ResponsePart>,
}

/// Remote text capability used to expand prompt commands.
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &str;
    /// Sends the instruction block followed by the tagged input and returns
    /// the raw reply text.
    fn generate_text(&self, model: &str, instruction: &str, input: &str) -> Result<String>;
}

/// Remote image capability. `Ok(None)` means the service answered with no
/// content at all.
pub trait ImageGenerator: Send + Sync {
    fn name(&self) -> &str;
    fn generate_image(
        &self,
        model: &str,
        content: &[ContentPart<'_>],
    ) -> Result<Option<ImageResponse>>;
}

#[derive(Default, Clone)]
pub struct ProviderRegistry {
    text: BTreeMap<String, Arc<dyn TextGenerator>>,
    image: BTreeMap<String, Arc<dyn ImageGenerator>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider that serves both capabilities under its name.
    pub fn register<P: TextGenerator + ImageGenerator + 'static>(&mut self, provider: P) {
        let shared = Arc::new(provider);
        self.text.insert(
            TextGenerator::name(shared.as_ref()).to_string(),
            shared.clone(),
        );
        self.image
            .insert(ImageGenerator::name(shared.as_ref()).to_string(), shared);
    }

    pub fn register_text<P: TextGenerator + 'static>(&mut self, provider: P) {
        self.text
            .insert(provider.name().to_string(), Arc::new(provider));
    }

    pub fn register_image<P: ImageGenerator + 'static>(&mut self, provider: P) {
        self.image
            .insert(provider.name().to_string(), Arc::new(provider));
    }

    pub fn text(&self, name: &str) -> Option<&dyn TextGenerator> {
        self.text.get(name).map(|provider| provider.as_ref())
    }

    pub fn image(&self, name: &str) -> Option<&dyn ImageGenerator> {
        self.image.get(name).map(|provider| provider.as_ref())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.text.keys().chain(self.image.keys()).cloned().collect();
        names.sort();
        names.dedup();
        names
    }
}

/// Registry with the offline provider and a Gemini provider configured from
/// the environment.
pub fn default_provider_registry() -> Result<ProviderRegistry> {
    let mut providers = ProviderRegistry::new();
    providers.register(DryrunProvider);
    providers.register(GeminiProvider::new(GeminiConfig::from_env())?);
    Ok(providers)
}
