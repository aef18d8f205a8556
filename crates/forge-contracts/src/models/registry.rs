use indexmap::IndexMap;

pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    /// Human-readable label shown in model pickers.
    pub label: String,
    /// Backend identifier sent to the remote service.
    pub name: String,
    pub provider: String,
    pub capabilities: Vec<String>,
}

impl ModelSpec {
    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|item| item == capability)
    }
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    /// Looks a model up by backend id first, then by its label.
    pub fn resolve(&self, label_or_name: &str) -> Option<&ModelSpec> {
        let needle = label_or_name.trim();
        self.get(needle).or_else(|| {
            self.models
                .values()
                .find(|model| model.label.eq_ignore_ascii_case(needle))
        })
    }

    pub fn list(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }

    pub fn by_capability(&self, capability: &str) -> Vec<ModelSpec> {
        self.models
            .values()
            .filter(|model| model.supports(capability))
            .cloned()
            .collect()
    }

    pub fn ensure(&self, label_or_name: &str, capability: &str) -> Option<ModelSpec> {
        let model = self.resolve(label_or_name)?;
        if model.supports(capability) {
            return Some(model.clone());
        }
        None
    }
}

fn default_models() -> IndexMap<String, ModelSpec> {
    let mut map = IndexMap::new();

    let mut insert = |label: &str, name: &str, provider: &str, capabilities: &[&str]| {
        map.insert(
            name.to_string(),
            ModelSpec {
                label: label.to_string(),
                name: name.to_string(),
                provider: provider.to_string(),
                capabilities: capabilities
                    .iter()
                    .map(|item| (*item).to_string())
                    .collect(),
            },
        );
    };

    // The remote service expects these identifiers verbatim.
    insert(
        "Nano Banana Pro (Gemini 3 Pro Image)",
        "gemini-3-pro-image-preview",
        "gemini",
        &["image"],
    );
    insert(
        "Nano Banana (Gemini 2.5 Flash Image)",
        "gemini-2.5-flash-image",
        "gemini",
        &["image"],
    );
    insert("Gemini 2.5 Flash", DEFAULT_TEXT_MODEL, "gemini", &["text"]);
    insert("Dryrun Text", "dryrun-text-1", "dryrun", &["text"]);
    insert("Dryrun Image", "dryrun-image-1", "dryrun", &["image"]);

    map
}

#[cfg(test)]
mod tests {
    use super::{ModelRegistry, DEFAULT_TEXT_MODEL};

    #[test]
    fn default_registry_maps_labels_to_backend_ids() {
        let registry = ModelRegistry::new(None);
        assert_eq!(
            registry
                .resolve("Nano Banana Pro (Gemini 3 Pro Image)")
                .map(|model| model.name.as_str()),
            Some("gemini-3-pro-image-preview")
        );
        assert_eq!(
            registry
                .resolve("Nano Banana (Gemini 2.5 Flash Image)")
                .map(|model| model.name.as_str()),
            Some("gemini-2.5-flash-image")
        );
        assert_eq!(
            registry
                .resolve("gemini-2.5-flash-image")
                .map(|model| model.label.as_str()),
            Some("Nano Banana (Gemini 2.5 Flash Image)")
        );
    }

    #[test]
    fn image_models_keep_registration_order() {
        let registry = ModelRegistry::new(None);
        let names: Vec<String> = registry
            .by_capability("image")
            .into_iter()
            .map(|model| model.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "gemini-3-pro-image-preview",
                "gemini-2.5-flash-image",
                "dryrun-image-1"
            ]
        );
    }

    #[test]
    fn ensure_rejects_wrong_capability() {
        let registry = ModelRegistry::new(None);
        assert!(registry.ensure(DEFAULT_TEXT_MODEL, "image").is_none());
        assert!(registry.ensure(DEFAULT_TEXT_MODEL, "text").is_some());
        assert!(registry.ensure("missing-model", "text").is_none());
    }
}
