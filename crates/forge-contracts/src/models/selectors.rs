use thiserror::Error;

use super::registry::{ModelRegistry, ModelSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionSource {
    Requested,
    Default,
}

impl SelectionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            SelectionSource::Requested => "requested",
            SelectionSource::Default => "default",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: ModelSpec,
    pub source: SelectionSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("unknown {capability} model '{requested}'")]
    Unknown {
        requested: String,
        capability: String,
    },
    #[error("no {capability} model is registered")]
    NoneAvailable { capability: String },
}

#[derive(Debug, Clone)]
pub struct ModelSelector {
    pub registry: ModelRegistry,
}

impl ModelSelector {
    pub fn new(registry: Option<ModelRegistry>) -> Self {
        Self {
            registry: registry.unwrap_or_else(|| ModelRegistry::new(None)),
        }
    }

    /// A named model must exist and carry `capability`; only an absent or
    /// blank request falls back to the registry's first capable model.
    pub fn select(
        &self,
        requested: Option<&str>,
        capability: &str,
    ) -> Result<ModelSelection, SelectionError> {
        match requested.map(str::trim).filter(|value| !value.is_empty()) {
            Some(requested) => self
                .registry
                .ensure(requested, capability)
                .map(|model| ModelSelection {
                    model,
                    source: SelectionSource::Requested,
                })
                .ok_or_else(|| SelectionError::Unknown {
                    requested: requested.to_string(),
                    capability: capability.to_string(),
                }),
            None => self
                .default_for(capability)
                .map(|model| ModelSelection {
                    model,
                    source: SelectionSource::Default,
                })
                .ok_or_else(|| SelectionError::NoneAvailable {
                    capability: capability.to_string(),
                }),
        }
    }

    pub fn default_for(&self, capability: &str) -> Option<ModelSpec> {
        self.registry.by_capability(capability).into_iter().next()
    }
}
