mod registry;
mod selectors;

pub use registry::{ModelRegistry, ModelSpec, DEFAULT_TEXT_MODEL};
pub use selectors::{ModelSelection, ModelSelector, SelectionError, SelectionSource};
