pub mod error;
pub mod expander;
pub mod export;
pub mod orchestrator;
pub mod providers;
pub mod session;

pub use error::{ExpansionFailed, GenerationFailure, SessionError, Stage};
pub use expander::{Expansion, PromptExpander};
pub use export::{export_artifacts, export_file_name, ExportFormat, DEFAULT_EXPORT_PREFIX};
pub use orchestrator::{Artifact, GenerationOrchestrator, GenerationRequest};
pub use providers::{default_provider_registry, ProviderRegistry};
pub use session::{load_reference_image, Session};
