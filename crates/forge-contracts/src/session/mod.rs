mod draft;
mod history;
mod references;
mod summary;

pub use draft::PromptDraft;
pub use history::{HistoryRing, HISTORY_CAPACITY};
pub use references::{ImageData, ReferenceImage, ReferenceStore};
pub use summary::{write_summary, SessionSummary};
