use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use forge_contracts::chat::interpret;
use forge_contracts::events::{EventWriter, SessionEvent};
use forge_contracts::models::{ModelSelector, ModelSpec};
use forge_contracts::session::{
    write_summary, HistoryRing, ImageData, PromptDraft, ReferenceImage, ReferenceStore,
    SessionSummary,
};
use image::ImageFormat;
use serde_json::{json, Map, Value};

use crate::error::{ExpansionFailed, GenerationFailure, SessionError, Stage};
use crate::expander::{Expansion, PromptExpander};
use crate::export::{export_artifacts, ExportFormat};
use crate::orchestrator::{Artifact, GenerationOrchestrator, GenerationRequest};
use crate::providers::ProviderRegistry;

const REFERENCE_FORMATS: [ImageFormat; 3] =
    [ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::WebP];

#[derive(Debug, Clone, Copy, Default)]
struct SessionStats {
    commands: u64,
    generations: u64,
    failures: u64,
}

/// State for one interactive session: references, draft, history and the
/// chosen models. Nothing here is shared between sessions.
pub struct Session {
    out_dir: PathBuf,
    events: EventWriter,
    summary_path: PathBuf,
    started_at: String,
    model_selector: ModelSelector,
    text_model: ModelSpec,
    image_model: ModelSpec,
    providers: ProviderRegistry,
    references: ReferenceStore,
    draft: PromptDraft,
    variants: Option<[String; 3]>,
    history: HistoryRing<Artifact>,
    stats: SessionStats,
}

impl Session {
    pub fn new(
        out_dir: impl Into<PathBuf>,
        events_path: impl Into<PathBuf>,
        text_model: Option<String>,
        image_model: Option<String>,
        providers: ProviderRegistry,
    ) -> Result<Self> {
        let out_dir = out_dir.into();
        std::fs::create_dir_all(&out_dir)
            .with_context(|| format!("failed to create {}", out_dir.display()))?;
        let events = EventWriter::for_new_session(events_path.into());
        let model_selector = ModelSelector::new(None);

        let text_selection = model_selector
            .select(text_model.as_deref(), "text")
            .map_err(SessionError::from)?;
        let image_selection = model_selector
            .select(image_model.as_deref(), "image")
            .map_err(SessionError::from)?;

        events.emit(
            SessionEvent::SessionStarted,
            map_object(json!({
                "out_dir": out_dir.to_string_lossy().to_string(),
                "text_model": text_selection.model.name,
                "image_model": image_selection.model.name,
                "text_model_source": text_selection.source.as_str(),
                "image_model_source": image_selection.source.as_str(),
                "providers": providers.names(),
            })),
        )?;

        Ok(Self {
            summary_path: out_dir.join("summary.json"),
            out_dir,
            events,
            started_at: now_utc_iso(),
            model_selector,
            text_model: text_selection.model,
            image_model: image_selection.model,
            providers,
            references: ReferenceStore::new(),
            draft: PromptDraft::new(),
            variants: None,
            history: HistoryRing::new(),
            stats: SessionStats::default(),
        })
    }

    pub fn session_id(&self) -> &str {
        self.events.session_id()
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn events_path(&self) -> &Path {
        self.events.path()
    }

    pub fn text_model(&self) -> &ModelSpec {
        &self.text_model
    }

    pub fn image_model(&self) -> &ModelSpec {
        &self.image_model
    }

    pub fn image_models(&self) -> Vec<ModelSpec> {
        self.model_selector.registry.by_capability("image")
    }

    pub fn draft(&self) -> &str {
        self.draft.as_str()
    }

    pub fn variants(&self) -> Option<&[String; 3]> {
        self.variants.as_ref()
    }

    pub fn history(&self) -> impl ExactSizeIterator<Item = &Artifact> {
        self.history.list()
    }

    pub fn references(&self) -> impl Iterator<Item = &ReferenceImage> {
        self.references.iter()
    }

    pub fn set_image_model(&mut self, label_or_name: &str) -> Result<&ModelSpec, SessionError> {
        if label_or_name.trim().is_empty() {
            return Err(SessionError::UnknownModel(String::new()));
        }
        self.image_model = self.model_selector.select(Some(label_or_name), "image")?.model;
        Ok(&self.image_model)
    }

    /// Interprets and expands a raw command, replacing the draft on success.
    /// On any failure the draft is left as it was.
    pub fn process_command(&mut self, raw: &str) -> Result<Expansion, SessionError> {
        if raw.trim().is_empty() {
            return Err(SessionError::EmptyInput(Stage::Interpret));
        }
        self.stats.commands += 1;
        let command = interpret(raw);
        self.events.emit(
            SessionEvent::CommandInterpreted,
            map_object(json!({
                "operation": command.operation,
                "payload_chars": command.payload.chars().count(),
            })),
        )?;

        let outcome = match self.providers.text(&self.text_model.provider) {
            Some(generator) => PromptExpander::new(generator, &self.text_model.name).expand(&command),
            None => Err(ExpansionFailed::Delegate(format!(
                "no text provider registered for '{}'",
                self.text_model.provider
            ))),
        };

        let expansion = match outcome {
            Ok(expansion) => expansion,
            Err(err) => {
                self.stats.failures += 1;
                self.events.emit(
                    SessionEvent::ExpansionFailed,
                    map_object(json!({
                        "operation": command.operation,
                        "error": err.to_string(),
                    })),
                )?;
                return Err(err.into());
            }
        };

        self.draft.set(expansion.draft_text());
        self.variants = match &expansion {
            Expansion::Variants(variants) => Some(variants.clone()),
            Expansion::Single(_) => None,
        };
        self.events.emit(
            SessionEvent::PromptExpanded,
            map_object(json!({
                "operation": command.operation,
                "model": self.text_model.name,
                "prompts": expansion.prompts(),
            })),
        )?;
        Ok(expansion)
    }

    /// User edit of the draft.
    pub fn set_draft(&mut self, text: &str) -> Result<(), SessionError> {
        self.draft.set(text);
        self.events.emit(
            SessionEvent::DraftUpdated,
            map_object(json!({ "chars": text.chars().count(), "source": "user" })),
        )?;
        Ok(())
    }

    /// Replaces the draft with variant `number` (1-based) of the last
    /// `multiple` expansion.
    pub fn pick_variant(&mut self, number: usize) -> Result<&str, SessionError> {
        let picked = self
            .variants
            .as_ref()
            .and_then(|variants| number.checked_sub(1).and_then(|idx| variants.get(idx)))
            .cloned()
            .ok_or(SessionError::NoSuchVariant(number))?;
        self.draft.set(picked);
        self.events.emit(
            SessionEvent::DraftUpdated,
            map_object(json!({
                "chars": self.draft.as_str().chars().count(),
                "source": format!("variant_{number}"),
            })),
        )?;
        Ok(self.draft.as_str())
    }

    pub fn add_reference(&mut self, identity: &str, data: ImageData) -> Result<bool, SessionError> {
        let size = data.bytes.len();
        let mime_type = data.mime_type.clone();
        let added = self.references.add(identity, data);
        self.events.emit(
            SessionEvent::ReferenceAdded,
            map_object(json!({
                "identity": identity,
                "mime_type": mime_type,
                "bytes": size,
                "added": added,
            })),
        )?;
        Ok(added)
    }

    /// Loads an image file; its file name becomes the reference identity.
    pub fn add_reference_file(&mut self, path: &Path) -> Result<bool, SessionError> {
        let identity = path
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .ok_or_else(|| SessionError::InvalidReference {
                identity: path.display().to_string(),
                reason: "path has no file name".to_string(),
            })?;
        let data = load_reference_image(path).map_err(|err| SessionError::InvalidReference {
            identity: identity.clone(),
            reason: format!("{err:#}"),
        })?;
        self.add_reference(&identity, data)
    }

    pub fn toggle_reference(&mut self, identity: &str, active: bool) -> Result<(), SessionError> {
        if !self.references.toggle(identity, active) {
            return Err(SessionError::UnknownReference(identity.to_string()));
        }
        self.events.emit(
            SessionEvent::ReferenceToggled,
            map_object(json!({ "identity": identity, "active": active })),
        )?;
        Ok(())
    }

    pub fn clear_references(&mut self) -> Result<(), SessionError> {
        let removed = self.references.len();
        self.references.clear();
        self.events.emit(
            SessionEvent::ReferencesCleared,
            map_object(json!({ "removed": removed })),
        )?;
        Ok(())
    }

    /// Sends the draft plus active references to the image model and keeps
    /// the result in history.
    pub fn generate(&mut self) -> Result<Artifact, SessionError> {
        if self.draft.is_empty() {
            return Err(SessionError::EmptyInput(Stage::Generate));
        }
        self.stats.generations += 1;
        let request = GenerationRequest::new(self.draft.as_str(), self.references.active_list());
        self.events.emit(
            SessionEvent::GenerationStarted,
            map_object(json!({
                "model": self.image_model.name,
                "prompt_chars": request.prompt.chars().count(),
                "references": request.images.len(),
                "zero_shot": request.is_zero_shot(),
            })),
        )?;

        let outcome = match self.providers.image(&self.image_model.provider) {
            Some(generator) => GenerationOrchestrator::new(generator).generate_into(
                &request,
                &self.image_model.name,
                &mut self.history,
            ),
            None => Err(GenerationFailure::TransportError(format!(
                "no image provider registered for '{}'",
                self.image_model.provider
            ))),
        };

        match outcome {
            Ok(artifact) => {
                self.events.emit(
                    SessionEvent::ArtifactCreated,
                    map_object(json!({
                        "artifact_id": artifact.id,
                        "model": artifact.model,
                        "mime_type": artifact.mime_type,
                        "width": artifact.width,
                        "height": artifact.height,
                        "bytes": artifact.bytes.len(),
                        "history_len": self.history.len(),
                    })),
                )?;
                Ok(artifact)
            }
            Err(err) => {
                self.stats.failures += 1;
                self.events.emit(
                    SessionEvent::GenerationFailed,
                    map_object(json!({
                        "model": self.image_model.name,
                        "reason": err.kind(),
                        "error": err.to_string(),
                    })),
                )?;
                Err(err.into())
            }
        }
    }

    /// Writes history, newest first, as `<prefix>_<index>.<ext>` under `dir`.
    pub fn export_history(
        &self,
        dir: &Path,
        prefix: &str,
        format: ExportFormat,
    ) -> Result<Vec<PathBuf>> {
        let written = export_artifacts(self.history.list(), dir, prefix, format)?;
        self.events.emit(
            SessionEvent::HistoryExported,
            map_object(json!({
                "dir": dir.to_string_lossy().to_string(),
                "format": format.extension(),
                "files": written
                    .iter()
                    .map(|path| path.to_string_lossy().to_string())
                    .collect::<Vec<String>>(),
            })),
        )?;
        Ok(written)
    }

    pub fn finish(&self) -> Result<()> {
        let summary = SessionSummary {
            session_id: self.session_id().to_string(),
            started_at: self.started_at.clone(),
            finished_at: now_utc_iso(),
            image_model: self.image_model.name.clone(),
            commands_processed: self.stats.commands,
            generations: self.stats.generations,
            failures: self.stats.failures,
            artifacts_retained: self.history.len() as u64,
        };
        let mut extra = Map::new();
        extra.insert(
            "references".to_string(),
            Value::Number((self.references.len() as u64).into()),
        );
        write_summary(&self.summary_path, &summary, Some(&extra))?;
        self.events.emit(
            SessionEvent::SessionFinished,
            map_object(json!({
                "summary_path": self.summary_path.to_string_lossy().to_string(),
            })),
        )?;
        Ok(())
    }
}

/// Reads a PNG, JPEG or WebP file. Other formats are rejected here rather
/// than by the image service at generation time.
pub fn load_reference_image(path: &Path) -> Result<ImageData> {
    let bytes = std::fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
    let format = image::guess_format(&bytes)
        .with_context(|| format!("{} is not a supported image", path.display()))?;
    if !REFERENCE_FORMATS.contains(&format) {
        bail!(
            "{} is {:?}; references must be PNG, JPEG or WebP",
            path.display(),
            format
        );
    }
    Ok(ImageData::new(format.to_mime_type(), bytes))
}

fn map_object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn now_utc_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, false)
}
