use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};

use crate::orchestrator::Artifact;

pub const DEFAULT_EXPORT_PREFIX: &str = "gen";
const JPEG_QUALITY: u8 = 92;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Png,
    Jpeg,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpg",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(ExportFormat::Png),
            "jpg" | "jpeg" => Ok(ExportFormat::Jpeg),
            other => Err(format!("unsupported export format '{other}' (use png or jpeg)")),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// `<prefix>_<index>.<ext>`
pub fn export_file_name(prefix: &str, index: usize, format: ExportFormat) -> String {
    format!("{prefix}_{index}.{}", format.extension())
}

pub fn encode_artifact(artifact: &Artifact, format: ExportFormat) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory(&artifact.bytes)
        .with_context(|| format!("failed to decode artifact {}", artifact.id))?;
    encode_image(&decoded, format)
}

fn encode_image(image: &DynamicImage, format: ExportFormat) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    match format {
        ExportFormat::Png => image
            .write_to(&mut out, ImageFormat::Png)
            .context("PNG encode failed")?,
        ExportFormat::Jpeg => {
            // JPEG has no alpha channel.
            let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
            let encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
            rgb.write_with_encoder(encoder)
                .context("JPEG encode failed")?;
        }
    }
    Ok(out.into_inner())
}

/// Writes artifacts in the given order; index 0 is the first item.
pub fn export_artifacts<'a>(
    artifacts: impl IntoIterator<Item = &'a Artifact>,
    dir: &Path,
    prefix: &str,
    format: ExportFormat,
) -> Result<Vec<PathBuf>> {
    if prefix.trim().is_empty() || prefix.contains(['/', '\\']) {
        bail!("invalid export prefix '{prefix}'");
    }
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let mut written = Vec::new();
    for (index, artifact) in artifacts.into_iter().enumerate() {
        let path = dir.join(export_file_name(prefix, index, format));
        let bytes = encode_artifact(artifact, format)?;
        std::fs::write(&path, bytes)
            .with_context(|| format!("failed to write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}
