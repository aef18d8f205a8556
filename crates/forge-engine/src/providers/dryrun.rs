use std::io::Cursor;

use anyhow::{Context, Result};
use forge_contracts::chat::{interpret, Operation};
use image::{ImageFormat, Rgb, RgbImage};
use sha2::{Digest, Sha256};

use super::{ContentPart, ImageGenerator, ImageResponse, ResponsePart, TextGenerator};

const DRYRUN_IMAGE_SIDE: u32 = 256;
const INPUT_PREFIX: &str = "INPUT COMMAND:";

/// Offline provider with deterministic output, for local runs and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryrunProvider;

impl TextGenerator for DryrunProvider {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate_text(&self, _model: &str, _instruction: &str, input: &str) -> Result<String> {
        let tagged = input.trim().strip_prefix(INPUT_PREFIX).unwrap_or(input);
        let command = interpret(tagged);
        let payload = command.payload.as_str();
        if payload.is_empty() {
            return Ok(String::new());
        }
        let text = match command.operation {
            Operation::Improve => improve_line(payload),
            Operation::Edit => capitalize_first(payload),
            Operation::Subject => payload.to_string(),
            Operation::Style => format!("{payload} aesthetic"),
            Operation::Multiple => ["wide shot", "close-up", "aerial view"]
                .iter()
                .enumerate()
                .map(|(idx, framing)| format!("{}. {}, {framing}", idx + 1, improve_line(payload)))
                .collect::<Vec<String>>()
                .join("\n"),
        };
        Ok(text)
    }
}

impl ImageGenerator for DryrunProvider {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate_image(
        &self,
        _model: &str,
        content: &[ContentPart<'_>],
    ) -> Result<Option<ImageResponse>> {
        let prompt = content
            .iter()
            .find_map(|part| match part {
                ContentPart::Text(text) => Some(*text),
                ContentPart::Image(_) => None,
            })
            .unwrap_or_default();
        let references = content
            .iter()
            .filter(|part| matches!(part, ContentPart::Image(_)))
            .count();
        let data = render_dryrun_png(prompt, references as u64)?;
        Ok(Some(ImageResponse {
            parts: vec![
                ResponsePart::Text(format!("dryrun render with {references} reference(s)")),
                ResponsePart::InlineImage {
                    mime_type: "image/png".to_string(),
                    data,
                },
            ],
        }))
    }
}

fn improve_line(payload: &str) -> String {
    format!(
        "{payload}, digital illustration, cinematic concept art, by Greg Rutkowski, \
trending on ArtStation, 8k resolution, intricate details, vibrant colors, soft volumetric lighting"
    )
}

fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn render_dryrun_png(prompt: &str, seed: u64) -> Result<Vec<u8>> {
    let (r, g, b) = color_from_prompt(prompt, seed);
    let mut image = RgbImage::new(DRYRUN_IMAGE_SIDE, DRYRUN_IMAGE_SIDE);
    for pixel in image.pixels_mut() {
        *pixel = Rgb([r, g, b]);
    }
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .context("failed to encode dryrun image")?;
    Ok(out.into_inner())
}

fn color_from_prompt(prompt: &str, seed: u64) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update(seed.to_be_bytes());
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}

#[cfg(test)]
mod tests {
    use forge_contracts::prompts::parse_numbered_variants;
    use forge_contracts::session::ImageData;

    use super::{color_from_prompt, DryrunProvider};
    use crate::providers::{ContentPart, ImageGenerator, ResponsePart, TextGenerator};

    #[test]
    fn dryrun_text_follows_the_tag() -> anyhow::Result<()> {
        let provider = DryrunProvider;
        let style = provider.generate_text("dryrun-text-1", "", "INPUT COMMAND: style: baroque")?;
        assert_eq!(style, "baroque aesthetic");

        let multiple =
            provider.generate_text("dryrun-text-1", "", "INPUT COMMAND: multiple: red fox")?;
        assert_eq!(parse_numbered_variants(&multiple).len(), 3);

        let empty = provider.generate_text("dryrun-text-1", "", "INPUT COMMAND: edit: ")?;
        assert!(empty.is_empty());
        Ok(())
    }

    #[test]
    fn dryrun_image_depends_on_prompt_and_reference_count() -> anyhow::Result<()> {
        let reference = ImageData::new("image/png", vec![1, 2, 3]);
        let provider = DryrunProvider;
        let plain = provider.generate_image("dryrun-image-1", &[ContentPart::Text("boat")])?;
        let guided = provider.generate_image(
            "dryrun-image-1",
            &[ContentPart::Text("boat"), ContentPart::Image(&reference)],
        )?;

        let first_image = |response: Option<crate::providers::ImageResponse>| {
            response.and_then(|value| {
                value.parts.into_iter().find_map(|part| match part {
                    ResponsePart::InlineImage { data, .. } => Some(data),
                    ResponsePart::Text(_) => None,
                })
            })
        };
        let plain = first_image(plain).unwrap_or_default();
        let guided = first_image(guided).unwrap_or_default();
        assert!(!plain.is_empty());
        assert_ne!(plain, guided);
        assert_eq!(image::guess_format(&plain)?, image::ImageFormat::Png);
        assert_ne!(color_from_prompt("boat", 0), color_from_prompt("boat", 1));
        Ok(())
    }
}
