use std::sync::Arc;

use forge_contracts::session::{HistoryRing, ImageData};
use sha2::{Digest, Sha256};

use crate::error::{error_chain_text, GenerationFailure};
use crate::providers::{ContentPart, ImageGenerator, ImageResponse, ResponsePart};

const TRANSPORT_ERROR_MAX_CHARS: usize = 512;

/// A generated image kept in session history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub id: String,
    pub mime_type: String,
    pub bytes: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
    pub model: String,
    pub prompt: String,
    pub created_at: String,
}

/// Prompt plus the active references, assembled fresh for every call.
#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    pub prompt: &'a str,
    pub images: Vec<&'a ImageData>,
}

impl<'a> GenerationRequest<'a> {
    pub fn new(prompt: &'a str, images: Vec<&'a ImageData>) -> Self {
        Self { prompt, images }
    }

    /// `[prompt, image...]`; a request with no references is just `[prompt]`.
    pub fn contents(&self) -> Vec<ContentPart<'a>> {
        let mut parts = Vec::with_capacity(self.images.len() + 1);
        parts.push(ContentPart::Text(self.prompt));
        parts.extend(self.images.iter().map(|image| ContentPart::Image(*image)));
        parts
    }

    pub fn is_zero_shot(&self) -> bool {
        self.images.is_empty()
    }
}

pub struct GenerationOrchestrator<'a> {
    generator: &'a dyn ImageGenerator,
}

impl<'a> GenerationOrchestrator<'a> {
    pub fn new(generator: &'a dyn ImageGenerator) -> Self {
        Self { generator }
    }

    /// Runs one request. Remote errors never escape as anything other than a
    /// [`GenerationFailure`].
    pub fn generate(
        &self,
        request: &GenerationRequest<'_>,
        model: &str,
    ) -> Result<Artifact, GenerationFailure> {
        let response = self
            .generator
            .generate_image(model, &request.contents())
            .map_err(|err| {
                GenerationFailure::TransportError(error_chain_text(
                    &err,
                    TRANSPORT_ERROR_MAX_CHARS,
                ))
            })?;
        let (mime_type, data) = extract_first_image(response)?;
        let decoded = image::load_from_memory(&data)
            .map_err(|err| GenerationFailure::UndecodableImage(err.to_string()))?;

        Ok(Artifact {
            id: artifact_id(&data, request.prompt),
            mime_type,
            width: decoded.width(),
            height: decoded.height(),
            bytes: Arc::from(data),
            model: model.to_string(),
            prompt: request.prompt.to_string(),
            created_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, false),
        })
    }

    /// Like [`Self::generate`], then records the artifact at the head of
    /// `history`. A failure leaves `history` untouched.
    pub fn generate_into(
        &self,
        request: &GenerationRequest<'_>,
        model: &str,
        history: &mut HistoryRing<Artifact>,
    ) -> Result<Artifact, GenerationFailure> {
        let artifact = self.generate(request, model)?;
        history.push(artifact.clone());
        Ok(artifact)
    }
}

/// Takes the first inline image in part order and ignores the rest.
pub fn extract_first_image(
    response: Option<ImageResponse>,
) -> Result<(String, Vec<u8>), GenerationFailure> {
    let response = response.ok_or(GenerationFailure::EmptyResponse)?;
    response
        .parts
        .into_iter()
        .find_map(|part| match part {
            ResponsePart::InlineImage { mime_type, data } if !data.is_empty() => {
                Some((mime_type, data))
            }
            _ => None,
        })
        .ok_or(GenerationFailure::NoImagePart)
}

fn artifact_id(data: &[u8], prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.update(prompt.as_bytes());
    hasher.update(chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default().to_be_bytes());
    let digest = hasher.finalize();
    format!("a-{}", hex::encode(&digest[..4]))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Mutex;

    use anyhow::{anyhow, Result};
    use forge_contracts::session::{HistoryRing, ImageData};
    use image::{ImageFormat, Rgb, RgbImage};

    use super::{extract_first_image, GenerationOrchestrator, GenerationRequest};
    use crate::error::GenerationFailure;
    use crate::providers::{ContentPart, ImageGenerator, ImageResponse, ResponsePart};

    enum Reply {
        Response(Option<ImageResponse>),
        Fail(String),
    }

    struct ScriptedImage {
        reply: Reply,
        seen: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedImage {
        fn new(reply: Reply) -> Self {
            Self {
                reply,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl ImageGenerator for ScriptedImage {
        fn name(&self) -> &str {
            "scripted"
        }

        fn generate_image(
            &self,
            _model: &str,
            content: &[ContentPart<'_>],
        ) -> Result<Option<ImageResponse>> {
            let shape = content
                .iter()
                .map(|part| match part {
                    ContentPart::Text(text) => format!("text:{text}"),
                    ContentPart::Image(image) => format!("image:{}", image.bytes[0]),
                })
                .collect();
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(shape);
            }
            match &self.reply {
                Reply::Response(response) => Ok(response.clone()),
                Reply::Fail(message) => Err(anyhow!(message.clone())),
            }
        }
    }

    fn png(width: u32, height: u32, shade: u8) -> Vec<u8> {
        let image = RgbImage::from_pixel(width, height, Rgb([shade, shade, shade]));
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn inline(data: Vec<u8>) -> ResponsePart {
        ResponsePart::InlineImage {
            mime_type: "image/png".to_string(),
            data,
        }
    }

    #[test]
    fn request_contents_put_prompt_first() {
        let a = ImageData::new("image/png", vec![1]);
        let b = ImageData::new("image/png", vec![2]);
        let zero_shot = GenerationRequest::new("cabin", Vec::new());
        assert_eq!(zero_shot.contents(), vec![ContentPart::Text("cabin")]);
        assert!(zero_shot.is_zero_shot());

        let guided = GenerationRequest::new("cabin", vec![&a, &b]);
        let contents = guided.contents();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0], ContentPart::Text("cabin"));
        assert_eq!(contents[1], ContentPart::Image(&a));
        assert_eq!(contents[2], ContentPart::Image(&b));
    }

    #[test]
    fn first_image_part_wins() -> Result<()> {
        let first = png(4, 2, 10);
        let second = png(8, 8, 200);
        let generator = ScriptedImage::new(Reply::Response(Some(ImageResponse {
            parts: vec![
                ResponsePart::Text("sure".to_string()),
                inline(first.clone()),
                inline(second),
            ],
        })));
        let mut history = HistoryRing::new();
        let artifact = GenerationOrchestrator::new(&generator)
            .generate_into(&GenerationRequest::new("fox", Vec::new()), "m", &mut history)
            .map_err(|err| anyhow!(err))?;

        assert_eq!(artifact.bytes.as_ref(), first.as_slice());
        assert_eq!((artifact.width, artifact.height), (4, 2));
        assert_eq!(artifact.prompt, "fox");
        assert_eq!(history.len(), 1);
        assert_eq!(history.latest().map(|item| item.id.clone()), Some(artifact.id));
        Ok(())
    }

    #[test]
    fn references_are_sent_after_the_prompt() {
        let a = ImageData::new("image/png", vec![5]);
        let b = ImageData::new("image/png", vec![6]);
        let generator = ScriptedImage::new(Reply::Response(Some(ImageResponse {
            parts: vec![inline(png(1, 1, 0))],
        })));
        let orchestrator = GenerationOrchestrator::new(&generator);
        assert!(orchestrator
            .generate(&GenerationRequest::new("p", vec![&a, &b]), "m")
            .is_ok());
        assert!(orchestrator
            .generate(&GenerationRequest::new("p", Vec::new()), "m")
            .is_ok());

        let seen = generator.seen.lock().unwrap();
        assert_eq!(seen[0], vec!["text:p", "image:5", "image:6"]);
        assert_eq!(seen[1], vec!["text:p"]);
    }

    #[test]
    fn empty_parts_list_is_no_image_part() {
        let generator = ScriptedImage::new(Reply::Response(Some(ImageResponse::default())));
        let mut history = HistoryRing::new();
        let err = GenerationOrchestrator::new(&generator)
            .generate_into(&GenerationRequest::new("p", Vec::new()), "m", &mut history)
            .unwrap_err();
        assert_eq!(err, GenerationFailure::NoImagePart);
        assert!(history.is_empty());
    }

    #[test]
    fn text_only_reply_is_no_image_part() {
        assert_eq!(
            extract_first_image(Some(ImageResponse {
                parts: vec![ResponsePart::Text("blocked".to_string())],
            })),
            Err(GenerationFailure::NoImagePart)
        );
    }

    #[test]
    fn missing_response_is_empty_response() {
        let generator = ScriptedImage::new(Reply::Response(None));
        let err = GenerationOrchestrator::new(&generator)
            .generate(&GenerationRequest::new("p", Vec::new()), "m")
            .unwrap_err();
        assert_eq!(err, GenerationFailure::EmptyResponse);
    }

    #[test]
    fn remote_errors_become_transport_failures() {
        let generator = ScriptedImage::new(Reply::Fail("503 unavailable".to_string()));
        let err = GenerationOrchestrator::new(&generator)
            .generate(&GenerationRequest::new("p", Vec::new()), "m")
            .unwrap_err();
        assert_eq!(
            err,
            GenerationFailure::TransportError("503 unavailable".to_string())
        );
    }

    #[test]
    fn garbage_image_bytes_are_reported() {
        let generator = ScriptedImage::new(Reply::Response(Some(ImageResponse {
            parts: vec![inline(vec![0, 1, 2, 3])],
        })));
        let err = GenerationOrchestrator::new(&generator)
            .generate(&GenerationRequest::new("p", Vec::new()), "m")
            .unwrap_err();
        assert!(matches!(err, GenerationFailure::UndecodableImage(_)));
    }
}
