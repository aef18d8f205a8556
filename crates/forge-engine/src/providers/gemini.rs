use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Map, Value};

use super::{ContentPart, ImageGenerator, ImageResponse, ResponsePart, TextGenerator};
use crate::error::truncate_text;

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeminiConfig {
    pub api_base: String,
    pub api_key: Option<String>,
}

impl GeminiConfig {
    /// Reads `GEMINI_API_BASE` and `GEMINI_API_KEY` (or `GOOGLE_API_KEY`).
    pub fn from_env() -> Self {
        Self {
            api_base: non_empty_env("GEMINI_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            api_key: non_empty_env("GEMINI_API_KEY").or_else(|| non_empty_env("GOOGLE_API_KEY")),
        }
    }
}

pub struct GeminiProvider {
    config: GeminiConfig,
    http: HttpClient,
}

impl GeminiProvider {
    /// Requests are single-shot: no client-side timeout and no retry.
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(None::<Duration>)
            .build()
            .context("failed to build Gemini HTTP client")?;
        Ok(Self { config, http })
    }

    fn api_key(&self) -> Result<&str> {
        match self.config.api_key.as_deref() {
            Some(key) => Ok(key),
            None => bail!("GEMINI_API_KEY or GOOGLE_API_KEY not set"),
        }
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.config.api_base, model_path)
    }

    fn post(&self, model: &str, payload: &Value) -> Result<Value> {
        let api_key = self.api_key()?;
        let endpoint = self.endpoint_for_model(model);
        // The key travels in a header so transport errors never quote it.
        let response = self
            .http
            .post(&endpoint)
            .header(API_KEY_HEADER, api_key)
            .json(payload)
            .send()
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("Gemini request failed ({endpoint})"))?;
        response_json_or_error("Gemini", response)
    }
}

impl TextGenerator for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate_text(&self, model: &str, instruction: &str, input: &str) -> Result<String> {
        let payload = build_text_payload(instruction, input);
        let response_payload = self.post(model, &payload)?;
        Ok(extract_text(&response_payload))
    }
}

impl ImageGenerator for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate_image(
        &self,
        model: &str,
        content: &[ContentPart<'_>],
    ) -> Result<Option<ImageResponse>> {
        let payload = build_image_payload(content);
        let response_payload = self.post(model, &payload)?;
        parse_image_response(&response_payload)
    }
}

pub(crate) fn build_text_payload(instruction: &str, input: &str) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": format!("{instruction}\n\n{input}") }],
        }],
    })
}

pub(crate) fn build_image_payload(content: &[ContentPart<'_>]) -> Value {
    let parts: Vec<Value> = content
        .iter()
        .map(|part| match part {
            ContentPart::Text(text) => json!({ "text": text }),
            ContentPart::Image(image) => json!({
                "inlineData": {
                    "mimeType": image.mime_type,
                    "data": BASE64.encode(&image.bytes),
                }
            }),
        })
        .collect();
    json!({
        "contents": [{
            "role": "user",
            "parts": parts,
        }],
        "generationConfig": {
            "responseModalities": ["IMAGE"],
        },
    })
}

fn first_candidate_parts(response_payload: &Value) -> Option<Vec<Value>> {
    let candidate = response_payload
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|rows| rows.first())?;
    Some(
        candidate
            .get("content")
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
    )
}

/// Joins the text parts of the first candidate.
pub(crate) fn extract_text(response_payload: &Value) -> String {
    first_candidate_parts(response_payload)
        .unwrap_or_default()
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<Vec<&str>>()
        .join("")
}

/// Maps the first candidate's parts in order. No candidate at all is `None`.
pub(crate) fn parse_image_response(response_payload: &Value) -> Result<Option<ImageResponse>> {
    let Some(raw_parts) = first_candidate_parts(response_payload) else {
        return Ok(None);
    };
    let mut parts = Vec::new();
    for part in raw_parts {
        let inline = part
            .get("inlineData")
            .or_else(|| part.get("inline_data"))
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_else(Map::new);
        let data = inline
            .get("data")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if !data.is_empty() {
            let bytes = BASE64
                .decode(data.as_bytes())
                .context("Gemini image base64 decode failed")?;
            let mime_type = inline
                .get("mimeType")
                .or_else(|| inline.get("mime_type"))
                .and_then(Value::as_str)
                .unwrap_or("image/png")
                .to_string();
            parts.push(ResponsePart::InlineImage {
                mime_type,
                data: bytes,
            });
            continue;
        }
        if let Some(text) = part.get("text").and_then(Value::as_str) {
            parts.push(ResponsePart::Text(text.to_string()));
        }
    }
    Ok(Some(ImageResponse { parts }))
}

fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .map_err(reqwest::Error::without_url)
        .with_context(|| format!("{provider} response body read failed"))?;
    if !status.is_success() {
        bail!(
            "{provider} request failed ({code}): {}",
            truncate_text(&body, 512)
        );
    }
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{provider} returned invalid JSON payload"))?;
    Ok(parsed)
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use base64::Engine as _;
    use forge_contracts::session::ImageData;
    use serde_json::{json, Value};

    use super::{
        build_image_payload, build_text_payload, extract_text, parse_image_response,
        GeminiConfig, GeminiProvider, BASE64,
    };
    use crate::error::GenerationFailure;
    use crate::orchestrator::{GenerationOrchestrator, GenerationRequest};
    use crate::providers::{ContentPart, ResponsePart, TextGenerator};

    fn provider(api_key: Option<&str>) -> anyhow::Result<GeminiProvider> {
        GeminiProvider::new(GeminiConfig {
            api_base: "https://example.invalid/v1beta".to_string(),
            api_key: api_key.map(str::to_string),
        })
    }

    #[test]
    fn endpoint_prefixes_models_path() -> anyhow::Result<()> {
        let gemini = provider(Some("k"))?;
        assert_eq!(
            gemini.endpoint_for_model("gemini-2.5-flash-image"),
            "https://example.invalid/v1beta/models/gemini-2.5-flash-image:generateContent"
        );
        assert_eq!(
            gemini.endpoint_for_model("models/gemini-2.5-flash"),
            "https://example.invalid/v1beta/models/gemini-2.5-flash:generateContent"
        );
        Ok(())
    }

    #[test]
    fn missing_key_fails_before_any_request() -> anyhow::Result<()> {
        let gemini = provider(None)?;
        let err = gemini
            .generate_text("gemini-2.5-flash", "instruction", "INPUT COMMAND: improve: x")
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        assert!(err.contains("GEMINI_API_KEY"));
        Ok(())
    }

    #[test]
    fn text_payload_concatenates_instruction_and_input() {
        let payload = build_text_payload("RULES", "INPUT COMMAND: style: baroque");
        assert_eq!(
            payload["contents"][0]["parts"][0]["text"],
            json!("RULES\n\nINPUT COMMAND: style: baroque")
        );
    }

    #[test]
    fn transport_errors_never_carry_the_api_key() -> anyhow::Result<()> {
        let gemini = GeminiProvider::new(GeminiConfig {
            api_base: "http://127.0.0.1:9/v1beta".to_string(),
            api_key: Some("SECRETKEY123".to_string()),
        })?;

        let text_err = gemini
            .generate_text("gemini-2.5-flash", "RULES", "INPUT COMMAND: improve: x")
            .err()
            .map(|err| format!("{err:#}"))
            .unwrap_or_default();
        assert!(text_err.contains("Gemini request failed"));
        assert!(!text_err.contains("SECRETKEY123"));

        let failure = GenerationOrchestrator::new(&gemini)
            .generate(
                &GenerationRequest::new("cabin", Vec::new()),
                "gemini-2.5-flash-image",
            )
            .unwrap_err();
        assert!(matches!(failure, GenerationFailure::TransportError(_)));
        assert!(!failure.to_string().contains("SECRETKEY123"));
        Ok(())
    }

    #[test]
    fn image_payload_puts_prompt_first_then_references() {
        let a = ImageData::new("image/png", vec![1, 2]);
        let b = ImageData::new("image/jpeg", vec![3]);
        let payload = build_image_payload(&[
            ContentPart::Text("harbour at dawn"),
            ContentPart::Image(&a),
            ContentPart::Image(&b),
        ]);
        let parts = payload["contents"][0]["parts"].as_array().cloned().unwrap_or_default();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0]["text"], json!("harbour at dawn"));
        assert_eq!(parts[1]["inlineData"]["mimeType"], json!("image/png"));
        assert_eq!(parts[1]["inlineData"]["data"], json!(BASE64.encode([1u8, 2])));
        assert_eq!(parts[2]["inlineData"]["mimeType"], json!("image/jpeg"));
        assert_eq!(payload["generationConfig"]["responseModalities"], json!(["IMAGE"]));
    }

    #[test]
    fn text_only_payload_has_a_single_part() {
        let payload = build_image_payload(&[ContentPart::Text("lakeside cabin")]);
        assert_eq!(payload["contents"][0]["parts"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn image_response_keeps_part_order() -> anyhow::Result<()> {
        let payload = json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "here you go" },
                        { "inlineData": { "mimeType": "image/png", "data": BASE64.encode([7u8]) } },
                        { "inline_data": { "mime_type": "image/jpeg", "data": BASE64.encode([8u8]) } },
                    ]
                }
            }]
        });
        let response = parse_image_response(&payload)?.unwrap_or_default();
        assert_eq!(
            response.parts,
            vec![
                ResponsePart::Text("here you go".to_string()),
                ResponsePart::InlineImage {
                    mime_type: "image/png".to_string(),
                    data: vec![7]
                },
                ResponsePart::InlineImage {
                    mime_type: "image/jpeg".to_string(),
                    data: vec![8]
                },
            ]
        );
        Ok(())
    }

    #[test]
    fn missing_candidates_is_an_empty_response() -> anyhow::Result<()> {
        assert_eq!(parse_image_response(&Value::Null)?, None);
        assert_eq!(parse_image_response(&json!({ "candidates": [] }))?, None);
        let blocked = parse_image_response(&json!({
            "candidates": [{ "finishReason": "SAFETY" }]
        }))?;
        assert_eq!(blocked.map(|response| response.parts.len()), Some(0));
        Ok(())
    }

    #[test]
    fn text_reply_joins_parts_of_first_candidate() {
        let payload = json!({
            "candidates": [
                { "content": { "parts": [{ "text": "castle, " }, { "text": "oil painting" }] } },
                { "content": { "parts": [{ "text": "ignored" }] } }
            ]
        });
        assert_eq!(extract_text(&payload), "castle, oil painting");
        assert_eq!(extract_text(&json!({})), "");
    }
}
