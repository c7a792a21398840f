use super::{OracleApi, OracleConsistency, OracleScorecard};
use crate::config::OracleConfig;
use crate::error::OracleError;
use crate::model::ImageRef;
use crate::providers::build_provider_client_with_timeout;
use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;

/// Instruction the oracle scores against. Labels here are the oracle's
/// native vocabulary; the scoring layer maps them onto the fixed taxonomy.
const SCORING_SYSTEM_PROMPT: &str = "\
You are a meticulous quality inspector for AI-generated images. Judge the \
attached image against the creative brief and rate each criterion on a 1-10 \
scale. Respond with strict JSON only, using exactly this shape:\n\
{\n\
  \"prompt_adherence\": {\"score\": <1-10>, \"comment\": \"<short remark>\"},\n\
  \"anatomical_integrity\": {\"score\": <1-10>, \"comment\": \"<short remark>\"},\n\
  \"physical_logic\": {\"score\": <1-10>, \"comment\": \"<short remark>\"},\n\
  \"cleanliness\": {\"score\": <1-10>, \"comment\": \"<short remark>\"},\n\
  \"aesthetic_value\": {\"score\": <1-10>, \"comment\": \"<short remark>\"},\n\
  \"final_score\": <1-10>\n\
}\n\
anatomical_integrity covers hands, faces and object structure; \
physical_logic covers lighting, shadows and perspective; cleanliness covers \
artifacts, noise and stray elements. Output the JSON object and nothing else.";

const COMPARISON_SYSTEM_PROMPT: &str =
    "You are a professional visual art critic. Please output in pure JSON format.";

/// HTTP client for the external vision judgment service, an
/// OpenAI-compatible chat-completions API with image content blocks.
pub struct VisionOracle {
    client: Client,
    endpoint: String,
    model: String,
    /// Pre-computed `"Bearer <key>"` header value.
    cached_auth_header: Option<String>,
    max_attempts: u32,
    backoff_base_ms: u64,
}

impl VisionOracle {
    pub fn new(config: &OracleConfig) -> Self {
        let api_key = config.api_key.clone().or_else(|| {
            ["ORACLE_API_KEY", "ARK_API_KEY", "DOUBAO_API_KEY"]
                .iter()
                .find_map(|var| std::env::var(var).ok())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        });

        Self {
            client: build_provider_client_with_timeout(config.timeout_secs),
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            cached_auth_header: api_key.map(|k| format!("Bearer {k}")),
            max_attempts: config.max_attempts.max(1),
            backoff_base_ms: config.backoff_base_ms.max(50),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.cached_auth_header.is_some()
    }

    fn image_block(image: &ImageRef) -> Value {
        json!({
            "type": "image_url",
            "image_url": { "url": image.as_request_url() },
        })
    }

    fn consistency_instructions(reference_count: usize) -> String {
        format!(
            "You are a product-consistency reviewer. Compare the final image \
             (the candidate) against the {reference_count} preceding reference \
             image(s). The candidate must show the same subject: same product \
             category, dominant colors and key features. Respond with strict \
             JSON only: {{\"score\": <float 0-1, 1 means identical subject>, \
             \"comment\": \"<short reason>\"}}."
        )
    }

    /// POST the chat payload with bounded retry. Retries cover transport
    /// errors, timeouts and transient statuses; client errors bail straight
    /// to the caller.
    async fn post_chat(&self, payload: Value) -> Result<Value, OracleError> {
        let Some(auth_header) = self.cached_auth_header.as_deref() else {
            return Err(OracleError::Request(
                "oracle API key not configured (set ORACLE_API_KEY)".into(),
            ));
        };

        let mut last_error = OracleError::Request("no attempt made".into());
        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                let jitter: u64 = rand::rng().random_range(0..250);
                let delay = self.backoff_base_ms * u64::from(attempt) + jitter;
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            let outcome = self
                .client
                .post(&self.endpoint)
                .header("Authorization", auth_header)
                .json(&payload)
                .send()
                .await;

            match outcome {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let body: Value = response.json().await.map_err(|e| {
                            OracleError::Malformed(format!("response body was not JSON: {e}"))
                        })?;
                        if let Some(message) = embedded_error_message(&body) {
                            last_error = OracleError::Request(message);
                            tracing::warn!(
                                attempt,
                                max_attempts = self.max_attempts,
                                "oracle reported an in-band error: {last_error}"
                            );
                            continue;
                        }
                        return Ok(body);
                    }

                    let message = response.text().await.unwrap_or_default();
                    let error = OracleError::Status {
                        status: status.as_u16(),
                        message,
                    };
                    if !is_retryable_status(status.as_u16()) {
                        return Err(error);
                    }
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        status = status.as_u16(),
                        "oracle call failed, retrying"
                    );
                    last_error = error;
                }
                Err(error) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        "oracle transport error, retrying: {error}"
                    );
                    last_error = OracleError::Request(error.to_string());
                }
            }
        }

        Err(OracleError::Exhausted {
            attempts: self.max_attempts,
            last_error: last_error.to_string(),
        })
    }

    /// Pull the assistant text out of a chat-completions body and parse it
    /// as a JSON object, tolerating markdown code fences.
    fn parse_json_content(body: &Value) -> Result<Value, OracleError> {
        let content = extract_content_text(body)
            .ok_or_else(|| OracleError::Malformed("no assistant content in response".into()))?;
        let cleaned = strip_code_fences(&content);
        serde_json::from_str::<Value>(cleaned)
            .ok()
            .filter(Value::is_object)
            .ok_or_else(|| {
                OracleError::Malformed(format!(
                    "assistant content was not a JSON object: {}",
                    truncate(cleaned, 160)
                ))
            })
    }
}

#[async_trait]
impl OracleApi for VisionOracle {
    async fn score(&self, image: &ImageRef, prompt: &str) -> Result<OracleScorecard, OracleError> {
        let payload = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SCORING_SYSTEM_PROMPT },
                {
                    "role": "user",
                    "content": [
                        Self::image_block(image),
                        { "type": "text", "text": format!("Creative brief: {prompt}") },
                    ],
                },
            ],
            "response_format": { "type": "json_object" },
        });

        let body = self.post_chat(payload).await?;
        let parsed = Self::parse_json_content(&body)?;
        OracleScorecard::from_value(&parsed)
    }

    async fn compare(
        &self,
        images: &[ImageRef],
        instructions: &str,
    ) -> Result<Value, OracleError> {
        let mut content: Vec<Value> = images.iter().map(Self::image_block).collect();
        content.push(json!({ "type": "text", "text": instructions }));

        let payload = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": COMPARISON_SYSTEM_PROMPT },
                { "role": "user", "content": content },
            ],
            "response_format": { "type": "json_object" },
        });

        let body = self.post_chat(payload).await?;
        Self::parse_json_content(&body)
    }

    async fn verify_consistency(
        &self,
        references: &[ImageRef],
        candidate: &ImageRef,
    ) -> Result<OracleConsistency, OracleError> {
        let mut content: Vec<Value> = references.iter().map(Self::image_block).collect();
        content.push(Self::image_block(candidate));
        content.push(json!({
            "type": "text",
            "text": Self::consistency_instructions(references.len()),
        }));

        let payload = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": content }],
            "response_format": { "type": "json_object" },
        });

        let body = self.post_chat(payload).await?;
        let parsed = Self::parse_json_content(&body)?;

        let score = extract_consistency_score(&parsed).ok_or_else(|| {
            OracleError::Malformed("consistency response carried no score".into())
        })?;
        let comment = parsed
            .get("comment")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(String::from);

        Ok(OracleConsistency { score, comment })
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 409 | 425 | 429) || status >= 500
}

/// Some gateways wrap failures in a 200 body; surface those as errors.
fn embedded_error_message(body: &Value) -> Option<String> {
    match body.get("error") {
        Some(Value::String(message)) if !message.trim().is_empty() => {
            return Some(message.trim().to_string());
        }
        Some(Value::Object(fields)) => {
            let detail = fields
                .get("message")
                .or_else(|| fields.get("detail"))
                .and_then(Value::as_str)?;
            return Some(detail.to_string());
        }
        _ => {}
    }
    None
}

/// Assistant text from a chat-completions body; content may be a plain
/// string or a list of typed parts.
fn extract_content_text(body: &Value) -> Option<String> {
    let message = body.get("choices")?.get(0)?.get("message")?;
    match message.get("content")? {
        Value::String(text) => Some(text.clone()),
        Value::Array(parts) => {
            let joined: String = parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect();
            (!joined.is_empty()).then_some(joined)
        }
        _ => None,
    }
}

fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Find a consistency score wherever the oracle put it. Values above 1 are
/// treated as percentages and rescaled; everything is clamped to [0, 1].
fn extract_consistency_score(value: &Value) -> Option<f64> {
    fn rescale(raw: f64) -> f64 {
        let scaled = if raw > 1.0 {
            if raw <= 100.0 { raw / 100.0 } else { 1.0 }
        } else {
            raw
        };
        scaled.clamp(0.0, 1.0)
    }

    match value {
        Value::Object(fields) => {
            for key in ["score", "similarity", "consistency", "consistency_score"] {
                if let Some(raw) = fields.get(key).and_then(Value::as_f64) {
                    return Some(rescale(raw));
                }
            }
            for key in ["output", "data", "answer", "response", "result"] {
                if let Some(found) = fields.get(key).and_then(extract_consistency_score) {
                    return Some(found);
                }
            }
            None
        }
        Value::Array(items) => items.iter().find_map(extract_consistency_score),
        Value::String(text) => {
            let nested: Value = serde_json::from_str(text).ok()?;
            extract_consistency_score(&nested)
        }
        _ => None,
    }
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
