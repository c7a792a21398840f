use super::http_client::build_provider_client;
use super::traits::{GenerateContext, ImageProvider, ProviderImage};
use crate::model::ImageRef;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-image-1";

#[derive(Serialize)]
struct ImagesRequest {
    model: String,
    prompt: String,
    n: usize,
    size: &'static str,
}

#[derive(Deserialize)]
struct ImagesResponse {
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    b64_json: Option<String>,
}

/// OpenAI images endpoint adapter.
pub struct OpenAiImageProvider {
    /// Pre-computed `"Bearer <key>"` header value (avoids `format!` per request).
    cached_auth_header: Option<String>,
    base_url: String,
    client: Client,
}

impl OpenAiImageProvider {
    pub fn new(api_key: Option<&str>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: Option<&str>, base_url: &str) -> Self {
        Self {
            cached_auth_header: api_key.map(|k| format!("Bearer {k}")),
            base_url: base_url.trim_end_matches('/').to_string(),
            client: build_provider_client(),
        }
    }

    /// The images endpoint only accepts a fixed size menu; pick the one that
    /// matches the requested orientation.
    fn nearest_supported_size(request: &GenerateContext) -> &'static str {
        match request.dimensions() {
            Some((w, h)) if w > h => "1536x1024",
            Some((w, h)) if h > w => "1024x1536",
            _ => "1024x1024",
        }
    }
}

#[async_trait]
impl ImageProvider for OpenAiImageProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, request: &GenerateContext) -> anyhow::Result<Vec<ProviderImage>> {
        let Some(auth_header) = self.cached_auth_header.as_deref() else {
            anyhow::bail!("OpenAI API key not configured");
        };

        let payload = ImagesRequest {
            model: request
                .param_str("model")
                .unwrap_or(DEFAULT_MODEL)
                .to_string(),
            prompt: request.prompt.clone(),
            n: request.count.max(1),
            size: Self::nearest_supported_size(request),
        };

        let response = self
            .client
            .post(format!("{}/v1/images/generations", self.base_url))
            .header("Authorization", auth_header)
            .json(&payload)
            .send()
            .await
            .context("OpenAI images request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI images API error ({status}): {body}");
        }

        let parsed: ImagesResponse = response
            .json()
            .await
            .context("OpenAI images response was not valid JSON")?;

        let images: Vec<ProviderImage> = parsed
            .data
            .into_iter()
            .filter_map(|datum| match (datum.url, datum.b64_json) {
                (Some(url), _) if !url.is_empty() => Some(ImageRef::url(url)),
                (_, Some(b64)) if !b64.is_empty() => Some(ImageRef::inline("image/png", b64)),
                _ => None,
            })
            .map(ProviderImage::single)
            .collect();

        if images.is_empty() {
            anyhow::bail!("OpenAI returned no usable image");
        }
        Ok(images)
    }
}
