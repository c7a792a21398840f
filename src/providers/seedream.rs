use super::http_client::build_provider_client;
use super::traits::{GenerateContext, ImageProvider, ProviderImage};
use crate::model::ImageRef;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

const DEFAULT_BASE_URL: &str = "https://ark.cn-beijing.volces.com";
const DEFAULT_MODEL: &str = "doubao-seedream-4-0-250828";
const MAX_BURST: usize = 15;

#[derive(Deserialize)]
struct ArkImagesResponse {
    #[serde(default)]
    data: Vec<ArkImageDatum>,
}

#[derive(Deserialize)]
struct ArkImageDatum {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    b64_json: Option<String>,
}

/// Seedream adapter against the Ark images API. The one provider here that
/// emits ordered multi-image bursts from a single call (sequential image
/// generation), so its candidates carry sequence metadata.
pub struct SeedreamProvider {
    cached_auth_header: Option<String>,
    base_url: String,
    client: Client,
}

impl SeedreamProvider {
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

    fn build_payload(&self, request: &GenerateContext) -> Value {
        let burst = request.count.clamp(1, MAX_BURST);
        let sequential = if burst > 1 || !request.references.is_empty() {
            "auto"
        } else {
            "disabled"
        };

        let mut payload = json!({
            "model": request.param_str("model").unwrap_or(DEFAULT_MODEL),
            "prompt": request.prompt,
            "size": request.size,
            "response_format": "url",
            "stream": false,
            "watermark": false,
            "sequential_image_generation": sequential,
        });

        if !request.references.is_empty() {
            payload["image"] = Value::from(
                request
                    .references
                    .iter()
                    .map(|r| Value::from(r.as_request_url()))
                    .collect::<Vec<_>>(),
            );
        }
        if burst > 1 {
            payload["sequential_image_generation_options"] = json!({ "max_images": burst });
        }
        payload
    }
}

#[async_trait]
impl ImageProvider for SeedreamProvider {
    fn name(&self) -> &str {
        "seedream"
    }

    async fn generate(&self, request: &GenerateContext) -> anyhow::Result<Vec<ProviderImage>> {
        let Some(auth_header) = self.cached_auth_header.as_deref() else {
            anyhow::bail!("Seedream API key not configured (set ARK_API_KEY)");
        };

        let payload = self.build_payload(request);
        let response = self
            .client
            .post(format!("{}/api/v3/images/generations", self.base_url))
            .header("Authorization", auth_header)
            .json(&payload)
            .send()
            .await
            .context("Seedream images request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Seedream API error ({status}): {body}");
        }

        let parsed: ArkImagesResponse = response
            .json()
            .await
            .context("Seedream response was not valid JSON")?;

        let delivered: Vec<ImageRef> = parsed
            .data
            .into_iter()
            .filter_map(|datum| match (datum.url, datum.b64_json) {
                (Some(url), _) if !url.is_empty() => Some(ImageRef::url(url)),
                (_, Some(b64)) if !b64.is_empty() => Some(ImageRef::inline("image/png", b64)),
                _ => None,
            })
            .take(request.count.clamp(1, MAX_BURST))
            .collect();

        if delivered.is_empty() {
            anyhow::bail!("Seedream returned no usable image");
        }

        let group_size = delivered.len();
        if group_size == 1 {
            return Ok(delivered.into_iter().map(ProviderImage::single).collect());
        }
        Ok(delivered
            .into_iter()
            .enumerate()
            .map(|(index, image)| ProviderImage::in_burst(image, index, group_size))
            .collect())
    }
}
