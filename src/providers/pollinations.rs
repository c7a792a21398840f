use super::http_client::build_provider_client_with_timeout;
use super::traits::{GenerateContext, ImageProvider, ProviderImage};
use crate::model::ImageRef;
use anyhow::Context;
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::Rng;
use reqwest::Client;
use url::Url;

const BASE_URL: &str = "https://image.pollinations.ai";
const DEFAULT_MODEL: &str = "flux";
// The free endpoint throttles aggressively; don't ask for more per run.
const MAX_OUTPUTS: usize = 4;

/// Keyless text-to-image adapter. Fetches the rendered image server-side and
/// hands it back inline so downstream scoring never depends on a URL that
/// re-renders on every fetch.
pub struct PollinationsProvider {
    client: Client,
}

impl PollinationsProvider {
    pub fn new() -> Self {
        Self {
            client: build_provider_client_with_timeout(45),
        }
    }

    fn build_image_url(&self, request: &GenerateContext, seed: u32) -> anyhow::Result<Url> {
        let (width, height) = request.dimensions().unwrap_or((1024, 1024));
        let mut url = Url::parse(BASE_URL).context("Pollinations base URL")?;
        url.path_segments_mut()
            .map_err(|()| anyhow::anyhow!("Pollinations base URL cannot be a base"))?
            .push("prompt")
            .push(&request.prompt);
        url.query_pairs_mut()
            .append_pair("width", &width.to_string())
            .append_pair("height", &height.to_string())
            .append_pair("seed", &seed.to_string())
            .append_pair(
                "model",
                request.param_str("model").unwrap_or(DEFAULT_MODEL),
            )
            .append_pair("referrer", "bestshot.local");
        Ok(url)
    }

    async fn fetch_inline(&self, url: Url) -> anyhow::Result<ImageRef> {
        let response = self
            .client
            .get(url)
            .header("Accept", "image/*")
            .send()
            .await
            .context("Pollinations fetch failed")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Pollinations returned status {status}");
        }

        let media_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/png")
            .to_string();
        let bytes = response
            .bytes()
            .await
            .context("Pollinations body read failed")?;
        Ok(ImageRef::inline(media_type, BASE64.encode(&bytes)))
    }
}

impl Default for PollinationsProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageProvider for PollinationsProvider {
    fn name(&self) -> &str {
        "pollinations"
    }

    async fn generate(&self, request: &GenerateContext) -> anyhow::Result<Vec<ProviderImage>> {
        let outputs = request.count.clamp(1, MAX_OUTPUTS);
        let fixed_seed = request
            .param_u64("seed")
            .map(|s| u32::try_from(s).unwrap_or(u32::MAX));

        let mut images = Vec::with_capacity(outputs);
        for _ in 0..outputs {
            let seed = fixed_seed.unwrap_or_else(|| rand::rng().random_range(0..u32::MAX));
            let url = self.build_image_url(request, seed)?;
            match self.fetch_inline(url).await {
                Ok(image) => images.push(ProviderImage::single(image)),
                Err(error) => {
                    tracing::warn!(provider = "pollinations", "fetch failed: {error}");
                }
            }
        }

        if images.is_empty() {
            anyhow::bail!("Pollinations returned no usable image");
        }
        Ok(images)
    }
}
