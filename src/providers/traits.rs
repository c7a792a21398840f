use crate::model::ImageRef;
use async_trait::async_trait;
use serde_json::Value;

/// Normalized generation request handed to every adapter. Built once by the
/// orchestrator from the `GenerationRequest` and shared across the fan-out.
#[derive(Debug, Clone)]
pub struct GenerateContext {
    pub prompt: String,
    pub references: Vec<ImageRef>,
    /// Concrete `WxH` pixel size derived from the requested aspect ratio.
    pub size: String,
    /// Candidates requested from this provider.
    pub count: usize,
    /// Free-form provider-specific parameters.
    pub params: Value,
}

impl GenerateContext {
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }

    pub fn param_u64(&self, key: &str) -> Option<u64> {
        self.params.get(key).and_then(Value::as_u64)
    }

    /// Parse the `WxH` size into integer dimensions.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        let (w, h) = self.size.split_once('x')?;
        Some((w.parse().ok()?, h.parse().ok()?))
    }
}

/// One image as returned by an adapter, with burst ordering when the vendor
/// emitted several in a single call.
#[derive(Debug, Clone)]
pub struct ProviderImage {
    pub image: ImageRef,
    pub sequence_index: Option<usize>,
    pub group_size: Option<usize>,
}

impl ProviderImage {
    pub fn single(image: ImageRef) -> Self {
        Self {
            image,
            sequence_index: None,
            group_size: None,
        }
    }

    pub fn in_burst(image: ImageRef, index: usize, group_size: usize) -> Self {
        Self {
            image,
            sequence_index: Some(index),
            group_size: Some(group_size),
        }
    }
}

/// Uniform contract every vendor adapter implements. The orchestrator treats
/// all adapters identically; retry/backoff against the vendor API is the
/// adapter's own business.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerateContext) -> anyhow::Result<Vec<ProviderImage>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_parses_dimensions() {
        let ctx = GenerateContext {
            prompt: "a cat".into(),
            references: vec![],
            size: "2304x1728".into(),
            count: 1,
            params: Value::Null,
        };
        assert_eq!(ctx.dimensions(), Some((2304, 1728)));
    }

    #[test]
    fn context_reads_string_params() {
        let ctx = GenerateContext {
            prompt: "a cat".into(),
            references: vec![],
            size: "1024x1024".into(),
            count: 1,
            params: serde_json::json!({"model": "flux"}),
        };
        assert_eq!(ctx.param_str("model"), Some("flux"));
        assert_eq!(ctx.param_str("missing"), None);
    }
}
