use super::DimensionScores;
use crate::error::ScoringError;
use crate::model::ImageRef;
use async_trait::async_trait;

/// One scoring strategy. The aggregator owns an ordered list of these and
/// walks it until a strategy succeeds, so every implementation must be
/// independently usable and independently fakeable in tests.
#[async_trait]
pub trait Scorer: Send + Sync {
    fn name(&self) -> &str;

    /// Judge one image against the originating prompt. A scorer that cannot
    /// fill a dimension leaves it absent rather than writing zero.
    async fn score(&self, image: &ImageRef, prompt: &str)
    -> Result<DimensionScores, ScoringError>;
}
