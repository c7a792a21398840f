use super::traits::Scorer;
use super::{Dimension, DimensionScores};
use crate::error::ScoringError;
use crate::model::ImageRef;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Stable pseudo-score in [0, 1) derived from the input digest. Keeps runs
/// reproducible when the oracle is down instead of handing out random
/// numbers that reshuffle on every retry.
fn deterministic_score(seed_input: &str, offset: u32) -> f64 {
    let digest = Sha256::digest(format!("{seed_input}:{offset}").as_bytes());
    let word = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    f64::from(word % 1000) / 1000.0
}

/// Last-resort local scorer. Fills only `aesthetic_appeal`; the structural
/// and fidelity dimensions require actual vision judgment and stay absent,
/// which also keeps fallback-only composites under the structural veto cap.
pub struct LocalAestheticScorer;

impl LocalAestheticScorer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LocalAestheticScorer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scorer for LocalAestheticScorer {
    fn name(&self) -> &str {
        "local_aesthetic"
    }

    async fn score(
        &self,
        image: &ImageRef,
        _prompt: &str,
    ) -> Result<DimensionScores, ScoringError> {
        let mut result = DimensionScores::default();
        result.scores.insert(
            Dimension::AestheticAppeal,
            deterministic_score(&image.as_request_url(), 1),
        );
        Ok(result)
    }
}
