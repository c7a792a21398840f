use crate::config::ConsistencyThresholds;
use crate::error::OracleError;
use crate::model::{ConsistencyResult, ImageRef};
use crate::oracle::OracleApi;
use std::sync::Arc;

/// Judges whether a generated candidate still shows the reference subject.
/// Issues exactly one oracle call per candidate; candidates are never
/// batched into one call, which would let judgments bleed into each other.
pub struct ConsistencyVerifier {
    oracle: Arc<dyn OracleApi>,
    thresholds: ConsistencyThresholds,
}

impl ConsistencyVerifier {
    pub fn new(oracle: Arc<dyn OracleApi>, thresholds: ConsistencyThresholds) -> Self {
        Self { oracle, thresholds }
    }

    pub fn thresholds(&self) -> &ConsistencyThresholds {
        &self.thresholds
    }

    /// Verify one candidate against the full reference set. Failures are the
    /// caller's signal to leave the candidate unverified, not to abort.
    pub async fn verify(
        &self,
        references: &[ImageRef],
        candidate: &ImageRef,
    ) -> Result<ConsistencyResult, OracleError> {
        let verdict = self.oracle.verify_consistency(references, candidate).await?;
        Ok(ConsistencyResult::from_score(
            verdict.score,
            verdict.comment,
            &self.thresholds,
        ))
    }
}
