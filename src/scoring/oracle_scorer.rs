use super::traits::Scorer;
use super::{Dimension, DimensionScores};
use crate::error::ScoringError;
use crate::model::ImageRef;
use crate::oracle::{OracleApi, OracleScorecard};
use async_trait::async_trait;
use std::sync::Arc;
use strum::IntoEnumIterator;

/// Labels the oracle has used for each taxonomy dimension, newest vocabulary
/// first. The taxonomy name itself is always accepted.
fn native_aliases(dimension: Dimension) -> &'static [&'static str] {
    match dimension {
        Dimension::PromptFidelity => &["prompt_fidelity", "prompt_adherence", "semantic_fidelity"],
        Dimension::StructuralIntegrity => {
            &["structural_integrity", "anatomical_integrity", "structure"]
        }
        Dimension::PhysicalPlausibility => {
            &["physical_plausibility", "physical_logic", "lighting_logic"]
        }
        Dimension::Cleanliness => &["cleanliness", "purity"],
        Dimension::AestheticAppeal => &["aesthetic_appeal", "aesthetic_value", "aesthetic_score"],
    }
}

/// Oracle native scale is 1-10; out-of-range values are clamped rather than
/// rejected, matching how the service has misbehaved in practice.
fn normalize_native(raw: f64) -> f64 {
    if raw <= 0.0 {
        return 0.0;
    }
    if raw > 10.0 {
        return 1.0;
    }
    ((raw / 10.0) * 1000.0).round() / 1000.0
}

/// Primary scoring strategy: ask the external vision oracle, translate its
/// native labels onto the fixed taxonomy and its 1-10 scale onto [0, 1].
pub struct OracleScorer {
    oracle: Arc<dyn OracleApi>,
}

impl OracleScorer {
    pub fn new(oracle: Arc<dyn OracleApi>) -> Self {
        Self { oracle }
    }

    fn map_scorecard(scorecard: &OracleScorecard) -> DimensionScores {
        let mut mapped = DimensionScores::default();

        for dimension in Dimension::iter() {
            for alias in native_aliases(dimension) {
                let Some(entry) = scorecard.entries.get(*alias) else {
                    continue;
                };
                mapped
                    .scores
                    .insert(dimension, normalize_native(entry.score));
                if let Some(comment) = &entry.comment {
                    mapped.comments.insert(dimension, comment.clone());
                }
                break;
            }
        }

        // The oracle's overall number stands in for aesthetic appeal when no
        // per-dimension value arrived; composite itself is always recomputed
        // from the taxonomy map.
        if !mapped.scores.contains_key(&Dimension::AestheticAppeal)
            && let Some(entry) = scorecard.entries.get("final_score")
        {
            mapped
                .scores
                .insert(Dimension::AestheticAppeal, normalize_native(entry.score));
        }

        mapped
    }
}

#[async_trait]
impl Scorer for OracleScorer {
    fn name(&self) -> &str {
        "oracle"
    }

    async fn score(
        &self,
        image: &ImageRef,
        prompt: &str,
    ) -> Result<DimensionScores, ScoringError> {
        let scorecard =
            self.oracle
                .score(image, prompt)
                .await
                .map_err(|error| ScoringError::Scorer {
                    scorer: self.name().into(),
                    message: error.to_string(),
                })?;

        let mapped = Self::map_scorecard(&scorecard);
        if mapped.is_empty() {
            return Err(ScoringError::Empty {
                scorer: self.name().into(),
            });
        }
        Ok(mapped)
    }
}
