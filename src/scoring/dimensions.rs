use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fixed scoring taxonomy. Every scorer maps its native labels onto these
/// five dimensions; the composite value is derived, never stored as a sixth
/// map entry.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Dimension {
    PromptFidelity,
    StructuralIntegrity,
    PhysicalPlausibility,
    Cleanliness,
    AestheticAppeal,
}

impl Dimension {
    /// Human label used in review prompts and run summaries.
    pub fn label(self) -> &'static str {
        match self {
            Self::PromptFidelity => "prompt fidelity",
            Self::StructuralIntegrity => "structural integrity",
            Self::PhysicalPlausibility => "physical plausibility",
            Self::Cleanliness => "cleanliness",
            Self::AestheticAppeal => "aesthetic appeal",
        }
    }
}

/// Normalized per-dimension output of a single scorer. Dimensions a scorer
/// cannot judge stay absent; they are never written as zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DimensionScores {
    pub scores: BTreeMap<Dimension, f64>,
    pub comments: BTreeMap<Dimension, String>,
}

impl DimensionScores {
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// Composite formula constants plus the structural veto rule. Injected at
/// construction so tests can override every number.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoringWeights {
    #[serde(default = "default_structural_weight")]
    pub structural_integrity: f64,

    #[serde(default = "default_fidelity_weight")]
    pub prompt_fidelity: f64,

    #[serde(default = "default_aesthetic_weight")]
    pub aesthetic_appeal: f64,

    #[serde(default = "default_cleanliness_weight")]
    pub cleanliness: f64,

    /// Below this structural score the veto kicks in.
    #[serde(default = "default_veto_threshold")]
    pub veto_threshold: f64,

    /// Ceiling a vetoed composite is clamped to.
    #[serde(default = "default_veto_cap")]
    pub veto_cap: f64,
}

fn default_structural_weight() -> f64 {
    0.3
}

fn default_fidelity_weight() -> f64 {
    0.3
}

fn default_aesthetic_weight() -> f64 {
    0.2
}

fn default_cleanliness_weight() -> f64 {
    0.2
}

fn default_veto_threshold() -> f64 {
    0.6
}

fn default_veto_cap() -> f64 {
    0.5
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            structural_integrity: default_structural_weight(),
            prompt_fidelity: default_fidelity_weight(),
            aesthetic_appeal: default_aesthetic_weight(),
            cleanliness: default_cleanliness_weight(),
            veto_threshold: default_veto_threshold(),
            veto_cap: default_veto_cap(),
        }
    }
}

impl ScoringWeights {
    /// Weighted sum over the dimension map, missing dimensions counting as
    /// zero, with the structural veto applied after the sum. A structurally
    /// broken image cannot outscore a sound one regardless of the other
    /// dimensions.
    pub fn composite(&self, scores: &BTreeMap<Dimension, f64>) -> f64 {
        let get = |dimension: Dimension| scores.get(&dimension).copied().unwrap_or(0.0);

        let weighted = self.structural_integrity * get(Dimension::StructuralIntegrity)
            + self.prompt_fidelity * get(Dimension::PromptFidelity)
            + self.aesthetic_appeal * get(Dimension::AestheticAppeal)
            + self.cleanliness * get(Dimension::Cleanliness);

        let composite = if get(Dimension::StructuralIntegrity) < self.veto_threshold {
            weighted.min(self.veto_cap)
        } else {
            weighted
        };

        composite.clamp(0.0, 1.0)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let weights = [
            self.structural_integrity,
            self.prompt_fidelity,
            self.aesthetic_appeal,
            self.cleanliness,
        ];
        if weights.iter().any(|w| *w < 0.0 || *w > 1.0) {
            return Err(ConfigError::Validation(
                "scoring weights must lie in [0, 1]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.veto_threshold) || !(0.0..=1.0).contains(&self.veto_cap) {
            return Err(ConfigError::Validation(
                "veto threshold and cap must lie in [0, 1]".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(pairs: &[(Dimension, f64)]) -> BTreeMap<Dimension, f64> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn dimension_serializes_snake_case() {
        assert_eq!(Dimension::PromptFidelity.to_string(), "prompt_fidelity");
        assert_eq!(
            serde_json::to_string(&Dimension::StructuralIntegrity).unwrap(),
            "\"structural_integrity\""
        );
    }

    #[test]
    fn composite_applies_weighted_formula() {
        let weights = ScoringWeights::default();
        let composite = weights.composite(&scores(&[
            (Dimension::StructuralIntegrity, 0.8),
            (Dimension::PromptFidelity, 0.9),
            (Dimension::AestheticAppeal, 0.7),
            (Dimension::Cleanliness, 0.6),
        ]));
        let expected = 0.3 * 0.8 + 0.3 * 0.9 + 0.2 * 0.7 + 0.2 * 0.6;
        assert!((composite - expected).abs() < 1e-9);
    }

    #[test]
    fn missing_dimensions_count_as_zero() {
        let weights = ScoringWeights::default();
        let composite = weights.composite(&scores(&[(Dimension::AestheticAppeal, 1.0)]));
        // Only the 0.2 aesthetic weight contributes; no structural score also
        // means the veto cap applies, which 0.2 already sits under.
        assert!((composite - 0.2).abs() < 1e-9);
    }

    #[test]
    fn veto_caps_composite_after_the_sum() {
        let weights = ScoringWeights::default();
        let composite = weights.composite(&scores(&[
            (Dimension::StructuralIntegrity, 0.5),
            (Dimension::PromptFidelity, 1.0),
            (Dimension::AestheticAppeal, 1.0),
            (Dimension::Cleanliness, 1.0),
        ]));
        // Weighted sum would be 0.85; the veto clamps it.
        assert!((composite - 0.5).abs() < 1e-9);
    }

    #[test]
    fn veto_does_not_raise_low_composites() {
        let weights = ScoringWeights::default();
        let composite = weights.composite(&scores(&[
            (Dimension::StructuralIntegrity, 0.2),
            (Dimension::PromptFidelity, 0.1),
        ]));
        assert!(composite < 0.5);
    }

    #[test]
    fn sound_structure_passes_untouched() {
        let weights = ScoringWeights::default();
        let composite = weights.composite(&scores(&[
            (Dimension::StructuralIntegrity, 0.9),
            (Dimension::PromptFidelity, 0.9),
            (Dimension::AestheticAppeal, 0.9),
            (Dimension::Cleanliness, 0.9),
        ]));
        assert!(composite > 0.5);
        assert!(composite <= 1.0);
    }

    #[test]
    fn rejects_out_of_range_weights() {
        let weights = ScoringWeights {
            structural_integrity: 1.5,
            ..ScoringWeights::default()
        };
        assert!(weights.validate().is_err());
    }
}
