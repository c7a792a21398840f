use super::traits::Scorer;
use super::{DimensionScores, ScoringWeights};
use crate::error::ScoringError;
use crate::model::{ImageRef, ScoringResult};
use std::sync::Arc;

/// Owns the priority/fallback scoring policy: an ordered list of strategies
/// tried in sequence until one produces dimensions, then composite
/// derivation through the injected weights.
pub struct ScoringAggregator {
    scorers: Vec<Arc<dyn Scorer>>,
    weights: ScoringWeights,
}

impl ScoringAggregator {
    pub fn new(scorers: Vec<Arc<dyn Scorer>>, weights: ScoringWeights) -> Self {
        Self { scorers, weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Score one candidate image. Pure with respect to scorer output: the
    /// same dimensions always produce the identical `ScoringResult`.
    pub async fn score_candidate(
        &self,
        image: &ImageRef,
        prompt: &str,
    ) -> Result<ScoringResult, ScoringError> {
        let mut failures = Vec::new();

        for scorer in &self.scorers {
            match scorer.score(image, prompt).await {
                Ok(dimensions) if dimensions.is_empty() => {
                    tracing::warn!(
                        scorer = scorer.name(),
                        image = image.short(),
                        "scorer returned no dimensions, trying next"
                    );
                    failures.push(format!("{}: produced no dimensions", scorer.name()));
                }
                Ok(dimensions) => {
                    let DimensionScores { scores, comments } = dimensions;
                    return Ok(ScoringResult::from_dimensions(
                        scores,
                        comments,
                        &self.weights,
                    ));
                }
                Err(error) => {
                    tracing::warn!(
                        scorer = scorer.name(),
                        image = image.short(),
                        "scorer failed, trying next: {error}"
                    );
                    failures.push(format!("{}: {error}", scorer.name()));
                }
            }
        }

        Err(ScoringError::AllScorersFailed(failures.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::Dimension;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedScorer {
        name: &'static str,
        dimensions: DimensionScores,
        calls: AtomicUsize,
    }

    impl FixedScorer {
        fn new(name: &'static str, pairs: &[(Dimension, f64)]) -> Self {
            let mut dimensions = DimensionScores::default();
            for (dimension, score) in pairs {
                dimensions.scores.insert(*dimension, *score);
            }
            Self {
                name,
                dimensions,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Scorer for FixedScorer {
        fn name(&self) -> &str {
            self.name
        }

        async fn score(
            &self,
            _image: &ImageRef,
            _prompt: &str,
        ) -> Result<DimensionScores, ScoringError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.dimensions.clone())
        }
    }

    struct FailingScorer {
        name: &'static str,
        calls: AtomicUsize,
    }

    impl FailingScorer {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Scorer for FailingScorer {
        fn name(&self) -> &str {
            self.name
        }

        async fn score(
            &self,
            _image: &ImageRef,
            _prompt: &str,
        ) -> Result<DimensionScores, ScoringError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ScoringError::Scorer {
                scorer: self.name.into(),
                message: "unreachable".into(),
            })
        }
    }

    fn image() -> ImageRef {
        ImageRef::url("https://example.com/candidate.png")
    }

    #[tokio::test]
    async fn first_success_short_circuits_the_chain() {
        let primary = Arc::new(FixedScorer::new(
            "primary",
            &[(Dimension::StructuralIntegrity, 0.9)],
        ));
        let fallback = Arc::new(FixedScorer::new(
            "fallback",
            &[(Dimension::AestheticAppeal, 0.5)],
        ));
        let aggregator = ScoringAggregator::new(
            vec![primary.clone(), fallback.clone()],
            ScoringWeights::default(),
        );

        let result = aggregator.score_candidate(&image(), "x").await.unwrap();
        assert!(result.score(Dimension::StructuralIntegrity).is_some());
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fallback_fills_subset_without_zeroing_missing_dimensions() {
        let aggregator = ScoringAggregator::new(
            vec![
                Arc::new(FailingScorer::new("oracle")),
                Arc::new(FixedScorer::new(
                    "fallback",
                    &[(Dimension::AestheticAppeal, 0.8)],
                )),
            ],
            ScoringWeights::default(),
        );

        let result = aggregator.score_candidate(&image(), "x").await.unwrap();
        assert_eq!(result.scores.len(), 1);
        assert!(result.score(Dimension::StructuralIntegrity).is_none());
        // 0.2 weight on aesthetic appeal; no structural score keeps the veto
        // cap in force.
        assert!((result.composite - 0.16).abs() < 1e-9);
    }

    #[tokio::test]
    async fn exhausted_chain_reports_every_failure() {
        let aggregator = ScoringAggregator::new(
            vec![
                Arc::new(FailingScorer::new("oracle")),
                Arc::new(FailingScorer::new("local")),
            ],
            ScoringWeights::default(),
        );

        let err = aggregator.score_candidate(&image(), "x").await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("oracle"));
        assert!(message.contains("local"));
    }

    #[tokio::test]
    async fn scoring_is_idempotent_for_identical_scorer_output() {
        let scorer = Arc::new(FixedScorer::new(
            "primary",
            &[
                (Dimension::StructuralIntegrity, 0.7),
                (Dimension::PromptFidelity, 0.9),
                (Dimension::AestheticAppeal, 0.6),
                (Dimension::Cleanliness, 0.8),
            ],
        ));
        let aggregator = ScoringAggregator::new(vec![scorer], ScoringWeights::default());

        let first = aggregator.score_candidate(&image(), "x").await.unwrap();
        let second = aggregator.score_candidate(&image(), "x").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn composite_bounds_hold_for_arbitrary_dimension_values() {
        let aggregator = ScoringAggregator::new(
            vec![Arc::new(FixedScorer::new(
                "primary",
                &[
                    (Dimension::StructuralIntegrity, 1.0),
                    (Dimension::PromptFidelity, 1.0),
                    (Dimension::AestheticAppeal, 1.0),
                    (Dimension::Cleanliness, 1.0),
                ],
            ))],
            ScoringWeights::default(),
        );
        let result = aggregator.score_candidate(&image(), "x").await.unwrap();
        assert!((0.0..=1.0).contains(&result.composite));
    }
}
