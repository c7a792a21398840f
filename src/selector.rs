use crate::error::PipelineError;
use crate::model::{Candidate, ConsistencyStatus};
use crate::pipeline::PipelineMode;
use std::cmp::Ordering;

/// Deterministic best-candidate rule. Selection never depends on map
/// iteration order or wall-clock timing; re-running it over the same
/// candidate list always returns the same index.
#[derive(Debug, Clone, Copy, Default)]
pub struct CandidateSelector;

impl CandidateSelector {
    pub fn new() -> Self {
        Self
    }

    /// A candidate must carry a scoring result; on reference-bound runs it
    /// must also carry a consistency verdict that is not `inconsistent`.
    pub fn is_eligible(candidate: &Candidate, mode: PipelineMode) -> bool {
        if candidate.scoring.is_none() {
            return false;
        }
        match mode {
            PipelineMode::Open => true,
            PipelineMode::ReferenceBound => matches!(
                candidate.consistency.as_ref().map(|c| c.status),
                Some(ConsistencyStatus::Consistent) | Some(ConsistencyStatus::Uncertain)
            ),
        }
    }

    /// Total order used for selection: composite descending, then
    /// consistency score descending, then earliest submission.
    pub fn selection_ordering(a: &Candidate, b: &Candidate) -> Ordering {
        let by_composite = b
            .composite()
            .unwrap_or(0.0)
            .total_cmp(&a.composite().unwrap_or(0.0));
        if by_composite != Ordering::Equal {
            return by_composite;
        }
        let by_consistency = b
            .consistency_score()
            .unwrap_or(0.0)
            .total_cmp(&a.consistency_score().unwrap_or(0.0));
        if by_consistency != Ordering::Equal {
            return by_consistency;
        }
        a.submission_order.cmp(&b.submission_order)
    }

    /// Index of the best eligible candidate, or the typed failure that
    /// distinguishes "nothing passed the gates" from "nothing was generated".
    pub fn select(
        &self,
        candidates: &[Candidate],
        mode: PipelineMode,
    ) -> Result<usize, PipelineError> {
        candidates
            .iter()
            .enumerate()
            .filter(|(_, candidate)| Self::is_eligible(candidate, mode))
            .min_by(|(_, a), (_, b)| Self::selection_ordering(a, b))
            .map(|(index, _)| index)
            .ok_or(PipelineError::NoEligibleCandidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConsistencyThresholds;
    use crate::model::{ConsistencyResult, ImageRef, ScoringResult};
    use crate::scoring::{Dimension, ScoringWeights};
    use std::collections::BTreeMap;

    fn scored_candidate(order: usize, composite_target: f64) -> Candidate {
        // Drive the composite through prompt fidelity and structure so the
        // veto stays out of the way.
        let weights = ScoringWeights::default();
        let scores: BTreeMap<Dimension, f64> = [
            (Dimension::StructuralIntegrity, composite_target),
            (Dimension::PromptFidelity, composite_target),
            (Dimension::AestheticAppeal, composite_target),
            (Dimension::Cleanliness, composite_target),
        ]
        .into_iter()
        .collect();
        let mut candidate = Candidate::new(
            "mock",
            ImageRef::url(format!("https://example.com/{order}.png")),
            order,
        );
        candidate.scoring = Some(ScoringResult::from_dimensions(
            scores,
            BTreeMap::new(),
            &weights,
        ));
        candidate
    }

    fn with_consistency(mut candidate: Candidate, score: f64) -> Candidate {
        candidate.consistency = Some(ConsistencyResult::from_score(
            score,
            None,
            &ConsistencyThresholds::default(),
        ));
        candidate
    }

    #[test]
    fn highest_composite_wins() {
        let candidates = vec![
            scored_candidate(0, 0.3),
            scored_candidate(1, 0.9),
            scored_candidate(2, 0.6),
        ];
        let selector = CandidateSelector::new();
        assert_eq!(selector.select(&candidates, PipelineMode::Open).unwrap(), 1);
    }

    #[test]
    fn unscored_candidates_are_skipped() {
        let mut unscored = Candidate::new("mock", ImageRef::url("https://example.com/x.png"), 0);
        unscored.scoring = None;
        let candidates = vec![unscored, scored_candidate(1, 0.2)];
        let selector = CandidateSelector::new();
        assert_eq!(selector.select(&candidates, PipelineMode::Open).unwrap(), 1);
    }

    #[test]
    fn empty_or_all_unscored_is_a_distinct_failure() {
        let selector = CandidateSelector::new();
        let mut unscored = Candidate::new("mock", ImageRef::url("https://example.com/x.png"), 0);
        unscored.scoring = None;
        let err = selector
            .select(&[unscored], PipelineMode::Open)
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoEligibleCandidate));
    }

    #[test]
    fn composite_ties_break_on_consistency_then_submission() {
        let a = with_consistency(scored_candidate(0, 0.7), 0.6);
        let b = with_consistency(scored_candidate(1, 0.7), 0.9);
        let selector = CandidateSelector::new();
        assert_eq!(
            selector
                .select(&[a.clone(), b.clone()], PipelineMode::ReferenceBound)
                .unwrap(),
            1
        );

        // Equal consistency falls through to submission order.
        let c = with_consistency(scored_candidate(0, 0.7), 0.9);
        let d = with_consistency(scored_candidate(1, 0.7), 0.9);
        assert_eq!(
            selector
                .select(&[c, d], PipelineMode::ReferenceBound)
                .unwrap(),
            0
        );
    }

    #[test]
    fn inconsistent_candidates_are_never_selectable_when_reference_bound() {
        let strong_but_drifted = with_consistency(scored_candidate(0, 0.95), 0.2);
        let weaker_but_faithful = with_consistency(scored_candidate(1, 0.5), 0.9);
        let selector = CandidateSelector::new();
        assert_eq!(
            selector
                .select(
                    &[strong_but_drifted.clone(), weaker_but_faithful],
                    PipelineMode::ReferenceBound
                )
                .unwrap(),
            1
        );

        // The same drifted candidate alone fails the run.
        let err = selector
            .select(&[strong_but_drifted], PipelineMode::ReferenceBound)
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoEligibleCandidate));
    }

    #[test]
    fn missing_consistency_verdict_is_ineligible_when_reference_bound() {
        let unverified = scored_candidate(0, 0.9);
        assert!(!CandidateSelector::is_eligible(
            &unverified,
            PipelineMode::ReferenceBound
        ));
        assert!(CandidateSelector::is_eligible(
            &unverified,
            PipelineMode::Open
        ));
    }
}
