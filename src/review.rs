use crate::model::{Candidate, ComparativeReview};
use crate::oracle::OracleApi;
use crate::scoring::Dimension;
use serde_json::Value;
use std::fmt::Write as _;
use std::sync::Arc;

/// Which critique voice the oracle writes in. Reference-bound runs serve
/// marketing imagery, so they get the commerce register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewRegister {
    General,
    Commerce,
}

const REVIEW_DIMENSIONS: [Dimension; 4] = [
    Dimension::StructuralIntegrity,
    Dimension::PromptFidelity,
    Dimension::PhysicalPlausibility,
    Dimension::Cleanliness,
];

/// Writes the winner-versus-loser explanation. Strictly a narrator: every
/// number in the instruction text comes from scores already computed, and
/// malformed oracle output is rejected rather than repaired.
pub struct ReviewGenerator {
    oracle: Arc<dyn OracleApi>,
}

impl ReviewGenerator {
    pub fn new(oracle: Arc<dyn OracleApi>) -> Self {
        Self { oracle }
    }

    /// Contrast the best and worst scored candidates. One retry on malformed
    /// structured output, then give up; never fatal to the run.
    pub async fn compare(
        &self,
        best: &Candidate,
        worst: &Candidate,
        register: ReviewRegister,
    ) -> Option<ComparativeReview> {
        let instructions = Self::build_instructions(best, worst, register);
        let images = [best.image.clone(), worst.image.clone()];

        for attempt in 1..=2u32 {
            let value = match self.oracle.compare(&images, &instructions).await {
                Ok(value) => value,
                Err(error) => {
                    tracing::warn!("comparative review call failed: {error}");
                    return None;
                }
            };

            match Self::parse_review(&value) {
                Some(review) => return Some(review),
                None => {
                    tracing::warn!(
                        attempt,
                        "comparative review output malformed: {}",
                        value.to_string()
                    );
                }
            }
        }
        None
    }

    fn score_block(label: &str, candidate: &Candidate) -> String {
        let mut block = String::new();
        let _ = writeln!(block, "[{label}]");
        if let Some(scoring) = &candidate.scoring {
            let _ = writeln!(block, "- composite: {:.1}/10", scoring.composite * 10.0);
            for dimension in REVIEW_DIMENSIONS {
                let _ = writeln!(
                    block,
                    "- {}: {:.1}/10",
                    dimension.label(),
                    scoring.display_score(dimension)
                );
            }
        }
        block
    }

    fn build_instructions(
        best: &Candidate,
        worst: &Candidate,
        register: ReviewRegister,
    ) -> String {
        let persona = match register {
            ReviewRegister::General => {
                "You are a quality inspector for AI-generated imagery. Compare the two \
                 attached images: the first is the winner, the second the runner-up."
            }
            ReviewRegister::Commerce => {
                "You are a senior e-commerce art director. Compare the two attached \
                 product images: the first won the internal ranking, the second placed \
                 last. Judge them as storefront hero-image material."
            }
        };

        format!(
            "{persona}\n\n{}\n{}\n\
             Using only the scores above:\n\
             1. Attribute the winner's advantage to the specific dimensions where it \
             leads, quoting the numeric difference for each.\n\
             2. Name the runner-up's weakest dimension.\n\
             3. Close with a one-sentence verdict.\n\
             Respond with strict JSON only:\n\
             {{\"title\": \"<short headline>\", \"analysis\": \"<the comparison>\", \
             \"key_difference\": \"<one or two decisive terms>\"}}",
            Self::score_block("winner", best),
            Self::score_block("runner-up", worst),
        )
    }

    /// Enforce the structured-output contract: all three fields present and
    /// non-empty, nothing invented on the caller's behalf.
    fn parse_review(value: &Value) -> Option<ComparativeReview> {
        let field = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };
        Some(ComparativeReview {
            title: field("title")?,
            analysis: field("analysis")?,
            key_difference: field("key_difference")?,
        })
    }
}
