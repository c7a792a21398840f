use crate::error::OracleError;
use crate::model::ImageRef;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;

pub mod client;

pub use client::VisionOracle;

/// One native dimension entry as the oracle reported it, on the oracle's own
/// 1-10 scale and under the oracle's own label.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleDimension {
    pub score: f64,
    pub comment: Option<String>,
}

/// Raw per-dimension scorecard for a single image. Label mapping and scale
/// normalization happen in the scoring layer, not here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OracleScorecard {
    pub entries: BTreeMap<String, OracleDimension>,
}

impl OracleScorecard {
    /// Accepts both entry shapes the oracle is known to emit:
    /// `{"label": {"score": 8, "comment": "..."}}` and `{"label": 8}`.
    pub fn from_value(value: &Value) -> Result<Self, OracleError> {
        let object = value
            .as_object()
            .ok_or_else(|| OracleError::Malformed("scorecard is not a JSON object".into()))?;

        let mut entries = BTreeMap::new();
        for (label, entry) in object {
            match entry {
                Value::Object(fields) => {
                    let Some(score) = fields.get("score").and_then(Value::as_f64) else {
                        continue;
                    };
                    let comment = fields
                        .get("comment")
                        .and_then(Value::as_str)
                        .map(str::trim)
                        .filter(|c| !c.is_empty())
                        .map(String::from);
                    entries.insert(label.clone(), OracleDimension { score, comment });
                }
                Value::Number(_) => {
                    if let Some(score) = entry.as_f64() {
                        entries.insert(
                            label.clone(),
                            OracleDimension {
                                score,
                                comment: None,
                            },
                        );
                    }
                }
                _ => {}
            }
        }

        if entries.is_empty() {
            return Err(OracleError::Malformed(
                "scorecard carried no numeric dimensions".into(),
            ));
        }
        Ok(Self { entries })
    }
}

/// Consistency verdict for one candidate, already normalized to [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct OracleConsistency {
    pub score: f64,
    pub comment: Option<String>,
}

/// The external vision-capable judgment service. Everything downstream of
/// the orchestrator talks to this trait so tests can swap in fakes.
#[async_trait]
pub trait OracleApi: Send + Sync {
    /// Per-dimension aesthetic scorecard for one image.
    async fn score(&self, image: &ImageRef, prompt: &str) -> Result<OracleScorecard, OracleError>;

    /// Free-form structured comparison over the given images; the caller
    /// supplies the instruction text and validates the returned JSON.
    async fn compare(&self, images: &[ImageRef], instructions: &str)
    -> Result<Value, OracleError>;

    /// Subject-consistency judgment of one candidate against the reference
    /// set. One call per candidate; candidates are never batched together.
    async fn verify_consistency(
        &self,
        references: &[ImageRef],
        candidate: &ImageRef,
    ) -> Result<OracleConsistency, OracleError>;
}
