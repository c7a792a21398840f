use crate::config::ConsistencyThresholds;
use crate::scoring::{Dimension, ScoringWeights};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

// ─── Image references ───────────────────────────────────────────────────────

/// One generated or reference image, either remote or inline-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageRef {
    Url { url: String },
    Inline { media_type: String, data: String },
}

impl ImageRef {
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url { url: url.into() }
    }

    pub fn inline(media_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self::Inline {
            media_type: media_type.into(),
            data: data.into(),
        }
    }

    /// Parse a `data:<media>;base64,<payload>` URI. Anything else is `None`.
    pub fn from_data_uri(uri: &str) -> Option<Self> {
        let rest = uri.strip_prefix("data:")?;
        let (header, data) = rest.split_once(',')?;
        if data.is_empty() {
            return None;
        }
        let media_type = header.strip_suffix(";base64").unwrap_or(header);
        let media_type = if media_type.is_empty() {
            "image/png"
        } else {
            media_type
        };
        Some(Self::inline(media_type, data))
    }

    /// String form accepted by vision APIs: the URL itself, or a data URI.
    pub fn as_request_url(&self) -> String {
        match self {
            Self::Url { url } => url.clone(),
            Self::Inline { media_type, data } => format!("data:{media_type};base64,{data}"),
        }
    }

    /// Truncated form for logs; inline payloads are megabytes of base64.
    pub fn short(&self) -> String {
        match self {
            Self::Url { url } => match url.char_indices().nth(96) {
                Some((index, _)) => format!("{}...", &url[..index]),
                None => url.clone(),
            },
            Self::Inline { media_type, data } => {
                format!("inline:{media_type} ({} bytes b64)", data.len())
            }
        }
    }
}

// ─── Aspect ratios ──────────────────────────────────────────────────────────

/// Supported target ratios, each mapping to a concrete pixel size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "3:4")]
    Portrait,
    #[serde(rename = "4:3")]
    Landscape,
    #[serde(rename = "9:16")]
    Tall,
    #[serde(rename = "16:9")]
    Wide,
}

impl AspectRatio {
    pub fn size(self) -> &'static str {
        match self {
            Self::Square => "2048x2048",
            Self::Portrait => "1728x2304",
            Self::Landscape => "2304x1728",
            Self::Tall => "1440x2560",
            Self::Wide => "2560x1440",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "1:1" => Some(Self::Square),
            "3:4" => Some(Self::Portrait),
            "4:3" => Some(Self::Landscape),
            "9:16" => Some(Self::Tall),
            "16:9" => Some(Self::Wide),
            _ => None,
        }
    }
}

// ─── Requests ───────────────────────────────────────────────────────────────

/// One creative brief. Immutable once submitted to the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,

    /// Ordered reference images; required for the reference-bound pipeline.
    #[serde(default)]
    pub reference_images: Vec<ImageRef>,

    #[serde(default)]
    pub ratio: AspectRatio,

    /// Providers to fan out to.
    pub providers: Vec<String>,

    /// Candidates requested per provider.
    #[serde(default = "default_candidate_count")]
    pub candidate_count: usize,

    /// Free-form provider-specific parameters, passed through untouched.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub provider_params: serde_json::Value,
}

fn default_candidate_count() -> usize {
    1
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, providers: Vec<String>) -> Self {
        Self {
            prompt: prompt.into(),
            reference_images: Vec::new(),
            ratio: AspectRatio::default(),
            providers,
            candidate_count: default_candidate_count(),
            provider_params: serde_json::Value::Null,
        }
    }

    pub fn with_references(mut self, references: Vec<ImageRef>) -> Self {
        self.reference_images = references;
        self
    }

    pub fn with_candidate_count(mut self, count: usize) -> Self {
        self.candidate_count = count;
        self
    }

    pub fn with_ratio(mut self, ratio: AspectRatio) -> Self {
        self.ratio = ratio;
        self
    }
}

// ─── Candidates ─────────────────────────────────────────────────────────────

/// One generated image plus its scoring and consistency state. Created when
/// a provider call returns; only ever mutated to attach results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: Uuid,
    pub provider: String,
    pub image: ImageRef,

    /// Position within an ordered multi-image burst, when the provider
    /// emitted one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence_index: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_size: Option<usize>,

    /// Order in which this candidate entered the run's candidate list; the
    /// final tie-breaker in selection.
    pub submission_order: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scoring: Option<ScoringResult>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistency: Option<ConsistencyResult>,
}

impl Candidate {
    pub fn new(provider: impl Into<String>, image: ImageRef, submission_order: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider: provider.into(),
            image,
            sequence_index: None,
            group_size: None,
            submission_order,
            scoring: None,
            consistency: None,
        }
    }

    pub fn composite(&self) -> Option<f64> {
        self.scoring.as_ref().map(|s| s.composite)
    }

    pub fn consistency_score(&self) -> Option<f64> {
        self.consistency.as_ref().map(|c| c.score)
    }
}

// ─── Scoring results ────────────────────────────────────────────────────────

/// Normalized multi-dimension verdict for one candidate. The composite value
/// is always derived from the dimension map through [`ScoringWeights`]; there
/// is no constructor that accepts it directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    pub scores: BTreeMap<Dimension, f64>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub comments: BTreeMap<Dimension, String>,

    pub composite: f64,
}

impl ScoringResult {
    pub fn from_dimensions(
        scores: BTreeMap<Dimension, f64>,
        comments: BTreeMap<Dimension, String>,
        weights: &ScoringWeights,
    ) -> Self {
        let composite = weights.composite(&scores);
        Self {
            scores,
            comments,
            composite,
        }
    }

    pub fn score(&self, dimension: Dimension) -> Option<f64> {
        self.scores.get(&dimension).copied()
    }

    /// Score on the 0-10 display scale used in reviews and summaries.
    pub fn display_score(&self, dimension: Dimension) -> f64 {
        self.score(dimension).unwrap_or(0.0) * 10.0
    }
}

// ─── Consistency results ────────────────────────────────────────────────────

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConsistencyStatus {
    Consistent,
    Uncertain,
    Inconsistent,
}

impl ConsistencyStatus {
    pub fn from_score(score: f64, thresholds: &ConsistencyThresholds) -> Self {
        if score >= thresholds.consistent {
            Self::Consistent
        } else if score >= thresholds.uncertain {
            Self::Uncertain
        } else {
            Self::Inconsistent
        }
    }
}

/// Subject-consistency verdict for one candidate against the reference set.
/// Produced at most once per candidate per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyResult {
    pub score: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    pub status: ConsistencyStatus,
}

impl ConsistencyResult {
    pub fn from_score(
        score: f64,
        comment: Option<String>,
        thresholds: &ConsistencyThresholds,
    ) -> Self {
        let score = score.clamp(0.0, 1.0);
        Self {
            score,
            comment,
            status: ConsistencyStatus::from_score(score, thresholds),
        }
    }
}

// ─── Comparative reviews ────────────────────────────────────────────────────

/// Oracle-written contrast between the best and worst scored candidates.
/// Exists only when a run produced at least two scored candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparativeReview {
    pub title: String,
    pub analysis: String,
    pub key_difference: String,
}

// ─── Run results ────────────────────────────────────────────────────────────

/// Terminal output of one pipeline run. Immutable once handed to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRunResult {
    pub run_id: Uuid,
    pub request: GenerationRequest,

    pub best_image: ImageRef,
    pub best_provider: String,
    pub best_composite: f64,

    /// Every candidate the run produced, scored or not, for transparency.
    pub candidates: Vec<Candidate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub review: Option<ComparativeReview>,

    /// Providers that actually returned a usable image, sorted.
    pub providers_used: Vec<String>,

    pub summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_round_trip() {
        let parsed = ImageRef::from_data_uri("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(parsed, ImageRef::inline("image/png", "aGVsbG8="));
        assert_eq!(
            parsed.as_request_url(),
            "data:image/png;base64,aGVsbG8="
        );
    }

    #[test]
    fn data_uri_rejects_garbage() {
        assert!(ImageRef::from_data_uri("https://example.com/a.png").is_none());
        assert!(ImageRef::from_data_uri("data:image/png;base64,").is_none());
    }

    #[test]
    fn ratio_maps_to_concrete_sizes() {
        assert_eq!(AspectRatio::Square.size(), "2048x2048");
        assert_eq!(AspectRatio::Wide.size(), "2560x1440");
        assert_eq!(AspectRatio::parse("9:16"), Some(AspectRatio::Tall));
        assert_eq!(AspectRatio::parse("2:3"), None);
    }

    #[test]
    fn composite_is_derived_not_stored() {
        let weights = ScoringWeights::default();
        let scores: BTreeMap<Dimension, f64> = [
            (Dimension::StructuralIntegrity, 0.8),
            (Dimension::PromptFidelity, 0.8),
            (Dimension::AestheticAppeal, 0.8),
            (Dimension::Cleanliness, 0.8),
        ]
        .into_iter()
        .collect();
        let result = ScoringResult::from_dimensions(scores.clone(), BTreeMap::new(), &weights);
        assert!((result.composite - weights.composite(&scores)).abs() < f64::EPSILON);
        assert!((0.0..=1.0).contains(&result.composite));
    }

    #[test]
    fn consistency_thresholds_map_to_statuses() {
        let thresholds = ConsistencyThresholds::default();
        assert_eq!(
            ConsistencyStatus::from_score(0.85, &thresholds),
            ConsistencyStatus::Consistent
        );
        assert_eq!(
            ConsistencyStatus::from_score(0.65, &thresholds),
            ConsistencyStatus::Uncertain
        );
        assert_eq!(
            ConsistencyStatus::from_score(0.2, &thresholds),
            ConsistencyStatus::Inconsistent
        );
    }

    #[test]
    fn consistency_result_clamps_score() {
        let thresholds = ConsistencyThresholds::default();
        let result = ConsistencyResult::from_score(1.4, None, &thresholds);
        assert!((result.score - 1.0).abs() < f64::EPSILON);
        assert_eq!(result.status, ConsistencyStatus::Consistent);
    }

    #[test]
    fn scoring_result_serializes_snake_case_keys() {
        let weights = ScoringWeights::default();
        let scores: BTreeMap<Dimension, f64> =
            [(Dimension::AestheticAppeal, 0.7)].into_iter().collect();
        let result = ScoringResult::from_dimensions(scores, BTreeMap::new(), &weights);
        let json = serde_json::to_value(&result).unwrap();
        assert!(json["scores"].get("aesthetic_appeal").is_some());
    }
}
