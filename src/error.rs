use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `bestshot`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; internal code continues to use
/// `anyhow::Result` for ad-hoc context chains inside provider adapters.
#[derive(Debug, Error)]
pub enum BestshotError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Generation providers ────────────────────────────────────────────
    #[error("provider: {0}")]
    Provider(#[from] ProviderError),

    // ── Scoring oracle ──────────────────────────────────────────────────
    #[error("oracle: {0}")]
    Oracle(#[from] OracleError),

    // ── Scoring aggregation ─────────────────────────────────────────────
    #[error("scoring: {0}")]
    Scoring(#[from] ScoringError),

    // ── Pipeline runs ───────────────────────────────────────────────────
    #[error("pipeline: {0}")]
    Pipeline(#[from] PipelineError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Generation provider errors ─────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {name}")]
    Unknown { name: String },

    #[error("provider {provider} generation failed: {message}")]
    Generation { provider: String, message: String },

    #[error("provider {provider} returned no usable image")]
    EmptyResponse { provider: String },
}

// ─── Scoring oracle errors ──────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle request failed: {0}")]
    Request(String),

    #[error("oracle returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("oracle response malformed: {0}")]
    Malformed(String),

    #[error("oracle gave up after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

// ─── Scoring aggregation errors ─────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("scorer {scorer} failed: {message}")]
    Scorer { scorer: String, message: String },

    #[error("scorer {scorer} produced no dimensions")]
    Empty { scorer: String },

    #[error("all scorers failed. Attempts:\n{0}")]
    AllScorersFailed(String),
}

// ─── Pipeline run errors ────────────────────────────────────────────────────

/// The only error kinds that abort a run. Anything that goes wrong inside a
/// single provider/scoring/consistency/review call degrades the result
/// instead of surfacing here.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("no provider returned a usable candidate")]
    NoCandidates,

    #[error("candidates were generated but none passed the scoring and consistency gates")]
    NoEligibleCandidate,

    #[error("run was cancelled")]
    Cancelled,
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, BestshotError>;
