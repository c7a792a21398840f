use super::PipelineMode;
use crate::config::{ConcurrencyConfig, Config};
use crate::consistency::ConsistencyVerifier;
use crate::error::PipelineError;
use crate::model::{Candidate, ConsistencyResult, GenerationRequest, PipelineRunResult,
    ScoringResult};
use crate::observability::{CallKind, CallOutcome, Observer, ObserverEvent, create_observer};
use crate::oracle::{OracleApi, VisionOracle};
use crate::providers::{GenerateContext, ProviderRegistry};
use crate::review::{ReviewGenerator, ReviewRegister};
use crate::scoring::{LocalAestheticScorer, OracleScorer, Scorer, ScoringAggregator};
use crate::selector::CandidateSelector;
use futures_util::future::join_all;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Providers may burst this many images from a single call; anything above
/// is clamped before dispatch.
const MAX_CANDIDATES_PER_PROVIDER: usize = 15;

/// Top-level state machine: generation → scoring → (consistency) →
/// selection → review. Owns the fan-out concurrency, per-call deadlines and
/// the partial-failure policy; individual call failures degrade the result
/// and only the typed fatal conditions abort a run.
pub struct PipelineOrchestrator {
    registry: Arc<ProviderRegistry>,
    aggregator: Arc<ScoringAggregator>,
    verifier: Arc<ConsistencyVerifier>,
    reviewer: Arc<ReviewGenerator>,
    selector: CandidateSelector,
    observer: Arc<dyn Observer>,
    limits: ConcurrencyConfig,
}

impl PipelineOrchestrator {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        aggregator: Arc<ScoringAggregator>,
        verifier: Arc<ConsistencyVerifier>,
        reviewer: Arc<ReviewGenerator>,
        observer: Arc<dyn Observer>,
        limits: ConcurrencyConfig,
    ) -> Self {
        Self {
            registry,
            aggregator,
            verifier,
            reviewer,
            selector: CandidateSelector::new(),
            observer,
            limits,
        }
    }

    /// Wire the full default stack from config: vision oracle behind the
    /// scorer chain, built-in provider registry, configured observer.
    pub fn from_config(config: &Config) -> Self {
        let oracle: Arc<dyn OracleApi> = Arc::new(VisionOracle::new(&config.oracle));

        let mut scorers: Vec<Arc<dyn Scorer>> = vec![Arc::new(OracleScorer::new(oracle.clone()))];
        if config.scoring.local_fallback {
            scorers.push(Arc::new(LocalAestheticScorer::new()));
        }

        Self::new(
            Arc::new(ProviderRegistry::with_builtins(config.api_key.as_deref())),
            Arc::new(ScoringAggregator::new(scorers, config.scoring.weights)),
            Arc::new(ConsistencyVerifier::new(oracle.clone(), config.consistency)),
            Arc::new(ReviewGenerator::new(oracle)),
            create_observer(&config.observability),
            config.concurrency,
        )
    }

    /// Open pipeline: no reference subject required.
    pub async fn run_open(
        &self,
        request: GenerationRequest,
    ) -> Result<PipelineRunResult, PipelineError> {
        self.run(request, PipelineMode::Open, CancellationToken::new())
            .await
    }

    /// Reference-bound pipeline: every candidate is additionally verified
    /// against the reference subject before selection.
    pub async fn run_with_reference(
        &self,
        request: GenerationRequest,
    ) -> Result<PipelineRunResult, PipelineError> {
        self.run(request, PipelineMode::ReferenceBound, CancellationToken::new())
            .await
    }

    /// Cancellable entry point. Once cancellation is observed no further
    /// external calls are issued and the run yields no result.
    pub async fn run_cancellable(
        &self,
        request: GenerationRequest,
        mode: PipelineMode,
        cancel: CancellationToken,
    ) -> Result<PipelineRunResult, PipelineError> {
        self.run(request, mode, cancel).await
    }

    async fn run(
        &self,
        request: GenerationRequest,
        mode: PipelineMode,
        cancel: CancellationToken,
    ) -> Result<PipelineRunResult, PipelineError> {
        let run_id = Uuid::new_v4();
        let started = Instant::now();

        let result = self.run_inner(run_id, request, mode, &cancel).await;

        let elapsed_ms = elapsed_ms(started);
        match &result {
            Ok(outcome) => {
                self.observer.record_event(&ObserverEvent::RunCompleted {
                    run_id,
                    candidates: outcome.candidates.len(),
                    scored: outcome
                        .candidates
                        .iter()
                        .filter(|c| c.scoring.is_some())
                        .count(),
                    degraded_calls: outcome.degraded_calls,
                    best_provider: outcome.result.best_provider.clone(),
                    elapsed_ms,
                });
            }
            Err(error) => {
                self.observer.record_event(&ObserverEvent::RunFailed {
                    run_id,
                    reason: error.to_string(),
                    elapsed_ms,
                });
            }
        }

        result.map(|outcome| outcome.result)
    }

    async fn run_inner(
        &self,
        run_id: Uuid,
        request: GenerationRequest,
        mode: PipelineMode,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, PipelineError> {
        validate(&request, mode)?;

        let degraded = AtomicUsize::new(0);

        // ── Generation fan-out ───────────────────────────────────────────
        let mut candidates = self
            .generate_candidates(run_id, &request, cancel, &degraded)
            .await?;
        if candidates.is_empty() {
            return Err(PipelineError::NoCandidates);
        }

        // ── Scoring fan-out, one bounded call per candidate ──────────────
        self.score_candidates(run_id, &request.prompt, &mut candidates, cancel, &degraded)
            .await?;

        // ── Consistency fan-out over scored candidates ───────────────────
        if mode == PipelineMode::ReferenceBound {
            self.verify_candidates(
                run_id,
                &request.reference_images,
                &mut candidates,
                cancel,
                &degraded,
            )
            .await?;
        }

        // ── Selection ────────────────────────────────────────────────────
        let best_index = self.selector.select(&candidates, mode)?;
        let best = candidates[best_index].clone();

        // ── Comparative review over the eligible extremes ────────────────
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        let review = self
            .generate_review(run_id, &candidates, mode, &degraded)
            .await;

        // ── Assembly ─────────────────────────────────────────────────────
        let providers_used: Vec<String> = candidates
            .iter()
            .map(|c| c.provider.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if mode == PipelineMode::ReferenceBound {
            order_for_display(&mut candidates, best.id);
        }

        let summary = build_summary(&best);
        let result = PipelineRunResult {
            run_id,
            best_image: best.image.clone(),
            best_provider: best.provider.clone(),
            best_composite: best.composite().unwrap_or(0.0),
            candidates: candidates.clone(),
            review,
            providers_used,
            summary,
            request,
        };

        Ok(RunOutcome {
            result,
            candidates,
            degraded_calls: degraded.load(Ordering::SeqCst),
        })
    }

    async fn generate_candidates(
        &self,
        run_id: Uuid,
        request: &GenerationRequest,
        cancel: &CancellationToken,
        degraded: &AtomicUsize,
    ) -> Result<Vec<Candidate>, PipelineError> {
        let context = GenerateContext {
            prompt: request.prompt.clone(),
            references: request.reference_images.clone(),
            size: request.ratio.size().to_string(),
            count: request.candidate_count.clamp(1, MAX_CANDIDATES_PER_PROVIDER),
            params: request.provider_params.clone(),
        };
        let semaphore = Arc::new(Semaphore::new(self.limits.generation_parallelism));
        let timeout = Duration::from_secs(self.limits.generation_timeout_secs);

        let calls = request
            .providers
            .iter()
            .filter(|p| !p.is_empty())
            .map(|provider_id| {
                self.generate_one(
                    run_id,
                    provider_id,
                    &context,
                    &semaphore,
                    timeout,
                    cancel,
                    degraded,
                )
            });

        let batches = tokio::select! {
            () = cancel.cancelled() => return Err(PipelineError::Cancelled),
            batches = join_all(calls) => batches,
        };

        // join_all preserves provider request order, so submission order is
        // provider order first, burst order within a provider.
        let mut candidates = Vec::new();
        for (provider_id, images) in batches {
            for image in images {
                let mut candidate = Candidate::new(&provider_id, image.image, candidates.len());
                candidate.sequence_index = image.sequence_index;
                candidate.group_size = image.group_size;
                candidates.push(candidate);
            }
        }
        Ok(candidates)
    }

    #[allow(clippy::too_many_arguments)]
    async fn generate_one(
        &self,
        run_id: Uuid,
        provider_id: &str,
        context: &GenerateContext,
        semaphore: &Semaphore,
        timeout: Duration,
        cancel: &CancellationToken,
        degraded: &AtomicUsize,
    ) -> (String, Vec<crate::providers::ProviderImage>) {
        let none = (provider_id.to_string(), Vec::new());

        let Ok(_permit) = semaphore.acquire().await else {
            return none;
        };
        if cancel.is_cancelled() {
            return none;
        }

        let Some(provider) = self.registry.get(provider_id) else {
            tracing::warn!(provider = provider_id, "requested provider is not registered");
            degraded.fetch_add(1, Ordering::SeqCst);
            self.record_call(
                run_id,
                CallKind::Generation,
                provider_id,
                CallOutcome::Failed,
                0,
            );
            return none;
        };

        let started = Instant::now();
        match tokio::time::timeout(timeout, provider.generate(context)).await {
            Ok(Ok(images)) if !images.is_empty() => {
                self.record_call(
                    run_id,
                    CallKind::Generation,
                    provider_id,
                    CallOutcome::Succeeded,
                    elapsed_ms(started),
                );
                (provider_id.to_string(), images)
            }
            Ok(Ok(_)) => {
                tracing::warn!(provider = provider_id, "provider returned no usable image");
                degraded.fetch_add(1, Ordering::SeqCst);
                self.record_call(
                    run_id,
                    CallKind::Generation,
                    provider_id,
                    CallOutcome::Failed,
                    elapsed_ms(started),
                );
                none
            }
            Ok(Err(error)) => {
                tracing::warn!(provider = provider_id, "generation failed: {error}");
                degraded.fetch_add(1, Ordering::SeqCst);
                self.record_call(
                    run_id,
                    CallKind::Generation,
                    provider_id,
                    CallOutcome::Failed,
                    elapsed_ms(started),
                );
                none
            }
            Err(_) => {
                tracing::warn!(
                    provider = provider_id,
                    timeout_secs = timeout.as_secs(),
                    "generation timed out"
                );
                degraded.fetch_add(1, Ordering::SeqCst);
                self.record_call(
                    run_id,
                    CallKind::Generation,
                    provider_id,
                    CallOutcome::TimedOut,
                    elapsed_ms(started),
                );
                none
            }
        }
    }

    async fn score_candidates(
        &self,
        run_id: Uuid,
        prompt: &str,
        candidates: &mut [Candidate],
        cancel: &CancellationToken,
        degraded: &AtomicUsize,
    ) -> Result<(), PipelineError> {
        let semaphore = Arc::new(Semaphore::new(self.limits.scoring_parallelism));
        let timeout = Duration::from_secs(self.limits.scoring_timeout_secs);

        let calls = candidates.iter().map(|candidate| {
            self.score_one(run_id, candidate, prompt, &semaphore, timeout, cancel, degraded)
        });

        let results = tokio::select! {
            () = cancel.cancelled() => return Err(PipelineError::Cancelled),
            results = join_all(calls) => results,
        };

        for (candidate, scoring) in candidates.iter_mut().zip(results) {
            candidate.scoring = scoring;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn score_one(
        &self,
        run_id: Uuid,
        candidate: &Candidate,
        prompt: &str,
        semaphore: &Semaphore,
        timeout: Duration,
        cancel: &CancellationToken,
        degraded: &AtomicUsize,
    ) -> Option<ScoringResult> {
        let Ok(_permit) = semaphore.acquire().await else {
            return None;
        };
        if cancel.is_cancelled() {
            return None;
        }

        let target = candidate.id.to_string();
        let started = Instant::now();
        match tokio::time::timeout(
            timeout,
            self.aggregator.score_candidate(&candidate.image, prompt),
        )
        .await
        {
            Ok(Ok(result)) => {
                self.record_call(
                    run_id,
                    CallKind::Scoring,
                    &target,
                    CallOutcome::Succeeded,
                    elapsed_ms(started),
                );
                Some(result)
            }
            Ok(Err(error)) => {
                tracing::warn!(
                    candidate = %candidate.id,
                    provider = candidate.provider.as_str(),
                    "scoring failed, candidate excluded from selection: {error}"
                );
                degraded.fetch_add(1, Ordering::SeqCst);
                self.record_call(
                    run_id,
                    CallKind::Scoring,
                    &target,
                    CallOutcome::Failed,
                    elapsed_ms(started),
                );
                None
            }
            Err(_) => {
                tracing::warn!(
                    candidate = %candidate.id,
                    timeout_secs = timeout.as_secs(),
                    "scoring timed out"
                );
                degraded.fetch_add(1, Ordering::SeqCst);
                self.record_call(
                    run_id,
                    CallKind::Scoring,
                    &target,
                    CallOutcome::TimedOut,
                    elapsed_ms(started),
                );
                None
            }
        }
    }

    async fn verify_candidates(
        &self,
        run_id: Uuid,
        references: &[crate::model::ImageRef],
        candidates: &mut [Candidate],
        cancel: &CancellationToken,
        degraded: &AtomicUsize,
    ) -> Result<(), PipelineError> {
        let semaphore = Arc::new(Semaphore::new(self.limits.scoring_parallelism));
        let timeout = Duration::from_secs(self.limits.scoring_timeout_secs);

        let calls = candidates.iter().map(|candidate| {
            self.verify_one(run_id, references, candidate, &semaphore, timeout, cancel, degraded)
        });

        let results = tokio::select! {
            () = cancel.cancelled() => return Err(PipelineError::Cancelled),
            results = join_all(calls) => results,
        };

        for (candidate, verdict) in candidates.iter_mut().zip(results) {
            candidate.consistency = verdict;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn verify_one(
        &self,
        run_id: Uuid,
        references: &[crate::model::ImageRef],
        candidate: &Candidate,
        semaphore: &Semaphore,
        timeout: Duration,
        cancel: &CancellationToken,
        degraded: &AtomicUsize,
    ) -> Option<ConsistencyResult> {
        // Only successfully scored candidates are worth a consistency call;
        // unscored ones are already ineligible.
        candidate.scoring.as_ref()?;

        let Ok(_permit) = semaphore.acquire().await else {
            return None;
        };
        if cancel.is_cancelled() {
            return None;
        }

        let target = candidate.id.to_string();
        let started = Instant::now();
        match tokio::time::timeout(
            timeout,
            self.verifier.verify(references, &candidate.image),
        )
        .await
        {
            Ok(Ok(result)) => {
                self.record_call(
                    run_id,
                    CallKind::Consistency,
                    &target,
                    CallOutcome::Succeeded,
                    elapsed_ms(started),
                );
                Some(result)
            }
            Ok(Err(error)) => {
                tracing::warn!(
                    candidate = %candidate.id,
                    "consistency check failed, candidate left unverified: {error}"
                );
                degraded.fetch_add(1, Ordering::SeqCst);
                self.record_call(
                    run_id,
                    CallKind::Consistency,
                    &target,
                    CallOutcome::Failed,
                    elapsed_ms(started),
                );
                None
            }
            Err(_) => {
                tracing::warn!(candidate = %candidate.id, "consistency check timed out");
                degraded.fetch_add(1, Ordering::SeqCst);
                self.record_call(
                    run_id,
                    CallKind::Consistency,
                    &target,
                    CallOutcome::TimedOut,
                    elapsed_ms(started),
                );
                None
            }
        }
    }

    async fn generate_review(
        &self,
        run_id: Uuid,
        candidates: &[Candidate],
        mode: PipelineMode,
        degraded: &AtomicUsize,
    ) -> Option<crate::model::ComparativeReview> {
        let mut eligible: Vec<&Candidate> = candidates
            .iter()
            .filter(|candidate| CandidateSelector::is_eligible(candidate, mode))
            .collect();
        if eligible.len() < 2 {
            return None;
        }
        eligible.sort_by(|a, b| CandidateSelector::selection_ordering(a, b));
        let best = eligible[0];
        let worst = eligible[eligible.len() - 1];

        let register = match mode {
            PipelineMode::Open => ReviewRegister::General,
            PipelineMode::ReferenceBound => ReviewRegister::Commerce,
        };

        let started = Instant::now();
        let timeout = Duration::from_secs(self.limits.scoring_timeout_secs);
        let review = match tokio::time::timeout(
            timeout,
            self.reviewer.compare(best, worst, register),
        )
        .await
        {
            Ok(review) => review,
            Err(_) => {
                tracing::warn!("comparative review timed out");
                None
            }
        };

        let outcome = if review.is_some() {
            CallOutcome::Succeeded
        } else {
            degraded.fetch_add(1, Ordering::SeqCst);
            CallOutcome::Failed
        };
        self.record_call(
            run_id,
            CallKind::Review,
            "comparative_review",
            outcome,
            elapsed_ms(started),
        );
        review
    }

    fn record_call(
        &self,
        run_id: Uuid,
        kind: CallKind,
        target: &str,
        outcome: CallOutcome,
        elapsed_ms: u64,
    ) {
        self.observer.record_event(&ObserverEvent::CallAttempt {
            run_id,
            kind,
            target: target.to_string(),
            outcome,
            elapsed_ms,
        });
    }
}

struct RunOutcome {
    result: PipelineRunResult,
    candidates: Vec<Candidate>,
    degraded_calls: usize,
}

fn validate(request: &GenerationRequest, mode: PipelineMode) -> Result<(), PipelineError> {
    if request.prompt.trim().is_empty() {
        return Err(PipelineError::Validation("prompt must not be empty".into()));
    }
    if !request.providers.iter().any(|p| !p.is_empty()) {
        return Err(PipelineError::Validation(
            "at least one provider must be requested".into(),
        ));
    }
    if mode == PipelineMode::ReferenceBound && request.reference_images.is_empty() {
        return Err(PipelineError::Validation(
            "a reference-bound run requires at least one reference image".into(),
        ));
    }
    Ok(())
}

/// Display order for reference-bound results: the selected candidate first,
/// the rest by composite descending with submission order breaking ties.
fn order_for_display(candidates: &mut [Candidate], best_id: Uuid) {
    candidates.sort_by(|a, b| {
        if a.id == best_id {
            return std::cmp::Ordering::Less;
        }
        if b.id == best_id {
            return std::cmp::Ordering::Greater;
        }
        b.composite()
            .unwrap_or(0.0)
            .total_cmp(&a.composite().unwrap_or(0.0))
            .then(a.submission_order.cmp(&b.submission_order))
    });
}

/// Human-readable line about the winning candidate, built from its comments
/// or its standout dimensions.
fn build_summary(best: &Candidate) -> String {
    let Some(scoring) = &best.scoring else {
        return "Generation finished.".into();
    };

    let mut parts: Vec<String> = scoring
        .comments
        .iter()
        .map(|(dimension, comment)| format!("{}: {comment}", dimension.label()))
        .collect();

    if parts.is_empty() {
        let strong: Vec<&str> = scoring
            .scores
            .iter()
            .filter(|(_, score)| **score >= 0.8)
            .map(|(dimension, _)| dimension.label())
            .collect();
        if strong.is_empty() {
            parts.push("balanced across all scored dimensions".into());
        } else {
            parts.push(format!("strongest dimensions: {}", strong.join(", ")));
        }
    }

    parts.push(format!(
        "composite score {:.1}/10",
        scoring.composite * 10.0
    ));

    if let Some(consistency) = &best.consistency {
        parts.push(format!(
            "subject consistency {} ({:.2})",
            consistency.status, consistency.score
        ));
    }

    let mut summary = parts.join("; ");
    summary.push('.');
    summary
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
