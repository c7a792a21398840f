use serde::Serialize;
use uuid::Uuid;

/// External dependency class a call attempt hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    Generation,
    Scoring,
    Consistency,
    Review,
}

/// A timed-out call is reported distinctly but treated exactly like a
/// failure by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    Succeeded,
    Failed,
    TimedOut,
}

/// One structured event per external call attempt plus one summary per
/// completed run, consumed by an append-only sink outside this crate.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ObserverEvent {
    CallAttempt {
        run_id: Uuid,
        kind: CallKind,
        target: String,
        outcome: CallOutcome,
        elapsed_ms: u64,
    },
    RunCompleted {
        run_id: Uuid,
        candidates: usize,
        scored: usize,
        degraded_calls: usize,
        best_provider: String,
        elapsed_ms: u64,
    },
    RunFailed {
        run_id: Uuid,
        reason: String,
        elapsed_ms: u64,
    },
}

pub trait Observer: Send + Sync {
    fn name(&self) -> &'static str;

    fn record_event(&self, event: &ObserverEvent);

    fn flush(&self) {}
}
