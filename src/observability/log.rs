use super::traits::{Observer, ObserverEvent};

/// Default backend: structured tracing lines, one per event.
pub struct LogObserver;

impl LogObserver {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl Observer for LogObserver {
    fn name(&self) -> &'static str {
        "log"
    }

    fn record_event(&self, event: &ObserverEvent) {
        match event {
            ObserverEvent::CallAttempt {
                run_id,
                kind,
                target,
                outcome,
                elapsed_ms,
            } => {
                tracing::info!(
                    run_id = %run_id,
                    kind = ?kind,
                    target = target.as_str(),
                    outcome = ?outcome,
                    elapsed_ms,
                    "external call attempt"
                );
            }
            ObserverEvent::RunCompleted {
                run_id,
                candidates,
                scored,
                degraded_calls,
                best_provider,
                elapsed_ms,
            } => {
                tracing::info!(
                    run_id = %run_id,
                    candidates,
                    scored,
                    degraded_calls,
                    best_provider = best_provider.as_str(),
                    elapsed_ms,
                    "pipeline run completed"
                );
            }
            ObserverEvent::RunFailed {
                run_id,
                reason,
                elapsed_ms,
            } => {
                tracing::warn!(
                    run_id = %run_id,
                    reason = reason.as_str(),
                    elapsed_ms,
                    "pipeline run failed"
                );
            }
        }
    }
}
