use super::traits::{Observer, ObserverEvent};

pub struct NoopObserver;

impl Observer for NoopObserver {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn record_event(&self, _event: &ObserverEvent) {}
}
