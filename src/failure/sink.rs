use tracing::warn;

use super::HandlerFailure;

/// Receives failures caught while fanning a payload out to subscribers.
///
/// Sinks are called synchronously from inside `publish`, after the failing
/// handler returned and before the next handler runs, so they should be
/// cheap. A sink that panics is contained as well and only logged.
pub trait FailureSink: Send + Sync {
    fn on_failure(&self, failure: &HandlerFailure);
}

impl<F> FailureSink for F
where
    F: Fn(&HandlerFailure) + Send + Sync,
{
    fn on_failure(&self, failure: &HandlerFailure) {
        self(failure)
    }
}

/// Default sink: one `tracing` warning per failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFailures;

impl FailureSink for LogFailures {
    fn on_failure(&self, failure: &HandlerFailure) {
        warn!(
            topic = %failure.topic,
            subscription = %failure.subscription,
            kind = %failure.kind,
            "subscriber failed: {}",
            failure.message
        );
    }
}
