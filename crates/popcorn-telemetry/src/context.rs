//! Span and task-local context helpers.
//!
//! # Design
//! - The application span carries the run mode and build SHA for every record.
//! - Load attempts run inside a task-local context so nested calls can tag logs.

use std::future::Future;

use tracing::{Span, span::Entered};

use crate::init::build_sha;

/// Guard that keeps the application-level span entered for the lifetime of the process.
pub struct GlobalContextGuard {
    _guard: Entered<'static>,
}

impl GlobalContextGuard {
    /// Enter the application-level tracing span for the lifetime of the guard.
    #[must_use]
    pub fn new(mode: impl Into<String>) -> Self {
        let mode = mode.into();
        let span: &'static Span = Box::leak(Box::new(
            tracing::info_span!("app", mode = %mode, build_sha = %build_sha()),
        ));
        Self {
            _guard: span.enter(),
        }
    }
}

/// Identity of the load attempt a task is working on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptContext {
    /// Monotonic attempt generation.
    pub attempt: u64,
    /// Request kind label (`media` or `url`).
    pub kind: &'static str,
}

tokio::task_local! {
    static ACTIVE_ATTEMPT: AttemptContext;
}

/// Run `fut` with the given attempt context available to [`current_attempt`].
pub async fn with_attempt_context<Fut, T>(context: AttemptContext, fut: Fut) -> T
where
    Fut: Future<Output = T>,
{
    ACTIVE_ATTEMPT.scope(context, fut).await
}

/// The attempt context of the running task, if any.
#[must_use]
pub fn current_attempt() -> Option<AttemptContext> {
    ACTIVE_ATTEMPT.try_with(|context| *context).ok()
}
