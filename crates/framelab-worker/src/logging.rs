//! Structured job logging.

use tracing::{error, info, warn, Span};

use framelab_models::JobId;

/// Job lifecycle logger.
///
/// Owns a `job` span carrying `job_id`, `operation` and `attempt`; every
/// event is emitted inside it, so the fields appear on each line whether or
/// not the caller is already instrumented.
#[derive(Debug, Clone)]
pub struct JobLogger {
    span: Span,
}

impl JobLogger {
    pub fn new(job_id: &JobId, operation: &str, attempt: u32) -> Self {
        Self {
            span: tracing::info_span!("job", job_id = %job_id, operation, attempt),
        }
    }

    /// Span to instrument the attempt's future with.
    pub fn span(&self) -> Span {
        self.span.clone()
    }

    pub fn log_start(&self, message: &str) {
        self.span.in_scope(|| info!(phase = "start", "{}", message));
    }

    pub fn log_progress(&self, message: &str) {
        self.span.in_scope(|| info!(phase = "progress", "{}", message));
    }

    pub fn log_warning(&self, message: &str) {
        self.span.in_scope(|| warn!("{}", message));
    }

    pub fn log_error(&self, message: &str) {
        self.span.in_scope(|| error!("{}", message));
    }

    pub fn log_completion(&self, message: &str) {
        self.span.in_scope(|| info!(phase = "done", "{}", message));
    }
}
