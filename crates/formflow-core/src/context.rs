//! Attempt Context: correlation ids shared by every log of one attempt
use crate::data_model::{LogEntry, LogLevel};

#[derive(Debug, Clone)]
pub struct AttemptContext {
    pub submission_id: String,
    pub form_id: String,
    pub submitter_id: String,
    /// Shared by the tracing span of the attempt
    pub trace_id: String,
}

impl AttemptContext {
    pub fn new(
        submission_id: impl Into<String>,
        form_id: impl Into<String>,
        submitter_id: impl Into<String>,
    ) -> Self {
        Self {
            submission_id: submission_id.into(),
            form_id: form_id.into(),
            submitter_id: submitter_id.into(),
            trace_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// A log entry correlated to this attempt.
    pub fn entry(&self, level: LogLevel, message: impl Into<String>) -> LogEntry {
        LogEntry::new(level, message)
            .with_submission(&self.submission_id)
            .with_form(&self.form_id)
            .with_user(&self.submitter_id)
    }
}
