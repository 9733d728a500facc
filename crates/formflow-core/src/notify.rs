//! Notification Dispatcher contract.
use async_trait::async_trait;

use crate::data_model::{FormRecord, SubmissionRecord, User};
use crate::error::Result;

/// Told once about each terminal submission. Best-effort: a failure here
/// never changes the submission.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// `Ok(false)` means nothing was sent (e.g. no recipients).
    async fn notify(
        &self,
        submission: &SubmissionRecord,
        form: &FormRecord,
        user: &User,
    ) -> Result<bool>;
}
