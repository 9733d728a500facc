//! Submission service: the caller side of the engine.
//!
//! Registers the Pending record, spawns one task per attempt and, once the
//! attempt concludes, propagates the status to the form, records metrics and
//! notifies the submitter.
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use formflow_core::{
    retry_submission_id, EventLog, FormRecord, FormStore, FormflowError, LogEntry, LogLevel,
    Notifier, SubmissionEngine, SubmissionRecord, SubmissionStatus, SubmissionStore,
    TargetConfig, User,
};

use crate::error::ApiError;
use crate::metrics::Metrics;

#[derive(Clone)]
pub struct SubmissionService {
    forms: Arc<dyn FormStore>,
    submissions: Arc<dyn SubmissionStore>,
    log: Arc<dyn EventLog>,
    engine: Arc<SubmissionEngine>,
    notifier: Arc<dyn Notifier>,
    metrics: Metrics,
    /// Target used by recent submissions, reused by retries
    targets: Arc<RwLock<RecentTargets>>,
}

/// Number of submission targets remembered for retries.
pub const DEFAULT_TARGET_CAPACITY: usize = 1024;

/// Targets keyed by submission id. The oldest entry is dropped once
/// `capacity` is reached.
#[derive(Debug)]
struct RecentTargets {
    capacity: usize,
    order: VecDeque<String>,
    targets: HashMap<String, TargetConfig>,
}

impl RecentTargets {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            targets: HashMap::new(),
        }
    }

    fn insert(&mut self, submission_id: String, target: TargetConfig) {
        if self.targets.insert(submission_id.clone(), target).is_none() {
            self.order.push_back(submission_id);
        }
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.targets.remove(&oldest);
            }
        }
    }

    fn get(&self, submission_id: &str) -> Option<&TargetConfig> {
        self.targets.get(submission_id)
    }
}

impl SubmissionService {
    pub fn new(
        forms: Arc<dyn FormStore>,
        submissions: Arc<dyn SubmissionStore>,
        log: Arc<dyn EventLog>,
        engine: Arc<SubmissionEngine>,
        notifier: Arc<dyn Notifier>,
        metrics: Metrics,
    ) -> Self {
        Self {
            forms,
            submissions,
            log,
            engine,
            notifier,
            metrics,
            targets: Arc::new(RwLock::new(RecentTargets::new(DEFAULT_TARGET_CAPACITY))),
        }
    }

    /// Remember targets of at most `capacity` submissions. Retries of older
    /// ones start from the URL stored on the record.
    pub fn with_target_capacity(mut self, capacity: usize) -> Self {
        self.targets = Arc::new(RwLock::new(RecentTargets::new(capacity)));
        self
    }

    /// Start an attempt for `form_id`. Returns the Pending record and the
    /// handle of the task driving it.
    pub async fn request(
        &self,
        form_id: &str,
        user: User,
        target: TargetConfig,
    ) -> Result<(SubmissionRecord, JoinHandle<SubmissionRecord>), ApiError> {
        let form = self.form(form_id).await?;
        let record = self
            .begin(&form, SubmissionRecord::generate_id(), &user, &target)
            .await?;

        self.emit(
            LogEntry::new(LogLevel::Info, "submission requested")
                .with_submission(&record.id)
                .with_form(&form.id)
                .with_user(&user.id)
                .with_meta("target_url", json!(target.url)),
        )
        .await;

        let service = self.clone();
        let id = record.id.clone();
        let handle =
            tokio::spawn(async move { service.execute(form, id, user, target, None).await });
        Ok((record, handle))
    }

    /// Start a new attempt for the form of a concluded submission.
    pub async fn retry(
        &self,
        original: SubmissionRecord,
        user: User,
        target: TargetConfig,
    ) -> Result<(SubmissionRecord, JoinHandle<SubmissionRecord>), ApiError> {
        if !original.is_terminal() {
            return Err(ApiError::Conflict(format!(
                "submission {} is still {}",
                original.id, original.status
            )));
        }
        let form = self.form(&original.form_id).await?;

        let record = self
            .begin(&form, retry_submission_id(&original.id), &user, &target)
            .await?;

        let service = self.clone();
        let id = record.id.clone();
        let handle = tokio::spawn(async move {
            service.execute(form, id, user, target, Some(original)).await
        });
        Ok((record, handle))
    }

    pub async fn submission(&self, id: &str) -> Result<SubmissionRecord, ApiError> {
        self.submissions
            .get(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("submission {} not found", id)))
    }

    /// Target a retry of `original` starts from.
    pub async fn target_for(&self, original: &SubmissionRecord) -> TargetConfig {
        self.targets
            .read()
            .await
            .get(&original.id)
            .cloned()
            .unwrap_or_else(|| TargetConfig::new(&original.target_website))
    }

    async fn form(&self, form_id: &str) -> Result<FormRecord, ApiError> {
        self.forms
            .get(form_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("form {} not found", form_id)))
    }

    async fn begin(
        &self,
        form: &FormRecord,
        submission_id: String,
        user: &User,
        target: &TargetConfig,
    ) -> Result<SubmissionRecord, ApiError> {
        let record = self
            .submissions
            .save(SubmissionRecord::new(
                submission_id,
                &form.id,
                &user.id,
                &target.url,
            ))
            .await?;
        self.forms
            .set_status(&form.id, SubmissionStatus::InProgress)
            .await?;
        self.targets
            .write()
            .await
            .insert(record.id.clone(), target.clone());
        self.metrics.submission_started();
        Ok(record)
    }

    async fn execute(
        self,
        form: FormRecord,
        submission_id: String,
        user: User,
        target: TargetConfig,
        retry_of: Option<SubmissionRecord>,
    ) -> SubmissionRecord {
        let started = Instant::now();
        let result = match &retry_of {
            Some(original) => {
                self.engine
                    .retry_submission(&form, original, &submission_id, &user.id, &target)
                    .await
            }
            None => {
                self.engine
                    .run_submission(&form, &submission_id, &user.id, &target)
                    .await
            }
        };

        let record = match result {
            Ok(record) => record,
            Err(e) => self.reject(&form, &submission_id, &user, &target, e).await,
        };

        self.metrics
            .submission_finished(record.status, started.elapsed());
        // Concurrent attempts on one form: the last to conclude sets it.
        if let Err(e) = self.forms.set_status(&form.id, record.status).await {
            tracing::error!(form_id = %form.id, error = %e, "could not update form status");
        }

        match self.notifier.notify(&record, &form, &user).await {
            Ok(true) => tracing::debug!(submission_id = %record.id, "notification sent"),
            Ok(false) => tracing::debug!(submission_id = %record.id, "no notification recipients"),
            Err(e) => {
                self.emit(
                    LogEntry::new(LogLevel::Error, format!("notification failed: {}", e))
                        .with_submission(&record.id)
                        .with_form(&form.id)
                        .with_user(&user.id)
                        .with_meta("error_kind", json!(e.kind())),
                )
                .await;
            }
        }

        record
    }

    /// The engine refused the attempt; the Pending record saved by
    /// `begin` is failed so it does not linger.
    async fn reject(
        &self,
        form: &FormRecord,
        submission_id: &str,
        user: &User,
        target: &TargetConfig,
        error: FormflowError,
    ) -> SubmissionRecord {
        self.emit(
            LogEntry::new(LogLevel::Error, format!("submission rejected: {}", error))
                .with_submission(submission_id)
                .with_form(&form.id)
                .with_user(&user.id)
                .with_meta("error_kind", json!(error.kind())),
        )
        .await;

        let mut record = match self.submissions.get(submission_id).await {
            Ok(Some(record)) => record,
            _ => SubmissionRecord::new(submission_id, &form.id, &user.id, &target.url),
        };
        if !record.is_terminal() {
            if let Err(e) = record.fail(error.to_string()) {
                tracing::error!(error = %e, "could not fail rejected submission");
            }
            if let Err(e) = self.submissions.update(record.clone()).await {
                tracing::error!(error = %e, "could not persist rejected submission");
            }
        }
        record
    }

    async fn emit(&self, entry: LogEntry) {
        if let Err(e) = self.log.append(entry).await {
            tracing::warn!(error = %e, "event log append failed");
        }
    }
}
