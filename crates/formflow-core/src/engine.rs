//! Submission Engine: drives one submission attempt end-to-end
//!
//! ```text
//! Pending → InProgress → open session → pre steps → fill fields → submit
//!                                                                   ↓
//!        Completed / Failed ← classify page ← post steps ← settle ←─┘
//! ```
//!
//! Every error after the record moves to InProgress is caught here and
//! turned into a Failed record; the session is closed on every exit path.
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

use crate::context::AttemptContext;
use crate::data_model::{FormRecord, LogEntry, LogLevel, SubmissionRecord, SubmissionStatus};
use crate::error::{FormflowError, Result};
use crate::mapper::{plan_instructions, ApplyInstruction, InputKind};
use crate::outcome::{classify, Outcome, SITE_ERROR_MESSAGE};
use crate::session::{SiteDriver, SiteSession};
use crate::step::{locate, StepLimits};
use crate::store::{EventLog, SubmissionStore};
use crate::target::TargetConfig;
use crate::timing::{bounded, Jitter};

pub const UNCERTAIN_OUTCOME_MESSAGE: &str = "success indicator not found; outcome uncertain";

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub locate_timeout: Duration,
    /// Bounds session open, navigation, submit settle and close
    pub settle_timeout: Duration,
    pub jitter: Jitter,
    pub evidence_dir: PathBuf,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            locate_timeout: Duration::from_secs(10),
            settle_timeout: Duration::from_secs(60),
            jitter: Jitter::default(),
            evidence_dir: PathBuf::from("./screenshots"),
        }
    }
}

impl EngineSettings {
    fn limits(&self) -> StepLimits {
        StepLimits {
            locate_timeout: self.locate_timeout,
            settle_timeout: self.settle_timeout,
        }
    }
}

/// Id for a retry of `original`: every retry is a new record, even when two
/// are requested within the same millisecond.
pub fn retry_submission_id(original: &str) -> String {
    let nonce = Uuid::new_v4().simple().to_string();
    format!(
        "{}-retry-{}-{}",
        original,
        chrono::Utc::now().timestamp_millis(),
        &nonce[..8]
    )
}

/// Where the attempt was when it failed.
#[derive(Debug, Default)]
struct Progress {
    stage: &'static str,
    field: Option<String>,
}

pub struct SubmissionEngine {
    driver: Arc<dyn SiteDriver>,
    submissions: Arc<dyn SubmissionStore>,
    log: Arc<dyn EventLog>,
    settings: EngineSettings,
}

impl SubmissionEngine {
    pub fn new(
        driver: Arc<dyn SiteDriver>,
        submissions: Arc<dyn SubmissionStore>,
        log: Arc<dyn EventLog>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            driver,
            submissions,
            log,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Run one attempt to a terminal state.
    ///
    /// `form` is a snapshot: it is not re-read while the attempt runs. If a
    /// Pending record with `submission_id` is already stored it is used,
    /// otherwise one is created.
    ///
    /// # Errors
    ///
    /// `Misuse` for a bad call (empty ids, a record of another form or one
    /// that already left Pending). `Store` when the Pending record cannot be
    /// read or saved, including a concurrent save of the same id; no attempt
    /// is made in that case. Once the attempt starts, every failure comes
    /// back as a Failed record instead.
    pub async fn run_submission(
        &self,
        form: &FormRecord,
        submission_id: &str,
        submitter_id: &str,
        target: &TargetConfig,
    ) -> Result<SubmissionRecord> {
        let record = self.pending_record(form, submission_id, submitter_id, target).await?;
        let ctx = AttemptContext::new(submission_id, &form.id, submitter_id);
        Ok(self.run_pending(ctx, record, form, target).await)
    }

    /// Start a fresh attempt for a form whose earlier attempt concluded.
    ///
    /// `original` is never modified.
    pub async fn retry_submission(
        &self,
        form: &FormRecord,
        original: &SubmissionRecord,
        retry_id: &str,
        submitter_id: &str,
        target: &TargetConfig,
    ) -> Result<SubmissionRecord> {
        if original.form_id != form.id {
            return Err(FormflowError::Misuse(format!(
                "submission {} belongs to form {}, not {}",
                original.id, original.form_id, form.id
            )));
        }
        if retry_id == original.id {
            return Err(FormflowError::Misuse("retry must use a new submission id".into()));
        }
        let record = self.pending_record(form, retry_id, submitter_id, target).await?;

        let ctx = AttemptContext::new(retry_id, &form.id, submitter_id);
        self.emit(
            ctx.entry(LogLevel::Info, format!("retrying submission {}", original.id))
                .with_meta("retry_of", json!(original.id)),
        )
        .await;

        Ok(self.run_pending(ctx, record, form, target).await)
    }

    async fn run_pending(
        &self,
        ctx: AttemptContext,
        record: SubmissionRecord,
        form: &FormRecord,
        target: &TargetConfig,
    ) -> SubmissionRecord {
        let span = tracing::info_span!(
            "submission",
            submission_id = %ctx.submission_id,
            form_id = %ctx.form_id,
            trace_id = %ctx.trace_id
        );
        self.drive(ctx, record, form, target).instrument(span).await
    }

    async fn pending_record(
        &self,
        form: &FormRecord,
        submission_id: &str,
        submitter_id: &str,
        target: &TargetConfig,
    ) -> Result<SubmissionRecord> {
        if submission_id.trim().is_empty() {
            return Err(FormflowError::Misuse("submission id is required".into()));
        }
        if submitter_id.trim().is_empty() {
            return Err(FormflowError::Misuse("submitter id is required".into()));
        }

        match self.submissions.get(submission_id).await? {
            Some(existing) if existing.form_id != form.id => Err(FormflowError::Misuse(format!(
                "submission {} belongs to form {}",
                submission_id, existing.form_id
            ))),
            Some(existing) if existing.status != SubmissionStatus::Pending => {
                Err(FormflowError::Misuse(format!(
                    "submission {} already {}",
                    submission_id, existing.status
                )))
            }
            Some(existing) => Ok(existing),
            None => {
                let record =
                    SubmissionRecord::new(submission_id, &form.id, submitter_id, &target.url);
                self.submissions.save(record).await
            }
        }
    }

    async fn drive(
        &self,
        ctx: AttemptContext,
        mut record: SubmissionRecord,
        form: &FormRecord,
        target: &TargetConfig,
    ) -> SubmissionRecord {
        self.emit(
            ctx.entry(LogLevel::Info, "submission started")
                .with_meta("target_url", json!(target.url))
                .with_meta("source_file", json!(form.source_file_name)),
        )
        .await;

        if let Err(e) = record.start() {
            tracing::error!(error = %e, "could not start submission");
        }
        self.persist(&record).await;

        let mut session: Option<Box<dyn SiteSession>> = None;
        let mut progress = Progress::default();
        let result = self
            .attempt(&ctx, form, target, &mut session, &mut progress)
            .await;

        let transition = match result {
            Ok(Outcome::Succeeded) => record.complete(),
            Ok(Outcome::Uncertain) => {
                self.emit(ctx.entry(LogLevel::Warning, UNCERTAIN_OUTCOME_MESSAGE))
                    .await;
                record.complete()
            }
            Ok(Outcome::SiteReportedError) => record.fail(SITE_ERROR_MESSAGE),
            Err(err) => {
                let mut entry = ctx
                    .entry(LogLevel::Error, format!("submission error: {}", err))
                    .with_meta("error_kind", json!(err.kind()))
                    .with_meta("detail", json!(format!("{:?}", err)))
                    .with_meta("stage", json!(progress.stage));
                if let Some(field) = &progress.field {
                    entry = entry.with_meta("field", json!(field));
                }
                self.emit(entry).await;
                record.fail(err.to_string())
            }
        };
        if let Err(e) = transition {
            tracing::error!(error = %e, "could not finalize submission");
        }

        self.persist(&record).await;

        if let Some(mut open) = session.take() {
            let closed = bounded(self.settings.settle_timeout, "closing session", open.close()).await;
            if let Err(e) = closed {
                self.emit(
                    ctx.entry(LogLevel::Warning, format!("session close failed: {}", e))
                        .with_meta("error_kind", json!(e.kind())),
                )
                .await;
            }
        }

        let terminal = match &record.error_message {
            None => ctx.entry(LogLevel::Success, "submission completed"),
            Some(message) => ctx.entry(LogLevel::Error, format!("submission failed: {}", message)),
        };
        self.emit(
            terminal
                .with_meta("terminal", json!(true))
                .with_meta("status", json!(record.status)),
        )
        .await;

        record
    }

    async fn attempt(
        &self,
        ctx: &AttemptContext,
        form: &FormRecord,
        target: &TargetConfig,
        slot: &mut Option<Box<dyn SiteSession>>,
        progress: &mut Progress,
    ) -> Result<Outcome> {
        let limits = self.settings.limits();

        progress.stage = "configure";
        target.validate()?;
        let plan = plan_instructions(&form.parsed_fields, &target.field_mappings)?;

        progress.stage = "open";
        let opened = bounded(
            self.settings.settle_timeout,
            "opening session",
            self.driver.open(&target.url),
        )
        .await?;
        let session = slot.insert(opened).as_mut();
        self.emit(ctx.entry(LogLevel::Info, "navigated to target website")).await;

        progress.stage = "pre_steps";
        for step in &target.pre_steps {
            tracing::debug!(step = step.id(), "pre step");
            step.run(session, &limits).await?;
        }

        progress.stage = "fill";
        for (i, instruction) in plan.iter().enumerate() {
            if i > 0 {
                self.settings.jitter.pause().await;
            }
            progress.field = Some(instruction.source_field.clone());
            apply_instruction(session, instruction, &limits).await?;
        }
        progress.field = None;
        self.emit(
            ctx.entry(LogLevel::Info, "completed filling form fields")
                .with_meta("field_count", json!(plan.len())),
        )
        .await;

        progress.stage = "submit";
        locate(session, &target.submit_selector, &limits).await?;
        bounded(
            self.settings.settle_timeout,
            "submit click",
            session.click(&target.submit_selector),
        )
        .await?;
        bounded(
            self.settings.settle_timeout,
            "waiting for submit to settle",
            session.wait_for_settle(self.settings.settle_timeout),
        )
        .await?;

        progress.stage = "post_steps";
        for step in &target.post_steps {
            tracing::debug!(step = step.id(), "post step");
            step.run(session, &limits).await?;
        }

        progress.stage = "classify";
        let content = session.content().await?;
        let outcome = classify(&content, target);

        if target.capture_evidence {
            let path = self
                .settings
                .evidence_dir
                .join(format!("{}.png", ctx.submission_id));
            if let Err(e) = session.capture_evidence(&path).await {
                self.emit(
                    ctx.entry(LogLevel::Warning, format!("evidence capture failed: {}", e))
                        .with_meta("path", json!(path.display().to_string())),
                )
                .await;
            }
        }

        Ok(outcome)
    }

    async fn persist(&self, record: &SubmissionRecord) {
        if let Err(e) = self.submissions.update(record.clone()).await {
            tracing::error!(error = %e, status = %record.status, "could not persist submission");
        }
    }

    async fn emit(&self, entry: LogEntry) {
        if let Err(e) = self.log.append(entry).await {
            tracing::warn!(error = %e, "event log append failed");
        }
    }
}

async fn apply_instruction(
    session: &mut dyn SiteSession,
    instruction: &ApplyInstruction,
    limits: &StepLimits,
) -> Result<()> {
    let element = locate(session, &instruction.selector, limits).await?;
    let value = &instruction.value;

    match &instruction.kind {
        InputKind::Text => session.set_text(&element, &value.as_text()).await,
        InputKind::Select => session.select(&element, &value.as_text()).await,
        InputKind::Checkbox if value.is_truthy() => session.check(&element).await,
        InputKind::Checkbox => Ok(()),
        InputKind::Radio => session.click_radio_value(&element, &value.as_text()).await,
        InputKind::Unknown(kind) => Err(FormflowError::Config(format!(
            "unsupported input kind '{}'",
            kind
        ))),
    }
}
