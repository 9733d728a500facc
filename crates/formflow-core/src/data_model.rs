//! Data Model: FormRecord, SubmissionRecord, LogEntry
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use uuid::Uuid;

use crate::error::{FormflowError, Result};

/// A value extracted from a PDF form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Text(String),
    List(Vec<String>),
    Null,
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Text rendering used when injecting into a text/select/radio input.
    pub fn as_text(&self) -> String {
        match self {
            FieldValue::Flag(b) => b.to_string(),
            FieldValue::Text(s) => s.clone(),
            FieldValue::List(items) => items.join(", "),
            FieldValue::Null => String::new(),
        }
    }

    /// Whether a checkbox mapped to this value should be ticked.
    pub fn is_truthy(&self) -> bool {
        match self {
            FieldValue::Flag(b) => *b,
            FieldValue::Text(s) => matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "true" | "yes" | "on" | "1"
            ),
            FieldValue::List(items) => !items.is_empty(),
            FieldValue::Null => false,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Flag(b)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(items: Vec<String>) -> Self {
        FieldValue::List(items)
    }
}

pub type ParsedFields = HashMap<String, FieldValue>;

/// Lifecycle status shared by forms and submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl SubmissionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubmissionStatus::Completed | SubmissionStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::InProgress => "in_progress",
            SubmissionStatus::Completed => "completed",
            SubmissionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubmissionStatus {
    type Err = FormflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(SubmissionStatus::Pending),
            "in_progress" => Ok(SubmissionStatus::InProgress),
            "completed" => Ok(SubmissionStatus::Completed),
            "failed" => Ok(SubmissionStatus::Failed),
            other => Err(FormflowError::Misuse(format!("unknown status '{}'", other))),
        }
    }
}

/// One uploaded, parsed PDF form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormRecord {
    pub id: String,
    pub source_file_name: String,
    pub size_bytes: u64,
    pub uploaded_by: String,
    pub uploaded_at: DateTime<Utc>,
    pub parsed_fields: ParsedFields,
    pub status: SubmissionStatus,
}

impl FormRecord {
    pub fn new(
        source_file_name: impl Into<String>,
        size_bytes: u64,
        uploaded_by: impl Into<String>,
        parsed_fields: ParsedFields,
    ) -> Self {
        Self {
            id: format!("form-{}", Uuid::new_v4()),
            source_file_name: source_file_name.into(),
            size_bytes,
            uploaded_by: uploaded_by.into(),
            uploaded_at: Utc::now(),
            parsed_fields,
            status: SubmissionStatus::Pending,
        }
    }
}

/// One attempt to submit a form to a target website.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: String,
    pub form_id: String,
    pub submitted_by: String,
    pub submitted_at: DateTime<Utc>,
    pub target_website: String,
    pub status: SubmissionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl SubmissionRecord {
    /// A fresh Pending record, timestamped at request time.
    pub fn new(
        id: impl Into<String>,
        form_id: impl Into<String>,
        submitted_by: impl Into<String>,
        target_website: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            form_id: form_id.into(),
            submitted_by: submitted_by.into(),
            submitted_at: Utc::now(),
            target_website: target_website.into(),
            status: SubmissionStatus::Pending,
            completed_at: None,
            error_message: None,
        }
    }

    pub fn generate_id() -> String {
        format!("sub-{}", Uuid::new_v4())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Pending → InProgress.
    pub fn start(&mut self) -> Result<()> {
        self.transition(SubmissionStatus::InProgress)
    }

    /// InProgress → Completed.
    pub fn complete(&mut self) -> Result<()> {
        self.transition(SubmissionStatus::Completed)?;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Pending | InProgress → Failed.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<()> {
        self.transition(SubmissionStatus::Failed)?;
        self.completed_at = Some(Utc::now());
        self.error_message = Some(message.into());
        Ok(())
    }

    fn transition(&mut self, next: SubmissionStatus) -> Result<()> {
        use SubmissionStatus::*;
        let allowed = matches!(
            (self.status, next),
            (Pending, InProgress) | (InProgress, Completed) | (Pending, Failed) | (InProgress, Failed)
        );
        if !allowed {
            return Err(FormflowError::InvalidTransition(format!(
                "{} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Success,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Success => "success",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = FormflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "info" => Ok(LogLevel::Info),
            "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            "success" => Ok(LogLevel::Success),
            other => Err(FormflowError::Misuse(format!("unknown log level '{}'", other))),
        }
    }
}

/// An event log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,

    /// Non-decreasing within one process
    pub timestamp: DateTime<Utc>,

    pub level: LogLevel,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            id: format!("log-{}", Uuid::new_v4()),
            timestamp: monotonic_now(),
            level,
            message: message.into(),
            submission_id: None,
            form_id: None,
            user_id: None,
            metadata: None,
        }
    }

    pub fn with_submission(mut self, submission_id: impl Into<String>) -> Self {
        self.submission_id = Some(submission_id.into());
        self
    }

    pub fn with_form(mut self, form_id: impl Into<String>) -> Self {
        self.form_id = Some(form_id.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Add one metadata key
    pub fn with_meta(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
        self
    }
}

/// The person a notification is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

fn monotonic_now() -> DateTime<Utc> {
    static LAST_MICROS: AtomicI64 = AtomicI64::new(i64::MIN);

    let now = Utc::now();
    let micros = now.timestamp_micros();
    let prev = LAST_MICROS.fetch_max(micros, Ordering::SeqCst);
    if prev > micros {
        DateTime::from_timestamp_micros(prev).unwrap_or(now)
    } else {
        now
    }
}
