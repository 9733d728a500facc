//! Storage collaborators: forms, submissions and the event log.
//!
//! The core only depends on these traits; backing (memory, SQL, documents)
//! is a deployment choice.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data_model::{FormRecord, LogEntry, LogLevel, SubmissionRecord, SubmissionStatus};
use crate::error::Result;

pub const MAX_PAGE_LIMIT: usize = 100;

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: usize,
    pub limit: usize,
}

impl PageRequest {
    pub fn new(page: usize, limit: usize) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_PAGE_LIMIT),
        }
    }

    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }

    /// Slice an already-sorted list into a page.
    pub fn paginate<T: Clone>(&self, items: &[T]) -> Page<T> {
        let total = items.len();
        let data = items
            .iter()
            .skip(self.offset())
            .take(self.limit)
            .cloned()
            .collect();
        Page {
            data,
            total,
            page: self.page,
            limit: self.limit,
            total_pages: total.div_ceil(self.limit),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, 10)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormFilter {
    pub status: Option<SubmissionStatus>,
    pub uploaded_by: Option<String>,
}

impl FormFilter {
    pub fn matches(&self, form: &FormRecord) -> bool {
        self.status.map_or(true, |s| form.status == s)
            && self
                .uploaded_by
                .as_deref()
                .map_or(true, |u| form.uploaded_by == u)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionFilter {
    pub form_id: Option<String>,
    pub status: Option<SubmissionStatus>,
    pub submitted_by: Option<String>,
}

impl SubmissionFilter {
    pub fn matches(&self, record: &SubmissionRecord) -> bool {
        self.form_id.as_deref().map_or(true, |f| record.form_id == f)
            && self.status.map_or(true, |s| record.status == s)
            && self
                .submitted_by
                .as_deref()
                .map_or(true, |u| record.submitted_by == u)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFilter {
    pub level: Option<LogLevel>,
    pub submission_id: Option<String>,
    pub form_id: Option<String>,
    pub user_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    /// Case-insensitive substring over the message
    pub search: Option<String>,
}

impl LogFilter {
    pub fn for_submission(submission_id: impl Into<String>) -> Self {
        Self {
            submission_id: Some(submission_id.into()),
            ..Default::default()
        }
    }

    pub fn matches(&self, entry: &LogEntry) -> bool {
        fn eq(want: &Option<String>, got: &Option<String>) -> bool {
            want.as_ref().map_or(true, |w| got.as_ref() == Some(w))
        }

        self.level.map_or(true, |l| entry.level == l)
            && eq(&self.submission_id, &entry.submission_id)
            && eq(&self.form_id, &entry.form_id)
            && eq(&self.user_id, &entry.user_id)
            && self.since.map_or(true, |t| entry.timestamp >= t)
            && self.until.map_or(true, |t| entry.timestamp <= t)
            && self.search.as_deref().map_or(true, |q| {
                entry.message.to_lowercase().contains(&q.to_lowercase())
            })
    }
}

#[async_trait]
pub trait FormStore: Send + Sync {
    /// Insert a new form. An id that is already stored is a `Store` error.
    async fn save(&self, form: FormRecord) -> Result<FormRecord>;

    async fn get(&self, id: &str) -> Result<Option<FormRecord>>;

    /// Replace an existing record. Missing ids are a `Store` error.
    async fn update(&self, form: FormRecord) -> Result<FormRecord>;

    /// Newest upload first.
    async fn list(&self, filter: &FormFilter, page: PageRequest) -> Result<Page<FormRecord>>;

    /// Overwrite only the status of a stored form.
    async fn set_status(&self, id: &str, status: SubmissionStatus) -> Result<FormRecord> {
        let mut form = self
            .get(id)
            .await?
            .ok_or_else(|| crate::error::FormflowError::Store(format!("form {} not found", id)))?;
        form.status = status;
        self.update(form).await
    }
}

#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Insert a new record. An id that is already stored is a `Store` error.
    async fn save(&self, record: SubmissionRecord) -> Result<SubmissionRecord>;

    /// Replace an existing record. Missing ids are a `Store` error.
    async fn update(&self, record: SubmissionRecord) -> Result<SubmissionRecord>;

    async fn get(&self, id: &str) -> Result<Option<SubmissionRecord>>;

    /// Newest request first.
    async fn list(
        &self,
        filter: &SubmissionFilter,
        page: PageRequest,
    ) -> Result<Page<SubmissionRecord>>;
}

#[async_trait]
pub trait EventLog: Send + Sync {
    async fn append(&self, entry: LogEntry) -> Result<LogEntry>;

    /// Newest entry first.
    async fn query(&self, filter: &LogFilter, page: PageRequest) -> Result<Page<LogEntry>>;
}
