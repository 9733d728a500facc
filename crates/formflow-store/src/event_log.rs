//! Event log
//!
//! Append-only record of everything the system does. Every entry is also
//! mirrored to `tracing` at the matching level.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use formflow_core::{EventLog, LogEntry, LogFilter, LogLevel, Page, PageRequest, Result};

/// In-memory event log collector
pub struct InMemoryEventLog {
    entries: RwLock<Vec<LogEntry>>,
    max_entries: usize,
}

impl InMemoryEventLog {
    /// Create a new event log
    pub fn new() -> Self {
        Self::with_max_entries(10_000)
    }

    /// Create with a custom max size; the oldest entries are dropped first
    pub fn with_max_entries(max: usize) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            max_entries: max.max(1),
        }
    }

    /// All entries, oldest first
    pub async fn entries(&self) -> Vec<LogEntry> {
        self.entries.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Export to JSON Lines
    pub async fn to_jsonl(&self) -> String {
        self.entries
            .read()
            .await
            .iter()
            .filter_map(|e| serde_json::to_string(e).ok())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Get statistics
    pub async fn stats(&self) -> LogStats {
        let entries = self.entries.read().await;
        let count = |level: LogLevel| entries.iter().filter(|e| e.level == level).count();

        let total = entries.len();
        let errors = count(LogLevel::Error);
        LogStats {
            total,
            info: count(LogLevel::Info),
            warnings: count(LogLevel::Warning),
            errors,
            successes: count(LogLevel::Success),
            error_rate: if total > 0 { errors as f64 / total as f64 } else { 0.0 },
        }
    }
}

impl Default for InMemoryEventLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn append(&self, entry: LogEntry) -> Result<LogEntry> {
        mirror(&entry);

        let mut entries = self.entries.write().await;
        entries.push(entry.clone());

        // Trim if over limit
        if entries.len() > self.max_entries {
            let drain_count = entries.len() - self.max_entries;
            entries.drain(0..drain_count);
        }

        Ok(entry)
    }

    async fn query(&self, filter: &LogFilter, page: PageRequest) -> Result<Page<LogEntry>> {
        let entries = self.entries.read().await;
        let mut matching: Vec<LogEntry> = entries
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        // concurrent writers may append slightly out of timestamp order
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(page.paginate(&matching))
    }
}

fn mirror(entry: &LogEntry) {
    let submission = entry.submission_id.as_deref().unwrap_or("-");
    let form = entry.form_id.as_deref().unwrap_or("-");
    let user = entry.user_id.as_deref().unwrap_or("-");
    match entry.level {
        LogLevel::Info | LogLevel::Success => tracing::info!(
            level_tag = entry.level.as_str(),
            submission_id = submission,
            form_id = form,
            user_id = user,
            "{}",
            entry.message
        ),
        LogLevel::Warning => tracing::warn!(
            submission_id = submission,
            form_id = form,
            user_id = user,
            "{}",
            entry.message
        ),
        LogLevel::Error => tracing::error!(
            submission_id = submission,
            form_id = form,
            user_id = user,
            metadata = ?entry.metadata,
            "{}",
            entry.message
        ),
    }
}

/// Statistics about log entries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogStats {
    pub total: usize,
    pub info: usize,
    pub warnings: usize,
    pub errors: usize,
    pub successes: usize,
    pub error_rate: f64,
}
