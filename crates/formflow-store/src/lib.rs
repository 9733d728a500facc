//! FormFlow Store: in-memory backends for the core storage traits
//!
//! ```text
//! FormStore ─────────► InMemoryFormStore
//! SubmissionStore ───► InMemorySubmissionStore
//! EventLog ──────────► InMemoryEventLog ──► tracing
//! ```
//!
//! # Example
//!
//! ```
//! use formflow_core::{EventLog, LogEntry, LogFilter, LogLevel, PageRequest};
//! use formflow_store::InMemoryEventLog;
//!
//! # tokio_test_block_on(async {
//! let log = InMemoryEventLog::new();
//! log.append(LogEntry::new(LogLevel::Info, "form registered").with_form("form-1"))
//!     .await
//!     .unwrap();
//!
//! let page = log.query(&LogFilter::default(), PageRequest::default()).await.unwrap();
//! assert_eq!(page.total, 1);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

pub mod event_log;
pub mod memory;

pub use event_log::{InMemoryEventLog, LogStats};
pub use memory::{InMemoryFormStore, InMemorySubmissionStore};
