//! FormFlow Core: Submission Engine, Field Mapper and collaborator traits
//!
//! The engine drives one attempt to submit a parsed PDF form to a target
//! website. Storage, the site driver and notifications are injected.

pub mod context;
pub mod data_model;
pub mod engine;
pub mod error;
pub mod mapper;
pub mod notify;
pub mod outcome;
pub mod session;
pub mod step;
pub mod store;
pub mod target;
pub mod timing;

pub use context::AttemptContext;
pub use data_model::{
    FieldValue, FormRecord, LogEntry, LogLevel, ParsedFields, SubmissionRecord, SubmissionStatus,
    User,
};
pub use engine::{retry_submission_id, EngineSettings, SubmissionEngine, UNCERTAIN_OUTCOME_MESSAGE};
pub use error::{FormflowError, Result};
pub use mapper::{plan_instructions, ApplyInstruction, FieldMapping, InputKind, Transform};
pub use notify::Notifier;
pub use outcome::{classify, Outcome, SITE_ERROR_MESSAGE};
pub use session::{ElementHandle, SiteDriver, SiteSession};
pub use step::{SiteStep, StepLimits};
pub use store::{
    EventLog, FormFilter, FormStore, LogFilter, Page, PageRequest, SubmissionFilter,
    SubmissionStore,
};
pub use target::{MarkerPrecedence, TargetCatalog, TargetConfig, TargetOverrides};
pub use timing::Jitter;

/// FormFlow version
pub const FORMFLOW_VERSION: &str = env!("CARGO_PKG_VERSION");
