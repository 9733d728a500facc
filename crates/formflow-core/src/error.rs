//! Unified Error Model
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormflowError {
    /// Bad target configuration (unknown input kind, missing url, ...).
    #[error("CONFIG/{0}")]
    Config(String),

    /// Session could not be opened or navigation failed.
    #[error("TRANSPORT/{0}")]
    Transport(String),

    #[error("ELEMENT/{selector} not found within {waited_ms}ms")]
    ElementNotFound { selector: String, waited_ms: u64 },

    #[error("TIMEOUT/{0}")]
    Timeout(String),

    #[error("STORE/{0}")]
    Store(String),

    #[error("NOTIFY/{0}")]
    Notify(String),

    #[error("STATE/{0}")]
    InvalidTransition(String),

    /// Caller bug, raised before the state machine starts.
    #[error("MISUSE/{0}")]
    Misuse(String),
}

impl FormflowError {
    /// Machine-readable label recorded in log metadata.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Transport(_) => "transport",
            Self::ElementNotFound { .. } => "element_not_found",
            Self::Timeout(_) => "timeout",
            Self::Store(_) => "store",
            Self::Notify(_) => "notify",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::Misuse(_) => "misuse",
        }
    }

    /// Whether the attempt failed while talking to the target site.
    pub fn is_interaction_failure(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::ElementNotFound { .. } | Self::Timeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FormflowError>;
