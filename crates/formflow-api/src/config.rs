//! Server configuration from environment variables.
use std::path::PathBuf;
use std::time::Duration;

use formflow_core::{EngineSettings, FormflowError, Jitter, Result};

use crate::service::DEFAULT_TARGET_CAPACITY;

pub const DEFAULT_ADDR: &str = "0.0.0.0:8787";
pub const DEFAULT_SIMULATED_PAGE: &str =
    "<html><body><h1>Submission received</h1><p>success</p></body></html>";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: String,
    /// YAML target catalog
    pub targets_path: Option<PathBuf>,
    pub engine: EngineSettings,
    pub log_capacity: usize,
    /// Submissions whose targets are remembered for retries
    pub target_capacity: usize,
    /// Page the simulated driver shows after submit
    pub simulated_page: String,
    pub mail_from: String,
    pub admin_emails: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            targets_path: None,
            engine: EngineSettings::default(),
            log_capacity: 10_000,
            target_capacity: DEFAULT_TARGET_CAPACITY,
            simulated_page: DEFAULT_SIMULATED_PAGE.to_string(),
            mail_from: "formflow@example.com".to_string(),
            admin_emails: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(addr) = lookup("FORMFLOW_ADDR") {
            config.addr = addr;
        }
        if let Some(path) = lookup("FORMFLOW_TARGETS") {
            config.targets_path = Some(PathBuf::from(path));
        }
        if let Some(dir) = lookup("FORMFLOW_EVIDENCE_DIR") {
            config.engine.evidence_dir = PathBuf::from(dir);
        }
        if let Some(ms) = lookup("FORMFLOW_SETTLE_TIMEOUT_MS") {
            config.engine.settle_timeout = parse_millis("FORMFLOW_SETTLE_TIMEOUT_MS", &ms)?;
        }
        if let Some(ms) = lookup("FORMFLOW_LOCATE_TIMEOUT_MS") {
            config.engine.locate_timeout = parse_millis("FORMFLOW_LOCATE_TIMEOUT_MS", &ms)?;
        }
        if let Some(range) = lookup("FORMFLOW_JITTER_MS") {
            config.engine.jitter = Jitter::parse(&range)?;
        }
        if let Some(capacity) = lookup("FORMFLOW_LOG_CAPACITY") {
            config.log_capacity = parse_count("FORMFLOW_LOG_CAPACITY", &capacity)?;
        }
        if let Some(capacity) = lookup("FORMFLOW_TARGET_CAPACITY") {
            config.target_capacity = parse_count("FORMFLOW_TARGET_CAPACITY", &capacity)?;
        }
        if let Some(page) = lookup("FORMFLOW_SIMULATED_PAGE") {
            config.simulated_page = page;
        }
        if let Some(from) = lookup("FORMFLOW_MAIL_FROM") {
            config.mail_from = from;
        }
        if let Some(list) = lookup("FORMFLOW_ADMIN_EMAILS") {
            config.admin_emails = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }

        Ok(config)
    }
}

fn parse_count(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| FormflowError::Config(format!("{}: invalid number '{}'", key, value)))
}

fn parse_millis(key: &str, value: &str) -> Result<Duration> {
    let ms: u64 = value
        .trim()
        .parse()
        .map_err(|_| FormflowError::Config(format!("{}: invalid milliseconds '{}'", key, value)))?;
    if ms == 0 {
        return Err(FormflowError::Config(format!("{} must be positive", key)));
    }
    Ok(Duration::from_millis(ms))
}
