//! Site Driver: the abstract browser-automation capability.
//!
//! A driver opens sessions; a session is owned by exactly one submission
//! attempt and must be closed by it on every exit path.
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// Opaque handle to a located page element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
    pub selector: String,
    pub node_ref: String,
}

impl ElementHandle {
    pub fn new(selector: impl Into<String>, node_ref: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            node_ref: node_ref.into(),
        }
    }
}

#[async_trait]
pub trait SiteDriver: Send + Sync {
    /// Open a session already navigated to `url`.
    async fn open(&self, url: &str) -> Result<Box<dyn SiteSession>>;
}

#[async_trait]
pub trait SiteSession: Send {
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Wait up to `timeout` for `selector` to appear.
    async fn locate(&mut self, selector: &str, timeout: Duration) -> Result<ElementHandle>;

    async fn set_text(&mut self, element: &ElementHandle, value: &str) -> Result<()>;

    async fn select(&mut self, element: &ElementHandle, value: &str) -> Result<()>;

    async fn check(&mut self, element: &ElementHandle) -> Result<()>;

    async fn click_radio_value(&mut self, element: &ElementHandle, value: &str) -> Result<()>;

    async fn click(&mut self, selector: &str) -> Result<()>;

    /// Wait for navigation/network activity to settle.
    async fn wait_for_settle(&mut self, timeout: Duration) -> Result<()>;

    async fn content(&mut self) -> Result<String>;

    async fn capture_evidence(&mut self, path: &Path) -> Result<()>;

    async fn close(&mut self) -> Result<()>;
}
