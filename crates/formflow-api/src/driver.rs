//! Simulated site driver used by the demo server.
//!
//! Every selector is found, every action succeeds and the page after submit
//! is a fixed document. Swap in a real browser-automation driver for
//! production use.
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

use formflow_core::{ElementHandle, FormflowError, Result, SiteDriver, SiteSession};

#[derive(Debug, Clone)]
pub struct SimulatedDriver {
    page_after_submit: String,
}

impl SimulatedDriver {
    pub fn new(page_after_submit: impl Into<String>) -> Self {
        Self {
            page_after_submit: page_after_submit.into(),
        }
    }
}

#[async_trait]
impl SiteDriver for SimulatedDriver {
    async fn open(&self, url: &str) -> Result<Box<dyn SiteSession>> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(FormflowError::Transport(format!("cannot navigate to '{}'", url)));
        }
        tracing::debug!(url, "simulated session opened");
        Ok(Box::new(SimulatedSession {
            url: url.to_string(),
            page_after_submit: self.page_after_submit.clone(),
            submitted: false,
            next_node: 0,
        }))
    }
}

struct SimulatedSession {
    url: String,
    page_after_submit: String,
    submitted: bool,
    next_node: u32,
}

#[async_trait]
impl SiteSession for SimulatedSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.url = url.to_string();
        self.submitted = false;
        Ok(())
    }

    async fn locate(&mut self, selector: &str, _timeout: Duration) -> Result<ElementHandle> {
        self.next_node += 1;
        Ok(ElementHandle::new(selector, format!("sim-{}", self.next_node)))
    }

    async fn set_text(&mut self, element: &ElementHandle, value: &str) -> Result<()> {
        tracing::debug!(selector = %element.selector, value, "type");
        Ok(())
    }

    async fn select(&mut self, element: &ElementHandle, value: &str) -> Result<()> {
        tracing::debug!(selector = %element.selector, value, "select");
        Ok(())
    }

    async fn check(&mut self, element: &ElementHandle) -> Result<()> {
        tracing::debug!(selector = %element.selector, "check");
        Ok(())
    }

    async fn click_radio_value(&mut self, element: &ElementHandle, value: &str) -> Result<()> {
        tracing::debug!(selector = %element.selector, value, "radio");
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<()> {
        tracing::debug!(selector, "click");
        self.submitted = true;
        Ok(())
    }

    async fn wait_for_settle(&mut self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    async fn content(&mut self) -> Result<String> {
        if self.submitted {
            Ok(self.page_after_submit.clone())
        } else {
            Ok(format!("<html><body><form action=\"{}\"></form></body></html>", self.url))
        }
    }

    async fn capture_evidence(&mut self, path: &Path) -> Result<()> {
        tracing::info!(path = %path.display(), "evidence capture skipped by simulated driver");
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        tracing::debug!(url = %self.url, "simulated session closed");
        Ok(())
    }
}
