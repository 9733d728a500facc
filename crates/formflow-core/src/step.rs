//! Site Steps: pre/post interaction actions over a session.
//!
//! Steps are a closed capability set (navigate, fill, click, wait) rather
//! than arbitrary code, so target configurations stay declarative.
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::Result;
use crate::session::SiteSession;
use crate::timing::bounded;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SiteStep {
    Navigate { url: String },
    Click { selector: String },
    Fill { selector: String, value: String },
    WaitFor { selector: String },
    Settle,
    Pause { millis: u64 },
}

/// Time limits shared by steps and field instructions.
#[derive(Debug, Clone, Copy)]
pub struct StepLimits {
    pub locate_timeout: Duration,
    pub settle_timeout: Duration,
}

impl SiteStep {
    /// Short label used in logs
    pub fn id(&self) -> &'static str {
        match self {
            SiteStep::Navigate { .. } => "navigate",
            SiteStep::Click { .. } => "click",
            SiteStep::Fill { .. } => "fill",
            SiteStep::WaitFor { .. } => "wait_for",
            SiteStep::Settle => "settle",
            SiteStep::Pause { .. } => "pause",
        }
    }

    pub async fn run(&self, session: &mut dyn SiteSession, limits: &StepLimits) -> Result<()> {
        match self {
            SiteStep::Navigate { url } => {
                bounded(limits.settle_timeout, "navigation", session.navigate(url)).await
            }
            SiteStep::Click { selector } => {
                locate(session, selector, limits).await?;
                session.click(selector).await
            }
            SiteStep::Fill { selector, value } => {
                let element = locate(session, selector, limits).await?;
                session.set_text(&element, value).await
            }
            SiteStep::WaitFor { selector } => locate(session, selector, limits).await.map(|_| ()),
            SiteStep::Settle => {
                bounded(
                    limits.settle_timeout,
                    "settle",
                    session.wait_for_settle(limits.settle_timeout),
                )
                .await
            }
            SiteStep::Pause { millis } => {
                tokio::time::sleep(Duration::from_millis(*millis)).await;
                Ok(())
            }
        }
    }
}

/// Locate with both the driver's own wait and a hard outer bound.
pub(crate) async fn locate(
    session: &mut dyn SiteSession,
    selector: &str,
    limits: &StepLimits,
) -> Result<crate::session::ElementHandle> {
    // small grace so the driver's own timeout error wins when it reports one
    let outer = limits.locate_timeout + Duration::from_millis(50);
    bounded(
        outer,
        &format!("locating '{}'", selector),
        session.locate(selector, limits.locate_timeout),
    )
    .await
}
