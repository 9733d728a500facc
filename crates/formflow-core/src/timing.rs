//! Timeouts and inter-instruction jitter.
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::error::{FormflowError, Result};

/// Run `fut`, failing with `Timeout` if it outlives `limit`.
pub async fn bounded<T, F>(limit: Duration, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(FormflowError::Timeout(format!(
            "{} exceeded {}ms",
            what,
            limit.as_millis()
        ))),
    }
}

/// Randomized pause between field instructions, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jitter {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Jitter {
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min_ms: min_ms.min(max_ms),
            max_ms: min_ms.max(max_ms),
        }
    }

    pub fn disabled() -> Self {
        Self { min_ms: 0, max_ms: 0 }
    }

    pub fn is_disabled(&self) -> bool {
        self.max_ms == 0
    }

    /// Parse `"min-max"` or a single `"n"`.
    pub fn parse(s: &str) -> Result<Self> {
        let bad = || FormflowError::Config(format!("invalid jitter range '{}'", s));
        match s.split_once('-') {
            Some((lo, hi)) => {
                let lo = lo.trim().parse().map_err(|_| bad())?;
                let hi = hi.trim().parse().map_err(|_| bad())?;
                Ok(Self::new(lo, hi))
            }
            None => {
                let n = s.trim().parse().map_err(|_| bad())?;
                Ok(Self::new(n, n))
            }
        }
    }

    pub fn sample(&self) -> Duration {
        if self.is_disabled() {
            return Duration::ZERO;
        }
        let ms = rand::thread_rng().gen_range(self.min_ms..=self.max_ms);
        Duration::from_millis(ms)
    }

    pub async fn pause(&self) {
        let delay = self.sample();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for Jitter {
    fn default() -> Self {
        Self::new(100, 300)
    }
}
