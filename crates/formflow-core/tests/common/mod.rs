//! Test doubles: a scripted site driver and minimal stores.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use formflow_core::{
    ElementHandle, EngineSettings, EventLog, FormflowError, Jitter, LogEntry, LogFilter, Page,
    PageRequest, Result, SiteDriver, SiteSession, SubmissionEngine, SubmissionFilter,
    SubmissionRecord, SubmissionStore,
};

/// What the fake site does.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub open_error: Option<String>,
    /// Selectors that never appear: locate waits its timeout then fails
    pub missing: HashSet<String>,
    /// Selectors whose locate never returns
    pub hanging: HashSet<String>,
    pub page_after_submit: String,
    pub evidence_error: Option<String>,
    /// The post-submit settle never returns
    pub hanging_settle: bool,
    pub content_error: Option<String>,
    pub close_error: Option<String>,
}

impl Script {
    pub fn page(content: &str) -> Self {
        Self {
            page_after_submit: content.to_string(),
            ..Default::default()
        }
    }

    pub fn missing(mut self, selector: &str) -> Self {
        self.missing.insert(selector.to_string());
        self
    }

    pub fn hanging(mut self, selector: &str) -> Self {
        self.hanging.insert(selector.to_string());
        self
    }

    pub fn hanging_settle(mut self) -> Self {
        self.hanging_settle = true;
        self
    }

    pub fn content_error(mut self, err: &str) -> Self {
        self.content_error = Some(err.to_string());
        self
    }

    pub fn close_error(mut self, err: &str) -> Self {
        self.close_error = Some(err.to_string());
        self
    }
}

#[derive(Clone, Default)]
pub struct ScriptedDriver {
    pub script: Script,
    pub opens: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
    pub actions: Arc<Mutex<Vec<String>>>,
}

impl ScriptedDriver {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            ..Default::default()
        }
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().unwrap().clone()
    }
}

#[async_trait]
impl SiteDriver for ScriptedDriver {
    async fn open(&self, url: &str) -> Result<Box<dyn SiteSession>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.script.open_error {
            return Err(FormflowError::Transport(err.clone()));
        }
        self.actions.lock().unwrap().push(format!("open {}", url));
        Ok(Box::new(ScriptedSession {
            script: self.script.clone(),
            closes: self.closes.clone(),
            actions: self.actions.clone(),
            submitted: false,
        }))
    }
}

struct ScriptedSession {
    script: Script,
    closes: Arc<AtomicUsize>,
    actions: Arc<Mutex<Vec<String>>>,
    submitted: bool,
}

impl ScriptedSession {
    fn record(&self, action: String) {
        self.actions.lock().unwrap().push(action);
    }
}

#[async_trait]
impl SiteSession for ScriptedSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.record(format!("navigate {}", url));
        Ok(())
    }

    async fn locate(&mut self, selector: &str, timeout: Duration) -> Result<ElementHandle> {
        if self.script.hanging.contains(selector) {
            std::future::pending::<()>().await;
        }
        if self.script.missing.contains(selector) {
            tokio::time::sleep(timeout).await;
            return Err(FormflowError::ElementNotFound {
                selector: selector.to_string(),
                waited_ms: timeout.as_millis() as u64,
            });
        }
        Ok(ElementHandle::new(selector, format!("node:{}", selector)))
    }

    async fn set_text(&mut self, element: &ElementHandle, value: &str) -> Result<()> {
        self.record(format!("text {}={}", element.selector, value));
        Ok(())
    }

    async fn select(&mut self, element: &ElementHandle, value: &str) -> Result<()> {
        self.record(format!("select {}={}", element.selector, value));
        Ok(())
    }

    async fn check(&mut self, element: &ElementHandle) -> Result<()> {
        self.record(format!("check {}", element.selector));
        Ok(())
    }

    async fn click_radio_value(&mut self, element: &ElementHandle, value: &str) -> Result<()> {
        self.record(format!("radio {}={}", element.selector, value));
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<()> {
        self.record(format!("click {}", selector));
        if selector.contains("submit") {
            self.submitted = true;
        }
        Ok(())
    }

    async fn wait_for_settle(&mut self, _timeout: Duration) -> Result<()> {
        if self.submitted && self.script.hanging_settle {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn content(&mut self) -> Result<String> {
        if let Some(err) = &self.script.content_error {
            return Err(FormflowError::Transport(err.clone()));
        }
        if self.submitted {
            Ok(self.script.page_after_submit.clone())
        } else {
            Ok("<form></form>".to_string())
        }
    }

    async fn capture_evidence(&mut self, path: &Path) -> Result<()> {
        self.record(format!("evidence {}", path.display()));
        match &self.script.evidence_error {
            Some(err) => Err(FormflowError::Transport(err.clone())),
            None => Ok(()),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.record("close".to_string());
        match &self.script.close_error {
            Some(err) => Err(FormflowError::Transport(err.clone())),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct MemSubmissions {
    records: Mutex<HashMap<String, SubmissionRecord>>,
    offline: AtomicBool,
}

impl MemSubmissions {
    /// Every later read fails with a `Store` error.
    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub fn snapshot(&self, id: &str) -> Option<SubmissionRecord> {
        self.records.lock().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl SubmissionStore for MemSubmissions {
    async fn save(&self, record: SubmissionRecord) -> Result<SubmissionRecord> {
        let mut records = self.records.lock().unwrap();
        if records.contains_key(&record.id) {
            return Err(FormflowError::Store(format!("submission {} exists", record.id)));
        }
        records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn update(&self, record: SubmissionRecord) -> Result<SubmissionRecord> {
        let mut records = self.records.lock().unwrap();
        if !records.contains_key(&record.id) {
            return Err(FormflowError::Store(format!("submission {} not found", record.id)));
        }
        records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn get(&self, id: &str) -> Result<Option<SubmissionRecord>> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(FormflowError::Store("submission store offline".into()));
        }
        Ok(self.snapshot(id))
    }

    async fn list(
        &self,
        filter: &SubmissionFilter,
        page: PageRequest,
    ) -> Result<Page<SubmissionRecord>> {
        let records: Vec<_> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        Ok(page.paginate(&records))
    }
}

#[derive(Default)]
pub struct MemLog {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemLog {
    pub fn for_submission(&self, id: &str) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.submission_id.as_deref() == Some(id))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventLog for MemLog {
    async fn append(&self, entry: LogEntry) -> Result<LogEntry> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(entry)
    }

    async fn query(&self, filter: &LogFilter, page: PageRequest) -> Result<Page<LogEntry>> {
        let entries: Vec<_> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        Ok(page.paginate(&entries))
    }
}

pub struct Harness {
    pub driver: ScriptedDriver,
    pub submissions: Arc<MemSubmissions>,
    pub log: Arc<MemLog>,
    pub engine: SubmissionEngine,
}

pub fn fast_settings() -> EngineSettings {
    EngineSettings {
        locate_timeout: Duration::from_millis(50),
        settle_timeout: Duration::from_millis(500),
        jitter: Jitter::disabled(),
        evidence_dir: "evidence".into(),
    }
}

pub fn harness(script: Script) -> Harness {
    harness_with(script, fast_settings())
}

pub fn harness_with(script: Script, settings: EngineSettings) -> Harness {
    let driver = ScriptedDriver::new(script);
    let submissions = Arc::new(MemSubmissions::default());
    let log = Arc::new(MemLog::default());
    let engine = SubmissionEngine::new(
        Arc::new(driver.clone()),
        submissions.clone(),
        log.clone(),
        settings,
    );
    Harness {
        driver,
        submissions,
        log,
        engine,
    }
}
