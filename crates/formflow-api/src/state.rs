//! Shared application state handed to every handler.
use std::sync::Arc;

use formflow_core::{
    EventLog, FormStore, Notifier, SiteDriver, SubmissionEngine, SubmissionStore, TargetCatalog,
};
use formflow_store::{InMemoryEventLog, InMemoryFormStore, InMemorySubmissionStore};

use crate::config::ServerConfig;
use crate::driver::SimulatedDriver;
use crate::metrics::Metrics;
use crate::notifier::{LogMailer, MailNotifier};
use crate::service::SubmissionService;

#[derive(Clone)]
pub struct AppState {
    pub forms: Arc<dyn FormStore>,
    pub submissions: Arc<dyn SubmissionStore>,
    pub log: Arc<dyn EventLog>,
    pub catalog: Arc<TargetCatalog>,
    pub service: SubmissionService,
    pub metrics: Metrics,
}

impl AppState {
    /// In-memory stores around the given driver and notifier.
    pub fn build(
        config: &ServerConfig,
        catalog: TargetCatalog,
        driver: Arc<dyn SiteDriver>,
        notifier: Arc<dyn Notifier>,
    ) -> anyhow::Result<Self> {
        let forms: Arc<dyn FormStore> = Arc::new(InMemoryFormStore::new());
        let submissions: Arc<dyn SubmissionStore> = Arc::new(InMemorySubmissionStore::new());
        let log: Arc<dyn EventLog> =
            Arc::new(InMemoryEventLog::with_max_entries(config.log_capacity));
        let metrics =
            Metrics::new().map_err(|e| anyhow::anyhow!("metrics registry: {}", e))?;

        let engine = Arc::new(SubmissionEngine::new(
            driver,
            submissions.clone(),
            log.clone(),
            config.engine.clone(),
        ));
        let service = SubmissionService::new(
            forms.clone(),
            submissions.clone(),
            log.clone(),
            engine,
            notifier,
            metrics.clone(),
        )
        .with_target_capacity(config.target_capacity);

        Ok(Self {
            forms,
            submissions,
            log,
            catalog: Arc::new(catalog),
            service,
            metrics,
        })
    }

    /// Simulated driver and log-only mail, catalog from `targets_path`.
    pub fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        let catalog = match &config.targets_path {
            Some(path) => TargetCatalog::load(path)?,
            None => TargetCatalog::default(),
        };
        tracing::info!(targets = catalog.len(), "target catalog loaded");

        let driver = Arc::new(SimulatedDriver::new(config.simulated_page.clone()));
        let notifier = Arc::new(MailNotifier::new(
            Arc::new(LogMailer),
            config.mail_from.clone(),
            config.admin_emails.clone(),
        ));
        Self::build(config, catalog, driver, notifier)
    }
}
