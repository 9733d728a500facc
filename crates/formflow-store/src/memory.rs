//! In-memory form and submission stores.
//!
//! Each update replaces one whole record under a write lock, so fields of
//! different records never interleave.

use async_trait::async_trait;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tokio::sync::RwLock;

use formflow_core::{
    FormFilter, FormRecord, FormStore, FormflowError, Page, PageRequest, Result, SubmissionFilter,
    SubmissionRecord, SubmissionStore,
};

#[derive(Default)]
pub struct InMemoryFormStore {
    forms: RwLock<HashMap<String, FormRecord>>,
}

impl InMemoryFormStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FormStore for InMemoryFormStore {
    async fn save(&self, form: FormRecord) -> Result<FormRecord> {
        match self.forms.write().await.entry(form.id.clone()) {
            Entry::Occupied(_) => {
                Err(FormflowError::Store(format!("form {} already exists", form.id)))
            }
            Entry::Vacant(slot) => {
                slot.insert(form.clone());
                Ok(form)
            }
        }
    }

    async fn get(&self, id: &str) -> Result<Option<FormRecord>> {
        Ok(self.forms.read().await.get(id).cloned())
    }

    async fn update(&self, form: FormRecord) -> Result<FormRecord> {
        let mut forms = self.forms.write().await;
        match forms.get_mut(&form.id) {
            Some(slot) => {
                *slot = form.clone();
                Ok(form)
            }
            None => Err(FormflowError::Store(format!("form {} not found", form.id))),
        }
    }

    async fn list(&self, filter: &FormFilter, page: PageRequest) -> Result<Page<FormRecord>> {
        let mut matching: Vec<FormRecord> = self
            .forms
            .read()
            .await
            .values()
            .filter(|f| filter.matches(f))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at).then_with(|| a.id.cmp(&b.id)));
        Ok(page.paginate(&matching))
    }
}

#[derive(Default)]
pub struct InMemorySubmissionStore {
    submissions: RwLock<HashMap<String, SubmissionRecord>>,
}

impl InMemorySubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubmissionStore for InMemorySubmissionStore {
    async fn save(&self, record: SubmissionRecord) -> Result<SubmissionRecord> {
        match self.submissions.write().await.entry(record.id.clone()) {
            Entry::Occupied(_) => Err(FormflowError::Store(format!(
                "submission {} already exists",
                record.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn update(&self, record: SubmissionRecord) -> Result<SubmissionRecord> {
        let mut submissions = self.submissions.write().await;
        match submissions.get_mut(&record.id) {
            Some(slot) => {
                *slot = record.clone();
                Ok(record)
            }
            None => Err(FormflowError::Store(format!(
                "submission {} not found",
                record.id
            ))),
        }
    }

    async fn get(&self, id: &str) -> Result<Option<SubmissionRecord>> {
        Ok(self.submissions.read().await.get(id).cloned())
    }

    async fn list(
        &self,
        filter: &SubmissionFilter,
        page: PageRequest,
    ) -> Result<Page<SubmissionRecord>> {
        let mut matching: Vec<SubmissionRecord> = self
            .submissions
            .read()
            .await
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.submitted_at
                .cmp(&a.submitted_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(page.paginate(&matching))
    }
}
