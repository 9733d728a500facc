//! Target configuration: how to drive one specific website.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{FormflowError, Result};
use crate::mapper::FieldMapping;
use crate::step::SiteStep;

pub const DEFAULT_SUBMIT_SELECTOR: &str = "button[type=\"submit\"]";
pub const DEFAULT_SUCCESS_MARKER: &str = "success";

/// Which marker wins when a page shows both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerPrecedence {
    #[default]
    ErrorFirst,
    SuccessFirst,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub field_mappings: Vec<FieldMapping>,

    #[serde(default = "default_submit_selector")]
    pub submit_selector: String,

    #[serde(default = "default_success_marker")]
    pub success_marker: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_marker: Option<String>,

    #[serde(default)]
    pub precedence: MarkerPrecedence,

    /// Run after the session opens, before any field is filled
    #[serde(default)]
    pub pre_steps: Vec<SiteStep>,

    /// Run after the submit settles, before the page is inspected
    #[serde(default)]
    pub post_steps: Vec<SiteStep>,

    #[serde(default)]
    pub capture_evidence: bool,
}

fn default_submit_selector() -> String {
    DEFAULT_SUBMIT_SELECTOR.to_string()
}

fn default_success_marker() -> String {
    DEFAULT_SUCCESS_MARKER.to_string()
}

impl TargetConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            field_mappings: Vec::new(),
            submit_selector: default_submit_selector(),
            success_marker: default_success_marker(),
            error_marker: None,
            precedence: MarkerPrecedence::default(),
            pre_steps: Vec::new(),
            post_steps: Vec::new(),
            capture_evidence: false,
        }
    }

    pub fn with_mappings(mut self, mappings: Vec<FieldMapping>) -> Self {
        self.field_mappings = mappings;
        self
    }

    pub fn with_markers(mut self, success: impl Into<String>, error: Option<&str>) -> Self {
        self.success_marker = success.into();
        self.error_marker = error.map(str::to_string);
        self
    }

    pub fn with_precedence(mut self, precedence: MarkerPrecedence) -> Self {
        self.precedence = precedence;
        self
    }

    pub fn with_pre_steps(mut self, steps: Vec<SiteStep>) -> Self {
        self.pre_steps = steps;
        self
    }

    pub fn with_post_steps(mut self, steps: Vec<SiteStep>) -> Self {
        self.post_steps = steps;
        self
    }

    /// Checks required fields. Input kinds are checked by the mapper.
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(FormflowError::Config("target url is required".to_string()));
        }
        if self.submit_selector.trim().is_empty() {
            return Err(FormflowError::Config("submit selector is required".to_string()));
        }
        if self.success_marker.is_empty() {
            return Err(FormflowError::Config("success marker is required".to_string()));
        }
        Ok(())
    }
}

/// Partial configuration supplied with a submission request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetOverrides {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub field_mappings: Option<Vec<FieldMapping>>,
    #[serde(default)]
    pub submit_selector: Option<String>,
    #[serde(default)]
    pub success_marker: Option<String>,
    #[serde(default)]
    pub error_marker: Option<String>,
    #[serde(default)]
    pub precedence: Option<MarkerPrecedence>,
    #[serde(default)]
    pub pre_steps: Option<Vec<SiteStep>>,
    #[serde(default)]
    pub post_steps: Option<Vec<SiteStep>>,
    #[serde(default)]
    pub capture_evidence: Option<bool>,
}

impl TargetOverrides {
    pub fn apply_to(self, mut base: TargetConfig) -> TargetConfig {
        if let Some(url) = self.url {
            base.url = url;
        }
        if let Some(mappings) = self.field_mappings {
            base.field_mappings = mappings;
        }
        if let Some(selector) = self.submit_selector {
            base.submit_selector = selector;
        }
        if let Some(marker) = self.success_marker {
            base.success_marker = marker;
        }
        if let Some(marker) = self.error_marker {
            base.error_marker = Some(marker);
        }
        if let Some(precedence) = self.precedence {
            base.precedence = precedence;
        }
        if let Some(steps) = self.pre_steps {
            base.pre_steps = steps;
        }
        if let Some(steps) = self.post_steps {
            base.post_steps = steps;
        }
        if let Some(capture) = self.capture_evidence {
            base.capture_evidence = capture;
        }
        base
    }
}

/// Named target configurations, usually loaded from YAML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetCatalog {
    #[serde(default)]
    targets: BTreeMap<String, TargetConfig>,
}

impl TargetCatalog {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| FormflowError::Config(format!("invalid target catalog: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            FormflowError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn insert(&mut self, name: impl Into<String>, config: TargetConfig) {
        self.targets.insert(name.into(), config);
    }

    pub fn get(&self, name: &str) -> Option<&TargetConfig> {
        self.targets.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.targets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Build the effective configuration for one request.
    ///
    /// Precedence, lowest first: defaults, the named catalog entry, inline
    /// overrides, then an explicit target website.
    pub fn resolve(
        &self,
        name: Option<&str>,
        overrides: Option<TargetOverrides>,
        target_website: Option<&str>,
    ) -> Result<TargetConfig> {
        let base = match name {
            Some(name) => self
                .get(name)
                .cloned()
                .ok_or_else(|| FormflowError::Config(format!("unknown target '{}'", name)))?,
            None => TargetConfig::new(""),
        };
        let mut config = match overrides {
            Some(overrides) => overrides.apply_to(base),
            None => base,
        };
        if let Some(url) = target_website.filter(|u| !u.trim().is_empty()) {
            config.url = url.to_string();
        }
        config.validate()?;
        Ok(config)
    }
}
