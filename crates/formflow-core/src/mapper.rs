//! Field Mapper: parsed PDF fields → ordered site instructions
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::data_model::{FieldValue, ParsedFields};
use crate::error::{FormflowError, Result};

/// How a value is injected into the target page.
///
/// Unrecognised kinds are kept as `Unknown` so that a bad configuration
/// surfaces as a submission failure rather than a deserialization error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InputKind {
    Text,
    Select,
    Checkbox,
    Radio,
    Unknown(String),
}

impl From<String> for InputKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "text" => InputKind::Text,
            "select" => InputKind::Select,
            "checkbox" => InputKind::Checkbox,
            "radio" => InputKind::Radio,
            _ => InputKind::Unknown(s),
        }
    }
}

impl From<InputKind> for String {
    fn from(kind: InputKind) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InputKind::Text => f.write_str("text"),
            InputKind::Select => f.write_str("select"),
            InputKind::Checkbox => f.write_str("checkbox"),
            InputKind::Radio => f.write_str("radio"),
            InputKind::Unknown(other) => f.write_str(other),
        }
    }
}

/// Caller-supplied pure transform.
#[derive(Clone)]
pub struct CustomTransform(Arc<dyn Fn(&FieldValue) -> FieldValue + Send + Sync>);

impl CustomTransform {
    pub fn new(f: impl Fn(&FieldValue) -> FieldValue + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }
}

impl fmt::Debug for CustomTransform {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("CustomTransform(..)")
    }
}

/// Value transform applied before injection.
///
/// Transforms are total: a value of a shape the transform does not handle
/// passes through unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transform {
    Trim,
    Uppercase,
    Lowercase,
    DigitsOnly,
    /// Flag → "Yes" / "No"
    YesNo,
    /// List → Text
    Join { separator: String },
    Lookup {
        table: HashMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<String>,
    },
    #[serde(skip)]
    Custom(CustomTransform),
}

impl Transform {
    pub fn custom(f: impl Fn(&FieldValue) -> FieldValue + Send + Sync + 'static) -> Self {
        Transform::Custom(CustomTransform::new(f))
    }

    pub fn apply(&self, value: &FieldValue) -> FieldValue {
        match (self, value) {
            (Transform::Trim, v) => map_text(v, |s| s.trim().to_string()),
            (Transform::Uppercase, v) => map_text(v, |s| s.to_uppercase()),
            (Transform::Lowercase, v) => map_text(v, |s| s.to_lowercase()),
            (Transform::DigitsOnly, v) => {
                map_text(v, |s| s.chars().filter(|c| c.is_ascii_digit()).collect())
            }
            (Transform::YesNo, FieldValue::Flag(b)) => {
                FieldValue::Text(if *b { "Yes" } else { "No" }.to_string())
            }
            (Transform::Join { separator }, FieldValue::List(items)) => {
                FieldValue::Text(items.join(separator))
            }
            (Transform::Lookup { table, default }, FieldValue::Text(s)) => {
                match table.get(s).or(default.as_ref()) {
                    Some(mapped) => FieldValue::Text(mapped.clone()),
                    None => value.clone(),
                }
            }
            (Transform::Custom(f), v) => (f.0)(v),
            (_, v) => v.clone(),
        }
    }
}

fn map_text(value: &FieldValue, f: impl Fn(&str) -> String) -> FieldValue {
    match value {
        FieldValue::Text(s) => FieldValue::Text(f(s)),
        FieldValue::List(items) => FieldValue::List(items.iter().map(|s| f(s)).collect()),
        other => other.clone(),
    }
}

/// Maps one parsed PDF field onto one element of the target page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMapping {
    pub source_field: String,
    pub target_selector: String,
    pub input_kind: InputKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
}

impl FieldMapping {
    pub fn new(
        source_field: impl Into<String>,
        target_selector: impl Into<String>,
        input_kind: InputKind,
    ) -> Self {
        Self {
            source_field: source_field.into(),
            target_selector: target_selector.into(),
            input_kind,
            transform: None,
        }
    }

    pub fn text(source_field: impl Into<String>, target_selector: impl Into<String>) -> Self {
        Self::new(source_field, target_selector, InputKind::Text)
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }
}

/// A single, already-transformed injection step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyInstruction {
    pub source_field: String,
    pub selector: String,
    pub kind: InputKind,
    pub value: FieldValue,
}

/// Builds the ordered instruction list for one submission.
///
/// Kinds are validated for every mapping up front. Mappings whose source
/// field is missing or null are skipped; the first mapping for a given
/// selector wins.
pub fn plan_instructions(
    fields: &ParsedFields,
    mappings: &[FieldMapping],
) -> Result<Vec<ApplyInstruction>> {
    for mapping in mappings {
        if let InputKind::Unknown(kind) = &mapping.input_kind {
            return Err(FormflowError::Config(format!(
                "mapping for '{}' has unsupported input kind '{}'",
                mapping.source_field, kind
            )));
        }
        if mapping.target_selector.trim().is_empty() {
            return Err(FormflowError::Config(format!(
                "mapping for '{}' has an empty selector",
                mapping.source_field
            )));
        }
    }

    let mut seen = HashSet::new();
    let mut plan = Vec::with_capacity(mappings.len());

    for mapping in mappings {
        let value = match fields.get(&mapping.source_field) {
            Some(v) if !v.is_null() => v,
            _ => continue,
        };

        if !seen.insert(mapping.target_selector.as_str()) {
            tracing::debug!(
                selector = %mapping.target_selector,
                field = %mapping.source_field,
                "duplicate selector dropped"
            );
            continue;
        }

        let value = match &mapping.transform {
            Some(transform) => transform.apply(value),
            None => value.clone(),
        };

        plan.push(ApplyInstruction {
            source_field: mapping.source_field.clone(),
            selector: mapping.target_selector.clone(),
            kind: mapping.input_kind.clone(),
            value,
        });
    }

    Ok(plan)
}
