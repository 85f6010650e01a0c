//! Core types for declarative form schemas.
//!
//! These types model a multi-step intake form: ordered steps, per-field
//! validation rules, and the values a session collects.
//!
//! With the `typescript` feature enabled, these types can be exported to
//! TypeScript using ts-rs for consistency with the web frontend.

use serde::{Deserialize, Serialize};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// A value held by a single form field.
///
/// Serialized untagged so drafts read naturally as JSON
/// (`"Jane Doe"`, `500`, `true`, `["nonpayment", "repairs"]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(untagged)]
pub enum FieldValue {
    /// Checkbox / toggle input
    Flag(bool),
    /// Numeric input
    Number(f64),
    /// Free text input
    Text(String),
    /// Multi-select input (e.g. selected defenses)
    List(Vec<String>),
}

impl FieldValue {
    /// Whether this value counts as empty for `Required` checks.
    ///
    /// Only missing values, blank text, and empty lists are empty.
    /// A stored number or flag is always a value, including `false`.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.trim().is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Number(_) | Self::Flag(_) => false,
        }
    }

    /// Interpret the value as a number, parsing text if needed.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Borrow the value as text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Flag(b)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

/// Outcome of validating a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ValidationResult {
    /// Whether the field passed all of its rules
    pub valid: bool,
    /// Error message for the first failing rule
    pub message: Option<String>,
}

impl ValidationResult {
    /// A passing result.
    pub fn ok() -> Self {
        Self {
            valid: true,
            message: None,
        }
    }

    /// A failing result with the given message.
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: Some(message.into()),
        }
    }
}

/// One step of a multi-step form: a labeled, ordered subset of fields
/// shown together in the UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct StepDefinition {
    /// Human-readable step label (e.g. "Your information")
    pub label: String,
    /// Field names rendered on this step
    pub fields: Vec<String>,
}

impl StepDefinition {
    /// Create a step definition.
    pub fn new(label: impl Into<String>, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            label: label.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

/// The kind of check a rule performs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleKind {
    /// Fails when the value is missing, blank text, or an empty list
    Required,
    /// Minimum text length
    MinLength { min: usize },
    /// Maximum text length
    MaxLength { max: usize },
    /// Regex the text value must match (case numbers, phone numbers)
    Pattern { pattern: String },
    /// Numeric value, or text parseable as one, within `[min, max]`
    NumericRange { min: f64, max: f64 },
    /// Field becomes required when another field is non-empty, or equals
    /// `trigger_value` when one is given. Evaluated after primary rules.
    CrossField {
        trigger_field: String,
        trigger_value: Option<FieldValue>,
    },
}

impl RuleKind {
    /// Whether this rule depends on other fields' values.
    pub fn is_cross_field(&self) -> bool {
        matches!(self, Self::CrossField { .. })
    }
}

/// A validation rule attached to a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct FieldRule {
    /// What the rule checks
    #[serde(flatten)]
    pub kind: RuleKind,
    /// Optional message override; `{min}` and `{max}` are interpolated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl FieldRule {
    /// Create a rule with the default message.
    pub fn new(kind: RuleKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }

    /// A `Required` rule.
    pub fn required() -> Self {
        Self::new(RuleKind::Required)
    }

    /// A `MinLength` rule.
    pub fn min_length(min: usize) -> Self {
        Self::new(RuleKind::MinLength { min })
    }

    /// A `MaxLength` rule.
    pub fn max_length(max: usize) -> Self {
        Self::new(RuleKind::MaxLength { max })
    }

    /// A `Pattern` rule.
    pub fn pattern(pattern: impl Into<String>) -> Self {
        Self::new(RuleKind::Pattern {
            pattern: pattern.into(),
        })
    }

    /// A `NumericRange` rule.
    pub fn numeric_range(min: f64, max: f64) -> Self {
        Self::new(RuleKind::NumericRange { min, max })
    }

    /// A `CrossField` rule triggered whenever `trigger_field` is non-empty.
    pub fn required_with(trigger_field: impl Into<String>) -> Self {
        Self::new(RuleKind::CrossField {
            trigger_field: trigger_field.into(),
            trigger_value: None,
        })
    }

    /// Override the error message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
