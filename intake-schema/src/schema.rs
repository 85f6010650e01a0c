//! Form schema assembly and load-time validation.
//!
//! A [`FormSchema`] is static configuration: it is built once (in code, or
//! from a YAML/JSON document) and never mutated at runtime. Every concrete
//! form (eviction response, fee waiver, small claims, ...) is driven by one
//! schema value instead of bespoke per-form code.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::types::{FieldRule, RuleKind, StepDefinition};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Error types for schema construction and loading.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Schema defines no steps
    #[error("schema '{form_type}' has no steps")]
    NoSteps { form_type: String },

    /// The same field appears in more than one step
    #[error("field '{field}' appears in more than one step")]
    DuplicateField { field: String },

    /// A rule references a field that no step renders
    #[error("rule references field '{field}' which is not in any step")]
    OrphanRule { field: String },

    /// A pattern rule holds an invalid regex
    #[error("invalid pattern for field '{field}': {reason}")]
    InvalidPattern { field: String, reason: String },

    /// Length or numeric bounds are inverted
    #[error("inverted bounds for field '{field}': min {min} > max {max}")]
    InvertedBounds { field: String, min: f64, max: f64 },

    /// A cross-field rule points at an unknown field
    #[error("cross-field rule on '{field}' references unknown field '{trigger}'")]
    UnknownTrigger { field: String, trigger: String },

    /// The schema document could not be parsed
    #[error("failed to parse schema: {0}")]
    Parse(String),
}

/// Static descriptor of a multi-step form.
///
/// Immutable at runtime; sessions hold it behind an `Arc`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct FormSchema {
    /// Form identifier (e.g. "eviction_response")
    pub form_type: String,
    /// Ordered steps
    pub steps: Vec<StepDefinition>,
    /// Validation rules by field name
    #[serde(default)]
    pub field_rules: HashMap<String, Vec<FieldRule>>,
}

impl FormSchema {
    /// Start building a schema for the given form type.
    pub fn new(form_type: impl Into<String>) -> Self {
        Self {
            form_type: form_type.into(),
            steps: Vec::new(),
            field_rules: HashMap::new(),
        }
    }

    /// Builder: append a step.
    pub fn with_step(
        mut self,
        label: impl Into<String>,
        fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.steps.push(StepDefinition::new(label, fields));
        self
    }

    /// Builder: attach a rule to a field.
    pub fn with_rule(mut self, field: impl Into<String>, rule: FieldRule) -> Self {
        self.field_rules.entry(field.into()).or_default().push(rule);
        self
    }

    /// Load and validate a schema from a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, SchemaError> {
        let schema: Self =
            serde_yaml::from_str(yaml).map_err(|e| SchemaError::Parse(e.to_string()))?;
        schema.validate()?;
        Ok(schema)
    }

    /// Load and validate a schema from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, SchemaError> {
        let schema: Self =
            serde_json::from_str(json).map_err(|e| SchemaError::Parse(e.to_string()))?;
        schema.validate()?;
        Ok(schema)
    }

    /// Check structural soundness.
    ///
    /// Run automatically by the loaders; call directly when assembling a
    /// schema with the builder methods.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.steps.is_empty() {
            return Err(SchemaError::NoSteps {
                form_type: self.form_type.clone(),
            });
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for step in &self.steps {
            for field in &step.fields {
                if !seen.insert(field.as_str()) {
                    return Err(SchemaError::DuplicateField {
                        field: field.clone(),
                    });
                }
            }
        }

        for (field, rules) in &self.field_rules {
            if !seen.contains(field.as_str()) {
                return Err(SchemaError::OrphanRule {
                    field: field.clone(),
                });
            }

            for rule in rules {
                match &rule.kind {
                    RuleKind::Pattern { pattern } => {
                        if let Err(e) = regex::Regex::new(pattern) {
                            return Err(SchemaError::InvalidPattern {
                                field: field.clone(),
                                reason: e.to_string(),
                            });
                        }
                    }
                    RuleKind::NumericRange { min, max } if min > max => {
                        return Err(SchemaError::InvertedBounds {
                            field: field.clone(),
                            min: *min,
                            max: *max,
                        });
                    }
                    RuleKind::CrossField { trigger_field, .. } => {
                        if !seen.contains(trigger_field.as_str()) {
                            return Err(SchemaError::UnknownTrigger {
                                field: field.clone(),
                                trigger: trigger_field.clone(),
                            });
                        }
                    }
                    _ => {}
                }
            }

            // MinLength/MaxLength pairs on the same field must not cross
            let min = rules.iter().find_map(|r| match r.kind {
                RuleKind::MinLength { min } => Some(min),
                _ => None,
            });
            let max = rules.iter().find_map(|r| match r.kind {
                RuleKind::MaxLength { max } => Some(max),
                _ => None,
            });
            if let (Some(min), Some(max)) = (min, max) {
                if min > max {
                    return Err(SchemaError::InvertedBounds {
                        field: field.clone(),
                        min: min as f64,
                        max: max as f64,
                    });
                }
            }
        }

        Ok(())
    }

    /// Whether any step renders this field.
    pub fn has_field(&self, name: &str) -> bool {
        self.steps.iter().any(|s| s.fields.iter().any(|f| f == name))
    }

    /// Rules attached to a field (empty when none are declared).
    pub fn rules_for(&self, name: &str) -> &[FieldRule] {
        self.field_rules
            .get(name)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Fields carrying a `Required` rule, in step order.
    ///
    /// This is the denominator of the completion percentage.
    pub fn required_fields(&self) -> Vec<&str> {
        self.steps
            .iter()
            .flat_map(|s| s.fields.iter())
            .filter(|f| {
                self.rules_for(f)
                    .iter()
                    .any(|r| matches!(r.kind, RuleKind::Required))
            })
            .map(String::as_str)
            .collect()
    }

    /// Fields whose cross-field rules are triggered by `name`.
    ///
    /// Used to re-validate dependents on every change of the trigger field.
    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        self.field_rules
            .iter()
            .filter(|(field, rules)| {
                field.as_str() != name
                    && rules.iter().any(|r| match &r.kind {
                        RuleKind::CrossField { trigger_field, .. } => trigger_field == name,
                        _ => false,
                    })
            })
            .map(|(field, _)| field.as_str())
            .collect()
    }
}
