//! Field rule evaluation.
//!
//! [`validate_field`] is a pure function of its inputs: the same value,
//! context and rules always produce the same result. Rules run in
//! declaration order with first-failure-wins, except cross-field rules,
//! which always run after every primary rule has passed.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use regex::Regex;
use tracing::warn;

use crate::schema::FormSchema;
use crate::types::{FieldRule, FieldValue, RuleKind, ValidationResult};

/// Validate one field against its rules.
///
/// `value` is the field's current value (absent when never set) and
/// `all_values` the full form state, consulted only by cross-field rules.
pub fn validate_field(
    name: &str,
    value: Option<&FieldValue>,
    all_values: &HashMap<String, FieldValue>,
    rules: &[FieldRule],
) -> ValidationResult {
    let (primary, cross): (Vec<&FieldRule>, Vec<&FieldRule>) =
        rules.iter().partition(|r| !r.kind.is_cross_field());

    for rule in primary.into_iter().chain(cross) {
        let result = apply_rule(name, value, all_values, rule);
        if !result.valid {
            return result;
        }
    }

    ValidationResult::ok()
}

/// Validate every field of the schema, producing the session's error map.
///
/// Fields with no failing rules are absent from the map.
pub fn validate_all(
    schema: &FormSchema,
    values: &HashMap<String, FieldValue>,
) -> HashMap<String, String> {
    let mut errors = HashMap::new();

    for step in &schema.steps {
        for field in &step.fields {
            let result = validate_field(field, values.get(field), values, schema.rules_for(field));
            if let Some(message) = result.message {
                errors.insert(field.clone(), message);
            }
        }
    }

    errors
}

fn apply_rule(
    name: &str,
    value: Option<&FieldValue>,
    all_values: &HashMap<String, FieldValue>,
    rule: &FieldRule,
) -> ValidationResult {
    let empty = value.map(FieldValue::is_empty).unwrap_or(true);

    match &rule.kind {
        RuleKind::Required => {
            if empty {
                ValidationResult::fail(message_for(rule, "This field is required", &[]))
            } else {
                ValidationResult::ok()
            }
        }

        // Length and pattern rules only constrain present values; emptiness
        // is Required's concern.
        RuleKind::MinLength { min } => match value {
            _ if empty => ValidationResult::ok(),
            Some(FieldValue::Text(s)) if s.chars().count() < *min => ValidationResult::fail(
                message_for(
                    rule,
                    "Must be at least {min} characters",
                    &[("{min}", min.to_string())],
                ),
            ),
            Some(FieldValue::Text(_)) => ValidationResult::ok(),
            Some(_) => ValidationResult::fail("Expected a text value"),
            None => ValidationResult::ok(),
        },

        RuleKind::MaxLength { max } => match value {
            _ if empty => ValidationResult::ok(),
            Some(FieldValue::Text(s)) if s.chars().count() > *max => ValidationResult::fail(
                message_for(
                    rule,
                    "Must be at most {max} characters",
                    &[("{max}", max.to_string())],
                ),
            ),
            Some(FieldValue::Text(_)) => ValidationResult::ok(),
            Some(_) => ValidationResult::fail("Expected a text value"),
            None => ValidationResult::ok(),
        },

        RuleKind::Pattern { pattern } => {
            if empty {
                return ValidationResult::ok();
            }
            let Some(text) = value.and_then(FieldValue::as_text) else {
                return ValidationResult::fail("Expected a text value");
            };
            match compiled_pattern(name, pattern) {
                Some(re) if re.is_match(text) => ValidationResult::ok(),
                Some(_) => ValidationResult::fail(message_for(rule, "Invalid format", &[])),
                None => ValidationResult::fail("Invalid format"),
            }
        }

        RuleKind::NumericRange { min, max } => {
            if empty {
                return ValidationResult::ok();
            }
            match value.and_then(FieldValue::as_number) {
                // "NaN" and "inf" parse as f64 but are never valid amounts
                Some(n) if !n.is_finite() => {
                    ValidationResult::fail(message_for(rule, "Must be a number", &[]))
                }
                None => ValidationResult::fail(message_for(rule, "Must be a number", &[])),
                Some(n) if n < *min || n > *max => ValidationResult::fail(message_for(
                    rule,
                    "Must be between {min} and {max}",
                    &[("{min}", min.to_string()), ("{max}", max.to_string())],
                )),
                Some(_) => ValidationResult::ok(),
            }
        }

        RuleKind::CrossField {
            trigger_field,
            trigger_value,
        } => {
            let triggered = match (all_values.get(trigger_field), trigger_value) {
                (Some(actual), Some(expected)) => actual == expected,
                (Some(actual), None) => !actual.is_empty(),
                (None, _) => false,
            };

            if triggered && empty {
                ValidationResult::fail(message_for(rule, "This field is required", &[]))
            } else {
                ValidationResult::ok()
            }
        }
    }
}

/// Look up or compile the regex for a pattern rule.
///
/// Schema validation already compiled every pattern once at load, so the
/// per-validation path is a cache hit; `Regex` clones share the compiled
/// program. `None` only for hand-built, unvalidated schemas with a bad
/// pattern.
fn compiled_pattern(field: &str, pattern: &str) -> Option<Regex> {
    static CACHE: OnceLock<RwLock<HashMap<String, Regex>>> = OnceLock::new();
    let cache = CACHE.get_or_init(|| RwLock::new(HashMap::new()));

    if let Ok(map) = cache.read() {
        if let Some(re) = map.get(pattern) {
            return Some(re.clone());
        }
    }

    match Regex::new(pattern) {
        Ok(re) => {
            if let Ok(mut map) = cache.write() {
                map.insert(pattern.to_string(), re.clone());
            }
            Some(re)
        }
        Err(e) => {
            warn!(field, error = %e, "unparseable pattern rule");
            None
        }
    }
}

/// Pick the rule's message override or the default, interpolating bounds.
fn message_for(rule: &FieldRule, default: &str, substitutions: &[(&str, String)]) -> String {
    let mut message = rule
        .message
        .clone()
        .unwrap_or_else(|| default.to_string());
    for (placeholder, value) in substitutions {
        message = message.replace(placeholder, value);
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldRule;

    fn no_context() -> HashMap<String, FieldValue> {
        HashMap::new()
    }

    #[test]
    fn test_required_fails_only_on_empty() {
        let rules = [FieldRule::required()];
        let ctx = no_context();

        assert!(!validate_field("name", None, &ctx, &rules).valid);
        assert!(!validate_field("name", Some(&"".into()), &ctx, &rules).valid);
        assert!(!validate_field("name", Some(&FieldValue::List(vec![])), &ctx, &rules).valid);

        assert!(validate_field("name", Some(&"Jane Doe".into()), &ctx, &rules).valid);
        assert!(validate_field("name", Some(&FieldValue::Flag(false)), &ctx, &rules).valid);
        assert!(validate_field("name", Some(&FieldValue::Number(0.0)), &ctx, &rules).valid);
    }

    #[test]
    fn test_length_bounds_with_templated_message() {
        let rules = [FieldRule::min_length(5)];
        let ctx = no_context();

        let result = validate_field("summary", Some(&"hi".into()), &ctx, &rules);
        assert!(!result.valid);
        assert_eq!(result.message.as_deref(), Some("Must be at least 5 characters"));

        assert!(validate_field("summary", Some(&"hello".into()), &ctx, &rules).valid);
        // Empty values are Required's concern, not MinLength's
        assert!(validate_field("summary", Some(&"".into()), &ctx, &rules).valid);
        assert!(validate_field("summary", None, &ctx, &rules).valid);

        let rules = [FieldRule::max_length(3)];
        assert!(!validate_field("code", Some(&"toolong".into()), &ctx, &rules).valid);
        assert!(validate_field("code", Some(&"ok".into()), &ctx, &rules).valid);
    }

    #[test]
    fn test_pattern_rule() {
        let rules = [FieldRule::pattern(r"^\d{3}-\d{4}$")];
        let ctx = no_context();

        assert!(validate_field("phone", Some(&"555-0123".into()), &ctx, &rules).valid);
        assert!(!validate_field("phone", Some(&"555 0123".into()), &ctx, &rules).valid);
        assert!(validate_field("phone", None, &ctx, &rules).valid);
    }

    #[test]
    fn test_numeric_range_rule() {
        let rules = [FieldRule::numeric_range(0.0, 10_000.0)];
        let ctx = no_context();

        assert!(validate_field("amount", Some(&FieldValue::Number(500.0)), &ctx, &rules).valid);
        assert!(validate_field("amount", Some(&"500".into()), &ctx, &rules).valid);

        let result = validate_field("amount", Some(&"abc".into()), &ctx, &rules);
        assert!(!result.valid);
        assert_eq!(result.message.as_deref(), Some("Must be a number"));

        let result = validate_field("amount", Some(&FieldValue::Number(15_000.0)), &ctx, &rules);
        assert!(!result.valid);
        assert_eq!(
            result.message.as_deref(),
            Some("Must be between 0 and 10000")
        );
    }

    #[test]
    fn test_numeric_range_rejects_non_finite_values() {
        let rules = [FieldRule::numeric_range(0.0, 10_000.0)];
        let ctx = no_context();

        // f64 parsing accepts these spellings; a range gate must not
        for text in ["NaN", "nan", "inf", "-inf", "infinity"] {
            let result = validate_field("amount", Some(&text.into()), &ctx, &rules);
            assert!(!result.valid, "{text:?} slipped through");
            assert_eq!(result.message.as_deref(), Some("Must be a number"));
        }

        let result = validate_field("amount", Some(&FieldValue::Number(f64::NAN)), &ctx, &rules);
        assert!(!result.valid);
    }

    #[test]
    fn test_cross_field_required_when_trigger_set() {
        let rules = [FieldRule::required_with("defenses")];

        let mut ctx = HashMap::new();
        // Trigger unset: explanation may stay empty
        assert!(validate_field("defense_explanation", None, &ctx, &rules).valid);

        ctx.insert("defenses".to_string(), FieldValue::List(vec!["repairs".into()]));
        assert!(!validate_field("defense_explanation", None, &ctx, &rules).valid);
        assert!(
            validate_field("defense_explanation", Some(&"No heat since May".into()), &ctx, &rules)
                .valid
        );

        // Trigger emptied again: requirement lifts
        ctx.insert("defenses".to_string(), FieldValue::List(vec![]));
        assert!(validate_field("defense_explanation", None, &ctx, &rules).valid);
    }

    #[test]
    fn test_cross_field_with_trigger_value() {
        let rules = [FieldRule::new(RuleKind::CrossField {
            trigger_field: "has_lawyer".to_string(),
            trigger_value: Some(FieldValue::Flag(true)),
        })];

        let mut ctx = HashMap::new();
        ctx.insert("has_lawyer".to_string(), FieldValue::Flag(false));
        assert!(validate_field("lawyer_name", None, &ctx, &rules).valid);

        ctx.insert("has_lawyer".to_string(), FieldValue::Flag(true));
        assert!(!validate_field("lawyer_name", None, &ctx, &rules).valid);
    }

    #[test]
    fn test_first_failure_wins_and_cross_field_runs_last() {
        let rules = [
            FieldRule::required_with("defenses"),
            FieldRule::min_length(10),
        ];
        let mut ctx = HashMap::new();
        ctx.insert("defenses".to_string(), FieldValue::List(vec!["repairs".into()]));

        // Primary MinLength failure reported before the cross-field rule
        let result = validate_field("defense_explanation", Some(&"short".into()), &ctx, &rules);
        assert_eq!(
            result.message.as_deref(),
            Some("Must be at least 10 characters")
        );
    }

    #[test]
    fn test_message_override_interpolation() {
        let rules = [FieldRule::numeric_range(1.0, 5.0).with_message("Pick {min} to {max} items")];
        let ctx = no_context();

        let result = validate_field("count", Some(&FieldValue::Number(9.0)), &ctx, &rules);
        assert_eq!(result.message.as_deref(), Some("Pick 1 to 5 items"));
    }

    #[test]
    fn test_validate_all_collects_per_field_errors() {
        let schema = FormSchema::new("small_claims")
            .with_step("Who", ["name"])
            .with_step("Claim", ["amount"])
            .with_rule("name", FieldRule::required())
            .with_rule("amount", FieldRule::required())
            .with_rule("amount", FieldRule::numeric_range(0.0, 10_000.0));

        let mut values = HashMap::new();
        values.insert("amount".to_string(), FieldValue::Text("abc".into()));

        let errors = validate_all(&schema, &values);
        assert_eq!(errors.len(), 2);
        assert!(errors.contains_key("name"));
        assert_eq!(errors["amount"], "Must be a number");
    }
}
