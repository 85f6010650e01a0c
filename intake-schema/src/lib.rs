//! Intake Schema - Declarative Multi-Step Forms
//!
//! Static, immutable descriptions of multi-step intake forms (eviction
//! response, fee waiver, small claims, ...) and the pure validation logic
//! over them:
//! - [`FormSchema`]: ordered steps plus per-field validation rules,
//!   loadable from YAML or JSON
//! - [`rules::validate_field`]: pure, deterministic field validation
//!   (required, length bounds, pattern, numeric range, cross-field)
//! - Step registry lookups used to gate forward navigation
//!
//! Everything here is synchronous and side-effect free; the session
//! runtime lives in the `intake-session` crate.

pub mod rules;
pub mod schema;
pub mod steps;
pub mod types;

// Re-export main types for convenience
pub use rules::{validate_all, validate_field};
pub use schema::{FormSchema, SchemaError};
pub use types::{FieldRule, FieldValue, RuleKind, StepDefinition, ValidationResult};
