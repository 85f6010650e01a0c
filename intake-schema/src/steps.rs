//! Step registry lookups.
//!
//! Pure lookups over an immutable [`FormSchema`]; the session controller
//! uses these to gate forward navigation.

use std::collections::HashMap;

use crate::schema::FormSchema;

impl FormSchema {
    /// Number of real steps (the review screen at `step_count()` is not one).
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Field names rendered on a step, or `None` for an out-of-range index.
    pub fn fields_for_step(&self, step_index: usize) -> Option<&[String]> {
        self.steps.get(step_index).map(|s| s.fields.as_slice())
    }

    /// Whether a step is clear of validation errors.
    ///
    /// True iff no field of the step appears as a key in `errors`. The
    /// review index (`step_count()`) has no fields and is always valid.
    pub fn step_is_valid(&self, step_index: usize, errors: &HashMap<String, String>) -> bool {
        match self.fields_for_step(step_index) {
            Some(fields) => !fields.iter().any(|f| errors.contains_key(f)),
            None => true,
        }
    }
}
