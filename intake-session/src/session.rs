//! FormSession - the live state of one form-filling attempt.
//!
//! One session per mounted form page. The session owns the step state
//! machine, the per-field error map, its auto-save scheduler and its
//! analytics reporter, and talks to the draft store and the document
//! generation service through traits.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use intake_schema::{rules, FieldValue, FormSchema};

use crate::analytics::{AnalyticsReporter, AnalyticsSink};
use crate::autosave::AutoSaveScheduler;
use crate::document::{DocumentGenerator, GeneratedDocument};
use crate::draft::{DraftStore, FormValues};
use crate::error::{Result, SessionError};

/// Configuration for a form session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Auto-save tick interval
    pub auto_save_interval: Duration,
    /// Whether auto-save starts enabled
    pub auto_save_enabled: bool,
    /// Template handed to the document service on submit.
    /// Defaults to the schema's form type.
    pub template_id: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_save_interval: Duration::from_secs(5),
            auto_save_enabled: true,
            template_id: None,
        }
    }
}

/// Mutable session state behind one lock.
#[derive(Debug, Default)]
struct SessionState {
    values: FormValues,
    touched: HashSet<String>,
    errors: HashMap<String, String>,
    active_step: usize,
    submitted: bool,
    last_saved_at: Option<DateTime<Utc>>,
    last_save_error: Option<String>,
}

/// Controller for one in-progress form.
///
/// The active step ranges over `0 ..= step_count()`; the top value is the
/// review/submit display, not a real step. Forward navigation and
/// submission are gated on validation; going backward never is.
pub struct FormSession {
    schema: Arc<FormSchema>,
    config: SessionConfig,
    state: Arc<RwLock<SessionState>>,
    drafts: Arc<dyn DraftStore>,
    generator: Arc<dyn DocumentGenerator>,
    reporter: AnalyticsReporter,
    autosave: AutoSaveScheduler,
}

impl FormSession {
    /// Create a session, hydrating from an existing draft when one exists.
    ///
    /// A draft load failure is logged and the session starts empty: the
    /// store is never allowed to block form entry.
    pub async fn start(
        schema: Arc<FormSchema>,
        drafts: Arc<dyn DraftStore>,
        generator: Arc<dyn DocumentGenerator>,
        analytics: Option<Arc<dyn AnalyticsSink>>,
        config: SessionConfig,
    ) -> Self {
        let form_type = schema.form_type.clone();
        let reporter = match analytics {
            Some(sink) => AnalyticsReporter::new(&form_type, sink),
            None => AnalyticsReporter::disabled(&form_type),
        };

        let mut state = SessionState::default();

        match drafts.load(&form_type).await {
            Ok(Some(record)) => {
                info!(form_type = %form_type, saved_at = %record.saved_at, "resuming from draft");
                // Drop values the current schema no longer knows
                state.values = record
                    .values
                    .into_iter()
                    .filter(|(name, _)| schema.has_field(name))
                    .collect();
                state.errors = rules::validate_all(&schema, &state.values)
                    .into_iter()
                    .filter(|(name, _)| state.values.contains_key(name))
                    .collect();
                state.last_saved_at = Some(record.saved_at);
            }
            Ok(None) => {
                debug!(form_type = %form_type, "no draft to resume");
            }
            Err(e) => {
                warn!(form_type = %form_type, error = %e, "draft load failed, starting empty");
            }
        }

        let session = Self {
            schema,
            config,
            state: Arc::new(RwLock::new(state)),
            drafts,
            generator,
            reporter,
            autosave: AutoSaveScheduler::new(),
        };

        if session.config.auto_save_enabled {
            session.spawn_autosave().await;
        }

        session.reporter.track_start();
        session
    }

    /// The schema driving this session.
    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    /// The form type of this session.
    pub fn form_type(&self) -> &str {
        &self.schema.form_type
    }

    // ------------------------------------------------------------------
    // Field edits
    // ------------------------------------------------------------------

    /// Update one field, marking it touched and re-validating it along
    /// with every field whose cross-field rule watches it.
    ///
    /// Each call is independent and immediately visible; no transaction
    /// spans multiple fields.
    pub async fn set_field_value(
        &self,
        name: &str,
        value: impl Into<FieldValue>,
    ) -> Result<()> {
        if !self.schema.has_field(name) {
            return Err(SessionError::UnknownField(name.to_string()));
        }

        let value = value.into();
        let mut state = self.state.write().await;
        if state.submitted {
            return Err(SessionError::AlreadySubmitted);
        }

        state.values.insert(name.to_string(), value);
        state.touched.insert(name.to_string());

        Self::revalidate(&self.schema, &mut state, name);
        for dependent in self.schema.dependents_of(name) {
            Self::revalidate(&self.schema, &mut state, dependent);
        }
        drop(state);

        self.autosave.mark_dirty();
        self.reporter.track_field_interaction(name);
        Ok(())
    }

    fn revalidate(schema: &FormSchema, state: &mut SessionState, name: &str) {
        let result = rules::validate_field(
            name,
            state.values.get(name),
            &state.values,
            schema.rules_for(name),
        );
        match result.message {
            Some(message) => {
                state.errors.insert(name.to_string(), message);
            }
            None => {
                state.errors.remove(name);
            }
        }
    }

    // ------------------------------------------------------------------
    // Step navigation
    // ------------------------------------------------------------------

    /// Advance to the next step, gated on the current step being valid.
    ///
    /// Untouched fields of the step are validated first, so an empty
    /// required field blocks even if never edited. While the step is
    /// invalid this is a no-op and idempotent. Capped at the review index.
    pub async fn next(&self) -> Result<usize> {
        let mut state = self.state.write().await;
        if state.submitted {
            return Err(SessionError::AlreadySubmitted);
        }

        let step = state.active_step;
        if step >= self.schema.step_count() {
            return Ok(step);
        }

        if let Some(fields) = self.schema.fields_for_step(step) {
            for field in fields.to_vec() {
                Self::revalidate(&self.schema, &mut state, &field);
            }
        }

        if !self.schema.step_is_valid(step, &state.errors) {
            let errors = self.step_errors(step, &state.errors);
            debug!(form_type = %self.form_type(), step, errors = errors.len(), "next blocked");
            return Err(SessionError::StepBlocked { step, errors });
        }

        state.active_step = (step + 1).min(self.schema.step_count());
        let active = state.active_step;
        drop(state);

        info!(form_type = %self.form_type(), step = active, "advanced");
        self.reporter.track_progress(self.completion_percentage().await);
        Ok(active)
    }

    /// Go back one step, floored at 0. Never gated.
    pub async fn back(&self) -> Result<usize> {
        let mut state = self.state.write().await;
        if state.submitted {
            return Err(SessionError::AlreadySubmitted);
        }

        state.active_step = state.active_step.saturating_sub(1);
        Ok(state.active_step)
    }

    /// Jump to an earlier (or the current) step.
    ///
    /// Jumping ahead of the active step is refused: it would skip the
    /// validation gates of the steps in between.
    pub async fn jump_to(&self, index: usize) -> Result<usize> {
        let mut state = self.state.write().await;
        if state.submitted {
            return Err(SessionError::AlreadySubmitted);
        }

        if index > state.active_step {
            return Err(SessionError::JumpAhead {
                requested: index,
                active: state.active_step,
            });
        }

        state.active_step = index;
        Ok(state.active_step)
    }

    // ------------------------------------------------------------------
    // Drafts and auto-save
    // ------------------------------------------------------------------

    /// Save a draft now, outside the auto-save cadence.
    ///
    /// Shares the at-most-one-in-flight guard with the scheduler: returns
    /// `Ok(false)` when another save is already running.
    pub async fn save_draft(&self) -> Result<bool> {
        {
            let state = self.state.read().await;
            if state.submitted {
                return Err(SessionError::AlreadySubmitted);
            }
        }

        if !self.autosave.try_begin_save() {
            debug!(form_type = %self.form_type(), "save already in flight");
            return Ok(false);
        }

        self.autosave.take_dirty();
        let result = self.persist_snapshot().await;
        self.autosave.end_save();

        match result {
            Ok(()) => Ok(true),
            Err(e) => {
                self.autosave.mark_dirty();
                Err(SessionError::Draft(e))
            }
        }
    }

    /// Enable or disable auto-save.
    ///
    /// Disabling flushes unsaved edits once before stopping the timer.
    pub async fn toggle_auto_save(&self, enabled: bool) {
        if enabled {
            self.spawn_autosave().await;
        } else {
            let was_running = self.autosave.stop().await;
            if was_running && self.autosave.is_dirty() {
                // Claim the slot before consuming the dirty flag; taking it
                // while a save is in flight would drop the pending edit
                self.autosave.begin_save().await;
                if self.autosave.take_dirty() {
                    if let Err(e) = self.persist_snapshot().await {
                        warn!(form_type = %self.form_type(), error = %e, "final flush failed");
                        self.autosave.mark_dirty();
                    }
                }
                self.autosave.end_save();
            }
        }
    }

    /// Whether the auto-save loop is currently running.
    pub async fn auto_save_enabled(&self) -> bool {
        self.autosave.is_running().await
    }

    /// Delete the stored draft and cancel any pending auto-save timer.
    ///
    /// In-memory values survive; only the persisted snapshot goes away.
    pub async fn discard_draft(&self) -> Result<()> {
        self.autosave.stop().await;
        // Same fence as submission: a save still in flight must finish
        // before the clear, or it would re-create the draft
        self.autosave.begin_save().await;
        self.autosave.take_dirty();
        let cleared = self.drafts.clear(self.form_type()).await;
        self.autosave.end_save();
        cleared?;

        let mut state = self.state.write().await;
        state.last_saved_at = None;
        Ok(())
    }

    /// Tear the session down without submitting.
    ///
    /// Cancels the auto-save timer (an in-flight save may still complete;
    /// its result is simply ignored) and reports the abandonment point.
    /// Any saved draft stays in the store for later resumption.
    pub async fn abandon(&self) {
        self.autosave.stop().await;
        let percent = self.completion_percentage().await;
        info!(form_type = %self.form_type(), percent, "session abandoned");
        self.reporter.track_abandonment(percent);
    }

    async fn spawn_autosave(&self) {
        let state = Arc::clone(&self.state);
        let drafts = Arc::clone(&self.drafts);
        let form_type = self.schema.form_type.clone();

        self.autosave
            .start(self.config.auto_save_interval, move || {
                let state = Arc::clone(&state);
                let drafts = Arc::clone(&drafts);
                let form_type = form_type.clone();
                async move {
                    let values = state.read().await.values.clone();
                    match drafts.save(&form_type, &values).await {
                        Ok(record) => {
                            let mut state = state.write().await;
                            state.last_saved_at = Some(record.saved_at);
                            state.last_save_error = None;
                            Ok(())
                        }
                        Err(e) => {
                            // Surface as a transient notice; in-memory
                            // edits are untouched by a failed save
                            let mut state = state.write().await;
                            state.last_save_error = Some(e.to_string());
                            Err(e)
                        }
                    }
                }
            })
            .await;
    }

    async fn persist_snapshot(&self) -> std::result::Result<(), crate::draft::DraftError> {
        let values = self.state.read().await.values.clone();
        match self.drafts.save(self.form_type(), &values).await {
            Ok(record) => {
                let mut state = self.state.write().await;
                state.last_saved_at = Some(record.saved_at);
                state.last_save_error = None;
                Ok(())
            }
            Err(e) => {
                let mut state = self.state.write().await;
                state.last_save_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    // ------------------------------------------------------------------
    // Submission
    // ------------------------------------------------------------------

    /// Submit the form.
    ///
    /// Requires every field across every step to be valid, not just the
    /// current step. On success the draft is cleared and the session
    /// reaches its terminal submitted state; on any failure it stays
    /// editable with the active step unchanged.
    pub async fn submit(&self) -> Result<GeneratedDocument> {
        let values = {
            let mut state = self.state.write().await;
            if state.submitted {
                return Err(SessionError::AlreadySubmitted);
            }

            let errors = rules::validate_all(&self.schema, &state.values);
            state.errors = errors.clone();
            if !errors.is_empty() {
                debug!(form_type = %self.form_type(), errors = errors.len(), "submit blocked");
                return Err(SessionError::SubmissionBlocked { errors });
            }

            state.values.clone()
        };

        // Quiesce auto-save, then wait out any save already in flight so
        // a slow write cannot land after the draft is cleared below
        let autosave_was_running = self.autosave.stop().await;
        self.autosave.begin_save().await;
        self.autosave.take_dirty();

        let template_id = self
            .config
            .template_id
            .clone()
            .unwrap_or_else(|| self.schema.form_type.clone());

        let document = match self.generator.generate(&template_id, &values).await {
            Ok(document) => document,
            Err(e) => {
                warn!(form_type = %self.form_type(), error = %e, "document generation failed");
                // Recoverable: the session returns to its editable state
                self.autosave.end_save();
                if autosave_was_running {
                    self.spawn_autosave().await;
                }
                return Err(SessionError::Submission(e));
            }
        };

        if let Err(e) = self.drafts.clear(self.form_type()).await {
            // The document exists; a dangling draft is only noise
            warn!(form_type = %self.form_type(), error = %e, "draft cleanup failed");
        }
        self.autosave.end_save();

        let mut state = self.state.write().await;
        state.submitted = true;
        state.last_saved_at = None;
        drop(state);

        info!(form_type = %self.form_type(), document_id = %document.document_id, "submitted");
        self.reporter.track_completion();
        Ok(document)
    }

    // ------------------------------------------------------------------
    // Read accessors for the UI
    // ------------------------------------------------------------------

    /// Current step index (`step_count()` means the review display).
    pub async fn active_step(&self) -> usize {
        self.state.read().await.active_step
    }

    /// Snapshot of current field values.
    pub async fn values(&self) -> FormValues {
        self.state.read().await.values.clone()
    }

    /// Snapshot of the current error map (field name to message).
    pub async fn errors(&self) -> HashMap<String, String> {
        self.state.read().await.errors.clone()
    }

    /// Fields the user has interacted with.
    pub async fn touched(&self) -> HashSet<String> {
        self.state.read().await.touched.clone()
    }

    /// When the last successful save happened, if any.
    pub async fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.last_saved_at
    }

    /// Message of the most recent failed save, cleared by the next
    /// successful one. Transient notice only.
    pub async fn last_save_error(&self) -> Option<String> {
        self.state.read().await.last_save_error.clone()
    }

    /// Whether the session reached its terminal submitted state.
    pub async fn is_submitted(&self) -> bool {
        self.state.read().await.submitted
    }

    /// Fraction of required fields filled with valid values, as a
    /// percentage. Always recomputed, never stored.
    pub async fn completion_percentage(&self) -> f32 {
        let state = self.state.read().await;
        let required = self.schema.required_fields();
        if required.is_empty() {
            return 100.0;
        }

        let filled = required
            .iter()
            .copied()
            .filter(|f| {
                state.values.get(*f).map(|v| !v.is_empty()).unwrap_or(false)
                    && !state.errors.contains_key(*f)
            })
            .count();

        filled as f32 / required.len() as f32 * 100.0
    }

    fn step_errors(
        &self,
        step: usize,
        errors: &HashMap<String, String>,
    ) -> HashMap<String, String> {
        let Some(fields) = self.schema.fields_for_step(step) else {
            return HashMap::new();
        };
        errors
            .iter()
            .filter(|(name, _)| fields.contains(*name))
            .map(|(name, message)| (name.clone(), message.clone()))
            .collect()
    }
}
