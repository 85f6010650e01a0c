//! Debounced auto-save scheduling.
//!
//! One scheduler is owned by one form session and dies with it; there are
//! no module-level timers. The tick loop saves only when edits happened
//! since the last save (at most one save per interval window) and an
//! in-flight flag keeps saves from overlapping, including explicit
//! "Save Draft" requests that share the same guard.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::draft::DraftError;

/// Interval-driven draft saver with a dirty-flag debounce.
#[derive(Clone, Default)]
pub struct AutoSaveScheduler {
    running: Arc<RwLock<bool>>,
    /// Bumped on every stop so a loop from an earlier start/stop cycle
    /// can never resurrect when the scheduler is restarted
    epoch: Arc<AtomicU64>,
    dirty: Arc<AtomicBool>,
    in_flight: Arc<AtomicBool>,
}

impl AutoSaveScheduler {
    /// Create a stopped scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that values changed since the last save.
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    /// Whether unsaved edits exist.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Consume the dirty flag, returning whether it was set.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::SeqCst)
    }

    /// Whether the tick loop is active.
    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Claim the save slot. Returns false while another save is in flight.
    pub fn try_begin_save(&self) -> bool {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Claim the save slot, waiting for any in-flight save to finish first.
    pub async fn begin_save(&self) {
        while !self.try_begin_save() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Release the save slot.
    pub fn end_save(&self) {
        self.in_flight.store(false, Ordering::SeqCst);
    }

    /// Start the tick loop.
    ///
    /// Idempotent: starting an already-running scheduler is a warn + no-op,
    /// so there is only ever one active timer. Returns whether a loop was
    /// newly started.
    pub async fn start<F, Fut>(&self, interval: Duration, save_fn: F) -> bool
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DraftError>> + Send,
    {
        {
            let mut running = self.running.write().await;
            if *running {
                warn!("auto-save scheduler already running");
                return false;
            }
            *running = true;
        }

        debug!(interval_ms = interval.as_millis() as u64, "auto-save started");

        let scheduler = self.clone();
        let epoch = self.epoch.load(Ordering::SeqCst);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick of a tokio interval completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;

                if scheduler.epoch.load(Ordering::SeqCst) != epoch
                    || !*scheduler.running.read().await
                {
                    break;
                }

                if !scheduler.is_dirty() || !scheduler.try_begin_save() {
                    continue;
                }

                scheduler.dirty.store(false, Ordering::SeqCst);
                if let Err(e) = save_fn().await {
                    // Keep the edits marked unsaved so the next tick retries
                    warn!(error = %e, "auto-save failed");
                    scheduler.mark_dirty();
                }
                scheduler.end_save();
            }

            debug!("auto-save loop exited");
        });

        true
    }

    /// Stop the tick loop.
    ///
    /// Idempotent: stopping a stopped scheduler is a no-op. An in-flight
    /// save is allowed to complete. Returns whether the loop had been
    /// running; the session triggers its final flush when it was.
    pub async fn stop(&self) -> bool {
        let mut running = self.running.write().await;
        let was_running = *running;
        *running = false;
        if was_running {
            self.epoch.fetch_add(1, Ordering::SeqCst);
            debug!("auto-save stopped");
        }
        was_running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn counting_save(
        counter: Arc<AtomicU32>,
    ) -> impl Fn() -> std::pin::Pin<Box<dyn Future<Output = Result<(), DraftError>> + Send>>
           + Send
           + Sync
           + 'static {
        move || {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn test_debounce_one_save_per_window() {
        let scheduler = AutoSaveScheduler::new();
        let saves = Arc::new(AtomicU32::new(0));

        scheduler
            .start(Duration::from_millis(20), counting_save(saves.clone()))
            .await;

        // Many rapid edits inside one window
        for _ in 0..10 {
            scheduler.mark_dirty();
        }

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(saves.load(Ordering::SeqCst), 1);

        // No further edits: no further saves
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(saves.load(Ordering::SeqCst), 1);

        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let scheduler = AutoSaveScheduler::new();
        let saves = Arc::new(AtomicU32::new(0));

        assert!(
            scheduler
                .start(Duration::from_millis(20), counting_save(saves.clone()))
                .await
        );
        assert!(
            !scheduler
                .start(Duration::from_millis(20), counting_save(saves.clone()))
                .await
        );
        assert!(scheduler.is_running().await);

        scheduler.mark_dirty();
        tokio::time::sleep(Duration::from_millis(30)).await;
        // One timer, one save
        assert_eq!(saves.load(Ordering::SeqCst), 1);

        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_halts_saves() {
        let scheduler = AutoSaveScheduler::new();
        let saves = Arc::new(AtomicU32::new(0));

        scheduler
            .start(Duration::from_millis(10), counting_save(saves.clone()))
            .await;

        assert!(scheduler.stop().await);
        assert!(!scheduler.stop().await);

        scheduler.mark_dirty();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(saves.load(Ordering::SeqCst), 0);
        assert!(scheduler.is_dirty());
    }

    #[tokio::test]
    async fn test_in_flight_guard() {
        let scheduler = AutoSaveScheduler::new();

        assert!(scheduler.try_begin_save());
        assert!(!scheduler.try_begin_save());

        scheduler.end_save();
        assert!(scheduler.try_begin_save());
        scheduler.end_save();
    }

    #[tokio::test]
    async fn test_begin_save_waits_for_in_flight_save() {
        let scheduler = AutoSaveScheduler::new();
        assert!(scheduler.try_begin_save());

        let holder = scheduler.clone();
        let release = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            holder.end_save();
        });

        let waited = std::time::Instant::now();
        scheduler.begin_save().await;
        assert!(waited.elapsed() >= Duration::from_millis(25));

        scheduler.end_save();
        release.await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_save_stays_dirty() {
        let scheduler = AutoSaveScheduler::new();

        scheduler
            .start(Duration::from_millis(10), || async {
                Err(DraftError::Storage("quota exceeded".to_string()))
            })
            .await;

        scheduler.mark_dirty();
        tokio::time::sleep(Duration::from_millis(25)).await;

        // Failure re-marks dirty so a later tick can retry
        assert!(scheduler.is_dirty());
        scheduler.stop().await;
    }
}
