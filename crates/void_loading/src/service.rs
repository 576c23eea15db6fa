//! Loading Service
//!
//! Orchestrates batches of [`LoadUnit`]s, aggregates their progress into one
//! stream and publishes the loading state observers react to.
//!
//! ```text
//!            begin_loading
//!   ┌──────┐ ───────────────▶ ┌─────────┐
//!   │ Idle │                  │ Loading │
//!   └──────┘ ◀─────────────── └─────────┘
//!            done (after cooldown),
//!            failed, cancelled
//! ```
//!
//! A service instance is reused for every batch of the application's
//! lifetime. Running two sequential batches at once on one instance is not
//! supported; cancel the first before starting the next.

use std::cell::RefCell;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::future::join_all;
use parking_lot::{Mutex, ReentrantMutex};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cell::{ObservableCell, Subject, Subscription};
use crate::config::{LoadingConfig, ParallelStateMode};
use crate::error::{LoadError, LoadResult};
use crate::progress::ProgressAggregator;
use crate::unit::LoadUnit;

// ============================================================================
// State
// ============================================================================

/// Phase of the loading state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadingPhase {
    Idle,
    Loading,
}

/// Snapshot published on every state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadingState {
    pub phase: LoadingPhase,
    /// Delay before a cancel affordance may be shown; `None` means never
    pub cancel_reveal: Option<Duration>,
    /// Presentation hint selecting a loading surface
    pub loading_type: Option<String>,
}

impl LoadingState {
    /// The idle state
    pub fn idle() -> Self {
        Self {
            phase: LoadingPhase::Idle,
            cancel_reveal: None,
            loading_type: None,
        }
    }

    /// The loading state of a batch started with `options`
    pub fn loading(options: &LoadingOptions) -> Self {
        Self {
            phase: LoadingPhase::Loading,
            cancel_reveal: options.cancel_reveal,
            loading_type: options.loading_type.clone(),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.phase == LoadingPhase::Loading
    }
}

impl Default for LoadingState {
    fn default() -> Self {
        Self::idle()
    }
}

/// Timing and presentation parameters of one batch
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoadingOptions {
    /// Time the state stays `Loading` after a successful batch
    pub cooldown: Duration,
    /// See [`LoadingState::cancel_reveal`]
    pub cancel_reveal: Option<Duration>,
    /// See [`LoadingState::loading_type`]
    pub loading_type: Option<String>,
}

impl LoadingOptions {
    /// Options carrying only a loading type; an empty string means none
    pub fn typed(loading_type: impl Into<String>) -> Self {
        Self::default().with_loading_type(loading_type)
    }

    pub fn with_loading_type(mut self, loading_type: impl Into<String>) -> Self {
        let loading_type = loading_type.into();
        self.loading_type = if loading_type.is_empty() {
            None
        } else {
            Some(loading_type)
        };
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Cooldown in seconds; negative or NaN means none
    pub fn with_cooldown_secs(self, secs: f64) -> Self {
        self.with_cooldown(secs_to_duration(secs).unwrap_or(Duration::ZERO))
    }

    pub fn with_cancel_reveal(mut self, delay: Duration) -> Self {
        self.cancel_reveal = Some(delay);
        self
    }

    /// Cancel reveal delay in seconds; negative or NaN means never show it
    pub fn with_cancel_reveal_secs(mut self, secs: f64) -> Self {
        self.cancel_reveal = secs_to_duration(secs);
        self
    }
}

fn secs_to_duration(secs: f64) -> Option<Duration> {
    if secs >= 0.0 {
        Duration::try_from_secs_f64(secs).ok()
    } else {
        None
    }
}

/// Batch counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadingStats {
    pub batches_started: u64,
    pub batches_completed: u64,
    pub batches_failed: u64,
    pub batches_cancelled: u64,
    pub units_completed: u64,
}

// ============================================================================
// Cancellation
// ============================================================================

/// Root token for the service lifetime plus the scope of the current batches
///
/// A cancelled token stays cancelled. Every cancellation therefore swaps in a
/// fresh child of the root, so the next batch starts with a live scope.
struct CancelScope {
    root: CancellationToken,
    current: Mutex<CancellationToken>,
}

impl CancelScope {
    fn new() -> Self {
        let root = CancellationToken::new();
        let current = Mutex::new(root.child_token());
        Self { root, current }
    }

    fn current(&self) -> CancellationToken {
        self.current.lock().clone()
    }

    fn cancel_current(&self) {
        let mut current = self.current.lock();
        current.cancel();
        *current = self.root.child_token();
    }

    fn shutdown(&self) {
        self.root.cancel();
    }
}

#[derive(Default)]
struct CooldownSlot {
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

/// Invalidate the pending cooldown and return the new generation
///
/// The borrow ends before the caller publishes, so a listener re-entering
/// the slot on the same thread finds it free.
fn supersede(slot: &RefCell<CooldownSlot>) -> u64 {
    let mut slot = slot.borrow_mut();
    slot.generation += 1;
    if let Some(pending) = slot.pending.take() {
        log::debug!("Superseding pending cooldown");
        pending.abort();
    }
    slot.generation
}

// ============================================================================
// Service
// ============================================================================

/// Batch orchestrator
pub struct LoadingService {
    config: LoadingConfig,
    state: ObservableCell<LoadingState>,
    progress: Subject<f32>,
    scope: Arc<CancelScope>,
    // State transitions are made under this lock so a cooldown timer that
    // fires late never overwrites a newer transition. It is reentrant so state
    // listeners may call back into the service.
    cooldown: Arc<ReentrantMutex<RefCell<CooldownSlot>>>,
    cancel_bindings: Mutex<Vec<Subscription>>,
    stats: Mutex<LoadingStats>,
}

impl LoadingService {
    /// Create a service with default configuration
    pub fn new() -> Self {
        Self::with_config(LoadingConfig::default())
    }

    /// Create a service with explicit configuration
    pub fn with_config(config: LoadingConfig) -> Self {
        Self {
            config,
            state: ObservableCell::new(LoadingState::idle()),
            progress: Subject::new(),
            scope: Arc::new(CancelScope::new()),
            cooldown: Arc::new(ReentrantMutex::new(RefCell::new(CooldownSlot::default()))),
            cancel_bindings: Mutex::new(Vec::new()),
            stats: Mutex::new(LoadingStats::default()),
        }
    }

    pub fn config(&self) -> &LoadingConfig {
        &self.config
    }

    /// Loading state; new subscribers receive the current state first
    pub fn state(&self) -> &ObservableCell<LoadingState> {
        &self.state
    }

    /// Aggregated batch progress; no replay
    pub fn progress(&self) -> &Subject<f32> {
        &self.progress
    }

    pub fn current_state(&self) -> LoadingState {
        self.state.get()
    }

    pub fn is_loading(&self) -> bool {
        self.state.get().is_loading()
    }

    pub fn stats(&self) -> LoadingStats {
        self.stats.lock().clone()
    }

    /// Run `units` strictly in order
    ///
    /// Publishes `Loading` (carrying the options' cancel reveal and loading
    /// type), progress 0.0, weighted unit progress, then 1.0 on success. The
    /// state returns to `Idle` immediately on failure or cancellation, and
    /// after `options.cooldown` on success. Starting a batch supersedes the
    /// pending cooldown of a previous one.
    pub async fn begin_loading(
        &self,
        options: LoadingOptions,
        units: &mut [&mut dyn LoadUnit],
    ) -> LoadResult<()> {
        let cancel = self.scope.current();
        self.stats.lock().batches_started += 1;
        log::info!("Begin loading batch: {} unit(s)", units.len());

        self.transition(LoadingState::loading(&options));
        let progress = Arc::new(ProgressAggregator::new(self.progress.clone(), units.len()));
        progress.begin();

        match self.run_sequential(&cancel, &progress, units).await {
            Ok(()) => {
                progress.finish();
                self.stats.lock().batches_completed += 1;
                log::info!("End loading batch");
                self.finish_after(options.cooldown);
                Ok(())
            }
            Err(err) => {
                self.record_failure(&err);
                self.transition(LoadingState::idle());
                Err(err)
            }
        }
    }

    async fn run_sequential(
        &self,
        cancel: &CancellationToken,
        progress: &Arc<ProgressAggregator>,
        units: &mut [&mut dyn LoadUnit],
    ) -> LoadResult<()> {
        for (index, unit) in units.iter_mut().enumerate() {
            if cancel.is_cancelled() {
                return Err(LoadError::Cancelled);
            }

            let listener = {
                let progress = Arc::clone(progress);
                unit.progress()
                    .subscribe_fn(move |raw: &f32| {
                        progress.report_sequential(index, *raw);
                    })
            };

            log::info!("Begin loading: {}", unit.name());
            let outcome = unit.load(cancel).await;
            drop(listener);
            outcome?;
            log::info!("End loading: {}", unit.name());

            progress.complete_unit(index);
            self.stats.lock().units_completed += 1;
        }

        if cancel.is_cancelled() {
            return Err(LoadError::Cancelled);
        }
        Ok(())
    }

    /// Run `units` concurrently
    ///
    /// Waits for every unit to finish, then returns the first real failure in
    /// unit order. Other failures are logged. [`LoadError::Cancelled`] is only
    /// returned when no unit failed for any other reason.
    /// State reporting follows [`LoadingConfig::parallel_state`].
    pub async fn begin_loading_parallel(&self, units: &mut [&mut dyn LoadUnit]) -> LoadResult<()> {
        let cancel = self.scope.current();
        let tracked = self.config.parallel_state == ParallelStateMode::Tracked;
        self.stats.lock().batches_started += 1;
        log::info!("Begin parallel loading batch: {} unit(s)", units.len());

        let progress = Arc::new(ProgressAggregator::new(self.progress.clone(), units.len()));
        let listeners: Vec<Subscription> = if tracked {
            self.transition(LoadingState::loading(&LoadingOptions::default()));
            progress.begin();
            units
                .iter()
                .enumerate()
                .map(|(index, unit)| {
                    let progress = Arc::clone(&progress);
                    unit.progress().subscribe_fn(move |raw: &f32| {
                        progress.report_parallel(index, *raw);
                    })
                })
                .collect()
        } else {
            self.transition(LoadingState::idle());
            Vec::new()
        };

        let token = &cancel;
        let outcomes = join_all(units.iter_mut().map(|unit| async move {
            log::info!("Begin loading: {}", unit.name());
            let outcome = unit.load(token).await;
            if outcome.is_ok() {
                log::info!("End loading: {}", unit.name());
            }
            outcome
        }))
        .await;
        drop(listeners);

        let completed = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
        self.stats.lock().units_completed += completed as u64;

        let mut failure = None;
        let mut cancelled = cancel.is_cancelled();
        for (unit, outcome) in units.iter().zip(outcomes) {
            match outcome {
                Ok(()) => {}
                Err(LoadError::Cancelled) => cancelled = true,
                Err(err) if failure.is_none() => failure = Some(err),
                Err(err) => log::error!("Load unit {} failed in parallel batch: {}", unit.name(), err),
            }
        }
        let result = match failure {
            Some(err) => Err(err),
            None if cancelled => Err(LoadError::Cancelled),
            None => Ok(()),
        };

        match &result {
            Ok(()) => {
                if tracked {
                    progress.finish();
                }
                self.stats.lock().batches_completed += 1;
                log::info!("End parallel loading batch");
            }
            Err(err) => self.record_failure(err),
        }
        self.transition(LoadingState::idle());
        result
    }

    /// Cancel every in-flight batch
    ///
    /// Units observe the cancellation at their next await point. A pending
    /// cooldown of an already finished batch is left alone.
    pub fn cancel_current_loadings(&self) {
        log::info!("Cancelling current loadings");
        self.scope.cancel_current();
    }

    /// Forward every value of `requests` into [`cancel_current_loadings`]
    ///
    /// The binding only holds the cancellation scope weakly and is dropped
    /// with the service.
    ///
    /// [`cancel_current_loadings`]: Self::cancel_current_loadings
    pub fn bind_cancel_requests(&self, requests: &Subject<()>) {
        let scope: Weak<CancelScope> = Arc::downgrade(&self.scope);
        let subscription = requests.subscribe_fn(move |_| {
            if let Some(scope) = scope.upgrade() {
                log::info!("Cancel requested");
                scope.cancel_current();
            }
        });
        self.cancel_bindings.lock().push(subscription);
    }

    /// Drop every cancel-request binding
    pub fn clear_cancel_bindings(&self) {
        self.cancel_bindings.lock().clear();
    }

    /// Cancel everything for good and return to `Idle`
    ///
    /// Batches started afterwards are cancelled before their first unit.
    pub fn shutdown(&self) {
        self.scope.shutdown();
        self.clear_cancel_bindings();

        let slot = self.cooldown.lock();
        supersede(&slot);
        self.state.set_if_changed(LoadingState::idle());
    }

    /// Replace the state, superseding any pending cooldown
    fn transition(&self, next: LoadingState) {
        let slot = self.cooldown.lock();
        supersede(&slot);
        self.state.set(next);
    }

    fn finish_after(&self, cooldown: Duration) {
        if cooldown.is_zero() {
            self.transition(LoadingState::idle());
            return;
        }

        let slot = self.cooldown.lock();
        let generation = supersede(&slot);
        let state = self.state.clone();
        let cooldown_slot = Arc::clone(&self.cooldown);
        log::debug!("Cooldown for {:?}", cooldown);
        let task = tokio::spawn(async move {
            tokio::time::sleep(cooldown).await;
            let slot = cooldown_slot.lock();
            let current = {
                let mut slot = slot.borrow_mut();
                let current = slot.generation == generation;
                if current {
                    slot.pending = None;
                }
                current
            };
            if current {
                state.set(LoadingState::idle());
            }
        });
        slot.borrow_mut().pending = Some(task);
    }

    fn record_failure(&self, err: &LoadError) {
        let mut stats = self.stats.lock();
        if err.is_cancelled() {
            stats.batches_cancelled += 1;
            log::info!("Loading cancelled");
        } else {
            stats.batches_failed += 1;
            log::error!("Loading failed: {}", err);
        }
    }
}

impl Default for LoadingService {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LoadingService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for LoadingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadingService")
            .field("state", &self.state.get())
            .field("stats", &*self.stats.lock())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_seconds() {
        let options = LoadingOptions::default()
            .with_cooldown_secs(2.0)
            .with_cancel_reveal_secs(1.5);
        assert_eq!(options.cooldown, Duration::from_secs(2));
        assert_eq!(options.cancel_reveal, Some(Duration::from_millis(1500)));

        let never = LoadingOptions::default()
            .with_cooldown_secs(-1.0)
            .with_cancel_reveal_secs(-1.0);
        assert_eq!(never.cooldown, Duration::ZERO);
        assert_eq!(never.cancel_reveal, None);

        assert_eq!(LoadingOptions::default().with_cancel_reveal_secs(f64::NAN).cancel_reveal, None);
    }

    #[test]
    fn test_empty_loading_type_is_none() {
        assert_eq!(LoadingOptions::typed("").loading_type, None);
        assert_eq!(LoadingOptions::typed("tips").loading_type.as_deref(), Some("tips"));
    }

    #[test]
    fn test_loading_state_carries_options() {
        let options = LoadingOptions::typed("tips").with_cancel_reveal(Duration::from_secs(3));
        let state = LoadingState::loading(&options);

        assert!(state.is_loading());
        assert_eq!(state.cancel_reveal, Some(Duration::from_secs(3)));
        assert_eq!(state.loading_type.as_deref(), Some("tips"));
        assert!(!LoadingState::default().is_loading());
    }

    #[test]
    fn test_cancel_scope_rearms() {
        let scope = CancelScope::new();
        let first = scope.current();

        scope.cancel_current();
        assert!(first.is_cancelled());
        assert!(!scope.current().is_cancelled());

        scope.shutdown();
        assert!(scope.current().is_cancelled());
    }

    #[test]
    fn test_shutdown_outside_runtime() {
        let service = LoadingService::new();
        let requests = Subject::new();
        service.bind_cancel_requests(&requests);
        assert_eq!(requests.listener_count(), 1);

        service.shutdown();
        assert_eq!(requests.listener_count(), 0);
        assert!(!service.is_loading());
    }

    #[test]
    fn test_bindings_do_not_outlive_service() {
        let requests: Subject<()> = Subject::new();
        {
            let service = LoadingService::new();
            service.bind_cancel_requests(&requests);
        }
        assert_eq!(requests.listener_count(), 0);
        requests.publish(());
    }
}
