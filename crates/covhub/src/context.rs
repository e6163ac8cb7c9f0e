//! Process-wide coverage context.
//!
//! One [`CoverageContext`] is built by the host at startup and shared (behind
//! `Arc`) with the loader hook, the HTTP handler and the client middleware.
//! The store and the baselines sit behind a single lock, so each operation
//! observes and mutates both in one critical section.

use crate::baseline::BaselineTracker;
use crate::hook::{HookOptions, LoaderHook, Matcher};
use crate::instrument::Instrumenter;
use crate::model::{remove_derived_info, CoverageMap};
use crate::result::CoverageResult;
use crate::store::CoverageStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// Store plus baselines, guarded together
#[derive(Debug, Default)]
pub struct CoverageState {
    /// Live counters
    pub store: CoverageStore,
    /// Post-load snapshots
    pub baselines: BaselineTracker,
}

/// Shared coverage state of the host process
#[derive(Debug, Default)]
pub struct CoverageContext {
    state: Mutex<CoverageState>,
    hook_installed: AtomicBool,
    instrumenter: RwLock<Option<Arc<dyn Instrumenter>>>,
}

impl CoverageContext {
    /// Create an empty context
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty context behind `Arc`
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Seed the context with existing coverage
    #[must_use]
    pub fn with_coverage(self, coverage: CoverageMap) -> Self {
        self.lock().store = CoverageStore::from_map(coverage);
        self
    }

    /// Use `instrumenter` for client scripts without installing a loader hook
    #[must_use]
    pub fn with_instrumenter(self, instrumenter: Arc<dyn Instrumenter>) -> Self {
        self.set_instrumenter(instrumenter);
        self
    }

    /// Lock the state. A poisoned lock is recovered: counters stay usable.
    pub fn lock(&self) -> MutexGuard<'_, CoverageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the store within one critical section
    pub fn with_store<R>(&self, f: impl FnOnce(&mut CoverageStore) -> R) -> R {
        f(&mut self.lock().store)
    }

    /// Deep copy of the current coverage map
    #[must_use]
    pub fn snapshot(&self) -> CoverageMap {
        self.lock().store.snapshot()
    }

    /// Strip derived line info from the store, then snapshot it for reporting
    #[must_use]
    pub fn report_snapshot(&self) -> CoverageMap {
        let mut state = self.lock();
        remove_derived_info(state.store.files_mut());
        state.store.snapshot()
    }

    /// Whether any coverage has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().store.is_empty()
    }

    /// Merge coverage posted by a remote client
    pub fn merge_client_coverage(&self, update: CoverageMap) {
        if update.is_empty() {
            return;
        }
        let files = update.len();
        self.lock().store.merge_client(update);
        tracing::debug!(files, "merged client coverage");
    }

    /// Record `path`'s baseline if it has none yet
    pub fn capture_baseline(&self, path: &str) -> bool {
        let mut state = self.lock();
        let CoverageState { store, baselines } = &mut *state;
        baselines.capture_if_absent(store, path)
    }

    /// Reset coverage to the recorded baselines
    pub fn restore_baseline(&self) {
        let mut state = self.lock();
        let CoverageState { store, baselines } = &mut *state;
        baselines.restore(store);
        tracing::info!(files = store.len(), "coverage restored to baseline");
    }

    /// The instrumenter shared with the client middleware
    #[must_use]
    pub fn instrumenter(&self) -> Option<Arc<dyn Instrumenter>> {
        self.instrumenter
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the shared instrumenter
    pub fn set_instrumenter(&self, instrumenter: Arc<dyn Instrumenter>) {
        *self
            .instrumenter
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(instrumenter);
    }

    /// Whether a loader hook has been installed
    #[must_use]
    pub fn is_hook_installed(&self) -> bool {
        self.hook_installed.load(Ordering::Acquire)
    }

    /// Install the module-loader hook.
    ///
    /// The matcher is validated first. Only the first successful call installs a
    /// hook; later calls return `Ok(None)` and change nothing.
    pub fn install_hook(
        self: &Arc<Self>,
        matcher: Matcher,
        instrumenter: Arc<dyn Instrumenter>,
        options: HookOptions,
    ) -> CoverageResult<Option<LoaderHook>> {
        matcher.validate()?;
        if self
            .hook_installed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("loader hook already installed, ignoring");
            return Ok(None);
        }
        self.set_instrumenter(Arc::clone(&instrumenter));
        tracing::info!(matcher = ?matcher, "loader hook installed");
        Ok(Some(LoaderHook::new(
            Arc::clone(self),
            matcher,
            instrumenter,
            options,
        )))
    }
}
