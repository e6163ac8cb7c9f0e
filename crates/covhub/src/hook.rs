//! Instrumentation Hook
//!
//! Sits in front of the host's module loader. Matching files are instrumented
//! before they execute; after a file's first load completes, the post-load
//! callback runs and then the file's baseline is captured.
//!
//! Modules are executed at most once per hook, mirroring a module cache.

use crate::context::CoverageContext;
use crate::instrument::Instrumenter;
use crate::result::{CoverageError, CoverageResult};
use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Directory name whose contents are never instrumented by a root matcher
pub const VENDOR_DIR: &str = "node_modules";

/// Predicate over absolute file paths
pub type MatchFn = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

/// Callback run after a matched file's first load, before its baseline capture
pub type PostLoadHook = Arc<dyn Fn(&Path) + Send + Sync>;

/// Which files get instrumented
#[derive(Clone)]
pub enum Matcher {
    /// Arbitrary predicate
    Predicate(MatchFn),
    /// Everything under the root except vendored dependencies
    Root(PathBuf),
}

impl Matcher {
    /// Matcher from a predicate
    pub fn predicate(f: impl Fn(&Path) -> bool + Send + Sync + 'static) -> Self {
        Self::Predicate(Arc::new(f))
    }

    /// Matcher accepting files under `root` outside any `node_modules` directory
    pub fn root(root: impl Into<PathBuf>) -> Self {
        Self::Root(root.into())
    }

    /// Check the matcher can be installed
    pub fn validate(&self) -> CoverageResult<()> {
        match self {
            Self::Predicate(_) => Ok(()),
            Self::Root(root) if root.as_os_str().is_empty() => {
                Err(CoverageError::configuration("matcher root must not be empty"))
            }
            Self::Root(root) if !root.is_absolute() => Err(CoverageError::configuration(format!(
                "matcher root must be an absolute path, got {}",
                root.display()
            ))),
            Self::Root(_) => Ok(()),
        }
    }

    /// Whether `path` should be instrumented
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        match self {
            Self::Predicate(f) => f(path),
            Self::Root(root) => path.strip_prefix(root).is_ok_and(|rest| {
                !rest
                    .components()
                    .any(|c| matches!(c, Component::Normal(name) if name == VENDOR_DIR))
            }),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Predicate(_) => f.write_str("Predicate(..)"),
            Self::Root(root) => f.debug_tuple("Root").field(root).finish(),
        }
    }
}

/// Hook configuration
#[derive(Clone, Default)]
pub struct HookOptions {
    /// Log every instrumented file at info level
    pub verbose: bool,
    /// Extra callback after each matched file's first load
    pub post_load_hook: Option<PostLoadHook>,
}

impl HookOptions {
    /// Default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable verbose logging
    #[must_use]
    pub const fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Set the post-load callback
    #[must_use]
    pub fn post_load_hook(mut self, hook: impl Fn(&Path) + Send + Sync + 'static) -> Self {
        self.post_load_hook = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for HookOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookOptions")
            .field("verbose", &self.verbose)
            .field("post_load_hook", &self.post_load_hook.is_some())
            .finish()
    }
}

/// The host's script engine
pub trait ModuleRuntime {
    /// Run a module's source to completion. Instrumented source records its
    /// hits into `coverage`.
    fn execute(&mut self, path: &Path, source: &str, coverage: &CoverageContext)
        -> CoverageResult<()>;
}

/// What happened to a load request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Matched, instrumented and executed
    Instrumented,
    /// Matched, but instrumentation failed; the original source was executed
    InstrumentationSkipped,
    /// Not matched; executed untouched
    Unmatched,
    /// Already loaded; nothing executed
    Cached,
}

/// An installed loader hook. Obtained from [`CoverageContext::install_hook`].
pub struct LoaderHook {
    ctx: Arc<CoverageContext>,
    matcher: Matcher,
    instrumenter: Arc<dyn Instrumenter>,
    options: HookOptions,
    loaded: HashSet<PathBuf>,
}

impl fmt::Debug for LoaderHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderHook")
            .field("matcher", &self.matcher)
            .field("instrumenter", &self.instrumenter)
            .field("options", &self.options)
            .field("loaded", &self.loaded.len())
            .finish()
    }
}

impl LoaderHook {
    pub(crate) fn new(
        ctx: Arc<CoverageContext>,
        matcher: Matcher,
        instrumenter: Arc<dyn Instrumenter>,
        options: HookOptions,
    ) -> Self {
        Self {
            ctx,
            matcher,
            instrumenter,
            options,
            loaded: HashSet::new(),
        }
    }

    /// The context this hook records into
    #[must_use]
    pub fn context(&self) -> &Arc<CoverageContext> {
        &self.ctx
    }

    /// Whether `path` would be instrumented
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        self.matcher.matches(path)
    }

    /// Whether `path` has completed its first load
    #[must_use]
    pub fn is_loaded(&self, path: &Path) -> bool {
        self.loaded.contains(path)
    }

    /// Instrument `code` if `path` matches.
    ///
    /// Returns `None` for unmatched files and for files whose instrumentation
    /// failed (logged as a warning); callers then run the original source.
    pub fn transform(&self, path: &Path, code: &str) -> Option<String> {
        if !self.matcher.matches(path) {
            return None;
        }
        match self.instrumenter.instrument(code, path) {
            Ok(instrumented) => {
                if self.options.verbose {
                    info!(file = %path.display(), "module instrumented");
                } else {
                    debug!(file = %path.display(), "module instrumented");
                }
                Some(instrumented)
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "instrumentation failed, loading original source");
                None
            }
        }
    }

    /// Post-load bookkeeping for a matched file: user callback, then baseline.
    ///
    /// Must run only after the module's top-level code finished executing.
    pub fn after_first_load(&self, path: &Path) {
        if let Some(hook) = &self.options.post_load_hook {
            hook(path);
        }
        let key = path.display().to_string();
        if self.ctx.capture_baseline(&key) {
            debug!(file = %key, "baseline captured");
        }
    }

    /// Load `path` through `runtime`.
    ///
    /// A path that loaded successfully before is not executed again. Read and
    /// execution failures are logged and returned; the file stays unloaded.
    pub fn load(&mut self, path: &Path, runtime: &mut dyn ModuleRuntime) -> CoverageResult<LoadOutcome> {
        if self.loaded.contains(path) {
            return Ok(LoadOutcome::Cached);
        }

        let source = std::fs::read_to_string(path).map_err(|e| {
            warn!(file = %path.display(), error = %e, "could not read module");
            e
        })?;

        if !self.matcher.matches(path) {
            runtime.execute(path, &source, &self.ctx)?;
            self.loaded.insert(path.to_path_buf());
            return Ok(LoadOutcome::Unmatched);
        }

        let (code, outcome) = match self.transform(path, &source) {
            Some(instrumented) => (instrumented, LoadOutcome::Instrumented),
            None => (source, LoadOutcome::InstrumentationSkipped),
        };

        runtime.execute(path, &code, &self.ctx).map_err(|e| {
            warn!(file = %path.display(), error = %e, "module execution failed");
            e
        })?;
        self.loaded.insert(path.to_path_buf());
        self.after_first_load(path);
        Ok(outcome)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::model::{Counters, FileCoverage, Location};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Marks the source so the runtime knows it was instrumented
    #[derive(Debug)]
    struct MarkingInstrumenter;

    impl Instrumenter for MarkingInstrumenter {
        fn instrument(&self, code: &str, _path: &Path) -> CoverageResult<String> {
            Ok(format!("//instrumented\n{code}"))
        }
    }

    #[derive(Debug)]
    struct BrokenInstrumenter;

    impl Instrumenter for BrokenInstrumenter {
        fn instrument(&self, _code: &str, path: &Path) -> CoverageResult<String> {
            Err(CoverageError::instrumentation(path.display().to_string(), "syntax error"))
        }
    }

    /// Every non-empty line of instrumented source is one statement
    #[derive(Debug, Default)]
    struct LineRuntime {
        executed: Vec<PathBuf>,
        events: Arc<Mutex<Vec<String>>>,
    }

    impl ModuleRuntime for LineRuntime {
        fn execute(&mut self, path: &Path, source: &str, coverage: &CoverageContext) -> CoverageResult<()> {
            self.executed.push(path.to_path_buf());
            self.events.lock().unwrap().push(format!("execute {}", path.display()));
            let Some(body) = source.strip_prefix("//instrumented\n") else {
                return Ok(());
            };
            let key = path.display().to_string();
            coverage.with_store(|store| {
                let mut file = FileCoverage::new(&key);
                for (n, line) in body.lines().enumerate() {
                    if !line.trim().is_empty() {
                        file.add_statement(Location::lines(n as u32 + 1, n as u32 + 1));
                    }
                }
                let statements: Vec<u32> = file.s.keys().copied().collect();
                store.ensure_file(file);
                for idx in statements {
                    store.hit_statement(&key, idx);
                }
            });
            Ok(())
        }
    }

    fn write(dir: &TempDir, rel: &str, body: &str) -> PathBuf {
        let path = dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_root_matcher_excludes_node_modules() {
        let matcher = Matcher::root("/app");
        assert!(matcher.matches(Path::new("/app/lib/a.js")));
        assert!(!matcher.matches(Path::new("/app/node_modules/dep/index.js")));
        assert!(!matcher.matches(Path::new("/app/lib/node_modules/x.js")));
        assert!(!matcher.matches(Path::new("/other/a.js")));
        assert!(!matcher.matches(Path::new("/application/a.js")));
    }

    #[test]
    fn test_root_matcher_validation() {
        assert!(Matcher::root("/app").validate().is_ok());
        assert!(Matcher::root("").validate().is_err());
        assert!(Matcher::root("app").validate().is_err());
        assert!(Matcher::predicate(|_| true).validate().is_ok());
    }

    #[test]
    fn test_predicate_matcher() {
        let matcher = Matcher::predicate(|p| p.extension().is_some_and(|e| e == "js"));
        assert!(matcher.matches(Path::new("/x/a.js")));
        assert!(!matcher.matches(Path::new("/x/a.css")));
    }

    #[test]
    fn test_load_instruments_and_captures_baseline() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "lib/a.js", "var a = 1;\n");
        let ctx = CoverageContext::shared();
        let mut hook = ctx
            .install_hook(
                Matcher::root(dir.path()),
                Arc::new(MarkingInstrumenter),
                HookOptions::default(),
            )
            .unwrap()
            .unwrap();
        let mut runtime = LineRuntime::default();

        let outcome = hook.load(&path, &mut runtime).unwrap();

        let key = path.display().to_string();
        assert_eq!(outcome, LoadOutcome::Instrumented);
        assert_eq!(ctx.snapshot()[&key].s, Counters::from([(0, 1)]));
        assert_eq!(ctx.lock().baselines.get(&key).unwrap().s, Counters::from([(0, 1)]));
    }

    #[test]
    fn test_second_load_is_cached() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "a.js", "var a = 1;\n");
        let ctx = CoverageContext::shared();
        let mut hook = ctx
            .install_hook(Matcher::root(dir.path()), Arc::new(MarkingInstrumenter), HookOptions::default())
            .unwrap()
            .unwrap();
        let mut runtime = LineRuntime::default();

        hook.load(&path, &mut runtime).unwrap();
        assert_eq!(hook.load(&path, &mut runtime).unwrap(), LoadOutcome::Cached);
        assert_eq!(runtime.executed.len(), 1);
        assert!(hook.is_loaded(&path));
    }

    #[test]
    fn test_unmatched_file_runs_untouched() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "node_modules/dep/index.js", "module.exports = 1;\n");
        let ctx = CoverageContext::shared();
        let mut hook = ctx
            .install_hook(Matcher::root(dir.path()), Arc::new(MarkingInstrumenter), HookOptions::default())
            .unwrap()
            .unwrap();
        let mut runtime = LineRuntime::default();

        assert_eq!(hook.load(&path, &mut runtime).unwrap(), LoadOutcome::Unmatched);
        assert!(ctx.is_empty());
        assert!(ctx.lock().baselines.is_empty());
    }

    #[test]
    fn test_instrumentation_failure_falls_back_to_original() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "a.js", "var a = ;\n");
        let ctx = CoverageContext::shared();
        let mut hook = ctx
            .install_hook(Matcher::root(dir.path()), Arc::new(BrokenInstrumenter), HookOptions::default())
            .unwrap()
            .unwrap();
        let mut runtime = LineRuntime::default();

        let outcome = hook.load(&path, &mut runtime).unwrap();
        assert_eq!(outcome, LoadOutcome::InstrumentationSkipped);
        assert_eq!(runtime.executed, vec![path]);
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_missing_file_is_an_error_not_a_panic() {
        let dir = TempDir::new().unwrap();
        let ctx = CoverageContext::shared();
        let mut hook = ctx
            .install_hook(Matcher::root(dir.path()), Arc::new(MarkingInstrumenter), HookOptions::default())
            .unwrap()
            .unwrap();
        let mut runtime = LineRuntime::default();

        let err = hook
            .load(&dir.path().join("missing.js"), &mut runtime)
            .unwrap_err();
        assert!(matches!(err, CoverageError::Io(_)));
        assert!(runtime.executed.is_empty());
    }

    #[test]
    fn test_post_load_hook_runs_after_execution_before_baseline() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "a.js", "var a = 1;\n");
        let ctx = CoverageContext::shared();
        let events = Arc::new(Mutex::new(Vec::new()));

        let seen = Arc::clone(&events);
        let probe = Arc::clone(&ctx);
        let options = HookOptions::new().verbose(true).post_load_hook(move |p| {
            let key = p.display().to_string();
            let has_baseline = probe.lock().baselines.contains(&key);
            seen.lock()
                .unwrap()
                .push(format!("post-load {} baseline={has_baseline}", p.display()));
        });
        let mut hook = ctx
            .install_hook(Matcher::root(dir.path()), Arc::new(MarkingInstrumenter), options)
            .unwrap()
            .unwrap();
        let mut runtime = LineRuntime {
            events: Arc::clone(&events),
            ..LineRuntime::default()
        };

        hook.load(&path, &mut runtime).unwrap();

        let events = events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                format!("execute {}", path.display()),
                format!("post-load {} baseline=false", path.display()),
            ]
        );
        assert!(ctx.lock().baselines.contains(&path.display().to_string()));
    }

    #[test]
    fn test_transform_skips_unmatched() {
        let ctx = CoverageContext::shared();
        let hook = ctx
            .install_hook(Matcher::root("/app"), Arc::new(MarkingInstrumenter), HookOptions::default())
            .unwrap()
            .unwrap();
        assert!(hook.transform(Path::new("/elsewhere/a.js"), "x").is_none());
        assert_eq!(
            hook.transform(Path::new("/app/a.js"), "x").as_deref(),
            Some("//instrumented\nx")
        );
    }
}
