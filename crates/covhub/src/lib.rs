//! covhub: coverage middleware for instrumented JavaScript applications
//!
//! Collects istanbul-style counters from code loaded in the host process and
//! from browsers, resets them to a post-load baseline, and serves HTML/LCOV
//! reports and a downloadable bundle over HTTP.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        CoverageContext                           │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────────┐  │
//! │  │ LoaderHook   │──►│ CoverageStore│◄──│ POST /client          │  │
//! │  │ (instrument, │   │  + Baselines │   │ (browser coverage)    │  │
//! │  │  baseline)   │   └──────┬───────┘   └──────────────────────┘  │
//! │  └──────────────┘          │                                      │
//! │                  ┌─────────┴─────────┐                            │
//! │                  ▼                   ▼                            │
//! │           TreeSummary ──► HTML/LCOV ──► SequentialWriter ──► zip  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use covhub::{CommandInstrumenter, CoverageContext, HookOptions, InstrumenterOptions, Matcher};
//! use std::sync::Arc;
//!
//! let ctx = CoverageContext::shared();
//! let instrumenter = Arc::new(CommandInstrumenter::new(InstrumenterOptions::default()));
//! let hook = ctx
//!     .install_hook(Matcher::root("/srv/app"), instrumenter, HookOptions::new())
//!     .expect("valid matcher");
//! assert!(hook.is_some());
//! ```

#![warn(missing_docs)]

pub mod baseline;
pub mod context;
pub mod export;
pub mod hook;
pub mod instrument;
pub mod model;
pub mod render;
pub mod report;
mod result;
#[cfg(feature = "server")]
pub mod server;
pub mod store;
pub mod summary;
pub mod tree;

pub use baseline::BaselineTracker;
pub use context::{CoverageContext, CoverageState};
pub use export::{package, ArchiveSink, ArchiveWriter, SequentialWriter, ZipSink};
pub use hook::{HookOptions, LoadOutcome, LoaderHook, Matcher, ModuleRuntime};
pub use instrument::{CommandInstrumenter, Instrumenter, InstrumenterOptions, COVERAGE_VARIABLE};
pub use model::{coverage_map_from_value, CoverageMap, FileCoverage};
pub use render::{render, Rendered, NO_COVERAGE_MESSAGE};
pub use report::{write_reports, DirSink, ReportSink};
pub use result::{CoverageError, CoverageResult};
#[cfg(feature = "server")]
pub use server::{create_handler, ClientHandler, ClientOptions, HandlerOptions};
pub use store::CoverageStore;
pub use summary::{CoverageSummary, Totals};
pub use tree::{TreeNode, TreeSummary};
