//! Source instrumentation seam.
//!
//! covhub never rewrites code itself. An [`Instrumenter`] turns plain source
//! into source that records hits into the `__coverage__` map; the stock
//! implementation shells out to an external instrumenting program.

use crate::result::{CoverageError, CoverageResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// Name of the global map instrumented code writes into. Not configurable.
pub const COVERAGE_VARIABLE: &str = "__coverage__";

/// Rewrites source text so that executing it records coverage
pub trait Instrumenter: Send + Sync + fmt::Debug {
    /// Instrument `code` read from `path`
    fn instrument(&self, code: &str, path: &Path) -> CoverageResult<String>;
}

/// Options passed through to the external instrumenter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumenterOptions {
    /// Program to run
    pub program: String,
    /// Arguments; `{file}` and `{coverage_variable}` are substituted
    pub args: Vec<String>,
    /// Extra environment for the program
    pub env: BTreeMap<String, String>,
}

impl Default for InstrumenterOptions {
    fn default() -> Self {
        Self {
            program: "nyc".to_string(),
            args: vec![
                "instrument".to_string(),
                "--compact=false".to_string(),
                "{file}".to_string(),
            ],
            env: BTreeMap::new(),
        }
    }
}

impl InstrumenterOptions {
    /// Options running `program` with no arguments
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    /// Append an argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set an environment variable for the program
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    fn expand_args(&self, path: &Path) -> Vec<String> {
        let file = path.display().to_string();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{file}", &file)
                    .replace("{coverage_variable}", COVERAGE_VARIABLE)
            })
            .collect()
    }
}

/// Instrumenter backed by an external program.
///
/// The source is written to the program's stdin and the instrumented source is
/// read from its stdout. A non-zero exit status is an instrumentation error.
#[derive(Debug, Clone)]
pub struct CommandInstrumenter {
    options: InstrumenterOptions,
}

impl CommandInstrumenter {
    /// Create an instrumenter from options
    #[must_use]
    pub fn new(options: InstrumenterOptions) -> Self {
        Self { options }
    }

    /// The options in effect
    #[must_use]
    pub const fn options(&self) -> &InstrumenterOptions {
        &self.options
    }
}

impl Instrumenter for CommandInstrumenter {
    fn instrument(&self, code: &str, path: &Path) -> CoverageResult<String> {
        let display = path.display().to_string();
        let mut child = Command::new(&self.options.program)
            .args(self.options.expand_args(path))
            .envs(&self.options.env)
            .env("COVHUB_COVERAGE_VARIABLE", COVERAGE_VARIABLE)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                CoverageError::instrumentation(
                    &display,
                    format!("failed to run `{}`: {e}", self.options.program),
                )
            })?;

        // stdin and stdout must drain concurrently or a large file deadlocks
        let writer = child.stdin.take().map(|mut stdin| {
            let code = code.to_owned();
            std::thread::spawn(move || match stdin.write_all(code.as_bytes()) {
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
                other => other,
            })
        });

        let output = child.wait_with_output()?;
        if let Some(handle) = writer {
            if let Ok(Err(e)) = handle.join() {
                return Err(CoverageError::instrumentation(&display, e.to_string()));
            }
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CoverageError::instrumentation(
                &display,
                format!(
                    "`{}` exited with {}: {}",
                    self.options.program,
                    output.status,
                    stderr.trim()
                ),
            ));
        }

        String::from_utf8(output.stdout)
            .map_err(|e| CoverageError::instrumentation(&display, e.to_string()))
    }
}
