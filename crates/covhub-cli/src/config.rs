//! CLI configuration

use crate::commands::ServeArgs;
use crate::error::{CliError, CliResult};
use covhub::InstrumenterOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "covhub.yaml";

/// CLI verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Verbosity {
    /// Quiet - warnings and errors only
    Quiet,
    /// Normal - default output
    #[default]
    Normal,
    /// Verbose - per-request logging
    Verbose,
    /// Debug - maximum output
    Debug,
}

impl Verbosity {
    /// From the `-q` flag and `-v` count
    #[must_use]
    pub const fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Debug,
        }
    }

    /// Check if quiet mode
    #[must_use]
    pub const fn is_quiet(self) -> bool {
        matches!(self, Self::Quiet)
    }

    /// Check if verbose or higher
    #[must_use]
    pub const fn is_verbose(self) -> bool {
        matches!(self, Self::Verbose | Self::Debug)
    }
}

/// Configuration of `covhub serve`, from YAML then overridden by flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Bind address
    pub host: String,
    /// HTTP port
    pub port: u16,
    /// Static file root; client scripts below it are instrumented
    pub root: PathBuf,
    /// URL prefix of the coverage handler, normalized to `/name` or empty
    pub mount: String,
    /// Accept `GET <mount>/reset`
    pub reset_on_get: bool,
    /// Log every instrumented script
    pub verbose: bool,
    /// Permissive CORS for cross-origin `/client` posts
    pub cors: bool,
    /// Files here override the embedded report assets
    pub assets_dir: Option<PathBuf>,
    /// External instrumenter invocation
    pub instrumenter: InstrumenterOptions,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8888,
            root: PathBuf::from("."),
            mount: "/coverage".to_string(),
            reset_on_get: false,
            verbose: false,
            cors: false,
            assets_dir: None,
            instrumenter: InstrumenterOptions::default(),
        }
    }
}

impl ServeConfig {
    /// Parse YAML configuration
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Config`] on malformed YAML
    pub fn from_yaml(text: &str) -> CliResult<Self> {
        serde_yaml_ng::from_str(text).map_err(|e| CliError::config(e.to_string()))
    }

    /// Load `path`, or `./covhub.yaml` when present, or defaults
    ///
    /// # Errors
    ///
    /// Returns error if an explicit `path` cannot be read, or if the YAML is malformed
    pub fn load(path: Option<&Path>) -> CliResult<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !fallback.is_file() {
                    return Ok(Self::default());
                }
                fallback
            }
        };
        let text = std::fs::read_to_string(&path)
            .map_err(|e| CliError::config(format!("{}: {e}", path.display())))?;
        Self::from_yaml(&text)
            .map_err(|e| CliError::config(format!("{}: {e}", path.display())))
    }

    /// Apply command-line overrides
    #[must_use]
    pub fn with_args(mut self, args: &ServeArgs, verbosity: Verbosity) -> Self {
        if let Some(port) = args.port {
            self.port = port;
        }
        if let Some(root) = &args.root {
            self.root.clone_from(root);
        }
        if let Some(mount) = &args.mount {
            self.mount.clone_from(mount);
        }
        if let Some(dir) = &args.assets_dir {
            self.assets_dir = Some(dir.clone());
        }
        if let Some(command) = &args.instrumenter {
            let mut words = command.split_whitespace();
            if let Some(program) = words.next() {
                self.instrumenter = InstrumenterOptions {
                    program: program.to_string(),
                    args: words.map(str::to_string).collect(),
                    env: std::mem::take(&mut self.instrumenter.env),
                };
            }
        }
        self.reset_on_get |= args.reset_on_get;
        self.cors |= args.cors;
        self.verbose |= verbosity.is_verbose();
        self
    }

    /// Check values and normalize `mount`
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Config`] if `mount` is not an absolute URL path,
    /// or the instrumenter program is empty
    pub fn validate(mut self) -> CliResult<Self> {
        if !self.mount.starts_with('/') {
            return Err(CliError::config(format!(
                "mount must start with '/': {}",
                self.mount
            )));
        }
        self.mount = self.mount.trim_end_matches('/').to_string();
        if self.instrumenter.program.trim().is_empty() {
            return Err(CliError::config("instrumenter program must not be empty"));
        }
        Ok(self)
    }

    /// `host:port`
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
