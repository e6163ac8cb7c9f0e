//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// covhub: live coverage reports for instrumented JavaScript
#[derive(Parser, Debug)]
#[command(name = "covhub")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (warnings and errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve static files with instrumented scripts and a live coverage report
    Serve(ServeArgs),

    /// Render HTML and LCOV reports from a coverage.json file
    Report(ReportArgs),
}

/// Arguments for the serve command
#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// YAML configuration file (default: ./covhub.yaml when present)
    #[arg(short, long, env = "COVHUB_CONFIG")]
    pub config: Option<PathBuf>,

    /// HTTP port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory of static files and client scripts
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// URL prefix of the coverage handler
    #[arg(short, long)]
    pub mount: Option<String>,

    /// Also reset coverage on GET <mount>/reset
    #[arg(long)]
    pub reset_on_get: bool,

    /// Instrumenter program (receives the source on stdin)
    #[arg(short, long)]
    pub instrumenter: Option<String>,

    /// Directory whose files override the embedded report assets
    #[arg(long)]
    pub assets_dir: Option<PathBuf>,

    /// Allow cross-origin requests (browsers posting coverage from another origin)
    #[arg(long)]
    pub cors: bool,
}

/// Arguments for the report command
#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    /// Coverage map written by `/object` or `/download`
    pub input: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = "coverage")]
    pub output: PathBuf,

    /// Also write coverage.zip next to the reports
    #[arg(long)]
    pub archive: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_flags() {
        let cli = Cli::try_parse_from([
            "covhub",
            "serve",
            "--port",
            "9000",
            "--root",
            "public",
            "--mount",
            "/cov",
            "--reset-on-get",
        ])
        .unwrap();
        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.port, Some(9000));
        assert_eq!(args.root, Some(PathBuf::from("public")));
        assert_eq!(args.mount.as_deref(), Some("/cov"));
        assert!(args.reset_on_get);
        assert!(args.instrumenter.is_none());
    }

    #[test]
    fn test_report_defaults() {
        let cli = Cli::try_parse_from(["covhub", "-vv", "report", "coverage.json"]).unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Report(args) = cli.command else {
            panic!("expected report");
        };
        assert_eq!(args.input, PathBuf::from("coverage.json"));
        assert_eq!(args.output, PathBuf::from("coverage"));
        assert!(!args.archive);
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["covhub"]).is_err());
    }
}
