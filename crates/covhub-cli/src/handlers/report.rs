//! Report command handler - offline HTML and LCOV from a saved coverage map

use crate::error::{CliError, CliResult};
use crate::ReportArgs;
use covhub::export::ARCHIVE_FILE_NAME;
use covhub::model::remove_derived_info;
use covhub::report::{DirSink, HTML_REPORT_DIR, LCOV_FILE};
use covhub::{coverage_map_from_value, package, write_reports, CoverageMap};
use std::path::Path;

/// Read a coverage map saved by `/object` or extracted from `coverage.zip`
pub fn load_coverage(path: &Path) -> CliResult<CoverageMap> {
    let text = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| CliError::invalid_argument(format!("{}: {e}", path.display())))?;
    let mut coverage = coverage_map_from_value(value)?;
    remove_derived_info(&mut coverage);
    Ok(coverage)
}

/// Execute the report command, returning the number of files written
pub fn execute_report(args: &ReportArgs) -> CliResult<usize> {
    let coverage = load_coverage(&args.input)?;
    if coverage.is_empty() {
        tracing::warn!(input = %args.input.display(), "coverage map is empty");
    }

    let mut sink = DirSink::new(&args.output);
    write_reports(&mut sink, &coverage)?;
    let mut written = sink.written();

    if args.archive {
        let bytes = package(&coverage)?;
        std::fs::write(args.output.join(ARCHIVE_FILE_NAME), bytes)?;
        written += 1;
    }

    tracing::info!(
        files = coverage.len(),
        written,
        output = %args.output.display(),
        "reports written"
    );
    println!(
        "HTML report: {}",
        args.output.join(HTML_REPORT_DIR).join("index.html").display()
    );
    println!("LCOV report: {}", args.output.join(LCOV_FILE).display());
    Ok(written)
}
