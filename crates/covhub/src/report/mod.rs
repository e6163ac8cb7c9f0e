//! Report writers.
//!
//! A full report is the HTML page tree (with its assets) under
//! [`HTML_REPORT_DIR`] plus an LCOV file at [`LCOV_FILE`]. Reports are written
//! through a [`ReportSink`] so the same pages land on disk or in an archive.

pub mod assets;
pub mod html;
pub mod lcov;

pub use html::{
    escape_html, write_html_report, FileLinkMapper, HtmlReport, LinkMapper, UrlLinkMapper,
    Watermarks,
};
pub use lcov::LcovReport;

use crate::model::CoverageMap;
use crate::result::CoverageResult;
use crate::tree::TreeSummary;
use std::path::{Component, Path, PathBuf};

/// Directory of the HTML report inside a report bundle
pub const HTML_REPORT_DIR: &str = "lcov-report";

/// Name of the LCOV file inside a report bundle
pub const LCOV_FILE: &str = "lcov.info";

/// Destination for report files
pub trait ReportSink {
    /// Write `content` at `path`, a `/`-separated path relative to the sink root
    ///
    /// # Errors
    ///
    /// Returns error if the entry cannot be stored
    fn write_entry(&mut self, path: &str, content: &[u8]) -> CoverageResult<()>;
}

/// Writes report files below a directory
#[derive(Debug, Clone)]
pub struct DirSink {
    root: PathBuf,
    written: usize,
}

impl DirSink {
    /// Sink rooted at `root`; directories are created as needed
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            written: 0,
        }
    }

    /// Root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of files written so far
    #[must_use]
    pub const fn written(&self) -> usize {
        self.written
    }
}

impl ReportSink for DirSink {
    fn write_entry(&mut self, path: &str, content: &[u8]) -> CoverageResult<()> {
        let relative = Path::new(path);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("report entry escapes the output directory: {path}"),
            )
            .into());
        }
        let target = self.root.join(relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, content)?;
        self.written += 1;
        tracing::debug!(path = %target.display(), bytes = content.len(), "report file written");
        Ok(())
    }
}

/// Write the HTML report and the LCOV file for `coverage` into `sink`
///
/// # Errors
///
/// Returns the first error reported by the sink
pub fn write_reports(sink: &mut dyn ReportSink, coverage: &CoverageMap) -> CoverageResult<()> {
    let tree = TreeSummary::build(coverage);
    write_html_report(sink, &tree, coverage, HTML_REPORT_DIR)?;
    sink.write_entry(LCOV_FILE, LcovReport::new(coverage).generate().as_bytes())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::model::{FileCoverage, Location};
    use tempfile::TempDir;

    fn coverage() -> CoverageMap {
        let mut file = FileCoverage::new("/app/lib/a.js");
        file.add_statement(Location::lines(1, 1));
        CoverageMap::from([(file.path.clone(), file)])
    }

    #[test]
    fn test_dir_sink_writes_report_tree() {
        let temp = TempDir::new().unwrap();
        let mut sink = DirSink::new(temp.path());
        write_reports(&mut sink, &coverage()).unwrap();

        assert!(temp.path().join("lcov-report/index.html").is_file());
        assert!(temp.path().join("lcov-report/lib/a.js.html").is_file());
        assert!(temp.path().join("lcov-report/base.css").is_file());
        let lcov = std::fs::read_to_string(temp.path().join("lcov.info")).unwrap();
        assert!(lcov.contains("SF:/app/lib/a.js"));
        assert_eq!(sink.written(), 8);
    }

    #[test]
    fn test_dir_sink_rejects_escaping_paths() {
        let temp = TempDir::new().unwrap();
        let mut sink = DirSink::new(temp.path().join("out"));
        assert!(sink.write_entry("../evil.html", b"x").is_err());
        assert!(sink.write_entry("/etc/evil.html", b"x").is_err());
        assert_eq!(sink.written(), 0);
    }
}
