//! Export packager: the downloadable coverage bundle.
//!
//! ```text
//! coverage.zip
//! ├── coverage.json     raw coverage map, 4-space indented
//! ├── lcov-report/      HTML report pages and assets
//! └── lcov.info         LCOV report
//! ```

pub mod sequential;
pub mod writer;
pub mod zip_sink;

pub use sequential::{Append, ArchiveSink, SequentialWriter};
pub use writer::ArchiveWriter;
pub use zip_sink::ZipSink;

use crate::model::CoverageMap;
use crate::report::write_reports;
use crate::result::CoverageResult;
use serde::Serialize;

/// Name of the raw coverage entry
pub const COVERAGE_JSON: &str = "coverage.json";

/// File name offered to downloaders
pub const ARCHIVE_FILE_NAME: &str = "coverage.zip";

/// Serialize a coverage map the way the bundle stores it
///
/// # Errors
///
/// Returns error if serialization fails
pub fn coverage_json(coverage: &CoverageMap) -> CoverageResult<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    coverage.serialize(&mut serializer)?;
    Ok(out)
}

/// Write the bundle for `coverage` through `writer` and request finalization
///
/// # Errors
///
/// Returns the first serialization or archive error
pub fn write_bundle<S: ArchiveSink>(
    writer: &mut ArchiveWriter<S>,
    coverage: &CoverageMap,
) -> CoverageResult<()> {
    let json = coverage_json(coverage)?;
    writer.write_file(COVERAGE_JSON, |w| w.write_bytes(&json))?;
    write_reports(writer, coverage)?;
    writer.done()
}

/// Build the zip bundle for `coverage` in memory
///
/// # Errors
///
/// Returns the first serialization or archive error
pub fn package(coverage: &CoverageMap) -> CoverageResult<Vec<u8>> {
    let mut writer = ArchiveWriter::new(ZipSink::new());
    write_bundle(&mut writer, coverage)?;
    let sink = writer.into_sink();
    tracing::info!(files = coverage.len(), entries = sink.entries(), "coverage archive built");
    sink.into_bytes()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::model::{FileCoverage, Location};
    use std::io::{Cursor, Read};
    use zip::ZipArchive;

    fn coverage() -> CoverageMap {
        let mut file = FileCoverage::new("/app/lib/a.js");
        let idx = file.add_statement(Location::lines(1, 1));
        file.s.insert(idx, 1);
        CoverageMap::from([(file.path.clone(), file)])
    }

    #[test]
    fn test_coverage_json_uses_four_space_indent() {
        let json = String::from_utf8(coverage_json(&coverage()).unwrap()).unwrap();
        assert!(json.starts_with("{\n    \"/app/lib/a.js\": {\n        \"path\""));
    }

    #[test]
    fn test_package_layout() {
        let bytes = package(&coverage()).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();

        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(names.first().map(String::as_str), Some("coverage.json"));
        assert_eq!(names.last().map(String::as_str), Some("lcov.info"));
        assert!(names.contains(&"lcov-report/index.html".to_string()));
        assert!(names.contains(&"lcov-report/lib/a.js.html".to_string()));
        assert!(names.contains(&"lcov-report/base.css".to_string()));

        let mut json = String::new();
        archive
            .by_name("coverage.json")
            .unwrap()
            .read_to_string(&mut json)
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["/app/lib/a.js"]["s"]["0"], 1);
    }

    #[test]
    fn test_package_rejects_keys_escaping_the_report() {
        let mut file = FileCoverage::new("/x/../../evil.js");
        file.add_statement(Location::lines(1, 1));
        let coverage = CoverageMap::from([(file.path.clone(), file)]);
        let err = package(&coverage).unwrap_err();
        assert!(matches!(err, crate::CoverageError::Archive { .. }));
    }

    #[test]
    fn test_empty_coverage_still_packages() {
        let bytes = package(&CoverageMap::new()).unwrap();
        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert!(archive.len() >= 2);
    }
}
