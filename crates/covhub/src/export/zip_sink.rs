//! In-memory zip archive sink.

use super::sequential::{Append, ArchiveSink};
use crate::result::{CoverageError, CoverageResult};
use std::fmt;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Deflate-compressed zip built in memory. Every append completes synchronously.
pub struct ZipSink {
    writer: Option<ZipWriter<Cursor<Vec<u8>>>>,
    bytes: Option<Vec<u8>>,
    entries: usize,
}

impl fmt::Debug for ZipSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZipSink")
            .field("entries", &self.entries)
            .field("finalized", &self.bytes.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for ZipSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ZipSink {
    /// Empty archive
    #[must_use]
    pub fn new() -> Self {
        Self {
            writer: Some(ZipWriter::new(Cursor::new(Vec::new()))),
            bytes: None,
            entries: 0,
        }
    }

    /// Entries stored so far
    #[must_use]
    pub const fn entries(&self) -> usize {
        self.entries
    }

    /// Archive bytes
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError::Archive`] if the archive was never finalized
    pub fn into_bytes(self) -> CoverageResult<Vec<u8>> {
        self.bytes
            .ok_or_else(|| CoverageError::archive("archive has not been finalized"))
    }
}

impl ArchiveSink for ZipSink {
    fn append(&mut self, name: &str, content: Vec<u8>) -> CoverageResult<Append> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| CoverageError::archive("archive already finalized"))?;
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        writer.start_file(name, options)?;
        writer.write_all(&content)?;
        self.entries += 1;
        Ok(Append::Written)
    }

    fn finalize(&mut self) -> CoverageResult<()> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| CoverageError::archive("archive already finalized"))?;
        self.bytes = Some(writer.finish()?.into_inner());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    #[test]
    fn test_entries_round_trip_in_order() {
        let mut sink = ZipSink::new();
        sink.append("coverage.json", b"{}".to_vec()).unwrap();
        sink.append("lcov-report/index.html", b"<html>".to_vec()).unwrap();
        sink.finalize().unwrap();
        assert_eq!(sink.entries(), 2);

        let mut archive = ZipArchive::new(Cursor::new(sink.into_bytes().unwrap())).unwrap();
        assert_eq!(archive.len(), 2);
        let mut file = archive.by_index(1).unwrap();
        assert_eq!(file.name(), "lcov-report/index.html");
        let mut html = String::new();
        file.read_to_string(&mut html).unwrap();
        assert_eq!(html, "<html>");
    }

    #[test]
    fn test_bytes_require_finalize() {
        assert!(ZipSink::new().into_bytes().is_err());
    }

    #[test]
    fn test_append_after_finalize_fails() {
        let mut sink = ZipSink::new();
        sink.finalize().unwrap();
        assert!(sink.append("late", Vec::new()).is_err());
        assert!(sink.finalize().is_err());
    }
}
