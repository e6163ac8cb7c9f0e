//! Content producer feeding a [`SequentialWriter`].

use super::sequential::{ArchiveSink, SequentialWriter};
use crate::report::ReportSink;
use crate::result::{CoverageError, CoverageResult};
use std::path::{Component, Path};

/// Builds archive entries piecewise and queues them in order.
///
/// `start` opens an entry, `write`/`println` append to it and `end` queues it.
/// Entry names have the configured prefix stripped.
#[derive(Debug)]
pub struct ArchiveWriter<S> {
    inner: SequentialWriter<S>,
    prefix: String,
    current: Option<(String, Vec<u8>)>,
}

impl<S: ArchiveSink> ArchiveWriter<S> {
    /// Producer over `sink` with no name prefix
    #[must_use]
    pub fn new(sink: S) -> Self {
        Self {
            inner: SequentialWriter::new(sink),
            prefix: String::new(),
            current: None,
        }
    }

    /// Strip `prefix` from entry names
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Archive-relative entry name; names climbing out of the archive root are rejected
    fn entry_name(&self, name: &str) -> CoverageResult<String> {
        let stripped = if self.prefix.is_empty() {
            name
        } else {
            name.strip_prefix(self.prefix.as_str()).unwrap_or(name)
        };
        let relative = stripped.trim_start_matches('/');
        if Path::new(relative)
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(CoverageError::archive(format!(
                "entry escapes the archive root: {name}"
            )));
        }
        Ok(relative.to_string())
    }

    /// Open entry `name`, discarding any unfinished entry
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError::Archive`] if `name` climbs out of the archive root
    pub fn start(&mut self, name: &str) -> CoverageResult<()> {
        self.current = Some((self.entry_name(name)?, Vec::new()));
        Ok(())
    }

    /// Append to the open entry
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError::Archive`] if no entry is open
    pub fn write(&mut self, data: &str) -> CoverageResult<()> {
        self.write_bytes(data.as_bytes())
    }

    /// Append bytes to the open entry
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError::Archive`] if no entry is open
    pub fn write_bytes(&mut self, data: &[u8]) -> CoverageResult<()> {
        let (_, buffer) = self
            .current
            .as_mut()
            .ok_or_else(|| CoverageError::archive("write without an open entry"))?;
        buffer.extend_from_slice(data);
        Ok(())
    }

    /// Append a line to the open entry
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError::Archive`] if no entry is open
    pub fn println(&mut self, line: &str) -> CoverageResult<()> {
        self.write(line)?;
        self.write("\n")
    }

    /// Queue the open entry
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError::Archive`] if no entry is open, or the writer's error
    pub fn end(&mut self) -> CoverageResult<()> {
        let (name, content) = self
            .current
            .take()
            .ok_or_else(|| CoverageError::archive("end without an open entry"))?;
        self.inner.enqueue(name, content)
    }

    /// Open `name`, let `fill` write it, then queue it
    ///
    /// # Errors
    ///
    /// Returns the first error of `fill` or of queueing
    pub fn write_file(
        &mut self,
        name: &str,
        fill: impl FnOnce(&mut Self) -> CoverageResult<()>,
    ) -> CoverageResult<()> {
        self.start(name)?;
        fill(self)?;
        self.end()
    }

    /// Queue the contents of the file at `source` as entry `dest`
    ///
    /// # Errors
    ///
    /// Returns error if `source` cannot be read, or the writer's error
    pub fn copy_file(&mut self, source: &Path, dest: &str) -> CoverageResult<()> {
        let content = std::fs::read(source)?;
        let name = self.entry_name(dest)?;
        self.inner.enqueue(name, content)
    }

    /// No more entries: finalize once everything queued is written
    ///
    /// # Errors
    ///
    /// Returns the sink's finalize error
    pub fn done(&mut self) -> CoverageResult<()> {
        self.inner.request_finalize()
    }

    /// The underlying sequential writer
    #[must_use]
    pub const fn writer(&self) -> &SequentialWriter<S> {
        &self.inner
    }

    /// Mutable access, for delivering completion notifications
    pub fn writer_mut(&mut self) -> &mut SequentialWriter<S> {
        &mut self.inner
    }

    /// Take the sink back
    #[must_use]
    pub fn into_sink(self) -> S {
        self.inner.into_sink()
    }
}

impl<S: ArchiveSink> ReportSink for ArchiveWriter<S> {
    fn write_entry(&mut self, path: &str, content: &[u8]) -> CoverageResult<()> {
        let name = self.entry_name(path)?;
        self.inner.enqueue(name, content.to_vec())
    }
}
