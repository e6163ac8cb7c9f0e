//! Sequential archive writer.
//!
//! Entries are handed to an [`ArchiveSink`] one at a time, in enqueue order.
//! A sink either stores an entry synchronously or reports it pending; a pending
//! entry blocks the queue until [`SequentialWriter::entry_written`] is called.
//!
//! ```text
//!            enqueue                 Written / entry_written
//!   Idle ───────────────▶ Writing ─────────────────────────▶ Idle
//!    │                                                        │
//!    └──── queue empty && finalize requested ─▶ Finalized ◀───┘
//! ```

use crate::result::{CoverageError, CoverageResult};
use std::collections::VecDeque;

/// How a sink handled an appended entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Append {
    /// Stored before `append` returned
    Written,
    /// Stored later; the owner calls [`SequentialWriter::entry_written`]
    Pending,
}

/// Archive backend
pub trait ArchiveSink {
    /// Store one entry
    ///
    /// # Errors
    ///
    /// Returns error if the entry cannot be stored
    fn append(&mut self, name: &str, content: Vec<u8>) -> CoverageResult<Append>;

    /// Complete the archive. Called exactly once, after the last entry.
    ///
    /// # Errors
    ///
    /// Returns error if the archive cannot be completed
    fn finalize(&mut self) -> CoverageResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Idle,
    Writing,
    Finalized,
}

/// Queue in front of an [`ArchiveSink`] keeping at most one entry in flight
#[derive(Debug)]
pub struct SequentialWriter<S> {
    sink: S,
    queue: VecDeque<(String, Vec<u8>)>,
    state: WriterState,
    finalizing: bool,
}

impl<S: ArchiveSink> SequentialWriter<S> {
    /// Writer over `sink`
    #[must_use]
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            queue: VecDeque::new(),
            state: WriterState::Idle,
            finalizing: false,
        }
    }

    /// Queue an entry; written immediately when nothing is in flight
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError::Archive`] after finalization, or the sink's error
    pub fn enqueue(&mut self, name: impl Into<String>, content: Vec<u8>) -> CoverageResult<()> {
        let name = name.into();
        if self.state == WriterState::Finalized {
            return Err(CoverageError::archive(format!(
                "cannot add `{name}` to a finalized archive"
            )));
        }
        self.queue.push_back((name, content));
        self.pump()
    }

    /// Completion notification for a pending entry
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError::Archive`] when no entry is in flight, or the sink's error
    pub fn entry_written(&mut self) -> CoverageResult<()> {
        if self.state != WriterState::Writing {
            return Err(CoverageError::archive("no archive entry in flight"));
        }
        self.state = WriterState::Idle;
        self.pump()
    }

    /// Finalize once every queued entry has been written
    ///
    /// # Errors
    ///
    /// Returns the sink's error
    pub fn request_finalize(&mut self) -> CoverageResult<()> {
        if self.state == WriterState::Finalized {
            return Ok(());
        }
        self.finalizing = true;
        self.pump()
    }

    fn pump(&mut self) -> CoverageResult<()> {
        while self.state == WriterState::Idle {
            if let Some((name, content)) = self.queue.pop_front() {
                self.state = WriterState::Writing;
                match self.sink.append(&name, content) {
                    Ok(Append::Written) => self.state = WriterState::Idle,
                    Ok(Append::Pending) => {}
                    Err(e) => {
                        self.state = WriterState::Idle;
                        return Err(e);
                    }
                }
            } else if self.finalizing {
                self.sink.finalize()?;
                self.state = WriterState::Finalized;
                tracing::debug!("archive finalized");
            } else {
                break;
            }
        }
        Ok(())
    }

    /// Whether an entry is in flight
    #[must_use]
    pub fn is_writing(&self) -> bool {
        self.state == WriterState::Writing
    }

    /// Whether the sink has been finalized
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.state == WriterState::Finalized
    }

    /// Entries waiting behind the one in flight
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// The sink
    #[must_use]
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// Take the sink back
    #[must_use]
    pub fn into_sink(self) -> S {
        self.sink
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod tests {
    use super::*;

    /// Records appends; optionally defers each one until notified
    #[derive(Debug, Default)]
    pub(crate) struct RecordingSink {
        pub(crate) deferred: bool,
        pub(crate) entries: Vec<(String, Vec<u8>)>,
        pub(crate) finalized: usize,
        /// entries recorded when finalize ran
        pub(crate) entries_at_finalize: Option<usize>,
    }

    impl ArchiveSink for RecordingSink {
        fn append(&mut self, name: &str, content: Vec<u8>) -> CoverageResult<Append> {
            self.entries.push((name.to_string(), content));
            Ok(if self.deferred {
                Append::Pending
            } else {
                Append::Written
            })
        }

        fn finalize(&mut self) -> CoverageResult<()> {
            self.finalized += 1;
            self.entries_at_finalize = Some(self.entries.len());
            Ok(())
        }
    }

    fn names(sink: &RecordingSink) -> Vec<&str> {
        sink.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    #[test]
    fn test_synchronous_sink_writes_in_order() {
        let mut writer = SequentialWriter::new(RecordingSink::default());
        writer.enqueue("a", b"1".to_vec()).unwrap();
        writer.enqueue("b", b"2".to_vec()).unwrap();
        writer.enqueue("c", b"3".to_vec()).unwrap();
        writer.request_finalize().unwrap();

        assert!(writer.is_finalized());
        let sink = writer.into_sink();
        assert_eq!(names(&sink), vec!["a", "b", "c"]);
        assert_eq!(sink.finalized, 1);
    }

    #[test]
    fn test_pending_entry_blocks_the_queue() {
        let sink = RecordingSink {
            deferred: true,
            ..RecordingSink::default()
        };
        let mut writer = SequentialWriter::new(sink);
        writer.enqueue("a", Vec::new()).unwrap();
        writer.enqueue("b", Vec::new()).unwrap();
        writer.enqueue("c", Vec::new()).unwrap();
        writer.request_finalize().unwrap();

        assert!(writer.is_writing());
        assert_eq!(names(writer.sink()), vec!["a"]);
        assert_eq!(writer.queued(), 2);

        writer.entry_written().unwrap();
        assert_eq!(names(writer.sink()), vec!["a", "b"]);
        writer.entry_written().unwrap();
        assert_eq!(writer.sink().finalized, 0);
        writer.entry_written().unwrap();

        assert!(writer.is_finalized());
        assert_eq!(writer.sink().finalized, 1);
        assert_eq!(writer.sink().entries_at_finalize, Some(3));
    }

    #[test]
    fn test_finalize_when_idle_and_empty_is_immediate() {
        let mut writer = SequentialWriter::new(RecordingSink::default());
        writer.request_finalize().unwrap();
        assert!(writer.is_finalized());
        writer.request_finalize().unwrap();
        assert_eq!(writer.sink().finalized, 1);
    }

    #[test]
    fn test_entries_after_finalize_are_rejected() {
        let mut writer = SequentialWriter::new(RecordingSink::default());
        writer.request_finalize().unwrap();
        let err = writer.enqueue("late", Vec::new()).unwrap_err();
        assert!(matches!(err, CoverageError::Archive { .. }));
        assert!(writer.sink().entries.is_empty());
    }

    #[test]
    fn test_spurious_notification_is_an_error() {
        let mut writer = SequentialWriter::new(RecordingSink::default());
        assert!(writer.entry_written().is_err());
    }
}
