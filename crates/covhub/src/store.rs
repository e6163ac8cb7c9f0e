//! Coverage Store
//!
//! The mutable registry of per-file counters for the life of the host process.
//! Instrumented code increments counters in place; remote clients merge theirs in.

use crate::model::{CoverageMap, FileCoverage};

/// Path → counters, mutated as instrumented code runs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageStore {
    files: CoverageMap,
}

impl CoverageStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `files`
    #[must_use]
    pub fn from_map(files: CoverageMap) -> Self {
        Self { files }
    }

    /// The coverage map
    #[must_use]
    pub const fn files(&self) -> &CoverageMap {
        &self.files
    }

    /// Mutable access to the coverage map
    pub fn files_mut(&mut self) -> &mut CoverageMap {
        &mut self.files
    }

    /// Deep copy of the coverage map
    #[must_use]
    pub fn snapshot(&self) -> CoverageMap {
        self.files.clone()
    }

    /// Coverage for one file
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&FileCoverage> {
        self.files.get(path)
    }

    /// Mutable coverage for one file
    pub fn get_mut(&mut self, path: &str) -> Option<&mut FileCoverage> {
        self.files.get_mut(path)
    }

    /// Whether `path` is tracked
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Number of tracked files
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether nothing has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Register `file` unless its path is already tracked.
    ///
    /// Instrumented code calls this on its first execution; later executions
    /// keep the existing counters.
    pub fn ensure_file(&mut self, file: FileCoverage) -> &mut FileCoverage {
        self.files.entry(file.path.clone()).or_insert(file)
    }

    /// Increment a statement counter. Returns `false` if the file is not tracked.
    pub fn hit_statement(&mut self, path: &str, idx: u32) -> bool {
        self.files.get_mut(path).is_some_and(|file| {
            let hits = file.s.entry(idx).or_insert(0);
            *hits = hits.saturating_add(1);
            true
        })
    }

    /// Increment a function counter. Returns `false` if the file is not tracked.
    pub fn hit_function(&mut self, path: &str, idx: u32) -> bool {
        self.files.get_mut(path).is_some_and(|file| {
            let hits = file.f.entry(idx).or_insert(0);
            *hits = hits.saturating_add(1);
            true
        })
    }

    /// Increment one outcome of a branch. Returns `false` if the file is not tracked.
    pub fn hit_branch(&mut self, path: &str, idx: u32, outcome: usize) -> bool {
        self.files.get_mut(path).is_some_and(|file| {
            let outcomes = file.b.entry(idx).or_default();
            if outcomes.len() <= outcome {
                outcomes.resize(outcome + 1, 0);
            }
            if let Some(hits) = outcomes.get_mut(outcome) {
                *hits = hits.saturating_add(1);
            }
            true
        })
    }

    /// Merge coverage reported by a remote client.
    ///
    /// Files already tracked have their counters summed with the update; new
    /// files are adopted as-is.
    pub fn merge_client(&mut self, update: CoverageMap) {
        for (path, added) in update {
            match self.files.get_mut(&path) {
                Some(original) => original.merge(&added),
                None => {
                    self.files.insert(path, added);
                }
            }
        }
    }

    /// Drop every file for which `keep` returns `false`
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.files.retain(|path, _| keep(path));
    }
}
