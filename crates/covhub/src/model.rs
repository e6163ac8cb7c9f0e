//! Istanbul-format coverage data model.
//!
//! A [`FileCoverage`] carries three counter tables keyed by the index the
//! instrumenter assigned to each statement, function and branch:
//!
//! ```text
//! {
//!   "path": "/app/lib/a.js",
//!   "s": { "0": 1, "1": 0 },          statement hits
//!   "f": { "0": 1 },                  function hits
//!   "b": { "0": [1, 0] },             hits per branch outcome
//!   "statementMap": { ... }, "fnMap": { ... }, "branchMap": { ... },
//!   "l": { "3": 1 }                   derived line hits (optional)
//! }
//! ```
//!
//! Fields this crate does not interpret (`hash`, `code`, `_coverageSchema`, ...)
//! survive a deserialize/serialize cycle untouched.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Path → per-file coverage
pub type CoverageMap = BTreeMap<String, FileCoverage>;

/// Index → hit count
pub type Counters = BTreeMap<u32, u64>;

/// Branch index → hit count per outcome
pub type BranchCounters = BTreeMap<u32, Vec<u64>>;

/// Treat an explicit `null` like a missing field
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Index-keyed table. Keys are parsed by hand: the flattened `extra` field makes
/// serde buffer the record, and buffered string keys do not coerce to integers.
fn indexed<'de, D, T>(deserializer: D) -> Result<BTreeMap<u32, T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(indexed_opt(deserializer)?.unwrap_or_default())
}

fn indexed_opt<'de, D, T>(deserializer: D) -> Result<Option<BTreeMap<u32, T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let Some(raw) = Option::<BTreeMap<String, T>>::deserialize(deserializer)? else {
        return Ok(None);
    };
    raw.into_iter()
        .map(|(key, value)| {
            key.trim()
                .parse::<u32>()
                .map(|idx| (idx, value))
                .map_err(|_| serde::de::Error::custom(format!("invalid index `{key}`")))
        })
        .collect::<Result<_, _>>()
        .map(Some)
}

const fn is_false(value: &bool) -> bool {
    !*value
}

/// Line/column position in a source file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// 1-based line
    #[serde(default, deserialize_with = "nullable")]
    pub line: u32,
    /// 0-based column
    #[serde(default, deserialize_with = "nullable")]
    pub column: u32,
}

impl Position {
    /// Create a position
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// Source span of a statement, function or branch outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Start of the span
    #[serde(default)]
    pub start: Position,
    /// End of the span
    #[serde(default)]
    pub end: Position,
    /// Excluded from coverage by an ignore hint
    #[serde(default, skip_serializing_if = "is_false")]
    pub skip: bool,
}

impl Location {
    /// Span covering `start_line..=end_line`
    #[must_use]
    pub const fn lines(start_line: u32, end_line: u32) -> Self {
        Self {
            start: Position::new(start_line, 0),
            end: Position::new(end_line, 0),
            skip: false,
        }
    }
}

/// Entry of `fnMap`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionMapping {
    /// Function name (`(anonymous_N)` for anonymous functions)
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    /// Declaration line
    #[serde(default, deserialize_with = "nullable")]
    pub line: u32,
    /// Declaration span
    #[serde(default)]
    pub loc: Location,
    /// Excluded from coverage
    #[serde(default, skip_serializing_if = "is_false")]
    pub skip: bool,
    /// Remaining instrumenter fields (`decl`, ...)
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Entry of `branchMap`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BranchMapping {
    /// Line of the branching construct
    #[serde(default, deserialize_with = "nullable")]
    pub line: u32,
    /// Branch kind (`if`, `cond-expr`, `switch`, `binary-expr`, ...)
    #[serde(rename = "type", default, deserialize_with = "nullable")]
    pub kind: String,
    /// One span per outcome
    #[serde(default, deserialize_with = "nullable")]
    pub locations: Vec<Location>,
    /// Remaining instrumenter fields
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Value copy of the three counter tables of one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Statement hits
    pub s: Counters,
    /// Function hits
    pub f: Counters,
    /// Branch outcome hits
    pub b: BranchCounters,
}

/// Coverage record of a single file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileCoverage {
    /// Absolute path of the instrumented file
    #[serde(default, deserialize_with = "nullable")]
    pub path: String,
    /// Statement hits
    #[serde(default, deserialize_with = "indexed")]
    pub s: Counters,
    /// Branch outcome hits
    #[serde(default, deserialize_with = "indexed")]
    pub b: BranchCounters,
    /// Function hits
    #[serde(default, deserialize_with = "indexed")]
    pub f: Counters,
    /// Function locations
    #[serde(rename = "fnMap", default, deserialize_with = "indexed")]
    pub fn_map: BTreeMap<u32, FunctionMapping>,
    /// Statement locations
    #[serde(rename = "statementMap", default, deserialize_with = "indexed")]
    pub statement_map: BTreeMap<u32, Location>,
    /// Branch locations
    #[serde(rename = "branchMap", default, deserialize_with = "indexed")]
    pub branch_map: BTreeMap<u32, BranchMapping>,
    /// Derived line hits, present only after [`FileCoverage::add_derived_info`]
    #[serde(
        default,
        deserialize_with = "indexed_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub l: Option<Counters>,
    /// Fields passed through untouched
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl FileCoverage {
    /// Empty record for `path`
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Register a statement with zero hits, returning its index
    pub fn add_statement(&mut self, loc: Location) -> u32 {
        let idx = next_index(&self.statement_map);
        self.statement_map.insert(idx, loc);
        self.s.insert(idx, 0);
        idx
    }

    /// Register a function with zero hits, returning its index
    pub fn add_function(&mut self, name: impl Into<String>, loc: Location) -> u32 {
        let idx = next_index(&self.fn_map);
        self.fn_map.insert(
            idx,
            FunctionMapping {
                name: name.into(),
                line: loc.start.line,
                loc,
                ..FunctionMapping::default()
            },
        );
        self.f.insert(idx, 0);
        idx
    }

    /// Register a branch with one zeroed counter per outcome, returning its index
    pub fn add_branch(&mut self, kind: impl Into<String>, line: u32, locations: Vec<Location>) -> u32 {
        let idx = next_index(&self.branch_map);
        self.b.insert(idx, vec![0; locations.len()]);
        self.branch_map.insert(
            idx,
            BranchMapping {
                line,
                kind: kind.into(),
                locations,
                ..BranchMapping::default()
            },
        );
        idx
    }

    /// Value copy of `s`, `f` and `b`
    #[must_use]
    pub fn counters(&self) -> CounterSnapshot {
        CounterSnapshot {
            s: self.s.clone(),
            f: self.f.clone(),
            b: self.b.clone(),
        }
    }

    /// Overwrite `s`, `f` and `b` with a copy of `snapshot`
    pub fn restore_counters(&mut self, snapshot: &CounterSnapshot) {
        self.s = snapshot.s.clone();
        self.f = snapshot.f.clone();
        self.b = snapshot.b.clone();
        self.l = None;
    }

    /// Add `other`'s hits to this record.
    ///
    /// Counts at the same index are summed, branch outcome lists element-wise.
    /// Sums saturate at `u64::MAX`.
    /// Indices only `other` knows about are adopted along with their locations.
    pub fn merge(&mut self, other: &Self) {
        for (idx, hits) in &other.s {
            let slot = self.s.entry(*idx).or_insert(0);
            *slot = slot.saturating_add(*hits);
        }
        for (idx, hits) in &other.f {
            let slot = self.f.entry(*idx).or_insert(0);
            *slot = slot.saturating_add(*hits);
        }
        for (idx, outcomes) in &other.b {
            let ours = self.b.entry(*idx).or_default();
            if ours.len() < outcomes.len() {
                ours.resize(outcomes.len(), 0);
            }
            for (slot, hits) in ours.iter_mut().zip(outcomes) {
                *slot = slot.saturating_add(*hits);
            }
        }
        for (idx, loc) in &other.statement_map {
            self.statement_map.entry(*idx).or_insert(*loc);
        }
        for (idx, mapping) in &other.fn_map {
            self.fn_map.entry(*idx).or_insert_with(|| mapping.clone());
        }
        for (idx, mapping) in &other.branch_map {
            self.branch_map.entry(*idx).or_insert_with(|| mapping.clone());
        }
        if self.path.is_empty() {
            self.path.clone_from(&other.path);
        }
        self.l = None;
    }

    /// Drop derived data so aggregation starts from raw counters
    pub fn remove_derived_info(&mut self) {
        self.l = None;
    }

    /// Compute the line table `l` if it is absent
    pub fn add_derived_info(&mut self) {
        if self.l.is_none() {
            self.l = Some(self.compute_line_hits());
        }
    }

    /// Line hits derived from statements: the highest statement count on each line
    #[must_use]
    pub fn compute_line_hits(&self) -> Counters {
        let mut lines = Counters::new();
        for (idx, hits) in &self.s {
            let Some(loc) = self.statement_map.get(idx) else {
                continue;
            };
            let hits = if *hits == 0 && loc.skip { 1 } else { *hits };
            let slot = lines.entry(loc.start.line).or_insert(hits);
            if *slot < hits {
                *slot = hits;
            }
        }
        lines
    }

    /// Source text carried in the record itself (`code` as a string or list of lines)
    #[must_use]
    pub fn embedded_source(&self) -> Option<String> {
        match self.extra.get("code")? {
            Value::String(code) => Some(code.clone()),
            Value::Array(lines) => Some(
                lines
                    .iter()
                    .map(|line| line.as_str().unwrap_or_default())
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            _ => None,
        }
    }
}

fn next_index<V>(map: &BTreeMap<u32, V>) -> u32 {
    map.keys().next_back().map_or(0, |last| last + 1)
}

/// Remove derived data from every file of `map`
pub fn remove_derived_info(map: &mut CoverageMap) {
    for file in map.values_mut() {
        file.remove_derived_info();
    }
}

/// Parse a JSON value into a coverage map.
///
/// Entries that are not objects are skipped; missing or `null` tables inside an
/// entry are treated as empty.
pub fn coverage_map_from_value(value: Value) -> crate::CoverageResult<CoverageMap> {
    let Value::Object(entries) = value else {
        return Err(crate::CoverageError::bad_request(
            "coverage must be a JSON object keyed by file path",
        ));
    };
    let mut map = CoverageMap::new();
    for (path, entry) in entries {
        if !entry.is_object() {
            tracing::warn!(path = %path, "ignoring coverage entry that is not an object");
            continue;
        }
        let mut file: FileCoverage = serde_json::from_value(entry)?;
        if file.path.is_empty() {
            file.path.clone_from(&path);
        }
        map.insert(path, file);
    }
    Ok(map)
}
