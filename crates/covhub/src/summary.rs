//! Coverage summaries: totals and percentages per metric.

use crate::model::FileCoverage;
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// Percentage with two decimals, truncated. An empty metric is fully covered.
#[must_use]
pub fn percent(covered: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    ((100_000 * covered) as f64 / total as f64 / 10.0).floor() / 100.0
}

/// Totals for one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    /// Items found
    pub total: u64,
    /// Items hit at least once
    pub covered: u64,
    /// Items excluded by ignore hints
    pub skipped: u64,
    /// `covered / total` in percent
    pub pct: f64,
}

impl Default for Totals {
    fn default() -> Self {
        Self::new(0, 0, 0)
    }
}

impl Totals {
    /// Totals with the percentage computed
    #[must_use]
    pub fn new(total: u64, covered: u64, skipped: u64) -> Self {
        Self {
            total,
            covered,
            skipped,
            pct: percent(covered, total),
        }
    }

    fn count(hits: impl Iterator<Item = (u64, bool)>) -> Self {
        let (mut total, mut covered, mut skipped) = (0, 0, 0);
        for (count, skip) in hits {
            total += 1;
            if count > 0 {
                covered += 1;
            } else if skip {
                skipped += 1;
            }
        }
        Self::new(total, covered, skipped)
    }
}

impl AddAssign for Totals {
    fn add_assign(&mut self, rhs: Self) {
        *self = Self::new(
            self.total + rhs.total,
            self.covered + rhs.covered,
            self.skipped + rhs.skipped,
        );
    }
}

/// Summary of lines, statements, functions and branches
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageSummary {
    /// Line coverage
    pub lines: Totals,
    /// Statement coverage
    pub statements: Totals,
    /// Function coverage
    pub functions: Totals,
    /// Branch coverage
    pub branches: Totals,
}

impl CoverageSummary {
    /// Summarize one file. Lines come from derived info, computed on the fly when absent.
    #[must_use]
    pub fn for_file(file: &FileCoverage) -> Self {
        let computed;
        let lines = match &file.l {
            Some(lines) => lines,
            None => {
                computed = file.compute_line_hits();
                &computed
            }
        };

        let statements = Totals::count(file.s.iter().map(|(idx, hits)| {
            let skip = file.statement_map.get(idx).is_some_and(|loc| loc.skip);
            (*hits, skip)
        }));
        let functions = Totals::count(file.f.iter().map(|(idx, hits)| {
            let skip = file.fn_map.get(idx).is_some_and(|f| f.skip);
            (*hits, skip)
        }));
        let branches = Totals::count(file.b.iter().flat_map(|(idx, outcomes)| {
            let mapping = file.branch_map.get(idx);
            outcomes.iter().enumerate().map(move |(arm, hits)| {
                let skip = mapping
                    .and_then(|m| m.locations.get(arm))
                    .is_some_and(|loc| loc.skip);
                (*hits, skip)
            })
        }));

        Self {
            lines: Totals::count(lines.values().map(|hits| (*hits, false))),
            statements,
            functions,
            branches,
        }
    }

    /// Combine summaries
    #[must_use]
    pub fn merged<'a>(summaries: impl IntoIterator<Item = &'a Self>) -> Self {
        let mut out = Self::default();
        for summary in summaries {
            out += *summary;
        }
        out
    }
}

impl AddAssign for CoverageSummary {
    fn add_assign(&mut self, rhs: Self) {
        self.lines += rhs.lines;
        self.statements += rhs.statements;
        self.functions += rhs.functions;
        self.branches += rhs.branches;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::model::Location;

    #[test]
    fn test_percent_truncates_to_two_decimals() {
        assert_eq!(percent(1, 3), 33.33);
        assert_eq!(percent(2, 3), 66.66);
        assert_eq!(percent(3, 3), 100.0);
    }

    #[test]
    fn test_percent_of_nothing_is_full() {
        assert_eq!(percent(0, 0), 100.0);
    }

    #[test]
    fn test_file_summary_counts_each_metric() {
        let mut file = FileCoverage::new("/a.js");
        let s0 = file.add_statement(Location::lines(1, 1));
        file.add_statement(Location::lines(2, 2));
        let f0 = file.add_function("main", Location::lines(1, 2));
        let b0 = file.add_branch("if", 2, vec![Location::lines(2, 2), Location::lines(3, 3)]);
        file.s.insert(s0, 3);
        file.f.insert(f0, 1);
        file.b.insert(b0, vec![1, 0]);

        let summary = CoverageSummary::for_file(&file);

        assert_eq!(summary.statements, Totals::new(2, 1, 0));
        assert_eq!(summary.lines, Totals::new(2, 1, 0));
        assert_eq!(summary.functions, Totals::new(1, 1, 0));
        assert_eq!(summary.branches, Totals::new(2, 1, 0));
        assert_eq!(summary.branches.pct, 50.0);
    }

    #[test]
    fn test_skipped_items_are_counted() {
        let mut file = FileCoverage::new("/a.js");
        file.add_statement(Location {
            skip: true,
            ..Location::lines(1, 1)
        });
        let summary = CoverageSummary::for_file(&file);
        assert_eq!(summary.statements.skipped, 1);
        assert_eq!(summary.statements.covered, 0);
    }

    #[test]
    fn test_merged_sums_and_recomputes_pct() {
        let a = CoverageSummary {
            statements: Totals::new(4, 1, 0),
            ..CoverageSummary::default()
        };
        let b = CoverageSummary {
            statements: Totals::new(4, 3, 0),
            ..CoverageSummary::default()
        };
        let merged = CoverageSummary::merged([&a, &b]);
        assert_eq!(merged.statements, Totals::new(8, 4, 0));
        assert_eq!(merged.statements.pct, 50.0);
        assert_eq!(merged.functions.pct, 100.0);
    }
}
