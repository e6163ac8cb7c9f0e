//! LCOV report formatter.
//!
//! ## LCOV Format
//!
//! ```text
//! TN:<test name>
//! SF:<source file>
//! FN:<line>,<function name>
//! FNDA:<execution count>,<function name>
//! FNF:<functions found>
//! FNH:<functions hit>
//! DA:<line>,<execution count>
//! LF:<lines found>
//! LH:<lines hit>
//! BRDA:<line>,<block>,<branch>,<taken>
//! BRF:<branches found>
//! BRH:<branches hit>
//! end_of_record
//! ```

use crate::model::{CoverageMap, FileCoverage};
use std::fmt::Write;

/// LCOV format report generator
#[derive(Debug)]
pub struct LcovReport<'a> {
    coverage: &'a CoverageMap,
    test_name: Option<String>,
}

impl<'a> LcovReport<'a> {
    /// Create a formatter over a coverage map
    #[must_use]
    pub const fn new(coverage: &'a CoverageMap) -> Self {
        Self {
            coverage,
            test_name: None,
        }
    }

    /// Set the test name written in `TN:` lines
    #[must_use]
    pub fn with_test_name(mut self, name: impl Into<String>) -> Self {
        self.test_name = Some(name.into());
        self
    }

    /// Generate the report
    #[must_use]
    pub fn generate(&self) -> String {
        let mut output = String::new();
        for file in self.coverage.values() {
            self.write_file(&mut output, file);
        }
        output
    }

    fn write_file(&self, output: &mut String, file: &FileCoverage) {
        let _ = writeln!(output, "TN:{}", self.test_name.as_deref().unwrap_or_default());
        let _ = writeln!(output, "SF:{}", file.path);

        let mut functions_hit = 0;
        for (idx, mapping) in &file.fn_map {
            let _ = writeln!(output, "FN:{},{}", mapping.line, mapping.name);
            let count = file.f.get(idx).copied().unwrap_or(0);
            let _ = writeln!(output, "FNDA:{count},{}", mapping.name);
            if count > 0 {
                functions_hit += 1;
            }
        }
        let _ = writeln!(output, "FNF:{}", file.fn_map.len());
        let _ = writeln!(output, "FNH:{functions_hit}");

        let lines = file.l.clone().unwrap_or_else(|| file.compute_line_hits());
        let mut lines_hit = 0;
        for (line, count) in &lines {
            let _ = writeln!(output, "DA:{line},{count}");
            if *count > 0 {
                lines_hit += 1;
            }
        }
        let _ = writeln!(output, "LF:{}", lines.len());
        let _ = writeln!(output, "LH:{lines_hit}");

        let (mut found, mut hit) = (0, 0);
        for (idx, outcomes) in &file.b {
            let line = file.branch_map.get(idx).map_or(0, |m| m.line);
            for (arm, count) in outcomes.iter().enumerate() {
                let _ = writeln!(output, "BRDA:{line},{idx},{arm},{count}");
                found += 1;
                if *count > 0 {
                    hit += 1;
                }
            }
        }
        let _ = writeln!(output, "BRF:{found}");
        let _ = writeln!(output, "BRH:{hit}");

        output.push_str("end_of_record\n");
    }
}
