//! Live report rendering for the coverage handler.

use crate::context::CoverageContext;
use crate::model::CoverageMap;
use crate::report::{HtmlReport, UrlLinkMapper};
use crate::result::{CoverageError, CoverageResult};
use crate::tree::TreeSummary;

/// Body served when nothing has been recorded yet
pub const NO_COVERAGE_MESSAGE: &str = "No coverage information has been collected";

/// Outcome of rendering a report page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    /// The store is empty
    NoCoverage,
    /// An HTML page
    Page(String),
}

/// Render the page for `target` (default: the report root) from the live store.
///
/// Derived line info is stripped from the store first so the tree reflects raw
/// counters only. Links are rooted at `prefix`.
///
/// # Errors
///
/// Returns [`CoverageError::NotFound`] if `target` names no node of the tree
pub fn render(ctx: &CoverageContext, target: Option<&str>, prefix: &str) -> CoverageResult<Rendered> {
    let coverage = ctx.report_snapshot();
    render_map(&coverage, target, prefix)
}

/// Render the page for `target` from a coverage map
///
/// # Errors
///
/// Returns [`CoverageError::NotFound`] if `target` names no node of the tree
pub fn render_map(coverage: &CoverageMap, target: Option<&str>, prefix: &str) -> CoverageResult<Rendered> {
    if coverage.is_empty() {
        return Ok(Rendered::NoCoverage);
    }
    let tree = TreeSummary::build(coverage);
    let node = match target {
        None => tree.root(),
        Some(path) => tree
            .find(path)
            .ok_or_else(|| CoverageError::not_found(path))?,
    };
    let page = HtmlReport::new(&tree, coverage, UrlLinkMapper::new(prefix)).render(node);
    Ok(Rendered::Page(page))
}
