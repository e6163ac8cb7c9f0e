//! HTML report pages.
//!
//! Directories render as index pages listing their children, files render as
//! detail pages with the annotated source. Where links point is decided by a
//! [`LinkMapper`]: the live handler links to its own `show?p=` routes, the
//! archived report links between static files.

use super::assets::ASSETS;
use super::ReportSink;
use crate::model::{CoverageMap, FileCoverage};
use crate::result::CoverageResult;
use crate::summary::Totals;
use crate::tree::{NodeId, TreeSummary};
use std::fmt::Write;

/// Percentages at which coverage turns from low to medium to high
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Watermarks {
    /// Below this a metric is `low`
    pub low: f64,
    /// At or above this a metric is `high`
    pub high: f64,
}

impl Default for Watermarks {
    fn default() -> Self {
        Self {
            low: 50.0,
            high: 80.0,
        }
    }
}

impl Watermarks {
    /// CSS class for a percentage
    #[must_use]
    pub fn classify(&self, pct: f64) -> &'static str {
        if pct >= self.high {
            "high"
        } else if pct >= self.low {
            "medium"
        } else {
            "low"
        }
    }
}

/// Decides the link targets of report pages
pub trait LinkMapper {
    /// Link from the page of `from` to the page of `to`
    fn node_link(&self, tree: &TreeSummary, from: NodeId, to: NodeId) -> String;

    /// Link from the page of `from` to the asset `name`
    fn asset_link(&self, tree: &TreeSummary, from: NodeId, name: &str) -> String;
}

/// Links into the coverage handler mounted at a URL prefix
#[derive(Debug, Clone)]
pub struct UrlLinkMapper {
    prefix: String,
}

impl UrlLinkMapper {
    /// Mapper for a handler mounted at `prefix`; a trailing `/` is added if missing
    #[must_use]
    pub fn new(prefix: &str) -> Self {
        let mut prefix = prefix.to_string();
        if !prefix.ends_with('/') {
            prefix.push('/');
        }
        Self { prefix }
    }

    /// The normalized prefix
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl LinkMapper for UrlLinkMapper {
    fn node_link(&self, tree: &TreeSummary, _from: NodeId, to: NodeId) -> String {
        format!(
            "{}show?p={}",
            self.prefix,
            encode_query(tree.node(to).full_path())
        )
    }

    fn asset_link(&self, _tree: &TreeSummary, _from: NodeId, name: &str) -> String {
        format!("{}asset/{name}", self.prefix)
    }
}

/// Links between the static pages of a report written to disk or an archive
#[derive(Debug, Clone, Copy, Default)]
pub struct FileLinkMapper;

impl FileLinkMapper {
    /// Page of a node relative to the report root: `<dir>/index.html` or `<dir>/<file>.html`
    #[must_use]
    pub fn page_path(tree: &TreeSummary, id: NodeId) -> String {
        let node = tree.node(id);
        if node.is_dir() {
            format!("{}index.html", node.name())
        } else {
            format!("{}.html", node.name())
        }
    }

    fn to_root(tree: &TreeSummary, from: NodeId) -> String {
        "../".repeat(Self::page_path(tree, from).matches('/').count())
    }
}

impl LinkMapper for FileLinkMapper {
    fn node_link(&self, tree: &TreeSummary, from: NodeId, to: NodeId) -> String {
        format!("{}{}", Self::to_root(tree, from), Self::page_path(tree, to))
    }

    fn asset_link(&self, tree: &TreeSummary, from: NodeId, name: &str) -> String {
        format!("{}{name}", Self::to_root(tree, from))
    }
}

fn encode_query(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' | b':' => {
                out.push(char::from(byte));
            }
            _ => {
                let _ = write!(out, "%{byte:02X}");
            }
        }
    }
    out
}

/// Escape text for HTML element and attribute content
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// HTML renderer over a tree summary
#[derive(Debug)]
pub struct HtmlReport<'a, L> {
    tree: &'a TreeSummary,
    coverage: &'a CoverageMap,
    links: L,
    watermarks: Watermarks,
    generated: String,
}

impl<'a, L: LinkMapper> HtmlReport<'a, L> {
    /// Create a renderer. `coverage` supplies the per-file records behind the tree.
    #[must_use]
    pub fn new(tree: &'a TreeSummary, coverage: &'a CoverageMap, links: L) -> Self {
        Self {
            tree,
            coverage,
            links,
            watermarks: Watermarks::default(),
            generated: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        }
    }

    /// Override the default 50/80 watermarks
    #[must_use]
    pub const fn with_watermarks(mut self, watermarks: Watermarks) -> Self {
        self.watermarks = watermarks;
        self
    }

    /// Render the page of a node: index for directories, detail for files
    #[must_use]
    pub fn render(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.header(&mut out, id);
        if self.tree.node(id).is_dir() {
            self.index_body(&mut out, id);
        } else {
            self.detail_body(&mut out, id);
        }
        self.footer(&mut out, id);
        out
    }

    fn header(&self, out: &mut String, id: NodeId) {
        let node = self.tree.node(id);
        let metrics = node.metrics();
        let _ = write!(
            out,
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Code coverage report for {title}</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <link rel="stylesheet" href="{base}">
    <link rel="stylesheet" href="{prettify}">
</head>
<body>
<div class="wrapper">
<div class="pad1">
    <h1>"#,
            title = escape_html(node.display_name()),
            base = self.links.asset_link(self.tree, id, "base.css"),
            prettify = self.links.asset_link(self.tree, id, "prettify.css"),
        );

        for ancestor in self.tree.ancestors(id).into_iter().rev() {
            let _ = write!(
                out,
                r#"<a href="{}">{}</a> / "#,
                escape_html(&self.links.node_link(self.tree, id, ancestor)),
                escape_html(self.tree.node(ancestor).display_name()),
            );
        }
        let current = if node.parent().is_some() {
            node.relative_name()
        } else {
            node.display_name()
        };
        let _ = writeln!(out, "{}</h1>", escape_html(current));

        out.push_str("    <div class=\"clearfix\">\n");
        for (label, totals) in [
            ("Statements", &metrics.statements),
            ("Branches", &metrics.branches),
            ("Functions", &metrics.functions),
            ("Lines", &metrics.lines),
        ] {
            let _ = writeln!(
                out,
                r#"        <div class="fl pad1y space-top1"><span class="strong">{}% </span><span class="quiet">{label}</span> <span class="fraction">{}/{}</span></div>"#,
                totals.pct, totals.covered, totals.total,
            );
        }
        out.push_str("    </div>\n</div>\n");
        let _ = writeln!(
            out,
            r#"<div class="status-line {}"></div>"#,
            self.watermarks.classify(metrics.statements.pct)
        );
    }

    fn footer(&self, out: &mut String, id: NodeId) {
        let _ = write!(
            out,
            r#"<div class="push"></div>
</div>
<div class="footer quiet pad1 small">Code coverage generated by covhub at {generated}</div>
<script src="{prettify}"></script>
<script src="{sorter}"></script>
<script>window.onload = function () {{ if (typeof prettyPrint === 'function') {{ prettyPrint(); }} }};</script>
</body>
</html>
"#,
            generated = self.generated,
            prettify = self.links.asset_link(self.tree, id, "prettify.js"),
            sorter = self.links.asset_link(self.tree, id, "sorter.js"),
        );
    }

    fn metric_cells(&self, out: &mut String, totals: &Totals) {
        let class = self.watermarks.classify(totals.pct);
        let _ = write!(
            out,
            r#"<td class="pct {class}" data-value="{pct}">{pct}%</td><td class="abs {class}" data-value="{total}">{covered}/{total}</td>"#,
            pct = totals.pct,
            covered = totals.covered,
            total = totals.total,
        );
    }

    fn index_body(&self, out: &mut String, id: NodeId) {
        out.push_str(
            r#"<div class="pad1">
<table class="coverage-summary">
<thead>
<tr><th data-col="file">File</th><th data-col="pic"></th><th data-col="statements">Statements</th><th></th><th data-col="branches">Branches</th><th></th><th data-col="functions">Functions</th><th></th><th data-col="lines">Lines</th><th></th></tr>
</thead>
<tbody>
"#,
        );
        for child in self.tree.node(id).children() {
            let node = self.tree.node(*child);
            let metrics = node.metrics();
            let class = self.watermarks.classify(metrics.statements.pct);
            let name = escape_html(node.relative_name());
            let _ = write!(
                out,
                r#"<tr><td class="file {class}" data-value="{name}"><a href="{href}">{name}</a></td><td class="pic {class}" data-value="{pct}"><div class="bar"><div class="fill" style="width: {pct}%"></div></div></td>"#,
                href = escape_html(&self.links.node_link(self.tree, id, *child)),
                pct = metrics.statements.pct,
            );
            for totals in [
                &metrics.statements,
                &metrics.branches,
                &metrics.functions,
                &metrics.lines,
            ] {
                self.metric_cells(out, totals);
            }
            out.push_str("</tr>\n");
        }
        out.push_str("</tbody>\n</table>\n</div>\n");
    }

    fn detail_body(&self, out: &mut String, id: NodeId) {
        let path = self.tree.node(id).full_path();
        let mut file = self
            .coverage
            .get(path)
            .cloned()
            .unwrap_or_else(|| FileCoverage::new(path));
        file.add_derived_info();
        let lines = file.l.clone().unwrap_or_default();

        out.push_str("<div class=\"pad1\">\n");
        let Some(source) = load_source(&file) else {
            let _ = writeln!(
                out,
                r#"<p class="missing-source">Source for {} is not available</p>"#,
                escape_html(path)
            );
            out.push_str("</div>\n");
            return;
        };

        out.push_str("<table class=\"coverage\">\n");
        for (n, text) in source.lines().enumerate() {
            let line = u32::try_from(n + 1).unwrap_or(u32::MAX);
            let (class, count) = match lines.get(&line) {
                Some(hits) if *hits > 0 => ("cline-yes", format!("{hits}x")),
                Some(_) => ("cline-no", "&nbsp;".to_string()),
                None => ("cline-neutral", "&nbsp;".to_string()),
            };
            let _ = writeln!(
                out,
                r#"<tr class="{class}"><td class="line-count">{line}</td><td class="line-coverage">{count}</td><td class="text"><pre class="prettyprint lang-js"><code>{}</code></pre></td></tr>"#,
                escape_html(text),
            );
        }
        out.push_str("</table>\n</div>\n");
    }
}

/// Source text of a file: read from disk, else carried in the record
fn load_source(file: &FileCoverage) -> Option<String> {
    match std::fs::read_to_string(&file.path) {
        Ok(source) => Some(source),
        Err(e) => {
            tracing::debug!(path = %file.path, error = %e, "source not readable");
            file.embedded_source()
        }
    }
}

fn join_entry(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{name}", dir.trim_end_matches('/'))
    }
}

/// Write every page of `tree` plus the assets under `dir` of `sink`
pub fn write_html_report(
    sink: &mut dyn ReportSink,
    tree: &TreeSummary,
    coverage: &CoverageMap,
    dir: &str,
) -> CoverageResult<()> {
    let report = HtmlReport::new(tree, coverage, FileLinkMapper);
    for id in tree.walk() {
        let page = report.render(id);
        sink.write_entry(
            &join_entry(dir, &FileLinkMapper::page_path(tree, id)),
            page.as_bytes(),
        )?;
    }
    for (name, content) in ASSETS {
        sink.write_entry(&join_entry(dir, name), content.as_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::model::Location;
    use serde_json::Value;

    fn coverage() -> CoverageMap {
        let mut map = CoverageMap::new();
        for (path, hits) in [("/app/lib/a.js", 2), ("/app/lib/b.js", 0), ("/app/server/index.js", 1)] {
            let mut file = FileCoverage::new(path);
            let idx = file.add_statement(Location::lines(1, 1));
            file.add_statement(Location::lines(2, 2));
            file.s.insert(idx, hits);
            file.extra.insert(
                "code".into(),
                Value::String("var a = 1;\nvar b = a < 2;\n".into()),
            );
            map.insert(path.into(), file);
        }
        map
    }

    #[derive(Default)]
    struct MemorySink {
        entries: Vec<(String, Vec<u8>)>,
    }

    impl ReportSink for MemorySink {
        fn write_entry(&mut self, path: &str, content: &[u8]) -> CoverageResult<()> {
            self.entries.push((path.to_string(), content.to_vec()));
            Ok(())
        }
    }

    #[test]
    fn test_watermark_classes() {
        let marks = Watermarks::default();
        assert_eq!(marks.classify(100.0), "high");
        assert_eq!(marks.classify(80.0), "high");
        assert_eq!(marks.classify(50.0), "medium");
        assert_eq!(marks.classify(49.99), "low");
    }

    #[test]
    fn test_url_links_use_show_route() {
        let coverage = coverage();
        let tree = TreeSummary::build(&coverage);
        let links = UrlLinkMapper::new("/coverage");
        assert_eq!(links.prefix(), "/coverage/");

        let a = tree.find("/app/lib/a.js").unwrap();
        assert_eq!(
            links.node_link(&tree, tree.root(), a),
            "/coverage/show?p=/app/lib/a.js"
        );
        assert_eq!(
            links.asset_link(&tree, a, "base.css"),
            "/coverage/asset/base.css"
        );
    }

    #[test]
    fn test_query_encoding_keeps_paths_readable() {
        assert_eq!(encode_query("/app/a b&c.js"), "/app/a%20b%26c.js");
    }

    #[test]
    fn test_file_links_are_relative() {
        let coverage = coverage();
        let tree = TreeSummary::build(&coverage);
        let lib = tree.find("/app/lib/").unwrap();
        let a = tree.find("/app/lib/a.js").unwrap();

        assert_eq!(FileLinkMapper::page_path(&tree, tree.root()), "index.html");
        assert_eq!(FileLinkMapper::page_path(&tree, lib), "lib/index.html");
        assert_eq!(FileLinkMapper::page_path(&tree, a), "lib/a.js.html");
        assert_eq!(FileLinkMapper.node_link(&tree, a, tree.root()), "../index.html");
        assert_eq!(FileLinkMapper.node_link(&tree, tree.root(), a), "lib/a.js.html");
        assert_eq!(FileLinkMapper.asset_link(&tree, lib, "base.css"), "../base.css");
    }

    #[test]
    fn test_index_page_lists_children() {
        let coverage = coverage();
        let tree = TreeSummary::build(&coverage);
        let html = HtmlReport::new(&tree, &coverage, UrlLinkMapper::new("/")).render(tree.root());

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("Code coverage report for All files"));
        assert!(html.contains(r#"<a href="/show?p=/app/lib/">lib/</a>"#));
        assert!(html.contains(r#"<a href="/show?p=/app/server/">server/</a>"#));
        assert!(html.contains("/asset/base.css"));
    }

    #[test]
    fn test_detail_page_annotates_source() {
        let coverage = coverage();
        let tree = TreeSummary::build(&coverage);
        let a = tree.find("/app/lib/a.js").unwrap();
        let html = HtmlReport::new(&tree, &coverage, UrlLinkMapper::new("/")).render(a);

        assert!(html.contains(r#"<tr class="cline-yes"><td class="line-count">1</td><td class="line-coverage">2x</td>"#));
        assert!(html.contains(r#"<tr class="cline-no"><td class="line-count">2</td>"#));
        assert!(html.contains("var b = a &lt; 2;"));
        // breadcrumb back to the root and the directory
        assert!(html.contains(r#"<a href="/show?p=/app/">All files</a> / <a href="/show?p=/app/lib/">lib/</a> / a.js</h1>"#));
    }

    #[test]
    fn test_missing_source_shows_placeholder() {
        let mut coverage = coverage();
        for file in coverage.values_mut() {
            file.extra.clear();
        }
        let tree = TreeSummary::build(&coverage);
        let a = tree.find("/app/lib/a.js").unwrap();
        let html = HtmlReport::new(&tree, &coverage, FileLinkMapper).render(a);
        assert!(html.contains("Source for /app/lib/a.js is not available"));
    }

    #[test]
    fn test_write_html_report_emits_pages_and_assets() {
        let coverage = coverage();
        let tree = TreeSummary::build(&coverage);
        let mut sink = MemorySink::default();
        write_html_report(&mut sink, &tree, &coverage, "lcov-report").unwrap();

        let names: Vec<&str> = sink.entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "lcov-report/index.html",
                "lcov-report/lib/index.html",
                "lcov-report/lib/a.js.html",
                "lcov-report/lib/b.js.html",
                "lcov-report/server/index.html",
                "lcov-report/server/index.js.html",
                "lcov-report/base.css",
                "lcov-report/prettify.css",
                "lcov-report/prettify.js",
                "lcov-report/sorter.js",
            ]
        );
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }
}
