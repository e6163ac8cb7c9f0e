//! Tree summary: the directory/file projection a report is navigated through.
//!
//! ```text
//! /app/                 root (common directory of every file)
//! ├── lib/              one node per directory holding files
//! │   ├── a.js
//! │   └── b.js
//! └── server/
//!     └── index.js
//! ```
//!
//! Directory nodes are keyed by their full path with a trailing `/`, file nodes
//! by the coverage map key. Nodes live in an arena and refer to each other by
//! [`NodeId`].

use crate::model::CoverageMap;
use crate::summary::CoverageSummary;
use std::collections::{BTreeMap, HashMap};

/// Index of a node in a [`TreeSummary`]
pub type NodeId = usize;

/// Node kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Directory
    Dir,
    /// Source file
    File,
}

/// A directory or file of the tree
#[derive(Debug, Clone)]
pub struct TreeNode {
    full_path: String,
    name: String,
    relative_name: String,
    kind: NodeKind,
    metrics: CoverageSummary,
    package_metrics: Option<CoverageSummary>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl TreeNode {
    fn new(full_path: String, kind: NodeKind, metrics: CoverageSummary) -> Self {
        Self {
            full_path,
            name: String::new(),
            relative_name: String::new(),
            kind,
            metrics,
            package_metrics: None,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Key of the node: coverage path for files, directory path plus `/` for directories
    #[must_use]
    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    /// Path relative to the tree root (empty for the root)
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path relative to the parent node
    #[must_use]
    pub fn relative_name(&self) -> &str {
        &self.relative_name
    }

    /// Directory or file
    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Whether this is a directory
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Dir
    }

    /// Coverage of the node (aggregated over descendants for directories)
    #[must_use]
    pub const fn metrics(&self) -> &CoverageSummary {
        &self.metrics
    }

    /// For directories, coverage over direct file children only
    #[must_use]
    pub const fn package_metrics(&self) -> Option<&CoverageSummary> {
        self.package_metrics.as_ref()
    }

    /// Parent node
    #[must_use]
    pub const fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child nodes, sorted by relative name
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Name shown in reports
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "All files"
        } else {
            &self.name
        }
    }
}

/// Hierarchical summary built from a coverage map
#[derive(Debug, Clone)]
pub struct TreeSummary {
    nodes: Vec<TreeNode>,
    root: NodeId,
    by_path: HashMap<String, NodeId>,
}

/// Directory node holding files that sit at the filesystem root
pub const FILESYSTEM_ROOT_NAME: &str = "__root__/";

fn dir_of(path: &str) -> &str {
    path.rfind('/').map_or("", |pos| &path[..pos])
}

fn common_dir_prefix<'a>(paths: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut prefix: Option<Vec<&str>> = None;
    for path in paths {
        let segments: Vec<&str> = dir_of(path).split('/').collect();
        prefix = Some(match prefix {
            None => segments,
            Some(current) => current
                .iter()
                .zip(&segments)
                .take_while(|(a, b)| a == b)
                .map(|(a, _)| *a)
                .collect(),
        });
    }
    prefix.unwrap_or_default()
}

impl TreeSummary {
    /// Summarize every file of `coverage` and arrange the results into a tree
    #[must_use]
    pub fn build(coverage: &CoverageMap) -> Self {
        let summaries = coverage
            .iter()
            .map(|(path, file)| (path.clone(), CoverageSummary::for_file(file)))
            .collect();
        Self::from_summaries(&summaries)
    }

    /// Arrange per-file summaries into a tree
    #[must_use]
    pub fn from_summaries(summaries: &BTreeMap<String, CoverageSummary>) -> Self {
        let mut prefix = common_dir_prefix(summaries.keys().map(String::as_str));
        let root_path = format!("{}/", prefix.join("/"));

        let mut tree = Self {
            nodes: vec![TreeNode::new(
                root_path.clone(),
                NodeKind::Dir,
                CoverageSummary::default(),
            )],
            root: 0,
            by_path: HashMap::new(),
        };
        let mut dirs: HashMap<String, NodeId> = HashMap::from([(root_path, 0)]);
        let mut files_under_root = false;

        for (path, metrics) in summaries {
            let file = tree.push(TreeNode::new(path.clone(), NodeKind::File, *metrics));
            let parent_path = format!("{}/", dir_of(path));
            let parent = match dirs.get(&parent_path) {
                Some(id) => *id,
                None => {
                    let id = tree.push(TreeNode::new(
                        parent_path.clone(),
                        NodeKind::Dir,
                        CoverageSummary::default(),
                    ));
                    tree.attach(tree.root, id);
                    dirs.insert(parent_path, id);
                    id
                }
            };
            tree.attach(parent, file);
            files_under_root |= parent == tree.root;
        }

        // Files directly under the common directory: start one level higher so
        // that directory shows up as a node of its own.
        if files_under_root && !prefix.is_empty() {
            prefix.pop();
            let old_root = tree.root;
            let new_root_path = format!("{}/", prefix.join("/"));
            // Popping the filesystem root leaves both nodes at `/`
            if tree.nodes[old_root].full_path == new_root_path {
                tree.nodes[old_root].full_path = FILESYSTEM_ROOT_NAME.to_string();
            }
            let new_root = tree.push(TreeNode::new(
                new_root_path,
                NodeKind::Dir,
                CoverageSummary::default(),
            ));
            let children = std::mem::take(&mut tree.nodes[old_root].children);
            tree.attach(new_root, old_root);
            for child in children {
                if tree.nodes[child].is_dir() {
                    tree.attach(new_root, child);
                } else {
                    tree.attach(old_root, child);
                }
            }
            tree.root = new_root;
        }

        let root_prefix = tree.nodes[tree.root].full_path.clone();
        tree.fix_names(tree.root, &root_prefix);
        tree.calculate_metrics(tree.root);
        tree.sort_children();
        tree.by_path = tree
            .nodes
            .iter()
            .enumerate()
            .map(|(id, node)| (node.full_path.clone(), id))
            .collect();
        tree
    }

    fn push(&mut self, node: TreeNode) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent].children.push(child);
        self.nodes[child].parent = Some(parent);
    }

    fn fix_names(&mut self, id: NodeId, root_prefix: &str) {
        let full = &self.nodes[id].full_path;
        let name = full
            .strip_prefix(root_prefix)
            .unwrap_or(full)
            .trim_start_matches('/')
            .to_string();
        let relative_name = match self.nodes[id].parent {
            Some(parent) => {
                let parent_name = &self.nodes[parent].name;
                name.strip_prefix(parent_name.as_str())
                    .unwrap_or(&name)
                    .to_string()
            }
            None => name.clone(),
        };
        let node = &mut self.nodes[id];
        node.name = name;
        node.relative_name = relative_name;
        for child in self.nodes[id].children.clone() {
            self.fix_names(child, root_prefix);
        }
    }

    fn calculate_metrics(&mut self, id: NodeId) {
        if !self.nodes[id].is_dir() {
            return;
        }
        let children = self.nodes[id].children.clone();
        for child in &children {
            self.calculate_metrics(*child);
        }
        let metrics = CoverageSummary::merged(children.iter().map(|c| &self.nodes[*c].metrics));
        let package = CoverageSummary::merged(
            children
                .iter()
                .map(|c| &self.nodes[*c])
                .filter(|n| !n.is_dir())
                .map(|n| &n.metrics),
        );
        let node = &mut self.nodes[id];
        node.metrics = metrics;
        node.package_metrics = Some(package);
    }

    fn sort_children(&mut self) {
        for id in 0..self.nodes.len() {
            let mut children = std::mem::take(&mut self.nodes[id].children);
            children.sort_by(|a, b| self.nodes[*a].relative_name.cmp(&self.nodes[*b].relative_name));
            self.nodes[id].children = children;
        }
    }

    /// Root node id
    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    /// Node by id
    #[must_use]
    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id]
    }

    /// Root node
    #[must_use]
    pub fn root_node(&self) -> &TreeNode {
        &self.nodes[self.root]
    }

    /// Resolve a full path to a node
    #[must_use]
    pub fn find(&self, full_path: &str) -> Option<NodeId> {
        self.by_path.get(full_path).copied()
    }

    /// Ancestors of `id`, nearest first
    #[must_use]
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.nodes[id].parent;
        while let Some(parent) = current {
            out.push(parent);
            current = self.nodes[parent].parent;
        }
        out
    }

    /// Number of edges between the root and `id`
    #[must_use]
    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).len()
    }

    /// Every node in pre-order, starting at the root
    #[must_use]
    pub fn walk(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.nodes[id].children.iter().rev());
        }
        out
    }
}
