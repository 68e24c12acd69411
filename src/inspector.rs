// src/inspector.rs

//! Tools for inspecting the structure of saved documents.
//! Useful when a load reports diagnostics and you want to see what was stored.

use crate::document::{DocNode, Document, ITEM_LABEL};
use crate::error::Result;
use serde::Serialize;

const TEXT_PREVIEW: usize = 32;

/// A structural report of a saved document.
#[derive(Debug, Serialize)]
pub struct DocumentReport {
    /// Size of the encoded document, when inspected from bytes.
    pub byte_size: Option<usize>,
    /// Total number of nodes, root included.
    pub node_count: usize,
    /// Height of the tree.
    pub depth: usize,
    /// Number of nodes marked null.
    pub null_nodes: usize,
    /// The hierarchical tree of nodes.
    pub tree: NodeInfo,
}

/// Summary of a single node.
#[derive(Debug, Serialize)]
pub struct NodeInfo {
    /// Node label.
    pub label: String,
    /// Inferred shape: "Leaf", "Null", "Sequence", "Mapping" or "Object".
    pub shape_hint: String,
    /// Start of the scalar text, if any.
    pub text_preview: Option<String>,
    /// Number of children.
    pub child_count: usize,
    /// Extra info about the shape (e.g., "3 keys / 2 values").
    pub detail: Option<String>,
    /// Child nodes.
    pub children: Vec<NodeInfo>,
}

/// The Scribe Inspector tool.
#[derive(Debug)]
pub struct DocumentInspector;

impl DocumentInspector {
    /// Parses `bytes` and returns a structural report.
    ///
    /// Parsing does not open a session, so this works while a save or load is running.
    pub fn inspect(bytes: &[u8]) -> Result<DocumentReport> {
        let document = Document::from_bytes(bytes)?;
        let mut report = Self::inspect_document(&document);
        report.byte_size = Some(bytes.len());
        Ok(report)
    }

    /// Reports on an in-memory document.
    pub fn inspect_document(document: &Document) -> DocumentReport {
        let root = document.root();
        DocumentReport {
            byte_size: None,
            node_count: root.node_count(),
            depth: root.depth(),
            null_nodes: count_null(root),
            tree: Self::inspect_node(root),
        }
    }

    fn inspect_node(node: &DocNode) -> NodeInfo {
        let (hint, detail) = Self::analyze_shape(node);
        NodeInfo {
            label: node.label().to_owned(),
            shape_hint: hint.to_owned(),
            text_preview: node.text().map(preview),
            child_count: node.children().len(),
            detail,
            children: node.children().iter().map(Self::inspect_node).collect(),
        }
    }

    fn analyze_shape(node: &DocNode) -> (&'static str, Option<String>) {
        if node.is_null() {
            return ("Null", None);
        }
        let children = node.children();
        if children.is_empty() {
            return ("Leaf", None);
        }

        // CHECK 1: keyed collection
        if let (Some(keys), Some(values)) = (node.child("keys"), node.child("values")) {
            if children.len() == 2 {
                let (k, v) = (keys.children().len(), values.children().len());
                let detail = if k == v {
                    format!("{k} entries")
                } else {
                    format!("{k} keys / {v} values (mismatch)")
                };
                return ("Mapping", Some(detail));
            }
        }

        // CHECK 2: sequence
        if children.iter().all(|c| c.label() == ITEM_LABEL) {
            let nulls = children.iter().filter(|c| c.is_null()).count();
            let detail = if nulls > 0 {
                format!("{} items, {nulls} null", children.len())
            } else {
                format!("{} items", children.len())
            };
            return ("Sequence", Some(detail));
        }

        ("Object", None)
    }
}

fn count_null(node: &DocNode) -> usize {
    usize::from(node.is_null()) + node.children().iter().map(count_null).sum::<usize>()
}

fn preview(text: &str) -> String {
    if text.chars().count() <= TEXT_PREVIEW {
        return text.to_owned();
    }
    let mut cut: String = text.chars().take(TEXT_PREVIEW).collect();
    cut.push('…');
    cut
}

impl std::fmt::Display for DocumentReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== SCRIBE INSPECTOR REPORT ===")?;
        if let Some(size) = self.byte_size {
            writeln!(f, "Size:           {size}b")?;
        }
        writeln!(f, "Nodes:          {}", self.node_count)?;
        writeln!(f, "Depth:          {}", self.depth)?;
        writeln!(f, "Null nodes:     {}", self.null_nodes)?;
        writeln!(f, "\n[TREE]")?;
        self.tree.fmt_recursive(f, "", true)
    }
}

impl NodeInfo {
    fn fmt_recursive(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        prefix: &str,
        is_last: bool,
    ) -> std::fmt::Result {
        let connector = if is_last { "└── " } else { "├── " };
        let child_prefix = if is_last { "    " } else { "│   " };
        let text = self
            .text_preview
            .as_deref()
            .map(|t| format!(" = {t:?}"))
            .unwrap_or_default();
        let detail = self
            .detail
            .as_deref()
            .map(|d| format!(" [{d}]"))
            .unwrap_or_default();

        writeln!(
            f,
            "{}{}{} ({}){}{}",
            prefix, connector, self.label, self.shape_hint, text, detail
        )?;

        for (i, child) in self.children.iter().enumerate() {
            let is_last_child = i + 1 == self.children.len();
            child.fmt_recursive(f, &format!("{prefix}{child_prefix}"), is_last_child)?;
        }
        Ok(())
    }
}
