//! The Document Model: an ordered, labeled tree with scalar leaves.
//!
//! This is the portable intermediate representation between live objects and
//! bytes. Sibling order is significant (it is reused as sequence order) and a
//! lookup by label returns the *first* matching child.
//!
//! # Text Form
//!
//! Documents are encoded as indented, declaration-free XML:
//!
//! ```text
//! <root>
//!   <colony>
//!     <name>Outpost</name>
//!     <pawns>
//!       <li>
//!         <id>pawn_1</id>
//!       </li>
//!       <li IsNull="True"/>
//!     </pawns>
//!   </colony>
//! </root>
//! ```
//!
//! A node carrying `IsNull="True"` stands for a slot that held no value.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader as XmlReader, Writer as XmlWriter};

use crate::error::{Result, ScribeError};

/// Attribute marking a null slot.
pub const NULL_ATTRIBUTE: &str = "IsNull";

/// Label used for every entry of a sequence.
pub const ITEM_LABEL: &str = "li";

/// Deepest node nesting `Document::from_bytes` accepts, root included.
pub const MAX_NESTING: usize = 512;

/// Options controlling how a document is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    /// Label of the implicit root node created by `Writer::begin`.
    pub root_label: String,
    /// Character used for indentation.
    pub indent_char: u8,
    /// Number of indent characters per nesting level.
    pub indent_size: usize,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            root_label: "root".to_owned(),
            indent_char: b' ',
            indent_size: 2,
        }
    }
}

impl WriteOptions {
    /// Sets the root label.
    pub fn root_label(mut self, label: impl Into<String>) -> Self {
        self.root_label = label.into();
        self
    }

    /// Sets the indentation.
    pub fn indent(mut self, indent_char: u8, indent_size: usize) -> Self {
        self.indent_char = indent_char;
        self.indent_size = indent_size;
        self
    }
}

/// A single node of the document tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocNode {
    label: String,
    text: Option<String>,
    is_null: bool,
    children: Vec<DocNode>,
}

impl DocNode {
    /// Creates an empty node.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    /// Creates a leaf holding scalar text.
    pub fn leaf(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Creates a node marked as null.
    pub fn null(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            is_null: true,
            ..Self::default()
        }
    }

    /// Appends a child and returns `self`, for building trees inline.
    pub fn with_child(mut self, child: DocNode) -> Self {
        self.children.push(child);
        self
    }

    /// The node label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The scalar content, if any.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Replaces the scalar content.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = Some(text.into());
    }

    /// Returns true if the node stands for a null slot.
    pub fn is_null(&self) -> bool {
        self.is_null
    }

    /// Marks the node as a null slot.
    pub fn mark_null(&mut self) {
        self.is_null = true;
    }

    /// Ordered children.
    pub fn children(&self) -> &[DocNode] {
        &self.children
    }

    /// Mutable access to the ordered children.
    pub fn children_mut(&mut self) -> &mut Vec<DocNode> {
        &mut self.children
    }

    /// Appends a child.
    pub fn push(&mut self, child: DocNode) {
        self.children.push(child);
    }

    /// The first child named `label`.
    pub fn child(&self, label: &str) -> Option<&DocNode> {
        self.children.iter().find(|c| c.label == label)
    }

    /// The first child named `label`, mutably.
    pub fn child_mut(&mut self, label: &str) -> Option<&mut DocNode> {
        self.children.iter_mut().find(|c| c.label == label)
    }

    /// Total number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(DocNode::node_count).sum::<usize>()
    }

    /// Height of this subtree. A leaf has depth 1.
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(DocNode::depth).max().unwrap_or(0)
    }
}

/// An owned document: a single root node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    root: DocNode,
}

impl Document {
    /// Wraps a root node.
    pub fn new(root: DocNode) -> Self {
        Self { root }
    }

    /// The root node.
    pub fn root(&self) -> &DocNode {
        &self.root
    }

    /// The root node, mutably. Mostly useful to tests that corrupt documents.
    pub fn root_mut(&mut self) -> &mut DocNode {
        &mut self.root
    }

    /// Consumes the document, returning the root node.
    pub fn into_root(self) -> DocNode {
        self.root
    }

    /// Encodes the document with the default options.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.to_bytes_with(&WriteOptions::default())
    }

    /// Encodes the document as indented, declaration-free text.
    pub fn to_bytes_with(&self, options: &WriteOptions) -> Result<Vec<u8>> {
        let mut writer =
            XmlWriter::new_with_indent(Vec::new(), options.indent_char, options.indent_size);
        write_node(&mut writer, &self.root)?;
        Ok(writer.into_inner())
    }

    /// Parses bytes into a document.
    ///
    /// Any structural problem is reported as [`ScribeError::Format`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = XmlReader::from_reader(bytes);
        let mut buf = Vec::new();
        let mut stack: Vec<OpenNode> = Vec::new();
        let mut root: Option<DocNode> = None;

        loop {
            let event = reader.read_event_into(&mut buf).map_err(|e| {
                ScribeError::Format(format!(
                    "malformed document at byte {}: {e}",
                    reader.buffer_position()
                ))
            })?;

            match event {
                Event::Start(start) => {
                    check_nesting(stack.len() + 1)?;
                    if let Some(parent) = stack.last_mut() {
                        parent.reject_text()?;
                    } else if root.is_some() {
                        return Err(ScribeError::Format("document has more than one root".into()));
                    }
                    stack.push(OpenNode::new(open_node(&start)?));
                }
                Event::Empty(start) => {
                    check_nesting(stack.len() + 1)?;
                    let node = open_node(&start)?;
                    attach(&mut stack, &mut root, node)?;
                }
                Event::End(_) => {
                    let open = stack.pop().ok_or_else(|| {
                        ScribeError::Format("closing tag without an opening tag".into())
                    })?;
                    let node = open.close()?;
                    attach(&mut stack, &mut root, node)?;
                }
                Event::Text(text) => {
                    let text = text
                        .unescape()
                        .map_err(|e| ScribeError::Format(format!("bad text content: {e}")))?;
                    push_text(&mut stack, &text)?;
                }
                Event::CData(data) => {
                    let data = std::str::from_utf8(&data)
                        .map_err(|e| ScribeError::Format(format!("bad CDATA content: {e}")))?;
                    push_text(&mut stack, data)?;
                }
                Event::Eof => break,
                // Declarations, comments and processing instructions carry no data.
                _ => {}
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(ScribeError::Format(format!(
                "document ended with {} unclosed node(s)",
                stack.len()
            )));
        }
        root.map(Document::new)
            .ok_or_else(|| ScribeError::Format("document has no root node".into()))
    }
}

fn check_nesting(depth: usize) -> Result<()> {
    if depth > MAX_NESTING {
        return Err(ScribeError::Format(format!(
            "document nests deeper than {MAX_NESTING} nodes"
        )));
    }
    Ok(())
}

/// A node whose closing tag has not been read yet.
struct OpenNode {
    node: DocNode,
    pending_text: String,
}

impl OpenNode {
    fn new(node: DocNode) -> Self {
        Self {
            node,
            pending_text: String::new(),
        }
    }

    /// Indentation between child nodes is dropped; anything else is mixed content.
    fn reject_text(&mut self) -> Result<()> {
        if !self.pending_text.trim().is_empty() {
            return Err(ScribeError::Format(format!(
                "node <{}> mixes text and child nodes",
                self.node.label
            )));
        }
        self.pending_text.clear();
        Ok(())
    }

    fn close(mut self) -> Result<DocNode> {
        if self.node.children.is_empty() {
            if !self.pending_text.is_empty() {
                self.node.text = Some(self.pending_text);
            }
        } else {
            self.reject_text()?;
        }
        Ok(self.node)
    }
}

fn open_node(start: &BytesStart<'_>) -> Result<DocNode> {
    let label = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| ScribeError::Format(format!("label is not UTF-8: {e}")))?
        .to_owned();
    let mut node = DocNode::new(label);

    for attr in start.attributes() {
        let attr = attr.map_err(|e| ScribeError::Format(format!("bad attribute: {e}")))?;
        if attr.key.as_ref() == NULL_ATTRIBUTE.as_bytes() {
            let value = attr
                .unescape_value()
                .map_err(|e| ScribeError::Format(format!("bad attribute value: {e}")))?;
            node.is_null = value.eq_ignore_ascii_case("true");
        }
    }
    Ok(node)
}

fn attach(stack: &mut [OpenNode], root: &mut Option<DocNode>, node: DocNode) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.reject_text()?;
            parent.node.children.push(node);
        }
        None if root.is_some() => {
            return Err(ScribeError::Format("document has more than one root".into()));
        }
        None => *root = Some(node),
    }
    Ok(())
}

fn push_text(stack: &mut [OpenNode], text: &str) -> Result<()> {
    match stack.last_mut() {
        Some(open) => open.pending_text.push_str(text),
        None if text.trim().is_empty() => {}
        None => return Err(ScribeError::Format("text outside of the root node".into())),
    }
    Ok(())
}

fn write_node<W: std::io::Write>(writer: &mut XmlWriter<W>, node: &DocNode) -> Result<()> {
    let mut start = BytesStart::new(node.label.as_str());
    if node.is_null {
        start.push_attribute((NULL_ATTRIBUTE, "True"));
    }

    if node.children.is_empty() {
        return match node.text.as_deref() {
            Some(text) if !text.is_empty() => {
                emit(writer, Event::Start(start))?;
                emit(writer, Event::Text(BytesText::new(text)))?;
                emit(writer, Event::End(BytesEnd::new(node.label.as_str())))
            }
            _ => emit(writer, Event::Empty(start)),
        };
    }

    emit(writer, Event::Start(start))?;
    for child in &node.children {
        write_node(writer, child)?;
    }
    emit(writer, Event::End(BytesEnd::new(node.label.as_str())))
}

fn emit<W: std::io::Write>(writer: &mut XmlWriter<W>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| ScribeError::Serialization(e.to_string()))
}

/// Returns true if `label` can be written as a node name.
pub(crate) fn is_valid_label(label: &str) -> bool {
    let mut chars = label.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn sample() -> Document {
        Document::new(
            DocNode::new("root").with_child(
                DocNode::new("colony")
                    .with_child(DocNode::leaf("name", "Out <post> & co"))
                    .with_child(DocNode::leaf("motto", "  spaced  "))
                    .with_child(
                        DocNode::new("pawns")
                            .with_child(DocNode::new("li").with_child(DocNode::leaf("id", "p1")))
                            .with_child(DocNode::null("li")),
                    )
                    .with_child(DocNode::new("empty")),
            ),
        )
    }

    #[test]
    fn text_form_is_indented_and_declaration_free() {
        let bytes = sample().to_bytes().unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.starts_with("<root>"));
        assert!(!text.contains("<?xml"));
        assert!(text.contains("\n  <colony>"));
        assert!(text.contains("<li IsNull=\"True\"/>"));
    }

    #[test]
    fn parse_preserves_order_text_and_null_markers() {
        let doc = sample();
        let parsed = Document::from_bytes(&doc.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed, doc);

        let colony = parsed.root().child("colony").unwrap();
        assert_eq!(colony.child("name").unwrap().text(), Some("Out <post> & co"));
        assert_eq!(colony.child("motto").unwrap().text(), Some("  spaced  "));
        let pawns = colony.child("pawns").unwrap();
        assert!(!pawns.children()[0].is_null());
        assert!(pawns.children()[1].is_null());
        assert_eq!(colony.child("empty").unwrap().children().len(), 0);
    }

    #[test]
    fn child_lookup_returns_first_match() {
        let node = DocNode::new("p")
            .with_child(DocNode::leaf("x", "first"))
            .with_child(DocNode::leaf("x", "second"));
        assert_eq!(node.child("x").unwrap().text(), Some("first"));
        assert_eq!(node.node_count(), 3);
        assert_eq!(node.depth(), 2);
    }

    #[test]
    fn nesting_is_bounded() {
        let nested = |depth: usize| format!("{}{}", "<a>".repeat(depth), "</a>".repeat(depth));

        let at_limit = Document::from_bytes(nested(MAX_NESTING).as_bytes()).unwrap();
        assert_eq!(at_limit.root().depth(), MAX_NESTING);

        for depth in [MAX_NESTING + 1, 200_000] {
            match Document::from_bytes(nested(depth).as_bytes()) {
                Err(ScribeError::Format(msg)) => assert!(msg.contains("deeper")),
                other => panic!("expected format error, got {other:?}"),
            }
        }
        let empty_leaf = format!("{}<b/>{}", "<a>".repeat(MAX_NESTING), "</a>".repeat(MAX_NESTING));
        assert!(Document::from_bytes(empty_leaf.as_bytes()).is_err());
    }

    #[test]
    fn malformed_inputs_are_format_errors() {
        let cases: [&[u8]; 5] = [
            b"",
            b"<a><b></a>",
            b"<a></a><b></b>",
            b"<a>text<b/></a>",
            b"<a>",
        ];
        for input in cases {
            match Document::from_bytes(input) {
                Err(ScribeError::Format(_)) => {}
                other => panic!("expected a format error for {input:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn labels_must_be_node_names() {
        assert!(is_valid_label("pawns"));
        assert!(is_valid_label("_x.y-z1"));
        assert!(!is_valid_label(""));
        assert!(!is_valid_label("1abc"));
        assert!(!is_valid_label("a b"));
    }
}
