//! The Writer Session.
//!
//! Builds a document from live objects. The session owns the stack of open
//! nodes; [`Writer::finish`] folds the stack into a [`Document`] and encodes it.

use crate::context::Scribe;
use crate::document::{self, DocNode, Document, WriteOptions};
use crate::error::{self, Result, ScribeError};
use crate::session::{SessionGuard, SessionKind};

/// The active save.
///
/// ```rust
/// use scribe::Writer;
///
/// let mut writer = Writer::begin()?;
/// writer.enter("colony")?;
/// writer.write_scalar("name", "Outpost")?;
/// writer.exit()?;
/// let bytes = writer.finish()?;
///
/// let text = String::from_utf8(bytes).unwrap();
/// assert!(text.contains("<name>Outpost</name>"));
/// # Ok::<(), scribe::ScribeError>(())
/// ```
#[derive(Debug)]
pub struct Writer {
    stack: Vec<DocNode>,
    options: WriteOptions,
    _guard: SessionGuard,
}

impl Writer {
    /// Starts a save with the default options.
    ///
    /// Fails with [`ScribeError::Protocol`] if any session is already active.
    pub fn begin() -> Result<Self> {
        Self::begin_with(WriteOptions::default())
    }

    /// Starts a save with explicit options.
    pub fn begin_with(options: WriteOptions) -> Result<Self> {
        if !document::is_valid_label(&options.root_label) {
            return Err(error::protocol(format!(
                "`{}` is not a valid root label",
                options.root_label
            )));
        }
        let guard = SessionGuard::acquire(SessionKind::Writer)?;
        Ok(Self {
            stack: vec![DocNode::new(options.root_label.as_str())],
            options,
            _guard: guard,
        })
    }

    /// A saving [`Scribe`] positioned at the current node.
    pub fn scribe(&mut self) -> Scribe<'_> {
        Scribe::saving(&mut self.stack)
    }

    /// Creates the child `label` and descends into it. Always `true`.
    pub fn enter(&mut self, label: &str) -> Result<bool> {
        self.scribe().enter(label)
    }

    /// Appends a leaf to the current node.
    pub fn write_scalar(&mut self, label: &str, text: &str) -> Result<()> {
        self.scribe().write_scalar(label, text)
    }

    /// Returns to the parent node.
    pub fn exit(&mut self) -> Result<()> {
        self.scribe().exit()
    }

    /// Number of nodes entered and not yet exited.
    pub fn depth(&self) -> usize {
        self.stack.len().saturating_sub(1)
    }

    /// Ends the session and encodes the document.
    pub fn finish(self) -> Result<Vec<u8>> {
        let options = self.options.clone();
        let document = self.finish_document()?;
        let bytes = document.to_bytes_with(&options)?;
        log::debug!("encoded {} node(s) into {} bytes", document.root().node_count(), bytes.len());
        Ok(bytes)
    }

    /// Ends the session and returns the document tree.
    ///
    /// Fails with [`ScribeError::Protocol`] if an `enter` was never matched by an `exit`.
    pub fn finish_document(mut self) -> Result<Document> {
        if self.stack.len() != 1 {
            return Err(error::protocol(format!(
                "finish() with {} unclosed node(s)",
                self.depth()
            )));
        }
        let root = self
            .stack
            .pop()
            .ok_or_else(|| ScribeError::Internal("writer lost its root node".into()))?;
        Ok(Document::new(root))
    }
}
