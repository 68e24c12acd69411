//! The context object threaded through every `expose` call.
//!
//! A [`Scribe`] is either *saving* (its cursor is the stack of open nodes of a
//! document being built) or *loading* in one [`Phase`] (its cursor is a stack of
//! frames over the parsed document). The navigation calls behave the same way
//! in all three load phases: that is what lets one `expose` body serve as the
//! traversal for every pass over the same document.

use crate::collections::ScratchBank;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::document::{self, DocNode};
use crate::error::{self, Result};
use crate::mode::{Mode, Phase};
use crate::resolver::CrossRefResolver;
use crate::slot::{expose_shared, read_shared, Exposable, Ref, Referenceable, ScribeValue, Shared};

/// One entered node during a load.
struct Frame<'a> {
    node: &'a DocNode,
    segment: String,
}

struct Loading<'a> {
    phase: Phase,
    frames: Vec<Frame<'a>>,
    resolver: &'a mut CrossRefResolver,
    diagnostics: &'a mut Diagnostics,
    scratch: &'a mut ScratchBank,
}

enum State<'a> {
    Saving(&'a mut Vec<DocNode>),
    Loading(Loading<'a>),
}

/// Cursor plus session state for one traversal.
///
/// Obtained from [`Writer::scribe`](crate::Writer::scribe) or handed to the
/// closure passed to [`Reader::run`](crate::Reader::run).
pub struct Scribe<'a> {
    state: State<'a>,
}

impl<'a> Scribe<'a> {
    pub(crate) fn saving(stack: &'a mut Vec<DocNode>) -> Self {
        Self {
            state: State::Saving(stack),
        }
    }

    pub(crate) fn loading(
        phase: Phase,
        root: &'a DocNode,
        resolver: &'a mut CrossRefResolver,
        diagnostics: &'a mut Diagnostics,
        scratch: &'a mut ScratchBank,
    ) -> Self {
        Self {
            state: State::Loading(Loading {
                phase,
                frames: vec![Frame {
                    node: root,
                    segment: root.label().to_owned(),
                }],
                resolver,
                diagnostics,
                scratch,
            }),
        }
    }

    /// Whether this traversal saves or loads, and in which phase.
    pub fn mode(&self) -> Mode {
        match &self.state {
            State::Saving(_) => Mode::Saving,
            State::Loading(loading) => Mode::Loading(loading.phase),
        }
    }

    /// The active load phase, or `None` while saving.
    pub fn phase(&self) -> Option<Phase> {
        match &self.state {
            State::Saving(_) => None,
            State::Loading(loading) => Some(loading.phase),
        }
    }

    /// Returns true while saving.
    pub fn is_saving(&self) -> bool {
        matches!(self.state, State::Saving(_))
    }

    /// Number of nodes entered below the root.
    pub fn depth(&self) -> usize {
        match &self.state {
            State::Saving(stack) => stack.len().saturating_sub(1),
            State::Loading(loading) => loading.frames.len().saturating_sub(1),
        }
    }

    /// Descends into the child named `label`.
    ///
    /// While saving this creates the child and always returns `true`. While
    /// loading it returns `false` (and does not descend) if no such child
    /// exists. Every `true` must be matched by exactly one [`exit`](Self::exit).
    pub fn enter(&mut self, label: &str) -> Result<bool> {
        match &mut self.state {
            State::Saving(stack) => {
                check_label(label)?;
                stack.push(DocNode::new(label));
                Ok(true)
            }
            State::Loading(loading) => {
                let Some(node) = loading.frames.last().and_then(|f| f.node.child(label)) else {
                    return Ok(false);
                };
                loading.frames.push(Frame {
                    node,
                    segment: label.to_owned(),
                });
                Ok(true)
            }
        }
    }

    /// Returns to the parent node.
    pub fn exit(&mut self) -> Result<()> {
        match &mut self.state {
            State::Saving(stack) => {
                if stack.len() <= 1 {
                    return Err(error::protocol("exit() without a matching enter()"));
                }
                let node = stack
                    .pop()
                    .ok_or_else(|| error::protocol("exit() without a matching enter()"))?;
                if let Some(parent) = stack.last_mut() {
                    parent.push(node);
                }
                Ok(())
            }
            State::Loading(loading) => {
                if loading.frames.len() <= 1 {
                    return Err(error::protocol("exit() without a matching enter()"));
                }
                loading.frames.pop();
                Ok(())
            }
        }
    }

    /// Runs `f` inside the child named `label`, exiting on every path.
    ///
    /// Returns `Ok(None)` without calling `f` if the child is absent during a load.
    pub fn node<R>(
        &mut self,
        label: &str,
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<Option<R>> {
        if !self.enter(label)? {
            return Ok(None);
        }
        let result = f(self);
        let exited = self.exit();
        let value = result?;
        exited?;
        Ok(Some(value))
    }

    /// Runs `f` inside the `index`-th child of the current node during a load.
    pub(crate) fn node_at<R>(
        &mut self,
        index: usize,
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<Option<R>> {
        let State::Loading(loading) = &mut self.state else {
            return Err(error::protocol("indexed navigation is only available while loading"));
        };
        let Some(node) = loading.frames.last().and_then(|f| f.node.children().get(index)) else {
            return Ok(None);
        };
        loading.frames.push(Frame {
            node,
            segment: format!("{}[{index}]", node.label()),
        });
        let result = f(self);
        let exited = self.exit();
        let value = result?;
        exited?;
        Ok(Some(value))
    }

    /// Appends a leaf holding `text` to the current node.
    pub fn write_scalar(&mut self, label: &str, text: &str) -> Result<()> {
        match &mut self.state {
            State::Saving(stack) => {
                check_label(label)?;
                let parent = stack
                    .last_mut()
                    .ok_or_else(|| error::protocol("writer has no open node"))?;
                parent.push(DocNode::leaf(label, text));
                Ok(())
            }
            State::Loading(_) => Err(error::protocol("write_scalar() called while loading")),
        }
    }

    /// Text of the child named `label` during a load.
    pub fn read_scalar(&self, label: &str) -> Option<&'a str> {
        self.child(label)
            .filter(|node| !node.is_null())
            .map(|node| node.text().unwrap_or_default())
    }

    /// Returns true if a child named `label` exists during a load.
    pub fn has_node(&self, label: &str) -> bool {
        self.child(label).is_some()
    }

    pub(crate) fn child(&self, label: &str) -> Option<&'a DocNode> {
        match &self.state {
            State::Saving(_) => None,
            State::Loading(loading) => loading.frames.last().and_then(|f| f.node.child(label)),
        }
    }

    pub(crate) fn current_node(&self) -> Option<&'a DocNode> {
        match &self.state {
            State::Saving(_) => None,
            State::Loading(loading) => loading.frames.last().map(|f| f.node),
        }
    }

    pub(crate) fn current_text(&self) -> Option<&'a str> {
        self.current_node().and_then(DocNode::text)
    }

    pub(crate) fn write_text(&mut self, text: &str) -> Result<()> {
        match &mut self.state {
            State::Saving(stack) => {
                let node = stack
                    .last_mut()
                    .ok_or_else(|| error::protocol("writer has no open node"))?;
                node.set_text(text);
                Ok(())
            }
            State::Loading(_) => Err(error::protocol("slot written while loading")),
        }
    }

    pub(crate) fn mark_null(&mut self) -> Result<()> {
        match &mut self.state {
            State::Saving(stack) => {
                let node = stack
                    .last_mut()
                    .ok_or_else(|| error::protocol("writer has no open node"))?;
                node.mark_null();
                Ok(())
            }
            State::Loading(_) => Err(error::protocol("slot written while loading")),
        }
    }

    /// Writes a child named `label` that stands for a null slot.
    pub(crate) fn write_null(&mut self, label: &str) -> Result<()> {
        self.node(label, |s| s.mark_null()).map(|_| ())
    }

    /// Slash-separated path of the current node.
    pub fn path(&self) -> String {
        match &self.state {
            State::Saving(stack) => stack
                .iter()
                .map(DocNode::label)
                .collect::<Vec<_>>()
                .join("/"),
            State::Loading(loading) => loading
                .frames
                .iter()
                .map(|f| f.segment.as_str())
                .collect::<Vec<_>>()
                .join("/"),
        }
    }

    pub(crate) fn path_for(&self, label: &str) -> String {
        format!("{}/{label}", self.path())
    }

    pub(crate) fn report(&mut self, diagnostic: Diagnostic) {
        match &mut self.state {
            State::Loading(loading) => loading.diagnostics.report(diagnostic),
            State::Saving(_) => log::warn!("{diagnostic}"),
        }
    }

    pub(crate) fn resolver(&self) -> Option<&CrossRefResolver> {
        match &self.state {
            State::Loading(loading) => Some(&*loading.resolver),
            State::Saving(_) => None,
        }
    }

    pub(crate) fn resolver_mut(&mut self) -> Option<&mut CrossRefResolver> {
        match &mut self.state {
            State::Loading(loading) => Some(&mut *loading.resolver),
            State::Saving(_) => None,
        }
    }

    pub(crate) fn scratch_bank(&mut self) -> Option<&mut ScratchBank> {
        match &mut self.state {
            State::Loading(loading) => Some(&mut *loading.scratch),
            State::Saving(_) => None,
        }
    }

    /// Registers a freshly constructed object under `id` during `LoadingVars`.
    pub(crate) fn register_shared<T: 'static>(&mut self, id: String, object: &Shared<T>) {
        if self.phase() != Some(Phase::LoadingVars) {
            return;
        }
        let fresh = self
            .resolver_mut()
            .is_some_and(|resolver| resolver.register(id.clone(), object));
        if !fresh {
            let path = self.path();
            self.report(Diagnostic::DuplicateId { path, id });
        }
    }

    /// Codes a scalar field.
    ///
    /// Absent or null nodes leave `value` untouched; unparseable text is
    /// reported and also leaves it untouched.
    pub fn look_value<T: ScribeValue>(&mut self, value: &mut T, label: &str) -> Result<()> {
        match self.mode() {
            Mode::Saving => self.write_scalar(label, &value.to_text()),
            Mode::Loading(Phase::LoadingVars) => {
                if let Some(node) = self.child(label) {
                    self.assign_scalar(value, label, node);
                }
                Ok(())
            }
            Mode::Loading(_) => Ok(()),
        }
    }

    /// Codes a scalar field that is omitted from the document when it equals `default`.
    pub fn look_value_or<T>(&mut self, value: &mut T, label: &str, default: T) -> Result<()>
    where
        T: ScribeValue + PartialEq,
    {
        match self.mode() {
            Mode::Saving if *value == default => Ok(()),
            Mode::Saving => self.write_scalar(label, &value.to_text()),
            Mode::Loading(Phase::LoadingVars) => {
                match self.child(label) {
                    Some(node) => self.assign_scalar(value, label, node),
                    None => *value = default,
                }
                Ok(())
            }
            Mode::Loading(_) => Ok(()),
        }
    }

    fn assign_scalar<T: ScribeValue>(&mut self, value: &mut T, label: &str, node: &DocNode) {
        if node.is_null() {
            return;
        }
        let text = node.text().unwrap_or_default();
        match T::from_text(text) {
            Ok(parsed) => *value = parsed,
            Err(reason) => {
                let path = self.path_for(label);
                self.report(Diagnostic::InvalidValue {
                    path,
                    text: text.to_owned(),
                    reason,
                });
            }
        }
    }

    /// Codes an owned object stored as a nested subtree.
    ///
    /// During `LoadingVars` the object is reset to `T::default()` before its
    /// fields are exposed; the later phases expose the same object again.
    pub fn look_deep<T: Exposable + Default>(&mut self, value: &mut T, label: &str) -> Result<()> {
        if self.phase() == Some(Phase::LoadingVars) {
            match self.child(label) {
                Some(node) if !node.is_null() => *value = T::default(),
                _ => return Ok(()),
            }
        }
        self.node(label, |s| value.expose(s)).map(|_| ())
    }

    /// Codes an owned, referenceable object.
    ///
    /// The object is constructed and registered with the resolver during
    /// `LoadingVars`, so references anywhere in the document can reach it.
    pub fn look_shared<T>(&mut self, slot: &mut Option<Shared<T>>, label: &str) -> Result<()>
    where
        T: Exposable + Referenceable + Default + 'static,
    {
        match self.mode() {
            Mode::Saving => match slot {
                Some(object) => self
                    .node(label, |s| expose_shared(object, s))
                    .map(|_| ()),
                None => self.write_null(label),
            },
            Mode::Loading(Phase::LoadingVars) => {
                *slot = match self.child(label) {
                    Some(node) if !node.is_null() => self.node(label, read_shared)?,
                    _ => None,
                };
                Ok(())
            }
            Mode::Loading(_) => match slot {
                Some(object) => self
                    .node(label, |s| expose_shared(object, s))
                    .map(|_| ()),
                None => Ok(()),
            },
        }
    }

    /// Codes a reference to an object owned elsewhere.
    ///
    /// Only the target's identifier is stored. `LoadingVars` leaves a
    /// placeholder carrying that identifier; `ResolvingCrossRefs` replaces it
    /// with a live handle, or with a null reference if the identifier does not
    /// match a registered object of type `T`.
    pub fn look_reference<T: 'static>(&mut self, slot: &mut Ref<T>, label: &str) -> Result<()> {
        match self.mode() {
            Mode::Saving => match slot.id() {
                Some(id) => {
                    let id = id.to_owned();
                    self.write_scalar(label, &id)
                }
                None => Ok(()),
            },
            Mode::Loading(Phase::LoadingVars) => {
                let Some(node) = self.child(label) else {
                    *slot = Ref::null();
                    return Ok(());
                };
                let id = (!node.is_null()).then(|| node.text().unwrap_or_default().to_owned());
                *slot = match &id {
                    Some(id) => Ref::unresolved(id.clone()),
                    None => Ref::null(),
                };
                let path = self.path_for(label);
                if let Some(resolver) = self.resolver_mut() {
                    resolver.want_single(path, id);
                }
                Ok(())
            }
            Mode::Loading(Phase::ResolvingCrossRefs) => {
                let path = self.path_for(label);
                let Some(resolver) = self.resolver_mut() else {
                    return Ok(());
                };
                let Some(Some(id)) = resolver.take_single(&path) else {
                    return Ok(());
                };
                match resolver.resolve::<T>(&id) {
                    Ok(target) => *slot = Ref::resolved(id, &target),
                    Err(reason) => {
                        *slot = Ref::null();
                        self.report(Diagnostic::UnresolvedReference { path, id, reason });
                    }
                }
                Ok(())
            }
            Mode::Loading(Phase::PostLoadInit) => Ok(()),
        }
    }
}

impl std::fmt::Debug for Scribe<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scribe")
            .field("mode", &self.mode())
            .field("path", &self.path())
            .finish()
    }
}

fn check_label(label: &str) -> Result<()> {
    if document::is_valid_label(label) {
        Ok(())
    } else {
        Err(error::protocol(format!("`{label}` is not a valid node label")))
    }
}
