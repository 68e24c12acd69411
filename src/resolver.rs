//! The Cross-Reference Resolver.
//!
//! Two tables live here for the duration of one load:
//!
//! * **Registered objects**: stable identifier → live shared object, filled while
//!   `LoadingVars` constructs deep objects.
//! * **Wanted identifiers**: node path → identifier(s) read by a reference slot
//!   during `LoadingVars`, consumed during `ResolvingCrossRefs`.
//!
//! Keying the wanted bank by path is what lets a reference that appears *before*
//! its target in the document resolve correctly: nothing is looked up until every
//! object has been constructed.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::diagnostics::Unresolved;
use crate::slot::Shared;

#[derive(Debug)]
enum Wanted {
    Single(Option<String>),
    List(Vec<Option<String>>),
}

/// Identifier → instance table for one load.
#[derive(Default)]
pub struct CrossRefResolver {
    objects: HashMap<String, Rc<dyn Any>>,
    wanted: HashMap<String, Wanted>,
}

impl CrossRefResolver {
    /// Creates an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `object` under `id`.
    ///
    /// Returns `false` and keeps the existing entry if `id` is already taken.
    pub fn register<T: 'static>(&mut self, id: impl Into<String>, object: &Shared<T>) -> bool {
        let id = id.into();
        if self.objects.contains_key(&id) {
            return false;
        }
        let erased: Rc<dyn Any> = object.clone();
        log::trace!("registered `{id}`");
        self.objects.insert(id, erased);
        true
    }

    /// Looks up the object registered under `id`.
    pub fn resolve<T: 'static>(&self, id: &str) -> Result<Shared<T>, Unresolved> {
        let erased = self.objects.get(id).ok_or(Unresolved::Missing)?;
        Rc::clone(erased)
            .downcast::<RefCell<T>>()
            .map_err(|_| Unresolved::TypeMismatch)
    }

    /// Returns true if an object is registered under `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.objects.contains_key(id)
    }

    /// Number of registered objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true if no object is registered.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Number of reference slots still waiting for resolution.
    pub fn pending(&self) -> usize {
        self.wanted.len()
    }

    pub(crate) fn want_single(&mut self, path: String, id: Option<String>) {
        if self.wanted.insert(path.clone(), Wanted::Single(id)).is_some() {
            log::warn!("{path}: reference slot recorded twice, the last one wins");
        }
    }

    pub(crate) fn want_list(&mut self, path: String, ids: Vec<Option<String>>) {
        if self.wanted.insert(path.clone(), Wanted::List(ids)).is_some() {
            log::warn!("{path}: reference list recorded twice, the last one wins");
        }
    }

    /// `None` means nothing was recorded at `path`; `Some(None)` a recorded null.
    pub(crate) fn take_single(&mut self, path: &str) -> Option<Option<String>> {
        match self.wanted.remove(path)? {
            Wanted::Single(id) => Some(id),
            Wanted::List(_) => {
                log::warn!("{path}: expected a single reference, found a list");
                None
            }
        }
    }

    pub(crate) fn take_list(&mut self, path: &str) -> Option<Vec<Option<String>>> {
        match self.wanted.remove(path)? {
            Wanted::List(ids) => Some(ids),
            Wanted::Single(_) => {
                log::warn!("{path}: expected a reference list, found a single reference");
                None
            }
        }
    }

    /// Drops every registered object and wanted identifier.
    pub fn clear(&mut self) {
        if !self.wanted.is_empty() {
            log::debug!("discarding {} unconsumed reference slot(s)", self.wanted.len());
        }
        self.objects.clear();
        self.wanted.clear();
    }
}

impl std::fmt::Debug for CrossRefResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<&String> = self.objects.keys().collect();
        ids.sort();
        f.debug_struct("CrossRefResolver")
            .field("objects", &ids)
            .field("wanted", &self.wanted)
            .finish()
    }
}
