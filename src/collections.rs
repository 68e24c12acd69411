//! Lists and the Keyed-Collection Codec.
//!
//! A mapping is stored as two sibling sequences under one node:
//!
//! ```text
//! <stock>
//!   <keys>
//!     <li>steel</li>
//!     <li>wood</li>
//!   </keys>
//!   <values>
//!     <li>75</li>
//!     <li>300</li>
//!   </values>
//! </stock>
//! ```
//!
//! On load the two sequences are read into a [`MapScratch`] and the mapping is
//! rebuilt by pairing `keys[i]` with `values[i]`. When neither side is coded by
//! reference the rebuild happens as soon as `LoadingVars` reaches the node;
//! otherwise it waits for `ResolvingCrossRefs`, when the referenced objects are
//! live. A damaged pair never aborts the load: it is skipped and reported.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

use crate::context::Scribe;
use crate::diagnostics::Diagnostic;
use crate::document::{DocNode, ITEM_LABEL};
use crate::error::{self, Result};
use crate::mode::{LookMode, Mode, Phase};
use crate::slot::Lookable;

const KEYS_LABEL: &str = "keys";
const VALUES_LABEL: &str = "values";

/// A mapping the Keyed-Collection Codec can rebuild.
pub trait KeyedCollection: Default {
    /// Key type.
    type Key;
    /// Value type.
    type Value;

    /// Number of entries.
    fn entry_count(&self) -> usize;
    /// Removes every entry.
    fn clear_entries(&mut self);
    /// Returns true if `key` is present.
    fn contains_key_of(&self, key: &Self::Key) -> bool;
    /// Inserts a pair. Callers check for collisions first.
    fn insert_entry(&mut self, key: Self::Key, value: Self::Value);
    /// Mutable access to the value stored under `key`.
    fn value_mut(&mut self, key: &Self::Key) -> Option<&mut Self::Value>;
    /// Every entry, in iteration order.
    fn entries_mut(&mut self) -> Vec<(&Self::Key, &mut Self::Value)>;
}

impl<K, V, S> KeyedCollection for HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    type Key = K;
    type Value = V;

    fn entry_count(&self) -> usize {
        self.len()
    }

    fn clear_entries(&mut self) {
        self.clear();
    }

    fn contains_key_of(&self, key: &K) -> bool {
        self.contains_key(key)
    }

    fn insert_entry(&mut self, key: K, value: V) {
        self.insert(key, value);
    }

    fn value_mut(&mut self, key: &K) -> Option<&mut V> {
        self.get_mut(key)
    }

    fn entries_mut(&mut self) -> Vec<(&K, &mut V)> {
        self.iter_mut().collect()
    }
}

impl<K: Ord, V> KeyedCollection for BTreeMap<K, V> {
    type Key = K;
    type Value = V;

    fn entry_count(&self) -> usize {
        self.len()
    }

    fn clear_entries(&mut self) {
        self.clear();
    }

    fn contains_key_of(&self, key: &K) -> bool {
        self.contains_key(key)
    }

    fn insert_entry(&mut self, key: K, value: V) {
        self.insert(key, value);
    }

    fn value_mut(&mut self, key: &K) -> Option<&mut V> {
        self.get_mut(key)
    }

    fn entries_mut(&mut self) -> Vec<(&K, &mut V)> {
        self.iter_mut().collect()
    }
}

/// Transfer lists for one mapping, alive between load phases.
///
/// Both sequences keep one slot per stored entry, nulls included, so index `i`
/// always names the `i`-th child of the stored sequence.
pub struct MapScratch<K, V> {
    keys: Option<Vec<Option<K>>>,
    values: Option<Vec<Option<V>>>,
    /// Stored position and key of every pair that made it into the mapping.
    placed: Vec<(usize, K)>,
}

impl<K, V> Default for MapScratch<K, V> {
    fn default() -> Self {
        Self {
            keys: None,
            values: None,
            placed: Vec::new(),
        }
    }
}

impl<K, V> MapScratch<K, V> {
    /// Creates empty scratch lists.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops everything held for reconstruction.
    pub fn release(&mut self) {
        self.keys = None;
        self.values = None;
        self.placed = Vec::new();
    }

    /// Returns true if nothing is held.
    pub fn is_released(&self) -> bool {
        self.keys.is_none() && self.values.is_none() && self.placed.is_empty()
    }
}

impl<K, V> std::fmt::Debug for MapScratch<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapScratch")
            .field("keys", &self.keys.as_ref().map(Vec::len))
            .field("values", &self.values.as_ref().map(Vec::len))
            .field("placed", &self.placed.len())
            .finish()
    }
}

/// Stored positions of the items a deep list kept during `LoadingVars`.
#[derive(Debug, Default)]
struct ListPlacement(Vec<usize>);

/// Per-load home of the state collections carry between phases, keyed by node
/// path: the [`MapScratch`]es used by [`Scribe::look_map`] and the item
/// positions of deep lists.
#[derive(Default)]
pub(crate) struct ScratchBank {
    entries: HashMap<String, Box<dyn Any>>,
}

impl ScratchBank {
    fn take<S: 'static>(&mut self, path: &str) -> Result<Option<S>> {
        match self.entries.remove(path) {
            None => Ok(None),
            Some(boxed) => boxed.downcast::<S>().map(|scratch| Some(*scratch)).map_err(|_| {
                error::protocol(format!(
                    "{path}: collection coded with different types across phases"
                ))
            }),
        }
    }

    fn put<S: 'static>(&mut self, path: String, scratch: S) {
        self.entries.insert(path, Box::new(scratch));
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        if !self.entries.is_empty() {
            log::debug!("releasing {} collection scratch entries", self.entries.len());
        }
        self.entries.clear();
    }
}

impl std::fmt::Debug for ScratchBank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScratchBank")
            .field("in_use", &self.entries.len())
            .finish()
    }
}

impl Scribe<'_> {
    /// Codes an optional list.
    ///
    /// `None` is saved as a null node, and an absent or null node loads as
    /// `None`. Null entries of a non-nullable element type are dropped with a
    /// [`Diagnostic::NullEntry`].
    pub fn look_list<L: Lookable>(
        &mut self,
        list: &mut Option<Vec<L>>,
        label: &str,
        mode: LookMode,
    ) -> Result<()> {
        check_mode::<L>(mode, label)?;
        match self.mode() {
            Mode::Saving => match list {
                Some(items) => self
                    .node(label, |s| {
                        items
                            .iter_mut()
                            .try_for_each(|item| write_item(s, item, mode))
                    })
                    .map(|_| ()),
                None => self.write_null(label),
            },
            Mode::Loading(Phase::LoadingVars) => {
                let node = match self.child(label) {
                    Some(node) if !node.is_null() => node,
                    _ => {
                        *list = None;
                        return Ok(());
                    }
                };
                if mode == LookMode::Reference {
                    let path = self.path_for(label);
                    if let Some(resolver) = self.resolver_mut() {
                        resolver.want_list(path, stored_ids(node));
                    }
                    *list = Some(Vec::new());
                    return Ok(());
                }
                let slots = self
                    .node(label, |s| read_sequence::<L>(s, mode))?
                    .unwrap_or_default();
                let (items, placed) = self.keep_present(slots, label);
                if mode == LookMode::Deep {
                    let path = self.path_for(label);
                    if let Some(bank) = self.scratch_bank() {
                        bank.put(path, ListPlacement(placed));
                    }
                }
                *list = Some(items);
                Ok(())
            }
            Mode::Loading(phase) => {
                let Some(items) = list else {
                    return Ok(());
                };
                match mode {
                    LookMode::Reference if phase == Phase::ResolvingCrossRefs => {
                        let path = self.path_for(label);
                        let ids = self
                            .resolver_mut()
                            .and_then(|resolver| resolver.take_list(&path));
                        if let Some(ids) = ids {
                            let slots = resolve_sequence::<L>(self, &path, ids);
                            *items = self.keep_present(slots, label).0;
                        }
                        Ok(())
                    }
                    LookMode::Deep => {
                        let path = self.path_for(label);
                        let placement = match self.scratch_bank() {
                            Some(bank) => bank.take::<ListPlacement>(&path)?,
                            None => None,
                        };
                        let result = self
                            .node(label, |s| {
                                expose_sequence(s, items.iter_mut(), placement.as_ref())
                            })
                            .map(|_| ());
                        if phase != Phase::PostLoadInit {
                            if let (Some(placement), Some(bank)) = (placement, self.scratch_bank()) {
                                bank.put(path, placement);
                            }
                        }
                        result
                    }
                    _ => Ok(()),
                }
            }
        }
    }

    /// Drops unreadable slots, returning the kept items and their stored positions.
    fn keep_present<L>(&mut self, slots: Vec<Option<L>>, label: &str) -> (Vec<L>, Vec<usize>) {
        let mut items = Vec::with_capacity(slots.len());
        let mut placed = Vec::with_capacity(slots.len());
        for (index, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(item) => {
                    items.push(item);
                    placed.push(index);
                }
                None => {
                    let path = self.path_for(label);
                    self.report(Diagnostic::NullEntry { path, index });
                }
            }
        }
        (items, placed)
    }

    /// Codes an optional mapping, keeping its transfer lists in the session.
    ///
    /// See [`look_map_with`](Self::look_map_with) for the full contract.
    pub fn look_map<M>(
        &mut self,
        map: &mut Option<M>,
        label: &str,
        key_mode: LookMode,
        value_mode: LookMode,
    ) -> Result<()>
    where
        M: KeyedCollection,
        M::Key: Lookable + Clone,
        M::Value: Lookable,
    {
        if self.is_saving() {
            let mut scratch = MapScratch::new();
            return self.look_map_with(map, label, key_mode, value_mode, &mut scratch);
        }

        let path = self.path_for(label);
        let mut scratch = match self.scratch_bank() {
            Some(bank) => bank
                .take::<MapScratch<M::Key, M::Value>>(&path)?
                .unwrap_or_default(),
            None => MapScratch::new(),
        };
        let result = self.look_map_with(map, label, key_mode, value_mode, &mut scratch);
        if !scratch.is_released() {
            if let Some(bank) = self.scratch_bank() {
                bank.put(path, scratch);
            }
        }
        result
    }

    /// Codes an optional mapping as `keys` and `values` sequences under `label`,
    /// using caller-owned transfer lists.
    ///
    /// The same `scratch` must be passed in every phase. It is released once
    /// `PostLoadInit` has run, whether or not the rebuild succeeded.
    ///
    /// * Saving `None` writes nothing, so the mapping reloads as absent.
    /// * An absent node during `LoadingVars` sets the mapping to `None`; a node
    ///   with empty sequences yields `Some` of an empty mapping.
    /// * Keys may be coded by value or by reference, never deep.
    pub fn look_map_with<M>(
        &mut self,
        map: &mut Option<M>,
        label: &str,
        key_mode: LookMode,
        value_mode: LookMode,
        scratch: &mut MapScratch<M::Key, M::Value>,
    ) -> Result<()>
    where
        M: KeyedCollection,
        M::Key: Lookable + Clone,
        M::Value: Lookable,
    {
        if key_mode == LookMode::Deep {
            return Err(error::protocol(format!(
                "{}: mapping keys cannot be coded deep",
                self.path_for(label)
            )));
        }
        check_mode::<M::Key>(key_mode, label)?;
        check_mode::<M::Value>(value_mode, label)?;
        let deferred = key_mode == LookMode::Reference || value_mode == LookMode::Reference;

        match self.mode() {
            Mode::Saving => {
                let result = match map {
                    Some(target) => self.write_map(target, label, key_mode, value_mode),
                    None => Ok(()),
                };
                scratch.release();
                result
            }
            Mode::Loading(Phase::LoadingVars) => {
                let node = match self.child(label) {
                    Some(node) if !node.is_null() => node,
                    _ => {
                        *map = None;
                        scratch.release();
                        return Ok(());
                    }
                };
                let target = map.insert(M::default());
                scratch.release();
                self.node(label, |s| {
                    scratch.keys = read_side(s, node, KEYS_LABEL, key_mode)?;
                    scratch.values = read_side(s, node, VALUES_LABEL, value_mode)?;
                    Ok(())
                })?;
                if !deferred {
                    let path = self.path_for(label);
                    self.rebuild(target, scratch, &path);
                }
                Ok(())
            }
            Mode::Loading(Phase::ResolvingCrossRefs) => {
                let Some(target) = map.as_mut() else {
                    scratch.release();
                    return Ok(());
                };
                let path = self.path_for(label);
                if deferred {
                    if key_mode == LookMode::Reference {
                        scratch.keys = self.resolve_side(&path, KEYS_LABEL);
                    }
                    if value_mode == LookMode::Reference {
                        scratch.values = self.resolve_side(&path, VALUES_LABEL);
                    }
                    if value_mode == LookMode::Deep {
                        if let Some(values) = scratch.values.as_mut() {
                            self.node(label, |s| {
                                s.node(VALUES_LABEL, |s| expose_slots(s, values))
                            })?;
                        }
                    }
                    self.rebuild(target, scratch, &path);
                    Ok(())
                } else if value_mode == LookMode::Deep {
                    self.expose_placed(target, label, scratch)
                } else {
                    Ok(())
                }
            }
            Mode::Loading(Phase::PostLoadInit) => {
                let result = match map.as_mut() {
                    Some(target) if value_mode == LookMode::Deep => {
                        self.expose_placed(target, label, scratch)
                    }
                    _ => Ok(()),
                };
                scratch.release();
                result
            }
        }
    }

    fn write_map<M>(
        &mut self,
        target: &mut M,
        label: &str,
        key_mode: LookMode,
        value_mode: LookMode,
    ) -> Result<()>
    where
        M: KeyedCollection,
        M::Key: Lookable,
        M::Value: Lookable,
    {
        let mut entries = target.entries_mut();
        self.node(label, |s| {
            s.node(KEYS_LABEL, |s| {
                entries.iter().try_for_each(|(key, _)| {
                    s.node(ITEM_LABEL, |s| key.write_slot(key_mode, s)).map(|_| ())
                })
            })?;
            s.node(VALUES_LABEL, |s| {
                entries
                    .iter_mut()
                    .try_for_each(|(_, value)| write_item(s, &mut **value, value_mode))
            })?;
            Ok(())
        })
        .map(|_| ())
    }

    fn resolve_side<L: Lookable>(&mut self, map_path: &str, side: &str) -> Option<Vec<Option<L>>> {
        let path = format!("{map_path}/{side}");
        let ids = self.resolver_mut()?.take_list(&path)?;
        Some(resolve_sequence(self, &path, ids))
    }

    /// Clears `target` and refills it from the transfer lists.
    fn rebuild<M>(&mut self, target: &mut M, scratch: &mut MapScratch<M::Key, M::Value>, path: &str)
    where
        M: KeyedCollection,
        M::Key: Lookable + Clone,
        M::Value: Lookable,
    {
        target.clear_entries();
        scratch.placed.clear();
        let keys = scratch.keys.take();
        let values = scratch.values.take();

        let Some(keys) = keys else {
            self.report(Diagnostic::MissingKeys { path: path.to_owned() });
            return;
        };
        let Some(values) = values else {
            self.report(Diagnostic::MissingValues { path: path.to_owned() });
            return;
        };
        if keys.len() != values.len() {
            self.report(Diagnostic::LengthMismatch {
                path: path.to_owned(),
                keys: keys.len(),
                values: values.len(),
            });
        }

        for (index, (key, value)) in keys.into_iter().zip(values).enumerate() {
            let Some(key) = key.filter(|key| !key.is_null_slot()) else {
                self.report(Diagnostic::NullKey { path: path.to_owned(), index });
                continue;
            };
            let Some(value) = value else {
                self.report(Diagnostic::NullValue { path: path.to_owned(), index });
                continue;
            };
            if target.contains_key_of(&key) {
                self.report(Diagnostic::DuplicateKey { path: path.to_owned(), index });
                continue;
            }
            scratch.placed.push((index, key.clone()));
            target.insert_entry(key, value);
        }
        log::trace!("{path}: rebuilt mapping with {} entries", target.entry_count());
    }

    /// Exposes deep values already inside `target` at their stored positions.
    fn expose_placed<M>(
        &mut self,
        target: &mut M,
        label: &str,
        scratch: &MapScratch<M::Key, M::Value>,
    ) -> Result<()>
    where
        M: KeyedCollection,
        M::Value: Lookable,
    {
        if scratch.placed.is_empty() {
            return Ok(());
        }
        self.node(label, |s| {
            s.node(VALUES_LABEL, |s| {
                for (index, key) in &scratch.placed {
                    if let Some(value) = target.value_mut(key) {
                        s.node_at(*index, |s| value.expose_slot(s))?;
                    }
                }
                Ok(())
            })
        })
        .map(|_| ())
    }
}

fn check_mode<L: Lookable>(mode: LookMode, label: &str) -> Result<()> {
    if L::supports(mode) {
        Ok(())
    } else {
        Err(error::protocol(format!(
            "{label}: look mode {mode:?} is not supported for `{}`",
            std::any::type_name::<L>()
        )))
    }
}

fn write_item<L: Lookable>(scribe: &mut Scribe<'_>, item: &mut L, mode: LookMode) -> Result<()> {
    scribe
        .node(ITEM_LABEL, |s| match mode {
            LookMode::Deep => item.expose_slot(s),
            _ => item.write_slot(mode, s),
        })
        .map(|_| ())
}

/// Identifiers stored in a sequence node; null entries stay `None`.
fn stored_ids(node: &DocNode) -> Vec<Option<String>> {
    node.children()
        .iter()
        .map(|child| (!child.is_null()).then(|| child.text().unwrap_or_default().to_owned()))
        .collect()
}

/// Reads one side of a mapping during `LoadingVars`.
///
/// Reference sides only record their identifiers and yield `None`; they are
/// filled during `ResolvingCrossRefs`.
fn read_side<L: Lookable>(
    scribe: &mut Scribe<'_>,
    map_node: &DocNode,
    side: &str,
    mode: LookMode,
) -> Result<Option<Vec<Option<L>>>> {
    let Some(node) = map_node.child(side) else {
        return Ok(None);
    };
    if mode == LookMode::Reference {
        let path = scribe.path_for(side);
        if let Some(resolver) = scribe.resolver_mut() {
            resolver.want_list(path, stored_ids(node));
        }
        return Ok(None);
    }
    scribe.node(side, |s| read_sequence(s, mode))
}

/// Reads every entry of the current sequence node.
fn read_sequence<L: Lookable>(scribe: &mut Scribe<'_>, mode: LookMode) -> Result<Vec<Option<L>>> {
    let Some(node) = scribe.current_node() else {
        return Ok(Vec::new());
    };
    let mut slots = Vec::with_capacity(node.children().len());
    for (index, child) in node.children().iter().enumerate() {
        if child.is_null() {
            slots.push(L::null_slot());
            continue;
        }
        let slot = scribe.node_at(index, |s| L::read_slot(mode, s))?;
        slots.push(slot.flatten());
    }
    Ok(slots)
}

/// Turns stored identifiers into slots, reporting the ones that match nothing.
fn resolve_sequence<L: Lookable>(
    scribe: &mut Scribe<'_>,
    path: &str,
    ids: Vec<Option<String>>,
) -> Vec<Option<L>> {
    let mut slots = Vec::with_capacity(ids.len());
    let mut failures = Vec::new();
    if let Some(resolver) = scribe.resolver() {
        for (index, id) in ids.into_iter().enumerate() {
            let Some(id) = id else {
                slots.push(L::null_slot());
                continue;
            };
            match L::resolve_slot(&id, resolver) {
                Ok(slot) => slots.push(Some(slot)),
                Err(reason) => {
                    slots.push(L::null_slot());
                    failures.push(Diagnostic::UnresolvedReference {
                        path: format!("{path}/{ITEM_LABEL}[{index}]"),
                        id,
                        reason,
                    });
                }
            }
        }
    }
    for diagnostic in failures {
        scribe.report(diagnostic);
    }
    slots
}

/// Exposes list items against the stored entries they were read from.
///
/// Without a recorded placement, items are paired with the stored entries in
/// order, skipping null entries of non-nullable types.
fn expose_sequence<'i, L: Lookable>(
    scribe: &mut Scribe<'_>,
    mut items: impl Iterator<Item = &'i mut L>,
    placement: Option<&ListPlacement>,
) -> Result<()> {
    if let Some(ListPlacement(placed)) = placement {
        for (item, index) in items.zip(placed) {
            scribe.node_at(*index, |s| item.expose_slot(s))?;
        }
        return Ok(());
    }
    let Some(node) = scribe.current_node() else {
        return Ok(());
    };
    let nullable = L::is_nullable();
    for (index, child) in node.children().iter().enumerate() {
        if child.is_null() && !nullable {
            continue;
        }
        let Some(item) = items.next() else {
            break;
        };
        scribe.node_at(index, |s| item.expose_slot(s))?;
    }
    Ok(())
}

/// Exposes transfer-list slots, which are aligned with the stored entries.
fn expose_slots<L: Lookable>(scribe: &mut Scribe<'_>, slots: &mut [Option<L>]) -> Result<()> {
    for (index, slot) in slots.iter_mut().enumerate() {
        if let Some(value) = slot {
            scribe.node_at(index, |s| value.expose_slot(s))?;
        }
    }
    Ok(())
}
