//! Non-fatal reconstruction diagnostics.
//!
//! A load never aborts because of bad *data* inside a well-formed document.
//! Each such condition is logged through the `log` facade at `warn` level,
//! forwarded to an optional sink, and collected into the [`LoadReport`]
//! returned by `Reader::finish`.

use serde::Serialize;
use std::fmt;

/// Why a stored identifier could not be turned into a live object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Unresolved {
    /// No object with that identifier was registered during the load.
    Missing,
    /// An object was registered under that identifier but has another type.
    TypeMismatch,
}

/// A reconstruction issue that was resolved by a documented fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// `keys` and `values` have different lengths; the shorter length was used.
    LengthMismatch {
        /// Path of the mapping node.
        path: String,
        /// Number of stored keys.
        keys: usize,
        /// Number of stored values.
        values: usize,
    },
    /// A null key was skipped.
    NullKey {
        /// Path of the mapping node.
        path: String,
        /// Position of the pair.
        index: usize,
    },
    /// A null value for a non-nullable value type was skipped.
    NullValue {
        /// Path of the mapping node.
        path: String,
        /// Position of the pair.
        index: usize,
    },
    /// A key already present in the rebuilt mapping was skipped; the first one wins.
    DuplicateKey {
        /// Path of the mapping node.
        path: String,
        /// Position of the skipped pair.
        index: usize,
    },
    /// The mapping node had no `keys` sequence; the mapping was left empty.
    MissingKeys {
        /// Path of the mapping node.
        path: String,
    },
    /// The mapping node had no `values` sequence; the mapping was left empty.
    MissingValues {
        /// Path of the mapping node.
        path: String,
    },
    /// A null entry in a list of a non-nullable type was dropped.
    NullEntry {
        /// Path of the list node.
        path: String,
        /// Position of the entry.
        index: usize,
    },
    /// A stored identifier matched no suitable object; the slot was left null.
    UnresolvedReference {
        /// Path of the reference slot.
        path: String,
        /// The stored identifier.
        id: String,
        /// What went wrong.
        reason: Unresolved,
    },
    /// Two objects claimed the same identifier; the first one stays registered.
    DuplicateId {
        /// Path of the second object.
        path: String,
        /// The contested identifier.
        id: String,
    },
    /// Scalar text could not be parsed; the field kept its previous value.
    InvalidValue {
        /// Path of the scalar node.
        path: String,
        /// The stored text.
        text: String,
        /// Parser message.
        reason: String,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LengthMismatch { path, keys, values } => write!(
                f,
                "{path}: keys count does not match values count (keys={keys}, values={values}); extra entries skipped"
            ),
            Self::NullKey { path, index } => write!(f, "{path}: null key at {index} skipped"),
            Self::NullValue { path, index } => write!(f, "{path}: null value at {index} skipped"),
            Self::DuplicateKey { path, index } => {
                write!(f, "{path}: duplicate key at {index} skipped")
            }
            Self::MissingKeys { path } => write!(f, "{path}: cannot fill mapping, no keys"),
            Self::MissingValues { path } => write!(f, "{path}: cannot fill mapping, no values"),
            Self::NullEntry { path, index } => write!(f, "{path}: null entry at {index} dropped"),
            Self::UnresolvedReference { path, id, reason } => {
                write!(f, "{path}: could not resolve reference `{id}` ({reason:?})")
            }
            Self::DuplicateId { path, id } => {
                write!(f, "{path}: identifier `{id}` is already registered")
            }
            Self::InvalidValue { path, text, reason } => {
                write!(f, "{path}: cannot parse `{text}`: {reason}")
            }
        }
    }
}

type Sink = Box<dyn FnMut(&Diagnostic)>;

/// Collector used by a reader session.
#[derive(Default)]
pub(crate) struct Diagnostics {
    collected: Vec<Diagnostic>,
    sink: Option<Sink>,
}

impl Diagnostics {
    pub(crate) fn set_sink(&mut self, sink: Sink) {
        self.sink = Some(sink);
    }

    pub(crate) fn report(&mut self, diagnostic: Diagnostic) {
        log::warn!("{diagnostic}");
        if let Some(sink) = self.sink.as_mut() {
            sink(&diagnostic);
        }
        self.collected.push(diagnostic);
    }

    pub(crate) fn as_slice(&self) -> &[Diagnostic] {
        &self.collected
    }

    pub(crate) fn into_vec(self) -> Vec<Diagnostic> {
        self.collected
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("collected", &self.collected)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

/// Outcome of a completed load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Every non-fatal issue, in the order it was found.
    pub diagnostics: Vec<Diagnostic>,
    /// Number of objects registered with the cross-reference resolver.
    pub registered_objects: usize,
}

impl LoadReport {
    /// Returns true if the load produced no diagnostics.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Counts the diagnostics matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&Diagnostic) -> bool) -> usize {
        self.diagnostics.iter().filter(|d| predicate(d)).count()
    }
}
