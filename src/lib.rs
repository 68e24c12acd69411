//! # Scribe
//!
//! A multi-pass document graph serialization engine: save a live object graph
//! as an ordered labeled tree, and rebuild it, including objects that reference
//! each other (cycles included) and mappings stored as two parallel sequences.
//!
//! ## Overview
//!
//! Scribe does not map types by reflection. Every persisted type exposes its
//! fields, one by one, to a [`Scribe`] context, either by hand or through
//! `#[derive(Exposable)]`. The *same* `expose` body serves as the traversal for
//! saving and for every pass of a load; the context tells each field what to do.
//!
//! ### Key Features
//!
//! *   **Three-Phase Loading:** `LoadingVars` assigns values, constructs objects
//!     and records reference identifiers; `ResolvingCrossRefs` turns identifiers
//!     into live handles; `PostLoadInit` gives every object one callback to rebuild
//!     derived state. The whole document completes a phase before the next begins,
//!     so a reference may appear before its target.
//! *   **Cross-References:** Objects owned in one place can be referenced from
//!     anywhere by a stable identifier ([`Ref`]). References are weak, so cycles do
//!     not leak.
//! *   **Keyed Collections:** Mappings are stored as `keys` and `values` sequences
//!     and rebuilt transactionally. Length mismatches, null keys and duplicate keys
//!     are reported and skipped, never fatal.
//! *   **Absent vs Empty:** A mapping or list that was never saved loads as `None`;
//!     one saved empty loads as `Some(empty)`.
//! *   **Diagnostics, not aborts:** Bad data inside a well-formed document becomes a
//!     [`Diagnostic`], logged through `log` and collected into a [`LoadReport`].
//!
//! ## Architecture
//!
//! ```text
//! live objects ──Writer──▶ Document ──bytes──▶ Reader ──▶ LoadingVars
//!                                                        ResolvingCrossRefs
//!                                                        PostLoadInit
//! ```
//!
//! *   [`document`]: the ordered labeled tree and its indented text form.
//! *   [`Writer`] / [`Reader`]: the two sessions. At most one is active in the
//!     process at any time.
//! *   [`CrossRefResolver`]: identifier → object table for one load.
//! *   [`collections`]: lists and the Keyed-Collection Codec.
//! *   [`slot`]: the per-type traits.
//!
//! ## Usage
//!
//! ```rust
//! use scribe::{shared, Archive, Exposable, Ref, Referenceable, Shared};
//!
//! #[derive(Default, Exposable)]
//! struct Pawn {
//!     name: String,
//!     #[scribe(reference)]
//!     rival: Ref<Pawn>,
//! }
//!
//! impl Referenceable for Pawn {
//!     fn load_id(&self) -> String {
//!         format!("Pawn_{}", self.name)
//!     }
//! }
//!
//! #[derive(Default, Exposable)]
//! struct Colony {
//!     #[scribe(list = "deep")]
//!     pawns: Option<Vec<Shared<Pawn>>>,
//! }
//!
//! let ada = shared(Pawn { name: "Ada".into(), ..Default::default() });
//! let bo = shared(Pawn { name: "Bo".into(), ..Default::default() });
//! ada.borrow_mut().rival = Ref::to(&bo);
//! bo.borrow_mut().rival = Ref::to(&ada);
//!
//! let mut colony = Colony { pawns: Some(vec![ada, bo]) };
//! let bytes = Archive::save_bytes("colony", &mut colony)?;
//!
//! let loaded = Archive::load_bytes::<Colony>(&bytes, "colony")?;
//! assert!(loaded.report.is_clean());
//! let pawns = loaded.value.pawns.unwrap_or_default();
//! assert!(pawns[0].borrow().rival.points_to(&pawns[1]));
//! assert!(pawns[1].borrow().rival.points_to(&pawns[0]));
//! # Ok::<(), scribe::ScribeError>(())
//! ```
//!
//! ### Safety and Error Handling
//!
//! * **Encapsulated Unsafe:** the only `unsafe` block maps a file in
//!   [`Archive::load`].
//! * **No Panics:** No `unwrap()` or `panic!()` calls in the library (enforced by clippy lints).
//!   Re-entrant borrows of a shared object surface as [`ScribeError::Protocol`].
//! * **Comprehensive Errors:** All fatal failures correspond to a [`ScribeError`].

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]

// Lets the derive's `::scribe::` paths resolve inside this crate too.
extern crate self as scribe;

// --- PUBLIC API MODULES ---
pub mod api;
pub mod collections;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod inspector;
pub mod mode;
pub mod reader;
pub mod resolver;
pub mod session;
pub mod slot;
pub mod writer;

// --- INTERNAL IMPLEMENTATION MODULES ---
mod context;

// --- RE-EXPORTS ---

pub use api::{Archive, Loaded};
pub use collections::{KeyedCollection, MapScratch};
pub use context::Scribe;
pub use diagnostics::{Diagnostic, LoadReport, Unresolved};
pub use document::{DocNode, Document, WriteOptions, ITEM_LABEL, MAX_NESTING, NULL_ATTRIBUTE};
pub use error::{Result, ScribeError};
pub use inspector::{DocumentInspector, DocumentReport, NodeInfo};
pub use mode::{LookMode, Mode, Phase};
pub use reader::Reader;
pub use resolver::CrossRefResolver;
pub use session::{active_session, SessionKind};
pub use slot::{shared, Exposable, Lookable, Ref, Referenceable, ScribeValue, Shared};
pub use writer::Writer;

/// Derives [`Exposable`] (and a deep [`Lookable`]) for structs with named fields.
pub use scribe_derive::Exposable;
