//! Per-type hooks: how values, objects and references are coded.
//!
//! Scribe never inspects types at runtime. Every type that takes part in a
//! document implements one or more of these traits:
//!
//! * [`Exposable`]: an object with named fields, exposed field by field through a
//!   [`Scribe`]. The same `expose` body runs when saving and in every load phase.
//! * [`ScribeValue`]: a scalar with a canonical text form.
//! * [`Referenceable`]: an object with a stable identifier, so other objects can
//!   point at it by id.
//! * [`Lookable`]: anything that can sit in one slot of a list or mapping, for
//!   the [`LookMode`]s it supports.

use std::any::type_name;
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use crate::context::Scribe;
use crate::diagnostics::{Diagnostic, Unresolved};
use crate::error::{self, Result, ScribeError};
use crate::mode::{LookMode, Mode};
use crate::resolver::CrossRefResolver;

/// A shared, mutable object that other objects may reference.
pub type Shared<T> = Rc<RefCell<T>>;

/// Wraps `value` in a [`Shared`] handle.
pub fn shared<T>(value: T) -> Shared<T> {
    Rc::new(RefCell::new(value))
}

/// An object whose fields are stored as a subtree.
///
/// ```rust
/// use scribe::{Exposable, Phase, Result, Scribe};
///
/// #[derive(Default)]
/// struct Stockpile {
///     name: String,
///     capacity: u32,
///     free: u32, // derived
/// }
///
/// impl Exposable for Stockpile {
///     fn expose(&mut self, scribe: &mut Scribe<'_>) -> Result<()> {
///         scribe.look_value(&mut self.name, "name")?;
///         scribe.look_value(&mut self.capacity, "capacity")?;
///         if scribe.phase() == Some(Phase::PostLoadInit) {
///             self.free = self.capacity;
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Exposable {
    /// Exposes every persisted field to `scribe`.
    fn expose(&mut self, scribe: &mut Scribe<'_>) -> Result<()>;
}

/// An object with an identifier that is unique within one document.
pub trait Referenceable {
    /// The stable identifier stored by references to this object.
    fn load_id(&self) -> String;
}

/// A scalar with a canonical text form.
pub trait ScribeValue: Sized {
    /// Canonical text.
    fn to_text(&self) -> String;

    /// Parses canonical text. The error is a human readable reason.
    fn from_text(text: &str) -> std::result::Result<Self, String>;
}

macro_rules! impl_scribe_value_parse {
    ($($t:ty),* $(,)?) => {$(
        impl ScribeValue for $t {
            fn to_text(&self) -> String {
                self.to_string()
            }

            fn from_text(text: &str) -> std::result::Result<Self, String> {
                text.trim().parse::<$t>().map_err(|e| e.to_string())
            }
        }
    )*};
}

impl_scribe_value_parse!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

impl ScribeValue for bool {
    fn to_text(&self) -> String {
        self.to_string()
    }

    fn from_text(text: &str) -> std::result::Result<Self, String> {
        let text = text.trim();
        if text.eq_ignore_ascii_case("true") {
            Ok(true)
        } else if text.eq_ignore_ascii_case("false") {
            Ok(false)
        } else {
            Err(format!("`{text}` is not a boolean"))
        }
    }
}

impl ScribeValue for char {
    fn to_text(&self) -> String {
        self.to_string()
    }

    fn from_text(text: &str) -> std::result::Result<Self, String> {
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(format!("`{text}` is not a single character")),
        }
    }
}

impl ScribeValue for String {
    fn to_text(&self) -> String {
        self.clone()
    }

    fn from_text(text: &str) -> std::result::Result<Self, String> {
        Ok(text.to_owned())
    }
}

/// Something that can occupy one slot of a list or mapping.
///
/// Which methods matter depends on the [`LookMode`]:
///
/// | mode        | saving        | `LoadingVars`  | later phases      |
/// |-------------|---------------|----------------|-------------------|
/// | `Value`     | `write_slot`  | `read_slot`    | -                 |
/// | `Deep`      | `expose_slot` | `read_slot`    | `expose_slot`     |
/// | `Reference` | `write_slot`  | id recorded    | `resolve_slot`    |
///
/// Use [`impl_value_lookable!`](crate::impl_value_lookable) for scalar types and
/// [`impl_deep_lookable!`](crate::impl_deep_lookable) (or `#[derive(Exposable)]`)
/// for objects.
pub trait Lookable: Sized + 'static {
    /// Returns true if this type can be coded with `mode`.
    fn supports(mode: LookMode) -> bool;

    /// Writes a by-value or by-reference slot into the current node.
    fn write_slot(&self, mode: LookMode, _scribe: &mut Scribe<'_>) -> Result<()> {
        Err(unsupported::<Self>(mode))
    }

    /// Reads a by-value or deep slot from the current node during `LoadingVars`.
    ///
    /// `Ok(None)` means the slot could not be read and was already reported.
    fn read_slot(mode: LookMode, _scribe: &mut Scribe<'_>) -> Result<Option<Self>> {
        Err(unsupported::<Self>(mode))
    }

    /// Exposes a deep slot while saving and during the later load phases.
    fn expose_slot(&mut self, _scribe: &mut Scribe<'_>) -> Result<()> {
        Ok(())
    }

    /// Turns a stored identifier into a live slot.
    fn resolve_slot(_id: &str, _resolver: &CrossRefResolver) -> std::result::Result<Self, Unresolved> {
        Err(Unresolved::TypeMismatch)
    }

    /// The value a null slot takes, or `None` if this type cannot be null.
    fn null_slot() -> Option<Self> {
        None
    }

    /// Returns true if a null node maps to a value of this type.
    fn is_nullable() -> bool {
        Self::null_slot().is_some()
    }

    /// Returns true if this value is the null form of its type.
    fn is_null_slot(&self) -> bool {
        false
    }
}

fn unsupported<T>(mode: LookMode) -> ScribeError {
    error::protocol(format!(
        "look mode {mode:?} is not supported for `{}`",
        type_name::<T>()
    ))
}

/// Writes a scalar slot. Used by [`impl_value_lookable!`](crate::impl_value_lookable).
#[doc(hidden)]
pub fn write_value<T: ScribeValue>(value: &T, mode: LookMode, scribe: &mut Scribe<'_>) -> Result<()> {
    if mode != LookMode::Value {
        return Err(unsupported::<T>(mode));
    }
    scribe.write_text(&value.to_text())
}

/// Reads a scalar slot. Used by [`impl_value_lookable!`](crate::impl_value_lookable).
#[doc(hidden)]
pub fn read_value<T: ScribeValue>(mode: LookMode, scribe: &mut Scribe<'_>) -> Result<Option<T>> {
    if mode != LookMode::Value {
        return Err(unsupported::<T>(mode));
    }
    let text = scribe.current_text().unwrap_or_default();
    match T::from_text(text) {
        Ok(value) => Ok(Some(value)),
        Err(reason) => {
            let path = scribe.path();
            scribe.report(Diagnostic::InvalidValue {
                path,
                text: text.to_owned(),
                reason,
            });
            Ok(None)
        }
    }
}

/// Constructs and exposes a deep slot. Used by [`impl_deep_lookable!`](crate::impl_deep_lookable).
#[doc(hidden)]
pub fn read_deep<T: Exposable + Default>(mode: LookMode, scribe: &mut Scribe<'_>) -> Result<Option<T>> {
    if mode != LookMode::Deep {
        return Err(unsupported::<T>(mode));
    }
    let mut value = T::default();
    value.expose(scribe)?;
    Ok(Some(value))
}

/// Implements [`Lookable`] in `Value` mode for types implementing [`ScribeValue`].
#[macro_export]
macro_rules! impl_value_lookable {
    ($($t:ty),* $(,)?) => {$(
        impl $crate::Lookable for $t {
            fn supports(mode: $crate::LookMode) -> bool {
                mode == $crate::LookMode::Value
            }

            fn write_slot(&self, mode: $crate::LookMode, scribe: &mut $crate::Scribe<'_>) -> $crate::Result<()> {
                $crate::slot::write_value(self, mode, scribe)
            }

            fn read_slot(mode: $crate::LookMode, scribe: &mut $crate::Scribe<'_>) -> $crate::Result<Option<Self>> {
                $crate::slot::read_value(mode, scribe)
            }
        }
    )*};
}

/// Implements [`Lookable`] in `Deep` mode for types implementing
/// [`Exposable`] and `Default`.
#[macro_export]
macro_rules! impl_deep_lookable {
    ($($t:ty),* $(,)?) => {$(
        impl $crate::Lookable for $t {
            fn supports(mode: $crate::LookMode) -> bool {
                mode == $crate::LookMode::Deep
            }

            fn read_slot(mode: $crate::LookMode, scribe: &mut $crate::Scribe<'_>) -> $crate::Result<Option<Self>> {
                $crate::slot::read_deep(mode, scribe)
            }

            fn expose_slot(&mut self, scribe: &mut $crate::Scribe<'_>) -> $crate::Result<()> {
                $crate::Exposable::expose(self, scribe)
            }
        }
    )*};
}

impl_value_lookable!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, bool, char, String
);

impl<L: Lookable> Lookable for Option<L> {
    fn supports(mode: LookMode) -> bool {
        L::supports(mode)
    }

    fn write_slot(&self, mode: LookMode, scribe: &mut Scribe<'_>) -> Result<()> {
        match self {
            Some(inner) => inner.write_slot(mode, scribe),
            None => scribe.mark_null(),
        }
    }

    fn read_slot(mode: LookMode, scribe: &mut Scribe<'_>) -> Result<Option<Self>> {
        Ok(Some(L::read_slot(mode, scribe)?))
    }

    fn expose_slot(&mut self, scribe: &mut Scribe<'_>) -> Result<()> {
        match self {
            Some(inner) => inner.expose_slot(scribe),
            None if scribe.mode() == Mode::Saving => scribe.mark_null(),
            None => Ok(()),
        }
    }

    fn resolve_slot(id: &str, resolver: &CrossRefResolver) -> std::result::Result<Self, Unresolved> {
        L::resolve_slot(id, resolver).map(Some)
    }

    fn null_slot() -> Option<Self> {
        Some(None)
    }

    fn is_null_slot(&self) -> bool {
        self.is_none()
    }
}

impl<T> Lookable for Shared<T>
where
    T: Exposable + Referenceable + Default + 'static,
{
    fn supports(mode: LookMode) -> bool {
        mode == LookMode::Deep
    }

    fn read_slot(mode: LookMode, scribe: &mut Scribe<'_>) -> Result<Option<Self>> {
        if mode != LookMode::Deep {
            return Err(unsupported::<Self>(mode));
        }
        read_shared(scribe).map(Some)
    }

    fn expose_slot(&mut self, scribe: &mut Scribe<'_>) -> Result<()> {
        expose_shared(self, scribe)
    }
}

/// Exposes the object behind a shared handle.
///
/// Deep ownership must form a tree: reaching an object that is already being
/// exposed is a protocol error rather than a `RefCell` panic.
pub(crate) fn expose_shared<T: Exposable>(object: &Shared<T>, scribe: &mut Scribe<'_>) -> Result<()> {
    let mut inner = object.try_borrow_mut().map_err(|_| {
        error::protocol(format!(
            "{}: shared object is already being exposed; deep ownership must form a tree",
            scribe.path()
        ))
    })?;
    inner.expose(scribe)
}

/// Constructs a shared object from the current node and registers it.
pub(crate) fn read_shared<T>(scribe: &mut Scribe<'_>) -> Result<Shared<T>>
where
    T: Exposable + Referenceable + Default + 'static,
{
    let object = shared(T::default());
    expose_shared(&object, scribe)?;
    let id = object.borrow().load_id();
    scribe.register_shared(id, &object);
    Ok(object)
}

/// A non-owning reference to a shared object, stored by identifier.
///
/// After `LoadingVars` a `Ref` only carries the stored identifier. Once
/// `ResolvingCrossRefs` has run it also points at the live target. The handle
/// is weak, so reference cycles never keep objects alive.
pub struct Ref<T> {
    id: Option<String>,
    target: Weak<RefCell<T>>,
}

impl<T> Ref<T> {
    /// A reference to nothing.
    pub fn null() -> Self {
        Self {
            id: None,
            target: Weak::new(),
        }
    }

    /// A reference to `target`.
    pub fn to(target: &Shared<T>) -> Self
    where
        T: Referenceable,
    {
        Self {
            id: Some(target.borrow().load_id()),
            target: Rc::downgrade(target),
        }
    }

    /// A placeholder carrying only an identifier.
    pub fn unresolved(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            target: Weak::new(),
        }
    }

    pub(crate) fn resolved(id: String, target: &Shared<T>) -> Self {
        Self {
            id: Some(id),
            target: Rc::downgrade(target),
        }
    }

    /// The stored identifier.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// The live target, if resolved and still alive.
    pub fn get(&self) -> Option<Shared<T>> {
        self.target.upgrade()
    }

    /// Returns true if this reference points at nothing.
    pub fn is_null(&self) -> bool {
        self.id.is_none()
    }

    /// Returns true if the target is live.
    pub fn is_resolved(&self) -> bool {
        self.target.strong_count() > 0
    }

    /// Returns true if this reference points at `object`.
    pub fn points_to(&self, object: &Shared<T>) -> bool {
        self.get().is_some_and(|target| Rc::ptr_eq(&target, object))
    }
}

impl<T> Default for Ref<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            target: self.target.clone(),
        }
    }
}

impl<T> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("id", &self.id)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// References compare by identifier.
impl<T> PartialEq for Ref<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Ref<T> {}

impl<T> Hash for Ref<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T: 'static> Lookable for Ref<T> {
    fn supports(mode: LookMode) -> bool {
        mode == LookMode::Reference
    }

    fn write_slot(&self, mode: LookMode, scribe: &mut Scribe<'_>) -> Result<()> {
        if mode != LookMode::Reference {
            return Err(unsupported::<Self>(mode));
        }
        match self.id() {
            Some(id) => scribe.write_text(id),
            None => scribe.mark_null(),
        }
    }

    fn resolve_slot(id: &str, resolver: &CrossRefResolver) -> std::result::Result<Self, Unresolved> {
        resolver
            .resolve::<T>(id)
            .map(|target| Ref::resolved(id.to_owned(), &target))
    }

    fn null_slot() -> Option<Self> {
        Some(Ref::null())
    }

    fn is_null_slot(&self) -> bool {
        self.is_null()
    }
}
