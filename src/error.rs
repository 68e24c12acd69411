//! Centralized error handling for Scribe.
//!
//! Scribe separates failures into three families, and only two of them ever
//! surface as a [`ScribeError`]:
//!
//! 1. **Structural** failures: the input bytes are not a well-formed document.
//!    They abort a load before any phase runs ([`ScribeError::Format`]).
//! 2. **Protocol misuse**: starting a session while another is active, calling
//!    `exit()` without a matching `enter()`, asking a type for a look mode it
//!    does not support. These are caller bugs and fail loudly
//!    ([`ScribeError::Protocol`]).
//! 3. **Reconstruction** issues (length mismatches, null or duplicate keys,
//!    unresolved references) are *not* errors. They are collected as
//!    [`Diagnostic`](crate::Diagnostic)s and the load keeps going.
//!
//! ## Usage
//!
//! ```rust
//! use scribe::{Reader, ScribeError};
//!
//! match Reader::start(b"<root><unclosed></root>") {
//!     Err(ScribeError::Format(msg)) => println!("bad document: {msg}"),
//!     Err(e) => println!("other error: {e}"),
//!     Ok(_) => unreachable!(),
//! }
//! ```

use std::fmt;
use std::io;
use std::sync::Arc;

/// A specialized `Result` type for Scribe operations.
pub type Result<T> = std::result::Result<T, ScribeError>;

/// The master error enum covering every fatal failure in Scribe.
///
/// This type is `Clone`; I/O errors are wrapped in an `Arc` for that reason.
#[derive(Debug, Clone)]
pub enum ScribeError {
    /// Low-level I/O failure while reading or writing a document file.
    Io(Arc<io::Error>),

    /// The document tree could not be encoded to bytes.
    Serialization(String),

    /// The input bytes are not a well-formed document.
    ///
    /// Raised by `Reader::start` before any phase runs:
    ///
    /// - Unbalanced or mismatched tags
    /// - Text outside the root node, or more than one root
    /// - Mixed text and child nodes under the same parent
    /// - Non UTF-8 labels
    Format(String),

    /// The engine was driven in a way its protocol forbids.
    ///
    /// Always a caller bug: a second concurrent session, an `exit()` without an
    /// `enter()`, a phase run after the load finished, an unsupported look mode.
    Protocol(String),

    /// Logic error inside the engine. Please report it if you see one.
    Internal(String),
}

impl fmt::Display for ScribeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O Error: {e}"),
            Self::Serialization(s) => write!(f, "Serialization Error: {s}"),
            Self::Format(s) => write!(f, "Format Error: {s}"),
            Self::Protocol(s) => write!(f, "Protocol Misuse: {s}"),
            Self::Internal(s) => write!(f, "Internal Logic Error: {s}"),
        }
    }
}

impl std::error::Error for ScribeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ScribeError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

/// Builds a protocol error and logs it at `error` level.
pub(crate) fn protocol(message: impl Into<String>) -> ScribeError {
    let message = message.into();
    log::error!("{message}");
    ScribeError::Protocol(message)
}
