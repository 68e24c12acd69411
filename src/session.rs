//! Process-wide single-active-session guard.
//!
//! At most one writer or one reader session exists at any instant. Callers that
//! need concurrent saves or loads must queue them; the guard only detects the
//! overlap, it never waits.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::{self, Result};

const IDLE: u8 = 0;
const WRITING: u8 = 1;
const READING: u8 = 2;

static ACTIVE: AtomicU8 = AtomicU8::new(IDLE);

/// The kind of session holding the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// A save is in progress.
    Writer,
    /// A load is in progress.
    Reader,
}

impl SessionKind {
    fn tag(self) -> u8 {
        match self {
            SessionKind::Writer => WRITING,
            SessionKind::Reader => READING,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            WRITING => Some(SessionKind::Writer),
            READING => Some(SessionKind::Reader),
            _ => None,
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKind::Writer => f.write_str("writer"),
            SessionKind::Reader => f.write_str("reader"),
        }
    }
}

/// Returns the kind of the session currently active in this process.
pub fn active_session() -> Option<SessionKind> {
    SessionKind::from_tag(ACTIVE.load(Ordering::SeqCst))
}

/// RAII token proving that its owner is the only active session.
#[derive(Debug)]
pub(crate) struct SessionGuard {
    kind: SessionKind,
}

impl SessionGuard {
    pub(crate) fn acquire(kind: SessionKind) -> Result<Self> {
        ACTIVE
            .compare_exchange(IDLE, kind.tag(), Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|current| {
                let holder = SessionKind::from_tag(current)
                    .map_or_else(|| "unknown".to_owned(), |k| k.to_string());
                error::protocol(format!(
                    "cannot start a {kind} session while a {holder} session is active"
                ))
            })?;
        log::debug!("{kind} session started");
        Ok(Self { kind })
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        ACTIVE.store(IDLE, Ordering::SeqCst);
        log::debug!("{} session ended", self.kind);
    }
}

/// Serializes unit tests that open sessions.
#[cfg(test)]
pub(crate) fn test_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
