//! The Reader Session.
//!
//! Owns a parsed document and drives the three-phase reconstruction protocol.
//! The same `expose` callback is run once per [`Phase`]; the whole document
//! finishes one phase before the next begins anywhere.
//!
//! ```rust
//! use scribe::{Reader, Writer};
//!
//! let mut writer = Writer::begin()?;
//! writer.write_scalar("tick", "1200")?;
//! let bytes = writer.finish()?;
//!
//! let mut tick = 0u64;
//! let mut reader = Reader::start(&bytes)?;
//! reader.run(|s| s.look_value(&mut tick, "tick"))?;
//! let report = reader.finish(|s| s.look_value(&mut tick, "tick"))?;
//!
//! assert_eq!(tick, 1200);
//! assert!(report.is_clean());
//! # Ok::<(), scribe::ScribeError>(())
//! ```

use crate::collections::ScratchBank;
use crate::context::Scribe;
use crate::diagnostics::{Diagnostic, Diagnostics, LoadReport};
use crate::document::Document;
use crate::error::{self, Result};
use crate::mode::Phase;
use crate::resolver::CrossRefResolver;
use crate::session::{SessionGuard, SessionKind};

/// The active load.
#[derive(Debug)]
pub struct Reader {
    document: Document,
    resolver: CrossRefResolver,
    diagnostics: Diagnostics,
    scratch: ScratchBank,
    /// The next phase to run; `None` once all three have run.
    phase: Option<Phase>,
    _guard: SessionGuard,
}

impl Reader {
    /// Parses `bytes` and starts a load in [`Phase::LoadingVars`].
    ///
    /// Fails with [`ScribeError::Protocol`](crate::ScribeError::Protocol) if a
    /// session is already active, and with
    /// [`ScribeError::Format`](crate::ScribeError::Format) if the bytes are not
    /// a well-formed document. No phase runs in either case.
    pub fn start(bytes: &[u8]) -> Result<Self> {
        let guard = SessionGuard::acquire(SessionKind::Reader)?;
        let document = Document::from_bytes(bytes)?;
        Ok(Self::with_guard(document, guard))
    }

    /// Starts a load over an already parsed document.
    pub fn from_document(document: Document) -> Result<Self> {
        let guard = SessionGuard::acquire(SessionKind::Reader)?;
        Ok(Self::with_guard(document, guard))
    }

    fn with_guard(document: Document, guard: SessionGuard) -> Self {
        log::debug!("loading document with {} node(s)", document.root().node_count());
        Self {
            document,
            resolver: CrossRefResolver::new(),
            diagnostics: Diagnostics::default(),
            scratch: ScratchBank::default(),
            phase: Some(Phase::LoadingVars),
            _guard: guard,
        }
    }

    /// The phase the next [`run`](Self::run) will execute.
    pub fn phase(&self) -> Option<Phase> {
        self.phase
    }

    /// The parsed document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Objects registered so far.
    pub fn resolver(&self) -> &CrossRefResolver {
        &self.resolver
    }

    /// Diagnostics reported so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.diagnostics.as_slice()
    }

    /// Number of collection scratch entries (mapping transfer lists, deep list
    /// placements) still held by the session.
    pub fn scratch_in_use(&self) -> usize {
        self.scratch.len()
    }

    /// Forwards every diagnostic to `sink` as soon as it is reported.
    pub fn set_sink(&mut self, sink: impl FnMut(&Diagnostic) + 'static) {
        self.diagnostics.set_sink(Box::new(sink));
    }

    /// Runs the current phase over the whole document and advances to the next.
    ///
    /// Returns the phase that ran. Calling this after `PostLoadInit`, or
    /// leaving a node entered when `expose` returns, is a protocol error.
    pub fn run<F>(&mut self, expose: F) -> Result<Phase>
    where
        F: FnOnce(&mut Scribe<'_>) -> Result<()>,
    {
        let phase = self
            .phase
            .ok_or_else(|| error::protocol("run() after every phase has completed"))?;
        log::debug!("phase {phase} started");

        let mut scribe = Scribe::loading(
            phase,
            self.document.root(),
            &mut self.resolver,
            &mut self.diagnostics,
            &mut self.scratch,
        );
        expose(&mut scribe)?;
        if scribe.depth() != 0 {
            return Err(error::protocol(format!(
                "phase {phase} ended with {} unexited node(s) at {}",
                scribe.depth(),
                scribe.path()
            )));
        }

        if phase == Phase::PostLoadInit {
            self.scratch.clear();
        }
        log::debug!(
            "phase {phase} finished: {} object(s) registered, {} diagnostic(s)",
            self.resolver.len(),
            self.diagnostics.as_slice().len()
        );
        self.phase = phase.next();
        Ok(phase)
    }

    /// Runs every remaining phase exactly once, in order, then ends the session.
    pub fn finish<F>(mut self, mut expose: F) -> Result<LoadReport>
    where
        F: FnMut(&mut Scribe<'_>) -> Result<()>,
    {
        while self.phase.is_some() {
            self.run(&mut expose)?;
        }
        let registered_objects = self.resolver.len();
        if self.resolver.pending() > 0 {
            log::warn!(
                "{} reference slot(s) were never resolved",
                self.resolver.pending()
            );
        }
        self.resolver.clear();
        self.scratch.clear();
        Ok(LoadReport {
            diagnostics: std::mem::take(&mut self.diagnostics).into_vec(),
            registered_objects,
        })
    }
}
