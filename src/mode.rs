//! Phases of a load and the per-slot coding strategies.

use serde::Serialize;
use std::fmt;

/// A stage of the reconstruction protocol.
///
/// The whole document completes one phase before the next begins anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Phase {
    /// Values are assigned, objects constructed, reference ids recorded.
    LoadingVars,
    /// Recorded reference ids are turned into live handles.
    ResolvingCrossRefs,
    /// Every object gets one callback to rebuild derived state.
    PostLoadInit,
}

impl Phase {
    /// All phases, in execution order.
    pub const ORDER: [Phase; 3] = [
        Phase::LoadingVars,
        Phase::ResolvingCrossRefs,
        Phase::PostLoadInit,
    ];

    /// The phase that runs after this one.
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::LoadingVars => Some(Phase::ResolvingCrossRefs),
            Phase::ResolvingCrossRefs => Some(Phase::PostLoadInit),
            Phase::PostLoadInit => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::LoadingVars => "LoadingVars",
            Phase::ResolvingCrossRefs => "ResolvingCrossRefs",
            Phase::PostLoadInit => "PostLoadInit",
        };
        f.write_str(name)
    }
}

/// What a [`Scribe`](crate::Scribe) is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Building a document from live objects.
    Saving,
    /// Rebuilding live objects from a document.
    Loading(Phase),
}

/// How one slot of a list or mapping is coded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LookMode {
    /// The slot's canonical text is stored inline.
    Value,
    /// The slot is an object whose fields are stored as a nested subtree.
    Deep,
    /// Only the target's stable identifier is stored.
    Reference,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_chain_in_order() {
        let mut seen = vec![Phase::LoadingVars];
        while let Some(next) = seen.last().and_then(|p| p.next()) {
            seen.push(next);
        }
        assert_eq!(seen, Phase::ORDER);
    }
}
