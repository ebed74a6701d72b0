//! # Diagnostics
//!
//! Non-fatal findings collected while loading and compiling. Each one is
//! logged when recorded and also returned to the caller with the artifact.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Visual document missing or malformed; layout was synthesized
    VisualLoadFailure,
    /// Some geometry was synthesized by auto-placement
    ReducedLayoutFidelity,
    /// A persisted route names a node or pin that no longer exists
    UnresolvedEndpoint,
    /// A persisted route that is no longer a legal connection
    RejectedConnection,
    /// Two behavior references share an identifier at different locations
    DuplicateBehaviorIdentifier,
    /// An output variant reaches no destination
    EmptyDestinationRow,
    /// A linked group whose model could not be loaded
    BrokenGroupLink,
    /// A group with nothing inside it
    EmptyGroup,
    /// Visual data for an entity the behavioral document does not have
    StaleVisualEntry,
    /// A persisted node, pin, port or bus that could not be added
    SkippedEntity,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::VisualLoadFailure => "visual load failure",
            Self::ReducedLayoutFidelity => "reduced layout fidelity",
            Self::UnresolvedEndpoint => "unresolved endpoint",
            Self::RejectedConnection => "rejected connection",
            Self::DuplicateBehaviorIdentifier => "duplicate behavior identifier",
            Self::EmptyDestinationRow => "empty destination row",
            Self::BrokenGroupLink => "broken group link",
            Self::EmptyGroup => "empty group",
            Self::StaleVisualEntry => "stale visual entry",
            Self::SkippedEntity => "skipped entity",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    /// Id of the node or bus concerned, when there is one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<u32>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.subject {
            Some(id) => write!(f, "{} ({}): {}", self.kind, id, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finding and log it as a warning
    pub fn warn(&mut self, kind: DiagnosticKind, subject: Option<u32>, message: impl Into<String>) {
        let diagnostic = Diagnostic {
            kind,
            message: message.into(),
            subject,
        };
        tracing::warn!("[DIAGNOSTIC] {}", diagnostic);
        self.entries.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.kind == kind)
    }

    pub fn has(&self, kind: DiagnosticKind) -> bool {
        self.of_kind(kind).next().is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
