//! Non-fatal problems found while extracting and assembling a document.
//!
//! Skippable and locally recoverable issues never abort a run. They are pushed
//! into a [`Diagnostics`] collector that is threaded through the pipeline and
//! echoed through the `log` facade as they arrive.

use log::{error, warn};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

/// Stable identifier for each kind of problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    MissingApiTag,
    MissingOperationTag,
    MissingVerb,
    VerbMismatch,
    MalformedSignature,
    MalformedTag,
    OrphanMethod,
    InvalidParameter,
    InvalidStatusCode,
    MalformedDefault,
    MalformedConstraint,
    InexactRangeBound,
    VerbCollision,
    MissingFile,
    UnreadableFile,
    ModelParseError,
    ModelMissingDefinitions,
    InvalidConfig,
}

impl DiagnosticKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingApiTag => "missing-api-tag",
            Self::MissingOperationTag => "missing-operation-tag",
            Self::MissingVerb => "missing-verb",
            Self::VerbMismatch => "verb-mismatch",
            Self::MalformedSignature => "malformed-signature",
            Self::MalformedTag => "malformed-tag",
            Self::OrphanMethod => "orphan-method",
            Self::InvalidParameter => "invalid-parameter",
            Self::InvalidStatusCode => "invalid-status-code",
            Self::MalformedDefault => "malformed-default",
            Self::MalformedConstraint => "malformed-constraint",
            Self::InexactRangeBound => "inexact-range-bound",
            Self::VerbCollision => "verb-collision",
            Self::MissingFile => "missing-file",
            Self::UnreadableFile => "unreadable-file",
            Self::ModelParseError => "model-parse-error",
            Self::ModelMissingDefinitions => "model-missing-definitions",
            Self::InvalidConfig => "invalid-config",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    /// File, and where known line and method, the problem refers to
    pub location: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind.code(), self.location, self.message)
    }
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, kind: DiagnosticKind, location: impl Into<String>, message: impl Into<String>) {
        self.push(Severity::Warning, kind, location.into(), message.into());
    }

    pub fn error(&mut self, kind: DiagnosticKind, location: impl Into<String>, message: impl Into<String>) {
        self.push(Severity::Error, kind, location.into(), message.into());
    }

    fn push(&mut self, severity: Severity, kind: DiagnosticKind, location: String, message: String) {
        let diagnostic = Diagnostic { severity, kind, location, message };
        match severity {
            Severity::Warning => warn!("{}", diagnostic),
            Severity::Error => error!("{}", diagnostic),
        }
        self.entries.push(diagnostic);
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }
}
