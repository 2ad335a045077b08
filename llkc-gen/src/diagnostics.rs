//! Append-only diagnostics sink shared by all analysis stages.
//!
//! Stages running on the rayon pool push into the same [`Diagnostics`]
//! concurrently; [`Diagnostics::snapshot`] returns the entries sorted by
//! position, kind and message so the output does not depend on scheduling.

use llkc::Span;
use std::fmt;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Fatal: later stages do not run.
    Error,
    Warning,
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticKind {
    PatternSyntax,
    UndefinedToken,
    PatternReferenceLoop,
    EmptyMatchPattern,
    DuplicateName,
    UndefinedLexicalState,
    UndefinedNonTerminal,
    NonTokenReference,
    MisplacedLookahead,
    UnreachableToken,
    UnreachableLexicalState,
    LeftRecursion,
    NullableLoopBody,
    NullableOptionalBody,
    LookaheadConflict,
    LookaheadGrowth,
}

impl DiagnosticKind {
    /// Severity used when the caller does not pick one.
    pub fn default_severity(self) -> Severity {
        use DiagnosticKind::*;
        match self {
            PatternSyntax | UndefinedToken | PatternReferenceLoop | EmptyMatchPattern
            | DuplicateName | UndefinedLexicalState | UndefinedNonTerminal
            | NonTokenReference | MisplacedLookahead | LeftRecursion | NullableLoopBody => {
                Severity::Error
            }
            UnreachableToken | UnreachableLexicalState | NullableOptionalBody
            | LookaheadConflict => Severity::Warning,
            LookaheadGrowth => Severity::Note,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub span: Span,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}: {:?}: {}",
            self.span.display(),
            self.severity,
            self.kind,
            self.message
        )
    }
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Mutex<Vec<Diagnostic>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => log::debug!("error {:?}: {}", diagnostic.kind, diagnostic.message),
            _ => log::trace!("{} {:?}: {}", diagnostic.severity, diagnostic.kind, diagnostic.message),
        }
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(diagnostic);
    }

    /// Records a diagnostic with the kind's default severity.
    pub fn report(&self, kind: DiagnosticKind, span: Span, message: impl Into<String>) {
        self.report_with(kind.default_severity(), kind, span, message);
    }

    pub fn report_with(
        &self,
        severity: Severity,
        kind: DiagnosticKind,
        span: Span,
        message: impl Into<String>,
    ) {
        self.push(Diagnostic {
            severity,
            kind,
            span,
            message: message.into(),
        });
    }

    pub fn has_fatal(&self) -> bool {
        self.count(Severity::Error) > 0
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries sorted by span, kind and message.
    pub fn snapshot(&self) -> Vec<Diagnostic> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        sort(&mut entries);
        entries
    }

    pub fn into_sorted(self) -> Vec<Diagnostic> {
        let mut entries = self
            .entries
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        sort(&mut entries);
        entries
    }
}

fn sort(entries: &mut [Diagnostic]) {
    entries.sort_by(|a, b| {
        (a.span, a.kind, &a.message, a.severity).cmp(&(b.span, b.kind, &b.message, b.severity))
    });
}
