//! Diagnostics reported while building metadata.
//!
//! Builds never abort on semantic problems. They report to a sink and keep
//! going, producing best-effort metadata.

use annolith_types::DeclId;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// A message reported against a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub declaration: DeclId,
    pub severity: Severity,
    pub message: String,
}

/// Receiver for errors and warnings raised during a build.
pub trait DiagnosticSink {
    fn add_error(&mut self, declaration: DeclId, message: String);

    fn add_warning(&mut self, declaration: DeclId, message: String);
}

/// A sink that keeps every diagnostic for later inspection.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
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

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    /// Diagnostics reported against one declaration.
    pub fn for_declaration(&self, declaration: DeclId) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(move |d| d.declaration == declaration)
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

impl DiagnosticSink for Diagnostics {
    fn add_error(&mut self, declaration: DeclId, message: String) {
        self.entries.push(Diagnostic {
            declaration,
            severity: Severity::Error,
            message,
        });
    }

    fn add_warning(&mut self, declaration: DeclId, message: String) {
        self.entries.push(Diagnostic {
            declaration,
            severity: Severity::Warning,
            message,
        });
    }
}

/// A sink that forwards diagnostics to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn add_error(&mut self, declaration: DeclId, message: String) {
        log::error!("{}: {}", declaration, message);
    }

    fn add_warning(&mut self, declaration: DeclId, message: String) {
        log::warn!("{}: {}", declaration, message);
    }
}
