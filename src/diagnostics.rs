//! Unified diagnostic type threaded through every compiler stage.
//!
//! Every stage that can fail partially (§7 of the spec: anything that does
//! not prevent a deterministic output) returns its primary result alongside
//! `Vec<Diagnostic>` rather than a bare `Result`. Only failures that truly
//! abort a stage use [`StageError`].

use crate::source_store::SourcePath;
use std::fmt;

/// A [`crate::span::Span`] anchored to the file it came from. The lexer and
/// parser work with bare, path-less spans (a file doesn't know its own
/// path); a `Diagnostic` needs the path too, so it pairs one with a
/// `SourcePath` at the point a diagnostic is raised.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Span {
    pub path: SourcePath,
    pub range: crate::span::Span,
}

impl Span {
    pub fn new(path: SourcePath, range: crate::span::Span) -> Self {
        Self { path, range }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Hint,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Hint => "hint",
        })
    }
}

/// Stable, catalog-registered diagnostic code. Every distinct error condition
/// named in spec §7 gets exactly one variant here so downstream tooling can
/// match on codes rather than message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    IoError,
    UnterminatedBlock,
    UnclosedInterpolation,
    BadUtf8,
    ParseError,
    UnknownIdent,
    MissingImport,
    ReactiveCycle,
    HtmlOptOut,
    CacheCorrupt,
    StageTimeout,
    BundlerInconsistency,
}

impl DiagnosticCode {
    /// The stable string form, e.g. for serializing alongside `message`.
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::IoError => "E_IO",
            DiagnosticCode::UnterminatedBlock => "E_UNTERMINATED_BLOCK",
            DiagnosticCode::UnclosedInterpolation => "E_UNCLOSED_INTERPOLATION",
            DiagnosticCode::BadUtf8 => "E_BAD_UTF8",
            DiagnosticCode::ParseError => "E_PARSE",
            DiagnosticCode::UnknownIdent => "E_UNKNOWN_IDENT",
            DiagnosticCode::MissingImport => "E_MISSING_IMPORT",
            DiagnosticCode::ReactiveCycle => "E_REACTIVE_CYCLE",
            DiagnosticCode::HtmlOptOut => "H_RAW_HTML",
            DiagnosticCode::CacheCorrupt => "E_CACHE_CORRUPT",
            DiagnosticCode::StageTimeout => "E_STAGE_TIMEOUT",
            DiagnosticCode::BundlerInconsistency => "E_BUNDLER_INCONSISTENT",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,
    pub span: Option<Span>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            span: None,
            notes: Vec::new(),
        }
    }

    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
            span: None,
            notes: Vec::new(),
        }
    }

    pub fn hint(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Hint,
            code,
            message: message.into(),
            span: None,
            notes: Vec::new(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code.as_str(), self.message)?;
        if let Some(span) = &self.span {
            write!(
                f,
                "\n  --> {}:{}:{}",
                span.path.display(),
                span.range.line,
                span.range.col
            )?;
        }
        for note in &self.notes {
            write!(f, "\n   = note: {note}")?;
        }
        Ok(())
    }
}

/// Errors that abort a stage outright rather than recovering locally.
/// Stage callers convert these into a [`Diagnostic`] and retain the last
/// good output for the affected module (spec §7).
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: SourcePath,
        #[source]
        source: std::io::Error,
    },
    #[error("unterminated {block} block")]
    UnterminatedBlock { block: &'static str },
    #[error("unclosed interpolation starting at byte {byte_start}")]
    UnclosedInterpolation { byte_start: u32 },
    #[error("invalid utf-8 at byte {byte_offset}")]
    BadUtf8 { byte_offset: u32 },
    #[error("cache entry corrupt for key {key}")]
    CacheCorrupt { key: String },
}
