//! Error handling for Carbide
//!
//! Two channels: `Error` is for failures that stop the pipeline (lexing,
//! parsing, module loading), `Diagnostic` is the non-fatal record the
//! semantic analyzer accumulates while it keeps walking.

use crate::utils::Span;
use serde::Serialize;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Structural compiler error
#[derive(Error, Debug, Clone)]
pub enum Error {
    // ==================== Lexer Errors ====================
    #[error("Unterminated string literal")]
    UnterminatedString { span: Span },

    #[error("Unterminated interpolation in string literal")]
    UnterminatedInterpolation { span: Span },

    // ==================== Parser Errors ====================
    #[error("Unexpected token: expected {expected}, got {got}")]
    UnexpectedToken {
        expected: String,
        got: String,
        span: Span,
    },

    #[error("Expected identifier")]
    ExpectedIdent { span: Span },

    #[error("Expected type")]
    ExpectedType { span: Span },

    #[error("Expected expression")]
    ExpectedExpr { span: Span },

    #[error("Expected pattern")]
    ExpectedPattern { span: Span },

    // ==================== Module Loading Errors ====================
    #[error("Module not found: {spec} (imported from {importer})")]
    ModuleNotFound { spec: String, importer: String },

    #[error("Circular module dependency detected: {chain}")]
    CyclicImport { chain: String },

    #[error("Module '{module}' has no export named '{name}'")]
    ExportNotFound { name: String, module: String },

    #[error("IO error reading {path}: {message}")]
    Io { path: String, message: String },
}

impl Error {
    /// Get the span associated with this error
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::UnterminatedString { span } => Some(*span),
            Self::UnterminatedInterpolation { span } => Some(*span),
            Self::UnexpectedToken { span, .. } => Some(*span),
            Self::ExpectedIdent { span } => Some(*span),
            Self::ExpectedType { span } => Some(*span),
            Self::ExpectedExpr { span } => Some(*span),
            Self::ExpectedPattern { span } => Some(*span),
            Self::ModuleNotFound { .. }
            | Self::CyclicImport { .. }
            | Self::ExportNotFound { .. }
            | Self::Io { .. } => None,
        }
    }
}

/// A recorded semantic problem with its source location. Non-fatal:
/// the analyzer records it and keeps walking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub message: String,
    pub line: u32,
    pub col: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Diagnostic {
    /// Create a diagnostic at the given span
    pub fn new(message: impl Into<String>, span: Span, file: Option<String>) -> Self {
        Self {
            message: message.into(),
            line: span.line,
            col: span.col,
            file,
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}:{}:{}: {}", file, self.line, self.col, self.message),
            None => write!(f, "{}:{}: {}", self.line, self.col, self.message),
        }
    }
}
