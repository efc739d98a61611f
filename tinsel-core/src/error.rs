use thiserror::Error;

use crate::diagnostic::{Diagnostic, Diagnostics};
use crate::span::Span;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("lex error at line {line}, column {column}: {message}")]
    Lex {
        line: u32,
        column: u32,
        message: String,
    },
    #[error("syntax error at line {line}, column {column}: {message}")]
    Syntax {
        line: u32,
        column: u32,
        message: String,
    },
    #[error("{0}")]
    Semantic(Diagnostics),
    /// An upstream stage handed a later stage something it should have
    /// rejected. Always a compiler defect, never a user mistake.
    #[error("internal compiler error: {0}")]
    Internal(String),
}

impl CompileError {
    pub fn lex(span: Span, message: impl Into<String>) -> Self {
        CompileError::Lex {
            line: span.line,
            column: span.column,
            message: message.into(),
        }
    }

    pub fn syntax(span: Span, message: impl Into<String>) -> Self {
        CompileError::Syntax {
            line: span.line,
            column: span.column,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CompileError::Internal(message.into())
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, CompileError::Internal(_))
    }

    /// Flatten into the ordered list of positioned diagnostics.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        match self {
            CompileError::Lex {
                line,
                column,
                message,
            }
            | CompileError::Syntax {
                line,
                column,
                message,
            } => vec![Diagnostic::error(message.clone(), Span::new(*line, *column))],
            CompileError::Semantic(diags) => diags.0.clone(),
            CompileError::Internal(message) => vec![Diagnostic::error(
                format!("internal compiler error: {message}"),
                Span::new(1, 1),
            )],
        }
    }
}

impl From<Vec<Diagnostic>> for CompileError {
    fn from(list: Vec<Diagnostic>) -> Self {
        CompileError::Semantic(Diagnostics(list))
    }
}
