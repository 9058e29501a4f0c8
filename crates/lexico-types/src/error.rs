use crate::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of errors stored before further ones are only counted.
pub const MAX_ERRORS: usize = 20;

/// Error category, determined by error code range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Syntax,
    Library,
    Scope,
    Structure,
}

/// Numeric error code (E100–E499).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ErrorCode(pub u16);

impl ErrorCode {
    // ── Syntax errors (E100–E199) ──
    pub const MALFORMED_PROGRAM: Self = Self(100);
    pub const DUPLICATE_VARIABLE: Self = Self(101);

    // ── Library errors (E200–E299) ──
    pub const UNKNOWN_LIBRARY_TYPE: Self = Self(200);
    pub const UNKNOWN_MEMBER: Self = Self(201);
    pub const WRONG_ARG_COUNT: Self = Self(202);
    pub const NO_RETURN_VALUE: Self = Self(203);
    pub const PROPERTY_NOT_READABLE: Self = Self(204);
    pub const PROPERTY_NOT_WRITABLE: Self = Self(205);
    pub const EVENT_HANDLER_NOT_SUBROUTINE: Self = Self(206);

    // ── Scope errors (E300–E399) ──
    pub const UNDECLARED_VARIABLE: Self = Self(300);
    pub const UNDEFINED_LABEL: Self = Self(301);
    pub const UNDEFINED_SUBROUTINE: Self = Self(302);
    pub const DUPLICATE_LABEL: Self = Self(303);
    pub const DUPLICATE_SUBROUTINE: Self = Self(304);

    // ── Structure errors (E400–E499) ──
    pub const LABEL_NOT_AT_TOP_LEVEL: Self = Self(400);
    pub const NESTED_SUBROUTINE: Self = Self(401);
    pub const MISSING_INDEX: Self = Self(402);

    /// Get the category for this error code.
    pub fn category(self) -> ErrorCategory {
        match self.0 {
            100..=199 => ErrorCategory::Syntax,
            200..=299 => ErrorCategory::Library,
            300..=399 => ErrorCategory::Scope,
            400..=499 => ErrorCategory::Structure,
            _ => ErrorCategory::Syntax,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax => write!(f, "syntax"),
            Self::Library => write!(f, "library"),
            Self::Scope => write!(f, "scope"),
            Self::Structure => write!(f, "structure"),
        }
    }
}

/// A structured compile error produced by the front end or the analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileError {
    /// Source file name.
    pub file: String,
    pub code: ErrorCode,
    /// Derived from `code`.
    pub category: ErrorCategory,
    pub message: String,
    #[serde(flatten)]
    pub span: Span,
    /// The source line the error points at, for context.
    pub source_line: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl CompileError {
    pub fn new(
        file: impl Into<String>,
        code: ErrorCode,
        message: impl Into<String>,
        span: Span,
        source_line: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            code,
            category: code.category(),
            message: message.into(),
            span,
            source_line: source_line.into(),
            suggestion: None,
        }
    }

    /// Attach a fix suggestion.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {} [{}] {}",
            self.file, self.span, self.code, self.category, self.message
        )
    }
}

impl std::error::Error for CompileError {}

/// The ordered diagnostic list of one compilation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompileErrors {
    pub errors: Vec<CompileError>,
    pub total_errors: usize,
}

impl CompileErrors {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_errors(&self) -> bool {
        self.total_errors > 0
    }

    /// Add an error, respecting the [`MAX_ERRORS`] storage limit.
    pub fn push_error(&mut self, error: CompileError) {
        if self.errors.len() < MAX_ERRORS {
            self.errors.push(error);
        }
        self.total_errors += 1;
    }

    /// Reset to the empty list at the start of a compile.
    pub fn clear(&mut self) {
        *self = Self::empty();
    }
}
