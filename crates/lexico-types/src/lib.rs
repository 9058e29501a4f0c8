//! Shared types for the Lexico compiler backend.
//!
//! This crate defines the statement IR a front end hands to the backend,
//! source spans, and the structured diagnostics collected during a compile.

mod error;
mod span;
pub mod ir;

pub use error::{CompileError, CompileErrors, ErrorCategory, ErrorCode, MAX_ERRORS};
pub use span::{SourceFile, Span};
