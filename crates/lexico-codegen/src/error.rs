//! Codegen error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while emitting a module.
///
/// A program that passed analysis never produces these; they guard the
/// emitter against trees that did not.
#[derive(Debug, Error)]
pub enum CodegenError {
    /// A variable, subroutine, label or capability member could not be
    /// resolved.
    #[error("unresolved symbol: {0}")]
    UnresolvedSymbol(String),

    /// A construct that cannot be lowered where it appears.
    #[error("unsupported construct: {0}")]
    Unsupported(String),

    /// The assembled module failed validation.
    #[error("WASM validation failed: {0}")]
    ValidationFailed(String),

    /// Too many slots, imports or data bytes for a WASM module.
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// The module metadata could not be serialized.
    #[error("failed to encode module metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    /// The module could not be persisted.
    #[error("failed to write '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Codegen result type alias.
pub type CodegenResult<T> = Result<T, CodegenError>;
