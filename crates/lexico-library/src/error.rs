//! Discovery error types.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal initialization failures. None of these are diagnostics: they abort
/// compiler construction before any program is looked at.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// An explicitly requested reference could not be loaded.
    #[error("failed to load reference '{}': {source}", path.display())]
    ReferenceLoad {
        path: PathBuf,
        #[source]
        source: LoadFailure,
    },

    /// The runtime support library could not be loaded.
    #[error("failed to load runtime support library '{}': {source}", path.display())]
    RuntimeLoad {
        path: PathBuf,
        #[source]
        source: LoadFailure,
    },

    /// The runtime support library does not describe the primitive type.
    #[error("runtime support library does not define the primitive type '{0}'")]
    MissingPrimitiveType(String),

    /// A required primitive operation is absent from the runtime manifest.
    #[error("primitive operation '{0}' not found in runtime support library")]
    MissingOperation(String),

    /// A manifest could not be serialized into a library binary.
    #[error("failed to encode library manifest: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Why a single library binary failed to load.
#[derive(Debug, Error)]
pub enum LoadFailure {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a valid WebAssembly module: {0}")]
    InvalidModule(#[from] wasmparser::BinaryReaderError),

    #[error("malformed capability manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// Discovery result type alias.
pub type LibraryResult<T> = Result<T, LibraryError>;
