//! Lexico module emitter: lowers an analyzed program to a `.wasm` module.
//!
//! # Architecture
//!
//! [`ModuleEmitter`] takes a [`lexico_types::ir::Program`] that already
//! passed analysis, the [`lexico_library::CapabilityRegistry`] and the
//! [`lexico_library::OperatorBindings`], and produces a self-contained
//! module that runs against the host runtime:
//!
//! ## Imports
//! - the 18 primitive operations from the runtime support library, in their
//!   fixed order;
//! - every capability member the program uses, in first-use order.
//!
//! ## Exports
//! - `run()`: the entry routine (the lowered program body)
//! - `memory`: linear memory holding text literals
//! - `handlers`: funcref table of subroutines, indexed as passed to event
//!   subscriptions
//!
//! ## Storage
//!
//! One private mutable `i32` global per program variable, in symbol-table
//! order, initialized to the empty primitive. See [`types`] for the value
//! representation.

pub mod context;
pub mod emitter;
pub mod error;
pub mod expr;
pub mod lower;
pub mod metadata;
pub mod stmt;
pub mod types;

pub use context::EmissionContext;
pub use emitter::{FileWriter, MemoryWriter, ModuleEmitter, ModuleWriter};
pub use error::{CodegenError, CodegenResult};
pub use lower::Lower;
pub use metadata::{ModuleMetadata, SubroutineEntry};

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::PathBuf;

    use lexico_library::{primitive_type_manifest, LibraryManifest, LoadedLibrary, OperatorBindings};

    /// Bindings against a runtime exposing the stock primitive type.
    pub fn operators() -> OperatorBindings {
        let runtime = LoadedLibrary {
            path: PathBuf::from("lexico_runtime.wasm"),
            module: "lexico_runtime".to_string(),
            manifest: LibraryManifest {
                module: None,
                primitive: None,
                types: vec![primitive_type_manifest()],
            },
        };
        OperatorBindings::resolve(&runtime).unwrap()
    }
}
