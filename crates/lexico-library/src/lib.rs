//! Host library discovery for the Lexico compiler.
//!
//! Host libraries are WebAssembly binaries that describe their callable
//! surface in an embedded JSON manifest. Discovery loads the runtime support
//! library, explicit references and the library directories, filters each
//! library down to what a program may call ([`CapabilityScanner`]) and binds
//! the primitive operations the emitter needs ([`OperatorBindings`]).
//!
//! # Example
//!
//! ```no_run
//! use lexico_library::{discover, DiscoveryConfig};
//!
//! let report = discover(&DiscoveryConfig::for_installation())?;
//! if let Some(method) = report.registry.method("TextWindow", "WriteLine") {
//!     println!("{} imports {}", method.name, method.import.field);
//! }
//! # Ok::<(), lexico_library::LibraryError>(())
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod loader;
pub mod manifest;
pub mod operators;
pub mod registry;
pub mod scanner;

pub use config::DiscoveryConfig;
pub use discovery::{discover, DiscoveryReport};
pub use error::{LibraryError, LibraryResult, LoadFailure};
pub use loader::LoadedLibrary;
pub use manifest::{encode_library, LibraryManifest, TypeRef};
pub use operators::{primitive_type_manifest, OperationHandle, OperatorBindings};
pub use registry::{
    CapabilityRegistry, EventDescriptor, ImportRef, MethodDescriptor, PropertyDescriptor,
    TypeDescriptor,
};
pub use scanner::CapabilityScanner;
