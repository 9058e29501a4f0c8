//! Lexico compiler: orchestrates the compilation pipeline.
//!
//! ```text
//! source → FrontEnd::parse → FrontEnd::analyze → ModuleEmitter → .wasm (+ runtime, libraries)
//! ```
//!
//! [`ModuleCompiler`] discovers host libraries once and then compiles any
//! number of programs against them. The bundled [`JsonFrontEnd`] reads the
//! JSON form of the statement IR and checks it with the [`Analyzer`].

pub mod checker;
pub mod env;
pub mod frontend;
pub mod pipeline;

pub use checker::Analyzer;
pub use frontend::{FrontEnd, JsonFrontEnd};
pub use pipeline::{BuildError, ModuleCompiler};
