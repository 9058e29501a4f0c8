//! Compilation pipeline: parse, analyze, emit, package.

use std::fs;
use std::path::{Path, PathBuf};

use lexico_codegen::{CodegenError, FileWriter, ModuleEmitter};
use lexico_library::{discover, CapabilityRegistry, DiscoveryConfig, DiscoveryReport, LibraryResult};
use lexico_types::ir::Program;
use lexico_types::{CompileErrors, SourceFile};

use crate::frontend::{FrontEnd, JsonFrontEnd};

/// Failure to produce output after a program compiled cleanly.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("module emission failed: {0}")]
    Codegen(#[from] CodegenError),
}

/// Compiles programs against one discovered set of libraries.
///
/// Discovery runs once, in [`ModuleCompiler::new`]; every later compile
/// reuses the registry and operator bindings.
#[derive(Debug)]
pub struct ModuleCompiler<F: FrontEnd = JsonFrontEnd> {
    report: DiscoveryReport,
    front_end: F,
    errors: CompileErrors,
}

impl ModuleCompiler<JsonFrontEnd> {
    /// Discover libraries and use the JSON front end.
    pub fn new(config: &DiscoveryConfig) -> LibraryResult<Self> {
        Self::with_front_end(config, JsonFrontEnd)
    }
}

impl<F: FrontEnd> ModuleCompiler<F> {
    pub fn with_front_end(config: &DiscoveryConfig, front_end: F) -> LibraryResult<Self> {
        Ok(Self {
            report: discover(config)?,
            front_end,
            errors: CompileErrors::empty(),
        })
    }

    /// Explicit references the compiler was configured with.
    pub fn references(&self) -> &[PathBuf] {
        &self.report.references
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.report.registry
    }

    pub fn report(&self) -> &DiscoveryReport {
        &self.report
    }

    /// Diagnostics of the most recent compile.
    pub fn errors(&self) -> &CompileErrors {
        &self.errors
    }

    /// Parse and analyze `source`. Writes nothing.
    pub fn compile(&mut self, source: &SourceFile) -> &CompileErrors {
        self.front(source);
        &self.errors
    }

    /// Compile `source` and, if it is clean, write `<output_name>.wasm` into
    /// `directory` followed by the runtime and discovered library files.
    ///
    /// Returns the diagnostics; when there are any, nothing was written.
    pub fn build(
        &mut self,
        source: &SourceFile,
        output_name: &str,
        directory: &Path,
    ) -> Result<CompileErrors, BuildError> {
        let program = match self.front(source) {
            Some(program) if !self.errors.has_errors() => program,
            _ => return Ok(self.errors.clone()),
        };

        let emitter = ModuleEmitter::new(&self.report.registry, &self.report.operators);
        let mut writer = FileWriter::new(directory);
        let module = emitter.emit(&program, &source.source, output_name, &mut writer)?;

        let copied = self.package(directory, &module);
        tracing::info!(
            dir = %directory.display(),
            support_files = copied.len(),
            "build complete"
        );
        Ok(self.errors.clone())
    }

    fn front(&mut self, source: &SourceFile) -> Option<Program> {
        self.errors.clear();
        let program = self.front_end.parse(source, &mut self.errors)?;
        self.front_end
            .analyze(&program, &self.report.registry, source, &mut self.errors);
        Some(program)
    }

    /// Copy the runtime, then every discovered library file, into
    /// `directory`. Failures are logged and skipped, and nothing is copied
    /// over the emitted `module`.
    fn package(&self, directory: &Path, module: &Path) -> Vec<PathBuf> {
        let mut copied = Vec::new();
        let files = std::iter::once(&self.report.runtime_path).chain(&self.report.library_files);
        for file in files {
            let Some(name) = file.file_name() else {
                continue;
            };
            let dest = directory.join(name);
            if dest == module || same_file(module, &dest) {
                tracing::warn!(
                    file = %file.display(),
                    module = %module.display(),
                    "support file would overwrite the emitted module; skipped"
                );
                continue;
            }
            if same_file(file, &dest) {
                tracing::debug!(file = %file.display(), "already in output directory");
                continue;
            }
            match fs::copy(file, &dest) {
                Ok(_) => copied.push(dest),
                Err(err) => {
                    tracing::warn!(file = %file.display(), error = %err, "could not copy support file");
                }
            }
        }
        copied
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
