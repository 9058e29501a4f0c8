//! One-shot library discovery run at compiler construction.

use std::path::{Path, PathBuf};

use crate::config::DiscoveryConfig;
use crate::error::LibraryResult;
use crate::loader::{load_directory, load_references, load_runtime};
use crate::operators::OperatorBindings;
use crate::registry::CapabilityRegistry;
use crate::scanner::CapabilityScanner;

/// Everything discovery produced.
#[derive(Debug, Clone)]
pub struct DiscoveryReport {
    pub registry: CapabilityRegistry,
    pub operators: OperatorBindings,
    pub runtime_path: PathBuf,
    /// Explicit references, in the order given.
    pub references: Vec<PathBuf>,
    /// Library files found in the library directories that loaded
    /// successfully, in scan order. These are packaged next to build output.
    pub library_files: Vec<PathBuf>,
}

/// Load and scan every configured library, then bind the primitive
/// operations.
///
/// Fails if the runtime or any explicit reference does not load, or if an
/// operator binding is missing. Library directory problems never fail.
pub fn discover(config: &DiscoveryConfig) -> LibraryResult<DiscoveryReport> {
    let runtime = load_runtime(&config.runtime)?;
    let references = load_references(&config.references)?;

    let mut scanner = CapabilityScanner::new();
    scanner.scan_library(&runtime);
    for reference in &references {
        scanner.scan_library(reference);
    }

    let mut library_files = Vec::new();
    let dirs = [&config.bundled_library_dir, &config.user_library_dir];
    for dir in dirs.into_iter().flatten() {
        scan_directory(&mut scanner, dir, &mut library_files);
    }

    let operators = OperatorBindings::resolve(&runtime)?;
    let registry = scanner.finish();
    tracing::info!(
        types = registry.len(),
        libraries = library_files.len(),
        "capability registry ready"
    );

    Ok(DiscoveryReport {
        registry,
        operators,
        runtime_path: runtime.path,
        references: config.references.clone(),
        library_files,
    })
}

fn scan_directory(scanner: &mut CapabilityScanner, dir: &Path, files: &mut Vec<PathBuf>) {
    let libraries = load_directory(dir);
    tracing::debug!(dir = %dir.display(), count = libraries.len(), "scanning library directory");
    for library in libraries {
        scanner.scan_library(&library);
        files.push(library.path);
    }
}
