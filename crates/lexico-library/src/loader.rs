//! Loading library binaries from disk.
//!
//! Explicit references are all-or-nothing: the first one that fails aborts
//! initialization. Library directories are best-effort: unreadable or
//! malformed files are skipped and never reported.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{LibraryError, LibraryResult, LoadFailure};
use crate::manifest::LibraryManifest;

/// File extension of library binaries found in library directories.
pub const LIBRARY_EXTENSION: &str = "wasm";

/// A library binary that loaded successfully.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedLibrary {
    pub path: PathBuf,
    /// Import module name for every member of this library.
    pub module: String,
    pub manifest: LibraryManifest,
}

/// Load one library binary.
pub fn load_library(path: &Path) -> Result<LoadedLibrary, LoadFailure> {
    let bytes = fs::read(path)?;
    let manifest = LibraryManifest::from_wasm(&bytes)?.unwrap_or_default();
    let module = manifest.module.clone().unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    });
    Ok(LoadedLibrary {
        path: path.to_path_buf(),
        module,
        manifest,
    })
}

/// Load the runtime support library.
pub fn load_runtime(path: &Path) -> LibraryResult<LoadedLibrary> {
    load_library(path).map_err(|source| LibraryError::RuntimeLoad {
        path: path.to_path_buf(),
        source,
    })
}

/// Load every explicit reference in order. Fails on the first reference
/// that does not load.
pub fn load_references(paths: &[PathBuf]) -> LibraryResult<Vec<LoadedLibrary>> {
    paths
        .iter()
        .map(|path| {
            load_library(path).map_err(|source| LibraryError::ReferenceLoad {
                path: path.clone(),
                source,
            })
        })
        .collect()
}

/// Load every library binary in `dir`, in file-name order, skipping the
/// ones that fail. A missing directory yields nothing.
pub fn load_directory(dir: &Path) -> Vec<LoadedLibrary> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(LIBRARY_EXTENSION))
        })
        .collect();
    files.sort();

    files
        .into_iter()
        .filter_map(|path| match load_library(&path) {
            Ok(library) => Some(library),
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "skipping library");
                None
            }
        })
        .collect()
}
