//! Where discovery looks for libraries.

use std::env;
use std::path::{Path, PathBuf};

/// File name of the runtime support library next to the compiler.
pub const RUNTIME_FILE_NAME: &str = "lexico_runtime.wasm";

/// Name of the bundled library directory next to the compiler.
pub const LIBRARY_DIR_NAME: &str = "lib";

/// Locations scanned when a compiler is constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// The runtime support library. Loading it is mandatory.
    pub runtime: PathBuf,
    /// Explicit references, scanned after the runtime in this order.
    /// Every one must load.
    pub references: Vec<PathBuf>,
    /// Installation-relative library directory (best-effort).
    pub bundled_library_dir: Option<PathBuf>,
    /// Per-user library directory (best-effort).
    pub user_library_dir: Option<PathBuf>,
}

impl DiscoveryConfig {
    /// Runtime only, no library directories.
    pub fn new(runtime: impl Into<PathBuf>) -> Self {
        Self {
            runtime: runtime.into(),
            references: Vec::new(),
            bundled_library_dir: None,
            user_library_dir: None,
        }
    }

    pub fn with_reference(mut self, path: impl Into<PathBuf>) -> Self {
        self.references.push(path.into());
        self
    }

    pub fn with_bundled_library_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.bundled_library_dir = Some(dir.into());
        self
    }

    pub fn with_user_library_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.user_library_dir = Some(dir.into());
        self
    }

    /// Defaults for an installed compiler: the runtime and `lib/` next to
    /// the running executable, plus the per-user library directory.
    ///
    /// `LEXICO_RUNTIME` overrides the runtime path.
    pub fn for_installation() -> Self {
        let install_dir = env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));
        let runtime = env::var_os("LEXICO_RUNTIME")
            .map(PathBuf::from)
            .unwrap_or_else(|| install_dir.join(RUNTIME_FILE_NAME));

        Self {
            runtime,
            references: Vec::new(),
            bundled_library_dir: Some(install_dir.join(LIBRARY_DIR_NAME)),
            user_library_dir: user_library_dir(),
        }
    }
}

/// The per-user library directory.
///
/// `LEXICO_USER_LIB` wins; otherwise `%APPDATA%\lexico\lib` on Windows and
/// `$XDG_DATA_HOME/lexico/lib` (falling back to `~/.local/share`) elsewhere.
pub fn user_library_dir() -> Option<PathBuf> {
    if let Some(dir) = env::var_os("LEXICO_USER_LIB") {
        return Some(PathBuf::from(dir));
    }
    let data_dir = if cfg!(windows) {
        env::var_os("APPDATA").map(PathBuf::from)
    } else {
        env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".local/share")))
    };
    data_dir.map(|dir| dir.join("lexico").join(LIBRARY_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder() {
        let config = DiscoveryConfig::new("rt.wasm")
            .with_reference("a.wasm")
            .with_reference("b.wasm")
            .with_user_library_dir("/tmp/user");
        assert_eq!(config.runtime, PathBuf::from("rt.wasm"));
        assert_eq!(
            config.references,
            vec![PathBuf::from("a.wasm"), PathBuf::from("b.wasm")]
        );
        assert_eq!(config.bundled_library_dir, None);
        assert_eq!(config.user_library_dir, Some(PathBuf::from("/tmp/user")));
    }

    #[test]
    fn installation_layout() {
        let config = DiscoveryConfig::for_installation();
        let bundled = config.bundled_library_dir.unwrap();
        assert!(bundled.ends_with(LIBRARY_DIR_NAME));
        if env::var_os("LEXICO_RUNTIME").is_none() {
            assert_eq!(config.runtime.parent(), bundled.parent());
            assert!(config.runtime.ends_with(RUNTIME_FILE_NAME));
        }
    }
}
