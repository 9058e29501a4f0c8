//! Module metadata embedded in the `lexico` custom section.
//!
//! Describes the emitted container so a host can run and inspect the module
//! without a name-section parser: the entry export, slot names, the
//! subroutine table and the capabilities the module imports.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use wasmparser::{Parser, Payload};

use lexico_library::ImportRef;

use crate::types::METADATA_SECTION;

/// Metadata for one emitted module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleMetadata {
    pub compiler_version: String,
    /// Name of the container holding slots and the entry routine.
    pub container: String,
    /// Export name of the entry routine.
    pub entry: String,
    /// Slot (global) names in index order.
    pub slots: Vec<String>,
    pub subroutines: Vec<SubroutineEntry>,
    /// Capability imports in first-use order.
    pub capabilities: Vec<ImportRef>,
    /// Hex SHA-256 of the program source.
    pub source_sha256: String,
}

/// A subroutine: its function and `handlers` table index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubroutineEntry {
    pub name: String,
    pub function_index: u32,
    pub table_index: u32,
}

impl ModuleMetadata {
    pub fn find_subroutine(&self, name: &str) -> Option<&SubroutineEntry> {
        self.subroutines.iter().find(|s| s.name == name)
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_json(data: &[u8]) -> Option<Self> {
        serde_json::from_slice(data).ok()
    }

    /// Read the metadata section of an emitted module.
    pub fn from_wasm(bytes: &[u8]) -> Option<Self> {
        Parser::new(0).parse_all(bytes).find_map(|payload| match payload {
            Ok(Payload::CustomSection(reader)) if reader.name() == METADATA_SECTION => {
                Self::from_json(reader.data())
            }
            _ => None,
        })
    }
}

/// Hex SHA-256 digest of a source text.
pub fn source_digest(source: &str) -> String {
    let digest = Sha256::digest(source.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ModuleMetadata {
        ModuleMetadata {
            compiler_version: "0.1.0".into(),
            container: "_Program".into(),
            entry: "run".into(),
            slots: vec!["x".into(), "y".into()],
            subroutines: vec![SubroutineEntry {
                name: "OnKey".into(),
                function_index: 21,
                table_index: 0,
            }],
            capabilities: vec![ImportRef::new("textwindow", "TextWindow.WriteLine")],
            source_sha256: source_digest("x = 1"),
        }
    }

    #[test]
    fn json_round_trip() {
        let meta = sample();
        let json = meta.to_json().unwrap();
        assert_eq!(ModuleMetadata::from_json(&json), Some(meta));
    }

    #[test]
    fn find_subroutine() {
        let meta = sample();
        assert_eq!(meta.find_subroutine("OnKey").unwrap().function_index, 21);
        assert!(meta.find_subroutine("Missing").is_none());
    }

    #[test]
    fn digest_is_hex_sha256() {
        let digest = source_digest("");
        assert_eq!(
            digest,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
