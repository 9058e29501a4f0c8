//! Capability manifest embedded in host library binaries.
//!
//! A host library is a WebAssembly module carrying a custom section named
//! [`CAPABILITY_SECTION`] whose payload is a JSON [`LibraryManifest`].  The
//! manifest describes the library's types and their members together with
//! the facts the scanner filters on (visibility, static-ness, special names,
//! generic-ness, parameter and return shapes).  Nothing is inferred from the
//! module's code.
//!
//! Import field names default to `Type.Member` for methods and
//! `Type.get_Member` / `Type.set_Member` / `Type.add_Member` for property and
//! event accessors; each can be overridden per member.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use wasm_encoder::{CustomSection, Module};
use wasmparser::{Parser, Payload};

use crate::error::{LibraryResult, LoadFailure};

/// Custom section holding the JSON manifest.
pub const CAPABILITY_SECTION: &str = "lexico.capabilities";

/// Name by which manifests refer to the primitive value type.
pub const PRIMITIVE_TYPE: &str = "Primitive";

/// Name by which manifests refer to the single callback delegate shape
/// (`() -> ()`).
pub const CALLBACK_TYPE: &str = "Callback";

// ══════════════════════════════════════════════════════════════════════════════
// Type references
// ══════════════════════════════════════════════════════════════════════════════

/// A parameter, return, property or handler type named in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TypeRef {
    Void,
    Primitive,
    /// A `(ptr, len)` UTF-8 string in the caller's memory.
    Text,
    Number,
    Boolean,
    Callback,
    /// Any type the language cannot express.
    Other(String),
}

impl From<String> for TypeRef {
    fn from(name: String) -> Self {
        match name.as_str() {
            "void" => Self::Void,
            PRIMITIVE_TYPE => Self::Primitive,
            "text" => Self::Text,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            CALLBACK_TYPE => Self::Callback,
            _ => Self::Other(name),
        }
    }
}

impl From<TypeRef> for String {
    fn from(ty: TypeRef) -> Self {
        ty.to_string()
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => f.write_str("void"),
            Self::Primitive => f.write_str(PRIMITIVE_TYPE),
            Self::Text => f.write_str("text"),
            Self::Number => f.write_str("number"),
            Self::Boolean => f.write_str("boolean"),
            Self::Callback => f.write_str(CALLBACK_TYPE),
            Self::Other(name) => f.write_str(name),
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Manifest
// ══════════════════════════════════════════════════════════════════════════════

fn yes() -> bool {
    true
}

fn void() -> TypeRef {
    TypeRef::Void
}

/// Everything a library binary exposes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryManifest {
    /// Import module name. Defaults to the binary's file stem.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    /// Name of the type holding the primitive operations. Only meaningful
    /// for the runtime support library.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primitive: Option<String>,
    #[serde(default)]
    pub types: Vec<TypeManifest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeManifest {
    pub name: String,
    /// The library-type marker.
    #[serde(default)]
    pub library_type: bool,
    #[serde(default = "yes")]
    pub visible: bool,
    /// Hidden from editor completion.
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub methods: Vec<MethodManifest>,
    #[serde(default)]
    pub properties: Vec<PropertyManifest>,
    #[serde(default)]
    pub events: Vec<EventManifest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodManifest {
    pub name: String,
    #[serde(default)]
    pub params: Vec<TypeRef>,
    #[serde(default = "void")]
    pub returns: TypeRef,
    #[serde(default = "yes", rename = "static")]
    pub is_static: bool,
    #[serde(default = "yes")]
    pub public: bool,
    #[serde(default)]
    pub generic: bool,
    #[serde(default)]
    pub constructor: bool,
    #[serde(default)]
    pub special_name: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export: Option<String>,
}

impl MethodManifest {
    /// Import field name of this method on `type_name`.
    pub fn field(&self, type_name: &str) -> String {
        self.export
            .clone()
            .unwrap_or_else(|| format!("{type_name}.{}", self.name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyManifest {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(default = "yes", rename = "static")]
    pub is_static: bool,
    #[serde(default = "yes")]
    pub public: bool,
    #[serde(default)]
    pub special_name: bool,
    #[serde(default = "yes")]
    pub readable: bool,
    #[serde(default = "yes")]
    pub writable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub getter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setter: Option<String>,
}

impl PropertyManifest {
    pub fn getter_field(&self, type_name: &str) -> String {
        self.getter
            .clone()
            .unwrap_or_else(|| format!("{type_name}.get_{}", self.name))
    }

    pub fn setter_field(&self, type_name: &str) -> String {
        self.setter
            .clone()
            .unwrap_or_else(|| format!("{type_name}.set_{}", self.name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventManifest {
    pub name: String,
    pub handler: TypeRef,
    #[serde(default = "yes", rename = "static")]
    pub is_static: bool,
    #[serde(default = "yes")]
    pub public: bool,
    #[serde(default)]
    pub special_name: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<String>,
}

impl EventManifest {
    pub fn subscribe_field(&self, type_name: &str) -> String {
        self.subscribe
            .clone()
            .unwrap_or_else(|| format!("{type_name}.add_{}", self.name))
    }
}

impl LibraryManifest {
    /// Decode the manifest embedded in a library binary.
    ///
    /// The bytes must form a valid WebAssembly module. Returns `Ok(None)` for
    /// a valid module without a capability section.
    pub fn from_wasm(bytes: &[u8]) -> Result<Option<Self>, LoadFailure> {
        wasmparser::validate(bytes)?;
        for payload in Parser::new(0).parse_all(bytes) {
            if let Payload::CustomSection(reader) = payload? {
                if reader.name() == CAPABILITY_SECTION {
                    return Ok(Some(serde_json::from_slice(reader.data())?));
                }
            }
        }
        Ok(None)
    }

    /// Look up a type by exact name.
    pub fn find_type(&self, name: &str) -> Option<&TypeManifest> {
        self.types.iter().find(|t| t.name == name)
    }
}

/// Pack a manifest into a minimal library binary (a module whose only
/// content is the capability section).
pub fn encode_library(manifest: &LibraryManifest) -> LibraryResult<Vec<u8>> {
    let data = serde_json::to_vec(manifest)?;
    let mut module = Module::new();
    module.section(&CustomSection {
        name: Cow::Borrowed(CAPABILITY_SECTION),
        data: Cow::Owned(data),
    });
    Ok(module.finish())
}
