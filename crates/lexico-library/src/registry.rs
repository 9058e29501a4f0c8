//! The capability registry: every library member callable from a program.
//!
//! Type and member keys are lowercase; descriptors keep the original casing
//! for diagnostics and for the import names the emitter produces.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Lowercase lookup key for type and member names.
pub fn key(name: &str) -> String {
    name.to_lowercase()
}

/// Mapping from lowercase type name to its callable surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CapabilityRegistry {
    types: BTreeMap<String, TypeDescriptor>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor under its lowercase name, replacing any earlier
    /// descriptor of the same name. Returns the replaced descriptor.
    pub fn insert(&mut self, descriptor: TypeDescriptor) -> Option<TypeDescriptor> {
        self.types.insert(key(&descriptor.name), descriptor)
    }

    /// Case-insensitive type lookup.
    pub fn get(&self, type_name: &str) -> Option<&TypeDescriptor> {
        self.types.get(&key(type_name))
    }

    pub fn method(&self, type_name: &str, method: &str) -> Option<&MethodDescriptor> {
        self.get(type_name)?.methods.get(&key(method))
    }

    pub fn property(&self, type_name: &str, property: &str) -> Option<&PropertyDescriptor> {
        self.get(type_name)?.properties.get(&key(property))
    }

    pub fn event(&self, type_name: &str, event: &str) -> Option<&EventDescriptor> {
        self.get(type_name)?.events.get(&key(event))
    }

    /// Registered types in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypeDescriptor)> {
        self.types.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// The callable surface of one library type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeDescriptor {
    /// Type name in its original casing.
    pub name: String,
    pub hidden: bool,
    pub methods: BTreeMap<String, MethodDescriptor>,
    pub properties: BTreeMap<String, PropertyDescriptor>,
    pub events: BTreeMap<String, EventDescriptor>,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>, hidden: bool) -> Self {
        Self {
            name: name.into(),
            hidden,
            methods: BTreeMap::new(),
            properties: BTreeMap::new(),
            events: BTreeMap::new(),
        }
    }

    /// A type with no eligible member is never registered.
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty() && self.properties.is_empty() && self.events.is_empty()
    }
}

/// Where a member is imported from in the emitted module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImportRef {
    pub module: String,
    pub field: String,
}

impl ImportRef {
    pub fn new(module: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            field: field.into(),
        }
    }
}

/// A static method taking only primitives and returning a primitive or
/// nothing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodDescriptor {
    pub type_name: String,
    pub name: String,
    pub import: ImportRef,
    pub param_count: usize,
    pub returns_value: bool,
}

/// A static primitive-typed property. `None` accessors mean the property
/// cannot be read or written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyDescriptor {
    pub type_name: String,
    pub name: String,
    pub getter: Option<ImportRef>,
    pub setter: Option<ImportRef>,
}

/// A static event whose handler has the callback shape. Subscribing passes
/// the handler's function-table index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventDescriptor {
    pub type_name: String,
    pub name: String,
    pub subscribe: ImportRef,
}
