//! Capability scanning: filter each library's types down to the surface the
//! language can call.
//!
//! Eligibility rules:
//! - a type needs the library-type marker and must be visible;
//! - only public static members are considered;
//! - methods: not generic, not a constructor, no special name, returning
//!   nothing or a primitive, taking only primitives;
//! - properties: no special name, primitive-typed;
//! - events: no special name, callback-typed handler.
//!
//! Within one type the first member of a given lowercase name wins for
//! methods, properties and events alike. Across libraries the last type of a
//! given lowercase name wins.

use crate::loader::LoadedLibrary;
use crate::manifest::{EventManifest, MethodManifest, PropertyManifest, TypeManifest, TypeRef};
use crate::registry::{
    key, CapabilityRegistry, EventDescriptor, ImportRef, MethodDescriptor, PropertyDescriptor,
    TypeDescriptor,
};

/// Accumulates library types into a [`CapabilityRegistry`].
#[derive(Debug, Default)]
pub struct CapabilityScanner {
    registry: CapabilityRegistry,
}

impl CapabilityScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan every type of a loaded library. Returns whether the library
    /// contained at least one marked, visible type (registered or not).
    pub fn scan_library(&mut self, library: &LoadedLibrary) -> bool {
        let mut found = false;
        for ty in &library.manifest.types {
            if ty.library_type && ty.visible {
                self.add_type(&library.module, ty);
                found = true;
            }
        }
        found
    }

    fn add_type(&mut self, module: &str, ty: &TypeManifest) {
        let mut descriptor = TypeDescriptor::new(&ty.name, ty.hidden);

        for method in ty.methods.iter().filter(|m| can_add_method(m)) {
            let name = key(&method.name);
            if descriptor.methods.contains_key(&name) {
                continue;
            }
            descriptor.methods.insert(
                name,
                MethodDescriptor {
                    type_name: ty.name.clone(),
                    name: method.name.clone(),
                    import: ImportRef::new(module, method.field(&ty.name)),
                    param_count: method.params.len(),
                    returns_value: method.returns == TypeRef::Primitive,
                },
            );
        }

        for property in ty.properties.iter().filter(|p| can_add_property(p)) {
            let name = key(&property.name);
            if descriptor.properties.contains_key(&name) {
                tracing::warn!(
                    type_name = %ty.name,
                    property = %property.name,
                    "duplicate property name, keeping the first"
                );
                continue;
            }
            descriptor.properties.insert(
                name,
                PropertyDescriptor {
                    type_name: ty.name.clone(),
                    name: property.name.clone(),
                    getter: property
                        .readable
                        .then(|| ImportRef::new(module, property.getter_field(&ty.name))),
                    setter: property
                        .writable
                        .then(|| ImportRef::new(module, property.setter_field(&ty.name))),
                },
            );
        }

        for event in ty.events.iter().filter(|e| can_add_event(e)) {
            let name = key(&event.name);
            if descriptor.events.contains_key(&name) {
                tracing::warn!(
                    type_name = %ty.name,
                    event = %event.name,
                    "duplicate event name, keeping the first"
                );
                continue;
            }
            descriptor.events.insert(
                name,
                EventDescriptor {
                    type_name: ty.name.clone(),
                    name: event.name.clone(),
                    subscribe: ImportRef::new(module, event.subscribe_field(&ty.name)),
                },
            );
        }

        if descriptor.is_empty() {
            tracing::debug!(type_name = %ty.name, "no callable members, not registered");
            return;
        }
        if self.registry.insert(descriptor).is_some() {
            tracing::debug!(type_name = %ty.name, module, "replaced earlier type of the same name");
        }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn finish(self) -> CapabilityRegistry {
        self.registry
    }
}

pub fn can_add_method(method: &MethodManifest) -> bool {
    if !method.is_static || !method.public {
        return false;
    }
    if method.generic || method.constructor || method.special_name {
        return false;
    }
    if !matches!(method.returns, TypeRef::Void | TypeRef::Primitive) {
        return false;
    }
    method.params.iter().all(|p| *p == TypeRef::Primitive)
}

pub fn can_add_property(property: &PropertyManifest) -> bool {
    property.is_static
        && property.public
        && !property.special_name
        && property.ty == TypeRef::Primitive
}

pub fn can_add_event(event: &EventManifest) -> bool {
    event.is_static && event.public && !event.special_name && event.handler == TypeRef::Callback
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::manifest::LibraryManifest;

    fn library(json: &str) -> LoadedLibrary {
        LoadedLibrary {
            path: PathBuf::from("lib/test.wasm"),
            module: "test".to_string(),
            manifest: serde_json::from_str(json).unwrap(),
        }
    }

    fn method(json: &str) -> MethodManifest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn method_eligibility() {
        assert!(can_add_method(&method(r#"{"name":"A","params":["Primitive","Primitive"],"returns":"Primitive"}"#)));
        assert!(can_add_method(&method(r#"{"name":"A"}"#)));
        assert!(!can_add_method(&method(r#"{"name":"A","generic":true}"#)));
        assert!(!can_add_method(&method(r#"{"name":"A","constructor":true}"#)));
        assert!(!can_add_method(&method(r#"{"name":"get_A","special_name":true}"#)));
        assert!(!can_add_method(&method(r#"{"name":"A","returns":"number"}"#)));
        assert!(!can_add_method(&method(r#"{"name":"A","params":["Primitive","text"]}"#)));
        assert!(!can_add_method(&method(r#"{"name":"A","static":false}"#)));
        assert!(!can_add_method(&method(r#"{"name":"A","public":false}"#)));
    }

    #[test]
    fn property_and_event_eligibility() {
        let prop: PropertyManifest = serde_json::from_str(r#"{"name":"P","type":"Primitive"}"#).unwrap();
        assert!(can_add_property(&prop));
        let prop: PropertyManifest = serde_json::from_str(r#"{"name":"P","type":"number"}"#).unwrap();
        assert!(!can_add_property(&prop));
        let prop: PropertyManifest =
            serde_json::from_str(r#"{"name":"P","type":"Primitive","special_name":true}"#).unwrap();
        assert!(!can_add_property(&prop));

        let event: EventManifest = serde_json::from_str(r#"{"name":"E","handler":"Callback"}"#).unwrap();
        assert!(can_add_event(&event));
        let event: EventManifest =
            serde_json::from_str(r#"{"name":"E","handler":"EventHandler"}"#).unwrap();
        assert!(!can_add_event(&event));
    }

    #[test]
    fn keys_are_lowercase_and_casing_is_kept() {
        let mut scanner = CapabilityScanner::new();
        scanner.scan_library(&library(
            r#"{"types":[{"name":"TextWindow","library_type":true,
                "methods":[{"name":"WriteLine","params":["Primitive"]}],
                "properties":[{"name":"ForegroundColor","type":"Primitive"}],
                "events":[{"name":"KeyDown","handler":"Callback"}]}]}"#,
        ));
        let registry = scanner.finish();
        let (type_key, ty) = registry.iter().next().unwrap();
        assert_eq!(type_key, "textwindow");
        assert_eq!(ty.name, "TextWindow");
        assert_eq!(ty.methods.keys().collect::<Vec<_>>(), vec!["writeline"]);
        assert_eq!(ty.properties.keys().collect::<Vec<_>>(), vec!["foregroundcolor"]);
        assert_eq!(ty.events.keys().collect::<Vec<_>>(), vec!["keydown"]);

        let write_line = &ty.methods["writeline"];
        assert_eq!(write_line.name, "WriteLine");
        assert_eq!(write_line.import, ImportRef::new("test", "TextWindow.WriteLine"));
        assert_eq!(write_line.param_count, 1);
        assert!(!write_line.returns_value);
    }

    #[test]
    fn unmarked_or_invisible_types_are_ignored() {
        let mut scanner = CapabilityScanner::new();
        let found = scanner.scan_library(&library(
            r#"{"types":[
                {"name":"Helper","methods":[{"name":"Run"}]},
                {"name":"Internal","library_type":true,"visible":false,"methods":[{"name":"Run"}]}
            ]}"#,
        ));
        assert!(!found);
        assert!(scanner.registry().is_empty());
    }

    #[test]
    fn type_with_only_ineligible_members_is_dropped() {
        let mut scanner = CapabilityScanner::new();
        let found = scanner.scan_library(&library(
            r#"{"types":[{"name":"Shapes","library_type":true,
                "methods":[
                    {"name":"get_Count","special_name":true,"returns":"Primitive"},
                    {"name":"op_Addition","special_name":true,"params":["Primitive","Primitive"],"returns":"Primitive"},
                    {"name":"Measure","params":["number"],"returns":"Primitive"}
                ],
                "properties":[{"name":"Count","type":"number"}],
                "events":[{"name":"Changed","handler":"EventHandler"}]}]}"#,
        ));
        assert!(found);
        assert!(scanner.registry().get("shapes").is_none());
    }

    #[test]
    fn first_method_of_a_name_wins() {
        let mut scanner = CapabilityScanner::new();
        scanner.scan_library(&library(
            r#"{"types":[{"name":"Math","library_type":true,"methods":[
                {"name":"Max","params":["Primitive","Primitive"],"returns":"Primitive","export":"first"},
                {"name":"MAX","params":["Primitive"],"returns":"Primitive","export":"second"}
            ]}]}"#,
        ));
        let max = scanner.registry().method("math", "max").unwrap();
        assert_eq!(max.import.field, "first");
        assert_eq!(max.param_count, 2);
    }

    #[test]
    fn first_property_and_event_of_a_name_win() {
        let mut scanner = CapabilityScanner::new();
        scanner.scan_library(&library(
            r#"{"types":[{"name":"Timer","library_type":true,
                "properties":[
                    {"name":"Interval","type":"Primitive","getter":"first"},
                    {"name":"interval","type":"Primitive","getter":"second"}
                ],
                "events":[
                    {"name":"Tick","handler":"Callback","subscribe":"first"},
                    {"name":"TICK","handler":"Callback","subscribe":"second"}
                ]}]}"#,
        ));
        let registry = scanner.registry();
        let interval = registry.property("timer", "interval").unwrap();
        assert_eq!(interval.getter.as_ref().unwrap().field, "first");
        assert_eq!(registry.event("timer", "tick").unwrap().subscribe.field, "first");
    }

    #[test]
    fn read_only_property_has_no_setter() {
        let mut scanner = CapabilityScanner::new();
        scanner.scan_library(&library(
            r#"{"types":[{"name":"Clock","library_type":true,
                "properties":[{"name":"Time","type":"Primitive","writable":false}]}]}"#,
        ));
        let time = scanner.registry().property("Clock", "Time").unwrap();
        assert!(time.getter.is_some());
        assert!(time.setter.is_none());
    }

    #[test]
    fn later_library_overwrites_type_of_same_name() {
        let mut scanner = CapabilityScanner::new();
        scanner.scan_library(&library(
            r#"{"types":[{"name":"Sound","library_type":true,"methods":[{"name":"Play"}]}]}"#,
        ));
        let mut second = library(
            r#"{"types":[{"name":"SOUND","library_type":true,"methods":[{"name":"Beep"}]}]}"#,
        );
        second.module = "other".into();
        scanner.scan_library(&second);

        let registry = scanner.finish();
        assert_eq!(registry.len(), 1);
        let sound = registry.get("sound").unwrap();
        assert_eq!(sound.name, "SOUND");
        assert!(sound.methods.contains_key("beep"));
        assert!(!sound.methods.contains_key("play"));
    }

    #[test]
    fn hidden_flag_is_carried() {
        let mut scanner = CapabilityScanner::new();
        scanner.scan_library(&library(
            r#"{"types":[{"name":"Debug","library_type":true,"hidden":true,"methods":[{"name":"Break"}]}]}"#,
        ));
        assert!(scanner.registry().get("debug").unwrap().hidden);
    }

    #[test]
    fn empty_manifest_registers_nothing() {
        let mut scanner = CapabilityScanner::new();
        let lib = LoadedLibrary {
            path: PathBuf::from("empty.wasm"),
            module: "empty".into(),
            manifest: LibraryManifest::default(),
        };
        assert!(!scanner.scan_library(&lib));
        assert!(scanner.finish().is_empty());
    }
}
