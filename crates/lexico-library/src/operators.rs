//! Primitive operator bindings.
//!
//! The emitter needs a fixed set of operations on the primitive type. They
//! are looked up once in the runtime support library by name, parameter
//! list and return type. Every binding must resolve; a missing operation or
//! a signature mismatch fails initialization.

use serde::Serialize;

use crate::error::{LibraryError, LibraryResult};
use crate::loader::LoadedLibrary;
use crate::manifest::{MethodManifest, TypeManifest, TypeRef, PRIMITIVE_TYPE};
use crate::registry::ImportRef;

/// Number of operator bindings.
pub const OPERATION_COUNT: usize = 18;

/// A resolved primitive operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationHandle {
    /// Operation name as declared by the runtime (e.g. `op_Addition`).
    pub name: String,
    pub import: ImportRef,
    pub params: Vec<TypeRef>,
    pub returns: TypeRef,
}

/// Handles to the primitive type's operations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperatorBindings {
    pub string_to_primitive: OperationHandle,
    pub number_to_primitive: OperationHandle,
    pub primitive_to_boolean: OperationHandle,
    pub negation: OperationHandle,
    pub add: OperationHandle,
    pub subtract: OperationHandle,
    pub multiply: OperationHandle,
    pub divide: OperationHandle,
    pub greater_than: OperationHandle,
    pub greater_than_or_equal_to: OperationHandle,
    pub less_than: OperationHandle,
    pub less_than_or_equal_to: OperationHandle,
    pub equal_to: OperationHandle,
    pub not_equal_to: OperationHandle,
    pub and: OperationHandle,
    pub or: OperationHandle,
    pub get_array_value: OperationHandle,
    pub set_array_value: OperationHandle,
}

impl OperatorBindings {
    /// Resolve every binding against the runtime support library.
    pub fn resolve(runtime: &LoadedLibrary) -> LibraryResult<Self> {
        let type_name = runtime
            .manifest
            .primitive
            .as_deref()
            .unwrap_or(PRIMITIVE_TYPE);
        let ty = runtime
            .manifest
            .find_type(type_name)
            .ok_or_else(|| LibraryError::MissingPrimitiveType(type_name.to_string()))?;
        let resolver = Resolver {
            module: &runtime.module,
            ty,
        };
        use TypeRef::{Boolean, Number, Primitive, Text};
        let unary = [Primitive];
        let pair = [Primitive, Primitive];
        let binary = |name: &str| resolver.find(name, &pair, &Primitive);

        Ok(Self {
            string_to_primitive: resolver.find("op_Implicit", &[Text], &Primitive)?,
            number_to_primitive: resolver.find("op_Implicit", &[Number], &Primitive)?,
            primitive_to_boolean: resolver.find("ConvertToBoolean", &unary, &Boolean)?,
            negation: resolver.find("op_UnaryNegation", &unary, &Primitive)?,
            add: binary("op_Addition")?,
            subtract: binary("op_Subtraction")?,
            multiply: binary("op_Multiply")?,
            divide: binary("op_Division")?,
            greater_than: binary("op_GreaterThan")?,
            greater_than_or_equal_to: binary("op_GreaterThanOrEqual")?,
            less_than: binary("op_LessThan")?,
            less_than_or_equal_to: binary("op_LessThanOrEqual")?,
            equal_to: binary("op_Equality")?,
            not_equal_to: binary("op_Inequality")?,
            and: binary("op_And")?,
            or: binary("op_Or")?,
            get_array_value: binary("GetArrayValue")?,
            set_array_value: resolver.find(
                "SetArrayValue",
                &[Primitive, Primitive, Primitive],
                &Primitive,
            )?,
        })
    }

    /// All bindings in their fixed import order.
    pub fn handles(&self) -> [&OperationHandle; OPERATION_COUNT] {
        [
            &self.string_to_primitive,
            &self.number_to_primitive,
            &self.primitive_to_boolean,
            &self.negation,
            &self.add,
            &self.subtract,
            &self.multiply,
            &self.divide,
            &self.greater_than,
            &self.greater_than_or_equal_to,
            &self.less_than,
            &self.less_than_or_equal_to,
            &self.equal_to,
            &self.not_equal_to,
            &self.and,
            &self.or,
            &self.get_array_value,
            &self.set_array_value,
        ]
    }
}

struct Resolver<'a> {
    module: &'a str,
    ty: &'a TypeManifest,
}

impl Resolver<'_> {
    /// First public static overload of `name` with exactly this signature.
    fn find(
        &self,
        name: &str,
        params: &[TypeRef],
        returns: &TypeRef,
    ) -> LibraryResult<OperationHandle> {
        let method = self
            .ty
            .methods
            .iter()
            .filter(|m| m.is_static && m.public)
            .find(|m| m.name == name && m.params == params && m.returns == *returns)
            .ok_or_else(|| LibraryError::MissingOperation(describe(name, params, returns)))?;
        Ok(self.handle(method))
    }

    fn handle(&self, method: &MethodManifest) -> OperationHandle {
        OperationHandle {
            name: method.name.clone(),
            import: ImportRef::new(self.module, method.field(&self.ty.name)),
            params: method.params.clone(),
            returns: method.returns.clone(),
        }
    }
}

/// The primitive type a runtime support library has to describe, with
/// default export names. Runtime authors embed this in their manifest.
pub fn primitive_type_manifest() -> TypeManifest {
    use TypeRef::{Boolean, Number, Primitive, Text};

    let op = |name: &str, export: &str, params: &[TypeRef], returns: TypeRef| MethodManifest {
        name: name.to_string(),
        params: params.to_vec(),
        returns,
        is_static: true,
        public: true,
        generic: false,
        constructor: false,
        special_name: true,
        export: Some(export.to_string()),
    };
    let binary = |name: &str, export: &str| op(name, export, &[Primitive, Primitive], Primitive);

    TypeManifest {
        name: PRIMITIVE_TYPE.to_string(),
        library_type: false,
        visible: true,
        hidden: true,
        methods: vec![
            op("op_Implicit", "from_text", &[Text], Primitive),
            op("op_Implicit", "from_number", &[Number], Primitive),
            op("ConvertToBoolean", "to_boolean", &[Primitive], Boolean),
            op("op_UnaryNegation", "negate", &[Primitive], Primitive),
            binary("op_Addition", "add"),
            binary("op_Subtraction", "subtract"),
            binary("op_Multiply", "multiply"),
            binary("op_Division", "divide"),
            binary("op_GreaterThan", "greater_than"),
            binary("op_GreaterThanOrEqual", "greater_than_or_equal"),
            binary("op_LessThan", "less_than"),
            binary("op_LessThanOrEqual", "less_than_or_equal"),
            binary("op_Equality", "equal"),
            binary("op_Inequality", "not_equal"),
            binary("op_And", "and"),
            binary("op_Or", "or"),
            binary("GetArrayValue", "get_array_value"),
            op(
                "SetArrayValue",
                "set_array_value",
                &[Primitive, Primitive, Primitive],
                Primitive,
            ),
        ],
        properties: Vec::new(),
        events: Vec::new(),
    }
}

fn describe(name: &str, params: &[TypeRef], returns: &TypeRef) -> String {
    let params: Vec<String> = params.iter().map(ToString::to_string).collect();
    format!("{name}({}) -> {returns}", params.join(", "))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::manifest::LibraryManifest;

    fn runtime_manifest() -> serde_json::Value {
        let manifest = LibraryManifest {
            module: Some("lexico_runtime".into()),
            primitive: None,
            types: vec![primitive_type_manifest()],
        };
        serde_json::to_value(manifest).unwrap()
    }

    fn runtime(manifest: serde_json::Value) -> LoadedLibrary {
        let manifest: LibraryManifest = serde_json::from_value(manifest).unwrap();
        LoadedLibrary {
            path: PathBuf::from("lexico_runtime.wasm"),
            module: manifest.module.clone().unwrap(),
            manifest,
        }
    }

    #[test]
    fn overloads_resolve_by_shape() {
        let mut manifest = runtime_manifest();
        let methods = manifest["types"][0]["methods"].as_array_mut().unwrap();
        methods.insert(
            0,
            serde_json::json!({
                "name": "op_Equality", "export": "equal_text",
                "special_name": true, "params": ["Primitive", "text"]
            }),
        );
        let bindings = OperatorBindings::resolve(&runtime(manifest)).unwrap();
        assert_eq!(bindings.string_to_primitive.import.field, "from_text");
        assert_eq!(bindings.number_to_primitive.import.field, "from_number");
        assert_eq!(bindings.equal_to.import.field, "equal");
        assert_eq!(bindings.equal_to.params, vec![TypeRef::Primitive, TypeRef::Primitive]);
        assert_eq!(bindings.primitive_to_boolean.returns, TypeRef::Boolean);
        assert_eq!(bindings.set_array_value.params.len(), 3);
    }

    #[test]
    fn handles_are_in_fixed_order() {
        let bindings = OperatorBindings::resolve(&runtime(runtime_manifest())).unwrap();
        let fields: Vec<&str> = bindings
            .handles()
            .iter()
            .map(|h| h.import.field.as_str())
            .collect();
        assert_eq!(fields[0], "from_text");
        assert_eq!(fields[1], "from_number");
        assert_eq!(fields[OPERATION_COUNT - 1], "set_array_value");
        assert!(bindings.handles().iter().all(|h| h.import.module == "lexico_runtime"));
    }

    #[test]
    fn missing_operation_fails_eagerly() {
        let mut manifest = runtime_manifest();
        let methods = manifest["types"][0]["methods"].as_array_mut().unwrap();
        methods.retain(|m| m["name"] != "op_Or");
        let err = OperatorBindings::resolve(&runtime(manifest)).unwrap_err();
        match err {
            LibraryError::MissingOperation(name) => {
                assert_eq!(name, "op_Or(Primitive, Primitive) -> Primitive")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_overload_shape_fails() {
        let mut manifest = runtime_manifest();
        let methods = manifest["types"][0]["methods"].as_array_mut().unwrap();
        methods.retain(|m| m["export"] != "from_number");
        let err = OperatorBindings::resolve(&runtime(manifest)).unwrap_err();
        assert!(matches!(err, LibraryError::MissingOperation(ref n) if n == "op_Implicit(number) -> Primitive"));
    }

    #[test]
    fn wrong_shape_overload_listed_first_is_skipped() {
        let mut manifest = runtime_manifest();
        let methods = manifest["types"][0]["methods"].as_array_mut().unwrap();
        methods.insert(
            0,
            serde_json::json!({
                "name": "op_Addition", "export": "add_number",
                "special_name": true, "params": ["Primitive", "number"],
                "returns": "Primitive"
            }),
        );
        let bindings = OperatorBindings::resolve(&runtime(manifest)).unwrap();
        assert_eq!(bindings.add.import.field, "add");
        assert_eq!(bindings.add.params, vec![TypeRef::Primitive, TypeRef::Primitive]);
    }

    #[test]
    fn only_wrong_shape_overload_fails() {
        let mut manifest = runtime_manifest();
        let methods = manifest["types"][0]["methods"].as_array_mut().unwrap();
        for method in methods.iter_mut() {
            if method["name"] == "op_Addition" {
                method["params"] = serde_json::json!(["Primitive", "number"]);
            }
        }
        let err = OperatorBindings::resolve(&runtime(manifest)).unwrap_err();
        assert!(matches!(
            err,
            LibraryError::MissingOperation(ref n) if n == "op_Addition(Primitive, Primitive) -> Primitive"
        ));
    }

    #[test]
    fn conversion_to_boolean_must_return_boolean() {
        let mut manifest = runtime_manifest();
        let methods = manifest["types"][0]["methods"].as_array_mut().unwrap();
        for method in methods.iter_mut() {
            if method["name"] == "ConvertToBoolean" {
                method["returns"] = serde_json::json!("Primitive");
            }
        }
        let err = OperatorBindings::resolve(&runtime(manifest)).unwrap_err();
        assert!(matches!(
            err,
            LibraryError::MissingOperation(ref n) if n == "ConvertToBoolean(Primitive) -> boolean"
        ));
    }

    #[test]
    fn missing_primitive_type_fails() {
        let err = OperatorBindings::resolve(&runtime(serde_json::json!({
            "module": "lexico_runtime", "types": []
        })))
        .unwrap_err();
        assert!(matches!(err, LibraryError::MissingPrimitiveType(ref n) if n == "Primitive"));
    }
}
