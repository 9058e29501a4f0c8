//! Module layout constants and value-type mapping.
//!
//! Every language value is a primitive handle owned by the host runtime and
//! travels through the module as an `i32`:
//!
//! | Manifest type | WASM shape                         |
//! |---------------|------------------------------------|
//! | `Primitive`   | `i32` handle, `0` = empty          |
//! | `text`        | `(i32 ptr, i32 len)` into `memory` |
//! | `number`      | `f64`                              |
//! | `boolean`     | `i32` (0 = false)                  |
//! | `Callback`    | `i32` index into `handlers`        |

use lexico_library::TypeRef;
use wasm_encoder::ValType;

/// Handle value of the empty primitive.
pub const EMPTY_PRIMITIVE: i32 = 0;

// ── Exports ──────────────────────────────────────────────────────────────────

/// Export name of the entry routine.
pub const ENTRY_EXPORT: &str = "run";
/// Export name of linear memory (text literals live here).
pub const MEMORY_EXPORT: &str = "memory";
/// Export name of the subroutine table used for event subscriptions.
pub const HANDLER_TABLE_EXPORT: &str = "handlers";

/// Name of the container recorded in module metadata.
pub const CONTAINER_NAME: &str = "_Program";

/// Extension of emitted modules.
pub const MODULE_EXTENSION: &str = "wasm";

// ── Memory ───────────────────────────────────────────────────────────────────

/// Size of a linear-memory page.
pub const PAGE_SIZE: u64 = 65_536;
/// First byte used for text literals.
pub const DATA_START: u32 = 16;

// ── Custom section ───────────────────────────────────────────────────────────

/// Custom section holding [`ModuleMetadata`](crate::ModuleMetadata) JSON.
pub const METADATA_SECTION: &str = "lexico";
/// Compiler version embedded in module metadata.
pub const COMPILER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Parameter shape of a manifest type.
pub fn param_types(ty: &TypeRef) -> Vec<ValType> {
    match ty {
        TypeRef::Void => Vec::new(),
        TypeRef::Text => vec![ValType::I32, ValType::I32],
        TypeRef::Number => vec![ValType::F64],
        TypeRef::Primitive | TypeRef::Boolean | TypeRef::Callback | TypeRef::Other(_) => {
            vec![ValType::I32]
        }
    }
}

/// Result shape of a manifest type.
pub fn result_types(ty: &TypeRef) -> Vec<ValType> {
    match ty {
        TypeRef::Void => Vec::new(),
        TypeRef::Number => vec![ValType::F64],
        _ => vec![ValType::I32],
    }
}
