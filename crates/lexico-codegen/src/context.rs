//! Emission context: state threaded through both lowering phases.
//!
//! Module-wide state (slots, imports, signatures, subroutines, labels, text
//! data) is filled by the prepare phase and read by the emit phase.
//! Per-routine state (locals, control depth, goto dispatch) is reset at the
//! start of every routine.

use std::collections::HashMap;

use lexico_library::{
    CapabilityRegistry, EventDescriptor, ImportRef, MethodDescriptor, OperationHandle,
    OperatorBindings, PropertyDescriptor,
};
use lexico_types::ir::SymbolTable;
use wasm_encoder::{Function, Instruction, ValType};

use crate::error::{CodegenError, CodegenResult};
use crate::types::{param_types, result_types, DATA_START};

/// A function signature in the type section.
pub type Signature = (Vec<ValType>, Vec<ValType>);

/// An imported host function.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportEntry {
    pub import: ImportRef,
    pub type_index: u32,
}

/// The routine currently being prepared or emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routine {
    Entry,
    /// A subroutine, by declaration index.
    Subroutine(u32),
}

impl Routine {
    fn slot(self) -> usize {
        match self {
            Routine::Entry => 0,
            Routine::Subroutine(i) => i as usize + 1,
        }
    }
}

/// Goto dispatch loop of the current routine.
#[derive(Debug, Clone, Copy)]
struct Dispatch {
    /// Local holding the segment to run next.
    pc: u32,
    /// Control depth just inside the dispatch loop.
    level: u32,
}

/// Per-routine emission state.
#[derive(Debug, Default)]
struct Frame {
    locals: Vec<(u32, ValType)>,
    next_local: u32,
    depth: u32,
    dispatch: Option<Dispatch>,
}

/// State shared by the prepare and emit phases of one emission.
pub struct EmissionContext<'a> {
    registry: &'a CapabilityRegistry,
    operators: &'a OperatorBindings,

    slots: HashMap<String, u32>,
    slot_names: Vec<String>,

    signatures: Vec<Signature>,
    imports: Vec<ImportEntry>,
    import_index: HashMap<ImportRef, u32>,
    capability_imports: Vec<ImportRef>,

    subroutines: Vec<String>,
    subroutine_index: HashMap<String, u32>,
    /// Label → segment, one map per routine (entry first).
    labels: Vec<HashMap<String, u32>>,
    routine: Routine,
    /// Block nesting while preparing.
    nesting: u32,

    data: Vec<u8>,
    interned: HashMap<String, (u32, u32)>,

    frame: Frame,
}

impl<'a> EmissionContext<'a> {
    /// Open a context. The operator bindings become the first imports, in
    /// their fixed order.
    pub fn new(registry: &'a CapabilityRegistry, operators: &'a OperatorBindings) -> Self {
        let mut ctx = Self {
            registry,
            operators,
            slots: HashMap::new(),
            slot_names: Vec::new(),
            signatures: Vec::new(),
            imports: Vec::new(),
            import_index: HashMap::new(),
            capability_imports: Vec::new(),
            subroutines: Vec::new(),
            subroutine_index: HashMap::new(),
            labels: vec![HashMap::new()],
            routine: Routine::Entry,
            nesting: 0,
            data: Vec::new(),
            interned: HashMap::new(),
            frame: Frame::default(),
        };
        // () -> () for the entry routine and subroutines.
        ctx.signature(Vec::new(), Vec::new());
        for handle in operators.handles() {
            let params = handle.params.iter().flat_map(param_types).collect();
            let results = result_types(&handle.returns);
            ctx.import_function(&handle.import, params, results);
        }
        ctx
    }

    // ── Slots ────────────────────────────────────────────────────────────

    /// One storage slot (global) per symbol, in symbol-table order.
    pub fn allocate_slots(&mut self, symbols: &SymbolTable) -> CodegenResult<()> {
        for name in symbols.iter() {
            let index = to_u32(self.slot_names.len(), "storage slots")?;
            self.slots.insert(name.to_string(), index);
            self.slot_names.push(name.to_string());
        }
        Ok(())
    }

    pub fn slot(&self, name: &str) -> CodegenResult<u32> {
        self.slots
            .get(name)
            .copied()
            .ok_or_else(|| CodegenError::UnresolvedSymbol(format!("variable '{name}'")))
    }

    pub fn slot_names(&self) -> &[String] {
        &self.slot_names
    }

    // ── Types & imports ──────────────────────────────────────────────────

    /// Intern a function signature, returning its type index.
    pub fn signature(&mut self, params: Vec<ValType>, results: Vec<ValType>) -> u32 {
        let sig = (params, results);
        if let Some(pos) = self.signatures.iter().position(|s| *s == sig) {
            return pos as u32;
        }
        self.signatures.push(sig);
        (self.signatures.len() - 1) as u32
    }

    /// Register a host import. Imports are deduplicated by module and field;
    /// returns the function index.
    pub fn import_function(
        &mut self,
        import: &ImportRef,
        params: Vec<ValType>,
        results: Vec<ValType>,
    ) -> u32 {
        if let Some(&index) = self.import_index.get(import) {
            return index;
        }
        let type_index = self.signature(params, results);
        let index = self.imports.len() as u32;
        self.imports.push(ImportEntry {
            import: import.clone(),
            type_index,
        });
        self.import_index.insert(import.clone(), index);
        index
    }

    /// Register an import on behalf of a capability member.
    pub fn import_capability(
        &mut self,
        import: &ImportRef,
        params: Vec<ValType>,
        results: Vec<ValType>,
    ) -> u32 {
        if !self.import_index.contains_key(import) {
            self.capability_imports.push(import.clone());
        }
        self.import_function(import, params, results)
    }

    /// Function index of an import registered during preparation.
    pub fn imported(&self, import: &ImportRef) -> CodegenResult<u32> {
        self.import_index.get(import).copied().ok_or_else(|| {
            CodegenError::UnresolvedSymbol(format!("import {}.{}", import.module, import.field))
        })
    }

    pub fn operators(&self) -> &'a OperatorBindings {
        self.operators
    }

    /// Emit a call to a primitive operation.
    pub fn call_operator(&self, f: &mut Function, handle: &OperationHandle) -> CodegenResult<()> {
        let index = self.imported(&handle.import)?;
        f.instruction(&Instruction::Call(index));
        Ok(())
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    pub fn imports(&self) -> &[ImportEntry] {
        &self.imports
    }

    /// Imports registered for capability members, in first-use order.
    pub fn capability_imports(&self) -> &[ImportRef] {
        &self.capability_imports
    }

    // ── Capabilities ─────────────────────────────────────────────────────

    pub fn method(&self, type_name: &str, method: &str) -> CodegenResult<&'a MethodDescriptor> {
        self.registry
            .method(type_name, method)
            .ok_or_else(|| CodegenError::UnresolvedSymbol(format!("method {type_name}.{method}")))
    }

    pub fn property(
        &self,
        type_name: &str,
        property: &str,
    ) -> CodegenResult<&'a PropertyDescriptor> {
        self.registry.property(type_name, property).ok_or_else(|| {
            CodegenError::UnresolvedSymbol(format!("property {type_name}.{property}"))
        })
    }

    pub fn event(&self, type_name: &str, event: &str) -> CodegenResult<&'a EventDescriptor> {
        self.registry
            .event(type_name, event)
            .ok_or_else(|| CodegenError::UnresolvedSymbol(format!("event {type_name}.{event}")))
    }

    // ── Subroutines & labels ─────────────────────────────────────────────

    /// Declare a subroutine. Returns its declaration index.
    pub fn declare_subroutine(&mut self, name: &str) -> CodegenResult<u32> {
        if self.subroutine_index.contains_key(name) {
            return Err(CodegenError::Unsupported(format!(
                "subroutine '{name}' declared twice"
            )));
        }
        let index = to_u32(self.subroutines.len(), "subroutines")?;
        self.subroutines.push(name.to_string());
        self.subroutine_index.insert(name.to_string(), index);
        self.labels.push(HashMap::new());
        Ok(index)
    }

    /// Declaration (and handler table) index of a subroutine.
    pub fn subroutine(&self, name: &str) -> CodegenResult<u32> {
        self.subroutine_index
            .get(name)
            .copied()
            .ok_or_else(|| CodegenError::UnresolvedSymbol(format!("subroutine '{name}'")))
    }

    pub fn subroutines(&self) -> &[String] {
        &self.subroutines
    }

    /// Function index of the entry routine. Valid once preparation is done.
    pub fn entry_function(&self) -> u32 {
        self.imports.len() as u32
    }

    /// Function index of a subroutine. Valid once preparation is done.
    pub fn subroutine_function(&self, index: u32) -> u32 {
        self.entry_function() + 1 + index
    }

    /// Declare a label in the current routine. Segment 0 is the routine
    /// start; the n-th label opens segment n.
    pub fn declare_label(&mut self, name: &str) -> CodegenResult<u32> {
        let labels = &mut self.labels[self.routine.slot()];
        if labels.contains_key(name) {
            return Err(CodegenError::Unsupported(format!("label '{name}' declared twice")));
        }
        let segment = labels.len() as u32 + 1;
        labels.insert(name.to_string(), segment);
        Ok(segment)
    }

    /// Segment opened by a label of the current routine.
    pub fn label(&self, name: &str) -> CodegenResult<u32> {
        self.labels[self.routine.slot()]
            .get(name)
            .copied()
            .ok_or_else(|| CodegenError::UnresolvedSymbol(format!("label '{name}'")))
    }

    pub fn routine(&self) -> Routine {
        self.routine
    }

    /// Switch routines. Resets the per-routine frame.
    pub fn enter_routine(&mut self, routine: Routine) {
        self.routine = routine;
        self.nesting = 0;
        self.frame = Frame::default();
    }

    /// Whether the statement being prepared sits inside a block.
    pub fn is_nested(&self) -> bool {
        self.nesting > 0
    }

    /// Run `prepare` for a block body one nesting level deeper.
    pub fn nested<T>(&mut self, prepare: impl FnOnce(&mut Self) -> T) -> T {
        self.nesting += 1;
        let out = prepare(self);
        self.nesting -= 1;
        out
    }

    // ── Text data ────────────────────────────────────────────────────────

    /// Place a text literal in the data segment, returning `(ptr, len)`.
    /// Identical literals share storage.
    pub fn intern_text(&mut self, text: &str) -> CodegenResult<(u32, u32)> {
        if let Some(&found) = self.interned.get(text) {
            return Ok(found);
        }
        let ptr = to_u32(DATA_START as usize + self.data.len(), "data segment")?;
        let len = to_u32(text.len(), "text literal")?;
        self.data.extend_from_slice(text.as_bytes());
        self.interned.insert(text.to_string(), (ptr, len));
        Ok((ptr, len))
    }

    /// A text literal interned during preparation.
    pub fn text(&self, text: &str) -> CodegenResult<(u32, u32)> {
        self.interned
            .get(text)
            .copied()
            .ok_or_else(|| CodegenError::UnresolvedSymbol(format!("text literal {text:?}")))
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    // ── Per-routine emission state ───────────────────────────────────────

    /// Allocate a new local of the given type. Returns the local index.
    pub fn alloc_local(&mut self, ty: ValType) -> u32 {
        let idx = self.frame.next_local;
        self.frame.next_local += 1;
        self.frame.locals.push((1, ty));
        idx
    }

    /// Locals declared in the current routine.
    pub fn locals(&self) -> &[(u32, ValType)] {
        &self.frame.locals
    }

    /// Open a `block`, `loop` or `if`.
    pub fn enter(&mut self, f: &mut Function, instruction: Instruction<'_>) {
        f.instruction(&instruction);
        self.frame.depth += 1;
    }

    /// Close the innermost structured instruction.
    pub fn leave(&mut self, f: &mut Function) {
        f.instruction(&Instruction::End);
        self.frame.depth -= 1;
    }

    pub fn depth(&self) -> u32 {
        self.frame.depth
    }

    /// Record the goto dispatch loop just opened.
    pub fn begin_dispatch(&mut self, pc: u32) {
        self.frame.dispatch = Some(Dispatch {
            pc,
            level: self.frame.depth,
        });
    }

    pub fn end_dispatch(&mut self) {
        self.frame.dispatch = None;
    }

    /// `(pc local, relative branch depth to the dispatch loop)`.
    pub fn dispatch(&self) -> CodegenResult<(u32, u32)> {
        let dispatch = self.frame.dispatch.ok_or_else(|| {
            CodegenError::Unsupported("goto in a routine without labels".to_string())
        })?;
        Ok((dispatch.pc, self.frame.depth - dispatch.level))
    }
}

pub(crate) fn to_u32(n: usize, what: &str) -> CodegenResult<u32> {
    u32::try_from(n).map_err(|_| CodegenError::LimitExceeded(format!("too many {what}")))
}
