//! Module assembler.
//!
//! Orchestrates emission of one program:
//! 1. Open an [`EmissionContext`] (operator imports, entry signature)
//! 2. Allocate one storage slot per symbol, in symbol-table order
//! 3. Phase 1: prepare every statement in tree order
//! 4. Phase 2: emit the entry routine, then one function per subroutine
//! 5. Assemble all sections, validate with `wasmparser`
//! 6. Persist `<output_name>.wasm` through a [`ModuleWriter`]

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use lexico_library::{CapabilityRegistry, OperatorBindings};
use lexico_types::ir::{Program, Stmt, StmtKind};
use wasm_encoder::{
    CodeSection, ConstExpr, CustomSection, DataSection, ElementSection, Elements, EntityType,
    ExportKind, ExportSection, Function, FunctionSection, GlobalSection, GlobalType,
    ImportSection, MemorySection, MemoryType, Module, NameMap, NameSection, RefType,
    TableSection, TableType, TypeSection, ValType,
};

use crate::context::{to_u32, EmissionContext, Routine};
use crate::error::{CodegenError, CodegenResult};
use crate::lower::{emit_routine, prepare_all};
use crate::metadata::{source_digest, ModuleMetadata, SubroutineEntry};
use crate::types::*;

// ══════════════════════════════════════════════════════════════════════════════
// Writers
// ══════════════════════════════════════════════════════════════════════════════

/// Destination for emitted modules.
pub trait ModuleWriter {
    /// Persist `bytes` under `file_name`, returning where they went.
    fn write_module(&mut self, file_name: &str, bytes: &[u8]) -> CodegenResult<PathBuf>;
}

/// Writes modules into a directory.
///
/// Bytes go to a temporary sibling first and are renamed into place once
/// flushed, so a failed write never leaves a truncated module behind.
#[derive(Debug, Clone)]
pub struct FileWriter {
    dir: PathBuf,
}

impl FileWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ModuleWriter for FileWriter {
    fn write_module(&mut self, file_name: &str, bytes: &[u8]) -> CodegenResult<PathBuf> {
        let path = self.dir.join(file_name);
        let partial = self.dir.join(format!("{file_name}.partial"));
        let io_err = |source| CodegenError::Io {
            path: path.clone(),
            source,
        };

        let written = fs::File::create(&partial).and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        });
        if let Err(err) = written.and_then(|()| fs::rename(&partial, &path)) {
            let _ = fs::remove_file(&partial);
            return Err(io_err(err));
        }
        Ok(path)
    }
}

/// Keeps modules in memory, keyed by file name.
#[derive(Debug, Clone, Default)]
pub struct MemoryWriter {
    pub files: BTreeMap<String, Vec<u8>>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModuleWriter for MemoryWriter {
    fn write_module(&mut self, file_name: &str, bytes: &[u8]) -> CodegenResult<PathBuf> {
        self.files.insert(file_name.to_string(), bytes.to_vec());
        Ok(PathBuf::from(file_name))
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// ModuleEmitter
// ══════════════════════════════════════════════════════════════════════════════

/// Lowers analyzed programs against one capability registry and set of
/// operator bindings.
#[derive(Debug, Clone, Copy)]
pub struct ModuleEmitter<'a> {
    registry: &'a CapabilityRegistry,
    operators: &'a OperatorBindings,
}

impl<'a> ModuleEmitter<'a> {
    pub fn new(registry: &'a CapabilityRegistry, operators: &'a OperatorBindings) -> Self {
        Self {
            registry,
            operators,
        }
    }

    /// Emit `program` and persist it as `<output_name>.wasm`.
    pub fn emit(
        &self,
        program: &Program,
        source: &str,
        output_name: &str,
        writer: &mut dyn ModuleWriter,
    ) -> CodegenResult<PathBuf> {
        let bytes = self.assemble(program, source)?;
        let file_name = format!("{output_name}.{MODULE_EXTENSION}");
        let path = writer.write_module(&file_name, &bytes)?;
        tracing::info!(path = %path.display(), bytes = bytes.len(), "module written");
        Ok(path)
    }

    /// Emit `program` into validated module bytes.
    pub fn assemble(&self, program: &Program, source: &str) -> CodegenResult<Vec<u8>> {
        let mut ctx = EmissionContext::new(self.registry, self.operators);
        ctx.allocate_slots(&program.symbols)?;

        // Phase 1
        prepare_all(&program.body, &mut ctx)?;

        // Phase 2
        let mut code = CodeSection::new();
        ctx.enter_routine(Routine::Entry);
        code.function(&emit_function(&program.body, &mut ctx)?);
        for (index, (_, body)) in subroutine_bodies(&program.body).enumerate() {
            ctx.enter_routine(Routine::Subroutine(to_u32(index, "subroutines")?));
            code.function(&emit_function(body, &mut ctx)?);
        }

        let metadata = self.metadata(&ctx, source);
        let bytes = assemble_module(&ctx, code, &metadata)?;

        wasmparser::validate(&bytes)
            .map_err(|e| CodegenError::ValidationFailed(format!("{e}")))?;
        tracing::debug!(
            slots = ctx.slot_names().len(),
            subroutines = ctx.subroutines().len(),
            imports = ctx.imports().len(),
            "module assembled"
        );
        Ok(bytes)
    }

    fn metadata(&self, ctx: &EmissionContext<'_>, source: &str) -> ModuleMetadata {
        ModuleMetadata {
            compiler_version: COMPILER_VERSION.to_string(),
            container: CONTAINER_NAME.to_string(),
            entry: ENTRY_EXPORT.to_string(),
            slots: ctx.slot_names().to_vec(),
            subroutines: ctx
                .subroutines()
                .iter()
                .enumerate()
                .map(|(i, name)| SubroutineEntry {
                    name: name.clone(),
                    function_index: ctx.subroutine_function(i as u32),
                    table_index: i as u32,
                })
                .collect(),
            capabilities: ctx.capability_imports().to_vec(),
            source_sha256: source_digest(source),
        }
    }
}

/// Top-level subroutine declarations in declaration order.
fn subroutine_bodies(body: &[Stmt]) -> impl Iterator<Item = (&str, &[Stmt])> {
    body.iter().filter_map(|stmt| match &stmt.kind {
        StmtKind::Sub { name, body } => Some((name.as_str(), body.as_slice())),
        _ => None,
    })
}

/// Emit one routine plus the implicit return.
fn emit_function(body: &[Stmt], ctx: &mut EmissionContext<'_>) -> CodegenResult<Function> {
    let mut scratch = Function::new(vec![]);
    emit_routine(body, ctx, &mut scratch)?;
    scratch.instruction(&wasm_encoder::Instruction::End);
    Ok(finalize_function(scratch, ctx.locals()))
}

/// Rebuild a scratch function with its real local declarations.
///
/// `Function::new(vec![])` declares 0 locals, so its raw body starts with a
/// single 0x00 byte (LEB128 zero). That byte is stripped and the locals
/// collected during emission are declared instead.
fn finalize_function(scratch: Function, locals: &[(u32, ValType)]) -> Function {
    let raw = scratch.into_raw_body();
    let mut f = Function::new(locals.to_vec());
    f.raw(raw[1..].iter().copied());
    f
}

fn assemble_module(
    ctx: &EmissionContext<'_>,
    code: CodeSection,
    metadata: &ModuleMetadata,
) -> CodegenResult<Vec<u8>> {
    let subroutine_count = to_u32(ctx.subroutines().len(), "subroutines")?;
    let mut module = Module::new();

    // 1. Types
    let mut types = TypeSection::new();
    for (params, results) in ctx.signatures() {
        types
            .ty()
            .function(params.iter().copied(), results.iter().copied());
    }
    module.section(&types);

    // 2. Imports: operators first, then capabilities in first-use order
    let mut imports = ImportSection::new();
    for entry in ctx.imports() {
        imports.import(
            &entry.import.module,
            &entry.import.field,
            EntityType::Function(entry.type_index),
        );
    }
    module.section(&imports);

    // 3. Functions: entry, then subroutines; all `() -> ()`
    let mut functions = FunctionSection::new();
    for _ in 0..=subroutine_count {
        functions.function(0);
    }
    module.section(&functions);

    // 4. Handler table
    let mut tables = TableSection::new();
    tables.table(TableType {
        element_type: RefType::FUNCREF,
        table64: false,
        minimum: u64::from(subroutine_count),
        maximum: Some(u64::from(subroutine_count)),
        shared: false,
    });
    module.section(&tables);

    // 5. Memory sized to hold every text literal
    let data_end = u64::from(DATA_START) + ctx.data().len() as u64;
    let pages = data_end.div_ceil(PAGE_SIZE).max(1);
    let mut memory = MemorySection::new();
    memory.memory(MemoryType {
        minimum: pages,
        maximum: None,
        memory64: false,
        shared: false,
        page_size_log2: None,
    });
    module.section(&memory);

    // 6. Storage slots
    let mut globals = GlobalSection::new();
    for _ in ctx.slot_names() {
        globals.global(
            GlobalType {
                val_type: ValType::I32,
                mutable: true,
                shared: false,
            },
            &ConstExpr::i32_const(EMPTY_PRIMITIVE),
        );
    }
    module.section(&globals);

    // 7. Exports
    let mut exports = ExportSection::new();
    exports.export(ENTRY_EXPORT, ExportKind::Func, ctx.entry_function());
    exports.export(MEMORY_EXPORT, ExportKind::Memory, 0);
    exports.export(HANDLER_TABLE_EXPORT, ExportKind::Table, 0);
    module.section(&exports);

    // 8. Elements: subroutine i at table index i
    if subroutine_count > 0 {
        let handlers: Vec<u32> = (0..subroutine_count)
            .map(|i| ctx.subroutine_function(i))
            .collect();
        let mut elements = ElementSection::new();
        elements.active(
            Some(0),
            &ConstExpr::i32_const(0),
            Elements::Functions(Cow::Borrowed(&handlers)),
        );
        module.section(&elements);
    }

    // 9. Code
    module.section(&code);

    // 10. Text literals
    if !ctx.data().is_empty() {
        let mut data = DataSection::new();
        data.active(
            0,
            &ConstExpr::i32_const(DATA_START as i32),
            ctx.data().iter().copied(),
        );
        module.section(&data);
    }

    // 11. Names
    module.section(&name_section(ctx));

    // 12. Metadata
    let json = metadata.to_json()?;
    module.section(&CustomSection {
        name: Cow::Borrowed(METADATA_SECTION),
        data: Cow::Owned(json),
    });

    Ok(module.finish())
}

fn name_section(ctx: &EmissionContext<'_>) -> NameSection {
    let mut names = NameSection::new();
    names.module(CONTAINER_NAME);

    let mut functions = NameMap::new();
    for (i, entry) in ctx.imports().iter().enumerate() {
        functions.append(i as u32, &entry.import.field);
    }
    functions.append(ctx.entry_function(), ENTRY_EXPORT);
    for (i, name) in ctx.subroutines().iter().enumerate() {
        functions.append(ctx.subroutine_function(i as u32), name);
    }
    names.functions(&functions);

    let mut globals = NameMap::new();
    for (i, name) in ctx.slot_names().iter().enumerate() {
        globals.append(i as u32, name);
    }
    names.globals(&globals);
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexico_types::ir::Expr;

    #[test]
    fn empty_program_is_valid() {
        let registry = CapabilityRegistry::new();
        let operators = crate::test_support::operators();
        let emitter = ModuleEmitter::new(&registry, &operators);
        let bytes = emitter.assemble(&Program::default(), "").unwrap();
        let meta = ModuleMetadata::from_wasm(&bytes).unwrap();
        assert!(meta.slots.is_empty());
        assert_eq!(meta.entry, "run");
        assert_eq!(meta.container, "_Program");
    }

    #[test]
    fn memory_writer_keeps_file_name() {
        let registry = CapabilityRegistry::new();
        let operators = crate::test_support::operators();
        let emitter = ModuleEmitter::new(&registry, &operators);
        let program = Program::from_body(vec![Stmt::assign("x", Expr::number(1.0))]);

        let mut writer = MemoryWriter::new();
        let path = emitter.emit(&program, "x = 1", "hello", &mut writer).unwrap();
        assert_eq!(path, PathBuf::from("hello.wasm"));
        assert!(writer.files.contains_key("hello.wasm"));
    }

    #[test]
    fn finalize_declares_locals() {
        let mut scratch = Function::new(vec![]);
        scratch.instruction(&wasm_encoder::Instruction::End);
        let f = finalize_function(scratch, &[(1, ValType::I32), (1, ValType::I32)]);
        // [local-decl count=2][1 i32][1 i32][end]
        assert_eq!(f.into_raw_body(), vec![2, 1, 0x7f, 1, 0x7f, 0x0b]);
    }
}
