//! Two-phase lowering protocol.
//!
//! Every node is visited twice, in tree order: [`Lower::prepare`] registers
//! what the node needs before any code exists (imports, text data,
//! subroutines, labels), then [`Lower::emit`] appends its instructions.

use lexico_types::ir::{Stmt, StmtKind};
use wasm_encoder::{BlockType, Function, Instruction, ValType};

use crate::context::EmissionContext;
use crate::error::CodegenResult;

pub trait Lower {
    /// Phase 1: register forward-referenced state.
    fn prepare(&self, ctx: &mut EmissionContext<'_>) -> CodegenResult<()>;

    /// Phase 2: produce instructions into `f`.
    fn emit(&self, ctx: &mut EmissionContext<'_>, f: &mut Function) -> CodegenResult<()>;
}

pub fn prepare_all<T: Lower>(nodes: &[T], ctx: &mut EmissionContext<'_>) -> CodegenResult<()> {
    for node in nodes {
        node.prepare(ctx)?;
    }
    Ok(())
}

pub fn emit_all<T: Lower>(
    nodes: &[T],
    ctx: &mut EmissionContext<'_>,
    f: &mut Function,
) -> CodegenResult<()> {
    for node in nodes {
        node.emit(ctx, f)?;
    }
    Ok(())
}

/// Emit the top-level statements of a routine.
///
/// Without labels the statements are emitted straight. With labels the body
/// is split into segments at each top-level label and wrapped in a dispatch
/// loop:
///
/// ```text
/// loop                       ;; goto target
///   block                    ;; B(n)
///     ...
///       block                ;; B(0)
///         local.get $pc
///         br_table 0 1 .. n  ;; exit B(k) to run segment k
///       end
///       <segment 0>
///     ...
///   end
///   <segment n>
/// end
/// ```
///
/// Segments fall through into one another; `goto` stores the target segment
/// in `$pc` and branches back to the loop.
pub fn emit_routine(
    body: &[Stmt],
    ctx: &mut EmissionContext<'_>,
    f: &mut Function,
) -> CodegenResult<()> {
    let segments = segments(body);
    if segments.len() == 1 {
        return emit_all(body, ctx, f);
    }

    let pc = ctx.alloc_local(ValType::I32);
    ctx.enter(f, Instruction::Loop(BlockType::Empty));
    ctx.begin_dispatch(pc);
    for _ in &segments {
        ctx.enter(f, Instruction::Block(BlockType::Empty));
    }
    let last = segments.len() as u32 - 1;
    let targets: Vec<u32> = (0..=last).collect();
    f.instruction(&Instruction::LocalGet(pc));
    f.instruction(&Instruction::BrTable(targets.into(), last));

    for segment in segments {
        ctx.leave(f);
        emit_all(segment, ctx, f)?;
    }
    ctx.end_dispatch();
    ctx.leave(f);
    Ok(())
}

/// Split a routine body at its top-level labels.
fn segments(body: &[Stmt]) -> Vec<&[Stmt]> {
    let mut segments = Vec::new();
    let mut start = 0;
    for (i, stmt) in body.iter().enumerate() {
        if matches!(stmt.kind, StmtKind::Label { .. }) {
            segments.push(&body[start..i]);
            start = i + 1;
        }
    }
    segments.push(&body[start..]);
    segments
}
