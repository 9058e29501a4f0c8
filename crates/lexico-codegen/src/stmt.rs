//! Statement lowering.
//!
//! Statements leave the operand stack as they found it.

use lexico_types::ir::{Expr, Stmt, StmtKind, Target};
use wasm_encoder::{BlockType, Function, Instruction, ValType};

use crate::context::{EmissionContext, Routine};
use crate::error::{CodegenError, CodegenResult};
use crate::expr::{emit_condition, emit_number, prepare_call};
use crate::lower::{emit_all, prepare_all, Lower};

impl Lower for Stmt {
    fn prepare(&self, ctx: &mut EmissionContext<'_>) -> CodegenResult<()> {
        match &self.kind {
            StmtKind::Assign { target, value } => prepare_assign(target, value, ctx),
            StmtKind::Call {
                type_name,
                method,
                args,
            } => {
                prepare_call(ctx, type_name, method, args.len())?;
                prepare_all(args, ctx)
            }
            StmtKind::If {
                condition,
                then,
                else_if,
                otherwise,
            } => {
                condition.prepare(ctx)?;
                ctx.nested(|ctx| {
                    prepare_all(then, ctx)?;
                    for arm in else_if {
                        arm.condition.prepare(ctx)?;
                        prepare_all(&arm.body, ctx)?;
                    }
                    prepare_all(otherwise, ctx)
                })
            }
            StmtKind::While { condition, body } => {
                condition.prepare(ctx)?;
                ctx.nested(|ctx| prepare_all(body, ctx))
            }
            StmtKind::For {
                start,
                end,
                step,
                body,
                ..
            } => {
                start.prepare(ctx)?;
                end.prepare(ctx)?;
                if let Some(step) = step {
                    step.prepare(ctx)?;
                }
                ctx.nested(|ctx| prepare_all(body, ctx))
            }
            StmtKind::Label { name } => {
                if ctx.is_nested() {
                    return Err(CodegenError::Unsupported(format!(
                        "label '{name}' inside a block"
                    )));
                }
                ctx.declare_label(name).map(|_| ())
            }
            StmtKind::Sub { name, body } => {
                if ctx.is_nested() || ctx.routine() != Routine::Entry {
                    return Err(CodegenError::Unsupported(format!(
                        "subroutine '{name}' declared inside another block"
                    )));
                }
                let index = ctx.declare_subroutine(name)?;
                ctx.enter_routine(Routine::Subroutine(index));
                let prepared = prepare_all(body, ctx);
                ctx.enter_routine(Routine::Entry);
                prepared
            }
            StmtKind::Goto { .. } | StmtKind::CallSub { .. } | StmtKind::Empty => Ok(()),
        }
    }

    fn emit(&self, ctx: &mut EmissionContext<'_>, f: &mut Function) -> CodegenResult<()> {
        match &self.kind {
            StmtKind::Assign { target, value } => emit_assign(target, value, ctx, f),
            StmtKind::Call {
                type_name,
                method,
                args,
            } => {
                let descriptor = ctx.method(type_name, method)?;
                emit_all(args, ctx, f)?;
                f.instruction(&Instruction::Call(ctx.imported(&descriptor.import)?));
                if descriptor.returns_value {
                    f.instruction(&Instruction::Drop);
                }
                Ok(())
            }
            StmtKind::If {
                condition,
                then,
                else_if,
                otherwise,
            } => emit_if(condition, then, else_if, otherwise, ctx, f),
            StmtKind::While { condition, body } => {
                ctx.enter(f, Instruction::Block(BlockType::Empty));
                ctx.enter(f, Instruction::Loop(BlockType::Empty));
                emit_condition(condition, ctx, f)?;
                f.instruction(&Instruction::I32Eqz);
                f.instruction(&Instruction::BrIf(1));
                emit_all(body, ctx, f)?;
                f.instruction(&Instruction::Br(0));
                ctx.leave(f);
                ctx.leave(f);
                Ok(())
            }
            StmtKind::For {
                variable,
                start,
                end,
                step,
                body,
            } => emit_for(variable, start, end, step.as_ref(), body, ctx, f),
            StmtKind::Goto { label } => {
                let segment = ctx.label(label)?;
                let (pc, relative) = ctx.dispatch()?;
                f.instruction(&Instruction::I32Const(segment as i32));
                f.instruction(&Instruction::LocalSet(pc));
                f.instruction(&Instruction::Br(relative));
                Ok(())
            }
            StmtKind::CallSub { name } => {
                let index = ctx.subroutine(name)?;
                f.instruction(&Instruction::Call(ctx.subroutine_function(index)));
                Ok(())
            }
            // Labels are consumed by the routine dispatcher and subroutine
            // bodies are emitted as functions of their own.
            StmtKind::Label { .. } | StmtKind::Sub { .. } | StmtKind::Empty => Ok(()),
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Assignment
// ══════════════════════════════════════════════════════════════════════════════

fn prepare_assign(
    target: &Target,
    value: &Expr,
    ctx: &mut EmissionContext<'_>,
) -> CodegenResult<()> {
    match target {
        Target::Variable(_) => value.prepare(ctx),
        Target::Index { indices, .. } => {
            prepare_all(indices, ctx)?;
            value.prepare(ctx)
        }
        Target::Property {
            type_name,
            property,
        } => {
            let descriptor = ctx.property(type_name, property)?;
            let setter = descriptor.setter.as_ref().ok_or_else(|| {
                CodegenError::Unsupported(format!(
                    "property {type_name}.{property} cannot be written"
                ))
            })?;
            ctx.import_capability(setter, vec![ValType::I32], Vec::new());
            value.prepare(ctx)
        }
        // The handler is a subroutine name, resolved at emission so that
        // subroutines declared later in the program are visible.
        Target::Event { type_name, event } => {
            let descriptor = ctx.event(type_name, event)?;
            ctx.import_capability(&descriptor.subscribe, vec![ValType::I32], Vec::new());
            Ok(())
        }
    }
}

fn emit_assign(
    target: &Target,
    value: &Expr,
    ctx: &mut EmissionContext<'_>,
    f: &mut Function,
) -> CodegenResult<()> {
    match target {
        Target::Variable(name) => {
            value.emit(ctx, f)?;
            f.instruction(&Instruction::GlobalSet(ctx.slot(name)?));
            Ok(())
        }
        Target::Index { array, indices } => {
            let slot = ctx.slot(array)?;
            let container = ctx.alloc_local(ValType::I32);
            f.instruction(&Instruction::GlobalGet(slot));
            f.instruction(&Instruction::LocalSet(container));
            emit_store_element(container, indices, value, ctx, f)?;
            f.instruction(&Instruction::GlobalSet(slot));
            Ok(())
        }
        Target::Property {
            type_name,
            property,
        } => {
            let descriptor = ctx.property(type_name, property)?;
            let setter = descriptor.setter.as_ref().ok_or_else(|| {
                CodegenError::Unsupported(format!(
                    "property {type_name}.{property} cannot be written"
                ))
            })?;
            value.emit(ctx, f)?;
            f.instruction(&Instruction::Call(ctx.imported(setter)?));
            Ok(())
        }
        Target::Event { type_name, event } => {
            let Expr::Variable(handler) = value else {
                return Err(CodegenError::Unsupported(format!(
                    "handler for {type_name}.{event} must name a subroutine"
                )));
            };
            let descriptor = ctx.event(type_name, event)?;
            let table_index = ctx.subroutine(handler)?;
            f.instruction(&Instruction::I32Const(table_index as i32));
            f.instruction(&Instruction::Call(ctx.imported(&descriptor.subscribe)?));
            Ok(())
        }
    }
}

/// Leave `container` with `value` stored at `indices` on the stack.
///
/// Each level reads the inner container, updates it recursively and writes
/// it back: `a[i][j] = v` becomes `set(a, i, set(get(a, i), j, v))`.
fn emit_store_element(
    container: u32,
    indices: &[Expr],
    value: &Expr,
    ctx: &mut EmissionContext<'_>,
    f: &mut Function,
) -> CodegenResult<()> {
    let ops = ctx.operators();
    let Some((first, rest)) = indices.split_first() else {
        return Err(CodegenError::Unsupported(
            "array assignment without an index".to_string(),
        ));
    };

    if rest.is_empty() {
        f.instruction(&Instruction::LocalGet(container));
        first.emit(ctx, f)?;
        value.emit(ctx, f)?;
        return ctx.call_operator(f, &ops.set_array_value);
    }

    let index = ctx.alloc_local(ValType::I32);
    let inner = ctx.alloc_local(ValType::I32);
    first.emit(ctx, f)?;
    f.instruction(&Instruction::LocalSet(index));
    f.instruction(&Instruction::LocalGet(container));
    f.instruction(&Instruction::LocalGet(index));
    ctx.call_operator(f, &ops.get_array_value)?;
    f.instruction(&Instruction::LocalSet(inner));

    f.instruction(&Instruction::LocalGet(container));
    f.instruction(&Instruction::LocalGet(index));
    emit_store_element(inner, rest, value, ctx, f)?;
    ctx.call_operator(f, &ops.set_array_value)
}

// ══════════════════════════════════════════════════════════════════════════════
// Control flow
// ══════════════════════════════════════════════════════════════════════════════

fn emit_if(
    condition: &Expr,
    then: &[Stmt],
    else_if: &[lexico_types::ir::ElseIf],
    otherwise: &[Stmt],
    ctx: &mut EmissionContext<'_>,
    f: &mut Function,
) -> CodegenResult<()> {
    emit_condition(condition, ctx, f)?;
    ctx.enter(f, Instruction::If(BlockType::Empty));
    emit_all(then, ctx, f)?;

    match else_if.split_first() {
        Some((arm, rest)) => {
            f.instruction(&Instruction::Else);
            emit_if(&arm.condition, &arm.body, rest, otherwise, ctx, f)?;
        }
        None if !otherwise.is_empty() => {
            f.instruction(&Instruction::Else);
            emit_all(otherwise, ctx, f)?;
        }
        None => {}
    }

    ctx.leave(f);
    Ok(())
}

/// `For v = start To end Step step`.
///
/// Start, end and step are evaluated once, before the first iteration. A
/// negative step counts down (`v >= end`), anything else counts up
/// (`v <= end`). Without a step the loop counts up by one.
fn emit_for(
    variable: &str,
    start: &Expr,
    end: &Expr,
    step: Option<&Expr>,
    body: &[Stmt],
    ctx: &mut EmissionContext<'_>,
    f: &mut Function,
) -> CodegenResult<()> {
    let ops = ctx.operators();
    let slot = ctx.slot(variable)?;
    let end_local = ctx.alloc_local(ValType::I32);
    let step_local = ctx.alloc_local(ValType::I32);

    start.emit(ctx, f)?;
    f.instruction(&Instruction::GlobalSet(slot));
    end.emit(ctx, f)?;
    f.instruction(&Instruction::LocalSet(end_local));
    match step {
        Some(step) => step.emit(ctx, f)?,
        None => emit_number(1.0, ctx, f)?,
    }
    f.instruction(&Instruction::LocalSet(step_local));

    let descending = match step {
        Some(_) => {
            let local = ctx.alloc_local(ValType::I32);
            f.instruction(&Instruction::LocalGet(step_local));
            emit_number(0.0, ctx, f)?;
            ctx.call_operator(f, &ops.less_than)?;
            ctx.call_operator(f, &ops.primitive_to_boolean)?;
            f.instruction(&Instruction::LocalSet(local));
            Some(local)
        }
        None => None,
    };

    ctx.enter(f, Instruction::Block(BlockType::Empty));
    ctx.enter(f, Instruction::Loop(BlockType::Empty));

    match descending {
        Some(descending) => {
            f.instruction(&Instruction::LocalGet(descending));
            ctx.enter(f, Instruction::If(BlockType::Result(ValType::I32)));
            f.instruction(&Instruction::GlobalGet(slot));
            f.instruction(&Instruction::LocalGet(end_local));
            ctx.call_operator(f, &ops.greater_than_or_equal_to)?;
            f.instruction(&Instruction::Else);
            f.instruction(&Instruction::GlobalGet(slot));
            f.instruction(&Instruction::LocalGet(end_local));
            ctx.call_operator(f, &ops.less_than_or_equal_to)?;
            ctx.leave(f);
        }
        None => {
            f.instruction(&Instruction::GlobalGet(slot));
            f.instruction(&Instruction::LocalGet(end_local));
            ctx.call_operator(f, &ops.less_than_or_equal_to)?;
        }
    }
    ctx.call_operator(f, &ops.primitive_to_boolean)?;
    f.instruction(&Instruction::I32Eqz);
    f.instruction(&Instruction::BrIf(1));

    emit_all(body, ctx, f)?;

    f.instruction(&Instruction::GlobalGet(slot));
    f.instruction(&Instruction::LocalGet(step_local));
    ctx.call_operator(f, &ops.add)?;
    f.instruction(&Instruction::GlobalSet(slot));
    f.instruction(&Instruction::Br(0));

    ctx.leave(f);
    ctx.leave(f);
    Ok(())
}
