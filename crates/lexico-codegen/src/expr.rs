//! Expression lowering.
//!
//! Every expression leaves exactly one primitive handle (`i32`) on the
//! operand stack.

use lexico_types::ir::{BinaryOp, Expr};
use lexico_library::{OperationHandle, OperatorBindings};
use wasm_encoder::{Function, Instruction, ValType};

use crate::context::EmissionContext;
use crate::error::{CodegenError, CodegenResult};
use crate::lower::{emit_all, prepare_all, Lower};

impl Lower for Expr {
    fn prepare(&self, ctx: &mut EmissionContext<'_>) -> CodegenResult<()> {
        match self {
            Expr::Number(_) | Expr::Variable(_) => Ok(()),
            Expr::Text(text) => ctx.intern_text(text).map(|_| ()),
            Expr::Index { indices, .. } => prepare_all(indices, ctx),
            Expr::Property {
                type_name,
                property,
            } => {
                let descriptor = ctx.property(type_name, property)?;
                let getter = descriptor.getter.as_ref().ok_or_else(|| {
                    CodegenError::Unsupported(format!(
                        "property {type_name}.{property} cannot be read"
                    ))
                })?;
                ctx.import_capability(getter, Vec::new(), vec![ValType::I32]);
                Ok(())
            }
            Expr::Call {
                type_name,
                method,
                args,
            } => {
                let descriptor = ctx.method(type_name, method)?;
                if !descriptor.returns_value {
                    return Err(CodegenError::Unsupported(format!(
                        "{type_name}.{method} returns no value"
                    )));
                }
                prepare_call(ctx, type_name, method, args.len())?;
                prepare_all(args, ctx)
            }
            Expr::Binary { left, right, .. } => {
                left.prepare(ctx)?;
                right.prepare(ctx)
            }
            Expr::Negate(inner) => inner.prepare(ctx),
        }
    }

    fn emit(&self, ctx: &mut EmissionContext<'_>, f: &mut Function) -> CodegenResult<()> {
        let ops = ctx.operators();
        match self {
            Expr::Number(n) => emit_number(*n, ctx, f),
            Expr::Text(text) => {
                let (ptr, len) = ctx.text(text)?;
                f.instruction(&Instruction::I32Const(ptr as i32));
                f.instruction(&Instruction::I32Const(len as i32));
                ctx.call_operator(f, &ops.string_to_primitive)
            }
            Expr::Variable(name) => {
                f.instruction(&Instruction::GlobalGet(ctx.slot(name)?));
                Ok(())
            }
            Expr::Index { array, indices } => {
                f.instruction(&Instruction::GlobalGet(ctx.slot(array)?));
                for index in indices {
                    index.emit(ctx, f)?;
                    ctx.call_operator(f, &ops.get_array_value)?;
                }
                Ok(())
            }
            Expr::Property {
                type_name,
                property,
            } => {
                let descriptor = ctx.property(type_name, property)?;
                let getter = descriptor.getter.as_ref().ok_or_else(|| {
                    CodegenError::Unsupported(format!(
                        "property {type_name}.{property} cannot be read"
                    ))
                })?;
                f.instruction(&Instruction::Call(ctx.imported(getter)?));
                Ok(())
            }
            Expr::Call {
                type_name,
                method,
                args,
            } => {
                let descriptor = ctx.method(type_name, method)?;
                emit_all(args, ctx, f)?;
                f.instruction(&Instruction::Call(ctx.imported(&descriptor.import)?));
                Ok(())
            }
            Expr::Binary { op, left, right } => {
                left.emit(ctx, f)?;
                right.emit(ctx, f)?;
                ctx.call_operator(f, binary_operator(ops, *op))
            }
            Expr::Negate(inner) => {
                inner.emit(ctx, f)?;
                ctx.call_operator(f, &ops.negation)
            }
        }
    }
}

/// Register the import behind a method call and check its arity.
pub(crate) fn prepare_call(
    ctx: &mut EmissionContext<'_>,
    type_name: &str,
    method: &str,
    arg_count: usize,
) -> CodegenResult<()> {
    let descriptor = ctx.method(type_name, method)?;
    if descriptor.param_count != arg_count {
        return Err(CodegenError::Unsupported(format!(
            "{type_name}.{method} takes {} argument(s), {arg_count} given",
            descriptor.param_count
        )));
    }
    let params = vec![ValType::I32; descriptor.param_count];
    let results = if descriptor.returns_value {
        vec![ValType::I32]
    } else {
        Vec::new()
    };
    ctx.import_capability(&descriptor.import, params, results);
    Ok(())
}

/// Construct a primitive from a numeric literal.
pub(crate) fn emit_number(n: f64, ctx: &EmissionContext<'_>, f: &mut Function) -> CodegenResult<()> {
    f.instruction(&Instruction::F64Const(n));
    ctx.call_operator(f, &ctx.operators().number_to_primitive)
}

/// Evaluate a condition to an `i32` truth value.
pub(crate) fn emit_condition(
    condition: &Expr,
    ctx: &mut EmissionContext<'_>,
    f: &mut Function,
) -> CodegenResult<()> {
    condition.emit(ctx, f)?;
    ctx.call_operator(f, &ctx.operators().primitive_to_boolean)
}

fn binary_operator(ops: &OperatorBindings, op: BinaryOp) -> &OperationHandle {
    match op {
        BinaryOp::Add => &ops.add,
        BinaryOp::Subtract => &ops.subtract,
        BinaryOp::Multiply => &ops.multiply,
        BinaryOp::Divide => &ops.divide,
        BinaryOp::GreaterThan => &ops.greater_than,
        BinaryOp::GreaterThanOrEqual => &ops.greater_than_or_equal_to,
        BinaryOp::LessThan => &ops.less_than,
        BinaryOp::LessThanOrEqual => &ops.less_than_or_equal_to,
        BinaryOp::Equal => &ops.equal_to,
        BinaryOp::NotEqual => &ops.not_equal_to,
        BinaryOp::And => &ops.and,
        BinaryOp::Or => &ops.or,
    }
}
