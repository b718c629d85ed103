//! AST-to-bytecode code generation.
//!
//! Generation is a single linear walk straight to bytecode — there is no
//! intermediate register-based IR to lower from. Jump targets within one
//! function are fixed up via [`covm_bytecode::encoder::JumpPlaceholder`]s as
//! soon as they're known; call targets, which may reference a function not
//! yet emitted, are recorded in [`CallPatch`] and fixed up once every
//! function has an address.

use rustc_hash::FxHashMap;

use covm_bytecode::encoder::{patch_jump, BytecodeWriter};
use covm_bytecode::opcode::Opcode;
use covm_bytecode::program::{FunctionInfo, IrProgram, StructLayout};
use covm_bytecode::value::Value;

use crate::ast::{BinaryOp, Block, DataType, Expression, Function, Program, Statement};
use crate::error::{CompileError, CompileResult};
use crate::lvalue::{self, LValue};
use crate::scope::ScopeStack;
use crate::struct_layout::{compute_struct_layouts, frame_slot_size, type_size_slots};

/// A deferred fix-up for a `CALL`/`SPAWN` target address, resolved once
/// every function in the program has a known entry address.
struct CallPatch {
    /// Byte offset of the 4-byte target operand to overwrite.
    pos: usize,
    /// The callee's (possibly struct-qualified) name.
    func_name: String,
}

/// Mutable bookkeeping threaded through expression/statement generation that
/// isn't part of the (read-mostly, recursively-borrowed) scope/struct state:
/// the string pool and its dedup cache, and the list of deferred call
/// patches.
struct GenCtx {
    string_ids: FxHashMap<String, u32>,
    string_pool: Vec<String>,
    call_patches: Vec<CallPatch>,
}

impl GenCtx {
    fn new() -> Self {
        Self {
            string_ids: FxHashMap::default(),
            string_pool: Vec::new(),
            call_patches: Vec::new(),
        }
    }

    fn intern(&mut self, s: &str) -> u32 {
        if let Some(&id) = self.string_ids.get(s) {
            return id;
        }
        let id = self.string_pool.len() as u32;
        self.string_pool.push(s.to_string());
        self.string_ids.insert(s.to_string(), id);
        id
    }
}

/// Compile a typed [`Program`] into an [`IrProgram`].
pub fn generate(program: &Program) -> CompileResult<IrProgram> {
    let structs = compute_struct_layouts(&program.structs)?;
    let mut scopes = ScopeStack::new();
    let mut ctx = GenCtx::new();

    for global in &program.globals {
        // Globals have no prologue to run an `ArrAlloc`: an array-typed
        // global is laid out inline in the global slot array by
        // `generate_globals_init`, at its full element count, not as a
        // heap handle.
        let size = type_size_slots(&global.ty, &structs)? as u8;
        scopes.define(&global.name, size)?;
    }
    let globals_init = generate_globals_init(&program.globals, &structs)?;

    let mut w = BytecodeWriter::new();
    let mut functions: FxHashMap<String, FunctionInfo> = FxHashMap::default();

    for func in &program.functions {
        let mangled_name = mangled_name(func);
        let entry_addr = w.offset() as u32;
        let num_params = func.params.len() as u16;

        scopes.push_function_scope();
        for param in &func.params {
            let size = frame_slot_size(&param.ty, &structs)? as u8;
            scopes.define(&param.name, size)?;
        }

        generate_block(&func.body, &mut scopes, &structs, &mut ctx, &mut w)?;

        if !block_ends_with_return(&func.body) {
            w.emit_push_i32(0);
            w.emit_ret(1);
        }

        let num_slots = scopes.current_slot_count();
        scopes.pop_scope();

        functions.insert(
            mangled_name,
            FunctionInfo {
                entry_addr,
                num_params,
                num_slots,
                is_variadic: func.is_variadic,
            },
        );
    }

    for patch in &ctx.call_patches {
        let target = functions
            .get(&patch.func_name)
            .ok_or_else(|| CompileError::InternalError {
                message: format!("call to undefined function `{}` survived to patch resolution", patch.func_name),
            })?
            .entry_addr;
        w.patch_u32(patch.pos, target);
    }

    Ok(IrProgram {
        bytecode: w.into_bytes(),
        string_pool: ctx.string_pool,
        functions,
        structs,
        globals_init,
    })
}

fn mangled_name(func: &Function) -> String {
    match &func.struct_name {
        Some(struct_name) => format!("{}::{}", struct_name, func.name),
        None => func.name.clone(),
    }
}

fn generate_globals_init(
    globals: &[crate::ast::GlobalDecl],
    structs: &FxHashMap<String, StructLayout>,
) -> CompileResult<Vec<Value>> {
    let mut slots = Vec::new();
    for global in globals {
        let size = type_size_slots(&global.ty, structs)? as usize;
        let values = match &global.init {
            Some(expr) => constant_fold(expr, &global.ty)?,
            None => vec![default_value(&global.ty); size],
        };
        slots.extend(values);
    }
    Ok(slots)
}

/// Global initializers must be compile-time constants — the generator
/// doesn't emit a bytecode prologue to run arbitrary global-init
/// expressions, so anything beyond a literal is rejected here rather than
/// silently misbehaving at run time.
fn constant_fold(expr: &Expression, ty: &DataType) -> CompileResult<Vec<Value>> {
    Ok(match expr {
        Expression::IntegerLiteral { value, .. } => vec![scalar_value(*value, ty)],
        Expression::FloatLiteral { value, is_f32 } => {
            vec![if *is_f32 { Value::F32(*value as f32) } else { Value::F64(*value) }]
        }
        _ => {
            return Err(CompileError::UnsupportedFeature {
                feature: "non-literal global initializer".into(),
            })
        }
    })
}

fn scalar_value(value: i64, ty: &DataType) -> Value {
    match ty {
        DataType::I8 => Value::I8(value as i8),
        DataType::I16 => Value::I16(value as i16),
        DataType::I64 => Value::I64(value),
        _ => Value::I32(value as i32),
    }
}

fn default_value(ty: &DataType) -> Value {
    match ty {
        DataType::F32 => Value::F32(0.0),
        DataType::F64 => Value::F64(0.0),
        _ => Value::I32(0),
    }
}

/// Whether a function body is guaranteed to execute a `return` on every
/// path reaching its end — checked the same shallow way the source
/// language's own compiler does: only the block's last statement (and,
/// recursively, a trailing nested block's last statement) is consulted, not
/// full control-flow reachability. A function that fails this check gets a
/// synthesized `return 0` epilogue.
fn block_ends_with_return(block: &Block) -> bool {
    match block.statements.last() {
        Some(Statement::Return(_)) => true,
        Some(Statement::Block(inner)) => block_ends_with_return(inner),
        _ => false,
    }
}

fn generate_block(
    block: &Block,
    scopes: &mut ScopeStack,
    structs: &FxHashMap<String, StructLayout>,
    ctx: &mut GenCtx,
    w: &mut BytecodeWriter,
) -> CompileResult<()> {
    for stmt in &block.statements {
        generate_statement(stmt, scopes, structs, ctx, w)?;
    }
    Ok(())
}

fn generate_statement(
    stmt: &Statement,
    scopes: &mut ScopeStack,
    structs: &FxHashMap<String, StructLayout>,
    ctx: &mut GenCtx,
    w: &mut BytecodeWriter,
) -> CompileResult<()> {
    match stmt {
        Statement::Expression(expr) => {
            generate_expression(expr, scopes, structs, ctx, w)?;
            w.emit_pop();
        }
        Statement::VariableDeclaration { name, ty, init } => {
            let size = frame_slot_size(ty, structs)? as u8;
            if let Some(init) = init {
                generate_expression(init, scopes, structs, ctx, w)?;
            } else if matches!(ty, DataType::Array { .. }) {
                let slots = type_size_slots(ty, structs)?;
                w.emit_arr_alloc(slots);
            }
            let sym = scopes.define(name, size)?;
            if init.is_some() || matches!(ty, DataType::Array { .. }) {
                if sym.is_global {
                    w.emit_store_global(sym.slot, sym.size);
                } else {
                    w.emit_store_var(sym.slot, sym.size);
                }
            }
        }
        Statement::Return(expr) => {
            generate_expression(expr, scopes, structs, ctx, w)?;
            let size = expr.ty().map(|ty| result_size(ty, structs)).transpose()?.unwrap_or(1);
            w.emit_ret(size);
        }
        Statement::If { condition, then_branch, else_branch } => {
            generate_expression(condition, scopes, structs, ctx, w)?;
            let jump_to_else = w.emit_jump(Opcode::Jz);

            scopes.push_block_scope();
            generate_block(then_branch, scopes, structs, ctx, w)?;
            scopes.pop_scope();
            let jump_to_end = w.emit_jump(Opcode::Jmp);

            patch_jump(w, jump_to_else, w.offset() as u32);
            if let Some(else_branch) = else_branch {
                scopes.push_block_scope();
                generate_block(else_branch, scopes, structs, ctx, w)?;
                scopes.pop_scope();
            }
            patch_jump(w, jump_to_end, w.offset() as u32);
        }
        Statement::For { init, condition, increment, body } => {
            scopes.push_block_scope();
            if let Some(init) = init {
                generate_statement(init, scopes, structs, ctx, w)?;
            }

            let start_label = w.offset() as u32;
            let mut jump_to_exit = None;
            if let Some(condition) = condition {
                generate_expression(condition, scopes, structs, ctx, w)?;
                jump_to_exit = Some(w.emit_jump(Opcode::Jz));
            }

            generate_block(body, scopes, structs, ctx, w)?;

            if let Some(increment) = increment {
                generate_expression(increment, scopes, structs, ctx, w)?;
                w.emit_pop();
            }

            w.emit_opcode(Opcode::Jmp);
            let placeholder_pos = w.offset();
            w.emit_u32(0);
            w.patch_u32(placeholder_pos, start_label);

            if let Some(jump_to_exit) = jump_to_exit {
                patch_jump(w, jump_to_exit, w.offset() as u32);
            }
            scopes.pop_scope();
        }
        Statement::Yield => w.emit_yield(),
        Statement::Block(block) => {
            scopes.push_block_scope();
            generate_block(block, scopes, structs, ctx, w)?;
            scopes.pop_scope();
        }
    }
    Ok(())
}

/// The slot count a struct-typed return value occupies; everything else
/// returns exactly one slot.
fn result_size(ty: &DataType, structs: &FxHashMap<String, StructLayout>) -> CompileResult<u8> {
    Ok(match ty {
        DataType::Struct(name) => structs
            .get(name)
            .ok_or_else(|| CompileError::UndefinedStruct { name: name.clone() })?
            .size_slots as u8,
        _ => 1,
    })
}

/// Generate code that leaves `expr`'s value on top of the operand stack.
pub fn generate_expression(
    expr: &Expression,
    scopes: &ScopeStack,
    structs: &FxHashMap<String, StructLayout>,
    ctx: &mut GenCtx,
    w: &mut BytecodeWriter,
) -> CompileResult<()> {
    match expr {
        Expression::IntegerLiteral { value, ty } => match ty {
            DataType::I64 => w.emit_push_i64(*value),
            DataType::I16 => w.emit_push_i16(*value as i16),
            DataType::I8 => w.emit_push_i8(*value as i8),
            _ => w.emit_push_i32(*value as i32),
        },
        Expression::FloatLiteral { value, is_f32 } => {
            if *is_f32 {
                w.emit_push_f32(*value as f32);
            } else {
                w.emit_push_f64(*value);
            }
        }
        Expression::StringLiteral(s) => {
            let id = ctx.intern(s);
            w.emit_push_str(id);
        }
        Expression::Variable { name, .. } => {
            let sym = scopes.resolve(name)?;
            if sym.is_global {
                w.emit_load_global(sym.slot, sym.size);
            } else {
                w.emit_load_var(sym.slot, sym.size);
            }
        }
        Expression::Binary { op, left, right, ty } => {
            generate_expression(left, scopes, structs, ctx, w)?;
            generate_expression(right, scopes, structs, ctx, w)?;
            let is_float = left.ty().map(|t| t.is_float()).unwrap_or(false) || ty.is_float();
            emit_binary_op(*op, is_float, w);
        }
        Expression::Vararg => w.emit_push_varargs(),
        Expression::MemberAccess { .. } => {
            generate_member_access(expr, scopes, structs, ctx, w)?;
        }
        Expression::Index { object, index, ty } => {
            generate_index(object, index, ty, scopes, structs, ctx, w)?;
        }
        Expression::Assignment { lvalue, value } => {
            generate_assignment(lvalue, value, scopes, structs, ctx, w)?;
        }
        Expression::Increment(lvalue) => generate_incr_decr(lvalue, true, scopes, structs, ctx, w)?,
        Expression::Decrement(lvalue) => generate_incr_decr(lvalue, false, scopes, structs, ctx, w)?,
        Expression::Await(inner) => {
            generate_expression(inner, scopes, structs, ctx, w)?;
            w.emit_await();
        }
        Expression::Spawn(call) => generate_spawn(call, scopes, structs, ctx, w)?,
        Expression::Sizeof(ty) => {
            let slots = type_size_slots(ty, structs)?;
            w.emit_push_i32((slots * 16) as i32);
        }
        Expression::Call { .. } => generate_call(expr, scopes, structs, ctx, w)?,
    }
    Ok(())
}

fn emit_binary_op(op: BinaryOp, is_float: bool, w: &mut BytecodeWriter) {
    match (op, is_float) {
        (BinaryOp::Add, false) => w.emit_add(),
        (BinaryOp::Add, true) => w.emit_add_f(),
        (BinaryOp::Sub, false) => w.emit_sub(),
        (BinaryOp::Sub, true) => w.emit_sub_f(),
        (BinaryOp::Mul, false) => w.emit_mul(),
        (BinaryOp::Mul, true) => w.emit_mul_f(),
        (BinaryOp::Div, false) => w.emit_div(),
        (BinaryOp::Div, true) => w.emit_div_f(),
        (BinaryOp::Eq, false) => w.emit_eq(),
        (BinaryOp::Eq, true) => w.emit_eq_f(),
        (BinaryOp::Le, false) => w.emit_le(),
        (BinaryOp::Le, true) => w.emit_le_f(),
        (BinaryOp::Lt, false) => w.emit_lt(),
        (BinaryOp::Lt, true) => w.emit_lt_f(),
        (BinaryOp::Gt, false) => w.emit_gt(),
        (BinaryOp::Gt, true) => w.emit_gt_f(),
        (BinaryOp::Ge, false) => w.emit_ge(),
        (BinaryOp::Ge, true) => w.emit_ge_f(),
    }
}

fn generate_member_access(
    expr: &Expression,
    scopes: &ScopeStack,
    structs: &FxHashMap<String, StructLayout>,
    ctx: &mut GenCtx,
    w: &mut BytecodeWriter,
) -> CompileResult<()> {
    let ty = expr.ty().ok_or_else(|| CompileError::InternalError {
        message: "member access missing a result type".into(),
    })?;
    let size = result_size(ty, structs)?;

    let mut gen_expr = |e: &Expression, w: &mut BytecodeWriter| generate_expression(e, scopes, structs, ctx, w);
    let resolved = lvalue::resolve_lvalue(expr, scopes, structs, w, &mut gen_expr)?;
    match resolved {
        LValue::Stack { slot, is_global, .. } => {
            if is_global {
                w.emit_load_global(slot, size);
            } else {
                w.emit_load_var(slot, size);
            }
        }
        LValue::Heap { offset } => w.emit_load_ptr_offset(offset, size),
    }
    Ok(())
}

fn generate_index(
    object: &Expression,
    index: &Expression,
    ty: &DataType,
    scopes: &ScopeStack,
    structs: &FxHashMap<String, StructLayout>,
    ctx: &mut GenCtx,
    w: &mut BytecodeWriter,
) -> CompileResult<()> {
    if matches!(object.ty(), Some(DataType::String)) {
        generate_expression(object, scopes, structs, ctx, w)?;
        generate_expression(index, scopes, structs, ctx, w)?;
        w.emit_str_get();
        return Ok(());
    }

    generate_expression(object, scopes, structs, ctx, w)?;
    generate_expression(index, scopes, structs, ctx, w)?;

    let element_size = lvalue::element_size_slots(object.ty(), structs)?;
    w.emit_push_i32((16 * element_size) as i32);
    w.emit_mul();
    w.emit_add();

    let load_size = result_size(ty, structs)?;
    w.emit_load_ptr_offset(0, load_size);
    Ok(())
}

fn generate_assignment(
    lvalue_expr: &Expression,
    value: &Expression,
    scopes: &ScopeStack,
    structs: &FxHashMap<String, StructLayout>,
    ctx: &mut GenCtx,
    w: &mut BytecodeWriter,
) -> CompileResult<()> {
    if let Expression::Index { object, index, ty } = lvalue_expr {
        if matches!(object.ty(), Some(DataType::String)) {
            generate_expression(value, scopes, structs, ctx, w)?;
            generate_expression(object, scopes, structs, ctx, w)?;
            generate_expression(index, scopes, structs, ctx, w)?;
            w.emit_str_set();
            return Ok(());
        }

        generate_expression(value, scopes, structs, ctx, w)?;
        generate_expression(object, scopes, structs, ctx, w)?;
        generate_expression(index, scopes, structs, ctx, w)?;

        let element_size = lvalue::element_size_slots(object.ty(), structs)?;
        w.emit_push_i32((16 * element_size) as i32);
        w.emit_mul();
        w.emit_add();

        let store_size = result_size(ty, structs)?;
        w.emit_store_ptr_offset(0, store_size);
        return Ok(());
    }

    generate_expression(value, scopes, structs, ctx, w)?;

    let size = lvalue_expr.ty().map(|ty| result_size(ty, structs)).transpose()?.unwrap_or(1);
    let mut gen_expr = |e: &Expression, w: &mut BytecodeWriter| generate_expression(e, scopes, structs, ctx, w);
    let resolved = lvalue::resolve_lvalue(lvalue_expr, scopes, structs, w, &mut gen_expr)?;
    match resolved {
        LValue::Stack { slot, is_global, .. } => {
            if is_global {
                w.emit_store_global(slot, size);
            } else {
                w.emit_store_var(slot, size);
            }
        }
        LValue::Heap { offset } => w.emit_store_ptr_offset(offset, size),
    }
    Ok(())
}

fn generate_incr_decr(
    lvalue_expr: &Expression,
    is_increment: bool,
    scopes: &ScopeStack,
    structs: &FxHashMap<String, StructLayout>,
    ctx: &mut GenCtx,
    w: &mut BytecodeWriter,
) -> CompileResult<()> {
    generate_expression(lvalue_expr, scopes, structs, ctx, w)?;
    w.emit_push_i32(1);
    if is_increment {
        w.emit_add();
    } else {
        w.emit_sub();
    }

    let mut gen_expr = |e: &Expression, w: &mut BytecodeWriter| generate_expression(e, scopes, structs, ctx, w);
    let resolved = lvalue::resolve_lvalue(lvalue_expr, scopes, structs, w, &mut gen_expr)?;
    match resolved {
        LValue::Stack { slot, is_global, .. } => {
            if is_global {
                w.emit_store_global(slot, 1);
                w.emit_load_global(slot, 1);
            } else {
                w.emit_store_var(slot, 1);
                w.emit_load_var(slot, 1);
            }
        }
        LValue::Heap { offset } => {
            w.emit_store_ptr_offset(offset, 1);
            generate_expression(lvalue_expr, scopes, structs, ctx, w)?;
        }
    }
    Ok(())
}

fn generate_spawn(
    call: &Expression,
    scopes: &ScopeStack,
    structs: &FxHashMap<String, StructLayout>,
    ctx: &mut GenCtx,
    w: &mut BytecodeWriter,
) -> CompileResult<()> {
    let Expression::Call { name, object, args, .. } = call else {
        return Err(CompileError::InvalidSpawnTarget);
    };

    if object.is_some() || name == "syscall" {
        return Err(CompileError::InvalidSpawnTarget);
    }

    let mut total_slots: u32 = 0;
    for arg in args {
        generate_expression(arg, scopes, structs, ctx, w)?;
        let size = arg.ty().map(|ty| result_size(ty, structs)).transpose()?.unwrap_or(1);
        total_slots += size as u32;
    }
    let mut num_args = pack_num_args(total_slots)?;
    if matches!(args.last(), Some(Expression::Vararg)) {
        num_args |= 0x80;
    }

    let pos = w.offset() + 1;
    ctx.call_patches.push(CallPatch { pos, func_name: name.clone() });
    w.emit_spawn(0, num_args);
    Ok(())
}

/// Pack a generator-computed slot count into the 7 bits `CALL`/`SPAWN`/
/// `SYSCALL` reserve for it (the 8th is the varargs flag).
fn pack_num_args(total_slots: u32) -> CompileResult<u8> {
    if total_slots > 0x7f {
        return Err(CompileError::TooManyParameters);
    }
    Ok(total_slots as u8)
}

fn generate_call(
    expr: &Expression,
    scopes: &ScopeStack,
    structs: &FxHashMap<String, StructLayout>,
    ctx: &mut GenCtx,
    w: &mut BytecodeWriter,
) -> CompileResult<()> {
    let Expression::Call { name, object, args, .. } = expr else {
        return Err(CompileError::InternalError { message: "generate_call given a non-Call expression".into() });
    };

    let mut total_slots: u32 = 0;
    let mut callee_name = name.clone();

    if let Some(object) = object {
        let struct_name = object.ty().and_then(|t| t.struct_name()).ok_or_else(|| {
            CompileError::InternalError {
                message: format!(
                    "method call `{name}` on a receiver that isn't a struct or pointer-to-struct"
                ),
            }
        })?;
        callee_name = format!("{struct_name}::{name}");

        let object_is_pointer = object.ty().map(|t| t.is_ptr()).unwrap_or(false);
        if let Expression::Variable { name: var_name, .. } = object.as_ref() {
            let sym = scopes.resolve(var_name)?;
            if object_is_pointer {
                if sym.is_global {
                    w.emit_load_global(sym.slot, sym.size);
                } else {
                    w.emit_load_var(sym.slot, sym.size);
                }
            } else if sym.is_global {
                w.emit_lea_global(sym.slot);
            } else {
                w.emit_lea_stack(sym.slot);
            }
        } else {
            generate_expression(object, scopes, structs, ctx, w)?;
        }
        total_slots += 1;
    }

    for arg in args {
        generate_expression(arg, scopes, structs, ctx, w)?;
        let size = arg.ty().map(|ty| result_size(ty, structs)).transpose()?.unwrap_or(1);
        total_slots += size as u32;
    }

    let mut num_args = pack_num_args(total_slots)?;
    if matches!(args.last(), Some(Expression::Vararg)) {
        num_args |= 0x80;
    }

    if name == "syscall" {
        w.emit_syscall(num_args);
    } else {
        let pos = w.offset() + 1;
        ctx.call_patches.push(CallPatch { pos, func_name: callee_name });
        w.emit_call(0, num_args);
    }
    Ok(())
}
