//! Resolving an assignable expression to either a direct stack/global slot
//! or a heap address plus slot offset.
//!
//! `LOAD_PTR_OFFSET`/`STORE_PTR_OFFSET`'s offset operand is in slot units —
//! the VM scales it by the slot width before adding it to the popped
//! pointer — so every offset tracked here is a slot count, never a byte
//! count.

use rustc_hash::FxHashMap;

use covm_bytecode::encoder::BytecodeWriter;
use covm_bytecode::program::StructLayout;

use crate::ast::Expression;
use crate::error::CompileError;
use crate::scope::ScopeStack;

/// Where an lvalue's storage lives.
#[derive(Debug, Clone, Copy)]
pub enum LValue {
    /// Directly addressable by `LOAD_VAR`/`STORE_VAR` (or the `_GLOBAL`
    /// pair), no pointer indirection needed.
    Stack {
        /// Slot index within the frame (or global frame).
        slot: u16,
        /// Whether this is a global-frame slot.
        is_global: bool,
        /// Slot count this lvalue occupies.
        size: u8,
    },
    /// Reached through a pointer already pushed on the operand stack by the
    /// resolution process; `offset` (in slots) is passed straight through to
    /// `LOAD_PTR_OFFSET`/`STORE_PTR_OFFSET`.
    Heap {
        /// Slot offset from the pointer's target.
        offset: u32,
    },
}

/// Resolve `expr` to an [`LValue`], emitting whatever `LOAD_VAR`/
/// `LOAD_GLOBAL`/`LOAD_PTR_OFFSET` instructions are needed along the way to
/// materialize intermediate pointers on the stack.
///
/// Only `Variable`, `MemberAccess`, and `Index` expressions are valid
/// lvalues; anything else is an internal-error bug (the type checker should
/// never have accepted it as an assignment target).
pub fn resolve_lvalue(
    expr: &Expression,
    scopes: &ScopeStack,
    structs: &FxHashMap<String, StructLayout>,
    w: &mut BytecodeWriter,
    gen_expr: &mut impl FnMut(&Expression, &mut BytecodeWriter) -> Result<(), CompileError>,
) -> Result<LValue, CompileError> {
    match expr {
        Expression::Variable { name, .. } => {
            let sym = scopes.resolve(name)?;
            Ok(LValue::Stack {
                slot: sym.slot,
                is_global: sym.is_global,
                size: sym.size,
            })
        }
        Expression::MemberAccess { object, member, .. } => {
            let object_lvalue = resolve_lvalue(object, scopes, structs, w, gen_expr)?;
            let object_ty = object.ty().ok_or_else(|| CompileError::InternalError {
                message: "member access object missing a type".into(),
            })?;
            let is_ptr = object_ty.is_ptr();
            let struct_name = object_ty.struct_name().ok_or_else(|| CompileError::InternalError {
                message: "member access on a non-struct, non-pointer-to-struct object".into(),
            })?;
            let layout = structs
                .get(struct_name)
                .ok_or_else(|| CompileError::UndefinedStruct { name: struct_name.to_string() })?;
            let field = layout.field(member).ok_or_else(|| CompileError::UndefinedField {
                struct_name: struct_name.to_string(),
                field_name: member.clone(),
            })?;
            let field_offset = field.offset_slots;

            Ok(match object_lvalue {
                LValue::Stack { slot, is_global, size: _ } => {
                    if is_ptr {
                        if is_global {
                            w.emit_load_global(slot, 1);
                        } else {
                            w.emit_load_var(slot, 1);
                        }
                        LValue::Heap { offset: field_offset }
                    } else {
                        LValue::Stack {
                            slot: slot + field_offset as u16,
                            is_global,
                            size: field.size_slots as u8,
                        }
                    }
                }
                LValue::Heap { offset } => {
                    if is_ptr {
                        w.emit_load_ptr_offset(offset, 1);
                        LValue::Heap { offset: field_offset }
                    } else {
                        LValue::Heap { offset: offset + field_offset }
                    }
                }
            })
        }
        Expression::Index { object, index, .. } => {
            let object_lvalue = resolve_lvalue(object, scopes, structs, w, gen_expr)?;
            match object_lvalue {
                LValue::Stack { slot, is_global, .. } => {
                    if is_global {
                        w.emit_load_global(slot, 1);
                    } else {
                        w.emit_load_var(slot, 1);
                    }
                }
                LValue::Heap { offset } => {
                    w.emit_load_ptr_offset(offset, 1);
                }
            }

            gen_expr(index, w)?;

            let element_size = element_size_slots(object.ty(), structs)?;
            w.emit_push_i32((16 * element_size) as i32);
            w.emit_mul();
            w.emit_add();

            Ok(LValue::Heap { offset: 0 })
        }
        _ => Err(CompileError::InternalError {
            message: "expression is not a valid assignment target".into(),
        }),
    }
}

/// The slot size of one element of the pointer-or-array type `object_ty`
/// names, used to convert an `Index` expression's integer index into a slot
/// offset.
pub fn element_size_slots(
    object_ty: Option<&crate::ast::DataType>,
    structs: &FxHashMap<String, StructLayout>,
) -> Result<u32, CompileError> {
    use crate::ast::DataType;
    let inner = match object_ty {
        Some(DataType::Ptr(inner)) => Some(inner.as_ref()),
        Some(DataType::Array { inner, .. }) => Some(inner.as_ref()),
        _ => None,
    };
    match inner {
        Some(DataType::Struct(name)) => Ok(structs
            .get(name)
            .ok_or_else(|| CompileError::UndefinedStruct { name: name.clone() })?
            .size_slots),
        _ => Ok(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::DataType;
    use covm_bytecode::program::{FieldLayout, StructLayout};

    fn point_layout() -> FxHashMap<String, StructLayout> {
        let mut fields = FxHashMap::default();
        fields.insert("x".into(), FieldLayout { offset_slots: 0, size_slots: 1, is_pointer: false });
        fields.insert("y".into(), FieldLayout { offset_slots: 1, size_slots: 1, is_pointer: false });
        let mut map = FxHashMap::default();
        map.insert(
            "Point".to_string(),
            StructLayout { size_slots: 2, fields, field_order: vec!["x".into(), "y".into()] },
        );
        map
    }

    #[test]
    fn value_typed_member_stays_on_stack() {
        let mut scopes = ScopeStack::new();
        scopes.push_function_scope();
        scopes.define("p", 2).unwrap();

        let expr = Expression::MemberAccess {
            object: Box::new(Expression::Variable { name: "p".into(), ty: DataType::Struct("Point".into()) }),
            member: "y".into(),
            ty: DataType::I32,
        };

        let mut w = BytecodeWriter::new();
        let structs = point_layout();
        let mut noop = |_: &Expression, _: &mut BytecodeWriter| Ok(());
        let lv = resolve_lvalue(&expr, &scopes, &structs, &mut w, &mut noop).unwrap();
        match lv {
            LValue::Stack { slot, .. } => assert_eq!(slot, 1),
            LValue::Heap { .. } => panic!("expected Stack lvalue"),
        }
        assert!(w.buffer().is_empty(), "value-typed member access should not emit loads");
    }

    #[test]
    fn pointer_typed_member_transitions_to_heap() {
        let mut scopes = ScopeStack::new();
        scopes.push_function_scope();
        scopes.define("p", 1).unwrap();

        let expr = Expression::MemberAccess {
            object: Box::new(Expression::Variable {
                name: "p".into(),
                ty: DataType::Ptr(Box::new(DataType::Struct("Point".into()))),
            }),
            member: "y".into(),
            ty: DataType::I32,
        };

        let mut w = BytecodeWriter::new();
        let structs = point_layout();
        let mut noop = |_: &Expression, _: &mut BytecodeWriter| Ok(());
        let lv = resolve_lvalue(&expr, &scopes, &structs, &mut w, &mut noop).unwrap();
        match lv {
            LValue::Heap { offset } => assert_eq!(offset, 1),
            LValue::Stack { .. } => panic!("expected Heap lvalue"),
        }
        assert!(!w.buffer().is_empty(), "pointer-typed member access should load the pointer");
    }
}
