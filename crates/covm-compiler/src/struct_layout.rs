//! Struct field layout computation.
//!
//! Struct layouts are computed once, before any function body is generated,
//! so that member-access and call codegen can look up field offsets and
//! sizes without re-deriving them mid-walk. Structs may nest other structs
//! by value; layout computation recurses, and a struct can only be laid out
//! once every struct it contains by value is already laid out.

use rustc_hash::FxHashMap;

use covm_bytecode::program::{FieldLayout, StructLayout};

use crate::ast::{DataType, StructDeclaration};
use crate::error::CompileError;

/// The number of slots a type occupies, given the already-computed layouts
/// of every struct it might reference.
pub fn type_size_slots(ty: &DataType, structs: &FxHashMap<String, StructLayout>) -> Result<u32, CompileError> {
    Ok(match ty {
        DataType::Void => 0,
        DataType::I8 | DataType::I16 | DataType::I32 | DataType::I64 => 1,
        DataType::F32 | DataType::F64 => 1,
        DataType::String => 1,
        DataType::Ptr(_) => 1,
        DataType::Array { inner, len } => type_size_slots(inner, structs)? * (*len as u32),
        DataType::Struct(name) => {
            structs
                .get(name)
                .ok_or_else(|| CompileError::UndefinedStruct { name: name.clone() })?
                .size_slots
        }
    })
}

/// The number of frame/global slots a variable of type `ty` occupies.
///
/// This differs from [`type_size_slots`] exactly for arrays: an array is
/// materialized at runtime as a single `ArrAlloc`'d heap handle (see
/// `stack_ops.rs`), so the variable holding it is always one slot wide, even
/// though its element span (what `type_size_slots` reports, and what
/// `ArrAlloc`'s own operand needs) may be much larger.
pub fn frame_slot_size(ty: &DataType, structs: &FxHashMap<String, StructLayout>) -> Result<u32, CompileError> {
    Ok(match ty {
        DataType::Array { .. } => 1,
        other => type_size_slots(other, structs)?,
    })
}

/// Compute layouts for every struct declaration, in an order that respects
/// by-value nesting (a struct embedding another by value must be laid out
/// after its dependency).
pub fn compute_struct_layouts(
    decls: &[StructDeclaration],
) -> Result<FxHashMap<String, StructLayout>, CompileError> {
    let mut layouts: FxHashMap<String, StructLayout> = FxHashMap::default();
    let mut remaining: Vec<&StructDeclaration> = decls.iter().collect();

    while !remaining.is_empty() {
        let before = remaining.len();
        remaining.retain(|decl| {
            if layouts.contains_key(&decl.name) {
                return false;
            }
            match try_layout(decl, &layouts) {
                Ok(Some(layout)) => {
                    layouts.insert(decl.name.clone(), layout);
                    false
                }
                Ok(None) => true, // a dependency isn't laid out yet; retry next pass
                Err(_) => true,
            }
        });
        if remaining.len() == before {
            // No progress: either a genuinely undefined struct (try_layout
            // errors) or a value cycle (try_layout keeps returning `None`
            // because the cycle members never become available).
            if let Some(decl) = remaining.first() {
                return match try_layout(decl, &layouts) {
                    Err(e) => Err(e),
                    Ok(None) => Err(CompileError::RecursiveValueType { name: decl.name.clone() }),
                    Ok(Some(_)) => unreachable!("retain would have removed this decl"),
                };
            }
            break;
        }
    }

    Ok(layouts)
}

fn try_layout(
    decl: &StructDeclaration,
    layouts: &FxHashMap<String, StructLayout>,
) -> Result<Option<StructLayout>, CompileError> {
    let mut fields = FxHashMap::default();
    let mut field_order = Vec::with_capacity(decl.fields.len());
    let mut offset: u32 = 0;

    for field in &decl.fields {
        let is_pointer = field.ty.is_ptr();
        let size_slots = match &field.ty {
            DataType::Struct(name) if !layouts.contains_key(name) => return Ok(None),
            other => type_size_slots(other, layouts)?,
        };
        fields.insert(
            field.name.clone(),
            FieldLayout {
                offset_slots: offset,
                size_slots,
                is_pointer,
            },
        );
        field_order.push(field.name.clone());
        offset += size_slots;
    }

    Ok(Some(StructLayout {
        size_slots: offset,
        fields,
        field_order,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::FieldDecl;

    #[test]
    fn flat_struct_lays_out_fields_sequentially() {
        let point = StructDeclaration {
            name: "Point".into(),
            fields: vec![
                FieldDecl { name: "x".into(), ty: DataType::I32 },
                FieldDecl { name: "y".into(), ty: DataType::I32 },
            ],
        };
        let layouts = compute_struct_layouts(&[point]).unwrap();
        let point = &layouts["Point"];
        assert_eq!(point.size_slots, 2);
        assert_eq!(point.field("x").unwrap().offset_slots, 0);
        assert_eq!(point.field("y").unwrap().offset_slots, 1);
    }

    #[test]
    fn nested_value_struct_recurses_size() {
        let point = StructDeclaration {
            name: "Point".into(),
            fields: vec![
                FieldDecl { name: "x".into(), ty: DataType::I32 },
                FieldDecl { name: "y".into(), ty: DataType::I32 },
            ],
        };
        let line = StructDeclaration {
            name: "Line".into(),
            fields: vec![
                FieldDecl { name: "start".into(), ty: DataType::Struct("Point".into()) },
                FieldDecl { name: "end".into(), ty: DataType::Struct("Point".into()) },
            ],
        };
        let layouts = compute_struct_layouts(&[line, point]).unwrap();
        let line = &layouts["Line"];
        assert_eq!(line.size_slots, 4);
        assert_eq!(line.field("end").unwrap().offset_slots, 2);
        assert!(!line.field("start").unwrap().is_pointer);
    }

    #[test]
    fn self_embedding_struct_is_rejected_as_a_cycle_not_undefined() {
        let bad = StructDeclaration {
            name: "Bad".into(),
            fields: vec![FieldDecl { name: "inner".into(), ty: DataType::Struct("Bad".into()) }],
        };
        let err = compute_struct_layouts(&[bad]).unwrap_err();
        assert!(matches!(err, CompileError::RecursiveValueType { name } if name == "Bad"));
    }

    #[test]
    fn pointer_field_is_one_slot_and_marked_pointer() {
        let node = StructDeclaration {
            name: "Node".into(),
            fields: vec![
                FieldDecl { name: "value".into(), ty: DataType::I32 },
                FieldDecl {
                    name: "next".into(),
                    ty: DataType::Ptr(Box::new(DataType::Struct("Node".into()))),
                },
            ],
        };
        let layouts = compute_struct_layouts(&[node]).unwrap();
        let node = &layouts["Node"];
        assert_eq!(node.size_slots, 2);
        assert!(node.field("next").unwrap().is_pointer);
    }
}
