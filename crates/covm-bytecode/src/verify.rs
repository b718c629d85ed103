//! Structural verification of an [`IrProgram`] before it is handed to the VM.
//!
//! The VM trusts a verified program completely — no bounds checks are
//! repeated at dispatch time. `verify_program` is where all of that trust
//! gets earned, once, up front.

use thiserror::Error;

use crate::opcode::Opcode;
use crate::program::IrProgram;

/// A structural defect found while verifying a program.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    /// An opcode byte doesn't name a valid instruction.
    #[error("invalid opcode 0x{byte:02x} at address {addr}")]
    InvalidOpcode {
        /// Byte offset of the bad opcode.
        addr: u32,
        /// The raw byte that failed to decode.
        byte: u8,
    },
    /// An instruction's operand bytes run past the end of the bytecode buffer.
    #[error("truncated operand for opcode at address {addr}")]
    TruncatedOperand {
        /// Byte offset of the opcode whose operand is truncated.
        addr: u32,
    },
    /// A `CALL`/`JMP`/`JZ`/`SPAWN` target is out of bounds or not on an
    /// instruction boundary.
    #[error("branch/call target {target} at address {addr} is out of bounds or misaligned")]
    BadTarget {
        /// Byte offset of the branching instruction.
        addr: u32,
        /// The target address it names.
        target: u32,
    },
    /// A `PUSH_STR` id is out of range for the string pool.
    #[error("string pool id {id} at address {addr} is out of range (pool has {pool_len})")]
    BadStringId {
        /// Byte offset of the `PUSH_STR` instruction.
        addr: u32,
        /// The offending id.
        id: u32,
        /// Size of the string pool.
        pool_len: usize,
    },
    /// A function's `num_slots` is smaller than its `num_params`.
    #[error("function `{name}` has num_slots {num_slots} < num_params {num_params}")]
    SlotCountUnderflowsParams {
        /// The function's name.
        name: String,
        /// Declared frame slot count.
        num_slots: u16,
        /// Declared parameter count.
        num_params: u16,
    },
    /// A `LOAD_VAR`/`STORE_VAR` slot index is out of range for the
    /// enclosing function's declared slot count.
    #[error("slot {slot} at address {addr} is out of range for function `{func}` ({num_slots} slots)")]
    BadLocalSlot {
        /// Byte offset of the instruction.
        addr: u32,
        /// The enclosing function's name.
        func: String,
        /// The offending slot index.
        slot: u16,
        /// The function's declared slot count.
        num_slots: u16,
    },
    /// A function's declared entry address does not land on an instruction
    /// boundary actually reachable by the linear scan.
    #[error("function `{name}` entry address {entry_addr} does not land on an instruction boundary")]
    BadFunctionEntry {
        /// The function's name.
        name: String,
        /// Its declared entry address.
        entry_addr: u32,
    },
}

/// Verify every structural invariant a well-formed [`IrProgram`] must
/// satisfy, returning every violation found (not just the first) so a
/// caller can report them all at once.
pub fn verify_program(program: &IrProgram) -> Result<(), Vec<VerifyError>> {
    let mut errors = Vec::new();
    let code = &program.bytecode;

    let mut boundaries = vec![false; code.len() + 1];
    // Branch/call targets are checked against `boundaries` only once the
    // table is complete (below) — a forward jump's target address hasn't
    // been visited yet at the point its own instruction is decoded, so
    // checking inline here would reject every forward jump.
    let mut branch_targets: Vec<(u32, u32)> = Vec::new();

    let mut ip: usize = 0;
    while ip < code.len() {
        boundaries[ip] = true;
        let addr = ip as u32;
        let op_byte = code[ip];
        let op = match Opcode::from_u8(op_byte) {
            Some(op) => op,
            None => {
                errors.push(VerifyError::InvalidOpcode { addr, byte: op_byte });
                ip += 1;
                continue;
            }
        };
        ip += 1;
        let operand_len = op.operand_len();
        if ip + operand_len > code.len() {
            errors.push(VerifyError::TruncatedOperand { addr });
            break;
        }

        match op {
            Opcode::PushStr => {
                let id = read_u32(code, ip);
                if id as usize >= program.string_pool.len() {
                    errors.push(VerifyError::BadStringId {
                        addr,
                        id,
                        pool_len: program.string_pool.len(),
                    });
                }
            }
            Opcode::Jmp | Opcode::Jz | Opcode::Call | Opcode::Spawn => {
                let target = read_u32(code, ip);
                branch_targets.push((addr, target));
            }
            _ => {}
        }

        ip += operand_len;
    }
    boundaries[code.len()] = true;

    for (addr, target) in branch_targets {
        if target as usize >= code.len() || !boundaries[target as usize] {
            errors.push(VerifyError::BadTarget { addr, target });
        }
    }

    for (name, info) in &program.functions {
        if info.num_slots < info.num_params {
            errors.push(VerifyError::SlotCountUnderflowsParams {
                name: name.clone(),
                num_slots: info.num_slots,
                num_params: info.num_params,
            });
        }
        if (info.entry_addr as usize) > code.len() || !boundaries[info.entry_addr as usize] {
            errors.push(VerifyError::BadFunctionEntry {
                name: name.clone(),
                entry_addr: info.entry_addr,
            });
        }
    }

    verify_local_slots(program, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Second pass: re-walk the bytecode attributing each `LOAD_VAR`/`STORE_VAR`
/// to its enclosing function (by address range) and checking the slot index
/// against that function's declared `num_slots`. Requires the first pass to
/// have already confirmed opcodes decode cleanly.
fn verify_local_slots(program: &IrProgram, errors: &mut Vec<VerifyError>) {
    let mut funcs: Vec<_> = program.functions.iter().collect();
    funcs.sort_by_key(|(_, info)| info.entry_addr);

    let code = &program.bytecode;
    let mut ip: usize = 0;
    while ip < code.len() {
        let addr = ip as u32;
        let op = match Opcode::from_u8(code[ip]) {
            Some(op) => op,
            None => break,
        };
        ip += 1;
        let operand_len = op.operand_len();
        if ip + operand_len > code.len() {
            break;
        }

        if matches!(op, Opcode::LoadVar | Opcode::StoreVar) {
            let slot = u16::from_le_bytes(code[ip..ip + 2].try_into().unwrap());
            if let Some((name, info)) = funcs
                .iter()
                .rev()
                .find(|(_, info)| info.entry_addr <= addr)
            {
                if slot >= info.num_slots {
                    errors.push(VerifyError::BadLocalSlot {
                        addr,
                        func: (*name).clone(),
                        slot,
                        num_slots: info.num_slots,
                    });
                }
            }
        }

        ip += operand_len;
    }
}

fn read_u32(code: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes(code[pos..pos + 4].try_into().unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::BytecodeWriter;
    use crate::program::FunctionInfo;

    fn function(entry_addr: u32, num_params: u16, num_slots: u16) -> FunctionInfo {
        FunctionInfo {
            entry_addr,
            num_params,
            num_slots,
            is_variadic: false,
        }
    }

    #[test]
    fn accepts_well_formed_program() {
        let mut w = BytecodeWriter::new();
        w.emit_push_i32(2);
        w.emit_push_i32(3);
        w.emit_add();
        w.emit_ret(1);

        let mut program = IrProgram::new();
        program.bytecode = w.into_bytes();
        program.functions.insert("main".into(), function(0, 0, 0));

        assert!(verify_program(&program).is_ok());
    }

    #[test]
    fn rejects_out_of_range_call_target() {
        let mut w = BytecodeWriter::new();
        w.emit_call(999, 0);
        w.emit_ret(0);

        let mut program = IrProgram::new();
        program.bytecode = w.into_bytes();
        program.functions.insert("main".into(), function(0, 0, 0));

        let errs = verify_program(&program).unwrap_err();
        assert!(matches!(errs[0], VerifyError::BadTarget { target: 999, .. }));
    }

    #[test]
    fn rejects_out_of_range_string_id() {
        let mut w = BytecodeWriter::new();
        w.emit_push_str(7);
        w.emit_ret(0);

        let mut program = IrProgram::new();
        program.bytecode = w.into_bytes();
        program.functions.insert("main".into(), function(0, 0, 0));

        let errs = verify_program(&program).unwrap_err();
        assert!(matches!(errs[0], VerifyError::BadStringId { id: 7, .. }));
    }

    #[test]
    fn rejects_slot_out_of_range_for_function() {
        let mut w = BytecodeWriter::new();
        w.emit_load_var(5, 1);
        w.emit_ret(0);

        let mut program = IrProgram::new();
        program.bytecode = w.into_bytes();
        program.functions.insert("main".into(), function(0, 0, 2));

        let errs = verify_program(&program).unwrap_err();
        assert!(errs
            .iter()
            .any(|e| matches!(e, VerifyError::BadLocalSlot { slot: 5, .. })));
    }

    #[test]
    fn rejects_jump_into_the_middle_of_an_instruction() {
        let mut w = BytecodeWriter::new();
        let jmp = w.emit_jump(Opcode::Jmp);
        crate::encoder::patch_jump(&mut w, jmp, 1); // the middle of its own operand
        w.emit_ret(0);

        let mut program = IrProgram::new();
        program.bytecode = w.into_bytes();
        program.functions.insert("main".into(), function(0, 0, 0));

        let errs = verify_program(&program).unwrap_err();
        assert!(matches!(errs[0], VerifyError::BadTarget { target: 1, .. }));
    }

    #[test]
    fn accepts_a_forward_jump_landing_on_the_next_instruction_boundary() {
        let mut w = BytecodeWriter::new();
        let jz = w.emit_jump(Opcode::Jz);
        w.emit_push_i32(1);
        w.emit_pop();
        let target = w.offset() as u32;
        crate::encoder::patch_jump(&mut w, jz, target);
        w.emit_ret(0);

        let mut program = IrProgram::new();
        program.bytecode = w.into_bytes();
        program.functions.insert("main".into(), function(0, 0, 0));

        assert!(verify_program(&program).is_ok());
    }

    #[test]
    fn rejects_num_slots_below_num_params() {
        let mut w = BytecodeWriter::new();
        w.emit_ret(0);

        let mut program = IrProgram::new();
        program.bytecode = w.into_bytes();
        program.functions.insert("main".into(), function(0, 3, 1));

        let errs = verify_program(&program).unwrap_err();
        assert!(errs
            .iter()
            .any(|e| matches!(e, VerifyError::SlotCountUnderflowsParams { .. })));
    }
}
