//! Byte-indexed string access opcodes.

use covm_bytecode::opcode::Opcode;
use covm_bytecode::value::{StrRef, Value};

use super::{StepCtx, StepOutcome};
use crate::error::VmError;

impl<'a> StepCtx<'a> {
    pub(super) fn exec_strings(&mut self, op: Opcode) -> Result<StepOutcome, VmError> {
        match op {
            Opcode::StrGet => {
                let index = expect_int(self.coro.stack.pop()?)?;
                let s = expect_str(self.coro.stack.pop()?)?;
                let byte = read_byte(&s, index)?;
                self.coro.stack.push(Value::I32(byte as i32))?;
            }
            Opcode::StrSet => {
                let index = expect_int(self.coro.stack.pop()?)?;
                let s = expect_str(self.coro.stack.pop()?)?;
                let value = expect_int(self.coro.stack.pop()?)?;
                write_byte(&s, index, value as u8)?;
            }
            _ => unreachable!("not a string op: {op:?}"),
        }
        Ok(StepOutcome::Continue)
    }
}

fn expect_int(v: Value) -> Result<i64, VmError> {
    v.as_i64().ok_or(VmError::InvalidTag { expected: "integer", found: v.tag_name() })
}

fn expect_str(v: Value) -> Result<StrRef, VmError> {
    match v {
        Value::Str(r) => Ok(r),
        other => Err(VmError::InvalidTag { expected: "str", found: other.tag_name() }),
    }
}

fn read_byte(s: &StrRef, index: i64) -> Result<u8, VmError> {
    if index < 0 || index as u32 >= s.len {
        return Err(VmError::BadPointer(s.addr + index.max(0) as usize));
    }
    Ok(unsafe { s.as_bytes()[index as usize] })
}

fn write_byte(s: &StrRef, index: i64, value: u8) -> Result<(), VmError> {
    if index < 0 || index as u32 >= s.len {
        return Err(VmError::BadPointer(s.addr + index.max(0) as usize));
    }
    unsafe { *(s.addr as *mut u8).add(index as usize) = value };
    Ok(())
}
