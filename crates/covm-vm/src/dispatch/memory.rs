//! Pointer-offset heap access opcodes.
//!
//! Both opcodes' pointer operand is the last thing pushed by the generator
//! (see `generate_assignment`/`generate_member_access` in `covm-compiler`):
//! `LOAD_PTR_OFFSET` pops just the pointer; `STORE_PTR_OFFSET` pops the
//! pointer first, then the `size` value slots beneath it.

use covm_bytecode::opcode::Opcode;
use covm_bytecode::value::Value;

use super::{StepCtx, StepOutcome};
use crate::error::VmError;
use crate::rawmem;

impl<'a> StepCtx<'a> {
    pub(super) fn exec_memory(&mut self, op: Opcode) -> Result<StepOutcome, VmError> {
        match op {
            Opcode::LoadPtrOffset => {
                let offset = self.fetch_u32();
                let size = self.fetch_u8();
                let addr = expect_ptr(self.coro.stack.pop()?)?;
                let slots = unsafe { rawmem::read_slots(addr, offset, size as usize)? };
                for s in slots {
                    self.coro.stack.push_raw(s)?;
                }
            }
            Opcode::StorePtrOffset => {
                let offset = self.fetch_u32();
                let size = self.fetch_u8();
                let addr = expect_ptr(self.coro.stack.pop()?)?;
                let values = self.coro.stack.pop_n_raw(size as usize)?;
                unsafe { rawmem::write_slots(addr, offset, &values)? };
            }
            _ => unreachable!("not a memory op: {op:?}"),
        }
        Ok(StepOutcome::Continue)
    }
}

fn expect_ptr(v: Value) -> Result<usize, VmError> {
    match v {
        Value::Ptr(addr) => Ok(addr),
        other => Err(VmError::InvalidTag { expected: "ptr", found: other.tag_name() }),
    }
}
