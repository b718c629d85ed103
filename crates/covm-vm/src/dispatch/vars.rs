//! Local/global variable load-store and address-of opcodes.

use covm_bytecode::opcode::Opcode;
use covm_bytecode::value::Value;

use super::{StepCtx, StepOutcome};
use crate::error::VmError;
use crate::slot::SLOT_BYTES;

impl<'a> StepCtx<'a> {
    pub(super) fn exec_vars(&mut self, op: Opcode) -> Result<StepOutcome, VmError> {
        match op {
            Opcode::LoadVar => {
                let slot = self.fetch_u16();
                let size = self.fetch_u8();
                let base = self.coro.current_frame().stack_base + slot as usize;
                let values = self.coro.stack.read_at(base, size as usize)?.to_vec();
                for v in values {
                    self.coro.stack.push_raw(v)?;
                }
            }
            Opcode::StoreVar => {
                let slot = self.fetch_u16();
                let size = self.fetch_u8();
                let values = self.coro.stack.pop_n_raw(size as usize)?;
                let base = self.coro.current_frame().stack_base + slot as usize;
                self.coro.stack.write_at(base, &values)?;
            }
            Opcode::LoadGlobal => {
                let slot = self.fetch_u16();
                let size = self.fetch_u8();
                let values = self.globals.read_at(slot as usize, size as usize)?.to_vec();
                for v in values {
                    self.coro.stack.push_raw(v)?;
                }
            }
            Opcode::StoreGlobal => {
                let slot = self.fetch_u16();
                let size = self.fetch_u8();
                let values = self.coro.stack.pop_n_raw(size as usize)?;
                self.globals.write_at(slot as usize, &values)?;
            }
            Opcode::LeaStack => {
                let slot = self.fetch_u16();
                let base = self.coro.current_frame().stack_base + slot as usize;
                let addr = self.coro.stack.base_address() + base * SLOT_BYTES;
                self.coro.stack.push(Value::Ptr(addr))?;
            }
            Opcode::LeaGlobal => {
                let slot = self.fetch_u16();
                let addr = self.globals.base_address() + slot as usize * SLOT_BYTES;
                self.coro.stack.push(Value::Ptr(addr))?;
            }
            _ => unreachable!("not a var op: {op:?}"),
        }
        Ok(StepOutcome::Continue)
    }
}
