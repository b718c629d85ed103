//! Stack manipulation and constant-push opcodes.

use covm_bytecode::opcode::Opcode;
use covm_bytecode::value::{StrRef, Value};

use super::{StepCtx, StepOutcome};
use crate::error::VmError;

impl<'a> StepCtx<'a> {
    pub(super) fn exec_stack_ops(&mut self, op: Opcode) -> Result<StepOutcome, VmError> {
        match op {
            Opcode::Pop => {
                self.coro.stack.pop()?;
            }
            Opcode::PushI8 => {
                let v = self.fetch_i8();
                self.coro.stack.push(Value::I8(v))?;
            }
            Opcode::PushI16 => {
                let v = self.fetch_i16();
                self.coro.stack.push(Value::I16(v))?;
            }
            Opcode::PushI32 => {
                let v = self.fetch_i32();
                self.coro.stack.push(Value::I32(v))?;
            }
            Opcode::PushI64 => {
                let v = self.fetch_i64();
                self.coro.stack.push(Value::I64(v))?;
            }
            Opcode::PushF32 => {
                let v = self.fetch_f32();
                self.coro.stack.push(Value::F32(v))?;
            }
            Opcode::PushF64 => {
                let v = self.fetch_f64();
                self.coro.stack.push(Value::F64(v))?;
            }
            Opcode::PushStr => {
                let id = self.fetch_u32();
                let s = self
                    .program
                    .string_pool
                    .get(id as usize)
                    .ok_or(VmError::BadPointer(id as usize))?;
                self.coro.stack.push(Value::Str(StrRef {
                    addr: s.as_ptr() as usize,
                    len: s.len() as u32,
                }))?;
            }
            Opcode::ArrAlloc => {
                let slots = self.fetch_u32();
                let addr = self.heap.alloc_slots(slots)?;
                self.coro.stack.push(Value::Ptr(addr))?;
            }
            Opcode::PushVarargs => {
                let varargs = self.coro.current_frame().varargs.clone();
                for v in varargs {
                    self.coro.stack.push(v)?;
                }
            }
            _ => unreachable!("not a stack op: {op:?}"),
        }
        Ok(StepOutcome::Continue)
    }
}
