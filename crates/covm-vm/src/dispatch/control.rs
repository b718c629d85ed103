//! Unconditional and conditional jump opcodes.

use covm_bytecode::opcode::Opcode;

use super::{StepCtx, StepOutcome};
use crate::error::VmError;

impl<'a> StepCtx<'a> {
    pub(super) fn exec_control(&mut self, op: Opcode) -> Result<StepOutcome, VmError> {
        match op {
            Opcode::Jmp => {
                let target = self.fetch_u32();
                self.coro.ip = target;
            }
            Opcode::Jz => {
                let target = self.fetch_u32();
                let cond = self.coro.stack.pop()?;
                let is_zero = cond
                    .as_i64()
                    .map(|n| n == 0)
                    .ok_or(VmError::InvalidTag { expected: "integer", found: cond.tag_name() })?;
                if is_zero {
                    self.coro.ip = target;
                }
            }
            _ => unreachable!("not a control op: {op:?}"),
        }
        Ok(StepOutcome::Continue)
    }
}
