//! Call/return, syscall dispatch, and coroutine-control opcodes.
//!
//! `CALL`/`RET` manage this coroutine's own frame stack in place. `SPAWN`,
//! `YIELD`, `AWAIT`, and an asynchronous `SYSCALL` don't — each of those is
//! a suspension point the scheduler has to act on (create a coroutine,
//! reschedule, park on another coroutine's completion, or submit to the I/O
//! bounce pool), so they return a `StepOutcome` instead of handling
//! themselves.

use covm_bytecode::opcode::Opcode;
use covm_bytecode::value::Value;

use super::{StepCtx, StepOutcome};
use crate::error::VmError;
use crate::slot::RawSlot;
use crate::syscall::{self, sync_calls, Dispatch};

impl<'a> StepCtx<'a> {
    pub(super) fn exec_calls(&mut self, op: Opcode) -> Result<StepOutcome, VmError> {
        match op {
            Opcode::Call => self.exec_call(),
            Opcode::Ret => self.exec_ret(),
            Opcode::Syscall => self.exec_syscall(),
            Opcode::Spawn => self.exec_spawn(),
            Opcode::Yield => Ok(StepOutcome::Yielded),
            Opcode::Await => self.exec_await(),
            _ => unreachable!("not a call op: {op:?}"),
        }
    }

    fn exec_call(&mut self) -> Result<StepOutcome, VmError> {
        let target = self.fetch_u32();
        let num_args = self.fetch_u8();
        let n_slots = (num_args & 0x7f) as usize;

        let func = *self.functions_by_addr.get(&target).ok_or(VmError::UndefinedFunction(target))?;
        let args_raw = self.coro.stack.pop_n_raw(n_slots)?;

        let num_params = func.num_params as usize;
        let (fixed, extra) = args_raw.split_at(num_params.min(args_raw.len()));
        let varargs = extra
            .iter()
            .map(|s| s.decode())
            .collect::<Result<Vec<Value>, VmError>>()?;

        let new_base = self.coro.stack.len();
        for slot in fixed {
            self.coro.stack.push_raw(*slot)?;
        }
        self.coro.stack.extend_to(new_base + func.num_slots as usize)?;

        self.coro.frames.push(crate::coroutine::CallFrame {
            return_ip: self.coro.ip,
            stack_base: new_base,
            varargs,
        });
        self.coro.ip = func.entry_addr;
        Ok(StepOutcome::Continue)
    }

    fn exec_ret(&mut self) -> Result<StepOutcome, VmError> {
        let size = self.fetch_u8();
        let result_raw = self.coro.stack.pop_n_raw(size as usize)?;
        let frame = self.coro.frames.pop().expect("RET without a frame to return from");
        self.coro.stack.truncate_to(frame.stack_base);

        if self.coro.frames.is_empty() {
            let values = result_raw
                .into_iter()
                .map(RawSlot::decode)
                .collect::<Result<Vec<Value>, VmError>>()?;
            return Ok(StepOutcome::Finished(values));
        }

        self.coro.ip = frame.return_ip;
        for slot in result_raw {
            self.coro.stack.push_raw(slot)?;
        }
        Ok(StepOutcome::Continue)
    }

    fn exec_syscall(&mut self) -> Result<StepOutcome, VmError> {
        let num_args = self.fetch_u8();
        let n_slots = (num_args & 0x7f) as usize;
        let all = self.coro.stack.pop_n(n_slots)?;
        let (id_value, args) = all.split_first().ok_or(VmError::InvalidTag {
            expected: "syscall id",
            found: "no arguments",
        })?;
        let id = id_value
            .as_i64()
            .ok_or(VmError::InvalidTag { expected: "integer", found: id_value.tag_name() })?;

        match syscall::classify(id) {
            Dispatch::Sync => {
                let results = sync_calls::dispatch(self.heap, id, args)?;
                for v in results {
                    self.coro.stack.push(v)?;
                }
                Ok(StepOutcome::Continue)
            }
            Dispatch::Async => Ok(StepOutcome::AsyncSyscallRequested { id, args: args.to_vec() }),
            Dispatch::Unknown => {
                self.coro.stack.push(Value::I64(-1))?;
                Ok(StepOutcome::Continue)
            }
        }
    }

    fn exec_spawn(&mut self) -> Result<StepOutcome, VmError> {
        let target = self.fetch_u32();
        let num_args = self.fetch_u8();
        let n_slots = (num_args & 0x7f) as usize;
        let args = self.coro.stack.pop_n(n_slots)?;
        Ok(StepOutcome::SpawnRequested { target, args, variadic: num_args & 0x80 != 0 })
    }

    fn exec_await(&mut self) -> Result<StepOutcome, VmError> {
        let handle = self.coro.stack.pop()?;
        let id = handle
            .as_i64()
            .ok_or(VmError::InvalidTag { expected: "coroutine handle", found: handle.tag_name() })?;
        Ok(StepOutcome::AwaitRequested(id as u32))
    }
}
