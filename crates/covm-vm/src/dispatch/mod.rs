//! Opcode dispatch: one coroutine, one instruction at a time.
//!
//! Split into one file per opcode category (`arithmetic.rs`, `stack_ops.rs`,
//! ...), each contributing an `impl<'a> StepCtx<'a>` block. [`StepCtx::step`] fetches
//! one opcode and routes it to the matching category; everything above one
//! instruction (suspension, scheduling, I/O) is the scheduler's problem, not
//! this module's — a suspending opcode just returns the `StepOutcome` that
//! says so.

mod arithmetic;
mod calls;
mod control;
mod memory;
mod stack_ops;
mod strings;
mod vars;

use covm_bytecode::opcode::Opcode;
use covm_bytecode::program::{FunctionInfo, IrProgram};
use rustc_hash::FxHashMap;

use crate::coroutine::Coroutine;
use crate::error::VmError;
use crate::heap::Heap;
use crate::stack::OperandStack;

/// What happened after running one instruction.
#[derive(Debug)]
pub enum StepOutcome {
    /// Ordinary instruction; keep running this coroutine.
    Continue,
    /// `YIELD`: park this coroutine at the back of the ready queue.
    Yielded,
    /// `AWAIT id`: park this coroutine until coroutine `id` finishes.
    AwaitRequested(u32),
    /// `SPAWN`: create a new coroutine at `target` with `args` on its frame.
    SpawnRequested {
        /// Entry address of the spawned function.
        target: u32,
        /// Already-evaluated argument values, in source order.
        args: Vec<covm_bytecode::value::Value>,
        /// High bit of the original operand: trailing vararg spread.
        variadic: bool,
    },
    /// `SYSCALL` named an id in the asynchronous dispatch table: the
    /// scheduler must submit it to the I/O bounce pool and park this
    /// coroutine until the completion arrives.
    AsyncSyscallRequested {
        /// Syscall id (the first popped argument).
        id: i64,
        /// Remaining arguments, in source order.
        args: Vec<covm_bytecode::value::Value>,
    },
    /// The coroutine's entry function returned: it is finished, with this
    /// result.
    Finished(Vec<covm_bytecode::value::Value>),
}

/// Mutable context one dispatch step runs against: the coroutine being
/// stepped plus the resources shared across the whole program.
pub struct StepCtx<'a> {
    /// The coroutine currently executing.
    pub coro: &'a mut Coroutine,
    /// The program's immutable bytecode, string pool, and tables.
    pub program: &'a IrProgram,
    /// The shared global frame, laid out the same way a coroutine's own
    /// stack is.
    pub globals: &'a mut OperandStack,
    /// The shared `malloc`/`free` heap.
    pub heap: &'a mut Heap,
    /// Reverse index from function entry address to its metadata, built
    /// once at load time (`Vm::load`) so `CALL`/`SPAWN` don't scan the
    /// name-keyed table on every dispatch.
    pub functions_by_addr: &'a FxHashMap<u32, FunctionInfo>,
}

impl<'a> StepCtx<'a> {
    /// Fetch, decode, and execute exactly one instruction.
    pub fn step(&mut self) -> Result<StepOutcome, VmError> {
        let addr = self.coro.ip as usize;
        let byte = *self
            .program
            .bytecode
            .get(addr)
            .ok_or(VmError::UnknownOpcode(0))?;
        let op = Opcode::from_u8(byte).ok_or(VmError::UnknownOpcode(byte))?;
        self.coro.ip += 1;

        use Opcode::*;
        match op {
            Pop | PushI8 | PushI16 | PushI32 | PushI64 | PushF32 | PushF64 | PushStr
            | ArrAlloc | PushVarargs => self.exec_stack_ops(op),

            LoadVar | StoreVar | LoadGlobal | StoreGlobal | LeaStack | LeaGlobal => {
                self.exec_vars(op)
            }

            LoadPtrOffset | StorePtrOffset => self.exec_memory(op),

            Add | Sub | Mul | Div | AddF | SubF | MulF | DivF | Eq | Le | Lt | Gt | Ge | EqF
            | LeF | LtF | GtF | GeF => self.exec_arithmetic(op),

            StrGet | StrSet => self.exec_strings(op),

            Jmp | Jz => self.exec_control(op),

            Call | Syscall | Ret | Spawn | Yield | Await => self.exec_calls(op),

            Halt => Ok(StepOutcome::Finished(Vec::new())),
        }
    }

    // ===== Little-endian operand fetch helpers =====

    fn fetch_u8(&mut self) -> u8 {
        let v = self.program.bytecode[self.coro.ip as usize];
        self.coro.ip += 1;
        v
    }

    fn fetch_i8(&mut self) -> i8 {
        self.fetch_u8() as i8
    }

    fn fetch_u16(&mut self) -> u16 {
        let ip = self.coro.ip as usize;
        let v = u16::from_le_bytes(self.program.bytecode[ip..ip + 2].try_into().unwrap());
        self.coro.ip += 2;
        v
    }

    fn fetch_i16(&mut self) -> i16 {
        self.fetch_u16() as i16
    }

    fn fetch_u32(&mut self) -> u32 {
        let ip = self.coro.ip as usize;
        let v = u32::from_le_bytes(self.program.bytecode[ip..ip + 4].try_into().unwrap());
        self.coro.ip += 4;
        v
    }

    fn fetch_i32(&mut self) -> i32 {
        self.fetch_u32() as i32
    }

    fn fetch_i64(&mut self) -> i64 {
        let ip = self.coro.ip as usize;
        let v = i64::from_le_bytes(self.program.bytecode[ip..ip + 8].try_into().unwrap());
        self.coro.ip += 8;
        v
    }

    fn fetch_f32(&mut self) -> f32 {
        let ip = self.coro.ip as usize;
        let v = f32::from_le_bytes(self.program.bytecode[ip..ip + 4].try_into().unwrap());
        self.coro.ip += 4;
        v
    }

    fn fetch_f64(&mut self) -> f64 {
        let ip = self.coro.ip as usize;
        let v = f64::from_le_bytes(self.program.bytecode[ip..ip + 8].try_into().unwrap());
        self.coro.ip += 8;
        v
    }
}
