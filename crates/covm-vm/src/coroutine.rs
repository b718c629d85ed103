//! Per-coroutine execution state: its private operand stack and call-frame
//! chain.
//!
//! Each coroutine is single-threaded, cooperatively scheduled state — there
//! is never more than one opcode of any coroutine executing at a time
//! (enforced structurally: `Scheduler::run` only ever holds one `Coroutine`
//! out of its map at a time, see `crate::scheduler`).

use covm_bytecode::program::FunctionInfo;
use covm_bytecode::value::Value;

use crate::stack::OperandStack;

/// Default slot capacity reserved for a coroutine's operand stack. Generous
/// enough for deep recursion in the test scenarios without being wasteful;
/// a program that needs more hits `VmError::StackOverflow` rather than
/// silently reallocating (see `OperandStack`'s module docs for why that
/// matters).
pub const DEFAULT_STACK_SLOTS: usize = 64 * 1024;

/// One call frame: where to resume the caller, and where in the operand
/// stack this call's locals begin.
#[derive(Debug, Clone, Default)]
pub struct CallFrame {
    /// Byte address to resume at in the caller, once this frame returns.
    pub return_ip: u32,
    /// Index into the coroutine's `OperandStack` where this frame's slot 0
    /// (its first parameter) lives.
    pub stack_base: usize,
    /// Values collected for this call's trailing variadic argument spread,
    /// consumed by `PUSH_VARARGS`. Empty for a non-variadic call.
    pub varargs: Vec<Value>,
}

/// A coroutine: an independent instruction pointer and operand stack,
/// cooperatively scheduled alongside every other coroutine in the program.
#[derive(Debug)]
pub struct Coroutine {
    /// Unique id, assigned by the scheduler at spawn time. `0` is always the
    /// program's initial (`main`) coroutine.
    pub id: u32,
    /// Current instruction pointer — a byte offset into the shared bytecode
    /// buffer.
    pub ip: u32,
    /// This coroutine's private operand stack.
    pub stack: OperandStack,
    /// Active call frames, innermost last. Never empty while the coroutine
    /// is running; popping the last one means the coroutine has returned
    /// from its entry function and finished.
    pub frames: Vec<CallFrame>,
}

impl Coroutine {
    /// Start a fresh coroutine at `entry_ip`, with `num_slots` local slots
    /// pre-reserved (zeroed) for its entry function's frame.
    pub fn new(id: u32, entry_ip: u32, num_slots: u16) -> Self {
        let mut stack = OperandStack::new(DEFAULT_STACK_SLOTS);
        stack.extend_to(num_slots as usize).expect("entry frame fits the default reservation");
        Self {
            id,
            ip: entry_ip,
            stack,
            frames: vec![CallFrame { return_ip: 0, stack_base: 0, varargs: Vec::new() }],
        }
    }

    /// Start a coroutine at `func`'s entry with already-evaluated `args`
    /// (`SPAWN`'s popped arguments, in source order). Excess args beyond
    /// `func.num_params` become the entry frame's variadic tail, exactly as
    /// a `CALL` into the same function would split them.
    pub fn spawn_at(id: u32, func: FunctionInfo, args: Vec<Value>) -> Self {
        let num_params = func.num_params as usize;
        let split_at = num_params.min(args.len());
        let (fixed, extra) = args.split_at(split_at);

        let mut stack = OperandStack::new(DEFAULT_STACK_SLOTS);
        for v in fixed {
            stack.push(*v).expect("fresh coroutine stack has room for its own parameters");
        }
        stack
            .extend_to(func.num_slots as usize)
            .expect("entry frame fits the default reservation");

        Self {
            id,
            ip: func.entry_addr,
            stack,
            frames: vec![CallFrame { return_ip: 0, stack_base: 0, varargs: extra.to_vec() }],
        }
    }

    /// The currently active frame.
    pub fn current_frame(&self) -> &CallFrame {
        self.frames.last().expect("a running coroutine always has a frame")
    }

    /// Mutable access to the currently active frame.
    pub fn current_frame_mut(&mut self) -> &mut CallFrame {
        self.frames.last_mut().expect("a running coroutine always has a frame")
    }
}
