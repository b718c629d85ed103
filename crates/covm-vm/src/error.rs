//! Runtime error taxonomy.
//!
//! Every variant here is one of spec's "runtime fatal" kinds — the VM has no
//! representation for a recoverable runtime error, because a verified
//! program can never reach one (see `covm_bytecode::verify`). The one
//! exception is syscalls, which hand back an in-band negative result instead
//! of unwinding (see `crate::syscall`), since a failed `open()` is ordinary
//! program behavior, not a VM defect.

use thiserror::Error;

/// A fatal VM error. Surfacing one always terminates the whole program, not
/// just the coroutine that hit it — by the time one of these fires, the
/// bytecode has violated an invariant the verifier was supposed to rule out.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    /// Popped past the bottom of a coroutine's own frame.
    #[error("stack underflow")]
    StackUnderflow,
    /// A coroutine's operand stack grew past its fixed reservation.
    #[error("stack overflow (limit {limit} slots)")]
    StackOverflow {
        /// The coroutine's fixed slot capacity.
        limit: usize,
    },
    /// `Opcode::from_u8` failed at a verified-safe instruction boundary —
    /// unreachable unless the loaded program bypassed verification.
    #[error("unknown opcode 0x{0:02x}")]
    UnknownOpcode(u8),
    /// A slot's tag didn't match what the opcode required (e.g. `ADD` on a
    /// `Str`, `STORE_PTR_OFFSET` through a non-`Ptr`).
    #[error("invalid tag: expected {expected}, found {found}")]
    InvalidTag {
        /// What the opcode needed.
        expected: &'static str,
        /// What was actually on the stack.
        found: &'static str,
    },
    /// Integer `DIV`/`MOD` by zero.
    #[error("division by zero")]
    DivideByZero,
    /// An I/O or timer completion arrived tagged for a coroutine id the
    /// scheduler has no record of, or one that already finished.
    #[error("orphan completion for coroutine {0}")]
    OrphanCompletion(u32),
    /// `AWAIT` targeted a coroutine id that never existed.
    #[error("await of unknown coroutine {0}")]
    UnknownCoroutine(u32),
    /// A second `AWAIT` raced a first for the same already-consumed result.
    #[error("coroutine {0} was already awaited and its result consumed")]
    ResultAlreadyConsumed(u32),
    /// The program has no `main` function to start coroutine 0 at.
    #[error("program has no entry point named `main`")]
    MissingEntryPoint,
    /// `CALL`/`SPAWN` targeted an address with no matching function table
    /// entry — unreachable for a verified program.
    #[error("call target {0} does not name a function")]
    UndefinedFunction(u32),
    /// A raw heap pointer read/write landed outside anything the host
    /// allocator or stack/global frame actually owns.
    #[error("dangling or out-of-bounds pointer access at address {0:#x}")]
    BadPointer(usize),
    /// The scheduler ran out of runnable coroutines and pending I/O while at
    /// least one coroutine was still parked on an `AWAIT` with nobody left
    /// who could ever finish it.
    #[error("deadlock: {0} coroutine(s) parked with no runnable work remaining")]
    Deadlock(usize),
}
