//! Top-level entry point: load a program, run it to completion.

use covm_bytecode::program::IrProgram;
use covm_bytecode::value::Value;

use crate::error::VmError;
use crate::scheduler::Scheduler;

/// Run `program` to completion, starting `main` as coroutine 0, and return
/// its final result value(s).
///
/// `program` is assumed already verified (`covm_bytecode::verify_program`) —
/// this crate never re-checks bounds or operand shapes at dispatch time, by
/// design (see `covm_bytecode::verify`'s module docs). Running an
/// unverified program is not memory-unsafe, but an adversarial one can
/// still trip `VmError` variants this crate otherwise never produces from a
/// well-formed one (`UnknownOpcode`, `UndefinedFunction`, ...).
pub fn run(program: IrProgram) -> Result<Vec<Value>, VmError> {
    Scheduler::new(program)?.run()
}
