//! The cooperative coroutine scheduler.
//!
//! Exactly one coroutine executes at a time (spec's concurrency model):
//! [`Scheduler::run`] always removes the coroutine it's about to step out of
//! `coroutines` before touching it, and only reinserts it (unmodified frame
//! state aside) once the step is done — so nothing here ever holds two
//! `&mut Coroutine` borrows at once, and a coroutine can never observe
//! another coroutine's partially-applied step. Suspension happens at
//! exactly three points, matching spec §5: `YIELD`, `AWAIT` of an unfinished
//! coroutine, and submitting an asynchronous `SYSCALL`.

use std::collections::VecDeque;

use covm_bytecode::program::{FunctionInfo, IrProgram};
use covm_bytecode::value::Value;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::coroutine::Coroutine;
use crate::dispatch::{StepCtx, StepOutcome};
use crate::error::VmError;
use crate::heap::Heap;
use crate::io::{IoBouncePool, IoRequest};
use crate::stack::OperandStack;

/// Runs a loaded program to completion and owns every coroutine, the shared
/// global frame, the heap, and the I/O bounce pool.
pub struct Scheduler {
    program: IrProgram,
    functions_by_addr: FxHashMap<u32, FunctionInfo>,
    coroutines: FxHashMap<u32, Coroutine>,
    ready: VecDeque<u32>,
    /// Target coroutine id -> awaiter coroutine ids parked on its finish.
    waiting_on: FxHashMap<u32, Vec<u32>>,
    /// Finished coroutines' results, consumed on first successful `AWAIT`.
    finished: FxHashMap<u32, Vec<Value>>,
    /// Ids whose finished result has already been consumed by an `AWAIT`,
    /// so a second `AWAIT` of the same id can be told apart from one that
    /// never existed.
    consumed: FxHashSet<u32>,
    globals: OperandStack,
    heap: Heap,
    io: IoBouncePool,
    next_id: u32,
}

impl Scheduler {
    /// Load `program`, ready to run starting from `main`.
    pub fn new(program: IrProgram) -> Result<Self, VmError> {
        let entry = program.functions.get("main").ok_or(VmError::MissingEntryPoint)?;
        let functions_by_addr: FxHashMap<u32, FunctionInfo> = program
            .functions
            .values()
            .map(|info| (info.entry_addr, *info))
            .collect();

        let mut globals = OperandStack::new(program.globals_init.len().max(1));
        globals.extend_to(program.globals_init.len())?;
        for (i, v) in program.globals_init.iter().enumerate() {
            globals.write_at(i, &[crate::slot::RawSlot::encode(*v)])?;
        }

        let main = Coroutine::new(0, entry.entry_addr, entry.num_slots);
        let mut coroutines = FxHashMap::default();
        coroutines.insert(0, main);
        let mut ready = VecDeque::new();
        ready.push_back(0);

        Ok(Self {
            program,
            functions_by_addr,
            coroutines,
            ready,
            waiting_on: FxHashMap::default(),
            finished: FxHashMap::default(),
            consumed: FxHashSet::default(),
            globals,
            heap: Heap::new(),
            io: IoBouncePool::new(),
            next_id: 1,
        })
    }

    /// Run every coroutine to completion and return `main`'s result.
    pub fn run(mut self) -> Result<Vec<Value>, VmError> {
        loop {
            for completion in self.io.drain() {
                self.complete_io(completion)?;
            }

            if let Some(id) = self.ready.pop_front() {
                self.run_one(id)?;
                continue;
            }

            if self.io.has_pending() {
                if let Some(completion) = self.io.recv_blocking() {
                    self.complete_io(completion)?;
                }
                continue;
            }

            if self.coroutines.is_empty() {
                return self
                    .finished
                    .remove(&0)
                    .ok_or(VmError::MissingEntryPoint);
            }

            return Err(VmError::Deadlock(self.coroutines.len()));
        }
    }

    /// Run coroutine `id` until it hits a suspension point, finishes, or
    /// errors.
    fn run_one(&mut self, id: u32) -> Result<(), VmError> {
        let mut coro = self.coroutines.remove(&id).expect("ready queue only names live coroutines");

        loop {
            let outcome = {
                let mut ctx = StepCtx {
                    coro: &mut coro,
                    program: &self.program,
                    globals: &mut self.globals,
                    heap: &mut self.heap,
                    functions_by_addr: &self.functions_by_addr,
                };
                ctx.step()
            };

            match outcome {
                Ok(StepOutcome::Continue) => continue,
                Ok(StepOutcome::Yielded) => {
                    self.coroutines.insert(id, coro);
                    self.ready.push_back(id);
                    return Ok(());
                }
                Ok(StepOutcome::Finished(values)) => {
                    self.finish(id, values);
                    return Ok(());
                }
                Ok(StepOutcome::AwaitRequested(target)) => {
                    if let Some(values) = self.finished.remove(&target) {
                        self.consumed.insert(target);
                        for v in values {
                            coro.stack.push(v)?;
                        }
                        continue;
                    }
                    if self.consumed.contains(&target) {
                        return Err(VmError::ResultAlreadyConsumed(target));
                    }
                    if !self.coroutines.contains_key(&target) && target != id {
                        return Err(VmError::UnknownCoroutine(target));
                    }
                    self.waiting_on.entry(target).or_default().push(id);
                    self.coroutines.insert(id, coro);
                    return Ok(());
                }
                Ok(StepOutcome::SpawnRequested { target, args, variadic: _ }) => {
                    let func = *self
                        .functions_by_addr
                        .get(&target)
                        .ok_or(VmError::UndefinedFunction(target))?;
                    let new_id = self.next_id;
                    self.next_id += 1;
                    let child = Coroutine::spawn_at(new_id, func, args);
                    self.coroutines.insert(new_id, child);
                    self.ready.push_back(new_id);
                    coro.stack.push(Value::I64(new_id as i64))?;
                    continue;
                }
                Ok(StepOutcome::AsyncSyscallRequested { id: syscall_id, args }) => {
                    self.io.submit(IoRequest { coro_id: id, syscall_id, args });
                    self.coroutines.insert(id, coro);
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn finish(&mut self, id: u32, values: Vec<Value>) {
        if let Some(awaiters) = self.waiting_on.remove(&id) {
            self.consumed.insert(id);
            for awaiter_id in awaiters {
                if let Some(awaiter) = self.coroutines.get_mut(&awaiter_id) {
                    for v in values.iter().copied() {
                        let _ = awaiter.stack.push(v);
                    }
                    self.ready.push_back(awaiter_id);
                }
            }
        } else {
            self.finished.insert(id, values);
        }
    }

    fn complete_io(&mut self, completion: crate::io::IoCompletion) -> Result<(), VmError> {
        let coro = self
            .coroutines
            .get_mut(&completion.coro_id)
            .ok_or(VmError::OrphanCompletion(completion.coro_id))?;
        for v in completion.result {
            coro.stack.push(v)?;
        }
        self.ready.push_back(completion.coro_id);
        Ok(())
    }
}
