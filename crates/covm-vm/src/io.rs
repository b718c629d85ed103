//! The I/O bounce pool: emulates asynchronous completions over a host API
//! that only offers blocking/readiness-based syscalls, by running the real
//! blocking call on a small worker pool and reporting back over a channel.
//!
//! This is the strategy spec's own design notes sanction for this situation
//! ("emulate completions with a thread-pool bounce"), scaled down from
//! `raya-engine`'s multi-worker reactor to the single logical scheduler
//! thread this VM has plus its bounce pool.

use covm_bytecode::value::Value;
use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

/// One coroutine's async syscall, queued for a worker thread.
pub struct IoRequest {
    /// The coroutine id to report the completion back to.
    pub coro_id: u32,
    /// The syscall id (`crate::syscall::SYS_*`).
    pub syscall_id: i64,
    /// Already-evaluated arguments, in source order.
    pub args: Vec<Value>,
}

/// A finished async syscall, ready for the scheduler to resume its
/// coroutine with.
pub struct IoCompletion {
    /// Which coroutine this completes.
    pub coro_id: u32,
    /// The result value(s) to push onto that coroutine's stack.
    pub result: Vec<Value>,
}

/// A bounded pool of worker threads performing blocking syscalls on behalf
/// of parked coroutines.
pub struct IoBouncePool {
    sender: Sender<IoRequest>,
    receiver: Receiver<IoCompletion>,
    in_flight: Mutex<usize>,
}

impl IoBouncePool {
    /// Spawn a pool sized to the host's CPU count (at least one worker).
    pub fn new() -> Self {
        let (req_tx, req_rx) = unbounded::<IoRequest>();
        let (comp_tx, comp_rx) = unbounded::<IoCompletion>();

        let workers = num_cpus::get().max(1);
        for _ in 0..workers {
            let req_rx = req_rx.clone();
            let comp_tx = comp_tx.clone();
            std::thread::spawn(move || {
                while let Ok(req) = req_rx.recv() {
                    let result = crate::syscall::async_calls::run(req.syscall_id, &req.args);
                    if comp_tx.send(IoCompletion { coro_id: req.coro_id, result }).is_err() {
                        break;
                    }
                }
            });
        }

        Self { sender: req_tx, receiver: comp_rx, in_flight: Mutex::new(0) }
    }

    /// Submit an async syscall for background execution.
    pub fn submit(&self, req: IoRequest) {
        *self.in_flight.lock() += 1;
        let _ = self.sender.send(req);
    }

    /// `true` if any submitted request hasn't completed yet.
    pub fn has_pending(&self) -> bool {
        *self.in_flight.lock() > 0
    }

    /// Drain every completion currently available without blocking.
    pub fn drain(&self) -> Vec<IoCompletion> {
        let mut out = Vec::new();
        while let Ok(c) = self.receiver.try_recv() {
            *self.in_flight.lock() -= 1;
            out.push(c);
        }
        out
    }

    /// Block until at least one completion arrives. Only valid to call when
    /// `has_pending()` is true — the scheduler only reaches for this when it
    /// has nothing runnable but knows a worker is still owed a reply.
    pub fn recv_blocking(&self) -> Option<IoCompletion> {
        match self.receiver.recv() {
            Ok(c) => {
                *self.in_flight.lock() -= 1;
                Some(c)
            }
            Err(_) => None,
        }
    }
}

impl Default for IoBouncePool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submitted_sleep_eventually_completes() {
        let pool = IoBouncePool::new();
        pool.submit(IoRequest { coro_id: 1, syscall_id: crate::syscall::SYS_SLEEP, args: vec![Value::I32(1)] });
        assert!(pool.has_pending());
        let completion = pool.recv_blocking().unwrap();
        assert_eq!(completion.coro_id, 1);
        assert!(!pool.has_pending());
    }
}
