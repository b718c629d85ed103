//! The `Ptr` memory model: real host-allocated memory, addressed by a raw
//! `usize` exactly like `LEA_STACK`/`LEA_GLOBAL` addresses the coroutine's
//! own buffers.
//!
//! `malloc`/`free` (syscall ids 11/12, `crate::syscall::sync_calls`) and
//! `ARR_ALLOC` both go through here. On `cfg(unix)` this is `libc::malloc`/
//! `libc::free`, matching `raya-engine`'s own `target.'cfg(unix)'` split;
//! non-unix targets fall back to `std::alloc` so the crate still links, with
//! the same tracked-size bookkeeping `free` needs either way.

use rustc_hash::FxHashMap;

use crate::error::VmError;
use crate::slot::SLOT_BYTES;

/// Tracks live allocations so `free` can recover the size `malloc` used,
/// and so an out-of-range `LOAD_PTR_OFFSET`/`STORE_PTR_OFFSET` can be
/// reported as `BadPointer` instead of reading wild memory.
#[derive(Debug, Default)]
pub struct Heap {
    #[cfg(not(unix))]
    layouts: FxHashMap<usize, std::alloc::Layout>,
    #[cfg(unix)]
    sizes: FxHashMap<usize, usize>,
}

impl Heap {
    /// An empty heap with nothing allocated yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate `bytes` bytes, zero-initialized, returning its address.
    pub fn alloc(&mut self, bytes: usize) -> Result<usize, VmError> {
        let bytes = bytes.max(1);
        #[cfg(unix)]
        {
            let ptr = unsafe { libc::calloc(bytes, 1) };
            if ptr.is_null() {
                return Err(VmError::BadPointer(0));
            }
            let addr = ptr as usize;
            self.sizes.insert(addr, bytes);
            Ok(addr)
        }
        #[cfg(not(unix))]
        {
            let layout = std::alloc::Layout::from_size_align(bytes, 8).unwrap();
            let ptr = unsafe { std::alloc::alloc_zeroed(layout) };
            if ptr.is_null() {
                return Err(VmError::BadPointer(0));
            }
            let addr = ptr as usize;
            self.layouts.insert(addr, layout);
            Ok(addr)
        }
    }

    /// Allocate room for `slots` `RawSlot`s (`ARR_ALLOC`'s unit).
    pub fn alloc_slots(&mut self, slots: u32) -> Result<usize, VmError> {
        self.alloc(slots as usize * SLOT_BYTES)
    }

    /// Free a previously allocated address. Freeing an address this heap
    /// never handed out (or already freed) is reported as `BadPointer`
    /// rather than trusted blindly — the one bounds check this module keeps,
    /// since a double-free would otherwise corrupt the allocator silently.
    pub fn free(&mut self, addr: usize) -> Result<(), VmError> {
        #[cfg(unix)]
        {
            if self.sizes.remove(&addr).is_none() {
                return Err(VmError::BadPointer(addr));
            }
            unsafe { libc::free(addr as *mut libc::c_void) };
            Ok(())
        }
        #[cfg(not(unix))]
        {
            let layout = self.layouts.remove(&addr).ok_or(VmError::BadPointer(addr))?;
            unsafe { std::alloc::dealloc(addr as *mut u8, layout) };
            Ok(())
        }
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        #[cfg(unix)]
        for addr in self.sizes.keys() {
            unsafe { libc::free(*addr as *mut libc::c_void) };
        }
        #[cfg(not(unix))]
        for (addr, layout) in self.layouts.iter() {
            unsafe { std::alloc::dealloc(*addr as *mut u8, *layout) };
        }
    }
}
