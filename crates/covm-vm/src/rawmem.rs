//! Unsafe raw reads/writes through a `Ptr` address, used by
//! `LOAD_PTR_OFFSET`/`STORE_PTR_OFFSET`.
//!
//! The address may point into `crate::heap`'s `malloc`'d memory, into a
//! coroutine's own [`crate::stack::OperandStack`], or into the shared
//! globals buffer — `LEA_STACK`/`LEA_GLOBAL` hand out addresses into all
//! three, and this module doesn't need to know which, because every one of
//! them is laid out as a flat array of [`RawSlot`]s at the same 16-byte
//! stride. Soundness rests entirely on those buffers never reallocating
//! once a pointer into them has escaped (see `OperandStack`'s module docs);
//! this module has no way to check that itself, so a verified but
//! adversarial program could still hand it a stale or wild address — that
//! case is reported as `BadPointer` rather than trusted.

use crate::error::VmError;
use crate::slot::{RawSlot, SLOT_BYTES};

/// Read `size` consecutive slots starting at `addr + offset_slots * 16`.
///
/// # Safety
/// `addr` must be a live base address into a buffer at least
/// `offset_slots + size` slots long, obtained from `LEA_STACK`, `LEA_GLOBAL`,
/// or a heap allocation.
pub unsafe fn read_slots(addr: usize, offset_slots: u32, size: usize) -> Result<Vec<RawSlot>, VmError> {
    if addr == 0 {
        return Err(VmError::BadPointer(addr));
    }
    let base = addr
        .checked_add(offset_slots as usize * SLOT_BYTES)
        .ok_or(VmError::BadPointer(addr))?;
    let mut out = Vec::with_capacity(size);
    for i in 0..size {
        let slot_addr = base + i * SLOT_BYTES;
        let mut bytes = [0u8; SLOT_BYTES];
        std::ptr::copy_nonoverlapping(slot_addr as *const u8, bytes.as_mut_ptr(), SLOT_BYTES);
        out.push(RawSlot::from_bytes(bytes));
    }
    Ok(out)
}

/// Write `values` as consecutive slots starting at `addr + offset_slots * 16`.
///
/// # Safety
/// Same requirements as [`read_slots`], for a writable buffer.
pub unsafe fn write_slots(addr: usize, offset_slots: u32, values: &[RawSlot]) -> Result<(), VmError> {
    if addr == 0 {
        return Err(VmError::BadPointer(addr));
    }
    let base = addr
        .checked_add(offset_slots as usize * SLOT_BYTES)
        .ok_or(VmError::BadPointer(addr))?;
    for (i, slot) in values.iter().enumerate() {
        let slot_addr = base + i * SLOT_BYTES;
        std::ptr::copy_nonoverlapping(slot.as_bytes().as_ptr(), slot_addr as *mut u8, SLOT_BYTES);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use covm_bytecode::value::Value;

    #[test]
    fn writes_then_reads_back_through_a_real_allocation() {
        let mut buf = vec![RawSlot::ZERO; 4];
        let addr = buf.as_mut_ptr() as usize;
        unsafe {
            write_slots(addr, 1, &[RawSlot::encode(Value::I32(99))]).unwrap();
            let read = read_slots(addr, 1, 1).unwrap();
            assert_eq!(read[0].decode().unwrap(), Value::I32(99));
        }
    }

    #[test]
    fn null_address_is_rejected() {
        let err = unsafe { read_slots(0, 0, 1) }.unwrap_err();
        assert_eq!(err, VmError::BadPointer(0));
    }
}
