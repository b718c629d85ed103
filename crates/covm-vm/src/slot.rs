//! The 16-byte wire encoding of a [`Value`], shared by the operand stack and
//! raw heap memory.
//!
//! `LOAD_PTR_OFFSET`/`STORE_PTR_OFFSET` scale their offset operand by a fixed
//! 16-byte slot width and add it to a pointer popped off the stack. For that
//! arithmetic to be meaningful regardless of whether the pointer came from
//! `LEA_STACK`, `LEA_GLOBAL`, or `malloc` (`crate::heap`), every one of those
//! backing stores has to lay its slots out at exactly the same 16-byte
//! stride as this module's encoding — so the stack (`crate::stack`), the
//! global frame (`crate::coroutine`), and the heap all store `RawSlot`, never
//! a native `Value` directly.

use covm_bytecode::value::{StrRef, Value};

use crate::error::VmError;

/// Width of one operand stack / heap slot, in bytes. Matches the abstract
/// "`Value` is a fixed 16 bytes" invariant of the wire format.
pub const SLOT_BYTES: usize = 16;

const TAG_I8: u8 = 0;
const TAG_I16: u8 = 1;
const TAG_I32: u8 = 2;
const TAG_I64: u8 = 3;
const TAG_F32: u8 = 4;
const TAG_F64: u8 = 5;
const TAG_STR: u8 = 6;
const TAG_PTR: u8 = 7;

/// A raw 16-byte slot: one tag byte plus up to 15 payload bytes.
///
/// Byte layout: `[tag, payload[0..8], payload[8..12], padding[12..15]]` —
/// the first 8 payload bytes hold the primary field (the integer, the float
/// bits, or a `Ptr`'s/`Str`'s address as `usize`), the next 4 hold `Str`'s
/// length. Padding bytes are always zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C, align(8))]
pub struct RawSlot([u8; SLOT_BYTES]);

impl RawSlot {
    /// The all-zero slot, used to default-fill freshly allocated frames.
    pub const ZERO: RawSlot = RawSlot([0; SLOT_BYTES]);

    /// Encode a `Value` into its 16-byte wire form.
    pub fn encode(v: Value) -> RawSlot {
        let mut bytes = [0u8; SLOT_BYTES];
        match v {
            Value::I8(n) => {
                bytes[0] = TAG_I8;
                bytes[1..9].copy_from_slice(&(n as i64).to_le_bytes());
            }
            Value::I16(n) => {
                bytes[0] = TAG_I16;
                bytes[1..9].copy_from_slice(&(n as i64).to_le_bytes());
            }
            Value::I32(n) => {
                bytes[0] = TAG_I32;
                bytes[1..9].copy_from_slice(&(n as i64).to_le_bytes());
            }
            Value::I64(n) => {
                bytes[0] = TAG_I64;
                bytes[1..9].copy_from_slice(&n.to_le_bytes());
            }
            Value::F32(n) => {
                bytes[0] = TAG_F32;
                bytes[1..9].copy_from_slice(&(n as f64).to_bits().to_le_bytes());
            }
            Value::F64(n) => {
                bytes[0] = TAG_F64;
                bytes[1..9].copy_from_slice(&n.to_bits().to_le_bytes());
            }
            Value::Str(StrRef { addr, len }) => {
                bytes[0] = TAG_STR;
                bytes[1..9].copy_from_slice(&(addr as u64).to_le_bytes());
                bytes[9..13].copy_from_slice(&len.to_le_bytes());
            }
            Value::Ptr(addr) => {
                bytes[0] = TAG_PTR;
                bytes[1..9].copy_from_slice(&(addr as u64).to_le_bytes());
            }
        }
        RawSlot(bytes)
    }

    /// Decode back into a `Value`. Fails only if the tag byte itself is
    /// corrupt — unreachable for slots this module ever produced.
    pub fn decode(self) -> Result<Value, VmError> {
        let bytes = self.0;
        let primary = u64::from_le_bytes(bytes[1..9].try_into().unwrap());
        Ok(match bytes[0] {
            TAG_I8 => Value::I8(primary as i64 as i8),
            TAG_I16 => Value::I16(primary as i64 as i16),
            TAG_I32 => Value::I32(primary as i64 as i32),
            TAG_I64 => Value::I64(primary as i64),
            TAG_F32 => Value::F32(f64::from_bits(primary) as f32),
            TAG_F64 => Value::F64(f64::from_bits(primary)),
            TAG_STR => {
                let len = u32::from_le_bytes(bytes[9..13].try_into().unwrap());
                Value::Str(StrRef { addr: primary as usize, len })
            }
            TAG_PTR => Value::Ptr(primary as usize),
            other => return Err(VmError::UnknownOpcode(other)),
        })
    }

    /// Raw bytes, for writing directly into heap memory.
    pub fn as_bytes(&self) -> &[u8; SLOT_BYTES] {
        &self.0
    }

    /// Build a slot from raw bytes read out of heap memory.
    pub fn from_bytes(bytes: [u8; SLOT_BYTES]) -> RawSlot {
        RawSlot(bytes)
    }
}
