//! The tagged runtime value: the VM's 16-byte operand stack slot.

/// A tagged value occupying one operand-stack slot.
///
/// Numeric widening always follows an explicit opcode choice (`PUSH_I8` vs
/// `PUSH_I32`, `ADD` vs `ADD_F`, ...) — there is no implicit promotion.
/// `Str` and `Ptr` both carry a raw host address; `Str` additionally carries
/// a byte length. A value's tag is always consistent with the bytes
/// currently interpreted — reads that dispatch on tag are total, so callers
/// should prefer the typed accessors below over matching `Value` directly
/// when they only care about "is this a number" or similar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// 8-bit signed integer.
    I8(i8),
    /// 16-bit signed integer.
    I16(i16),
    /// 32-bit signed integer.
    I32(i32),
    /// 64-bit signed integer.
    I64(i64),
    /// 32-bit float.
    F32(f32),
    /// 64-bit float.
    F64(f64),
    /// A string: a raw pointer into either the program's string pool or a
    /// heap buffer, plus a byte length. Byte-indexed mutation (`STR_SET`)
    /// is only sound against a heap-buffer-backed string; mutating a
    /// pool-backed literal is a VM-level footgun the source language is
    /// expected not to do, exactly as writing through a bad pointer would
    /// be in the source C-like language itself.
    Str(StrRef),
    /// An opaque raw host-memory address, meaningless to the VM beyond
    /// pointer arithmetic and the `LOAD_PTR_OFFSET`/`STORE_PTR_OFFSET` pair.
    Ptr(usize),
}

/// A string value's raw backing: address plus length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrRef {
    /// Raw byte address of the first byte.
    pub addr: usize,
    /// Length in bytes.
    pub len: u32,
}

impl StrRef {
    /// Borrow the bytes at this reference.
    ///
    /// # Safety
    /// The caller must ensure `addr..addr+len` is a live, readable region —
    /// true for string-pool-derived references for the program's whole
    /// lifetime, and for heap-buffer-derived ones until the owning `free`.
    pub unsafe fn as_bytes(&self) -> &[u8] {
        std::slice::from_raw_parts(self.addr as *const u8, self.len as usize)
    }
}

impl Value {
    /// The number of stack slots a single `Value` occupies. Every variant
    /// occupies exactly one; aggregates (structs, arrays) are sequences of
    /// slots, never a single wide `Value`.
    pub const SLOT_COUNT: usize = 1;

    /// Human-readable tag name, used by the disassembler and error messages.
    pub fn tag_name(&self) -> &'static str {
        match self {
            Value::I8(_) => "i8",
            Value::I16(_) => "i16",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::Str(_) => "str",
            Value::Ptr(_) => "ptr",
        }
    }

    /// Widen any integer variant to `i64`. Panics (VM-fatal `InvalidTag`
    /// path, see `covm-vm`) if called on a non-integer.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::I8(v) => Some(v as i64),
            Value::I16(v) => Some(v as i64),
            Value::I32(v) => Some(v as i64),
            Value::I64(v) => Some(v),
            _ => None,
        }
    }

    /// Widen any float variant to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::F32(v) => Some(v as f64),
            Value::F64(v) => Some(v),
            _ => None,
        }
    }

    /// `true` for `I8`/`I16`/`I32`/`I64`.
    pub fn is_integer(&self) -> bool {
        matches!(self, Value::I8(_) | Value::I16(_) | Value::I32(_) | Value::I64(_))
    }

    /// `true` for `F32`/`F64`.
    pub fn is_float(&self) -> bool {
        matches!(self, Value::F32(_) | Value::F64(_))
    }
}
