//! Byte-level bytecode emission: primitive writers, per-opcode emitters, and
//! jump patching.
//!
//! The writer is append-only by design (§4.C): nothing in this module ever
//! shrinks `buffer` or rewrites bytes other than through [`patch_jump`] /
//! [`BytecodeWriter::patch_u32`], which are the only sanctioned fix-ups.

use crate::opcode::Opcode;

/// Append-only bytecode writer.
///
/// Provides primitive little-endian writers plus one `emit_<opcode>` method
/// per instruction in [`Opcode`]. Jump targets that aren't known yet are
/// written as a 4-byte placeholder via [`BytecodeWriter::emit_jump`] and
/// fixed up later with [`patch_jump`].
#[derive(Debug, Default)]
pub struct BytecodeWriter {
    buffer: Vec<u8>,
}

/// A deferred jump fix-up: the position of the 4-byte target operand that
/// `patch_jump` will overwrite once the real address is known.
#[derive(Debug, Clone, Copy)]
pub struct JumpPlaceholder {
    pos: usize,
}

impl BytecodeWriter {
    /// Create a new, empty writer.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Create a writer with pre-reserved capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Current length of the emitted buffer — also the address the next
    /// emitted instruction will land at.
    pub fn offset(&self) -> usize {
        self.buffer.len()
    }

    /// Borrow the buffer emitted so far.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Consume the writer, returning the finished bytecode buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    // ===== Primitive emission =====

    /// Emit a raw byte.
    pub fn emit_u8(&mut self, v: u8) {
        self.buffer.push(v);
    }

    /// Emit a little-endian u16.
    pub fn emit_u16(&mut self, v: u16) {
        self.buffer.extend_from_slice(&v.to_le_bytes());
    }

    /// Emit a little-endian u32.
    pub fn emit_u32(&mut self, v: u32) {
        self.buffer.extend_from_slice(&v.to_le_bytes());
    }

    /// Emit a little-endian i8.
    pub fn emit_i8(&mut self, v: i8) {
        self.buffer.push(v as u8);
    }

    /// Emit a little-endian i16.
    pub fn emit_i16(&mut self, v: i16) {
        self.buffer.extend_from_slice(&v.to_le_bytes());
    }

    /// Emit a little-endian i32.
    pub fn emit_i32(&mut self, v: i32) {
        self.buffer.extend_from_slice(&v.to_le_bytes());
    }

    /// Emit a little-endian i64.
    pub fn emit_i64(&mut self, v: i64) {
        self.buffer.extend_from_slice(&v.to_le_bytes());
    }

    /// Emit a little-endian f32.
    pub fn emit_f32(&mut self, v: f32) {
        self.buffer.extend_from_slice(&v.to_le_bytes());
    }

    /// Emit a little-endian f64.
    pub fn emit_f64(&mut self, v: f64) {
        self.buffer.extend_from_slice(&v.to_le_bytes());
    }

    /// Overwrite 4 bytes at `pos` with `value` (little-endian). Used by
    /// both jump patching and deferred call-target patching.
    pub fn patch_u32(&mut self, pos: usize, value: u32) {
        self.buffer[pos..pos + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Emit a bare opcode byte with no operands.
    pub fn emit_opcode(&mut self, op: Opcode) {
        self.emit_u8(op.to_u8());
    }

    // ===== Stack manipulation & constants =====

    /// Emit `POP`.
    pub fn emit_pop(&mut self) {
        self.emit_opcode(Opcode::Pop);
    }

    /// Emit `PUSH_I8 v`.
    pub fn emit_push_i8(&mut self, v: i8) {
        self.emit_opcode(Opcode::PushI8);
        self.emit_i8(v);
    }

    /// Emit `PUSH_I16 v`.
    pub fn emit_push_i16(&mut self, v: i16) {
        self.emit_opcode(Opcode::PushI16);
        self.emit_i16(v);
    }

    /// Emit `PUSH_I32 v`.
    pub fn emit_push_i32(&mut self, v: i32) {
        self.emit_opcode(Opcode::PushI32);
        self.emit_i32(v);
    }

    /// Emit `PUSH_I64 v`.
    pub fn emit_push_i64(&mut self, v: i64) {
        self.emit_opcode(Opcode::PushI64);
        self.emit_i64(v);
    }

    /// Emit `PUSH_F32 v`.
    pub fn emit_push_f32(&mut self, v: f32) {
        self.emit_opcode(Opcode::PushF32);
        self.emit_f32(v);
    }

    /// Emit `PUSH_F64 v`.
    pub fn emit_push_f64(&mut self, v: f64) {
        self.emit_opcode(Opcode::PushF64);
        self.emit_f64(v);
    }

    /// Emit `PUSH_STR id`.
    pub fn emit_push_str(&mut self, id: u32) {
        self.emit_opcode(Opcode::PushStr);
        self.emit_u32(id);
    }

    /// Emit `ARR_ALLOC slots`.
    pub fn emit_arr_alloc(&mut self, slots: u32) {
        self.emit_opcode(Opcode::ArrAlloc);
        self.emit_u32(slots);
    }

    /// Emit `PUSH_VARARGS`.
    pub fn emit_push_varargs(&mut self) {
        self.emit_opcode(Opcode::PushVarargs);
    }

    // ===== Variables and addresses =====

    /// Emit `LOAD_VAR slot size`.
    pub fn emit_load_var(&mut self, slot: u16, size: u8) {
        self.emit_opcode(Opcode::LoadVar);
        self.emit_u16(slot);
        self.emit_u8(size);
    }

    /// Emit `STORE_VAR slot size`.
    pub fn emit_store_var(&mut self, slot: u16, size: u8) {
        self.emit_opcode(Opcode::StoreVar);
        self.emit_u16(slot);
        self.emit_u8(size);
    }

    /// Emit `LOAD_GLOBAL slot size`.
    pub fn emit_load_global(&mut self, slot: u16, size: u8) {
        self.emit_opcode(Opcode::LoadGlobal);
        self.emit_u16(slot);
        self.emit_u8(size);
    }

    /// Emit `STORE_GLOBAL slot size`.
    pub fn emit_store_global(&mut self, slot: u16, size: u8) {
        self.emit_opcode(Opcode::StoreGlobal);
        self.emit_u16(slot);
        self.emit_u8(size);
    }

    /// Emit `LEA_STACK slot`.
    pub fn emit_lea_stack(&mut self, slot: u16) {
        self.emit_opcode(Opcode::LeaStack);
        self.emit_u16(slot);
    }

    /// Emit `LEA_GLOBAL slot`.
    pub fn emit_lea_global(&mut self, slot: u16) {
        self.emit_opcode(Opcode::LeaGlobal);
        self.emit_u16(slot);
    }

    // ===== Heap access =====

    /// Emit `LOAD_PTR_OFFSET offset size`.
    pub fn emit_load_ptr_offset(&mut self, offset: u32, size: u8) {
        self.emit_opcode(Opcode::LoadPtrOffset);
        self.emit_u32(offset);
        self.emit_u8(size);
    }

    /// Emit `STORE_PTR_OFFSET offset size`.
    pub fn emit_store_ptr_offset(&mut self, offset: u32, size: u8) {
        self.emit_opcode(Opcode::StorePtrOffset);
        self.emit_u32(offset);
        self.emit_u8(size);
    }

    // ===== Arithmetic & comparison (no operands) =====

    /// Emit `ADD`.
    pub fn emit_add(&mut self) {
        self.emit_opcode(Opcode::Add);
    }
    /// Emit `SUB`.
    pub fn emit_sub(&mut self) {
        self.emit_opcode(Opcode::Sub);
    }
    /// Emit `MUL`.
    pub fn emit_mul(&mut self) {
        self.emit_opcode(Opcode::Mul);
    }
    /// Emit `DIV`.
    pub fn emit_div(&mut self) {
        self.emit_opcode(Opcode::Div);
    }
    /// Emit `ADD_F`.
    pub fn emit_add_f(&mut self) {
        self.emit_opcode(Opcode::AddF);
    }
    /// Emit `SUB_F`.
    pub fn emit_sub_f(&mut self) {
        self.emit_opcode(Opcode::SubF);
    }
    /// Emit `MUL_F`.
    pub fn emit_mul_f(&mut self) {
        self.emit_opcode(Opcode::MulF);
    }
    /// Emit `DIV_F`.
    pub fn emit_div_f(&mut self) {
        self.emit_opcode(Opcode::DivF);
    }
    /// Emit `EQ`.
    pub fn emit_eq(&mut self) {
        self.emit_opcode(Opcode::Eq);
    }
    /// Emit `LE`.
    pub fn emit_le(&mut self) {
        self.emit_opcode(Opcode::Le);
    }
    /// Emit `LT`.
    pub fn emit_lt(&mut self) {
        self.emit_opcode(Opcode::Lt);
    }
    /// Emit `GT`.
    pub fn emit_gt(&mut self) {
        self.emit_opcode(Opcode::Gt);
    }
    /// Emit `GE`.
    pub fn emit_ge(&mut self) {
        self.emit_opcode(Opcode::Ge);
    }
    /// Emit `EQ_F`.
    pub fn emit_eq_f(&mut self) {
        self.emit_opcode(Opcode::EqF);
    }
    /// Emit `LE_F`.
    pub fn emit_le_f(&mut self) {
        self.emit_opcode(Opcode::LeF);
    }
    /// Emit `LT_F`.
    pub fn emit_lt_f(&mut self) {
        self.emit_opcode(Opcode::LtF);
    }
    /// Emit `GT_F`.
    pub fn emit_gt_f(&mut self) {
        self.emit_opcode(Opcode::GtF);
    }
    /// Emit `GE_F`.
    pub fn emit_ge_f(&mut self) {
        self.emit_opcode(Opcode::GeF);
    }

    // ===== Strings =====

    /// Emit `STR_GET`.
    pub fn emit_str_get(&mut self) {
        self.emit_opcode(Opcode::StrGet);
    }
    /// Emit `STR_SET`.
    pub fn emit_str_set(&mut self) {
        self.emit_opcode(Opcode::StrSet);
    }

    // ===== Control flow =====

    /// Emit a jump opcode (`JMP` or `JZ`) with a 4-byte zero placeholder,
    /// returning a handle [`patch_jump`] will later use to fix it up.
    pub fn emit_jump(&mut self, op: Opcode) -> JumpPlaceholder {
        debug_assert!(matches!(op, Opcode::Jmp | Opcode::Jz));
        self.emit_opcode(op);
        let pos = self.offset();
        self.emit_u32(0);
        JumpPlaceholder { pos }
    }

    // ===== Calls, syscalls, returns =====

    /// Emit `CALL target num_args`.
    pub fn emit_call(&mut self, target: u32, num_args: u8) {
        self.emit_opcode(Opcode::Call);
        self.emit_u32(target);
        self.emit_u8(num_args);
    }

    /// Emit `SYSCALL num_args`.
    pub fn emit_syscall(&mut self, num_args: u8) {
        self.emit_opcode(Opcode::Syscall);
        self.emit_u8(num_args);
    }

    /// Emit `RET size`.
    pub fn emit_ret(&mut self, size: u8) {
        self.emit_opcode(Opcode::Ret);
        self.emit_u8(size);
    }

    // ===== Coroutine control =====

    /// Emit `SPAWN target num_args`.
    pub fn emit_spawn(&mut self, target: u32, num_args: u8) {
        self.emit_opcode(Opcode::Spawn);
        self.emit_u32(target);
        self.emit_u8(num_args);
    }

    /// Emit `YIELD`.
    pub fn emit_yield(&mut self) {
        self.emit_opcode(Opcode::Yield);
    }

    /// Emit `AWAIT`.
    pub fn emit_await(&mut self) {
        self.emit_opcode(Opcode::Await);
    }

    /// Emit `HALT`.
    pub fn emit_halt(&mut self) {
        self.emit_opcode(Opcode::Halt);
    }
}

/// Patch a previously-emitted jump's 4-byte target operand.
pub fn patch_jump(writer: &mut BytecodeWriter, placeholder: JumpPlaceholder, target: u32) {
    writer.patch_u32(placeholder.pos, target);
}
