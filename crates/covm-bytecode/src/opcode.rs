//! Bytecode opcodes for the covm VM.
//!
//! All opcodes are single-byte instructions. Operand schedules are fixed per
//! opcode (little-endian, byte-aligned) — see the module-level table below
//! and [`disasm`](crate::disasm) for the canonical decode of each one.
//!
//! Opcodes are grouped by category:
//! - 0x00-0x0F: stack manipulation & constants
//! - 0x10-0x1F: local/global variables and addresses
//! - 0x20-0x2F: heap (pointer-offset) access
//! - 0x30-0x3F: integer arithmetic
//! - 0x40-0x4F: float arithmetic
//! - 0x50-0x5F: integer comparison
//! - 0x60-0x6F: float comparison
//! - 0x70-0x7F: string operations
//! - 0x80-0x8F: control flow
//! - 0x90-0x9F: calls, syscalls, returns
//! - 0xA0-0xAF: coroutine control
//! - 0xFF: halt

/// A single bytecode instruction opcode.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // ===== Stack manipulation & constants (0x00-0x0F) =====
    /// Pop and discard the top operand stack value.
    Pop = 0x00,
    /// Push an 8-bit signed integer constant (operand: i8).
    PushI8 = 0x01,
    /// Push a 16-bit signed integer constant (operand: i16).
    PushI16 = 0x02,
    /// Push a 32-bit signed integer constant (operand: i32).
    PushI32 = 0x03,
    /// Push a 64-bit signed integer constant (operand: i64).
    PushI64 = 0x04,
    /// Push a 32-bit float constant (operand: f32).
    PushF32 = 0x05,
    /// Push a 64-bit float constant (operand: f64).
    PushF64 = 0x06,
    /// Push a string value from the string pool (operand: u32 id).
    PushStr = 0x07,
    /// Allocate a value-backed array, pushing its handle (operand: u32 slots).
    ArrAlloc = 0x08,
    /// Push the `Value`s collected as this call's variadic tail.
    PushVarargs = 0x09,

    // ===== Variables and addresses (0x10-0x1F) =====
    /// Load `size` slots starting at `stack_base + slot` (operands: u16 slot, u8 size).
    LoadVar = 0x10,
    /// Store `size` slots starting at `stack_base + slot` (operands: u16 slot, u8 size).
    StoreVar = 0x11,
    /// Load `size` slots from the global scope (operands: u16 slot, u8 size).
    LoadGlobal = 0x12,
    /// Store `size` slots into the global scope (operands: u16 slot, u8 size).
    StoreGlobal = 0x13,
    /// Push a `Ptr` to a local slot's storage (operand: u16 slot).
    LeaStack = 0x14,
    /// Push a `Ptr` to a global slot's storage (operand: u16 slot).
    LeaGlobal = 0x15,

    // ===== Heap access (0x20-0x2F) =====
    /// Load `size` slots from `(pointer on stack) + offset` (operands: u32 offset, u8 size).
    LoadPtrOffset = 0x20,
    /// Store `size` slots to `(pointer on stack) + offset` (operands: u32 offset, u8 size).
    StorePtrOffset = 0x21,

    // ===== Integer arithmetic (0x30-0x3F) =====
    /// Integer add: pop b, pop a, push a + b.
    Add = 0x30,
    /// Integer subtract: pop b, pop a, push a - b.
    Sub = 0x31,
    /// Integer multiply: pop b, pop a, push a * b.
    Mul = 0x32,
    /// Integer divide: pop b, pop a, push a / b. Fatal `DivideByZero` if b == 0.
    Div = 0x33,

    // ===== Float arithmetic (0x40-0x4F) =====
    /// Float add: pop b, pop a, push a + b.
    AddF = 0x40,
    /// Float subtract: pop b, pop a, push a - b.
    SubF = 0x41,
    /// Float multiply: pop b, pop a, push a * b.
    MulF = 0x42,
    /// Float divide: pop b, pop a, push a / b.
    DivF = 0x43,

    // ===== Integer comparison (0x50-0x5F) =====
    /// Integer equal: pushes I32 0 or 1.
    Eq = 0x50,
    /// Integer less-or-equal: pushes I32 0 or 1.
    Le = 0x51,
    /// Integer less-than: pushes I32 0 or 1.
    Lt = 0x52,
    /// Integer greater-than: pushes I32 0 or 1.
    Gt = 0x53,
    /// Integer greater-or-equal: pushes I32 0 or 1.
    Ge = 0x54,

    // ===== Float comparison (0x60-0x6F) =====
    /// Float equal: pushes I32 0 or 1.
    EqF = 0x60,
    /// Float less-or-equal: pushes I32 0 or 1.
    LeF = 0x61,
    /// Float less-than: pushes I32 0 or 1.
    LtF = 0x62,
    /// Float greater-than: pushes I32 0 or 1.
    GtF = 0x63,
    /// Float greater-or-equal: pushes I32 0 or 1.
    GeF = 0x64,

    // ===== String operations (0x70-0x7F) =====
    /// Byte-indexed string read: pop index, pop string, push byte as I32.
    StrGet = 0x70,
    /// Byte-indexed string mutation: pop index, pop string, pop byte value.
    StrSet = 0x71,

    // ===== Control flow (0x80-0x8F) =====
    /// Unconditional jump (operand: u32 target address).
    Jmp = 0x80,
    /// Pop a value; jump if it is zero (operand: u32 target address).
    Jz = 0x81,

    // ===== Calls, syscalls, returns (0x90-0x9F) =====
    /// Call a function (operands: u32 target address, u8 num_args with 0x80 = variadic).
    Call = 0x90,
    /// Dispatch a syscall (operand: u8 num_args with 0x80 = variadic).
    Syscall = 0x91,
    /// Return from the current call frame (operand: u8 size, return-value slot count).
    Ret = 0x92,

    // ===== Coroutine control (0xA0-0xAF) =====
    /// Spawn a coroutine at a target function (operands: u32 target address, u8 num_args).
    Spawn = 0xA0,
    /// Suspend the current coroutine cooperatively; scheduler advances to the next runnable one.
    Yield = 0xA1,
    /// Pop a coroutine handle; park until it finishes, then push its result.
    Await = 0xA2,

    /// Stop execution of the current coroutine's base frame (sentinel, never emitted by the generator).
    Halt = 0xFF,
}

impl Opcode {
    /// Decode a raw byte into an [`Opcode`], if it names a valid instruction.
    pub fn from_u8(byte: u8) -> Option<Self> {
        use Opcode::*;
        Some(match byte {
            0x00 => Pop,
            0x01 => PushI8,
            0x02 => PushI16,
            0x03 => PushI32,
            0x04 => PushI64,
            0x05 => PushF32,
            0x06 => PushF64,
            0x07 => PushStr,
            0x08 => ArrAlloc,
            0x09 => PushVarargs,
            0x10 => LoadVar,
            0x11 => StoreVar,
            0x12 => LoadGlobal,
            0x13 => StoreGlobal,
            0x14 => LeaStack,
            0x15 => LeaGlobal,
            0x20 => LoadPtrOffset,
            0x21 => StorePtrOffset,
            0x30 => Add,
            0x31 => Sub,
            0x32 => Mul,
            0x33 => Div,
            0x40 => AddF,
            0x41 => SubF,
            0x42 => MulF,
            0x43 => DivF,
            0x50 => Eq,
            0x51 => Le,
            0x52 => Lt,
            0x53 => Gt,
            0x54 => Ge,
            0x60 => EqF,
            0x61 => LeF,
            0x62 => LtF,
            0x63 => GtF,
            0x64 => GeF,
            0x70 => StrGet,
            0x71 => StrSet,
            0x80 => Jmp,
            0x81 => Jz,
            0x90 => Call,
            0x91 => Syscall,
            0x92 => Ret,
            0xA0 => Spawn,
            0xA1 => Yield,
            0xA2 => Await,
            0xFF => Halt,
            _ => return None,
        })
    }

    /// Raw byte encoding of this opcode.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Size in bytes of this opcode's fixed operand schedule (not including the opcode byte itself).
    pub fn operand_len(self) -> usize {
        use Opcode::*;
        match self {
            Pop | StrGet | StrSet | Yield | Await | PushVarargs | Halt => 0,
            PushI8 => 1,
            PushI16 => 2,
            PushI32 | PushStr | ArrAlloc | Jmp | Jz => 4,
            PushI64 | PushF64 => 8,
            PushF32 => 4,
            LoadVar | StoreVar | LoadGlobal | StoreGlobal => 3, // u16 + u8
            LeaStack | LeaGlobal => 2,
            LoadPtrOffset | StorePtrOffset => 5, // u32 + u8
            Add | Sub | Mul | Div | AddF | SubF | MulF | DivF => 0,
            Eq | Le | Lt | Gt | Ge | EqF | LeF | LtF | GtF | GeF => 0,
            Call | Spawn => 5, // u32 + u8
            Syscall => 1,
            Ret => 1,
        }
    }
}
