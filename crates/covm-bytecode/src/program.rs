//! The in-memory IR artifact handed from the compiler to the VM.

use rustc_hash::FxHashMap;

use crate::value::Value;

/// A complete compiled program: bytecode, string pool, function table, and
/// struct layout table.
///
/// `IrProgram` is the single hand-off artifact between `covm-compiler` and
/// `covm-vm` — neither crate depends on the other, only on this type (and
/// the rest of `covm-bytecode`).
#[derive(Debug, Clone, Default)]
pub struct IrProgram {
    /// The flat instruction stream. Addresses used by `CALL`/`JMP`/`JZ`/`SPAWN`
    /// are byte offsets into this buffer.
    pub bytecode: Vec<u8>,
    /// String literals, indexed by `PUSH_STR`'s operand. Grows only during IR
    /// generation; frozen once the program is handed to the VM.
    pub string_pool: Vec<String>,
    /// Every function defined in the program, keyed by name for lookup
    /// during generation and by the generator's deferred call-patching pass.
    pub functions: FxHashMap<String, FunctionInfo>,
    /// Every struct type's field layout, keyed by struct name.
    pub structs: FxHashMap<String, StructLayout>,
    /// The global frame's initial contents, indexed by slot. The VM copies
    /// this into every coroutine's view of the global frame before any
    /// bytecode runs — there is no bytecode-executed global-init prologue,
    /// since global initializers must be compile-time constants.
    pub globals_init: Vec<Value>,
}

impl IrProgram {
    /// An empty program, ready for a generator to emit into.
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string literal, returning its pool id. Does not deduplicate —
    /// callers that want deduplication (none currently do) must check first.
    pub fn intern_str(&mut self, s: impl Into<String>) -> u32 {
        let id = self.string_pool.len() as u32;
        self.string_pool.push(s.into());
        id
    }

    /// Look up a function's entry address by name.
    pub fn function_entry(&self, name: &str) -> Option<u32> {
        self.functions.get(name).map(|f| f.entry_addr)
    }
}

/// One function's metadata: where it starts, its calling shape, and its
/// frame size.
#[derive(Debug, Clone, Copy)]
pub struct FunctionInfo {
    /// Byte offset of the function's first instruction within `bytecode`.
    pub entry_addr: u32,
    /// Number of parameter slots, occupying the low end of the frame.
    pub num_params: u16,
    /// Total local slot count for the frame, including parameters. Always
    /// `>= num_params`.
    pub num_slots: u16,
    /// Whether the function accepts a trailing variadic argument list.
    pub is_variadic: bool,
}

/// A struct type's field layout: name-to-offset/size map plus total size.
///
/// Offsets and sizes are expressed in `Value` slots (16 bytes each), matching
/// the unit `LOAD_PTR_OFFSET`/`STORE_PTR_OFFSET` operate in.
#[derive(Debug, Clone, Default)]
pub struct StructLayout {
    /// Total size of one instance, in slots.
    pub size_slots: u32,
    /// Per-field offset (in slots from the struct's base address) and size
    /// (in slots), keyed by field name. Iteration order is declaration
    /// order — callers that need that should keep `field_order` too.
    pub fields: FxHashMap<String, FieldLayout>,
    /// Field names in declaration order, needed by codegen when synthesizing
    /// a default/zeroed instance or iterating fields deterministically.
    pub field_order: Vec<String>,
}

/// One struct field's position and size within its owning struct.
#[derive(Debug, Clone, Copy)]
pub struct FieldLayout {
    /// Offset from the struct's base address, in slots.
    pub offset_slots: u32,
    /// Size of this field, in slots. 1 for scalars and pointers; the
    /// struct's own `size_slots` for a nested value-typed struct field.
    pub size_slots: u32,
    /// Whether this field itself holds a pointer (to a struct or array)
    /// rather than an inline value. Drives the L-value resolver's
    /// Stack-vs-Heap transition when a member-access chain passes through it.
    pub is_pointer: bool,
}

impl StructLayout {
    /// Look up a field's layout by name.
    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.fields.get(name)
    }
}
