//! Compilation errors.

use thiserror::Error;

/// Shorthand for a [`CompileError`]-returning result.
pub type CompileResult<T> = Result<T, CompileError>;

/// Everything that can go wrong turning a typed [`crate::ast::Program`] into
/// bytecode.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompileError {
    /// A variable name wasn't found in any enclosing scope.
    #[error("undefined variable: {name}")]
    UndefinedVariable {
        /// The name that failed to resolve.
        name: String,
    },
    /// A struct name wasn't found in the struct layout table.
    #[error("undefined struct: {name}")]
    UndefinedStruct {
        /// The name that failed to resolve.
        name: String,
    },
    /// A struct field name wasn't found on its struct.
    #[error("struct `{struct_name}` has no field `{field_name}`")]
    UndefinedField {
        /// The struct being accessed.
        struct_name: String,
        /// The field name that failed to resolve.
        field_name: String,
    },
    /// A struct embeds itself by value, directly or through another struct,
    /// so it has no finite size.
    #[error("struct `{name}` has infinite size: it embeds itself by value")]
    RecursiveValueType {
        /// The struct at the root of the cycle.
        name: String,
    },
    /// A variable was declared outside of any open scope — an internal
    /// invariant violation, since the generator always keeps one open.
    #[error("internal: variable `{name}` declared outside any open scope")]
    NoOpenScope {
        /// The variable that was being declared.
        name: String,
    },
    /// More local slots were requested than fit in the 16-bit slot index
    /// space `LOAD_VAR`/`STORE_VAR` addresses.
    #[error("too many local variables (max 65535 slots)")]
    TooManyLocals,
    /// More argument slots were pushed than fit in the 7 bits `CALL`/`SPAWN`/
    /// `SYSCALL` reserve for `num_args` (the 8th bit is the vararg flag).
    #[error("too many parameters (max 127 argument slots)")]
    TooManyParameters,
    /// A jump or call target address doesn't fit in a `u32` operand.
    #[error("jump or call target address overflowed u32")]
    AddressOverflow,
    /// `spawn` was applied to something other than a plain function call.
    #[error("spawn requires a direct call expression")]
    InvalidSpawnTarget,
    /// A feature was named in the AST that this generator doesn't (yet)
    /// lower — kept distinct from a true internal-error bug.
    #[error("unsupported feature: {feature}")]
    UnsupportedFeature {
        /// A short description of what wasn't supported.
        feature: String,
    },
    /// An internal consistency check failed; always a generator bug, never
    /// a malformed input program.
    #[error("internal compiler error: {message}")]
    InternalError {
        /// Description of the invariant that was violated.
        message: String,
    },
}
