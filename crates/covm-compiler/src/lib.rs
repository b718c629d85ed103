//! Typed-AST to bytecode code generation.
//!
//! This crate turns an already-typechecked [`ast::Program`] into a
//! [`covm_bytecode::program::IrProgram`] the VM crate can load and run. It
//! depends only on `covm-bytecode` for the wire format it emits — lexing,
//! parsing, and type checking all happen upstream of this crate's boundary.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod ast;
pub mod error;
pub mod generator;
pub mod lvalue;
pub mod scope;
pub mod struct_layout;

pub use error::{CompileError, CompileResult};
pub use generator::generate;
