//! LLVM-IR backend
//!
//! Lowers the IR tree to a textual LLVM module with a fixed-size tape
//! on `main`'s stack. The module is structurally verified before its
//! text is handed back; a verification failure is fatal.

pub mod codegen;
pub mod module;

pub use codegen::{emit, TAPE_SIZE};
pub use module::ModuleBuilder;
