//! # bft - Brainfuck execution toolkit
//!
//! Parses Brainfuck source into a structured IR, classifies and
//! rewrites loops, optionally folds the input-independent prefix of a
//! program at compile time, and drives one of three backends:
//!
//! | Backend | Output |
//! |---------|--------|
//! | interpreter | program output on stdout, optional profile |
//! | LLVM-IR | textual module on stdout |
//! | ARM64 | text assembly file |
//!
//! The pipeline is `parse` then optional [`peval::evaluate`] then
//! optional [`ir::optimize`] then a backend. The IR is uniquely owned
//! along the way; backends consume it read-only.

pub mod arm64;
pub mod interp;
pub mod ir;
pub mod llvm;
pub mod parser;
pub mod peval;
pub mod profile;

use thiserror::Error;

pub use interp::Interpreter;
pub use ir::{classify, optimize, Inst, LoopClass, NodeId, OptimizerConfig, Program};
pub use parser::{parse, unparse, Position};
pub use peval::{evaluate, Folded};
pub use profile::{NoProfile, Profile, Recorder};

/// Toolkit error type. Every failure is fatal; there is no recovery.
#[derive(Error, Debug)]
pub enum BftError {
    #[error("parse error at {position}: {message}")]
    Parse { message: String, position: Position },

    #[error("data pointer moved before the start of the tape")]
    PointerUnderflow,

    #[error("possible infinite loop during partial evaluation")]
    EvalBlowup,

    #[error("module verification failed: {0}")]
    Verify(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
