//! ARM64 backend
//!
//! Lowers the IR tree to text assembly around a heap-allocated tape,
//! with X19 as the data pointer and X20 holding the allocation for the
//! final `free`.

pub mod codegen;

pub use codegen::{emit, TAPE_SIZE};
