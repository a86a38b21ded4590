//! Intermediate representation for Brainfuck programs
//!
//! A tree of instruction nodes produced by the parser. Loops own their
//! body sequence. Analysis classifies loops, the optimizer replaces
//! classified loops with specialized nodes, and the backends lower the
//! resulting tree.
//!
//! ```text
//! source -> parse -> [partial evaluation] -> [optimize] -> backend
//! ```

pub mod analysis;
pub mod optimize;
pub mod types;

pub use analysis::classify;
pub use optimize::{optimize, OptimizerConfig};
pub use types::*;
