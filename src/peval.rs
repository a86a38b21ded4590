//! Compile-time partial evaluation
//!
//! Executes the program symbolically on a shadow tape until it depends
//! on runtime input. Instructions whose full effect is captured are
//! removed from the IR; `Output` bytes proven at this stage accumulate
//! in a compile-time buffer the backends replay ahead of the surviving
//! program.
//!
//! A cell touched by `Input` is *tainted*: its value is unknown until
//! runtime, and everything reading it must stay in the program. The
//! shadow pointer is a plain signed offset and may go negative here;
//! only the interpreter treats underflow as an error.

use std::collections::HashMap;

use crate::ir::Inst;
use crate::BftError;

/// Upper bound on symbolically executed loop iterations. Beyond this
/// the program is assumed not to terminate and folding aborts.
pub const MAX_LOOP_ITERATIONS: u64 = 10_000_000;

/// One shadow cell: a known value, or a tainted placeholder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShadowCell {
    pub value: u8,
    pub tainted: bool,
}

/// Sparse tape keyed by signed offset. Absent cells read as zero and
/// untainted.
#[derive(Debug, Clone, Default)]
pub struct ShadowTape {
    cells: HashMap<i64, ShadowCell>,
}

impl ShadowTape {
    pub fn get(&self, offset: i64) -> ShadowCell {
        self.cells.get(&offset).copied().unwrap_or_default()
    }

    fn cell(&mut self, offset: i64) -> &mut ShadowCell {
        self.cells.entry(offset).or_default()
    }

    fn add(&mut self, offset: i64, amount: i8) {
        let cell = self.cell(offset);
        cell.value = cell.value.wrapping_add(amount as u8);
    }

    fn taint(&mut self, offset: i64) {
        self.cell(offset).tainted = true;
    }
}

/// Result of folding: the surviving program and the bytes it already
/// produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folded {
    pub program: Vec<Inst>,
    pub output: Vec<u8>,
}

/// Partially evaluate a program from an all-zero tape.
pub fn evaluate(insts: Vec<Inst>) -> Result<Folded, BftError> {
    let mut tape = ShadowTape::default();
    let mut ptr = 0i64;
    let mut output = Vec::new();
    let program = fold_sequence(insts, &mut tape, &mut ptr, &mut output)?;
    Ok(Folded { program, output })
}

/// Walk a sequence, dropping every instruction that fully evaluates.
///
/// A surviving loop has its body re-walked against a clone of the
/// shadow tape; output folded inside such a body is discarded, since
/// nothing guarantees the loop runs at runtime.
fn fold_sequence(
    insts: Vec<Inst>,
    tape: &mut ShadowTape,
    ptr: &mut i64,
    output: &mut Vec<u8>,
) -> Result<Vec<Inst>, BftError> {
    let mut surviving = Vec::new();
    for inst in insts {
        if eval_inst(&inst, tape, ptr, output)? {
            continue;
        }
        let kept = match inst {
            Inst::Loop { body, class, id } => {
                let mut fork_tape = tape.clone();
                let mut fork_ptr = *ptr;
                let mut fork_output = Vec::new();
                let body = fold_sequence(body, &mut fork_tape, &mut fork_ptr, &mut fork_output)?;
                Inst::Loop { body, class, id }
            }
            other => other,
        };
        surviving.push(kept);
    }
    Ok(surviving)
}

/// Evaluate one instruction. Returns true when its effect is fully
/// captured by the shadow state and the node can be dropped.
fn eval_inst(
    inst: &Inst,
    tape: &mut ShadowTape,
    ptr: &mut i64,
    output: &mut Vec<u8>,
) -> Result<bool, BftError> {
    match inst {
        Inst::PtrAdd { amount, .. } => {
            *ptr += *amount as i64;
            Ok(true)
        }
        Inst::CellAdd { amount, .. } => {
            if tape.get(*ptr).tainted {
                Ok(false)
            } else {
                tape.add(*ptr, *amount);
                Ok(true)
            }
        }
        Inst::Output { .. } => {
            let cell = tape.get(*ptr);
            if cell.tainted {
                Ok(false)
            } else {
                output.push(cell.value);
                Ok(true)
            }
        }
        Inst::Input { .. } => {
            tape.taint(*ptr);
            Ok(false)
        }
        Inst::Loop { body, .. } => eval_loop(body, tape, ptr, output),
        // Folding runs before optimization; specialized nodes only show
        // up here if a caller reorders the pipeline. Keep them.
        Inst::SimpleLoop { .. } | Inst::ScanLoop { .. } => Ok(false),
    }
}

fn eval_loop(
    body: &[Inst],
    tape: &mut ShadowTape,
    ptr: &mut i64,
    output: &mut Vec<u8>,
) -> Result<bool, BftError> {
    if tape.get(*ptr).tainted {
        return Ok(false);
    }
    let mut iterations = 0u64;
    while tape.get(*ptr).value != 0 {
        iterations += 1;
        if iterations > MAX_LOOP_ITERATIONS {
            return Err(BftError::EvalBlowup);
        }
        for inst in body {
            if !eval_inst(inst, tape, ptr, output)? {
                return Ok(false);
            }
        }
    }
    Ok(true)
}
