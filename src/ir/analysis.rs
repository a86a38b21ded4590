//! Loop classification
//!
//! Decides which loops can be rewritten into specialized nodes:
//!
//! - *Simple*: the body is straight-line cell arithmetic, the pointer
//!   returns to the loop's entry cell, and the entry cell moves by
//!   exactly ±1 per iteration. Such a loop runs a statically known
//!   number of times with known per-offset effects.
//! - *ScanPow2*: the body only moves the pointer, with a nonzero net
//!   stride whose magnitude is a power of two. Such a loop searches the
//!   tape for a zero cell at a fixed stride.
//!
//! Classification runs bottom-up: a body containing any loop-like node
//! is never Simple or ScanPow2.

use super::types::{CellDeltas, Inst, LoopClass};

/// Walk a loop body, tracking the running pointer offset and the net
/// per-offset cell change of one iteration. Cell changes accumulate
/// with mod-256 wraparound, matching the cell model.
pub fn body_deltas(body: &[Inst]) -> (i32, CellDeltas) {
    let mut offset = 0i32;
    let mut deltas = CellDeltas::new();
    for inst in body {
        match inst {
            Inst::PtrAdd { amount, .. } => offset += amount,
            Inst::CellAdd { amount, .. } => {
                let slot = deltas.entry(offset).or_insert(0);
                *slot = slot.wrapping_add(*amount);
            }
            _ => {}
        }
    }
    (offset, deltas)
}

fn is_simple(body: &[Inst]) -> bool {
    if !body
        .iter()
        .all(|inst| matches!(inst, Inst::PtrAdd { .. } | Inst::CellAdd { .. }))
    {
        return false;
    }
    let (net, deltas) = body_deltas(body);
    if net != 0 {
        return false;
    }
    matches!(deltas.get(&0).copied(), Some(1) | Some(-1))
}

fn is_scan(body: &[Inst]) -> bool {
    if body.is_empty() || !body.iter().all(|inst| matches!(inst, Inst::PtrAdd { .. })) {
        return false;
    }
    let (net, _) = body_deltas(body);
    net != 0 && net.unsigned_abs().is_power_of_two()
}

/// Classify one loop body. Assumes nested loops have already been
/// classified; any loop-like node in `body` forces `General`.
pub fn classify_body(body: &[Inst]) -> LoopClass {
    if is_simple(body) {
        LoopClass::Simple
    } else if is_scan(body) {
        LoopClass::ScanPow2
    } else {
        LoopClass::General
    }
}

/// Classify every loop in the tree, children before parents.
pub fn classify(insts: &mut [Inst]) {
    for inst in insts {
        if let Inst::Loop { body, class, .. } = inst {
            classify(body);
            *class = classify_body(body);
        }
    }
}
