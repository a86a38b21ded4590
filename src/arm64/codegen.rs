//! IR to ARM64 assembly lowering
//!
//! Emits text assembly for a Mach-O toolchain: `_main` calls
//! `_malloc`/`_memset` for a 30 000-byte tape, keeps the data pointer
//! in X19 and the allocation base in X20, and releases the tape with
//! `_free` before returning 0. Labels come from a monotonic counter.
//!
//! Scan loops with stride +1 are lowered as a 16-byte NEON chunk scan;
//! the first zero's offset inside a matching chunk is recovered from
//! the CMEQ mask with RBIT/CLZ. Every other stride takes a scalar
//! byte-at-a-time loop, since a chunk scan inspects cells off the
//! stride.

use std::fmt::Write;

use crate::ir::{CellDeltas, Inst};

pub const TAPE_SIZE: usize = 30_000;

/// Lower a program to assembly text. `prelude` bytes become literal
/// `putchar` calls ahead of the generated body.
pub fn emit(insts: &[Inst], prelude: &[u8]) -> String {
    let mut asm = String::new();
    let mut labels = LabelCounter::default();

    prologue(&mut asm);
    for byte in prelude {
        let _ = writeln!(asm, "\tMOV W0, #{}", byte);
        let _ = writeln!(asm, "\tBL _putchar");
    }
    emit_sequence(insts, &mut asm, &mut labels);
    epilogue(&mut asm);
    asm
}

#[derive(Debug, Default)]
struct LabelCounter(usize);

impl LabelCounter {
    fn fresh(&mut self) -> String {
        let label = format!("L{}", self.0);
        self.0 += 1;
        label
    }
}

fn prologue(asm: &mut String) {
    asm.push_str("\t.text\n");
    asm.push_str("\t.global _main\n");
    asm.push_str("\t.extern _putchar, _getchar, _malloc, _free, _memset\n");
    asm.push_str("_main:\n");
    asm.push_str("\tSTP X29, X30, [SP, #-16]!\n");
    asm.push_str("\tMOV X29, SP\n");
    asm.push_str("\tSTP X19, X20, [SP, #-16]!\n");
    let _ = writeln!(asm, "\tMOV X0, #{}", TAPE_SIZE);
    asm.push_str("\tBL _malloc\n");
    asm.push_str("\tMOV X19, X0\n");
    asm.push_str("\tMOV X20, X0\n");
    asm.push_str("\tMOV X1, X19\n");
    asm.push_str("\tMOV W2, #0\n");
    let _ = writeln!(asm, "\tMOV X3, #{}", TAPE_SIZE);
    asm.push_str("\tBL _memset\n");
}

fn epilogue(asm: &mut String) {
    asm.push_str("\tMOV X0, X20\n");
    asm.push_str("\tBL _free\n");
    asm.push_str("\tLDP X19, X20, [SP], #16\n");
    asm.push_str("\tLDP X29, X30, [SP], #16\n");
    asm.push_str("\tMOV W0, #0\n");
    asm.push_str("\tRET\n");
}

fn emit_sequence(insts: &[Inst], asm: &mut String, labels: &mut LabelCounter) {
    for inst in insts {
        emit_inst(inst, asm, labels);
    }
}

fn emit_inst(inst: &Inst, asm: &mut String, labels: &mut LabelCounter) {
    match inst {
        Inst::PtrAdd { amount, .. } => emit_ptr_add(asm, *amount as i64),
        Inst::CellAdd { amount, .. } => {
            asm.push_str("\tLDRB W1, [X19]\n");
            if *amount >= 0 {
                let _ = writeln!(asm, "\tADD W1, W1, #{}", amount);
            } else {
                let _ = writeln!(asm, "\tSUB W1, W1, #{}", -(*amount as i32));
            }
            asm.push_str("\tSTRB W1, [X19]\n");
        }
        Inst::Output { .. } => {
            asm.push_str("\tLDRB W0, [X19]\n");
            asm.push_str("\tBL _putchar\n");
        }
        Inst::Input { .. } => {
            asm.push_str("\tBL _getchar\n");
            asm.push_str("\tSTRB W0, [X19]\n");
        }
        Inst::Loop { body, .. } => {
            let start = labels.fresh();
            let end = labels.fresh();
            let _ = writeln!(asm, "{}:", start);
            asm.push_str("\tLDRB W1, [X19]\n");
            let _ = writeln!(asm, "\tCBZ W1, {}", end);
            emit_sequence(body, asm, labels);
            let _ = writeln!(asm, "\tB {}", start);
            let _ = writeln!(asm, "{}:", end);
        }
        Inst::SimpleLoop { deltas, .. } => emit_simple_loop(deltas, asm),
        Inst::ScanLoop { stride, .. } => {
            if *stride == 1 {
                emit_chunked_scan(asm, labels);
            } else {
                emit_strided_scan(asm, labels, *stride);
            }
        }
    }
}

fn emit_ptr_add(asm: &mut String, amount: i64) {
    if amount > 0 {
        let _ = writeln!(asm, "\tADD X19, X19, #{}", amount);
    } else if amount < 0 {
        let _ = writeln!(asm, "\tSUB X19, X19, #{}", -amount);
    }
}

/// Collapsed simple loop: W0 holds the trip count, each delta becomes
/// a multiply-accumulate on its cell, and the control cell is zeroed.
fn emit_simple_loop(deltas: &CellDeltas, asm: &mut String) {
    asm.push_str("\tLDRB W0, [X19]\n");
    for (&offset, &change) in deltas {
        let _ = writeln!(asm, "\tLDRB W1, [X19, #{}]", offset);
        match change {
            1 => asm.push_str("\tADD W1, W1, W0\n"),
            -1 => asm.push_str("\tSUB W1, W1, W0\n"),
            _ => {
                let _ = writeln!(asm, "\tMOV W2, #{}", (change as i32).unsigned_abs());
                asm.push_str("\tMUL W2, W0, W2\n");
                if change > 0 {
                    asm.push_str("\tADD W1, W1, W2\n");
                } else {
                    asm.push_str("\tSUB W1, W1, W2\n");
                }
            }
        }
        let _ = writeln!(asm, "\tSTRB W1, [X19, #{}]", offset);
    }
    asm.push_str("\tMOV W1, #0\n");
    asm.push_str("\tSTRB W1, [X19]\n");
}

/// Forward scan in 16-byte chunks. CMEQ leaves 0xFF in every lane that
/// held zero; the two mask halves travel through GPRs, and the first
/// set byte's index is the mask's trailing-zero count divided by 8.
fn emit_chunked_scan(asm: &mut String, labels: &mut LabelCounter) {
    let scan = labels.fresh();
    let found = labels.fresh();
    let low = labels.fresh();

    let _ = writeln!(asm, "{}:", scan);
    asm.push_str("\tLD1 {V0.16B}, [X19]\n");
    asm.push_str("\tCMEQ V0.16B, V0.16B, #0\n");
    asm.push_str("\tUMOV X2, V0.D[0]\n");
    asm.push_str("\tUMOV X3, V0.D[1]\n");
    asm.push_str("\tORR X4, X2, X3\n");
    let _ = writeln!(asm, "\tCBNZ X4, {}", found);
    asm.push_str("\tADD X19, X19, #16\n");
    let _ = writeln!(asm, "\tB {}", scan);
    let _ = writeln!(asm, "{}:", found);
    let _ = writeln!(asm, "\tCBNZ X2, {}", low);
    asm.push_str("\tADD X19, X19, #8\n");
    asm.push_str("\tMOV X2, X3\n");
    let _ = writeln!(asm, "{}:", low);
    asm.push_str("\tRBIT X2, X2\n");
    asm.push_str("\tCLZ X2, X2\n");
    asm.push_str("\tLSR X2, X2, #3\n");
    asm.push_str("\tADD X19, X19, X2\n");
}

fn emit_strided_scan(asm: &mut String, labels: &mut LabelCounter, stride: i32) {
    let start = labels.fresh();
    let end = labels.fresh();
    let _ = writeln!(asm, "{}:", start);
    asm.push_str("\tLDRB W1, [X19]\n");
    let _ = writeln!(asm, "\tCBZ W1, {}", end);
    emit_ptr_add(asm, stride as i64);
    let _ = writeln!(asm, "\tB {}", start);
    let _ = writeln!(asm, "{}:", end);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{optimize, OptimizerConfig};
    use crate::parser::parse;

    fn lower(source: &str, optimized: bool) -> String {
        let mut program = parse(source).unwrap();
        if optimized {
            optimize(&mut program.insts, &OptimizerConfig::default());
        }
        emit(&program.insts, &[])
    }

    #[test]
    fn test_prologue_and_epilogue() {
        let asm = lower("", false);
        assert!(asm.starts_with("\t.text\n\t.global _main\n"));
        assert!(asm.contains("\tBL _malloc\n"));
        assert!(asm.contains("\tMOV X3, #30000\n"));
        assert!(asm.contains("\tBL _memset\n"));
        assert!(asm.contains("\tBL _free\n"));
        assert!(asm.trim_end().ends_with("RET"));
    }

    #[test]
    fn test_prelude_bytes_become_putchar_calls() {
        let program = parse("").unwrap();
        let asm = emit(&program.insts, b"Hi");
        assert!(asm.contains("\tMOV W0, #72\n\tBL _putchar\n"));
        assert!(asm.contains("\tMOV W0, #105\n\tBL _putchar\n"));
    }

    #[test]
    fn test_pointer_and_cell_templates() {
        let asm = lower("><+-", false);
        assert!(asm.contains("\tADD X19, X19, #1\n"));
        assert!(asm.contains("\tSUB X19, X19, #1\n"));
        assert!(asm.contains("\tADD W1, W1, #1\n"));
        assert!(asm.contains("\tSUB W1, W1, #1\n"));
    }

    #[test]
    fn test_io_templates() {
        let asm = lower(".,", false);
        assert!(asm.contains("\tLDRB W0, [X19]\n\tBL _putchar\n"));
        assert!(asm.contains("\tBL _getchar\n\tSTRB W0, [X19]\n"));
    }

    #[test]
    fn test_loop_labels() {
        let asm = lower("[-]", false);
        assert!(asm.contains("L0:\n\tLDRB W1, [X19]\n\tCBZ W1, L1\n"));
        assert!(asm.contains("\tB L0\nL1:\n"));
    }

    #[test]
    fn test_nested_loops_get_unique_labels() {
        let asm = lower("[[-]]", false);
        assert!(asm.contains("CBZ W1, L1"));
        assert!(asm.contains("CBZ W1, L3"));
        assert!(asm.contains("B L2"));
    }

    #[test]
    fn test_simple_loop_ends_with_zero_store() {
        let asm = lower("[-]", true);
        assert!(!asm.contains("CBZ"));
        assert!(asm.contains("\tLDRB W0, [X19]\n\tMOV W1, #0\n\tSTRB W1, [X19]\n"));
    }

    #[test]
    fn test_simple_loop_unit_and_scaled_changes() {
        let asm = lower("[->+>---<<]", true);
        assert!(asm.contains("\tLDRB W1, [X19, #1]\n\tADD W1, W1, W0\n"));
        assert!(asm.contains("\tMOV W2, #3\n\tMUL W2, W0, W2\n\tSUB W1, W1, W2\n"));
        assert!(asm.contains("\tSTRB W1, [X19, #2]\n"));
    }

    #[test]
    fn test_forward_scan_uses_chunks() {
        let asm = lower("[>]", true);
        assert!(asm.contains("\tLD1 {V0.16B}, [X19]\n"));
        assert!(asm.contains("\tCMEQ V0.16B, V0.16B, #0\n"));
        assert!(asm.contains("\tRBIT X2, X2\n\tCLZ X2, X2\n\tLSR X2, X2, #3\n"));
        assert!(asm.contains("\tADD X19, X19, #16\n"));
    }

    #[test]
    fn test_backward_scan_is_scalar() {
        let asm = lower("[<]", true);
        assert!(!asm.contains("LD1"));
        assert!(asm.contains("\tLDRB W1, [X19]\n\tCBZ W1, L1\n\tSUB X19, X19, #1\n"));
    }

    #[test]
    fn test_wide_stride_is_scalar() {
        let asm = lower("[>>>>]", true);
        assert!(!asm.contains("LD1"));
        assert!(asm.contains("\tADD X19, X19, #4\n"));
    }
}
