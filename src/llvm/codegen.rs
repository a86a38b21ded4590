//! IR to LLVM-IR lowering
//!
//! Lowers the instruction tree to a textual module with a fixed
//! 30 000-byte tape in `main`'s frame and a stack slot holding the
//! data pointer. `putchar` and `getchar` are declared external.

use crate::ir::{CellDeltas, Inst};
use crate::BftError;

use super::module::ModuleBuilder;

pub const TAPE_SIZE: usize = 30_000;

/// Lower a program. `prelude` holds bytes already proven by partial
/// evaluation; they become literal `putchar` calls ahead of the
/// generated body. The module is verified before its text is returned.
pub fn emit(insts: &[Inst], prelude: &[u8]) -> Result<String, BftError> {
    let mut m = ModuleBuilder::new();
    m.declare("declare i32 @putchar(i32)");
    m.declare("declare i32 @getchar()");
    m.declare("declare void @llvm.memset.p0.i64(ptr, i8, i64, i1)");

    m.push(format!("%tape = alloca [{} x i8]", TAPE_SIZE));
    m.push(format!(
        "call void @llvm.memset.p0.i64(ptr %tape, i8 0, i64 {}, i1 false)",
        TAPE_SIZE
    ));
    m.push("%cursor = alloca ptr".to_owned());
    m.push(format!(
        "%tape0 = getelementptr inbounds [{} x i8], ptr %tape, i64 0, i64 0",
        TAPE_SIZE
    ));
    m.push("store ptr %tape0, ptr %cursor".to_owned());

    for byte in prelude {
        m.push(format!("call i32 @putchar(i32 {})", byte));
    }

    emit_sequence(insts, &mut m);
    m.terminate("ret i32 0".to_owned(), &[]);
    m.finish("bft")
}

fn emit_sequence(insts: &[Inst], m: &mut ModuleBuilder) {
    for inst in insts {
        emit_inst(inst, m);
    }
}

/// Load the cursor out of its stack slot.
fn load_cursor(m: &mut ModuleBuilder) -> String {
    let ptr = m.fresh_temp();
    m.push(format!("{} = load ptr, ptr %cursor", ptr));
    ptr
}

/// Load the cell under `ptr`.
fn load_cell(m: &mut ModuleBuilder, ptr: &str) -> String {
    let value = m.fresh_temp();
    m.push(format!("{} = load i8, ptr {}", value, ptr));
    value
}

fn emit_inst(inst: &Inst, m: &mut ModuleBuilder) {
    match inst {
        Inst::PtrAdd { amount, .. } => {
            let ptr = load_cursor(m);
            let moved = m.fresh_temp();
            m.push(format!(
                "{} = getelementptr inbounds i8, ptr {}, i32 {}",
                moved, ptr, amount
            ));
            m.push(format!("store ptr {}, ptr %cursor", moved));
        }
        Inst::CellAdd { amount, .. } => {
            let ptr = load_cursor(m);
            let value = load_cell(m, &ptr);
            let added = m.fresh_temp();
            m.push(format!("{} = add i8 {}, {}", added, value, amount));
            m.push(format!("store i8 {}, ptr {}", added, ptr));
        }
        Inst::Output { .. } => {
            let ptr = load_cursor(m);
            let value = load_cell(m, &ptr);
            let wide = m.fresh_temp();
            m.push(format!("{} = zext i8 {} to i32", wide, value));
            m.push(format!("call i32 @putchar(i32 {})", wide));
        }
        Inst::Input { .. } => {
            let read = m.fresh_temp();
            m.push(format!("{} = call i32 @getchar()", read));
            let narrow = m.fresh_temp();
            m.push(format!("{} = trunc i32 {} to i8", narrow, read));
            let ptr = load_cursor(m);
            m.push(format!("store i8 {}, ptr {}", narrow, ptr));
        }
        Inst::Loop { body, .. } => {
            let cond = m.fresh_label("loop_cond");
            let body_label = m.fresh_label("loop_body");
            let end = m.fresh_label("loop_end");

            m.terminate(format!("br label %{}", cond), &[cond.as_str()]);

            m.add_block(cond.clone());
            let ptr = load_cursor(m);
            let value = load_cell(m, &ptr);
            let test = m.fresh_temp();
            m.push(format!("{} = icmp ne i8 {}, 0", test, value));
            m.terminate(
                format!("br i1 {}, label %{}, label %{}", test, body_label, end),
                &[body_label.as_str(), end.as_str()],
            );

            m.add_block(body_label.clone());
            emit_sequence(body, m);
            m.terminate(format!("br label %{}", cond), &[cond.as_str()]);

            m.add_block(end);
        }
        Inst::SimpleLoop { deltas, .. } => emit_simple_loop(deltas, m),
        Inst::ScanLoop { stride, .. } => {
            let cond = m.fresh_label("scan_cond");
            let step = m.fresh_label("scan_step");
            let end = m.fresh_label("scan_end");

            m.terminate(format!("br label %{}", cond), &[cond.as_str()]);

            m.add_block(cond.clone());
            let ptr = load_cursor(m);
            let value = load_cell(m, &ptr);
            let test = m.fresh_temp();
            m.push(format!("{} = icmp ne i8 {}, 0", test, value));
            m.terminate(
                format!("br i1 {}, label %{}, label %{}", test, step, end),
                &[step.as_str(), end.as_str()],
            );

            m.add_block(step.clone());
            let moved = m.fresh_temp();
            m.push(format!(
                "{} = getelementptr inbounds i8, ptr {}, i32 {}",
                moved, ptr, stride
            ));
            m.push(format!("store ptr {}, ptr %cursor", moved));
            m.terminate(format!("br label %{}", cond), &[cond.as_str()]);

            m.add_block(end);
        }
    }
}

/// Scale each recorded delta by the current cell, then zero it.
fn emit_simple_loop(deltas: &CellDeltas, m: &mut ModuleBuilder) {
    let ptr = load_cursor(m);
    let current = load_cell(m, &ptr);
    let current_wide = m.fresh_temp();
    m.push(format!("{} = zext i8 {} to i32", current_wide, current));

    for (&offset, &change) in deltas {
        let cell_ptr = m.fresh_temp();
        m.push(format!(
            "{} = getelementptr inbounds i8, ptr {}, i32 {}",
            cell_ptr, ptr, offset
        ));
        let cell = load_cell(m, &cell_ptr);
        let cell_wide = m.fresh_temp();
        m.push(format!("{} = zext i8 {} to i32", cell_wide, cell));
        let scaled = m.fresh_temp();
        m.push(format!("{} = mul i32 {}, {}", scaled, change, current_wide));
        let summed = m.fresh_temp();
        m.push(format!("{} = add i32 {}, {}", summed, cell_wide, scaled));
        let narrow = m.fresh_temp();
        m.push(format!("{} = trunc i32 {} to i8", narrow, summed));
        m.push(format!("store i8 {}, ptr {}", narrow, cell_ptr));
    }

    m.push(format!("store i8 0, ptr {}", ptr));
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
        emit(&program.insts, &[]).unwrap()
    }

    #[test]
    fn test_module_skeleton() {
        let text = lower("", false);
        assert!(text.contains("declare i32 @putchar(i32)"));
        assert!(text.contains("declare i32 @getchar()"));
        assert!(text.contains("%tape = alloca [30000 x i8]"));
        assert!(text.contains("i64 30000, i1 false"));
        assert!(text.contains("ret i32 0"));
    }

    #[test]
    fn test_prelude_bytes_become_putchar_calls() {
        let program = parse("").unwrap();
        let text = emit(&program.insts, b"Hi").unwrap();
        assert!(text.contains("call i32 @putchar(i32 72)"));
        assert!(text.contains("call i32 @putchar(i32 105)"));
    }

    #[test]
    fn test_pointer_and_cell_lowering() {
        let text = lower("><+-", false);
        assert!(text.contains("getelementptr inbounds i8, ptr %t0, i32 1"));
        assert!(text.contains("getelementptr inbounds i8, ptr %t2, i32 -1"));
        assert!(text.contains("add i8 %t5, 1"));
        assert!(text.contains("add i8 %t8, -1"));
    }

    #[test]
    fn test_io_lowering() {
        let text = lower(".,", false);
        assert!(text.contains("zext i8 %t1 to i32"));
        assert!(text.contains("call i32 @putchar(i32 %t2)"));
        assert!(text.contains("%t3 = call i32 @getchar()"));
        assert!(text.contains("trunc i32 %t3 to i8"));
    }

    #[test]
    fn test_loop_block_structure() {
        let text = lower("[-]", false);
        assert!(text.contains("br label %loop_cond0"));
        assert!(text.contains("loop_cond0:"));
        assert!(text.contains("icmp ne i8"));
        assert!(text.contains("br i1 %t2, label %loop_body1, label %loop_end2"));
        assert!(text.contains("loop_body1:"));
        assert!(text.contains("loop_end2:"));
    }

    #[test]
    fn test_simple_loop_zeroes_the_cell() {
        let text = lower("[->+<]", true);
        // One multiply-accumulate per delta and the final zero store.
        assert!(text.contains("mul i32 1, %t2"));
        assert!(text.contains("store i8 0, ptr %t0"));
        assert!(!text.contains("loop_cond"));
    }

    #[test]
    fn test_scan_loop_advances_by_stride() {
        let text = lower("[>>]", true);
        assert!(text.contains("scan_cond0:"));
        assert!(text.contains("getelementptr inbounds i8, ptr %t0, i32 2"));
    }

    #[test]
    fn test_emitted_module_verifies() {
        // A nested program touching every lowering path.
        let text = lower("+[>,[-]<.[>]]", true);
        assert!(text.contains("define i32 @main()"));
    }
}
