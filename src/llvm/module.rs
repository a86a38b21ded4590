//! Textual LLVM module construction
//!
//! A small builder that assembles `@main` out of labeled basic blocks
//! and renders the module as LLVM assembly. The builder tracks enough
//! structure to verify the module before emission: every block must be
//! terminated exactly once, nothing may follow a terminator, and every
//! branch target must name a defined block. Emission refuses to
//! produce text for a module that fails these checks.

use std::fmt::Write;

use crate::BftError;

struct Block {
    label: String,
    insts: Vec<String>,
    terminator: Option<String>,
    /// Labels referenced by the terminator.
    targets: Vec<String>,
    /// Instructions pushed after the terminator; always a bug.
    stray: Vec<String>,
}

impl Block {
    fn new(label: String) -> Self {
        Block {
            label,
            insts: Vec::new(),
            terminator: None,
            targets: Vec::new(),
            stray: Vec::new(),
        }
    }
}

pub struct ModuleBuilder {
    declarations: Vec<String>,
    blocks: Vec<Block>,
    next_temp: usize,
    next_label: usize,
}

impl ModuleBuilder {
    /// Start a module whose `@main` begins at an `entry` block.
    pub fn new() -> Self {
        ModuleBuilder {
            declarations: Vec::new(),
            blocks: vec![Block::new("entry".to_owned())],
            next_temp: 0,
            next_label: 0,
        }
    }

    pub fn declare(&mut self, decl: &str) {
        self.declarations.push(decl.to_owned());
    }

    /// A fresh SSA name, `%t0`, `%t1`, ...
    pub fn fresh_temp(&mut self) -> String {
        let name = format!("%t{}", self.next_temp);
        self.next_temp += 1;
        name
    }

    /// A fresh label built from `stem`.
    pub fn fresh_label(&mut self, stem: &str) -> String {
        let label = format!("{}{}", stem, self.next_label);
        self.next_label += 1;
        label
    }

    fn current(&mut self) -> &mut Block {
        self.blocks.last_mut().expect("builder always has a block")
    }

    /// Append an instruction to the open block.
    pub fn push(&mut self, inst: String) {
        let block = self.current();
        if block.terminator.is_some() {
            block.stray.push(inst);
        } else {
            block.insts.push(inst);
        }
    }

    /// Terminate the open block. `targets` are the labels the
    /// terminator may branch to.
    pub fn terminate(&mut self, inst: String, targets: &[&str]) {
        let block = self.current();
        if block.terminator.is_some() {
            // Recorded as stray so verify() reports it.
            block.stray.push(inst);
            return;
        }
        block.terminator = Some(inst);
        block.targets = targets.iter().map(|t| (*t).to_owned()).collect();
    }

    /// Open a new block; subsequent pushes land there.
    pub fn add_block(&mut self, label: String) {
        self.blocks.push(Block::new(label));
    }

    /// Structural verification of the assembled function.
    pub fn verify(&self) -> Result<(), BftError> {
        for block in &self.blocks {
            if block.terminator.is_none() {
                return Err(BftError::Verify(format!(
                    "block '{}' has no terminator",
                    block.label
                )));
            }
            if !block.stray.is_empty() {
                return Err(BftError::Verify(format!(
                    "instruction after terminator in block '{}'",
                    block.label
                )));
            }
            for target in &block.targets {
                if !self.blocks.iter().any(|b| &b.label == target) {
                    return Err(BftError::Verify(format!(
                        "branch from '{}' to undefined block '{}'",
                        block.label, target
                    )));
                }
            }
        }
        Ok(())
    }

    /// Verify, then render the module text.
    pub fn finish(self, module_id: &str) -> Result<String, BftError> {
        self.verify()?;
        let mut out = String::new();
        let _ = writeln!(out, "; ModuleID = '{}'", module_id);
        out.push('\n');
        for decl in &self.declarations {
            let _ = writeln!(out, "{}", decl);
        }
        out.push('\n');
        out.push_str("define i32 @main() {\n");
        for (index, block) in self.blocks.iter().enumerate() {
            if index > 0 {
                out.push('\n');
            }
            let _ = writeln!(out, "{}:", block.label);
            for inst in &block.insts {
                let _ = writeln!(out, "  {}", inst);
            }
            if let Some(terminator) = &block.terminator {
                let _ = writeln!(out, "  {}", terminator);
            }
        }
        out.push_str("}\n");
        Ok(out)
    }
}

impl Default for ModuleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unterminated_block_fails_verification() {
        let m = ModuleBuilder::new();
        assert!(matches!(m.verify(), Err(BftError::Verify(_))));
    }

    #[test]
    fn test_undefined_branch_target_fails_verification() {
        let mut m = ModuleBuilder::new();
        m.terminate("br label %missing".to_owned(), &["missing"]);
        let err = m.verify().unwrap_err();
        match err {
            BftError::Verify(message) => assert!(message.contains("missing")),
            other => panic!("expected verify error, got {:?}", other),
        }
    }

    #[test]
    fn test_instruction_after_terminator_fails_verification() {
        let mut m = ModuleBuilder::new();
        m.terminate("ret i32 0".to_owned(), &[]);
        m.push("call i32 @getchar()".to_owned());
        assert!(matches!(m.verify(), Err(BftError::Verify(_))));
    }

    #[test]
    fn test_minimal_module_renders() {
        let mut m = ModuleBuilder::new();
        m.declare("declare i32 @putchar(i32)");
        m.push("call i32 @putchar(i32 33)".to_owned());
        m.terminate("ret i32 0".to_owned(), &[]);
        let text = m.finish("demo").unwrap();
        assert!(text.starts_with("; ModuleID = 'demo'"));
        assert!(text.contains("define i32 @main() {"));
        assert!(text.contains("entry:"));
        assert!(text.contains("  call i32 @putchar(i32 33)"));
        assert!(text.trim_end().ends_with('}'));
    }

    #[test]
    fn test_fresh_names_are_unique() {
        let mut m = ModuleBuilder::new();
        assert_ne!(m.fresh_temp(), m.fresh_temp());
        assert_ne!(m.fresh_label("loop_cond"), m.fresh_label("loop_cond"));
    }
}
