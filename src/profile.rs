//! Execution profiling
//!
//! The interpreter is parametric over a [`Profile`] capability so the
//! unprofiled path pays nothing per node. [`NoProfile`] compiles to
//! no-ops; [`Recorder`] counts node executions and loop iterations and
//! renders the report printed by `run -p`.

use std::collections::HashMap;
use std::fmt::Write;

use crate::ir::{self, Inst, LoopClass, NodeId};

/// Hooks the interpreter calls while walking the tree.
pub trait Profile {
    /// A node was entered.
    fn executed(&mut self, _id: NodeId) {}
    /// A loop's body is about to run one iteration.
    fn iterated(&mut self, _id: NodeId) {}
}

/// The zero-cost profile.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProfile;

impl Profile for NoProfile {}

/// Records per-node execution counts and per-loop iteration counts.
#[derive(Debug, Clone)]
pub struct Recorder {
    executions: Vec<u64>,
    iterations: HashMap<NodeId, u64>,
}

impl Recorder {
    pub fn new(node_count: usize) -> Self {
        Recorder {
            executions: vec![0; node_count],
            iterations: HashMap::new(),
        }
    }

    pub fn executions(&self, id: NodeId) -> u64 {
        self.executions.get(id).copied().unwrap_or(0)
    }

    pub fn iterations(&self, id: NodeId) -> u64 {
        self.iterations.get(&id).copied().unwrap_or(0)
    }

    /// Render the post-run report: executed instructions by id, then
    /// innermost loops ranked by iteration count, simple loops apart
    /// from the rest.
    pub fn report(&self, insts: &[Inst]) -> String {
        let mut nodes = Vec::new();
        ir::visit(insts, &mut |inst| nodes.push(inst));
        nodes.sort_by_key(|inst| inst.id());

        let mut out = String::new();
        out.push_str("\nInstruction execution counts:\n");
        for inst in &nodes {
            let count = self.executions(inst.id());
            if count > 0 {
                let _ = writeln!(out, "{} {}", inst.symbol(), count);
            }
        }

        let mut simple = Vec::new();
        let mut general = Vec::new();
        for inst in &nodes {
            if let Inst::Loop { body, class, id } = inst {
                let innermost = !body.iter().any(|child| matches!(child, Inst::Loop { .. }));
                let count = self.iterations(*id);
                if innermost && count > 0 {
                    if *class == LoopClass::Simple {
                        simple.push((*id, count));
                    } else {
                        general.push((*id, count));
                    }
                }
            }
        }
        simple.sort_by(|a, b| b.1.cmp(&a.1));
        general.sort_by(|a, b| b.1.cmp(&a.1));

        out.push_str("\nSimple innermost loops:\n");
        for (id, count) in &simple {
            let _ = writeln!(out, "Loop at instruction id {} executed {} times", id, count);
        }
        out.push_str("\nNon-simple innermost loops:\n");
        for (id, count) in &general {
            let _ = writeln!(out, "Loop at instruction id {} executed {} times", id, count);
        }
        out
    }
}

impl Profile for Recorder {
    fn executed(&mut self, id: NodeId) {
        if let Some(slot) = self.executions.get_mut(id) {
            *slot += 1;
        }
    }

    fn iterated(&mut self, id: NodeId) {
        *self.iterations.entry(id).or_insert(0) += 1;
    }
}
