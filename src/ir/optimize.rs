//! Loop optimization pass
//!
//! Rewrites classified loops into specialized IR nodes, innermost loops
//! first. A rewritten loop keeps its original node id so profiling
//! counters stay stable across optimization.

use super::analysis;
use super::types::{Inst, LoopClass};

/// Which loop rewrites are enabled. Both default to on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizerConfig {
    pub simple_loops: bool,
    pub memory_scans: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            simple_loops: true,
            memory_scans: true,
        }
    }
}

impl OptimizerConfig {
    /// A configuration with every rewrite disabled.
    pub fn none() -> Self {
        OptimizerConfig {
            simple_loops: false,
            memory_scans: false,
        }
    }

    pub fn enabled(&self) -> bool {
        self.simple_loops || self.memory_scans
    }
}

/// Optimize an instruction sequence in place.
///
/// Each loop's body is optimized first, then the loop is re-classified
/// and, where the configuration allows, replaced by its specialized
/// form. A body holding any loop-like node (including one produced by
/// this pass) classifies as General and is left as a plain loop.
pub fn optimize(insts: &mut [Inst], config: &OptimizerConfig) {
    for slot in insts.iter_mut() {
        let replacement = match slot {
            Inst::Loop { body, class, id } => {
                optimize(body, config);
                let classified = analysis::classify_body(body);
                *class = classified;
                match classified {
                    LoopClass::Simple if config.simple_loops => {
                        let (_, mut deltas) = analysis::body_deltas(body);
                        deltas.remove(&0);
                        deltas.retain(|_, change| *change != 0);
                        Some(Inst::SimpleLoop { deltas, id: *id })
                    }
                    LoopClass::ScanPow2 if config.memory_scans => {
                        let (stride, _) = analysis::body_deltas(body);
                        Some(Inst::ScanLoop { stride, id: *id })
                    }
                    _ => None,
                }
            }
            _ => None,
        };
        if let Some(inst) = replacement {
            *slot = inst;
        }
    }
}
