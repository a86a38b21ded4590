//! Property-based soundness tests
//!
//! The generators below build programs from *balanced blocks*: the
//! pointer never moves left of the block's entry cell, and every
//! generated loop steps its control cell by exactly -1 per iteration
//! with a body shifted strictly right of the control. Such programs
//! always terminate and never underflow, so behavioural equivalence
//! can be asserted outright:
//!
//! - the optimizer must not change observable output, under any flag
//!   combination;
//! - partial evaluation of an input-free program must fold it to an
//!   empty tree whose compile-time buffer equals the interpreter's
//!   output;
//! - `unparse . parse` must reproduce the command stream.

use proptest::prelude::*;

use bft::ir::{optimize, OptimizerConfig};
use bft::profile::NoProfile;
use bft::{evaluate, parse, unparse, Inst, Interpreter};

fn interpret(insts: &[Inst], input: &[u8]) -> Vec<u8> {
    let mut output = Vec::new();
    let mut interp = Interpreter::new(input, &mut output, NoProfile);
    interp.run(insts).expect("generated programs never fault");
    drop(interp);
    output
}

fn arb_block(depth: u32, in_loop: bool) -> BoxedStrategy<String> {
    let leaf = prop_oneof![
        3 => (1..=4usize).prop_map(|n| "+".repeat(n)),
        2 => (1..=3usize).prop_map(|n| "-".repeat(n)),
        1 => Just(".".to_owned()),
        1 => Just(",".to_owned()),
    ];
    if depth == 0 {
        leaf.boxed()
    } else {
        let mut arms = vec![
            (4u32, leaf.boxed()),
            // A subtree shifted right and back.
            (
                2,
                (1..=2usize, arb_sequence(depth - 1, in_loop))
                    .prop_map(|(n, inner)| {
                        format!("{}{}{}", ">".repeat(n), inner, "<".repeat(n))
                    })
                    .boxed(),
            ),
            // A counted loop: the leading - owns the control cell, the
            // body works strictly to its right and must hold its net
            // pointer shift at zero, so scans are excluded inside.
            (
                2,
                (1..=2usize, arb_sequence(depth - 1, true))
                    .prop_map(|(n, inner)| {
                        format!("[-{}{}{}]", ">".repeat(n), inner, "<".repeat(n))
                    })
                    .boxed(),
            ),
        ];
        if !in_loop {
            // A rightward scan; everything right of the written region
            // is zero, so it lands quickly.
            arms.push((1, Just("[>]".to_owned()).boxed()));
        }
        proptest::strategy::Union::new_weighted(arms).boxed()
    }
}

fn arb_sequence(depth: u32, in_loop: bool) -> BoxedStrategy<String> {
    prop::collection::vec(arb_block(depth, in_loop), 0..6)
        .prop_map(|blocks| blocks.concat())
        .boxed()
}

fn arb_program() -> BoxedStrategy<String> {
    arb_sequence(2, false)
}

fn arb_input() -> BoxedStrategy<Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..8).boxed()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn optimizer_preserves_behaviour(source in arb_program(), input in arb_input()) {
        let program = parse(&source).unwrap();
        let expected = interpret(&program.insts, &input);

        let configs = [
            OptimizerConfig::default(),
            OptimizerConfig { simple_loops: true, memory_scans: false },
            OptimizerConfig { simple_loops: false, memory_scans: true },
        ];
        for config in configs {
            let mut optimized = program.insts.clone();
            optimize(&mut optimized, &config);
            prop_assert_eq!(&interpret(&optimized, &input), &expected);
        }
    }

    #[test]
    fn input_free_programs_fold_completely(source in arb_program()) {
        let source: String = source.chars().filter(|c| *c != ',').collect();
        let program = parse(&source).unwrap();
        let expected = interpret(&program.insts, b"");

        let folded = evaluate(program.insts).unwrap();
        prop_assert!(folded.program.is_empty());
        prop_assert_eq!(folded.output, expected);
    }

    #[test]
    fn unparse_reproduces_the_command_stream(source in arb_program()) {
        let program = parse(&source).unwrap();
        prop_assert_eq!(unparse(&program.insts), source);
    }
}
