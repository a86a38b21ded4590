//! Brainfuck parser
//!
//! Turns source text into the IR tree. The eight command characters are
//! significant; every other byte is a comment and is dropped. Bracket
//! matching is enforced here and nowhere else: an unmatched bracket is a
//! fatal parse error carrying the byte position of the offender.
//!
//! Node ids are handed out from a dense counter in source order, so a
//! loop's id always precedes the ids of its body.

use std::fmt;

use crate::ir::{Inst, LoopClass, NodeId, Program};
use crate::BftError;

/// An inclusive byte range pointing into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub start: usize,
    pub end: usize,
}

impl Position {
    fn at(index: usize) -> Self {
        Position {
            start: index,
            end: index,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
    next_id: NodeId,
}

impl<'a> Parser<'a> {
    fn fresh(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Parse one sequence. `open` holds the byte index of the `[` this
    /// sequence belongs to, or `None` at the top level.
    fn sequence(&mut self, open: Option<usize>) -> Result<Vec<Inst>, BftError> {
        let mut insts = Vec::new();
        while self.pos < self.src.len() {
            let index = self.pos;
            let byte = self.src[index];
            self.pos += 1;
            match byte {
                b'>' => insts.push(Inst::PtrAdd {
                    amount: 1,
                    id: self.fresh(),
                }),
                b'<' => insts.push(Inst::PtrAdd {
                    amount: -1,
                    id: self.fresh(),
                }),
                b'+' => insts.push(Inst::CellAdd {
                    amount: 1,
                    id: self.fresh(),
                }),
                b'-' => insts.push(Inst::CellAdd {
                    amount: -1,
                    id: self.fresh(),
                }),
                b'.' => insts.push(Inst::Output { id: self.fresh() }),
                b',' => insts.push(Inst::Input { id: self.fresh() }),
                b'[' => {
                    let id = self.fresh();
                    let body = self.sequence(Some(index))?;
                    insts.push(Inst::Loop {
                        body,
                        class: LoopClass::Unknown,
                        id,
                    });
                }
                b']' => {
                    if open.is_some() {
                        return Ok(insts);
                    }
                    return Err(BftError::Parse {
                        message: "this ] has no matching [".to_owned(),
                        position: Position::at(index),
                    });
                }
                _ => {}
            }
        }
        match open {
            None => Ok(insts),
            Some(index) => Err(BftError::Parse {
                message: "this [ has no matching ]".to_owned(),
                position: Position::at(index),
            }),
        }
    }
}

/// Parse Brainfuck source into a [`Program`].
pub fn parse(source: &str) -> Result<Program, BftError> {
    let mut parser = Parser {
        src: source.as_bytes(),
        pos: 0,
        next_id: 0,
    };
    let insts = parser.sequence(None)?;
    Ok(Program {
        insts,
        node_count: parser.next_id,
    })
}

/// Render an IR tree back to command characters. Optimized nodes decode
/// to an equivalent plain loop.
pub fn unparse(insts: &[Inst]) -> String {
    let mut out = String::new();
    unparse_into(insts, &mut out);
    out
}

fn push_run(out: &mut String, positive: char, negative: char, amount: i64) {
    let symbol = if amount < 0 { negative } else { positive };
    for _ in 0..amount.unsigned_abs() {
        out.push(symbol);
    }
}

fn unparse_into(insts: &[Inst], out: &mut String) {
    for inst in insts {
        match inst {
            Inst::PtrAdd { amount, .. } => push_run(out, '>', '<', *amount as i64),
            Inst::CellAdd { amount, .. } => push_run(out, '+', '-', *amount as i64),
            Inst::Output { .. } => out.push('.'),
            Inst::Input { .. } => out.push(','),
            Inst::Loop { body, .. } => {
                out.push('[');
                unparse_into(body, out);
                out.push(']');
            }
            Inst::SimpleLoop { deltas, .. } => {
                out.push_str("[-");
                let mut at = 0i64;
                for (&offset, &change) in deltas {
                    push_run(out, '>', '<', offset as i64 - at);
                    push_run(out, '+', '-', change as i64);
                    at = offset as i64;
                }
                push_run(out, '>', '<', -at);
                out.push(']');
            }
            Inst::ScanLoop { stride, .. } => {
                out.push('[');
                push_run(out, '>', '<', *stride as i64);
                out.push(']');
            }
        }
    }
}
