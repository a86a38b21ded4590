//! Tree-walk interpreter
//!
//! Executes the IR directly against a growable tape of u8 cells. The
//! tape starts as a single zero cell and extends on demand to the
//! right; moving the pointer below cell 0 is fatal. Cell arithmetic
//! wraps modulo 256 and end of input reads as 0.

use std::io::{Read, Write};

use crate::ir::{CellDeltas, Inst};
use crate::profile::Profile;
use crate::BftError;

pub struct Interpreter<R, W, P> {
    input: R,
    output: W,
    profile: P,
    tape: Vec<u8>,
    dp: usize,
}

impl<R: Read, W: Write, P: Profile> Interpreter<R, W, P> {
    pub fn new(input: R, output: W, profile: P) -> Self {
        Interpreter {
            input,
            output,
            profile,
            tape: vec![0],
            dp: 0,
        }
    }

    /// Execute a whole program.
    pub fn run(&mut self, insts: &[Inst]) -> Result<(), BftError> {
        for inst in insts {
            self.exec(inst)?;
        }
        Ok(())
    }

    /// Give back the streams and the profile once execution is done.
    pub fn into_parts(self) -> (R, W, P) {
        (self.input, self.output, self.profile)
    }

    fn exec(&mut self, inst: &Inst) -> Result<(), BftError> {
        self.profile.executed(inst.id());
        match inst {
            Inst::PtrAdd { amount, .. } => self.move_by(*amount as i64)?,
            Inst::CellAdd { amount, .. } => {
                self.tape[self.dp] = self.tape[self.dp].wrapping_add(*amount as u8);
            }
            Inst::Output { .. } => {
                self.output.write_all(&[self.tape[self.dp]])?;
            }
            Inst::Input { .. } => {
                let mut byte = [0u8; 1];
                let read = self.input.read(&mut byte)?;
                self.tape[self.dp] = if read == 0 { 0 } else { byte[0] };
            }
            Inst::Loop { body, id, .. } => {
                while self.tape[self.dp] != 0 {
                    self.profile.iterated(*id);
                    for inst in body {
                        self.exec(inst)?;
                    }
                }
            }
            Inst::SimpleLoop { deltas, .. } => self.exec_simple(deltas)?,
            Inst::ScanLoop { stride, .. } => {
                while self.tape[self.dp] != 0 {
                    self.move_by(*stride as i64)?;
                }
            }
        }
        Ok(())
    }

    fn move_by(&mut self, delta: i64) -> Result<(), BftError> {
        let next = self.dp as i64 + delta;
        if next < 0 {
            return Err(BftError::PointerUnderflow);
        }
        self.dp = next as usize;
        if self.dp >= self.tape.len() {
            self.tape.resize(self.dp + 1, 0);
        }
        Ok(())
    }

    /// Apply a collapsed simple loop: scale every delta by the current
    /// cell, then zero it. A zero current cell is a complete no-op, so
    /// the tape is neither grown nor underflowed, exactly as the loop
    /// this node replaced.
    fn exec_simple(&mut self, deltas: &CellDeltas) -> Result<(), BftError> {
        let current = self.tape[self.dp];
        if current != 0 {
            for (&offset, &change) in deltas {
                let index = self.dp as i64 + offset as i64;
                if index < 0 {
                    return Err(BftError::PointerUnderflow);
                }
                let index = index as usize;
                if index >= self.tape.len() {
                    self.tape.resize(index + 1, 0);
                }
                let scaled = (change as u8).wrapping_mul(current);
                self.tape[index] = self.tape[index].wrapping_add(scaled);
            }
        }
        self.tape[self.dp] = 0;
        Ok(())
    }

    #[cfg(test)]
    fn tape(&self) -> &[u8] {
        &self.tape
    }

    #[cfg(test)]
    fn dp(&self) -> usize {
        self.dp
    }
}
