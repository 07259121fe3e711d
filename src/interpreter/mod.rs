pub mod ast_interpreter;
pub mod ir_interpreter;

pub use self::ast_interpreter::AstInterpreter;
pub use self::ir_interpreter::{ExecutionStats, IrInterpreter};

use std::{
    cell::RefCell,
    io::{self, ErrorKind, Read, Write},
    rc::Rc,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Cursor ({index:}) out of bounds (tape length {len:})")]
    OutOfBounds { index: i64, len: usize },

    #[error("I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("Gave up after {limit:} steps")]
    StepLimitExceeded { limit: u64 },

    #[error("Can't execute {what:}")]
    Malformed { what: String },

    #[error("No function named @{name:} to call")]
    UnknownFunction { name: String },
}

/// Tape, cursor and the streams `,` and `.` talk to
pub struct Runtime {
    /// Signed so moving left of cell 0 is representable, only accesses are checked
    cursor: i64,

    tape: Vec<u8>,

    input: Box<dyn Read>,
    output: Box<dyn Write>,
}

impl Runtime {
    pub fn new(tape_size: usize, input: Box<dyn Read>, output: Box<dyn Write>) -> Self {
        Self {
            cursor: 0,
            tape: vec![0; tape_size],
            input,
            output,
        }
    }

    /// Fresh tape and cursor, the streams stay where they are
    pub fn reset(&mut self) {
        self.tape = vec![0; self.tape.len()];
        self.cursor = 0;
    }

    pub fn cursor(&self) -> i64 {
        self.cursor
    }

    pub fn tape(&self) -> &[u8] {
        &self.tape
    }

    pub fn move_cursor(&mut self, by: i64) {
        self.cursor = self.cursor.wrapping_add(by);
    }

    fn index(&self) -> Result<usize, RuntimeError> {
        usize::try_from(self.cursor)
            .ok()
            .filter(|i| *i < self.tape.len())
            .ok_or(RuntimeError::OutOfBounds {
                index: self.cursor,
                len: self.tape.len(),
            })
    }

    pub fn cell(&self) -> Result<u8, RuntimeError> {
        Ok(self.tape[self.index()?])
    }

    pub fn set_cell(&mut self, value: u8) -> Result<(), RuntimeError> {
        let index = self.index()?;
        self.tape[index] = value;
        Ok(())
    }

    pub fn add_to_cell(&mut self, by: u8) -> Result<(), RuntimeError> {
        let value = self.cell()?;
        self.set_cell(value.wrapping_add(by))
    }

    pub fn sub_from_cell(&mut self, by: u8) -> Result<(), RuntimeError> {
        let value = self.cell()?;
        self.set_cell(value.wrapping_sub(by))
    }

    /// `getchar` semantics: the next input byte, or -1 once input runs out
    pub fn read_byte(&mut self) -> Result<i32, RuntimeError> {
        let mut buf = [0u8; 1];
        loop {
            match self.input.read(&mut buf) {
                Ok(0) => return Ok(-1),
                Ok(_) => return Ok(buf[0] as i32),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn write_byte(&mut self, byte: u8) -> Result<(), RuntimeError> {
        self.output.write_all(&[byte])?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), RuntimeError> {
        self.output.flush()?;
        Ok(())
    }
}

/// Output sink that can still be inspected after a `Runtime` took ownership of it
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.0.borrow().clone()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime(input: &'static [u8]) -> (Runtime, SharedBuffer) {
        let out = SharedBuffer::new();
        (Runtime::new(4, Box::new(input), Box::new(out.clone())), out)
    }

    #[test]
    fn cells_wrap() {
        let (mut rt, _) = runtime(b"");
        rt.sub_from_cell(1).unwrap();
        assert_eq!(rt.cell().unwrap(), 255);
        rt.add_to_cell(1).unwrap();
        assert_eq!(rt.cell().unwrap(), 0);
    }

    #[test]
    fn moving_is_free_touching_is_checked() {
        let (mut rt, _) = runtime(b"");
        rt.move_cursor(-1);
        assert_eq!(rt.cursor(), -1);
        assert!(matches!(
            rt.cell(),
            Err(RuntimeError::OutOfBounds { index: -1, len: 4 })
        ));
        rt.move_cursor(5);
        assert!(matches!(rt.set_cell(1), Err(RuntimeError::OutOfBounds { index: 4, .. })));
    }

    #[test]
    fn input_ends_with_minus_one() {
        let (mut rt, _) = runtime(b"a");
        assert_eq!(rt.read_byte().unwrap(), b'a' as i32);
        assert_eq!(rt.read_byte().unwrap(), -1);
        assert_eq!(rt.read_byte().unwrap(), -1);
    }

    #[test]
    fn output_is_shared() {
        let (mut rt, out) = runtime(b"");
        rt.write_byte(b'h').unwrap();
        rt.write_byte(b'i').unwrap();
        assert_eq!(out.contents(), b"hi");
    }

    #[test]
    fn reset_clears_the_tape() {
        let (mut rt, _) = runtime(b"");
        rt.move_cursor(2);
        rt.add_to_cell(7).unwrap();
        rt.reset();
        assert_eq!(rt.cursor(), 0);
        assert_eq!(rt.tape(), &[0, 0, 0, 0]);
    }
}
