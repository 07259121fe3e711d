use tracing::trace;

use crate::parser::Node;

use super::{Runtime, RuntimeError};

/// Walks the tree directly, the reference the generated code is checked against
#[derive(Debug, Default)]
pub struct AstInterpreter {
    max_steps: Option<u64>,
    steps: u64,
}

impl AstInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop with an error once this many nodes have been executed
    pub fn with_step_limit(max_steps: u64) -> Self {
        Self {
            max_steps: Some(max_steps),
            steps: 0,
        }
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn interpret(&mut self, runtime: &mut Runtime, program: &Node) -> Result<(), RuntimeError> {
        self.steps = 0;
        self.interpret_node(runtime, program)?;
        runtime.flush()
    }

    fn step(&mut self) -> Result<(), RuntimeError> {
        self.steps += 1;
        match self.max_steps {
            Some(limit) if self.steps > limit => Err(RuntimeError::StepLimitExceeded { limit }),
            _ => Ok(()),
        }
    }

    fn interpret_node(&mut self, runtime: &mut Runtime, node: &Node) -> Result<(), RuntimeError> {
        self.step()?;
        match node {
            Node::Increment => runtime.add_to_cell(1)?,
            Node::Decrement => runtime.sub_from_cell(1)?,
            Node::MoveLeft => runtime.move_cursor(-1),
            Node::MoveRight => runtime.move_cursor(1),
            Node::PutChar => {
                let value = runtime.cell()?;
                runtime.write_byte(value)?;
            }
            Node::GetChar => {
                // end of input is -1, which truncates to 255 like the generated code does
                let c = runtime.read_byte()?;
                runtime.set_cell(c as u8)?;
            }
            Node::Program(children) => {
                for child in children.iter() {
                    self.interpret_node(runtime, child)?;
                }
            }
            Node::ConditionalGroup(children) => {
                while runtime.cell()? != 0 {
                    trace!("group pass at cursor {}", runtime.cursor());
                    self.step()?;
                    for child in children.iter() {
                        self.interpret_node(runtime, child)?;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{interpreter::SharedBuffer, parser::parse};

    fn run(source: &str, input: &'static [u8]) -> Result<Vec<u8>, RuntimeError> {
        let out = SharedBuffer::new();
        let mut runtime = Runtime::new(16, Box::new(input), Box::new(out.clone()));
        AstInterpreter::new().interpret(&mut runtime, &parse(source.as_bytes()))?;
        Ok(out.contents())
    }

    #[test]
    fn prints_three() {
        assert_eq!(run("+++.", b"").unwrap(), vec![3]);
    }

    #[test]
    fn echoes_until_zero() {
        assert_eq!(run(",[.,]", b"hi\0ignored").unwrap(), b"hi");
    }

    #[test]
    fn end_of_input_reads_as_255() {
        assert_eq!(run(",.", b"").unwrap(), vec![255]);
    }

    #[test]
    fn nested_loops_multiply() {
        // 3 * 4 into the second cell
        assert_eq!(run("+++[>++++<-]>.", b"").unwrap(), vec![12]);
    }

    #[test]
    fn leaving_the_tape_is_an_error() {
        assert!(matches!(
            run("<+", b""),
            Err(RuntimeError::OutOfBounds { index: -1, .. })
        ));
    }

    #[test]
    fn runaway_loops_hit_the_limit() {
        let mut runtime = Runtime::new(4, Box::new(&b""[..]), Box::new(SharedBuffer::new()));
        let mut interpreter = AstInterpreter::with_step_limit(100);
        let result = interpreter.interpret(&mut runtime, &parse(b"+[]"));
        assert!(matches!(result, Err(RuntimeError::StepLimitExceeded { limit: 100 })));
    }
}
