use tracing::trace;

use crate::lexer::{Lexer, Symbol};

use super::Node;

pub struct Parser<I: Iterator<Item = u8>> {
    lexer: Lexer<I>,
}

impl<'a> Parser<std::iter::Copied<std::slice::Iter<'a, u8>>> {
    pub fn new(source: &'a [u8]) -> Self {
        Parser {
            lexer: Lexer::new(source),
        }
    }
}

impl<I: Iterator<Item = u8>> Parser<I> {
    pub fn from_lexer(lexer: Lexer<I>) -> Self {
        Parser { lexer }
    }

    /// Consumes one logical unit, `None` means there is nothing more in this scope
    /// (either a `]` or the end of the stream).
    pub fn parse_node(&mut self) -> Option<Node> {
        let node = match self.lexer.next_symbol()? {
            Symbol::Increment => Node::Increment,
            Symbol::Decrement => Node::Decrement,
            Symbol::MoveLeft => Node::MoveLeft,
            Symbol::MoveRight => Node::MoveRight,
            Symbol::PutChar => Node::PutChar,
            Symbol::GetChar => Node::GetChar,
            Symbol::GroupStart => self.parse_group(),
            // the group has ended so we can stop
            Symbol::GroupEnd => return None,
        };

        Some(node)
    }

    /// Everything after a `[` up to its `]`, an unclosed group just runs to the end of the stream
    pub fn parse_group(&mut self) -> Node {
        let mut children = vec![];
        while let Some(node) = self.parse_node() {
            children.push(node);
        }

        Node::ConditionalGroup(children)
    }

    pub fn parse_program(&mut self) -> Node {
        let mut children = vec![];

        loop {
            match self.parse_node() {
                Some(node) => children.push(node),
                None if self.lexer.is_exhausted() => break,
                // a stray `]` at the top level doesn't close anything
                None => trace!("ignoring unmatched ']' at top level"),
            }
        }

        Node::Program(children)
    }
}

pub fn parse(source: &[u8]) -> Node {
    Parser::new(source).parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_leaves_in_order() {
        assert_eq!(
            parse(b"+++."),
            Node::Program(vec![
                Node::Increment,
                Node::Increment,
                Node::Increment,
                Node::PutChar,
            ])
        );
    }

    #[test]
    fn parses_echo_loop() {
        assert_eq!(
            parse(b",[.,]"),
            Node::Program(vec![
                Node::GetChar,
                Node::ConditionalGroup(vec![Node::PutChar, Node::GetChar]),
            ])
        );
    }

    #[test]
    fn empty_and_noise_only_programs() {
        assert_eq!(parse(b""), Node::Program(vec![]));
        assert_eq!(parse(b"this is a comment!"), Node::Program(vec![]));
    }

    #[test]
    fn unmatched_open_absorbs_rest_of_stream() {
        assert_eq!(
            parse(b"+[-[>"),
            Node::Program(vec![
                Node::Increment,
                Node::ConditionalGroup(vec![
                    Node::Decrement,
                    Node::ConditionalGroup(vec![Node::MoveRight]),
                ]),
            ])
        );
    }

    #[test]
    fn unmatched_close_at_top_level_is_a_no_op() {
        assert_eq!(
            parse(b"+]-"),
            Node::Program(vec![Node::Increment, Node::Decrement])
        );
        assert_eq!(parse(b"]]]"), Node::Program(vec![]));
    }

    #[test]
    fn extra_close_ends_the_innermost_group() {
        assert_eq!(
            parse(b"[+]]<"),
            Node::Program(vec![Node::ConditionalGroup(vec![Node::Increment]), Node::MoveLeft])
        );
    }

    #[test]
    fn parse_node_returns_sentinel_on_close_and_eof() {
        let mut parser = Parser::new(b"+]");
        assert_eq!(parser.parse_node(), Some(Node::Increment));
        assert_eq!(parser.parse_node(), None);
        assert_eq!(parser.parse_node(), None);
    }

    #[test]
    fn parses_from_any_byte_stream() {
        let bytes = "+[>.]".bytes().chain(std::iter::once(b'-'));
        let mut parser = Parser::from_lexer(Lexer::from_bytes(bytes));
        assert_eq!(
            parser.parse_program(),
            Node::Program(vec![
                Node::Increment,
                Node::ConditionalGroup(vec![Node::MoveRight, Node::PutChar]),
                Node::Decrement,
            ])
        );
    }

    #[test]
    fn depth_and_rendering() {
        let program = parse(b"a[b[c+]d-]e[.]");
        assert_eq!(program.depth(), 2);
        assert_eq!(program.to_string(), "[[+]-][.]");
        assert_eq!(program.node_count(), 7);
        assert_eq!(parse(b"+-").depth(), 0);
    }
}
