use std::fmt;

pub mod parser;

pub use self::parser::{parse, Parser};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Increment,
    Decrement,

    MoveLeft,
    MoveRight,

    PutChar,
    GetChar,

    /// The implicit top level scope, it has no opening symbol
    Program(Vec<Node>),
    /// `[ ... ]`
    ConditionalGroup(Vec<Node>),
}

impl Node {
    /// Children of a scope node, leaves have none
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Program(children) | Node::ConditionalGroup(children) => children,
            _ => &[],
        }
    }

    /// How deeply conditional groups are nested below (and including) this node
    pub fn depth(&self) -> usize {
        let inner = self
            .children()
            .iter()
            .map(Node::depth)
            .max()
            .unwrap_or(0);

        match self {
            Node::ConditionalGroup(_) => inner + 1,
            _ => inner,
        }
    }

    /// Total number of nodes in this tree, including this one
    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(Node::node_count).sum::<usize>()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Increment => f.write_str("+"),
            Node::Decrement => f.write_str("-"),
            Node::MoveLeft => f.write_str("<"),
            Node::MoveRight => f.write_str(">"),
            Node::PutChar => f.write_str("."),
            Node::GetChar => f.write_str(","),
            Node::Program(children) => {
                for child in children {
                    write!(f, "{}", child)?;
                }
                Ok(())
            }
            Node::ConditionalGroup(children) => {
                f.write_str("[")?;
                for child in children {
                    write!(f, "{}", child)?;
                }
                f.write_str("]")
            }
        }
    }
}
