use std::iter::Copied;

use super::Symbol;

/// Pulls bytes off a stream and hands back the recognized symbols.
///
/// Anything that isn't one of the eight symbols is a comment and gets dropped
/// on the floor, there is no such thing as a lexer error.
#[derive(Debug, Clone)]
pub struct Lexer<I: Iterator<Item = u8>> {
    bytes: I,

    /// Set once the underlying stream has returned `None`
    exhausted: bool,
}

impl<'a> Lexer<Copied<std::slice::Iter<'a, u8>>> {
    pub fn new(source: &'a [u8]) -> Self {
        Lexer::from_bytes(source.iter().copied())
    }
}

impl<I: Iterator<Item = u8>> Lexer<I> {
    pub fn from_bytes(bytes: I) -> Self {
        Lexer {
            bytes,
            exhausted: false,
        }
    }

    pub fn next_symbol(&mut self) -> Option<Symbol> {
        if self.exhausted {
            return None;
        }

        loop {
            match self.bytes.next() {
                Some(c) => {
                    if let Some(symbol) = Symbol::from_byte(c) {
                        return Some(symbol);
                    }
                }
                None => {
                    self.exhausted = true;
                    return None;
                }
            }
        }
    }

    /// Has the underlying stream run dry?
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn collect_symbols(&mut self) -> Vec<Symbol> {
        let mut v = vec![];
        while let Some(symbol) = self.next_symbol() {
            v.push(symbol);
        }
        v
    }
}

impl<I: Iterator<Item = u8>> Iterator for Lexer<I> {
    type Item = Symbol;

    fn next(&mut self) -> Option<Symbol> {
        self.next_symbol()
    }
}
