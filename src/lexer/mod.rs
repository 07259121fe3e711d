pub mod lexer;

pub use self::lexer::Lexer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    // `+`: Increment the byte under the cursor by one
    Increment,
    // `-`: Decrement the byte under the cursor by one
    Decrement,

    // `<`: Move the cursor one cell to the left
    MoveLeft,
    // `>`: Move the cursor one cell to the right
    MoveRight,

    // `.`: Write the byte under the cursor to the output device
    PutChar,
    // `,`: Read the next byte from the input device into the cell under the cursor
    GetChar,

    // `[`: Opens a conditional group
    GroupStart,
    // `]`: Closes the innermost conditional group
    GroupEnd,
}

impl Symbol {
    pub fn from_byte(c: u8) -> Option<Symbol> {
        match c {
            b'+' => Some(Symbol::Increment),
            b'-' => Some(Symbol::Decrement),
            b'<' => Some(Symbol::MoveLeft),
            b'>' => Some(Symbol::MoveRight),
            b'.' => Some(Symbol::PutChar),
            b',' => Some(Symbol::GetChar),
            b'[' => Some(Symbol::GroupStart),
            b']' => Some(Symbol::GroupEnd),
            // every other byte is a comment
            _ => None,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            Symbol::Increment => '+',
            Symbol::Decrement => '-',
            Symbol::MoveLeft => '<',
            Symbol::MoveRight => '>',
            Symbol::PutChar => '.',
            Symbol::GetChar => ',',
            Symbol::GroupStart => '[',
            Symbol::GroupEnd => ']',
        }
    }
}
