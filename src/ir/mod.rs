//! A small SSA IR shaped after LLVM's: modules hold functions, functions hold
//! basic blocks, blocks hold instructions ending in exactly one terminator.
//! The printer emits textual IR that `llc`/`clang` can pick up.

use thiserror::Error;

pub mod builder;
pub mod function;
pub mod instruction;
pub mod module;
pub mod printer;
pub mod types;
pub mod value;
pub mod verifier;

pub use self::builder::Builder;
pub use self::function::{BasicBlock, Function};
pub use self::instruction::{BinaryOp, CastOp, InstKind, Instruction, IntPredicate};
pub use self::module::Module;
pub use self::types::{FunctionType, Type};
pub use self::value::{BlockId, Constant, FuncId, InstId, Value};
pub use self::verifier::{verify_function, verify_module, VerifyError};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuilderError {
    #[error("Builder isn't positioned inside a block")]
    NoInsertPoint,

    #[error("Block {block:} already ends in a terminator")]
    BlockTerminated { block: String },

    #[error("Expected an integer but found {ty:}")]
    NotAnInteger { ty: Type },
}
