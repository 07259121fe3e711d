//! Compiles the 8 symbol tape language into an LLVM shaped IR.
//!
//! Source bytes go through the [`lexer`] and [`parser`] into a [`parser::Node`]
//! tree, [`codegen`] lowers that tree into an [`ir::Module`], the [`optimizer`]
//! cleans it up and the [`interpreter`]s run either form.

pub mod codegen;
pub mod interpreter;
pub mod ir;
pub mod lexer;
pub mod logger;
pub mod optimizer;
pub mod parser;

pub use codegen::{compile, CodegenError, CodegenOptions};
pub use parser::{parse, Node};
