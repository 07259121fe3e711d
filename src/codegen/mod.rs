//! Lowers the AST into the IR.
//!
//! Memory model of the generated program: one `i64` slot holding the cursor and
//! one `[TAPE_SIZE x i8]` slot holding the tape, both allocated on entry to `main`.
//! The cursor is never bounds checked, moving it off either end of the tape and
//! then touching a cell is undefined behaviour in the generated code.

use thiserror::Error;
use tracing::{debug, info};

use crate::{
    ir::{Builder, BuilderError, FuncId, FunctionType, Module, Type, Value, VerifyError},
    parser::Node,
};

pub mod codegen;

pub use self::codegen::generate;

pub const TAPE_SIZE: u64 = 0x4000;
pub const ENTRY_NAME: &str = "main";
pub const PUTCHAR: &str = "putchar";
pub const GETCHAR: &str = "getchar";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodegenError {
    #[error("{node:} can only be generated inside a program")]
    MissingState { node: &'static str },

    #[error("@{name:} is already defined in this module")]
    EntryRedefined { name: String },

    #[error(transparent)]
    Builder(#[from] BuilderError),

    #[error("Generated function failed verification: {0}")]
    Verify(#[from] VerifyError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodegenOptions {
    /// Number of cells on the tape
    pub tape_size: u64,
    /// Name of the generated entry function
    pub entry_name: String,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        CodegenOptions {
            tape_size: TAPE_SIZE,
            entry_name: ENTRY_NAME.to_string(),
        }
    }
}

/// Everything one generation run needs: the module being filled, where to insert,
/// the two storage slots and the lazily declared I/O primitives.
pub struct CodegenContext {
    pub module: Module,
    pub builder: Builder,
    pub options: CodegenOptions,

    cursor: Option<Value>,
    tape: Option<Value>,

    putchar: Option<FuncId>,
    getchar: Option<FuncId>,
}

impl CodegenContext {
    pub fn new(module_name: &str, options: CodegenOptions) -> Self {
        CodegenContext {
            module: Module::new(module_name),
            builder: Builder::new(),
            options,
            cursor: None,
            tape: None,
            putchar: None,
            getchar: None,
        }
    }

    pub fn into_module(self) -> Module {
        self.module
    }

    pub fn tape_type(&self) -> Type {
        Type::array(Type::i8(), self.options.tape_size)
    }

    pub(crate) fn set_storage(&mut self, cursor: Value, tape: Value) {
        self.cursor = Some(cursor);
        self.tape = Some(tape);
    }

    pub(crate) fn cursor_slot(&self, node: &'static str) -> Result<Value, CodegenError> {
        self.cursor
            .clone()
            .ok_or(CodegenError::MissingState { node })
    }

    pub(crate) fn tape_slot(&self, node: &'static str) -> Result<Value, CodegenError> {
        self.tape.clone().ok_or(CodegenError::MissingState { node })
    }

    /// `i32 putchar(i8)`, declared the first time it is asked for
    pub(crate) fn putchar(&mut self) -> FuncId {
        if let Some(id) = self.putchar {
            return id;
        }
        let ty = FunctionType::new(Type::i32(), vec![Type::i8()]);
        let id = self.module.get_or_insert_function(PUTCHAR, ty);
        self.putchar = Some(id);
        id
    }

    /// `i32 getchar()`, declared the first time it is asked for
    pub(crate) fn getchar(&mut self) -> FuncId {
        if let Some(id) = self.getchar {
            return id;
        }
        let ty = FunctionType::new(Type::i32(), vec![]);
        let id = self.module.get_or_insert_function(GETCHAR, ty);
        self.getchar = Some(id);
        id
    }
}

/// Lowers a whole program into a fresh module, the entry function comes back verified
pub fn compile(program: &Node, module_name: &str, options: &CodegenOptions) -> Result<Module, CodegenError> {
    info!("generating IR for {} nodes", program.node_count());
    let mut ctx = CodegenContext::new(module_name, options.clone());
    generate(program, &mut ctx)?;

    let module = ctx.into_module();
    debug!("module has {} functions", module.functions().count());
    Ok(module)
}
