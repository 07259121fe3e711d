use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use super::{BlockId, CastOp, Function, InstId, InstKind, Module, Type, Value};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VerifyError {
    #[error("{function:}: function has no body")]
    MissingBody { function: String },

    #[error("{function:}: block '{block:}' doesn't end in a terminator")]
    MissingTerminator { function: String, block: String },

    #[error("{function:}: block '{block:}' has a terminator in the middle")]
    TerminatorNotLast { function: String, block: String },

    #[error("{function:}: block '{block:}' branches to a block that isn't in the function")]
    UnknownBlock { function: String, block: String },

    #[error("{function:}: block '{block:}' uses a value that isn't defined in the function")]
    UndefinedValue { function: String, block: String },

    #[error("{function:}: block '{block:}' uses a value before it is defined")]
    UseBeforeDef { function: String, block: String },

    #[error("{function:}: block '{block:}': {message:}")]
    TypeMismatch {
        function: String,
        block: String,
        message: String,
    },
}

struct Verifier<'a> {
    module: &'a Module,
    function: &'a Function,
    /// Where every linked instruction lives: (block, position in block)
    defs: HashMap<InstId, (BlockId, usize)>,
}

impl<'a> Verifier<'a> {
    fn block_name(&self, block: BlockId) -> String {
        self.function.block(block).name.clone()
    }

    fn mismatch(&self, block: BlockId, message: String) -> VerifyError {
        VerifyError::TypeMismatch {
            function: self.function.name.clone(),
            block: self.block_name(block),
            message,
        }
    }

    fn ty(&self, value: &Value) -> Type {
        self.function.value_type(value)
    }

    fn expect_type(&self, block: BlockId, what: &str, value: &Value, expected: &Type) -> Result<(), VerifyError> {
        let found = self.ty(value);
        if found != *expected {
            return Err(self.mismatch(
                block,
                format!("{} should be {} but is {}", what, expected, found),
            ));
        }
        Ok(())
    }

    fn expect_int(&self, block: BlockId, what: &str, value: &Value) -> Result<u32, VerifyError> {
        let found = self.ty(value);
        found
            .int_width()
            .ok_or_else(|| self.mismatch(block, format!("{} should be an integer but is {}", what, found)))
    }

    fn check_block_shape(&self, block: BlockId) -> Result<(), VerifyError> {
        let instructions = &self.function.block(block).instructions;
        let function = self.function.name.clone();

        match instructions.last() {
            Some(last) if self.function.inst(*last).is_terminator() => {}
            _ => {
                return Err(VerifyError::MissingTerminator {
                    function,
                    block: self.block_name(block),
                })
            }
        }

        let early_terminator = instructions[..instructions.len() - 1]
            .iter()
            .any(|id| self.function.inst(*id).is_terminator());
        if early_terminator {
            return Err(VerifyError::TerminatorNotLast {
                function,
                block: self.block_name(block),
            });
        }

        for succ in self.function.successors(block) {
            if !self.function.contains_block(succ) {
                return Err(VerifyError::UnknownBlock {
                    function,
                    block: self.block_name(block),
                });
            }
        }

        Ok(())
    }

    fn check_operands(&self, block: BlockId, position: usize, id: InstId) -> Result<(), VerifyError> {
        for operand in self.function.inst(id).operands() {
            if let Value::Inst(used) = operand {
                match self.defs.get(used) {
                    None => {
                        return Err(VerifyError::UndefinedValue {
                            function: self.function.name.clone(),
                            block: self.block_name(block),
                        })
                    }
                    Some((def_block, def_position)) => {
                        if *def_block == block && *def_position >= position {
                            return Err(VerifyError::UseBeforeDef {
                                function: self.function.name.clone(),
                                block: self.block_name(block),
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn check_types(&self, block: BlockId, id: InstId) -> Result<(), VerifyError> {
        let inst = self.function.inst(id);
        match &inst.kind {
            InstKind::Alloca { ty } => {
                if ty.store_size().is_none() {
                    return Err(self.mismatch(block, format!("can't allocate {}", ty)));
                }
            }
            InstKind::Load { ty, ptr } => {
                self.expect_type(block, "load address", ptr, &Type::Ptr)?;
                if *ty == Type::Void {
                    return Err(self.mismatch(block, "can't load void".to_string()));
                }
            }
            InstKind::Store { value, ptr } => {
                self.expect_type(block, "store address", ptr, &Type::Ptr)?;
                if self.ty(value) == Type::Void {
                    return Err(self.mismatch(block, "can't store void".to_string()));
                }
            }
            InstKind::Binary { op, lhs, rhs } => {
                self.expect_int(block, op.mnemonic(), lhs)?;
                self.expect_type(block, op.mnemonic(), rhs, &self.ty(lhs))?;
                self.expect_type(block, op.mnemonic(), &Value::Inst(id), &self.ty(lhs))?;
            }
            InstKind::ICmp { lhs, rhs, .. } => {
                self.expect_int(block, "icmp", lhs)?;
                self.expect_type(block, "icmp", rhs, &self.ty(lhs))?;
            }
            InstKind::Gep {
                base_ty,
                ptr,
                indices,
            } => {
                self.expect_type(block, "getelementptr base", ptr, &Type::Ptr)?;
                if indices.is_empty() {
                    return Err(self.mismatch(block, "getelementptr without indices".to_string()));
                }
                // the first index steps over whole `base_ty`s, every further one steps into it
                let mut indexed = base_ty;
                for index in indices.iter().skip(1) {
                    indexed = indexed.element().ok_or_else(|| {
                        self.mismatch(block, format!("can't index into {}", indexed))
                    })?;
                    self.expect_int(block, "getelementptr index", index)?;
                }
                self.expect_int(block, "getelementptr index", &indices[0])?;
            }
            InstKind::Call { callee, args } => {
                let callee = self.module.function(*callee);
                if callee.ty.params.len() != args.len() {
                    return Err(self.mismatch(
                        block,
                        format!(
                            "call to @{} passes {} arguments but expects {}",
                            callee.name,
                            args.len(),
                            callee.ty.params.len()
                        ),
                    ));
                }
                for (arg, param) in args.iter().zip(callee.ty.params.iter()) {
                    self.expect_type(block, &format!("argument to @{}", callee.name), arg, param)?;
                }
                if inst.ty != callee.ty.ret {
                    return Err(self.mismatch(
                        block,
                        format!("call to @{} has the wrong result type", callee.name),
                    ));
                }
            }
            InstKind::Cast { op, value, ty } => {
                let from = self.expect_int(block, op.mnemonic(), value)?;
                let to = ty
                    .int_width()
                    .ok_or_else(|| self.mismatch(block, format!("can't cast to {}", ty)))?;
                let ok = match op {
                    CastOp::Trunc => from > to,
                    CastOp::SExt | CastOp::ZExt => from < to,
                };
                if !ok {
                    return Err(self.mismatch(
                        block,
                        format!("invalid {} from i{} to i{}", op.mnemonic(), from, to),
                    ));
                }
            }
            InstKind::Br { .. } => {}
            InstKind::CondBr { cond, .. } => {
                self.expect_type(block, "branch condition", cond, &Type::i1())?;
            }
            InstKind::Ret { value } => match value {
                Some(value) => self.expect_type(block, "return value", value, &self.function.ty.ret)?,
                None => {
                    if self.function.ty.ret != Type::Void {
                        return Err(self.mismatch(
                            block,
                            format!("missing return value of type {}", self.function.ty.ret),
                        ));
                    }
                }
            },
        }
        Ok(())
    }

    fn run(&self) -> Result<(), VerifyError> {
        if self.function.is_declaration() {
            return Err(VerifyError::MissingBody {
                function: self.function.name.clone(),
            });
        }

        for block in self.function.block_order() {
            self.check_block_shape(*block)?;
            for (position, id) in self.function.block(*block).instructions.iter().enumerate() {
                self.check_operands(*block, position, *id)?;
                self.check_types(*block, *id)?;
            }
        }
        Ok(())
    }
}

/// Structural checks on one function definition
pub fn verify_function(module: &Module, function: &Function) -> Result<(), VerifyError> {
    let mut defs = HashMap::new();
    for block in function.block_order() {
        for (position, id) in function.block(*block).instructions.iter().enumerate() {
            defs.insert(*id, (*block, position));
        }
    }

    let verifier = Verifier {
        module,
        function,
        defs,
    };
    verifier.run()?;
    debug!("verified @{}", function.name);
    Ok(())
}

/// Verifies every function that has a body
pub fn verify_module(module: &Module) -> Result<(), VerifyError> {
    for (_, function) in module.functions() {
        if !function.is_declaration() {
            verify_function(module, function)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Builder, FunctionType};

    fn setup() -> (Module, Builder, BlockId) {
        let mut module = Module::new("test");
        let main = module.add_function(Function::new("main", FunctionType::new(Type::Void, vec![])));
        let entry = module.function_mut(main).append_block("entry");
        let mut builder = Builder::new();
        builder.position_at_end(main, entry);
        (module, builder, entry)
    }

    fn main_of(module: &Module) -> &Function {
        module.function(module.get_function("main").unwrap())
    }

    #[test]
    fn accepts_a_well_formed_function() {
        let (mut module, mut builder, _) = setup();
        let slot = builder.build_alloca(&mut module, Type::i8(), "slot").unwrap();
        builder.build_store(&mut module, Value::int(8, 7), slot.clone()).unwrap();
        let v = builder.build_load(&mut module, Type::i8(), slot, "v").unwrap();
        let cond = builder
            .build_icmp(&mut module, crate::ir::IntPredicate::Ne, v, Value::int(8, 0), "c")
            .unwrap();
        let done = builder.append_block(&mut module, "done").unwrap();
        builder.build_cond_br(&mut module, cond, done, done).unwrap();
        builder.position_at_end(module.get_function("main").unwrap(), done);
        builder.build_ret(&mut module, None).unwrap();

        assert_eq!(verify_module(&module), Ok(()));
    }

    #[test]
    fn rejects_missing_terminator() {
        let (mut module, builder, _) = setup();
        builder.build_alloca(&mut module, Type::i8(), "slot").unwrap();
        assert!(matches!(
            verify_function(&module, main_of(&module)),
            Err(VerifyError::MissingTerminator { .. })
        ));
    }

    #[test]
    fn rejects_declarations() {
        let mut module = Module::new("test");
        let f = module.add_function(Function::new("f", FunctionType::new(Type::Void, vec![])));
        assert!(matches!(
            verify_function(&module, module.function(f)),
            Err(VerifyError::MissingBody { .. })
        ));
        // but declarations are skipped at the module level
        assert_eq!(verify_module(&module), Ok(()));
    }

    #[test]
    fn rejects_mismatched_operands() {
        let (mut module, builder, _) = setup();
        builder
            .build_add(&mut module, Value::int(8, 1), Value::int(64, 1), "bad")
            .unwrap();
        builder.build_ret(&mut module, None).unwrap();
        assert!(matches!(
            verify_function(&module, main_of(&module)),
            Err(VerifyError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn rejects_non_boolean_branch_condition() {
        let (mut module, builder, entry) = setup();
        builder
            .build_cond_br(&mut module, Value::int(8, 1), entry, entry)
            .unwrap();
        assert!(matches!(
            verify_function(&module, main_of(&module)),
            Err(VerifyError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn rejects_branch_to_removed_block() {
        let (mut module, builder, _) = setup();
        let gone = builder.append_block(&mut module, "gone").unwrap();
        builder.build_br(&mut module, gone).unwrap();
        let main = module.get_function("main").unwrap();
        module.function_mut(main).remove_block(gone);
        assert!(matches!(
            verify_function(&module, main_of(&module)),
            Err(VerifyError::UnknownBlock { .. })
        ));
    }

    #[test]
    fn rejects_bad_call_arity() {
        let (mut module, builder, _) = setup();
        let putchar = module.get_or_insert_function(
            "putchar",
            FunctionType::new(Type::i32(), vec![Type::i8()]),
        );
        builder.build_call(&mut module, putchar, vec![], "x").unwrap();
        builder.build_ret(&mut module, None).unwrap();
        assert!(matches!(
            verify_function(&module, main_of(&module)),
            Err(VerifyError::TypeMismatch { .. })
        ));
    }
}
