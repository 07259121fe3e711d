use super::{
    BinaryOp, BlockId, BuilderError, CastOp, FuncId, InstKind, Instruction, IntPredicate, Module,
    Type, Value,
};

/// Appends instructions at the end of whatever block it is positioned at.
///
/// The builder only remembers where to insert, the module is handed in on every call
/// so the owner of both can keep them side by side.
#[derive(Debug, Clone, Default)]
pub struct Builder {
    insert_point: Option<(FuncId, BlockId)>,
}

impl Builder {
    pub fn new() -> Builder {
        Builder { insert_point: None }
    }

    pub fn position_at_end(&mut self, function: FuncId, block: BlockId) {
        self.insert_point = Some((function, block));
    }

    pub fn clear_insertion_position(&mut self) {
        self.insert_point = None;
    }

    pub fn insert_block(&self) -> Option<(FuncId, BlockId)> {
        self.insert_point
    }

    fn current(&self) -> Result<(FuncId, BlockId), BuilderError> {
        self.insert_point.ok_or(BuilderError::NoInsertPoint)
    }

    /// Appends a new block to the function currently being built
    pub fn append_block(&self, module: &mut Module, name: &str) -> Result<BlockId, BuilderError> {
        let (function, _) = self.current()?;
        Ok(module.function_mut(function).append_block(name))
    }

    fn insert(
        &self,
        module: &mut Module,
        kind: InstKind,
        ty: Type,
        name: &str,
    ) -> Result<Value, BuilderError> {
        let (function, block) = self.current()?;
        let function = module.function_mut(function);
        if function.terminator(block).is_some() {
            return Err(BuilderError::BlockTerminated {
                block: function.block(block).name.clone(),
            });
        }
        let id = function.push_inst(block, Instruction::new(kind, ty, name));
        Ok(Value::Inst(id))
    }

    fn value_type(&self, module: &Module, value: &Value) -> Result<Type, BuilderError> {
        let (function, _) = self.current()?;
        Ok(module.function(function).value_type(value))
    }

    pub fn build_alloca(
        &self,
        module: &mut Module,
        ty: Type,
        name: &str,
    ) -> Result<Value, BuilderError> {
        self.insert(module, InstKind::Alloca { ty }, Type::Ptr, name)
    }

    pub fn build_load(
        &self,
        module: &mut Module,
        ty: Type,
        ptr: Value,
        name: &str,
    ) -> Result<Value, BuilderError> {
        self.insert(module, InstKind::Load { ty: ty.clone(), ptr }, ty, name)
    }

    pub fn build_store(
        &self,
        module: &mut Module,
        value: Value,
        ptr: Value,
    ) -> Result<Value, BuilderError> {
        self.insert(module, InstKind::Store { value, ptr }, Type::Void, "")
    }

    fn build_binary(
        &self,
        module: &mut Module,
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
        name: &str,
    ) -> Result<Value, BuilderError> {
        let ty = self.value_type(module, &lhs)?;
        self.insert(module, InstKind::Binary { op, lhs, rhs }, ty, name)
    }

    pub fn build_add(
        &self,
        module: &mut Module,
        lhs: Value,
        rhs: Value,
        name: &str,
    ) -> Result<Value, BuilderError> {
        self.build_binary(module, BinaryOp::Add, lhs, rhs, name)
    }

    pub fn build_sub(
        &self,
        module: &mut Module,
        lhs: Value,
        rhs: Value,
        name: &str,
    ) -> Result<Value, BuilderError> {
        self.build_binary(module, BinaryOp::Sub, lhs, rhs, name)
    }

    pub fn build_icmp(
        &self,
        module: &mut Module,
        pred: IntPredicate,
        lhs: Value,
        rhs: Value,
        name: &str,
    ) -> Result<Value, BuilderError> {
        self.insert(module, InstKind::ICmp { pred, lhs, rhs }, Type::i1(), name)
    }

    pub fn build_gep(
        &self,
        module: &mut Module,
        base_ty: Type,
        ptr: Value,
        indices: Vec<Value>,
        name: &str,
    ) -> Result<Value, BuilderError> {
        self.insert(
            module,
            InstKind::Gep {
                base_ty,
                ptr,
                indices,
            },
            Type::Ptr,
            name,
        )
    }

    pub fn build_call(
        &self,
        module: &mut Module,
        callee: FuncId,
        args: Vec<Value>,
        name: &str,
    ) -> Result<Value, BuilderError> {
        let ret = module.function(callee).ty.ret.clone();
        // void calls can't be named
        let name = if ret == Type::Void { "" } else { name };
        self.insert(module, InstKind::Call { callee, args }, ret, name)
    }

    /// Integer cast that picks trunc/sext/zext from the widths, a same width cast is a no-op
    pub fn build_int_cast(
        &self,
        module: &mut Module,
        value: Value,
        ty: Type,
        signed: bool,
        name: &str,
    ) -> Result<Value, BuilderError> {
        let from = self.value_type(module, &value)?;
        let (from_bits, to_bits) = match (from.int_width(), ty.int_width()) {
            (Some(from_bits), Some(to_bits)) => (from_bits, to_bits),
            _ => return Err(BuilderError::NotAnInteger { ty: from }),
        };

        let op = if from_bits == to_bits {
            return Ok(value);
        } else if from_bits > to_bits {
            CastOp::Trunc
        } else if signed {
            CastOp::SExt
        } else {
            CastOp::ZExt
        };

        self.insert(module, InstKind::Cast { op, value, ty: ty.clone() }, ty, name)
    }

    pub fn build_br(&self, module: &mut Module, target: BlockId) -> Result<Value, BuilderError> {
        self.insert(module, InstKind::Br { target }, Type::Void, "")
    }

    pub fn build_cond_br(
        &self,
        module: &mut Module,
        cond: Value,
        then_block: BlockId,
        else_block: BlockId,
    ) -> Result<Value, BuilderError> {
        self.insert(
            module,
            InstKind::CondBr {
                cond,
                then_block,
                else_block,
            },
            Type::Void,
            "",
        )
    }

    pub fn build_ret(
        &self,
        module: &mut Module,
        value: Option<Value>,
    ) -> Result<Value, BuilderError> {
        self.insert(module, InstKind::Ret { value }, Type::Void, "")
    }
}
