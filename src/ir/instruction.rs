use super::{BlockId, FuncId, Type, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
}

impl BinaryOp {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntPredicate {
    Eq,
    Ne,
}

impl IntPredicate {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            IntPredicate::Eq => "eq",
            IntPredicate::Ne => "ne",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastOp {
    Trunc,
    SExt,
    ZExt,
}

impl CastOp {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            CastOp::Trunc => "trunc",
            CastOp::SExt => "sext",
            CastOp::ZExt => "zext",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InstKind {
    /// Stack slot for one value of `ty`
    Alloca { ty: Type },
    Load { ty: Type, ptr: Value },
    Store { value: Value, ptr: Value },
    Binary { op: BinaryOp, lhs: Value, rhs: Value },
    ICmp { pred: IntPredicate, lhs: Value, rhs: Value },
    /// Address of an element inside `base_ty` stored at `ptr`
    Gep { base_ty: Type, ptr: Value, indices: Vec<Value> },
    Call { callee: FuncId, args: Vec<Value> },
    Cast { op: CastOp, value: Value, ty: Type },

    // terminators
    Br { target: BlockId },
    CondBr { cond: Value, then_block: BlockId, else_block: BlockId },
    Ret { value: Option<Value> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub kind: InstKind,
    /// Type of the produced value, `void` when nothing is produced
    pub ty: Type,
    /// Name hint for the printer, empty means unnamed
    pub name: String,
}

impl Instruction {
    pub fn new(kind: InstKind, ty: Type, name: &str) -> Instruction {
        Instruction {
            kind,
            ty,
            name: name.to_string(),
        }
    }

    pub fn is_terminator(&self) -> bool {
        matches!(
            self.kind,
            InstKind::Br { .. } | InstKind::CondBr { .. } | InstKind::Ret { .. }
        )
    }

    /// Stores, calls and terminators have to stay even if nothing uses their value
    pub fn has_side_effects(&self) -> bool {
        matches!(self.kind, InstKind::Store { .. } | InstKind::Call { .. }) || self.is_terminator()
    }

    pub fn produces_value(&self) -> bool {
        self.ty != Type::Void
    }

    pub fn operands(&self) -> Vec<&Value> {
        match &self.kind {
            InstKind::Alloca { .. } => vec![],
            InstKind::Load { ptr, .. } => vec![ptr],
            InstKind::Store { value, ptr } => vec![value, ptr],
            InstKind::Binary { lhs, rhs, .. } | InstKind::ICmp { lhs, rhs, .. } => vec![lhs, rhs],
            InstKind::Gep { ptr, indices, .. } => {
                let mut v = vec![ptr];
                v.extend(indices.iter());
                v
            }
            InstKind::Call { args, .. } => args.iter().collect(),
            InstKind::Cast { value, .. } => vec![value],
            InstKind::Br { .. } => vec![],
            InstKind::CondBr { cond, .. } => vec![cond],
            InstKind::Ret { value } => value.iter().collect(),
        }
    }

    pub fn operands_mut(&mut self) -> Vec<&mut Value> {
        match &mut self.kind {
            InstKind::Alloca { .. } => vec![],
            InstKind::Load { ptr, .. } => vec![ptr],
            InstKind::Store { value, ptr } => vec![value, ptr],
            InstKind::Binary { lhs, rhs, .. } | InstKind::ICmp { lhs, rhs, .. } => vec![lhs, rhs],
            InstKind::Gep { ptr, indices, .. } => {
                let mut v = vec![ptr];
                v.extend(indices.iter_mut());
                v
            }
            InstKind::Call { args, .. } => args.iter_mut().collect(),
            InstKind::Cast { value, .. } => vec![value],
            InstKind::Br { .. } => vec![],
            InstKind::CondBr { cond, .. } => vec![cond],
            InstKind::Ret { value } => value.iter_mut().collect(),
        }
    }

    pub fn successors(&self) -> Vec<BlockId> {
        match &self.kind {
            InstKind::Br { target } => vec![*target],
            InstKind::CondBr {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
            _ => vec![],
        }
    }

    pub fn successors_mut(&mut self) -> Vec<&mut BlockId> {
        match &mut self.kind {
            InstKind::Br { target } => vec![target],
            InstKind::CondBr {
                then_block,
                else_block,
                ..
            } => vec![then_block, else_block],
            _ => vec![],
        }
    }
}
