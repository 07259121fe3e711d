use super::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(pub(crate) usize);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    /// An integer constant, `value` is always masked down to `bits`
    Int { bits: u32, value: u64 },
    /// `zeroinitializer` of any type
    Zero(Type),
}

impl Constant {
    pub fn int(bits: u32, value: i64) -> Constant {
        Constant::Int {
            bits,
            value: mask(bits, value as u64),
        }
    }

    pub fn ty(&self) -> Type {
        match self {
            Constant::Int { bits, .. } => Type::Int(*bits),
            Constant::Zero(ty) => ty.clone(),
        }
    }

    /// The constant sign extended out to 64 bits
    pub fn as_signed(&self) -> Option<i64> {
        match self {
            Constant::Int { bits, value } => Some(sign_extend(*bits, *value)),
            Constant::Zero(Type::Int(_)) => Some(0),
            Constant::Zero(_) => None,
        }
    }

    pub fn as_unsigned(&self) -> Option<u64> {
        match self {
            Constant::Int { value, .. } => Some(*value),
            Constant::Zero(Type::Int(_)) => Some(0),
            Constant::Zero(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Const(Constant),
    Inst(InstId),
}

impl Value {
    pub fn int(bits: u32, value: i64) -> Value {
        Value::Const(Constant::int(bits, value))
    }

    pub fn zero(ty: Type) -> Value {
        Value::Const(Constant::Zero(ty))
    }

    pub fn as_inst(&self) -> Option<InstId> {
        match self {
            Value::Inst(id) => Some(*id),
            Value::Const(_) => None,
        }
    }

    pub fn as_const(&self) -> Option<&Constant> {
        match self {
            Value::Const(c) => Some(c),
            Value::Inst(_) => None,
        }
    }
}

impl From<InstId> for Value {
    fn from(id: InstId) -> Value {
        Value::Inst(id)
    }
}

/// Keeps only the low `bits` bits of `value`
pub fn mask(bits: u32, value: u64) -> u64 {
    if bits >= 64 {
        value
    } else {
        value & ((1u64 << bits) - 1)
    }
}

pub fn sign_extend(bits: u32, value: u64) -> i64 {
    if bits == 0 || bits >= 64 {
        return value as i64;
    }
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}
