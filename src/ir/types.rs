use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    /// An integer of the given bit width (`i1`, `i8`, `i32`, `i64`, ...)
    Int(u32),
    /// Opaque pointer
    Ptr,
    /// `[len x element]`
    Array(Box<Type>, u64),
}

impl Type {
    pub fn i1() -> Type {
        Type::Int(1)
    }

    pub fn i8() -> Type {
        Type::Int(8)
    }

    pub fn i32() -> Type {
        Type::Int(32)
    }

    pub fn i64() -> Type {
        Type::Int(64)
    }

    pub fn array(element: Type, len: u64) -> Type {
        Type::Array(Box::new(element), len)
    }

    pub fn int_width(&self) -> Option<u32> {
        match self {
            Type::Int(bits) => Some(*bits),
            _ => None,
        }
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Type::Int(_))
    }

    /// How many bytes a value of this type takes up in memory
    pub fn store_size(&self) -> Option<u64> {
        match self {
            Type::Void => None,
            Type::Int(bits) => Some(((*bits as u64) + 7) / 8),
            Type::Ptr => Some(8),
            Type::Array(element, len) => element.store_size().map(|size| size * len),
        }
    }

    /// The type reached by indexing one level into this type
    pub fn element(&self) -> Option<&Type> {
        match self {
            Type::Array(element, _) => Some(element),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => f.write_str("void"),
            Type::Int(bits) => write!(f, "i{}", bits),
            Type::Ptr => f.write_str("ptr"),
            Type::Array(element, len) => write!(f, "[{} x {}]", len, element),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionType {
    pub ret: Type,
    pub params: Vec<Type>,
}

impl FunctionType {
    pub fn new(ret: Type, params: Vec<Type>) -> FunctionType {
        FunctionType { ret, params }
    }
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (", self.ret)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", param)?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_like_llvm() {
        assert_eq!(Type::array(Type::i8(), 16384).to_string(), "[16384 x i8]");
        assert_eq!(
            FunctionType::new(Type::i32(), vec![Type::i8()]).to_string(),
            "i32 (i8)"
        );
        assert_eq!(FunctionType::new(Type::Void, vec![]).to_string(), "void ()");
    }

    #[test]
    fn store_sizes() {
        assert_eq!(Type::i1().store_size(), Some(1));
        assert_eq!(Type::i64().store_size(), Some(8));
        assert_eq!(Type::array(Type::i8(), 0x4000).store_size(), Some(0x4000));
        assert_eq!(Type::Void.store_size(), None);
    }
}
