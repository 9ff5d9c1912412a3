use serde::Serialize;

use crate::diagnostics::CompileError;

/// Value category of an IR node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum IrType {
    I32,
    I64,
    F32,
    F64,
    /// Address of an instance of the named class.
    Class(String),
    None,
}

/// Coarse classification used by the cast table. Every class lands in one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    I32,
    I64,
    F32,
    F64,
    Class,
    None,
}

/// What a cast between two types compiles to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastOp {
    Identity,
    /// Widen integer-32 to integer-64.
    Extend { signed: bool },
    /// Truncate integer-64 to integer-32.
    Wrap,
    /// Same machine representation, only the descriptor changes.
    Reinterpret,
}

impl IrType {
    /// The machine's native pointer-sized integer.
    pub const DEFAULT: IrType = IrType::I32;

    pub fn class(name: impl Into<String>) -> Self {
        IrType::Class(name.into())
    }

    pub fn is_native(&self) -> bool {
        matches!(self, IrType::I32 | IrType::I64 | IrType::F32 | IrType::F64)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, IrType::I32 | IrType::I64)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, IrType::F32 | IrType::F64)
    }

    pub fn is_class(&self) -> bool {
        matches!(self, IrType::Class(_))
    }

    pub fn is_default(&self) -> bool {
        *self == IrType::DEFAULT
    }

    pub fn is_none(&self) -> bool {
        matches!(self, IrType::None)
    }

    pub fn class_name(&self) -> Option<&str> {
        match self {
            IrType::Class(name) => Some(name),
            _ => None,
        }
    }

    /// Bytes occupied by a stored value. Class values are stored as addresses.
    pub fn size(&self) -> u32 {
        match self {
            IrType::I32 | IrType::F32 => 4,
            IrType::I64 | IrType::F64 => 8,
            IrType::Class(_) => IrType::DEFAULT.size(),
            IrType::None => 0,
        }
    }

    /// Name of the machine value type carrying this descriptor.
    pub fn machine(&self) -> &'static str {
        match self {
            IrType::I32 | IrType::Class(_) => "i32",
            IrType::I64 => "i64",
            IrType::F32 => "f32",
            IrType::F64 => "f64",
            IrType::None => "none",
        }
    }

    pub fn bucket(&self) -> Bucket {
        match self {
            IrType::I32 => Bucket::I32,
            IrType::I64 => Bucket::I64,
            IrType::F32 => Bucket::F32,
            IrType::F64 => Bucket::F64,
            IrType::Class(_) => Bucket::Class,
            IrType::None => Bucket::None,
        }
    }
}

impl std::fmt::Display for IrType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IrType::Class(name) => write!(f, "{name}"),
            other => write!(f, "{}", other.machine()),
        }
    }
}

/// Compute the single type all operands must be cast to.
///
/// A class always wins (the first class seen, so the receiver's class governs
/// when both sides are classes); among native types the wider width wins.
/// Integer/float mixes are rejected here, cross-width float pairs unify to
/// float-64 and are rejected later by the cast table.
pub fn unify(types: &[IrType]) -> Result<IrType, CompileError> {
    let mut iter = types.iter();
    let Some(first) = iter.next() else {
        return Ok(IrType::None);
    };
    iter.try_fold(first.clone(), |acc, ty| unify_pair(&acc, ty))
}

fn unify_pair(a: &IrType, b: &IrType) -> Result<IrType, CompileError> {
    match (a, b) {
        _ if a == b => Ok(a.clone()),
        (IrType::Class(_), _) => Ok(a.clone()),
        (_, IrType::Class(_)) => Ok(b.clone()),
        (IrType::I32, IrType::I64) | (IrType::I64, IrType::I32) => Ok(IrType::I64),
        (IrType::F32, IrType::F64) | (IrType::F64, IrType::F32) => Ok(IrType::F64),
        _ => Err(CompileError::cast(b, a)),
    }
}

/// Decide how a value of type `from` becomes a value of type `to`.
pub fn classify_cast(from: &IrType, to: &IrType, signed: bool) -> Result<CastOp, CompileError> {
    if from == to {
        return Ok(CastOp::Identity);
    }
    match (from.bucket(), to.bucket()) {
        (Bucket::I32, Bucket::I64) => Ok(CastOp::Extend { signed }),
        (Bucket::I64, Bucket::I32) => Ok(CastOp::Wrap),
        (Bucket::Class, Bucket::Class) => Ok(CastOp::Reinterpret),
        (Bucket::Class, _) if to.is_default() => Ok(CastOp::Reinterpret),
        (_, Bucket::Class) if from.is_default() => Ok(CastOp::Reinterpret),
        _ => Err(CompileError::cast(from, to)),
    }
}
