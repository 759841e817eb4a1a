//! Operand descriptors and instruction vocabularies
//!
//! Instrumentation describes every operand with a [`Scope`] and either a literal or a
//! slot index. Literals arrive as raw 64-bit payloads: integers sign-extended, pointers
//! as addresses, floats as the bits of the value widened to `f64`.

use crate::memory::value::Kind;
use std::fmt;

/// Static instruction identifier
pub type Iid = u64;

/// Where an operand lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Constant,
    Global,
    Local,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Constant => write!(f, "constant"),
            Scope::Global => write!(f, "global"),
            Scope::Local => write!(f, "local"),
        }
    }
}

/// One operand of a callback
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Operand {
    /// Instruction that produced the operand (the use site for constants)
    pub iid: Iid,
    pub kind: Kind,
    pub scope: Scope,
    /// Literal payload for constants, slot index otherwise
    pub value: i64,
}

impl Operand {
    pub fn constant(kind: Kind, raw: i64) -> Self {
        Operand {
            iid: 0,
            kind,
            scope: Scope::Constant,
            value: raw,
        }
    }

    pub fn int(kind: Kind, v: i64) -> Self {
        Operand::constant(kind, v)
    }

    /// Float literal; `Flp32` literals are rounded to single precision
    pub fn flp(kind: Kind, v: f64) -> Self {
        let v = if kind == Kind::Flp32 { v as f32 as f64 } else { v };
        Operand::constant(kind, v.to_bits() as i64)
    }

    pub fn local(kind: Kind, slot: usize) -> Self {
        Operand {
            iid: 0,
            kind,
            scope: Scope::Local,
            value: slot as i64,
        }
    }

    pub fn global(kind: Kind, slot: usize) -> Self {
        Operand {
            iid: 0,
            kind,
            scope: Scope::Global,
            value: slot as i64,
        }
    }

    /// Attach the producing instruction id
    pub fn at(mut self, iid: Iid) -> Self {
        self.iid = iid;
        self
    }

    pub fn is_constant(&self) -> bool {
        self.scope == Scope::Constant
    }

    pub fn slot(&self) -> usize {
        self.value as usize
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope {
            Scope::Constant if self.kind.is_float() => {
                write!(f, "{}:{}", self.kind, f64::from_bits(self.value as u64))
            }
            Scope::Constant => write!(f, "{}:{}", self.kind, self.value),
            Scope::Global => write!(f, "G{}", self.value),
            Scope::Local => write!(f, "L{}", self.value),
        }?;
        if self.iid != 0 {
            write!(f, "@{}", self.iid)?;
        }
        Ok(())
    }
}

/// Arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    SDiv,
    SRem,
    UDiv,
    URem,
    FAdd,
    FSub,
    FMul,
    FDiv,
    FRem,
}

impl BinOp {
    pub fn is_float(self) -> bool {
        matches!(
            self,
            BinOp::FAdd | BinOp::FSub | BinOp::FMul | BinOp::FDiv | BinOp::FRem
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::SDiv => "sdiv",
            BinOp::SRem => "srem",
            BinOp::UDiv => "udiv",
            BinOp::URem => "urem",
            BinOp::FAdd => "fadd",
            BinOp::FSub => "fsub",
            BinOp::FMul => "fmul",
            BinOp::FDiv => "fdiv",
            BinOp::FRem => "frem",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        let op = match s {
            "add" => BinOp::Add,
            "sub" => BinOp::Sub,
            "mul" => BinOp::Mul,
            "sdiv" => BinOp::SDiv,
            "srem" => BinOp::SRem,
            "udiv" => BinOp::UDiv,
            "urem" => BinOp::URem,
            "fadd" => BinOp::FAdd,
            "fsub" => BinOp::FSub,
            "fmul" => BinOp::FMul,
            "fdiv" => BinOp::FDiv,
            "frem" => BinOp::FRem,
            _ => return None,
        };
        Some(op)
    }
}

/// Bitwise operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitOp {
    Shl,
    LShr,
    AShr,
    And,
    Or,
    Xor,
}

impl BitOp {
    pub fn from_name(s: &str) -> Option<Self> {
        let op = match s {
            "shl" => BitOp::Shl,
            "lshr" => BitOp::LShr,
            "ashr" => BitOp::AShr,
            "and" => BitOp::And,
            "or" => BitOp::Or,
            "xor" => BitOp::Xor,
            _ => return None,
        };
        Some(op)
    }
}

/// Conversion operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastOp {
    Trunc,
    ZExt,
    SExt,
    FpTrunc,
    FpExt,
    FpToUi,
    FpToSi,
    UiToFp,
    SiToFp,
    PtrToInt,
    IntToPtr,
    BitCast,
}

impl CastOp {
    pub fn from_name(s: &str) -> Option<Self> {
        let op = match s {
            "trunc" => CastOp::Trunc,
            "zext" => CastOp::ZExt,
            "sext" => CastOp::SExt,
            "fptrunc" => CastOp::FpTrunc,
            "fpext" => CastOp::FpExt,
            "fptoui" => CastOp::FpToUi,
            "fptosi" => CastOp::FpToSi,
            "uitofp" => CastOp::UiToFp,
            "sitofp" => CastOp::SiToFp,
            "ptrtoint" => CastOp::PtrToInt,
            "inttoptr" => CastOp::IntToPtr,
            "bitcast" => CastOp::BitCast,
            _ => return None,
        };
        Some(op)
    }
}

/// Integer comparison predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntPredicate {
    Eq,
    Ne,
    Ugt,
    Uge,
    Ult,
    Ule,
    Sgt,
    Sge,
    Slt,
    Sle,
}

impl IntPredicate {
    pub fn from_name(s: &str) -> Option<Self> {
        let pred = match s {
            "eq" => IntPredicate::Eq,
            "ne" => IntPredicate::Ne,
            "ugt" => IntPredicate::Ugt,
            "uge" => IntPredicate::Uge,
            "ult" => IntPredicate::Ult,
            "ule" => IntPredicate::Ule,
            "sgt" => IntPredicate::Sgt,
            "sge" => IntPredicate::Sge,
            "slt" => IntPredicate::Slt,
            "sle" => IntPredicate::Sle,
            _ => return None,
        };
        Some(pred)
    }
}

/// Floating comparison predicates; `O*` are ordered, `U*` unordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatPredicate {
    False,
    Oeq,
    Ogt,
    Oge,
    Olt,
    Ole,
    One,
    Ord,
    Uno,
    Ueq,
    Ugt,
    Uge,
    Ult,
    Ule,
    Une,
    True,
}

impl FloatPredicate {
    pub fn from_name(s: &str) -> Option<Self> {
        let pred = match s {
            "false" => FloatPredicate::False,
            "oeq" => FloatPredicate::Oeq,
            "ogt" => FloatPredicate::Ogt,
            "oge" => FloatPredicate::Oge,
            "olt" => FloatPredicate::Olt,
            "ole" => FloatPredicate::Ole,
            "one" => FloatPredicate::One,
            "ord" => FloatPredicate::Ord,
            "uno" => FloatPredicate::Uno,
            "ueq" => FloatPredicate::Ueq,
            "ugt" => FloatPredicate::Ugt,
            "uge" => FloatPredicate::Uge,
            "ult" => FloatPredicate::Ult,
            "ule" => FloatPredicate::Ule,
            "une" => FloatPredicate::Une,
            "true" => FloatPredicate::True,
            _ => return None,
        };
        Some(pred)
    }
}
