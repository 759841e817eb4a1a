// Arithmetic, bitwise and comparison instructions

use crate::analysis::FloatOp;
use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::{ensure, fatal, ShadowError};
use crate::interpreter::operand::{BinOp, BitOp, FloatPredicate, Iid, IntPredicate, Operand};
use crate::memory::value::{Cell, Kind};

impl Interpreter {
    /// Arithmetic on two operands of the same kind. Integer arithmetic wraps at the
    /// operand width; floating results are rounded to the operand precision and then
    /// reported to the analyses.
    pub fn binop(
        &mut self,
        iid: Iid,
        op: BinOp,
        left: Operand,
        right: Operand,
        dest: usize,
    ) -> Result<(), ShadowError> {
        self.count(op.name(), iid);
        let kind = left.kind;
        ensure!(
            kind != Kind::Int80,
            ShadowError::UnsupportedKind {
                kind,
                operation: op.name()
            }
        );

        if op.is_float() {
            ensure!(
                kind.is_float(),
                ShadowError::KindMismatch {
                    operation: op.name(),
                    from: kind,
                    to: Kind::Flp64
                }
            );
            let l = self.state.operand_flp(&left)?;
            let r = self.state.operand_flp(&right)?;
            let result = float_op(op, l, r).ok_or_else(|| fatal!(ShadowError::Unimplemented("frem")))?;
            self.state.set_register(dest, Cell::flp(kind, result))?;
            return self.notify_fbinop(&FloatOp {
                iid,
                op,
                kind,
                left,
                right,
                dest,
            });
        }

        let l = self.state.operand_int(&left)?;
        let r = self.state.operand_int(&right)?;
        let result = match op {
            BinOp::Add => l.wrapping_add(r),
            BinOp::Sub => l.wrapping_sub(r),
            BinOp::Mul => l.wrapping_mul(r),
            BinOp::SDiv | BinOp::SRem | BinOp::UDiv | BinOp::URem => {
                let (lc, rc) = (Cell::int(kind, l), Cell::int(kind, r));
                ensure!(rc.as_int() != 0, ShadowError::DivisionByZero { iid });
                match op {
                    BinOp::SDiv => lc.as_int().wrapping_div(rc.as_int()),
                    BinOp::SRem => lc.as_int().wrapping_rem(rc.as_int()),
                    BinOp::UDiv => (lc.scalar.as_uint(kind) / rc.scalar.as_uint(kind)) as i64,
                    _ => (lc.scalar.as_uint(kind) % rc.scalar.as_uint(kind)) as i64,
                }
            }
            other => return Err(fatal!(ShadowError::Unimplemented(other.name()))),
        };
        self.state.set_register(dest, Cell::int(kind, result))
    }

    /// Shifts and bitwise logic. Shift amounts are taken modulo the operand width.
    pub fn bitwise(
        &mut self,
        iid: Iid,
        op: BitOp,
        left: Operand,
        right: Operand,
        dest: usize,
    ) -> Result<(), ShadowError> {
        self.count("bitwise", iid);
        let kind = left.kind;
        let width = match kind {
            Kind::Int1 | Kind::Int8 => 8,
            Kind::Int16 => 16,
            Kind::Int24 | Kind::Int32 => 32,
            Kind::Int64 | Kind::Ptr => 64,
            _ => {
                return Err(fatal!(ShadowError::UnsupportedKind {
                    kind,
                    operation: "bitwise"
                }))
            }
        };
        let l = self.state.operand_int(&left)?;
        let r = self.state.operand_int(&right)?;
        let shift = (r as u64 % width) as u32;
        let unsigned = Cell::int(kind, l).scalar.as_uint(kind);

        let result = match op {
            BitOp::Shl => l.wrapping_shl(shift),
            BitOp::LShr => (unsigned >> shift) as i64,
            BitOp::AShr => Cell::int(kind, l).as_int() >> shift,
            BitOp::And => l & r,
            BitOp::Or => l | r,
            BitOp::Xor => l ^ r,
        };
        self.state.set_register(dest, Cell::int(kind, result))
    }

    /// Integer (and pointer) comparison producing an `Int1`
    pub fn icmp(
        &mut self,
        iid: Iid,
        pred: IntPredicate,
        left: Operand,
        right: Operand,
        dest: usize,
    ) -> Result<(), ShadowError> {
        self.count("icmp", iid);
        let kind = left.kind;
        ensure!(
            kind == Kind::Ptr || kind.is_int(),
            ShadowError::UnsupportedKind {
                kind,
                operation: "icmp"
            }
        );
        let l = Cell::int(kind, self.state.operand_int(&left)?);
        let r = Cell::int(kind, self.state.operand_int(&right)?);
        let (sl, sr) = (l.as_int(), r.as_int());
        let (ul, ur) = (l.scalar.as_uint(kind), r.scalar.as_uint(kind));

        let result = match pred {
            IntPredicate::Eq => sl == sr,
            IntPredicate::Ne => sl != sr,
            IntPredicate::Ugt => ul > ur,
            IntPredicate::Uge => ul >= ur,
            IntPredicate::Ult => ul < ur,
            IntPredicate::Ule => ul <= ur,
            IntPredicate::Sgt => sl > sr,
            IntPredicate::Sge => sl >= sr,
            IntPredicate::Slt => sl < sr,
            IntPredicate::Sle => sl <= sr,
        };
        self.state.set_register(dest, Cell::int(Kind::Int1, result as i64))
    }

    /// Floating comparison producing an `Int1`
    pub fn fcmp(
        &mut self,
        iid: Iid,
        pred: FloatPredicate,
        left: Operand,
        right: Operand,
        dest: usize,
    ) -> Result<(), ShadowError> {
        self.count("fcmp", iid);
        ensure!(
            left.kind.is_float(),
            ShadowError::UnsupportedKind {
                kind: left.kind,
                operation: "fcmp"
            }
        );
        let l = self.state.operand_flp(&left)?;
        let r = self.state.operand_flp(&right)?;
        let result = compare_floats(pred, l, r);
        self.state.set_register(dest, Cell::int(Kind::Int1, result as i64))
    }
}

/// Evaluate a floating operator; `None` for the unmodeled remainder
pub fn float_op(op: BinOp, l: f64, r: f64) -> Option<f64> {
    match op {
        BinOp::FAdd => Some(l + r),
        BinOp::FSub => Some(l - r),
        BinOp::FMul => Some(l * r),
        BinOp::FDiv => Some(l / r),
        _ => None,
    }
}

pub fn compare_floats(pred: FloatPredicate, l: f64, r: f64) -> bool {
    let unordered = l.is_nan() || r.is_nan();
    match pred {
        FloatPredicate::False => false,
        FloatPredicate::True => true,
        FloatPredicate::Ord => !unordered,
        FloatPredicate::Uno => unordered,
        FloatPredicate::Oeq => !unordered && l == r,
        FloatPredicate::Ogt => !unordered && l > r,
        FloatPredicate::Oge => !unordered && l >= r,
        FloatPredicate::Olt => !unordered && l < r,
        FloatPredicate::Ole => !unordered && l <= r,
        FloatPredicate::One => !unordered && l != r,
        FloatPredicate::Ueq => unordered || l == r,
        FloatPredicate::Ugt => unordered || l > r,
        FloatPredicate::Uge => unordered || l >= r,
        FloatPredicate::Ult => unordered || l < r,
        FloatPredicate::Ule => unordered || l <= r,
        FloatPredicate::Une => unordered || l != r,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unordered_predicates_accept_nan() {
        assert!(compare_floats(FloatPredicate::Uno, f64::NAN, 1.0));
        assert!(compare_floats(FloatPredicate::Une, f64::NAN, f64::NAN));
        assert!(!compare_floats(FloatPredicate::Oeq, f64::NAN, f64::NAN));
        assert!(!compare_floats(FloatPredicate::One, f64::NAN, 1.0));
        assert!(compare_floats(FloatPredicate::Olt, 1.0, 2.0));
    }

    #[test]
    fn remainder_is_not_modeled() {
        assert_eq!(float_op(BinOp::FRem, 5.0, 2.0), None);
        assert_eq!(float_op(BinOp::FMul, 1.5, 2.0), Some(3.0));
    }
}
