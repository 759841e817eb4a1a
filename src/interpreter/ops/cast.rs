// Conversion instructions

use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::{ensure, fatal, ShadowError};
use crate::interpreter::operand::{CastOp, Iid, Operand};
use crate::memory::arena::{decode, encode};
use crate::memory::value::{Cell, Kind};

impl Interpreter {
    /// Convert `src` to `to` and write the result to register `dest`
    pub fn castop(
        &mut self,
        iid: Iid,
        op: CastOp,
        src: Operand,
        to: Kind,
        dest: usize,
    ) -> Result<(), ShadowError> {
        self.count("castop", iid);
        let from = src.kind;
        ensure!(
            from != Kind::Int80 && to != Kind::Int80,
            ShadowError::UnsupportedKind {
                kind: Kind::Int80,
                operation: "castop"
            }
        );
        let value = self.state.operand(&src)?;
        let result = convert(op, &value, to)?;
        self.state.set_register(dest, result)
    }
}

fn mismatch(operation: &'static str, from: Kind, to: Kind) -> ShadowError {
    fatal!(ShadowError::KindMismatch {
        operation,
        from,
        to
    })
}

/// The value of `src` converted to `to` under `op`
pub fn convert(op: CastOp, src: &Cell, to: Kind) -> Result<Cell, ShadowError> {
    let from = src.kind;
    let cell = match op {
        CastOp::Trunc => {
            if !(from.is_int() && to.is_int() && from.size() >= to.size()) {
                return Err(mismatch("trunc", from, to));
            }
            Cell::int(to, src.as_int())
        }
        CastOp::ZExt => {
            if !(from.is_int() && to.is_int()) {
                return Err(mismatch("zext", from, to));
            }
            Cell::int(to, src.scalar.as_uint(from) as i64)
        }
        CastOp::SExt => {
            if !(from.is_int() && to.is_int()) {
                return Err(mismatch("sext", from, to));
            }
            Cell::int(to, src.as_int())
        }
        CastOp::FpTrunc | CastOp::FpExt => {
            if !(from.is_float() && to.is_float()) {
                return Err(mismatch("fpcast", from, to));
            }
            let mut cell = Cell::flp(to, src.as_flp());
            cell.shadow = src.shadow.as_ref().map(|s| (**s).clone_box());
            cell
        }
        CastOp::FpToUi => {
            if !from.is_float() {
                return Err(mismatch("fptoui", from, to));
            }
            Cell::int(to, src.as_flp() as u64 as i64)
        }
        CastOp::FpToSi => {
            if !from.is_float() {
                return Err(mismatch("fptosi", from, to));
            }
            Cell::int(to, src.as_flp() as i64)
        }
        CastOp::UiToFp => {
            if !to.is_float() {
                return Err(mismatch("uitofp", from, to));
            }
            Cell::flp(to, src.scalar.as_uint(from) as f64)
        }
        CastOp::SiToFp => {
            if !to.is_float() {
                return Err(mismatch("sitofp", from, to));
            }
            Cell::flp(to, src.as_int() as f64)
        }
        CastOp::PtrToInt => Cell::int(to, src.address()),
        CastOp::IntToPtr => Cell::pointer(src.as_int(), None, 0),
        CastOp::BitCast => bitcast(src, to),
    };
    Ok(cell)
}

/// Reinterpret the bytes of `src` as `to`. Pointer-to-pointer casts keep the
/// addressing; casts between kinds of different class go through the byte image.
fn bitcast(src: &Cell, to: Kind) -> Cell {
    let from = src.kind;
    if from == to || (from == Kind::Ptr && to == Kind::Ptr) {
        return src.clone();
    }
    let reinterpret = from.is_float() != to.is_float() || from == Kind::Ptr || to == Kind::Ptr;
    if reinterpret && to.is_scalar() && to != Kind::Ptr {
        let mut bytes = encode(src);
        bytes.resize(to.size().max(bytes.len()), 0);
        return Cell::with_scalar(to, decode(to, &bytes));
    }
    if to == Kind::Ptr {
        return Cell::pointer(src.as_int(), None, 0);
    }
    let mut cell = src.clone();
    cell.kind = to;
    cell
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_widening_respects_signedness() {
        let byte = Cell::int(Kind::Int8, -1);
        assert_eq!(convert(CastOp::ZExt, &byte, Kind::Int32).unwrap().as_int(), 255);
        assert_eq!(convert(CastOp::SExt, &byte, Kind::Int32).unwrap().as_int(), -1);
    }

    #[test]
    fn truncation_to_a_wider_kind_is_rejected() {
        let word = Cell::int(Kind::Int16, 7);
        assert!(matches!(
            convert(CastOp::Trunc, &word, Kind::Int32),
            Err(ShadowError::KindMismatch { .. })
        ));
        assert_eq!(convert(CastOp::Trunc, &Cell::int(Kind::Int32, 0x1ff), Kind::Int8).unwrap().as_int(), -1);
    }

    #[test]
    fn bitcast_reinterprets_float_bits() {
        let one = Cell::flp(Kind::Flp32, 1.0);
        let bits = convert(CastOp::BitCast, &one, Kind::Int32).unwrap();
        assert_eq!(bits.as_int(), 0x3f80_0000);
        let back = convert(CastOp::BitCast, &bits, Kind::Flp32).unwrap();
        assert_eq!(back.as_flp(), 1.0);
    }

    #[test]
    fn fptrunc_rounds_to_single() {
        let d = Cell::flp(Kind::Flp64, 0.1);
        let f = convert(CastOp::FpTrunc, &d, Kind::Flp32).unwrap();
        assert_eq!(f.as_flp(), 0.1f32 as f64);
    }
}
