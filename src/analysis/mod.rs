//! Analyses layered on the shadow interpreter
//!
//! An [`Analysis`] observes the callback stream after the interpreter has applied the
//! instruction's semantics. Analyses keep per-value data in cell shadows through
//! [`ShadowValue`](crate::memory::shadow::ShadowValue) and never change the
//! interpreter's own state otherwise.
//!
//! - [`blame`]: dual-precision evaluation and precision blame attribution
//! - [`nan`]: informational NaN observer

pub mod blame;
pub mod nan;

use crate::interpreter::errors::ShadowError;
use crate::interpreter::operand::{BinOp, Iid, Operand};
use crate::interpreter::state::ExecutionState;
use crate::memory::value::{Cell, Kind};
use std::any::Any;

/// A floating binary operation that has just been interpreted
#[derive(Debug, Clone, Copy)]
pub struct FloatOp {
    pub iid: Iid,
    pub op: BinOp,
    pub kind: Kind,
    pub left: Operand,
    pub right: Operand,
    /// Register of the current frame holding the result
    pub dest: usize,
}

/// Observer hooks invoked by the interpreter
pub trait Analysis: Any {
    fn name(&self) -> &'static str;

    fn pre_analysis(&mut self) {}

    fn post_load(&mut self, _iid: Iid, _value: &Cell) {}

    fn post_store(&mut self, _iid: Iid, _value: &Cell) {}

    fn post_fbinop(
        &mut self,
        _state: &mut ExecutionState,
        _event: &FloatOp,
    ) -> Result<(), ShadowError> {
        Ok(())
    }

    fn post_analysis(&mut self) -> Result<(), ShadowError> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any;
}
