//! Fatal error types for the shadow interpreter
//!
//! This module defines [`ShadowError`], which represents every condition under which
//! the shadow model can no longer be trusted to mirror the real program.
//!
//! All of them are fatal: callbacks propagate them with `?` and the driver terminates
//! the run. Use [`fatal!`] to construct one so the failing condition is logged with its
//! module, file and line before it is returned.

use crate::interpreter::operand::{Iid, Scope};
use crate::memory::value::Kind;
use thiserror::Error;

/// Errors that terminate a shadow execution
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShadowError {
    /// A type width the model does not represent (80-bit integers, non-scalar operands)
    #[error("unsupported kind {kind} in {operation}")]
    UnsupportedKind { kind: Kind, operation: &'static str },

    /// Instruction kinds that are deliberately not modeled
    #[error("unimplemented instruction: {0}")]
    Unimplemented(&'static str),

    /// No stack frame available
    #[error("no active stack frame in {operation}")]
    NoStackFrame { operation: &'static str },

    /// Register or global slot outside its table
    #[error("invalid {scope} slot {slot}")]
    InvalidSlot { scope: Scope, slot: usize },

    /// A callback expected values pushed by preceding callbacks
    #[error("{queue} queue underflow in {operation}")]
    QueueUnderflow {
        queue: &'static str,
        operation: &'static str,
    },

    /// Pending values left over where the protocol requires the queue to be drained
    #[error("{queue} queue not drained in {operation} ({left} left)")]
    QueueNotDrained {
        queue: &'static str,
        operation: &'static str,
        left: usize,
    },

    /// The re-read value of a store does not reproduce what the program stored
    #[error("store mismatch at instruction {iid}: shadow memory holds {written}, program stored {concrete:#x} as {kind}")]
    StoreMismatch {
        iid: Iid,
        kind: Kind,
        written: String,
        concrete: i64,
    },

    /// Shadow and concrete executions took different branch directions
    #[error("shadow and concrete executions diverge at branch {iid}")]
    BranchDivergence { iid: Iid },

    /// Operand kinds incompatible with the operation
    #[error("kind mismatch in {operation}: {from} to {to}")]
    KindMismatch {
        operation: &'static str,
        from: Kind,
        to: Kind,
    },

    /// Integer division or remainder by zero
    #[error("integer division by zero at instruction {iid}")]
    DivisionByZero { iid: Iid },

    /// A pointer that cannot be resolved to an element of its backing array
    #[error("unresolvable pointer offset {offset} in {operation}")]
    Unresolvable { offset: i64, operation: &'static str },

    /// No operand precision pair reproduces a floating result
    #[error("no blame pair reproduces instruction {iid} at {bits} mantissa bits")]
    BlameNotFound { iid: Iid, bits: u32 },

    /// Merge of two blame nodes with different precision or arity
    #[error("cannot merge blame information for instruction {iid}")]
    BlameMergeMismatch { iid: Iid },

    /// An allocation, frame or growth step larger than the model accepts
    #[error("{operation} would create {cells} cells")]
    AllocationTooLarge { operation: &'static str, cells: u64 },

    /// The requested report root has no summary
    #[error("no blame summary for instruction {iid}")]
    UnknownRoot { iid: Iid },
}

/// Log `$err` with its source context and evaluate to it.
///
/// ```ignore
/// return Err(fatal!(ShadowError::NoStackFrame { operation: "load" }));
/// ```
macro_rules! fatal {
    ($err:expr) => {{
        let err: $crate::interpreter::errors::ShadowError = $err;
        tracing::error!(
            module = module_path!(),
            file = file!(),
            line = line!(),
            "{}",
            err
        );
        err
    }};
}

/// Return `$err` through [`fatal!`] unless `$cond` holds, logging the condition text.
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !($cond) {
            tracing::error!(condition = stringify!($cond), "assertion failed");
            return Err($crate::interpreter::errors::fatal!($err));
        }
    };
}

pub(crate) use ensure;
pub(crate) use fatal;

#[cfg(test)]
mod tests {
    use super::*;

    fn guarded(n: usize) -> Result<usize, ShadowError> {
        ensure!(
            n > 0,
            ShadowError::QueueUnderflow {
                queue: "argument",
                operation: "test"
            }
        );
        Ok(n)
    }

    #[test]
    fn ensure_returns_the_error() {
        assert_eq!(guarded(2), Ok(2));
        assert!(matches!(
            guarded(0),
            Err(ShadowError::QueueUnderflow { queue: "argument", .. })
        ));
    }

    #[test]
    fn messages_name_the_condition() {
        let err = ShadowError::StoreMismatch {
            iid: 7,
            kind: Kind::Int32,
            written: "i32 3".to_string(),
            concrete: 4,
        };
        assert_eq!(
            err.to_string(),
            "store mismatch at instruction 7: shadow memory holds i32 3, program stored 0x4 as i32"
        );
    }
}
