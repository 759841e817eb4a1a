//! Auxiliary queues filled by `push_*` callbacks ahead of the instruction that
//! consumes them

use crate::interpreter::errors::{fatal, ShadowError};
use crate::memory::value::{Cell, Kind};
use rustc_hash::FxHashMap;
use std::collections::VecDeque;

/// Pending values of the call, struct, indexing and phi protocols
#[derive(Debug, Default)]
pub struct Queues {
    /// Arguments pushed before a call, in program order
    pub pushed: VecDeque<Cell>,
    /// Arguments marshaled by `call`, consumed by the callee's frame
    pub call_args: VecDeque<Cell>,
    /// Caller registers awaiting a return value
    pub caller_var_index: Vec<usize>,
    /// Most recently entered block, one entry per active call
    pub recent_block: Vec<i64>,
    /// Struct field values for struct loads, returns and `extractvalue`
    pub return_struct: VecDeque<Cell>,
    /// Flattened primitive kinds of the struct being allocated or indexed
    pub struct_type: VecDeque<Kind>,
    /// Number of flattened primitives per struct field
    pub struct_element_size: VecDeque<usize>,
    pub gep_index: VecDeque<i64>,
    /// Array dimensions, outermost first
    pub array_size: VecDeque<usize>,
    pub phi_constants: FxHashMap<i64, Cell>,
    pub phi_values: FxHashMap<i64, usize>,
    /// Set when the callee of the pending call returned through an interpreted return
    pub is_return: bool,
}

impl Queues {
    pub fn take_struct_type(&mut self, operation: &'static str) -> Result<Vec<Kind>, ShadowError> {
        if self.struct_type.is_empty() {
            return Err(fatal!(ShadowError::QueueUnderflow {
                queue: "struct type",
                operation
            }));
        }
        Ok(self.struct_type.drain(..).collect())
    }

    pub fn pop_gep_index(&mut self, operation: &'static str) -> Result<i64, ShadowError> {
        self.gep_index.pop_front().ok_or_else(|| {
            fatal!(ShadowError::QueueUnderflow {
                queue: "getelementptr index",
                operation
            })
        })
    }

    pub fn pop_caller_var_index(&mut self, operation: &'static str) -> Result<usize, ShadowError> {
        self.caller_var_index.pop().ok_or_else(|| {
            fatal!(ShadowError::QueueUnderflow {
                queue: "caller register",
                operation
            })
        })
    }

    pub fn pop_recent_block(&mut self, operation: &'static str) -> Result<i64, ShadowError> {
        self.recent_block.pop().ok_or_else(|| {
            fatal!(ShadowError::QueueUnderflow {
                queue: "recent block",
                operation
            })
        })
    }

    /// Discard the argument queues of a call that was not interpreted
    pub fn clear_call(&mut self) {
        self.pushed.clear();
        self.call_args.clear();
    }

    pub fn clear_phi(&mut self) {
        self.phi_constants.clear();
        self.phi_values.clear();
    }
}
