// Control transfer and the call/return protocol

use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::{ensure, fatal, ShadowError};
use crate::interpreter::operand::{Iid, Operand};
use crate::memory::layout;
use crate::memory::value::{Cell, Kind};
use tracing::{debug, info};

impl Interpreter {
    /// Call site. Pushed arguments move to the call-argument queue for the callee's
    /// frame; non-void calls record `dest` as the caller register awaiting the result.
    pub fn call(&mut self, iid: Iid, kind: Kind, dest: usize) -> Result<(), ShadowError> {
        self.count("call", iid);
        let args: Vec<Cell> = self.queues.pushed.drain(..).collect();
        self.queues.call_args.extend(args);
        if kind != Kind::Void {
            self.queues.caller_var_index.push(dest);
            self.state.set_register(dest, Cell::new(kind))?;
        }
        self.queues.recent_block.push(0);
        self.queues.is_return = false;
        Ok(())
    }

    /// Return of a scalar value: the value is copied into the caller's destination
    /// register and the callee frame is popped
    pub fn return_(&mut self, iid: Iid, value: Operand) -> Result<(), ShadowError> {
        self.count("return_", iid);
        let mut result = self.state.operand(&value)?;
        result.first_byte = 0;
        result.bit_offset = 0;
        result.loaded_from = None;
        self.leave_frame("return_")?;
        if self.state.stack.is_empty() {
            info!(iid, value = %result, "program returned");
            return Ok(());
        }
        let dest = *self.queues.caller_var_index.last().ok_or_else(|| {
            fatal!(ShadowError::QueueUnderflow {
                queue: "caller register",
                operation: "return_"
            })
        })?;
        self.state.set_register(dest, result)
    }

    /// Void return
    pub fn return2_(&mut self, iid: Iid) -> Result<(), ShadowError> {
        self.count("return2_", iid);
        self.leave_frame("return2_")
    }

    /// Return of a struct value. A register operand returns the fields of its struct
    /// value; a constant returns the fields queued on the return-struct queue.
    pub fn return_struct_(&mut self, iid: Iid, value: Operand) -> Result<(), ShadowError> {
        self.count("return_struct_", iid);
        let fields = if value.is_constant() {
            self.queues.return_struct.drain(..).collect()
        } else {
            let agg = self.state.cell(value.scope, value.slot())?;
            match agg.backing {
                Some(id) => self.state.memory.cells(id).to_vec(),
                None => Vec::new(),
            }
        };
        self.leave_frame("return_struct_")?;
        if self.state.stack.is_empty() {
            return Ok(());
        }
        let dest = *self.queues.caller_var_index.last().ok_or_else(|| {
            fatal!(ShadowError::QueueUnderflow {
                queue: "caller register",
                operation: "return_struct_"
            })
        })?;
        let result = self.struct_value(fields);
        self.state.set_register(dest, result)
    }

    /// After a non-void call. When the callee was not interpreted the destination
    /// register takes the concrete result; otherwise the interpreted result is
    /// resynchronized to it.
    pub fn after_call(&mut self, iid: Iid, kind: Kind, concrete: i64) -> Result<(), ShadowError> {
        self.count("after_call", iid);
        let dest = self.queues.pop_caller_var_index("after_call")?;
        if self.queues.is_return {
            self.check_drained("after_call")?;
            let cell = self.state.register_mut(dest)?;
            if !cell.matches_concrete(kind, concrete) {
                cell.sync_to(kind, concrete);
                info!(iid, value = %cell, "syncing call result");
            }
        } else {
            debug!(iid, "callee not interpreted");
            self.queues.clear_call();
            let mut cell = Cell::from_raw(kind, concrete);
            if kind == Kind::Ptr {
                cell.backing = None;
                cell.offset = 0;
            }
            self.state.set_register(dest, cell)?;
        }
        self.finish_call("after_call")
    }

    pub fn after_void_call(&mut self, iid: Iid) -> Result<(), ShadowError> {
        self.count("after_void_call", iid);
        if self.queues.is_return {
            self.check_drained("after_void_call")?;
        } else {
            self.queues.clear_call();
        }
        self.finish_call("after_void_call")
    }

    /// After a struct-valued call; the return-struct queue holds the concrete field
    /// values
    pub fn after_struct_call(&mut self, iid: Iid) -> Result<(), ShadowError> {
        self.count("after_struct_call", iid);
        let dest = self.queues.pop_caller_var_index("after_struct_call")?;
        let concrete: Vec<Cell> = self.queues.return_struct.drain(..).collect();
        if self.queues.is_return {
            self.check_drained("after_struct_call")?;
            let backing = self.state.register(dest)?.backing;
            if let Some(id) = backing {
                for (i, expected) in concrete.iter().enumerate() {
                    if let Some(field) = self.state.memory.get_mut(id, i) {
                        let kind = field.kind;
                        if !field.matches_concrete(kind, expected.scalar.0) {
                            field.sync_to(kind, expected.scalar.0);
                            info!(iid, field = i, "syncing struct call result");
                        }
                    }
                }
            }
        } else {
            self.queues.clear_call();
            let result = self.struct_value(concrete);
            self.state.set_register(dest, result)?;
        }
        self.finish_call("after_struct_call")
    }

    /// Resolve a phi node against the block control arrived from
    pub fn phinode(&mut self, iid: Iid, dest: usize) -> Result<(), ShadowError> {
        self.count("phinode", iid);
        let block = *self.queues.recent_block.last().ok_or_else(|| {
            fatal!(ShadowError::QueueUnderflow {
                queue: "recent block",
                operation: "phinode"
            })
        })?;
        let value = if let Some(cell) = self.queues.phi_constants.get(&block) {
            cell.clone()
        } else if let Some(&slot) = self.queues.phi_values.get(&block) {
            self.state.register(slot)?.clone()
        } else {
            return Err(fatal!(ShadowError::QueueUnderflow {
                queue: "phi incoming value",
                operation: "phinode"
            }));
        };
        self.queues.clear_phi();
        self.state.set_register(dest, value)
    }

    pub fn select(
        &mut self,
        iid: Iid,
        cond: Operand,
        if_true: Operand,
        if_false: Operand,
        dest: usize,
    ) -> Result<(), ShadowError> {
        self.count("select", iid);
        let chosen = if self.state.operand_int(&cond)? & 1 != 0 {
            if_true
        } else {
            if_false
        };
        let mut value = self.state.operand(&chosen)?;
        value.loaded_from = None;
        self.state.set_register(dest, value)
    }

    /// Conditional branch; the shadow condition must agree with the direction the
    /// program took
    pub fn branch(&mut self, iid: Iid, cond: Operand, taken: bool) -> Result<(), ShadowError> {
        self.count("branch", iid);
        if !cond.is_constant() {
            let shadow = self.state.operand_int(&cond)? & 1 != 0;
            ensure!(shadow == taken, ShadowError::BranchDivergence { iid });
        }
        Ok(())
    }

    /// Unconditional branch
    pub fn branch2(&mut self, iid: Iid) -> Result<(), ShadowError> {
        self.count("branch2", iid);
        Ok(())
    }

    pub fn indirectbr(&mut self, iid: Iid) -> Result<(), ShadowError> {
        self.count("indirectbr", iid);
        Ok(())
    }

    /// Switch on `cond`; the shadow value must equal the concrete scrutinee
    pub fn switch_(&mut self, iid: Iid, cond: Operand, concrete: i64) -> Result<(), ShadowError> {
        self.count("switch_", iid);
        if !cond.is_constant() {
            let shadow = self.state.operand(&cond)?;
            ensure!(
                shadow.matches_concrete(cond.kind, concrete),
                ShadowError::BranchDivergence { iid }
            );
        }
        Ok(())
    }

    pub fn unreachable(&mut self, iid: Iid) -> Result<(), ShadowError> {
        self.count("unreachable", iid);
        Ok(())
    }

    fn leave_frame(&mut self, operation: &'static str) -> Result<(), ShadowError> {
        self.state
            .stack
            .pop_frame()
            .ok_or_else(|| fatal!(ShadowError::NoStackFrame { operation }))?;
        self.queues.is_return = true;
        debug!(depth = self.state.stack.depth(), "left frame");
        Ok(())
    }

    fn check_drained(&self, operation: &'static str) -> Result<(), ShadowError> {
        let left = self.queues.call_args.len() + self.queues.pushed.len();
        ensure!(
            left == 0,
            ShadowError::QueueNotDrained {
                queue: "call argument",
                operation,
                left,
            }
        );
        Ok(())
    }

    fn finish_call(&mut self, operation: &'static str) -> Result<(), ShadowError> {
        self.queues.pop_recent_block(operation)?;
        self.queues.is_return = false;
        Ok(())
    }

    /// A struct register owning a fresh backing array laid out from `fields`
    pub(crate) fn struct_value(&mut self, fields: Vec<Cell>) -> Cell {
        let kinds: Vec<Kind> = fields.iter().map(|f| f.kind).collect();
        let (positions, _) = layout(&kinds);
        let cells: Vec<Cell> = fields
            .into_iter()
            .zip(positions)
            .map(|(mut cell, pos)| {
                cell.first_byte = pos.first_byte;
                cell.bit_offset = pos.bit_offset;
                cell.loaded_from = None;
                cell
            })
            .collect();
        let size = cells.first().map(|c| c.kind.size()).unwrap_or(0);
        let id = self.state.memory.alloc(cells);
        let mut value = Cell::pointer(0, Some(id), size);
        value.kind = Kind::Struct;
        value
    }
}
