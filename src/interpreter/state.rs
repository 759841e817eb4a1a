//! Execution state shared by the interpreter and the analyses

use crate::interpreter::errors::{ensure, fatal, ShadowError};
use crate::interpreter::operand::{Operand, Scope};
use crate::memory::arena::{ArrayId, Memory};
use crate::memory::stack::{CallStack, GlobalTable};
use crate::memory::value::{Cell, Kind};
use crate::memory::MAX_CELLS;

/// Globals, call stack and backing memory of the interpreted program
#[derive(Debug, Default)]
pub struct ExecutionState {
    pub globals: GlobalTable,
    pub stack: CallStack,
    pub memory: Memory,
}

impl ExecutionState {
    pub fn new() -> Self {
        ExecutionState::default()
    }

    /// The cell held by a global slot or a register of the current frame
    pub fn cell(&self, scope: Scope, slot: usize) -> Result<&Cell, ShadowError> {
        let cell = match scope {
            Scope::Global => self.globals.get(slot),
            Scope::Local => self
                .stack
                .current_frame()
                .ok_or_else(|| fatal!(ShadowError::NoStackFrame { operation: "read" }))?
                .get(slot),
            Scope::Constant => None,
        };
        cell.ok_or_else(|| fatal!(ShadowError::InvalidSlot { scope, slot }))
    }

    pub fn cell_mut(&mut self, scope: Scope, slot: usize) -> Result<&mut Cell, ShadowError> {
        let cell = match scope {
            Scope::Global => self.globals.get_mut(slot),
            Scope::Local => self
                .stack
                .current_frame_mut()
                .ok_or_else(|| fatal!(ShadowError::NoStackFrame { operation: "write" }))?
                .get_mut(slot),
            Scope::Constant => None,
        };
        cell.ok_or_else(|| fatal!(ShadowError::InvalidSlot { scope, slot }))
    }

    /// Register `slot` of the current frame
    pub fn register(&self, slot: usize) -> Result<&Cell, ShadowError> {
        self.cell(Scope::Local, slot)
    }

    pub fn register_mut(&mut self, slot: usize) -> Result<&mut Cell, ShadowError> {
        self.cell_mut(Scope::Local, slot)
    }

    /// Overwrite register `slot` of the current frame
    pub fn set_register(&mut self, slot: usize, cell: Cell) -> Result<(), ShadowError> {
        *self.register_mut(slot)? = cell;
        Ok(())
    }

    /// A copy of the operand's value; constants become fresh cells
    pub fn operand(&self, op: &Operand) -> Result<Cell, ShadowError> {
        match op.scope {
            Scope::Constant => Ok(Cell::from_raw(op.kind, op.value)),
            scope => self.cell(scope, op.slot()).cloned(),
        }
    }

    /// Integer view of an operand; pointers yield their address
    pub fn operand_int(&self, op: &Operand) -> Result<i64, ShadowError> {
        match op.scope {
            Scope::Constant => Ok(op.value),
            scope => {
                let cell = self.cell(scope, op.slot())?;
                Ok(if cell.kind == Kind::Ptr {
                    cell.address()
                } else {
                    cell.as_int()
                })
            }
        }
    }

    /// Floating view of an operand
    pub fn operand_flp(&self, op: &Operand) -> Result<f64, ShadowError> {
        match op.scope {
            Scope::Constant => Ok(f64::from_bits(op.value as u64)),
            scope => Ok(self.cell(scope, op.slot())?.as_flp()),
        }
    }

    /// Give the pointer held at (`scope`, `slot`) a backing array, and propagate it to
    /// the memory element the pointer was loaded from
    pub(crate) fn attach_backing(
        &mut self,
        scope: Scope,
        slot: usize,
        id: ArrayId,
        size: usize,
    ) -> Result<(), ShadowError> {
        let ptr = self.cell_mut(scope, slot)?;
        ptr.backing = Some(id);
        ptr.size = size;
        ptr.index = 0;
        let origin = ptr.loaded_from;
        if let Some((array, index)) = origin {
            if let Some(elem) = self.memory.get_mut(array, index) {
                elem.backing = Some(id);
                elem.size = size;
                elem.index = 0;
            }
        }
        Ok(())
    }

    /// Element index and internal byte offset a pointer currently denotes, growing the
    /// backing array when the offset lies before its first element
    pub(crate) fn locate(
        &mut self,
        ptr: &Cell,
        kind: Kind,
        operation: &'static str,
    ) -> Result<(ArrayId, usize, i64), ShadowError> {
        let id = ptr
            .backing
            .ok_or_else(|| fatal!(ShadowError::Unresolvable { offset: ptr.offset, operation }))?;
        let cached = self
            .memory
            .get(id, ptr.index)
            .is_some_and(|c| c.first_byte == ptr.offset && c.bit_offset == ptr.bit);
        let index = if cached {
            ptr.index
        } else {
            match self.memory.resolve_bit(id, ptr.offset, ptr.bit) {
                Some(i) => i,
                None => {
                    self.grow(id, ptr.offset, kind.size(), kind, operation)?;
                    self.memory
                        .resolve_bit(id, ptr.offset, ptr.bit)
                        .ok_or_else(|| {
                            fatal!(ShadowError::Unresolvable {
                                offset: ptr.offset,
                                operation
                            })
                        })?
                }
            }
        };
        let first_byte = self
            .memory
            .get(id, index)
            .map(|c| c.first_byte)
            .unwrap_or(ptr.offset);
        Ok((id, index, ptr.offset - first_byte))
    }

    /// Grow `id` to cover `[offset, offset + size)`, refusing growth steps above
    /// [`MAX_CELLS`]. Returns whether the array grew.
    pub(crate) fn grow(
        &mut self,
        id: ArrayId,
        offset: i64,
        size: usize,
        kind: Kind,
        operation: &'static str,
    ) -> Result<bool, ShadowError> {
        check_cells(operation, self.memory.growth(id, offset, size))?;
        Ok(self.memory.ensure_capacity(id, offset, size, kind))
    }
}

/// Refuse allocations of more than [`MAX_CELLS`] cells
pub(crate) fn check_cells(operation: &'static str, cells: u64) -> Result<(), ShadowError> {
    ensure!(
        cells <= MAX_CELLS,
        ShadowError::AllocationTooLarge { operation, cells }
    );
    Ok(())
}
