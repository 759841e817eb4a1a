// Memory access: load, store and aggregate reads

use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::{ensure, fatal, ShadowError};
use crate::interpreter::operand::{Iid, Operand, Scope};
use crate::memory::value::{Cell, Kind};
use tracing::{debug, info};

impl Interpreter {
    /// Load a `kind` value through the pointer operand `src` into register `dest`.
    ///
    /// `concrete` is the value the real program loaded; the shadow value is
    /// resynchronized to it on mismatch and, when the access lies inside the backing
    /// array, written back to memory.
    pub fn load(
        &mut self,
        iid: Iid,
        kind: Kind,
        src: Operand,
        dest: usize,
        concrete: i64,
    ) -> Result<(), ShadowError> {
        self.count("load", iid);
        ensure!(
            kind != Kind::Int80,
            ShadowError::UnsupportedKind {
                kind,
                operation: "load"
            }
        );

        let loaded = if src.is_constant() {
            let mut cell = Cell::new(kind);
            if !cell.matches_concrete(kind, concrete) {
                cell.sync_to(kind, concrete);
            }
            cell
        } else {
            self.load_through(iid, kind, src.scope, src.slot(), concrete)?
        };

        self.notify_load(iid, &loaded);
        self.state.set_register(dest, loaded)
    }

    fn load_through(
        &mut self,
        iid: Iid,
        kind: Kind,
        scope: Scope,
        slot: usize,
        concrete: i64,
    ) -> Result<Cell, ShadowError> {
        let ptr = self.state.cell(scope, slot)?.clone();

        if !ptr.is_initialized() {
            // Uninitialized pointer: zero value, then give the pointer a one-element
            // array holding it.
            let mut cell = Cell::new(kind);
            if !cell.matches_concrete(kind, concrete) {
                cell.sync_to(kind, concrete);
                info!(iid, "syncing load through uninitialized pointer");
            }
            let mut elem = cell.clone();
            elem.first_byte = ptr.offset;
            let id = self.state.memory.alloc(vec![elem]);
            self.state.attach_backing(scope, slot, id, kind.size())?;
            cell.loaded_from = Some((id, 0));
            debug!(iid, "initialized source pointer");
            return Ok(cell);
        }

        let (id, index, internal) = self.state.locate(&ptr, kind, "load")?;
        self.state.cell_mut(scope, slot)?.index = index;

        let mut cell = self.state.memory.read(id, index, internal, kind);
        cell.kind = kind;
        if !cell.matches_concrete(kind, concrete) {
            cell.sync_to(kind, concrete);
            info!(iid, value = %cell, "syncing load");
            if ptr.offset + kind.size() as i64 <= self.state.memory.end(id) {
                self.state.memory.write(id, index, internal, &cell);
            }
        }
        cell.loaded_from = Some((id, index));
        Ok(cell)
    }

    /// Store `src` through the pointer operand `dest_ptr`.
    ///
    /// The written location is read back and must reproduce `concrete`, the value the
    /// real program stored; any difference is fatal.
    pub fn store(
        &mut self,
        iid: Iid,
        dest_ptr: Operand,
        src: Operand,
        concrete: i64,
    ) -> Result<(), ShadowError> {
        self.count("store", iid);
        let kind = src.kind;
        ensure!(
            kind != Kind::Int80,
            ShadowError::UnsupportedKind {
                kind,
                operation: "store"
            }
        );
        if dest_ptr.is_constant() {
            debug!(iid, "ignoring store through pointer constant");
            return Ok(());
        }

        let (scope, slot) = (dest_ptr.scope, dest_ptr.slot());
        let value = self.state.operand(&src)?;

        if self.state.cell(scope, slot)?.backing.is_none() {
            let offset = self.state.cell(scope, slot)?.offset;
            let id = self.state.memory.alloc(Vec::new());
            self.state.memory.ensure_capacity(id, offset, kind.size(), kind);
            self.state.attach_backing(scope, slot, id, kind.size())?;
            debug!(iid, "initialized destination pointer");
        }

        let ptr = self.state.cell(scope, slot)?.clone();
        let Some(id) = ptr.backing else {
            return Err(fatal!(ShadowError::Unresolvable {
                offset: ptr.offset,
                operation: "store"
            }));
        };
        self.state.grow(id, ptr.offset, kind.size(), kind, "store")?;
        let (id, index, internal) = self.state.locate(&ptr, kind, "store")?;
        self.state.cell_mut(scope, slot)?.index = index;

        self.state.memory.write(id, index, internal, &value);

        let written = self.state.memory.read(id, index, internal, kind);
        if !written.matches_concrete(kind, concrete) {
            return Err(fatal!(ShadowError::StoreMismatch {
                iid,
                kind,
                written: written.to_string(),
                concrete,
            }));
        }

        self.notify_store(iid, &written);
        Ok(())
    }

    /// Load a whole struct through the pointer operand `src` into register `dest`.
    ///
    /// The return-struct queue holds the concrete field values, one per flattened
    /// field, used to resynchronize each field.
    pub fn load_struct(&mut self, iid: Iid, src: Operand, dest: usize) -> Result<(), ShadowError> {
        self.count("load_struct", iid);
        ensure!(
            !src.is_constant(),
            ShadowError::UnsupportedKind {
                kind: Kind::Struct,
                operation: "load_struct from constant"
            }
        );
        let concrete: Vec<Cell> = self.queues.return_struct.drain(..).collect();
        let ptr = self.state.cell(src.scope, src.slot())?.clone();

        let (id, start) = match ptr.backing {
            Some(_) => {
                let (id, index, _) = self.state.locate(&ptr, Kind::Struct, "load_struct")?;
                (Some(id), index)
            }
            None => (None, 0),
        };

        let mut fields = Vec::with_capacity(concrete.len());
        let mut base = None;
        for (i, expected) in concrete.iter().enumerate() {
            let mut field = match id.and_then(|id| self.state.memory.get(id, start + i)) {
                Some(cell) => cell.clone(),
                None => Cell::new(expected.kind),
            };
            let origin = *base.get_or_insert(field.first_byte);
            field.first_byte -= origin;
            field.loaded_from = None;
            let field_kind = field.kind;
            if !field.matches_concrete(field_kind, expected.scalar.0) {
                field.sync_to(field_kind, expected.scalar.0);
                info!(iid, field = i, "syncing struct load");
            }
            fields.push(field);
        }

        let size = fields.first().map(|c| c.kind.size()).unwrap_or(0);
        let array = self.state.memory.alloc(fields);
        let mut value = Cell::pointer(0, Some(array), size);
        value.kind = Kind::Struct;
        self.state.set_register(dest, value)
    }

    /// Extract one field of a struct value into register `dest`; the field index comes
    /// from the getelementptr index queue
    pub fn extractvalue(&mut self, iid: Iid, aggregate: Operand, dest: usize) -> Result<(), ShadowError> {
        self.count("extractvalue", iid);
        let index = self.queues.pop_gep_index("extractvalue")?;
        ensure!(
            self.queues.gep_index.is_empty(),
            ShadowError::QueueNotDrained {
                queue: "getelementptr index",
                operation: "extractvalue",
                left: self.queues.gep_index.len(),
            }
        );
        let constants: Vec<Cell> = self.queues.return_struct.drain(..).collect();

        let field = if aggregate.is_constant() {
            constants.get(index as usize).cloned()
        } else {
            let agg = self.state.cell(aggregate.scope, aggregate.slot())?;
            agg.backing
                .and_then(|id| self.state.memory.get(id, index as usize))
                .cloned()
        };
        let mut field = field.ok_or_else(|| {
            fatal!(ShadowError::Unresolvable {
                offset: index,
                operation: "extractvalue"
            })
        })?;
        field.first_byte = 0;
        field.bit_offset = 0;
        field.loaded_from = None;
        self.state.set_register(dest, field)
    }
}
