// Execution engine for the shadow interpreter

use crate::analysis::Analysis;
use crate::interpreter::errors::{ensure, fatal, ShadowError};
use crate::interpreter::operand::{Iid, Operand, Scope};
use crate::interpreter::queues::Queues;
use crate::interpreter::state::{check_cells, ExecutionState};
use crate::memory::stack::Frame;
use crate::memory::value::{Cell, Kind};
use crate::memory::flatten;
use tracing::{debug, info, trace};

/// Replays the callback stream of an instrumented program over shadow state
pub struct Interpreter {
    /// Globals, call stack and backing memory
    pub(crate) state: ExecutionState,

    /// Values pushed ahead of the instruction that consumes them
    pub(crate) queues: Queues,

    /// Registered analyses, run after each instruction's own semantics
    analyses: Vec<Box<dyn Analysis>>,

    /// Number of callbacks dispatched so far
    callbacks: u64,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter {
            state: ExecutionState::new(),
            queues: Queues::default(),
            analyses: Vec::new(),
            callbacks: 0,
        }
    }

    /// Register an analysis and run its `pre_analysis` hook
    pub fn add_analysis(&mut self, mut analysis: Box<dyn Analysis>) {
        analysis.pre_analysis();
        debug!(analysis = analysis.name(), "registered analysis");
        self.analyses.push(analysis);
    }

    /// The registered analysis of type `T`, if any
    pub fn analysis<T: Analysis>(&self) -> Option<&T> {
        self.analyses
            .iter()
            .find_map(|a| a.as_any().downcast_ref::<T>())
    }

    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    pub fn queues(&self) -> &Queues {
        &self.queues
    }

    pub fn callbacks(&self) -> u64 {
        self.callbacks
    }

    /// Register `slot` of the current frame
    pub fn register(&self, slot: usize) -> Result<&Cell, ShadowError> {
        self.state.register(slot)
    }

    /// Global slot `slot`
    pub fn global(&self, slot: usize) -> Result<&Cell, ShadowError> {
        self.state.cell(Scope::Global, slot)
    }

    /// The element a pointer register currently addresses
    pub fn deref(&self, slot: usize) -> Result<&Cell, ShadowError> {
        let ptr = self.state.register(slot)?;
        let id = ptr.backing.ok_or_else(|| {
            fatal!(ShadowError::Unresolvable {
                offset: ptr.offset,
                operation: "deref"
            })
        })?;
        let index = self
            .state
            .memory
            .resolve_bit(id, ptr.offset, ptr.bit)
            .ok_or_else(|| {
                fatal!(ShadowError::Unresolvable {
                    offset: ptr.offset,
                    operation: "deref"
                })
            })?;
        self.state.memory.get(id, index).ok_or_else(|| {
            fatal!(ShadowError::Unresolvable {
                offset: ptr.offset,
                operation: "deref"
            })
        })
    }

    /// Run every analysis' `post_analysis` hook
    pub fn finish(&mut self) -> Result<(), ShadowError> {
        info!(callbacks = self.callbacks, "analysis finished");
        for analysis in self.analyses.iter_mut() {
            analysis.post_analysis()?;
        }
        Ok(())
    }

    pub(crate) fn count(&mut self, name: &'static str, iid: Iid) {
        self.callbacks += 1;
        trace!(callback = name, iid, "dispatch");
    }

    pub(crate) fn notify_load(&mut self, iid: Iid, value: &Cell) {
        for analysis in self.analyses.iter_mut() {
            analysis.post_load(iid, value);
        }
    }

    pub(crate) fn notify_store(&mut self, iid: Iid, value: &Cell) {
        for analysis in self.analyses.iter_mut() {
            analysis.post_store(iid, value);
        }
    }

    pub(crate) fn notify_fbinop(
        &mut self,
        event: &crate::analysis::FloatOp,
    ) -> Result<(), ShadowError> {
        for analysis in self.analyses.iter_mut() {
            analysis.post_fbinop(&mut self.state, event)?;
        }
        Ok(())
    }

    // ---- program and frame setup ----

    /// Reserve `size` global slots
    pub fn create_global_symbol_table(&mut self, size: usize) -> Result<(), ShadowError> {
        self.count("create_global_symbol_table", 0);
        check_cells("create_global_symbol_table", size as u64)?;
        self.state.globals.reserve_slots(size);
        Ok(())
    }

    /// Bind global `slot` at concrete `address` to a fresh backing array holding
    /// `initializer`. Aggregate initializers take their field kinds from the struct
    /// type queue and their element count from the array size queue.
    pub fn create_global(
        &mut self,
        slot: usize,
        address: i64,
        initializer: Operand,
    ) -> Result<(), ShadowError> {
        self.count("create_global", 0);
        let cells = match initializer.kind {
            Kind::Struct | Kind::Array => {
                let kinds = self.queues.take_struct_type("create_global")?;
                let count = self
                    .queues
                    .array_size
                    .drain(..)
                    .fold(1u64, |acc, d| acc.saturating_mul(d as u64))
                    .max(1);
                check_cells(
                    "create_global",
                    count.saturating_mul(kinds.len() as u64),
                )?;
                flatten(&kinds, count as usize)
            }
            _ => {
                let mut cell = self.state.operand(&initializer)?;
                cell.first_byte = 0;
                cell.bit_offset = 0;
                cell.loaded_from = None;
                vec![cell]
            }
        };
        let size = cells.first().map(|c| c.kind.size()).unwrap_or(0);
        let id = self.state.memory.alloc(cells);
        let global = self.state.globals.get_mut(slot).ok_or_else(|| {
            fatal!(ShadowError::InvalidSlot {
                scope: Scope::Global,
                slot
            })
        })?;
        *global = Cell::pointer(address, Some(id), size);
        debug!(slot, address, "created global");
        Ok(())
    }

    /// Enter a function: push a frame of `size` registers filled from the marshaled
    /// call arguments
    pub fn create_stack_frame(&mut self, size: usize) -> Result<(), ShadowError> {
        self.count("create_stack_frame", 0);
        self.queues.is_return = false;
        check_cells("create_stack_frame", size as u64)?;
        let frame = Frame::new(size, &mut self.queues.call_args);
        ensure!(
            self.queues.call_args.is_empty(),
            ShadowError::QueueNotDrained {
                queue: "call argument",
                operation: "create_stack_frame",
                left: self.queues.call_args.len(),
            }
        );
        self.state.stack.push_frame(frame);
        debug!(size, depth = self.state.stack.depth(), "entered frame");
        Ok(())
    }

    /// Record the block control is leaving; the phi nodes of its successor resolve
    /// against it. Replaces the current call's entry.
    pub fn record_block_id(&mut self, id: i64) -> Result<(), ShadowError> {
        self.count("record_block_id", 0);
        self.queues.recent_block.pop();
        self.queues.recent_block.push(id);
        Ok(())
    }

    // ---- queue pushes ----

    pub fn push_stack(&mut self, value: Operand) -> Result<(), ShadowError> {
        self.count("push_stack", value.iid);
        let cell = self.state.operand(&value)?;
        self.queues.pushed.push_back(cell);
        Ok(())
    }

    pub fn push_return_struct(&mut self, value: Operand) -> Result<(), ShadowError> {
        self.count("push_return_struct", value.iid);
        let cell = self.state.operand(&value)?;
        self.queues.return_struct.push_back(cell);
        Ok(())
    }

    pub fn push_struct_type(&mut self, kind: Kind) -> Result<(), ShadowError> {
        self.count("push_struct_type", 0);
        self.queues.struct_type.push_back(kind);
        Ok(())
    }

    pub fn push_struct_element_size(&mut self, size: usize) -> Result<(), ShadowError> {
        self.count("push_struct_element_size", 0);
        self.queues.struct_element_size.push_back(size);
        Ok(())
    }

    pub fn push_getelementptr_inx(&mut self, index: Operand) -> Result<(), ShadowError> {
        self.count("push_getelementptr_inx", index.iid);
        let value = self.state.operand_int(&index)?;
        self.queues.gep_index.push_back(value);
        Ok(())
    }

    /// Push up to five indices; the list ends at the first absent operand
    pub fn push_getelementptr_inx5(&mut self, indices: &[Option<Operand>]) -> Result<(), ShadowError> {
        self.count("push_getelementptr_inx5", 0);
        for index in indices.iter().take(5).map_while(|i| i.as_ref()) {
            let value = self.state.operand_int(index)?;
            self.queues.gep_index.push_back(value);
        }
        Ok(())
    }

    pub fn push_array_size(&mut self, size: usize) -> Result<(), ShadowError> {
        self.count("push_array_size", 0);
        self.queues.array_size.push_back(size);
        Ok(())
    }

    /// Push up to five dimensions; the list ends at the first negative entry
    pub fn push_array_size5(&mut self, sizes: &[i64]) -> Result<(), ShadowError> {
        self.count("push_array_size5", 0);
        for &size in sizes.iter().take(5).take_while(|s| **s >= 0) {
            self.queues.array_size.push_back(size as usize);
        }
        Ok(())
    }

    pub fn push_phinode_constant_value(&mut self, value: Operand, block: i64) -> Result<(), ShadowError> {
        self.count("push_phinode_constant_value", value.iid);
        self.queues
            .phi_constants
            .insert(block, Cell::from_raw(value.kind, value.value));
        Ok(())
    }

    pub fn push_phinode_value(&mut self, slot: usize, block: i64) -> Result<(), ShadowError> {
        self.count("push_phinode_value", 0);
        self.queues.phi_values.insert(block, slot);
        Ok(())
    }

    // ---- deliberately unmodeled instructions ----

    fn unimplemented(&mut self, name: &'static str, iid: Iid) -> Result<(), ShadowError> {
        self.count(name, iid);
        Err(fatal!(ShadowError::Unimplemented(name)))
    }

    pub fn extractelement(&mut self, iid: Iid) -> Result<(), ShadowError> {
        self.unimplemented("extractelement", iid)
    }

    pub fn insertelement(&mut self, iid: Iid) -> Result<(), ShadowError> {
        self.unimplemented("insertelement", iid)
    }

    pub fn shufflevector(&mut self, iid: Iid) -> Result<(), ShadowError> {
        self.unimplemented("shufflevector", iid)
    }

    pub fn insertvalue(&mut self, iid: Iid) -> Result<(), ShadowError> {
        self.unimplemented("insertvalue", iid)
    }

    pub fn fence(&mut self, iid: Iid) -> Result<(), ShadowError> {
        self.unimplemented("fence", iid)
    }

    pub fn cmpxchg(&mut self, iid: Iid) -> Result<(), ShadowError> {
        self.unimplemented("cmpxchg", iid)
    }

    pub fn atomicrmw(&mut self, iid: Iid) -> Result<(), ShadowError> {
        self.unimplemented("atomicrmw", iid)
    }

    pub fn invoke(&mut self, iid: Iid) -> Result<(), ShadowError> {
        self.queues.clear_call();
        self.unimplemented("invoke", iid)
    }

    pub fn resume(&mut self, iid: Iid) -> Result<(), ShadowError> {
        self.unimplemented("resume", iid)
    }

    pub fn vaarg(&mut self, iid: Iid) -> Result<(), ShadowError> {
        self.unimplemented("vaarg", iid)
    }

    pub fn landingpad(&mut self, iid: Iid) -> Result<(), ShadowError> {
        self.unimplemented("landingpad", iid)
    }
}
