//! Call stack implementation
//!
//! This module provides the register state of the interpreted program:
//! - [`CallStack`]: LIFO of frames, one per active call
//! - [`Frame`]: fixed-size register file indexed by per-function register id
//! - [`GlobalTable`]: append-only table of global slots
//!
//! Frames are sized once at creation from the function's static register count and
//! pre-populated positionally from the pending call arguments.

use super::value::Cell;
use std::collections::VecDeque;

/// Register file of one active function
#[derive(Debug, Clone, Default)]
pub struct Frame {
    registers: Vec<Cell>,
}

impl Frame {
    /// Frame with `size` registers, the first ones taken from `args` in order
    pub fn new(size: usize, args: &mut VecDeque<Cell>) -> Self {
        let registers = (0..size)
            .map(|_| args.pop_front().unwrap_or_default())
            .collect();
        Frame { registers }
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    pub fn get(&self, slot: usize) -> Option<&Cell> {
        self.registers.get(slot)
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut Cell> {
        self.registers.get_mut(slot)
    }

    /// Replace the register's contents. Returns `false` if the slot does not exist.
    pub fn set(&mut self, slot: usize, cell: Cell) -> bool {
        match self.registers.get_mut(slot) {
            Some(r) => {
                *r = cell;
                true
            }
            None => false,
        }
    }

    pub fn registers(&self) -> &[Cell] {
        &self.registers
    }
}

/// The call stack
#[derive(Debug, Clone, Default)]
pub struct CallStack {
    frames: Vec<Frame>,
}

impl CallStack {
    pub fn new() -> Self {
        CallStack::default()
    }

    pub fn push_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn pop_frame(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn current_frame(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn current_frame_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }
}

/// Global value table, indexed by the slot id assigned at registration
#[derive(Debug, Clone, Default)]
pub struct GlobalTable {
    slots: Vec<Cell>,
}

impl GlobalTable {
    /// Append `size` empty slots
    pub fn reserve_slots(&mut self, size: usize) {
        self.slots
            .extend(std::iter::repeat_with(Cell::default).take(size));
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, slot: usize) -> Option<&Cell> {
        self.slots.get(slot)
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut Cell> {
        self.slots.get_mut(slot)
    }

    pub fn slots(&self) -> &[Cell] {
        &self.slots
    }
}
