//! Shadow memory model
//!
//! This module provides the core memory abstractions:
//! - [`value`]: value cells, kinds and raw scalars
//! - [`arena`]: backing arrays addressed by stable ids, with growth and byte views
//! - [`stack`]: register frames and the call stack
//! - [`shadow`]: the per-cell extension hook analyses attach data through
//!
//! # Flattening
//!
//! Composite values are a flat, ordered run of primitive cells. [`layout`] assigns
//! positions: a boolean field takes one bit of the current byte, any other field
//! starts on the next whole byte and advances by its size.
//!
//! ```text
//! struct { i1 a; i1 b; i32 c; }  →  a@0.0  b@0.1  c@1
//! ```

pub mod arena;
pub mod shadow;
pub mod stack;
pub mod value;

use value::{Cell, Kind};

/// Most cells a single allocation, frame or growth step may create
pub const MAX_CELLS: u64 = 1 << 24;

/// Position of one flattened field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldPos {
    pub first_byte: i64,
    pub bit_offset: u8,
}

/// Positions of `kinds` laid out back to back, plus the total size in bytes
pub fn layout(kinds: &[Kind]) -> (Vec<FieldPos>, usize) {
    let mut bits: u64 = 0;
    let mut positions = Vec::with_capacity(kinds.len());
    for &kind in kinds {
        if kind == Kind::Int1 {
            positions.push(FieldPos {
                first_byte: (bits / 8) as i64,
                bit_offset: (bits % 8) as u8,
            });
            bits += 1;
        } else {
            bits = bits.div_ceil(8) * 8;
            positions.push(FieldPos {
                first_byte: (bits / 8) as i64,
                bit_offset: 0,
            });
            bits += kind.size() as u64 * 8;
        }
    }
    (positions, bits.div_ceil(8) as usize)
}

/// Zero-valued cells for `count` consecutive copies of a record with field `kinds`
pub fn flatten(kinds: &[Kind], count: usize) -> Vec<Cell> {
    let (positions, record) = layout(kinds);
    let mut cells = Vec::with_capacity(kinds.len() * count);
    for i in 0..count {
        for (kind, pos) in kinds.iter().zip(&positions) {
            let mut cell = Cell::new(*kind);
            cell.first_byte = (i * record) as i64 + pos.first_byte;
            cell.bit_offset = pos.bit_offset;
            cells.push(cell);
        }
    }
    cells
}
