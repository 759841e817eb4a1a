//! Backing-array arena
//!
//! Every pointer target (stack slot, global, heap block, flattened array or struct) is
//! a [`Vec<Cell>`] owned by [`Memory`] and addressed by a stable [`ArrayId`]. Cells in
//! an array are ordered by `first_byte`.
//!
//! # Growth
//!
//! [`Memory::ensure_capacity`] replaces an array's contents in place when an access
//! falls outside it. Because the id is unchanged, every pointer holding it observes the
//! grown array. Prepended elements receive negative `first_byte` values so positions
//! and offsets recorded before the growth stay valid.
//!
//! # Byte-level access
//!
//! Reads and writes whose kind or position does not line up with a single element go
//! through a little-endian byte view of the array:
//! - integers use their own width, `Int1` contributes one bit at its `bit_offset`
//! - pointers encode their concrete address
//! - `Flp32` encodes as an IEEE single, wider floats as an `f64` padded with zeros

use super::value::{Cell, Kind, Scalar};
use tracing::debug;

/// Stable handle to a backing array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArrayId(u32);

impl ArrayId {
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Arena of backing arrays
#[derive(Debug, Default)]
pub struct Memory {
    arrays: Vec<Vec<Cell>>,
}

impl Memory {
    pub fn new() -> Self {
        Memory::default()
    }

    /// Register a new backing array
    pub fn alloc(&mut self, cells: Vec<Cell>) -> ArrayId {
        let id = ArrayId(self.arrays.len() as u32);
        self.arrays.push(cells);
        id
    }

    /// Number of arrays ever allocated
    pub fn array_count(&self) -> usize {
        self.arrays.len()
    }

    pub fn cells(&self, id: ArrayId) -> &[Cell] {
        self.arrays
            .get(id.0 as usize)
            .map(|a| a.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self, id: ArrayId) -> usize {
        self.cells(id).len()
    }

    pub fn is_empty(&self, id: ArrayId) -> bool {
        self.cells(id).is_empty()
    }

    pub fn get(&self, id: ArrayId, index: usize) -> Option<&Cell> {
        self.cells(id).get(index)
    }

    pub fn get_mut(&mut self, id: ArrayId, index: usize) -> Option<&mut Cell> {
        self.arrays.get_mut(id.0 as usize)?.get_mut(index)
    }

    /// First byte covered by the array
    pub fn start(&self, id: ArrayId) -> i64 {
        self.cells(id).first().map(|c| c.first_byte).unwrap_or(0)
    }

    /// One past the last byte covered by the array
    pub fn end(&self, id: ArrayId) -> i64 {
        self.cells(id)
            .last()
            .map(|c| c.first_byte + c.kind.size() as i64)
            .unwrap_or(0)
    }

    /// Index of the element whose `first_byte` is the greatest value not above
    /// `offset`. Among elements sharing that byte the first is returned.
    ///
    /// `None` when `offset` lies before the first element; the caller must grow or
    /// initialize the array.
    pub fn resolve(&self, id: ArrayId, offset: i64) -> Option<usize> {
        let cells = self.cells(id);
        let upper = cells.partition_point(|c| c.first_byte <= offset);
        if upper == 0 {
            return None;
        }
        let byte = cells[upper - 1].first_byte;
        Some(cells.partition_point(|c| c.first_byte < byte))
    }

    /// Like [`Memory::resolve`], additionally selecting the packed boolean at `bit`
    pub fn resolve_bit(&self, id: ArrayId, offset: i64, bit: u8) -> Option<usize> {
        let mut index = self.resolve(id, offset)?;
        let cells = self.cells(id);
        while let Some(next) = cells.get(index + 1) {
            let cur = &cells[index];
            if next.first_byte != cur.first_byte || cur.bit_offset >= bit {
                break;
            }
            index += 1;
        }
        Some(index)
    }

    /// Number of cells [`Memory::ensure_capacity`] would add to cover
    /// `[offset, offset + elem_size)`
    pub fn growth(&self, id: ArrayId, offset: i64, elem_size: usize) -> u64 {
        let cells = self.cells(id);
        let (Some(first), Some(last)) = (cells.first(), cells.last()) else {
            return 1;
        };
        let step = elem_size.max(1) as i128;
        let offset = offset as i128;
        let start = first.first_byte as i128;
        let end = last.first_byte as i128 + last.kind.size() as i128;

        let mut count = 0;
        if offset < start {
            count += (start - offset + step - 1) / step;
        }
        if offset + step > end {
            count += (offset + step - end + step - 1) / step;
        }
        u64::try_from(count).unwrap_or(u64::MAX)
    }

    /// Grow the array so `[offset, offset + elem_size)` is covered, filling new
    /// positions with zero-valued cells of `kind`. Returns whether the array grew.
    pub fn ensure_capacity(
        &mut self,
        id: ArrayId,
        offset: i64,
        elem_size: usize,
        kind: Kind,
    ) -> bool {
        let step = elem_size.max(1) as i64;
        let Some(array) = self.arrays.get_mut(id.0 as usize) else {
            return false;
        };

        if array.is_empty() {
            let mut cell = Cell::new(kind);
            cell.first_byte = offset;
            array.push(cell);
        }

        let start = array[0].first_byte;
        let last = &array[array.len() - 1];
        let end = last.first_byte + last.kind.size() as i64;
        let mut grew = false;

        if offset < start {
            let count = (start - offset + step - 1) / step;
            let mut grown = Vec::with_capacity(array.len() + count as usize);
            for k in (1..=count).rev() {
                let mut cell = Cell::new(kind);
                cell.first_byte = start - k * step;
                grown.push(cell);
            }
            grown.append(array);
            *array = grown;
            grew = true;
            debug!(array = id.0, prepended = count, "grew backing array");
        }

        let needed = offset + step;
        if needed > end {
            let count = (needed - end + step - 1) / step;
            for k in 0..count {
                let mut cell = Cell::new(kind);
                cell.first_byte = end + k * step;
                array.push(cell);
            }
            grew = true;
            debug!(array = id.0, appended = count, "grew backing array");
        }

        grew
    }

    /// Read a value of `kind` starting `internal` bytes into element `index`.
    ///
    /// An aligned read of the element's own kind returns a copy of the element,
    /// addressing and shadow included; anything else is decoded from bytes.
    pub fn read(&self, id: ArrayId, index: usize, internal: i64, kind: Kind) -> Cell {
        let cells = self.cells(id);
        if let Some(cell) = cells.get(index) {
            if internal == 0 && cell.kind == kind {
                let mut copy = cell.clone();
                copy.loaded_from = None;
                return copy;
            }
        }
        let base = cells.get(index).map(|c| c.first_byte).unwrap_or(0) + internal;
        let bytes: Vec<u8> = (0..kind.size() as i64)
            .map(|k| self.byte_at(id, base + k))
            .collect();
        Cell::with_scalar(kind, decode(kind, &bytes))
    }

    /// Write `src` starting `internal` bytes into element `index`.
    ///
    /// Returns `true` when the write replaced the element wholesale, `false` when it
    /// was spread over the byte view. Bytes outside the array are dropped.
    pub fn write(&mut self, id: ArrayId, index: usize, internal: i64, src: &Cell) -> bool {
        let Some(array) = self.arrays.get_mut(id.0 as usize) else {
            return false;
        };
        let Some(dest) = array.get_mut(index) else {
            return false;
        };
        if internal == 0 && dest.kind == src.kind {
            dest.assign_from(src);
            return true;
        }

        let base = dest.first_byte + internal;
        let bytes = encode(src);
        for (k, byte) in bytes.into_iter().enumerate() {
            self.set_byte(id, base + k as i64, byte);
        }
        false
    }

    fn byte_at(&self, id: ArrayId, pos: i64) -> u8 {
        let cells = self.cells(id);
        let Some(first) = self.resolve(id, pos) else {
            return 0;
        };
        let mut byte = 0u8;
        for cell in &cells[first..] {
            if cell.first_byte > pos {
                break;
            }
            let rel = pos - cell.first_byte;
            if rel >= cell.kind.size() as i64 {
                continue;
            }
            byte |= encode(cell)[rel as usize];
        }
        byte
    }

    fn set_byte(&mut self, id: ArrayId, pos: i64, byte: u8) {
        let Some(first) = self.resolve(id, pos) else {
            return;
        };
        let Some(array) = self.arrays.get_mut(id.0 as usize) else {
            return;
        };
        for cell in array[first..].iter_mut() {
            if cell.first_byte > pos {
                break;
            }
            let rel = pos - cell.first_byte;
            if rel >= cell.kind.size() as i64 {
                continue;
            }
            let mut bytes = encode(cell);
            if cell.kind == Kind::Int1 {
                let mask = 1u8 << cell.bit_offset;
                bytes[0] = byte & mask;
            } else {
                bytes[rel as usize] = byte;
            }
            if cell.kind == Kind::Ptr {
                cell.offset = 0;
                cell.backing = None;
            }
            cell.scalar = decode_at(cell.kind, cell.bit_offset, &bytes);
        }
    }
}

/// Little-endian byte image of a cell
pub(crate) fn encode(cell: &Cell) -> Vec<u8> {
    match cell.kind {
        Kind::Int1 => vec![((cell.scalar.0 & 1) as u8) << cell.bit_offset],
        Kind::Ptr => cell.address().to_le_bytes().to_vec(),
        Kind::Flp32 => (cell.as_flp() as f32).to_le_bytes().to_vec(),
        Kind::Flp64 => cell.as_flp().to_le_bytes().to_vec(),
        Kind::Flp80X86 | Kind::Flp128 | Kind::Flp128Ppc => {
            let mut bytes = cell.as_flp().to_le_bytes().to_vec();
            bytes.resize(16, 0);
            bytes
        }
        k => {
            let mut bytes = cell.scalar.0.to_le_bytes().to_vec();
            bytes.resize(k.size(), 0);
            bytes
        }
    }
}

pub(crate) fn decode(kind: Kind, bytes: &[u8]) -> Scalar {
    decode_at(kind, 0, bytes)
}

fn decode_at(kind: Kind, bit_offset: u8, bytes: &[u8]) -> Scalar {
    let word = |n: usize| {
        let mut buf = [0u8; 8];
        for (k, b) in bytes.iter().take(n).enumerate() {
            buf[k] = *b;
        }
        i64::from_le_bytes(buf)
    };
    match kind {
        Kind::Int1 => Scalar(((bytes.first().copied().unwrap_or(0) >> bit_offset) & 1) as i64),
        Kind::Flp32 => {
            let mut buf = [0u8; 4];
            for (k, b) in bytes.iter().take(4).enumerate() {
                buf[k] = *b;
            }
            Scalar::from_flp(kind, f32::from_le_bytes(buf) as f64)
        }
        k if k.is_float() => Scalar(word(8)),
        Kind::Ptr => Scalar(word(8)),
        k => Scalar::from_int(k, word(k.size())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(n: usize) -> Vec<Cell> {
        (0..n)
            .map(|i| {
                let mut c = Cell::int(Kind::Int32, i as i64 * 10);
                c.first_byte = i as i64 * 4;
                c
            })
            .collect()
    }

    #[test]
    fn resolve_finds_tight_lower_bound() {
        let mut mem = Memory::new();
        let id = mem.alloc(ints(4));
        assert_eq!(mem.resolve(id, 0), Some(0));
        assert_eq!(mem.resolve(id, 5), Some(1));
        assert_eq!(mem.resolve(id, 15), Some(3));
        assert_eq!(mem.resolve(id, 100), Some(3));
        assert_eq!(mem.resolve(id, -1), None);
    }

    #[test]
    fn growth_preserves_values_and_positions() {
        let mut mem = Memory::new();
        let id = mem.alloc(ints(2));
        assert!(mem.ensure_capacity(id, -8, 4, Kind::Int32));
        assert!(mem.ensure_capacity(id, 12, 4, Kind::Int32));
        assert_eq!(mem.len(id), 6);
        let idx = mem.resolve(id, 4).unwrap();
        assert_eq!(mem.get(id, idx).unwrap().as_int(), 10);
        assert_eq!(mem.start(id), -8);
        assert_eq!(mem.end(id), 16);
        assert!(!mem.ensure_capacity(id, 0, 4, Kind::Int32));
        assert_eq!(mem.growth(id, 0, 4), 0);
        assert_eq!(mem.growth(id, -16, 4), 2);
        assert_eq!(mem.growth(id, 24, 4), 3);
    }

    #[test]
    fn unaligned_write_patches_bytes() {
        let mut mem = Memory::new();
        let id = mem.alloc(ints(2));
        let src = Cell::int(Kind::Int64, 0x0000_0002_0000_0001);
        assert!(!mem.write(id, 0, 0, &src));
        assert_eq!(mem.get(id, 0).unwrap().as_int(), 1);
        assert_eq!(mem.get(id, 1).unwrap().as_int(), 2);
        let back = mem.read(id, 0, 0, Kind::Int64);
        assert_eq!(back.as_int(), 0x0000_0002_0000_0001);
    }

    #[test]
    fn packed_booleans_share_a_byte() {
        let mut mem = Memory::new();
        let cells = (0..3)
            .map(|bit| {
                let mut c = Cell::int(Kind::Int1, 0);
                c.bit_offset = bit;
                c
            })
            .collect();
        let id = mem.alloc(cells);
        assert_eq!(mem.resolve_bit(id, 0, 2), Some(2));
        assert!(mem.write(id, 2, 0, &Cell::int(Kind::Int1, 1)));
        assert_eq!(mem.read(id, 0, 0, Kind::Int8).as_int(), 0b100);
    }
}
