// Allocation and pointer indexing

use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::{ensure, fatal, ShadowError};
use crate::interpreter::operand::{Iid, Operand};
use crate::interpreter::state::check_cells;
use crate::memory::value::{Cell, Kind};
use crate::memory::{flatten, layout};
use tracing::debug;

impl Interpreter {
    /// Stack allocation of a single `kind` value at concrete `address`
    pub fn allocax(&mut self, iid: Iid, kind: Kind, dest: usize, address: i64) -> Result<(), ShadowError> {
        self.count("allocax", iid);
        let id = self.state.memory.alloc(vec![Cell::new(kind)]);
        self.state
            .set_register(dest, Cell::pointer(address, Some(id), kind.size()))
    }

    /// Stack allocation of `count` elements; struct elements take their flattened field
    /// kinds from the struct type queue
    pub fn allocax_array(
        &mut self,
        iid: Iid,
        kind: Kind,
        count: usize,
        dest: usize,
        address: i64,
    ) -> Result<(), ShadowError> {
        self.count("allocax_array", iid);
        let kinds = if kind == Kind::Struct {
            self.queues.take_struct_type("allocax_array")?
        } else {
            vec![kind]
        };
        check_cells(
            "allocax_array",
            (kinds.len() as u64).saturating_mul(count as u64),
        )?;
        let cells = flatten(&kinds, count);
        let size = cells.first().map(|c| c.kind.size()).unwrap_or(0);
        let id = self.state.memory.alloc(cells);
        self.state
            .set_register(dest, Cell::pointer(address, Some(id), size))
    }

    /// Stack allocation of one struct with `fields` flattened fields
    pub fn allocax_struct(
        &mut self,
        iid: Iid,
        fields: usize,
        dest: usize,
        address: i64,
    ) -> Result<(), ShadowError> {
        self.count("allocax_struct", iid);
        ensure!(
            self.queues.struct_type.len() == fields,
            ShadowError::QueueNotDrained {
                queue: "struct type",
                operation: "allocax_struct",
                left: self.queues.struct_type.len(),
            }
        );
        let kinds = self.queues.take_struct_type("allocax_struct")?;
        let cells = flatten(&kinds, 1);
        let size = cells.first().map(|c| c.kind.size()).unwrap_or(0);
        let id = self.state.memory.alloc(cells);
        self.state
            .set_register(dest, Cell::pointer(address, Some(id), size))
    }

    /// Heap allocation; the requested byte count is the last pushed argument.
    ///
    /// Scalar blocks hold `bytes * 8 / elem_bits` elements of `kind`; struct blocks
    /// hold as many flattened records as the byte count covers.
    pub fn call_malloc(
        &mut self,
        iid: Iid,
        kind: Kind,
        elem_bits: usize,
        dest: usize,
        address: i64,
    ) -> Result<(), ShadowError> {
        self.count("call_malloc", iid);
        let bytes = self
            .queues
            .pushed
            .pop_back()
            .ok_or_else(|| {
                fatal!(ShadowError::QueueUnderflow {
                    queue: "argument",
                    operation: "call_malloc"
                })
            })?
            .as_int()
            .max(0) as usize;
        self.queues.pushed.clear();

        let cells = if kind == Kind::Struct {
            let kinds = self.queues.take_struct_type("call_malloc")?;
            let (_, record) = layout(&kinds);
            let records = bytes.div_ceil(record.max(1));
            check_cells(
                "call_malloc",
                (records as u64).saturating_mul(kinds.len() as u64),
            )?;
            flatten(&kinds, records)
        } else {
            ensure!(
                elem_bits > 0,
                ShadowError::UnsupportedKind {
                    kind,
                    operation: "call_malloc"
                }
            );
            let count = (bytes as u64).saturating_mul(8) / elem_bits as u64;
            check_cells("call_malloc", count)?;
            flatten(&[kind], count as usize)
        };
        debug!(iid, bytes, elements = cells.len(), "heap allocation");
        let size = cells
            .first()
            .map(|c| c.kind.size())
            .unwrap_or(elem_bits / 8);
        let id = self.state.memory.alloc(cells);
        self.state
            .set_register(dest, Cell::pointer(address, Some(id), size))
    }

    /// Pointer arithmetic: `base + index` elements of `elem_bits` bits. Offsets outside
    /// the backing array grow it with zero-valued `kind` elements.
    pub fn getelementptr(
        &mut self,
        iid: Iid,
        base: Operand,
        index: Operand,
        kind: Kind,
        elem_bits: usize,
        dest: usize,
    ) -> Result<(), ShadowError> {
        self.count("getelementptr", iid);
        ensure!(
            kind != Kind::Int80,
            ShadowError::UnsupportedKind {
                kind,
                operation: "getelementptr"
            }
        );
        let index = self.state.operand_int(&index)?;
        let size = elem_bits / 8;
        let delta = index.saturating_mul(size as i64);
        let result = self.offset_pointer(&base, delta, size, kind, "getelementptr")?;
        self.state.set_register(dest, result)
    }

    /// Multi-dimensional array indexing. The indices (pointer index first) come from the
    /// getelementptr index queue, the dimensions (outermost first) from the array size
    /// queue.
    pub fn getelementptr_array(
        &mut self,
        iid: Iid,
        base: Operand,
        kind: Kind,
        elem_size: usize,
        dest: usize,
    ) -> Result<(), ShadowError> {
        self.count("getelementptr_array", iid);
        let indices: Vec<i64> = self.queues.gep_index.drain(..).collect();
        let dims: Vec<usize> = self.queues.array_size.drain(..).collect();
        ensure!(
            !indices.is_empty(),
            ShadowError::QueueUnderflow {
                queue: "getelementptr index",
                operation: "getelementptr_array"
            }
        );
        ensure!(
            indices.len() <= dims.len() + 1,
            ShadowError::QueueUnderflow {
                queue: "array size",
                operation: "getelementptr_array"
            }
        );

        let flat = flat_index(&indices, &dims);
        let result = self.offset_pointer(
            &base,
            flat.saturating_mul(elem_size as i64),
            elem_size,
            kind,
            "getelementptr_array",
        )?;
        self.state.set_register(dest, result)
    }

    /// Struct field indexing. The struct type queue holds the flattened field kinds,
    /// the getelementptr index queue the record index and optional field index, and the
    /// struct element size queue the number of flattened primitives of each field.
    pub fn getelementptr_struct(&mut self, iid: Iid, base: Operand, dest: usize) -> Result<(), ShadowError> {
        self.count("getelementptr_struct", iid);
        let kinds = self.queues.take_struct_type("getelementptr_struct")?;
        let record = self.queues.pop_gep_index("getelementptr_struct")?;
        let field = self.queues.gep_index.pop_front();
        let element_sizes: Vec<usize> = self.queues.struct_element_size.drain(..).collect();
        ensure!(
            self.queues.gep_index.is_empty(),
            ShadowError::QueueNotDrained {
                queue: "getelementptr index",
                operation: "getelementptr_struct",
                left: self.queues.gep_index.len(),
            }
        );

        let n = kinds.len() as i64;
        let mut flat = record.saturating_mul(n);
        if let Some(field) = field {
            ensure!(
                field >= 0 && element_sizes.len() >= field as usize,
                ShadowError::QueueUnderflow {
                    queue: "struct element size",
                    operation: "getelementptr_struct"
                }
            );
            let skipped = element_sizes[..field as usize]
                .iter()
                .fold(0i64, |acc, &size| acc.saturating_add(size as i64));
            flat = flat.saturating_add(skipped);
        }

        let (positions, record_size) = layout(&kinds);
        let k = flat.rem_euclid(n) as usize;
        let byte = (record_size as i64)
            .saturating_mul(flat.div_euclid(n))
            .saturating_add(positions[k].first_byte);
        let bit = positions[k].bit_offset;
        let field_kind = kinds[k];

        let mut result = self.offset_pointer(
            &base,
            byte,
            field_kind.size(),
            field_kind,
            "getelementptr_struct",
        )?;
        result.bit = bit;
        if let Some(id) = result.backing {
            if let Some(index) = self.state.memory.resolve_bit(id, result.offset, bit) {
                result.index = index;
            }
        }
        self.state.set_register(dest, result)
    }

    /// Derive a pointer `delta` bytes past `base`, initializing or growing the backing
    /// array so the `size`-byte target is covered
    fn offset_pointer(
        &mut self,
        base: &Operand,
        delta: i64,
        size: usize,
        kind: Kind,
        operation: &'static str,
    ) -> Result<Cell, ShadowError> {
        if base.is_constant() {
            let mut ptr = Cell::pointer(base.value, None, size);
            ptr.offset = delta;
            return Ok(ptr);
        }

        let (scope, slot) = (base.scope, base.slot());
        let ptr = self.state.cell(scope, slot)?.clone();
        let offset = ptr.offset.saturating_add(delta);
        let id = match ptr.backing {
            Some(id) => id,
            None => {
                let id = self.state.memory.alloc(Vec::new());
                self.state.attach_backing(scope, slot, id, size)?;
                id
            }
        };
        if self.state.grow(id, offset, size, kind, operation)? {
            debug!(operation, offset, "re-based pointer target");
        }
        let index = self.state.memory.resolve(id, offset).ok_or_else(|| {
            fatal!(ShadowError::Unresolvable { offset, operation })
        })?;

        let mut result = Cell::pointer(ptr.scalar.0, Some(id), size);
        result.offset = offset;
        result.index = index;
        Ok(result)
    }
}

/// Row-major flat element index of `indices` over an array with dimensions `dims`.
///
/// The first index steps over whole arrays, each later index `k` over the product of
/// the dimensions after it.
pub fn flat_index(indices: &[i64], dims: &[usize]) -> i64 {
    indices
        .iter()
        .enumerate()
        .map(|(k, idx)| {
            let stride = dims
                .iter()
                .skip(k)
                .fold(1i64, |acc, &d| acc.saturating_mul(d as i64));
            idx.saturating_mul(stride)
        })
        .fold(0, i64::saturating_add)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_index_is_row_major() {
        assert_eq!(flat_index(&[0, 1, 2], &[2, 3]), 5);
        assert_eq!(flat_index(&[1, 0, 0], &[2, 3]), 6);
        assert_eq!(flat_index(&[0, 1], &[2, 3]), 3);
        assert_eq!(flat_index(&[4], &[]), 4);
        assert_eq!(flat_index(&[0, 1, 2, 3], &[2, 3, 4]), 12 + 8 + 3);
    }
}
