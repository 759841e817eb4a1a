//! Value cells
//!
//! This module defines the [`Cell`], the unit of shadow state. A cell holds one typed
//! scalar together with the addressing metadata the interpreter needs to replay
//! pointer arithmetic over flattened memory.
//!
//! # Scalars
//!
//! A [`Scalar`] is a raw 64-bit payload interpreted according to the cell's [`Kind`]:
//! - integers are stored truncated to their width and sign-extended
//! - pointers hold the concrete base address
//! - floats hold the bit pattern of the value widened to `f64`
//!
//! # Addressing
//!
//! A pointer cell names a backing array in [`Memory`](super::arena::Memory) by
//! [`ArrayId`], a signed byte offset into it, and the cached index of the element
//! that offset falls in. Cells that live inside a backing array carry their own
//! `first_byte` / `bit_offset` position.

use super::arena::ArrayId;
use super::shadow::ShadowValue;
use std::fmt;
use std::str::FromStr;

/// Primitive type tag of a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Kind {
    Ptr,
    Int1,
    Int8,
    Int16,
    Int24,
    Int32,
    Int64,
    Int80,
    Flp32,
    Flp64,
    Flp80X86,
    Flp128,
    Flp128Ppc,
    Array,
    Struct,
    Void,
    #[default]
    Invalid,
}

impl Kind {
    /// Size in bytes as laid out in a backing array.
    ///
    /// `Int1` occupies a single byte for byte-level access, but flattened layouts pack
    /// consecutive booleans into one byte (see [`super::layout`]).
    pub fn size(self) -> usize {
        match self {
            Kind::Int1 | Kind::Int8 => 1,
            Kind::Int16 => 2,
            Kind::Int24 => 3,
            Kind::Int32 | Kind::Flp32 => 4,
            Kind::Ptr | Kind::Int64 | Kind::Flp64 => 8,
            Kind::Int80 => 10,
            Kind::Flp80X86 | Kind::Flp128 | Kind::Flp128Ppc => 16,
            Kind::Array | Kind::Struct | Kind::Void | Kind::Invalid => 0,
        }
    }

    /// Width in bits of an integer kind
    pub fn bits(self) -> u32 {
        match self {
            Kind::Int1 => 1,
            Kind::Int8 => 8,
            Kind::Int16 => 16,
            Kind::Int24 => 24,
            Kind::Int32 => 32,
            Kind::Int80 => 80,
            _ => (self.size() * 8) as u32,
        }
    }

    pub fn is_int(self) -> bool {
        matches!(
            self,
            Kind::Int1 | Kind::Int8 | Kind::Int16 | Kind::Int24 | Kind::Int32 | Kind::Int64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(
            self,
            Kind::Flp32 | Kind::Flp64 | Kind::Flp80X86 | Kind::Flp128 | Kind::Flp128Ppc
        )
    }

    /// Whether the kind can be held in a single cell
    pub fn is_scalar(self) -> bool {
        self == Kind::Ptr || self.is_int() || self.is_float()
    }

    pub fn name(self) -> &'static str {
        match self {
            Kind::Ptr => "ptr",
            Kind::Int1 => "i1",
            Kind::Int8 => "i8",
            Kind::Int16 => "i16",
            Kind::Int24 => "i24",
            Kind::Int32 => "i32",
            Kind::Int64 => "i64",
            Kind::Int80 => "i80",
            Kind::Flp32 => "f32",
            Kind::Flp64 => "f64",
            Kind::Flp80X86 => "f80",
            Kind::Flp128 => "f128",
            Kind::Flp128Ppc => "ppcf128",
            Kind::Array => "array",
            Kind::Struct => "struct",
            Kind::Void => "void",
            Kind::Invalid => "invalid",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Kind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s {
            "ptr" => Kind::Ptr,
            "i1" => Kind::Int1,
            "i8" => Kind::Int8,
            "i16" => Kind::Int16,
            "i24" => Kind::Int24,
            "i32" => Kind::Int32,
            "i64" => Kind::Int64,
            "i80" => Kind::Int80,
            "f32" => Kind::Flp32,
            "f64" => Kind::Flp64,
            "f80" => Kind::Flp80X86,
            "f128" => Kind::Flp128,
            "ppcf128" => Kind::Flp128Ppc,
            "array" => Kind::Array,
            "struct" => Kind::Struct,
            "void" => Kind::Void,
            _ => return Err(format!("Unknown kind: {}", s)),
        };
        Ok(kind)
    }
}

/// Raw 64-bit payload of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Scalar(pub i64);

impl Scalar {
    /// Integer scalar truncated to the width of `kind` and sign-extended
    pub fn from_int(kind: Kind, v: i64) -> Self {
        Scalar(truncate(kind, v))
    }

    /// Float scalar; `Flp32` values are rounded to single precision first
    pub fn from_flp(kind: Kind, v: f64) -> Self {
        let v = if kind == Kind::Flp32 { v as f32 as f64 } else { v };
        Scalar(v.to_bits() as i64)
    }

    /// Interpret a raw instrumentation payload as a value of `kind`
    pub fn from_raw(kind: Kind, raw: i64) -> Self {
        if kind.is_float() {
            Scalar::from_flp(kind, f64::from_bits(raw as u64))
        } else if kind.is_int() {
            Scalar::from_int(kind, raw)
        } else {
            Scalar(raw)
        }
    }

    pub fn as_int(self) -> i64 {
        self.0
    }

    /// Zero-extended view at the width of `kind`
    pub fn as_uint(self, kind: Kind) -> u64 {
        let bits = kind.bits();
        if bits >= 64 || !kind.is_int() {
            self.0 as u64
        } else {
            (self.0 as u64) & ((1u64 << bits) - 1)
        }
    }

    pub fn as_flp(self) -> f64 {
        f64::from_bits(self.0 as u64)
    }

    pub fn as_bool(self) -> bool {
        self.0 != 0
    }
}

/// Truncate `v` to the width of an integer kind, sign-extending the result
pub fn truncate(kind: Kind, v: i64) -> i64 {
    match kind {
        Kind::Int1 => v & 1,
        Kind::Int8 => v as i8 as i64,
        Kind::Int16 => v as i16 as i64,
        Kind::Int24 => (v << 40) >> 40,
        Kind::Int32 => v as i32 as i64,
        _ => v,
    }
}

/// One typed scalar plus its addressing metadata and optional shadow payload
#[derive(Debug, Default)]
pub struct Cell {
    pub kind: Kind,
    pub scalar: Scalar,

    /// Position of this cell inside its backing array
    pub first_byte: i64,
    pub bit_offset: u8,

    /// Pointer cells: byte offset into `backing`
    pub offset: i64,

    /// Pointer cells: cached index of the element `offset` falls in
    pub index: usize,

    /// Pointer cells: bit of the packed boolean addressed at `offset`
    pub bit: u8,

    /// Pointer cells: element size in bytes
    pub size: usize,

    /// Pointer cells: the array this pointer addresses, `None` until initialized
    pub backing: Option<ArrayId>,

    /// Register cells loaded from memory remember the element they came from so that
    /// lazy initialization of a loaded pointer can be written back
    pub loaded_from: Option<(ArrayId, usize)>,

    pub shadow: Option<Box<dyn ShadowValue>>,
}

impl Clone for Cell {
    fn clone(&self) -> Self {
        Cell {
            kind: self.kind,
            scalar: self.scalar,
            first_byte: self.first_byte,
            bit_offset: self.bit_offset,
            offset: self.offset,
            index: self.index,
            bit: self.bit,
            size: self.size,
            backing: self.backing,
            loaded_from: self.loaded_from,
            shadow: self.shadow.as_ref().map(|s| (**s).clone_box()),
        }
    }
}

impl Cell {
    /// A zero-valued cell of `kind`
    pub fn new(kind: Kind) -> Self {
        Cell {
            kind,
            ..Cell::default()
        }
    }

    pub fn with_scalar(kind: Kind, scalar: Scalar) -> Self {
        Cell {
            kind,
            scalar,
            ..Cell::default()
        }
    }

    /// Cell built from a raw instrumentation payload
    pub fn from_raw(kind: Kind, raw: i64) -> Self {
        Cell::with_scalar(kind, Scalar::from_raw(kind, raw))
    }

    pub fn int(kind: Kind, v: i64) -> Self {
        Cell::with_scalar(kind, Scalar::from_int(kind, v))
    }

    pub fn flp(kind: Kind, v: f64) -> Self {
        Cell::with_scalar(kind, Scalar::from_flp(kind, v))
    }

    /// Pointer cell addressing element 0 of `backing`
    pub fn pointer(address: i64, backing: Option<ArrayId>, size: usize) -> Self {
        Cell {
            kind: Kind::Ptr,
            scalar: Scalar(address),
            size,
            backing,
            ..Cell::default()
        }
    }

    /// Whether this pointer addresses a backing array
    pub fn is_initialized(&self) -> bool {
        self.backing.is_some()
    }

    /// Concrete address a pointer cell denotes
    pub fn address(&self) -> i64 {
        self.scalar.0.wrapping_add(self.offset)
    }

    pub fn as_int(&self) -> i64 {
        self.scalar.as_int()
    }

    pub fn as_flp(&self) -> f64 {
        self.scalar.as_flp()
    }

    pub fn set_int(&mut self, v: i64) {
        self.scalar = Scalar::from_int(self.kind, v);
    }

    pub fn set_flp(&mut self, v: f64) {
        self.scalar = Scalar::from_flp(self.kind, v);
    }

    /// Copy value, addressing and shadow from `src`, keeping this cell's own position
    /// inside its backing array
    pub fn assign_from(&mut self, src: &Cell) {
        let first_byte = self.first_byte;
        let bit_offset = self.bit_offset;
        *self = src.clone();
        self.first_byte = first_byte;
        self.bit_offset = bit_offset;
        self.loaded_from = None;
    }

    /// Whether the cell's value equals the raw concrete payload supplied by
    /// instrumentation, compared at the precision of `kind`
    pub fn matches_concrete(&self, kind: Kind, concrete: i64) -> bool {
        match kind {
            Kind::Ptr => self.address() == concrete,
            Kind::Int1 => (self.scalar.0 & 1) == (concrete & 1),
            k if k.is_int() => truncate(k, self.scalar.0) == truncate(k, concrete),
            Kind::Flp32 => {
                let a = self.as_flp() as f32;
                let b = f64::from_bits(concrete as u64) as f32;
                (a.is_nan() && b.is_nan()) || a == b
            }
            k if k.is_float() => {
                let a = self.as_flp();
                let b = f64::from_bits(concrete as u64);
                (a.is_nan() && b.is_nan()) || a == b
            }
            _ => true,
        }
    }

    /// Overwrite the value with the concrete payload, keeping pointer addressing
    pub fn sync_to(&mut self, kind: Kind, concrete: i64) {
        if kind == Kind::Ptr {
            self.scalar = Scalar(concrete.wrapping_sub(self.offset));
        } else {
            self.scalar = Scalar::from_raw(kind, concrete);
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            Kind::Ptr => write!(
                f,
                "ptr 0x{:x}+{} [{}]",
                self.scalar.0,
                self.offset,
                match self.backing {
                    Some(id) => format!("array {} @{}", id.raw(), self.index),
                    None => "uninit".to_string(),
                }
            ),
            k if k.is_float() => write!(f, "{} {}", k, self.as_flp()),
            k => write!(f, "{} {}", k, self.scalar.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_truncated_and_sign_extended() {
        assert_eq!(Scalar::from_int(Kind::Int8, 0x1ff).as_int(), -1);
        assert_eq!(Scalar::from_int(Kind::Int16, 0x18000).as_int(), -32768);
        assert_eq!(Scalar::from_int(Kind::Int24, 0xffffff).as_int(), -1);
        assert_eq!(Scalar::from_int(Kind::Int1, 3).as_int(), 1);
        assert_eq!(Scalar::from_int(Kind::Int8, -1).as_uint(Kind::Int8), 0xff);
    }

    #[test]
    fn single_precision_values_are_rounded() {
        let s = Scalar::from_flp(Kind::Flp32, 1.1);
        assert_eq!(s.as_flp(), 1.1f32 as f64);
        assert_ne!(s.as_flp(), 1.1);
    }

    #[test]
    fn concrete_comparison_treats_nan_as_equal() {
        let cell = Cell::flp(Kind::Flp64, f64::NAN);
        assert!(cell.matches_concrete(Kind::Flp64, f64::NAN.to_bits() as i64));
        let cell = Cell::flp(Kind::Flp32, 1.5);
        assert!(!cell.matches_concrete(Kind::Flp32, 2.5f64.to_bits() as i64));
    }

    #[test]
    fn pointer_sync_keeps_offset() {
        let mut p = Cell::pointer(0x1000, None, 4);
        p.offset = 8;
        p.sync_to(Kind::Ptr, 0x2008);
        assert_eq!(p.address(), 0x2008);
        assert_eq!(p.offset, 8);
    }
}
