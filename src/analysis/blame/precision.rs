//! The ladder of modeled precisions
//!
//! Values are held as `f64`. A lower precision is modeled by clearing the low bits of
//! the mantissa, so every level is a truncation of the next wider one.

use std::fmt;

/// Mantissa width of the `f64` carrier
pub const MANTISSA_BITS: u32 = 52;

/// Modeled precision levels, ascending
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Precision {
    /// The program's native single precision
    Float,
    Bits27,
    Bits33,
    Bits39,
    Bits45,
    Double,
}

impl Precision {
    pub const ALL: [Precision; 6] = [
        Precision::Float,
        Precision::Bits27,
        Precision::Bits33,
        Precision::Bits39,
        Precision::Bits45,
        Precision::Double,
    ];

    pub const COUNT: usize = Self::ALL.len();

    /// Mantissa bits kept at this level
    pub fn bits(self) -> u32 {
        match self {
            Precision::Float => 23,
            Precision::Bits27 => 27,
            Precision::Bits33 => 33,
            Precision::Bits39 => 39,
            Precision::Bits45 => 45,
            Precision::Double => 52,
        }
    }

    /// Position on the ladder
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_bits(bits: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.bits() == bits)
    }

    /// `v` with the mantissa bits below this level cleared
    pub fn truncate(self, v: f64) -> f64 {
        clear_bits(v, MANTISSA_BITS - self.bits())
    }

    /// Whether `a` and `b` agree at this level; NaN agrees with NaN
    pub fn equal_within(self, a: f64, b: f64) -> bool {
        same_value(self.truncate(a), self.truncate(b))
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

/// Clear the `n` least significant mantissa bits of `v`
pub fn clear_bits(v: f64, n: u32) -> f64 {
    if n == 0 {
        return v;
    }
    let mask = !((1u64 << n.min(MANTISSA_BITS)) - 1);
    f64::from_bits(v.to_bits() & mask)
}

/// Equality with NaN equal to NaN
pub fn same_value(a: f64, b: f64) -> bool {
    (a.is_nan() && b.is_nan()) || a == b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_is_ascending() {
        let bits: Vec<u32> = Precision::ALL.iter().map(|p| p.bits()).collect();
        assert_eq!(bits, vec![23, 27, 33, 39, 45, 52]);
        assert!(Precision::Float < Precision::Double);
        assert_eq!(Precision::from_bits(39), Some(Precision::Bits39));
        assert_eq!(Precision::from_bits(40), None);
    }

    #[test]
    fn truncation_clears_low_mantissa_bits() {
        let v = f64::from_bits(0x3ff0_0000_0000_0fff);
        assert_eq!(clear_bits(v, 12).to_bits(), 0x3ff0_0000_0000_0000);
        assert_eq!(Precision::Double.truncate(v), v);
        assert_eq!(Precision::Float.truncate(1.5), 1.5);
    }

    #[test]
    fn single_values_survive_float_truncation() {
        let v = 1.3f32 as f64;
        assert_eq!(Precision::Float.truncate(v), v);
        assert!(Precision::Float.equal_within(f64::NAN, f64::NAN));
        assert!(!Precision::Double.equal_within(0.1, 0.1f32 as f64));
    }
}
