//! NaN observer
//!
//! Logs every NaN that is loaded or stored. Purely informational.

use super::Analysis;
use crate::interpreter::operand::Iid;
use crate::memory::value::Cell;
use std::any::Any;
use tracing::info;

#[derive(Debug, Default)]
pub struct NanWatch {
    loads: u64,
    stores: u64,
}

impl NanWatch {
    pub fn new() -> Self {
        NanWatch::default()
    }

    /// NaN values loaded so far
    pub fn loads(&self) -> u64 {
        self.loads
    }

    /// NaN values stored so far
    pub fn stores(&self) -> u64 {
        self.stores
    }
}

fn is_nan(value: &Cell) -> bool {
    value.kind.is_float() && value.as_flp().is_nan()
}

impl Analysis for NanWatch {
    fn name(&self) -> &'static str {
        "nan"
    }

    fn post_load(&mut self, iid: Iid, value: &Cell) {
        if is_nan(value) {
            self.loads += 1;
            info!(iid, "NaN loaded");
        }
    }

    fn post_store(&mut self, iid: Iid, value: &Cell) {
        if is_nan(value) {
            self.stores += 1;
            info!(iid, "NaN stored");
        }
    }

    fn post_analysis(&mut self) -> Result<(), crate::interpreter::errors::ShadowError> {
        if self.loads + self.stores > 0 {
            info!(loads = self.loads, stores = self.stores, "NaN summary");
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
