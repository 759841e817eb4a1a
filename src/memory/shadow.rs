//! Shadow extension hook
//!
//! Analyses attach per-value auxiliary data to cells through [`ShadowValue`] without
//! the interpreter knowing its shape. Copying a cell copies its shadow through
//! [`ShadowValue::clone_box`]; dropping a cell releases it.

use std::any::Any;
use std::fmt;

/// Opaque per-cell payload owned by an analysis
pub trait ShadowValue: Any + fmt::Debug {
    fn clone_box(&self) -> Box<dyn ShadowValue>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any + Clone + fmt::Debug> ShadowValue for T {
    fn clone_box(&self) -> Box<dyn ShadowValue> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl dyn ShadowValue {
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}
