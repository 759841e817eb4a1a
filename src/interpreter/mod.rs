//! Shadow interpreter
//!
//! This module replays the callback stream of an instrumented program:
//! - [`engine`]: the [`Interpreter`](engine::Interpreter), frame setup, queue pushes
//! - [`ops`]: per-instruction semantics
//! - [`state`]: globals, call stack and backing memory
//! - [`queues`]: values pushed ahead of the instruction that consumes them
//! - [`operand`]: operand descriptors and instruction vocabularies
//! - [`errors`]: fatal error type
//!
//! # Execution Model
//!
//! Each callback is a synchronous call that applies one instruction's semantics to
//! the shadow state and then runs the registered analyses. Wherever the program
//! reports a concrete value (loads, call results) the shadow value is resynchronized
//! to it; a store whose shadow image does not reproduce the concrete value is fatal.

pub mod engine;
pub mod errors;
pub mod operand;
pub mod ops;
pub mod queues;
pub mod state;
