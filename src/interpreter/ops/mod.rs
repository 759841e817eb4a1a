//! Per-instruction semantics, grouped by instruction family
//!
//! Every module here adds callbacks to [`Interpreter`](super::engine::Interpreter)
//! through its own `impl` block:
//! - [`access`]: `load`, `store`, `load_struct`, `extractvalue`
//! - [`pointer`]: allocation and `getelementptr` variants
//! - [`binary`]: arithmetic, bitwise and comparison instructions
//! - [`cast`]: conversions
//! - [`control`]: branches, phi nodes and the call/return protocol

pub mod access;
pub mod binary;
pub mod cast;
pub mod control;
pub mod pointer;
