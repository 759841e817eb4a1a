//! # Introduction
//!
//! shadowfp replays the callback stream of an instrumented program over a shadow model of
//! its memory and registers. Analyses attach data to every shadow value; the main one
//! evaluates each floating operation in both single and double precision and attributes
//! precision loss to the operands and operators responsible.
//!
//! ## Pipeline
//!
//! ```text
//! trace → parse → Interpreter → analyses → BlameReport → text / TUI
//! ```
//!
//! 1. [`trace`]: text form of the callback stream and its replayer.
//! 2. [`interpreter`]: callback semantics over [`memory`] cells, frames and arrays.
//! 3. [`analysis`]: the [`analysis::Analysis`] hooks, precision blame and a NaN watch.
//! 4. [`debuginfo`]: instruction id to source location table.
//! 5. [`session`] and [`config`]: wiring used by the `shadowfp` binary.
//! 6. [`ui`]: ratatui report viewer; not part of the stable library API.

pub mod analysis;
pub mod config;
pub mod debuginfo;
pub mod interpreter;
pub mod memory;
pub mod session;
pub mod trace;
pub mod ui;
