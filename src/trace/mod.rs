//! Recorded callback streams
//!
//! A trace is the text form of the callback sequence an instrumented run emits, so a
//! run can be analyzed offline:
//! - [`callback`]: the callback vocabulary as data
//! - [`parse`]: the line-oriented text format
//!
//! [`replay`] dispatches parsed entries into an [`Interpreter`] in order.

pub mod callback;
pub mod parse;

pub use callback::Callback;
pub use parse::{parse_trace, TraceEntry};

use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::ShadowError;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("cannot read trace {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("line {line}: unknown callback `{name}`")]
    UnknownCallback { line: usize, name: String },

    #[error("line {line}: missing field `{field}`")]
    MissingField { line: usize, field: &'static str },

    #[error("line {line}: invalid value `{value}` for `{field}`")]
    InvalidField {
        line: usize,
        field: &'static str,
        value: String,
    },

    #[error("line {line}: expected key=value, found `{text}`")]
    Malformed { line: usize, text: String },

    /// The interpreter failed while replaying the entry on `line`
    #[error("line {line}: {source}")]
    Shadow {
        line: usize,
        #[source]
        source: ShadowError,
    },
}

impl TraceError {
    /// The fatal interpreter error behind a replay failure
    pub fn shadow_error(&self) -> Option<&ShadowError> {
        match self {
            TraceError::Shadow { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Read and parse the trace file at `path`
pub fn load(path: &Path) -> Result<Vec<TraceEntry>, TraceError> {
    let text = std::fs::read_to_string(path).map_err(|source| TraceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let entries = parse_trace(&text)?;
    debug!(path = %path.display(), entries = entries.len(), "loaded trace");
    Ok(entries)
}

/// Dispatch `entries` in order, stopping at the first fatal error
pub fn replay(interp: &mut Interpreter, entries: &[TraceEntry]) -> Result<(), TraceError> {
    for entry in entries {
        dispatch(interp, &entry.callback).map_err(|source| TraceError::Shadow {
            line: entry.line,
            source,
        })?;
    }
    Ok(())
}

/// Dispatch one callback
pub fn dispatch(interp: &mut Interpreter, callback: &Callback) -> Result<(), ShadowError> {
    match callback.clone() {
        Callback::CreateGlobalSymbolTable { size } => interp.create_global_symbol_table(size),
        Callback::CreateGlobal {
            slot,
            address,
            init,
        } => interp.create_global(slot, address, init),
        Callback::CreateStackFrame { size } => interp.create_stack_frame(size),
        Callback::RecordBlockId { id } => interp.record_block_id(id),

        Callback::Allocax {
            iid,
            kind,
            dest,
            address,
        } => interp.allocax(iid, kind, dest, address),
        Callback::AllocaxArray {
            iid,
            kind,
            count,
            dest,
            address,
        } => interp.allocax_array(iid, kind, count, dest, address),
        Callback::AllocaxStruct {
            iid,
            fields,
            dest,
            address,
        } => interp.allocax_struct(iid, fields, dest, address),
        Callback::CallMalloc {
            iid,
            kind,
            bits,
            dest,
            address,
        } => interp.call_malloc(iid, kind, bits, dest, address),

        Callback::Load {
            iid,
            kind,
            src,
            dest,
            concrete,
        } => interp.load(iid, kind, src, dest, concrete),
        Callback::LoadStruct { iid, src, dest } => interp.load_struct(iid, src, dest),
        Callback::Store {
            iid,
            ptr,
            src,
            concrete,
        } => interp.store(iid, ptr, src, concrete),
        Callback::ExtractValue {
            iid,
            aggregate,
            dest,
        } => interp.extractvalue(iid, aggregate, dest),

        Callback::BinOp {
            iid,
            op,
            left,
            right,
            dest,
        } => interp.binop(iid, op, left, right, dest),
        Callback::Bitwise {
            iid,
            op,
            left,
            right,
            dest,
        } => interp.bitwise(iid, op, left, right, dest),
        Callback::CastOp {
            iid,
            op,
            src,
            to,
            dest,
        } => interp.castop(iid, op, src, to, dest),
        Callback::ICmp {
            iid,
            pred,
            left,
            right,
            dest,
        } => interp.icmp(iid, pred, left, right, dest),
        Callback::FCmp {
            iid,
            pred,
            left,
            right,
            dest,
        } => interp.fcmp(iid, pred, left, right, dest),

        Callback::GetElementPtr {
            iid,
            base,
            index,
            kind,
            bits,
            dest,
        } => interp.getelementptr(iid, base, index, kind, bits, dest),
        Callback::GetElementPtrArray {
            iid,
            base,
            kind,
            size,
            dest,
        } => interp.getelementptr_array(iid, base, kind, size, dest),
        Callback::GetElementPtrStruct { iid, base, dest } => {
            interp.getelementptr_struct(iid, base, dest)
        }

        Callback::PhiNode { iid, dest } => interp.phinode(iid, dest),
        Callback::Select {
            iid,
            cond,
            if_true,
            if_false,
            dest,
        } => interp.select(iid, cond, if_true, if_false, dest),
        Callback::Branch { iid, cond, taken } => interp.branch(iid, cond, taken),
        Callback::Branch2 { iid } => interp.branch2(iid),
        Callback::IndirectBr { iid } => interp.indirectbr(iid),
        Callback::Switch {
            iid,
            cond,
            concrete,
        } => interp.switch_(iid, cond, concrete),
        Callback::Unreachable { iid } => interp.unreachable(iid),

        Callback::Call { iid, kind, dest } => interp.call(iid, kind, dest),
        Callback::AfterCall {
            iid,
            kind,
            concrete,
        } => interp.after_call(iid, kind, concrete),
        Callback::AfterVoidCall { iid } => interp.after_void_call(iid),
        Callback::AfterStructCall { iid } => interp.after_struct_call(iid),
        Callback::Return { iid, value } => interp.return_(iid, value),
        Callback::Return2 { iid } => interp.return2_(iid),
        Callback::ReturnStruct { iid, value } => interp.return_struct_(iid, value),

        Callback::PushStack { value } => interp.push_stack(value),
        Callback::PushReturnStruct { value } => interp.push_return_struct(value),
        Callback::PushStructType { kind } => interp.push_struct_type(kind),
        Callback::PushStructElementSize { size } => interp.push_struct_element_size(size),
        Callback::PushGetElementPtrInx { index } => interp.push_getelementptr_inx(index),
        Callback::PushGetElementPtrInx5 { indices } => interp.push_getelementptr_inx5(&indices),
        Callback::PushArraySize { size } => interp.push_array_size(size),
        Callback::PushArraySize5 { sizes } => interp.push_array_size5(&sizes),
        Callback::PushPhiNodeConstantValue { value, block } => {
            interp.push_phinode_constant_value(value, block)
        }
        Callback::PushPhiNodeValue { slot, block } => interp.push_phinode_value(slot, block),

        Callback::Unmodeled { iid, name } => match name {
            "extractelement" => interp.extractelement(iid),
            "insertelement" => interp.insertelement(iid),
            "shufflevector" => interp.shufflevector(iid),
            "insertvalue" => interp.insertvalue(iid),
            "fence" => interp.fence(iid),
            "cmpxchg" => interp.cmpxchg(iid),
            "atomicrmw" => interp.atomicrmw(iid),
            "invoke" => interp.invoke(iid),
            "resume" => interp.resume(iid),
            "vaarg" => interp.vaarg(iid),
            _ => interp.landingpad(iid),
        },
    }
}
