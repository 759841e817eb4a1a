//! Trace text parser
//!
//! Each non-empty line is `name key=value ...`; `#` starts a comment. Operands are
//! written `<kind>:L<slot>` (register), `<kind>:G<slot>` (global) or
//! `<kind>:<literal>` (constant), each optionally followed by `@<iid>`. The kind of a
//! register or global may be left out for pointers. Integer literals may be decimal
//! or `0x` hex; float literals are decimal and may be `NaN` or `inf`.
//!
//! ```text
//! store iid=4 ptr=L0 src=f32:L1@3 concrete=1.3
//! ```

use super::callback::{Callback, UNMODELED};
use super::TraceError;
use crate::interpreter::operand::{
    BinOp, BitOp, CastOp, FloatPredicate, Iid, IntPredicate, Operand,
};
use crate::memory::value::Kind;
use rustc_hash::FxHashMap;

/// A parsed callback and the trace line it came from
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEntry {
    pub line: usize,
    pub callback: Callback,
}

/// Parse a whole trace
pub fn parse_trace(text: &str) -> Result<Vec<TraceEntry>, TraceError> {
    let mut entries = Vec::new();
    for (n, raw) in text.lines().enumerate() {
        let line = n + 1;
        let content = raw.split('#').next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }
        let callback = parse_line(line, content)?;
        entries.push(TraceEntry { line, callback });
    }
    Ok(entries)
}

/// Parse one callback line (without comment)
pub fn parse_line(line: usize, content: &str) -> Result<Callback, TraceError> {
    let mut words = content.split_whitespace();
    let name = words.next().unwrap_or("");
    let mut fields = Fields {
        line,
        values: FxHashMap::default(),
    };
    for word in words {
        let (key, value) = word.split_once('=').ok_or_else(|| TraceError::Malformed {
            line,
            text: word.to_string(),
        })?;
        fields.values.insert(key, value);
    }
    let f = &fields;

    let callback = match name {
        "create_global_symbol_table" => Callback::CreateGlobalSymbolTable { size: f.usize("size")? },
        "create_global" => Callback::CreateGlobal {
            slot: f.usize("slot")?,
            address: f.int("address")?,
            init: f.operand("init")?,
        },
        "create_stack_frame" => Callback::CreateStackFrame { size: f.usize("size")? },
        "record_block_id" => Callback::RecordBlockId { id: f.int("id")? },
        "allocax" => Callback::Allocax {
            iid: f.iid()?,
            kind: f.kind("kind")?,
            dest: f.usize("dest")?,
            address: f.int_or("address", 0)?,
        },
        "allocax_array" => Callback::AllocaxArray {
            iid: f.iid()?,
            kind: f.kind("kind")?,
            count: f.usize("count")?,
            dest: f.usize("dest")?,
            address: f.int_or("address", 0)?,
        },
        "allocax_struct" => Callback::AllocaxStruct {
            iid: f.iid()?,
            fields: f.usize("fields")?,
            dest: f.usize("dest")?,
            address: f.int_or("address", 0)?,
        },
        "call_malloc" => Callback::CallMalloc {
            iid: f.iid()?,
            kind: f.kind("kind")?,
            bits: f.usize("bits")?,
            dest: f.usize("dest")?,
            address: f.int_or("address", 0)?,
        },
        "load" => {
            let kind = f.kind("kind")?;
            Callback::Load {
                iid: f.iid()?,
                kind,
                src: f.operand("src")?,
                dest: f.usize("dest")?,
                concrete: f.concrete("concrete", kind)?,
            }
        }
        "load_struct" => Callback::LoadStruct {
            iid: f.iid()?,
            src: f.operand("src")?,
            dest: f.usize("dest")?,
        },
        "store" => {
            let src = f.operand("src")?;
            Callback::Store {
                iid: f.iid()?,
                ptr: f.operand("ptr")?,
                src,
                concrete: f.concrete("concrete", src.kind)?,
            }
        }
        "extractvalue" => Callback::ExtractValue {
            iid: f.iid()?,
            aggregate: f.operand("aggregate")?,
            dest: f.usize("dest")?,
        },
        "binop" => Callback::BinOp {
            iid: f.iid()?,
            op: f.named("op", BinOp::from_name)?,
            left: f.operand("left")?,
            right: f.operand("right")?,
            dest: f.usize("dest")?,
        },
        "bitwise" => Callback::Bitwise {
            iid: f.iid()?,
            op: f.named("op", BitOp::from_name)?,
            left: f.operand("left")?,
            right: f.operand("right")?,
            dest: f.usize("dest")?,
        },
        "castop" => Callback::CastOp {
            iid: f.iid()?,
            op: f.named("op", CastOp::from_name)?,
            src: f.operand("src")?,
            to: f.kind("to")?,
            dest: f.usize("dest")?,
        },
        "icmp" => Callback::ICmp {
            iid: f.iid()?,
            pred: f.named("pred", IntPredicate::from_name)?,
            left: f.operand("left")?,
            right: f.operand("right")?,
            dest: f.usize("dest")?,
        },
        "fcmp" => Callback::FCmp {
            iid: f.iid()?,
            pred: f.named("pred", FloatPredicate::from_name)?,
            left: f.operand("left")?,
            right: f.operand("right")?,
            dest: f.usize("dest")?,
        },
        "getelementptr" => Callback::GetElementPtr {
            iid: f.iid()?,
            base: f.operand("base")?,
            index: f.operand("index")?,
            kind: f.kind("kind")?,
            bits: f.usize("bits")?,
            dest: f.usize("dest")?,
        },
        "getelementptr_array" => Callback::GetElementPtrArray {
            iid: f.iid()?,
            base: f.operand("base")?,
            kind: f.kind("kind")?,
            size: f.usize("size")?,
            dest: f.usize("dest")?,
        },
        "getelementptr_struct" => Callback::GetElementPtrStruct {
            iid: f.iid()?,
            base: f.operand("base")?,
            dest: f.usize("dest")?,
        },
        "phinode" => Callback::PhiNode {
            iid: f.iid()?,
            dest: f.usize("dest")?,
        },
        "select" => Callback::Select {
            iid: f.iid()?,
            cond: f.operand("cond")?,
            if_true: f.operand("true")?,
            if_false: f.operand("false")?,
            dest: f.usize("dest")?,
        },
        "branch" => Callback::Branch {
            iid: f.iid()?,
            cond: f.operand("cond")?,
            taken: f.int("taken")? != 0,
        },
        "branch2" => Callback::Branch2 { iid: f.iid()? },
        "indirectbr" => Callback::IndirectBr { iid: f.iid()? },
        "switch_" => {
            let cond = f.operand("cond")?;
            Callback::Switch {
                iid: f.iid()?,
                cond,
                concrete: f.concrete("concrete", cond.kind)?,
            }
        }
        "unreachable" => Callback::Unreachable { iid: f.iid()? },
        "call" => Callback::Call {
            iid: f.iid()?,
            kind: f.kind("kind")?,
            dest: f.usize_or("dest", 0)?,
        },
        "after_call" => {
            let kind = f.kind("kind")?;
            Callback::AfterCall {
                iid: f.iid()?,
                kind,
                concrete: f.concrete("concrete", kind)?,
            }
        }
        "after_void_call" => Callback::AfterVoidCall { iid: f.iid()? },
        "after_struct_call" => Callback::AfterStructCall { iid: f.iid()? },
        "return_" => Callback::Return {
            iid: f.iid()?,
            value: f.operand("value")?,
        },
        "return2_" => Callback::Return2 { iid: f.iid()? },
        "return_struct_" => Callback::ReturnStruct {
            iid: f.iid()?,
            value: f.operand("value")?,
        },
        "push_stack" => Callback::PushStack { value: f.operand("value")? },
        "push_return_struct" => Callback::PushReturnStruct { value: f.operand("value")? },
        "push_struct_type" => Callback::PushStructType { kind: f.kind("kind")? },
        "push_struct_element_size" => Callback::PushStructElementSize { size: f.usize("size")? },
        "push_getelementptr_inx" => Callback::PushGetElementPtrInx { index: f.operand("index")? },
        "push_getelementptr_inx5" => Callback::PushGetElementPtrInx5 {
            indices: f.list("indices", |s| {
                if s == "-" {
                    Some(None)
                } else {
                    parse_operand(s).map(Some)
                }
            })?,
        },
        "push_array_size" => Callback::PushArraySize { size: f.usize("size")? },
        "push_array_size5" => Callback::PushArraySize5 {
            sizes: f.list("sizes", parse_int)?,
        },
        "push_phinode_constant_value" => Callback::PushPhiNodeConstantValue {
            value: f.operand("value")?,
            block: f.int("block")?,
        },
        "push_phinode_value" => Callback::PushPhiNodeValue {
            slot: f.usize("slot")?,
            block: f.int("block")?,
        },
        other => match UNMODELED.iter().find(|n| **n == other) {
            Some(name) => Callback::Unmodeled {
                iid: f.iid()?,
                name: *name,
            },
            None => {
                return Err(TraceError::UnknownCallback {
                    line,
                    name: other.to_string(),
                })
            }
        },
    };
    Ok(callback)
}

struct Fields<'a> {
    line: usize,
    values: FxHashMap<&'a str, &'a str>,
}

impl<'a> Fields<'a> {
    fn raw(&self, key: &'static str) -> Result<&'a str, TraceError> {
        self.values.get(key).copied().ok_or(TraceError::MissingField {
            line: self.line,
            field: key,
        })
    }

    fn invalid(&self, key: &'static str, value: &str) -> TraceError {
        TraceError::InvalidField {
            line: self.line,
            field: key,
            value: value.to_string(),
        }
    }

    fn parsed<T>(&self, key: &'static str, parse: impl Fn(&str) -> Option<T>) -> Result<T, TraceError> {
        let raw = self.raw(key)?;
        parse(raw).ok_or_else(|| self.invalid(key, raw))
    }

    fn iid(&self) -> Result<Iid, TraceError> {
        match self.values.get("iid") {
            Some(raw) => raw.parse().map_err(|_| self.invalid("iid", raw)),
            None => Ok(0),
        }
    }

    fn int(&self, key: &'static str) -> Result<i64, TraceError> {
        self.parsed(key, parse_int)
    }

    fn int_or(&self, key: &'static str, default: i64) -> Result<i64, TraceError> {
        if self.values.contains_key(key) {
            self.int(key)
        } else {
            Ok(default)
        }
    }

    fn usize(&self, key: &'static str) -> Result<usize, TraceError> {
        self.parsed(key, |s| s.parse().ok())
    }

    fn usize_or(&self, key: &'static str, default: usize) -> Result<usize, TraceError> {
        if self.values.contains_key(key) {
            self.usize(key)
        } else {
            Ok(default)
        }
    }

    fn kind(&self, key: &'static str) -> Result<Kind, TraceError> {
        self.parsed(key, |s| s.parse().ok())
    }

    fn operand(&self, key: &'static str) -> Result<Operand, TraceError> {
        self.parsed(key, parse_operand)
    }

    fn named<T>(&self, key: &'static str, lookup: fn(&str) -> Option<T>) -> Result<T, TraceError> {
        self.parsed(key, lookup)
    }

    /// A concrete payload: float kinds take a float literal, everything else an
    /// integer literal
    fn concrete(&self, key: &'static str, kind: Kind) -> Result<i64, TraceError> {
        self.parsed(key, |s| parse_literal(kind, s))
    }

    fn list<T>(&self, key: &'static str, item: impl Fn(&str) -> Option<T>) -> Result<Vec<T>, TraceError> {
        let raw = self.raw(key)?;
        raw.split(',')
            .map(|s| item(s).ok_or_else(|| self.invalid(key, raw)))
            .collect()
    }
}

pub fn parse_int(s: &str) -> Option<i64> {
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let value = match digits.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16).ok()? as i64,
        None => digits.parse::<i64>().ok()?,
    };
    Some(if negative { value.wrapping_neg() } else { value })
}

/// Raw payload of a literal of `kind`
pub fn parse_literal(kind: Kind, s: &str) -> Option<i64> {
    if kind.is_float() {
        let v: f64 = s.parse().ok()?;
        let v = if kind == Kind::Flp32 { v as f32 as f64 } else { v };
        Some(v.to_bits() as i64)
    } else {
        parse_int(s)
    }
}

/// Parse `[<kind>:]L<slot>`, `[<kind>:]G<slot>` or `<kind>:<literal>`, with an
/// optional `@<iid>`. Register and global operands without a kind are pointers.
pub fn parse_operand(s: &str) -> Option<Operand> {
    let (body, iid) = match s.rsplit_once('@') {
        Some((body, iid)) => (body, iid.parse::<Iid>().ok()?),
        None => (s, 0),
    };
    let (kind, value) = match body.split_once(':') {
        Some((kind, value)) => (kind.parse::<Kind>().ok()?, value),
        None => (Kind::Ptr, body),
    };
    let operand = if let Some(slot) = value.strip_prefix('L') {
        Operand::local(kind, slot.parse().ok()?)
    } else if let Some(slot) = value.strip_prefix('G') {
        Operand::global(kind, slot.parse().ok()?)
    } else if body.contains(':') {
        Operand::constant(kind, parse_literal(kind, value)?)
    } else {
        return None;
    };
    Some(operand.at(iid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::operand::Scope;

    #[test]
    fn operands_parse_with_ids() {
        let op = parse_operand("f32:L3@17").unwrap();
        assert_eq!((op.scope, op.slot(), op.iid), (Scope::Local, 3, 17));
        assert_eq!(op.kind, Kind::Flp32);
        assert_eq!(parse_operand("G2").unwrap().kind, Kind::Ptr);
        let op = parse_operand("f32:1.3").unwrap();
        assert_eq!(f64::from_bits(op.value as u64), 1.3f32 as f64);
        let op = parse_operand("i32:0x10").unwrap();
        assert_eq!(op.value, 16);
        assert_eq!(parse_operand("X1"), None);
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let text = "# header\n\ncreate_stack_frame size=2  # main\n";
        let entries = parse_trace(text).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].line, 3);
        assert_eq!(entries[0].callback, Callback::CreateStackFrame { size: 2 });
    }

    #[test]
    fn missing_fields_name_the_line() {
        let err = parse_trace("create_stack_frame size=1\nload iid=3 kind=i32 dest=0").unwrap_err();
        assert!(matches!(
            err,
            TraceError::MissingField { line: 2, field: "src" }
        ));
    }

    #[test]
    fn unknown_callbacks_are_rejected() {
        assert!(matches!(
            parse_trace("frobnicate iid=1"),
            Err(TraceError::UnknownCallback { line: 1, .. })
        ));
        assert_eq!(
            parse_line(1, "fence iid=4").unwrap(),
            Callback::Unmodeled { iid: 4, name: "fence" }
        );
    }
}
