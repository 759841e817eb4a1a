//! The callback vocabulary as data

use crate::interpreter::operand::{
    BinOp, BitOp, CastOp, FloatPredicate, Iid, IntPredicate, Operand,
};
use crate::memory::value::Kind;

/// One recorded callback with its arguments
#[derive(Debug, Clone, PartialEq)]
pub enum Callback {
    CreateGlobalSymbolTable { size: usize },
    CreateGlobal { slot: usize, address: i64, init: Operand },
    CreateStackFrame { size: usize },
    RecordBlockId { id: i64 },

    Allocax { iid: Iid, kind: Kind, dest: usize, address: i64 },
    AllocaxArray { iid: Iid, kind: Kind, count: usize, dest: usize, address: i64 },
    AllocaxStruct { iid: Iid, fields: usize, dest: usize, address: i64 },
    CallMalloc { iid: Iid, kind: Kind, bits: usize, dest: usize, address: i64 },

    Load { iid: Iid, kind: Kind, src: Operand, dest: usize, concrete: i64 },
    LoadStruct { iid: Iid, src: Operand, dest: usize },
    Store { iid: Iid, ptr: Operand, src: Operand, concrete: i64 },
    ExtractValue { iid: Iid, aggregate: Operand, dest: usize },

    BinOp { iid: Iid, op: BinOp, left: Operand, right: Operand, dest: usize },
    Bitwise { iid: Iid, op: BitOp, left: Operand, right: Operand, dest: usize },
    CastOp { iid: Iid, op: CastOp, src: Operand, to: Kind, dest: usize },
    ICmp { iid: Iid, pred: IntPredicate, left: Operand, right: Operand, dest: usize },
    FCmp { iid: Iid, pred: FloatPredicate, left: Operand, right: Operand, dest: usize },

    GetElementPtr { iid: Iid, base: Operand, index: Operand, kind: Kind, bits: usize, dest: usize },
    GetElementPtrArray { iid: Iid, base: Operand, kind: Kind, size: usize, dest: usize },
    GetElementPtrStruct { iid: Iid, base: Operand, dest: usize },

    PhiNode { iid: Iid, dest: usize },
    Select { iid: Iid, cond: Operand, if_true: Operand, if_false: Operand, dest: usize },
    Branch { iid: Iid, cond: Operand, taken: bool },
    Branch2 { iid: Iid },
    IndirectBr { iid: Iid },
    Switch { iid: Iid, cond: Operand, concrete: i64 },
    Unreachable { iid: Iid },

    Call { iid: Iid, kind: Kind, dest: usize },
    AfterCall { iid: Iid, kind: Kind, concrete: i64 },
    AfterVoidCall { iid: Iid },
    AfterStructCall { iid: Iid },
    Return { iid: Iid, value: Operand },
    Return2 { iid: Iid },
    ReturnStruct { iid: Iid, value: Operand },

    PushStack { value: Operand },
    PushReturnStruct { value: Operand },
    PushStructType { kind: Kind },
    PushStructElementSize { size: usize },
    PushGetElementPtrInx { index: Operand },
    PushGetElementPtrInx5 { indices: Vec<Option<Operand>> },
    PushArraySize { size: usize },
    PushArraySize5 { sizes: Vec<i64> },
    PushPhiNodeConstantValue { value: Operand, block: i64 },
    PushPhiNodeValue { slot: usize, block: i64 },

    /// Instructions that are recognized but not modeled
    Unmodeled { iid: Iid, name: &'static str },
}

/// Names of the recognized but unmodeled instructions
pub const UNMODELED: [&str; 11] = [
    "extractelement",
    "insertelement",
    "shufflevector",
    "insertvalue",
    "fence",
    "cmpxchg",
    "atomicrmw",
    "invoke",
    "resume",
    "vaarg",
    "landingpad",
];

impl Callback {
    /// Callback name as written in a trace
    pub fn name(&self) -> &'static str {
        match self {
            Callback::CreateGlobalSymbolTable { .. } => "create_global_symbol_table",
            Callback::CreateGlobal { .. } => "create_global",
            Callback::CreateStackFrame { .. } => "create_stack_frame",
            Callback::RecordBlockId { .. } => "record_block_id",
            Callback::Allocax { .. } => "allocax",
            Callback::AllocaxArray { .. } => "allocax_array",
            Callback::AllocaxStruct { .. } => "allocax_struct",
            Callback::CallMalloc { .. } => "call_malloc",
            Callback::Load { .. } => "load",
            Callback::LoadStruct { .. } => "load_struct",
            Callback::Store { .. } => "store",
            Callback::ExtractValue { .. } => "extractvalue",
            Callback::BinOp { .. } => "binop",
            Callback::Bitwise { .. } => "bitwise",
            Callback::CastOp { .. } => "castop",
            Callback::ICmp { .. } => "icmp",
            Callback::FCmp { .. } => "fcmp",
            Callback::GetElementPtr { .. } => "getelementptr",
            Callback::GetElementPtrArray { .. } => "getelementptr_array",
            Callback::GetElementPtrStruct { .. } => "getelementptr_struct",
            Callback::PhiNode { .. } => "phinode",
            Callback::Select { .. } => "select",
            Callback::Branch { .. } => "branch",
            Callback::Branch2 { .. } => "branch2",
            Callback::IndirectBr { .. } => "indirectbr",
            Callback::Switch { .. } => "switch_",
            Callback::Unreachable { .. } => "unreachable",
            Callback::Call { .. } => "call",
            Callback::AfterCall { .. } => "after_call",
            Callback::AfterVoidCall { .. } => "after_void_call",
            Callback::AfterStructCall { .. } => "after_struct_call",
            Callback::Return { .. } => "return_",
            Callback::Return2 { .. } => "return2_",
            Callback::ReturnStruct { .. } => "return_struct_",
            Callback::PushStack { .. } => "push_stack",
            Callback::PushReturnStruct { .. } => "push_return_struct",
            Callback::PushStructType { .. } => "push_struct_type",
            Callback::PushStructElementSize { .. } => "push_struct_element_size",
            Callback::PushGetElementPtrInx { .. } => "push_getelementptr_inx",
            Callback::PushGetElementPtrInx5 { .. } => "push_getelementptr_inx5",
            Callback::PushArraySize { .. } => "push_array_size",
            Callback::PushArraySize5 { .. } => "push_array_size5",
            Callback::PushPhiNodeConstantValue { .. } => "push_phinode_constant_value",
            Callback::PushPhiNodeValue { .. } => "push_phinode_value",
            Callback::Unmodeled { name, .. } => *name,
        }
    }
}
