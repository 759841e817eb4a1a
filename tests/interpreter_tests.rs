// Integration tests for the shadow interpreter

use proptest::prelude::*;
use shadowfp::analysis::blame::{BlameAnalysis, BlameConfig, BlameShadow};
use shadowfp::debuginfo::DebugInfoMap;
use shadowfp::interpreter::engine::Interpreter;
use shadowfp::interpreter::errors::ShadowError;
use shadowfp::interpreter::operand::{BinOp, IntPredicate, Operand};
use shadowfp::memory::value::Kind;

fn ptr(slot: usize) -> Operand {
    Operand::local(Kind::Ptr, slot)
}

fn bits(v: f64) -> i64 {
    v.to_bits() as i64
}

/// An interpreter inside a `main` frame of `size` registers
fn with_frame(size: usize) -> Interpreter {
    let mut interp = Interpreter::new();
    interp.create_stack_frame(size).expect("frame");
    interp
}

#[test]
fn test_store_then_load() {
    let mut interp = with_frame(4);
    interp.allocax(1, Kind::Flp64, 0, 0x1000).unwrap();
    interp
        .store(2, ptr(0), Operand::flp(Kind::Flp64, 2.5), bits(2.5))
        .unwrap();
    interp
        .load(3, Kind::Flp64, ptr(0), 1, bits(2.5))
        .unwrap();

    assert_eq!(interp.register(1).unwrap().as_flp(), 2.5);
    assert_eq!(interp.deref(0).unwrap().as_flp(), 2.5);
}

#[test]
fn test_load_resyncs_to_the_concrete_value() {
    let mut interp = with_frame(4);
    interp.allocax(1, Kind::Int32, 0, 0x1000).unwrap();
    // Memory holds 0 but the program observed 41
    interp.load(2, Kind::Int32, ptr(0), 1, 41).unwrap();

    assert_eq!(interp.register(1).unwrap().as_int(), 41);
    assert_eq!(interp.deref(0).unwrap().as_int(), 41);
}

#[test]
fn test_store_mismatch_is_fatal() {
    let mut interp = with_frame(2);
    interp.allocax(1, Kind::Int32, 0, 0x1000).unwrap();
    let err = interp
        .store(2, ptr(0), Operand::int(Kind::Int32, 5), 6)
        .unwrap_err();
    assert!(matches!(err, ShadowError::StoreMismatch { iid: 2, .. }));
}

#[test]
fn test_multidimensional_indexing() {
    // int a[2][3]; &a[1][2]
    let mut interp = with_frame(4);
    interp.allocax_array(1, Kind::Int32, 6, 0, 0x2000).unwrap();
    interp.push_array_size(2).unwrap();
    interp.push_array_size(3).unwrap();
    for index in [0, 1, 2] {
        interp
            .push_getelementptr_inx(Operand::int(Kind::Int64, index))
            .unwrap();
    }
    interp
        .getelementptr_array(2, ptr(0), Kind::Int32, 4, 1)
        .unwrap();

    let element = interp.register(1).unwrap();
    assert_eq!(element.offset, 20);
    assert_eq!(element.index, 5);
    assert_eq!(element.address(), 0x2000 + 20);
    assert!(interp.queues().gep_index.is_empty());
    assert!(interp.queues().array_size.is_empty());

    interp
        .store(3, ptr(1), Operand::int(Kind::Int32, 7), 7)
        .unwrap();
    assert_eq!(interp.deref(1).unwrap().as_int(), 7);
}

#[test]
fn test_malloc_of_structs_and_field_access() {
    // struct { int a; double b; } *p = malloc(32); &p[1].b
    let mut interp = with_frame(4);
    interp.push_struct_type(Kind::Int32).unwrap();
    interp.push_struct_type(Kind::Flp64).unwrap();
    interp.push_stack(Operand::int(Kind::Int64, 32)).unwrap();
    interp.call_malloc(1, Kind::Struct, 0, 0, 0x5000).unwrap();

    let id = interp.register(0).unwrap().backing.unwrap();
    assert_eq!(interp.state().memory.len(id), 6);
    assert!(interp.queues().pushed.is_empty());

    interp.push_struct_type(Kind::Int32).unwrap();
    interp.push_struct_type(Kind::Flp64).unwrap();
    interp
        .push_getelementptr_inx(Operand::int(Kind::Int64, 1))
        .unwrap();
    interp
        .push_getelementptr_inx(Operand::int(Kind::Int32, 1))
        .unwrap();
    interp.push_struct_element_size(1).unwrap();
    interp.push_struct_element_size(1).unwrap();
    interp.getelementptr_struct(2, ptr(0), 1).unwrap();

    let field = interp.register(1).unwrap();
    assert_eq!(field.offset, 16);
    assert_eq!(field.index, 3);

    interp
        .store(3, ptr(1), Operand::flp(Kind::Flp64, -0.5), bits(-0.5))
        .unwrap();
    assert_eq!(interp.deref(1).unwrap().as_flp(), -0.5);
    assert_eq!(interp.state().memory.get(id, 3).unwrap().as_flp(), -0.5);
}

#[test]
fn test_pointer_arithmetic_grows_in_both_directions() {
    let mut interp = with_frame(4);
    interp.allocax(1, Kind::Int32, 0, 0x100).unwrap();
    interp
        .store(2, ptr(0), Operand::int(Kind::Int32, 1), 1)
        .unwrap();

    interp
        .getelementptr(3, ptr(0), Operand::int(Kind::Int64, 3), Kind::Int32, 32, 1)
        .unwrap();
    interp
        .store(4, ptr(1), Operand::int(Kind::Int32, 9), 9)
        .unwrap();

    interp
        .getelementptr(5, ptr(0), Operand::int(Kind::Int64, -2), Kind::Int32, 32, 2)
        .unwrap();
    interp
        .store(6, ptr(2), Operand::int(Kind::Int32, 5), 5)
        .unwrap();

    let id = interp.register(0).unwrap().backing.unwrap();
    assert_eq!(interp.state().memory.len(id), 6);
    assert_eq!(interp.state().memory.start(id), -8);

    // Offsets held before the array grew still name the same elements
    assert_eq!(interp.register(1).unwrap().offset, 12);
    assert_eq!(interp.deref(0).unwrap().as_int(), 1);
    assert_eq!(interp.deref(1).unwrap().as_int(), 9);
    assert_eq!(interp.deref(2).unwrap().as_int(), 5);
}

#[test]
fn test_narrow_store_into_a_wide_slot() {
    let mut interp = with_frame(4);
    interp.allocax(1, Kind::Int64, 0, 0x1000).unwrap();
    interp
        .store(2, ptr(0), Operand::int(Kind::Int16, 0x1234), 0x1234)
        .unwrap();
    interp.load(3, Kind::Int16, ptr(0), 1, 0x1234).unwrap();

    assert_eq!(interp.register(1).unwrap().as_int(), 0x1234);
    assert_eq!(interp.deref(0).unwrap().as_int(), 0x1234);
}

#[test]
fn test_packed_field_pointer_survives_growth() {
    // struct { bool a; bool b; int c; } s; bool *pb = &s.b; int *q = (int *)&s - 1;
    let mut interp = with_frame(4);
    for kind in [Kind::Int1, Kind::Int1, Kind::Int32] {
        interp.push_struct_type(kind).unwrap();
    }
    interp.allocax_struct(1, 3, 0, 0x6000).unwrap();

    for kind in [Kind::Int1, Kind::Int1, Kind::Int32] {
        interp.push_struct_type(kind).unwrap();
    }
    interp
        .push_getelementptr_inx(Operand::int(Kind::Int64, 0))
        .unwrap();
    interp
        .push_getelementptr_inx(Operand::int(Kind::Int32, 1))
        .unwrap();
    for _ in 0..3 {
        interp.push_struct_element_size(1).unwrap();
    }
    interp.getelementptr_struct(2, ptr(0), 1).unwrap();
    assert_eq!(interp.register(1).unwrap().offset, 0);
    assert_eq!(interp.register(1).unwrap().bit, 1);

    // Prepending shifts every element index of the struct by one
    interp
        .getelementptr(3, ptr(0), Operand::int(Kind::Int64, -1), Kind::Int32, 32, 2)
        .unwrap();
    let id = interp.register(0).unwrap().backing.unwrap();
    assert_eq!(interp.state().memory.start(id), -4);

    interp
        .store(4, Operand::local(Kind::Ptr, 1), Operand::int(Kind::Int1, 1), 1)
        .unwrap();

    let bools: Vec<(u8, i64)> = interp
        .state()
        .memory
        .cells(id)
        .iter()
        .filter(|c| c.kind == Kind::Int1)
        .map(|c| (c.bit_offset, c.as_int()))
        .collect();
    assert_eq!(bools, vec![(0, 0), (1, 1)]);
    assert_eq!(interp.deref(1).unwrap().bit_offset, 1);
}

#[test]
fn test_oversized_allocations_are_fatal() {
    let mut interp = with_frame(4);
    assert!(matches!(
        interp.create_stack_frame(usize::MAX),
        Err(ShadowError::AllocationTooLarge {
            operation: "create_stack_frame",
            ..
        })
    ));
    assert!(matches!(
        interp.allocax_array(1, Kind::Int32, 1 << 40, 0, 0x1000),
        Err(ShadowError::AllocationTooLarge {
            operation: "allocax_array",
            ..
        })
    ));

    interp.push_stack(Operand::int(Kind::Int64, i64::MAX)).unwrap();
    assert!(matches!(
        interp.call_malloc(2, Kind::Int8, 8, 0, 0x2000),
        Err(ShadowError::AllocationTooLarge {
            operation: "call_malloc",
            ..
        })
    ));

    // Pointer arithmetic far past the allocation
    interp.allocax(3, Kind::Int32, 0, 0x3000).unwrap();
    assert!(matches!(
        interp.getelementptr(4, ptr(0), Operand::int(Kind::Int64, 1 << 40), Kind::Int32, 32, 1),
        Err(ShadowError::AllocationTooLarge {
            operation: "getelementptr",
            ..
        })
    ));
    assert!(matches!(
        interp.getelementptr(5, ptr(0), Operand::int(Kind::Int64, i64::MIN), Kind::Int32, 32, 1),
        Err(ShadowError::AllocationTooLarge { .. })
    ));
    let id = interp.register(0).unwrap().backing.unwrap();
    assert_eq!(interp.state().memory.len(id), 1);
}

#[test]
fn test_phi_resolves_against_the_block_left() {
    let mut interp = with_frame(4);
    interp.record_block_id(1).unwrap();
    interp
        .push_phinode_constant_value(Operand::int(Kind::Int32, 7), 1)
        .unwrap();
    interp
        .push_phinode_constant_value(Operand::int(Kind::Int32, 9), 2)
        .unwrap();
    interp.phinode(10, 0).unwrap();
    assert_eq!(interp.register(0).unwrap().as_int(), 7);

    interp.record_block_id(3).unwrap();
    interp
        .push_phinode_constant_value(Operand::int(Kind::Int32, 1), 1)
        .unwrap();
    interp.push_phinode_value(0, 3).unwrap();
    interp.phinode(11, 1).unwrap();
    assert_eq!(interp.register(1).unwrap().as_int(), 7);
    assert!(interp.queues().phi_constants.is_empty());
}

#[test]
fn test_select_and_branch() {
    let mut interp = with_frame(4);
    interp
        .icmp(
            1,
            IntPredicate::Slt,
            Operand::int(Kind::Int32, 2),
            Operand::int(Kind::Int32, 3),
            0,
        )
        .unwrap();
    interp
        .select(
            2,
            Operand::local(Kind::Int1, 0),
            Operand::int(Kind::Int32, 10),
            Operand::int(Kind::Int32, 20),
            1,
        )
        .unwrap();
    assert_eq!(interp.register(1).unwrap().as_int(), 10);

    interp.branch(3, Operand::local(Kind::Int1, 0), true).unwrap();
    assert_eq!(
        interp.branch(4, Operand::local(Kind::Int1, 0), false),
        Err(ShadowError::BranchDivergence { iid: 4 })
    );
}

#[test]
fn test_unmodeled_instructions_are_fatal() {
    let mut interp = with_frame(2);
    assert_eq!(interp.fence(1), Err(ShadowError::Unimplemented("fence")));
    assert_eq!(
        interp.binop(
            2,
            BinOp::FRem,
            Operand::flp(Kind::Flp64, 5.0),
            Operand::flp(Kind::Flp64, 2.0),
            0,
        ),
        Err(ShadowError::Unimplemented("frem"))
    );
    assert_eq!(
        interp.binop(
            3,
            BinOp::SDiv,
            Operand::int(Kind::Int32, 5),
            Operand::int(Kind::Int32, 0),
            0,
        ),
        Err(ShadowError::DivisionByZero { iid: 3 })
    );
}

#[test]
fn test_float_call_protocol() {
    // float add(float a, float b) { return a + b; }  r = add(0.1f, 0.2f);
    let mut interp = with_frame(4);
    interp.add_analysis(Box::new(BlameAnalysis::new(
        BlameConfig::default(),
        DebugInfoMap::new(),
    )));

    interp.push_stack(Operand::flp(Kind::Flp32, 0.1).at(10)).unwrap();
    interp.push_stack(Operand::flp(Kind::Flp32, 0.2).at(11)).unwrap();
    interp.call(30, Kind::Flp32, 2).unwrap();

    interp.create_stack_frame(3).unwrap();
    interp.record_block_id(1).unwrap();
    interp
        .binop(
            20,
            BinOp::FAdd,
            Operand::local(Kind::Flp32, 0).at(10),
            Operand::local(Kind::Flp32, 1).at(11),
            2,
        )
        .unwrap();
    interp
        .return_(21, Operand::local(Kind::Flp32, 2).at(20))
        .unwrap();

    let expected = ((0.1f32 as f64) + (0.2f32 as f64)) as f32 as f64;
    interp.after_call(30, Kind::Flp32, bits(expected)).unwrap();

    let result = interp.register(2).unwrap();
    assert_eq!(result.as_flp(), expected);
    let shadow = result
        .shadow
        .as_ref()
        .and_then(|s| s.downcast_ref::<BlameShadow>())
        .copied()
        .unwrap();
    assert_eq!(shadow.id, 20);
    assert_eq!(shadow.high, (0.1f32 as f64) + (0.2f32 as f64));

    assert!(interp.queues().caller_var_index.is_empty());
    assert!(interp.queues().recent_block.is_empty());
    assert!(!interp.queues().is_return);
    assert_eq!(interp.state().stack.depth(), 1);

    interp.finish().unwrap();
    let blame = interp.analysis::<BlameAnalysis>().unwrap();
    assert_eq!(blame.last_iid(), Some(20));
    assert_eq!(blame.report().unwrap().root, 20);
}

#[test]
fn test_uninterpreted_callee_takes_the_concrete_result() {
    let mut interp = with_frame(4);
    interp.push_stack(Operand::int(Kind::Int32, 3)).unwrap();
    interp.call(1, Kind::Int32, 0).unwrap();
    interp.after_call(1, Kind::Int32, 99).unwrap();

    assert_eq!(interp.register(0).unwrap().as_int(), 99);
    assert!(interp.queues().call_args.is_empty());
    assert!(interp.queues().recent_block.is_empty());
}

#[test]
fn test_returning_from_main_empties_the_stack() {
    let mut interp = with_frame(1);
    interp.return_(1, Operand::int(Kind::Int32, 0)).unwrap();
    assert!(interp.state().stack.is_empty());
    assert_eq!(
        interp.return2_(2),
        Err(ShadowError::NoStackFrame { operation: "return2_" })
    );
}

const ROUND_TRIP_KINDS: [Kind; 11] = [
    Kind::Int1,
    Kind::Int8,
    Kind::Int16,
    Kind::Int24,
    Kind::Int32,
    Kind::Int64,
    Kind::Ptr,
    Kind::Flp32,
    Kind::Flp64,
    Kind::Flp80X86,
    Kind::Flp128,
];

/// A storable kind and a raw concrete payload for it; floats travel as `f64` bits
fn kind_and_payload() -> impl Strategy<Value = (Kind, i64)> {
    (0..ROUND_TRIP_KINDS.len()).prop_flat_map(|k| {
        let kind = ROUND_TRIP_KINDS[k];
        let payload = if kind.is_float() {
            prop_oneof![Just(f64::NAN), Just(-0.0), any::<f64>(), -1.0e6f64..1.0e6]
                .prop_map(|v| v.to_bits() as i64)
                .boxed()
        } else {
            any::<i64>().boxed()
        };
        (Just(kind), payload)
    })
}

proptest! {
    #[test]
    fn prop_growth_preserves_stored_values(
        writes in prop::collection::vec((-6i64..6, any::<i32>()), 1..12)
    ) {
        let mut interp = with_frame(2);
        interp.allocax(1, Kind::Int32, 0, 0x4000).unwrap();

        let mut model = std::collections::BTreeMap::new();
        for (n, (k, v)) in writes.iter().enumerate() {
            let iid = 10 + 2 * n as u64;
            interp
                .getelementptr(iid, ptr(0), Operand::int(Kind::Int64, *k), Kind::Int32, 32, 1)
                .unwrap();
            interp
                .store(iid + 1, ptr(1), Operand::int(Kind::Int32, *v as i64), *v as i64)
                .unwrap();
            model.insert(*k, *v as i64);
        }

        for (k, v) in model {
            interp
                .getelementptr(1000, ptr(0), Operand::int(Kind::Int64, k), Kind::Int32, 32, 1)
                .unwrap();
            prop_assert_eq!(interp.register(1).unwrap().offset, k * 4);
            prop_assert_eq!(interp.deref(1).unwrap().as_int(), v);
        }
    }

    #[test]
    fn prop_store_then_load_reproduces_the_concrete_value(
        (kind, payload) in kind_and_payload()
    ) {
        let mut interp = with_frame(2);
        interp.allocax(1, kind, 0, 0x7000).unwrap();
        interp.store(2, ptr(0), Operand::constant(kind, payload), payload).unwrap();
        interp.load(3, kind, ptr(0), 1, payload).unwrap();
        prop_assert!(interp.register(1).unwrap().matches_concrete(kind, payload));
        prop_assert!(interp.deref(0).unwrap().matches_concrete(kind, payload));
    }
}
