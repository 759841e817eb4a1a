// Precision blame over interpreted floating operations

use proptest::prelude::*;
use shadowfp::analysis::blame::{
    compute_blame, BlameAnalysis, BlameConfig, BlameNode, BlameShadow, BlameSummary, Precision,
};
use shadowfp::debuginfo::{DebugInfoMap, DebugLocation};
use shadowfp::interpreter::engine::Interpreter;
use shadowfp::interpreter::errors::ShadowError;
use shadowfp::interpreter::operand::{BinOp, Operand};
use shadowfp::memory::value::Kind;

fn location(line: u32, column: u32) -> DebugLocation {
    DebugLocation {
        file: "main.c".to_string(),
        line,
        column,
    }
}

fn interpreter(config: BlameConfig, debug_info: DebugInfoMap) -> Interpreter {
    let mut interp = Interpreter::new();
    interp.add_analysis(Box::new(BlameAnalysis::new(config, debug_info)));
    interp.create_stack_frame(4).unwrap();
    interp
}

#[test]
fn test_adding_zero_in_a_loop_flags_nothing() {
    // float x = 1.3f; for (...) x = x + 0.0f;
    let mut interp = interpreter(BlameConfig::default(), DebugInfoMap::new());
    interp
        .binop(
            10,
            BinOp::FAdd,
            Operand::flp(Kind::Flp32, 1.3).at(1),
            Operand::flp(Kind::Flp32, 0.0).at(2),
            0,
        )
        .unwrap();
    // One register per dynamic instance, as in SSA form
    for dest in 1..4 {
        interp
            .binop(
                20,
                BinOp::FAdd,
                Operand::local(Kind::Flp32, dest - 1),
                Operand::flp(Kind::Flp32, 0.0).at(2),
                dest,
            )
            .unwrap();
    }
    interp.finish().unwrap();

    let blame = interp.analysis::<BlameAnalysis>().unwrap();
    let report = blame.report().unwrap();
    assert_eq!(report.root, 20);
    assert_eq!(report.precision, Precision::Double);
    assert!(report.entries.iter().all(|e| !e.is_flagged()));
    assert_eq!(report.entries[0].iid, 20);
    assert_eq!(report.reported().count(), 0);
    assert_eq!(interp.register(3).unwrap().as_flp(), 1.3f32 as f64);
}

#[test]
fn test_inexact_double_sum_is_reported() {
    let mut debug_info = DebugInfoMap::new();
    debug_info.insert(30, location(4, 9));
    let mut interp = interpreter(BlameConfig::default(), debug_info);
    interp
        .binop(
            30,
            BinOp::FAdd,
            Operand::flp(Kind::Flp64, 0.1).at(1),
            Operand::flp(Kind::Flp64, 0.2).at(2),
            0,
        )
        .unwrap();
    interp.finish().unwrap();

    let report = interp
        .analysis::<BlameAnalysis>()
        .and_then(|b| b.report())
        .cloned()
        .unwrap();
    let root = &report.entries[0];
    assert!(root.require_higher_precision);
    assert!(root.require_higher_precision_operator);
    assert_eq!(root.children.len(), 2);

    let text = report.to_string();
    assert!(text.starts_with("Default starting point: Function main.c, Line 4, Column 9, IID 30\n"));
    assert!(text.contains("Default precision: 52\n"));
    assert!(text.contains(
        "Function main.c, Line 4, Column 9, HigherPrecision: 1, HigherPrecisionOperator: 1\n"
    ));
}

#[test]
fn test_blame_follows_values_through_memory() {
    // double t = a * b; store t; load t; u = t + c
    let mut interp = interpreter(BlameConfig::default(), DebugInfoMap::new());
    interp.allocax(1, Kind::Flp64, 0, 0x100).unwrap();
    interp
        .binop(
            2,
            BinOp::FMul,
            Operand::flp(Kind::Flp64, 1.1).at(50),
            Operand::flp(Kind::Flp64, 3.0).at(51),
            1,
        )
        .unwrap();
    let product = interp.register(1).unwrap().as_flp();
    interp
        .store(
            3,
            Operand::local(Kind::Ptr, 0),
            Operand::local(Kind::Flp64, 1).at(2),
            product.to_bits() as i64,
        )
        .unwrap();
    interp
        .load(4, Kind::Flp64, Operand::local(Kind::Ptr, 0), 2, product.to_bits() as i64)
        .unwrap();
    interp
        .binop(
            5,
            BinOp::FAdd,
            Operand::local(Kind::Flp64, 2).at(4),
            Operand::flp(Kind::Flp64, 1.0).at(52),
            3,
        )
        .unwrap();
    interp.finish().unwrap();

    let blame = interp.analysis::<BlameAnalysis>().unwrap();
    let report = blame.report().unwrap();
    let iids: Vec<u64> = report.entries.iter().map(|e| e.iid).collect();
    // The loaded operand is still the product's shadow
    assert_eq!(iids[0], 5);
    assert!(iids.contains(&2));
    assert!(report.entries.iter().any(|e| e.children.iter().any(|(iid, _)| *iid == 2)));
}

#[test]
fn test_explicit_root_and_precision() {
    let config = BlameConfig {
        point_of_interest: Some(7),
        precision: Precision::Bits27,
    };
    let mut interp = interpreter(config, DebugInfoMap::new());
    interp
        .binop(
            7,
            BinOp::FDiv,
            Operand::flp(Kind::Flp64, 1.0).at(1),
            Operand::flp(Kind::Flp64, 3.0).at(2),
            0,
        )
        .unwrap();
    interp
        .binop(
            8,
            BinOp::FSub,
            Operand::local(Kind::Flp64, 0),
            Operand::flp(Kind::Flp64, 1.0).at(3),
            1,
        )
        .unwrap();
    interp.finish().unwrap();

    let report = interp
        .analysis::<BlameAnalysis>()
        .and_then(|b| b.report())
        .unwrap();
    assert_eq!(report.root, 7);
    assert_eq!(report.entries[0].precision, Precision::Bits27);
}

#[test]
fn test_unknown_root_is_fatal() {
    let config = BlameConfig {
        point_of_interest: Some(99),
        precision: Precision::Double,
    };
    let mut interp = interpreter(config, DebugInfoMap::new());
    interp
        .binop(
            1,
            BinOp::FAdd,
            Operand::flp(Kind::Flp64, 1.0),
            Operand::flp(Kind::Flp64, 2.0),
            0,
        )
        .unwrap();
    assert_eq!(interp.finish(), Err(ShadowError::UnknownRoot { iid: 99 }));
}

#[test]
fn test_no_floating_operations_means_no_report() {
    let mut interp = interpreter(BlameConfig::default(), DebugInfoMap::new());
    interp.finish().unwrap();
    let blame = interp.analysis::<BlameAnalysis>().unwrap();
    assert!(blame.report().is_none());
    assert_eq!(blame.last_iid(), None);
}

fn arith_op() -> impl Strategy<Value = BinOp> {
    prop_oneof![
        Just(BinOp::FAdd),
        Just(BinOp::FSub),
        Just(BinOp::FMul),
        Just(BinOp::FDiv),
    ]
}

fn precision() -> impl Strategy<Value = Precision> {
    (0..Precision::COUNT).prop_map(|i| Precision::ALL[i])
}

proptest! {
    #[test]
    fn prop_some_operand_pair_always_reproduces_the_result(
        op in arith_op(),
        a in -1.0e6f64..1.0e6,
        b in -1.0e6f64..1.0e6,
        a_low in -1.0e6f32..1.0e6,
        b_low in -1.0e6f32..1.0e6,
        p in precision(),
    ) {
        let mut summary = BlameSummary::new();
        let left = BlameShadow { id: 1, high: a, low: a_low };
        let right = BlameShadow { id: 2, high: b, low: b_low };
        let l = summary.ensure_leaf(1);
        let r = summary.ensure_leaf(2);
        let node = compute_blame(3, op, &left, &right, &l, &r, p);
        prop_assert!(node.is_ok());
        let node = node.unwrap();
        prop_assert_eq!(node.precision, p);
        prop_assert_eq!(node.children.len(), 2);
    }

    #[test]
    fn prop_merge_is_monotone(
        updates in prop::collection::vec((precision(), precision(), any::<bool>(), any::<bool>()), 1..16)
    ) {
        let mut summary = BlameSummary::new();
        let l = summary.ensure_leaf(1);
        let r = summary.ensure_leaf(2);
        let target = summary.ensure_result(3, l[0], r[0])[Precision::Double.index()];

        let mut seen_hp = false;
        let mut seen_op = false;
        let mut floor = (Precision::Float, Precision::Float);
        for (pl, pr, hp, op) in updates {
            let update = BlameNode {
                iid: 3,
                precision: Precision::Double,
                require_higher_precision: hp,
                require_higher_precision_operator: op,
                children: vec![l[pl.index()], r[pr.index()]],
            };
            summary.merge(target, &update).unwrap();
            seen_hp |= hp;
            seen_op |= op;

            let node = summary.node(target);
            let kept = (
                summary.node(node.children[0]).precision,
                summary.node(node.children[1]).precision,
            );
            prop_assert!(kept.0 >= floor.0 && kept.1 >= floor.1);
            prop_assert!(kept.0 >= pl && kept.1 >= pr);
            prop_assert_eq!(node.require_higher_precision, seen_hp);
            prop_assert_eq!(node.require_higher_precision_operator, seen_op);
            floor = kept;
        }
    }
}
