// Replaying recorded traces through a session

use shadowfp::analysis::blame::BlameConfig;
use shadowfp::config::Config;
use shadowfp::debuginfo::{DebugInfoError, DebugInfoMap, DebugLocation};
use shadowfp::interpreter::errors::ShadowError;
use shadowfp::session::Session;
use shadowfp::trace::{self, parse_trace, TraceError};
use std::fs;

const ADD_CALL: &str = r#"
# double add(double a, double b) { return a + b; }
# double r = add(0.1, 0.2);
create_global_symbol_table size=0
create_stack_frame size=4
push_stack value=f64:0.1@1
push_stack value=f64:0.2@2
call iid=30 kind=f64 dest=2
create_stack_frame size=3
binop iid=20 op=fadd left=f64:L0@1 right=f64:L1@2 dest=2
return_ iid=21 value=f64:L2@20
after_call iid=30 kind=f64 concrete=0.30000000000000004
"#;

fn debug_info() -> DebugInfoMap {
    let mut map = DebugInfoMap::new();
    map.insert(
        20,
        DebugLocation {
            file: "add.c".to_string(),
            line: 1,
            column: 44,
        },
    );
    map
}

#[test]
fn test_replay_reports_the_call() {
    let entries = parse_trace(ADD_CALL).expect("trace parses");
    assert_eq!(entries.len(), 9);
    assert_eq!(entries[0].line, 4);

    let mut session = Session::new(BlameConfig::default(), debug_info(), false);
    let report = session.run(&entries).unwrap().expect("a report");

    assert_eq!(report.root, 20);
    assert!(report.entries[0].is_flagged());
    let text = report.to_string();
    assert_eq!(
        text.lines().next(),
        Some("Default starting point: Function add.c, Line 1, Column 44, IID 20")
    );
    assert!(text.contains("Function add.c, Line 1, Column 44, HigherPrecision: 1"));

    let result = session.interpreter().register(2).unwrap();
    assert_eq!(result.as_flp(), 0.1 + 0.2);
}

#[test]
fn test_replay_stops_at_the_failing_line() {
    let text = "\
create_stack_frame size=2
allocax iid=1 kind=i32 dest=0 address=0x100
store iid=2 ptr=L0 src=i32:5 concrete=6
branch2 iid=3
";
    let entries = parse_trace(text).unwrap();
    let mut session = Session::new(BlameConfig::default(), DebugInfoMap::new(), true);
    let err = session.run(&entries).unwrap_err();

    assert!(matches!(
        err.shadow_error(),
        Some(ShadowError::StoreMismatch { iid: 2, .. })
    ));
    assert!(err.to_string().starts_with("line 3: store mismatch"));
    // Nothing after the failure was dispatched
    assert_eq!(session.interpreter().callbacks(), 3);
}

#[test]
fn test_unmodeled_callbacks_replay_as_fatal() {
    let entries = parse_trace("create_stack_frame size=1\nfence iid=9\n").unwrap();
    let mut session = Session::new(BlameConfig::default(), DebugInfoMap::new(), false);
    let err = session.run(&entries).unwrap_err();
    assert_eq!(
        err.shadow_error(),
        Some(&ShadowError::Unimplemented("fence"))
    );
}

#[test]
fn test_oversized_frame_is_fatal_on_replay() {
    let entries = parse_trace("create_stack_frame size=4000000000\n").unwrap();
    let mut session = Session::new(BlameConfig::default(), DebugInfoMap::new(), false);
    let err = session.run(&entries).unwrap_err();
    assert!(matches!(
        err.shadow_error(),
        Some(ShadowError::AllocationTooLarge {
            operation: "create_stack_frame",
            cells: 4_000_000_000
        })
    ));
}

#[test]
fn test_parse_errors_carry_line_numbers() {
    let err = parse_trace("create_stack_frame size=1\n\nfrobnicate iid=1\n").unwrap_err();
    assert!(matches!(
        err,
        TraceError::UnknownCallback { line: 3, ref name } if name == "frobnicate"
    ));

    let err = parse_trace("load iid=1 kind=f32 src=L0 dest=1").unwrap_err();
    assert!(matches!(
        err,
        TraceError::MissingField { line: 1, field: "concrete" }
    ));

    let err = parse_trace("store iid=1 ptr=L0 src=f32:L1 concrete").unwrap_err();
    assert!(matches!(err, TraceError::Malformed { line: 1, .. }));
}

#[test]
fn test_debug_table_round_trips_through_a_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("debug.bin");
    let mut bytes = Vec::new();
    debug_info().write_to(&mut bytes).unwrap();
    fs::write(&path, &bytes).unwrap();

    let loaded = DebugInfoMap::load(&path).unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded.get(20).map(|l| l.column), Some(44));

    fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();
    assert!(matches!(
        DebugInfoMap::load(&path),
        Err(DebugInfoError::Truncated { records: 0, .. })
    ));
    assert!(matches!(
        DebugInfoMap::load(&dir.path().join("missing.bin")),
        Err(DebugInfoError::Io { .. })
    ));
}

#[test]
fn test_session_from_command_line() {
    let dir = tempfile::tempdir().expect("temp dir");
    let trace_path = dir.path().join("add.trace");
    let debug_path = dir.path().join("add-debug.bin");
    fs::write(&trace_path, ADD_CALL).unwrap();
    let mut bytes = Vec::new();
    debug_info().write_to(&mut bytes).unwrap();
    fs::write(&debug_path, bytes).unwrap();

    let config = Config::from_args([
        trace_path.to_string_lossy().into_owned(),
        "--debug-info".to_string(),
        debug_path.to_string_lossy().into_owned(),
        "--precision".to_string(),
        "23".to_string(),
    ])
    .unwrap();

    let entries = trace::load(&config.trace).unwrap();
    let mut session = Session::from_config(&config).unwrap();
    let report = session.run(&entries).unwrap().unwrap();
    assert_eq!(report.precision.bits(), 23);
    assert_eq!(session.debug_info().len(), 1);
    assert!(report.to_string().contains("Default precision: 23"));
}
