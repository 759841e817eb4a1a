//! Precision blame analysis
//!
//! Every floating value carries a [`BlameShadow`]: the id of the instruction that
//! produced it, its value evaluated in `f64` ("high") and in `f32` ("low"). For each
//! floating binary operation and each precision level above native, the analysis
//! searches the operand precision pair that reproduces the result at that level and
//! folds the finding into the result's [`BlameSummary`].
//!
//! # Search order
//!
//! Pairs are tried with the left precision in the outer loop and the right precision
//! in the inner loop, both ascending. The first pair found wins, so among equally
//! good explanations the one with the lowest left precision, then the lowest right
//! precision, is reported.
//!
//! # Report
//!
//! At the end of the run [`BlameReport::build`] walks the summary of the point of
//! interest (the last floating operation unless configured) at the requested
//! precision.

pub mod precision;
pub mod report;
pub mod summary;

pub use precision::Precision;
pub use report::{BlameReport, ReportEntry};
pub use summary::{BlameNode, BlameSummary, NodeId};

use super::{Analysis, FloatOp};
use crate::debuginfo::DebugInfoMap;
use crate::interpreter::errors::{fatal, ShadowError};
use crate::interpreter::operand::{BinOp, Iid, Operand};
use crate::interpreter::state::ExecutionState;
use precision::same_value;
use std::any::Any;
use tracing::{debug, info};

/// Dual-precision shadow of a floating value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlameShadow {
    pub id: Iid,
    pub high: f64,
    pub low: f32,
}

impl BlameShadow {
    /// Shadow of a value with no history: exact at its own precision
    pub fn exact(id: Iid, value: f64) -> Self {
        BlameShadow {
            id,
            high: value,
            low: value as f32,
        }
    }

    /// The operand value used when it is evaluated at `precision`
    pub fn at(&self, precision: Precision) -> f64 {
        match precision {
            Precision::Float => self.low as f64,
            p => p.truncate(self.high),
        }
    }
}

pub fn eval_high(op: BinOp, l: f64, r: f64) -> Option<f64> {
    match op {
        BinOp::FAdd => Some(l + r),
        BinOp::FSub => Some(l - r),
        BinOp::FMul => Some(l * r),
        BinOp::FDiv => Some(l / r),
        _ => None,
    }
}

pub fn eval_low(op: BinOp, l: f32, r: f32) -> Option<f32> {
    match op {
        BinOp::FAdd => Some(l + r),
        BinOp::FSub => Some(l - r),
        BinOp::FMul => Some(l * r),
        BinOp::FDiv => Some(l / r),
        _ => None,
    }
}

fn unsupported(op: BinOp) -> ShadowError {
    fatal!(ShadowError::Unimplemented(op.name()))
}

/// Blame node of the result `iid` at `precision`, given the operand shadows and
/// their summaries
pub fn compute_blame(
    iid: Iid,
    op: BinOp,
    left: &BlameShadow,
    right: &BlameShadow,
    left_nodes: &[NodeId; Precision::COUNT],
    right_nodes: &[NodeId; Precision::COUNT],
    precision: Precision,
) -> Result<BlameNode, ShadowError> {
    let high = eval_high(op, left.high, right.high).ok_or_else(|| unsupported(op))?;
    let val = precision.truncate(high);
    let require_higher_precision = !same_value(val, val as f32 as f64);

    for i in Precision::ALL {
        let l = left.at(i);
        for j in Precision::ALL {
            let r = right.at(j);
            let candidate = eval_high(op, l, r).ok_or_else(|| unsupported(op))?;
            if !precision.equal_within(val, candidate) {
                continue;
            }
            let native = eval_low(op, l as f32, r as f32).ok_or_else(|| unsupported(op))?;
            return Ok(BlameNode {
                iid,
                precision,
                require_higher_precision,
                require_higher_precision_operator: !precision.equal_within(val, native as f64),
                children: vec![left_nodes[i.index()], right_nodes[j.index()]],
            });
        }
    }

    Err(fatal!(ShadowError::BlameNotFound {
        iid,
        bits: precision.bits()
    }))
}

/// Report configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlameConfig {
    /// Root of the report; the last floating operation when `None`
    pub point_of_interest: Option<Iid>,
    pub precision: Precision,
}

impl Default for BlameConfig {
    fn default() -> Self {
        BlameConfig {
            point_of_interest: None,
            precision: Precision::Double,
        }
    }
}

/// The precision blame analysis
#[derive(Debug, Default)]
pub struct BlameAnalysis {
    config: BlameConfig,
    debug_info: DebugInfoMap,
    summary: BlameSummary,
    last_iid: Option<Iid>,
    operations: u64,
    report: Option<BlameReport>,
}

impl BlameAnalysis {
    pub fn new(config: BlameConfig, debug_info: DebugInfoMap) -> Self {
        BlameAnalysis {
            config,
            debug_info,
            ..BlameAnalysis::default()
        }
    }

    pub fn summary(&self) -> &BlameSummary {
        &self.summary
    }

    /// The most recent floating operation
    pub fn last_iid(&self) -> Option<Iid> {
        self.last_iid
    }

    pub fn report(&self) -> Option<&BlameReport> {
        self.report.as_ref()
    }

    pub fn debug_info(&self) -> &DebugInfoMap {
        &self.debug_info
    }

    /// The shadow of an operand, materialized from its concrete value when the
    /// operand carries none
    pub fn shadow_of(state: &ExecutionState, operand: &Operand) -> Result<BlameShadow, ShadowError> {
        if operand.is_constant() {
            let value = f64::from_bits(operand.value as u64);
            return Ok(BlameShadow::exact(operand.iid, value));
        }
        let cell = state.cell(operand.scope, operand.slot())?;
        let shadow = cell
            .shadow
            .as_ref()
            .and_then(|s| s.downcast_ref::<BlameShadow>());
        Ok(match shadow {
            Some(s) => *s,
            None => BlameShadow::exact(operand.iid, cell.as_flp()),
        })
    }

    /// Build the report for the configured root and precision
    pub fn build_report(&self) -> Result<Option<BlameReport>, ShadowError> {
        let Some(root) = self.config.point_of_interest.or(self.last_iid) else {
            return Ok(None);
        };
        BlameReport::build(&self.summary, &self.debug_info, root, self.config.precision).map(Some)
    }
}

impl Analysis for BlameAnalysis {
    fn name(&self) -> &'static str {
        "blame"
    }

    fn pre_analysis(&mut self) {
        debug!(
            precision = self.config.precision.bits(),
            locations = self.debug_info.len(),
            "blame analysis ready"
        );
    }

    fn post_fbinop(&mut self, state: &mut ExecutionState, event: &FloatOp) -> Result<(), ShadowError> {
        let left = Self::shadow_of(state, &event.left)?;
        let right = Self::shadow_of(state, &event.right)?;
        let high = eval_high(event.op, left.high, right.high).ok_or_else(|| unsupported(event.op))?;
        let low = eval_low(event.op, left.low, right.low).ok_or_else(|| unsupported(event.op))?;

        let left_nodes = self.summary.ensure_leaf(left.id);
        let right_nodes = self.summary.ensure_leaf(right.id);
        let result = self.summary.ensure_result(
            event.iid,
            left_nodes[Precision::Float.index()],
            right_nodes[Precision::Float.index()],
        );
        for precision in Precision::ALL.into_iter().skip(1) {
            let node = compute_blame(
                event.iid,
                event.op,
                &left,
                &right,
                &left_nodes,
                &right_nodes,
                precision,
            )?;
            self.summary.merge(result[precision.index()], &node)?;
        }

        state.register_mut(event.dest)?.shadow = Some(Box::new(BlameShadow {
            id: event.iid,
            high,
            low,
        }));
        self.last_iid = Some(event.iid);
        self.operations += 1;
        Ok(())
    }

    fn post_analysis(&mut self) -> Result<(), ShadowError> {
        info!(
            operations = self.operations,
            summaries = self.summary.summary_count(),
            nodes = self.summary.node_count(),
            "blame analysis finished"
        );
        self.report = self.build_report()?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
