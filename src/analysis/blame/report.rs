//! Blame report
//!
//! The report is a breadth-first walk of the blame graph below one summary node.
//! Each node is visited once, however many parents reach it.

use super::precision::Precision;
use super::summary::{BlameSummary, NodeId};
use crate::debuginfo::{DebugInfoMap, DebugLocation};
use crate::interpreter::errors::{fatal, ShadowError};
use crate::interpreter::operand::Iid;
use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use std::fmt;

/// One visited node
#[derive(Debug, Clone, PartialEq)]
pub struct ReportEntry {
    pub iid: Iid,
    pub precision: Precision,
    pub require_higher_precision: bool,
    pub require_higher_precision_operator: bool,
    /// Ids of the blamed operands, left then right
    pub children: Vec<(Iid, Precision)>,
    pub location: Option<DebugLocation>,
}

impl ReportEntry {
    pub fn is_flagged(&self) -> bool {
        self.require_higher_precision || self.require_higher_precision_operator
    }

    /// Whether the entry appears in the printed report
    pub fn is_reported(&self) -> bool {
        self.is_flagged() && self.location.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlameReport {
    pub root: Iid,
    pub precision: Precision,
    pub root_location: Option<DebugLocation>,
    /// Every visited node in breadth-first order
    pub entries: Vec<ReportEntry>,
}

impl BlameReport {
    /// Walk the blame graph below the summary of `root` at `precision`
    pub fn build(
        summary: &BlameSummary,
        debug_info: &DebugInfoMap,
        root: Iid,
        precision: Precision,
    ) -> Result<Self, ShadowError> {
        let start = summary
            .at(root, precision)
            .ok_or_else(|| fatal!(ShadowError::UnknownRoot { iid: root }))?;

        let mut visited: FxHashSet<NodeId> = FxHashSet::default();
        let mut queue = VecDeque::from([start]);
        visited.insert(start);
        let mut entries = Vec::new();

        while let Some(id) = queue.pop_front() {
            let node = summary.node(id);
            for &child in &node.children {
                if visited.insert(child) {
                    queue.push_back(child);
                }
            }
            entries.push(ReportEntry {
                iid: node.iid,
                precision: node.precision,
                require_higher_precision: node.require_higher_precision,
                require_higher_precision_operator: node.require_higher_precision_operator,
                children: node
                    .children
                    .iter()
                    .map(|&c| {
                        let child = summary.node(c);
                        (child.iid, child.precision)
                    })
                    .collect(),
                location: debug_info.get(node.iid).cloned(),
            });
        }

        Ok(BlameReport {
            root,
            precision,
            root_location: debug_info.get(root).cloned(),
            entries,
        })
    }

    pub fn reported(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(|e| e.is_reported())
    }
}

impl fmt::Display for BlameReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.root_location {
            Some(loc) => writeln!(f, "Default starting point: {}, IID {}", loc, self.root)?,
            None => writeln!(f, "Default starting point: IID {}", self.root)?,
        }
        writeln!(f, "Default precision: {}", self.precision.bits())?;
        for entry in self.reported() {
            if let Some(loc) = &entry.location {
                writeln!(
                    f,
                    "{}, HigherPrecision: {}, HigherPrecisionOperator: {}",
                    loc,
                    entry.require_higher_precision as u8,
                    entry.require_higher_precision_operator as u8
                )?;
            }
        }
        Ok(())
    }
}
