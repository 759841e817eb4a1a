//! Blame summaries
//!
//! Every instruction id owns one [`BlameNode`] per precision level. Nodes live in an
//! arena and are addressed by [`NodeId`]; a node's children are the operand nodes
//! (left, then right) that explain its value at its precision.
//!
//! A summary is a monotone accumulator over every dynamic execution of its
//! instruction: [`BlameSummary::merge`] only ever raises child precisions and sets
//! flags.

use super::precision::Precision;
use crate::interpreter::errors::{ensure, ShadowError};
use crate::interpreter::operand::Iid;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

/// Blame information for one value at one precision
#[derive(Debug, Clone, PartialEq)]
pub struct BlameNode {
    pub iid: Iid,
    pub precision: Precision,
    /// The value at this precision is not representable at native precision
    pub require_higher_precision: bool,
    /// The operator evaluated at native precision does not reproduce the value
    pub require_higher_precision_operator: bool,
    pub children: Vec<NodeId>,
}

impl BlameNode {
    pub fn leaf(iid: Iid, precision: Precision) -> Self {
        BlameNode {
            iid,
            precision,
            require_higher_precision: false,
            require_higher_precision_operator: false,
            children: Vec::new(),
        }
    }

    pub fn is_flagged(&self) -> bool {
        self.require_higher_precision || self.require_higher_precision_operator
    }
}

/// The node arena plus the per-instruction summaries
#[derive(Debug, Default)]
pub struct BlameSummary {
    nodes: Vec<BlameNode>,
    table: FxHashMap<Iid, [NodeId; Precision::COUNT]>,
}

impl BlameSummary {
    pub fn new() -> Self {
        BlameSummary::default()
    }

    pub fn node(&self, id: NodeId) -> &BlameNode {
        &self.nodes[id.0 as usize]
    }

    /// Summary nodes of `iid`, one per precision level
    pub fn get(&self, iid: Iid) -> Option<&[NodeId; Precision::COUNT]> {
        self.table.get(&iid)
    }

    /// Summary node of `iid` at `precision`
    pub fn at(&self, iid: Iid, precision: Precision) -> Option<NodeId> {
        self.get(iid).map(|nodes| nodes[precision.index()])
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn summary_count(&self) -> usize {
        self.table.len()
    }

    fn push(&mut self, node: BlameNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Summary of an operand value, created with childless nodes when `iid` has
    /// not been seen
    pub fn ensure_leaf(&mut self, iid: Iid) -> [NodeId; Precision::COUNT] {
        if let Some(nodes) = self.table.get(&iid) {
            return *nodes;
        }
        let nodes = Precision::ALL.map(|p| self.push(BlameNode::leaf(iid, p)));
        self.table.insert(iid, nodes);
        nodes
    }

    /// Summary of a floating result. A fresh summary has a childless native node;
    /// every wider node starts out blaming the native nodes of both operands.
    pub fn ensure_result(&mut self, iid: Iid, left: NodeId, right: NodeId) -> [NodeId; Precision::COUNT] {
        if let Some(nodes) = self.table.get(&iid) {
            return *nodes;
        }
        let nodes = Precision::ALL.map(|p| {
            let mut node = BlameNode::leaf(iid, p);
            if p != Precision::Float {
                node.children = vec![left, right];
            }
            self.push(node)
        });
        self.table.insert(iid, nodes);
        nodes
    }

    /// Fold `update` into the node `target`. For each child position the child of
    /// higher precision is kept; flags are or-ed.
    pub fn merge(&mut self, target: NodeId, update: &BlameNode) -> Result<(), ShadowError> {
        let current = self.node(target);
        ensure!(
            current.iid == update.iid
                && current.precision == update.precision
                && current.children.len() == update.children.len(),
            ShadowError::BlameMergeMismatch { iid: update.iid }
        );

        let children: Vec<NodeId> = current
            .children
            .iter()
            .zip(&update.children)
            .map(|(&kept, &candidate)| {
                if self.node(candidate).precision > self.node(kept).precision {
                    candidate
                } else {
                    kept
                }
            })
            .collect();

        let node = &mut self.nodes[target.0 as usize];
        node.children = children;
        node.require_higher_precision |= update.require_higher_precision;
        node.require_higher_precision_operator |= update.require_higher_precision_operator;
        Ok(())
    }
}
