//! Leaf Removal / Branch Removal: repeatedly strip degree-≤1 nodes, either a
//! bounded number of passes or until only cycles remain.
//!
//! Grounded on `removeleavestransform.cpp`. Both transforms share one loop:
//! find every current leaf, remove them all, then repeat (each pass can
//! expose new leaves one layer further up a branch). `RemoveLeaves` stops
//! after `"Limit"` passes; `RemoveBranches` is the unlimited variant, run
//! until a pass finds nothing left to remove.

use crate::condition::Literal;
use crate::graph::NodeId;
use crate::transform::{Alert, GraphTransform, TransformConfig, TransformContext};

pub struct RemoveLeavesTransform {
    /// `None` for the unlimited "Remove Branches" variant.
    limit: Option<usize>,
    phase: &'static str,
}

impl RemoveLeavesTransform {
    pub fn from_config(config: &TransformConfig, unlimited: bool) -> Self {
        if unlimited {
            return Self { limit: None, phase: "Branch Removal" };
        }

        let limit = match config.parameter_by_name("Limit").map(|p| &p.value) {
            Some(Literal::Int(v)) => *v as usize,
            Some(Literal::Float(v)) => *v as usize,
            _ => 1,
        };
        Self { limit: Some(limit), phase: "Leaf Removal" }
    }
}

impl GraphTransform for RemoveLeavesTransform {
    fn apply(&self, ctx: &mut TransformContext) -> Vec<Alert> {
        ctx.set_phase(self.phase);

        let mut remaining = self.limit;
        loop {
            if let Some(0) = remaining {
                break;
            }

            let removees: Vec<NodeId> = ctx
                .graph
                .node_ids()
                .into_iter()
                .filter(|&id| ctx.graph.node_by_id(id).map(|n| n.in_edges.len() + n.out_edges.len() <= 1).unwrap_or(false))
                .collect();

            if removees.is_empty() {
                break;
            }

            ctx.graph.remove_nodes(&removees);
            ctx.set_progress(-1);

            if let Some(count) = &mut remaining {
                *count -= 1;
            }
        }

        Vec::new()
    }
}
