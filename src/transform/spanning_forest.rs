//! Spanning Forest: keep one spanning tree's worth of edges per connected
//! component, breadth-first or depth-first, discarding every edge not used
//! in the traversal.
//!
//! Grounded on `spanningtreetransform.cpp`. The original seeds one
//! traversal per `ComponentManager`-reported component, rooted at that
//! component's first node; this crate has no standalone component manager,
//! so a traversal is instead seeded from every live node in ascending id
//! order that hasn't yet been visited — since a traversal visits its whole
//! reachable component, this produces exactly the same one-root-per-component
//! behaviour without a separate component-discovery pass.

use std::collections::{HashSet, VecDeque};

use crate::graph::{EdgeId, NodeId};
use crate::transform::{Alert, GraphTransform, TransformConfig, TransformContext};

pub struct SpanningForestTransform {
    depth_first: bool,
}

impl SpanningForestTransform {
    pub fn from_config(config: &TransformConfig) -> Self {
        Self { depth_first: config.parameter_has_value("Traversal Order", "Depth First") }
    }
}

impl GraphTransform for SpanningForestTransform {
    fn apply(&self, ctx: &mut TransformContext) -> Vec<Alert> {
        ctx.set_phase("Spanning Forest");
        ctx.set_progress(-1);

        let node_ids = ctx.graph.node_ids();
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut keepers: HashSet<EdgeId> = HashSet::new();

        for &root in &node_ids {
            if visited.contains(&root) {
                continue;
            }

            let mut frontier: VecDeque<(NodeId, Option<EdgeId>)> = VecDeque::new();
            frontier.push_back((root, None));

            loop {
                let next = if self.depth_first { frontier.pop_back() } else { frontier.pop_front() };
                let Some((node_id, traversed_edge)) = next else { break };

                if visited.contains(&node_id) {
                    continue;
                }
                visited.insert(node_id);

                if let Some(edge_id) = traversed_edge {
                    keepers.insert(edge_id);
                }

                let Some(node) = ctx.graph.node_by_id(node_id) else { continue };
                for &edge_id in node.in_edges.iter().chain(node.out_edges.iter()) {
                    let Some(edge) = ctx.graph.edge_by_id(edge_id) else { continue };
                    let opposite = if edge.source == node_id { edge.target } else { edge.source };
                    if !visited.contains(&opposite) {
                        frontier.push_back((opposite, Some(edge_id)));
                    }
                }
            }
        }

        let to_remove: Vec<EdgeId> = ctx.graph.edge_ids().into_iter().filter(|id| !keepers.contains(id)).collect();
        ctx.graph.remove_edges(&to_remove);
        ctx.set_progress(-1);

        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeRegistry;
    use crate::graph::MutableGraph;

    #[test]
    fn cycle_loses_exactly_one_edge() {
        let mut graph = MutableGraph::new();
        let a = graph.add_node();
        let b = graph.add_node();
        let c = graph.add_node();
        graph.add_edge(a, b).unwrap();
        graph.add_edge(b, c).unwrap();
        graph.add_edge(c, a).unwrap();

        let mut attributes = AttributeRegistry::new();
        let config = crate::transform::parse_transform_config("\"Spanning Forest\"").unwrap();
        let transform = SpanningForestTransform::from_config(&config);
        let mut ctx = TransformContext::new(&mut graph, &mut attributes);
        let alerts = transform.apply(&mut ctx);

        assert!(alerts.is_empty());
        assert_eq!(graph.num_nodes(), 3, "no nodes should be removed");
        assert_eq!(graph.num_edges(), 2, "a spanning tree over 3 nodes has 2 edges");
    }

    #[test]
    fn disjoint_components_each_keep_their_own_tree() {
        let mut graph = MutableGraph::new();
        let a = graph.add_node();
        let b = graph.add_node();
        graph.add_edge(a, b).unwrap();

        let c = graph.add_node();
        let d = graph.add_node();
        graph.add_edge(c, d).unwrap();

        let mut attributes = AttributeRegistry::new();
        let config = crate::transform::parse_transform_config("\"Spanning Forest\"").unwrap();
        let transform = SpanningForestTransform::from_config(&config);
        let mut ctx = TransformContext::new(&mut graph, &mut attributes);
        transform.apply(&mut ctx);

        assert_eq!(graph.num_edges(), 2, "each component's single edge is already a tree");
    }
}
