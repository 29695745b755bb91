//! A minimal JSON/YAML graph snapshot, just enough to drive the CLI's
//! `apply`/`validate` subcommands end to end.
//!
//! Loading/saving a document's actual graph body (CSV, GML, the plugin's
//! native format) is an external-collaborator concern per `spec.md` §1's
//! Non-goals; this is not that — it's a plain node-count-plus-edge-list
//! shape, serialized with `serde`, that exists only so the CLI has
//! something concrete to build a [`MutableGraph`] from.

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::graph::{ElementId, MutableGraph, NodeId};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GraphSnapshot {
    pub node_count: usize,
    pub edges: Vec<(usize, usize)>,
}

impl GraphSnapshot {
    pub fn from_graph(graph: &MutableGraph) -> Self {
        let edges = graph
            .edge_ids()
            .into_iter()
            .filter_map(|id| graph.edge_by_id(id))
            .map(|edge| (edge.source.index(), edge.target.index()))
            .collect();
        Self { node_count: graph.num_nodes(), edges }
    }

    pub fn into_mutable_graph(self) -> Result<MutableGraph, GraphError> {
        let mut graph = MutableGraph::new();
        let nodes: Vec<NodeId> = graph.add_nodes(self.node_count);
        graph.perform_transaction(|g| {
            for (source, target) in &self.edges {
                let &source_id = nodes.get(*source).ok_or(GraphError::NoSuchNode(NodeId::new(*source)))?;
                let &target_id = nodes.get(*target).ok_or(GraphError::NoSuchNode(NodeId::new(*target)))?;
                g.add_edge(source_id, target_id)?;
            }
            Ok::<(), GraphError>(())
        })?;
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_a_snapshot() {
        let mut original = MutableGraph::new();
        let nodes = original.add_nodes(3);
        original.add_edge(nodes[0], nodes[1]).unwrap();
        original.add_edge(nodes[1], nodes[2]).unwrap();

        let snapshot = GraphSnapshot::from_graph(&original);
        assert_eq!(snapshot.node_count, 3);
        assert_eq!(snapshot.edges.len(), 2);

        let rebuilt = snapshot.into_mutable_graph().unwrap();
        assert_eq!(rebuilt.num_nodes(), 3);
        assert_eq!(rebuilt.num_edges(), 2);
    }

    #[test]
    fn rejects_an_out_of_range_edge_endpoint() {
        let snapshot = GraphSnapshot { node_count: 2, edges: vec![(0, 5)] };
        assert!(snapshot.into_mutable_graph().is_err());
    }
}
