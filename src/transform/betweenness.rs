//! Betweenness centrality: Brandes' algorithm run once per source node,
//! parallelised across nodes with `rayon` and summed into per-node/per-edge
//! totals.
//!
//! Grounded on `betweennesstransform.cpp`. The original threads a BFS/stack
//! pass per node through a thread-pool, accumulating into one
//! `NodeArray`/`EdgeArray` pair per worker thread and summing those at the
//! end; here each `rayon` task instead returns its own contribution vectors
//! and `reduce` does the summing, since `MutableGraph`'s `Rc`-backed
//! registries aren't `Sync` and can't be captured directly inside the
//! parallel closures. Multi-edges between the same two nodes all receive the
//! same per-path weight, matching the unconditional `edgeIdsBetween` sum in
//! the original rather than crediting only the traversed edge.

use std::collections::{HashMap, VecDeque};

use rayon::prelude::*;
use tracing::debug;

use crate::attribute::{Attribute, AttributeFlags};
use crate::graph::{EdgeId, NodeId};
use crate::transform::{Alert, GraphTransform, TransformContext};

pub struct BetweennessTransform;

impl BetweennessTransform {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BetweennessTransform {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only adjacency extracted up front so the Brandes passes can run
/// across `rayon` worker threads without touching the graph's `Rc` internals.
struct Adjacency {
    /// `neighbours[i]` is every `(neighbour_dense_index)` reachable from dense
    /// node `i`, with one entry per incident edge (so a double edge appears
    /// twice, same as the original's `neighboursOf`).
    neighbours: Vec<Vec<usize>>,
    /// `(min_dense, max_dense) -> edge dense indices` between that pair.
    edges_between: HashMap<(usize, usize), Vec<usize>>,
}

fn build_adjacency(ctx: &TransformContext, node_index: &HashMap<NodeId, usize>) -> Adjacency {
    let n = node_index.len();
    let mut neighbours = vec![Vec::new(); n];
    let mut edges_between: HashMap<(usize, usize), Vec<usize>> = HashMap::new();

    for (edge_dense, edge_id) in ctx.graph.edge_ids().into_iter().enumerate() {
        let Some(edge) = ctx.graph.edge_by_id(edge_id) else { continue };
        if edge.is_loop() {
            continue;
        }
        let Some(&a) = node_index.get(&edge.source) else { continue };
        let Some(&b) = node_index.get(&edge.target) else { continue };

        neighbours[a].push(b);
        neighbours[b].push(a);

        let key = if a <= b { (a, b) } else { (b, a) };
        edges_between.entry(key).or_default().push(edge_dense);
    }

    Adjacency { neighbours, edges_between }
}

fn brandes_from_source(source: usize, adjacency: &Adjacency, num_edges: usize) -> (Vec<f64>, Vec<f64>) {
    let n = adjacency.neighbours.len();
    let mut node_contrib = vec![0.0; n];
    let mut edge_contrib = vec![0.0; num_edges];

    let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut sigma = vec![0i64; n];
    let mut distance = vec![-1i64; n];
    let mut delta = vec![0.0; n];

    let mut stack = Vec::new();
    let mut queue = VecDeque::new();

    sigma[source] = 1;
    distance[source] = 0;
    queue.push_back(source);

    while let Some(other) = queue.pop_front() {
        stack.push(other);

        for &neighbour in &adjacency.neighbours[other] {
            if distance[neighbour] < 0 {
                queue.push_back(neighbour);
                distance[neighbour] = distance[other] + 1;
            }

            if distance[neighbour] == distance[other] + 1 {
                sigma[neighbour] += sigma[other];
                predecessors[neighbour].push(other);
            }
        }
    }

    while let Some(other) = stack.pop() {
        for &predecessor in &predecessors[other] {
            let d = (sigma[predecessor] as f64 / sigma[other] as f64) * (1.0 + delta[other]);

            let key = if predecessor <= other { (predecessor, other) } else { (other, predecessor) };
            if let Some(edge_indices) = adjacency.edges_between.get(&key) {
                for &edge_idx in edge_indices {
                    edge_contrib[edge_idx] += d;
                }
            }

            delta[predecessor] += d;
        }

        if other != source {
            node_contrib[other] += delta[other];
        }
    }

    (node_contrib, edge_contrib)
}

impl GraphTransform for BetweennessTransform {
    fn apply(&self, ctx: &mut TransformContext) -> Vec<Alert> {
        ctx.set_phase("Betweenness");
        ctx.set_progress(0);

        if ctx.cancelled() {
            return Vec::new();
        }

        let node_ids = ctx.graph.node_ids();
        let edge_ids = ctx.graph.edge_ids();
        let node_index: HashMap<NodeId, usize> =
            node_ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        let n = node_ids.len();
        let num_edges = edge_ids.len();

        let adjacency = build_adjacency(ctx, &node_index);

        let (node_betweenness, edge_betweenness) = (0..n)
            .into_par_iter()
            .map(|source| brandes_from_source(source, &adjacency, num_edges))
            .reduce(
                || (vec![0.0; n], vec![0.0; num_edges]),
                |mut a, b| {
                    for i in 0..n {
                        a.0[i] += b.0[i];
                    }
                    for i in 0..num_edges {
                        a.1[i] += b.1[i];
                    }
                    a
                },
            );

        ctx.set_progress(-1);

        if ctx.cancelled() {
            return Vec::new();
        }

        debug!(nodes = n, edges = num_edges, "betweenness computed");

        let flags = AttributeFlags { auto_range: true, visualise_by_component: true, ..Default::default() };

        let node_ids_for_domain = node_ids.clone();
        ctx.attributes.insert(
            Attribute::from_float(
                "Node Betweenness",
                move || node_ids_for_domain.clone(),
                move |id: NodeId| Some(node_betweenness[node_index[&id]]),
            )
            .with_description("A node's betweenness is the number of shortest paths that pass through it.")
            .with_flags(flags),
        );

        let edge_index: HashMap<EdgeId, usize> = edge_ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        let edge_ids_for_domain = edge_ids.clone();
        ctx.attributes.insert(
            Attribute::from_float(
                "Edge Betweenness",
                move || edge_ids_for_domain.clone(),
                move |id: EdgeId| Some(edge_betweenness[edge_index[&id]]),
            )
            .with_description("An edge's betweenness is the number of shortest paths that pass through it.")
            .with_flags(flags),
        );

        Vec::new()
    }

    fn default_visualisations(&self) -> Vec<(String, String)> {
        vec![
            ("Node Betweenness".to_string(), "Colour".to_string()),
            ("Edge Betweenness".to_string(), "Colour".to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeRegistry;
    use crate::graph::MutableGraph;

    #[test]
    fn path_graph_concentrates_betweenness_on_the_middle_node() {
        // A - B - C: every shortest path between A and C passes through B.
        let mut graph = MutableGraph::new();
        let a = graph.add_node();
        let b = graph.add_node();
        let c = graph.add_node();
        graph.add_edge(a, b).unwrap();
        graph.add_edge(b, c).unwrap();

        let mut attributes = AttributeRegistry::new();
        let transform = BetweennessTransform::new();
        let mut ctx = TransformContext::new(&mut graph, &mut attributes);
        let alerts = transform.apply(&mut ctx);
        assert!(alerts.is_empty());

        let node_betweenness = attributes.get("Node Betweenness").unwrap();
        assert_eq!(node_betweenness.float_value_of(a), 0.0);
        assert_eq!(node_betweenness.float_value_of(c), 0.0);
        assert!(node_betweenness.float_value_of(b) > 0.0);
    }

    #[test]
    fn isolated_node_has_zero_betweenness() {
        let mut graph = MutableGraph::new();
        let _a = graph.add_node();

        let mut attributes = AttributeRegistry::new();
        let transform = BetweennessTransform::new();
        let mut ctx = TransformContext::new(&mut graph, &mut attributes);
        let alerts = transform.apply(&mut ctx);
        assert!(alerts.is_empty());
    }
}
