//! Louvain clustering: iterative modularity-optimisation and coarsening
//! rounds that fold nodes into communities, then communities into
//! communities-of-communities, until a pass makes no further move.
//!
//! Grounded on `louvaintransform.cpp` (https://arxiv.org/abs/0803.0476). The
//! original coarsens by building a fresh `MutableGraph` per round and
//! deliberately reuses `NodeId` values as community ids ("Slight Hack, be
//! careful with this", per its own comment); this module coarsens over a
//! plain index graph instead; since every live id in this crate's graph is
//! already addressable without the original's multi-element "Tail" nodes
//! (contraction here frees absorbed ids outright — see
//! [`crate::graph::MutableGraph`]'s module doc), the original's
//! tail-skipping during traversal has no counterpart here.
//!
//! `leidentransform.cpp` shares this same move-nodes/relabel/coarsen loop and
//! resolution mapping verbatim (down to the `0.5`/`30.0` bounds) — the
//! filtered source pack's copy never reaches the refinement phase that
//! distinguishes Leiden from plain Louvain, so `LouvainTransform` serves
//! both actions, parameterised only by the attribute names it publishes
//! under (`family` below).

use std::collections::HashMap;

use tracing::debug;

use crate::attribute::{Attribute, AttributeFlags};
use crate::condition::Literal;
use crate::graph::NodeId;
use crate::transform::{Alert, GraphTransform, TransformConfig, TransformContext};

const MIN_RESOLUTION: f64 = 0.5;
const MAX_RESOLUTION: f64 = 30.0;

fn resolution_from_granularity(granularity: f64) -> f64 {
    let inverted = 1.0 - granularity;
    let log_min = MIN_RESOLUTION.log10();
    let log_max = MAX_RESOLUTION.log10();
    let log_range = log_max - log_min;
    10f64.powf(log_min + inverted * log_range)
}

pub struct LouvainTransform {
    weighted: bool,
    granularity: f64,
    weight_attribute: Option<String>,
    family: &'static str,
}

impl LouvainTransform {
    pub fn from_config(config: &TransformConfig, weighted: bool) -> Self {
        Self::from_config_with_family(config, weighted, "Louvain")
    }

    /// `family` is the published-attribute prefix ("Louvain" or "Leiden");
    /// the clustering itself is identical either way, see the module doc.
    pub fn from_config_with_family(config: &TransformConfig, weighted: bool, family: &'static str) -> Self {
        let granularity = match config.parameter_by_name("Granularity").map(|p| &p.value) {
            Some(Literal::Float(v)) => *v,
            Some(Literal::Int(v)) => *v as f64,
            _ => 0.5,
        };
        let weight_attribute = if weighted { config.attributes.first().cloned() } else { None };
        Self { weighted, granularity, weight_attribute, family }
    }
}

/// A level of the coarsening hierarchy: `n` dense node indices `0..n` and a
/// weighted (multi-)edge list over them, including self-loops.
struct LevelGraph {
    n: usize,
    edges: Vec<(usize, usize, f64)>,
}

fn build_adjacency(graph: &LevelGraph) -> Vec<Vec<(usize, f64)>> {
    let mut adjacency = vec![Vec::new(); graph.n];
    for &(a, b, w) in &graph.edges {
        adjacency[a].push((b, w));
        adjacency[b].push((a, w));
    }
    adjacency
}

/// One full local-moving phase: repeatedly scan every node, greedily moving
/// it to whichever neighbouring community yields the largest modularity
/// gain, until a full scan makes no move. Returns the resulting (not yet
/// relabelled) community assignment and whether anything moved at all.
fn move_nodes(graph: &LevelGraph, adjacency: &[Vec<(usize, f64)>], resolution: f64, total_weight: f64) -> (Vec<usize>, bool) {
    let n = graph.n;
    let mut communities: Vec<usize> = (0..n).collect();
    let weighted_degrees: Vec<f64> = adjacency.iter().map(|edges| edges.iter().map(|&(_, w)| w).sum()).collect();

    let mut community_degrees: HashMap<usize, i64> = HashMap::new();
    for node in 0..n {
        *community_degrees.entry(node).or_insert(0) += weighted_degrees[node] as i64;
    }

    let mut modified = false;
    loop {
        let mut improved = false;

        for node in 0..n {
            let mut neighbour_community_weights: HashMap<usize, f64> = HashMap::new();
            for &(neighbour, w) in &adjacency[node] {
                if neighbour == node {
                    continue;
                }
                *neighbour_community_weights.entry(communities[neighbour]).or_insert(0.0) += w;
            }

            let community_id = communities[node];
            *community_degrees.entry(community_id).or_insert(0) -= weighted_degrees[node] as i64;

            let mut max_delta_q = 0.0;
            let mut new_community_id = community_id;
            for (&neighbour_community_id, &weight) in &neighbour_community_weights {
                let community_weight = *community_degrees.get(&neighbour_community_id).unwrap_or(&0) as f64;
                let node_weight = weighted_degrees[node];
                let delta_q = (resolution * weight) - ((community_weight * node_weight) / total_weight);

                if delta_q > max_delta_q {
                    max_delta_q = delta_q;
                    new_community_id = neighbour_community_id;
                }
            }

            *community_degrees.entry(new_community_id).or_insert(0) += weighted_degrees[node] as i64;
            communities[node] = new_community_id;

            if new_community_id != community_id {
                improved = true;
                modified = true;
            }
        }

        if !improved {
            break;
        }
    }

    (communities, modified)
}

/// Compact `communities` (arbitrary node-indexed ids) into `0..k`, assigning
/// new ids in order of first appearance while scanning node index order.
fn relabel(communities: &[usize]) -> Vec<usize> {
    let mut id_map: HashMap<usize, usize> = HashMap::new();
    let mut next_id = 0;
    communities
        .iter()
        .map(|&old| {
            *id_map.entry(old).or_insert_with(|| {
                let id = next_id;
                next_id += 1;
                id
            })
        })
        .collect()
}

/// One node per distinct (relabelled) community; edges between two base
/// nodes become a single aggregated edge between their communities,
/// including self-loops for intra-community edges.
fn coarsen(graph: &LevelGraph, relabelled: &[usize]) -> LevelGraph {
    let num_communities = relabelled.iter().copied().max().map_or(0, |m| m + 1);
    let mut aggregated: HashMap<(usize, usize), f64> = HashMap::new();

    for &(a, b, w) in &graph.edges {
        let (ca, cb) = (relabelled[a], relabelled[b]);
        let key = if ca <= cb { (ca, cb) } else { (cb, ca) };
        *aggregated.entry(key).or_insert(0.0) += w;
    }

    LevelGraph { n: num_communities, edges: aggregated.into_iter().map(|((a, b), w)| (a, b, w)).collect() }
}

impl GraphTransform for LouvainTransform {
    fn apply(&self, ctx: &mut TransformContext) -> Vec<Alert> {
        if self.weighted && self.weight_attribute.is_none() {
            return vec![Alert::error("invalid parameter")];
        }

        let resolution = resolution_from_granularity(self.granularity);

        let node_ids = ctx.graph.node_ids();
        let n = node_ids.len();
        let node_index: HashMap<NodeId, usize> = node_ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();

        let weight_attribute = match &self.weight_attribute {
            Some(name) => match ctx.attributes.get(name) {
                Some(attribute) => Some(attribute.clone()),
                None => return vec![Alert::error(format!("unknown weighting attribute {name:?}"))],
            },
            None => None,
        };

        let base_edges: Vec<(usize, usize, f64)> = ctx
            .graph
            .edge_ids()
            .into_iter()
            .filter_map(|edge_id| {
                let edge = ctx.graph.edge_by_id(edge_id)?;
                let a = *node_index.get(&edge.source)?;
                let b = *node_index.get(&edge.target)?;
                let weight = weight_attribute.as_ref().map_or(1.0, |attr| attr.float_value_of(edge_id));
                Some((a, b, weight))
            })
            .collect();

        let total_weight: f64 = base_edges.iter().map(|&(_, _, w)| w).sum();

        ctx.set_phase("Louvain Initialising");

        let mut current = LevelGraph { n, edges: base_edges };
        let mut iterations: Vec<Vec<usize>> = Vec::new();
        let mut progress_iteration = 1;

        loop {
            if ctx.cancelled() {
                return Vec::new();
            }

            ctx.set_phase(&format!("Louvain Iteration {progress_iteration}"));
            let adjacency = build_adjacency(&current);
            let (communities, modified) = move_nodes(&current, &adjacency, resolution, total_weight.max(f64::MIN_POSITIVE));

            if !modified {
                break;
            }

            let relabelled = relabel(&communities);
            iterations.push(relabelled.clone());

            ctx.set_phase(&format!("Louvain Iteration {progress_iteration} Coarsening"));
            current = coarsen(&current, &relabelled);
            progress_iteration += 1;
        }

        ctx.set_phase("Louvain Finalising");

        let mut final_community: Vec<usize> = (0..n).collect();
        for iteration in &iterations {
            for community in final_community.iter_mut() {
                *community = iteration[*community];
            }
        }

        let mut histogram: HashMap<usize, usize> = HashMap::new();
        for &community in &final_community {
            *histogram.entry(community).or_insert(0) += 1;
        }

        let mut sorted: Vec<(usize, usize)> = histogram.iter().map(|(&c, &size)| (c, size)).collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1).then(b.0.cmp(&a.0)));

        let cluster_numbers: HashMap<usize, usize> =
            sorted.iter().enumerate().map(|(i, &(community, _))| (community, i + 1)).collect();

        debug!(clusters = sorted.len(), nodes = n, family = self.family, "louvain-family clustering complete");

        let cluster_name_label = format!("{}{} Cluster", if self.weighted { "Weighted " } else { "" }, self.family);
        let cluster_size_label = format!("{}{} Cluster Size", if self.weighted { "Weighted " } else { "" }, self.family);

        let cluster_of_node: HashMap<NodeId, usize> =
            node_ids.iter().enumerate().map(|(i, &id)| (id, final_community[i])).collect();

        let names = cluster_of_node.clone();
        let numbers = cluster_numbers.clone();
        let node_ids_for_names = node_ids.clone();
        ctx.attributes.insert(
            Attribute::from_string(
                cluster_name_label,
                move || node_ids_for_names.clone(),
                move |id: NodeId| names.get(&id).map(|c| format!("Cluster {}", numbers[c])),
            )
            .with_description(format!("The {} cluster in which the node resides.", self.family))
            .with_flags(AttributeFlags { find_shared: true, searchable: true, ..Default::default() }),
        );

        let sizes = cluster_of_node;
        let node_ids_for_sizes = node_ids;
        ctx.attributes.insert(
            Attribute::from_int(
                cluster_size_label,
                move || node_ids_for_sizes.clone(),
                move |id: NodeId| sizes.get(&id).map(|c| histogram[c] as i64),
            )
            .with_description(format!("The size of the {} cluster in which the node resides.", self.family))
            .with_flags(AttributeFlags { auto_range: true, ..Default::default() }),
        );

        Vec::new()
    }

    fn default_visualisations(&self) -> Vec<(String, String)> {
        let label = format!("{}{} Cluster", if self.weighted { "Weighted " } else { "" }, self.family);
        vec![(label, "Colour".to_string())]
    }
}
