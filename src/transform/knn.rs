//! k-NN / %-NN: per-node top-k (or top-percent) edge retention by ranking
//! attribute.
//!
//! Grounded on `knntransform.cpp`/`percentnntransform.cpp`: each node
//! independently partial-sorts its incident edges by a ranking attribute and
//! marks its own top `k` (or `max(degree * percent / 100, minimum)`) as
//! keepers, recording the 1-indexed position as that edge's source-rank or
//! target-rank. An edge survives if *either* endpoint kept it — this is a
//! union, not an intersection, since both endpoints' passes touch the same
//! edge and each can independently clear its "removee" flag. Non-keepers are
//! removed graph-wide once every node has been ranked.

use tracing::debug;

use crate::graph::array::ElementIdArray;
use crate::graph::EdgeId;
use crate::transform::{Alert, GraphTransform, TransformConfig, TransformContext};

#[derive(Debug, Clone, Copy, Default)]
struct Rank {
    source: usize,
    target: usize,
}

impl Rank {
    fn mean(&self) -> f64 {
        if self.source == 0 {
            self.target as f64
        } else if self.target == 0 {
            self.source as f64
        } else {
            (self.source + self.target) as f64 * 0.5
        }
    }
}

enum KeeperCount {
    Fixed(usize),
    PercentOfDegree { percent: usize, minimum: usize },
}

pub struct KnnTransform {
    ranking_attribute: String,
    ascending: bool,
    count: KeeperCount,
    label: &'static str,
}

impl KnnTransform {
    pub fn from_config(config: &TransformConfig, is_percent: bool) -> Result<Self, String> {
        let ranking_attribute =
            config.attributes.first().cloned().ok_or_else(|| "k-NN requires a ranking attribute".to_string())?;

        let ascending = config.parameter_has_value("Rank Order", "Ascending");

        let count = if is_percent {
            let percent = parameter_as_int(config, "Percent")?;
            let minimum = if config.has_parameter("Minimum") { parameter_as_int(config, "Minimum")? } else { 1 };
            KeeperCount::PercentOfDegree { percent: percent as usize, minimum: minimum as usize }
        } else {
            KeeperCount::Fixed(parameter_as_int(config, "k")? as usize)
        };

        Ok(Self { ranking_attribute, ascending, count, label: if is_percent { "%-NN" } else { "k-NN" } })
    }

    fn keepers_for_degree(&self, degree: usize) -> usize {
        match self.count {
            KeeperCount::Fixed(k) => k,
            KeeperCount::PercentOfDegree { percent, minimum } => ((degree * percent) / 100).max(minimum),
        }
    }
}

fn parameter_as_int(config: &TransformConfig, name: &str) -> Result<i64, String> {
    match config.parameter_by_name(name).map(|p| &p.value) {
        Some(crate::condition::Literal::Int(v)) => Ok(*v),
        Some(crate::condition::Literal::Float(v)) => Ok(*v as i64),
        _ => Err(format!("{name} requires an integer parameter")),
    }
}

impl GraphTransform for KnnTransform {
    fn apply(&self, ctx: &mut TransformContext) -> Vec<Alert> {
        ctx.set_phase(self.label);

        let Some(attribute) = ctx.attributes.get(&self.ranking_attribute).cloned() else {
            return vec![Alert::error(format!("unknown ranking attribute {:?}", self.ranking_attribute))];
        };

        let ranks: ElementIdArray<EdgeId, Rank> = ElementIdArray::new(ctx.graph.edge_registry(), ctx.graph.num_edges());
        let removees: ElementIdArray<EdgeId, bool> = ElementIdArray::new(ctx.graph.edge_registry(), ctx.graph.num_edges());
        removees.fill(true);

        let node_ids = ctx.graph.node_ids();
        let num_nodes = node_ids.len().max(1);
        for (progress, node_id) in node_ids.into_iter().enumerate() {
            let Some(node) = ctx.graph.node_by_id(node_id) else { continue };
            let mut edge_ids: Vec<EdgeId> = node.in_edges.iter().chain(node.out_edges.iter()).copied().collect();

            let k = self.keepers_for_degree(edge_ids.len()).min(edge_ids.len());

            if self.ascending {
                edge_ids.sort_by(|&a, &b| {
                    attribute.float_value_of(a).partial_cmp(&attribute.float_value_of(b)).unwrap_or(std::cmp::Ordering::Equal)
                });
            } else {
                edge_ids.sort_by(|&a, &b| {
                    attribute.float_value_of(b).partial_cmp(&attribute.float_value_of(a)).unwrap_or(std::cmp::Ordering::Equal)
                });
            }

            for (i, &edge_id) in edge_ids.iter().take(k).enumerate() {
                let position = i + 1;
                let Some(edge) = ctx.graph.edge_by_id(edge_id) else { continue };
                ranks.with_mut(edge_id, |rank| {
                    if edge.source == node_id {
                        rank.source = position;
                    } else {
                        rank.target = position;
                    }
                });
                removees.set(edge_id, false);
            }

            ctx.set_progress(((progress as u64 * 100) / num_nodes as u64) as i32);
        }

        let edge_ids = ctx.graph.edge_ids();
        let to_remove: Vec<EdgeId> = edge_ids.into_iter().filter(|&id| removees.get(id)).collect();
        debug!(kept = removees.len() - to_remove.len(), removed = to_remove.len(), "{} pruned incident edges", self.label);
        ctx.graph.remove_edges(&to_remove);
        ctx.set_progress(-1);

        let source_label = format!("{} Source Rank", self.label);
        let target_label = format!("{} Target Rank", self.label);
        let mean_label = format!("{} Mean Rank", self.label);

        let domain_ids = ctx.graph.edge_ids();
        let flags = crate::attribute::AttributeFlags { auto_range: true, ..Default::default() };

        let r1 = ranks.share();
        let ids1 = domain_ids.clone();
        ctx.attributes.insert(
            crate::attribute::Attribute::from_int(
                source_label,
                move || ids1.clone(),
                move |id: EdgeId| Some(r1.get(id).source as i64),
            )
            .with_description("The ranking given by k-NN, relative to its source node.")
            .with_flags(flags),
        );

        let r2 = ranks.share();
        let ids2 = domain_ids.clone();
        ctx.attributes.insert(
            crate::attribute::Attribute::from_int(
                target_label,
                move || ids2.clone(),
                move |id: EdgeId| Some(r2.get(id).target as i64),
            )
            .with_description("The ranking given by k-NN, relative to its target node.")
            .with_flags(flags),
        );

        let r3 = ranks.share();
        let ids3 = domain_ids;
        ctx.attributes.insert(
            crate::attribute::Attribute::from_float(
                mean_label,
                move || ids3.clone(),
                move |id: EdgeId| Some(r3.get(id).mean()),
            )
            .with_description("The mean ranking given by k-NN.")
            .with_flags(flags),
        );

        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeRegistry;
    use crate::graph::MutableGraph;

    fn config_with_k(k: i64, ascending: bool) -> TransformConfig {
        let mut text = format!("\"k-NN\" using $\"Weight\" with \"k\" = {k}");
        if ascending {
            text.push_str(" \"Rank Order\" = \"Ascending\"");
        }
        crate::transform::parse_transform_config(&text).unwrap()
    }

    #[test]
    fn keeps_top_k_by_weight_per_node() {
        // Star: hub connected to 3 leaves with weights 1, 2, 3. k=2 keeps
        // the two heaviest (descending is the default rank order).
        let mut graph = MutableGraph::new();
        let hub = graph.add_node();
        let leaves: Vec<_> = (0..3).map(|_| graph.add_node()).collect();
        let e0 = graph.add_edge(hub, leaves[0]).unwrap();
        let e1 = graph.add_edge(hub, leaves[1]).unwrap();
        let e2 = graph.add_edge(hub, leaves[2]).unwrap();

        let weights: ElementIdArray<EdgeId, i64> = ElementIdArray::new(graph.edge_registry(), graph.num_edges());
        weights.set(e0, 1);
        weights.set(e1, 2);
        weights.set(e2, 3);

        let mut attributes = AttributeRegistry::new();
        let ids = graph.edge_ids();
        attributes.insert(crate::attribute::Attribute::from_int(
            "Weight",
            move || ids.clone(),
            {
                let w = weights.share();
                move |id: EdgeId| Some(w.get(id))
            },
        ));

        let config = config_with_k(2, false);
        let transform = KnnTransform::from_config(&config, false).unwrap();
        let mut ctx = TransformContext::new(&mut graph, &mut attributes);
        let alerts = transform.apply(&mut ctx);

        assert!(alerts.is_empty());
        assert_eq!(graph.num_edges(), 2, "the lightest edge should be pruned");
        assert!(!graph.contains_edge_id(e0));
        assert!(graph.contains_edge_id(e1));
        assert!(graph.contains_edge_id(e2));
    }

    #[test]
    fn missing_ranking_attribute_is_an_error() {
        let mut graph = MutableGraph::new();
        let a = graph.add_node();
        let b = graph.add_node();
        graph.add_edge(a, b).unwrap();

        let mut attributes = AttributeRegistry::new();
        let config = config_with_k(1, false);
        let transform = KnnTransform::from_config(&config, false).unwrap();
        let mut ctx = TransformContext::new(&mut graph, &mut attributes);
        let alerts = transform.apply(&mut ctx);

        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].is_error());
    }
}
