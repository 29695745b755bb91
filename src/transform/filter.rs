//! Filter/Remove/Keep and Contract: condition-driven node/edge removal and
//! edge contraction.
//!
//! Grounded on `spec.md` §4.5: "compile the config's condition to a
//! predicate; iterate the relevant element ids; collect those
//! matching/not-matching; remove in one transaction. Node filters cascade
//! to incident edges automatically" and "for the set of edges matched by
//! the condition, call `contractEdges`".

use tracing::debug;

use crate::attribute::AttributeNameRef;
use crate::condition::{compile_condition, Condition, EqualityOp, GraphScopedResolver, TerminalCondition, TerminalOp, ValueOperand};
use crate::graph::{EdgeId, ElementId, NodeId};
use crate::transform::{Alert, GraphTransform, TransformContext};

enum Keep {
    MatchingElementsOnly,
    NonMatchingElementsOnly,
}

/// Removes every node (and cascaded edge) matching, or not matching, the
/// condition. Edges whose *own* condition matches are removed directly.
pub struct FilterTransform {
    condition: Condition,
    keep: Keep,
}

impl FilterTransform {
    /// `Remove`: delete elements for which the condition is true.
    pub fn remove(condition: Condition) -> Self {
        Self { condition, keep: Keep::NonMatchingElementsOnly }
    }

    /// `Keep`: delete elements for which the condition is false.
    pub fn keep(condition: Condition) -> Self {
        Self { condition, keep: Keep::MatchingElementsOnly }
    }
}

impl GraphTransform for FilterTransform {
    fn requires_condition(&self) -> bool {
        true
    }

    fn apply(&self, ctx: &mut TransformContext) -> Vec<Alert> {
        // The condition's element kind follows whichever attribute it
        // actually references: try compiling it against nodes first, then
        // against edges (through the endpoint-aware resolver, so
        // `source.`/`target.` refs still work), and act on whichever kind
        // it resolved against.
        if let Some(node_predicate) = compile_condition::<NodeId>(&self.condition, ctx.attributes) {
            let to_remove: Vec<NodeId> = ctx
                .graph
                .node_ids()
                .into_iter()
                .filter(|&id| {
                    let matches = node_predicate(id);
                    match self.keep {
                        Keep::NonMatchingElementsOnly => matches,
                        Keep::MatchingElementsOnly => !matches,
                    }
                })
                .collect();

            debug!(removed = to_remove.len(), "filter transform removing nodes");
            ctx.graph.remove_nodes(&to_remove);
            return Vec::new();
        }

        let resolver = GraphScopedResolver::new(ctx.graph, ctx.attributes);
        if let Some(edge_predicate) = compile_condition::<EdgeId>(&self.condition, &resolver) {
            let to_remove: Vec<EdgeId> = ctx
                .graph
                .edge_ids()
                .into_iter()
                .filter(|&id| {
                    let matches = edge_predicate(id);
                    match self.keep {
                        Keep::NonMatchingElementsOnly => matches,
                        Keep::MatchingElementsOnly => !matches,
                    }
                })
                .collect();

            debug!(removed = to_remove.len(), "filter transform removing edges");
            ctx.graph.remove_edges(&to_remove);
            return Vec::new();
        }

        vec![Alert::error("condition does not resolve against any node or edge attribute")]
    }
}

pub struct ContractTransform {
    condition: Condition,
}

impl ContractTransform {
    pub fn new(condition: Condition) -> Self {
        Self { condition }
    }

    /// `Contract By Attribute using $"Name"`: contract every edge whose
    /// endpoints share the same value of the named node attribute, built
    /// as `source.Name == target.Name` rather than requiring the user to
    /// spell that condition out by hand (spec.md §8 scenario 2).
    pub fn by_attribute(attribute_name: &str) -> Self {
        let source_ref = ValueOperand::AttributeRef(AttributeNameRef {
            prefix: crate::attribute::EdgeEndpointPrefix::Source,
            base_name: attribute_name.to_string(),
            parameters: vec![],
        });
        let target_ref = ValueOperand::AttributeRef(AttributeNameRef {
            prefix: crate::attribute::EdgeEndpointPrefix::Target,
            base_name: attribute_name.to_string(),
            parameters: vec![],
        });
        let condition = Condition::Terminal(TerminalCondition {
            lhs: source_ref,
            op: TerminalOp::Equality(EqualityOp::Equal),
            rhs: target_ref,
        });
        Self { condition }
    }
}

impl GraphTransform for ContractTransform {
    fn requires_condition(&self) -> bool {
        true
    }

    fn apply(&self, ctx: &mut TransformContext) -> Vec<Alert> {
        let resolver = GraphScopedResolver::new(ctx.graph, ctx.attributes);
        let Some(edge_predicate) = compile_condition::<EdgeId>(&self.condition, &resolver) else {
            return vec![Alert::error("condition does not resolve against any edge attribute")];
        };

        let to_contract: Vec<EdgeId> = ctx.graph.edge_ids().into_iter().filter(|&id| edge_predicate(id)).collect();

        debug!(contracted = to_contract.len(), "contract transform merging edges");
        ctx.graph.contract_edges(&to_contract);
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{AttributeNameRef, AttributeRegistry, EdgeEndpointPrefix};
    use crate::condition::{EqualityOp, Literal, TerminalCondition, TerminalOp, ValueOperand};
    use crate::graph::MutableGraph;

    fn weight_ref() -> ValueOperand {
        ValueOperand::AttributeRef(AttributeNameRef {
            prefix: EdgeEndpointPrefix::None,
            base_name: "Keep".to_string(),
            parameters: vec![],
        })
    }

    #[test]
    fn remove_cascades_to_incident_edges() {
        use crate::graph::array::ElementIdArray;

        let mut graph = MutableGraph::new();
        let a = graph.add_node();
        let b = graph.add_node();
        graph.add_edge(a, b).unwrap();

        let storage: ElementIdArray<NodeId, i64> = ElementIdArray::new(graph.node_registry(), graph.num_nodes());
        storage.set(a, 1);

        let mut attributes = AttributeRegistry::new();
        attributes.insert(crate::attribute::Attribute::from_int(
            "Keep",
            {
                let s = storage.share();
                move || (0..s.len()).map(NodeId::new).collect::<Vec<_>>()
            },
            move |id: NodeId| Some(storage.get(id)),
        ));

        let condition = Condition::Terminal(TerminalCondition {
            lhs: weight_ref(),
            op: TerminalOp::Equality(EqualityOp::Equal),
            rhs: ValueOperand::Literal(Literal::Int(1)),
        });
        let transform = FilterTransform::remove(condition);
        let mut ctx = TransformContext::new(&mut graph, &mut attributes);
        let alerts = transform.apply(&mut ctx);

        assert!(alerts.is_empty());
        assert_eq!(graph.num_nodes(), 1);
        assert_eq!(graph.num_edges(), 0);
    }

    /// spec.md §8 scenario 1: `Remove where $"Edge Weight" < 0.5` references
    /// an edge attribute, so it must remove edges (not fail for lack of a
    /// matching node attribute).
    #[test]
    fn remove_with_an_edge_condition_removes_edges_not_nodes() {
        use crate::graph::array::ElementIdArray;

        let mut graph = MutableGraph::new();
        let a = graph.add_node();
        let b = graph.add_node();
        let c = graph.add_node();
        let light = graph.add_edge(a, b).unwrap();
        let heavy = graph.add_edge(b, c).unwrap();

        let weights: ElementIdArray<EdgeId, f64> = ElementIdArray::new(graph.edge_registry(), graph.num_edges());
        weights.set(light, 0.2);
        weights.set(heavy, 0.9);

        let mut attributes = AttributeRegistry::new();
        attributes.insert(crate::attribute::Attribute::from_float(
            "Edge Weight",
            {
                let ids = graph.edge_ids();
                move || ids.clone()
            },
            {
                let w = weights.share();
                move |id: EdgeId| Some(w.get(id))
            },
        ));

        let condition = Condition::Terminal(TerminalCondition {
            lhs: ValueOperand::AttributeRef(AttributeNameRef {
                prefix: EdgeEndpointPrefix::None,
                base_name: "Edge Weight".to_string(),
                parameters: vec![],
            }),
            op: TerminalOp::Numerical(crate::condition::NumericalOp::LessThan),
            rhs: ValueOperand::Literal(Literal::Float(0.5)),
        });
        let transform = FilterTransform::remove(condition);
        let mut ctx = TransformContext::new(&mut graph, &mut attributes);
        let alerts = transform.apply(&mut ctx);

        assert!(alerts.is_empty());
        assert_eq!(graph.num_nodes(), 3, "node filtering must not kick in for an edge-only condition");
        assert_eq!(graph.num_edges(), 1, "only the light edge is removed");
    }

    #[test]
    fn contract_merges_matching_edges() {
        let mut graph = MutableGraph::new();
        let a = graph.add_node();
        let b = graph.add_node();
        let c = graph.add_node();
        graph.add_edge(a, b).unwrap();
        graph.add_edge(b, c).unwrap();

        let attributes = AttributeRegistry::new();
        let transform = ContractTransform::new(Condition::None);
        let mut attributes = attributes;
        let mut ctx = TransformContext::new(&mut graph, &mut attributes);
        transform.apply(&mut ctx);

        assert_eq!(graph.num_nodes(), 1, "Condition::None matches every edge");
    }

    /// spec.md §8 scenario 2: A,B share "Group"="x", C is "y"; contracting
    /// by that attribute should merge A–B but leave B–C alone.
    #[test]
    fn contract_by_attribute_merges_only_shared_group_edges() {
        let mut graph = MutableGraph::new();
        let a = graph.add_node();
        let b = graph.add_node();
        let c = graph.add_node();
        graph.add_edge(a, b).unwrap();
        graph.add_edge(b, c).unwrap();

        let mut attributes = AttributeRegistry::new();
        attributes.insert(crate::attribute::Attribute::from_string(
            "Group",
            {
                let ids = graph.node_ids();
                move || ids.clone()
            },
            move |id: NodeId| Some(if id == c { "y".to_string() } else { "x".to_string() }),
        ));

        let transform = ContractTransform::by_attribute("Group");
        let mut ctx = TransformContext::new(&mut graph, &mut attributes);
        let alerts = transform.apply(&mut ctx);

        assert!(alerts.is_empty());
        assert_eq!(graph.num_nodes(), 2, "A and B merge into one node, C stays separate");
        assert_eq!(graph.num_edges(), 1, "one surviving edge between the merged node and C");
    }
}
