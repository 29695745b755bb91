//! Compiling a [`Condition`](super::Condition) into a closure over element
//! ids.
//!
//! Grounded on `conditionfncreator.h`'s `AttributesOpVistor`/`ConditionFnOp`
//! machinery, which turns a parsed condition into a
//! `std::function<bool(NodeId)>` (or `EdgeId` equivalent). Its
//! `ConditionFnOp::String` visitor builds both sides of a string comparison
//! from `_lhs` — a copy-paste bug that always compares an attribute against
//! itself. Fixed here: [`compile_attr_attr`] reads `rhs` from the right-hand
//! attribute. See the regression test below.

use regex::RegexBuilder;

use super::{
    Condition, EqualityOp, Literal, LogicalOp, NumericalOp, StringOp, TerminalCondition, TerminalOp, UnaryCondition,
    UnaryOp, ValueOperand,
};
use crate::attribute::{parse_numeric, Attribute, AttributeNameRef, EdgeEndpointPrefix, ValueType};
use crate::graph::{ElementId, ElementKind};

/// Looks up an attribute reference, resolving `source.`/`target.` prefixes
/// (§4.2) where the implementor has enough context (a graph) to do so.
/// Implemented by `AttributeRegistry` (no prefix support — plain name
/// lookup only) and by [`GraphScopedResolver`] (full support); kept as a
/// trait so the compiler doesn't need to know about the registry's
/// storage.
pub trait AttributeResolver {
    fn resolve_attribute_ref(&self, name_ref: &AttributeNameRef) -> Option<Attribute>;
}

impl AttributeResolver for crate::attribute::AttributeRegistry {
    fn resolve_attribute_ref(&self, name_ref: &AttributeNameRef) -> Option<Attribute> {
        if name_ref.prefix != EdgeEndpointPrefix::None {
            // A bare registry has no graph to resolve source/target
            // endpoints through; use `GraphScopedResolver` for that.
            return None;
        }
        self.get(&name_ref.dot_normalised_base_name()).cloned()
    }
}

/// Resolves `source.`/`target.` attribute references by pulling a node
/// attribute's values through each edge's endpoints (§4.2). Plain
/// (unprefixed) references fall through to the registry unchanged.
pub struct GraphScopedResolver<'a> {
    pub graph: &'a crate::graph::MutableGraph,
    pub registry: &'a crate::attribute::AttributeRegistry,
}

impl<'a> GraphScopedResolver<'a> {
    pub fn new(graph: &'a crate::graph::MutableGraph, registry: &'a crate::attribute::AttributeRegistry) -> Self {
        Self { graph, registry }
    }
}

impl<'a> AttributeResolver for GraphScopedResolver<'a> {
    fn resolve_attribute_ref(&self, name_ref: &AttributeNameRef) -> Option<Attribute> {
        if name_ref.prefix == EdgeEndpointPrefix::None {
            return self.registry.get(&name_ref.dot_normalised_base_name()).cloned();
        }

        let node_attribute = self.registry.get(&name_ref.dot_normalised_base_name())?;
        if node_attribute.element_kind != ElementKind::Node {
            return None;
        }

        // Snapshot each live edge's relevant endpoint up front so the
        // returned attribute's accessors can own the mapping (`'static`)
        // instead of borrowing `self.graph`. Edges don't change mid-compile
        // (condition compilation never mutates the graph), so this is
        // equivalent to a live lookup for the lifetime the attribute is used.
        let wants_source = name_ref.prefix == EdgeEndpointPrefix::Source;
        let endpoint_by_edge: std::collections::HashMap<usize, usize> = self
            .graph
            .edge_ids()
            .into_iter()
            .filter_map(|edge_id| {
                let edge = self.graph.edge_by_id(edge_id)?;
                let node = if wants_source { edge.source } else { edge.target };
                Some((edge_id.index(), node.index()))
            })
            .collect();
        let domain: Vec<usize> = endpoint_by_edge.keys().copied().collect();
        let endpoint_of = move |idx: usize| endpoint_by_edge.get(&idx).copied();
        Some(node_attribute.via_edge_endpoint(move || domain.clone(), endpoint_of))
    }
}

/// A condition compiled for a specific element kind.
pub type CompiledCondition<E> = Box<dyn Fn(E) -> bool>;

enum Comparable {
    Int(i64),
    Float(f64),
    Str(String),
}

impl Comparable {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Comparable::Int(i) => Some(*i as f64),
            Comparable::Float(f) => Some(*f),
            Comparable::Str(s) => parse_numeric(s),
        }
    }

    fn render(&self) -> String {
        match self {
            Comparable::Int(i) => i.to_string(),
            Comparable::Float(f) => f.to_string(),
            Comparable::Str(s) => s.clone(),
        }
    }
}

fn compare(op: &TerminalOp, lhs: &Comparable, rhs: &Comparable) -> Option<bool> {
    match op {
        TerminalOp::Equality(e) => {
            let eq = match (lhs, rhs) {
                (Comparable::Int(a), Comparable::Int(b)) => a == b,
                (Comparable::Float(a), Comparable::Float(b)) => a == b,
                (Comparable::Int(a), Comparable::Float(b)) | (Comparable::Float(b), Comparable::Int(a)) => {
                    (*a as f64) == *b
                }
                _ => lhs.render() == rhs.render(),
            };
            Some(match e {
                EqualityOp::Equal => eq,
                EqualityOp::NotEqual => !eq,
            })
        }
        TerminalOp::Numerical(n) => {
            let a = lhs.as_f64()?;
            let b = rhs.as_f64()?;
            Some(match n {
                NumericalOp::LessThan => a < b,
                NumericalOp::GreaterThan => a > b,
                NumericalOp::LessThanOrEqual => a <= b,
                NumericalOp::GreaterThanOrEqual => a >= b,
            })
        }
        TerminalOp::String(s) => {
            let a = lhs.render();
            let b = rhs.render();
            Some(match s {
                StringOp::Includes => a.contains(&b),
                StringOp::Excludes => !a.contains(&b),
                StringOp::Starts => a.starts_with(&b),
                StringOp::Ends => a.ends_with(&b),
                StringOp::MatchesRegex => RegexBuilder::new(&b).build().ok()?.is_match(&a),
                StringOp::MatchesRegexCaseInsensitive => {
                    RegexBuilder::new(&b).case_insensitive(true).build().ok()?.is_match(&a)
                }
            })
        }
    }
}

/// A numerical operator's reflection when its operands are written with the
/// literal first (`5 < $Weight` means the same as `$Weight > 5`).
fn reflect_numerical(op: TerminalOp) -> TerminalOp {
    match op {
        TerminalOp::Numerical(NumericalOp::LessThan) => TerminalOp::Numerical(NumericalOp::GreaterThan),
        TerminalOp::Numerical(NumericalOp::GreaterThan) => TerminalOp::Numerical(NumericalOp::LessThan),
        TerminalOp::Numerical(NumericalOp::LessThanOrEqual) => {
            TerminalOp::Numerical(NumericalOp::GreaterThanOrEqual)
        }
        TerminalOp::Numerical(NumericalOp::GreaterThanOrEqual) => {
            TerminalOp::Numerical(NumericalOp::LessThanOrEqual)
        }
        other => other,
    }
}

enum ResolvedOperand {
    Literal(Literal),
    Attribute(Attribute),
}

fn resolve_operand(operand: &ValueOperand, resolver: &dyn AttributeResolver) -> Option<ResolvedOperand> {
    match operand {
        ValueOperand::Literal(lit) => Some(ResolvedOperand::Literal(lit.clone())),
        ValueOperand::AttributeRef(name_ref) => {
            resolver.resolve_attribute_ref(name_ref).map(ResolvedOperand::Attribute)
        }
    }
}

fn check_kind<E: ElementId>(attribute: &Attribute) -> Option<()> {
    if attribute.element_kind == E::KIND {
        Some(())
    } else {
        None
    }
}

fn attr_comparable<E: ElementId>(attribute: &Attribute, id: E, op: &TerminalOp) -> Comparable {
    match op {
        TerminalOp::Numerical(_) => Comparable::Float(attribute.float_value_of(id)),
        TerminalOp::String(_) => Comparable::Str(attribute.string_value_of(id)),
        TerminalOp::Equality(_) => match attribute.value_type {
            ValueType::Int => Comparable::Int(attribute.int_value_of(id)),
            ValueType::Float => Comparable::Float(attribute.float_value_of(id)),
            ValueType::String => Comparable::Str(attribute.string_value_of(id)),
        },
    }
}

fn literal_comparable(op: &TerminalOp, literal: &Literal) -> Option<Comparable> {
    match op {
        TerminalOp::Numerical(_) => match literal {
            Literal::Int(i) => Some(Comparable::Float(*i as f64)),
            Literal::Float(f) => Some(Comparable::Float(*f)),
            Literal::String(s) => parse_numeric(s).map(Comparable::Float),
        },
        TerminalOp::String(_) => Some(Comparable::Str(literal.render())),
        TerminalOp::Equality(_) => Some(match literal {
            Literal::Int(i) => Comparable::Int(*i),
            Literal::Float(f) => Comparable::Float(*f),
            Literal::String(s) => Comparable::Str(s.clone()),
        }),
    }
}

/// A terminal condition with one attribute operand and one literal operand.
/// `swapped` means the literal was written on the left (`5 < $Weight`), so a
/// numerical operator must be reflected before evaluation.
fn compile_attr_literal<E: ElementId + 'static>(
    attribute: Attribute,
    op: TerminalOp,
    literal: Literal,
    swapped: bool,
) -> Option<CompiledCondition<E>> {
    let op = if swapped { reflect_numerical(op) } else { op };

    if matches!(op, TerminalOp::Numerical(_)) && attribute.value_type == ValueType::String {
        // A terminal condition applied to a string attribute with a
        // numerical operator is rejected outright rather than coerced.
        return None;
    }

    let literal_value = literal_comparable(&op, &literal)?;
    Some(Box::new(move |id: E| {
        let attribute_value = attr_comparable(&attribute, id, &op);
        compare(&op, &attribute_value, &literal_value).unwrap_or(false)
    }))
}

fn compile_attr_attr<E: ElementId + 'static>(
    lhs: Attribute,
    op: TerminalOp,
    rhs: Attribute,
) -> Option<CompiledCondition<E>> {
    if matches!(op, TerminalOp::Numerical(_))
        && (lhs.value_type == ValueType::String || rhs.value_type == ValueType::String)
    {
        return None;
    }

    let same_type = lhs.value_type == rhs.value_type;
    Some(Box::new(move |id: E| {
        let (l, r) = if same_type {
            (attr_comparable(&lhs, id, &op), attr_comparable(&rhs, id, &op))
        } else {
            (Comparable::Str(lhs.string_value_of(id)), Comparable::Str(rhs.string_value_of(id)))
        };
        compare(&op, &l, &r).unwrap_or(false)
    }))
}

fn compile_terminal<E: ElementId + 'static>(
    terminal: &TerminalCondition,
    resolver: &dyn AttributeResolver,
) -> Option<CompiledCondition<E>> {
    let lhs = resolve_operand(&terminal.lhs, resolver)?;
    let rhs = resolve_operand(&terminal.rhs, resolver)?;

    match (lhs, rhs) {
        (ResolvedOperand::Literal(l), ResolvedOperand::Literal(r)) => {
            let lv = literal_comparable(&terminal.op, &l)?;
            let rv = literal_comparable(&terminal.op, &r)?;
            let result = compare(&terminal.op, &lv, &rv)?;
            Some(Box::new(move |_: E| result))
        }
        (ResolvedOperand::Attribute(attribute), ResolvedOperand::Literal(literal)) => {
            check_kind::<E>(&attribute)?;
            compile_attr_literal(attribute, terminal.op, literal, false)
        }
        (ResolvedOperand::Literal(literal), ResolvedOperand::Attribute(attribute)) => {
            check_kind::<E>(&attribute)?;
            compile_attr_literal(attribute, terminal.op, literal, true)
        }
        (ResolvedOperand::Attribute(lhs), ResolvedOperand::Attribute(rhs)) => {
            check_kind::<E>(&lhs)?;
            check_kind::<E>(&rhs)?;
            compile_attr_attr(lhs, terminal.op, rhs)
        }
    }
}

fn compile_unary<E: ElementId + 'static>(
    unary: &UnaryCondition,
    resolver: &dyn AttributeResolver,
) -> Option<CompiledCondition<E>> {
    match resolve_operand(&unary.lhs, resolver)? {
        ResolvedOperand::Literal(_) => Some(Box::new(|_: E| true)),
        ResolvedOperand::Attribute(attribute) => {
            check_kind::<E>(&attribute)?;
            let UnaryOp::HasValue = unary.op;
            Some(Box::new(move |id: E| !attribute.value_missing_of(id)))
        }
    }
}

/// Compile `condition` against `resolver` into a predicate over `E`.
/// Returns `None` if any attribute reference fails to resolve, fails the
/// element-kind check, or pairs a string attribute with a numerical
/// operator.
pub fn compile_condition<E: ElementId + 'static>(
    condition: &Condition,
    resolver: &dyn AttributeResolver,
) -> Option<CompiledCondition<E>> {
    match condition {
        Condition::None => Some(Box::new(|_: E| true)),
        Condition::Terminal(terminal) => compile_terminal(terminal, resolver),
        Condition::Unary(unary) => compile_unary(unary, resolver),
        Condition::Compound(compound) => {
            let lhs = compile_condition::<E>(&compound.lhs, resolver)?;
            let rhs = compile_condition::<E>(&compound.rhs, resolver)?;
            match compound.op {
                LogicalOp::And => Some(Box::new(move |id: E| lhs(id) && rhs(id))),
                LogicalOp::Or => Some(Box::new(move |id: E| lhs(id) || rhs(id))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{AttributeNameRef, AttributeRegistry, EdgeEndpointPrefix};
    use crate::graph::NodeId;

    fn attr_ref(name: &str) -> ValueOperand {
        ValueOperand::AttributeRef(AttributeNameRef {
            prefix: EdgeEndpointPrefix::None,
            base_name: name.to_string(),
            parameters: vec![],
        })
    }

    #[test]
    fn numerical_literal_first_is_reflected() {
        let mut reg = AttributeRegistry::new();
        reg.insert(Attribute::from_int(
            "Weight",
            || vec![NodeId::new(0), NodeId::new(1)],
            |id| Some(if id.index() == 0 { 2 } else { 8 }),
        ));

        // "5 < Weight" means Weight > 5: node 1 (8) passes, node 0 (2) doesn't.
        let condition = Condition::Terminal(TerminalCondition {
            lhs: ValueOperand::Literal(Literal::Int(5)),
            op: TerminalOp::Numerical(NumericalOp::LessThan),
            rhs: attr_ref("Weight"),
        });
        let compiled = compile_condition::<NodeId>(&condition, &reg).unwrap();
        assert!(!compiled(NodeId::new(0)));
        assert!(compiled(NodeId::new(1)));
    }

    #[test]
    fn string_numerical_operator_is_rejected() {
        let mut reg = AttributeRegistry::new();
        reg.insert(Attribute::from_string("Label", || vec![NodeId::new(0)], |_| Some("x".to_string())));

        let condition = Condition::Terminal(TerminalCondition {
            lhs: attr_ref("Label"),
            op: TerminalOp::Numerical(NumericalOp::LessThan),
            rhs: ValueOperand::Literal(Literal::Int(5)),
        });
        assert!(compile_condition::<NodeId>(&condition, &reg).is_none());
    }

    /// Regression test for the fixed `conditionfncreator.h` bug: both sides
    /// of a string condition must read from their own attribute, not both
    /// from the left-hand one.
    #[test]
    fn string_condition_compares_distinct_attributes() {
        let mut reg = AttributeRegistry::new();
        reg.insert(Attribute::from_string(
            "FirstName",
            || vec![NodeId::new(0), NodeId::new(1)],
            |id| Some(if id.index() == 0 { "Ada".to_string() } else { "Bob".to_string() }),
        ));
        reg.insert(Attribute::from_string(
            "Nickname",
            || vec![NodeId::new(0), NodeId::new(1)],
            |id| Some(if id.index() == 0 { "Ada".to_string() } else { "Robert".to_string() }),
        ));

        let condition = Condition::Terminal(TerminalCondition {
            lhs: attr_ref("FirstName"),
            op: TerminalOp::Equality(EqualityOp::Equal),
            rhs: attr_ref("Nickname"),
        });
        let compiled = compile_condition::<NodeId>(&condition, &reg).unwrap();
        assert!(compiled(NodeId::new(0)), "Ada == Ada");
        assert!(!compiled(NodeId::new(1)), "Bob != Robert — would wrongly pass under the lhs/rhs bug");
    }

    #[test]
    fn compound_and_short_circuits_correctly() {
        let mut reg = AttributeRegistry::new();
        reg.insert(Attribute::from_int("Weight", || vec![NodeId::new(0)], |_| Some(10)));

        let always_false = Condition::Terminal(TerminalCondition {
            lhs: attr_ref("Weight"),
            op: TerminalOp::Equality(EqualityOp::Equal),
            rhs: ValueOperand::Literal(Literal::Int(999)),
        });
        let always_true = Condition::Terminal(TerminalCondition {
            lhs: attr_ref("Weight"),
            op: TerminalOp::Equality(EqualityOp::Equal),
            rhs: ValueOperand::Literal(Literal::Int(10)),
        });

        let and_condition = always_true.clone().and(always_false.clone());
        let compiled = compile_condition::<NodeId>(&and_condition, &reg).unwrap();
        assert!(!compiled(NodeId::new(0)));

        let or_condition = always_true.or(always_false);
        let compiled = compile_condition::<NodeId>(&or_condition, &reg).unwrap();
        assert!(compiled(NodeId::new(0)));
    }

    #[test]
    fn unresolvable_attribute_fails_compilation() {
        let reg = AttributeRegistry::new();
        let condition = Condition::Unary(UnaryCondition { lhs: attr_ref("Missing"), op: UnaryOp::HasValue });
        assert!(compile_condition::<NodeId>(&condition, &reg).is_none());
    }

    /// §4.2: `source.Group` / `target.Group` pull the node attribute
    /// through each edge's endpoints, so `source.Group == target.Group`
    /// only matches edges whose endpoints agree.
    #[test]
    fn graph_scoped_resolver_pulls_node_attribute_through_edge_endpoints() {
        use crate::graph::{EdgeId, MutableGraph};

        let mut graph = MutableGraph::new();
        let a = graph.add_node();
        let b = graph.add_node();
        let c = graph.add_node();
        let ab = graph.add_edge(a, b).unwrap();
        let bc = graph.add_edge(b, c).unwrap();

        let mut reg = AttributeRegistry::new();
        reg.insert(Attribute::from_string(
            "Group",
            {
                let ids = vec![a, b, c];
                move || ids.clone()
            },
            move |id: NodeId| Some(if id == c { "y".to_string() } else { "x".to_string() }),
        ));

        let source_ref = ValueOperand::AttributeRef(AttributeNameRef {
            prefix: EdgeEndpointPrefix::Source,
            base_name: "Group".to_string(),
            parameters: vec![],
        });
        let target_ref = ValueOperand::AttributeRef(AttributeNameRef {
            prefix: EdgeEndpointPrefix::Target,
            base_name: "Group".to_string(),
            parameters: vec![],
        });
        let condition = Condition::Terminal(TerminalCondition {
            lhs: source_ref,
            op: TerminalOp::Equality(EqualityOp::Equal),
            rhs: target_ref,
        });

        let resolver = GraphScopedResolver::new(&graph, &reg);
        let compiled = compile_condition::<EdgeId>(&condition, &resolver).unwrap();
        assert!(compiled(ab), "A and B are both in Group x");
        assert!(!compiled(bc), "B is x, C is y");
    }
}
