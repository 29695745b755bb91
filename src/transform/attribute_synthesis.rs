//! Combine / Average / Type Cast: attributes synthesised from other
//! attributes rather than computed from graph structure.
//!
//! Grounded on `combineattributestransform.cpp`, `averageattributetransform.cpp`
//! and `typecasttransform.cpp`. All three dispatch on whichever element kind
//! (node or edge) their source attribute(s) belong to, resolved at runtime
//! since a transform config doesn't know statically which kind it refers to.

use std::collections::HashMap;

use crate::attribute::{Attribute, AttributeFlags};
use crate::condition::Literal;
use crate::graph::{EdgeId, ElementId, ElementKind, NodeId};
use crate::transform::{Alert, GraphTransform, TransformConfig, TransformContext};

fn parameter_as_string(config: &TransformConfig, name: &str) -> Option<String> {
    match config.parameter_by_name(name).map(|p| &p.value) {
        Some(Literal::String(s)) => Some(s.clone()),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SynthesisedType {
    Int,
    Float,
    String,
}

/// Tracks the narrowest type every value seen so far would still fit,
/// starting from nothing and only ever widening: `Int` narrows to `Float`
/// the moment a non-integer numeric value appears, and either narrows to
/// `String` the moment a non-numeric value appears.
#[derive(Default)]
struct TypeIdentity {
    current: Option<SynthesisedType>,
}

impl TypeIdentity {
    fn update(&mut self, value: &str) {
        let kind = if value.parse::<i64>().is_ok() {
            SynthesisedType::Int
        } else if value.parse::<f64>().is_ok() {
            SynthesisedType::Float
        } else {
            SynthesisedType::String
        };

        self.current = Some(match (self.current, kind) {
            (None, k) => k,
            (Some(SynthesisedType::String), _) | (_, SynthesisedType::String) => SynthesisedType::String,
            (Some(SynthesisedType::Float), _) | (_, SynthesisedType::Float) => SynthesisedType::Float,
            (Some(SynthesisedType::Int), SynthesisedType::Int) => SynthesisedType::Int,
        });
    }

    fn resolved(&self) -> SynthesisedType {
        self.current.unwrap_or(SynthesisedType::String)
    }
}

pub struct CombineTransform {
    first_attribute: Option<String>,
    second_attribute: Option<String>,
    new_name: String,
    template: String,
}

impl CombineTransform {
    pub fn from_config(config: &TransformConfig) -> Self {
        Self {
            first_attribute: config.attributes.first().cloned(),
            second_attribute: config.attributes.get(1).cloned(),
            new_name: parameter_as_string(config, "Name").unwrap_or_else(|| "New Attribute".to_string()),
            template: parameter_as_string(config, "Attribute Value").unwrap_or_else(|| "\\1 \\2".to_string()),
        }
    }
}

fn substitute(template: &str, first: &str, second: &str) -> String {
    template.replace("\\1", first).replace("\\2", second)
}

fn synthesise_combined<E: ElementId + 'static>(
    ctx: &mut TransformContext,
    domain: Vec<E>,
    first: Attribute,
    second: Attribute,
    template: String,
    new_name: String,
) {
    let mut identity = TypeIdentity::default();
    for &id in &domain {
        identity.update(&substitute(&template, &first.string_value_of(id), &second.string_value_of(id)));
    }

    let description = "An attribute synthesised by the Combine Attributes transform.".to_string();
    let domain_ids = domain.clone();
    let render = {
        let (first, second, template) = (first.clone(), second.clone(), template.clone());
        move |id: E| substitute(&template, &first.string_value_of(id), &second.string_value_of(id))
    };

    match identity.resolved() {
        SynthesisedType::Int => {
            ctx.attributes.insert(
                Attribute::from_int(new_name, move || domain_ids.clone(), move |id: E| render(id).parse::<i64>().ok())
                    .with_description(description)
                    .with_flags(AttributeFlags { auto_range: true, ..Default::default() }),
            );
        }
        SynthesisedType::Float => {
            ctx.attributes.insert(
                Attribute::from_float(new_name, move || domain_ids.clone(), move |id: E| render(id).parse::<f64>().ok())
                    .with_description(description)
                    .with_flags(AttributeFlags { auto_range: true, ..Default::default() }),
            );
        }
        SynthesisedType::String => {
            ctx.attributes.insert(
                Attribute::from_string(new_name, move || domain_ids.clone(), move |id: E| Some(render(id)))
                    .with_description(description)
                    .with_flags(AttributeFlags { find_shared: true, searchable: true, ..Default::default() }),
            );
        }
    }
}

impl GraphTransform for CombineTransform {
    fn apply(&self, ctx: &mut TransformContext) -> Vec<Alert> {
        ctx.set_phase("Combine Attributes");

        let (Some(first_name), Some(second_name)) = (&self.first_attribute, &self.second_attribute) else {
            return vec![Alert::error("Invalid parameters")];
        };

        if self.new_name.is_empty() {
            return vec![Alert::error("Invalid Attribute Name: ''")];
        }

        let Some(first) = ctx.attributes.get(first_name).cloned() else {
            return vec![Alert::error(format!("unknown attribute {first_name:?}"))];
        };
        let Some(second) = ctx.attributes.get(second_name).cloned() else {
            return vec![Alert::error(format!("unknown attribute {second_name:?}"))];
        };

        if first.element_kind != second.element_kind {
            return vec![Alert::error("Attributes must both be node or edge attributes, not a mixture")];
        }

        match first.element_kind {
            ElementKind::Node => {
                let domain = ctx.graph.node_ids();
                synthesise_combined(ctx, domain, first, second, self.template.clone(), self.new_name.clone());
            }
            ElementKind::Edge => {
                let domain = ctx.graph.edge_ids();
                synthesise_combined(ctx, domain, first, second, self.template.clone(), self.new_name.clone());
            }
            ElementKind::Component => {}
        }

        Vec::new()
    }
}

pub struct AverageTransform {
    categorical_attribute: Option<String>,
    numerical_attribute: Option<String>,
}

impl AverageTransform {
    pub fn from_config(config: &TransformConfig) -> Self {
        Self {
            categorical_attribute: config.attributes.first().cloned(),
            numerical_attribute: config.attributes.get(1).cloned(),
        }
    }
}

fn synthesise_average<E: ElementId + 'static>(
    ctx: &mut TransformContext,
    domain: Vec<E>,
    categorical: &Attribute,
    numerical: &Attribute,
    new_name: String,
    description: String,
) {
    let mut totals: HashMap<String, (usize, f64)> = HashMap::new();
    for &id in &domain {
        let key = categorical.string_value_of(id);
        if key.is_empty() {
            continue;
        }
        let entry = totals.entry(key).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += numerical.float_value_of(id);
    }

    let means: HashMap<String, f64> =
        totals.into_iter().map(|(key, (count, total))| (key, total / count as f64)).collect();

    let per_element: HashMap<E, f64> =
        domain.iter().map(|&id| (id, means.get(&categorical.string_value_of(id)).copied().unwrap_or(0.0))).collect();

    let domain_ids = domain;
    ctx.attributes.insert(
        Attribute::from_float(new_name, move || domain_ids.clone(), move |id: E| Some(*per_element.get(&id).unwrap_or(&0.0)))
            .with_description(description)
            .with_flags(AttributeFlags { auto_range: true, ..Default::default() }),
    );
}

impl GraphTransform for AverageTransform {
    fn apply(&self, ctx: &mut TransformContext) -> Vec<Alert> {
        ctx.set_phase("Averaging Attribute");

        let (Some(categorical_name), Some(numerical_name)) = (&self.categorical_attribute, &self.numerical_attribute)
        else {
            return vec![Alert::error("Invalid parameters")];
        };

        let Some(categorical) = ctx.attributes.get(categorical_name).cloned() else {
            return vec![Alert::error(format!("unknown attribute {categorical_name:?}"))];
        };
        let Some(numerical) = ctx.attributes.get(numerical_name).cloned() else {
            return vec![Alert::error(format!("unknown attribute {numerical_name:?}"))];
        };

        if categorical.element_kind != numerical.element_kind {
            return vec![Alert::error("Attributes must both be node or edge attributes, not a mixture")];
        }

        let new_name = format!("Mean {numerical_name} of {categorical_name}");
        let description = format!("The mean of {numerical_name} for each value of {categorical_name}.");

        match categorical.element_kind {
            ElementKind::Node => {
                let domain = ctx.graph.node_ids();
                synthesise_average(ctx, domain, &categorical, &numerical, new_name, description);
            }
            ElementKind::Edge => {
                let domain = ctx.graph.edge_ids();
                synthesise_average(ctx, domain, &categorical, &numerical, new_name, description);
            }
            ElementKind::Component => {}
        }

        Vec::new()
    }
}

pub struct TypeCastTransform {
    source_attribute: Option<String>,
    target_type: String,
    new_name: String,
}

impl TypeCastTransform {
    pub fn from_config(config: &TransformConfig) -> Self {
        Self {
            source_attribute: config.attributes.first().cloned(),
            target_type: parameter_as_string(config, "Type").unwrap_or_else(|| "Integer".to_string()),
            new_name: parameter_as_string(config, "Name").unwrap_or_else(|| "New Attribute".to_string()),
        }
    }
}

fn cast_attribute<E: ElementId + 'static>(
    ctx: &mut TransformContext,
    domain: Vec<E>,
    source: Attribute,
    target_type: &str,
    new_name: String,
    description: String,
) {
    let domain_ids = domain;
    match target_type {
        "Integer" => {
            ctx.attributes.insert(
                Attribute::from_int(new_name, move || domain_ids.clone(), move |id: E| Some(source.int_value_of(id)))
                    .with_description(description)
                    .with_flags(AttributeFlags { auto_range: true, ..Default::default() }),
            );
        }
        "Float" => {
            ctx.attributes.insert(
                Attribute::from_float(new_name, move || domain_ids.clone(), move |id: E| Some(source.float_value_of(id)))
                    .with_description(description)
                    .with_flags(AttributeFlags { auto_range: true, ..Default::default() }),
            );
        }
        _ => {
            ctx.attributes.insert(
                Attribute::from_string(new_name, move || domain_ids.clone(), move |id: E| Some(source.string_value_of(id)))
                    .with_description(description)
                    .with_flags(AttributeFlags { find_shared: true, searchable: true, ..Default::default() }),
            );
        }
    }
}

impl GraphTransform for TypeCastTransform {
    fn apply(&self, ctx: &mut TransformContext) -> Vec<Alert> {
        ctx.set_phase("Type Cast");

        let Some(source_name) = &self.source_attribute else {
            return vec![Alert::error("Invalid parameter")];
        };

        if self.new_name.is_empty() {
            return vec![Alert::error("Invalid Attribute Name: ''")];
        }

        let Some(source) = ctx.attributes.get(source_name).cloned() else {
            return vec![Alert::error(format!("unknown attribute {source_name:?}"))];
        };

        let description =
            format!("A copy of the attribute '{source_name}' with its type converted to '{}'.", self.target_type);

        match source.element_kind {
            ElementKind::Node => {
                let domain = ctx.graph.node_ids();
                cast_attribute(ctx, domain, source, &self.target_type, self.new_name.clone(), description);
            }
            ElementKind::Edge => {
                let domain = ctx.graph.edge_ids();
                cast_attribute(ctx, domain, source, &self.target_type, self.new_name.clone(), description);
            }
            ElementKind::Component => {}
        }

        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeRegistry;
    use crate::graph::MutableGraph;

    fn config(text: &str) -> TransformConfig {
        crate::transform::parse_transform_config(text).unwrap()
    }

    #[test]
    fn combine_infers_int_when_every_result_parses() {
        let mut graph = MutableGraph::new();
        let a = graph.add_node();
        let b = graph.add_node();

        let mut attributes = AttributeRegistry::new();
        attributes.insert(Attribute::from_int("X", || vec![NodeId::new(0), NodeId::new(1)], |id: NodeId| {
            Some(if id.index() == 0 { 1 } else { 2 })
        }));
        attributes.insert(Attribute::from_int("Y", || vec![NodeId::new(0), NodeId::new(1)], |id: NodeId| {
            Some(if id.index() == 0 { 10 } else { 20 })
        }));

        let cfg = config("\"Combine\" using $\"X\" $\"Y\" with \"Name\" = \"Sum\" \"Attribute Value\" = \"\\1\\2\"");
        let transform = CombineTransform::from_config(&cfg);
        let mut ctx = TransformContext::new(&mut graph, &mut attributes);
        let alerts = transform.apply(&mut ctx);

        assert!(alerts.is_empty());
        let combined = attributes.get("Sum").unwrap();
        assert_eq!(combined.int_value_of(a), 110);
        assert_eq!(combined.int_value_of(b), 220);
    }

    #[test]
    fn combine_rejects_mixed_node_and_edge_attributes() {
        let mut graph = MutableGraph::new();
        let a = graph.add_node();
        let b = graph.add_node();
        graph.add_edge(a, b).unwrap();

        let mut attributes = AttributeRegistry::new();
        attributes.insert(Attribute::from_int("NodeAttr", || vec![NodeId::new(0)], |_: NodeId| Some(1)));
        attributes.insert(Attribute::from_int("EdgeAttr", || vec![EdgeId::new(0)], |_: EdgeId| Some(1)));

        let cfg = config("\"Combine\" using $\"NodeAttr\" $\"EdgeAttr\"");
        let transform = CombineTransform::from_config(&cfg);
        let mut ctx = TransformContext::new(&mut graph, &mut attributes);
        let alerts = transform.apply(&mut ctx);

        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].is_error());
    }

    #[test]
    fn average_groups_by_categorical_value() {
        let mut graph = MutableGraph::new();
        let a = graph.add_node();
        let b = graph.add_node();
        let c = graph.add_node();

        let mut attributes = AttributeRegistry::new();
        attributes.insert(Attribute::from_string(
            "Group",
            || vec![NodeId::new(0), NodeId::new(1), NodeId::new(2)],
            |id: NodeId| Some(if id.index() == 2 { "y".to_string() } else { "x".to_string() }),
        ));
        attributes.insert(Attribute::from_int(
            "Score",
            || vec![NodeId::new(0), NodeId::new(1), NodeId::new(2)],
            |id: NodeId| Some(match id.index() { 0 => 10, 1 => 20, _ => 99 }),
        ));

        let cfg = config("\"Average\" using $\"Group\" $\"Score\"");
        let transform = AverageTransform::from_config(&cfg);
        let mut ctx = TransformContext::new(&mut graph, &mut attributes);
        let alerts = transform.apply(&mut ctx);

        assert!(alerts.is_empty());
        let mean = attributes.get("Mean Score of Group").unwrap();
        assert_eq!(mean.float_value_of(a), 15.0);
        assert_eq!(mean.float_value_of(b), 15.0);
        assert_eq!(mean.float_value_of(c), 99.0);
    }

    #[test]
    fn type_cast_to_float_reads_through_the_source_attribute() {
        let mut graph = MutableGraph::new();
        let a = graph.add_node();

        let mut attributes = AttributeRegistry::new();
        attributes.insert(Attribute::from_string("Raw", || vec![NodeId::new(0)], |_: NodeId| Some("3.5".to_string())));

        let cfg = config("\"Type Cast\" using $\"Raw\" with \"Type\" = \"Float\" \"Name\" = \"AsFloat\"");
        let transform = TypeCastTransform::from_config(&cfg);
        let mut ctx = TransformContext::new(&mut graph, &mut attributes);
        let alerts = transform.apply(&mut ctx);

        assert!(alerts.is_empty());
        assert_eq!(attributes.get("AsFloat").unwrap().float_value_of(a), 3.5);
    }
}
