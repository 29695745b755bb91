//! The attribute model: a type-erased accessor from element-id to value.
//!
//! No standalone `attribute.h`/`valuetype.h` survived the filtered original
//! source, so this module is a struct carrying per-type closure fields plus
//! an element-kind tag, rather than a class hierarchy.

pub mod name;
pub mod registry;

use std::cell::RefCell;
use std::rc::Rc;

use crate::graph::{ElementId, ElementKind};

pub use name::{parse_attribute_name_ref, AttributeNameRef, EdgeEndpointPrefix};
pub use registry::AttributeRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Int,
    Float,
    String,
}

/// Represented as named bools rather than a bitset — there's no
/// bitflags-style crate anywhere in the retrieved corpus and seven bools
/// reads cleanly enough.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttributeFlags {
    pub auto_range: bool,
    pub find_shared: bool,
    pub searchable: bool,
    pub dynamic: bool,
    pub disable_during_transform: bool,
    pub visualise_by_component: bool,
    pub user_defined: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttributeRange {
    pub min: f64,
    pub max: f64,
}

/// A sorted `(value, count)` histogram, optionally partitioned by
/// component when [`AttributeFlags::visualise_by_component`] is set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SharedValues {
    pub global: Vec<(String, usize)>,
    pub by_component: std::collections::BTreeMap<usize, Vec<(String, usize)>>,
}

#[derive(Clone)]
struct Accessors {
    int_value_of: Rc<dyn Fn(usize) -> i64>,
    float_value_of: Rc<dyn Fn(usize) -> f64>,
    string_value_of: Rc<dyn Fn(usize) -> String>,
    value_missing_of: Rc<dyn Fn(usize) -> bool>,
    /// All currently-valid raw element indices this attribute is defined
    /// over, used to (re)compute range/shared-values.
    domain: Rc<dyn Fn() -> Vec<usize>>,
    /// Optional index -> owning component, for `visualise_by_component`.
    component_of: Option<Rc<dyn Fn(usize) -> usize>>,
}

#[derive(Clone)]
pub struct Attribute {
    pub name: String,
    pub element_kind: ElementKind,
    pub value_type: ValueType,
    pub flags: AttributeFlags,
    pub parameter: Option<String>,
    pub description: String,
    range: Rc<RefCell<Option<AttributeRange>>>,
    shared_values: Rc<RefCell<Option<SharedValues>>>,
    accessors: Accessors,
}

pub(crate) fn parse_numeric(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok()
}

impl Attribute {
    fn new(
        name: impl Into<String>,
        element_kind: ElementKind,
        value_type: ValueType,
        accessors: Accessors,
    ) -> Self {
        Self {
            name: name.into(),
            element_kind,
            value_type,
            flags: AttributeFlags::default(),
            parameter: None,
            description: String::new(),
            range: Rc::new(RefCell::new(None)),
            shared_values: Rc::new(RefCell::new(None)),
            accessors,
        }
    }

    pub fn from_int<E, F>(name: impl Into<String>, domain: F, value_of: impl Fn(E) -> Option<i64> + 'static) -> Self
    where
        E: ElementId + 'static,
        F: Fn() -> Vec<E> + 'static,
    {
        let value_of = Rc::new(value_of);
        let v1 = value_of.clone();
        let v2 = value_of.clone();
        let v3 = value_of.clone();
        let v4 = value_of;
        let domain = Rc::new(domain);
        let d1 = domain.clone();
        Attribute::new(
            name,
            E::KIND,
            ValueType::Int,
            Accessors {
                int_value_of: Rc::new(move |idx| v1(E::new(idx)).unwrap_or(0)),
                float_value_of: Rc::new(move |idx| v2(E::new(idx)).map(|v| v as f64).unwrap_or(0.0)),
                string_value_of: Rc::new(move |idx| v3(E::new(idx)).map(|v| v.to_string()).unwrap_or_default()),
                value_missing_of: Rc::new(move |idx| v4(E::new(idx)).is_none()),
                domain: Rc::new(move || d1().into_iter().map(|e| e.index()).collect()),
                component_of: None,
            },
        )
    }

    pub fn from_float<E, F>(name: impl Into<String>, domain: F, value_of: impl Fn(E) -> Option<f64> + 'static) -> Self
    where
        E: ElementId + 'static,
        F: Fn() -> Vec<E> + 'static,
    {
        let value_of = Rc::new(value_of);
        let (v1, v2, v3, v4) = (value_of.clone(), value_of.clone(), value_of.clone(), value_of);
        let domain = Rc::new(domain);
        let d1 = domain.clone();
        Attribute::new(
            name,
            E::KIND,
            ValueType::Float,
            Accessors {
                int_value_of: Rc::new(move |idx| v1(E::new(idx)).map(|v| v as i64).unwrap_or(0)),
                float_value_of: Rc::new(move |idx| v2(E::new(idx)).unwrap_or(0.0)),
                string_value_of: Rc::new(move |idx| v3(E::new(idx)).map(|v| v.to_string()).unwrap_or_default()),
                value_missing_of: Rc::new(move |idx| v4(E::new(idx)).is_none()),
                domain: Rc::new(move || d1().into_iter().map(|e| e.index()).collect()),
                component_of: None,
            },
        )
    }

    pub fn from_string<E, F>(
        name: impl Into<String>,
        domain: F,
        value_of: impl Fn(E) -> Option<String> + 'static,
    ) -> Self
    where
        E: ElementId + 'static,
        F: Fn() -> Vec<E> + 'static,
    {
        let value_of = Rc::new(value_of);
        let (v1, v2, v3, v4) = (value_of.clone(), value_of.clone(), value_of.clone(), value_of);
        let domain = Rc::new(domain);
        let d1 = domain.clone();
        Attribute::new(
            name,
            E::KIND,
            ValueType::String,
            Accessors {
                int_value_of: Rc::new(move |idx| {
                    v1(E::new(idx)).and_then(|s| parse_numeric(&s)).map(|f| f as i64).unwrap_or(0)
                }),
                float_value_of: Rc::new(move |idx| v2(E::new(idx)).and_then(|s| parse_numeric(&s)).unwrap_or(0.0)),
                string_value_of: Rc::new(move |idx| v3(E::new(idx)).unwrap_or_default()),
                value_missing_of: Rc::new(move |idx| v4(E::new(idx)).is_none()),
                domain: Rc::new(move || d1().into_iter().map(|e| e.index()).collect()),
                component_of: None,
            },
        )
    }

    pub fn with_flags(mut self, flags: AttributeFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.parameter = Some(parameter.into());
        self
    }

    pub fn with_component_of<E: ElementId + 'static>(mut self, component_of: impl Fn(E) -> usize + 'static) -> Self {
        self.accessors.component_of = Some(Rc::new(move |idx| component_of(E::new(idx))));
        self
    }

    /// `source.<name>`/`target.<name>` (§4.2): pull a node attribute's
    /// values through an edge by remapping each edge index to its source
    /// or target node index before delegating to `self`'s accessors. The
    /// resulting attribute is edge-kinded regardless of `self`'s own kind;
    /// callers are responsible for only doing this to node attributes.
    /// `edge_domain`/`endpoint_of` close over the graph the edge ids
    /// belong to.
    pub fn via_edge_endpoint(
        &self,
        edge_domain: impl Fn() -> Vec<usize> + 'static,
        endpoint_of: impl Fn(usize) -> Option<usize> + 'static,
    ) -> Attribute {
        let endpoint_of = Rc::new(endpoint_of);
        let (e1, e2, e3, e4) = (endpoint_of.clone(), endpoint_of.clone(), endpoint_of.clone(), endpoint_of);
        let a = self.accessors.clone();
        let (a1, a2, a3, a4) = (a.clone(), a.clone(), a.clone(), a);

        Attribute {
            name: self.name.clone(),
            element_kind: ElementKind::Edge,
            value_type: self.value_type,
            flags: AttributeFlags::default(),
            parameter: self.parameter.clone(),
            description: self.description.clone(),
            range: Rc::new(RefCell::new(None)),
            shared_values: Rc::new(RefCell::new(None)),
            accessors: Accessors {
                int_value_of: Rc::new(move |idx| e1(idx).map(|n| (a1.int_value_of)(n)).unwrap_or(0)),
                float_value_of: Rc::new(move |idx| e2(idx).map(|n| (a2.float_value_of)(n)).unwrap_or(0.0)),
                string_value_of: Rc::new(move |idx| e3(idx).map(|n| (a3.string_value_of)(n)).unwrap_or_default()),
                value_missing_of: Rc::new(move |idx| match e4(idx) {
                    Some(n) => (a4.value_missing_of)(n),
                    None => true,
                }),
                domain: Rc::new(edge_domain),
                component_of: None,
            },
        }
    }

    fn assert_kind<E: ElementId>(&self) {
        debug_assert_eq!(
            self.element_kind,
            E::KIND,
            "attribute {} is for {:?}, not {:?}",
            self.name,
            self.element_kind,
            E::KIND
        );
    }

    pub fn int_value_of<E: ElementId>(&self, id: E) -> i64 {
        self.assert_kind::<E>();
        (self.accessors.int_value_of)(id.index())
    }

    pub fn float_value_of<E: ElementId>(&self, id: E) -> f64 {
        self.assert_kind::<E>();
        (self.accessors.float_value_of)(id.index())
    }

    pub fn string_value_of<E: ElementId>(&self, id: E) -> String {
        self.assert_kind::<E>();
        (self.accessors.string_value_of)(id.index())
    }

    pub fn value_missing_of<E: ElementId>(&self, id: E) -> bool {
        self.assert_kind::<E>();
        (self.accessors.value_missing_of)(id.index())
    }

    // -- untyped accessors --------------------------------------------
    //
    // The visualisation pipeline resolves an attribute by name at runtime
    // and only learns its `element_kind` then, so it can't name a concrete
    // `E: ElementId` at the call site the way a transform (which always
    // knows whether it's working with `NodeId` or `EdgeId`) can. These
    // mirror the typed accessors above but operate directly on the raw
    // index, skipping `assert_kind`.

    pub fn int_value_of_index(&self, index: usize) -> i64 {
        (self.accessors.int_value_of)(index)
    }

    pub fn float_value_of_index(&self, index: usize) -> f64 {
        (self.accessors.float_value_of)(index)
    }

    pub fn string_value_of_index(&self, index: usize) -> String {
        (self.accessors.string_value_of)(index)
    }

    pub fn value_missing_of_index(&self, index: usize) -> bool {
        (self.accessors.value_missing_of)(index)
    }

    pub fn domain_indices(&self) -> Vec<usize> {
        (self.accessors.domain)()
    }

    pub fn component_of_index(&self, index: usize) -> Option<usize> {
        self.accessors.component_of.as_ref().map(|f| f(index))
    }

    pub fn range(&self) -> Option<AttributeRange> {
        *self.range.borrow()
    }

    pub fn shared_values(&self) -> Option<SharedValues> {
        self.shared_values.borrow().clone()
    }

    /// Recompute `range` (if `AutoRange`) and `shared_values` (if
    /// `FindShared`), partitioned per-component if `VisualiseByComponent`.
    pub fn recompute(&self) {
        let domain = (self.accessors.domain)();

        if self.flags.auto_range && matches!(self.value_type, ValueType::Int | ValueType::Float) {
            *self.range.borrow_mut() = self.compute_range(&domain);
        }

        if self.flags.find_shared {
            *self.shared_values.borrow_mut() = Some(self.compute_shared_values(&domain));
        }
    }

    fn compute_range(&self, domain: &[usize]) -> Option<AttributeRange> {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &idx in domain {
            if (self.accessors.value_missing_of)(idx) {
                continue;
            }
            let v = (self.accessors.float_value_of)(idx);
            min = min.min(v);
            max = max.max(v);
        }
        if min.is_finite() && max.is_finite() {
            Some(AttributeRange { min, max })
        } else {
            None
        }
    }

    fn compute_shared_values(&self, domain: &[usize]) -> SharedValues {
        let mut global: std::collections::BTreeMap<String, usize> = std::collections::BTreeMap::new();
        let mut by_component: std::collections::BTreeMap<usize, std::collections::BTreeMap<String, usize>> =
            std::collections::BTreeMap::new();

        for &idx in domain {
            if (self.accessors.value_missing_of)(idx) {
                continue;
            }
            let value = (self.accessors.string_value_of)(idx);
            *global.entry(value.clone()).or_insert(0) += 1;

            if self.flags.visualise_by_component {
                if let Some(component_of) = &self.accessors.component_of {
                    let component = component_of(idx);
                    *by_component.entry(component).or_default().entry(value).or_insert(0) += 1;
                }
            }
        }

        SharedValues {
            global: global.into_iter().collect(),
            by_component: by_component.into_iter().map(|(c, m)| (c, m.into_iter().collect())).collect(),
        }
    }
}

impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("element_kind", &self.element_kind)
            .field("value_type", &self.value_type)
            .field("flags", &self.flags)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeId;

    fn int_attribute() -> Attribute {
        Attribute::from_int(
            "Count",
            || vec![NodeId::new(0), NodeId::new(1), NodeId::new(2)],
            |id| match id.index() {
                0 => Some(3),
                1 => Some(7),
                _ => None,
            },
        )
    }

    #[test]
    fn int_coercion_matches_spec_table() {
        let a = int_attribute();
        assert_eq!(a.int_value_of(NodeId::new(0)), 3);
        assert_eq!(a.float_value_of(NodeId::new(0)), 3.0);
        assert_eq!(a.string_value_of(NodeId::new(0)), "3");
        assert!(a.value_missing_of(NodeId::new(2)));
        assert_eq!(a.int_value_of(NodeId::new(2)), 0, "missing int coerces to 0");
    }

    #[test]
    fn string_attribute_parses_numeric_content() {
        let a = Attribute::from_string(
            "Label",
            || vec![NodeId::new(0), NodeId::new(1)],
            |id| match id.index() {
                0 => Some("42".to_string()),
                _ => Some("hello".to_string()),
            },
        );
        assert_eq!(a.int_value_of(NodeId::new(0)), 42);
        assert_eq!(a.int_value_of(NodeId::new(1)), 0, "non-numeric string coerces to 0");
    }

    #[test]
    fn auto_range_recomputes_over_domain() {
        let a = int_attribute().with_flags(AttributeFlags { auto_range: true, ..Default::default() });
        a.recompute();
        let r = a.range().unwrap();
        assert_eq!(r.min, 3.0);
        assert_eq!(r.max, 7.0);
    }

    #[test]
    fn find_shared_builds_sorted_histogram() {
        let a = Attribute::from_string(
            "Group",
            || vec![NodeId::new(0), NodeId::new(1), NodeId::new(2)],
            |id| Some(if id.index() == 2 { "y".to_string() } else { "x".to_string() }),
        )
        .with_flags(AttributeFlags { find_shared: true, ..Default::default() });
        a.recompute();
        let shared = a.shared_values().unwrap();
        assert_eq!(shared.global, vec![("x".to_string(), 2), ("y".to_string(), 1)]);
    }
}
