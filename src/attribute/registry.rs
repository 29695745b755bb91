//! The live set of attributes attached to a graph model.
//!
//! Dynamic attributes are created by a transform and die at the start of the
//! next rebuild; persistent ones persist until explicit removal. `indexmap`
//! (already used upstream for config maps) gives stable, insertion-order
//! iteration, which this crate relies on for deterministic `describe` output
//! and shared-value assignment order.

use indexmap::IndexMap;

use super::Attribute;

#[derive(Default, Clone)]
pub struct AttributeRegistry {
    attributes: IndexMap<String, Attribute>,
}

impl AttributeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalise dots to underscores and uniquify against existing names,
    /// then insert. Returns the name actually used.
    pub fn insert(&mut self, mut attribute: Attribute) -> String {
        let normalised = attribute.name.replace('.', "_");
        let unique = self.uniquify(&normalised);
        attribute.name = unique.clone();
        self.attributes.insert(unique.clone(), attribute);
        unique
    }

    fn uniquify(&self, base: &str) -> String {
        if !self.attributes.contains_key(base) {
            return base.to_string();
        }
        let mut n = 1;
        loop {
            let candidate = format!("{base}({n})");
            if !self.attributes.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Attribute> {
        self.attributes.shift_remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.attributes.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Attribute)> {
        self.attributes.iter()
    }

    /// Remove every dynamic attribute, returning their names — called at
    /// the start of each rebuild.
    pub fn remove_dynamic(&mut self) -> Vec<String> {
        let dynamic_names: Vec<String> =
            self.attributes.iter().filter(|(_, a)| a.flags.dynamic).map(|(n, _)| n.clone()).collect();
        for name in &dynamic_names {
            self.attributes.shift_remove(name);
        }
        dynamic_names
    }

    pub fn recompute_all(&self) {
        for (_, attribute) in self.attributes.iter() {
            attribute.recompute();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeId;

    fn dummy(name: &str) -> Attribute {
        Attribute::from_int(name, || vec![NodeId::new(0)], |_| Some(1))
    }

    #[test]
    fn dot_normalisation_and_uniquify() {
        let mut reg = AttributeRegistry::new();
        let first = reg.insert(dummy("a.b"));
        assert_eq!(first, "a_b");

        let second = reg.insert(dummy("a.b"));
        assert_eq!(second, "a_b(1)");
    }

    #[test]
    fn dynamic_attributes_are_cleared() {
        let mut reg = AttributeRegistry::new();
        let mut dyn_attr = dummy("Louvain Cluster");
        dyn_attr.flags.dynamic = true;
        reg.insert(dyn_attr);
        reg.insert(dummy("Persistent"));

        let removed = reg.remove_dynamic();
        assert_eq!(removed, vec!["Louvain Cluster".to_string()]);
        assert!(reg.contains("Persistent"));
        assert!(!reg.contains("Louvain Cluster"));
    }
}
