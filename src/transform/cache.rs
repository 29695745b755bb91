//! `TransformCache`: per-pipeline-position memoisation of a rebuild.
//!
//! Grounded on `transformedgraph.cpp`'s usage of `TransformCache` (the
//! standalone `transformcache.{h,cpp}` translation units did not survive the
//! filtered source pack; this crate's cache is reconstructed from how
//! `TransformedGraph::rebuild` drives it). A rebuild walks its transform list
//! in order; each position's config is compared against whatever config
//! occupied that position last time. The first position whose config differs
//! invalidates itself and every position after it — a transform's output can
//! depend on the graph state left by every transform before it, so a cache
//! hit at position `i` is only valid if every position `0..=i` also hit.
//!
//! An external attribute edit (`attributeAddedOrChanged`) invalidates any
//! cached entry whose config references that attribute by name, along with
//! everything after it, via the same prefix rule.

use crate::attribute::AttributeRegistry;
use crate::graph::MutableGraph;
use crate::transform::TransformConfig;

/// One memoised transform application: the config that produced it, the
/// resulting graph snapshot, and the attribute names it added or changed.
pub struct CacheEntry {
    config: TransformConfig,
    graph: MutableGraph,
    attributes: AttributeRegistry,
    added_or_changed_attributes: Vec<String>,
}

#[derive(Default)]
pub struct TransformCache {
    entries: Vec<CacheEntry>,
}

impl TransformCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// A hit at `index` if a prior entry exists there with an equivalent
    /// config (inert flags ignored, matching undo/redo comparisons).
    pub fn hit(&self, index: usize, config: &TransformConfig) -> Option<&CacheEntry> {
        self.entries.get(index).filter(|entry| entry.config.equals(config, true))
    }

    /// Record a freshly-applied transform's result at `index`, truncating
    /// away any stale entries that followed it.
    pub fn record(
        &mut self,
        index: usize,
        config: TransformConfig,
        graph: MutableGraph,
        attributes: AttributeRegistry,
        added_or_changed_attributes: Vec<String>,
    ) {
        self.entries.truncate(index);
        debug_assert_eq!(self.entries.len(), index);
        self.entries.push(CacheEntry { config, graph, attributes, added_or_changed_attributes });
    }

    /// Reuse a hit at `index` as-is (config unchanged, no need to truncate).
    pub fn keep(&self, index: usize) -> bool {
        index < self.entries.len()
    }

    /// Drop every entry from `index` onward (config at `index` changed).
    pub fn invalidate_from(&mut self, index: usize) {
        self.entries.truncate(index);
    }

    /// Drop every entry whose config references `attribute_name`, and
    /// everything after it. Returns whether anything was invalidated.
    pub fn attribute_added_or_changed(&mut self, attribute_name: &str) -> bool {
        let cut = self
            .entries
            .iter()
            .position(|entry| entry.config.referenced_attribute_names().iter().any(|n| n == attribute_name));

        match cut {
            Some(index) => {
                self.entries.truncate(index);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// The graph as it stood after the last entry, if any — the starting
    /// point for a rollback when a rebuild is cancelled partway through.
    pub fn graph(&self) -> Option<&MutableGraph> {
        self.entries.last().map(|e| &e.graph)
    }

    pub fn attributes(&self) -> Option<&AttributeRegistry> {
        self.entries.last().map(|e| &e.attributes)
    }

    /// Every attribute name any cached entry added or changed, in pipeline
    /// order, deduplicated by first occurrence.
    pub fn added_or_changed_attribute_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for entry in &self.entries {
            for name in &entry.added_or_changed_attributes {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
        names
    }
}

impl CacheEntry {
    pub fn graph(&self) -> &MutableGraph {
        &self.graph
    }

    pub fn attributes(&self) -> &AttributeRegistry {
        &self.attributes
    }

    pub fn added_or_changed_attributes(&self) -> &[String] {
        &self.added_or_changed_attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MutableGraph;

    fn config(text: &str) -> TransformConfig {
        crate::transform::parse_transform_config(text).unwrap()
    }

    #[test]
    fn hit_requires_an_equivalent_config_at_the_same_position() {
        let mut cache = TransformCache::new();
        let a = config("\"Remove Leaves\"");
        cache.record(0, a.clone(), MutableGraph::new(), AttributeRegistry::new(), vec![]);

        assert!(cache.hit(0, &a).is_some());

        let b = config("\"Remove Branches\"");
        assert!(cache.hit(0, &b).is_none());
    }

    #[test]
    fn recording_a_changed_config_truncates_everything_after_it() {
        let mut cache = TransformCache::new();
        let a = config("\"Remove Leaves\"");
        let b = config("\"Remove Branches\"");
        cache.record(0, a.clone(), MutableGraph::new(), AttributeRegistry::new(), vec![]);
        cache.record(1, b.clone(), MutableGraph::new(), AttributeRegistry::new(), vec![]);
        assert_eq!(cache.len(), 2);

        let changed = config("\"Spanning Forest\"");
        cache.record(0, changed, MutableGraph::new(), AttributeRegistry::new(), vec![]);
        assert_eq!(cache.len(), 1, "position 1's stale entry must not survive a change at position 0");
    }

    #[test]
    fn attribute_change_invalidates_from_the_first_referencing_entry() {
        let mut cache = TransformCache::new();
        let unrelated = config("\"Remove Leaves\"");
        let referencing = config("\"k-NN\" using $\"Weight\" with \"k\" = 2");
        cache.record(0, unrelated, MutableGraph::new(), AttributeRegistry::new(), vec![]);
        cache.record(1, referencing, MutableGraph::new(), AttributeRegistry::new(), vec![]);

        let affected = cache.attribute_added_or_changed("Weight");
        assert!(affected);
        assert_eq!(cache.len(), 1, "the unrelated entry at position 0 survives");
    }

    #[test]
    fn unrelated_attribute_change_leaves_cache_untouched() {
        let mut cache = TransformCache::new();
        cache.record(0, config("\"Remove Leaves\""), MutableGraph::new(), AttributeRegistry::new(), vec![]);

        assert!(!cache.attribute_added_or_changed("Nonexistent"));
        assert_eq!(cache.len(), 1);
    }
}
