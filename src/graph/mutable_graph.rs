//! The authoritative mutable graph.
//!
//! The teacher's root `src/graph.rs` offered only a flat `Graph{nodes,edges}`
//! with no transaction/multi-edge support; this module generalises that
//! shape to dense recyclable ids, transactional batching and edge
//! contraction.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::GraphError;
use crate::graph::array::ArrayRegistry;
use crate::graph::element_id::{EdgeId, ElementId, IdAllocator, NodeId};

/// Whether a node id is an ordinary singleton, the surviving representative
/// of a merge produced by [`MutableGraph::contract_edges`], or a
/// non-representative member (never returned from a live-id query — see the
/// module doc).
///
/// Contraction in this crate frees non-representative ids outright rather
/// than keeping them addressable-but-hidden, so the post-contraction node
/// *count* actually drops. Their membership is retained via
/// [`MutableGraph::merged_node_ids_for_node_id`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiElementType {
    Not,
    Head,
    Tail,
}

#[derive(Debug, Clone, Default)]
pub struct Node {
    pub id: NodeId,
    pub in_edges: Vec<EdgeId>,
    pub out_edges: Vec<EdgeId>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
}

impl Edge {
    pub fn is_loop(&self) -> bool {
        self.source == self.target
    }
}

/// Structural change notifications, fired synchronously as the graph
/// mutates. `WillChange` precedes a transaction's edits; `Changed` follows
/// the outer commit with whether anything actually changed.
#[derive(Debug, Clone, Copy)]
pub enum GraphEvent {
    WillChange,
    NodeAdded(NodeId),
    NodeRemoved(NodeId),
    EdgeAdded(EdgeId),
    EdgeRemoved(EdgeId),
    Changed { any_change: bool },
}

type Listener = Box<dyn FnMut(&GraphEvent)>;

pub struct MutableGraph {
    node_alloc: IdAllocator<NodeId>,
    edge_alloc: IdAllocator<EdgeId>,
    nodes: Vec<Option<Node>>,
    edges: Vec<Option<Edge>>,
    /// representative -> full membership (including itself), present only
    /// for ids that have absorbed at least one contraction.
    merged_node_members: HashMap<NodeId, Vec<NodeId>>,
    /// any id ever merged away -> its current representative.
    redirect: HashMap<NodeId, NodeId>,
    node_registry: Rc<ArrayRegistry>,
    edge_registry: Rc<ArrayRegistry>,
    transaction_depth: usize,
    transaction_changed: bool,
    listeners: Vec<Listener>,
}

impl Default for MutableGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl MutableGraph {
    pub fn new() -> Self {
        Self {
            node_alloc: IdAllocator::new(),
            edge_alloc: IdAllocator::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
            merged_node_members: HashMap::new(),
            redirect: HashMap::new(),
            node_registry: ArrayRegistry::new(),
            edge_registry: ArrayRegistry::new(),
            transaction_depth: 0,
            transaction_changed: false,
            listeners: Vec::new(),
        }
    }

    pub fn node_registry(&self) -> &Rc<ArrayRegistry> {
        &self.node_registry
    }

    pub fn edge_registry(&self) -> &Rc<ArrayRegistry> {
        &self.edge_registry
    }

    pub fn on_event(&mut self, listener: impl FnMut(&GraphEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn emit(&mut self, event: GraphEvent) {
        let mut listeners = std::mem::take(&mut self.listeners);
        for listener in listeners.iter_mut() {
            listener(&event);
        }
        self.listeners = listeners;
    }

    /// A mutation is "in progress" while a transaction is open; observers
    /// wanting a consistent snapshot should treat this as a `try_lock`.
    pub fn mutation_in_progress(&self) -> bool {
        self.transaction_depth > 0
    }

    /// Atomically group a batch of mutations. Nested calls flatten into the
    /// outermost transaction: `graphWillChange`/`graphChanged` fire once per
    /// outer commit regardless of nesting depth.
    pub fn perform_transaction<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        if self.transaction_depth == 0 {
            self.emit(GraphEvent::WillChange);
            self.transaction_changed = false;
        }
        self.transaction_depth += 1;

        let result = f(self);

        self.transaction_depth -= 1;
        if self.transaction_depth == 0 {
            let any_change = self.transaction_changed;
            self.emit(GraphEvent::Changed { any_change });
        }

        result
    }

    fn mark_changed(&mut self) {
        self.transaction_changed = true;
    }

    // -- nodes ---------------------------------------------------------

    pub fn add_node(&mut self) -> NodeId {
        self.perform_transaction(|g| g.add_node_internal())
    }

    pub fn add_nodes(&mut self, count: usize) -> Vec<NodeId> {
        self.perform_transaction(|g| (0..count).map(|_| g.add_node_internal()).collect())
    }

    fn add_node_internal(&mut self) -> NodeId {
        let id = self.node_alloc.allocate();
        if id.index() >= self.nodes.len() {
            self.nodes.resize(id.index() + 1, None);
        }
        self.nodes[id.index()] = Some(Node { id, in_edges: Vec::new(), out_edges: Vec::new() });
        self.node_registry.resize_all(self.node_alloc.next_id_bound());
        self.mark_changed();
        self.emit(GraphEvent::NodeAdded(id));
        id
    }

    pub fn remove_node(&mut self, id: NodeId) {
        self.perform_transaction(|g| g.remove_node_internal(id));
    }

    pub fn remove_nodes(&mut self, ids: &[NodeId]) {
        let ids = ids.to_vec();
        self.perform_transaction(|g| {
            for id in ids {
                g.remove_node_internal(id);
            }
        });
    }

    fn remove_node_internal(&mut self, id: NodeId) {
        if !self.node_alloc.is_live(id) {
            return;
        }

        let incident: Vec<EdgeId> = {
            let node = self.nodes[id.index()].as_ref().expect("live node must have data");
            node.in_edges.iter().chain(node.out_edges.iter()).copied().collect()
        };
        for eid in incident {
            self.remove_edge_internal(eid);
        }

        self.free_node_internal(id);
    }

    fn free_node_internal(&mut self, id: NodeId) {
        self.nodes[id.index()] = None;
        self.node_alloc.free_id(id);
        self.mark_changed();
        self.emit(GraphEvent::NodeRemoved(id));
    }

    pub fn contains_node_id(&self, id: NodeId) -> bool {
        self.node_alloc.is_live(id)
    }

    pub fn node_by_id(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index()).and_then(|n| n.as_ref())
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.node_alloc.live_ids().collect()
    }

    pub fn num_nodes(&self) -> usize {
        self.node_alloc.live_count()
    }

    // -- edges -----------------------------------------------------------

    pub fn add_edge(&mut self, source: NodeId, target: NodeId) -> Result<EdgeId, GraphError> {
        self.perform_transaction(|g| g.add_edge_internal(source, target))
    }

    pub fn add_edges(&mut self, pairs: &[(NodeId, NodeId)]) -> Result<Vec<EdgeId>, GraphError> {
        let pairs = pairs.to_vec();
        self.perform_transaction(|g| pairs.into_iter().map(|(s, t)| g.add_edge_internal(s, t)).collect())
    }

    fn add_edge_internal(&mut self, source: NodeId, target: NodeId) -> Result<EdgeId, GraphError> {
        if !self.node_alloc.is_live(source) || !self.node_alloc.is_live(target) {
            return Err(GraphError::DanglingEdge { source, target });
        }

        let id = self.edge_alloc.allocate();
        if id.index() >= self.edges.len() {
            self.edges.resize(id.index() + 1, None);
        }
        self.edges[id.index()] = Some(Edge { id, source, target });
        self.edge_registry.resize_all(self.edge_alloc.next_id_bound());

        self.nodes[source.index()].as_mut().unwrap().out_edges.push(id);
        self.nodes[target.index()].as_mut().unwrap().in_edges.push(id);

        self.mark_changed();
        self.emit(GraphEvent::EdgeAdded(id));
        Ok(id)
    }

    pub fn remove_edge(&mut self, id: EdgeId) {
        self.perform_transaction(|g| g.remove_edge_internal(id));
    }

    pub fn remove_edges(&mut self, ids: &[EdgeId]) {
        let ids = ids.to_vec();
        self.perform_transaction(|g| {
            for id in ids {
                g.remove_edge_internal(id);
            }
        });
    }

    fn remove_edge_internal(&mut self, id: EdgeId) {
        if !self.edge_alloc.is_live(id) {
            return;
        }

        let edge = self.edges[id.index()].expect("live edge must have data");
        if let Some(node) = self.nodes[edge.source.index()].as_mut() {
            node.out_edges.retain(|&e| e != id);
        }
        if let Some(node) = self.nodes[edge.target.index()].as_mut() {
            node.in_edges.retain(|&e| e != id);
        }

        self.edges[id.index()] = None;
        self.edge_alloc.free_id(id);
        self.mark_changed();
        self.emit(GraphEvent::EdgeRemoved(id));
    }

    pub fn contains_edge_id(&self, id: EdgeId) -> bool {
        self.edge_alloc.is_live(id)
    }

    pub fn edge_by_id(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.index()).and_then(|e| e.as_ref())
    }

    pub fn edge_ids(&self) -> Vec<EdgeId> {
        self.edge_alloc.live_ids().collect()
    }

    pub fn num_edges(&self) -> usize {
        self.edge_alloc.live_count()
    }

    pub fn edge_ids_between(&self, a: NodeId, b: NodeId) -> Vec<EdgeId> {
        self.edge_alloc
            .live_ids()
            .filter(|&eid| {
                let e = self.edges[eid.index()].expect("live edge must have data");
                (e.source == a && e.target == b) || (e.source == b && e.target == a)
            })
            .collect()
    }

    pub fn first_edge_id_between(&self, a: NodeId, b: NodeId) -> Option<EdgeId> {
        self.edge_alloc.live_ids().find(|&eid| {
            let e = self.edges[eid.index()].expect("live edge must have data");
            (e.source == a && e.target == b) || (e.source == b && e.target == a)
        })
    }

    pub fn edges_for_node_ids(&self, ids: &[NodeId]) -> Vec<EdgeId> {
        let mut seen = std::collections::HashSet::new();
        let mut result = Vec::new();
        for &id in ids {
            if let Some(node) = self.node_by_id(id) {
                for &eid in node.in_edges.iter().chain(node.out_edges.iter()) {
                    if seen.insert(eid) {
                        result.push(eid);
                    }
                }
            }
        }
        result
    }

    // -- contraction -------------------------------------------------------

    /// For each edge in `ids`, merge its endpoints into a single
    /// representative node (the lower-indexed of the two representatives);
    /// the contracted edge itself is removed, surviving incident edges are
    /// re-wired to the representative, and the absorbed node becomes a
    /// `Tail` whose membership is recorded against the representative.
    pub fn contract_edges(&mut self, ids: &[EdgeId]) {
        let ids = ids.to_vec();
        self.perform_transaction(|g| {
            for eid in ids {
                if !g.edge_alloc.is_live(eid) {
                    continue;
                }
                let edge = g.edges[eid.index()].expect("live edge must have data");
                if edge.source != edge.target {
                    g.merge_nodes(edge.source, edge.target);
                }
                g.remove_edge_internal(eid);
            }
        });
    }

    fn representative(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(&next) = self.redirect.get(&current) {
            current = next;
        }
        current
    }

    fn merge_nodes(&mut self, a: NodeId, b: NodeId) {
        let ra = self.representative(a);
        let rb = self.representative(b);
        if ra == rb {
            return;
        }

        let (keep, other) = if ra.index() <= rb.index() { (ra, rb) } else { (rb, ra) };

        let other_edges: Vec<EdgeId> = {
            let node = self.nodes[other.index()].as_ref().expect("live node must have data");
            node.in_edges.iter().chain(node.out_edges.iter()).copied().collect()
        };
        for eid in &other_edges {
            if let Some(edge) = self.edges[eid.index()].as_mut() {
                if edge.source == other {
                    edge.source = keep;
                }
                if edge.target == other {
                    edge.target = keep;
                }
            }
        }

        let (other_in, other_out) = {
            let node = self.nodes[other.index()].as_ref().expect("live node must have data");
            (node.in_edges.clone(), node.out_edges.clone())
        };
        if let Some(keep_node) = self.nodes[keep.index()].as_mut() {
            keep_node.in_edges.extend(other_in);
            keep_node.out_edges.extend(other_out);
        }

        let other_members = self.merged_node_members.remove(&other).unwrap_or_else(|| vec![other]);
        self.merged_node_members
            .entry(keep)
            .or_insert_with(|| vec![keep])
            .extend(other_members.iter().copied());
        for member in &other_members {
            self.redirect.insert(*member, keep);
        }

        self.free_node_internal(other);
    }

    pub fn type_of(&self, id: NodeId) -> MultiElementType {
        if self.merged_node_members.get(&id).map_or(false, |members| members.len() > 1) {
            MultiElementType::Head
        } else if self.redirect.contains_key(&id) {
            MultiElementType::Tail
        } else {
            MultiElementType::Not
        }
    }

    pub fn merged_node_ids_for_node_id(&self, id: NodeId) -> Vec<NodeId> {
        let representative = self.representative(id);
        self.merged_node_members
            .get(&representative)
            .cloned()
            .unwrap_or_else(|| vec![representative])
    }

    // -- whole-graph operations -------------------------------------------

    /// Reserve capacity for growth to the size of `other` (used before a
    /// bulk assignment to avoid repeated reallocation).
    pub fn reserve(&mut self, other: &MutableGraph) {
        self.nodes.reserve(other.nodes.len());
        self.edges.reserve(other.edges.len());
    }

    /// Replace this graph's data with a copy of `other`'s, preserving this
    /// graph's own identity (registries, listeners). Mirrors the source's
    /// `operator=(const MutableGraph&)`.
    pub fn assign_from(&mut self, other: &MutableGraph) {
        self.node_alloc = other.node_alloc.clone();
        self.edge_alloc = other.edge_alloc.clone();
        self.nodes = other.nodes.clone();
        self.edges = other.edges.clone();
        self.merged_node_members = other.merged_node_members.clone();
        self.redirect = other.redirect.clone();

        self.node_registry.resize_all(self.node_alloc.next_id_bound());
        self.edge_registry.resize_all(self.edge_alloc.next_id_bound());
    }

    /// A wholly independent copy: fresh registries, no listeners. Used by
    /// the transform cache to snapshot a derived graph.
    pub fn snapshot(&self) -> MutableGraph {
        let mut copy = MutableGraph::new();
        copy.assign_from(self);
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_mutation_and_invariants() {
        let mut g = MutableGraph::new();
        let a = g.add_node();
        let b = g.add_node();
        let e = g.add_edge(a, b).unwrap();

        assert_eq!(g.num_nodes(), 2);
        assert_eq!(g.num_edges(), 1);
        assert!(g.edge_by_id(e).unwrap().source == a);
    }

    #[test]
    fn dangling_edge_is_rejected() {
        let mut g = MutableGraph::new();
        let a = g.add_node();
        let ghost = NodeId::new(999);
        assert!(g.add_edge(a, ghost).is_err());
    }

    #[test]
    fn remove_node_cascades_to_incident_edges() {
        let mut g = MutableGraph::new();
        let a = g.add_node();
        let b = g.add_node();
        let _e = g.add_edge(a, b).unwrap();

        g.remove_node(a);
        assert_eq!(g.num_nodes(), 1);
        assert_eq!(g.num_edges(), 0, "removing a node must cascade to its incident edges");
    }

    #[test]
    fn transaction_emits_single_changed_event() {
        let mut g = MutableGraph::new();
        let events = Rc::new(std::cell::RefCell::new(Vec::new()));
        let events_clone = events.clone();
        g.on_event(move |ev| {
            if let GraphEvent::Changed { any_change } = ev {
                events_clone.borrow_mut().push(*any_change);
            }
        });

        g.perform_transaction(|g| {
            g.add_node_internal();
            g.add_node_internal();
        });

        assert_eq!(events.borrow().as_slice(), &[true]);
    }

    #[test]
    fn contract_edges_merges_and_reduces_node_count() {
        // A-B-C chain; contracting A-B should leave 2 nodes and 1 edge.
        let mut g = MutableGraph::new();
        let a = g.add_node();
        let b = g.add_node();
        let c = g.add_node();
        let ab = g.add_edge(a, b).unwrap();
        let _bc = g.add_edge(b, c).unwrap();

        g.contract_edges(&[ab]);

        assert_eq!(g.num_nodes(), 2);
        assert_eq!(g.num_edges(), 1);

        let representative = g.representative(a);
        assert_eq!(g.merged_node_ids_for_node_id(representative).len(), 2);
        assert_eq!(g.type_of(representative), MultiElementType::Head);
    }
}
