//! Element ids, element-indexed arrays, and the mutable source graph.

pub mod array;
pub mod element_id;
pub mod io;
pub mod mutable_graph;

pub use array::{ArrayRegistry, ElementIdArray};
pub use element_id::{ComponentId, EdgeId, ElementId, ElementKind, IdAllocator, NodeId};
pub use io::GraphSnapshot;
pub use mutable_graph::{Edge, GraphEvent, MultiElementType, MutableGraph, Node};
