//! Typed errors for parsing, graph mutation and command execution.
//!
//! Semantic failures (unknown attribute, type mismatch, cancellation) are
//! *not* represented here — per the error taxonomy, those are [`crate::transform::Alert`]s
//! attached to a per-index info record and do not abort anything. These
//! types are reserved for failures that abort the operation outright:
//! malformed config text, invalid ids, and programmer errors.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("failed to parse {kind}: {input:?}")]
    Malformed { kind: &'static str, input: String },

    #[error("unterminated quoted string in {input:?}")]
    UnterminatedString { input: String },

    #[error("expected {expected}, found {found:?}")]
    Expected { expected: &'static str, found: String },

    #[error("empty input")]
    Empty,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("node id {0:?} does not exist")]
    NoSuchNode(crate::graph::NodeId),

    #[error("edge id {0:?} does not exist")]
    NoSuchEdge(crate::graph::EdgeId),

    #[error("edge endpoints ({source:?}, {target:?}) reference a node not present in the graph")]
    DanglingEdge {
        source: crate::graph::NodeId,
        target: crate::graph::NodeId,
    },
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("command was cancelled")]
    Cancelled,
    #[error("no command to undo")]
    NothingToUndo,
    #[error("no command to redo")]
    NothingToRedo,
    #[error(transparent)]
    Graph(#[from] GraphError),
}
