use std::fmt;

use crate::path::SlotName;
use crate::serial::SerialNumber;

/// Why a path step failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathErrorReason {
    /// Index past the end of the addressed child list.
    OutOfRange(usize),
    /// Bare integer step at a node without a single child list.
    BareIndex,
    /// The variant declares no slot with this name.
    UnknownSlot(SlotName),
    /// The named slot is a child list and needs an index.
    ListSlot(SlotName),
    /// A list operation was aimed at a scalar slot.
    ScalarSlot(SlotName),
    /// The named scalar slot holds no child.
    EmptySlot(SlotName),
    /// The step descended into a non-node leaf.
    IntoLeaf,
    /// The operation does not accept the empty path.
    EmptyPath,
    /// The two paths of a swap overlap.
    OverlappingSwap,
}

impl fmt::Display for PathErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathErrorReason::OutOfRange(index) => write!(f, "index {index} is out of range"),
            PathErrorReason::BareIndex => write!(f, "bare index at a node without a single child list"),
            PathErrorReason::UnknownSlot(name) => write!(f, "no slot named `{name}`"),
            PathErrorReason::ListSlot(name) => write!(f, "slot `{name}` is a child list and needs an index"),
            PathErrorReason::ScalarSlot(name) => write!(f, "slot `{name}` holds a single child, not a list"),
            PathErrorReason::EmptySlot(name) => write!(f, "slot `{name}` holds no child"),
            PathErrorReason::IntoLeaf => write!(f, "step descends into a leaf"),
            PathErrorReason::EmptyPath => write!(f, "the empty path is not accepted here"),
            PathErrorReason::OverlappingSwap => write!(f, "swap locations overlap"),
        }
    }
}

/// Errors surfaced by tree operations.
///
/// Everything fails immediately and nothing is retried; published trees are
/// immutable, so there is never partial state to unwind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// A path failed to resolve against the tree it was applied to.
    #[error("invalid path at depth {depth}: {reason}")]
    InvalidPath { depth: usize, reason: PathErrorReason },
    /// Identity search could not locate the node under the given root.
    #[error("node {serial} does not occur under the given root")]
    NodeNotFound { serial: SerialNumber },
    /// A finger was translated toward a root that no back-pointer chain
    /// reaches from the finger's own root.
    #[error("no back-pointer chain connects the finger's root to the target root")]
    InvalidTransformApply,
    /// Two reachable nodes share a serial number.
    #[error("serial number {serial} occurs more than once under a single root")]
    IdentityCollision { serial: SerialNumber },
}

impl TreeError {
    #[inline]
    pub(crate) fn invalid_path(depth: usize, reason: PathErrorReason) -> TreeError {
        TreeError::InvalidPath { depth, reason }
    }
}
