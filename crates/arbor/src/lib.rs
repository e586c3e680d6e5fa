//! Persistent labeled trees with stable node identity and path-rewrite
//! transforms.
//!
//! Edits never mutate a published tree: they return a new root that shares
//! every untouched subtree with its predecessor, while copied spine nodes
//! keep their serial numbers. References into an old root ([`Finger`]s) are
//! remapped into its successors through composable [`PathTransform`]s,
//! derived lazily by diffing the identities two roots share; what cannot be
//! translated survives as residue.

mod convert;
mod edit;
mod error;
mod finger;
mod layout;
mod macros;
mod node;
mod path;
mod search;
mod serial;
mod transform;
mod traverse;
mod utility_types;
mod validate;

pub use crate::{
    convert::{AlistForm, AlistSlot, ListForm, to_alist, to_list, to_list_with},
    edit::{
        insert, insert_node, less, less_node, path_of_node, splice, splice_node, swap, swap_nodes, with, with_node,
    },
    error::{PathErrorReason, TreeError},
    finger::{Finger, populate_fingers},
    layout::{Arity, Layout, Slot},
    node::{Child, Copier, Node, NodeBuilder, SlotValue, lookup, path_valid},
    path::{Path, PathStep, SlotName},
    search::{
        count, count_if, count_if_not, find, find_if, find_if_not, map_tree, position, position_if, reduce, remove,
        remove_if, remove_if_not, substitute, substitute_if, substitute_if_not, substitute_with,
    },
    serial::SerialNumber,
    transform::{PathTransform, PatternStep, Status, TransformEntry, path_transform_of, transform_finger, transform_of},
    traverse::{Preorder, preorder, traverse, traverse_with_paths},
    utility_types::NodeOrLeaf,
    validate::{node_can_implant, node_valid, nodes_disjoint},
};
