use std::sync::Arc;

use crate::error::{PathErrorReason, TreeError};
use crate::node::{Child, Node, SlotValue, lookup};
use crate::path::{Path, PathStep, SlotName};
use crate::traverse::traverse_with_paths;
use crate::utility_types::NodeOrLeaf;

/// What happens at the final step of a spine rebuild.
enum SpliceOp<D> {
    Replace(Child<D>),
    Remove,
    Insert(Vec<Child<D>>),
}

/// Replaces the subtree at `path` with `value`.
///
/// Ancestors along the spine are rebuilt with their serial numbers intact;
/// every untouched subtree is shared with `tree`. The result records `tree`
/// as its predecessor, so fingers into `tree` can be translated forward.
/// Replacing at the empty path requires `value` to be a node; a vacant
/// scalar slot accepts a replacement, refilling it in place.
pub fn with<D: Clone>(tree: &Arc<Node<D>>, path: &Path, value: Child<D>) -> Result<Arc<Node<D>>, TreeError> {
    if path.is_root() {
        return match value {
            NodeOrLeaf::Node(node) => Ok(node.copy().predecessor(tree.clone()).finish()),
            NodeOrLeaf::Leaf(_) => Err(TreeError::invalid_path(0, PathErrorReason::EmptyPath)),
        };
    }
    rebuild(tree, path.steps(), 0, SpliceOp::Replace(value), Some(tree))
}

/// Deletes the subtree at `path`; the enclosing list shrinks by one, a
/// scalar slot becomes vacant. Deleting the root is a caller error.
pub fn less<D: Clone>(tree: &Arc<Node<D>>, path: &Path) -> Result<Arc<Node<D>>, TreeError> {
    if path.is_root() {
        return Err(TreeError::invalid_path(0, PathErrorReason::EmptyPath));
    }
    rebuild(tree, path.steps(), 0, SpliceOp::Remove, Some(tree))
}

/// Inserts `value` so that it ends up at `path`; following siblings shift
/// right. An index equal to the list length appends.
pub fn insert<D: Clone>(tree: &Arc<Node<D>>, path: &Path, value: Child<D>) -> Result<Arc<Node<D>>, TreeError> {
    if path.is_root() {
        return Err(TreeError::invalid_path(0, PathErrorReason::EmptyPath));
    }
    rebuild(tree, path.steps(), 0, SpliceOp::Insert(vec![value]), Some(tree))
}

/// Inserts `values` in order starting at `path`.
///
/// Splicing the empty list is the identity shape: the input root comes back
/// untouched once the insertion point has been validated.
pub fn splice<D: Clone>(tree: &Arc<Node<D>>, path: &Path, values: Vec<Child<D>>) -> Result<Arc<Node<D>>, TreeError> {
    if path.is_root() {
        return Err(TreeError::invalid_path(0, PathErrorReason::EmptyPath));
    }
    if values.is_empty() {
        check_splice_point(tree, path)?;
        return Ok(tree.clone());
    }
    rebuild(tree, path.steps(), 0, SpliceOp::Insert(values), Some(tree))
}

/// Exchanges the subtrees at `a` and `b`.
///
/// Commutative in its arguments, and its own inverse up to structural
/// equality. Overlapping locations are rejected; the result's predecessor is
/// `tree` itself, so the derived transform sees one clean exchange.
pub fn swap<D: Clone>(tree: &Arc<Node<D>>, a: &Path, b: &Path) -> Result<Arc<Node<D>>, TreeError> {
    if a.is_prefix_of(b) || b.is_prefix_of(a) {
        return Err(TreeError::invalid_path(0, PathErrorReason::OverlappingSwap));
    }
    let at_a = lookup(tree, a)?;
    let at_b = lookup(tree, b)?;
    let halfway = rebuild(tree, a.steps(), 0, SpliceOp::Replace(at_b), None)?;
    rebuild(&halfway, b.steps(), 0, SpliceOp::Replace(at_a), Some(tree))
}

/// Path at which `node` occurs under `tree`, located by identity.
pub fn path_of_node<D>(tree: &Arc<Node<D>>, node: &Node<D>) -> Result<Path, TreeError> {
    let serial = node.serial();
    let mut found: Option<Path> = None;
    traverse_with_paths(tree, |candidate, path| {
        if found.is_some() {
            return false;
        }
        if candidate.serial() == serial {
            found = Some(Path::from(path));
            return false;
        }
        true
    });
    found.ok_or(TreeError::NodeNotFound { serial })
}

/// [`with`], addressing the target by identity.
pub fn with_node<D: Clone>(tree: &Arc<Node<D>>, node: &Node<D>, value: Child<D>) -> Result<Arc<Node<D>>, TreeError> {
    with(tree, &path_of_node(tree, node)?, value)
}

/// [`less`], addressing the target by identity.
pub fn less_node<D: Clone>(tree: &Arc<Node<D>>, node: &Node<D>) -> Result<Arc<Node<D>>, TreeError> {
    less(tree, &path_of_node(tree, node)?)
}

/// [`insert`], addressing the insertion point by identity: the new value
/// lands where `node` currently sits, pushing it right.
pub fn insert_node<D: Clone>(tree: &Arc<Node<D>>, node: &Node<D>, value: Child<D>) -> Result<Arc<Node<D>>, TreeError> {
    insert(tree, &path_of_node(tree, node)?, value)
}

/// [`splice`], addressing the insertion point by identity.
pub fn splice_node<D: Clone>(
    tree: &Arc<Node<D>>,
    node: &Node<D>,
    values: Vec<Child<D>>,
) -> Result<Arc<Node<D>>, TreeError> {
    splice(tree, &path_of_node(tree, node)?, values)
}

/// [`swap`], addressing both subtrees by identity.
pub fn swap_nodes<D: Clone>(tree: &Arc<Node<D>>, a: &Node<D>, b: &Node<D>) -> Result<Arc<Node<D>>, TreeError> {
    swap(tree, &path_of_node(tree, a)?, &path_of_node(tree, b)?)
}

/// Rebuilds the spine from `node` down along `steps`, applying `op` at the
/// final step. Only the topmost copy records `predecessor`.
fn rebuild<D: Clone>(
    node: &Arc<Node<D>>,
    steps: &[PathStep],
    depth: usize,
    op: SpliceOp<D>,
    predecessor: Option<&Arc<Node<D>>>,
) -> Result<Arc<Node<D>>, TreeError> {
    let step = &steps[0];
    let (slot_index, list_index) = node.locate(step, depth)?;
    let slot_name = node.layout().slots[slot_index].name;
    let mut slot = node.slot_values()[slot_index].clone();

    if steps.len() == 1 {
        apply_op(&mut slot, slot_name, list_index, op, depth)?;
    } else {
        let child = node.get_step_at(step, depth)?;
        let child = match child {
            NodeOrLeaf::Node(child) => child.clone(),
            NodeOrLeaf::Leaf(_) => {
                return Err(TreeError::invalid_path(depth + 1, PathErrorReason::IntoLeaf));
            }
        };
        let rebuilt = rebuild(&child, &steps[1..], depth + 1, op, None)?;
        set_child(&mut slot, list_index, NodeOrLeaf::Node(rebuilt));
    }

    let mut copier = node.copy().slot(slot_name, slot);
    if let Some(predecessor) = predecessor {
        copier = copier.predecessor(predecessor.clone());
    }
    Ok(copier.finish())
}

fn apply_op<D>(
    slot: &mut SlotValue<D>,
    name: SlotName,
    list_index: Option<usize>,
    op: SpliceOp<D>,
    depth: usize,
) -> Result<(), TreeError> {
    match (slot, list_index) {
        (SlotValue::One(child), None) => match op {
            SpliceOp::Replace(value) => {
                *child = Some(value);
                Ok(())
            }
            SpliceOp::Remove => {
                if child.is_none() {
                    return Err(TreeError::invalid_path(depth, PathErrorReason::EmptySlot(name)));
                }
                *child = None;
                Ok(())
            }
            SpliceOp::Insert(_) => Err(TreeError::invalid_path(depth, PathErrorReason::ScalarSlot(name))),
        },
        (SlotValue::Many(children), Some(index)) => match op {
            SpliceOp::Replace(value) => {
                if index >= children.len() {
                    return Err(TreeError::invalid_path(depth, PathErrorReason::OutOfRange(index)));
                }
                children[index] = value;
                Ok(())
            }
            SpliceOp::Remove => {
                if index >= children.len() {
                    return Err(TreeError::invalid_path(depth, PathErrorReason::OutOfRange(index)));
                }
                children.remove(index);
                Ok(())
            }
            SpliceOp::Insert(values) => {
                if index > children.len() {
                    return Err(TreeError::invalid_path(depth, PathErrorReason::OutOfRange(index)));
                }
                children.splice(index..index, values);
                Ok(())
            }
        },
        _ => unreachable!("locate pairs arities with indices"),
    }
}

fn set_child<D>(slot: &mut SlotValue<D>, list_index: Option<usize>, child: Child<D>) {
    match (slot, list_index) {
        (SlotValue::One(slot), None) => *slot = Some(child),
        (SlotValue::Many(children), Some(index)) => children[index] = child,
        _ => unreachable!("locate pairs arities with indices"),
    }
}

/// Validates a splice insertion point without rebuilding anything.
fn check_splice_point<D: Clone>(tree: &Arc<Node<D>>, path: &Path) -> Result<(), TreeError> {
    let steps = path.steps();
    let parent = match path.parent() {
        Some(parent) => parent,
        None => return Err(TreeError::invalid_path(0, PathErrorReason::EmptyPath)),
    };
    let depth = steps.len() - 1;
    let parent = match lookup(tree, &parent)? {
        NodeOrLeaf::Node(node) => node,
        NodeOrLeaf::Leaf(_) => return Err(TreeError::invalid_path(depth, PathErrorReason::IntoLeaf)),
    };
    let (slot_index, list_index) = parent.locate(&steps[depth], depth)?;
    match (&parent.slot_values()[slot_index], list_index) {
        (SlotValue::Many(children), Some(index)) => {
            if index > children.len() {
                return Err(TreeError::invalid_path(depth, PathErrorReason::OutOfRange(index)));
            }
            Ok(())
        }
        _ => Err(TreeError::invalid_path(
            depth,
            PathErrorReason::ScalarSlot(parent.layout().slots[slot_index].name),
        )),
    }
}
