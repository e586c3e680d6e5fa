use std::sync::Arc;

use crate::node::{Child, Node, SlotValue};
use crate::path::PathStep;
use crate::utility_types::NodeOrLeaf;

/// Preorder, left-to-right walk over the nodes of `root`.
///
/// The visitor returns a continue flag; `false` skips that node's subtree.
/// Leaf atoms embedded in child positions are passed over without recursion.
/// Uses an explicit stack, so arbitrarily wide trees cost no call depth.
pub fn traverse<D>(root: &Arc<Node<D>>, mut visit: impl FnMut(&Arc<Node<D>>) -> bool) {
    let mut stack: Vec<&Arc<Node<D>>> = vec![root];
    while let Some(node) = stack.pop() {
        if !visit(node) {
            continue;
        }
        let first_child = stack.len();
        stack.extend(node.children().filter_map(NodeOrLeaf::as_node));
        // entered left-to-right, popped right-to-left unless flipped
        stack[first_child..].reverse();
    }
}

/// Preorder walk handing the visitor each node's root-relative path.
///
/// Steps arrive root-first in the vocabulary of the addressed variants:
/// bare indices under a sole child list, slot names and slot-index pairs
/// elsewhere.
pub fn traverse_with_paths<D>(root: &Arc<Node<D>>, mut visit: impl FnMut(&Arc<Node<D>>, &[PathStep]) -> bool) {
    let mut scratch = Vec::new();
    walk_with_paths(root, &mut scratch, &mut visit);
}

fn walk_with_paths<D>(
    node: &Arc<Node<D>>,
    scratch: &mut Vec<PathStep>,
    visit: &mut impl FnMut(&Arc<Node<D>>, &[PathStep]) -> bool,
) {
    if !visit(node, scratch) {
        return;
    }
    for (slot_index, slot) in node.slot_values().iter().enumerate() {
        match slot {
            SlotValue::One(child) => {
                if let Some(NodeOrLeaf::Node(child)) = child {
                    scratch.push(node.step_for(slot_index, None));
                    walk_with_paths(child, scratch, visit);
                    scratch.pop();
                }
            }
            SlotValue::Many(children) => {
                for (index, child) in children.iter().enumerate() {
                    if let NodeOrLeaf::Node(child) = child {
                        scratch.push(node.step_for(slot_index, Some(index)));
                        walk_with_paths(child, scratch, visit);
                        scratch.pop();
                    }
                }
            }
        }
    }
}

/// Iterator over `root` and every descendant node, preorder.
pub fn preorder<D>(root: &Arc<Node<D>>) -> Preorder<D> {
    Preorder { stack: vec![root.clone()] }
}

pub struct Preorder<D> {
    stack: Vec<Arc<Node<D>>>,
}

impl<D> Iterator for Preorder<D> {
    type Item = Arc<Node<D>>;

    fn next(&mut self) -> Option<Arc<Node<D>>> {
        let node = self.stack.pop()?;
        let first_child = self.stack.len();
        self.stack
            .extend(node.children().filter_map(|child: &Child<D>| child.as_node().cloned()));
        self.stack[first_child..].reverse();
        Some(node)
    }
}

impl<D> std::iter::FusedIterator for Preorder<D> {}
