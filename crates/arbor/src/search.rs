use std::sync::Arc;

use crate::node::{Child, Node, SlotValue};
use crate::path::Path;
use crate::traverse::{preorder, traverse_with_paths};
use crate::utility_types::NodeOrLeaf;

/// Preorder rewrite of a tree.
///
/// `f` sees each node before its children and returns the replacement plus a
/// stop flag; the flag suppresses descent into the replacement. Children of
/// the replacement are rebuilt recursively; leaves pass through untouched.
/// Subtrees `f` leaves alone come back pointer-identical, and rebuilt nodes
/// keep their serial numbers.
pub fn map_tree<D, F>(tree: &Arc<Node<D>>, f: &mut F) -> Arc<Node<D>>
where
    D: Clone,
    F: FnMut(&Arc<Node<D>>) -> (Arc<Node<D>>, bool),
{
    let (replacement, stop) = f(tree);
    if stop {
        return replacement;
    }

    let mut changed = false;
    let new_slots: Vec<SlotValue<D>> = replacement
        .slot_values()
        .iter()
        .map(|slot| match slot {
            SlotValue::One(child) => SlotValue::One(child.as_ref().map(|child| map_child(child, f, &mut changed))),
            SlotValue::Many(children) => {
                SlotValue::Many(children.iter().map(|child| map_child(child, f, &mut changed)).collect())
            }
        })
        .collect();

    if !changed {
        return replacement;
    }
    let mut copier = replacement.copy();
    for (slot, value) in replacement.layout().slots.iter().zip(new_slots) {
        copier = copier.slot(slot.name, value);
    }
    copier.finish()
}

fn map_child<D, F>(child: &Child<D>, f: &mut F, changed: &mut bool) -> Child<D>
where
    D: Clone,
    F: FnMut(&Arc<Node<D>>) -> (Arc<Node<D>>, bool),
{
    match child {
        NodeOrLeaf::Node(node) => {
            let mapped = map_tree(node, f);
            if !Arc::ptr_eq(&mapped, node) {
                *changed = true;
            }
            NodeOrLeaf::Node(mapped)
        }
        NodeOrLeaf::Leaf(leaf) => NodeOrLeaf::Leaf(leaf.clone()),
    }
}

/// Folds `f` over the preorder sequence of node payloads.
pub fn reduce<D, A>(tree: &Arc<Node<D>>, init: A, mut f: impl FnMut(A, &D) -> A) -> A {
    let mut accumulator = init;
    for node in preorder(tree) {
        accumulator = f(accumulator, node.data());
    }
    accumulator
}

/// First node (preorder) whose payload satisfies `predicate`.
pub fn find_if<D>(tree: &Arc<Node<D>>, mut predicate: impl FnMut(&D) -> bool) -> Option<Arc<Node<D>>> {
    preorder(tree).find(|node| predicate(node.data()))
}

/// First node (preorder) whose payload equals `value`.
pub fn find<D: PartialEq>(tree: &Arc<Node<D>>, value: &D) -> Option<Arc<Node<D>>> {
    find_if(tree, |data| data == value)
}

pub fn find_if_not<D>(tree: &Arc<Node<D>>, mut predicate: impl FnMut(&D) -> bool) -> Option<Arc<Node<D>>> {
    find_if(tree, |data| !predicate(data))
}

/// Number of nodes whose payload satisfies `predicate`.
pub fn count_if<D>(tree: &Arc<Node<D>>, mut predicate: impl FnMut(&D) -> bool) -> usize {
    preorder(tree).filter(|node| predicate(node.data())).count()
}

pub fn count<D: PartialEq>(tree: &Arc<Node<D>>, value: &D) -> usize {
    count_if(tree, |data| data == value)
}

pub fn count_if_not<D>(tree: &Arc<Node<D>>, mut predicate: impl FnMut(&D) -> bool) -> usize {
    count_if(tree, |data| !predicate(data))
}

/// Path of the first node (preorder) whose payload satisfies `predicate`.
pub fn position_if<D>(tree: &Arc<Node<D>>, mut predicate: impl FnMut(&D) -> bool) -> Option<Path> {
    let mut found: Option<Path> = None;
    traverse_with_paths(tree, |node, path| {
        if found.is_some() {
            return false;
        }
        if predicate(node.data()) {
            found = Some(Path::from(path));
            return false;
        }
        true
    });
    found
}

/// Path of the first node (preorder) whose payload equals `value`.
pub fn position<D: PartialEq>(tree: &Arc<Node<D>>, value: &D) -> Option<Path> {
    position_if(tree, |data| data == value)
}

/// Drops every node whose payload satisfies `predicate`, rebuilding
/// ancestors; `None` when the root itself is dropped. Matching a node drops
/// its whole subtree.
pub fn remove_if<D: Clone>(tree: &Arc<Node<D>>, predicate: &mut impl FnMut(&D) -> bool) -> Option<Arc<Node<D>>> {
    if predicate(tree.data()) {
        return None;
    }
    Some(remove_walk(tree, predicate))
}

pub fn remove<D: Clone + PartialEq>(tree: &Arc<Node<D>>, value: &D) -> Option<Arc<Node<D>>> {
    remove_if(tree, &mut |data| data == value)
}

pub fn remove_if_not<D: Clone>(tree: &Arc<Node<D>>, predicate: &mut impl FnMut(&D) -> bool) -> Option<Arc<Node<D>>> {
    if !predicate(tree.data()) {
        return None;
    }
    Some(remove_walk(tree, &mut |data| !predicate(data)))
}

fn remove_walk<D: Clone>(node: &Arc<Node<D>>, predicate: &mut impl FnMut(&D) -> bool) -> Arc<Node<D>> {
    let mut changed = false;
    let new_slots: Vec<SlotValue<D>> = node
        .slot_values()
        .iter()
        .map(|slot| match slot {
            SlotValue::One(child) => SlotValue::One(match child {
                Some(NodeOrLeaf::Node(child)) if predicate(child.data()) => {
                    changed = true;
                    None
                }
                Some(NodeOrLeaf::Node(child)) => {
                    let kept = remove_walk(child, predicate);
                    if !Arc::ptr_eq(&kept, child) {
                        changed = true;
                    }
                    Some(NodeOrLeaf::Node(kept))
                }
                other => other.clone(),
            }),
            SlotValue::Many(children) => {
                let mut kept: Vec<Child<D>> = Vec::with_capacity(children.len());
                for child in children {
                    match child {
                        NodeOrLeaf::Node(child) if predicate(child.data()) => changed = true,
                        NodeOrLeaf::Node(child) => {
                            let mapped = remove_walk(child, predicate);
                            if !Arc::ptr_eq(&mapped, child) {
                                changed = true;
                            }
                            kept.push(NodeOrLeaf::Node(mapped));
                        }
                        NodeOrLeaf::Leaf(leaf) => kept.push(NodeOrLeaf::Leaf(leaf.clone())),
                    }
                }
                SlotValue::Many(kept)
            }
        })
        .collect();

    if !changed {
        return node.clone();
    }
    let mut copier = node.copy();
    for (slot, value) in node.layout().slots.iter().zip(new_slots) {
        copier = copier.slot(slot.name, value);
    }
    copier.finish()
}

/// Replaces nodes as directed by `f`.
///
/// For each node, `f` returns `(replacement, force)`: a present replacement
/// substitutes the whole subtree (no descent into it), an absent one with
/// `force` set removes the node, and an absent one without `force` keeps the
/// node and descends. `None` overall means the root itself was removed.
pub fn substitute_with<D, F>(tree: &Arc<Node<D>>, f: &mut F) -> Option<Child<D>>
where
    D: Clone,
    F: FnMut(&Arc<Node<D>>) -> (Option<Child<D>>, bool),
{
    match f(tree) {
        (Some(replacement), _) => Some(replacement),
        (None, true) => None,
        (None, false) => {
            let mut changed = false;
            let new_slots: Vec<SlotValue<D>> = tree
                .slot_values()
                .iter()
                .map(|slot| match slot {
                    SlotValue::One(child) => SlotValue::One(match child {
                        Some(NodeOrLeaf::Node(child)) => {
                            let substituted = substitute_with(child, f);
                            track_change(&substituted, child, &mut changed);
                            substituted
                        }
                        other => other.clone(),
                    }),
                    SlotValue::Many(children) => {
                        let mut kept: Vec<Child<D>> = Vec::with_capacity(children.len());
                        for child in children {
                            match child {
                                NodeOrLeaf::Node(child) => {
                                    let substituted = substitute_with(child, f);
                                    track_change(&substituted, child, &mut changed);
                                    kept.extend(substituted);
                                }
                                NodeOrLeaf::Leaf(leaf) => kept.push(NodeOrLeaf::Leaf(leaf.clone())),
                            }
                        }
                        SlotValue::Many(kept)
                    }
                })
                .collect();

            if !changed {
                return Some(NodeOrLeaf::Node(tree.clone()));
            }
            let mut copier = tree.copy();
            for (slot, value) in tree.layout().slots.iter().zip(new_slots) {
                copier = copier.slot(slot.name, value);
            }
            Some(NodeOrLeaf::Node(copier.finish()))
        }
    }
}

fn track_change<D>(substituted: &Option<Child<D>>, original: &Arc<Node<D>>, changed: &mut bool) {
    match substituted {
        Some(NodeOrLeaf::Node(node)) if Arc::ptr_eq(node, original) => {}
        _ => *changed = true,
    }
}

/// Replaces every node whose payload equals `old` with `new`.
pub fn substitute<D: Clone + PartialEq>(tree: &Arc<Node<D>>, new: Child<D>, old: &D) -> Option<Child<D>> {
    substitute_if(tree, new, |data| data == old)
}

/// Replaces every node whose payload satisfies `predicate` with `new`.
pub fn substitute_if<D: Clone>(
    tree: &Arc<Node<D>>,
    new: Child<D>,
    mut predicate: impl FnMut(&D) -> bool,
) -> Option<Child<D>> {
    substitute_with(tree, &mut |node| {
        if predicate(node.data()) {
            (Some(new.clone()), false)
        } else {
            (None, false)
        }
    })
}

pub fn substitute_if_not<D: Clone>(
    tree: &Arc<Node<D>>,
    new: Child<D>,
    mut predicate: impl FnMut(&D) -> bool,
) -> Option<Child<D>> {
    substitute_if(tree, new, |data| !predicate(data))
}

#[cfg(test)]
mod search_tests {
    use super::*;
    use crate::layout::{Arity, Layout, Slot};
    use crate::{lookup, path};
    use pretty_assertions::assert_eq;

    static LIST: Layout = Layout {
        name: "list",
        slots: &[Slot { name: "items", arity: Arity::Many }],
    };

    fn leaf(data: &'static str) -> Arc<Node<&'static str>> {
        Node::build(&LIST, data).finish()
    }

    /// `(a (b) (c (d) (e)))`
    fn sample() -> Arc<Node<&'static str>> {
        let c = Node::build(&LIST, "c")
            .children("items", [NodeOrLeaf::Node(leaf("d")), NodeOrLeaf::Node(leaf("e"))])
            .finish();
        Node::build(&LIST, "a")
            .children("items", [NodeOrLeaf::Node(leaf("b")), NodeOrLeaf::Node(c)])
            .finish()
    }

    #[test]
    fn test_map_tree_identity_shares_everything() {
        let tree = sample();
        let mapped = map_tree(&tree, &mut |node| (node.clone(), false));
        assert!(Arc::ptr_eq(&mapped, &tree));
    }

    #[test]
    fn test_map_tree_rewrites_payloads() {
        let tree = sample();
        let mapped = map_tree(&tree, &mut |node| {
            if *node.data() == "d" {
                (node.copy().data("D").finish(), false)
            } else {
                (node.clone(), false)
            }
        });

        assert_eq!(*lookup(&mapped, &path![1, 0]).unwrap().into_node().unwrap().data(), "D");
        // untouched branches stay shared, rebuilt ones keep identities
        assert!(Arc::ptr_eq(
            &lookup(&mapped, &path![0]).unwrap().into_node().unwrap(),
            &lookup(&tree, &path![0]).unwrap().into_node().unwrap()
        ));
        assert_eq!(mapped.serial(), tree.serial());
    }

    #[test]
    fn test_map_tree_stop_suppresses_descent() {
        let tree = sample();
        let replacement = leaf("z");
        let mapped = map_tree(&tree, &mut |node| {
            if *node.data() == "c" {
                (replacement.clone(), true)
            } else {
                (node.clone(), false)
            }
        });

        assert!(Arc::ptr_eq(
            &lookup(&mapped, &path![1]).unwrap().into_node().unwrap(),
            &replacement
        ));
    }

    #[test]
    fn test_reduce_in_preorder() {
        let tree = sample();
        let joined = reduce(&tree, String::new(), |mut acc, data| {
            acc.push_str(data);
            acc
        });
        assert_eq!(joined, "abcde");
    }

    #[test]
    fn test_find_and_variants() {
        let tree = sample();
        assert_eq!(*find(&tree, &"c").unwrap().data(), "c");
        assert_eq!(find(&tree, &"q"), None);
        assert_eq!(*find_if(&tree, |data| data.len() == 1 && *data > "c").unwrap().data(), "d");
        assert_eq!(*find_if_not(&tree, |data| *data == "a").unwrap().data(), "b");
    }

    #[test]
    fn test_count_variants() {
        let tree = sample();
        assert_eq!(count(&tree, &"d"), 1);
        assert_eq!(count_if(&tree, |data| *data > "b"), 3);
        assert_eq!(count_if_not(&tree, |data| *data > "b"), 2);
    }

    #[test]
    fn test_position_variants() {
        let tree = sample();
        assert_eq!(position(&tree, &"e"), Some(path![1, 1]));
        assert_eq!(position(&tree, &"a"), Some(path![]));
        assert_eq!(position(&tree, &"q"), None);
        assert_eq!(position_if(&tree, |data| *data > "c"), Some(path![1, 0]));
    }

    #[test]
    fn test_remove_drops_subtree() {
        let tree = sample();
        let pruned = remove(&tree, &"c").unwrap();

        assert_eq!(pruned.child_count(), 1);
        assert_eq!(position(&pruned, &"d"), None);
        // the untouched branch is still shared
        assert!(Arc::ptr_eq(
            &lookup(&pruned, &path![0]).unwrap().into_node().unwrap(),
            &lookup(&tree, &path![0]).unwrap().into_node().unwrap()
        ));
    }

    #[test]
    fn test_remove_root_returns_none() {
        let tree = sample();
        assert_eq!(remove(&tree, &"a"), None);
    }

    #[test]
    fn test_remove_without_match_is_shared() {
        let tree = sample();
        let untouched = remove(&tree, &"q").unwrap();
        assert!(Arc::ptr_eq(&untouched, &tree));
    }

    #[test]
    fn test_remove_if_not_keeps_matching_spine() {
        let tree = sample();
        let kept = remove_if_not(&tree, &mut |data| *data != "b").unwrap();
        assert_eq!(position(&kept, &"b"), None);
        assert_eq!(count_if(&kept, |_| true), 4);
    }

    #[test]
    fn test_substitute_replaces_matches() {
        let tree = sample();
        let z = leaf("z");
        let substituted = substitute(&tree, NodeOrLeaf::Node(z.clone()), &"d").unwrap();
        let root = substituted.into_node().unwrap();

        assert!(Arc::ptr_eq(
            &lookup(&root, &path![1, 0]).unwrap().into_node().unwrap(),
            &z
        ));
        assert_eq!(root.serial(), tree.serial());
    }

    #[test]
    fn test_substitute_with_forced_removal() {
        let tree = sample();
        let substituted = substitute_with(&tree, &mut |node| (None, *node.data() == "d")).unwrap();
        let root = substituted.into_node().unwrap();

        assert_eq!(position(&root, &"d"), None);
        assert_eq!(lookup(&root, &path![1]).unwrap().into_node().unwrap().child_count(), 1);
    }

    #[test]
    fn test_substitute_with_root_removal() {
        let tree = sample();
        assert_eq!(substitute_with(&tree, &mut |_| (None, true)), None);
    }

    #[test]
    fn test_substitute_can_replace_with_leaf() {
        let tree = sample();
        let substituted = substitute(&tree, NodeOrLeaf::Leaf("raw"), &"b").unwrap();
        let root = substituted.into_node().unwrap();
        assert_eq!(lookup(&root, &path![0]).unwrap().as_leaf(), Some(&"raw"));
    }
}
