use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::error::TreeError;
use crate::node::Node;
use crate::path::Path;
use crate::serial::SerialNumber;
use crate::traverse::{traverse, traverse_with_paths};

/// Checks that every serial number occurs at most once under `root`.
///
/// Advisory: the edit API assumes well-formed inputs and does not run this
/// itself; callers precheck non-trivial combinations before committing.
pub fn node_valid<D>(root: &Arc<Node<D>>) -> Result<(), TreeError> {
    let mut seen: FxHashSet<SerialNumber> = FxHashSet::default();
    let mut duplicate: Option<SerialNumber> = None;
    traverse(root, |node| {
        if duplicate.is_some() {
            return false;
        }
        if !seen.insert(node.serial()) {
            duplicate = Some(node.serial());
            return false;
        }
        true
    });
    match duplicate {
        Some(serial) => Err(TreeError::IdentityCollision { serial }),
        None => Ok(()),
    }
}

/// True when the two trees share no identities.
pub fn nodes_disjoint<D>(a: &Arc<Node<D>>, b: &Arc<Node<D>>) -> bool {
    let mut serials: FxHashSet<SerialNumber> = FxHashSet::default();
    traverse(a, |node| {
        serials.insert(node.serial());
        true
    });
    let mut disjoint = true;
    traverse(b, |node| {
        if serials.contains(&node.serial()) {
            disjoint = false;
        }
        disjoint
    });
    disjoint
}

/// True when replacing the subtree at `at` in `root` with `subtree` would
/// keep identities unique. The subtree currently at `at` is excluded, since
/// the implant displaces it.
pub fn node_can_implant<D>(root: &Arc<Node<D>>, at: &Path, subtree: &Arc<Node<D>>) -> bool {
    let mut remaining: FxHashSet<SerialNumber> = FxHashSet::default();
    traverse_with_paths(root, |node, path| {
        if path == at.steps() {
            return false;
        }
        remaining.insert(node.serial());
        true
    });
    let mut implantable = true;
    traverse(subtree, |node| {
        if remaining.contains(&node.serial()) {
            implantable = false;
        }
        implantable
    });
    implantable
}

#[cfg(test)]
mod validate_tests {
    use super::*;
    use crate::layout::{Arity, Layout, Slot};
    use crate::path;
    use crate::utility_types::NodeOrLeaf;
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
    fn test_node_valid_on_fresh_tree() {
        assert_eq!(node_valid(&sample()), Ok(()));
    }

    #[test]
    fn test_node_valid_detects_duplicate_identity() {
        let shared = leaf("s");
        let tree = Node::build(&LIST, "root")
            .children("items", [NodeOrLeaf::Node(shared.clone()), NodeOrLeaf::Node(shared.clone())])
            .finish();
        assert_eq!(node_valid(&tree), Err(TreeError::IdentityCollision { serial: shared.serial() }));
    }

    #[test]
    fn test_nodes_disjoint() {
        let a = sample();
        let b = sample();
        assert!(nodes_disjoint(&a, &b));

        let overlapping = crate::with(&b, &path![0], crate::lookup(&a, &path![0]).unwrap()).unwrap();
        assert!(!nodes_disjoint(&a, &overlapping));
    }

    #[test]
    fn test_node_can_implant() {
        let tree = sample();
        let fresh = sample();
        // a foreign subtree fits anywhere
        assert!(node_can_implant(&tree, &path![1], &fresh));

        // re-implanting a subtree over its own position is fine...
        let c = crate::lookup(&tree, &path![1]).unwrap().into_node().unwrap();
        assert!(node_can_implant(&tree, &path![1], &c));
        // ...but implanting it elsewhere would duplicate its identities
        assert!(!node_can_implant(&tree, &path![0], &c));
    }
}
