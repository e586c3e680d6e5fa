use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::convert::{ListForm, to_list};
use crate::error::TreeError;
use crate::node::{Child, FingerSlot, Node, lookup};
use crate::path::Path;
use crate::transform::transform_finger;
use crate::traverse::traverse_with_paths;
use crate::utility_types::NodeOrLeaf;

/// A bound reference into a tree.
///
/// A finger names a target by `(root, path)` and keeps the residue a lossy
/// translation left behind: the tail of a path whose subtree no longer
/// exists. Resolution is cached; the cache is pure memoization and does not
/// participate in equality.
pub struct Finger<D> {
    root: Arc<Node<D>>,
    path: Path,
    residue: Path,
    target: OnceLock<Result<Child<D>, TreeError>>,
}

impl<D> Finger<D> {
    pub fn new(root: Arc<Node<D>>, path: Path) -> Finger<D> {
        Finger::with_residue(root, path, Path::root())
    }

    pub fn with_residue(root: Arc<Node<D>>, path: Path, residue: Path) -> Finger<D> {
        Finger { root, path, residue, target: OnceLock::new() }
    }

    #[inline]
    pub fn root(&self) -> &Arc<Node<D>> {
        &self.root
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The untranslated remainder accumulated across lossy translations.
    #[inline]
    pub fn residue(&self) -> &Path {
        &self.residue
    }
}

impl<D: Clone> Finger<D> {
    /// Resolves the finger's target, caching the outcome.
    pub fn resolve(&self) -> Result<&Child<D>, TreeError> {
        self.target
            .get_or_init(|| lookup(&self.root, &self.path))
            .as_ref()
            .map_err(|error| error.clone())
    }

    /// Translates this finger into an equivalent one under `target`, walking
    /// the back-pointer chain between the two roots.
    pub fn transform_to(&self, target: &Arc<Node<D>>) -> Result<Finger<D>, TreeError> {
        transform_finger(self, target)
    }

    /// List representation of the resolved target; a leaf target comes back
    /// as a bare atom.
    pub fn to_list(&self) -> Result<ListForm<D>, TreeError> {
        match self.resolve()? {
            NodeOrLeaf::Node(node) => Ok(to_list(node)),
            NodeOrLeaf::Leaf(leaf) => Ok(ListForm::Atom(leaf.clone())),
        }
    }
}

impl<D: Clone> Clone for Finger<D> {
    fn clone(&self) -> Self {
        Finger {
            root: self.root.clone(),
            path: self.path.clone(),
            residue: self.residue.clone(),
            target: self.target.clone(),
        }
    }
}

impl<D> PartialEq for Finger<D> {
    /// Two fingers are equal when they are bound to the same root object and
    /// agree on path and residue.
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.root, &other.root) && self.path == other.path && self.residue == other.residue
    }
}

impl<D> Eq for Finger<D> {}

impl<D> fmt::Debug for Finger<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Finger")
            .field("root", &self.root.serial())
            .field("path", &self.path)
            .field("residue", &self.residue)
            .finish()
    }
}

impl<D> Node<D> {
    /// The finger recorded by [`populate_fingers`], while its anchor root is
    /// still alive.
    pub fn finger(&self) -> Option<Finger<D>> {
        let slot = self.finger_slot().get()?;
        let root = slot.root.upgrade()?;
        Some(Finger::new(root, slot.path.clone()))
    }
}

/// Anchors a finger at `root` on every node reachable from it.
///
/// Finger slots are write-once: repeating the pass, or populating a tree
/// that shares nodes with an already-fingered one, leaves existing anchors
/// untouched.
pub fn populate_fingers<D>(root: &Arc<Node<D>>) {
    traverse_with_paths(root, |node, path| {
        let _ = node.finger_slot().set(FingerSlot {
            root: Arc::downgrade(root),
            path: Path::from(path),
        });
        true
    });
}
