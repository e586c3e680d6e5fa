use std::fmt;
use std::sync::{Arc, OnceLock, RwLock, Weak};

use countme::Count;

use crate::error::{PathErrorReason, TreeError};
use crate::layout::{Arity, Layout};
use crate::path::{Path, PathStep};
use crate::serial::SerialNumber;
use crate::transform::PathTransform;
use crate::utility_types::NodeOrLeaf;

/// A child position: either a full node or an embedded leaf atom.
pub type Child<D> = NodeOrLeaf<Arc<Node<D>>, D>;

/// Marker for live-instance accounting.
pub(crate) struct NodeTag;

/// The value held by one declared slot.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotValue<D> {
    /// A scalar slot, possibly vacant.
    One(Option<Child<D>>),
    /// An ordered child list.
    Many(Vec<Child<D>>),
}

impl<D> SlotValue<D> {
    /// The slot's contents as a flat child sequence.
    #[inline]
    pub fn children(&self) -> &[Child<D>] {
        match self {
            SlotValue::One(child) => child.as_slice(),
            SlotValue::Many(children) => children,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.children().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.children().is_empty()
    }

    #[inline]
    pub(crate) fn arity(&self) -> Arity {
        match self {
            SlotValue::One(_) => Arity::One,
            SlotValue::Many(_) => Arity::Many,
        }
    }
}

/// Back-reference from an edit result to the tree it was produced from.
///
/// Observation promotes the `Node` form to `Transform` exactly once; the
/// promotion is idempotent, so racing readers derive structurally equal
/// transforms.
pub(crate) enum Backref<D> {
    None,
    /// Pre-materialization: the predecessor root itself.
    Node(Arc<Node<D>>),
    /// Post-materialization: the derived rewrite.
    Transform(Arc<PathTransform<D>>),
}

/// Write-once anchor recorded by [`populate_fingers`](crate::populate_fingers).
///
/// The anchor root is held weakly: a node is reachable from the root it is
/// fingered against, and a strong reference here would tie a cycle.
pub(crate) struct FingerSlot<D> {
    pub(crate) root: Weak<Node<D>>,
    pub(crate) path: Path,
}

/// A node of a persistent labeled tree.
///
/// Nodes are immutable once published; edits build new nodes that share
/// untouched children with their sources. The two interior caches (the
/// transform back-reference and the finger anchor) are write-once and
/// observationally idempotent, keeping trees safe for parallel readers.
pub struct Node<D> {
    serial: SerialNumber,
    layout: &'static Layout,
    data: D,
    slots: Box<[SlotValue<D>]>,
    backref: RwLock<Backref<D>>,
    finger: OnceLock<FingerSlot<D>>,
    _c: Count<NodeTag>,
}

impl<D> Node<D> {
    /// Starts building a fresh node of the given variant.
    #[inline]
    pub fn build(layout: &'static Layout, data: D) -> NodeBuilder<D> {
        NodeBuilder::new(layout, data)
    }

    /// Starts a copy of this node; unoverridden slots, payload, and serial
    /// number carry over from the source.
    #[inline]
    pub fn copy(&self) -> Copier<'_, D>
    where
        D: Clone,
    {
        Copier::new(self)
    }

    #[inline]
    pub fn serial(&self) -> SerialNumber {
        self.serial
    }

    #[inline]
    pub fn layout(&self) -> &'static Layout {
        self.layout
    }

    #[inline]
    pub fn data(&self) -> &D {
        &self.data
    }

    #[inline]
    pub fn slot_values(&self) -> &[SlotValue<D>] {
        &self.slots
    }

    /// The named slot's value, if the variant declares it.
    #[inline]
    pub fn slot(&self, name: &str) -> Option<&SlotValue<D>> {
        self.layout.slot_index(name).map(|index| &self.slots[index])
    }

    /// All children in slot-declaration order.
    #[inline]
    pub fn children(&self) -> impl Iterator<Item = &Child<D>> {
        self.slots.iter().flat_map(|slot| slot.children().iter())
    }

    #[inline]
    pub fn child_count(&self) -> usize {
        self.slots.iter().map(SlotValue::len).sum()
    }

    /// Number of tree positions under (and including) this node; leaves
    /// count one each.
    pub fn size(&self) -> usize {
        1 + self
            .children()
            .map(|child| match child {
                NodeOrLeaf::Node(node) => node.size(),
                NodeOrLeaf::Leaf(_) => 1,
            })
            .sum::<usize>()
    }

    /// Resolves one path step to a child of this node.
    #[inline]
    pub fn get_step(&self, step: &PathStep) -> Result<&Child<D>, TreeError> {
        self.get_step_at(step, 0)
    }

    pub(crate) fn get_step_at(&self, step: &PathStep, depth: usize) -> Result<&Child<D>, TreeError> {
        let (slot_index, list_index) = self.locate(step, depth)?;
        match (&self.slots[slot_index], list_index) {
            (SlotValue::One(child), _) => child.as_ref().ok_or_else(|| {
                TreeError::invalid_path(depth, PathErrorReason::EmptySlot(self.layout.slots[slot_index].name))
            }),
            (SlotValue::Many(children), Some(index)) => children
                .get(index)
                .ok_or_else(|| TreeError::invalid_path(depth, PathErrorReason::OutOfRange(index))),
            (SlotValue::Many(_), None) => unreachable!("locate returned a list slot without an index"),
        }
    }

    /// Maps a step onto `(slot index, list index)`, enforcing the step
    /// vocabulary; bounds are the caller's concern.
    pub(crate) fn locate(&self, step: &PathStep, depth: usize) -> Result<(usize, Option<usize>), TreeError> {
        match *step {
            PathStep::Index(index) => match self.layout.sole_list_slot() {
                Some(slot_index) => Ok((slot_index, Some(index))),
                None => Err(TreeError::invalid_path(depth, PathErrorReason::BareIndex)),
            },
            PathStep::Slot(name) => {
                let slot_index = self
                    .layout
                    .slot_index(name)
                    .ok_or_else(|| TreeError::invalid_path(depth, PathErrorReason::UnknownSlot(name)))?;
                match self.layout.slots[slot_index].arity {
                    Arity::One => Ok((slot_index, None)),
                    Arity::Many => Err(TreeError::invalid_path(depth, PathErrorReason::ListSlot(name))),
                }
            }
            PathStep::SlotIndex(name, index) => {
                let slot_index = self
                    .layout
                    .slot_index(name)
                    .ok_or_else(|| TreeError::invalid_path(depth, PathErrorReason::UnknownSlot(name)))?;
                match self.layout.slots[slot_index].arity {
                    Arity::Many => Ok((slot_index, Some(index))),
                    Arity::One => Err(TreeError::invalid_path(depth, PathErrorReason::ScalarSlot(name))),
                }
            }
        }
    }

    /// The canonical step addressing the child at `(slot, list position)`.
    pub(crate) fn step_for(&self, slot_index: usize, list_index: Option<usize>) -> PathStep {
        let slot = &self.layout.slots[slot_index];
        match list_index {
            Some(index) if self.layout.sole_list_slot() == Some(slot_index) => PathStep::Index(index),
            Some(index) => PathStep::SlotIndex(slot.name, index),
            None => PathStep::Slot(slot.name),
        }
    }

    #[inline]
    pub(crate) fn backref(&self) -> &RwLock<Backref<D>> {
        &self.backref
    }

    #[inline]
    pub(crate) fn finger_slot(&self) -> &OnceLock<FingerSlot<D>> {
        &self.finger
    }
}

/// True when `path` lands on a real child (or the root itself) under `root`.
pub fn path_valid<D>(root: &Arc<Node<D>>, path: &Path) -> bool {
    let mut node = root;
    for (depth, step) in path.steps().iter().enumerate() {
        match node.get_step_at(step, depth) {
            Ok(NodeOrLeaf::Node(child)) => node = child,
            Ok(NodeOrLeaf::Leaf(_)) => return depth + 1 == path.len(),
            Err(_) => return false,
        }
    }
    true
}

/// Resolves `path` against `root`. The empty path denotes the root itself.
pub fn lookup<D: Clone>(root: &Arc<Node<D>>, path: &Path) -> Result<Child<D>, TreeError> {
    let steps = path.steps();
    let mut node = root;
    for (depth, step) in steps.iter().enumerate() {
        let child = node.get_step_at(step, depth)?;
        if depth + 1 == steps.len() {
            return Ok(child.clone());
        }
        node = match child {
            NodeOrLeaf::Node(child) => child,
            NodeOrLeaf::Leaf(_) => {
                return Err(TreeError::invalid_path(depth + 1, PathErrorReason::IntoLeaf));
            }
        };
    }
    Ok(NodeOrLeaf::Node(root.clone()))
}

impl<D: PartialEq> PartialEq for Node<D> {
    /// Structural equality: same identity, variant, payload, and children.
    /// The interior caches do not participate.
    fn eq(&self, other: &Self) -> bool {
        self.serial == other.serial
            && self.layout == other.layout
            && self.data == other.data
            && self.slots == other.slots
    }
}

impl<D: Eq> Eq for Node<D> {}

impl<D: fmt::Debug> fmt::Debug for Node<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("serial", &self.serial)
            .field("variant", &self.layout.name)
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}

impl<D: fmt::Display> fmt::Display for Node<D> {
    /// Renders the tree as `(#serial data child…)` with leaves inline.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} {}", self.serial, self.data)?;
        for child in self.children() {
            match child {
                NodeOrLeaf::Node(node) => write!(f, " {node}")?,
                NodeOrLeaf::Leaf(leaf) => write!(f, " {leaf}")?,
            }
        }
        write!(f, ")")
    }
}

/// Builder for fresh nodes.
///
/// Slots start vacant (scalar) or empty (list); a fresh serial number is
/// allocated at `finish` unless one is supplied.
pub struct NodeBuilder<D> {
    layout: &'static Layout,
    data: D,
    slots: Vec<SlotValue<D>>,
    serial: Option<SerialNumber>,
    backref: Backref<D>,
}

impl<D> NodeBuilder<D> {
    fn new(layout: &'static Layout, data: D) -> NodeBuilder<D> {
        let slots = layout
            .slots
            .iter()
            .map(|slot| match slot.arity {
                Arity::One => SlotValue::One(None),
                Arity::Many => SlotValue::Many(Vec::new()),
            })
            .collect();
        NodeBuilder { layout, data, slots, serial: None, backref: Backref::None }
    }

    /// Sets a scalar slot, or appends to a list slot.
    pub fn child(mut self, name: &str, child: Child<D>) -> Self {
        match &mut self.slots[slot_index(self.layout, name)] {
            SlotValue::One(slot) => *slot = Some(child),
            SlotValue::Many(children) => children.push(child),
        }
        self
    }

    /// Appends children to a list slot.
    pub fn children(mut self, name: &str, children: impl IntoIterator<Item = Child<D>>) -> Self {
        match &mut self.slots[slot_index(self.layout, name)] {
            SlotValue::Many(list) => list.extend(children),
            SlotValue::One(_) => panic!("slot `{name}` on variant `{}` holds a single child", self.layout.name),
        }
        self
    }

    /// Uses an explicit serial number instead of allocating a fresh one.
    pub fn serial(mut self, serial: SerialNumber) -> Self {
        self.serial = Some(serial);
        self
    }

    /// Records the tree this node was derived from.
    pub fn predecessor(mut self, predecessor: Arc<Node<D>>) -> Self {
        self.backref = Backref::Node(predecessor);
        self
    }

    /// Records an already-derived rewrite as the back-reference.
    pub fn transform(mut self, transform: Arc<PathTransform<D>>) -> Self {
        self.backref = Backref::Transform(transform);
        self
    }

    pub fn finish(self) -> Arc<Node<D>> {
        Arc::new(Node {
            serial: self.serial.unwrap_or_else(SerialNumber::fresh),
            layout: self.layout,
            data: self.data,
            slots: self.slots.into_boxed_slice(),
            backref: RwLock::new(self.backref),
            finger: OnceLock::new(),
            _c: Count::new(),
        })
    }
}

/// Copy-with-overrides.
///
/// The copy keeps the source's serial number unless it is overridden or
/// refreshed, so an unchanged copy is the same logical node. The interior
/// caches never carry over; back-references are set explicitly.
pub struct Copier<'a, D> {
    source: &'a Node<D>,
    data: Option<D>,
    slots: Vec<Option<SlotValue<D>>>,
    serial: Option<SerialNumber>,
    fresh_serial: bool,
    backref: Backref<D>,
}

impl<'a, D: Clone> Copier<'a, D> {
    fn new(source: &'a Node<D>) -> Copier<'a, D> {
        Copier {
            source,
            data: None,
            slots: vec![None; source.slots.len()],
            serial: None,
            fresh_serial: false,
            backref: Backref::None,
        }
    }

    pub fn data(mut self, data: D) -> Self {
        self.data = Some(data);
        self
    }

    /// Overrides one slot. The replacement must match the declared arity.
    pub fn slot(mut self, name: &str, value: SlotValue<D>) -> Self {
        let index = slot_index(self.source.layout, name);
        assert!(
            value.arity() == self.source.layout.slots[index].arity,
            "slot `{name}` on variant `{}` has the wrong arity",
            self.source.layout.name,
        );
        self.slots[index] = Some(value);
        self
    }

    /// Gives the copy a new identity.
    pub fn fresh_serial(mut self) -> Self {
        self.fresh_serial = true;
        self
    }

    pub fn serial(mut self, serial: SerialNumber) -> Self {
        self.serial = Some(serial);
        self
    }

    /// Records the tree this copy was derived from.
    pub fn predecessor(mut self, predecessor: Arc<Node<D>>) -> Self {
        self.backref = Backref::Node(predecessor);
        self
    }

    /// Records an already-derived rewrite as the back-reference.
    pub fn transform(mut self, transform: Arc<PathTransform<D>>) -> Self {
        self.backref = Backref::Transform(transform);
        self
    }

    pub fn finish(self) -> Arc<Node<D>> {
        let serial = match (self.serial, self.fresh_serial) {
            (Some(serial), _) => serial,
            (None, true) => SerialNumber::fresh(),
            (None, false) => self.source.serial,
        };
        let slots = self
            .slots
            .into_iter()
            .enumerate()
            .map(|(index, value)| value.unwrap_or_else(|| self.source.slots[index].clone()))
            .collect();
        Arc::new(Node {
            serial,
            layout: self.source.layout,
            data: self.data.unwrap_or_else(|| self.source.data.clone()),
            slots,
            backref: RwLock::new(self.backref),
            finger: OnceLock::new(),
            _c: Count::new(),
        })
    }
}

fn slot_index(layout: &'static Layout, name: &str) -> usize {
    match layout.slot_index(name) {
        Some(index) => index,
        None => panic!("no slot named `{name}` on variant `{}`", layout.name),
    }
}

#[cfg(test)]
mod node_tests {
    use super::*;
    use crate::layout::Slot;
    use crate::path;
    use pretty_assertions::assert_eq;

    static LIST: Layout = Layout {
        name: "list",
        slots: &[Slot { name: "items", arity: Arity::Many }],
    };

    static IF: Layout = Layout {
        name: "if",
        slots: &[
            Slot { name: "test", arity: Arity::One },
            Slot { name: "then", arity: Arity::Many },
            Slot { name: "else", arity: Arity::Many },
        ],
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

    fn branch() -> Arc<Node<&'static str>> {
        Node::build(&IF, "if")
            .child("test", NodeOrLeaf::Node(leaf("p")))
            .children("then", [NodeOrLeaf::Node(leaf("t"))])
            .children("else", [NodeOrLeaf::Node(leaf("f")), NodeOrLeaf::Leaf("raw")])
            .finish()
    }

    #[test]
    fn test_build_and_accessors() {
        let tree = sample();

        assert_eq!(tree.layout(), &LIST);
        assert_eq!(*tree.data(), "a");
        assert_eq!(tree.child_count(), 2);
        assert_eq!(tree.size(), 5);
        assert_eq!(tree.slot("items").map(SlotValue::len), Some(2));
        assert_eq!(tree.slot("nope"), None);
    }

    #[test]
    fn test_serials_are_unique_per_build() {
        let tree = sample();
        let mut serials: Vec<SerialNumber> = Vec::new();
        let mut stack = vec![&tree];
        while let Some(node) = stack.pop() {
            serials.push(node.serial());
            stack.extend(node.children().filter_map(NodeOrLeaf::as_node));
        }
        serials.sort();
        serials.dedup();
        assert_eq!(serials.len(), 5);
    }

    #[test]
    fn test_lookup_empty_path_returns_root() {
        let tree = sample();
        let root = lookup(&tree, &path![]).unwrap();
        assert!(Arc::ptr_eq(root.as_node().unwrap(), &tree));
    }

    #[test]
    fn test_lookup_descends_bare_indices() {
        let tree = sample();
        let d = lookup(&tree, &path![1, 0]).unwrap();
        assert_eq!(*d.as_node().unwrap().data(), "d");
    }

    #[test]
    fn test_lookup_slot_steps() {
        let tree = branch();
        let p = lookup(&tree, &path!["test"]).unwrap();
        assert_eq!(*p.as_node().unwrap().data(), "p");

        let f = lookup(&tree, &path![("else", 0)]).unwrap();
        assert_eq!(*f.as_node().unwrap().data(), "f");

        let raw = lookup(&tree, &path![("else", 1)]).unwrap();
        assert_eq!(raw.as_leaf(), Some(&"raw"));
    }

    #[test]
    fn test_lookup_bare_index_needs_single_list_slot() {
        let tree = branch();
        assert_eq!(
            lookup(&tree, &path![0]),
            Err(TreeError::invalid_path(0, PathErrorReason::BareIndex))
        );
    }

    #[test]
    fn test_lookup_out_of_range() {
        let tree = sample();
        assert_eq!(
            lookup(&tree, &path![7]),
            Err(TreeError::invalid_path(0, PathErrorReason::OutOfRange(7)))
        );
    }

    #[test]
    fn test_path_valid() {
        let tree = sample();
        assert!(path_valid(&tree, &path![]));
        assert!(path_valid(&tree, &path![1, 0]));
        assert!(!path_valid(&tree, &path![1, 2]));
        assert!(!path_valid(&tree, &path![0, 0]));

        let branch = branch();
        assert!(path_valid(&branch, &path![("else", 1)]));
        assert!(!path_valid(&branch, &path![("else", 1), 0]));
        assert!(!path_valid(&branch, &path![0]));
    }

    #[test]
    fn test_lookup_into_leaf_fails() {
        let tree = branch();
        assert_eq!(
            lookup(&tree, &path![("else", 1), 0]),
            Err(TreeError::invalid_path(1, PathErrorReason::IntoLeaf))
        );
    }

    #[test]
    fn test_copy_without_overrides_preserves_everything() {
        let tree = sample();
        let copy = tree.copy().finish();

        assert_eq!(copy.serial(), tree.serial());
        assert_eq!(&*copy, &*tree);
        // children are shared, not rebuilt
        for (a, b) in copy.children().zip(tree.children()) {
            if let (NodeOrLeaf::Node(a), NodeOrLeaf::Node(b)) = (a, b) {
                assert!(Arc::ptr_eq(a, b));
            }
        }
    }

    #[test]
    fn test_copy_overrides() {
        let tree = sample();
        let copy = tree
            .copy()
            .data("z")
            .slot("items", SlotValue::Many(vec![NodeOrLeaf::Node(leaf("q"))]))
            .finish();

        assert_eq!(copy.serial(), tree.serial());
        assert_eq!(*copy.data(), "z");
        assert_eq!(copy.child_count(), 1);
    }

    #[test]
    fn test_copy_fresh_serial() {
        let tree = sample();
        let copy = tree.copy().fresh_serial().finish();
        assert_ne!(copy.serial(), tree.serial());
    }

    #[test]
    fn test_copy_explicit_serial() {
        let tree = sample();
        let other = leaf("q");
        let copy = tree.copy().serial(other.serial()).finish();
        assert_eq!(copy.serial(), other.serial());
    }

    #[test]
    fn test_display() {
        let b = leaf("b");
        let root = Node::build(&LIST, "a").child("items", NodeOrLeaf::Node(b.clone())).finish();
        let rendered = format!("{root}");
        assert_eq!(rendered, format!("({} a ({} b))", root.serial(), b.serial()));
    }

    #[test]
    #[should_panic(expected = "no slot named")]
    fn test_builder_rejects_unknown_slot() {
        let _ = Node::build(&LIST, "a").child("nope", NodeOrLeaf::Leaf("x"));
    }

    #[test]
    #[should_panic(expected = "wrong arity")]
    fn test_copier_rejects_wrong_arity() {
        let tree = branch();
        let _ = tree.copy().slot("test", SlotValue::Many(vec![]));
    }
}
