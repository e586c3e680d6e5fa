use crate::node::{Node, SlotValue};
use crate::path::SlotName;
use crate::utility_types::NodeOrLeaf;

/// Nested list rendition of a tree: each node becomes its payload followed
/// by its children, leaves become bare atoms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListForm<T> {
    Atom(T),
    List(T, Vec<ListForm<T>>),
}

/// Per-slot rendition of a node: the payload plus one entry per declared
/// slot, in declaration order. Internal bookkeeping (serial numbers, the
/// back-reference, the finger anchor) does not appear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlistForm<D> {
    Atom(D),
    Node { data: D, slots: Vec<(SlotName, AlistSlot<D>)> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlistSlot<D> {
    One(Option<AlistForm<D>>),
    Many(Vec<AlistForm<D>>),
}

/// List representation carrying the payloads themselves.
pub fn to_list<D: Clone>(node: &Node<D>) -> ListForm<D> {
    to_list_with(node, &|element| match element {
        NodeOrLeaf::Node(node) => node.data().clone(),
        NodeOrLeaf::Leaf(leaf) => leaf.clone(),
    })
}

/// List representation with a caller-supplied per-element mapping.
pub fn to_list_with<D, T>(node: &Node<D>, value_fn: &impl Fn(NodeOrLeaf<&Node<D>, &D>) -> T) -> ListForm<T> {
    let children = node
        .children()
        .map(|child| match child {
            NodeOrLeaf::Node(child) => to_list_with(child, value_fn),
            NodeOrLeaf::Leaf(leaf) => ListForm::Atom(value_fn(NodeOrLeaf::Leaf(leaf))),
        })
        .collect();
    ListForm::List(value_fn(NodeOrLeaf::Node(node)), children)
}

/// Slot-name/value representation of a tree.
pub fn to_alist<D: Clone>(node: &Node<D>) -> AlistForm<D> {
    let slots = node
        .layout()
        .slots
        .iter()
        .zip(node.slot_values())
        .map(|(slot, value)| {
            let rendered = match value {
                SlotValue::One(child) => AlistSlot::One(child.as_ref().map(alist_child)),
                SlotValue::Many(children) => AlistSlot::Many(children.iter().map(alist_child).collect()),
            };
            (slot.name, rendered)
        })
        .collect();
    AlistForm::Node { data: node.data().clone(), slots }
}

fn alist_child<D: Clone>(child: &crate::node::Child<D>) -> AlistForm<D> {
    match child {
        NodeOrLeaf::Node(child) => to_alist(child),
        NodeOrLeaf::Leaf(leaf) => AlistForm::Atom(leaf.clone()),
    }
}
