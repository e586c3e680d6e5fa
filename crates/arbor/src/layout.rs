use crate::path::SlotName;

/// Whether a slot holds a single child or an ordered child list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    One,
    Many,
}

/// A declared child-bearing attribute of a node variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub name: SlotName,
    pub arity: Arity,
}

/// Per-variant descriptor: the variant's name and its ordered child slots.
///
/// Layouts are `'static` constants declared once per node variant; two nodes
/// belong to the same variant exactly when they point at the same layout, so
/// equality is reference identity.
#[derive(Debug)]
pub struct Layout {
    pub name: &'static str,
    pub slots: &'static [Slot],
}

impl Layout {
    /// Position of the named slot in declaration order.
    #[inline]
    pub fn slot_index(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|slot| slot.name == name)
    }

    /// The sole child list, when the variant declares exactly one slot and
    /// that slot is a list. Only such variants accept bare-integer path
    /// steps.
    #[inline]
    pub fn sole_list_slot(&self) -> Option<usize> {
        match self.slots {
            [slot] if slot.arity == Arity::Many => Some(0),
            _ => None,
        }
    }
}

impl PartialEq for Layout {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for Layout {}
