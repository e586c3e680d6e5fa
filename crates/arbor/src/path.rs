use std::cmp::Ordering;
use std::fmt;

/// Name of a declared child slot.
pub type SlotName = &'static str;

/// One element of a [`Path`].
///
/// The step vocabulary is fixed by the addressed node's variant: a node whose
/// single slot is a child list is addressed by bare [`Index`](PathStep::Index)
/// steps, a scalar slot by its [`Slot`](PathStep::Slot) name, and a list slot
/// of a multi-slot node by a [`SlotIndex`](PathStep::SlotIndex) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathStep {
    Index(usize),
    Slot(SlotName),
    SlotIndex(SlotName, usize),
}

impl PathStep {
    /// The list index carried by this step, if any.
    #[inline]
    pub fn index(&self) -> Option<usize> {
        match self {
            PathStep::Index(index) => Some(*index),
            PathStep::Slot(_) => None,
            PathStep::SlotIndex(_, index) => Some(*index),
        }
    }
}

impl Ord for PathStep {
    // Slot-addressed steps order before bare indices; slot names by string
    // order, indices by natural order.
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (PathStep::Slot(a), PathStep::Slot(b)) => a.cmp(b),
            (PathStep::Slot(a), PathStep::SlotIndex(b, _)) => a.cmp(b).then(Ordering::Less),
            (PathStep::SlotIndex(a, _), PathStep::Slot(b)) => a.cmp(b).then(Ordering::Greater),
            (PathStep::SlotIndex(a, i), PathStep::SlotIndex(b, j)) => a.cmp(b).then(i.cmp(j)),
            (PathStep::Index(i), PathStep::Index(j)) => i.cmp(j),
            (PathStep::Index(_), _) => Ordering::Greater,
            (_, PathStep::Index(_)) => Ordering::Less,
        }
    }
}

impl PartialOrd for PathStep {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<usize> for PathStep {
    #[inline]
    fn from(index: usize) -> PathStep {
        PathStep::Index(index)
    }
}

impl From<SlotName> for PathStep {
    #[inline]
    fn from(name: SlotName) -> PathStep {
        PathStep::Slot(name)
    }
}

impl From<(SlotName, usize)> for PathStep {
    #[inline]
    fn from((name, index): (SlotName, usize)) -> PathStep {
        PathStep::SlotIndex(name, index)
    }
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathStep::Index(index) => write!(f, "{index}"),
            PathStep::Slot(name) => write!(f, "{name}"),
            PathStep::SlotIndex(name, index) => write!(f, "({name} {index})"),
        }
    }
}

/// Directed locator from a root down to a descendant.
///
/// Paths order lexicographically element-wise, with a shorter path preceding
/// any extension of itself.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    steps: Vec<PathStep>,
}

impl Path {
    /// The empty path, denoting the root itself.
    #[inline]
    pub fn root() -> Path {
        Path { steps: Vec::new() }
    }

    #[inline]
    pub fn from_steps(steps: impl IntoIterator<Item = PathStep>) -> Path {
        Path { steps: steps.into_iter().collect() }
    }

    #[inline]
    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    #[inline]
    pub fn push(&mut self, step: PathStep) {
        self.steps.push(step);
    }

    #[inline]
    pub fn last(&self) -> Option<&PathStep> {
        self.steps.last()
    }

    /// The path to the addressed node's parent; `None` at the root.
    #[inline]
    pub fn parent(&self) -> Option<Path> {
        match self.steps.split_last() {
            Some((_, init)) => Some(Path::from_steps(init.iter().copied())),
            None => None,
        }
    }

    /// A copy of this path extended by one step.
    #[inline]
    pub fn child(&self, step: PathStep) -> Path {
        let mut path = self.clone();
        path.push(step);
        path
    }

    pub fn concat(&self, other: &Path) -> Path {
        Path::from_steps(self.steps.iter().chain(other.steps.iter()).copied())
    }

    pub fn is_prefix_of(&self, other: &Path) -> bool {
        other.steps.len() >= self.steps.len() && other.steps[..self.steps.len()] == self.steps
    }

    /// The suffix left after removing `prefix`, when `prefix` leads here.
    pub fn strip_prefix(&self, prefix: &Path) -> Option<&[PathStep]> {
        if prefix.is_prefix_of(self) {
            Some(&self.steps[prefix.len()..])
        } else {
            None
        }
    }
}

impl From<Vec<PathStep>> for Path {
    #[inline]
    fn from(steps: Vec<PathStep>) -> Path {
        Path { steps }
    }
}

impl From<&[PathStep]> for Path {
    #[inline]
    fn from(steps: &[PathStep]) -> Path {
        Path { steps: steps.to_vec() }
    }
}

impl FromIterator<PathStep> for Path {
    #[inline]
    fn from_iter<I: IntoIterator<Item = PathStep>>(iter: I) -> Path {
        Path::from_steps(iter)
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{step}")?;
        }
        write!(f, "]")
    }
}
