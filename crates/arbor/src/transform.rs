use std::fmt;
use std::sync::{Arc, Weak};

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::error::TreeError;
use crate::finger::Finger;
use crate::node::{Backref, Node};
use crate::path::{Path, PathStep, SlotName};
use crate::serial::SerialNumber;
use crate::traverse::traverse_with_paths;

/// Whether a matched path's unmatched tail survives translation.
///
/// `Live` carries the tail through into the new tree; `Dead` cuts it off and
/// hands it back as residue, because the subtree it pointed into is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Live,
    Dead,
}

/// One element of a transform entry's input pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternStep {
    /// Matches exactly this step.
    Literal(PathStep),
    /// Matches any index of the addressed list within `lo..=hi` (inclusive).
    /// `slot: None` matches bare-index steps.
    Range { slot: Option<SlotName>, lo: usize, hi: usize },
}

impl PatternStep {
    fn matches(&self, step: &PathStep) -> bool {
        match (self, step) {
            (PatternStep::Literal(pattern), step) => pattern == step,
            (PatternStep::Range { slot: None, lo, hi }, PathStep::Index(index)) => lo <= index && index <= hi,
            (PatternStep::Range { slot: Some(name), lo, hi }, PathStep::SlotIndex(slot, index)) => {
                name == slot && lo <= index && index <= hi
            }
            (PatternStep::Range { .. }, _) => false,
        }
    }
}

impl From<PathStep> for PatternStep {
    #[inline]
    fn from(step: PathStep) -> PatternStep {
        PatternStep::Literal(step)
    }
}

/// A single rewrite rule: an input prefix template, its replacement, and
/// whether the unmatched tail carries through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformEntry {
    pattern: Vec<PatternStep>,
    output: Vec<PathStep>,
    status: Status,
}

impl TransformEntry {
    pub fn new(
        pattern: impl IntoIterator<Item = PatternStep>,
        output: impl IntoIterator<Item = PathStep>,
        status: Status,
    ) -> TransformEntry {
        TransformEntry {
            pattern: pattern.into_iter().collect(),
            output: output.into_iter().collect(),
            status,
        }
    }

    fn literal(pattern: &Path, output: Path, status: Status) -> TransformEntry {
        TransformEntry {
            pattern: pattern.steps().iter().copied().map(PatternStep::Literal).collect(),
            output: output.steps().to_vec(),
            status,
        }
    }

    #[inline]
    pub fn pattern(&self) -> &[PatternStep] {
        &self.pattern
    }

    #[inline]
    pub fn output(&self) -> &[PathStep] {
        &self.output
    }

    #[inline]
    pub fn status(&self) -> Status {
        self.status
    }

    /// Applies this entry to `path`, returning `(translated, residue)` when
    /// the pattern is a prefix template of it.
    fn apply(&self, path: &Path) -> Option<(Path, Path)> {
        let steps = path.steps();
        if steps.len() < self.pattern.len() {
            return None;
        }
        for (pattern, step) in self.pattern.iter().zip(steps) {
            if !pattern.matches(step) {
                return None;
            }
        }

        // Shifted output prefix: where the pattern had a range, the output
        // element slides by the matched index's offset into the range.
        let mut translated: Vec<PathStep> = Vec::with_capacity(self.output.len() + steps.len() - self.pattern.len());
        for (position, output) in self.output.iter().enumerate() {
            let shifted = match self.pattern.get(position) {
                Some(PatternStep::Range { lo, .. }) => match (output, steps[position].index()) {
                    (PathStep::Index(base), Some(index)) => PathStep::Index(base + (index - lo)),
                    (PathStep::SlotIndex(name, base), Some(index)) => PathStep::SlotIndex(*name, base + (index - lo)),
                    _ => *output,
                },
                _ => *output,
            };
            translated.push(shifted);
        }

        let tail = &steps[self.pattern.len()..];
        match self.status {
            Status::Live => {
                translated.extend_from_slice(tail);
                Some((Path::from(translated), Path::root()))
            }
            Status::Dead => Some((Path::from(translated), Path::from(tail))),
        }
    }
}

/// A compact rewrite from paths valid at one root to paths valid at a
/// successor root.
///
/// Entries are kept sorted by non-increasing pattern length and the first
/// match wins, so a more specific rule always beats a more general one. A
/// path no entry matches translates to itself.
pub struct PathTransform<D> {
    from_serial: SerialNumber,
    from: Weak<Node<D>>,
    entries: Vec<TransformEntry>,
}

impl<D> PathTransform<D> {
    /// Builds a transform with explicit entries.
    pub fn new(from: &Arc<Node<D>>, mut entries: Vec<TransformEntry>) -> PathTransform<D> {
        sort_entries(&mut entries);
        PathTransform {
            from_serial: from.serial(),
            from: Arc::downgrade(from),
            entries,
        }
    }

    /// The transform under which every path maps to itself.
    pub fn identity(from: &Arc<Node<D>>) -> PathTransform<D> {
        PathTransform::new(from, Vec::new())
    }

    /// Serial number of the root this transform rewrites paths from.
    #[inline]
    pub fn from_serial(&self) -> SerialNumber {
        self.from_serial
    }

    /// The predecessor root, while something still keeps it alive.
    #[inline]
    pub fn predecessor(&self) -> Option<Arc<Node<D>>> {
        self.from.upgrade()
    }

    #[inline]
    pub fn entries(&self) -> &[TransformEntry] {
        &self.entries
    }

    /// Translates `path`, returning the rewritten path and any residue cut
    /// off by a dead entry. Paths no entry matches pass through unchanged.
    pub fn apply(&self, path: &Path) -> (Path, Path) {
        for entry in &self.entries {
            if let Some(result) = entry.apply(path) {
                return result;
            }
        }
        (path.clone(), Path::root())
    }
}

impl<D> fmt::Debug for PathTransform<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathTransform")
            .field("from", &self.from_serial)
            .field("entries", &self.entries)
            .finish()
    }
}

fn sort_entries(entries: &mut [TransformEntry]) {
    entries.sort_by(|a, b| b.pattern.len().cmp(&a.pattern.len()));
}

struct DiffEntry<D> {
    from_ptr: *const Node<D>,
    from_path: Path,
    parent: Option<SerialNumber>,
    to_path: Option<Path>,
    /// The walk of the successor tree stopped here: the whole subtree is
    /// shared, so descendants carry no entries of their own.
    shared: bool,
}

/// Synthesizes the rewrite taking paths valid at `from` to paths valid at
/// `to`, by diffing the identities the two roots share.
///
/// Paths landing on a preserved identity translate exactly; a path into a
/// dropped subtree degrades to the nearest surviving position with the
/// untranslated tail as residue. Derivation over arbitrary tree pairs is not
/// guaranteed minimal, only correct for preserved identities.
pub fn path_transform_of<D>(from: &Arc<Node<D>>, to: &Arc<Node<D>>) -> PathTransform<D> {
    let mut table: FxHashMap<SerialNumber, DiffEntry<D>> = FxHashMap::default();
    let mut ancestors: Vec<SerialNumber> = Vec::new();
    traverse_with_paths(from, |node, path| {
        ancestors.truncate(path.len());
        table.insert(
            node.serial(),
            DiffEntry {
                from_ptr: Arc::as_ptr(node),
                from_path: Path::from(path),
                parent: ancestors.last().copied(),
                to_path: None,
                shared: false,
            },
        );
        ancestors.push(node.serial());
        true
    });

    traverse_with_paths(to, |node, path| {
        if let Some(entry) = table.get_mut(&node.serial()) {
            entry.to_path = Some(Path::from(path));
            if std::ptr::eq(entry.from_ptr, Arc::as_ptr(node)) {
                // the whole subtree is shared; nothing below needs remapping
                entry.shared = true;
                return false;
            }
        }
        true
    });

    // Raw mapping over preserved identities, lexicographic by old path.
    let mut mapping: Vec<(&Path, &Path)> = table
        .values()
        .filter_map(|entry| entry.to_path.as_ref().map(|to| (&entry.from_path, to)))
        .collect();
    mapping.sort();

    // Compress by prefix subsumption: an entry derivable from the previous
    // survivor by suffix extension adds nothing.
    let mut kept: Vec<(&Path, &Path)> = Vec::new();
    for (old, new) in mapping {
        if let Some((old_top, new_top)) = kept.last() {
            if let Some(suffix) = old.strip_prefix(old_top) {
                let derivable = new.len() == new_top.len() + suffix.len()
                    && new_top.is_prefix_of(new)
                    && new.steps()[new_top.len()..] == *suffix;
                if derivable {
                    continue;
                }
            }
        }
        kept.push((old, new));
    }

    let mut entries: Vec<TransformEntry> = kept
        .into_iter()
        .map(|(old, new)| TransformEntry::literal(old, new.clone(), Status::Live))
        .collect();

    // Maximal dropped subtrees anchor dead entries at the parent's new
    // position, so stale paths into them degrade instead of lying. A node
    // with no entry of its own under a shared-pruned ancestor is not
    // dropped; the ancestor's live entry already covers it.
    let dropped: Vec<(Path, SerialNumber)> = table
        .values()
        .filter(|entry| entry.to_path.is_none())
        .filter_map(|entry| entry.parent.map(|parent| (entry.from_path.clone(), parent)))
        .collect();
    for (from_path, parent) in dropped {
        let survived = match table.get(&parent) {
            Some(parent_entry) if !parent_entry.shared => parent_entry.to_path.as_ref(),
            _ => None,
        };
        let Some(parent_to) = survived else {
            continue;
        };
        if let Some(&last) = from_path.last() {
            entries.push(TransformEntry::literal(&from_path, parent_to.child(last), Status::Dead));
        }
    }

    sort_entries(&mut entries);
    trace!(
        from = %from.serial(),
        to = %to.serial(),
        entries = entries.len(),
        "derived path transform"
    );
    PathTransform {
        from_serial: from.serial(),
        from: Arc::downgrade(from),
        entries,
    }
}

/// The node's back-reference as a materialized transform, deriving and
/// caching it on first observation. `None` when the node records no
/// predecessor.
pub fn transform_of<D>(node: &Arc<Node<D>>) -> Option<Arc<PathTransform<D>>> {
    let predecessor = {
        let backref = node.backref().read().unwrap();
        match &*backref {
            Backref::None => return None,
            Backref::Transform(transform) => return Some(transform.clone()),
            Backref::Node(predecessor) => predecessor.clone(),
        }
    };

    let derived = Arc::new(path_transform_of(&predecessor, node));
    debug!(
        from = %derived.from_serial(),
        entries = derived.entries().len(),
        "materialized path transform"
    );

    let mut backref = node.backref().write().unwrap();
    if let Backref::Transform(transform) = &*backref {
        // another reader materialized first; the results are structurally equal
        return Some(transform.clone());
    }
    *backref = Backref::Transform(derived.clone());
    Some(derived)
}

/// Translates `finger` into an equivalent reference under `target`.
///
/// Walks the back-pointer chain from `target` to the finger's root,
/// materializing each step lazily, then applies the steps oldest-first.
/// Each hop's dead cut is prepended to the residue accumulated so far; a
/// later hop only ever cuts a shallower prefix of the already-truncated
/// path, so the residue stays in root-to-leaf order and the translated path
/// followed by the residue always spells the stale locator below the
/// deepest surviving ancestor. Fails when no chain connects the two roots,
/// including when an intermediate predecessor has been dropped.
pub fn transform_finger<D: Clone>(finger: &Finger<D>, target: &Arc<Node<D>>) -> Result<Finger<D>, TreeError> {
    if Arc::ptr_eq(finger.root(), target) {
        return Ok(finger.clone());
    }

    let mut chain: Vec<Arc<PathTransform<D>>> = Vec::new();
    let mut current = target.clone();
    loop {
        let step = transform_of(&current).ok_or(TreeError::InvalidTransformApply)?;
        let predecessor = step.predecessor().ok_or(TreeError::InvalidTransformApply)?;
        chain.push(step);
        if Arc::ptr_eq(&predecessor, finger.root()) {
            break;
        }
        current = predecessor;
    }

    let mut path = finger.path().clone();
    let mut residue = finger.residue().clone();
    for step in chain.iter().rev() {
        let (translated, cut) = step.apply(&path);
        path = translated;
        residue = cut.concat(&residue);
    }
    Ok(Finger::with_residue(target.clone(), path, residue))
}
