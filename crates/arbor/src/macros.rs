/// Builds a [`Path`](crate::Path) from step literals.
///
/// Bare integers become index steps, slot names become scalar-slot steps,
/// and `(name, index)` pairs become slot-index steps:
///
/// ```
/// use arbor::{Path, PathStep, path};
///
/// let p = path![("then", 2), 0];
/// assert_eq!(p.steps(), &[PathStep::SlotIndex("then", 2), PathStep::Index(0)]);
/// assert_eq!(path![], Path::root());
/// ```
#[macro_export]
macro_rules! path {
    () => {
        $crate::Path::root()
    };
    ($($step:expr),+ $(,)?) => {
        $crate::Path::from_steps([$($crate::PathStep::from($step)),+])
    };
}
