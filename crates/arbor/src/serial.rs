use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide monotone counter backing [`SerialNumber::fresh`].
static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a node.
///
/// Serial numbers are allocated at node construction and never reissued
/// within a process. A copy that does not override the serial keeps the
/// source node's identity, which is how identity survives edits.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SerialNumber(u64);

impl SerialNumber {
    /// Allocates the next unused serial number.
    ///
    /// Thread-safe; the counter only moves forward.
    #[inline]
    pub(crate) fn fresh() -> SerialNumber {
        SerialNumber(NEXT_SERIAL.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
