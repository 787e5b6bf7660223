use std::fmt;

use crate::edge::Edge;

/// Most conflict edges a published solution may carry.
pub const MAX_CONFLICTS: usize = 8;

/// The conflict edges of one coloring attempt.
///
/// Fixed-size and `repr(C)` so it can be copied through a shared ring.
/// Unused entries stay zeroed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct Solution {
    edges: [Edge; MAX_CONFLICTS],
    len: u32,
}

impl Solution {
    pub const fn new() -> Self {
        Self {
            edges: [Edge::new(0, 0); MAX_CONFLICTS],
            len: 0,
        }
    }

    /// Append a conflict edge. Returns `false` (and changes nothing) when
    /// the solution already holds [`MAX_CONFLICTS`] edges.
    pub fn try_push(&mut self, edge: Edge) -> bool {
        let len = self.count();
        if len == MAX_CONFLICTS {
            return false;
        }
        self.edges[len] = edge;
        self.len += 1;
        true
    }

    /// Number of conflict edges.
    ///
    /// Values copied in from another process are clamped to
    /// [`MAX_CONFLICTS`].
    pub fn count(&self) -> usize {
        (self.len as usize).min(MAX_CONFLICTS)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges[..self.count()]
    }

    /// A solution with no conflicts is a proper 3-coloring.
    pub fn is_perfect(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, edge) in self.edges().iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{edge}")?;
        }
        Ok(())
    }
}
