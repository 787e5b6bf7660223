//! Graph model and randomized 3-coloring search.
//!
//! A [`Graph`] is built from parsed [`Edge`]s. Each call to
//! [`Graph::sample`] recolors every node uniformly at random and collects
//! the same-colored edges into a [`Solution`]. Attempts with more than
//! [`MAX_CONFLICTS`] conflicts are discarded, so every returned solution is
//! complete.
//!
//! [`Edge`] and [`Solution`] are `repr(C)` and `Copy`: they are meant to be
//! copied wholesale through shared memory.

mod edge;
mod graph;
mod solution;

pub use edge::{Edge, ParseEdgeError};
pub use graph::{Color, Graph, GraphError, Node};
pub use solution::{MAX_CONFLICTS, Solution};
