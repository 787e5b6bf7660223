use std::collections::HashMap;
use std::fmt;

use rand::Rng;
use rand::distr::{Distribution, StandardUniform};

use crate::edge::Edge;
use crate::solution::Solution;

/// One of the three node colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    Red,
    Green,
    Blue,
}

impl Distribution<Color> for StandardUniform {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Color {
        match rng.random_range(0..3u8) {
            0 => Color::Red,
            1 => Color::Green,
            _ => Color::Blue,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Node {
    pub index: u32,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    NoEdges,
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::NoEdges => write!(f, "a graph needs at least one edge"),
        }
    }
}

impl std::error::Error for GraphError {}

/// An immutable edge set plus the current coloring of its nodes.
#[derive(Debug, Clone)]
pub struct Graph {
    /// Distinct endpoint ids, in first-seen order.
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    /// Positions of each edge's endpoints in `nodes`.
    endpoints: Vec<(usize, usize)>,
}

impl Graph {
    /// Build a graph from its edges. Nodes are the distinct endpoint ids;
    /// every node starts out red.
    pub fn new(edges: Vec<Edge>) -> Result<Self, GraphError> {
        if edges.is_empty() {
            return Err(GraphError::NoEdges);
        }

        let mut nodes = Vec::new();
        let mut positions = HashMap::new();
        let mut position_of = |index: u32| {
            *positions.entry(index).or_insert_with(|| {
                nodes.push(Node {
                    index,
                    color: Color::Red,
                });
                nodes.len() - 1
            })
        };
        let endpoints = edges
            .iter()
            .map(|edge| (position_of(edge.first), position_of(edge.second)))
            .collect();

        Ok(Self {
            nodes,
            edges,
            endpoints,
        })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Assign every node the color `color_of(node_id)`.
    pub fn color_with(&mut self, mut color_of: impl FnMut(u32) -> Color) {
        for node in &mut self.nodes {
            node.color = color_of(node.index);
        }
    }

    /// Draw a fresh color for every node, uniformly and independently.
    pub fn recolor<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.color_with(|_| rng.random());
    }

    /// Collect the same-colored edges of the current coloring, in edge order.
    ///
    /// Returns `None` as soon as more than [`MAX_CONFLICTS`] are found; a
    /// truncated solution is never returned.
    ///
    /// [`MAX_CONFLICTS`]: crate::MAX_CONFLICTS
    pub fn conflicts(&self) -> Option<Solution> {
        let mut solution = Solution::new();
        for (edge, &(a, b)) in self.edges.iter().zip(&self.endpoints) {
            if self.nodes[a].color == self.nodes[b].color && !solution.try_push(*edge) {
                return None;
            }
        }
        Some(solution)
    }

    /// One search attempt: recolor at random, then scan for conflicts.
    pub fn sample<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<Solution> {
        self.recolor(rng);
        self.conflicts()
    }
}
