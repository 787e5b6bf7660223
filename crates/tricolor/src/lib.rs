//! Supervisor and generator processes for a randomized 3-coloring search.
//!
//! The supervisor creates a shared ring of [`Solution`]s and keeps the best
//! one it reads. Generators attach to the ring, sample random colorings of
//! their graph, and publish every attempt with at most
//! [`MAX_CONFLICTS`] conflict edges. The first solution with no conflicts
//! ends the run.
//!
//! [`Solution`]: tricolor_graph::Solution
//! [`MAX_CONFLICTS`]: tricolor_graph::MAX_CONFLICTS

pub mod cli;
pub mod config;
pub mod error;
pub mod generator;
pub mod signals;
pub mod supervisor;

pub use config::Config;
pub use error::Error;
pub use generator::{Generator, GeneratorReport};
pub use supervisor::{BestTracker, Outcome, Supervisor, Verdict};
