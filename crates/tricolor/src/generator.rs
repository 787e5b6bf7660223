//! The producer side: samples colorings and publishes the good ones.

use rand::Rng;
use tricolor_graph::{Graph, Solution};
use tricolor_shm::{Publish, RingNames, RingProducer};

use crate::error::Error;

/// Counters of one generator run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeneratorReport {
    /// Colorings sampled.
    pub attempts: u64,
    /// Solutions written into the ring.
    pub published: u64,
}

pub struct Generator<R> {
    ring: RingProducer<Solution>,
    graph: Graph,
    rng: R,
}

impl<R: Rng> Generator<R> {
    /// Attach to the supervisor's ring and register as a producer.
    ///
    /// Returns `Ok(None)` when the run is already over (quit is set); the
    /// generator then never registers.
    pub fn attach(names: &RingNames, graph: Graph, rng: R) -> Result<Option<Self>, Error> {
        let mut ring = RingProducer::open(names)?;
        if ring.is_quit() {
            tracing::info!("supervisor already quit; nothing to do");
            ring.detach()?;
            return Ok(None);
        }
        ring.register();
        tracing::info!(
            nodes = graph.nodes().len(),
            edges = graph.edges().len(),
            "attached"
        );
        Ok(Some(Self { ring, graph, rng }))
    }

    /// Sample and publish until quit is set in the ring or `cancelled`
    /// reports true. Quit is checked between attempts; an attempt in
    /// progress always finishes.
    pub fn run(&mut self, cancelled: impl Fn() -> bool) -> Result<GeneratorReport, Error> {
        let mut report = GeneratorReport::default();
        while !self.ring.is_quit() && !cancelled() {
            report.attempts += 1;
            let Some(solution) = self.graph.sample(&mut self.rng) else {
                continue;
            };
            match self.ring.publish(solution, &cancelled)? {
                Publish::Published { slot } => {
                    report.published += 1;
                    tracing::trace!(slot, conflicts = solution.count(), "published");
                }
                Publish::Cancelled => break,
            }
        }
        Ok(report)
    }

    /// Unregister and release the ring handles.
    pub fn detach(self) -> Result<(), Error> {
        self.ring.detach()?;
        tracing::info!("detached");
        Ok(())
    }
}
