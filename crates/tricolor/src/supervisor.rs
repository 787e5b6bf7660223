//! The consumer side: owns the ring, reads candidates, keeps the best one.

use std::io::Write;

use tricolor_graph::Solution;
use tricolor_shm::{RingNames, RingOwner, ShutdownReport};

use crate::error::Error;
use crate::signals::{self, SharedQuitGuard};

/// What [`BestTracker::offer`] made of a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// No conflicts: the graph is 3-colorable.
    Colorable,
    /// Fewer conflicts than anything seen before; now the best.
    Improved,
    /// Not better than the current best.
    Discarded,
}

/// Best (fewest-conflict) solution seen so far.
#[derive(Debug, Clone, Default)]
pub struct BestTracker {
    best: Option<Solution>,
}

impl BestTracker {
    pub fn offer(&mut self, candidate: Solution) -> Verdict {
        if candidate.is_perfect() {
            return Verdict::Colorable;
        }
        if self
            .best
            .is_some_and(|best| best.count() <= candidate.count())
        {
            return Verdict::Discarded;
        }
        self.best = Some(candidate);
        Verdict::Improved
    }

    pub fn best(&self) -> Option<&Solution> {
        self.best.as_ref()
    }
}

/// How [`Supervisor::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A zero-conflict solution was read.
    Colorable,
    /// Quit was requested from outside (a signal or the shared flag).
    Interrupted,
}

pub struct Supervisor {
    /// Declared before `ring`: it has to go away before the segment is
    /// unmapped.
    signal_route: Option<SharedQuitGuard>,
    ring: RingOwner<Solution>,
    tracker: BestTracker,
    consumed: u64,
}

impl Supervisor {
    /// Create the ring and its semaphores under `names`.
    pub fn create(names: &RingNames) -> Result<Self, Error> {
        Ok(Self {
            signal_route: None,
            ring: RingOwner::create(names)?,
            tracker: BestTracker::default(),
            consumed: 0,
        })
    }

    /// Let a termination signal set the shared quit flag directly, so
    /// generators see it without waiting for the supervisor loop.
    pub fn route_signals(&mut self) {
        if let Some(word) = self.ring.quit_word() {
            // SAFETY: the guard is stored in `self` and dropped before the
            // ring is shut down (explicitly in `shutdown`, and by field order
            // on drop).
            self.signal_route = Some(unsafe { signals::route_to_shared(word) });
        }
    }

    pub fn ring(&self) -> &RingOwner<Solution> {
        &self.ring
    }

    pub fn best(&self) -> Option<&Solution> {
        self.tracker.best()
    }

    /// Solutions read so far.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Read candidates until the graph is found colorable or quit is
    /// requested. Every improvement and the final announcement go to `out`.
    pub fn run<W: Write>(
        &mut self,
        out: &mut W,
        cancelled: impl Fn() -> bool,
    ) -> Result<Outcome, Error> {
        while !self.ring.is_quit() && !cancelled() {
            let Some(solution) = self.ring.consume(&cancelled)? else {
                break;
            };
            self.consumed += 1;

            match self.tracker.offer(solution) {
                Verdict::Colorable => {
                    // `consume` already returned this slot's free token; the
                    // ring is torn down next, so nobody can use it.
                    self.ring.request_quit();
                    writeln!(out, "[supervisor] The graph is 3-colorable!")
                        .and_then(|()| out.flush())
                        .map_err(Error::Output)?;
                    return Ok(Outcome::Colorable);
                }
                Verdict::Improved => {
                    tracing::debug!(conflicts = solution.count(), "new best solution");
                    writeln!(
                        out,
                        "[supervisor] Solution with {} edges: {}",
                        solution.count(),
                        solution
                    )
                    .and_then(|()| out.flush())
                    .map_err(Error::Output)?;
                }
                Verdict::Discarded => {
                    tracing::trace!(conflicts = solution.count(), "discarded solution");
                }
            }
        }
        Ok(Outcome::Interrupted)
    }

    /// Unroute signals, then release every producer and remove the ring.
    pub fn shutdown(&mut self) -> Result<ShutdownReport, Error> {
        self.signal_route = None;
        let report = self.ring.shutdown()?;
        tracing::info!(
            consumed = self.consumed,
            best = self.tracker.best().map(Solution::count),
            producers_released = report.producers_released,
            "supervisor stopped"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tricolor_graph::Edge;

    fn solution(conflicts: u32) -> Solution {
        let mut s = Solution::new();
        for i in 0..conflicts {
            assert!(s.try_push(Edge::new(i, i + 1)));
        }
        s
    }

    #[test]
    fn tracker_keeps_strictly_better_solutions() {
        let mut tracker = BestTracker::default();
        assert!(tracker.best().is_none());

        assert_eq!(tracker.offer(solution(5)), Verdict::Improved);
        assert_eq!(tracker.offer(solution(5)), Verdict::Discarded);
        assert_eq!(tracker.offer(solution(7)), Verdict::Discarded);
        assert_eq!(tracker.offer(solution(2)), Verdict::Improved);
        assert_eq!(tracker.best().map(Solution::count), Some(2));
    }

    #[test]
    fn any_first_solution_within_bound_is_an_improvement() {
        let mut tracker = BestTracker::default();
        assert_eq!(tracker.offer(solution(8)), Verdict::Improved);
    }

    #[test]
    fn perfect_solution_is_not_recorded_as_best() {
        let mut tracker = BestTracker::default();
        tracker.offer(solution(3));
        assert_eq!(tracker.offer(Solution::new()), Verdict::Colorable);
        assert_eq!(tracker.best().map(Solution::count), Some(3));
    }
}
