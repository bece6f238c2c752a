//! Stop conditions: predicates over the growing simulation history.

use std::sync::Arc;

use crate::corpus::InformationCorpus;
use crate::state::{IterationSummary, SimulationSnapshot};

/// Everything a stop condition may inspect after an iteration completes.
pub struct StopContext<'a> {
    /// Iterations completed so far.
    pub iteration: u32,
    /// Activity counts of the iteration that just finished.
    pub summary: &'a IterationSummary,
    /// Pieces flagged to send, summed over the whole run.
    pub total_propagated: u64,
    /// Timestamp cursor position for the next iteration; `None` once the
    /// corpus timeline is exhausted.
    pub timestamp: Option<i64>,
    /// All snapshots taken so far, the initial seeding included.
    pub history: &'a [Arc<SimulationSnapshot>],
    /// The corpus the run executes against.
    pub corpus: &'a InformationCorpus,
}

/// Predicate deciding when a run ends; checked after every iteration.
pub trait StopCondition: Send {
    fn should_stop(&self, cx: &StopContext<'_>) -> bool;
}

/// Caller-supplied predicate wrapped as a stop condition.
pub struct Custom<F>(pub F);

impl<F> StopCondition for Custom<F>
where
    F: Fn(&StopContext<'_>) -> bool + Send,
{
    fn should_stop(&self, cx: &StopContext<'_>) -> bool {
        (self.0)(cx)
    }
}

/// Stops once the given number of iterations has completed.
#[derive(Debug, Clone, Copy)]
pub struct MaxIterations(pub u32);

impl StopCondition for MaxIterations {
    fn should_stop(&self, cx: &StopContext<'_>) -> bool {
        cx.iteration >= self.0
    }
}

/// Stops when no user saw a previously unknown piece this iteration.
#[derive(Debug, Clone, Copy)]
pub struct NoMoreNew;

impl StopCondition for NoMoreNew {
    fn should_stop(&self, cx: &StopContext<'_>) -> bool {
        cx.summary.newly_seen == 0
    }
}

/// Stops when no user flagged anything to send this iteration.
#[derive(Debug, Clone, Copy)]
pub struct NoMorePropagated;

impl StopCondition for NoMorePropagated {
    fn should_stop(&self, cx: &StopContext<'_>) -> bool {
        cx.summary.pieces_sent == 0
    }
}

/// Stops once the cumulative number of sent pieces reaches a threshold.
#[derive(Debug, Clone, Copy)]
pub struct TotalPropagated(pub u64);

impl StopCondition for TotalPropagated {
    fn should_stop(&self, cx: &StopContext<'_>) -> bool {
        cx.total_propagated >= self.0
    }
}

/// Stops when the timestamp cursor passes the given instant (or runs out).
#[derive(Debug, Clone, Copy)]
pub struct MaxTimestamp(pub i64);

impl StopCondition for MaxTimestamp {
    fn should_stop(&self, cx: &StopContext<'_>) -> bool {
        cx.timestamp.is_none_or(|ts| ts > self.0)
    }
}

/// Stops once the corpus timeline is exhausted.
#[derive(Debug, Clone, Copy)]
pub struct NoMoreTimestamps;

impl StopCondition for NoMoreTimestamps {
    fn should_stop(&self, cx: &StopContext<'_>) -> bool {
        cx.timestamp.is_none()
    }
}

/// Combines conditions: the first one to fire halts the run.
pub struct AnyOf(pub Vec<Box<dyn StopCondition>>);

impl StopCondition for AnyOf {
    fn should_stop(&self, cx: &StopContext<'_>) -> bool {
        self.0.iter().any(|condition| condition.should_stop(cx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::CorpusBuilder;

    fn check(condition: &dyn StopCondition, iteration: u32, newly_seen: u64) -> bool {
        let corpus = CorpusBuilder::new().build().unwrap();
        let mut summary = IterationSummary::new(iteration);
        summary.newly_seen = newly_seen;
        summary.pieces_sent = newly_seen;
        let cx = StopContext {
            iteration,
            summary: &summary,
            total_propagated: newly_seen,
            timestamp: None,
            history: &[],
            corpus: &corpus,
        };
        condition.should_stop(&cx)
    }

    #[test]
    fn test_max_iterations() {
        assert!(!check(&MaxIterations(5), 4, 1));
        assert!(check(&MaxIterations(5), 5, 1));
    }

    #[test]
    fn test_quiescence_conditions() {
        assert!(check(&NoMoreNew, 1, 0));
        assert!(!check(&NoMoreNew, 1, 3));
        assert!(check(&NoMorePropagated, 1, 0));
        assert!(!check(&NoMorePropagated, 1, 3));
    }

    #[test]
    fn test_any_of_fires_on_first_match() {
        let any = AnyOf(vec![Box::new(MaxIterations(10)), Box::new(NoMoreNew)]);
        assert!(check(&any, 1, 0));
        assert!(!check(&any, 1, 2));
    }

    #[test]
    fn test_custom_predicate() {
        let custom = Custom(|cx: &StopContext<'_>| cx.iteration == 2);
        assert!(!check(&custom, 1, 1));
        assert!(check(&custom, 2, 1));
    }
}
