//! Builders for the named classical diffusion models.
//!
//! Each preset wires the mechanism combination the literature describes;
//! the returned builder can still be customized before `build`. Seeds are
//! split per mechanism with [`SimRng::fork`] so two mechanisms never share
//! a random stream.

use crate::corpus::EdgeOrientation;
use crate::mechanism::expiration::ExpireAll;
use crate::mechanism::propagation::{
    AllNeighbors, FixedFanout, PullStrategy, PushPullStrategy, PushStrategy,
};
use crate::mechanism::selection::{
    CascadeProbability, CascadeSelector, CountSelector, Quota, ReplaySelector, Threshold,
    ThresholdSelector, WaitingSelection,
};
use crate::rng::SimRng;

use super::ProtocolBuilder;

fn seeds(seed: u64) -> (u64, u64) {
    let root = SimRng::from_seed(seed);
    (root.fork(1).seed(), root.fork(2).seed())
}

/// Baseline model: each user releases up to `num_own` own and
/// `num_received` received pieces to every neighbor, nothing expires.
pub fn simple(
    num_own: Quota,
    num_received: Quota,
    orientation: EdgeOrientation,
    seed: u64,
) -> ProtocolBuilder {
    let (selection_seed, _) = seeds(seed);
    ProtocolBuilder::new("simple")
        .selection(CountSelector::simple(num_own, num_received, selection_seed))
        .propagation(AllNeighbors::new(orientation))
}

/// Push epidemic: everything available goes to one freshly picked partner
/// per iteration.
pub fn push(wait: u32, orientation: EdgeOrientation, seed: u64) -> ProtocolBuilder {
    let (selection_seed, propagation_seed) = seeds(seed);
    ProtocolBuilder::new("push")
        .selection(CountSelector::simple(Quota::All, Quota::All, selection_seed))
        .propagation(PushStrategy::new(orientation, wait, propagation_seed))
}

/// Pull epidemic: each user takes the payload of one picked partner per
/// iteration; a user that just ran selection is not selectable again until
/// `wait` iterations have passed.
pub fn pull(wait: u32, orientation: EdgeOrientation, seed: u64) -> ProtocolBuilder {
    let (selection_seed, propagation_seed) = seeds(seed);
    let selection = CountSelector::simple(Quota::All, Quota::All, selection_seed);
    ProtocolBuilder::new("pull")
        .selection(WaitingSelection::new(Box::new(selection), wait))
        .propagation(PullStrategy::new(orientation, wait, propagation_seed))
}

/// Push-pull hybrid: the picked pair exchanges payloads both ways.
pub fn push_pull(wait: u32, orientation: EdgeOrientation, seed: u64) -> ProtocolBuilder {
    let (selection_seed, propagation_seed) = seeds(seed);
    ProtocolBuilder::new("push-pull")
        .selection(CountSelector::simple(Quota::All, Quota::All, selection_seed))
        .propagation(PushPullStrategy::new(orientation, wait, propagation_seed))
}

/// Rumor spreading: fixed fan-out of `fanout` random neighbors per
/// iteration.
pub fn rumor_spreading(
    fanout: usize,
    orientation: EdgeOrientation,
    seed: u64,
) -> ProtocolBuilder {
    let (selection_seed, propagation_seed) = seeds(seed);
    ProtocolBuilder::new("rumor-spreading")
        .selection(CountSelector::simple(Quota::All, Quota::All, selection_seed))
        .propagation(FixedFanout::new(orientation, fanout, propagation_seed))
}

/// Independent cascade: each observation of a newly received piece gets one
/// Bernoulli trial with probability `probability`; unsent pieces expire
/// immediately, so every activated neighbor grants exactly one chance.
pub fn independent_cascade(
    probability: f64,
    num_own: Quota,
    orientation: EdgeOrientation,
    seed: u64,
) -> ProtocolBuilder {
    let (selection_seed, _) = seeds(seed);
    ProtocolBuilder::new("independent-cascade")
        .selection(CascadeSelector::new(
            num_own,
            Quota::None,
            CascadeProbability::Fixed(probability),
            selection_seed,
        ))
        .propagation(AllNeighbors::new(orientation))
        .expiration(ExpireAll)
}

/// Threshold model with an absolute adopter count.
pub fn count_threshold(
    num_own: Quota,
    count: u32,
    orientation: EdgeOrientation,
    seed: u64,
) -> ProtocolBuilder {
    let (selection_seed, _) = seeds(seed);
    ProtocolBuilder::new("count-threshold")
        .selection(ThresholdSelector::new(
            num_own,
            Threshold::Count(count),
            orientation,
            selection_seed,
        ))
        .propagation(AllNeighbors::new(orientation))
}

/// Threshold model with a neighborhood proportion.
pub fn proportion_threshold(
    num_own: Quota,
    proportion: f64,
    orientation: EdgeOrientation,
    seed: u64,
) -> ProtocolBuilder {
    let (selection_seed, _) = seeds(seed);
    ProtocolBuilder::new("proportion-threshold")
        .selection(ThresholdSelector::new(
            num_own,
            Threshold::Proportion(proportion),
            orientation,
            selection_seed,
        ))
        .propagation(AllNeighbors::new(orientation))
}

/// Temporal replay: releases and repropagations follow the corpus's
/// recorded history instead of a synthetic policy.
pub fn temporal_replay(orientation: EdgeOrientation) -> ProtocolBuilder {
    ProtocolBuilder::new("temporal-replay")
        .selection(ReplaySelector::new())
        .propagation(AllNeighbors::new(orientation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{CorpusBuilder, EdgeKind, InformationCorpus};

    fn corpus() -> InformationCorpus {
        CorpusBuilder::new()
            .user("a")
            .user("b")
            .piece("p", 0, &["a"])
            .edge("a", "b", 1.0, EdgeKind::Original)
            .ground_truth("b", "p", 2)
            .build()
            .unwrap()
    }

    #[test]
    fn test_all_presets_assemble() {
        let corpus = corpus();
        let orientation = EdgeOrientation::Out;
        let builders = [
            simple(Quota::Limit(1), Quota::Limit(1), orientation, 1),
            push(1, orientation, 1),
            pull(1, orientation, 1),
            push_pull(1, orientation, 1),
            rumor_spreading(2, orientation, 1),
            independent_cascade(0.5, Quota::Limit(1), orientation, 1),
            count_threshold(Quota::Limit(1), 2, orientation, 1),
            proportion_threshold(Quota::Limit(1), 0.5, orientation, 1),
            temporal_replay(orientation),
        ];
        for builder in builders {
            builder.build(&corpus).unwrap();
        }
    }

    #[test]
    fn test_invalid_cascade_probability_rejected() {
        let corpus = corpus();
        let result =
            independent_cascade(1.5, Quota::None, EdgeOrientation::Out, 1).build(&corpus);
        assert!(result.is_err());
    }
}
