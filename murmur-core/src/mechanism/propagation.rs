//! Fan-out: who receives the pieces a user flagged to send.

use std::collections::{HashMap, VecDeque};

use crate::corpus::{EdgeOrientation, InformationCorpus, UserIdx};
use crate::protocol::ProtocolError;
use crate::rng::SimRng;
use crate::state::PropagatedRecord;

/// Computes destination users for every flagged (sender, piece) pair.
///
/// Strategies with per-iteration pairing state (push, pull, push-pull,
/// fixed fan-out) rebuild it in [`PropagationMechanism::begin_iteration`],
/// which the simulator calls exactly once per iteration before any
/// destination query.
pub trait PropagationMechanism: Send {
    /// Recomputes per-iteration pairing state.
    fn begin_iteration(&mut self, corpus: &InformationCorpus) {
        let _ = corpus;
    }

    /// Destinations for one flagged record of `sender`.
    fn destinations(
        &mut self,
        sender: UserIdx,
        record: &PropagatedRecord,
        corpus: &InformationCorpus,
    ) -> Vec<UserIdx>;

    /// Checks compatibility with the corpus at protocol assembly time.
    ///
    /// # Errors
    ///
    /// - `ProtocolError` - The policy cannot run against this corpus
    fn validate(&self, corpus: &InformationCorpus) -> Result<(), ProtocolError> {
        let _ = corpus;
        Ok(())
    }
}

/// Broadcast: every neighbor along the configured orientation receives
/// every flagged piece.
#[derive(Debug, Clone, Copy)]
pub struct AllNeighbors {
    orientation: EdgeOrientation,
}

impl AllNeighbors {
    pub fn new(orientation: EdgeOrientation) -> Self {
        Self { orientation }
    }
}

impl PropagationMechanism for AllNeighbors {
    fn destinations(
        &mut self,
        sender: UserIdx,
        _record: &PropagatedRecord,
        corpus: &InformationCorpus,
    ) -> Vec<UserIdx> {
        corpus.graph().neighbors(sender, self.orientation)
    }
}

/// Revisit memory shared by the epidemic strategies: partners picked within
/// the last `wait` iterations are not picked again.
#[derive(Debug, Clone)]
struct PartnerMemory {
    wait: usize,
    visited: HashMap<UserIdx, VecDeque<Option<UserIdx>>>,
}

impl PartnerMemory {
    fn new(wait: usize) -> Self {
        Self {
            wait,
            visited: HashMap::new(),
        }
    }

    /// Picks one neighbor of `user` not visited within the wait window and
    /// records the outcome (a miss still advances the window).
    fn pick(
        &mut self,
        user: UserIdx,
        neighbors: &[UserIdx],
        rng: &mut SimRng,
    ) -> Option<UserIdx> {
        let visited = self.visited.entry(user).or_default();
        let fresh: Vec<UserIdx> = neighbors
            .iter()
            .copied()
            .filter(|v| !visited.contains(&Some(*v)))
            .collect();
        let partner = rng.choose(&fresh).copied();

        visited.push_back(partner);
        while visited.len() > self.wait {
            visited.pop_front();
        }
        partner
    }
}

/// Which way information flows relative to the picked partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PairingDirection {
    /// The picker sends to the partner.
    Push,
    /// The picker receives from the partner.
    Pull,
    /// Both directions at once.
    PushPull,
}

/// Epidemic partner pairing: every iteration each user picks one neighbor
/// and information flows along the configured direction.
///
/// This is the classical rumor-mongering family: push hands the payload to
/// the partner, pull takes the partner's payload, push-pull does both in a
/// single exchange.
#[derive(Debug, Clone)]
struct PartnerPairing {
    direction: PairingDirection,
    orientation: EdgeOrientation,
    memory: PartnerMemory,
    rng: SimRng,
    // sender -> destinations, rebuilt every iteration
    pairing: HashMap<UserIdx, Vec<UserIdx>>,
}

impl PartnerPairing {
    fn new(direction: PairingDirection, orientation: EdgeOrientation, wait: u32, seed: u64) -> Self {
        Self {
            direction,
            orientation,
            memory: PartnerMemory::new(wait as usize),
            rng: SimRng::from_seed(seed),
            pairing: HashMap::new(),
        }
    }

    fn rebuild(&mut self, corpus: &InformationCorpus) {
        self.pairing.clear();
        for user in corpus.users() {
            let neighbors = corpus.graph().neighbors(user, self.orientation);
            let Some(partner) = self.memory.pick(user, &neighbors, &mut self.rng) else {
                continue;
            };
            if matches!(
                self.direction,
                PairingDirection::Push | PairingDirection::PushPull
            ) {
                self.pairing.entry(user).or_default().push(partner);
            }
            if matches!(
                self.direction,
                PairingDirection::Pull | PairingDirection::PushPull
            ) {
                self.pairing.entry(partner).or_default().push(user);
            }
        }
    }

    fn destinations(&self, sender: UserIdx) -> Vec<UserIdx> {
        // Mutual picks produce the same pair twice (push + pull leg).
        let mut destinations = self.pairing.get(&sender).cloned().unwrap_or_default();
        destinations.sort_unstable();
        destinations.dedup();
        destinations
    }
}

/// Push strategy: each user hands flagged pieces to one freshly picked
/// neighbor per iteration.
#[derive(Debug, Clone)]
pub struct PushStrategy {
    pairing: PartnerPairing,
}

impl PushStrategy {
    /// `wait` controls how many iterations pass before the same partner can
    /// be picked again.
    pub fn new(orientation: EdgeOrientation, wait: u32, seed: u64) -> Self {
        Self {
            pairing: PartnerPairing::new(PairingDirection::Push, orientation, wait, seed),
        }
    }
}

impl PropagationMechanism for PushStrategy {
    fn begin_iteration(&mut self, corpus: &InformationCorpus) {
        self.pairing.rebuild(corpus);
    }

    fn destinations(
        &mut self,
        sender: UserIdx,
        _record: &PropagatedRecord,
        _corpus: &InformationCorpus,
    ) -> Vec<UserIdx> {
        self.pairing.destinations(sender)
    }
}

/// Pull strategy: each user picks one neighbor per iteration and takes
/// whatever that neighbor flagged.
#[derive(Debug, Clone)]
pub struct PullStrategy {
    pairing: PartnerPairing,
}

impl PullStrategy {
    pub fn new(orientation: EdgeOrientation, wait: u32, seed: u64) -> Self {
        Self {
            pairing: PartnerPairing::new(PairingDirection::Pull, orientation, wait, seed),
        }
    }
}

impl PropagationMechanism for PullStrategy {
    fn begin_iteration(&mut self, corpus: &InformationCorpus) {
        self.pairing.rebuild(corpus);
    }

    fn destinations(
        &mut self,
        sender: UserIdx,
        _record: &PropagatedRecord,
        _corpus: &InformationCorpus,
    ) -> Vec<UserIdx> {
        self.pairing.destinations(sender)
    }
}

/// Push-pull hybrid: the picked pair exchanges flagged pieces both ways in
/// the same iteration.
#[derive(Debug, Clone)]
pub struct PushPullStrategy {
    pairing: PartnerPairing,
}

impl PushPullStrategy {
    pub fn new(orientation: EdgeOrientation, wait: u32, seed: u64) -> Self {
        Self {
            pairing: PartnerPairing::new(PairingDirection::PushPull, orientation, wait, seed),
        }
    }
}

impl PropagationMechanism for PushPullStrategy {
    fn begin_iteration(&mut self, corpus: &InformationCorpus) {
        self.pairing.rebuild(corpus);
    }

    fn destinations(
        &mut self,
        sender: UserIdx,
        _record: &PropagatedRecord,
        _corpus: &InformationCorpus,
    ) -> Vec<UserIdx> {
        self.pairing.destinations(sender)
    }
}

/// Rumor spreading with a fixed per-iteration fan-out: each user forwards
/// to `fanout` distinct random neighbors every iteration.
#[derive(Debug, Clone)]
pub struct FixedFanout {
    orientation: EdgeOrientation,
    fanout: usize,
    rng: SimRng,
    pairing: HashMap<UserIdx, Vec<UserIdx>>,
}

impl FixedFanout {
    pub fn new(orientation: EdgeOrientation, fanout: usize, seed: u64) -> Self {
        Self {
            orientation,
            fanout,
            rng: SimRng::from_seed(seed),
            pairing: HashMap::new(),
        }
    }
}

impl PropagationMechanism for FixedFanout {
    fn begin_iteration(&mut self, corpus: &InformationCorpus) {
        self.pairing.clear();
        for user in corpus.users() {
            let neighbors = corpus.graph().neighbors(user, self.orientation);
            let picked = self.rng.sample_distinct(&neighbors, self.fanout);
            if !picked.is_empty() {
                self.pairing.insert(user, picked);
            }
        }
    }

    fn destinations(
        &mut self,
        sender: UserIdx,
        _record: &PropagatedRecord,
        _corpus: &InformationCorpus,
    ) -> Vec<UserIdx> {
        self.pairing.get(&sender).cloned().unwrap_or_default()
    }

    fn validate(&self, _corpus: &InformationCorpus) -> Result<(), ProtocolError> {
        if self.fanout == 0 {
            return Err(ProtocolError::InvalidParameter {
                mechanism: "FixedFanout",
                reason: "fanout must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{CorpusBuilder, EdgeKind, PieceIdx};

    fn record() -> PropagatedRecord {
        PropagatedRecord::new(PieceIdx::new(0), 0, Some(UserIdx::new(0)))
    }

    fn line_corpus() -> InformationCorpus {
        CorpusBuilder::new()
            .user("a")
            .user("b")
            .user("c")
            .piece("p", 0, &["a"])
            .edge("a", "b", 1.0, EdgeKind::Original)
            .edge("b", "c", 1.0, EdgeKind::Original)
            .build()
            .unwrap()
    }

    #[test]
    fn test_all_neighbors_broadcasts() {
        let corpus = line_corpus();
        let a = corpus.user_idx("a").unwrap();
        let b = corpus.user_idx("b").unwrap();

        let mut prop = AllNeighbors::new(EdgeOrientation::Out);
        assert_eq!(prop.destinations(a, &record(), &corpus), vec![b]);
    }

    #[test]
    fn test_push_picks_single_partner() {
        let corpus = line_corpus();
        let a = corpus.user_idx("a").unwrap();
        let b = corpus.user_idx("b").unwrap();

        let mut push = PushStrategy::new(EdgeOrientation::Out, 1, 42);
        push.begin_iteration(&corpus);
        assert_eq!(push.destinations(a, &record(), &corpus), vec![b]);
    }

    #[test]
    fn test_pull_reverses_flow() {
        let corpus = line_corpus();
        let a = corpus.user_idx("a").unwrap();
        let b = corpus.user_idx("b").unwrap();

        // b's only In-neighbor is a; pulling from a makes a the sender.
        let mut pull = PullStrategy::new(EdgeOrientation::In, 1, 42);
        pull.begin_iteration(&corpus);
        let destinations = pull.destinations(a, &record(), &corpus);
        assert!(destinations.contains(&b));
    }

    #[test]
    fn test_wait_window_blocks_revisit() {
        let corpus = line_corpus();
        let a = corpus.user_idx("a").unwrap();

        // a has exactly one Out-neighbor; with wait=2 it must skip the
        // iteration right after a visit.
        let mut push = PushStrategy::new(EdgeOrientation::Out, 2, 42);
        push.begin_iteration(&corpus);
        assert_eq!(push.destinations(a, &record(), &corpus).len(), 1);
        push.begin_iteration(&corpus);
        assert!(push.destinations(a, &record(), &corpus).is_empty());
    }

    #[test]
    fn test_push_pull_pairs_both_ways() {
        let corpus = line_corpus();
        let a = corpus.user_idx("a").unwrap();
        let b = corpus.user_idx("b").unwrap();

        let mut strategy = PushPullStrategy::new(EdgeOrientation::Both, 1, 7);
        strategy.begin_iteration(&corpus);
        // a picked some partner; that partner also sends back to a.
        let sent = strategy.destinations(a, &record(), &corpus);
        assert!(!sent.is_empty());
        let partner = sent[0];
        assert!(
            strategy
                .destinations(partner, &record(), &corpus)
                .contains(&a)
        );
        let _ = b;
    }

    #[test]
    fn test_fixed_fanout_caps_destinations() {
        let corpus = CorpusBuilder::new()
            .user("hub")
            .user("x")
            .user("y")
            .user("z")
            .piece("p", 0, &["hub"])
            .edge("hub", "x", 1.0, EdgeKind::Original)
            .edge("hub", "y", 1.0, EdgeKind::Original)
            .edge("hub", "z", 1.0, EdgeKind::Original)
            .build()
            .unwrap();
        let hub = corpus.user_idx("hub").unwrap();

        let mut fanout = FixedFanout::new(EdgeOrientation::Out, 2, 3);
        fanout.begin_iteration(&corpus);
        assert_eq!(fanout.destinations(hub, &record(), &corpus).len(), 2);
    }
}
