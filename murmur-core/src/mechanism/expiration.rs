//! Aging of received pieces into the discarded set.

use crate::corpus::{InformationCorpus, PieceIdx};
use crate::protocol::ProtocolError;
use crate::rng::SimRng;
use crate::state::{PropagatedRecord, UserState};

/// Decides which received entries expire at the end of an iteration.
///
/// Implementations return the piece ids to move to discarded; the caller
/// performs the move, so a policy cannot corrupt state by returning ids the
/// user never received.
pub trait ExpirationMechanism: Send {
    /// Pieces from the user's received set that expire this iteration.
    fn expire(
        &mut self,
        user: &UserState,
        corpus: &InformationCorpus,
        iteration: u32,
        timestamp: Option<i64>,
    ) -> Vec<PieceIdx>;

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

fn sorted_received(user: &UserState) -> Vec<&PropagatedRecord> {
    let mut records: Vec<&PropagatedRecord> = user.received().collect();
    records.sort_by_key(|record| record.piece());
    records
}

/// Received pieces never expire.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverExpire;

impl ExpirationMechanism for NeverExpire {
    fn expire(
        &mut self,
        _user: &UserState,
        _corpus: &InformationCorpus,
        _iteration: u32,
        _timestamp: Option<i64>,
    ) -> Vec<PieceIdx> {
        Vec::new()
    }
}

/// Everything still unsent at the end of the iteration expires.
///
/// Cascade-style protocols use this so each piece gets exactly one
/// iteration of eligibility after arrival.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpireAll;

impl ExpirationMechanism for ExpireAll {
    fn expire(
        &mut self,
        user: &UserState,
        _corpus: &InformationCorpus,
        _iteration: u32,
        _timestamp: Option<i64>,
    ) -> Vec<PieceIdx> {
        sorted_received(user)
            .into_iter()
            .map(PropagatedRecord::piece)
            .collect()
    }
}

/// Pieces expire a fixed number of iterations after they were first seen.
#[derive(Debug, Clone, Copy)]
pub struct FixedTtl {
    iterations: u32,
}

impl FixedTtl {
    /// Expires pieces whose age reaches `iterations`.
    pub fn new(iterations: u32) -> Self {
        Self { iterations }
    }
}

impl ExpirationMechanism for FixedTtl {
    fn expire(
        &mut self,
        user: &UserState,
        _corpus: &InformationCorpus,
        iteration: u32,
        _timestamp: Option<i64>,
    ) -> Vec<PieceIdx> {
        sorted_received(user)
            .into_iter()
            .filter(|record| iteration.saturating_sub(record.first_seen()) >= self.iterations)
            .map(PropagatedRecord::piece)
            .collect()
    }
}

/// Each received piece survives an iteration with probability
/// `0.5^(1 / half_life)`, so about half the backlog remains after
/// `half_life` iterations.
#[derive(Debug, Clone)]
pub struct ExponentialDecay {
    half_life: f64,
    rng: SimRng,
}

impl ExponentialDecay {
    /// Creates the policy with its own seeded generator.
    pub fn new(half_life: f64, seed: u64) -> Self {
        Self {
            half_life,
            rng: SimRng::from_seed(seed),
        }
    }
}

impl ExpirationMechanism for ExponentialDecay {
    fn expire(
        &mut self,
        user: &UserState,
        _corpus: &InformationCorpus,
        _iteration: u32,
        _timestamp: Option<i64>,
    ) -> Vec<PieceIdx> {
        let drop_probability = 1.0 - 0.5f64.powf(1.0 / self.half_life);
        sorted_received(user)
            .into_iter()
            .filter(|_| self.rng.random_bool(drop_probability))
            .map(PropagatedRecord::piece)
            .collect()
    }

    fn validate(&self, _corpus: &InformationCorpus) -> Result<(), ProtocolError> {
        if self.half_life <= 0.0 {
            return Err(ProtocolError::InvalidParameter {
                mechanism: "ExponentialDecay",
                reason: format!("half_life must be positive, got {}", self.half_life),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{CorpusBuilder, UserIdx};
    use crate::mechanism::update::{DiscardPolicy, MergeUpdate};

    fn corpus() -> InformationCorpus {
        CorpusBuilder::new()
            .user("a")
            .piece("p", 0, &["a"])
            .build()
            .unwrap()
    }

    fn state_with_received(pieces: &[(u32, u32)]) -> UserState {
        let update = MergeUpdate::new(DiscardPolicy::Resurrect);
        let mut state = UserState::new(UserIdx::new(0));
        for &(piece, iteration) in pieces {
            state.update_seen(
                PropagatedRecord::new(PieceIdx::new(piece), iteration, Some(UserIdx::new(1))),
                &update,
            );
            state.update_seen_to_received(&update);
        }
        state
    }

    #[test]
    fn test_never_and_all() {
        let corpus = corpus();
        let state = state_with_received(&[(0, 1), (1, 2)]);

        assert!(NeverExpire.expire(&state, &corpus, 5, None).is_empty());
        assert_eq!(
            ExpireAll.expire(&state, &corpus, 5, None),
            vec![PieceIdx::new(0), PieceIdx::new(1)]
        );
    }

    #[test]
    fn test_fixed_ttl_uses_first_seen_age() {
        let corpus = corpus();
        let state = state_with_received(&[(0, 1), (1, 4)]);

        let mut ttl = FixedTtl::new(3);
        assert_eq!(ttl.expire(&state, &corpus, 4, None), vec![PieceIdx::new(0)]);
        assert_eq!(
            ttl.expire(&state, &corpus, 7, None),
            vec![PieceIdx::new(0), PieceIdx::new(1)]
        );
    }

    #[test]
    fn test_exponential_decay_validates_half_life() {
        let corpus = corpus();
        assert!(ExponentialDecay::new(0.0, 1).validate(&corpus).is_err());
        assert!(ExponentialDecay::new(4.0, 1).validate(&corpus).is_ok());
    }
}
