//! The iteration-driving simulator.
//!
//! Each step runs the protocol's fixed per-iteration algorithm over the
//! whole population in two strictly separated phases: a decide phase that
//! reads only the acting user's state plus the previous iteration's frozen
//! snapshot, and an apply phase that mutates destination states from
//! batched delivery events. The iteration boundary is a hard barrier: the
//! seen-to-received drain completes for every user before the next
//! iteration's selection begins.

pub mod stop;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::SimulationConfig;
use crate::corpus::{InformationCorpus, PieceIdx, UserIdx};
use crate::mechanism::selection::{Selection, SelectionContext};
use crate::protocol::Protocol;
use crate::state::{IterationSummary, PropagatedRecord, SimulationSnapshot, UserState};

pub use stop::{
    AnyOf, Custom, MaxIterations, MaxTimestamp, NoMoreNew, NoMorePropagated, NoMoreTimestamps,
    StopCondition, StopContext, TotalPropagated,
};

/// Errors that can occur while driving a simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// A step was requested after the stop condition fired
    #[error("Simulation already stopped after {iterations} iterations")]
    AlreadyStopped {
        /// Iterations completed when the run stopped
        iterations: u32,
    },

    /// The configured iteration guard was hit before the stop condition
    #[error("Iteration limit exceeded: {limit}")]
    IterationLimitExceeded {
        /// Configured hard limit
        limit: u32,
    },

    /// A piece id turned up in two mutually exclusive sets
    #[error("State invariant violated for {user}: {piece} present in {first} and {second}")]
    InvariantViolation {
        /// User whose state is corrupt
        user: UserIdx,
        /// Offending piece
        piece: PieceIdx,
        /// First set holding the piece
        first: &'static str,
        /// Second set holding the piece
        second: &'static str,
    },
}

/// Lifecycle of a [`Simulator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    /// States seeded, nothing executed yet.
    Initialized,
    /// At least one iteration executed, stop condition not yet fired.
    Running,
    /// Stop condition fired (or a fatal error occurred); the history is
    /// final.
    Stopped,
}

/// Result of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    /// Label of the protocol that ran
    pub protocol: String,
    /// Iterations completed
    pub iterations: u32,
    /// Pieces flagged to send over the whole run
    pub total_propagated: u64,
    /// Users that observed at least one piece during the run
    pub users_reached: usize,
    /// Per-iteration activity counts
    pub summaries: Vec<IterationSummary>,
}

impl SimulationReport {
    /// Generates a human-readable summary.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Simulation report: {}\n", self.protocol));
        out.push_str(&format!("Iterations: {}\n", self.iterations));
        out.push_str(&format!("Pieces sent: {}\n", self.total_propagated));
        out.push_str(&format!("Users reached: {}\n", self.users_reached));
        for summary in &self.summaries {
            out.push_str(&format!(
                "  iter {:>4}: {} senders, {} sent, {} delivered, {} new, {} re-received, {} discarded\n",
                summary.iteration,
                summary.propagating_users.len(),
                summary.pieces_sent,
                summary.deliveries,
                summary.newly_seen,
                summary.re_received,
                summary.discarded,
            ));
        }
        out
    }
}

/// Drives a [`Protocol`] across iterations until a [`StopCondition`] fires.
///
/// The corpus is read-only for the entire run. Per-user states live in an
/// arena indexed by the corpus's dense user indices; an immutable snapshot
/// of the whole arena is appended to history after every iteration, so an
/// embedding caller can checkpoint or cancel at any boundary.
pub struct Simulator {
    corpus: Arc<InformationCorpus>,
    protocol: Protocol,
    stop: Box<dyn StopCondition>,
    config: SimulationConfig,
    states: Vec<UserState>,
    history: Vec<Arc<SimulationSnapshot>>,
    summaries: Vec<IterationSummary>,
    iteration: u32,
    timestamp: Option<i64>,
    total_propagated: u64,
    run_state: RunState,
}

impl Simulator {
    /// Creates a simulator with every user's state seeded from the
    /// corpus's creator relation.
    pub fn new(
        corpus: Arc<InformationCorpus>,
        protocol: Protocol,
        stop: impl StopCondition + 'static,
        config: SimulationConfig,
    ) -> Self {
        let mut states: Vec<UserState> = (0..corpus.user_index_space() as u32)
            .map(|idx| UserState::new(UserIdx::new(idx)))
            .collect();
        for user in corpus.users() {
            let seeds: Vec<PropagatedRecord> = corpus
                .authored(user)
                .iter()
                .map(|&piece| PropagatedRecord::new(piece, 0, Some(user)))
                .collect();
            states[user.as_usize()].reset_own(seeds);
        }

        let timestamp = corpus.first_timestamp();
        let history = vec![Arc::new(SimulationSnapshot::capture(0, &states))];
        info!(
            protocol = protocol.label(),
            timestamp = ?timestamp,
            "simulation initialized: {}",
            corpus.summary()
        );

        Self {
            corpus,
            protocol,
            stop: Box::new(stop),
            config,
            states,
            history,
            summaries: Vec::new(),
            iteration: 0,
            timestamp,
            total_propagated: 0,
            run_state: RunState::Initialized,
        }
    }

    /// Current lifecycle state.
    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    /// Iterations completed so far.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// All snapshots taken so far; index 0 is the initial seeding.
    pub fn history(&self) -> &[Arc<SimulationSnapshot>] {
        &self.history
    }

    /// The most recent snapshot.
    pub fn latest(&self) -> &Arc<SimulationSnapshot> {
        self.history
            .last()
            .unwrap_or_else(|| unreachable!("history always holds the seeding snapshot"))
    }

    /// Executes iterations until the stop condition fires, then reports.
    ///
    /// # Errors
    ///
    /// - `SimulationError::IterationLimitExceeded` - The configured guard
    ///   fired before the stop condition
    /// - `SimulationError::InvariantViolation` - State corruption detected
    ///   (requires `check_invariants`)
    pub fn run(&mut self) -> Result<SimulationReport, SimulationError> {
        while self.run_state != RunState::Stopped {
            self.step()?;
        }
        Ok(self.report())
    }

    /// Executes exactly one iteration.
    ///
    /// # Errors
    ///
    /// - `SimulationError::AlreadyStopped` - The run is over
    /// - `SimulationError::IterationLimitExceeded` - The configured guard
    ///   fired
    /// - `SimulationError::InvariantViolation` - State corruption detected
    ///   (requires `check_invariants`)
    pub fn step(&mut self) -> Result<&Arc<SimulationSnapshot>, SimulationError> {
        if self.run_state == RunState::Stopped {
            return Err(SimulationError::AlreadyStopped {
                iterations: self.iteration,
            });
        }
        let executing = self.iteration + 1;
        if executing > self.config.max_iterations {
            self.run_state = RunState::Stopped;
            return Err(SimulationError::IterationLimitExceeded {
                limit: self.config.max_iterations,
            });
        }
        self.run_state = RunState::Running;

        let corpus = Arc::clone(&self.corpus);
        let previous = Arc::clone(self.latest());
        let mut summary = IterationSummary::new(executing);

        self.protocol.propagation.begin_iteration(&corpus);
        self.protocol.sight.begin_iteration(&corpus);

        // Decide phase: selection reads only the acting user's state and
        // the previous snapshot, then the sender-side moves are applied.
        let cx = SelectionContext {
            corpus: &corpus,
            snapshot: &previous,
            iteration: executing,
            timestamp: self.timestamp,
        };
        let mut selections: Vec<(UserIdx, Selection)> = Vec::new();
        for user in self.protocol.selection.selectable_users(&cx) {
            if !corpus.is_user(user) {
                continue;
            }
            let selection = self
                .protocol
                .selection
                .select(&self.states[user.as_usize()], &cx);
            if selection.is_empty() {
                continue;
            }
            let state = &mut self.states[user.as_usize()];
            state.update_own_to_propagated(&selection.own_pieces());
            state.update_received_to_propagated(&selection.received_pieces());
            summary.propagating_users.push(user);
            summary.pieces_sent += selection.len() as u64;
            selections.push((user, selection));
        }

        // Expiration: still per-user local.
        for user in corpus.users() {
            let state = &mut self.states[user.as_usize()];
            if state.received_count() == 0 {
                continue;
            }
            let expired =
                self.protocol
                    .expiration
                    .expire(state, &corpus, executing, self.timestamp);
            let moved = expired
                .iter()
                .filter(|&&piece| state.contains_received(piece))
                .count() as u64;
            state.discard_received(&expired);
            summary.discarded += moved;
        }

        // Fan-out: batch every delivery as (destination, sender) events.
        let mut deliveries: BTreeMap<(UserIdx, UserIdx), Vec<PropagatedRecord>> = BTreeMap::new();
        for (sender, selection) in &selections {
            for record in selection.records() {
                for destination in
                    self.protocol
                        .propagation
                        .destinations(*sender, record, &corpus)
                {
                    if destination != *sender && corpus.is_user(destination) {
                        deliveries
                            .entry((destination, *sender))
                            .or_default()
                            .push(record.clone());
                    }
                }
            }
        }

        // Apply phase: each destination's state is touched by exactly one
        // batch at a time, in deterministic (destination, sender) order.
        for ((destination, _sender), batch) in &deliveries {
            let visible =
                self.protocol
                    .sight
                    .observe(&self.states[destination.as_usize()], &corpus, batch);
            let state = &mut self.states[destination.as_usize()];
            for record in visible {
                let piece = record.piece();
                if state.contains_own(piece) || state.contains_propagated(piece) {
                    // Delivered back to someone who authored or sent it:
                    // counted neither as new nor as re-received.
                } else if state.contains_received(piece) || state.contains_discarded(piece) {
                    summary.re_received += 1;
                } else if !state.contains_seen(piece) {
                    summary.newly_seen += 1;
                }
                summary.deliveries += 1;
                state.update_seen(record, &*self.protocol.update);
            }
        }

        // Barrier: every user's seen set drains before the next iteration.
        for user in corpus.users() {
            self.states[user.as_usize()].update_seen_to_received(&*self.protocol.update);
        }

        if self.config.check_invariants {
            for state in &self.states {
                if let Some((piece, first, second)) = state.partition_violation() {
                    self.run_state = RunState::Stopped;
                    return Err(SimulationError::InvariantViolation {
                        user: state.user(),
                        piece,
                        first,
                        second,
                    });
                }
            }
        }

        self.iteration = executing;
        self.total_propagated += summary.pieces_sent;
        self.timestamp = self.timestamp.and_then(|ts| corpus.next_timestamp(ts));
        self.history
            .push(Arc::new(SimulationSnapshot::capture(executing, &self.states)));

        debug!(
            iteration = executing,
            senders = summary.propagating_users.len(),
            sent = summary.pieces_sent,
            delivered = summary.deliveries,
            newly_seen = summary.newly_seen,
            "iteration finished"
        );
        if self.config.log_every > 0 && executing % self.config.log_every == 0 {
            info!(iteration = executing, total_sent = self.total_propagated, "progress");
        }

        let stop_cx = StopContext {
            iteration: executing,
            summary: &summary,
            total_propagated: self.total_propagated,
            timestamp: self.timestamp,
            history: &self.history,
            corpus: &corpus,
        };
        if self.stop.should_stop(&stop_cx) {
            info!(iteration = executing, "stop condition fired");
            self.run_state = RunState::Stopped;
        }
        self.summaries.push(summary);

        Ok(self.latest())
    }

    /// Builds the report for the iterations completed so far.
    pub fn report(&self) -> SimulationReport {
        let users_reached = self
            .corpus
            .users()
            .filter(|user| {
                self.states[user.as_usize()]
                    .all()
                    .any(|record| record.first_seen() > 0)
            })
            .count();
        SimulationReport {
            protocol: self.protocol.label().to_string(),
            iterations: self.iteration,
            total_propagated: self.total_propagated,
            users_reached,
            summaries: self.summaries.clone(),
        }
    }
}
