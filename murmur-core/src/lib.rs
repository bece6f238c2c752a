//! Murmur Core - Information diffusion simulation over social graphs
//!
//! This crate provides the building blocks for simulating how discrete
//! information pieces spread across a social graph over logical rounds:
//! the read-only corpus, the per-user propagation state machine, the five
//! pluggable mechanism families, their composition into protocols, and the
//! iteration-driving simulator with stop conditions.

pub mod config;
pub mod corpus;
pub mod mechanism;
pub mod protocol;
pub mod rng;
pub mod simulator;
pub mod state;

// Re-export main types for convenient access
pub use config::SimulationConfig;
pub use corpus::{
    CorpusBuilder, CorpusError, EdgeKind, EdgeOrientation, InformationCorpus, PieceIdx,
    SocialGraph, UserIdx,
};
pub use protocol::{Protocol, ProtocolBuilder, ProtocolError, presets};
pub use rng::SimRng;
pub use simulator::{
    RunState, SimulationError, SimulationReport, Simulator, StopCondition, StopContext,
};
pub use state::{IterationSummary, PropagatedRecord, SimulationSnapshot, UserState};

/// Core errors that can bubble up from any Murmur subsystem.
#[derive(Debug, thiserror::Error)]
pub enum MurmurError {
    #[error("Corpus error: {0}")]
    Corpus(#[from] CorpusError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Simulation error: {0}")]
    Simulation(#[from] SimulationError),
}

pub type Result<T> = std::result::Result<T, MurmurError>;
