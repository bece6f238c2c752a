//! Runtime settings for a simulation run.
//!
//! Tunable guards and diagnostics live here so they are not scattered as
//! magic numbers through the engine.

use serde::{Deserialize, Serialize};

/// Settings governing one simulation run.
///
/// These are operational guards around the engine, not part of the
/// diffusion model itself; the model is entirely described by the protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Hard cap on iterations, independent of the stop condition.
    ///
    /// Hitting it is an error: a run that reaches the guard was not stopped
    /// by its own stop condition, which usually means a misconfigured
    /// experiment.
    pub max_iterations: u32,
    /// Verify the per-user partition invariant after every iteration.
    ///
    /// Cheap for small populations; intended for tests and debugging runs.
    pub check_invariants: bool,
    /// Emit a progress log line every this many iterations (0 disables).
    pub log_every: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
            check_invariants: false,
            log_every: 100,
        }
    }
}
