//! The five pluggable mechanism families composed into a protocol.
//!
//! Selection decides what a user sends, propagation decides who receives
//! it, sight decides what the destination actually notices, update
//! reconciles repeated observations, and expiration ages out stale
//! received pieces. Every family is a trait with one implementation per
//! policy name; protocols hold one boxed instance of each.

pub mod expiration;
pub mod propagation;
pub mod selection;
pub mod sight;
pub mod update;

pub use expiration::{ExpirationMechanism, ExpireAll, ExponentialDecay, FixedTtl, NeverExpire};
pub use propagation::{
    AllNeighbors, FixedFanout, PropagationMechanism, PullStrategy, PushPullStrategy, PushStrategy,
};
pub use selection::{
    CascadeProbability, CascadeSelector, CountSelector, Quota, RecommenderSelector,
    ReplaySelector, Selection, SelectionContext, SelectionMechanism, Threshold,
    ThresholdSelector, WaitingSelection,
};
pub use sight::{AllSight, CountSight, RecommendedSight, SightMechanism};
pub use update::{DiscardPolicy, MergeUpdate, UpdateMechanism};
