//! Protocols: one mechanism of each family bundled into a diffusion model.

pub mod presets;

use crate::corpus::InformationCorpus;
use crate::mechanism::expiration::{ExpirationMechanism, NeverExpire};
use crate::mechanism::propagation::PropagationMechanism;
use crate::mechanism::selection::SelectionMechanism;
use crate::mechanism::sight::{AllSight, SightMechanism};
use crate::mechanism::update::{DiscardPolicy, MergeUpdate, UpdateMechanism};

/// Errors raised while assembling a protocol.
///
/// Assembly is the moment incompatibilities must surface; once a protocol
/// is built, no iteration can fail on a missing precondition.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A required mechanism family was never supplied
    #[error("Protocol {label} is missing its {family} mechanism")]
    MissingMechanism {
        /// Protocol label under construction
        label: String,
        /// Name of the missing family
        family: &'static str,
    },

    /// A mechanism needs ground-truth data the corpus does not carry
    #[error("{mechanism} requires ground-truth propagation data")]
    MissingGroundTruth {
        /// Mechanism that raised the incompatibility
        mechanism: &'static str,
    },

    /// A mechanism needs recommended edges the graph does not contain
    #[error("{mechanism} requires recommender-injected edges in the graph")]
    MissingRecommendedEdges {
        /// Mechanism that raised the incompatibility
        mechanism: &'static str,
    },

    /// A mechanism parameter is outside its documented domain
    #[error("{mechanism}: {reason}")]
    InvalidParameter {
        /// Mechanism carrying the parameter
        mechanism: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// A fixed bundle of one instance from each mechanism family, defining one
/// diffusion model.
///
/// Built through [`ProtocolBuilder`], which validates every mechanism
/// against the corpus before the first iteration can run.
pub struct Protocol {
    pub(crate) label: String,
    pub(crate) selection: Box<dyn SelectionMechanism>,
    pub(crate) sight: Box<dyn SightMechanism>,
    pub(crate) update: Box<dyn UpdateMechanism>,
    pub(crate) expiration: Box<dyn ExpirationMechanism>,
    pub(crate) propagation: Box<dyn PropagationMechanism>,
}

impl Protocol {
    /// Starts assembling a protocol under the given label.
    pub fn builder(label: impl Into<String>) -> ProtocolBuilder {
        ProtocolBuilder::new(label)
    }

    /// Display label of this protocol.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl std::fmt::Debug for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Protocol")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Assembles a [`Protocol`], filling unspecified families with the
/// standard defaults: see-everything sight, merge-and-resurrect update,
/// and no expiration.
///
/// Selection and propagation carry the identity of a diffusion model and
/// must always be supplied explicitly.
pub struct ProtocolBuilder {
    label: String,
    selection: Option<Box<dyn SelectionMechanism>>,
    sight: Box<dyn SightMechanism>,
    update: Box<dyn UpdateMechanism>,
    expiration: Box<dyn ExpirationMechanism>,
    propagation: Option<Box<dyn PropagationMechanism>>,
}

impl ProtocolBuilder {
    /// Creates a builder with default sight, update, and expiration.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            selection: None,
            sight: Box::new(AllSight),
            update: Box::new(MergeUpdate::new(DiscardPolicy::Resurrect)),
            expiration: Box::new(NeverExpire),
            propagation: None,
        }
    }

    /// Sets the selection mechanism.
    pub fn selection(mut self, selection: impl SelectionMechanism + 'static) -> Self {
        self.selection = Some(Box::new(selection));
        self
    }

    /// Sets the sight mechanism.
    pub fn sight(mut self, sight: impl SightMechanism + 'static) -> Self {
        self.sight = Box::new(sight);
        self
    }

    /// Sets the update mechanism.
    pub fn update(mut self, update: impl UpdateMechanism + 'static) -> Self {
        self.update = Box::new(update);
        self
    }

    /// Sets the expiration mechanism.
    pub fn expiration(mut self, expiration: impl ExpirationMechanism + 'static) -> Self {
        self.expiration = Box::new(expiration);
        self
    }

    /// Sets the propagation (fan-out) mechanism.
    pub fn propagation(mut self, propagation: impl PropagationMechanism + 'static) -> Self {
        self.propagation = Some(Box::new(propagation));
        self
    }

    /// Validates every mechanism against the corpus and produces the
    /// protocol.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::MissingMechanism` - Selection or propagation was
    ///   never supplied
    /// - `ProtocolError` - A mechanism rejected the corpus or its own
    ///   parameters
    pub fn build(self, corpus: &InformationCorpus) -> Result<Protocol, ProtocolError> {
        let selection = self
            .selection
            .ok_or_else(|| ProtocolError::MissingMechanism {
                label: self.label.clone(),
                family: "selection",
            })?;
        let propagation = self
            .propagation
            .ok_or_else(|| ProtocolError::MissingMechanism {
                label: self.label.clone(),
                family: "propagation",
            })?;

        selection.validate(corpus)?;
        self.sight.validate(corpus)?;
        self.expiration.validate(corpus)?;
        propagation.validate(corpus)?;

        Ok(Protocol {
            label: self.label,
            selection,
            sight: self.sight,
            update: self.update,
            expiration: self.expiration,
            propagation,
        })
    }
}
