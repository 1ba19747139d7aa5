//! Error types for environment reconciliation.

use crate::lifecycle::{Event, Phase};
use thiserror::Error;

/// Errors that can occur while planning or applying an environment.
#[derive(Debug, Error)]
pub enum Error {
    /// An external deployment step reported failure
    #[error("{step} failed for {unit}: {message}")]
    Deploy {
        /// The step that failed, e.g. "install source"
        step: String,
        /// Unit or precondition the step was working on
        unit: String,
        /// Output of the failed command, verbatim
        message: String,
    },

    /// A snapshot could not be read, written or removed
    #[error("snapshot error for environment '{id}': {message}")]
    Snapshot {
        /// Environment identifier
        id: String,
        /// Underlying error
        message: String,
    },

    /// The catalog references identifiers it does not define
    #[error("invalid catalog: {message}")]
    Catalog {
        /// Description of the inconsistency
        message: String,
    },

    /// A lifecycle event is not allowed in the current phase
    #[error("cannot {event} an environment that is {from}")]
    InvalidTransition {
        /// Current phase
        from: Phase,
        /// Rejected event
        event: Event,
    },
}

impl Error {
    /// Shorthand for a deployment failure
    pub fn deploy(
        step: impl Into<String>,
        unit: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Deploy {
            step: step.into(),
            unit: unit.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a snapshot failure
    pub fn snapshot(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Snapshot {
            id: id.into(),
            message: message.into(),
        }
    }
}

/// Result type for envkit operations.
pub type Result<T> = std::result::Result<T, Error>;
