//! Per-environment lifecycle
//!
//! ```text
//! absent -> created -> configured <-> updating
//!                  \______ any ______/ -> deleted
//! ```
//!
//! `created` means the cluster exists but nothing has been reconciled yet.
//! An update may start from `created`, so a first reconcile that failed
//! during create can be finished with an update. A failed update leaves the
//! environment in `updating`; running the update again is allowed.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle phase of an environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Absent,
    Created,
    Configured,
    Updating,
    Deleted,
}

/// Something that happened to an environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Cluster was created
    Create,
    /// An update command started
    BeginUpdate,
    /// The reconciler ran to completion
    Reconcile,
    /// The environment was deleted
    Delete,
}

impl Phase {
    /// Apply an event, returning the next phase
    pub fn transition(self, event: Event) -> Result<Phase> {
        let next = match (self, event) {
            (Phase::Absent, Event::Create) => Phase::Created,
            (Phase::Created, Event::Reconcile) => Phase::Configured,
            (Phase::Created | Phase::Configured | Phase::Updating, Event::BeginUpdate) => {
                Phase::Updating
            }
            (Phase::Updating, Event::Reconcile) => Phase::Configured,
            (Phase::Deleted, _) => {
                return Err(Error::InvalidTransition { from: self, event });
            }
            (_, Event::Delete) => Phase::Deleted,
            _ => return Err(Error::InvalidTransition { from: self, event }),
        };
        log::debug!("environment phase {} -> {} ({})", self, next, event);
        Ok(next)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Deleted)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Absent => "absent",
            Self::Created => "created",
            Self::Configured => "configured",
            Self::Updating => "updating",
            Self::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::BeginUpdate => "update",
            Self::Reconcile => "reconcile",
            Self::Delete => "delete",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let phase = Phase::Absent
            .transition(Event::Create)
            .and_then(|p| p.transition(Event::Reconcile))
            .unwrap();
        assert_eq!(phase, Phase::Configured);

        let phase = phase.transition(Event::BeginUpdate).unwrap();
        assert_eq!(phase, Phase::Updating);
        assert_eq!(phase.transition(Event::Reconcile).unwrap(), Phase::Configured);
    }

    #[test]
    fn test_failed_update_can_be_retried() {
        let phase = Phase::Updating.transition(Event::BeginUpdate).unwrap();
        assert_eq!(phase, Phase::Updating);
    }

    #[test]
    fn test_update_after_failed_first_reconcile() {
        let phase = Phase::Created.transition(Event::BeginUpdate).unwrap();
        assert_eq!(phase, Phase::Updating);
        assert_eq!(phase.transition(Event::Reconcile).unwrap(), Phase::Configured);
    }

    #[test]
    fn test_delete_from_any_live_phase() {
        for phase in [Phase::Absent, Phase::Created, Phase::Configured, Phase::Updating] {
            assert_eq!(phase.transition(Event::Delete).unwrap(), Phase::Deleted);
        }
    }

    #[test]
    fn test_deleted_is_terminal() {
        assert!(Phase::Deleted.is_terminal());
        assert!(Phase::Deleted.transition(Event::Delete).is_err());
        assert!(Phase::Deleted.transition(Event::Create).is_err());
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(Phase::Absent.transition(Event::BeginUpdate).is_err());
        assert!(Phase::Absent.transition(Event::Reconcile).is_err());
        assert!(Phase::Created.transition(Event::Create).is_err());
        assert!(Phase::Configured.transition(Event::Create).is_err());
    }
}
