//! Engine error types

use service_types::DependencyKind;
use thiserror::Error;

/// Errors returned by the command surface of [`crate::ServiceSet`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetError {
    #[error("service {0} declares a dependency on unregistered service {1}")]
    UnknownDependency(String, String),

    #[error("duplicate {kind} dependency from {from} to {to}")]
    DuplicateDependency {
        from: String,
        to: String,
        kind: DependencyKind,
    },

    #[error("adding a {kind} dependency from {from} to {to} would create a cycle")]
    DependencyCycle {
        from: String,
        to: String,
        kind: DependencyKind,
    },

    #[error("no {kind} dependency from {from} to {to}")]
    NoSuchDependency {
        from: String,
        to: String,
        kind: DependencyKind,
    },

    #[error("service {0} is not stopped")]
    NotStopped(String),

    #[error("service {0} still has dependents")]
    HasDependents(String),

    #[error("service {0} is still required")]
    StillRequired(String),

    #[error("service {0} has no active dependents to wake for")]
    NoActiveDependents(String),

    #[error("service {0} is already pinned in the opposite direction")]
    PinConflict(String),
}
