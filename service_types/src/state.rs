//! Service states, kinds, dependency types and outcome vocabulary

use serde::{Deserialize, Serialize};
use std::fmt;

/// Current state of a service record.
///
/// Transitions are linear: stopped -> starting -> started -> stopping ->
/// stopped. There is no composite "starting while stopping" state; a stop
/// issued mid-start either interrupts the start or is latched and applied
/// once started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceState {
    /// Not running, not in transition
    Stopped,
    /// Coming up: waiting on dependencies, the console, or its process
    Starting,
    /// Up and (for process kinds) running
    Started,
    /// Going down: waiting on dependents or process exit
    Stopping,
}

impl ServiceState {
    /// Checks whether the record is fully stopped
    pub fn is_stopped(&self) -> bool {
        matches!(self, ServiceState::Stopped)
    }

    /// Checks whether the record is in a transition state
    pub fn in_transition(&self) -> bool {
        matches!(self, ServiceState::Starting | ServiceState::Stopping)
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceState::Stopped => write!(f, "stopped"),
            ServiceState::Starting => write!(f, "starting"),
            ServiceState::Started => write!(f, "started"),
            ServiceState::Stopping => write!(f, "stopping"),
        }
    }
}

/// The state a service should be brought to and kept in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DesiredState {
    Stopped,
    Started,
}

impl fmt::Display for DesiredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DesiredState::Stopped => write!(f, "stopped"),
            DesiredState::Started => write!(f, "started"),
        }
    }
}

/// What kind of unit a service record supervises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceKind {
    /// No external process; started and stopped instantaneously
    Internal,
    /// A long-running daemon process
    Process,
    /// Distinct one-shot start and stop commands
    Scripted,
    /// A start command that forks a daemon and reports its pid
    BgProcess,
}

impl ServiceKind {
    /// Checks whether this kind launches external processes
    pub fn has_process(&self) -> bool {
        !matches!(self, ServiceKind::Internal)
    }
}

/// Dependency edge type.
///
/// Hardness decides failure and stop propagation: a hard dependency that
/// fails takes its dependents down with it, a soft one merely unblocks
/// them. Milestone edges are hard only until the dependency has started
/// once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DependencyKind {
    /// Hard: dependent needs the dependency up for its whole lifetime
    Regular,
    /// Hard until the dependency first reaches started, soft afterwards
    Milestone,
    /// Soft: start ordering only; failure or stop does not propagate
    WaitsFor,
    /// Soft: like waits-for, without an implied start request
    Soft,
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyKind::Regular => write!(f, "regular"),
            DependencyKind::Milestone => write!(f, "milestone"),
            DependencyKind::WaitsFor => write!(f, "waits-for"),
            DependencyKind::Soft => write!(f, "soft"),
        }
    }
}

/// Why a service stopped (or is stopping).
///
/// Set at the moment a stop is initiated or a failure observed; sticky
/// until the next start attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Clean stop: requested, or no longer required by the graph
    Normal,
    /// The process exited or was signalled while started
    Terminated,
    /// The process agent could not exec the command
    ExecFailed,
    /// The start command ran but reported failure
    Failed,
    /// A hard dependency failed to start
    DepFailed,
    /// A start or stop timeout expired
    TimedOut,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Normal => write!(f, "normal"),
            StopReason::Terminated => write!(f, "terminated"),
            StopReason::ExecFailed => write!(f, "exec failed"),
            StopReason::Failed => write!(f, "failed"),
            StopReason::DepFailed => write!(f, "dependency failed"),
            StopReason::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Listener-visible lifecycle events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceEvent {
    /// The service reached started
    Started,
    /// The service reached stopped
    Stopped,
    /// A start attempt failed
    FailedStart,
    /// A start in progress (or pending restart) was abandoned
    StartCancelled,
    /// A stop in progress was reverted to starting
    StopCancelled,
}

impl fmt::Display for ServiceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceEvent::Started => write!(f, "started"),
            ServiceEvent::Stopped => write!(f, "stopped"),
            ServiceEvent::FailedStart => write!(f, "failed-start"),
            ServiceEvent::StartCancelled => write!(f, "start-cancelled"),
            ServiceEvent::StopCancelled => write!(f, "stop-cancelled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_predicates() {
        assert!(ServiceState::Stopped.is_stopped());
        assert!(!ServiceState::Started.is_stopped());
        assert!(ServiceState::Starting.in_transition());
        assert!(ServiceState::Stopping.in_transition());
        assert!(!ServiceState::Started.in_transition());
    }

    #[test]
    fn test_kind_has_process() {
        assert!(!ServiceKind::Internal.has_process());
        assert!(ServiceKind::Process.has_process());
        assert!(ServiceKind::Scripted.has_process());
        assert!(ServiceKind::BgProcess.has_process());
    }

    #[test]
    fn test_display_forms() {
        assert_eq!(ServiceState::Starting.to_string(), "starting");
        assert_eq!(DependencyKind::WaitsFor.to_string(), "waits-for");
        assert_eq!(StopReason::DepFailed.to_string(), "dependency failed");
        assert_eq!(ServiceEvent::StopCancelled.to_string(), "stop-cancelled");
    }
}
