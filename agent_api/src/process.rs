//! Process agent contract: launch, signal, and the outcome vocabulary

use crate::error::AgentError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating-system process identifier, as reported by the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pid(i32);

impl Pid {
    pub fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    pub fn as_raw(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid {}", self.0)
    }
}

/// Signals the engine sends to managed processes.
///
/// Only the signals the state machine actually uses are representable;
/// the agent maps them to platform numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signal {
    /// Interrupt a start in progress (SIGINT)
    Interrupt,
    /// Polite stop request (SIGTERM)
    Terminate,
    /// Unconditional kill, the terminal step of every stop (SIGKILL)
    Kill,
    /// Reload/rotate convention (SIGHUP)
    Hangup,
}

impl Signal {
    /// Returns the conventional POSIX signal number
    pub fn number(&self) -> i32 {
        match self {
            Signal::Hangup => 1,
            Signal::Interrupt => 2,
            Signal::Kill => 9,
            Signal::Terminate => 15,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Interrupt => write!(f, "SIGINT"),
            Signal::Terminate => write!(f, "SIGTERM"),
            Signal::Kill => write!(f, "SIGKILL"),
            Signal::Hangup => write!(f, "SIGHUP"),
        }
    }
}

/// How a reaped process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitStatus {
    /// Normal exit with the given code
    Exited(i32),
    /// Terminated by a signal
    Signalled(Signal),
}

impl ExitStatus {
    /// Checks for a clean (code zero) exit
    pub fn is_clean(&self) -> bool {
        matches!(self, ExitStatus::Exited(0))
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Exited(code) => write!(f, "exited with code {}", code),
            ExitStatus::Signalled(sig) => write!(f, "killed by {}", sig),
        }
    }
}

/// Where a launch failed before the child was running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecStage {
    /// Could not fork the child
    Fork,
    /// Child-side setup (fds, environment) failed
    Setup,
    /// The exec call itself failed
    Exec,
}

impl fmt::Display for ExecStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecStage::Fork => write!(f, "fork"),
            ExecStage::Setup => write!(f, "setup"),
            ExecStage::Exec => write!(f, "exec"),
        }
    }
}

/// Specification of one process launch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSpec {
    /// Command and arguments
    pub argv: Vec<String>,
    /// Additional environment entries
    pub env: Vec<(String, String)>,
    /// Open a readiness-notification fd for the child
    pub notify_ready: bool,
}

impl LaunchSpec {
    /// Creates a launch spec for the given argv
    pub fn new(argv: Vec<String>) -> Self {
        Self {
            argv,
            env: Vec::new(),
            notify_ready: false,
        }
    }

    /// Requests a readiness-notification fd
    pub fn with_notify_ready(mut self, value: bool) -> Self {
        self.notify_ready = value;
        self
    }
}

/// Launches and signals child processes on behalf of the engine.
///
/// `launch` is synchronous but bounded (fork plus handing the command to
/// the child); the exec outcome, exit status, readiness data and
/// daemon-pid reports arrive later as events delivered into the engine by
/// the dispatcher.
pub trait ProcessAgent {
    /// Launches a child process, returning its pid
    fn launch(&mut self, spec: &LaunchSpec) -> Result<Pid, AgentError>;

    /// Sends a signal to a previously launched process
    fn signal(&mut self, pid: Pid, signal: Signal) -> Result<(), AgentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_numbers() {
        assert_eq!(Signal::Interrupt.number(), 2);
        assert_eq!(Signal::Kill.number(), 9);
        assert_eq!(Signal::Terminate.number(), 15);
    }

    #[test]
    fn test_exit_status_clean() {
        assert!(ExitStatus::Exited(0).is_clean());
        assert!(!ExitStatus::Exited(1).is_clean());
        assert!(!ExitStatus::Signalled(Signal::Kill).is_clean());
    }

    #[test]
    fn test_launch_spec_builder() {
        let spec = LaunchSpec::new(vec!["daemon".to_string()]).with_notify_ready(true);
        assert!(spec.notify_ready);
        assert!(spec.env.is_empty());
    }
}
