//! Agent error types

use crate::process::{ExecStage, Pid};
use thiserror::Error;

/// Errors reported by the process agent
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgentError {
    #[error("launch failed during {stage}: errno {errno}")]
    LaunchFailed { stage: ExecStage, errno: i32 },

    #[error("could not signal {pid}: errno {errno}")]
    SignalFailed { pid: Pid, errno: i32 },

    #[error("no such process: {0}")]
    NoSuchProcess(Pid),
}
