//! Simulated process agent

use agent_api::{AgentError, ExecStage, LaunchSpec, Pid, ProcessAgent, Signal};

/// One recorded launch
#[derive(Debug, Clone)]
pub struct LaunchRecord {
    pub pid: Pid,
    pub spec: LaunchSpec,
}

/// Process agent that records instead of forking.
///
/// Pids are handed out monotonically from 1000. Every launch and every
/// signal is kept for test inspection; a queued failure makes the next
/// launch fail with the given stage and errno.
#[derive(Debug)]
pub struct SimProcessAgent {
    next_pid: i32,
    launches: Vec<LaunchRecord>,
    signals: Vec<(Pid, Signal)>,
    fail_next: Option<(ExecStage, i32)>,
}

impl SimProcessAgent {
    pub fn new() -> Self {
        Self {
            next_pid: 1000,
            launches: Vec::new(),
            signals: Vec::new(),
            fail_next: None,
        }
    }

    /// Makes the next launch fail with the given stage and errno
    pub fn fail_next_launch(&mut self, stage: ExecStage, errno: i32) {
        self.fail_next = Some((stage, errno));
    }

    /// Returns the pid of the most recent launch
    pub fn last_launched_pid(&self) -> Option<Pid> {
        self.launches.last().map(|record| record.pid)
    }

    /// Returns how many launches have been performed
    pub fn launch_count(&self) -> usize {
        self.launches.len()
    }

    /// Returns the most recent launch record
    pub fn last_launch(&self) -> Option<&LaunchRecord> {
        self.launches.last()
    }

    /// Returns the most recently sent signal
    pub fn last_signal(&self) -> Option<(Pid, Signal)> {
        self.signals.last().copied()
    }

    /// Returns every signal sent to the given pid, in order
    pub fn signals_for(&self, pid: Pid) -> Vec<Signal> {
        self.signals
            .iter()
            .filter(|(target, _)| *target == pid)
            .map(|(_, signal)| *signal)
            .collect()
    }
}

impl Default for SimProcessAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessAgent for SimProcessAgent {
    fn launch(&mut self, spec: &LaunchSpec) -> Result<Pid, AgentError> {
        if let Some((stage, errno)) = self.fail_next.take() {
            return Err(AgentError::LaunchFailed { stage, errno });
        }
        let pid = Pid::from_raw(self.next_pid);
        self.next_pid += 1;
        self.launches.push(LaunchRecord {
            pid,
            spec: spec.clone(),
        });
        Ok(pid)
    }

    fn signal(&mut self, pid: Pid, signal: Signal) -> Result<(), AgentError> {
        self.signals.push((pid, signal));
        Ok(())
    }
}
