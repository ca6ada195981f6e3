//! Process-backed service behaviour: launching, exec outcomes, exits,
//! timeouts, readiness and restart throttling
//!
//! The base state machine calls `bring_up`, `bring_down` and the
//! `can_*`/`interrupt_start` gates; this module dispatches them on the
//! service kind. The event entry points here are what the dispatcher
//! calls when the process agent reports something.

use crate::journal::LogLevel;
use crate::record::TimerPurpose;
use agent_api::{ExecStage, ExitStatus, LaunchSpec, Pid, ProcessAgent, Signal, TimerSource};
use service_types::{DesiredState, LaunchId, ServiceId, ServiceKind, ServiceState, StopReason};

impl<A: ProcessAgent, T: TimerSource> crate::ServiceSet<A, T> {
    /// Kind-specific startup. Internal services are up immediately;
    /// process kinds launch their start command.
    pub(crate) fn bring_up(&mut self, id: ServiceId) -> bool {
        match self.rec(id).kind {
            ServiceKind::Internal => {
                self.started(id);
                true
            }
            ServiceKind::Process | ServiceKind::Scripted | ServiceKind::BgProcess => {
                self.launch_start_command(id)
            }
        }
    }

    fn launch_start_command(&mut self, id: ServiceId) -> bool {
        if self.rec(id).pid.is_some() {
            // a cancelled stop never signalled the process; it is still
            // running, so there is nothing to launch
            match self.rec(id).kind {
                ServiceKind::Scripted => {
                    // the start command is still winding down; its exit
                    // completes the start
                }
                ServiceKind::Process | ServiceKind::BgProcess | ServiceKind::Internal => {
                    self.started(id);
                }
            }
            return true;
        }
        if self.rec(id).command.is_empty() {
            self.log(LogLevel::Error, id, "no start command configured");
            self.rec_mut(id).stop_reason = StopReason::ExecFailed;
            return false;
        }
        let spec = LaunchSpec {
            argv: self.rec(id).command.clone(),
            env: Vec::new(),
            notify_ready: self.rec(id).notify_ready,
        };
        match self.agent.launch(&spec) {
            Ok(pid) => {
                let now = self.clock.now();
                let restarting = self.rec(id).restarting;
                {
                    let r = self.rec_mut(id);
                    r.pid = Some(pid);
                    r.launch_id = Some(LaunchId::new());
                    r.waiting_for_execstat = true;
                    r.waiting_for_ready = false;
                    r.waiting_daemon_pid = false;
                    if restarting {
                        r.restarts.record(now);
                    }
                }
                if self.rec(id).state == ServiceState::Starting {
                    if let Some(timeout) = self.rec(id).start_timeout {
                        self.arm_timer(id, timeout, TimerPurpose::StartTimeout);
                    }
                }
                true
            }
            Err(err) => {
                self.log(LogLevel::Error, id, format!("could not launch: {}", err));
                self.rec_mut(id).stop_reason = StopReason::ExecFailed;
                false
            }
        }
    }

    /// Kind-specific shutdown, entered once all dependents have stopped.
    pub(crate) fn bring_down(&mut self, id: ServiceId) {
        match self.rec(id).kind {
            ServiceKind::Internal => self.stopped(id),
            ServiceKind::Process | ServiceKind::BgProcess => {
                if let Some(pid) = self.rec(id).pid {
                    self.send_stop_signal(id, pid);
                } else {
                    self.stopped(id);
                }
            }
            ServiceKind::Scripted => {
                if let Some(pid) = self.rec(id).pid {
                    // a start command still winding down; signal it
                    self.send_stop_signal(id, pid);
                } else if let Some(argv) = self.rec(id).stop_command.clone() {
                    self.launch_stop_command(id, argv);
                } else {
                    self.stopped(id);
                }
            }
        }
    }

    fn send_stop_signal(&mut self, id: ServiceId, pid: Pid) {
        let signal = self.rec(id).stop_signal;
        if let Err(err) = self.agent.signal(pid, signal) {
            self.log(LogLevel::Error, id, format!("could not signal: {}", err));
        }
        if let Some(timeout) = self.rec(id).stop_timeout {
            self.arm_timer(id, timeout, TimerPurpose::StopTimeout);
        }
        // the stop completes when the exit is observed
    }

    fn launch_stop_command(&mut self, id: ServiceId, argv: Vec<String>) {
        let spec = LaunchSpec::new(argv);
        match self.agent.launch(&spec) {
            Ok(pid) => {
                {
                    let r = self.rec_mut(id);
                    r.pid = Some(pid);
                    r.launch_id = Some(LaunchId::new());
                    r.waiting_for_execstat = true;
                }
                if let Some(timeout) = self.rec(id).stop_timeout {
                    self.arm_timer(id, timeout, TimerPurpose::StopTimeout);
                }
            }
            Err(err) => {
                self.log(
                    LogLevel::Error,
                    id,
                    format!("could not launch stop command: {}", err),
                );
                self.stopped(id);
            }
        }
    }

    /// Gate before `bring_up`: a stopped pin or a pending restart delay
    /// holds the start; a later event re-runs the transition.
    pub(crate) fn can_proceed_to_start(&mut self, id: ServiceId) -> bool {
        if self.rec(id).pinned_stopped {
            return false;
        }
        if !self.rec(id).kind.has_process() {
            return true;
        }
        if self.rec(id).restart_delay_pending {
            if !self.rec(id).waiting_restart_timer {
                let delay = self.rec(id).restart_delay;
                self.arm_timer(id, delay, TimerPurpose::RestartDelay);
                self.rec_mut(id).waiting_restart_timer = true;
            }
            return false;
        }
        true
    }

    /// Whether a start past the dependency/console wait may be abandoned
    pub(crate) fn can_interrupt_start(&self, id: ServiceId) -> bool {
        let r = self.rec(id);
        r.flags.start_interruptible
            || r.start_timed_out
            || r.waiting_restart_timer
            || r.start_aborted
    }

    /// Abandons a start in progress. Returns true when the stop can
    /// proceed immediately, false when the startup must first end by
    /// itself (the scripted start process dying).
    pub(crate) fn interrupt_start(&mut self, id: ServiceId) -> bool {
        self.disarm_timer_if(id, TimerPurpose::StartTimeout);

        if self.rec(id).waiting_restart_timer {
            self.disarm_timer_if(id, TimerPurpose::RestartDelay);
            let r = self.rec_mut(id);
            r.waiting_restart_timer = false;
            r.restart_delay_pending = false;
            return true;
        }

        match self.rec(id).kind {
            ServiceKind::Internal => true,
            ServiceKind::Process | ServiceKind::BgProcess => {
                if let Some(pid) = self.rec(id).pid {
                    if let Err(err) = self.agent.signal(pid, Signal::Interrupt) {
                        self.log(
                            LogLevel::Warn,
                            id,
                            format!("could not interrupt start: {}", err),
                        );
                    }
                }
                true
            }
            ServiceKind::Scripted => {
                if let Some(pid) = self.rec(id).pid {
                    if let Err(err) = self.agent.signal(pid, Signal::Interrupt) {
                        self.log(
                            LogLevel::Warn,
                            id,
                            format!("could not interrupt start: {}", err),
                        );
                    }
                    self.rec_mut(id).start_aborted = true;
                    false
                } else {
                    true
                }
            }
        }
    }

    // ---- event entry points ----

    /// The launched command exec'd successfully
    pub fn exec_succeeded(&mut self, id: ServiceId) {
        self.rec_mut(id).waiting_for_execstat = false;
        if self.rec(id).state != ServiceState::Starting {
            // a smooth-recovery relaunch, or a stop command: nothing to do
            // until the next exit or readiness event
            return;
        }
        match self.rec(id).kind {
            ServiceKind::Process => {
                if self.rec(id).notify_ready {
                    self.rec_mut(id).waiting_for_ready = true;
                } else {
                    self.started(id);
                }
            }
            // scripted and bgprocess starts complete on exit
            ServiceKind::Scripted | ServiceKind::BgProcess | ServiceKind::Internal => {}
        }
    }

    /// The launched command could not be exec'd
    pub fn exec_failed(&mut self, id: ServiceId, stage: ExecStage, errno: i32) {
        {
            let r = self.rec_mut(id);
            r.waiting_for_execstat = false;
            r.pid = None;
        }
        self.log(
            LogLevel::Error,
            id,
            format!("exec failed during {}: errno {}", stage, errno),
        );
        match self.rec(id).state {
            ServiceState::Starting => {
                self.disarm_timer_if(id, TimerPurpose::StartTimeout);
                self.rec_mut(id).stop_reason = StopReason::ExecFailed;
                self.failed_to_start(id, false, true);
            }
            ServiceState::Started => {
                // a smooth-recovery relaunch failed
                let r = self.rec_mut(id);
                r.stop_reason = StopReason::ExecFailed;
                r.restarting = false;
                self.failed_to_start(id, false, true);
            }
            ServiceState::Stopping => {
                // the stop command could not run; nothing left to wait for
                self.disarm_timer_if(id, TimerPurpose::StopTimeout);
                if !self.rec(id).waiting_for_deps {
                    self.stopped(id);
                }
            }
            ServiceState::Stopped => {}
        }
    }

    /// The supervised process has been reaped
    pub fn handle_exit(&mut self, id: ServiceId, status: ExitStatus) {
        {
            let r = self.rec_mut(id);
            r.pid = None;
            r.last_exit = Some(status);
            r.waiting_for_execstat = false;
        }
        match self.rec(id).state {
            ServiceState::Starting => self.exited_while_starting(id, status),
            ServiceState::Started => self.exited_while_started(id, status),
            ServiceState::Stopping => {
                self.disarm_timer_if(id, TimerPurpose::StopTimeout);
                if !self.rec(id).waiting_for_deps {
                    self.stopped(id);
                }
            }
            ServiceState::Stopped => {}
        }
    }

    fn exited_while_starting(&mut self, id: ServiceId, status: ExitStatus) {
        self.disarm_timer_if(id, TimerPurpose::StartTimeout);
        match self.rec(id).kind {
            ServiceKind::Internal => {}
            ServiceKind::Process => {
                self.log(
                    LogLevel::Error,
                    id,
                    format!("process terminated while starting ({})", status),
                );
                self.rec_mut(id).stop_reason = StopReason::Failed;
                self.failed_to_start(id, false, true);
            }
            ServiceKind::BgProcess => {
                if status.is_clean() {
                    // the launcher has forked the daemon; wait for its pid
                    self.rec_mut(id).waiting_daemon_pid = true;
                } else {
                    self.log(
                        LogLevel::Error,
                        id,
                        format!("launcher failed ({})", status),
                    );
                    self.rec_mut(id).stop_reason = StopReason::Failed;
                    self.failed_to_start(id, false, true);
                }
            }
            ServiceKind::Scripted => {
                if self.rec(id).start_aborted {
                    // an interrupted start has wound down; finish stopping
                    self.rec_mut(id).start_aborted = false;
                    self.do_stop(id);
                } else if status.is_clean() {
                    self.started(id);
                } else if status == ExitStatus::Signalled(Signal::Interrupt)
                    && self.rec(id).flags.skippable
                {
                    self.rec_mut(id).start_skipped = true;
                    self.started(id);
                } else {
                    self.log(
                        LogLevel::Error,
                        id,
                        format!("start command failed ({})", status),
                    );
                    self.rec_mut(id).stop_reason = StopReason::Failed;
                    self.failed_to_start(id, false, true);
                }
            }
        }
    }

    fn exited_while_started(&mut self, id: ServiceId, status: ExitStatus) {
        match self.rec(id).kind {
            // no supervised process while started for these kinds
            ServiceKind::Internal | ServiceKind::Scripted => {}
            ServiceKind::Process | ServiceKind::BgProcess => {
                let smooth = {
                    let r = self.rec(id);
                    r.flags.smooth_recovery
                        && !r.force_stop
                        && r.desired_state == DesiredState::Started
                };
                if smooth {
                    self.do_smooth_recovery(id, status);
                } else {
                    self.log(
                        LogLevel::Warn,
                        id,
                        format!("process terminated unexpectedly ({})", status),
                    );
                    self.rec_mut(id).stop_reason = StopReason::Terminated;
                    self.forced_stop(id);
                }
            }
        }
    }

    /// Transparent re-launch after an unexpected exit, staying started.
    /// Converts to a terminated failure when restarts come too fast.
    fn do_smooth_recovery(&mut self, id: ServiceId, status: ExitStatus) {
        let now = self.clock.now();
        if self.rec_mut(id).restarts.over_limit(now) {
            self.log(LogLevel::Error, id, "restarting too quickly; stopping");
            {
                let r = self.rec_mut(id);
                r.stop_reason = StopReason::Terminated;
                r.restarting = false;
            }
            self.failed_to_start(id, false, true);
            return;
        }

        self.log(
            LogLevel::Info,
            id,
            format!("process terminated ({}); recovering", status),
        );
        {
            let r = self.rec_mut(id);
            r.restarting = true;
            r.waiting_for_deps = true;
            r.restart_delay_pending = !r.restart_delay.is_zero();
        }
        self.add_transition_queue(id);
    }

    /// First readiness line received on the notification fd
    pub fn ready_notification(&mut self, id: ServiceId) {
        if self.rec(id).state == ServiceState::Starting && self.rec(id).waiting_for_ready {
            self.rec_mut(id).waiting_for_ready = false;
            self.started(id);
        }
    }

    /// The notification fd closed. Before any readiness data this is a
    /// start failure.
    pub fn notify_closed(&mut self, id: ServiceId) {
        if self.rec(id).state == ServiceState::Starting && self.rec(id).waiting_for_ready {
            self.rec_mut(id).waiting_for_ready = false;
            self.log(
                LogLevel::Error,
                id,
                "readiness fd closed before notification",
            );
            self.rec_mut(id).stop_reason = StopReason::Failed;
            self.failed_to_start(id, false, true);
        }
    }

    /// The forked daemon's pid has been obtained (bgprocess)
    pub fn daemon_pid_reported(&mut self, id: ServiceId, pid: Pid) {
        if self.rec(id).state == ServiceState::Starting && self.rec(id).waiting_daemon_pid {
            {
                let r = self.rec_mut(id);
                r.waiting_daemon_pid = false;
                r.pid = Some(pid);
            }
            self.started(id);
        }
    }

    /// This record's armed timer expired
    pub fn timer_expired(&mut self, id: ServiceId) {
        let Some((_, purpose)) = self.rec(id).timer else {
            return;
        };
        self.disarm_timer(id);
        match purpose {
            TimerPurpose::StartTimeout => {
                if self.rec(id).state == ServiceState::Starting {
                    self.log(LogLevel::Warn, id, "start timed out");
                    {
                        let r = self.rec_mut(id);
                        r.stop_reason = StopReason::TimedOut;
                        r.start_timed_out = true;
                    }
                    self.do_stop(id);
                }
            }
            TimerPurpose::StopTimeout => {
                if self.rec(id).state == ServiceState::Stopping {
                    if let Some(pid) = self.rec(id).pid {
                        self.log(LogLevel::Warn, id, "stop timed out; killing");
                        if let Err(err) = self.agent.signal(pid, Signal::Kill) {
                            self.log(LogLevel::Error, id, format!("could not kill: {}", err));
                        }
                    }
                    // remain stopping until the exit is observed
                }
            }
            TimerPurpose::RestartDelay => {
                {
                    let r = self.rec_mut(id);
                    r.waiting_restart_timer = false;
                    r.restart_delay_pending = false;
                }
                self.add_transition_queue(id);
            }
        }
    }
}
