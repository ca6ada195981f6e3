//! Service records and their configuration

use crate::dep::DepLink;
use agent_api::{Duration, ExitStatus, Instant, Pid, Signal, TimerHandle};
use serde::{Deserialize, Serialize};
use service_types::{
    DependencyKind, DesiredState, LaunchId, ServiceFlags, ServiceId, ServiceKind, ServiceState,
    StopReason,
};
use std::collections::VecDeque;

/// What the record's single armed timer is measuring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPurpose {
    /// The start has run too long
    StartTimeout,
    /// The stop signal has gone unanswered too long
    StopTimeout,
    /// Delay before a restart attempt proceeds
    RestartDelay,
}

/// Restart-rate bookkeeping: at most `max_count` restarts within any
/// trailing window of `interval`. A `max_count` of zero disables the
/// throttle.
#[derive(Debug, Clone)]
pub struct RestartTracker {
    interval: Duration,
    max_count: u32,
    recent: VecDeque<Instant>,
}

impl RestartTracker {
    pub fn new(interval: Duration, max_count: u32) -> Self {
        Self {
            interval,
            max_count,
            recent: VecDeque::new(),
        }
    }

    /// Records a restart at `now`
    pub fn record(&mut self, now: Instant) {
        self.recent.push_back(now);
    }

    /// Checks whether one more restart at `now` would exceed the limit
    pub fn over_limit(&mut self, now: Instant) -> bool {
        if self.max_count == 0 {
            return false;
        }
        while let Some(&oldest) = self.recent.front() {
            if now.duration_since(oldest) > self.interval {
                self.recent.pop_front();
            } else {
                break;
            }
        }
        self.recent.len() >= self.max_count as usize
    }
}

/// Loader-facing description of one service.
///
/// Registration is idempotent by name; dependencies name services that
/// must already be registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub kind: ServiceKind,
    pub flags: ServiceFlags,
    /// Start command argv (process kinds)
    pub command: Vec<String>,
    /// Stop command argv (scripted services)
    pub stop_command: Option<Vec<String>>,
    pub start_timeout: Option<Duration>,
    pub stop_timeout: Option<Duration>,
    /// Delay between a stop (or crash) and the restart attempt
    pub restart_delay: Duration,
    /// Restart-rate window
    pub restart_interval: Duration,
    /// Maximum restarts within the window; zero disables the throttle
    pub restart_limit: u32,
    /// Signal sent to bring the process down
    pub stop_signal: Signal,
    /// Wait for a readiness line on the notification fd before started
    pub notify_ready: bool,
    /// Service to start once this one has cleanly stopped
    pub chain_to: Option<String>,
    /// Declared dependencies, resolved at registration
    pub dependencies: Vec<(String, DependencyKind)>,
}

impl ServiceConfig {
    pub fn new(name: impl Into<String>, kind: ServiceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            flags: ServiceFlags::default(),
            command: Vec::new(),
            stop_command: None,
            start_timeout: None,
            stop_timeout: Some(Duration::from_secs(10)),
            restart_delay: Duration::from_millis(200),
            restart_interval: Duration::from_secs(10),
            restart_limit: 3,
            stop_signal: Signal::Terminate,
            notify_ready: false,
            chain_to: None,
            dependencies: Vec::new(),
        }
    }

    pub fn with_flags(mut self, flags: ServiceFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_command(mut self, argv: Vec<String>) -> Self {
        self.command = argv;
        self
    }

    pub fn with_stop_command(mut self, argv: Vec<String>) -> Self {
        self.stop_command = Some(argv);
        self
    }

    pub fn with_start_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.start_timeout = timeout;
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }

    pub fn with_restart_interval(mut self, interval: Duration, limit: u32) -> Self {
        self.restart_interval = interval;
        self.restart_limit = limit;
        self
    }

    pub fn with_stop_signal(mut self, signal: Signal) -> Self {
        self.stop_signal = signal;
        self
    }

    pub fn with_notify_ready(mut self, value: bool) -> Self {
        self.notify_ready = value;
        self
    }

    pub fn with_chain_to(mut self, chain: impl Into<String>) -> Self {
        self.chain_to = Some(chain.into());
        self
    }

    pub fn with_dependency(mut self, on: impl Into<String>, kind: DependencyKind) -> Self {
        self.dependencies.push((on.into(), kind));
        self
    }
}

/// One supervised service: the node of the dependency graph.
///
/// All state transitions go through the owning [`crate::ServiceSet`];
/// the record itself only exposes inspection and configuration setters.
#[derive(Debug)]
pub struct ServiceRecord {
    pub(crate) id: ServiceId,
    pub(crate) name: String,
    pub(crate) kind: ServiceKind,
    pub(crate) flags: ServiceFlags,

    pub(crate) state: ServiceState,
    pub(crate) desired_state: DesiredState,

    /// Count of activations: explicit starts plus held hard acquisitions
    pub(crate) required_by: u32,
    pub(crate) start_explicit: bool,
    pub(crate) stop_reason: StopReason,
    pub(crate) restarting: bool,
    pub(crate) force_stop: bool,
    pub(crate) start_failed: bool,
    pub(crate) start_skipped: bool,
    pub(crate) pinned_started: bool,
    pub(crate) pinned_stopped: bool,

    // propagation bits, drained by the set's propagation pass
    pub(crate) prop_require: bool,
    pub(crate) prop_release: bool,
    pub(crate) prop_failure: bool,
    pub(crate) prop_start: bool,
    pub(crate) prop_stop: bool,
    pub(crate) in_prop_queue: bool,
    pub(crate) in_transition_queue: bool,

    pub(crate) waiting_for_deps: bool,
    pub(crate) waiting_for_console: bool,
    pub(crate) have_console: bool,

    /// Outgoing edges (this service's dependencies)
    pub(crate) depends_on: Vec<DepLink>,
    /// Back-references: one entry per incoming edge
    pub(crate) dependents: Vec<ServiceId>,

    // process bookkeeping
    pub(crate) command: Vec<String>,
    pub(crate) stop_command: Option<Vec<String>>,
    pub(crate) pid: Option<Pid>,
    pub(crate) launch_id: Option<LaunchId>,
    pub(crate) waiting_for_execstat: bool,
    pub(crate) waiting_for_ready: bool,
    pub(crate) waiting_daemon_pid: bool,
    pub(crate) start_aborted: bool,
    pub(crate) start_timed_out: bool,
    pub(crate) timer: Option<(TimerHandle, TimerPurpose)>,
    pub(crate) waiting_restart_timer: bool,
    pub(crate) restart_delay_pending: bool,
    pub(crate) restarts: RestartTracker,
    pub(crate) restart_delay: Duration,
    pub(crate) start_timeout: Option<Duration>,
    pub(crate) stop_timeout: Option<Duration>,
    pub(crate) stop_signal: Signal,
    pub(crate) notify_ready: bool,
    pub(crate) chain_to: Option<String>,
    pub(crate) last_exit: Option<ExitStatus>,
}

impl ServiceRecord {
    pub(crate) fn from_config(id: ServiceId, config: &ServiceConfig) -> Self {
        Self {
            id,
            name: config.name.clone(),
            kind: config.kind,
            flags: config.flags,
            state: ServiceState::Stopped,
            desired_state: DesiredState::Stopped,
            required_by: 0,
            start_explicit: false,
            stop_reason: StopReason::Normal,
            restarting: false,
            force_stop: false,
            start_failed: false,
            start_skipped: false,
            pinned_started: false,
            pinned_stopped: false,
            prop_require: false,
            prop_release: false,
            prop_failure: false,
            prop_start: false,
            prop_stop: false,
            in_prop_queue: false,
            in_transition_queue: false,
            waiting_for_deps: false,
            waiting_for_console: false,
            have_console: false,
            depends_on: Vec::new(),
            dependents: Vec::new(),
            command: config.command.clone(),
            stop_command: config.stop_command.clone(),
            pid: None,
            launch_id: None,
            waiting_for_execstat: false,
            waiting_for_ready: false,
            waiting_daemon_pid: false,
            start_aborted: false,
            start_timed_out: false,
            timer: None,
            waiting_restart_timer: false,
            restart_delay_pending: false,
            restarts: RestartTracker::new(config.restart_interval, config.restart_limit),
            restart_delay: config.restart_delay,
            start_timeout: config.start_timeout,
            stop_timeout: config.stop_timeout,
            stop_signal: config.stop_signal,
            notify_ready: config.notify_ready,
            chain_to: config.chain_to.clone(),
            last_exit: None,
        }
    }

    pub fn id(&self) -> ServiceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    pub fn desired_state(&self) -> DesiredState {
        self.desired_state
    }

    pub fn required_by(&self) -> u32 {
        self.required_by
    }

    pub fn is_explicitly_started(&self) -> bool {
        self.start_explicit
    }

    pub fn stop_reason(&self) -> StopReason {
        self.stop_reason
    }

    pub fn start_failed(&self) -> bool {
        self.start_failed
    }

    pub fn start_skipped(&self) -> bool {
        self.start_skipped
    }

    pub fn is_pinned_started(&self) -> bool {
        self.pinned_started
    }

    pub fn is_pinned_stopped(&self) -> bool {
        self.pinned_stopped
    }

    pub fn pid(&self) -> Option<Pid> {
        self.pid
    }

    pub fn launch_id(&self) -> Option<LaunchId> {
        self.launch_id
    }

    pub fn last_exit(&self) -> Option<ExitStatus> {
        self.last_exit
    }

    pub fn has_console(&self) -> bool {
        self.have_console
    }

    /// Outgoing dependency edges
    pub fn dependencies(&self) -> &[DepLink] {
        &self.depends_on
    }

    /// Ids of services depending on this one (one entry per edge)
    pub fn dependent_ids(&self) -> &[ServiceId] {
        &self.dependents
    }

    // Configuration setters, usable until (and between) activations.

    pub fn set_auto_restart(&mut self, value: bool) {
        self.flags.auto_restart = value;
    }

    pub fn set_smooth_recovery(&mut self, value: bool) {
        self.flags.smooth_recovery = value;
    }

    pub fn set_start_interruptible(&mut self, value: bool) {
        self.flags.start_interruptible = value;
    }

    pub fn set_restart_delay(&mut self, delay: Duration) {
        self.restart_delay = delay;
    }

    pub fn set_restart_interval(&mut self, interval: Duration, limit: u32) {
        self.restarts = RestartTracker::new(interval, limit);
    }

    pub fn set_start_timeout(&mut self, timeout: Option<Duration>) {
        self.start_timeout = timeout;
    }

    pub fn set_stop_timeout(&mut self, timeout: Option<Duration>) {
        self.stop_timeout = timeout;
    }
}
