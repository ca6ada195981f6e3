//! The base service state machine: commands, propagation and transitions
//!
//! Everything here operates through the owning set so that cross-record
//! effects go via the work queues, never by direct recursion into a
//! record that is already being mutated.

use crate::journal::LogLevel;
use crate::record::TimerPurpose;
use agent_api::{ProcessAgent, TimerSource};
use service_types::{
    DependencyKind, DesiredState, ServiceEvent, ServiceId, ServiceState, StopReason,
};

impl<A: ProcessAgent, T: TimerSource> crate::ServiceSet<A, T> {
    /// Collects `(dependent, link index)` pairs for every incoming edge
    pub(crate) fn incoming_links(&self, id: ServiceId) -> Vec<(ServiceId, usize)> {
        let mut froms: Vec<ServiceId> = Vec::new();
        for &from in &self.rec(id).dependents {
            if !froms.contains(&from) {
                froms.push(from);
            }
        }
        let mut result = Vec::new();
        for from in froms {
            for (index, link) in self.rec(from).depends_on.iter().enumerate() {
                if link.to == id {
                    result.push((from, index));
                }
            }
        }
        result
    }

    /// Adds one activation; on 0 -> 1 the record becomes active and its
    /// own dependencies are scheduled for acquisition.
    pub(crate) fn require(&mut self, id: ServiceId) {
        let became_active = {
            let r = self.rec_mut(id);
            r.required_by += 1;
            r.required_by == 1
        };
        if became_active {
            self.active_services += 1;
            let state = self.rec(id).state;
            let r = self.rec_mut(id);
            r.prop_require = !r.prop_release;
            r.prop_release = false;
            if state != ServiceState::Starting && state != ServiceState::Started {
                r.prop_start = true;
            }
            self.add_prop_queue(id);
        }
    }

    /// Removes one activation; on 1 -> 0 the record becomes inactive,
    /// releases its own dependencies and (if requested) stops.
    pub(crate) fn release(&mut self, id: ServiceId, issue_stop: bool) {
        let now_zero = {
            let r = self.rec_mut(id);
            debug_assert!(r.required_by > 0, "unbalanced release of {}", r.name);
            r.required_by -= 1;
            r.required_by == 0
        };
        if !now_zero {
            return;
        }
        self.active_services -= 1;
        self.rec_mut(id).desired_state = DesiredState::Stopped;

        let state = self.rec(id).state;
        if state != ServiceState::Stopped && state != ServiceState::Stopping {
            // no release to issue if the require was still pending
            let r = self.rec_mut(id);
            r.prop_release = !r.prop_require;
            r.prop_require = false;
            self.add_prop_queue(id);
        }

        if state == ServiceState::Stopped {
            // already down, nothing to bring down
        } else if issue_stop {
            self.rec_mut(id).stop_reason = StopReason::Normal;
            self.do_stop(id);
        }
    }

    /// Releases every held acquisition on outgoing edges
    pub(crate) fn release_dependencies(&mut self, id: ServiceId) {
        let link_count = self.rec(id).depends_on.len();
        for index in 0..link_count {
            let (to, holding) = {
                let link = &self.rec(id).depends_on[index];
                (link.to, link.holding_acq)
            };
            if holding {
                // clear before releasing: the dependency may inspect this
                // link while deciding whether to stop
                self.rec_mut(id).depends_on[index].holding_acq = false;
                self.release(to, true);
            }
        }
    }

    /// Brings the service towards started.
    ///
    /// With `activate` the service gains an explicit activation that
    /// persists until released. A stop in progress is reverted when it
    /// can be interrupted, and otherwise converted into a restart.
    pub fn start(&mut self, id: ServiceId, activate: bool) {
        if activate && !self.rec(id).start_explicit {
            self.require(id);
            self.rec_mut(id).start_explicit = true;
        }

        self.rec_mut(id).desired_state = DesiredState::Started;

        let state = self.rec(id).state;
        if state != ServiceState::Stopped {
            // already starting or started, or stopping and must wait
            if state != ServiceState::Stopping {
                return;
            }
            if !self.can_interrupt_stop(id) {
                self.rec_mut(id).restarting = true;
                return;
            }
            // The stop can be reverted. Our dependencies may be stopping
            // too, but only because they wait on us, so they return to
            // starting through the dependency check below.
            self.notify(id, ServiceEvent::StopCancelled);
        }

        {
            let r = self.rec_mut(id);
            r.start_failed = false;
            r.start_skipped = false;
            r.start_timed_out = false;
            r.start_aborted = false;
            r.state = ServiceState::Starting;
            r.waiting_for_deps = true;
        }

        if self.start_check_dependencies(id) {
            self.add_transition_queue(id);
        }
    }

    /// Drains this record's pending propagation bits
    pub(crate) fn do_propagation(&mut self, id: ServiceId) {
        if self.rec(id).prop_require {
            self.rec_mut(id).prop_require = false;
            let link_count = self.rec(id).depends_on.len();
            for index in 0..link_count {
                let to = self.rec(id).depends_on[index].to;
                self.require(to);
                self.rec_mut(id).depends_on[index].holding_acq = true;
            }
        }

        if self.rec(id).prop_release {
            self.rec_mut(id).prop_release = false;
            self.release_dependencies(id);
        }

        if self.rec(id).prop_failure {
            self.rec_mut(id).prop_failure = false;
            self.rec_mut(id).stop_reason = StopReason::DepFailed;
            self.failed_to_start(id, true, true);
        }

        if self.rec(id).prop_start {
            self.rec_mut(id).prop_start = false;
            self.start(id, false);
        }

        if self.rec(id).prop_stop {
            self.rec_mut(id).prop_stop = false;
            self.do_stop(id);
        }
    }

    /// One step of the record's state machine, run from the transition
    /// queue. Started-with-restarting is smooth recovery and is treated
    /// like starting.
    pub(crate) fn execute_transition(&mut self, id: ServiceId) {
        let state = self.rec(id).state;
        if (state == ServiceState::Starting
            || (state == ServiceState::Started && self.rec(id).restarting))
            && self.rec(id).waiting_for_deps
        {
            if self.check_deps_started(id) {
                self.all_deps_started(id);
            }
        } else if state == ServiceState::Stopping && self.rec(id).waiting_for_deps {
            if self.stop_check_dependents(id) {
                self.rec_mut(id).waiting_for_deps = false;

                // A service that does stop has its explicit activation
                // released, unless it is going to restart.
                let keep_explicit = {
                    let r = self.rec(id);
                    !r.start_explicit || r.flags.auto_restart || r.restarting
                };
                if !keep_explicit {
                    self.rec_mut(id).start_explicit = false;
                    self.release(id, false);
                }

                self.bring_down(id);
            }
        }
    }

    /// Re-runs a pending start, used when a stopped pin is removed
    pub(crate) fn do_start(&mut self, id: ServiceId) {
        if self.rec(id).pinned_stopped {
            return;
        }
        if self.rec(id).state != ServiceState::Starting {
            return;
        }
        self.rec_mut(id).waiting_for_deps = true;
        if self.check_deps_started(id) {
            self.all_deps_started(id);
        }
    }

    /// A dependency of this record reached started
    pub(crate) fn dependency_started(&mut self, id: ServiceId) {
        // Started is also accepted: a smooth recovery held up by a pinned
        // or restarting dependency resumes through the same path.
        let r = self.rec(id);
        if (r.state == ServiceState::Starting || r.state == ServiceState::Started)
            && r.waiting_for_deps
        {
            self.add_transition_queue(id);
        }
    }

    /// Marks unstarted dependencies waited-on and schedules their start.
    /// Returns true when every dependency is already started.
    pub(crate) fn start_check_dependencies(&mut self, id: ServiceId) -> bool {
        let mut all_started = true;
        let link_count = self.rec(id).depends_on.len();
        for index in 0..link_count {
            let to = self.rec(id).depends_on[index].to;
            let to_state = self.rec(to).state;
            if to_state != ServiceState::Started {
                if to_state != ServiceState::Starting {
                    self.rec_mut(to).prop_start = true;
                    self.add_prop_queue(to);
                }
                self.rec_mut(id).depends_on[index].waiting_on = true;
                all_started = false;
            }
        }
        all_started
    }

    /// True when no outgoing edge is still waited on
    pub(crate) fn check_deps_started(&self, id: ServiceId) -> bool {
        self.rec(id).depends_on.iter().all(|link| !link.waiting_on)
    }

    /// Every dependency is up: acquire the console if needed, consult the
    /// kind-specific gate, then bring the service up.
    pub(crate) fn all_deps_started(&mut self, id: ServiceId) {
        if self.rec(id).state == ServiceState::Starting
            && self.rec(id).flags.starts_on_console
            && !self.rec(id).have_console
        {
            if !self.rec(id).waiting_for_console {
                self.queue_for_console(id);
            }
            return;
        }

        self.rec_mut(id).waiting_for_deps = false;

        if !self.can_proceed_to_start(id) {
            self.rec_mut(id).waiting_for_deps = true;
            return;
        }

        let start_success = self.bring_up(id);
        self.rec_mut(id).restarting = false;
        if !start_success {
            self.failed_to_start(id, false, true);
        }
    }

    /// The service is now up
    pub(crate) fn started(&mut self, id: ServiceId) {
        // if we start on the console but don't keep it, hand it on now
        if self.rec(id).have_console && !self.rec(id).flags.runs_on_console {
            self.release_console(id);
        }
        self.disarm_timer_if(id, TimerPurpose::StartTimeout);
        self.rec_mut(id).start_timed_out = false;

        self.log(LogLevel::Info, id, "started");
        self.rec_mut(id).state = ServiceState::Started;
        self.notify(id, ServiceEvent::Started);

        if self.rec(id).force_stop || self.rec(id).desired_state == DesiredState::Stopped {
            // a stop was latched while we were starting
            self.do_stop(id);
            return;
        }

        for (from, index) in self.incoming_links(id) {
            {
                let link = &mut self.rec_mut(from).depends_on[index];
                if link.kind == DependencyKind::Milestone {
                    link.milestone_passed = true;
                }
                link.waiting_on = false;
            }
            self.dependency_started(from);
        }
    }

    /// The service has actually stopped. Dependents have already stopped
    /// unless this stop came from an unexpected process termination.
    pub(crate) fn stopped(&mut self, id: ServiceId) {
        if self.rec(id).have_console {
            self.release_console(id);
        }
        self.disarm_timer(id);

        {
            let r = self.rec_mut(id);
            r.force_stop = false;
            r.restarting |= r.flags.auto_restart;
        }
        let will_restart = self.rec(id).restarting && self.rec(id).required_by > 0;
        if self.rec(id).restarting && !will_restart {
            self.notify(id, ServiceEvent::StartCancelled);
        }
        self.rec_mut(id).restarting = false;

        // if we won't restart, break soft dependencies now
        if !will_restart {
            for (from, index) in self.incoming_links(id) {
                let (hard, waiting, holding) = {
                    let link = &self.rec(from).depends_on[index];
                    (link.is_hard(), link.waiting_on, link.holding_acq)
                };
                if hard {
                    continue;
                }
                if waiting {
                    self.rec_mut(from).depends_on[index].waiting_on = false;
                    self.dependency_started(from);
                }
                if holding {
                    // release without issuing a stop, since this service
                    // is already stopped
                    self.rec_mut(from).depends_on[index].holding_acq = false;
                    self.release(id, false);
                }
            }
        }

        // signal dependencies in case they are waiting for us to stop
        let targets: Vec<ServiceId> = self.rec(id).depends_on.iter().map(|link| link.to).collect();
        for to in targets {
            self.dependent_stopped(to);
        }

        {
            let r = self.rec_mut(id);
            r.state = ServiceState::Stopped;
            r.pid = None;
            r.launch_id = None;
            r.waiting_for_execstat = false;
            r.waiting_for_ready = false;
            r.waiting_daemon_pid = false;
            r.start_aborted = false;
            r.start_timed_out = false;
        }

        let start_failed = self.rec(id).start_failed;

        if will_restart {
            let has_process = self.rec(id).kind.has_process();
            {
                let r = self.rec_mut(id);
                r.restarting = true;
                r.restart_delay_pending = has_process && !r.restart_delay.is_zero();
            }
            self.start(id, false);
        } else if self.rec(id).start_explicit {
            // explicitly started, so required_by is at least 1; release
            // marks inactive and releases dependencies as needed
            self.rec_mut(id).start_explicit = false;
            self.release(id, true);
        } else if self.rec(id).required_by == 0 {
            let r = self.rec_mut(id);
            r.prop_release = !r.prop_require;
            r.prop_require = false;
            self.add_prop_queue(id);
        }

        // start failure was logged already; only log other stops
        if !start_failed {
            self.log(LogLevel::Info, id, "stopped");

            if !will_restart {
                if let Some(chain) = self.rec(id).chain_to.clone() {
                    match self.find_service(&chain) {
                        Some(chained) => self.start(chained, true),
                        None => self.log(
                            LogLevel::Warn,
                            id,
                            format!("cannot chain to unregistered service {}", chain),
                        ),
                    }
                }
            }
        }
        self.notify(id, ServiceEvent::Stopped);
    }

    /// A start attempt has failed: undo the activations it caused and
    /// cancel or fail dependents as their edge type demands.
    pub(crate) fn failed_to_start(&mut self, id: ServiceId, _dep_failed: bool, immediate_stop: bool) {
        if self.rec(id).waiting_for_console {
            self.unqueue_console(id);
            self.rec_mut(id).waiting_for_console = false;
        }
        self.disarm_timer(id);

        if self.rec(id).start_explicit {
            self.rec_mut(id).start_explicit = false;
            self.release(id, false);
        }

        for (from, index) in self.incoming_links(id) {
            let (hard, waiting, holding) = {
                let link = &self.rec(from).depends_on[index];
                (link.is_hard(), link.waiting_on, link.holding_acq)
            };
            if hard {
                if self.rec(from).state == ServiceState::Starting {
                    self.rec_mut(from).prop_failure = true;
                    self.add_prop_queue(from);
                }
            } else if waiting {
                self.rec_mut(from).depends_on[index].waiting_on = false;
                self.dependency_started(from);
            }
            // always release now, so our desired state is stopped before
            // stopped() runs; otherwise it may decide to restart us
            if holding {
                self.rec_mut(from).depends_on[index].holding_acq = false;
                self.release(id, false);
            }
        }

        self.rec_mut(id).start_failed = true;
        self.log(LogLevel::Error, id, "failed to start");
        self.notify(id, ServiceEvent::FailedStart);

        if immediate_stop {
            self.stopped(id);
        }
    }

    /// Marks this service and (via propagation) its dependents as
    /// force-stopped: the stop may no longer be interrupted.
    pub fn forced_stop(&mut self, id: ServiceId) {
        if self.rec(id).state != ServiceState::Stopped {
            self.rec_mut(id).force_stop = true;
            if !self.rec(id).pinned_started {
                self.rec_mut(id).prop_stop = true;
                self.add_prop_queue(id);
            }
        }
    }

    /// A dependent of this record reached stopped
    pub(crate) fn dependent_stopped(&mut self, id: ServiceId) {
        if self.rec(id).state == ServiceState::Stopping && self.rec(id).waiting_for_deps {
            self.add_transition_queue(id);
        }
    }

    /// Brings the service towards stopped.
    ///
    /// Releases any explicit activation; a service nobody requires is
    /// brought down regardless of `bring_down` (it can only still be up
    /// because of auto-restart after its dependents released it).
    pub fn stop(&mut self, id: ServiceId, mut bring_down: bool) {
        if self.rec(id).start_explicit {
            let became_inactive = {
                let r = self.rec_mut(id);
                r.start_explicit = false;
                debug_assert!(r.required_by > 0, "explicit start without activation");
                r.required_by -= 1;
                if r.required_by == 0 {
                    r.desired_state = DesiredState::Stopped;
                    true
                } else {
                    false
                }
            };
            if became_inactive {
                self.active_services -= 1;
            }
        }

        if self.rec(id).required_by == 0 {
            bring_down = true;
        }

        let state = self.rec(id).state;
        if bring_down && state != ServiceState::Stopped && state != ServiceState::Stopping {
            self.rec_mut(id).stop_reason = StopReason::Normal;
            self.do_stop(id);
        }
    }

    /// Restarts a started service without touching dependency links or
    /// activations. Returns false in any other state.
    pub fn restart(&mut self, id: ServiceId) -> bool {
        if self.rec(id).state == ServiceState::Started {
            {
                let r = self.rec_mut(id);
                r.restarting = true;
                r.stop_reason = StopReason::Normal;
            }
            self.do_stop(id);
            return true;
        }
        false
    }

    /// Initiates the stop: propagate to dependents, interrupt or wait out
    /// a start in progress, then enter stopping.
    pub(crate) fn do_stop(&mut self, id: ServiceId) {
        // We may restart afterwards, but we won't know until the
        // transition executes.
        let all_deps_stopped = self.stop_dependents(id);

        let state = self.rec(id).state;
        if state != ServiceState::Started {
            if state == ServiceState::Starting {
                let (waiting_deps, waiting_console) = {
                    let r = self.rec(id);
                    (r.waiting_for_deps, r.waiting_for_console)
                };
                if !waiting_deps && !waiting_console {
                    if !self.can_interrupt_start(id) {
                        // we have to continue starting; the stop applies
                        // once started is reached
                        return;
                    }
                    if !self.interrupt_start(id) {
                        // wait for the startup to actually end
                        self.notify(id, ServiceEvent::StartCancelled);
                        return;
                    }
                } else if waiting_console {
                    self.unqueue_console(id);
                    self.rec_mut(id).waiting_for_console = false;
                }
                self.notify(id, ServiceEvent::StartCancelled);
            } else {
                // stopping or stopped already
                return;
            }
        }

        if self.rec(id).pinned_started {
            return;
        }

        if self.rec(id).required_by == 0 {
            self.rec_mut(id).prop_release = true;
            self.add_prop_queue(id);
        }

        {
            let r = self.rec_mut(id);
            r.state = ServiceState::Stopping;
            r.waiting_for_deps = true;
        }
        if all_deps_stopped {
            self.add_transition_queue(id);
        }
    }

    /// True when no hard dependent still holds an acquisition
    pub(crate) fn stop_check_dependents(&self, id: ServiceId) -> bool {
        for (from, index) in self.incoming_links(id) {
            let link = &self.rec(from).depends_on[index];
            if link.is_hard() && link.holding_acq {
                return false;
            }
        }
        true
    }

    /// Issues stops to hard dependents. Returns true when they are all
    /// already stopped.
    pub(crate) fn stop_dependents(&mut self, id: ServiceId) -> bool {
        let mut all_stopped = true;
        let force = self.rec(id).force_stop;
        for (from, index) in self.incoming_links(id) {
            let applies = {
                let link = &self.rec(from).depends_on[index];
                link.is_hard() && link.holding_acq
            };
            if !applies {
                continue;
            }
            if self.rec(from).state != ServiceState::Stopped {
                // the dependent will notify us when it has stopped, which
                // re-runs the dependents check
                all_stopped = false;
            }
            if force {
                self.forced_stop(from);
            }
            self.rec_mut(from).prop_stop = true;
            self.add_prop_queue(from);
        }
        all_stopped
    }

    /// Clears pins and applies whatever transition the pin held back
    pub(crate) fn unpin(&mut self, id: ServiceId) {
        if self.rec(id).pinned_started {
            self.rec_mut(id).pinned_started = false;

            let link_count = self.rec(id).depends_on.len();
            for index in 0..link_count {
                let (to, hard, holding) = {
                    let link = &self.rec(id).depends_on[index];
                    (link.to, link.is_hard(), link.holding_acq)
                };
                if hard {
                    if self.rec(to).state != ServiceState::Started {
                        self.rec_mut(id).desired_state = DesiredState::Stopped;
                    }
                } else if holding {
                    self.rec_mut(id).depends_on[index].holding_acq = false;
                    self.release(to, true);
                }
            }

            if self.rec(id).desired_state == DesiredState::Stopped || self.rec(id).force_stop {
                self.do_stop(id);
                self.process_queues();
            }
        }
        if self.rec(id).pinned_stopped {
            self.rec_mut(id).pinned_stopped = false;
            if self.rec(id).desired_state == DesiredState::Started {
                self.do_start(id);
                self.process_queues();
            }
        }
    }

    /// A stop can be reverted while we are only waiting on dependents and
    /// the stop is not forced.
    pub(crate) fn can_interrupt_stop(&self, id: ServiceId) -> bool {
        let r = self.rec(id);
        r.waiting_for_deps && !r.force_stop
    }
}
