//! The service set: record ownership, work queues and the command surface

use crate::dep::DepLink;
use crate::error::SetError;
use crate::journal::{JournalEntry, LogLevel};
use crate::record::{ServiceConfig, ServiceRecord, TimerPurpose};
use agent_api::{Duration, ExitStatus, Pid, ProcessAgent, TimerHandle, TimerSource};
use serde::Serialize;
use service_types::{
    DependencyKind, DesiredState, ServiceEvent, ServiceId, ServiceState, StopReason,
};
use std::collections::{HashMap, VecDeque};

/// One row of the `list` command output
#[derive(Debug, Clone, Serialize)]
pub struct ServiceSummary {
    pub name: String,
    pub state: ServiceState,
    pub desired_state: DesiredState,
    pub required_by: u32,
    pub pid: Option<Pid>,
    pub last_exit: Option<ExitStatus>,
    pub stop_reason: StopReason,
    pub start_failed: bool,
    pub start_skipped: bool,
}

/// Owns the service records and drives the three work queues.
///
/// The set is the single entry point for commands and events. Handlers
/// mutate a record and enqueue follow-up work; [`ServiceSet::process_queues`]
/// then drains propagation to a fixed point, interleaved with transition
/// passes, until the whole set is quiescent. Cross-record effects never
/// happen by direct recursion.
///
/// The process agent and timer source are supplied at construction; with
/// the simulated implementations the entire engine is deterministic.
pub struct ServiceSet<A: ProcessAgent, T: TimerSource> {
    records: Vec<Option<ServiceRecord>>,
    by_name: HashMap<String, ServiceId>,
    pub(crate) active_services: u32,

    prop_queue: VecDeque<ServiceId>,
    transition_queue: VecDeque<ServiceId>,
    pub(crate) console_queue: VecDeque<ServiceId>,
    pub(crate) console_holder: Option<ServiceId>,

    timer_routes: HashMap<TimerHandle, ServiceId>,
    events: Vec<(ServiceId, ServiceEvent)>,
    journal: Vec<JournalEntry>,

    pub(crate) agent: A,
    pub(crate) clock: T,
}

impl<A: ProcessAgent, T: TimerSource> ServiceSet<A, T> {
    pub fn new(agent: A, clock: T) -> Self {
        Self {
            records: Vec::new(),
            by_name: HashMap::new(),
            active_services: 0,
            prop_queue: VecDeque::new(),
            transition_queue: VecDeque::new(),
            console_queue: VecDeque::new(),
            console_holder: None,
            timer_routes: HashMap::new(),
            events: Vec::new(),
            journal: Vec::new(),
            agent,
            clock,
        }
    }

    pub fn agent(&self) -> &A {
        &self.agent
    }

    pub fn agent_mut(&mut self) -> &mut A {
        &mut self.agent
    }

    pub fn clock(&self) -> &T {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut T {
        &mut self.clock
    }

    // ---- registration and lookup ----

    /// Registers a service, resolving its declared dependencies.
    ///
    /// Idempotent by name: registering a name twice returns the existing
    /// id and leaves the first registration untouched.
    pub fn add_service(&mut self, config: ServiceConfig) -> Result<ServiceId, SetError> {
        if let Some(&existing) = self.by_name.get(&config.name) {
            return Ok(existing);
        }

        let mut links = Vec::new();
        for (dep_name, kind) in &config.dependencies {
            let dep_id = self
                .by_name
                .get(dep_name)
                .copied()
                .ok_or_else(|| {
                    SetError::UnknownDependency(config.name.clone(), dep_name.clone())
                })?;
            if links
                .iter()
                .any(|link: &DepLink| link.to == dep_id && link.kind == *kind)
            {
                return Err(SetError::DuplicateDependency {
                    from: config.name.clone(),
                    to: dep_name.clone(),
                    kind: *kind,
                });
            }
            links.push(DepLink::new(dep_id, *kind));
        }

        let id = ServiceId::from_index(self.records.len());
        let mut record = ServiceRecord::from_config(id, &config);
        for link in &links {
            self.rec_mut(link.to).dependents.push(id);
        }
        record.depends_on = links;
        self.by_name.insert(config.name, id);
        self.records.push(Some(record));
        Ok(id)
    }

    /// Finds a registered service by name
    pub fn find_service(&self, name: &str) -> Option<ServiceId> {
        self.by_name.get(name).copied()
    }

    /// Returns a registered record, if the id is live
    pub fn service(&self, id: ServiceId) -> Option<&ServiceRecord> {
        self.records.get(id.index()).and_then(|slot| slot.as_ref())
    }

    /// Returns a registered record mutably, if the id is live.
    ///
    /// Only inspection and configuration setters are exposed on the
    /// record; state transitions go through the set's commands.
    pub fn service_mut(&mut self, id: ServiceId) -> Option<&mut ServiceRecord> {
        self.records
            .get_mut(id.index())
            .and_then(|slot| slot.as_mut())
    }

    pub(crate) fn rec(&self, id: ServiceId) -> &ServiceRecord {
        self.records[id.index()].as_ref().expect("stale service id")
    }

    pub(crate) fn rec_mut(&mut self, id: ServiceId) -> &mut ServiceRecord {
        self.records[id.index()].as_mut().expect("stale service id")
    }

    /// Number of services with `required_by > 0`
    pub fn count_active_services(&self) -> u32 {
        self.active_services
    }

    /// Iterates over all live records
    pub fn services(&self) -> impl Iterator<Item = &ServiceRecord> {
        self.records.iter().filter_map(|slot| slot.as_ref())
    }

    /// Renders the state of every registered service
    pub fn list(&self) -> Vec<ServiceSummary> {
        self.services()
            .map(|record| ServiceSummary {
                name: record.name.clone(),
                state: record.state,
                desired_state: record.desired_state,
                required_by: record.required_by,
                pid: record.pid,
                last_exit: record.last_exit,
                stop_reason: record.stop_reason,
                start_failed: record.start_failed,
                start_skipped: record.start_skipped,
            })
            .collect()
    }

    // ---- dependency management ----

    /// Adds a dependency edge at runtime.
    ///
    /// Hard edges are checked for cycles here; an active dependent
    /// acquires the new dependency immediately so the graph invariants
    /// keep holding.
    pub fn add_dep(
        &mut self,
        from: ServiceId,
        to: ServiceId,
        kind: DependencyKind,
    ) -> Result<(), SetError> {
        if self
            .rec(from)
            .depends_on
            .iter()
            .any(|link| link.to == to && link.kind == kind)
        {
            return Err(SetError::DuplicateDependency {
                from: self.rec(from).name.clone(),
                to: self.rec(to).name.clone(),
                kind,
            });
        }
        let hard_kind = matches!(kind, DependencyKind::Regular | DependencyKind::Milestone);
        if hard_kind && (from == to || self.hard_path_exists(to, from)) {
            return Err(SetError::DependencyCycle {
                from: self.rec(from).name.clone(),
                to: self.rec(to).name.clone(),
                kind,
            });
        }

        let mut link = DepLink::new(to, kind);
        let from_state = self.rec(from).state;
        if matches!(from_state, ServiceState::Starting | ServiceState::Started) {
            self.require(to);
            link.holding_acq = true;
            let to_state = self.rec(to).state;
            if !matches!(to_state, ServiceState::Starting | ServiceState::Started) {
                self.rec_mut(to).prop_start = true;
                self.add_prop_queue(to);
            }
            if from_state == ServiceState::Starting
                && self.rec(from).waiting_for_deps
                && to_state != ServiceState::Started
            {
                link.waiting_on = true;
            }
        }
        self.rec_mut(from).depends_on.push(link);
        self.rec_mut(to).dependents.push(from);
        self.process_queues();
        Ok(())
    }

    /// Removes a dependency edge, releasing any held acquisition
    pub fn rm_dep(
        &mut self,
        from: ServiceId,
        to: ServiceId,
        kind: DependencyKind,
    ) -> Result<(), SetError> {
        let position = self
            .rec(from)
            .depends_on
            .iter()
            .position(|link| link.to == to && link.kind == kind)
            .ok_or_else(|| SetError::NoSuchDependency {
                from: self.rec(from).name.clone(),
                to: self.rec(to).name.clone(),
                kind,
            })?;

        let link = self.rec_mut(from).depends_on.remove(position);
        if let Some(back) = self
            .rec(to)
            .dependents
            .iter()
            .position(|&dependent| dependent == from)
        {
            self.rec_mut(to).dependents.remove(back);
        }
        if link.holding_acq {
            self.release(to, true);
        }
        self.process_queues();
        Ok(())
    }

    fn hard_path_exists(&self, from: ServiceId, target: ServiceId) -> bool {
        // DFS over declared-hard edges
        let mut stack = vec![from];
        let mut visited = vec![false; self.records.len()];
        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            if visited[current.index()] {
                continue;
            }
            visited[current.index()] = true;
            for link in &self.rec(current).depends_on {
                if matches!(
                    link.kind,
                    DependencyKind::Regular | DependencyKind::Milestone
                ) {
                    stack.push(link.to);
                }
            }
        }
        false
    }

    /// Unloads a fully stopped, unreferenced service
    pub fn unload_service(&mut self, id: ServiceId) -> Result<(), SetError> {
        let record = self.rec(id);
        if record.state != ServiceState::Stopped {
            return Err(SetError::NotStopped(record.name.clone()));
        }
        if record.required_by > 0 {
            return Err(SetError::StillRequired(record.name.clone()));
        }
        if !record.dependents.is_empty() {
            return Err(SetError::HasDependents(record.name.clone()));
        }

        let name = record.name.clone();
        let targets: Vec<ServiceId> = record.depends_on.iter().map(|link| link.to).collect();
        for to in targets {
            if let Some(back) = self
                .rec(to)
                .dependents
                .iter()
                .position(|&dependent| dependent == id)
            {
                self.rec_mut(to).dependents.remove(back);
            }
        }
        self.by_name.remove(&name);
        self.records[id.index()] = None;
        Ok(())
    }

    // ---- command surface ----

    /// Explicitly starts a service and everything it depends on
    pub fn start_service(&mut self, id: ServiceId) {
        self.start(id, true);
        self.process_queues();
    }

    /// Stops a service, releasing its explicit activation
    pub fn stop_service(&mut self, id: ServiceId) {
        self.stop(id, true);
        self.process_queues();
    }

    /// Restarts a started service without touching its activations.
    ///
    /// Returns false if the service is not currently started.
    pub fn restart_service(&mut self, id: ServiceId) -> bool {
        let accepted = self.restart(id);
        self.process_queues();
        accepted
    }

    /// Releases a previous explicit activation without forcing a stop
    pub fn release_service(&mut self, id: ServiceId) {
        if self.rec(id).start_explicit {
            self.rec_mut(id).start_explicit = false;
            self.release(id, true);
            self.process_queues();
        }
    }

    /// Starts a service without explicit activation.
    ///
    /// Only valid while something already requires the service, so the
    /// activation accounting stays balanced.
    pub fn wake_service(&mut self, id: ServiceId) -> Result<(), SetError> {
        if self.rec(id).required_by == 0 {
            return Err(SetError::NoActiveDependents(self.rec(id).name.clone()));
        }
        self.start(id, false);
        self.process_queues();
        Ok(())
    }

    /// Pins the service in the started direction
    pub fn pin_start(&mut self, id: ServiceId) -> Result<(), SetError> {
        if self.rec(id).pinned_stopped {
            return Err(SetError::PinConflict(self.rec(id).name.clone()));
        }
        self.rec_mut(id).pinned_started = true;
        Ok(())
    }

    /// Pins the service in the stopped direction
    pub fn pin_stop(&mut self, id: ServiceId) -> Result<(), SetError> {
        if self.rec(id).pinned_started {
            return Err(SetError::PinConflict(self.rec(id).name.clone()));
        }
        self.rec_mut(id).pinned_stopped = true;
        Ok(())
    }

    /// Clears pins and applies whatever action the pin was holding back
    pub fn unpin_service(&mut self, id: ServiceId) {
        self.unpin(id);
        self.process_queues();
    }

    // ---- queues ----

    pub(crate) fn add_prop_queue(&mut self, id: ServiceId) {
        if !self.rec(id).in_prop_queue {
            self.rec_mut(id).in_prop_queue = true;
            self.prop_queue.push_back(id);
        }
    }

    pub(crate) fn add_transition_queue(&mut self, id: ServiceId) {
        if !self.rec(id).in_transition_queue {
            self.rec_mut(id).in_transition_queue = true;
            self.transition_queue.push_back(id);
        }
    }

    /// Drains the propagation and transition queues to a fixed point.
    ///
    /// Propagation runs to completion before each transition step, so
    /// require/release counts reflect reality before state-machine
    /// decisions are taken.
    pub fn process_queues(&mut self) {
        loop {
            while let Some(id) = self.prop_queue.pop_front() {
                self.rec_mut(id).in_prop_queue = false;
                self.do_propagation(id);
            }
            match self.transition_queue.pop_front() {
                Some(id) => {
                    self.rec_mut(id).in_transition_queue = false;
                    self.execute_transition(id);
                }
                None => {
                    if self.prop_queue.is_empty() {
                        break;
                    }
                }
            }
        }
    }

    // ---- timers ----

    pub(crate) fn arm_timer(&mut self, id: ServiceId, delay: Duration, purpose: TimerPurpose) {
        self.disarm_timer(id);
        let handle = self.clock.arm(delay);
        self.timer_routes.insert(handle, id);
        self.rec_mut(id).timer = Some((handle, purpose));
    }

    pub(crate) fn disarm_timer(&mut self, id: ServiceId) {
        if let Some((handle, _)) = self.rec_mut(id).timer.take() {
            self.clock.disarm(handle);
            self.timer_routes.remove(&handle);
        }
    }

    pub(crate) fn disarm_timer_if(&mut self, id: ServiceId, purpose: TimerPurpose) {
        if matches!(self.rec(id).timer, Some((_, armed)) if armed == purpose) {
            self.disarm_timer(id);
        }
    }

    /// Routes a timer expiry delivered by the dispatcher
    pub fn handle_timer_expiry(&mut self, handle: TimerHandle) {
        let Some(id) = self.timer_routes.remove(&handle) else {
            return;
        };
        if matches!(self.rec(id).timer, Some((armed, _)) if armed == handle) {
            self.timer_expired(id);
        }
    }

    // ---- notifications and journal ----

    pub(crate) fn notify(&mut self, id: ServiceId, event: ServiceEvent) {
        self.events.push((id, event));
    }

    /// Drains buffered listener events, in the order they were produced
    pub fn drain_events(&mut self) -> Vec<(ServiceId, ServiceEvent)> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn log(&mut self, level: LogLevel, id: ServiceId, message: impl Into<String>) {
        let name = self.rec(id).name.clone();
        self.journal
            .push(JournalEntry::for_service(level, name, message));
    }

    /// Drains buffered journal entries
    pub fn drain_journal(&mut self) -> Vec<JournalEntry> {
        std::mem::take(&mut self.journal)
    }
}
