//! Shared helpers for the engine test suites

// not every suite uses every helper
#![allow(dead_code)]

use agent_api::{Duration, ExitStatus};
use service_engine::{ServiceConfig, ServiceSet};
use service_types::{
    DependencyKind, DesiredState, ServiceEvent, ServiceId, ServiceKind, ServiceState,
};
use sim_agent::{SimClock, SimProcessAgent};
use std::collections::HashMap;

pub type SimSet = ServiceSet<SimProcessAgent, SimClock>;

pub fn make_set() -> SimSet {
    ServiceSet::new(SimProcessAgent::new(), SimClock::new())
}

/// Registers an internal service with the given dependencies
pub fn add_internal(set: &mut SimSet, name: &str, deps: &[(&str, DependencyKind)]) -> ServiceId {
    let mut config = ServiceConfig::new(name, ServiceKind::Internal);
    for (dep, kind) in deps {
        config = config.with_dependency(*dep, *kind);
    }
    set.add_service(config).expect("registration failed")
}

/// Registers a process service with a zero restart delay (tests that
/// exercise the delay set it explicitly)
pub fn add_process(set: &mut SimSet, name: &str, deps: &[(&str, DependencyKind)]) -> ServiceId {
    let mut config = ServiceConfig::new(name, ServiceKind::Process)
        .with_command(vec![format!("{}-daemon", name)])
        .with_restart_delay(Duration::ZERO);
    for (dep, kind) in deps {
        config = config.with_dependency(*dep, *kind);
    }
    set.add_service(config).expect("registration failed")
}

pub fn state_of(set: &SimSet, id: ServiceId) -> ServiceState {
    set.service(id).expect("service gone").state()
}

/// Delivers an exec success and drains
pub fn exec_ok(set: &mut SimSet, id: ServiceId) {
    set.exec_succeeded(id);
    set.process_queues();
}

/// Delivers a normal exit and drains
pub fn exit_with(set: &mut SimSet, id: ServiceId, code: i32) {
    set.handle_exit(id, ExitStatus::Exited(code));
    set.process_queues();
}

/// Advances the clock, delivering every expiry, then drains
pub fn advance(set: &mut SimSet, millis: u64) {
    let expired = set.clock_mut().advance(Duration::from_millis(millis));
    for handle in expired {
        set.handle_timer_expiry(handle);
    }
    set.process_queues();
}

/// Drains events and returns those for one service
pub fn events_for(set: &mut SimSet, id: ServiceId) -> Vec<ServiceEvent> {
    set.drain_events()
        .into_iter()
        .filter(|(event_id, _)| *event_id == id)
        .map(|(_, event)| event)
        .collect()
}

/// Audits the quantified invariants that must hold between queue drains
/// (for configurations without pins, which deliberately suspend the
/// hard-edge invariant).
pub fn assert_invariants(set: &SimSet) {
    let mut held: HashMap<ServiceId, u32> = HashMap::new();
    for record in set.services() {
        for link in record.dependencies() {
            if link.holds_acquisition() {
                *held.entry(link.to).or_insert(0) += 1;
            }
        }
    }

    let mut active = 0;
    for record in set.services() {
        let expected = held.get(&record.id()).copied().unwrap_or(0)
            + if record.is_explicitly_started() { 1 } else { 0 };
        assert_eq!(
            record.required_by(),
            expected,
            "required_by mismatch for {}",
            record.name()
        );
        if record.required_by() > 0 {
            active += 1;
        }
        if record.is_explicitly_started() {
            assert!(record.required_by() >= 1);
        }
        assert!(
            !(record.is_pinned_started() && record.is_pinned_stopped()),
            "{} pinned both ways",
            record.name()
        );

        if matches!(
            record.state(),
            ServiceState::Starting | ServiceState::Started
        ) {
            for link in record.dependencies() {
                if link.is_hard() && link.holds_acquisition() {
                    let dep = set.service(link.to).expect("dangling edge");
                    // a held hard dependency is up, or mid-stop with a
                    // restart already latched (the restart window)
                    let acceptable = matches!(
                        dep.state(),
                        ServiceState::Starting | ServiceState::Started
                    ) || (dep.state() == ServiceState::Stopping
                        && dep.desired_state() == DesiredState::Started);
                    assert!(
                        acceptable,
                        "{} is {} but hard dependency {} is {}",
                        record.name(),
                        record.state(),
                        dep.name(),
                        dep.state()
                    );
                }
            }
        }
    }
    assert_eq!(set.count_active_services(), active);
}
