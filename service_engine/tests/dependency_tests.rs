//! Dependency-graph behaviour: starts and stops propagating across
//! regular, milestone and waits-for edges, pinning, and restart
//! semantics.

mod common;

use agent_api::{ExecStage, ExitStatus, Signal};
use common::*;
use service_engine::ServiceConfig;
use service_types::{
    DependencyKind, ServiceEvent, ServiceFlags, ServiceKind, ServiceState, StopReason,
};

const REG: DependencyKind = DependencyKind::Regular;
const WAITS: DependencyKind = DependencyKind::WaitsFor;
const MS: DependencyKind = DependencyKind::Milestone;

// Starting a service starts its dependencies; stopping it releases and
// stops them again.
#[test]
fn start_starts_dependencies_stop_releases_them() {
    let mut set = make_set();
    let s1 = add_internal(&mut set, "svc-1", &[]);
    let s2 = add_internal(&mut set, "svc-2", &[("svc-1", REG)]);
    let s3 = add_internal(&mut set, "svc-3", &[("svc-2", REG)]);

    assert_eq!(set.find_service("svc-1"), Some(s1));
    assert_eq!(set.find_service("svc-2"), Some(s2));
    assert_eq!(set.find_service("svc-3"), Some(s3));

    set.start_service(s3);

    assert_eq!(state_of(&set, s1), ServiceState::Started);
    assert_eq!(state_of(&set, s2), ServiceState::Started);
    assert_eq!(state_of(&set, s3), ServiceState::Started);
    assert_invariants(&set);

    set.stop_service(s3);

    assert_eq!(state_of(&set, s3), ServiceState::Stopped);
    assert_eq!(state_of(&set, s2), ServiceState::Stopped);
    assert_eq!(state_of(&set, s1), ServiceState::Stopped);
    assert_invariants(&set);
}

// A shared dependency stays up while any dependent still holds it.
#[test]
fn shared_dependency_held_by_remaining_dependent() {
    let mut set = make_set();
    let s1 = add_internal(&mut set, "svc-1", &[]);
    let s2 = add_internal(&mut set, "svc-2", &[("svc-1", REG)]);
    let s3 = add_internal(&mut set, "svc-3", &[("svc-2", REG)]);
    let s4 = add_internal(&mut set, "svc-4", &[("svc-2", REG)]);

    set.start_service(s3);
    set.start_service(s4);

    assert_eq!(state_of(&set, s1), ServiceState::Started);
    assert_eq!(state_of(&set, s2), ServiceState::Started);
    assert_eq!(state_of(&set, s3), ServiceState::Started);
    assert_eq!(state_of(&set, s4), ServiceState::Started);

    // s4 keeps the chain up after s3 stops
    set.stop_service(s3);

    assert_eq!(state_of(&set, s3), ServiceState::Stopped);
    assert_eq!(state_of(&set, s4), ServiceState::Started);
    assert_eq!(state_of(&set, s2), ServiceState::Started);
    assert_eq!(state_of(&set, s1), ServiceState::Started);
    assert_invariants(&set);

    set.stop_service(s4);

    assert_eq!(state_of(&set, s4), ServiceState::Stopped);
    assert_eq!(state_of(&set, s2), ServiceState::Stopped);
    assert_eq!(state_of(&set, s1), ServiceState::Stopped);
    assert_invariants(&set);
}

// Stopping a dependency brings its hard dependents down too.
#[test]
fn stopping_dependency_stops_dependents() {
    let mut set = make_set();
    let s1 = add_internal(&mut set, "svc-1", &[]);
    let s2 = add_internal(&mut set, "svc-2", &[("svc-1", REG)]);
    let s3 = add_internal(&mut set, "svc-3", &[("svc-2", REG)]);

    set.start_service(s3);
    set.stop_service(s1);

    assert_eq!(state_of(&set, s3), ServiceState::Stopped);
    assert_eq!(state_of(&set, s2), ServiceState::Stopped);
    assert_eq!(state_of(&set, s1), ServiceState::Stopped);
    assert_invariants(&set);
}

// An explicitly activated auto-restart service restarts after its
// dependency stops, restarting the dependency with it.
#[test]
fn auto_restart_restarts_dependency_chain() {
    let mut set = make_set();
    let s1 = add_internal(&mut set, "svc-1", &[]);
    let s2 = add_internal(&mut set, "svc-2", &[("svc-1", REG)]);
    let s3 = add_internal(&mut set, "svc-3", &[("svc-2", REG)]);
    set.service_mut(s2).unwrap().set_auto_restart(true);

    set.start_service(s3);
    set.start_service(s2);

    set.stop_service(s1);

    assert_eq!(state_of(&set, s3), ServiceState::Stopped);
    assert_eq!(state_of(&set, s2), ServiceState::Started);
    assert_eq!(state_of(&set, s1), ServiceState::Started);
    assert_invariants(&set);
}

// Services that do not start instantly chain the start through the
// dependency graph one completion at a time.
#[test]
fn delayed_starts_chain_through_graph() {
    let mut set = make_set();
    let s1 = add_process(&mut set, "svc-1", &[]);
    let s2 = add_process(&mut set, "svc-2", &[("svc-1", REG)]);
    let s3 = add_process(&mut set, "svc-3", &[("svc-2", REG)]);

    set.start_service(s3);

    assert_eq!(state_of(&set, s3), ServiceState::Starting);
    assert_eq!(state_of(&set, s2), ServiceState::Starting);
    assert_eq!(state_of(&set, s1), ServiceState::Starting);

    exec_ok(&mut set, s1);
    assert_eq!(state_of(&set, s3), ServiceState::Starting);
    assert_eq!(state_of(&set, s2), ServiceState::Starting);
    assert_eq!(state_of(&set, s1), ServiceState::Started);

    exec_ok(&mut set, s2);
    assert_eq!(state_of(&set, s3), ServiceState::Starting);
    assert_eq!(state_of(&set, s2), ServiceState::Started);

    exec_ok(&mut set, s3);
    assert_eq!(state_of(&set, s3), ServiceState::Started);
    assert_invariants(&set);
}

// A pinned-started service survives its dependency stopping; unpinning
// lets the held stop complete.
#[test]
fn pin_keeps_service_started_while_dependency_stops() {
    let mut set = make_set();
    let s1 = add_internal(&mut set, "svc-1", &[]);
    let s2 = add_internal(&mut set, "svc-2", &[("svc-1", REG)]);
    let s3 = add_internal(&mut set, "svc-3", &[("svc-2", REG)]);
    set.service_mut(s2).unwrap().set_auto_restart(true);

    set.pin_start(s3).unwrap();
    set.start_service(s3);

    assert_eq!(state_of(&set, s3), ServiceState::Started);
    assert_eq!(state_of(&set, s2), ServiceState::Started);
    assert_eq!(state_of(&set, s1), ServiceState::Started);

    set.forced_stop(s2);
    set.stop(s2, true);
    set.process_queues();

    // s3 remains started due to the pin; s2 is stuck stopping behind it
    assert_eq!(state_of(&set, s3), ServiceState::Started);
    assert_eq!(state_of(&set, s2), ServiceState::Stopping);
    assert_eq!(state_of(&set, s1), ServiceState::Started);

    set.unpin_service(s3);
    assert_eq!(state_of(&set, s3), ServiceState::Stopped);
    assert_eq!(state_of(&set, s2), ServiceState::Stopped);
    assert_eq!(state_of(&set, s1), ServiceState::Stopped);
}

// A stop issued directly to a pinned-started service does nothing, and
// its dependencies are not released.
#[test]
fn stop_of_pinned_service_is_held() {
    let mut set = make_set();
    let s1 = add_internal(&mut set, "svc-1", &[]);
    let s2 = add_internal(&mut set, "svc-2", &[("svc-1", REG)]);
    let s3 = add_internal(&mut set, "svc-3", &[("svc-2", REG)]);
    set.service_mut(s2).unwrap().set_auto_restart(true);

    set.pin_start(s3).unwrap();
    set.start_service(s3);

    set.stop_service(s3);

    assert_eq!(state_of(&set, s3), ServiceState::Started);
    assert_eq!(state_of(&set, s2), ServiceState::Started);
    assert_eq!(state_of(&set, s1), ServiceState::Started);
}

// A stopping dependency of a pinned service completes its stop on unpin,
// even if the pinned service was re-activated meanwhile.
#[test]
fn stopping_dependency_of_pinned_service_stops_on_unpin() {
    let mut set = make_set();
    let s1 = add_internal(&mut set, "svc-1", &[]);
    let s2 = add_internal(&mut set, "svc-2", &[("svc-1", REG)]);
    let s3 = add_internal(&mut set, "svc-3", &[("svc-2", REG)]);
    set.service_mut(s2).unwrap().set_auto_restart(true);

    set.pin_start(s3).unwrap();
    set.start_service(s3);

    set.stop(s2, true);
    set.forced_stop(s2);
    set.process_queues();

    assert_eq!(state_of(&set, s3), ServiceState::Started);
    assert_eq!(state_of(&set, s2), ServiceState::Stopping);
    assert_eq!(state_of(&set, s1), ServiceState::Started);

    // a start issued now cannot revert s2's forced stop
    set.start(s3, true);
    set.process_queues();

    assert_eq!(state_of(&set, s3), ServiceState::Started);
    assert_eq!(state_of(&set, s2), ServiceState::Stopping);
    assert_eq!(state_of(&set, s1), ServiceState::Started);

    set.unpin_service(s3);

    assert_eq!(state_of(&set, s3), ServiceState::Stopped);
    assert_eq!(state_of(&set, s2), ServiceState::Stopped);
    assert_eq!(state_of(&set, s1), ServiceState::Stopped);
}

// A pinned-started service is released by a forced stop and stops once
// unpinned.
#[test]
fn pinned_service_stops_after_unpin() {
    let mut set = make_set();
    let s1 = add_internal(&mut set, "svc-1", &[]);

    set.pin_start(s1).unwrap();
    set.start_service(s1);
    assert_eq!(state_of(&set, s1), ServiceState::Started);

    set.stop(s1, true);
    set.forced_stop(s1);
    set.process_queues();

    assert_eq!(state_of(&set, s1), ServiceState::Started);

    set.unpin_service(s1);
    assert_eq!(state_of(&set, s1), ServiceState::Stopped);
}

// Stopping a waits-for dependency leaves the dependent running.
#[test]
fn stopping_soft_dependency_leaves_dependent_up() {
    let mut set = make_set();
    let s1 = add_internal(&mut set, "svc-1", &[]);
    let s2 = add_internal(&mut set, "svc-2", &[("svc-1", REG)]);
    let s3 = add_internal(&mut set, "svc-3", &[("svc-2", WAITS)]);

    set.start_service(s3);
    set.stop_service(s1);

    assert_eq!(state_of(&set, s3), ServiceState::Started);
    assert_eq!(state_of(&set, s2), ServiceState::Stopped);
    assert_eq!(state_of(&set, s1), ServiceState::Stopped);
    assert_invariants(&set);
}

// Stopping a milestone dependency after it has started once does not
// stop the dependent.
#[test]
fn milestone_dependency_stop_after_first_start_is_soft() {
    let mut set = make_set();
    let s1 = add_internal(&mut set, "svc-1", &[]);
    let s2 = add_internal(&mut set, "svc-2", &[("svc-1", MS)]);

    set.start_service(s2);

    assert_eq!(state_of(&set, s2), ServiceState::Started);
    assert_eq!(state_of(&set, s1), ServiceState::Started);

    set.stop_service(s1);

    assert_eq!(state_of(&set, s2), ServiceState::Started);
    assert_eq!(state_of(&set, s1), ServiceState::Stopped);
    assert_invariants(&set);
}

// A milestone dependency that fails during start fails the dependent.
#[test]
fn milestone_failure_during_start_fails_dependent() {
    let mut set = make_set();
    let s1 = add_process(&mut set, "svc-1", &[]);
    let s2 = add_internal(&mut set, "svc-2", &[("svc-1", MS)]);

    set.start_service(s2);
    assert_eq!(state_of(&set, s1), ServiceState::Starting);

    set.exec_failed(s1, ExecStage::Exec, 2);
    set.process_queues();

    assert_eq!(state_of(&set, s1), ServiceState::Stopped);
    assert_eq!(state_of(&set, s2), ServiceState::Stopped);
    assert_eq!(set.service(s1).unwrap().stop_reason(), StopReason::ExecFailed);
    assert_eq!(set.service(s2).unwrap().stop_reason(), StopReason::DepFailed);
    assert!(set.service(s2).unwrap().start_failed());
    assert_invariants(&set);
}

// A start cancelled while waiting for the console leaves the console
// queue clean.
#[test]
fn cancelled_start_unqueues_from_console() {
    let mut set = make_set();
    let s1 = add_process(&mut set, "svc-1", &[]);
    let s2_config = ServiceConfig::new("svc-2", ServiceKind::Process)
        .with_command(vec!["svc-2-daemon".to_string()])
        .with_flags(ServiceFlags::new().with_starts_on_console(true))
        .with_dependency("svc-1", REG);
    let s2 = set.add_service(s2_config).unwrap();

    let s3_config = ServiceConfig::new("svc-3", ServiceKind::Process)
        .with_command(vec!["svc-3-daemon".to_string()])
        .with_flags(
            ServiceFlags::new()
                .with_starts_on_console(true)
                .with_runs_on_console(true),
        );
    let s3 = set.add_service(s3_config).unwrap();

    // s3 acquires the console and keeps it
    set.start_service(s3);
    exec_ok(&mut set, s3);

    assert!(!set.is_queued_for_console(s3));
    assert!(set.is_console_queue_empty());
    assert_eq!(set.console_holder(), Some(s3));

    // s2 starts behind s1, then queues for the console
    set.start_service(s2);
    assert_eq!(state_of(&set, s1), ServiceState::Starting);
    assert_eq!(state_of(&set, s2), ServiceState::Starting);

    exec_ok(&mut set, s1);
    assert_eq!(state_of(&set, s1), ServiceState::Started);
    assert_eq!(state_of(&set, s2), ServiceState::Starting);
    assert!(set.is_queued_for_console(s2));

    // stopping s1 cancels s2's start and unqueues it
    set.stop(s1, true);
    set.process_queues();
    set.handle_exit(s1, ExitStatus::Exited(0));
    set.process_queues();

    assert_eq!(state_of(&set, s1), ServiceState::Stopped);
    assert_eq!(state_of(&set, s2), ServiceState::Stopped);
    assert!(!set.is_queued_for_console(s2));
}

// A milestone dependency stopped before ever starting takes the
// dependent's start down with it.
#[test]
fn milestone_stopped_during_start_stops_dependent() {
    let mut set = make_set();
    let s1 = add_process(&mut set, "svc-1", &[]);
    let s2 = add_internal(&mut set, "svc-2", &[("svc-1", MS)]);
    set.service_mut(s1).unwrap().set_start_interruptible(true);

    set.start_service(s2);

    assert_eq!(state_of(&set, s1), ServiceState::Starting);
    assert_eq!(state_of(&set, s2), ServiceState::Starting);

    set.stop(s1, true);
    set.process_queues();
    set.handle_exit(s1, ExitStatus::Signalled(Signal::Interrupt));
    set.process_queues();

    assert_eq!(state_of(&set, s1), ServiceState::Stopped);
    assert_eq!(state_of(&set, s2), ServiceState::Stopped);
    assert_invariants(&set);
}

// The active-service count returns to zero across mixed dependency
// types.
#[test]
fn active_count_zero_after_mixed_dependency_stop() {
    let mut set = make_set();
    let s4 = add_internal(&mut set, "svc-4", &[]);
    let s3 = add_internal(&mut set, "svc-3", &[]);
    let s2 = add_internal(&mut set, "svc-2", &[]);
    let s1 = add_internal(
        &mut set,
        "svc-1",
        &[("svc-2", WAITS), ("svc-3", REG), ("svc-4", MS)],
    );

    set.start_service(s1);

    assert_eq!(state_of(&set, s1), ServiceState::Started);
    assert_eq!(state_of(&set, s2), ServiceState::Started);
    assert_eq!(state_of(&set, s3), ServiceState::Started);
    assert_eq!(state_of(&set, s4), ServiceState::Started);
    assert_invariants(&set);

    set.stop_service(s1);

    assert_eq!(state_of(&set, s1), ServiceState::Stopped);
    assert_eq!(state_of(&set, s2), ServiceState::Stopped);
    assert_eq!(state_of(&set, s3), ServiceState::Stopped);
    assert_eq!(state_of(&set, s4), ServiceState::Stopped);
    assert_eq!(set.count_active_services(), 0);
    assert_invariants(&set);
}

// Restart brings the service down and back up without disturbing its
// dependents.
#[test]
fn restart_leaves_dependents_up() {
    let mut set = make_set();
    let s1 = add_process(&mut set, "svc-1", &[]);
    let s2 = add_process(&mut set, "svc-2", &[("svc-1", WAITS)]);
    let s3 = add_process(&mut set, "svc-3", &[("svc-2", REG)]);

    set.start_service(s3);
    exec_ok(&mut set, s1);
    exec_ok(&mut set, s2);
    exec_ok(&mut set, s3);

    assert_eq!(state_of(&set, s1), ServiceState::Started);
    assert_eq!(state_of(&set, s2), ServiceState::Started);
    assert_eq!(state_of(&set, s3), ServiceState::Started);
    set.drain_events();

    assert!(set.restart(s1));
    set.forced_stop(s1);
    set.process_queues();

    assert_eq!(state_of(&set, s1), ServiceState::Stopping);
    exit_with(&mut set, s1, 0);

    assert_eq!(state_of(&set, s3), ServiceState::Started);
    assert_eq!(state_of(&set, s2), ServiceState::Started);
    assert_eq!(state_of(&set, s1), ServiceState::Starting);
    assert!(!events_for(&mut set, s1).contains(&ServiceEvent::Started));

    exec_ok(&mut set, s1);

    assert_eq!(state_of(&set, s1), ServiceState::Started);
    assert!(events_for(&mut set, s1).contains(&ServiceEvent::Started));
    assert_invariants(&set);
}

// The restart flag does not stick: the service restarts once, then a
// plain stop keeps it down.
#[test]
fn restart_happens_only_once() {
    let mut set = make_set();
    let s1 = add_process(&mut set, "svc-1", &[]);
    let s2 = add_process(&mut set, "svc-2", &[("svc-1", WAITS)]);

    set.start_service(s2);
    exec_ok(&mut set, s1);
    exec_ok(&mut set, s2);

    assert!(set.restart(s1));
    set.forced_stop(s1);
    set.process_queues();
    exit_with(&mut set, s1, 0);

    assert_eq!(state_of(&set, s2), ServiceState::Started);
    assert_eq!(state_of(&set, s1), ServiceState::Starting);

    exec_ok(&mut set, s1);
    assert_eq!(state_of(&set, s1), ServiceState::Started);

    set.stop(s1, true);
    set.process_queues();
    exit_with(&mut set, s1, 0);

    assert_eq!(state_of(&set, s2), ServiceState::Started);
    assert_eq!(state_of(&set, s1), ServiceState::Stopped);
}

// A pending restart is abandoned when the dependents that kept the
// service required stop while it is still going down.
#[test]
fn restart_cancelled_when_dependents_release() {
    let mut set = make_set();
    let s1 = add_process(&mut set, "svc-1", &[]);
    let s2 = add_process(&mut set, "svc-2", &[("svc-1", WAITS)]);

    set.start_service(s2);
    exec_ok(&mut set, s1);
    exec_ok(&mut set, s2);
    set.drain_events();

    assert!(set.restart(s1));
    set.forced_stop(s1);
    set.process_queues();

    assert_eq!(state_of(&set, s1), ServiceState::Stopping);

    set.stop(s2, true);
    set.process_queues();
    exit_with(&mut set, s2, 0);
    exit_with(&mut set, s1, 0);

    assert_eq!(state_of(&set, s2), ServiceState::Stopped);
    assert_eq!(state_of(&set, s1), ServiceState::Stopped);

    let events = events_for(&mut set, s1);
    assert!(events.contains(&ServiceEvent::StartCancelled));
    assert!(!events.contains(&ServiceEvent::Started));
    assert_invariants(&set);
}

// Two explicit starts are idempotent; restart preserves the explicit
// activation and the held acquisitions.
#[test]
fn explicit_start_is_idempotent_and_restart_preserves_activation() {
    let mut set = make_set();
    let s1 = add_internal(&mut set, "svc-1", &[]);
    let s2 = add_process(&mut set, "svc-2", &[("svc-1", REG)]);

    set.start_service(s2);
    exec_ok(&mut set, s2);
    let required_once = set.service(s2).unwrap().required_by();

    set.start_service(s2);
    assert_eq!(set.service(s2).unwrap().required_by(), required_once);

    assert!(set.restart(s2));
    set.process_queues();
    exit_with(&mut set, s2, 0);
    exec_ok(&mut set, s2);

    assert_eq!(state_of(&set, s2), ServiceState::Started);
    assert!(set.service(s2).unwrap().is_explicitly_started());
    assert!(set.service(s2).unwrap().dependencies()[0].holds_acquisition());
    assert_eq!(state_of(&set, s1), ServiceState::Started);
    assert_invariants(&set);
}
