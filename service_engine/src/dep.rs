//! Dependency edges

use service_types::{DependencyKind, ServiceId};

/// One directed dependency edge, stored on the dependent (`from`) record.
///
/// The two bookkeeping flags are independent: a dependent can hold an
/// acquisition without waiting (the dependency already started), and can
/// briefly wait without holding (a soft link broken while stopping).
#[derive(Debug, Clone)]
pub struct DepLink {
    /// The dependency this edge points at
    pub to: ServiceId,
    /// Declared edge type
    pub kind: DependencyKind,
    /// The dependent is blocked until `to` reaches started
    pub(crate) waiting_on: bool,
    /// The dependent has incremented `to.required_by` and owes a release
    pub(crate) holding_acq: bool,
    /// A milestone dependency has reached started at least once
    pub(crate) milestone_passed: bool,
}

impl DepLink {
    pub(crate) fn new(to: ServiceId, kind: DependencyKind) -> Self {
        Self {
            to,
            kind,
            waiting_on: false,
            holding_acq: false,
            milestone_passed: false,
        }
    }

    /// Whether this edge currently propagates stops and failures.
    ///
    /// Regular edges always do; milestone edges only until the
    /// dependency's first successful start; waits-for and soft never.
    pub fn is_hard(&self) -> bool {
        match self.kind {
            DependencyKind::Regular => true,
            DependencyKind::Milestone => !self.milestone_passed,
            DependencyKind::WaitsFor | DependencyKind::Soft => false,
        }
    }

    /// Whether the dependent currently holds an acquisition on `to`
    pub fn holds_acquisition(&self) -> bool {
        self.holding_acq
    }

    /// Whether the dependent is blocked waiting for `to` to start
    pub fn is_waiting(&self) -> bool {
        self.waiting_on
    }
}
