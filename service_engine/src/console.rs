//! Console arbitration
//!
//! The console is a singleton mediated by a FIFO rather than a lock:
//! at most one service holds it, and grant order is user-visible.

use agent_api::{ProcessAgent, TimerSource};
use service_types::{ServiceId, ServiceState};

impl<A: ProcessAgent, T: TimerSource> crate::ServiceSet<A, T> {
    /// Requests the console; granted immediately when free
    pub(crate) fn queue_for_console(&mut self, id: ServiceId) {
        self.rec_mut(id).waiting_for_console = true;
        if self.console_holder.is_none() && self.console_queue.is_empty() {
            self.console_holder = Some(id);
            self.acquired_console(id);
        } else {
            self.console_queue.push_back(id);
        }
    }

    /// Gives up the console (or a pending grant) and hands it on
    pub(crate) fn release_console(&mut self, id: ServiceId) {
        self.rec_mut(id).have_console = false;
        if self.console_holder == Some(id) {
            self.console_holder = None;
            self.pull_console_queue();
        }
    }

    fn pull_console_queue(&mut self) {
        if let Some(next) = self.console_queue.pop_front() {
            self.console_holder = Some(next);
            self.acquired_console(next);
        }
    }

    /// Removes a cancelled start from the wait queue
    pub(crate) fn unqueue_console(&mut self, id: ServiceId) {
        self.console_queue.retain(|&queued| queued != id);
    }

    /// The console has been granted to this service; complete the start
    /// or hand the console straight on if it is no longer wanted.
    pub(crate) fn acquired_console(&mut self, id: ServiceId) {
        self.rec_mut(id).waiting_for_console = false;
        self.rec_mut(id).have_console = true;

        if self.rec(id).state != ServiceState::Starting {
            // got the console but no longer want it
            self.release_console(id);
        } else if self.check_deps_started(id) {
            self.all_deps_started(id);
        } else {
            // got the console but cannot use it yet
            self.release_console(id);
        }
    }

    /// Whether the service is waiting in the console queue
    pub fn is_queued_for_console(&self, id: ServiceId) -> bool {
        self.console_queue.contains(&id)
    }

    /// Whether no service is waiting for the console
    pub fn is_console_queue_empty(&self) -> bool {
        self.console_queue.is_empty()
    }

    /// The current console holder, if any
    pub fn console_holder(&self) -> Option<ServiceId> {
        self.console_holder
    }
}
