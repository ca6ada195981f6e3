//! Per-service behaviour flags

use serde::{Deserialize, Serialize};

/// Configured behaviour flags for a service.
///
/// These are loader-time configuration, distinct from runtime latches
/// like the started/stopped pins which live on the record itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceFlags {
    /// Restart automatically after an unexpected stop, while still required
    pub auto_restart: bool,
    /// Re-launch a crashed process transparently without leaving started
    pub smooth_recovery: bool,
    /// The service requires the console to start
    pub starts_on_console: bool,
    /// The service keeps the console while running
    pub runs_on_console: bool,
    /// A start in progress may be abandoned by signalling the process
    pub start_interruptible: bool,
    /// A scripted start killed by SIGINT counts as (skipped) success
    pub skippable: bool,
}

impl ServiceFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_auto_restart(mut self, value: bool) -> Self {
        self.auto_restart = value;
        self
    }

    pub fn with_smooth_recovery(mut self, value: bool) -> Self {
        self.smooth_recovery = value;
        self
    }

    pub fn with_starts_on_console(mut self, value: bool) -> Self {
        self.starts_on_console = value;
        self
    }

    pub fn with_runs_on_console(mut self, value: bool) -> Self {
        self.runs_on_console = value;
        self
    }

    pub fn with_start_interruptible(mut self, value: bool) -> Self {
        self.start_interruptible = value;
        self
    }

    pub fn with_skippable(mut self, value: bool) -> Self {
        self.skippable = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_flags_all_clear() {
        let flags = ServiceFlags::new();
        assert!(!flags.auto_restart);
        assert!(!flags.smooth_recovery);
        assert!(!flags.starts_on_console);
        assert!(!flags.runs_on_console);
        assert!(!flags.start_interruptible);
        assert!(!flags.skippable);
    }

    #[test]
    fn test_builder_sets_single_flag() {
        let flags = ServiceFlags::new().with_smooth_recovery(true);
        assert!(flags.smooth_recovery);
        assert!(!flags.auto_restart);
    }
}
