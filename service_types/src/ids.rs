//! Identifiers for supervised services and process launches

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable handle to a registered service record.
///
/// Ids are arena indices assigned at registration and never reused for
/// the lifetime of the set, so a stale id can be detected rather than
/// silently aliasing another record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceId(usize);

impl ServiceId {
    /// Creates a service id from an arena index
    pub fn from_index(index: usize) -> Self {
        Self(index)
    }

    /// Returns the underlying arena index
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "svc#{}", self.0)
    }
}

/// Unique identifier for one process launch attempt.
///
/// A service may launch many processes over its lifetime (restarts,
/// smooth recovery, stop scripts). Each launch gets a fresh id so exit
/// reports and exec outcomes stay attributable even across pid reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LaunchId(Uuid);

impl LaunchId {
    /// Creates a new random launch id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a launch id from an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for LaunchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LaunchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "launch:{}", self.0)
    }
}
