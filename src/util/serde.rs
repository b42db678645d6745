//! Serializable identifier and value types shared across the queue tree.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a submitted application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub u64);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "application_{:06}", self.0)
    }
}

/// Identifier of one attempt to run an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApplicationAttemptId {
    /// Owning application.
    pub application: ApplicationId,
    /// Attempt number, starting at 1.
    pub attempt: u32,
}

impl ApplicationAttemptId {
    /// Build an attempt id.
    #[must_use]
    pub const fn new(application: ApplicationId, attempt: u32) -> Self {
        Self {
            application,
            attempt,
        }
    }
}

impl fmt::Display for ApplicationAttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "appattempt_{:06}_{:03}", self.application.0, self.attempt)
    }
}

/// Identifier of a granted container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContainerId {
    /// Attempt the container was granted to.
    pub attempt: ApplicationAttemptId,
    /// Sequence number within the attempt.
    pub sequence: u64,
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "container_{:06}_{:03}_{:06}",
            self.attempt.application.0, self.attempt.attempt, self.sequence
        )
    }
}

/// Application priority, fixed at admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(pub u32);

impl Default for Priority {
    fn default() -> Self {
        Self(1)
    }
}

/// Terminal state reported when an application stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppFinalState {
    /// Application completed normally.
    Finished,
    /// Application failed.
    Failed,
    /// Application was killed by a user or administrator.
    Killed,
}

impl fmt::Display for AppFinalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Finished => "FINISHED",
            Self::Failed => "FAILED",
            Self::Killed => "KILLED",
        };
        f.write_str(s)
    }
}
