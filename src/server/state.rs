//! Server lifecycle state machine.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a running server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerState {
    #[default]
    Starting,
    Ready,
    TimedOut,
    Stopped,
}

impl ServerState {
    /// Whether requests may be addressed to the server.
    #[must_use]
    pub fn is_ready(self) -> bool {
        self == Self::Ready
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == Self::Stopped
    }

    /// Whether moving from `self` to `next` is allowed.
    ///
    /// A marker seen after the start timeout still promotes the server to
    /// `Ready`; readiness never reverts except by stopping.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Starting, Self::Ready | Self::TimedOut)
                | (Self::TimedOut, Self::Ready)
                | (Self::Starting | Self::Ready | Self::TimedOut, Self::Stopped)
        )
    }
}
